//! Trust policy handed to the client with `-p`.
//!
//! The policy is either the user's own file, or a generated validator
//! config whose trust anchor is a certificate file or `any`.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{ConfigError, Result, StreamError};
use crate::identity::IdentityStore;
use crate::options::{FetchOptions, StreamOptions};

/// Name of the generated policy inside the run directory.
pub const POLICY_FILE_NAME: &str = "policy.conf";
/// Name of the trust anchor certificate inside the run directory.
pub const ANCHOR_FILE_NAME: &str = "trust-anchor.cert";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrustAnchor {
    Any,
    File(PathBuf),
}

impl TrustAnchor {
    /// Validator config accepting data signed under this anchor.
    pub fn render(&self) -> String {
        let mut out = String::from(
            "validator\n{\n    rule\n    {\n        id \"Validation Rule\"\n        for data\n        checker\n        {\n            type hierarchical\n            sig-type rsa-sha256\n        }\n    }\n    trust-anchor\n    {\n",
        );
        match self {
            TrustAnchor::Any => out.push_str("        type any\n"),
            TrustAnchor::File(path) => {
                out.push_str("        type file\n");
                let _ = writeln!(out, "        file-name \"{}\"", path.display());
            }
        }
        out.push_str("    }\n}\n");
        out
    }
}

/// The policy chosen for a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyFile {
    /// A user-supplied schema, used as is.
    UserFile(PathBuf),
    /// A policy written into the run directory.
    Generated { path: PathBuf, anchor: TrustAnchor },
}

impl PolicyFile {
    pub fn path(&self) -> &Path {
        match self {
            PolicyFile::UserFile(path) => path,
            PolicyFile::Generated { path, .. } => path,
        }
    }

    pub fn anchor(&self) -> Option<&TrustAnchor> {
        match self {
            PolicyFile::UserFile(_) => None,
            PolicyFile::Generated { anchor, .. } => Some(anchor),
        }
    }
}

/// First identity that is a literal string prefix of `stream_prefix`.
///
/// Candidates are tried in the order given; no ordering is imposed.
pub fn find_prefix_identity<'a>(identities: &'a [String], stream_prefix: &str) -> Option<&'a str> {
    identities
        .iter()
        .map(String::as_str)
        .find(|id| !id.is_empty() && stream_prefix.starts_with(id))
}

fn generate(run_dir: &Path, anchor: TrustAnchor) -> Result<PolicyFile> {
    let path = run_dir.join(POLICY_FILE_NAME);
    fs::write(&path, anchor.render())
        .map_err(|e| StreamError::workspace("failed to write trust policy", &path, e))?;
    debug!(path = %path.display(), ?anchor, "wrote trust policy");
    Ok(PolicyFile::Generated { path, anchor })
}

/// Pick and write the policy `fetch` verifies with.
///
/// In order: the user's schema, the user's certificate, the certificate of
/// the first local identity prefixing the stream, or trust anything.
pub async fn compose_consumer_policy(
    options: &FetchOptions,
    store: &dyn IdentityStore,
    run_dir: &Path,
) -> Result<PolicyFile> {
    if let Some(schema) = &options.common.trust_schema {
        info!(path = %schema.display(), "using trust schema");
        return Ok(PolicyFile::UserFile(schema.clone()));
    }

    let anchor_path = run_dir.join(ANCHOR_FILE_NAME);

    if let Some(cert) = &options.certificate {
        fs::copy(cert, &anchor_path).map_err(|e| ConfigError::Read {
            path: cert.clone(),
            source: e,
        })?;
        info!(path = %cert.display(), "using certificate as trust anchor");
        return generate(run_dir, TrustAnchor::File(anchor_path));
    }

    let identities = store.list().await?;
    if let Some(identity) = find_prefix_identity(&identities, &options.common.stream_prefix) {
        let cert = store.dump_certificate(identity).await?;
        fs::write(&anchor_path, cert)
            .map_err(|e| StreamError::workspace("failed to write certificate", &anchor_path, e))?;
        info!(identity, "using identity certificate as trust anchor");
        return generate(run_dir, TrustAnchor::File(anchor_path));
    }

    info!("no matching identity, trusting any signer");
    generate(run_dir, TrustAnchor::Any)
}

/// Policy for `publish`: the user's schema, or trust anything.
pub fn compose_producer_policy(options: &StreamOptions, run_dir: &Path) -> Result<PolicyFile> {
    match &options.trust_schema {
        Some(schema) => Ok(PolicyFile::UserFile(schema.clone())),
        None => generate(run_dir, TrustAnchor::Any),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::testing::MemoryStore;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn fetch(prefix: &str) -> FetchOptions {
        FetchOptions {
            common: StreamOptions {
                stream_prefix: prefix.to_string(),
                ..Default::default()
            },
            certificate: None,
        }
    }

    #[test]
    fn test_render_any() {
        let expected = r#"validator
{
    rule
    {
        id "Validation Rule"
        for data
        checker
        {
            type hierarchical
            sig-type rsa-sha256
        }
    }
    trust-anchor
    {
        type any
    }
}
"#;
        assert_eq!(TrustAnchor::Any.render(), expected);
    }

    #[test]
    fn test_render_file() {
        let rendered = TrustAnchor::File(PathBuf::from("/tmp/run/trust-anchor.cert")).render();
        assert!(rendered.contains(
            "    trust-anchor\n    {\n        type file\n        file-name \"/tmp/run/trust-anchor.cert\"\n    }\n"
        ));
    }

    #[test]
    fn test_find_prefix_identity_takes_first_match() {
        let ids: Vec<String> = ["/other", "/ndnrtc", "/ndnrtc/first-stream"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(find_prefix_identity(&ids, "/ndnrtc/first-stream"), Some("/ndnrtc"));
        assert_eq!(find_prefix_identity(&ids, "/elsewhere"), None);
        // literal string prefix, not component-wise
        assert_eq!(find_prefix_identity(&ids, "/otherwise/stream"), Some("/other"));
    }

    #[tokio::test]
    async fn test_explicit_schema_wins() {
        let dir = TempDir::new().unwrap();
        let mut options = fetch("/ndnrtc/first-stream");
        options.common.trust_schema = Some(PathBuf::from("/etc/schema.conf"));
        options.certificate = Some(PathBuf::from("/etc/anchor.cert"));

        let store = MemoryStore::with_identities(&["/ndnrtc"]);
        let policy = compose_consumer_policy(&options, &store, dir.path()).await.unwrap();
        assert_eq!(policy, PolicyFile::UserFile(PathBuf::from("/etc/schema.conf")));
        assert!(!dir.path().join(POLICY_FILE_NAME).exists());
    }

    #[tokio::test]
    async fn test_certificate_is_copied() {
        let dir = TempDir::new().unwrap();
        let cert = dir.path().join("mine.cert");
        fs::write(&cert, "Bv0CERT").unwrap();
        let run = dir.path().join("run");
        fs::create_dir(&run).unwrap();

        let mut options = fetch("/ndnrtc/first-stream");
        options.certificate = Some(cert);

        let store = MemoryStore::default();
        let policy = compose_consumer_policy(&options, &store, &run).await.unwrap();

        let anchor = run.join(ANCHOR_FILE_NAME);
        assert_eq!(policy.anchor(), Some(&TrustAnchor::File(anchor.clone())));
        assert_eq!(fs::read_to_string(&anchor).unwrap(), "Bv0CERT");
        assert_eq!(
            fs::read_to_string(policy.path()).unwrap(),
            TrustAnchor::File(anchor).render()
        );
    }

    #[tokio::test]
    async fn test_missing_certificate_is_config_error() {
        let dir = TempDir::new().unwrap();
        let mut options = fetch("/a");
        options.certificate = Some(dir.path().join("absent.cert"));

        let err = compose_consumer_policy(&options, &MemoryStore::default(), dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, StreamError::Config(ConfigError::Read { .. })));
    }

    #[tokio::test]
    async fn test_matching_identity_certificate_is_dumped() {
        let dir = TempDir::new().unwrap();
        let store = MemoryStore::with_identities(&["/ndn/edu", "/ndnrtc", "/ndnrtc/first-stream"]);

        let policy = compose_consumer_policy(&fetch("/ndnrtc/first-stream"), &store, dir.path())
            .await
            .unwrap();

        let anchor = dir.path().join(ANCHOR_FILE_NAME);
        assert_eq!(policy.anchor(), Some(&TrustAnchor::File(anchor.clone())));
        assert_eq!(fs::read_to_string(anchor).unwrap(), "CERT(/ndnrtc)\n");
    }

    #[tokio::test]
    async fn test_dump_failure_is_fatal() {
        let dir = TempDir::new().unwrap();
        let store = MemoryStore {
            broken_certificates: true,
            ..MemoryStore::with_identities(&["/ndnrtc"])
        };

        let err = compose_consumer_policy(&fetch("/ndnrtc/first-stream"), &store, dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, StreamError::Identity(_)));
        assert!(!dir.path().join(POLICY_FILE_NAME).exists());
    }

    #[tokio::test]
    async fn test_no_match_trusts_any() {
        let dir = TempDir::new().unwrap();
        let store = MemoryStore::with_identities(&["/elsewhere"]);

        for _ in 0..2 {
            let policy = compose_consumer_policy(&fetch("/ndnrtc/first-stream"), &store, dir.path())
                .await
                .unwrap();
            assert_eq!(policy.anchor(), Some(&TrustAnchor::Any));
            assert_eq!(
                fs::read_to_string(policy.path()).unwrap(),
                TrustAnchor::Any.render()
            );
        }
    }

    #[test]
    fn test_producer_policy() {
        let dir = TempDir::new().unwrap();
        let mut options = StreamOptions::default();

        let policy = compose_producer_policy(&options, dir.path()).unwrap();
        assert_eq!(policy.anchor(), Some(&TrustAnchor::Any));

        options.trust_schema = Some(PathBuf::from("/etc/schema.conf"));
        let policy = compose_producer_policy(&options, dir.path()).unwrap();
        assert_eq!(policy.path(), Path::new("/etc/schema.conf"));
    }
}
