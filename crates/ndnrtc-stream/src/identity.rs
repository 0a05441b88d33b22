//! Local signing identities, managed through `ndnsec`.

use std::process::{Output, Stdio};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::{Result, StreamError};
use crate::options::StreamOptions;

/// Query and manage the local identity and certificate store.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// All known identities, in the order the store lists them.
    async fn list(&self) -> Result<Vec<String>>;

    /// Whether `name` is a known identity.
    async fn exists(&self, name: &str) -> Result<bool> {
        Ok(self.list().await?.iter().any(|id| id == name))
    }

    /// Create a self-signed identity.
    async fn create(&self, name: &str) -> Result<()>;

    /// The default identity, if one is configured.
    async fn default_identity(&self) -> Result<Option<String>>;

    /// Certificate of `name`, in the store's text encoding.
    async fn dump_certificate(&self, name: &str) -> Result<String>;
}

/// Parse `ndnsec list` output. The default identity is marked with `*`.
pub fn parse_identity_list(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| line.strip_prefix('*').map(str::trim).unwrap_or(line))
        .map(str::to_string)
        .collect()
}

/// [`IdentityStore`] backed by the `ndnsec` tool.
#[derive(Debug, Clone)]
pub struct Ndnsec {
    program: String,
    prefix_args: Vec<String>,
}

impl Ndnsec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            prefix_args: Vec::new(),
        }
    }

    /// Run the tool through `program`, e.g. an interpreter plus script.
    pub fn with_prefix(program: impl Into<String>, prefix_args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            prefix_args,
        }
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.prefix_args).args(args).kill_on_drop(true);
        cmd
    }

    fn launch_error(&self, source: std::io::Error) -> StreamError {
        StreamError::Launch {
            program: self.program.clone(),
            source,
        }
    }

    async fn output(&self, args: &[&str]) -> Result<Output> {
        debug!(program = %self.program, ?args, "running identity tool");
        self.command(args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| self.launch_error(e))
    }
}

#[async_trait]
impl IdentityStore for Ndnsec {
    async fn list(&self) -> Result<Vec<String>> {
        let output = self.output(&["list"]).await?;
        if !output.status.success() {
            return Err(StreamError::Identity(format!(
                "{} list exited with {}",
                self.program, output.status
            )));
        }
        Ok(parse_identity_list(&String::from_utf8_lossy(&output.stdout)))
    }

    async fn create(&self, name: &str) -> Result<()> {
        info!(identity = name, "creating self-signed identity");

        let keygen = self.output(&["key-gen", "-i", name]).await?;
        if !keygen.status.success() {
            return Err(StreamError::Identity(format!(
                "key generation for {} failed: {}",
                name,
                String::from_utf8_lossy(&keygen.stderr).trim()
            )));
        }

        let mut install = self
            .command(&["cert-install", "-"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| self.launch_error(e))?;

        if let Some(mut stdin) = install.stdin.take() {
            stdin.write_all(&keygen.stdout).await?;
            stdin.shutdown().await?;
        }

        let installed = install.wait_with_output().await?;
        if !installed.status.success() {
            return Err(StreamError::Identity(format!(
                "certificate install for {} failed: {}",
                name,
                String::from_utf8_lossy(&installed.stderr).trim()
            )));
        }

        if !self.exists(name).await? {
            return Err(StreamError::Identity(format!(
                "identity {} still missing after creation",
                name
            )));
        }
        Ok(())
    }

    async fn default_identity(&self) -> Result<Option<String>> {
        let output = self.output(&["get-default"]).await?;
        if !output.status.success() {
            return Ok(None);
        }
        let name = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Ok((!name.is_empty()).then_some(name))
    }

    async fn dump_certificate(&self, name: &str) -> Result<String> {
        let output = self.output(&["cert-dump", "-i", name]).await?;
        if !output.status.success() {
            return Err(StreamError::Identity(format!(
                "could not dump certificate of {}",
                name
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Identity `publish` signs with.
///
/// A requested identity is created when missing; otherwise the default
/// identity is used and its absence is fatal.
pub async fn compose_producer_signing_identity(
    options: &StreamOptions,
    store: &dyn IdentityStore,
) -> Result<String> {
    match &options.identity {
        Some(name) => {
            if !store.exists(name).await? {
                store.create(name).await?;
            }
            Ok(name.clone())
        }
        None => store.default_identity().await?.ok_or_else(|| {
            StreamError::Identity("no identity given and no default identity configured".to_string())
        }),
    }
}

/// Identity `fetch` passes to the client, if any.
pub async fn resolve_fetch_identity(
    options: &StreamOptions,
    store: &dyn IdentityStore,
) -> Result<Option<String>> {
    match &options.identity {
        Some(name) => Ok(Some(name.clone())),
        None => store.default_identity().await,
    }
}


#[cfg(test)]
mod tests {
    use super::testing::MemoryStore;
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const FAKE_NDNSEC: &str = r#"
case "$1" in
    list)
        echo "  /ndn/edu/remap"
        echo "* /ndnrtc"
        echo ""
        echo "  /ndnrtc/first-stream"
        ;;
    get-default)
        echo "/ndnrtc"
        ;;
    cert-dump)
        [ "$3" = "/missing" ] && exit 1
        echo "Bv0BPAcx$3"
        ;;
    key-gen)
        echo "key-for-$3"
        ;;
    cert-install)
        read line
        [ "$line" = "key-for-/new" ] || exit 1
        ;;
    *)
        exit 2
        ;;
esac
"#;

    fn fake_ndnsec(dir: &TempDir) -> Ndnsec {
        let script = dir.path().join("ndnsec.sh");
        fs::write(&script, FAKE_NDNSEC).unwrap();
        Ndnsec::with_prefix("/bin/sh", vec![script.to_string_lossy().into_owned()])
    }

    fn opts(identity: Option<&str>) -> StreamOptions {
        StreamOptions {
            stream_prefix: "/ndnrtc/first-stream".to_string(),
            identity: identity.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn test_parse_identity_list() {
        let ids = parse_identity_list("  /a/b\n* /c\n\n/d\n");
        assert_eq!(ids, vec!["/a/b", "/c", "/d"]);
        assert!(parse_identity_list("").is_empty());
    }

    #[tokio::test]
    async fn test_ndnsec_list_and_default() {
        let dir = TempDir::new().unwrap();
        let ndnsec = fake_ndnsec(&dir);

        assert_eq!(
            ndnsec.list().await.unwrap(),
            vec!["/ndn/edu/remap", "/ndnrtc", "/ndnrtc/first-stream"]
        );
        assert!(ndnsec.exists("/ndnrtc").await.unwrap());
        // membership is exact, not substring
        assert!(!ndnsec.exists("/ndn").await.unwrap());
        assert_eq!(
            ndnsec.default_identity().await.unwrap(),
            Some("/ndnrtc".to_string())
        );
    }

    #[tokio::test]
    async fn test_ndnsec_dump_certificate() {
        let dir = TempDir::new().unwrap();
        let ndnsec = fake_ndnsec(&dir);

        let cert = ndnsec.dump_certificate("/ndnrtc").await.unwrap();
        assert_eq!(cert, "Bv0BPAcx/ndnrtc\n");

        let err = ndnsec.dump_certificate("/missing").await.unwrap_err();
        assert!(matches!(err, StreamError::Identity(_)));
    }

    #[tokio::test]
    async fn test_ndnsec_create_rechecks_listing() {
        let dir = TempDir::new().unwrap();
        let ndnsec = fake_ndnsec(&dir);

        // installs fine, but the fake listing never shows it
        let err = ndnsec.create("/new").await.unwrap_err();
        assert!(err.to_string().contains("still missing"));

        let err = ndnsec.create("/other").await.unwrap_err();
        assert!(err.to_string().contains("certificate install"));
    }

    #[tokio::test]
    async fn test_missing_tool_is_launch_error() {
        let ndnsec = Ndnsec::new("/nonexistent/ndnsec");
        assert!(matches!(
            ndnsec.list().await,
            Err(StreamError::Launch { .. })
        ));
    }

    #[tokio::test]
    async fn test_signing_identity_uses_existing() {
        let store = MemoryStore::with_identities(&["/ndnrtc"]);
        let id = compose_producer_signing_identity(&opts(Some("/ndnrtc")), &store)
            .await
            .unwrap();
        assert_eq!(id, "/ndnrtc");
        assert_eq!(store.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_signing_identity_creates_missing() {
        let store = MemoryStore::with_identities(&[]);
        let id = compose_producer_signing_identity(&opts(Some("/me")), &store)
            .await
            .unwrap();
        assert_eq!(id, "/me");
        assert!(store.exists("/me").await.unwrap());
    }

    #[tokio::test]
    async fn test_signing_identity_falls_back_to_default() {
        let store = MemoryStore {
            default: Some("/default".to_string()),
            ..Default::default()
        };
        let id = compose_producer_signing_identity(&opts(None), &store).await.unwrap();
        assert_eq!(id, "/default");
    }

    #[tokio::test]
    async fn test_signing_identity_without_default_fails() {
        let store = MemoryStore::default();
        let err = compose_producer_signing_identity(&opts(None), &store)
            .await
            .unwrap_err();
        assert!(matches!(err, StreamError::Identity(_)));
    }

    #[tokio::test]
    async fn test_fetch_identity_is_optional() {
        let store = MemoryStore::default();
        assert_eq!(resolve_fetch_identity(&opts(None), &store).await.unwrap(), None);
        assert_eq!(
            resolve_fetch_identity(&opts(Some("/x")), &store).await.unwrap(),
            Some("/x".to_string())
        );
    }
}
