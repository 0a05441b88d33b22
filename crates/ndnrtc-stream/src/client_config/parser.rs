//! libconfig parser using winnow.
//!
//! Accepts the subset the streaming client reads: groups, lists, arrays,
//! strings (adjacent literals concatenate), booleans, decimal and hex
//! integers with optional `L` suffix, floats, and `#`, `//`, `/* */`
//! comments. `=` and `:` both assign; `;` and `,` terminators are optional.

use thiserror::Error;
use winnow::ascii::Caseless;
use winnow::combinator::{alt, cut_err, opt, repeat};
use winnow::error::{StrContext, StrContextValue};
use winnow::prelude::*;
use winnow::token::{any, one_of, take_till, take_until, take_while};

use super::document::{Group, Setting, Value};

type PResult<T> = winnow::ModalResult<T>;

/// A syntax error with its 1-based position.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("line {line}, column {column}: {message}")]
pub struct ParseError {
    pub line: usize,
    pub column: usize,
    pub message: String,
}

/// Parse a whole document.
pub fn parse_document(input: &str) -> Result<Group, ParseError> {
    document.parse(input).map_err(|e| {
        let (line, column) = position(input, e.offset());
        let message = e.inner().to_string();
        ParseError {
            line,
            column,
            message: if message.is_empty() {
                "unexpected input".to_string()
            } else {
                message
            },
        }
    })
}

fn position(input: &str, offset: usize) -> (usize, usize) {
    let consumed = &input[..offset.min(input.len())];
    let line = consumed.matches('\n').count() + 1;
    let column = consumed
        .rfind('\n')
        .map(|nl| consumed[nl + 1..].chars().count())
        .unwrap_or_else(|| consumed.chars().count())
        + 1;
    (line, column)
}

fn document(input: &mut &str) -> PResult<Group> {
    ws(input)?;
    let settings: Vec<Setting> = repeat(0.., setting).parse_next(input)?;
    ws(input)?;
    Ok(Group::from_settings(settings))
}

/// Whitespace and comments.
fn ws(input: &mut &str) -> PResult<()> {
    repeat(
        0..,
        alt((
            take_while(1.., char::is_whitespace).void(),
            ("//", take_till(0.., '\n')).void(),
            ('#', take_till(0.., '\n')).void(),
            ("/*", take_until(0.., "*/"), "*/").void(),
        )),
    )
    .parse_next(input)
}

fn name<'i>(input: &mut &'i str) -> PResult<&'i str> {
    (
        one_of(|c: char| c.is_ascii_alphabetic() || c == '*'),
        take_while(0.., |c: char| {
            c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '*')
        }),
    )
        .take()
        .parse_next(input)
}

fn setting(input: &mut &str) -> PResult<Setting> {
    let key = name(input)?;
    ws(input)?;
    cut_err(one_of(['=', ':']))
        .context(StrContext::Expected(StrContextValue::CharLiteral('=')))
        .parse_next(input)?;
    ws(input)?;
    let value = cut_err(value)
        .context(StrContext::Label("value"))
        .parse_next(input)?;
    ws(input)?;
    opt(one_of([';', ','])).parse_next(input)?;
    ws(input)?;

    Ok(Setting {
        name: key.to_string(),
        value,
    })
}

fn value(input: &mut &str) -> PResult<Value> {
    alt((
        group.map(Value::Group),
        list.map(Value::List),
        array.map(Value::Array),
        string.map(Value::Str),
        boolean.map(Value::Bool),
        number,
    ))
    .parse_next(input)
}

fn group(input: &mut &str) -> PResult<Group> {
    '{'.parse_next(input)?;
    ws(input)?;
    let settings: Vec<Setting> = repeat(0.., setting).parse_next(input)?;
    cut_err('}')
        .context(StrContext::Expected(StrContextValue::CharLiteral('}')))
        .parse_next(input)?;
    Ok(Group::from_settings(settings))
}

fn list(input: &mut &str) -> PResult<Vec<Value>> {
    sequence(input, '(', ')')
}

fn array(input: &mut &str) -> PResult<Vec<Value>> {
    sequence(input, '[', ']')
}

/// `( a, b, )` or `[ a, b ]`; a trailing comma is tolerated.
fn sequence(input: &mut &str, mut open: char, close: char) -> PResult<Vec<Value>> {
    open.parse_next(input)?;
    let mut items = Vec::new();
    loop {
        ws(input)?;
        if opt(close).parse_next(input)?.is_some() {
            return Ok(items);
        }
        items.push(cut_err(value).parse_next(input)?);
        ws(input)?;
        if opt(',').parse_next(input)?.is_none() {
            ws(input)?;
            cut_err(close)
                .context(StrContext::Expected(StrContextValue::CharLiteral(close)))
                .parse_next(input)?;
            return Ok(items);
        }
    }
}

fn string(input: &mut &str) -> PResult<String> {
    let mut out = quoted(input)?;
    loop {
        let before = *input;
        ws(input)?;
        if input.starts_with('"') {
            out.push_str(&quoted(input)?);
        } else {
            *input = before;
            return Ok(out);
        }
    }
}

fn quoted(input: &mut &str) -> PResult<String> {
    '"'.parse_next(input)?;
    let mut out = String::new();
    loop {
        let chunk: &str = take_till(0.., ['"', '\\']).parse_next(input)?;
        out.push_str(chunk);

        let c = cut_err(any)
            .context(StrContext::Expected(StrContextValue::CharLiteral('"')))
            .parse_next(input)?;
        if c == '"' {
            return Ok(out);
        }

        let escaped = cut_err(any).parse_next(input)?;
        match escaped {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            'f' => out.push('\x0c'),
            '"' => out.push('"'),
            '\\' => out.push('\\'),
            other => {
                out.push('\\');
                out.push(other);
            }
        }
    }
}

fn boolean(input: &mut &str) -> PResult<bool> {
    alt((Caseless("true").value(true), Caseless("false").value(false))).parse_next(input)
}

fn number(input: &mut &str) -> PResult<Value> {
    take_while(1.., |c: char| {
        c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.')
    })
    .verify_map(parse_number)
    .context(StrContext::Label("number"))
    .parse_next(input)
}

fn parse_number(token: &str) -> Option<Value> {
    let digits = token
        .strip_suffix("LL")
        .or_else(|| token.strip_suffix('L'))
        .unwrap_or(token);

    let (negative, unsigned) = match digits.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, digits.strip_prefix('+').unwrap_or(digits)),
    };

    if let Some(hex) = unsigned
        .strip_prefix("0x")
        .or_else(|| unsigned.strip_prefix("0X"))
    {
        let magnitude = i64::from_str_radix(hex, 16).ok()?;
        return Some(Value::Int(if negative { -magnitude } else { magnitude }));
    }

    if !unsigned.starts_with(|c: char| c.is_ascii_digit() || c == '.') {
        return None;
    }

    if let Ok(int) = digits.parse::<i64>() {
        return Some(Value::Int(int));
    }

    if digits.contains(['.', 'e', 'E']) {
        return digits.parse::<f64>().ok().map(Value::Float);
    }

    None
}
