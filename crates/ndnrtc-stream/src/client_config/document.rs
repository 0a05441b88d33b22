//! In-memory model of the streaming client's config syntax (libconfig).
//!
//! A document is a root [`Group`] of ordered settings. Rendering is a single
//! step (`Display`), so builders never deal with text formatting.

use std::fmt::{self, Write};

/// A setting value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Group(Group),
    /// Heterogeneous `( ... )` list.
    List(Vec<Value>),
    /// Scalar `[ ... ]` array.
    Array(Vec<Value>),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_group(&self) -> Option<&Group> {
        match self {
            Value::Group(g) => Some(g),
            _ => None,
        }
    }

    pub fn as_group_mut(&mut self) -> Option<&mut Group> {
        match self {
            Value::Group(g) => Some(g),
            _ => None,
        }
    }

    /// Elements of a list or an array.
    pub fn as_seq(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) | Value::Array(items) => Some(items),
            _ => None,
        }
    }

    fn is_scalar(&self) -> bool {
        matches!(
            self,
            Value::Bool(_) | Value::Int(_) | Value::Float(_) | Value::Str(_)
        )
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<Group> for Value {
    fn from(v: Group) -> Self {
        Value::Group(v)
    }
}

/// A named value.
#[derive(Debug, Clone, PartialEq)]
pub struct Setting {
    pub name: String,
    pub value: Value,
}

/// An ordered set of settings; also the document root.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Group {
    settings: Vec<Setting>,
}

impl Group {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_settings(settings: Vec<Setting>) -> Self {
        Self { settings }
    }

    /// Builder form of [`Group::set`].
    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    /// Replace the value of `name`, or append it.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) {
        let value = value.into();
        match self.settings.iter_mut().find(|s| s.name == name) {
            Some(existing) => existing.value = value,
            None => self.settings.push(Setting {
                name: name.to_string(),
                value,
            }),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.settings.iter().find(|s| s.name == name).map(|s| &s.value)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Value> {
        self.settings
            .iter_mut()
            .find(|s| s.name == name)
            .map(|s| &mut s.value)
    }

    /// Look up a dotted path of nested groups, e.g. `consume.basic.video`.
    pub fn lookup(&self, path: &str) -> Option<&Value> {
        let mut parts = path.split('.');
        let mut current = self.get(parts.next()?)?;
        for part in parts {
            current = current.as_group()?.get(part)?;
        }
        Some(current)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Setting> {
        self.settings.iter()
    }

    pub fn len(&self) -> usize {
        self.settings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.settings.is_empty()
    }

    fn write_settings(&self, out: &mut String, depth: usize) -> fmt::Result {
        for setting in &self.settings {
            indent(out, depth);
            write!(out, "{} = ", setting.name)?;
            write_value(out, &setting.value, depth)?;
            out.push_str(";\n");
        }
        Ok(())
    }
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        self.write_settings(&mut out, 0)?;
        f.write_str(&out)
    }
}

const INDENT: &str = "    ";

fn indent(out: &mut String, depth: usize) {
    for _ in 0..depth {
        out.push_str(INDENT);
    }
}

fn write_value(out: &mut String, value: &Value, depth: usize) -> fmt::Result {
    match value {
        Value::Bool(b) => write!(out, "{}", b),
        Value::Int(i) => {
            if i32::try_from(*i).is_ok() {
                write!(out, "{}", i)
            } else {
                write!(out, "{}L", i)
            }
        }
        Value::Float(v) => write_float(out, *v),
        Value::Str(s) => write_string(out, s),
        Value::Group(g) => {
            out.push_str("{\n");
            g.write_settings(out, depth + 1)?;
            indent(out, depth);
            out.push('}');
            Ok(())
        }
        Value::List(items) => write_seq(out, items, ('(', ')'), depth),
        Value::Array(items) => write_seq(out, items, ('[', ']'), depth),
    }
}

fn write_seq(out: &mut String, items: &[Value], (open, close): (char, char), depth: usize) -> fmt::Result {
    if items.is_empty() {
        write!(out, "{}{}", open, close)?;
        return Ok(());
    }

    // Scalars stay on one line; anything nested gets one element per line
    if items.iter().all(Value::is_scalar) {
        write!(out, "{} ", open)?;
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            write_value(out, item, depth)?;
        }
        write!(out, " {}", close)?;
        return Ok(());
    }

    out.push(open);
    out.push('\n');
    for (i, item) in items.iter().enumerate() {
        indent(out, depth + 1);
        write_value(out, item, depth + 1)?;
        if i + 1 < items.len() {
            out.push(',');
        }
        out.push('\n');
    }
    indent(out, depth);
    out.push(close);
    Ok(())
}

fn write_float(out: &mut String, v: f64) -> fmt::Result {
    let rendered = format!("{:?}", v);
    out.push_str(&rendered);
    if !rendered.contains(['.', 'e', 'E']) && v.is_finite() {
        out.push_str(".0");
    }
    Ok(())
}

fn write_string(out: &mut String, s: &str) -> fmt::Result {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out.push('"');
    Ok(())
}
