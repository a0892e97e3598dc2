//! YAML read/dump adapter.
//!
//! Converts between YAML text and the [`Node`] tree using `serde_yaml`.
//! The adapter is the only place that knows about `serde_yaml::Value`; the
//! rest of the crate works on [`Node`].

use std::path::Path;

use serde_yaml::value::{Tag, TaggedValue};
use serde_yaml::{Mapping, Value};

use crate::error::DocumentError;
use crate::node::{Node, NodePath, Tagged};

/// How numbers and booleans are represented after reading.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ScalarPolicy {
    /// Every leaf becomes [`Node::Scalar`] text.  On dump, text that YAML
    /// would resolve to a number or boolean is written plain again.
    #[default]
    Stringify,
    /// Numbers and booleans stay [`Node::Number`] / [`Node::Bool`].
    Preserve,
}

/// Reads and writes YAML documents.
#[derive(Debug, Clone, Copy, Default)]
pub struct Documents {
    pub scalars: ScalarPolicy,
}

impl Documents {
    pub fn new(scalars: ScalarPolicy) -> Self {
        Self { scalars }
    }

    /// Parse one YAML document.  Empty text is [`Node::Null`].
    pub fn parse(&self, text: &str) -> Result<Node, DocumentError> {
        let value: Value = serde_yaml::from_str(text).map_err(|e| {
            let loc = e.location();
            DocumentError::Parse {
                message: e.to_string(),
                line: loc.as_ref().map(|l| l.line()),
                column: loc.as_ref().map(|l| l.column()),
            }
        })?;
        self.from_value(&value, &mut NodePath::new())
    }

    /// Read and parse a YAML file.
    pub fn read_file(&self, path: &Path) -> Result<Node, DocumentError> {
        let text = std::fs::read_to_string(path).map_err(|source| DocumentError::Io {
            path: path.to_owned(),
            source,
        })?;
        self.parse(&text)
    }

    /// Render a tree as YAML text.
    pub fn dump(&self, node: &Node) -> Result<String, DocumentError> {
        serde_yaml::to_string(&self.to_value(node)).map_err(DocumentError::Emit)
    }

    /// Render a tree and write it to `path`.
    ///
    /// The text goes to a temporary file in the destination directory first
    /// and is renamed over `path`, so readers never see a half-written file.
    pub fn write_file(&self, path: &Path, node: &Node) -> Result<(), DocumentError> {
        use std::io::Write;

        let text = self.dump(node)?;
        let io_err = |source| DocumentError::Io {
            path: path.to_owned(),
            source,
        };
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(io_err)?;
        tmp.write_all(text.as_bytes()).map_err(io_err)?;
        tmp.persist(path).map_err(|e| io_err(e.error))?;
        Ok(())
    }

    // ── Value → Node ──────────────────────────────────────────────────────────

    fn from_value(&self, value: &Value, path: &mut NodePath) -> Result<Node, DocumentError> {
        Ok(match value {
            Value::Null => Node::Null,
            Value::String(s) => Node::Scalar(s.clone()),
            Value::Bool(b) => match self.scalars {
                ScalarPolicy::Stringify => Node::Scalar(b.to_string()),
                ScalarPolicy::Preserve => Node::Bool(*b),
            },
            Value::Number(n) => match self.scalars {
                ScalarPolicy::Stringify => Node::Scalar(n.to_string()),
                ScalarPolicy::Preserve => Node::Number(n.clone()),
            },
            Value::Sequence(items) => {
                let mut out = Vec::with_capacity(items.len());
                for (i, item) in items.iter().enumerate() {
                    path.push_index(i);
                    out.push(self.from_value(item, path)?);
                    path.pop();
                }
                Node::Sequence(out)
            }
            Value::Mapping(map) => {
                let mut out = Vec::with_capacity(map.len());
                for (k, v) in map {
                    let key = key_text(k, path)?;
                    path.push_key(&key);
                    out.push((key, self.from_value(v, path)?));
                    path.pop();
                }
                Node::Mapping(out)
            }
            Value::Tagged(tagged) => {
                let tag = tagged.tag.to_string();
                Node::Tagged(Box::new(Tagged {
                    tag: tag.trim_start_matches('!').to_owned(),
                    value: self.from_value(&tagged.value, path)?,
                }))
            }
        })
    }

    // ── Node → Value ──────────────────────────────────────────────────────────

    fn to_value(&self, node: &Node) -> Value {
        match node {
            Node::Null => Value::Null,
            Node::Scalar(s) => match self.scalars {
                ScalarPolicy::Stringify => plain_scalar(s),
                ScalarPolicy::Preserve => Value::String(s.clone()),
            },
            Node::Bool(b) => Value::Bool(*b),
            Node::Number(n) => Value::Number(n.clone()),
            Node::Sequence(items) => Value::Sequence(items.iter().map(|n| self.to_value(n)).collect()),
            Node::Mapping(entries) => {
                let mut map = Mapping::with_capacity(entries.len());
                for (k, v) in entries {
                    map.insert(Value::String(k.clone()), self.to_value(v));
                }
                Value::Mapping(map)
            }
            Node::Tagged(t) if t.tag.is_empty() => self.to_value(&t.value),
            Node::Tagged(t) => Value::Tagged(Box::new(TaggedValue {
                tag: Tag::new(t.tag.clone()),
                value: self.to_value(&t.value),
            })),
        }
    }
}

/// Text of a mapping key.  Scalar keys of any type become their text.
fn key_text(key: &Value, path: &NodePath) -> Result<String, DocumentError> {
    match key {
        Value::String(s) => Ok(s.clone()),
        Value::Null => Ok("null".to_owned()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Sequence(_) => Err(DocumentError::ComplexKey {
            kind: "sequence",
            path: path.to_string(),
        }),
        Value::Mapping(_) => Err(DocumentError::ComplexKey {
            kind: "mapping",
            path: path.to_string(),
        }),
        Value::Tagged(t) => key_text(&t.value, path),
    }
}

/// Emit `text` as a plain number/boolean when YAML reads it back as exactly
/// the same text.  Anything else (`1.10`, `1e3`, `007`, `True`) stays a
/// string, quoted by the emitter.
fn plain_scalar(text: &str) -> Value {
    let looks_typed = text
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_digit() || matches!(c, '-' | '+' | '.' | 't' | 'f' | 'T' | 'F'));
    if looks_typed {
        match serde_yaml::from_str::<Value>(text) {
            Ok(Value::Number(n)) if n.to_string() == text => return Value::Number(n),
            Ok(Value::Bool(b)) if b.to_string() == text => return Value::Bool(b),
            _ => {}
        }
    }
    Value::String(text.to_owned())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
