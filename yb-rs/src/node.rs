//! In-memory document tree.
//!
//! [`Node`] is the shape every YAML document takes once the
//! [`document`](crate::document) adapter has read it.  Mappings are ordered
//! lists of `(key, value)` pairs rather than hash maps: key order is part of
//! the document, and duplicate keys coming from upstream are carried as-is.

use std::fmt;

pub use serde_yaml::Number;

// ── Node ──────────────────────────────────────────────────────────────────────

/// One node of a document tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// No value (`key:` with nothing after it, `~`, `null`).
    Null,
    /// Leaf text.
    Scalar(String),
    /// Typed boolean leaf (only produced under [`ScalarPolicy::Preserve`]).
    ///
    /// [`ScalarPolicy::Preserve`]: crate::document::ScalarPolicy::Preserve
    Bool(bool),
    /// Typed numeric leaf (only produced under [`ScalarPolicy::Preserve`]).
    ///
    /// [`ScalarPolicy::Preserve`]: crate::document::ScalarPolicy::Preserve
    Number(Number),
    Sequence(Vec<Node>),
    Mapping(Vec<(String, Node)>),
    /// A value carrying an explicit `!tag`.
    Tagged(Box<Tagged>),
}

/// Payload of [`Node::Tagged`].
#[derive(Debug, Clone, PartialEq)]
pub struct Tagged {
    /// Tag text without the leading `!`.
    pub tag: String,
    pub value: Node,
}

/// The kind of a [`Node`], without its payload.  Used in diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Null,
    Scalar,
    Bool,
    Number,
    Sequence,
    Mapping,
    Tagged,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NodeKind::Null => "null",
            NodeKind::Scalar => "scalar",
            NodeKind::Bool => "boolean",
            NodeKind::Number => "number",
            NodeKind::Sequence => "sequence",
            NodeKind::Mapping => "mapping",
            NodeKind::Tagged => "tagged value",
        };
        f.write_str(s)
    }
}

impl Node {
    pub fn scalar(text: impl Into<String>) -> Self {
        Node::Scalar(text.into())
    }

    /// Build a mapping from `(key, value)` pairs, keeping their order.
    pub fn mapping<K: Into<String>>(entries: impl IntoIterator<Item = (K, Node)>) -> Self {
        Node::Mapping(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn sequence(items: impl IntoIterator<Item = Node>) -> Self {
        Node::Sequence(items.into_iter().collect())
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            Node::Null => NodeKind::Null,
            Node::Scalar(_) => NodeKind::Scalar,
            Node::Bool(_) => NodeKind::Bool,
            Node::Number(_) => NodeKind::Number,
            Node::Sequence(_) => NodeKind::Sequence,
            Node::Mapping(_) => NodeKind::Mapping,
            Node::Tagged(_) => NodeKind::Tagged,
        }
    }

    /// Scalar text, if this is a [`Node::Scalar`].
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Node::Scalar(s) => Some(s),
            _ => None,
        }
    }

    /// Text of any leaf: scalars as-is, typed leaves rendered, `Null` as `"null"`.
    pub fn leaf_text(&self) -> Option<String> {
        match self {
            Node::Null => Some("null".to_owned()),
            Node::Scalar(s) => Some(s.clone()),
            Node::Bool(b) => Some(b.to_string()),
            Node::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// First value stored under `key`, if this is a mapping.
    pub fn get(&self, key: &str) -> Option<&Node> {
        match self {
            Node::Mapping(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    /// Element `idx`, if this is a sequence.
    pub fn index(&self, idx: usize) -> Option<&Node> {
        match self {
            Node::Sequence(items) => items.get(idx),
            _ => None,
        }
    }

    /// Resolve a dotted path such as `spec.ports.0.name` or `spec.ports[0]`.
    ///
    /// Numeric segments index sequences; every other segment is a mapping key.
    pub fn select(&self, path: &str) -> Option<&Node> {
        let mut cur = self;
        for seg in path_segments(path) {
            cur = match seg.parse::<usize>() {
                Ok(idx) if matches!(cur, Node::Sequence(_)) => cur.index(idx)?,
                _ => cur.get(seg)?,
            };
        }
        Some(cur)
    }
}

/// Split `a.b[2].c` into `["a", "b", "2", "c"]`.
fn path_segments(path: &str) -> impl Iterator<Item = &str> {
    path.split(|c: char| c == '.' || c == '[' || c == ']')
        .filter(|s| !s.is_empty())
}

// ── NodePath ──────────────────────────────────────────────────────────────────

/// Location of a node inside a tree, rendered as `/key/list[2]/leaf`.
///
/// Maintained as a stack while walking so diagnostics can name the exact
/// spot an unsupported node was found.
#[derive(Debug, Default, Clone)]
pub struct NodePath {
    segs: Vec<PathSeg>,
}

#[derive(Debug, Clone)]
enum PathSeg {
    Key(String),
    Index(usize),
}

impl NodePath {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_key(&mut self, key: &str) {
        self.segs.push(PathSeg::Key(key.to_owned()));
    }

    pub fn push_index(&mut self, idx: usize) {
        self.segs.push(PathSeg::Index(idx));
    }

    pub fn pop(&mut self) {
        self.segs.pop();
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segs.is_empty() {
            return f.write_str("/");
        }
        for seg in &self.segs {
            match seg {
                PathSeg::Key(k) => write!(f, "/{k}")?,
                PathSeg::Index(i) => write!(f, "[{i}]")?,
            }
        }
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
