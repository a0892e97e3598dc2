//! Macro substitution over YAML trees.
//!
//! [`MacroEngine::substitute`] walks a [`Node`] tree and rebuilds it with
//! every marker in mapping keys and scalar values expanded.  Each text goes
//! through two tiers:
//!
//! 1. the local [`PropertySet`],
//! 2. the [`NamedPropertySets`], applied to the result of tier 1.
//!
//! So a local property may expand to a named-set marker, which tier 2 then
//! resolves.  The input tree is only borrowed; the result is always a new
//! tree.
//!
//! ## Supported shapes
//!
//! | Node                    | Handling                                   |
//! |-------------------------|--------------------------------------------|
//! | mapping                 | keys expanded, values walked, order kept   |
//! | sequence                | mapping/scalar elements walked, null kept  |
//! | scalar                  | expanded                                   |
//! | null                    | kept                                       |
//! | bool / number / tagged  | [`MacroError::UnsupportedNodeKind`]        |
//!
//! A sequence element that is itself a sequence (or a bool, number or
//! tagged value) is [`MacroError::UnsupportedElement`].

use std::borrow::Cow;

use tracing::{debug, trace};

use crate::error::{MacroError, ScriptError};
use crate::expand::{Evaluate, MarkerEvaluator};
use crate::node::{Node, NodePath};
use crate::var::{NamedPropertySets, PropertySet};

// ── Substituted ───────────────────────────────────────────────────────────────

/// Result of one [`MacroEngine::substitute`] call.
#[derive(Debug, Clone, PartialEq)]
pub struct Substituted {
    pub node: Node,
    /// Number of keys and scalars whose text changed.
    pub changes: usize,
    /// Markers left in the output, each listed once in first-seen order.
    pub unresolved: Vec<String>,
}

impl Substituted {
    /// `true` if any key or scalar anywhere in the tree changed.
    pub fn changed(&self) -> bool {
        self.changes > 0
    }
}

// ── MacroEngine ───────────────────────────────────────────────────────────────

/// Two-tier marker substitution.  Holds no per-call state.
#[derive(Debug, Clone)]
pub struct MacroEngine<E: Evaluate = MarkerEvaluator> {
    evaluator: E,
}

/// Lookup context and bookkeeping for one walk.
struct Walk<'a> {
    local: &'a PropertySet,
    named: &'a NamedPropertySets,
    path: NodePath,
    unresolved: Vec<String>,
}

impl MacroEngine<MarkerEvaluator> {
    /// Engine using `${NS::name}` markers with local namespace `local_ns`.
    pub fn with_namespace(local_ns: impl Into<String>) -> Result<Self, ScriptError> {
        Ok(Self::new(MarkerEvaluator::new(local_ns)?))
    }
}

impl<E: Evaluate> MacroEngine<E> {
    pub fn new(evaluator: E) -> Self {
        Self { evaluator }
    }

    /// Rebuild `tree` with all resolvable markers expanded.
    pub fn substitute(
        &self,
        tree: &Node,
        local: &PropertySet,
        named: &NamedPropertySets,
    ) -> Result<Substituted, MacroError> {
        let mut walk = Walk {
            local,
            named,
            path: NodePath::new(),
            unresolved: Vec::new(),
        };
        let (node, changes) = self.walk(tree, &mut walk)?;
        debug!(changes, unresolved = walk.unresolved.len(), "substitution done");
        Ok(Substituted {
            node,
            changes,
            unresolved: walk.unresolved,
        })
    }

    /// Two-tier expansion of a single text.
    pub fn expand_text<'t>(
        &self,
        text: &'t str,
        local: &PropertySet,
        named: &NamedPropertySets,
    ) -> Cow<'t, str> {
        match self.evaluator.eval_local(text, local) {
            Cow::Borrowed(s) => self.evaluator.eval_named(s, named),
            Cow::Owned(s) => Cow::Owned(self.evaluator.eval_named(&s, named).into_owned()),
        }
    }

    fn walk(&self, node: &Node, cx: &mut Walk<'_>) -> Result<(Node, usize), MacroError> {
        match node {
            Node::Null => Ok((Node::Null, 0)),
            Node::Scalar(text) => {
                let (out, changes) = self.text(text, cx);
                Ok((Node::Scalar(out), changes))
            }
            Node::Mapping(entries) => {
                let mut out = Vec::with_capacity(entries.len());
                let mut changes = 0;
                for (key, value) in entries {
                    cx.path.push_key(key);
                    let (new_key, key_changes) = self.text(key, cx);
                    let (new_value, value_changes) = self.walk(value, cx)?;
                    cx.path.pop();
                    changes += key_changes + value_changes;
                    out.push((new_key, new_value));
                }
                Ok((Node::Mapping(out), changes))
            }
            Node::Sequence(items) => {
                let mut out = Vec::with_capacity(items.len());
                let mut changes = 0;
                for (i, item) in items.iter().enumerate() {
                    cx.path.push_index(i);
                    let (new_item, item_changes) = match item {
                        Node::Mapping(_) | Node::Scalar(_) => self.walk(item, cx)?,
                        Node::Null => (Node::Null, 0),
                        other => {
                            return Err(MacroError::UnsupportedElement {
                                kind: other.kind(),
                                path: cx.path.to_string(),
                            })
                        }
                    };
                    cx.path.pop();
                    changes += item_changes;
                    out.push(new_item);
                }
                Ok((Node::Sequence(out), changes))
            }
            Node::Bool(_) | Node::Number(_) | Node::Tagged(_) => Err(MacroError::UnsupportedNodeKind {
                kind: node.kind(),
                path: cx.path.to_string(),
            }),
        }
    }

    fn text(&self, text: &str, cx: &mut Walk<'_>) -> (String, usize) {
        let local = self.evaluator.eval_local(text, cx.local);
        trace!(path = %cx.path, %text, result = %local, "local tier");
        let named = self.evaluator.eval_named(&local, cx.named);
        trace!(path = %cx.path, result = %named, "named tier");

        for marker in self.evaluator.unresolved(&named) {
            debug!(path = %cx.path, %marker, "unresolved marker");
            if !cx.unresolved.contains(&marker) {
                cx.unresolved.push(marker);
            }
        }
        let changed = usize::from(named != text);
        (named.into_owned(), changed)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
