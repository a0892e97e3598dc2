//! Marker expansion.
//!
//! Resolves the variable markers embedded in scalar text, keys and script
//! arguments:
//!
//! | Marker             | Resolved against                                   |
//! |--------------------|----------------------------------------------------|
//! | `${LOCAL::name}`   | the local [`PropertySet`] (namespace configurable) |
//! | `${SET::name}`     | property `name` of the named set `SET`             |
//!
//! Each call is one left-to-right pass: replacement text is not rescanned,
//! and a marker that does not resolve is copied to the output verbatim.
//! Callers that want to know what was left behind use
//! [`Evaluate::unresolved`].

use std::borrow::Cow;

use regex::{Captures, Regex};

use crate::error::ScriptError;
use crate::var::{NamedPropertySets, PropertySet};

/// Default namespace of markers resolved against the local property set.
pub const DEFAULT_LOCAL_NAMESPACE: &str = "LOCAL";

const MARKER_PATTERN: &str = r"\$\{([A-Za-z][A-Za-z0-9_]*)::([^}]+)\}";

// ── Evaluate ──────────────────────────────────────────────────────────────────

/// A marker evaluator: one text, one lookup context, one pass.
///
/// The substitution engine only ever talks to this trait, so an alternative
/// marker syntax can be plugged in without touching the tree walker.
pub trait Evaluate {
    /// Substitute markers that refer to the local property set.
    fn eval_local<'t>(&self, text: &'t str, props: &PropertySet) -> Cow<'t, str>;

    /// Substitute markers that refer to a named property set.
    fn eval_named<'t>(&self, text: &'t str, sets: &NamedPropertySets) -> Cow<'t, str>;

    /// Markers still present in `text`.
    fn unresolved(&self, text: &str) -> Vec<String>;
}

// ── MarkerEvaluator ───────────────────────────────────────────────────────────

/// The `${NS::name}` evaluator.
#[derive(Debug, Clone)]
pub struct MarkerEvaluator {
    local_ns: String,
    re: Regex,
}

impl MarkerEvaluator {
    /// Build an evaluator whose local markers use namespace `local_ns`.
    pub fn new(local_ns: impl Into<String>) -> Result<Self, ScriptError> {
        let re = Regex::new(MARKER_PATTERN).map_err(|source| ScriptError::InvalidPattern {
            name: "marker",
            source,
        })?;
        Ok(Self {
            local_ns: local_ns.into(),
            re,
        })
    }

    fn replace<'t>(
        &self,
        text: &'t str,
        lookup: impl Fn(&str, &str) -> Option<String>,
    ) -> Cow<'t, str> {
        // Fast path: most scalars carry no marker at all.
        if !text.contains("${") {
            return Cow::Borrowed(text);
        }
        self.re.replace_all(text, |caps: &Captures<'_>| {
            lookup(&caps[1], &caps[2]).unwrap_or_else(|| caps[0].to_owned())
        })
    }
}

impl Evaluate for MarkerEvaluator {
    fn eval_local<'t>(&self, text: &'t str, props: &PropertySet) -> Cow<'t, str> {
        self.replace(text, |ns, name| {
            if ns == self.local_ns {
                props.get(name).map(str::to_owned)
            } else {
                None
            }
        })
    }

    fn eval_named<'t>(&self, text: &'t str, sets: &NamedPropertySets) -> Cow<'t, str> {
        self.replace(text, |ns, name| sets.lookup(ns, name).map(str::to_owned))
    }

    fn unresolved(&self, text: &str) -> Vec<String> {
        if !text.contains("${") {
            return Vec::new();
        }
        self.re
            .find_iter(text)
            .map(|m| m.as_str().to_owned())
            .collect()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn ev() -> MarkerEvaluator {
        MarkerEvaluator::new(DEFAULT_LOCAL_NAMESPACE).unwrap()
    }

    fn local() -> PropertySet {
        [("name", "Alice"), ("env", "prod")].into_iter().collect()
    }

    fn named() -> NamedPropertySets {
        let mut sets = NamedPropertySets::new();
        sets.insert("GLOBAL", [("region", "eu-west-1")].into_iter().collect());
        sets
    }

    #[test]
    fn local_marker_resolves() {
        assert_eq!(ev().eval_local("hi ${LOCAL::name}!", &local()), "hi Alice!");
    }

    #[test]
    fn multiple_markers_in_one_text() {
        assert_eq!(
            ev().eval_local("${LOCAL::name}-${LOCAL::env}", &local()),
            "Alice-prod"
        );
    }

    #[test]
    fn unresolved_local_left_verbatim() {
        assert_eq!(
            ev().eval_local("x=${LOCAL::missing}", &local()),
            "x=${LOCAL::missing}"
        );
    }

    #[test]
    fn local_tier_ignores_other_namespaces() {
        assert_eq!(
            ev().eval_local("${GLOBAL::region}", &local()),
            "${GLOBAL::region}"
        );
    }

    #[test]
    fn named_marker_resolves() {
        assert_eq!(
            ev().eval_named("${GLOBAL::region}/bucket", &named()),
            "eu-west-1/bucket"
        );
    }

    #[test]
    fn named_tier_unknown_set_left_verbatim() {
        assert_eq!(ev().eval_named("${NOPE::region}", &named()), "${NOPE::region}");
    }

    #[test]
    fn replacement_not_rescanned() {
        let props: PropertySet = [("a", "${LOCAL::b}"), ("b", "deep")].into_iter().collect();
        assert_eq!(ev().eval_local("${LOCAL::a}", &props), "${LOCAL::b}");
    }

    #[test]
    fn plain_text_is_borrowed() {
        let out = ev().eval_local("no markers here", &local());
        assert!(matches!(out, Cow::Borrowed(_)));
    }

    #[test]
    fn malformed_markers_are_plain_text() {
        let props = local();
        for text in ["${name}", "${LOCAL:name}", "${::name}", "${LOCAL::}", "$LOCAL::name"] {
            assert_eq!(ev().eval_local(text, &props), text);
        }
    }

    #[test]
    fn custom_namespace() {
        let ev = MarkerEvaluator::new("ASUX").unwrap();
        assert_eq!(ev.eval_local("${ASUX::name}", &local()), "Alice");
        assert_eq!(ev.eval_local("${LOCAL::name}", &local()), "${LOCAL::name}");
    }

    #[test]
    fn unresolved_lists_markers() {
        assert_eq!(
            ev().unresolved("a ${LOCAL::x} b ${S::y}"),
            vec!["${LOCAL::x}".to_owned(), "${S::y}".to_owned()]
        );
        assert!(ev().unresolved("plain").is_empty());
    }
}
