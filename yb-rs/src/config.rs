//! Runner settings and properties files.
//!
//! A properties file holds one `name=value` pair per line and follows the
//! same comment rules as a batch script:
//!
//! | Line                     | Action                          |
//! |--------------------------|---------------------------------|
//! | `name=value`             | set `name`                      |
//! | `name = value # note`    | set `name` to `value`           |
//! | blank, `#`, `//`, `--`   | ignored                         |
//! | anything else            | reported, loading continues     |

use std::path::Path;

use crate::document::ScalarPolicy;
use crate::error::ScriptError;
use crate::expand::DEFAULT_LOCAL_NAMESPACE;
use crate::script::LineClassifier;
use crate::var::PropertySet;

// ── BatchConfig ───────────────────────────────────────────────────────────────

/// Settings shared by a [`BatchRunner`](crate::script::BatchRunner) and every
/// sub-batch it starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchConfig {
    /// Trim leading/trailing whitespace from script lines.
    pub trim_whitespace: bool,
    /// Deepest allowed `batch` nesting.  The top-level script is depth 0.
    pub max_depth: usize,
    /// Namespace of markers resolved against the local property set.
    pub local_namespace: String,
    pub scalars: ScalarPolicy,
    /// Log the number of changes each substitution made.
    pub show_stats: bool,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            trim_whitespace: true,
            max_depth: 16,
            local_namespace: DEFAULT_LOCAL_NAMESPACE.to_owned(),
            scalars: ScalarPolicy::default(),
            show_stats: false,
        }
    }
}

// ── Properties files ──────────────────────────────────────────────────────────

/// A non-fatal error on one line of a properties file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyLineError {
    pub line: usize,
    pub message: String,
}

impl std::fmt::Display for PropertyLineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

impl std::error::Error for PropertyLineError {}

/// Parse properties text.
///
/// Returns the properties and any malformed lines; a later assignment to the
/// same name wins.
pub fn load_properties_str(text: &str) -> Result<(PropertySet, Vec<PropertyLineError>), ScriptError> {
    let mut lines = LineClassifier::new()?;
    lines.load_str("<properties>", text, true);

    let mut props = PropertySet::new();
    let mut errors = Vec::new();
    for line in lines.lines() {
        match parse_assignment(&line.text) {
            Ok((key, value)) => props.set(key, value),
            Err(message) => errors.push(PropertyLineError {
                line: line.line_num,
                message,
            }),
        }
    }
    Ok((props, errors))
}

/// Read and parse a properties file.
pub fn load_properties_file(
    path: impl AsRef<Path>,
) -> Result<(PropertySet, Vec<PropertyLineError>), ScriptError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|source| ScriptError::Open {
        path: path.to_owned(),
        source,
    })?;
    load_properties_str(&text)
}

fn parse_assignment(line: &str) -> Result<(&str, &str), String> {
    let Some((key, value)) = line.split_once('=') else {
        return Err(format!("expected name=value, got `{line}`"));
    };
    let key = key.trim();
    if key.is_empty() {
        return Err("missing property name".to_owned());
    }
    if key.chars().any(char::is_whitespace) {
        return Err(format!("property name `{key}` contains whitespace"));
    }
    Ok((key, value.trim()))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = BatchConfig::default();
        assert!(c.trim_whitespace);
        assert_eq!(c.max_depth, 16);
        assert_eq!(c.local_namespace, "LOCAL");
        assert_eq!(c.scalars, ScalarPolicy::Stringify);
        assert!(!c.show_stats);
    }

    #[test]
    fn simple_assignments() {
        let (props, errors) = load_properties_str("region=eu-west-1\nbucket = assets\n").unwrap();
        assert!(errors.is_empty());
        assert_eq!(props.get("region"), Some("eu-west-1"));
        assert_eq!(props.get("bucket"), Some("assets"));
    }

    #[test]
    fn comments_and_blank_lines_ignored() {
        let text = "# header\n\n-- old\n// also old\nkey=value # trailing\n";
        let (props, errors) = load_properties_str(text).unwrap();
        assert!(errors.is_empty());
        assert_eq!(props.len(), 1);
        assert_eq!(props.get("key"), Some("value"));
    }

    #[test]
    fn empty_value_allowed() {
        let (props, _) = load_properties_str("blank=\n").unwrap();
        assert_eq!(props.get("blank"), Some(""));
    }

    #[test]
    fn value_may_contain_equals() {
        let (props, _) = load_properties_str("query=a=b&c=d\n").unwrap();
        assert_eq!(props.get("query"), Some("a=b&c=d"));
    }

    #[test]
    fn later_assignment_wins() {
        let (props, _) = load_properties_str("k=1\nk=2\n").unwrap();
        assert_eq!(props.get("k"), Some("2"));
    }

    #[test]
    fn malformed_lines_reported_with_line_numbers() {
        let text = "good=1\n# comment\nnot a pair\n=novalue\nbad key=x\nalso=fine\n";
        let (props, errors) = load_properties_str(text).unwrap();
        assert_eq!(props.len(), 2);
        let lines: Vec<_> = errors.iter().map(|e| e.line).collect();
        assert_eq!(lines, [3, 4, 5]);
        assert_eq!(errors[1].to_string(), "line 4: missing property name");
    }

    #[test]
    fn load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("global.properties");
        std::fs::write(&path, "region=us-east-1\n").unwrap();
        let (props, errors) = load_properties_file(&path).unwrap();
        assert!(errors.is_empty());
        assert_eq!(props.get("region"), Some("us-east-1"));
    }

    #[test]
    fn load_missing_file() {
        let err = load_properties_file("/no/such/file.properties").unwrap_err();
        assert!(matches!(err, ScriptError::Open { .. }));
    }
}
