//! Error types.
//!
//! One enum per layer.  Library code never aborts the process: the
//! "should never happen" conditions (a built-in pattern that fails to
//! compile, a node shape the substitution engine does not understand) are
//! ordinary variants here, and only the `yb` binary maps them to distinct
//! exit statuses via [`BatchError::exit_code`].

use std::io;
use std::path::PathBuf;

use crate::node::NodeKind;

/// Exit status for a built-in pattern that failed to compile.
pub const EXIT_INVALID_PATTERN: u8 = 91;
/// Exit status for an unsupported element kind inside a sequence.
pub const EXIT_UNSUPPORTED_ELEMENT: u8 = 92;
/// Exit status for an unsupported node kind anywhere in a tree.
pub const EXIT_UNSUPPORTED_NODE: u8 = 93;

// ── ScriptError ───────────────────────────────────────────────────────────────

/// Failures of the line classifier.
#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    /// The script source could not be read.  Recoverable.
    #[error("cannot open script {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A built-in line pattern failed to compile.  A defect, not user error.
    #[error("internal error: built-in pattern `{name}` is invalid: {source}")]
    InvalidPattern {
        name: &'static str,
        #[source]
        source: regex::Error,
    },
}

// ── MacroError ────────────────────────────────────────────────────────────────

/// Failures of the macro substitution engine.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MacroError {
    /// A sequence held an element that is neither a mapping, a scalar nor null.
    #[error("unsupported {kind} element in sequence at {path}")]
    UnsupportedElement { kind: NodeKind, path: String },

    /// A node of a kind the engine cannot substitute into.
    #[error("unsupported node kind `{kind}` at {path}")]
    UnsupportedNodeKind { kind: NodeKind, path: String },
}

// ── DocumentError ─────────────────────────────────────────────────────────────

/// Failures of the YAML document adapter.
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    /// Text is not well-formed YAML.  `line`/`column` are 1-based when known.
    #[error("{}", parse_message(.message, .line, .column))]
    Parse {
        message: String,
        line: Option<usize>,
        column: Option<usize>,
    },

    /// A mapping key that is itself a sequence or mapping.
    #[error("unsupported {kind} used as a mapping key at {path}")]
    ComplexKey { kind: &'static str, path: String },

    #[error("cannot emit YAML: {0}")]
    Emit(#[source] serde_yaml::Error),

    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

fn parse_message(message: &str, line: &Option<usize>, column: &Option<usize>) -> String {
    match (line, column) {
        (Some(l), Some(c)) => format!("YAML parse error at line {l}, column {c}: {message}"),
        (Some(l), None) => format!("YAML parse error at line {l}: {message}"),
        _ => format!("YAML parse error: {message}"),
    }
}

// ── BatchError ────────────────────────────────────────────────────────────────

/// Failures while running a batch script.
///
/// Variants that stem from a specific script line carry the script name and
/// the 1-based physical line number.
#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    #[error(transparent)]
    Script(#[from] ScriptError),

    #[error("{script}:{line}: {source}")]
    Macro {
        script: String,
        line: usize,
        #[source]
        source: MacroError,
    },

    #[error("{script}:{line}: {source}")]
    Document {
        script: String,
        line: usize,
        #[source]
        source: DocumentError,
    },

    #[error("{script}:{line}: unknown command `{name}`")]
    UnknownCommand {
        script: String,
        line: usize,
        name: String,
    },

    #[error("{script}:{line}: {message}")]
    UnbalancedLoop {
        script: String,
        line: usize,
        message: &'static str,
    },

    #[error("{script}:{line}: sub-batch nesting deeper than {max} levels")]
    DepthExceeded {
        script: String,
        line: usize,
        max: usize,
    },

    #[error("{script}:{line}: `{what}` needs a current document, but there is none")]
    MissingInput {
        script: String,
        line: usize,
        what: String,
    },

    #[error("{script}:{line}: memory slot `!{name}` is empty")]
    EmptyMemorySlot {
        script: String,
        line: usize,
        name: String,
    },

    #[error("{script}:{line}: {name}: {message}")]
    Command {
        script: String,
        line: usize,
        name: String,
        message: String,
    },
}

impl BatchError {
    /// Process exit status for this error: `1` for ordinary failures, one of
    /// the `EXIT_*` constants for defects.
    pub fn exit_code(&self) -> u8 {
        match self {
            BatchError::Script(ScriptError::InvalidPattern { .. }) => EXIT_INVALID_PATTERN,
            BatchError::Macro { source, .. } => match source {
                MacroError::UnsupportedElement { .. } => EXIT_UNSUPPORTED_ELEMENT,
                MacroError::UnsupportedNodeKind { .. } => EXIT_UNSUPPORTED_NODE,
            },
            _ => 1,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
