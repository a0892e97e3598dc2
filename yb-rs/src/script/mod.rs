//! Batch scripts.
//!
//! - [`line`]: loading, comment stripping and per-line classification
//! - [`directive`]: what a classified line means
//! - [`commands`]: the commands plain lines invoke
//! - [`runner`]: executing a whole script
//!
//! # Quick start
//!
//! ```rust
//! use yb::config::BatchConfig;
//! use yb::script::{BatchRunner, CommandRegistry};
//!
//! let runner = BatchRunner::new(BatchConfig::default(), CommandRegistry::with_builtins()).unwrap();
//! let report = runner
//!     .run_str("hello.yb", "properties who=world\nprint hello ${LOCAL::who}", None)
//!     .unwrap();
//! assert_eq!(report.output, vec!["hello world"]);
//! ```

pub mod commands;
pub mod directive;
pub mod line;
pub mod runner;

// Re-exports for convenience.
pub use commands::{split_args, Command, CommandContext, CommandError, CommandRegistry};
pub use directive::Directive;
pub use line::{ClassifierState, LineClassifier, ScriptLine};
pub use runner::{BatchRunner, RunReport};
