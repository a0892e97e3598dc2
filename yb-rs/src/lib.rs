//! `yb`: a YAML batch-scripting engine.
//!
//! A batch script is a list of line directives (`properties`, `useAsInput`,
//! `saveTo`, `batch`, `foreach`/`end`) and commands.  Before every command
//! the current YAML document is run through two-tier marker substitution:
//! `${LOCAL::name}` markers resolve against the script's local properties,
//! then `${SET::name}` markers resolve against named property sets.

pub mod cli;
pub mod config;
pub mod document;
pub mod error;
pub mod expand;
pub mod macros;
pub mod node;
pub mod script;
pub mod var;
