//! Commands run by plain script lines.
//!
//! A line that is not a directive names a command: its first token picks an
//! entry in the [`CommandRegistry`] and the remaining tokens are the
//! arguments.  Built-ins:
//!
//! | Command          | Effect                                             |
//! |------------------|----------------------------------------------------|
//! | `print <text…>`  | append the text to the output                      |
//! | `macro`          | pass the substituted document on                   |
//! | `select <path>`  | replace the document with the subtree at `path`    |
//! | `dump`           | append the document's YAML text to the output      |
//!
//! By the time a command runs, the current document has already been through
//! marker substitution and the line itself has been expanded.

use std::collections::HashMap;

use crate::document::Documents;
use crate::node::Node;
use crate::var::{NamedPropertySets, PropertySet};

// ── Command ───────────────────────────────────────────────────────────────────

/// Why a command failed.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("needs a current document")]
    MissingInput,
    #[error("{0}")]
    Failed(String),
}

/// Everything a command may look at or append to.
pub struct CommandContext<'a> {
    /// Current document after substitution, if there is one.
    pub document: Option<&'a Node>,
    pub local: &'a PropertySet,
    pub named: &'a NamedPropertySets,
    pub documents: Documents,
    pub output: &'a mut Vec<String>,
    /// Keys and scalars changed by the substitution that preceded the command.
    pub changes: usize,
    pub show_stats: bool,
}

impl CommandContext<'_> {
    fn require_document(&self) -> Result<&Node, CommandError> {
        self.document.ok_or(CommandError::MissingInput)
    }
}

/// A named action.
///
/// `Ok(Some(node))` makes `node` the current document; `Ok(None)` keeps the
/// document the command was given.
pub trait Command {
    fn run(&self, args: &[String], cx: &mut CommandContext<'_>) -> Result<Option<Node>, CommandError>;
}

impl<F> Command for F
where
    F: Fn(&[String], &mut CommandContext<'_>) -> Result<Option<Node>, CommandError>,
{
    fn run(&self, args: &[String], cx: &mut CommandContext<'_>) -> Result<Option<Node>, CommandError> {
        self(args, cx)
    }
}

// ── CommandRegistry ───────────────────────────────────────────────────────────

/// Name → command table.
#[derive(Default)]
pub struct CommandRegistry {
    commands: HashMap<String, Box<dyn Command>>,
}

impl std::fmt::Debug for CommandRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandRegistry")
            .field("commands", &self.names())
            .finish()
    }
}

impl CommandRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the built-in commands.
    pub fn with_builtins() -> Self {
        let mut reg = Self::new();
        reg.register_fn("print", print);
        reg.register_fn("macro", macro_cmd);
        reg.register_fn("select", select);
        reg.register_fn("dump", dump);
        reg
    }

    /// Add or replace a command.
    pub fn register(&mut self, name: impl Into<String>, command: impl Command + 'static) {
        self.commands.insert(name.into(), Box::new(command));
    }

    /// Add or replace a command implemented by a function or closure.
    pub fn register_fn<F>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn(&[String], &mut CommandContext<'_>) -> Result<Option<Node>, CommandError> + 'static,
    {
        self.register(name, f);
    }

    pub fn get(&self, name: &str) -> Option<&dyn Command> {
        self.commands.get(name).map(|c| c.as_ref())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.commands.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.commands.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

// ── Built-ins ─────────────────────────────────────────────────────────────────

fn print(args: &[String], cx: &mut CommandContext<'_>) -> Result<Option<Node>, CommandError> {
    cx.output.push(args.join(" "));
    Ok(None)
}

fn macro_cmd(_args: &[String], cx: &mut CommandContext<'_>) -> Result<Option<Node>, CommandError> {
    cx.require_document()?;
    if cx.show_stats {
        cx.output.push(format!("# of changes made: {}", cx.changes));
    }
    Ok(None)
}

fn select(args: &[String], cx: &mut CommandContext<'_>) -> Result<Option<Node>, CommandError> {
    let [path] = args else {
        return Err(CommandError::Failed("usage: select <path>".to_owned()));
    };
    let doc = cx.require_document()?;
    Ok(Some(doc.select(path).cloned().unwrap_or(Node::Null)))
}

fn dump(_args: &[String], cx: &mut CommandContext<'_>) -> Result<Option<Node>, CommandError> {
    let doc = cx.require_document()?;
    let text = cx
        .documents
        .dump(doc)
        .map_err(|e| CommandError::Failed(e.to_string()))?;
    cx.output.push(text.trim_end_matches('\n').to_owned());
    Ok(None)
}

// ── Argument tokenizer ────────────────────────────────────────────────────────

/// Split `s` into whitespace-delimited tokens.
///
/// Double- or single-quoted runs are kept together (quotes removed); inside
/// double quotes `\"` and `\\` are escapes.
pub fn split_args(s: &str) -> Vec<String> {
    let mut args: Vec<String> = Vec::new();
    let mut cur = String::new();
    let mut quote: Option<char> = None;
    // Distinguishes `""` (an empty argument) from no argument at all.
    let mut started = false;
    let mut chars = s.chars();

    while let Some(ch) = chars.next() {
        match (quote, ch) {
            (None, '"' | '\'') => {
                quote = Some(ch);
                started = true;
            }
            (Some(q), c) if c == q => quote = None,
            (Some('"'), '\\') => {
                if let Some(escaped) = chars.next() {
                    cur.push(escaped);
                }
            }
            (None, c) if c.is_whitespace() => {
                if started || !cur.is_empty() {
                    args.push(std::mem::take(&mut cur));
                    started = false;
                }
            }
            (_, c) => cur.push(c),
        }
    }
    if started || !cur.is_empty() {
        args.push(cur);
    }
    args
}

// ── Tests ─────────────────────────────────────────────────────────────────────
