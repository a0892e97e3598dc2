//! Batch script execution.
//!
//! A [`BatchRunner`] loads a script through the [`LineClassifier`], groups
//! its lines into `foreach … end` blocks and executes them top to bottom
//! against a session:
//!
//! | State          | Changed by                                          |
//! |----------------|-----------------------------------------------------|
//! | local props    | `properties k=v`, `foreach` iterations              |
//! | named sets     | `batch` (the sub-script's final properties)         |
//! | document       | `useAsInput`, commands, `foreach`, `batch`          |
//! | memory slots   | `saveTo !name`                                      |
//! | output         | `print`, `dump`                                     |
//!
//! Every path, property value and command line is expanded through both
//! marker tiers before it is used.

use std::collections::HashMap;
use std::path::Path;

use tracing::{debug, info, warn};

use crate::config::BatchConfig;
use crate::document::Documents;
use crate::error::BatchError;
use crate::macros::MacroEngine;
use crate::node::Node;
use crate::var::{NamedPropertySets, PropertySet};
use super::commands::{split_args, CommandContext, CommandError, CommandRegistry};
use super::directive::Directive;
use super::line::LineClassifier;

/// Local property holding the 0-based iteration number inside `foreach`.
pub const FOREACH_INDEX: &str = "foreach.index";
/// Local property holding the current item's text (or entry key) inside `foreach`.
pub const FOREACH_VALUE: &str = "foreach.iteration.value";

// ── Steps ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
enum Step {
    Line {
        line: usize,
        text: String,
        directive: Directive,
    },
    ForEach {
        /// Line of the `foreach`.
        line: usize,
        body: Vec<Step>,
    },
}

/// Group classified lines into nested `foreach` blocks.
fn parse_steps(lines: &mut LineClassifier) -> Result<Vec<Step>, BatchError> {
    let script = lines.source_name().unwrap_or_default().to_owned();
    let mut current: Vec<Step> = Vec::new();
    // Enclosing blocks: line of their `foreach` and the steps before it.
    let mut open: Vec<(usize, Vec<Step>)> = Vec::new();

    while lines.advance().is_some() {
        let line = lines.line_num().unwrap_or_default();
        let text = lines.current().unwrap_or_default().to_owned();
        let Some(directive) = lines.classify().cloned() else { continue };
        match directive {
            Directive::ForEachBegin => open.push((line, std::mem::take(&mut current))),
            Directive::ForEachEnd => {
                let Some((start, parent)) = open.pop() else {
                    return Err(BatchError::UnbalancedLoop {
                        script,
                        line,
                        message: "`end` without a matching `foreach`",
                    });
                };
                let body = std::mem::replace(&mut current, parent);
                current.push(Step::ForEach { line: start, body });
            }
            directive => current.push(Step::Line { line, text, directive }),
        }
    }
    if let Some((start, _)) = open.last() {
        return Err(BatchError::UnbalancedLoop {
            script,
            line: *start,
            message: "`foreach` without a matching `end`",
        });
    }
    Ok(current)
}

// ── Session ───────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct Session {
    local: PropertySet,
    named: NamedPropertySets,
    document: Option<Node>,
    /// `!name` slots.  Shared by a script and every sub-batch it runs.
    memory: HashMap<String, Node>,
    output: Vec<String>,
    changes: usize,
    commands: usize,
}

/// What a finished run leaves behind.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    /// The current document when the script ended.
    pub document: Option<Node>,
    /// Final local properties.
    pub properties: PropertySet,
    pub named: NamedPropertySets,
    /// Lines produced by `print` and `dump`, in order.
    pub output: Vec<String>,
    /// Keys and scalars changed by substitution over the whole run.
    pub changes: usize,
    /// Plain commands executed, sub-batches included.
    pub commands: usize,
}

impl Session {
    fn into_report(self) -> RunReport {
        RunReport {
            document: self.document,
            properties: self.local,
            named: self.named,
            output: self.output,
            changes: self.changes,
            commands: self.commands,
        }
    }
}

// ── BatchRunner ───────────────────────────────────────────────────────────────

/// Runs batch scripts.
#[derive(Debug)]
pub struct BatchRunner {
    config: BatchConfig,
    registry: CommandRegistry,
    engine: MacroEngine,
    documents: Documents,
    properties: PropertySet,
    named: NamedPropertySets,
}

impl BatchRunner {
    pub fn new(config: BatchConfig, registry: CommandRegistry) -> Result<Self, BatchError> {
        let engine = MacroEngine::with_namespace(config.local_namespace.as_str())?;
        let documents = Documents::new(config.scalars);
        Ok(Self {
            config,
            registry,
            engine,
            documents,
            properties: PropertySet::new(),
            named: NamedPropertySets::new(),
        })
    }

    /// Local properties every run starts with.
    pub fn with_properties(mut self, properties: PropertySet) -> Self {
        self.properties = properties;
        self
    }

    /// Named sets every run starts with.
    pub fn with_named(mut self, named: NamedPropertySets) -> Self {
        self.named = named;
        self
    }

    /// Run the script file at `path`, starting from `input`.
    pub fn run_file(&self, path: impl AsRef<Path>, input: Option<Node>) -> Result<RunReport, BatchError> {
        let mut session = self.session(input);
        self.exec_file(path.as_ref(), &mut session, 0)?;
        Ok(session.into_report())
    }

    /// Run script text; `name` labels diagnostics.
    pub fn run_str(&self, name: &str, text: &str, input: Option<Node>) -> Result<RunReport, BatchError> {
        let mut lines = LineClassifier::new()?;
        lines.load_str(name, text, self.config.trim_whitespace);
        let mut session = self.session(input);
        self.exec_loaded(&mut lines, &mut session, 0)?;
        Ok(session.into_report())
    }

    fn session(&self, input: Option<Node>) -> Session {
        Session {
            local: self.properties.clone(),
            named: self.named.clone(),
            document: input,
            ..Session::default()
        }
    }

    fn exec_file(&self, path: &Path, s: &mut Session, depth: usize) -> Result<(), BatchError> {
        let mut lines = LineClassifier::new()?;
        lines.open(path, self.config.trim_whitespace)?;
        self.exec_loaded(&mut lines, s, depth)
    }

    fn exec_loaded(&self, lines: &mut LineClassifier, s: &mut Session, depth: usize) -> Result<(), BatchError> {
        let steps = parse_steps(lines)?;
        let script = lines.source_name().unwrap_or_default();
        info!(script, depth, lines = lines.lines().len(), "running batch");
        self.exec_steps(script, &steps, s, depth)?;
        info!(script, depth, commands = s.commands, changes = s.changes, "batch finished");
        Ok(())
    }

    fn exec_steps(&self, script: &str, steps: &[Step], s: &mut Session, depth: usize) -> Result<(), BatchError> {
        for step in steps {
            match step {
                Step::Line { line, text, directive } => {
                    self.exec_line(script, *line, text, directive, s, depth)?
                }
                Step::ForEach { line, body } => self.exec_foreach(script, *line, body, s, depth)?,
            }
        }
        Ok(())
    }

    fn expand(&self, text: &str, s: &Session) -> String {
        self.engine.expand_text(text, &s.local, &s.named).into_owned()
    }

    fn exec_line(
        &self,
        script: &str,
        line: usize,
        text: &str,
        directive: &Directive,
        s: &mut Session,
        depth: usize,
    ) -> Result<(), BatchError> {
        debug!(script, line, %directive, "step");
        match directive {
            Directive::PropertyAssignment { key, value } => {
                let value = self.expand(value, s);
                s.local.set(key.as_str(), value);
            }
            Directive::UseAsInput { path } => {
                let path = self.expand(path, s);
                let doc = match path.strip_prefix('!') {
                    Some(slot) => s.memory.get(slot).cloned().ok_or_else(|| BatchError::EmptyMemorySlot {
                        script: script.to_owned(),
                        line,
                        name: slot.to_owned(),
                    })?,
                    None => self
                        .documents
                        .read_file(Path::new(&path))
                        .map_err(|source| BatchError::Document {
                            script: script.to_owned(),
                            line,
                            source,
                        })?,
                };
                s.document = Some(doc);
            }
            Directive::SaveTo { path } => {
                let path = self.expand(path, s);
                let doc = s.document.as_ref().ok_or_else(|| BatchError::MissingInput {
                    script: script.to_owned(),
                    line,
                    what: "saveTo".to_owned(),
                })?;
                match path.strip_prefix('!') {
                    Some(slot) => {
                        s.memory.insert(slot.to_owned(), doc.clone());
                    }
                    None => self
                        .documents
                        .write_file(Path::new(&path), doc)
                        .map_err(|source| BatchError::Document {
                            script: script.to_owned(),
                            line,
                            source,
                        })?,
                }
            }
            Directive::SubBatch { path } => self.exec_sub_batch(script, line, path, s, depth)?,
            Directive::PlainCommand { .. } => self.exec_command(script, line, text, s)?,
            // Consumed by `parse_steps`.
            Directive::ForEachBegin | Directive::ForEachEnd => {}
        }
        Ok(())
    }

    fn exec_command(&self, script: &str, line: usize, text: &str, s: &mut Session) -> Result<(), BatchError> {
        let expanded = self.expand(text, s);
        let args = split_args(&expanded);
        let Some((name, args)) = args.split_first() else {
            return Ok(());
        };
        let command = self.registry.get(name).ok_or_else(|| BatchError::UnknownCommand {
            script: script.to_owned(),
            line,
            name: name.clone(),
        })?;

        let (document, changes) = match &s.document {
            Some(doc) => {
                let out = self
                    .engine
                    .substitute(doc, &s.local, &s.named)
                    .map_err(|source| BatchError::Macro {
                        script: script.to_owned(),
                        line,
                        source,
                    })?;
                if self.config.show_stats {
                    info!(script, line, changes = out.changes, "# of changes made");
                }
                if !out.unresolved.is_empty() {
                    warn!(script, line, markers = ?out.unresolved, "unresolved markers left in document");
                }
                (Some(out.node), out.changes)
            }
            None => (None, 0),
        };
        s.changes += changes;

        let mut cx = CommandContext {
            document: document.as_ref(),
            local: &s.local,
            named: &s.named,
            documents: self.documents,
            output: &mut s.output,
            changes,
            show_stats: self.config.show_stats,
        };
        let replaced = command.run(args, &mut cx).map_err(|e| match e {
            CommandError::MissingInput => BatchError::MissingInput {
                script: script.to_owned(),
                line,
                what: name.clone(),
            },
            CommandError::Failed(message) => BatchError::Command {
                script: script.to_owned(),
                line,
                name: name.clone(),
                message,
            },
        })?;
        s.document = replaced.or(document);
        s.commands += 1;
        Ok(())
    }

    fn exec_sub_batch(
        &self,
        script: &str,
        line: usize,
        path: &str,
        s: &mut Session,
        depth: usize,
    ) -> Result<(), BatchError> {
        if depth >= self.config.max_depth {
            return Err(BatchError::DepthExceeded {
                script: script.to_owned(),
                line,
                max: self.config.max_depth,
            });
        }
        let path = self.expand(path, s);
        let mut child = Session {
            local: s.local.clone(),
            named: s.named.clone(),
            document: s.document.clone(),
            memory: std::mem::take(&mut s.memory),
            ..Session::default()
        };
        let result = self.exec_file(Path::new(&path), &mut child, depth + 1);
        s.memory = std::mem::take(&mut child.memory);
        result?;

        let set_name = Path::new(&path)
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.clone());
        debug!(script, line, set = %set_name, "sub-batch properties registered");
        s.named.insert(set_name, child.local);
        s.document = child.document;
        s.output.append(&mut child.output);
        s.changes += child.changes;
        s.commands += child.commands;
        Ok(())
    }

    fn exec_foreach(
        &self,
        script: &str,
        line: usize,
        body: &[Step],
        s: &mut Session,
        depth: usize,
    ) -> Result<(), BatchError> {
        let items: Vec<(String, Node)> = match s.document.take() {
            None => {
                warn!(script, line, "foreach without a current document");
                return Ok(());
            }
            Some(Node::Null) => Vec::new(),
            Some(Node::Sequence(items)) => items
                .into_iter()
                .map(|item| (item.leaf_text().unwrap_or_default(), item))
                .collect(),
            Some(Node::Mapping(entries)) => entries,
            Some(other) => vec![(other.leaf_text().unwrap_or_default(), other)],
        };
        debug!(script, line, iterations = items.len(), "foreach");

        let saved = (
            s.local.get(FOREACH_INDEX).map(str::to_owned),
            s.local.get(FOREACH_VALUE).map(str::to_owned),
        );
        let mut results = Vec::with_capacity(items.len());
        for (i, (value, item)) in items.into_iter().enumerate() {
            s.local.set(FOREACH_INDEX, i.to_string());
            s.local.set(FOREACH_VALUE, value);
            s.document = Some(item);
            self.exec_steps(script, body, s, depth)?;
            results.push(s.document.take().unwrap_or(Node::Null));
        }
        s.document = Some(Node::Sequence(results));

        restore(&mut s.local, FOREACH_INDEX, saved.0);
        restore(&mut s.local, FOREACH_VALUE, saved.1);
        Ok(())
    }
}

fn restore(props: &mut PropertySet, name: &str, value: Option<String>) {
    match value {
        Some(v) => props.set(name, v),
        None => {
            props.unset(name);
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::ScalarPolicy;
    use crate::error::EXIT_UNSUPPORTED_NODE;

    fn runner() -> BatchRunner {
        BatchRunner::new(BatchConfig::default(), CommandRegistry::with_builtins()).unwrap()
    }

    fn run(script: &str, input: Option<Node>) -> RunReport {
        runner().run_str("test.yb", script, input).unwrap()
    }

    fn run_err(script: &str, input: Option<Node>) -> BatchError {
        runner().run_str("test.yb", script, input).unwrap_err()
    }

    // -- Block parsing --------------------------------------------------------

    #[test]
    fn stray_end_is_unbalanced() {
        let err = run_err("print a\nend\n", None);
        assert!(matches!(err, BatchError::UnbalancedLoop { line: 2, .. }));
    }

    #[test]
    fn missing_end_reports_foreach_line() {
        let err = run_err("print a\nforeach\nprint b\n", None);
        assert!(matches!(err, BatchError::UnbalancedLoop { line: 2, .. }));
    }

    #[test]
    fn unbalanced_detected_before_running() {
        let err = run_err("print a\nend\n", None);
        assert_eq!(err.to_string(), "test.yb:2: `end` without a matching `foreach`");
    }

    // -- Properties -----------------------------------------------------------

    #[test]
    fn properties_flow_into_commands() {
        let report = run("properties name=Alice\nprint hello ${LOCAL::name}\n", None);
        assert_eq!(report.output, ["hello Alice"]);
        assert_eq!(report.properties.get("name"), Some("Alice"));
        assert_eq!(report.commands, 1);
    }

    #[test]
    fn property_values_are_expanded() {
        let report = run("properties base=/srv\nproperties out=${LOCAL::base}/out\n", None);
        assert_eq!(report.properties.get("out"), Some("/srv/out"));
    }

    #[test]
    fn initial_properties_and_named_sets() {
        let mut named = NamedPropertySets::new();
        named.insert("GLOBAL", [("region", "eu-west-1")].into_iter().collect());
        let report = runner()
            .with_properties([("user", "ops")].into_iter().collect())
            .with_named(named)
            .run_str("t", "print ${LOCAL::user}@${GLOBAL::region}", None)
            .unwrap();
        assert_eq!(report.output, ["ops@eu-west-1"]);
    }

    // -- Commands -------------------------------------------------------------

    #[test]
    fn document_substituted_before_command() {
        let input = Node::mapping([("greeting", Node::scalar("hi ${LOCAL::name}"))]);
        let report = run("properties name=Bob\nmacro\n", Some(input));
        assert_eq!(
            report.document,
            Some(Node::mapping([("greeting", Node::scalar("hi Bob"))]))
        );
        assert_eq!(report.changes, 1);
    }

    #[test]
    fn select_replaces_document() {
        let input = Node::mapping([("a", Node::mapping([("b", Node::scalar("deep"))]))]);
        let report = run("select a.b\n", Some(input));
        assert_eq!(report.document, Some(Node::scalar("deep")));
    }

    #[test]
    fn unknown_command_reports_physical_line() {
        let err = run_err("# header\n\nfrobnicate now\n", None);
        assert_eq!(err.to_string(), "test.yb:3: unknown command `frobnicate`");
    }

    #[test]
    fn command_without_document() {
        let err = run_err("dump\n", None);
        assert!(matches!(err, BatchError::MissingInput { line: 1, .. }));
    }

    #[test]
    fn command_failure_is_wrapped() {
        let input = Node::mapping([("a", Node::Null)]);
        let err = run_err("select\n", Some(input));
        assert!(matches!(err, BatchError::Command { ref name, .. } if name == "select"));
    }

    #[test]
    fn unsupported_node_maps_to_exit_code() {
        let config = BatchConfig {
            scalars: ScalarPolicy::Preserve,
            ..BatchConfig::default()
        };
        let runner = BatchRunner::new(config, CommandRegistry::with_builtins()).unwrap();
        let err = runner
            .run_str("t", "macro\n", Some(Node::mapping([("on", Node::Bool(true))])))
            .unwrap_err();
        assert!(matches!(err, BatchError::Macro { line: 1, .. }));
        assert_eq!(err.exit_code(), EXIT_UNSUPPORTED_NODE);
    }

    #[test]
    fn custom_command() {
        let mut reg = CommandRegistry::with_builtins();
        reg.register_fn("wrap", |args: &[String], cx: &mut CommandContext<'_>| {
            let key = args.first().cloned().unwrap_or_else(|| "value".to_owned());
            let doc = cx.document.cloned().unwrap_or(Node::Null);
            Ok(Some(Node::mapping([(key, doc)])))
        });
        let runner = BatchRunner::new(BatchConfig::default(), reg).unwrap();
        let report = runner
            .run_str("t", "wrap outer\n", Some(Node::scalar("x")))
            .unwrap();
        assert_eq!(report.document, Some(Node::mapping([("outer", Node::scalar("x"))])));
    }

    // -- Memory slots ---------------------------------------------------------

    #[test]
    fn memory_slot_round_trip() {
        let input = Node::mapping([("a", Node::scalar("1")), ("b", Node::scalar("2"))]);
        let report = run("saveTo !orig\nselect a\nuseAsInput !orig\n", Some(input.clone()));
        assert_eq!(report.document, Some(input));
    }

    #[test]
    fn empty_memory_slot() {
        let err = run_err("useAsInput !nothing\n", None);
        assert_eq!(err.to_string(), "test.yb:1: memory slot `!nothing` is empty");
    }

    #[test]
    fn save_without_document() {
        let err = run_err("saveTo !x\n", None);
        assert!(matches!(err, BatchError::MissingInput { ref what, .. } if what == "saveTo"));
    }

    // -- foreach --------------------------------------------------------------

    #[test]
    fn foreach_over_sequence() {
        let input = Node::sequence([Node::scalar("a"), Node::scalar("b")]);
        let script = "foreach\nprint ${LOCAL::foreach.index}=${LOCAL::foreach.iteration.value}\nend\n";
        let report = run(script, Some(input.clone()));
        assert_eq!(report.output, ["0=a", "1=b"]);
        assert_eq!(report.document, Some(input));
        assert!(!report.properties.contains(FOREACH_INDEX));
    }

    #[test]
    fn foreach_over_mapping_uses_keys() {
        let input = Node::mapping([
            ("web", Node::mapping([("port", Node::scalar("80"))])),
            ("db", Node::mapping([("port", Node::scalar("5432"))])),
        ]);
        let report = run(
            "foreach\nselect port\nprint ${LOCAL::foreach.iteration.value}\nend\n",
            Some(input),
        );
        assert_eq!(report.output, ["web", "db"]);
        assert_eq!(
            report.document,
            Some(Node::sequence([Node::scalar("80"), Node::scalar("5432")]))
        );
    }

    #[test]
    fn foreach_substitutes_each_item() {
        let input = Node::sequence([
            Node::mapping([("name", Node::scalar("item-${LOCAL::foreach.index}"))]),
            Node::mapping([("name", Node::scalar("item-${LOCAL::foreach.index}"))]),
        ]);
        let report = run("foreach\nmacro\nend\n", Some(input));
        assert_eq!(
            report.document,
            Some(Node::sequence([
                Node::mapping([("name", Node::scalar("item-0"))]),
                Node::mapping([("name", Node::scalar("item-1"))]),
            ]))
        );
        assert_eq!(report.changes, 2);
    }

    #[test]
    fn foreach_over_scalar_runs_once() {
        let report = run("foreach\nprint ${LOCAL::foreach.iteration.value}\nend\n", Some(Node::scalar("solo")));
        assert_eq!(report.output, ["solo"]);
    }

    #[test]
    fn foreach_without_document_is_skipped() {
        let report = run("foreach\nprint never\nend\nprint after\n", None);
        assert_eq!(report.output, ["after"]);
        assert_eq!(report.document, None);
    }

    #[test]
    fn nested_foreach_restores_outer_index() {
        let input = Node::sequence([Node::scalar("x"), Node::scalar("y")]);
        let script = "\
saveTo !pair
foreach
useAsInput !pair
foreach
end
print outer=${LOCAL::foreach.index}
end
";
        let report = run(script, Some(input));
        assert_eq!(report.output, ["outer=0", "outer=1"]);
    }

    #[test]
    fn foreach_keyword_case_insensitive() {
        let input = Node::sequence([Node::scalar("a")]);
        let report = run("FOREACH\nprint ${LOCAL::foreach.iteration.value}\nEnd\n", Some(input));
        assert_eq!(report.output, ["a"]);
    }
}
