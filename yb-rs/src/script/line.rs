//! Script line loading and classification.
//!
//! A [`LineClassifier`] reads a whole script up front, drops blank and
//! comment lines, strips trailing comments, and then walks the surviving
//! lines with a forward-only cursor.  For the line under the cursor it
//! answers "which directive is this?" exactly once and caches the answer
//! until the cursor moves.
//!
//! ## Comments
//!
//! | Line shape                   | Result                         |
//! |------------------------------|--------------------------------|
//! | blank / whitespace only      | dropped                        |
//! | starts with `#`, `//`, `--`  | dropped                        |
//! | `text # note`, `text // note`| truncated to `text`            |
//!
//! Comment stripping is purely textual.  A `#` or `//` inside a quoted
//! value (or a URL such as `http://host`) starts a comment too.

use std::path::Path;

use aho_corasick::{AhoCorasick, AhoCorasickBuilder, MatchKind};
use regex::Regex;
use tracing::{debug, trace};

use crate::error::ScriptError;
use super::directive::Directive;

// ── ScriptLine ────────────────────────────────────────────────────────────────

/// One cleaned, non-empty script line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptLine {
    pub text: String,
    /// 1-based physical line number in the source.
    pub line_num: usize,
}

/// Lifecycle of a [`LineClassifier`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassifierState {
    /// No source loaded yet (or [`LineClassifier::reset`] was called).
    Unopened,
    /// A source is loaded; the cursor has lines left or has not moved yet.
    Ready,
    /// [`LineClassifier::advance`] ran past the last line.
    Exhausted,
}

// ── Patterns ──────────────────────────────────────────────────────────────────

struct Patterns {
    property: Regex,
    save_to: Regex,
    use_as_input: Regex,
    batch: Regex,
}

impl Patterns {
    fn compile() -> Result<Self, ScriptError> {
        Ok(Self {
            property: compile_regex("properties", r"^\s*properties\s+([a-zA-Z][a-zA-Z0-9]*)=(\S+)\s*$")?,
            save_to: compile_regex("saveTo", r"^\s*saveTo\s+(\S(?:.*\S)?)\s*$")?,
            use_as_input: compile_regex("useAsInput", r"^\s*useAsInput\s+(\S(?:.*\S)?)\s*$")?,
            batch: compile_regex("batch", r"^\s*batch\s+(\S(?:.*\S)?)\s*$")?,
        })
    }
}

fn compile_regex(name: &'static str, src: &str) -> Result<Regex, ScriptError> {
    Regex::new(src).map_err(|source| ScriptError::InvalidPattern { name, source })
}

// ── LineClassifier ────────────────────────────────────────────────────────────

/// Loads a script and classifies its lines one at a time.
pub struct LineClassifier {
    patterns: Patterns,
    comments: AhoCorasick,
    source: Option<String>,
    lines: Vec<ScriptLine>,
    /// Index of the line the next [`advance`](Self::advance) will move to.
    next: usize,
    /// Index of the line under the cursor.
    current: Option<usize>,
    state: ClassifierState,
    /// Classification of the current line, computed on first query.
    cached: Option<Directive>,
}

impl std::fmt::Debug for LineClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LineClassifier")
            .field("source", &self.source)
            .field("lines", &self.lines.len())
            .field("current", &self.current)
            .field("state", &self.state)
            .finish()
    }
}

impl LineClassifier {
    /// Build a classifier, compiling its built-in line patterns.
    pub fn new() -> Result<Self, ScriptError> {
        Ok(Self {
            patterns: Patterns::compile()?,
            comments: AhoCorasickBuilder::new()
                .match_kind(MatchKind::LeftmostFirst)
                .build(["#", "//"]),
            source: None,
            lines: Vec::new(),
            next: 0,
            current: None,
            state: ClassifierState::Unopened,
            cached: None,
        })
    }

    /// Read and clean the script at `path`.
    ///
    /// `trim` removes leading and trailing whitespace from every kept line.
    /// Turn it off for sources whose indentation matters (embedded YAML).
    pub fn open(&mut self, path: impl AsRef<Path>, trim: bool) -> Result<(), ScriptError> {
        let path = path.as_ref();
        self.reset();
        let text = std::fs::read_to_string(path).map_err(|source| ScriptError::Open {
            path: path.to_owned(),
            source,
        })?;
        debug!(path = %path.display(), "opened script");
        self.load_str(path.display().to_string(), &text, trim);
        Ok(())
    }

    /// Clean `text` as if it had been read from a file called `name`.
    pub fn load_str(&mut self, name: impl Into<String>, text: &str, trim: bool) {
        self.reset();
        self.source = Some(name.into());
        for (i, raw) in text.lines().enumerate() {
            match self.clean(raw, trim) {
                Some(text) => {
                    trace!(line = i + 1, %text, "kept");
                    self.lines.push(ScriptLine { text, line_num: i + 1 });
                }
                None => trace!(line = i + 1, raw, "dropped"),
            }
        }
        self.state = ClassifierState::Ready;
    }

    /// Apply the comment rules to one physical line.
    fn clean(&self, raw: &str, trim: bool) -> Option<String> {
        let lead = raw.trim();
        if lead.is_empty() || lead.starts_with('#') || lead.starts_with("//") || lead.starts_with("--") {
            return None;
        }
        let mut line = raw;
        if let Some(m) = self.comments.find(line) {
            // Whitespace in front of the marker belongs to the comment.
            line = line[..m.start()].trim_end();
            if line.trim().is_empty() {
                return None;
            }
        }
        Some(if trim { line.trim() } else { line }.to_owned())
    }

    /// Forget the loaded source.
    pub fn reset(&mut self) {
        self.source = None;
        self.lines.clear();
        self.next = 0;
        self.current = None;
        self.cached = None;
        self.state = ClassifierState::Unopened;
    }

    /// Move the cursor back before the first line.
    pub fn rewind(&mut self) {
        self.next = 0;
        self.current = None;
        self.cached = None;
        if self.state == ClassifierState::Exhausted {
            self.state = ClassifierState::Ready;
        }
    }

    // ── Cursor ────────────────────────────────────────────────────────────────

    pub fn has_next(&self) -> bool {
        self.next < self.lines.len()
    }

    /// Move to the next line and return it, or `None` once exhausted.
    pub fn advance(&mut self) -> Option<&str> {
        self.cached = None;
        if self.has_next() {
            self.current = Some(self.next);
            self.next += 1;
        } else {
            self.current = None;
            if self.state != ClassifierState::Unopened {
                self.state = ClassifierState::Exhausted;
            }
        }
        self.current()
    }

    /// The line under the cursor; `None` before the first advance and after
    /// the last.
    pub fn current(&self) -> Option<&str> {
        self.current_line().map(|l| l.text.as_str())
    }

    pub fn current_line(&self) -> Option<&ScriptLine> {
        self.current.and_then(|i| self.lines.get(i))
    }

    /// 1-based source line number of the current line.
    pub fn line_num(&self) -> Option<usize> {
        self.current_line().map(|l| l.line_num)
    }

    /// Name of the loaded source (the path for [`open`](Self::open)).
    pub fn source_name(&self) -> Option<&str> {
        self.source.as_deref()
    }

    pub fn state(&self) -> ClassifierState {
        self.state
    }

    /// All cleaned lines, in order.
    pub fn lines(&self) -> &[ScriptLine] {
        &self.lines
    }

    // ── Classification ────────────────────────────────────────────────────────

    /// Directive of the current line, computed once per line.
    pub fn classify(&mut self) -> Option<&Directive> {
        if self.cached.is_none() {
            let line = self.current()?;
            let directive = self.compute(line);
            debug!(line = ?self.line_num(), %directive, "classified");
            self.cached = Some(directive);
        }
        self.cached.as_ref()
    }

    /// Checks run in a fixed order and the first hit wins, so exactly one
    /// directive applies to any line.
    fn compute(&self, line: &str) -> Directive {
        let p = &self.patterns;
        if let Some(c) = p.property.captures(line) {
            return Directive::PropertyAssignment {
                key: c[1].to_owned(),
                value: c[2].to_owned(),
            };
        }
        if let Some(c) = p.save_to.captures(line) {
            return Directive::SaveTo { path: c[1].to_owned() };
        }
        if let Some(c) = p.use_as_input.captures(line) {
            return Directive::UseAsInput { path: c[1].to_owned() };
        }
        if let Some(c) = p.batch.captures(line) {
            return Directive::SubBatch { path: c[1].to_owned() };
        }
        let word = line.trim();
        if word.eq_ignore_ascii_case("foreach") {
            return Directive::ForEachBegin;
        }
        if word.eq_ignore_ascii_case("end") {
            return Directive::ForEachEnd;
        }
        Directive::PlainCommand {
            name: word.split_whitespace().next().unwrap_or_default().to_owned(),
        }
    }

    /// `(key, value)` if the current line is `properties key=value`.
    pub fn property_line(&mut self) -> Option<(String, String)> {
        match self.classify()? {
            Directive::PropertyAssignment { key, value } => Some((key.clone(), value.clone())),
            _ => None,
        }
    }

    /// Argument of a `saveTo` line.
    pub fn save_to(&mut self) -> Option<String> {
        match self.classify()? {
            Directive::SaveTo { path } => Some(path.clone()),
            _ => None,
        }
    }

    /// Argument of a `useAsInput` line.
    pub fn use_as_input(&mut self) -> Option<String> {
        match self.classify()? {
            Directive::UseAsInput { path } => Some(path.clone()),
            _ => None,
        }
    }

    /// Argument of a `batch` line.
    pub fn sub_batch(&mut self) -> Option<String> {
        match self.classify()? {
            Directive::SubBatch { path } => Some(path.clone()),
            _ => None,
        }
    }

    pub fn is_foreach_begin(&mut self) -> bool {
        matches!(self.classify(), Some(Directive::ForEachBegin))
    }

    pub fn is_foreach_end(&mut self) -> bool {
        matches!(self.classify(), Some(Directive::ForEachEnd))
    }

    /// Command name of the current line, or `None` if the line is one of
    /// the built-in directives (or there is no line).
    pub fn command(&mut self) -> Option<String> {
        match self.classify()? {
            Directive::PlainCommand { name } if !name.is_empty() => Some(name.clone()),
            _ => None,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
