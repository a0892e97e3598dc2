//! Command-line argument parsing.
//!
//! Usage:
//!   yb [OPTIONS] <SCRIPT>
//!   yb --classify [--no-trim] <SCRIPT>

use std::path::PathBuf;

use clap::{ArgAction, Parser};

use crate::config::BatchConfig;
use crate::document::ScalarPolicy;
use crate::expand::DEFAULT_LOCAL_NAMESPACE;

// ── Public types ──────────────────────────────────────────────────────────────

/// Run a YAML batch script.
#[derive(Debug, Parser)]
#[command(name = "yb", version, about)]
pub struct CliArgs {
    /// Batch script to run.
    pub script: PathBuf,

    /// YAML file used as the initial document.
    #[arg(short, long, value_name = "FILE")]
    pub input: Option<PathBuf>,

    /// Write the final document here instead of stdout.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Set a local property before the script starts (repeatable).
    #[arg(short = 'D', long = "define", value_name = "KEY=VALUE", value_parser = parse_pair)]
    pub defines: Vec<(String, String)>,

    /// Load a properties file as the named set NAME (repeatable).
    #[arg(short = 'P', long = "properties", value_name = "NAME=FILE", value_parser = parse_pair)]
    pub property_files: Vec<(String, String)>,

    /// Keep leading/trailing whitespace on script lines.
    #[arg(long)]
    pub no_trim: bool,

    /// Read numbers and booleans as typed values instead of text.
    #[arg(long)]
    pub preserve_scalars: bool,

    /// Namespace of markers resolved against local properties.
    #[arg(long, value_name = "NS", default_value = DEFAULT_LOCAL_NAMESPACE)]
    pub namespace: String,

    /// Deepest allowed `batch` nesting.
    #[arg(long, value_name = "N", default_value_t = 16)]
    pub max_depth: usize,

    /// Print each cleaned script line with its directive instead of running.
    #[arg(long)]
    pub classify: bool,

    /// Report how many keys and scalars substitution changed.
    #[arg(long)]
    pub show_stats: bool,

    /// More log output (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count, conflicts_with = "quiet")]
    pub verbose: u8,

    /// Only log errors.
    #[arg(short, long)]
    pub quiet: bool,
}

impl CliArgs {
    /// Parse a slice of argument strings (exposed for testing).
    pub fn parse_argv<I, T>(argv: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        Self::try_parse_from(argv)
    }

    /// Runner settings selected by the flags.
    pub fn batch_config(&self) -> BatchConfig {
        BatchConfig {
            trim_whitespace: !self.no_trim,
            max_depth: self.max_depth,
            local_namespace: self.namespace.clone(),
            scalars: if self.preserve_scalars {
                ScalarPolicy::Preserve
            } else {
                ScalarPolicy::Stringify
            },
            show_stats: self.show_stats,
        }
    }

    /// Log level used when `YB_LOG` is not set.
    pub fn log_level(&self) -> &'static str {
        if self.quiet {
            return "error";
        }
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }
}

/// Parse `KEY=VALUE`.
fn parse_pair(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((k, v)) if !k.trim().is_empty() => Ok((k.trim().to_owned(), v.to_owned())),
        _ => Err(format!("expected KEY=VALUE, got `{s}`")),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> CliArgs {
        CliArgs::parse_argv(std::iter::once("yb").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn script_only() {
        let a = parse(&["run.yb"]);
        assert_eq!(a.script, PathBuf::from("run.yb"));
        assert!(a.input.is_none());
        assert!(!a.classify);
        assert_eq!(a.batch_config(), BatchConfig::default());
        assert_eq!(a.log_level(), "warn");
    }

    #[test]
    fn missing_script_is_error() {
        assert!(CliArgs::parse_argv(["yb"]).is_err());
    }

    #[test]
    fn input_and_output() {
        let a = parse(&["-i", "in.yaml", "--output", "out.yaml", "run.yb"]);
        assert_eq!(a.input, Some(PathBuf::from("in.yaml")));
        assert_eq!(a.output, Some(PathBuf::from("out.yaml")));
    }

    #[test]
    fn repeated_defines() {
        let a = parse(&["-D", "name=Alice", "--define", "url=http://x?a=b", "run.yb"]);
        assert_eq!(
            a.defines,
            [
                ("name".to_owned(), "Alice".to_owned()),
                ("url".to_owned(), "http://x?a=b".to_owned()),
            ]
        );
    }

    #[test]
    fn bad_define_is_error() {
        assert!(CliArgs::parse_argv(["yb", "-D", "novalue", "run.yb"]).is_err());
        assert!(CliArgs::parse_argv(["yb", "-D", "=x", "run.yb"]).is_err());
    }

    #[test]
    fn named_property_files() {
        let a = parse(&["-P", "GLOBAL=global.properties", "run.yb"]);
        assert_eq!(a.property_files, [("GLOBAL".to_owned(), "global.properties".to_owned())]);
    }

    #[test]
    fn config_flags() {
        let a = parse(&[
            "--no-trim",
            "--preserve-scalars",
            "--namespace",
            "ASUX",
            "--max-depth",
            "3",
            "--show-stats",
            "run.yb",
        ]);
        let c = a.batch_config();
        assert!(!c.trim_whitespace);
        assert_eq!(c.scalars, ScalarPolicy::Preserve);
        assert_eq!(c.local_namespace, "ASUX");
        assert_eq!(c.max_depth, 3);
        assert!(c.show_stats);
    }

    #[test]
    fn verbosity_levels() {
        assert_eq!(parse(&["-v", "s"]).log_level(), "info");
        assert_eq!(parse(&["-vv", "s"]).log_level(), "debug");
        assert_eq!(parse(&["-vvvv", "s"]).log_level(), "trace");
        assert_eq!(parse(&["-q", "s"]).log_level(), "error");
    }

    #[test]
    fn verbose_conflicts_with_quiet() {
        assert!(CliArgs::parse_argv(["yb", "-v", "-q", "s"]).is_err());
    }
}
