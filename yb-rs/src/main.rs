use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use yb::cli::CliArgs;
use yb::config::load_properties_file;
use yb::document::Documents;
use yb::error::{BatchError, DocumentError, ScriptError, EXIT_INVALID_PATTERN};
use yb::node::Node;
use yb::script::{BatchRunner, CommandRegistry, LineClassifier};
use yb::var::{NamedPropertySets, PropertySet};

/// Everything that can stop the binary.
#[derive(Debug, thiserror::Error)]
enum AppError {
    #[error(transparent)]
    Batch(#[from] BatchError),
    #[error(transparent)]
    Script(#[from] ScriptError),
    #[error("{}: {source}", .path.display())]
    Document {
        path: PathBuf,
        #[source]
        source: DocumentError,
    },
}

impl AppError {
    fn exit_code(&self) -> u8 {
        match self {
            AppError::Batch(e) => e.exit_code(),
            AppError::Script(ScriptError::InvalidPattern { .. }) => EXIT_INVALID_PATTERN,
            _ => 1,
        }
    }
}

fn main() -> ExitCode {
    let args = CliArgs::parse();
    init_tracing(&args);

    let result = if args.classify { classify(&args) } else { run(&args) };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("yb: {e}");
            ExitCode::from(e.exit_code())
        }
    }
}

fn init_tracing(args: &CliArgs) {
    let filter = EnvFilter::try_from_env("YB_LOG").unwrap_or_else(|_| EnvFilter::new(args.log_level()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

// ── --classify ────────────────────────────────────────────────────────────────

fn classify(args: &CliArgs) -> Result<(), AppError> {
    let mut lines = LineClassifier::new()?;
    lines.open(&args.script, !args.no_trim)?;
    while lines.advance().is_some() {
        let num = lines.line_num().unwrap_or_default();
        let text = lines.current().unwrap_or_default().to_owned();
        if let Some(directive) = lines.classify() {
            let label = directive.to_string();
            println!("{num:>4}  {label:<32}  {text}");
        }
    }
    Ok(())
}

// ── Run ───────────────────────────────────────────────────────────────────────

fn run(args: &CliArgs) -> Result<(), AppError> {
    let config = args.batch_config();
    let documents = Documents::new(config.scalars);

    let local: PropertySet = args.defines.iter().cloned().collect();
    let mut named = NamedPropertySets::new();
    for (name, file) in &args.property_files {
        let (set, errors) = load_properties_file(file)?;
        for e in errors {
            warn!(file = %file, "{e}");
        }
        named.insert(name.as_str(), set);
    }

    let input = match &args.input {
        Some(path) => Some(documents.read_file(path).map_err(|source| AppError::Document {
            path: path.clone(),
            source,
        })?),
        None => None,
    };

    let runner = BatchRunner::new(config, CommandRegistry::with_builtins())?
        .with_properties(local)
        .with_named(named);
    let report = runner.run_file(&args.script, input)?;

    for line in &report.output {
        println!("{line}");
    }
    if args.show_stats {
        eprintln!("# of changes made: {}", report.changes);
    }

    let Some(document) = &report.document else {
        return Ok(());
    };
    match &args.output {
        Some(path) => write_document(&documents, path, document),
        None => {
            let text = documents.dump(document).map_err(|source| AppError::Document {
                path: PathBuf::from("<stdout>"),
                source,
            })?;
            print!("{text}");
            Ok(())
        }
    }
}

fn write_document(documents: &Documents, path: &Path, document: &Node) -> Result<(), AppError> {
    documents.write_file(path, document).map_err(|source| AppError::Document {
        path: path.to_owned(),
        source,
    })
}
