//! Run the `yb` binary and check its stdout, stderr and exit status.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

// ── Helpers ───────────────────────────────────────────────────────────────────

/// Path to the `yb` binary built by this Cargo workspace.
fn yb_binary() -> PathBuf {
    // CARGO_BIN_EXE_yb is set by cargo test infrastructure.
    PathBuf::from(env!("CARGO_BIN_EXE_yb"))
}

fn run_yb(args: &[&str]) -> Output {
    Command::new(yb_binary())
        .args(args)
        .env_remove("YB_LOG")
        .output()
        .expect("failed to spawn yb binary")
}

fn stdout(out: &Output) -> String {
    String::from_utf8_lossy(&out.stdout).into_owned()
}

fn stderr(out: &Output) -> String {
    String::from_utf8_lossy(&out.stderr).into_owned()
}

fn write(dir: &Path, name: &str, text: &str) -> String {
    let path = dir.join(name);
    std::fs::write(&path, text).unwrap();
    path.display().to_string()
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[test]
fn prints_output_then_document() {
    let dir = tempfile::tempdir().unwrap();
    let input = write(dir.path(), "in.yaml", "greeting: hello ${LOCAL::who}\n");
    let script = write(dir.path(), "s.yb", "print start\nmacro\n");
    let out = run_yb(&["-i", &input, "-D", "who=world", &script]);
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    assert_eq!(stdout(&out), "start\ngreeting: hello world\n");
}

#[test]
fn output_file() {
    let dir = tempfile::tempdir().unwrap();
    let input = write(dir.path(), "in.yaml", "a: ${GLOBAL::region}\n");
    let props = write(dir.path(), "global.properties", "# shared\nregion=us-east-1\n");
    let script = write(dir.path(), "s.yb", "macro\n");
    let dest = dir.path().join("out.yaml");
    let named = format!("GLOBAL={props}");
    let out = run_yb(&["-i", &input, "-P", &named, "-o", &dest.display().to_string(), &script]);
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    assert_eq!(stdout(&out), "");
    assert_eq!(std::fs::read_to_string(&dest).unwrap(), "a: us-east-1\n");
}

#[test]
fn show_stats_reports_changes() {
    let dir = tempfile::tempdir().unwrap();
    let input = write(dir.path(), "in.yaml", "a: ${LOCAL::x}\nb: ${LOCAL::x}\n");
    let script = write(dir.path(), "s.yb", "properties x=1\nmacro\n");
    let out = run_yb(&["--show-stats", "-i", &input, &script]);
    assert!(out.status.success());
    assert!(stdout(&out).starts_with("# of changes made: 2\n"));
    assert!(stderr(&out).contains("# of changes made: 2"));
}

#[test]
fn classify_mode() {
    let dir = tempfile::tempdir().unwrap();
    let script = write(
        dir.path(),
        "s.yb",
        "# header\nproperties a=b\nforeach\n  print x # note\nEND\n",
    );
    let out = run_yb(&["--classify", &script]);
    assert!(out.status.success());
    let text = stdout(&out);
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 4);
    assert!(lines[0].starts_with("   2  PropertyAssignment[a=b]"));
    assert!(lines[1].contains("ForEachBegin"));
    assert!(lines[2].contains("Command[print]") && lines[2].ends_with("print x"));
    assert!(lines[3].starts_with("   5  ForEachEnd"));
}

#[test]
fn unknown_command_exit_status() {
    let dir = tempfile::tempdir().unwrap();
    let script = write(dir.path(), "s.yb", "frobnicate\n");
    let out = run_yb(&[&script]);
    assert_eq!(out.status.code(), Some(1));
    assert!(stderr(&out).contains("unknown command `frobnicate`"));
}

#[test]
fn unsupported_node_exit_status() {
    let dir = tempfile::tempdir().unwrap();
    let input = write(dir.path(), "in.yaml", "replicas: 3\n");
    let script = write(dir.path(), "s.yb", "macro\n");
    let out = run_yb(&["--preserve-scalars", "-i", &input, &script]);
    assert_eq!(out.status.code(), Some(93));
    assert!(stderr(&out).contains("unsupported node kind `number` at /replicas"));
}

#[test]
fn nested_sequence_exit_status() {
    let dir = tempfile::tempdir().unwrap();
    let input = write(dir.path(), "in.yaml", "matrix:\n  - [1, 2]\n");
    let script = write(dir.path(), "s.yb", "macro\n");
    let out = run_yb(&["-i", &input, &script]);
    assert_eq!(out.status.code(), Some(92));
}

#[test]
fn missing_script_exit_status() {
    let out = run_yb(&["/no/such/script.yb"]);
    assert_eq!(out.status.code(), Some(1));
    assert!(stderr(&out).contains("cannot open script"));
}

#[test]
fn bad_arguments_rejected() {
    let out = run_yb(&["-D", "novalue", "s.yb"]);
    assert!(!out.status.success());
}
