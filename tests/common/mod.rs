use std::path::PathBuf;
use std::process::{Command, Output};
use std::sync::atomic::{AtomicUsize, Ordering};

use swiftlet::core::session::{CompilationSession, CompilerOptions};

static TEST_COUNTER: AtomicUsize = AtomicUsize::new(0);

#[allow(dead_code)]
pub(crate) fn session() -> CompilationSession {
    CompilationSession::new(CompilerOptions::default()).expect("prelude loads")
}

/// Writes `source` to a fresh temp file and runs the CLI on it.
#[allow(dead_code)]
pub(crate) fn run_cli(name: &str, source: &str, args: &[&str]) -> Output {
    let run_id = TEST_COUNTER.fetch_add(1, Ordering::Relaxed);
    let temp_dir = std::env::temp_dir().join(format!(
        "swiftlet_cli_test_{}_{}_{}",
        name,
        std::process::id(),
        run_id
    ));
    std::fs::create_dir_all(&temp_dir).expect("failed to create temp dir");
    let source_path: PathBuf = temp_dir.join(format!("{name}.swift"));
    std::fs::write(&source_path, source).expect("failed to write temp source");

    let output = Command::new(env!("CARGO_BIN_EXE_swiftlet"))
        .args(args)
        .arg(&source_path)
        .env_remove("RUST_LOG")
        .env_remove("SWIFTLET_LOG_LEVEL")
        .output()
        .expect("failed to run swiftlet");
    let _ = std::fs::remove_dir_all(&temp_dir);
    output
}

#[allow(dead_code)]
pub(crate) fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[allow(dead_code)]
pub(crate) fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}
