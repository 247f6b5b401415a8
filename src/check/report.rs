//! Timestamped diagnostic report files.

use chrono::Local;
use std::path::{Path, PathBuf};

const RULE_WIDTH: usize = 78;

/// Writer for operator-facing diagnostic reports.
///
/// Reports land in `<dir>/<crate>_<pattern>_<date>_<pid>_<NNNN>.txt`, where
/// `NNNN` is the first counter value that does not collide with an
/// existing file.
#[derive(Debug, Clone)]
pub struct DiagnosticReport {
    dir: PathBuf,
    pattern: String,
    interpreter: Option<String>,
}

impl DiagnosticReport {
    /// Create a report writer for `dir`, naming files with `pattern`.
    pub fn new(dir: impl Into<PathBuf>, pattern: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            pattern: pattern.into(),
            interpreter: None,
        }
    }

    /// Record which interpreter was used, for the report header.
    pub fn with_interpreter(mut self, interpreter: Option<String>) -> Self {
        self.interpreter = interpreter;
        self
    }

    /// Header block written before every message.
    pub fn header(&self) -> String {
        let rule = "-".repeat(RULE_WIDTH);
        let mut lines = vec![
            rule.clone(),
            format!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")),
            format!("date: {}", Local::now().format("%Y/%m/%d %H:%M:%S")),
            format!("os: {} {}", std::env::consts::OS, std::env::consts::ARCH),
        ];
        if let Some(interpreter) = &self.interpreter {
            lines.push(format!("python: {interpreter}"));
        }
        lines.push(rule);
        lines.join("\n")
    }

    /// Write `message` under a fresh header and return the file path.
    pub async fn write(&self, message: &str) -> std::io::Result<PathBuf> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = next_free_path(&self.dir, &self.pattern);
        let content = format!("{}\n\n{}\n", self.header(), message);
        tokio::fs::write(&path, content).await?;
        Ok(path)
    }
}

fn next_free_path(dir: &Path, pattern: &str) -> PathBuf {
    let stem = format!(
        "{}_{}_{}_{}",
        env!("CARGO_PKG_NAME"),
        pattern,
        Local::now().format("%Y-%m-%d"),
        std::process::id()
    );
    let mut counter = 1u32;
    loop {
        let candidate = dir.join(format!("{stem}_{counter:04}.txt"));
        if !candidate.exists() {
            return candidate;
        }
        counter += 1;
    }
}
