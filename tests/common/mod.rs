//! Test doubles shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use feature_installer::{CommandOutput, CommandRunner, ProcessError, Transport, TransportError};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

/// Answers commands containing a pattern with a fixed output; the longest
/// pattern wins and unmatched commands succeed silently.
#[derive(Default)]
pub struct FakeRunner {
    rules: Vec<(String, CommandOutput)>,
    missing: HashSet<String>,
    calls: Mutex<Vec<String>>,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(mut self, pattern: &str, output: CommandOutput) -> Self {
        self.rules.push((pattern.to_string(), output));
        self
    }

    pub fn missing(mut self, program: &str) -> Self {
        self.missing.insert(program.to_string());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count_matching(&self, pattern: &str) -> usize {
        self.calls().iter().filter(|c| c.contains(pattern)).count()
    }

    fn program(command: &str) -> &str {
        command.split_whitespace().next().unwrap_or_default()
    }
}

#[async_trait]
impl CommandRunner for FakeRunner {
    async fn probe(&self, command: &str) -> bool {
        !self.missing.contains(Self::program(command))
    }

    async fn run(&self, command: &str, _timeout: Option<Duration>) -> Result<CommandOutput, ProcessError> {
        self.calls.lock().unwrap().push(command.to_string());
        if self.missing.contains(Self::program(command)) {
            return Err(ProcessError::Spawn {
                command: command.to_string(),
                message: "No such file or directory".to_string(),
            });
        }
        Ok(self
            .rules
            .iter()
            .filter(|(pattern, _)| command.contains(pattern.as_str()))
            .max_by_key(|(pattern, _)| pattern.len())
            .map(|(_, output)| output.clone())
            .unwrap_or_else(|| ok("")))
    }
}

pub fn ok(stdout: &str) -> CommandOutput {
    CommandOutput::new(stdout, "", Some(0))
}

pub fn fail(stderr: &str) -> CommandOutput {
    CommandOutput::new("", stderr, Some(1))
}

/// Serves fixed bytes for every URL, or always fails.
pub struct StaticTransport {
    pub body: Option<Vec<u8>>,
    pub urls: Mutex<Vec<String>>,
}

impl StaticTransport {
    pub fn serving(body: Vec<u8>) -> Self {
        Self {
            body: Some(body),
            urls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            body: None,
            urls: Mutex::new(Vec::new()),
        }
    }

    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for StaticTransport {
    fn name(&self) -> &str {
        "static"
    }

    async fn fetch(&self, url: &str, dest: &Path) -> Result<u64, TransportError> {
        self.urls.lock().unwrap().push(url.to_string());
        match &self.body {
            Some(body) => {
                std::fs::write(dest, body).map_err(|source| TransportError::Io {
                    path: dest.to_path_buf(),
                    source,
                })?;
                Ok(body.len() as u64)
            }
            None => Err(TransportError::Status {
                url: url.to_string(),
                status: 404,
            }),
        }
    }
}

/// A tar archive holding one file.
pub fn tar_with(name: &str, content: &[u8]) -> Vec<u8> {
    let mut builder = tar::Builder::new(Vec::new());
    let mut header = tar::Header::new_gnu();
    header.set_size(content.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();
    builder.append_data(&mut header, name, content).unwrap();
    builder.into_inner().unwrap()
}
