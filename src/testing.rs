//! Scripted command runner shared by unit tests.

use crate::process::{split_command, CommandOutput, CommandRunner, ProcessError};
use async_trait::async_trait;
use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

/// Replays canned outputs for command lines containing a given pattern.
///
/// The longest matching pattern wins. Each pattern holds a queue: outputs
/// are consumed in order and the last one repeats. Commands that match no
/// pattern succeed with empty output.
#[derive(Default)]
pub(crate) struct ScriptedRunner {
    rules: Mutex<Vec<(String, VecDeque<CommandOutput>)>>,
    missing: HashSet<String>,
    builtins: HashSet<String>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedRunner {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn on(self, pattern: &str, output: CommandOutput) -> Self {
        {
            let mut rules = self.rules.lock().unwrap();
            match rules.iter_mut().find(|(p, _)| p == pattern) {
                Some((_, queue)) => queue.push_back(output),
                None => rules.push((pattern.to_string(), VecDeque::from([output]))),
            }
        }
        self
    }

    pub(crate) fn missing(mut self, program: &str) -> Self {
        self.missing.insert(program.to_string());
        self
    }

    /// Make `program` fail the probe while lines using it still run, like
    /// a shell builtin.
    pub(crate) fn builtin(mut self, program: &str) -> Self {
        self.builtins.insert(program.to_string());
        self
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn count_matching(&self, pattern: &str) -> usize {
        self.calls().iter().filter(|c| c.contains(pattern)).count()
    }
}

pub(crate) fn ok(stdout: &str) -> CommandOutput {
    CommandOutput::new(stdout, "", Some(0))
}

pub(crate) fn fail(stderr: &str) -> CommandOutput {
    CommandOutput::new("", stderr, Some(1))
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn probe(&self, command: &str) -> bool {
        match split_command(command) {
            Ok(words) => !self.missing.contains(&words[0]) && !self.builtins.contains(&words[0]),
            Err(_) => false,
        }
    }

    async fn run(&self, command: &str, _timeout: Option<Duration>) -> Result<CommandOutput, ProcessError> {
        self.calls.lock().unwrap().push(command.to_string());

        let program = split_command(command)?.remove(0);
        if self.missing.contains(&program) {
            return Err(ProcessError::Spawn {
                command: command.to_string(),
                message: "No such file or directory".to_string(),
            });
        }

        let mut rules = self.rules.lock().unwrap();
        let rule = rules
            .iter_mut()
            .filter(|(pattern, _)| command.contains(pattern.as_str()))
            .max_by_key(|(pattern, _)| pattern.len());

        Ok(match rule {
            Some((_, queue)) if queue.len() > 1 => queue.pop_front().unwrap_or_default(),
            Some((_, queue)) => queue.front().cloned().unwrap_or_default(),
            None => ok(""),
        })
    }
}
