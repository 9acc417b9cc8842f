//! Scripted git runner for tests.

use super::GitRunner;
use anyhow::Result;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

/// Answers git commands from a script keyed by the joined argument list.
/// Unscripted commands succeed with empty stdout. Every call is recorded.
#[derive(Default)]
pub struct FakeGit {
    script: Mutex<HashMap<String, std::result::Result<String, String>>>,
    calls: Mutex<Vec<String>>,
}

impl FakeGit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(self, args: &str, stdout: &str) -> Self {
        self.set(args, stdout);
        self
    }

    pub fn failing(self, args: &str, stderr: &str) -> Self {
        self.script
            .lock()
            .unwrap()
            .insert(args.to_string(), Err(stderr.to_string()));
        self
    }

    /// Replace a scripted response mid-test (e.g. after a simulated edit)
    pub fn set(&self, args: &str, stdout: &str) {
        self.script
            .lock()
            .unwrap()
            .insert(args.to_string(), Ok(stdout.to_string()));
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn was_called(&self, args: &str) -> bool {
        self.calls.lock().unwrap().iter().any(|c| c == args)
    }
}

impl GitRunner for FakeGit {
    fn run(&self, _repo: &Path, args: &[&str]) -> Result<String> {
        let key = args.join(" ");
        self.calls.lock().unwrap().push(key.clone());
        match self.script.lock().unwrap().get(&key) {
            Some(Ok(stdout)) => Ok(stdout.clone()),
            Some(Err(stderr)) => anyhow::bail!("git {} failed: {}", key, stderr),
            None => Ok(String::new()),
        }
    }
}
