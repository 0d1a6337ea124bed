use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::debug;

use crate::error::PipelineError;

/// Invokes the build tool and returns its captured standard output.
///
/// Blank output maps to `Ok(None)`; a non-zero exit or a spawn failure is a
/// [`PipelineError::CommandExecution`].
pub trait CommandGateway: Send + Sync {
    fn execute(&self, args: &[String]) -> Result<Option<String>, PipelineError>;
}

/// Gateway that shells out to a Bazel binary inside a fixed workspace.
pub struct BazelCli {
    binary: PathBuf,
    workspace: PathBuf,
    startup_flags: Vec<String>,
    command_flags: Vec<String>,
}

impl BazelCli {
    pub fn new(binary: impl Into<PathBuf>, workspace: &Path) -> Self {
        Self {
            binary: binary.into(),
            workspace: workspace.to_path_buf(),
            startup_flags: Vec::new(),
            command_flags: Vec::new(),
        }
    }

    pub fn with_startup_flags(mut self, flags: Vec<String>) -> Self {
        self.startup_flags = flags;
        self
    }

    pub fn with_command_flags(mut self, flags: Vec<String>) -> Self {
        self.command_flags = flags;
        self
    }

    fn command_line(&self, args: &[String]) -> Vec<String> {
        self.startup_flags
            .iter()
            .chain(args)
            .chain(&self.command_flags)
            .cloned()
            .collect()
    }
}

impl CommandGateway for BazelCli {
    fn execute(&self, args: &[String]) -> Result<Option<String>, PipelineError> {
        let argv = self.command_line(args);
        let rendered = format!("{} {}", self.binary.display(), argv.join(" "));
        debug!(command = %rendered, "running build tool");

        let output = Command::new(&self.binary)
            .args(&argv)
            .current_dir(&self.workspace)
            .output()
            .map_err(|e| PipelineError::CommandExecution {
                command: rendered.clone(),
                reason: e.to_string(),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PipelineError::CommandExecution {
                command: rendered,
                reason: format!("{}: {}", output.status, stderr_tail(&stderr)),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if stdout.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(stdout))
    }
}

/// Last few non-empty stderr lines; Bazel prints progress noise before the error.
fn stderr_tail(stderr: &str) -> String {
    const TAIL_LINES: usize = 3;
    let lines: Vec<&str> = stderr.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(TAIL_LINES);
    lines[start..].join(" | ")
}

/// Substitute `item` for every `{}` placeholder in an argument template.
pub fn fill_template(template: &[String], item: &str) -> Vec<String> {
    template.iter().map(|arg| arg.replace("{}", item)).collect()
}

#[cfg(test)]
pub mod testing {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;

    /// In-memory gateway replaying canned responses keyed by the joined argument list.
    ///
    /// Unscripted commands fail like a non-zero exit would.
    #[derive(Default)]
    pub struct ScriptedGateway {
        responses: HashMap<String, Result<Option<String>, String>>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedGateway {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn respond(mut self, args: &[&str], stdout: &str) -> Self {
            self.responses
                .insert(args.join(" "), Ok(Some(stdout.to_string())));
            self
        }

        pub fn respond_empty(mut self, args: &[&str]) -> Self {
            self.responses.insert(args.join(" "), Ok(None));
            self
        }

        pub fn fail(mut self, args: &[&str]) -> Self {
            self.responses
                .insert(args.join(" "), Err("exit status: 2".to_string()));
            self
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        pub fn call_count(&self, args: &[&str]) -> usize {
            let key = args.join(" ");
            self.calls().iter().filter(|c| **c == key).count()
        }
    }

    impl CommandGateway for ScriptedGateway {
        fn execute(&self, args: &[String]) -> Result<Option<String>, PipelineError> {
            let key = args.join(" ");
            self.calls.lock().unwrap().push(key.clone());
            match self.responses.get(&key) {
                Some(Ok(out)) => Ok(out.clone()),
                Some(Err(reason)) => Err(PipelineError::CommandExecution {
                    command: key,
                    reason: reason.clone(),
                }),
                None => Err(PipelineError::CommandExecution {
                    command: key,
                    reason: "unscripted command".to_string(),
                }),
            }
        }
    }

    pub fn args(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }
}
