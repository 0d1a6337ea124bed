use thiserror::Error;

use crate::models::DependencySource;

/// Failures raised while building or running an extraction pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The build tool exited non-zero or could not be launched.
    #[error("command `{command}` failed: {reason}")]
    CommandExecution { command: String, reason: String },

    /// Tool output did not match the expected grammar.
    #[error("failed to parse {what}: {reason}")]
    Parse { what: &'static str, reason: String },

    /// No pipeline is wired for the requested source.
    #[error("no pipeline registered for dependency source `{0}`")]
    Configuration(DependencySource),

    /// A step pattern failed to compile while the pipeline was being built.
    #[error("invalid step pattern: {0}")]
    InvalidPattern(#[from] regex::Error),
}

/// Stderr fragments Bazel prints when a query names an undeclared external repository.
const MISSING_REPOSITORY_MARKERS: [&str; 4] = [
    "no such repository",
    "unknown repo",
    "no repository visible as",
    "is not defined",
];

impl PipelineError {
    pub fn parse(what: &'static str, reason: impl ToString) -> Self {
        PipelineError::Parse {
            what,
            reason: reason.to_string(),
        }
    }

    /// Failures the dispatch pipeline treats as a reason to try the legacy scheme.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            PipelineError::CommandExecution { .. } | PipelineError::Parse { .. }
        )
    }

    /// The command failed because the queried repository is not declared
    /// (e.g. `@maven` in a workspace without rules_jvm_external).
    pub fn is_missing_repository(&self) -> bool {
        match self {
            PipelineError::CommandExecution { reason, .. } => {
                let reason = reason.to_lowercase();
                MISSING_REPOSITORY_MARKERS
                    .iter()
                    .any(|marker| reason.contains(marker))
            }
            _ => false,
        }
    }
}
