//! Bzlmod-first pipeline with WORKSPACE fallback.

use tracing::{info, warn};

use crate::error::PipelineError;
use crate::models::{CapabilityMode, Dependency};

use super::Pipeline;

/// Runs the Bzlmod pipeline first and falls back to the WORKSPACE pipeline.
///
/// Capability only says the build graph *can* use Bzlmod, not that a given
/// source's dependencies live there, so an empty primary result is a
/// fallback trigger just like a command or parse failure.
pub struct DispatchPipeline {
    primary: Box<dyn Pipeline>,
    secondary: Box<dyn Pipeline>,
    mode: CapabilityMode,
}

impl DispatchPipeline {
    pub fn new(
        primary: Box<dyn Pipeline>,
        secondary: Box<dyn Pipeline>,
        mode: CapabilityMode,
    ) -> Self {
        Self {
            primary,
            secondary,
            mode,
        }
    }
}

impl Pipeline for DispatchPipeline {
    fn run(&self) -> Result<Vec<Dependency>, PipelineError> {
        if self.mode == CapabilityMode::LegacyOnly {
            return self.secondary.run();
        }

        match self.primary.run() {
            Ok(deps) if !deps.is_empty() => return Ok(deps),
            Ok(_) => info!(mode = %self.mode, "module pipeline found nothing, trying WORKSPACE"),
            Err(err) if err.is_recoverable() => {
                warn!(mode = %self.mode, error = %err, "module pipeline failed, trying WORKSPACE")
            }
            Err(err) => return Err(err),
        }

        self.secondary.run()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;
    use crate::models::Forge;

    enum Outcome {
        Deps(Vec<Dependency>),
        CommandFailure,
        ParseFailure,
    }

    struct StubPipeline {
        outcome: Outcome,
        runs: Arc<AtomicUsize>,
    }

    impl StubPipeline {
        fn boxed(outcome: Outcome) -> (Box<dyn Pipeline>, Arc<AtomicUsize>) {
            let runs = Arc::new(AtomicUsize::new(0));
            let stub = StubPipeline {
                outcome,
                runs: Arc::clone(&runs),
            };
            (Box::new(stub), runs)
        }
    }

    impl Pipeline for StubPipeline {
        fn run(&self) -> Result<Vec<Dependency>, PipelineError> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            match &self.outcome {
                Outcome::Deps(deps) => Ok(deps.clone()),
                Outcome::CommandFailure => Err(PipelineError::CommandExecution {
                    command: "bazel mod show_repo".into(),
                    reason: "exit status: 2".into(),
                }),
                Outcome::ParseFailure => Err(PipelineError::parse("xml document", "eof")),
            }
        }
    }

    fn legacy_deps() -> Vec<Dependency> {
        vec![Dependency::new(Forge::GitHub, "madler/zlib", "v1.3.1")]
    }

    fn module_deps() -> Vec<Dependency> {
        vec![Dependency::new(Forge::GitHub, "bazelbuild/rules_cc", "0.0.9")]
    }

    #[test]
    fn test_falls_back_on_command_failure() {
        let (primary, primary_runs) = StubPipeline::boxed(Outcome::CommandFailure);
        let (secondary, _) = StubPipeline::boxed(Outcome::Deps(legacy_deps()));
        let dispatch = DispatchPipeline::new(primary, secondary, CapabilityMode::ModuleCapable);
        assert_eq!(dispatch.run().unwrap(), legacy_deps());
        assert_eq!(primary_runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_falls_back_on_parse_failure() {
        let (primary, _) = StubPipeline::boxed(Outcome::ParseFailure);
        let (secondary, _) = StubPipeline::boxed(Outcome::Deps(legacy_deps()));
        let dispatch = DispatchPipeline::new(primary, secondary, CapabilityMode::Unknown);
        assert_eq!(dispatch.run().unwrap(), legacy_deps());
    }

    #[test]
    fn test_falls_back_on_empty_result() {
        let (primary, _) = StubPipeline::boxed(Outcome::Deps(Vec::new()));
        let (secondary, secondary_runs) = StubPipeline::boxed(Outcome::Deps(legacy_deps()));
        let dispatch = DispatchPipeline::new(primary, secondary, CapabilityMode::ModuleCapable);
        assert_eq!(dispatch.run().unwrap(), legacy_deps());
        assert_eq!(secondary_runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_primary_result_wins_when_non_empty() {
        let (primary, _) = StubPipeline::boxed(Outcome::Deps(module_deps()));
        let (secondary, secondary_runs) = StubPipeline::boxed(Outcome::Deps(legacy_deps()));
        let dispatch = DispatchPipeline::new(primary, secondary, CapabilityMode::ModuleCapable);
        assert_eq!(dispatch.run().unwrap(), module_deps());
        assert_eq!(secondary_runs.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_legacy_only_never_runs_primary() {
        let (primary, primary_runs) = StubPipeline::boxed(Outcome::Deps(module_deps()));
        let (secondary, _) = StubPipeline::boxed(Outcome::Deps(legacy_deps()));
        let dispatch = DispatchPipeline::new(primary, secondary, CapabilityMode::LegacyOnly);
        assert_eq!(dispatch.run().unwrap(), legacy_deps());
        assert_eq!(primary_runs.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_secondary_failure_propagates() {
        let (primary, _) = StubPipeline::boxed(Outcome::Deps(Vec::new()));
        let (secondary, _) = StubPipeline::boxed(Outcome::CommandFailure);
        let dispatch = DispatchPipeline::new(primary, secondary, CapabilityMode::ModuleCapable);
        assert!(matches!(
            dispatch.run(),
            Err(PipelineError::CommandExecution { .. })
        ));
    }
}
