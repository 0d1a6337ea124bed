//! `bazel-depscan` — list the externally fetched dependencies of a Bazel workspace.
//!
//! # Flow
//! 1. Parse CLI arguments ([`cli`]).
//! 2. Initialise logging (`tracing`, stderr).
//! 3. Load config ([`config::load_config`]).
//! 4. Resolve the capability mode ([`detector::detect_mode`] unless forced).
//! 5. Wire one pipeline per dependency source ([`registry::PipelineRegistry`]).
//! 6. Run the requested sources; a failing source does not stop the others.
//! 7. Render the requested report ([`report`]).
//! 8. Exit `0` (every source succeeded) or `1`.

mod cli;
mod config;
mod detector;
mod error;
mod gateway;
mod models;
mod pipeline;
mod registry;
mod report;

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use cli::{Cli, ReportFormat};
use config::load_config;
use detector::detect_mode;
use error::PipelineError;
use gateway::{BazelCli, CommandGateway};
use models::{Dependency, DependencySource, SourceReport};
use registry::PipelineRegistry;

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli);

    // Resolve project path
    let path = cli
        .path
        .canonicalize()
        .unwrap_or_else(|_| cli.path.clone());

    let config = load_config(&path, cli.config.as_deref())?;

    let binary = cli.bazel.clone().unwrap_or(config.bazel.binary);
    let gateway: Arc<dyn CommandGateway> = Arc::new(
        BazelCli::new(binary, &path)
            .with_startup_flags(config.bazel.startup_flags)
            .with_command_flags(config.bazel.command_flags),
    );

    let mode = cli
        .mode
        .unwrap_or(config.resolution.mode)
        .resolve(|| detect_mode(&path));
    info!(%mode, path = %path.display(), "capability mode resolved");

    let registry = PipelineRegistry::for_mode(mode, gateway, &config.resolution)?;

    let sources: Vec<DependencySource> = if cli.sources.is_empty() {
        registry.sources()
    } else {
        cli.sources.iter().map(Into::into).collect()
    };

    let reports = run_sources(&registry, &sources, cli.sources.is_empty(), cli.quiet)?;

    match cli.report {
        ReportFormat::Terminal => {
            report::terminal::render(&reports, &path, mode, cli.verbose, cli.quiet)?;
        }
        ReportFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&reports)?);
        }
    }

    // Exit code: 1 if any source failed
    if reports.iter().any(|r| r.error.is_some()) {
        std::process::exit(1);
    }

    Ok(())
}

fn init_tracing(cli: &Cli) {
    let level = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "warn"
    } else {
        "info"
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// `implicit` is set when the sources were not picked with `--source`.
fn run_sources(
    registry: &PipelineRegistry,
    sources: &[DependencySource],
    implicit: bool,
    quiet: bool,
) -> Result<Vec<SourceReport>> {
    let pb = if !quiet {
        let pb = ProgressBar::new(sources.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
                .progress_chars("#>-"),
        );
        Some(pb)
    } else {
        None
    };

    let mut reports = Vec::with_capacity(sources.len());
    for &source in sources {
        if let Some(pb) = &pb {
            pb.set_message(source.to_string());
        }

        let outcome = registry.get(source).and_then(|pipeline| pipeline.run());
        let report = source_report(source, outcome, implicit);
        reports.push(report);

        if let Some(pb) = &pb {
            pb.inc(1);
        }
    }

    if let Some(pb) = pb {
        pb.finish_with_message("Done");
    }

    Ok(reports)
}

/// An implicitly selected source whose repository is not declared in the
/// workspace has nothing to report; any other failure is kept.
fn source_report(
    source: DependencySource,
    outcome: Result<Vec<Dependency>, PipelineError>,
    implicit: bool,
) -> SourceReport {
    match outcome {
        Ok(dependencies) => {
            info!(%source, count = dependencies.len(), "source resolved");
            SourceReport {
                source,
                dependencies,
                error: None,
            }
        }
        Err(err) if implicit && err.is_missing_repository() => {
            info!(%source, "repository not declared, nothing to report");
            SourceReport {
                source,
                dependencies: Vec::new(),
                error: None,
            }
        }
        Err(err) => {
            tracing::error!(%source, error = %err, "source failed");
            SourceReport {
                source,
                dependencies: Vec::new(),
                error: Some(err.to_string()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Forge;

    fn missing_maven() -> PipelineError {
        PipelineError::CommandExecution {
            command: "bazel query kind(jvm_import, @maven//...) --output=xml".into(),
            reason: "exit status: 7: ERROR: no such package '@maven//': \
                     The repository '@maven' could not be resolved: Repository '@maven' is not defined"
                .into(),
        }
    }

    #[test]
    fn test_undeclared_repository_is_empty_when_implicit() {
        let report = source_report(DependencySource::MavenInstall, Err(missing_maven()), true);
        assert!(report.error.is_none());
        assert!(report.dependencies.is_empty());
    }

    #[test]
    fn test_undeclared_repository_fails_when_requested() {
        let report = source_report(DependencySource::MavenInstall, Err(missing_maven()), false);
        assert!(report.error.is_some());
    }

    #[test]
    fn test_other_failures_are_kept() {
        let err = PipelineError::CommandExecution {
            command: "bazel query deps(//...)".into(),
            reason: "exit status: 1: ERROR: build interrupted".into(),
        };
        let report = source_report(DependencySource::HttpArchive, Err(err), true);
        assert!(report.error.is_some());

        let deps = vec![Dependency::new(Forge::GitHub, "madler/zlib", "v1.3.1")];
        let report = source_report(DependencySource::HttpArchive, Ok(deps.clone()), true);
        assert_eq!(report.dependencies, deps);
        assert!(report.error.is_none());
    }
}
