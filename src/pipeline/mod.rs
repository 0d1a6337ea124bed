//! Command/parse pipelines that turn build tool output into dependencies.
//!
//! - [`steps`] — pure string-list transforms (regex, dedup, XML/JSON values).
//! - [`repo_names`] — repository name forms and the show-repo probing heuristic.
//! - [`mapping`] — lazily loaded apparent <-> canonical repository name table.
//! - [`show_repo`] — URL candidates from repository declarations.
//! - [`finalize`] — final steps producing [`Dependency`] records.
//! - [`dispatch`] — Bzlmod-first pipeline with WORKSPACE fallback.

use std::sync::Arc;

use regex::Regex;
use tracing::debug;

use crate::error::PipelineError;
use crate::gateway::{fill_template, CommandGateway};
use crate::models::Dependency;

pub mod dispatch;
pub mod finalize;
pub mod mapping;
pub mod repo_names;
pub mod show_repo;
pub mod steps;

use finalize::FinalStep;
use mapping::RepoMappingResolver;
use show_repo::UrlExtractor;
use steps::Transform;

/// Anything that can produce the dependency set of one source.
pub trait Pipeline: Send + Sync {
    fn run(&self) -> Result<Vec<Dependency>, PipelineError>;
}

/// One step of a [`StepPipeline`], working on the current list of strings.
#[derive(Debug)]
pub enum Step {
    /// Run the build tool. Once with `template` as-is (output split into
    /// lines), or once per current item with `{}` substituted (each raw
    /// output kept whole).
    Command { template: Vec<String>, fan_out: bool },
    Transform(Transform),
    /// Rewrite apparent repository names to canonical ones where known.
    Canonicalize(Arc<RepoMappingResolver>),
    /// Probe each repository name with `template`, keeping successful outputs.
    ProbeRepos { template: Vec<String> },
    ExtractUrls(UrlExtractor),
}

impl Step {
    fn name(&self) -> &'static str {
        match self {
            Step::Command { fan_out: false, .. } => "command",
            Step::Command { fan_out: true, .. } => "command-per-item",
            Step::Transform(Transform::Replace { .. }) => "replace",
            Step::Transform(Transform::Split(_)) => "split",
            Step::Transform(Transform::Filter { .. }) => "filter",
            Step::Transform(Transform::Dedup) => "dedup",
            Step::Transform(Transform::XmlAttribute { .. }) => "xml-attribute",
            Step::Transform(Transform::JsonField(_)) => "json-field",
            Step::Canonicalize(_) => "canonicalize",
            Step::ProbeRepos { .. } => "probe-repos",
            Step::ExtractUrls(_) => "extract-urls",
        }
    }
}

/// An immutable, reentrant sequence of steps ending in a [`FinalStep`].
pub struct StepPipeline {
    gateway: Arc<dyn CommandGateway>,
    steps: Vec<Step>,
    finish: FinalStep,
}

impl StepPipeline {
    pub fn builder(gateway: Arc<dyn CommandGateway>) -> PipelineBuilder {
        PipelineBuilder {
            gateway,
            steps: Vec::new(),
        }
    }

    fn run_step(&self, step: &Step, lines: Vec<String>) -> Result<Vec<String>, PipelineError> {
        match step {
            Step::Command {
                template,
                fan_out: false,
            } => Ok(self
                .gateway
                .execute(template)?
                .map(|out| {
                    out.lines()
                        .map(str::trim_end)
                        .filter(|l| !l.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default()),
            Step::Command {
                template,
                fan_out: true,
            } => {
                let mut outputs = Vec::with_capacity(lines.len());
                for item in &lines {
                    if let Some(out) = self.gateway.execute(&fill_template(template, item))? {
                        outputs.push(out);
                    }
                }
                Ok(outputs)
            }
            Step::Transform(transform) => transform.apply(lines),
            Step::Canonicalize(resolver) => Ok(repo_names::canonicalize(resolver, lines)),
            Step::ProbeRepos { template } => Ok(repo_names::probe_repositories(
                self.gateway.as_ref(),
                template,
                lines,
            )),
            Step::ExtractUrls(extractor) => Ok(extractor.extract(&lines)),
        }
    }
}

impl Pipeline for StepPipeline {
    fn run(&self) -> Result<Vec<Dependency>, PipelineError> {
        let mut lines: Vec<String> = Vec::new();
        for step in &self.steps {
            lines = self.run_step(step, lines)?;
            debug!(step = step.name(), items = lines.len(), "step done");
        }
        Ok(self.finish.apply(lines))
    }
}

/// Fluent builder accumulating steps; [`PipelineBuilder::finish`] seals it.
pub struct PipelineBuilder {
    gateway: Arc<dyn CommandGateway>,
    steps: Vec<Step>,
}

impl PipelineBuilder {
    fn push(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    pub fn command(self, args: &[&str]) -> Self {
        self.push(Step::Command {
            template: to_strings(args),
            fan_out: false,
        })
    }

    pub fn command_per_item(self, template: &[&str]) -> Self {
        self.push(Step::Command {
            template: to_strings(template),
            fan_out: true,
        })
    }

    pub fn replace(self, pattern: &str, replacement: &str) -> Result<Self, PipelineError> {
        Ok(self.push(Step::Transform(Transform::Replace {
            pattern: Regex::new(pattern)?,
            replacement: replacement.to_string(),
        })))
    }

    pub fn split(self, pattern: &str) -> Result<Self, PipelineError> {
        Ok(self.push(Step::Transform(Transform::Split(Regex::new(pattern)?))))
    }

    pub fn keep(self, pattern: &str) -> Result<Self, PipelineError> {
        Ok(self.push(Step::Transform(Transform::Filter {
            pattern: Regex::new(pattern)?,
            keep: true,
        })))
    }

    pub fn drop_matching(self, pattern: &str) -> Result<Self, PipelineError> {
        Ok(self.push(Step::Transform(Transform::Filter {
            pattern: Regex::new(pattern)?,
            keep: false,
        })))
    }

    pub fn dedup(self) -> Self {
        self.push(Step::Transform(Transform::Dedup))
    }

    pub fn xml_attribute(self, element: &str, attribute: &str) -> Self {
        self.push(Step::Transform(Transform::XmlAttribute {
            element: element.to_string(),
            attribute: attribute.to_string(),
        }))
    }

    pub fn json_field(self, field: &str) -> Self {
        self.push(Step::Transform(Transform::JsonField(field.to_string())))
    }

    pub fn canonicalize(self, resolver: Arc<RepoMappingResolver>) -> Self {
        self.push(Step::Canonicalize(resolver))
    }

    pub fn probe_repos(self, template: &[&str]) -> Self {
        self.push(Step::ProbeRepos {
            template: to_strings(template),
        })
    }

    pub fn extract_urls(self, extractor: UrlExtractor) -> Self {
        self.push(Step::ExtractUrls(extractor))
    }

    pub fn finish(self, finish: FinalStep) -> StepPipeline {
        StepPipeline {
            gateway: self.gateway,
            steps: self.steps,
            finish,
        }
    }
}

pub(crate) fn to_strings(args: &[&str]) -> Vec<String> {
    args.iter().map(|a| a.to_string()).collect()
}
