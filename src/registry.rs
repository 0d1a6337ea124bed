use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use crate::config::ResolutionConfig;
use crate::error::PipelineError;
use crate::gateway::CommandGateway;
use crate::models::{CapabilityMode, DependencySource};
use crate::pipeline::dispatch::DispatchPipeline;
use crate::pipeline::finalize::FinalStep;
use crate::pipeline::mapping::RepoMappingResolver;
use crate::pipeline::show_repo::UrlExtractor;
use crate::pipeline::{to_strings, Pipeline, StepPipeline};

const MAVEN_INSTALL_QUERY: [&str; 3] = ["query", "kind(jvm_import, @maven//...)", "--output=xml"];
const MODULE_GRAPH: [&str; 3] = ["mod", "graph", "--output=json"];
const EXTERNAL_LABELS: [&str; 3] = ["query", "deps(//...)", "--output=label"];
const SHOW_REPO: [&str; 3] = ["mod", "show_repo", "{}"];
const DUMP_REPO_MAPPING: [&str; 3] = ["mod", "dump_repo_mapping", ""];
const WORKSPACE_REPOS: [&str; 3] = [
    "query",
    "kind('http_archive|http_file|git_repository|go_repository', //external:*)",
    "--output=label_kind",
];
const WORKSPACE_REPO_BUILD: [&str; 3] = ["query", "//external:{}", "--output=build"];

/// Maps each dependency source to its pipeline. Built once, read-only afterwards.
#[derive(Default)]
pub struct PipelineRegistry {
    pipelines: BTreeMap<DependencySource, Box<dyn Pipeline>>,
}

impl PipelineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, source: DependencySource, pipeline: Box<dyn Pipeline>) {
        self.pipelines.insert(source, pipeline);
    }

    /// Wire the sources available in `mode`. Legacy-only workspaces never get
    /// the module graph source, and the HTTP archive source only gets a
    /// dispatch pipeline when a fallback can actually happen.
    pub fn for_mode(
        mode: CapabilityMode,
        gateway: Arc<dyn CommandGateway>,
        resolution: &ResolutionConfig,
    ) -> Result<Self, PipelineError> {
        let mut registry = Self::new();
        registry.register(
            DependencySource::MavenInstall,
            Box::new(maven_install(Arc::clone(&gateway))?),
        );
        if mode != CapabilityMode::LegacyOnly {
            registry.register(
                DependencySource::BazelModule,
                Box::new(bazel_module(Arc::clone(&gateway))?),
            );
        }

        let extractor = UrlExtractor::new(resolution.importpath_hosts.clone());
        let workspace = workspace_archives(Arc::clone(&gateway), extractor.clone())?;
        let http: Box<dyn Pipeline> = match mode {
            CapabilityMode::LegacyOnly => Box::new(workspace),
            CapabilityMode::ModuleCapable | CapabilityMode::Unknown => {
                let resolver = resolution.repo_mapping.then(|| {
                    Arc::new(RepoMappingResolver::new(
                        Arc::clone(&gateway),
                        to_strings(&DUMP_REPO_MAPPING),
                    ))
                });
                let module = module_archives(gateway, resolver, extractor)?;
                Box::new(DispatchPipeline::new(Box::new(module), Box::new(workspace), mode))
            }
        };
        registry.register(DependencySource::HttpArchive, http);

        debug!(%mode, sources = registry.pipelines.len(), "pipeline registry built");
        Ok(registry)
    }

    /// A missing source is a wiring defect, never a data condition.
    pub fn get(&self, source: DependencySource) -> Result<&dyn Pipeline, PipelineError> {
        self.pipelines
            .get(&source)
            .map(|p| p.as_ref())
            .ok_or(PipelineError::Configuration(source))
    }

    /// Registered sources in declaration order.
    pub fn sources(&self) -> Vec<DependencySource> {
        DependencySource::ALL
            .into_iter()
            .filter(|source| self.pipelines.contains_key(source))
            .collect()
    }
}

/// rules_jvm_external tags every `jvm_import` with `maven_coordinates=<coords>`.
fn maven_install(gateway: Arc<dyn CommandGateway>) -> Result<StepPipeline, PipelineError> {
    Ok(StepPipeline::builder(gateway)
        .command(&MAVEN_INSTALL_QUERY)
        .xml_attribute("string", "value")
        .keep(r"^maven_coordinates=")?
        .replace(r"^maven_coordinates=", "")?
        .dedup()
        .finish(FinalStep::MavenCoordinates))
}

fn bazel_module(gateway: Arc<dyn CommandGateway>) -> Result<StepPipeline, PipelineError> {
    Ok(StepPipeline::builder(gateway)
        .command(&MODULE_GRAPH)
        .json_field("key")
        .drop_matching(r"^<root>$")?
        .dedup()
        .finish(FinalStep::ModuleKeys))
}

/// Bzlmod: repository names from external labels, probed with `mod show_repo`.
fn module_archives(
    gateway: Arc<dyn CommandGateway>,
    resolver: Option<Arc<RepoMappingResolver>>,
    extractor: UrlExtractor,
) -> Result<StepPipeline, PipelineError> {
    let mut builder = StepPipeline::builder(gateway)
        .command(&EXTERNAL_LABELS)
        .replace(r"^(@{1,2}[^/]*)//.*$", "$1")?
        .keep(r"^@")?;
    if let Some(resolver) = resolver {
        builder = builder.canonicalize(resolver);
    }
    Ok(builder
        .dedup()
        .probe_repos(&SHOW_REPO)
        .extract_urls(extractor)
        .finish(FinalStep::HostedArchives))
}

/// WORKSPACE: `//external` rules, each printed with `--output=build`.
fn workspace_archives(
    gateway: Arc<dyn CommandGateway>,
    extractor: UrlExtractor,
) -> Result<StepPipeline, PipelineError> {
    Ok(StepPipeline::builder(gateway)
        .command(&WORKSPACE_REPOS)
        .split(r"\s+")?
        .keep(r"^//external:")?
        .replace(r"^//external:", "")?
        .dedup()
        .command_per_item(&WORKSPACE_REPO_BUILD)
        .extract_urls(extractor)
        .finish(FinalStep::HostedArchives))
}
