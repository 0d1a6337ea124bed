use serde::{Deserialize, Serialize};

/// One externally fetched dependency, as handed to the graph-assembly stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    pub forge: Forge,
    /// `<organization>/<repository>` for hosted sources, `group:artifact` for Maven.
    pub name: String,
    pub version: String,
}

impl Dependency {
    pub fn new(forge: Forge, name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            forge,
            name: name.into(),
            version: version.into(),
        }
    }
}

/// Package ecosystem or hosting provider a dependency belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Forge {
    GitHub,
    GitLab,
    Maven,
    BazelRegistry,
}

impl std::fmt::Display for Forge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Forge::GitHub => write!(f, "github"),
            Forge::GitLab => write!(f, "gitlab"),
            Forge::Maven => write!(f, "maven"),
            Forge::BazelRegistry => write!(f, "bcr"),
        }
    }
}

/// Kind of dependency declaration a pipeline targets. Used only as a routing key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DependencySource {
    /// `jvm_import` targets generated by rules_jvm_external.
    MavenInstall,
    /// `bazel_dep` modules of the module graph.
    BazelModule,
    /// Archives and source repositories fetched by URL. Declared differently
    /// under WORKSPACE and Bzlmod.
    HttpArchive,
}

impl DependencySource {
    pub const ALL: [DependencySource; 3] = [
        DependencySource::MavenInstall,
        DependencySource::BazelModule,
        DependencySource::HttpArchive,
    ];
}

impl std::fmt::Display for DependencySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DependencySource::MavenInstall => write!(f, "maven-install"),
            DependencySource::BazelModule => write!(f, "bazel-module"),
            DependencySource::HttpArchive => write!(f, "http-archive"),
        }
    }
}

/// Whether the build graph can use the module-graph (Bzlmod) scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CapabilityMode {
    LegacyOnly,
    ModuleCapable,
    Unknown,
}

impl std::fmt::Display for CapabilityMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CapabilityMode::LegacyOnly => write!(f, "legacy-only"),
            CapabilityMode::ModuleCapable => write!(f, "module-capable"),
            CapabilityMode::Unknown => write!(f, "unknown"),
        }
    }
}

/// Outcome of running one dependency source, as rendered by the reports.
#[derive(Debug, Clone, Serialize)]
pub struct SourceReport {
    pub source: DependencySource,
    pub dependencies: Vec<Dependency>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
