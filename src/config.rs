use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::models::CapabilityMode;

/// Root configuration structure, deserialized from `.bazel-depscan/config.toml`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// How the build tool is invoked.
    pub bazel: BazelConfig,
    /// How dependency sources are resolved.
    pub resolution: ResolutionConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct BazelConfig {
    /// Executable used for every query. Defaults to `bazel` on `PATH`.
    pub binary: String,
    /// Startup options placed before the sub-command (e.g. `--output_base=...`).
    pub startup_flags: Vec<String>,
    /// Options appended to every sub-command.
    pub command_flags: Vec<String>,
}

impl Default for BazelConfig {
    fn default() -> Self {
        Self {
            binary: "bazel".to_string(),
            startup_flags: Vec::new(),
            command_flags: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ResolutionConfig {
    /// Forced dependency-resolution scheme; `auto` probes the workspace.
    pub mode: ModeSetting,
    /// Consult `mod dump_repo_mapping` to canonicalise repository names.
    pub repo_mapping: bool,
    /// Hosts whose `go_repository` import paths may stand in for a URL.
    pub importpath_hosts: Vec<String>,
}

impl Default for ResolutionConfig {
    fn default() -> Self {
        Self {
            mode: ModeSetting::Auto,
            repo_mapping: true,
            importpath_hosts: vec!["github.com".to_string(), "gitlab.com".to_string()],
        }
    }
}

/// Dependency-resolution scheme as chosen by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ModeSetting {
    /// Detect from the workspace files.
    Auto,
    /// WORKSPACE only; the module graph is never queried.
    Legacy,
    /// Bzlmod first, WORKSPACE as fallback.
    Bzlmod,
}

impl ModeSetting {
    /// The capability mode to use, given what detection found.
    pub fn resolve(self, detected: impl FnOnce() -> CapabilityMode) -> CapabilityMode {
        match self {
            ModeSetting::Auto => detected(),
            ModeSetting::Legacy => CapabilityMode::LegacyOnly,
            ModeSetting::Bzlmod => CapabilityMode::ModuleCapable,
        }
    }
}

/// Load the configuration, searching in order:
///
/// 1. `config_override` — path passed via `--config`
/// 2. `<project_path>/.bazel-depscan/config.toml`
/// 3. `~/.config/bazel-depscan/config.toml`
/// 4. Built-in [`Config::default`]
pub fn load_config(project_path: &Path, config_override: Option<&Path>) -> Result<Config> {
    if let Some(path) = config_override {
        return read_config(path);
    }

    let project_config = project_path.join(".bazel-depscan").join("config.toml");
    if project_config.exists() {
        return read_config(&project_config);
    }

    if let Some(home) = dirs::home_dir() {
        let home_config = home
            .join(".config")
            .join("bazel-depscan")
            .join("config.toml");
        if home_config.exists() {
            return read_config(&home_config);
        }
    }

    Ok(Config::default())
}

fn read_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    toml::from_str(&content).with_context(|| format!("parsing config {}", path.display()))
}
