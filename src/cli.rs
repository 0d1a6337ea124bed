use std::path::PathBuf;

use clap::Parser;

use crate::config::ModeSetting;
use crate::models::DependencySource;

#[derive(Parser, Debug)]
#[command(
    name = "bazel-depscan",
    about = "Extract externally fetched dependencies from a Bazel workspace",
    version
)]
pub struct Cli {
    /// Workspace path to scan
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Config file [default: ./.bazel-depscan/config.toml, fallback ~/.config/bazel-depscan/config.toml]
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Bazel executable (overrides the config file)
    #[arg(long, value_name = "BIN")]
    pub bazel: Option<String>,

    /// Dependency-resolution scheme (overrides the config file)
    #[arg(long, value_name = "MODE")]
    pub mode: Option<ModeSetting>,

    /// Only run these dependency sources (repeatable)
    #[arg(long = "source", value_name = "SOURCE")]
    pub sources: Vec<SourceArg>,

    /// Report format
    #[arg(long, default_value = "terminal", value_name = "FORMAT")]
    pub report: ReportFormat,

    /// Debug logging and per-source details
    #[arg(short, long)]
    pub verbose: bool,

    /// Only print summary line
    #[arg(short, long)]
    pub quiet: bool,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum ReportFormat {
    Terminal,
    Json,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum SourceArg {
    MavenInstall,
    BazelModule,
    HttpArchive,
}

impl From<&SourceArg> for DependencySource {
    fn from(arg: &SourceArg) -> Self {
        match arg {
            SourceArg::MavenInstall => DependencySource::MavenInstall,
            SourceArg::BazelModule => DependencySource::BazelModule,
            SourceArg::HttpArchive => DependencySource::HttpArchive,
        }
    }
}
