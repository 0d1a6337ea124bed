//! Final steps turning the working set into dependency records.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::error::PipelineError;
use crate::models::{Dependency, Forge};

static GITHUB_ARCHIVE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^https?://(?:mirror\.bazel\.build/)?github\.com/([^/]+)/([^/]+)/archive/(.+?)\.(?:tar\.gz|tgz|zip|tar\.bz2|tar\.xz)$",
    )
    .unwrap()
});
static GITHUB_RELEASE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^https?://(?:mirror\.bazel\.build/)?github\.com/([^/]+)/([^/]+)/releases/download/([^/]+)/[^/]+$",
    )
    .unwrap()
});
static CODELOAD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^https?://codeload\.github\.com/([^/]+)/([^/]+)/(?:tar\.gz|zip|legacy\.tar\.gz|legacy\.zip)/(.+)$",
    )
    .unwrap()
});
static GITLAB_ARCHIVE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https?://gitlab\.com/([^/]+)/([^/]+)/-/archive/([^/]+)/[^/]+$").unwrap()
});

/// Terminal step of a pipeline. Items that fail to parse are skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalStep {
    /// Code-hosting archive/release URLs.
    HostedArchives,
    /// `group:artifact[:packaging[:classifier]]:version`
    MavenCoordinates,
    /// Module graph keys, `name@version`.
    ModuleKeys,
}

impl FinalStep {
    pub fn apply(&self, items: Vec<String>) -> Vec<Dependency> {
        let parse: fn(&str) -> Result<Dependency, PipelineError> = match self {
            FinalStep::HostedArchives => hosted_dependency,
            FinalStep::MavenCoordinates => maven_dependency,
            FinalStep::ModuleKeys => module_dependency,
        };

        let total = items.len();
        let deps: Vec<Dependency> = items
            .iter()
            .filter_map(|item| match parse(item) {
                Ok(dep) => Some(dep),
                Err(err) => {
                    debug!(item = %item, error = %err, "skipping item");
                    None
                }
            })
            .collect();

        debug!(
            step = ?self,
            emitted = deps.len(),
            skipped = total - deps.len(),
            "final step done"
        );
        deps
    }
}

/// A parsed code-hosting archive reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostedRef {
    pub forge: Forge,
    pub organization: String,
    pub repository: String,
    pub reference: String,
}

pub fn parse_hosted_url(url: &str) -> Result<HostedRef, PipelineError> {
    let url = url.split(['?', '#']).next().unwrap_or(url);
    let patterns: [(&Regex, Forge); 4] = [
        (&*GITHUB_ARCHIVE_RE, Forge::GitHub),
        (&*GITHUB_RELEASE_RE, Forge::GitHub),
        (&*CODELOAD_RE, Forge::GitHub),
        (&*GITLAB_ARCHIVE_RE, Forge::GitLab),
    ];

    patterns
        .iter()
        .find_map(|(re, forge)| {
            re.captures(url).map(|caps| HostedRef {
                forge: *forge,
                organization: caps[1].to_string(),
                repository: caps[2].to_string(),
                reference: caps[3].to_string(),
            })
        })
        .ok_or_else(|| PipelineError::parse("hosting url", format!("unrecognized url {url}")))
}

/// `refs/tags/v1.2.3` -> `v1.2.3`; anything else is returned unchanged.
pub fn normalize_ref(reference: &str) -> &str {
    reference.strip_prefix("refs/tags/").unwrap_or(reference)
}

fn hosted_dependency(url: &str) -> Result<Dependency, PipelineError> {
    let parsed = parse_hosted_url(url)?;
    Ok(Dependency::new(
        parsed.forge,
        format!("{}/{}", parsed.organization, parsed.repository),
        normalize_ref(&parsed.reference),
    ))
}

fn maven_dependency(coordinates: &str) -> Result<Dependency, PipelineError> {
    let parts: Vec<&str> = coordinates.trim().split(':').collect();
    if parts.len() < 3 || parts.len() > 5 || parts.iter().any(|p| p.is_empty()) {
        return Err(PipelineError::parse(
            "maven coordinates",
            format!("unexpected shape `{coordinates}`"),
        ));
    }
    let version = parts[parts.len() - 1];
    Ok(Dependency::new(
        Forge::Maven,
        format!("{}:{}", parts[0], parts[1]),
        version,
    ))
}

fn module_dependency(key: &str) -> Result<Dependency, PipelineError> {
    match key.trim().rsplit_once('@') {
        // `name@_` marks a module pinned by an override, which has no registry version
        Some((name, version)) if !name.is_empty() && !version.is_empty() && version != "_" => {
            Ok(Dependency::new(Forge::BazelRegistry, name, version))
        }
        _ => Err(PipelineError::parse(
            "module key",
            format!("no version in `{key}`"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_github_tag_archive() {
        let deps = FinalStep::HostedArchives.apply(items(&[
            "https://github.com/org/proj/archive/refs/tags/v2.0.0.tar.gz",
        ]));
        assert_eq!(deps, vec![Dependency::new(Forge::GitHub, "org/proj", "v2.0.0")]);
    }

    #[test]
    fn test_hosted_url_shapes() {
        let release = parse_hosted_url(
            "https://github.com/bazelbuild/rules_cc/releases/download/0.0.9/rules_cc-0.0.9.tar.gz",
        )
        .unwrap();
        assert_eq!(release.organization, "bazelbuild");
        assert_eq!(release.repository, "rules_cc");
        assert_eq!(release.reference, "0.0.9");

        let commit = parse_hosted_url(
            "https://github.com/google/googletest/archive/5376968f6948923e2411081fd9372e71a59d8e77.zip",
        )
        .unwrap();
        assert_eq!(commit.reference, "5376968f6948923e2411081fd9372e71a59d8e77");

        let mirrored = parse_hosted_url(
            "https://mirror.bazel.build/github.com/madler/zlib/archive/v1.3.1.tar.gz",
        )
        .unwrap();
        assert_eq!(mirrored.organization, "madler");

        let codeload =
            parse_hosted_url("https://codeload.github.com/abseil/abseil-cpp/tar.gz/refs/tags/20240116.0")
                .unwrap();
        assert_eq!(normalize_ref(&codeload.reference), "20240116.0");

        let gitlab = parse_hosted_url(
            "https://gitlab.com/libeigen/eigen/-/archive/3.4.0/eigen-3.4.0.tar.bz2",
        )
        .unwrap();
        assert_eq!(gitlab.forge, Forge::GitLab);
        assert_eq!(gitlab.reference, "3.4.0");
    }

    #[test]
    fn test_unrecognized_urls_are_skipped() {
        let deps = FinalStep::HostedArchives.apply(items(&[
            "https://www.openssl.org/source/openssl-3.0.13.tar.gz",
            "https://github.com/y/z",
            "https://github.com/org/proj/archive/v1.0.tar.gz",
        ]));
        assert_eq!(deps, vec![Dependency::new(Forge::GitHub, "org/proj", "v1.0")]);
    }

    #[test]
    fn test_normalize_ref() {
        assert_eq!(normalize_ref("refs/tags/v1.2.3"), "v1.2.3");
        assert_eq!(normalize_ref("refs/heads/main"), "refs/heads/main");
        assert_eq!(normalize_ref("v1.2.3"), "v1.2.3");
    }

    #[test]
    fn test_maven_coordinates() {
        let deps = FinalStep::MavenCoordinates.apply(items(&[
            "com.google.guava:guava:32.1.2-jre",
            "io.netty:netty-tcnative-boringssl-static:jar:linux-x86_64:2.0.61.Final",
            "broken",
        ]));
        assert_eq!(
            deps,
            vec![
                Dependency::new(Forge::Maven, "com.google.guava:guava", "32.1.2-jre"),
                Dependency::new(
                    Forge::Maven,
                    "io.netty:netty-tcnative-boringssl-static",
                    "2.0.61.Final"
                ),
            ]
        );
    }

    #[test]
    fn test_module_keys() {
        let deps = FinalStep::ModuleKeys.apply(items(&["rules_go@0.46.0", "my_fork@_", "<root>"]));
        assert_eq!(deps, vec![Dependency::new(Forge::BazelRegistry, "rules_go", "0.46.0")]);
    }
}
