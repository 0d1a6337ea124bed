use std::path::Path;

use tracing::debug;

use crate::models::CapabilityMode;

/// First Bazel major release that can resolve modules.
const FIRST_BZLMOD_MAJOR: u32 = 6;

/// Detect whether the workspace can use Bzlmod by scanning its files.
///
/// Explicit `.bazelrc` flags win, then the presence of `MODULE.bazel`, then
/// a pinned `.bazelversion` older than Bzlmod. Anything else is `Unknown`.
pub fn detect_mode(path: &Path) -> CapabilityMode {
    if let Ok(bazelrc) = std::fs::read_to_string(path.join(".bazelrc")) {
        if let Some(mode) = bazelrc_mode(&bazelrc) {
            debug!(%mode, "mode set by .bazelrc");
            return mode;
        }
    }

    if path.join("MODULE.bazel").exists() {
        return CapabilityMode::ModuleCapable;
    }

    let has_workspace =
        path.join("WORKSPACE").exists() || path.join("WORKSPACE.bazel").exists();
    if has_workspace {
        let major = std::fs::read_to_string(path.join(".bazelversion"))
            .ok()
            .and_then(|v| bazel_major(&v));
        if matches!(major, Some(m) if m < FIRST_BZLMOD_MAJOR) {
            return CapabilityMode::LegacyOnly;
        }
    }

    CapabilityMode::Unknown
}

/// The last `enable_bzlmod` flag in the file decides.
fn bazelrc_mode(content: &str) -> Option<CapabilityMode> {
    content
        .lines()
        .map(str::trim)
        .filter(|l| !l.starts_with('#'))
        .flat_map(str::split_whitespace)
        .filter_map(|token| match token {
            "--noenable_bzlmod" | "--enable_bzlmod=false" | "--enable_bzlmod=0" => {
                Some(CapabilityMode::LegacyOnly)
            }
            "--enable_bzlmod" | "--enable_bzlmod=true" | "--enable_bzlmod=1" => {
                Some(CapabilityMode::ModuleCapable)
            }
            _ => None,
        })
        .last()
}

fn bazel_major(version: &str) -> Option<u32> {
    version.trim().split('.').next()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn workspace(files: &[(&str, &str)]) -> TempDir {
        let dir = TempDir::new().unwrap();
        for (name, content) in files {
            std::fs::write(dir.path().join(name), content).unwrap();
        }
        dir
    }

    #[test]
    fn test_module_file_means_capable() {
        let dir = workspace(&[("MODULE.bazel", "bazel_dep(name = \"rules_cc\", version = \"0.0.9\")\n")]);
        assert_eq!(detect_mode(dir.path()), CapabilityMode::ModuleCapable);
    }

    #[test]
    fn test_bazelrc_flag_wins() {
        let dir = workspace(&[
            ("MODULE.bazel", ""),
            (".bazelrc", "common --enable_bzlmod\n# build --enable_bzlmod\ncommon --noenable_bzlmod\n"),
        ]);
        assert_eq!(detect_mode(dir.path()), CapabilityMode::LegacyOnly);
    }

    #[test]
    fn test_old_bazel_workspace_is_legacy() {
        let dir = workspace(&[("WORKSPACE", ""), (".bazelversion", "5.4.1\n")]);
        assert_eq!(detect_mode(dir.path()), CapabilityMode::LegacyOnly);
    }

    #[test]
    fn test_workspace_on_recent_bazel_is_unknown() {
        let dir = workspace(&[("WORKSPACE.bazel", ""), (".bazelversion", "7.1.0")]);
        assert_eq!(detect_mode(dir.path()), CapabilityMode::Unknown);

        let bare = workspace(&[("WORKSPACE", "")]);
        assert_eq!(detect_mode(bare.path()), CapabilityMode::Unknown);
    }

    #[test]
    fn test_bazel_major() {
        assert_eq!(bazel_major("6.5.0\n"), Some(6));
        assert_eq!(bazel_major("last_green"), None);
    }
}
