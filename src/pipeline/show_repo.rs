//! URL candidates from repository declarations printed by `mod show_repo`
//! or `query --output=build`.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

static RULE_CLASS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*#\s*Rule class:\s*(\S+)").unwrap());
static RULE_CALL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*([A-Za-z_][\w.]*)\(\s*$").unwrap());
static URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\burl\s*=\s*"(https?://[^"]+)""#).unwrap());
static URLS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\burls\s*=\s*\[(.*?)\]").unwrap());
static QUOTED_HTTP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""(https?://[^"]+)""#).unwrap());
static REMOTE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\bremote\s*=\s*"([^"]+)""#).unwrap());
static IMPORTPATH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\bimportpath\s*=\s*"([^"]+)""#).unwrap());

/// Rule kind whose `importpath` may stand in for a missing URL.
const IMPORTPATH_RULE: &str = "go_repository";

/// One repository declaration.
#[derive(Debug, Clone)]
pub struct ShowRepoBlock<'a> {
    pub rule_class: Option<&'a str>,
    text: &'a str,
}

impl<'a> ShowRepoBlock<'a> {
    /// Rule kind comes from the `# Rule class:` marker, else from the rule call head.
    /// A qualified kind (`//path:defs.bzl%go_repository`) keeps its last `%` segment.
    pub fn parse(text: &'a str) -> Self {
        let rule_class = RULE_CLASS_RE
            .captures(text)
            .or_else(|| RULE_CALL_RE.captures(text))
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().rsplit('%').next())
            .filter(|kind| !kind.is_empty());
        Self { rule_class, text }
    }

    fn explicit_urls(&self) -> Vec<String> {
        URL_RE
            .captures_iter(self.text)
            .map(|caps| caps[1].to_string())
            .collect()
    }

    fn url_lists(&self) -> Vec<String> {
        URLS_RE
            .captures_iter(self.text)
            .flat_map(|caps| {
                QUOTED_HTTP_RE
                    .captures_iter(caps.get(1).map_or("", |m| m.as_str()))
                    .map(|inner| inner[1].to_string())
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    /// Only http(s) remotes; ssh and file remotes are ignored.
    fn http_remotes(&self) -> Vec<String> {
        REMOTE_RE
            .captures_iter(self.text)
            .map(|caps| caps[1].to_string())
            .filter(|remote| remote.starts_with("https://") || remote.starts_with("http://"))
            .collect()
    }

    fn importpath(&self) -> Option<&'a str> {
        IMPORTPATH_RE
            .captures(self.text)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str())
    }
}

/// Extracts URL candidates from show-repo blocks in strict priority order.
#[derive(Debug, Clone)]
pub struct UrlExtractor {
    importpath_hosts: Vec<String>,
}

impl UrlExtractor {
    pub fn new(importpath_hosts: Vec<String>) -> Self {
        Self { importpath_hosts }
    }

    pub fn extract(&self, blocks: &[String]) -> Vec<String> {
        blocks
            .iter()
            .flat_map(|text| self.candidates(&ShowRepoBlock::parse(text)))
            .collect()
    }

    /// `url`, then `urls`, then an http(s) `remote`; an allow-listed
    /// `importpath` only when none of those yielded anything.
    pub fn candidates(&self, block: &ShowRepoBlock<'_>) -> Vec<String> {
        let explicit = block.explicit_urls();
        if !explicit.is_empty() {
            return explicit;
        }
        let listed = block.url_lists();
        if !listed.is_empty() {
            return listed;
        }
        let remotes = block.http_remotes();
        if !remotes.is_empty() {
            return remotes;
        }

        if block.rule_class != Some(IMPORTPATH_RULE) {
            return Vec::new();
        }
        match block.importpath() {
            Some(path) if self.is_allowed_host(path) => vec![format!("https://{path}")],
            Some(path) => {
                debug!(importpath = path, "importpath host not allow-listed");
                Vec::new()
            }
            None => Vec::new(),
        }
    }

    fn is_allowed_host(&self, importpath: &str) -> bool {
        let host = importpath.split('/').next().unwrap_or_default();
        self.importpath_hosts.iter().any(|allowed| allowed == host)
    }
}
