//! Apparent <-> canonical repository name table, loaded lazily from one
//! `dump mapping` invocation and cached for the life of the process.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock, OnceLock};

use regex::Regex;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::gateway::CommandGateway;
use crate::pipeline::repo_names::{bare_name, marker_count};

/// Spellings of the root module besides the empty name.
const ROOT_SENTINELS: [&str; 2] = ["_main", "__main__"];

/// A marker-tagged token not glued to a preceding word (`foo@1.0` is not a token).
static TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|[^\w@])(@{1,2}[\w.+~-]*)").unwrap());

/// Root-module aliases all map to the empty bare name.
pub fn normalize_root(bare: &str) -> &str {
    if ROOT_SENTINELS.contains(&bare) {
        ""
    } else {
        bare
    }
}

pub fn is_root(bare: &str) -> bool {
    normalize_root(bare).is_empty()
}

#[derive(Debug, Default)]
pub struct MappingTable {
    apparent_to_canonical: HashMap<String, String>,
    canonical_to_apparent: HashMap<String, String>,
}

impl MappingTable {
    /// Parse dump output. Lines that fit none of the shapes are ignored.
    pub fn parse(output: &str) -> Self {
        let mut table = MappingTable::default();
        for line in output.lines() {
            if let Some(entries) = parse_json_line(line) {
                for (apparent, canonical) in &entries {
                    table.insert(apparent, canonical);
                }
                continue;
            }
            let entry = parse_arrow_line(line).or_else(|| parse_token_line(line));
            if let Some((apparent, canonical)) = entry {
                table.insert(apparent, canonical);
            }
        }
        table
    }

    /// First occurrence wins in both directions.
    fn insert(&mut self, apparent: &str, canonical: &str) {
        let apparent = normalize_root(bare_name(apparent)).to_string();
        let canonical = normalize_root(bare_name(canonical)).to_string();
        self.apparent_to_canonical
            .entry(apparent.clone())
            .or_insert_with(|| canonical.clone());
        self.canonical_to_apparent
            .entry(canonical)
            .or_insert(apparent);
    }

    pub fn len(&self) -> usize {
        self.apparent_to_canonical.len()
    }

    pub fn is_empty(&self) -> bool {
        self.apparent_to_canonical.is_empty()
    }
}

fn tokens(text: &str) -> impl Iterator<Item = &str> {
    TOKEN_RE
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// `{"apparent": "canonical", ...}` as printed by `mod dump_repo_mapping`.
/// Keys come out in sorted order; non-string values are skipped.
fn parse_json_line(line: &str) -> Option<Vec<(String, String)>> {
    let line = line.trim();
    if !line.starts_with('{') {
        return None;
    }
    let object: Map<String, Value> = serde_json::from_str(line).ok()?;
    Some(
        object
            .into_iter()
            .filter_map(|(apparent, canonical)| match canonical {
                Value::String(canonical) => Some((apparent, canonical)),
                _ => None,
            })
            .collect(),
    )
}

/// `@apparent -> @@canonical`
fn parse_arrow_line(line: &str) -> Option<(&str, &str)> {
    let (left, right) = line.split_once("->")?;
    let apparent = tokens(left).find(|t| marker_count(t) == 1)?;
    let canonical = tokens(right).find(|t| marker_count(t) == 2)?;
    Some((apparent, canonical))
}

/// Up to two marker-tagged tokens in any order; the double-marker one is canonical.
fn parse_token_line(line: &str) -> Option<(&str, &str)> {
    let found: Vec<&str> = tokens(line).take(2).collect();
    match found.as_slice() {
        [a, b] if marker_count(a) == 1 && marker_count(b) == 2 => Some((*a, *b)),
        [a, b] if marker_count(a) == 2 && marker_count(b) == 1 => Some((*b, *a)),
        _ => None,
    }
}

/// Best-effort name mapping. A failed load leaves an empty table and is never retried.
pub struct RepoMappingResolver {
    gateway: Arc<dyn CommandGateway>,
    dump_args: Vec<String>,
    table: OnceLock<MappingTable>,
}

impl RepoMappingResolver {
    pub fn new(gateway: Arc<dyn CommandGateway>, dump_args: Vec<String>) -> Self {
        Self {
            gateway,
            dump_args,
            table: OnceLock::new(),
        }
    }

    fn table(&self) -> &MappingTable {
        self.table.get_or_init(|| self.load())
    }

    fn load(&self) -> MappingTable {
        match self.gateway.execute(&self.dump_args) {
            Ok(Some(output)) => {
                let table = MappingTable::parse(&output);
                if table.is_empty() {
                    warn!("repository mapping dump had no usable entries");
                } else {
                    debug!(entries = table.len(), "loaded repository mapping");
                }
                table
            }
            Ok(None) => {
                debug!("repository mapping dump was empty");
                MappingTable::default()
            }
            Err(err) => {
                warn!(error = %err, "repository mapping unavailable, continuing without it");
                MappingTable::default()
            }
        }
    }

    /// Whether a load has been attempted (successful or not).
    pub fn is_loaded(&self) -> bool {
        self.table.get().is_some()
    }

    /// Bare canonical name for an apparent name in any surface form.
    pub fn to_canonical(&self, name: &str) -> Option<String> {
        let key = normalize_root(bare_name(name));
        self.table().apparent_to_canonical.get(key).cloned()
    }

    /// Bare apparent name for a canonical name in any surface form.
    pub fn to_apparent(&self, name: &str) -> Option<String> {
        let key = normalize_root(bare_name(name));
        self.table().canonical_to_apparent.get(key).cloned()
    }
}

impl std::fmt::Debug for RepoMappingResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RepoMappingResolver")
            .field("dump_args", &self.dump_args)
            .field("loaded", &self.is_loaded())
            .finish()
    }
}
