//! Repository name surface forms and the show-repo probing heuristic.
//!
//! A repository reference is seen *raw* (0, 1 or 2 leading `@`), *apparent*
//! (`@name`, chosen by the referencing module) or *canonical* (`@@name`,
//! unique across the build graph and often carrying a `+` or `~` suffix
//! under Bzlmod). Stripping the markers gives the bare name.

use tracing::{debug, info};

use crate::gateway::{fill_template, CommandGateway};
use crate::pipeline::mapping::{is_root, RepoMappingResolver};

pub const MARKER: char = '@';

/// Characters Bzlmod embeds in generated canonical names.
const SYNTHETIC_CHARS: [char; 2] = ['+', '~'];

pub fn bare_name(raw: &str) -> &str {
    raw.trim().trim_start_matches(MARKER)
}

pub fn marker_count(raw: &str) -> usize {
    raw.trim().chars().take_while(|c| *c == MARKER).count()
}

pub fn is_synthetic(bare: &str) -> bool {
    bare.contains(SYNTHETIC_CHARS)
}

pub fn apparent_form(bare: &str) -> String {
    format!("{MARKER}{bare}")
}

pub fn canonical_form(bare: &str) -> String {
    format!("{MARKER}{MARKER}{bare}")
}

/// Forms to probe, in order. Synthetic and canonical names are only valid
/// in the double-marker form, so the apparent form is never tried for them.
pub fn probe_order(raw: &str) -> Vec<String> {
    let bare = bare_name(raw);
    if is_synthetic(bare) || marker_count(raw) >= 2 {
        vec![canonical_form(bare)]
    } else {
        vec![apparent_form(bare), canonical_form(bare)]
    }
}

/// Run the show-repo probe for each raw name and collect the successful
/// output blocks. Individual failures only reduce the result.
pub fn probe_repositories(
    gateway: &dyn CommandGateway,
    probe: &[String],
    names: Vec<String>,
) -> Vec<String> {
    let mut blocks = Vec::new();
    let mut resolved = 0usize;
    let mut failed = 0usize;

    for raw in &names {
        if bare_name(raw).is_empty() {
            debug!(repo = %raw, "skipping root repository");
            continue;
        }

        let block = probe_order(raw).into_iter().find_map(|form| {
            match gateway.execute(&fill_template(probe, &form)) {
                Ok(Some(output)) => Some(output),
                Ok(None) => {
                    debug!(repo = %form, "probe returned no output");
                    None
                }
                Err(err) => {
                    debug!(repo = %form, error = %err, "probe failed");
                    None
                }
            }
        });

        match block {
            Some(output) => {
                resolved += 1;
                blocks.push(output);
            }
            None => {
                failed += 1;
                debug!(repo = %raw, "skipping unresolvable repository");
            }
        }
    }

    info!(resolved, failed, "repository probing finished");
    blocks
}

/// Rewrite apparent names to canonical ones where the mapping knows them and
/// drop root-module references. Unknown names pass through unchanged.
pub fn canonicalize(resolver: &RepoMappingResolver, names: Vec<String>) -> Vec<String> {
    names
        .into_iter()
        .filter(|raw| !is_root(bare_name(raw)))
        .map(|raw| {
            let bare = bare_name(&raw);
            if marker_count(&raw) >= 2 || is_synthetic(bare) {
                if let Some(apparent) = resolver.to_apparent(bare) {
                    debug!(repo = %raw, apparent = %apparent, "canonical name kept");
                }
                return raw;
            }
            match resolver.to_canonical(bare) {
                Some(canonical) if !canonical.is_empty() => canonical_form(&canonical),
                _ => raw,
            }
        })
        .collect()
}
