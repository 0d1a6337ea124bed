use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Result;
use colored::*;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, Color, ContentArrangement, Table};

use crate::models::{CapabilityMode, Dependency, Forge, SourceReport};

/// Render a colored terminal report.
pub fn render(
    reports: &[SourceReport],
    path: &Path,
    mode: CapabilityMode,
    verbose: bool,
    quiet: bool,
) -> Result<()> {
    let total: usize = reports.iter().map(|r| r.dependencies.len()).sum();
    let failed = reports.iter().filter(|r| r.error.is_some()).count();
    let succeeded = reports.len() - failed;

    if quiet {
        println!(
            "Total: {}  Sources ok: {}  Failed: {}",
            total,
            succeeded.to_string().green(),
            failed.to_string().red(),
        );
        return Ok(());
    }

    println!(
        "\n {} v{}",
        "bazel-depscan".bold(),
        env!("CARGO_PKG_VERSION")
    );
    println!(" Scanning: {}", path.display());
    println!(" Mode:     {}\n", mode);

    for report in reports {
        match &report.error {
            Some(err) => {
                println!(" {} {}: {}\n", "[FAIL]".red().bold(), report.source, err.red());
            }
            None if report.dependencies.is_empty() => {
                println!(" {} {}: no dependencies\n", "[ OK ]".green().bold(), report.source);
            }
            None => {
                println!(
                    " {} {}: {} dependencies\n",
                    "[ OK ]".green().bold(),
                    report.source,
                    report.dependencies.len()
                );
                render_table(&report.dependencies);
                println!();
            }
        }
    }

    println!(" ┌────────────────────────────────────────────────────┐");
    println!(" │  {:<48} │", "SUMMARY".bold());
    println!(" │  {:<48} │", format!("Total dependencies : {}", total));
    println!(
        " │  {:<48} │",
        format!("{}  Sources ok      : {:>4}", "✓".green(), succeeded)
    );
    println!(
        " │  {:<48} │",
        format!("{}  Sources failed  : {:>4}", "✗".red(), failed)
    );
    if verbose {
        println!(" │  {:<48} │", format!("   {}", summarize_forges(reports)));
    }
    println!(" └────────────────────────────────────────────────────┘\n");

    Ok(())
}

fn render_table(deps: &[Dependency]) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Forge").add_attribute(Attribute::Bold),
            Cell::new("Name").add_attribute(Attribute::Bold),
            Cell::new("Version").add_attribute(Attribute::Bold),
        ]);

    for dep in deps {
        table.add_row(vec![
            Cell::new(dep.forge.to_string()).fg(forge_color(dep.forge)),
            Cell::new(&dep.name),
            Cell::new(&dep.version),
        ]);
    }

    println!("{}", table);
}

fn forge_color(forge: Forge) -> Color {
    match forge {
        Forge::GitHub => Color::Cyan,
        Forge::GitLab => Color::Magenta,
        Forge::Maven => Color::Yellow,
        Forge::BazelRegistry => Color::Green,
    }
}

/// e.g. `[github (3), maven (2)]`, most frequent first.
fn summarize_forges(reports: &[SourceReport]) -> String {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for dep in reports.iter().flat_map(|r| &r.dependencies) {
        *counts.entry(dep.forge.to_string()).or_insert(0) += 1;
    }

    let mut pairs: Vec<(String, usize)> = counts.into_iter().collect();
    pairs.sort_by(|a, b| b.1.cmp(&a.1));

    let summary: Vec<String> = pairs
        .iter()
        .map(|(forge, cnt)| format!("{} ({})", forge, cnt))
        .collect();

    format!("[{}]", summary.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DependencySource;

    #[test]
    fn test_summarize_forges_orders_by_count() {
        let reports = vec![
            SourceReport {
                source: DependencySource::MavenInstall,
                dependencies: vec![
                    Dependency::new(Forge::Maven, "com.google.guava:guava", "32.1.3-jre"),
                    Dependency::new(Forge::Maven, "junit:junit", "4.13.2"),
                ],
                error: None,
            },
            SourceReport {
                source: DependencySource::HttpArchive,
                dependencies: vec![Dependency::new(Forge::GitHub, "madler/zlib", "v1.3.1")],
                error: None,
            },
        ];
        assert_eq!(summarize_forges(&reports), "[maven (2), github (1)]");
    }

    #[test]
    fn test_summarize_forges_empty() {
        assert_eq!(summarize_forges(&[]), "[]");
    }
}
