//! metrics command - Issue counts of a project

use std::collections::BTreeMap;

use anyhow::Result;

use super::parse_project_key;
use crate::analysis::ProjectMetrics;
use crate::cli::Context;
use crate::ui::output;

/// Count a project's issues by type, status and priority.
pub fn metrics(ctx: &Context, project: &str) -> Result<()> {
    let project = parse_project_key(project)?;
    let analyzer = ctx.analyzer()?;

    let rt = tokio::runtime::Runtime::new()?;
    let metrics = rt.block_on(analyzer.project_metrics(&project))?;

    if ctx.json {
        return output::json(&metrics);
    }
    output::print(render(&metrics), ctx.verbosity());
    if let Some(note) = output::completeness_note(&metrics.completeness) {
        output::warn(note, ctx.verbosity());
    }
    Ok(())
}

fn render(metrics: &ProjectMetrics) -> String {
    if metrics.total == 0 {
        return format!("No issues found in {}", metrics.project);
    }

    let mut lines = vec![format!("{}: {} issues", metrics.project, metrics.total)];
    for (title, counts) in [
        ("By type", &metrics.by_type),
        ("By status", &metrics.by_status),
        ("By priority", &metrics.by_priority),
    ] {
        lines.push(String::new());
        lines.push(format!("{}:", title));
        lines.extend(ranked(counts));
    }
    lines.join("\n")
}

/// Count lines, largest first.
fn ranked(counts: &BTreeMap<String, usize>) -> Vec<String> {
    let width = counts.keys().map(|name| name.chars().count()).max().unwrap_or(0);
    let mut entries: Vec<_> = counts.iter().collect();
    entries.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
    entries
        .into_iter()
        .map(|(name, count)| format!("  {:<width$}  {}", name, count, width = width))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{Completeness, NO_PRIORITY};
    use crate::core::types::ProjectKey;

    fn metrics() -> ProjectMetrics {
        ProjectMetrics {
            project: ProjectKey::new("A").unwrap(),
            total: 3,
            by_type: BTreeMap::from([("Bug".to_string(), 1), ("Story".to_string(), 2)]),
            by_status: BTreeMap::from([("Open".to_string(), 3)]),
            by_priority: BTreeMap::from([("High".to_string(), 1), (NO_PRIORITY.to_string(), 2)]),
            completeness: Completeness::default(),
        }
    }

    #[test]
    fn sections_are_ranked_by_count() {
        let text = render(&metrics());
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "A: 3 issues");
        assert_eq!(lines[2], "By type:");
        assert_eq!(lines[3], "  Story  2");
        assert_eq!(lines[4], "  Bug    1");
        assert!(text.contains("  No Priority  2"));
    }

    #[test]
    fn empty_project() {
        let mut empty = metrics();
        empty.total = 0;
        assert_eq!(render(&empty), "No issues found in A");
    }
}
