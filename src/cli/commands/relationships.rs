//! relationships command - Map the graph around an issue

use anyhow::Result;

use super::parse_issue_key;
use crate::analysis::{NodeState, RelationshipReport};
use crate::cli::Context;
use crate::ui::output;

/// Show the relationship graph around `key`.
pub fn relationships(ctx: &Context, key: &str, depth: Option<usize>) -> Result<()> {
    let key = parse_issue_key(key)?;
    let analyzer = ctx.analyzer()?;

    let rt = tokio::runtime::Runtime::new()?;
    let report = rt.block_on(analyzer.analyze_relationships(&key, depth))?;

    if ctx.json {
        return output::json(&report);
    }
    output::print(render(&report), ctx.verbosity());
    if let Some(note) = output::completeness_note(report.completeness()) {
        output::warn(note, ctx.verbosity());
    }
    Ok(())
}

fn render(report: &RelationshipReport) -> String {
    let graph = &report.graph;
    let mut lines = vec![format!(
        "{}: {} related issues within depth {}",
        report.root,
        report.related.len(),
        report.max_depth
    )];

    lines.push(String::new());
    lines.push("Edges:".to_string());
    if graph.edge_count() == 0 {
        lines.push("  (none)".to_string());
    }
    for edge in graph.edges() {
        let mut line = format!("  {} {} {}", edge.source, edge.kind, edge.target);
        if let Some(original) = &edge.unmapped_type {
            line.push_str(&format!(" (unmapped type \"{}\")", original));
        }
        lines.push(line);
    }

    lines.push(String::new());
    lines.push("Issues:".to_string());
    for node in graph.nodes() {
        let state = match &node.state {
            NodeState::Resolved {
                summary, status, ..
            } => format!("[{}] {}", status, summary),
            NodeState::Unresolved { error, .. } => format!("(unresolved: {})", error),
            NodeState::Truncated => "(not expanded)".to_string(),
        };
        lines.push(format!("  {:<2} {} {}", node.depth, node.key, state));
    }

    if !report.cycles.is_empty() {
        lines.push(String::new());
        lines.push("Cycles:".to_string());
        for (kind, cycles) in &report.cycles {
            for cycle in cycles {
                let keys: Vec<String> = cycle.iter().map(|k| k.to_string()).collect();
                lines.push(format!("  {}: {}", kind, keys.join(" -> ")));
            }
        }
    }

    let anomalies: Vec<_> = graph.anomalies().collect();
    if !anomalies.is_empty() {
        lines.push(String::new());
        lines.push("Data anomalies:".to_string());
        lines.push(output::format_list(&anomalies, "  - "));
    }

    lines.join("\n")
}
