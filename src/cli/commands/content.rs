//! content command - Content patterns of a project or issue set

use anyhow::{bail, Result};

use super::{parse_issue_key, parse_project_key};
use crate::analysis::{ContentReport, ContentTarget};
use crate::cli::Context;
use crate::ui::output;

/// Rows shown per section in text mode.
const TOP_ROWS: usize = 10;

/// Analyze content patterns.
///
/// With a project, `days` narrows to recently updated issues and falls back
/// to the configured window.
pub fn content(ctx: &Context, project: Option<&str>, days: Option<u32>, issues: &[String]) -> Result<()> {
    let analyzer = ctx.analyzer()?;

    let target = match project {
        Some(project) => ContentTarget::Project {
            key: parse_project_key(project)?,
            updated_within_days: Some(days.unwrap_or(analyzer.config().content_window_days)),
        },
        None if !issues.is_empty() => ContentTarget::Issues(
            issues
                .iter()
                .map(|k| parse_issue_key(k))
                .collect::<Result<Vec<_>>>()?,
        ),
        None => bail!("Give a project key or --issues"),
    };

    let rt = tokio::runtime::Runtime::new()?;
    let report = rt.block_on(analyzer.analyze_content(&target))?;

    if ctx.json {
        return output::json(&report);
    }
    output::print(render(&report), ctx.verbosity());
    if let Some(note) = output::completeness_note(&report.completeness) {
        output::warn(note, ctx.verbosity());
    }
    Ok(())
}

fn render(report: &ContentReport) -> String {
    let mut lines = vec![format!("{} issues analyzed", report.issues_analyzed)];

    section(&mut lines, "Common terms", report.common_terms.iter().map(|t| {
        format!("{:<20} {:>5} ({} issues)", t.term, t.count, t.issue_count)
    }));

    let mut labels: Vec<_> = report.labels.usage.iter().collect();
    labels.sort_by(|a, b| b.1.count.cmp(&a.1.count).then_with(|| a.0.cmp(b.0)));
    section(
        &mut lines,
        "Labels",
        labels.iter().map(|(name, usage)| format!("{:<20} {:>5}", name, usage.count)),
    );

    section(
        &mut lines,
        "Labels used together",
        report
            .labels
            .co_occurrence
            .iter()
            .map(|p| format!("{} + {}: {}", p.first, p.second, p.count)),
    );

    let mut components: Vec<_> = report.components.iter().collect();
    components.sort_by(|a, b| b.1.count.cmp(&a.1.count).then_with(|| a.0.cmp(b.0)));
    section(
        &mut lines,
        "Components",
        components.iter().map(|(name, usage)| format!("{:<20} {:>5}", name, usage.count)),
    );

    section(
        &mut lines,
        "Repetition anomalies",
        report.repetition_anomalies.iter().map(|a| {
            format!(
                "{} \"{}\" x{} (other terms average {:.1})",
                a.issue, a.term, a.count, a.average
            )
        }),
    );

    let comments = &report.comments;
    lines.push(String::new());
    lines.push(format!(
        "Comments: {} total, {:.0} characters on average, {} active days",
        comments.total,
        comments.average_length,
        comments.per_day.len()
    ));

    section(
        &mut lines,
        "Tone",
        report.tone.iter().map(|(signal, stats)| {
            format!(
                "{:<10} {} hits in {} comments on {} issues",
                signal.as_str(),
                stats.hits,
                stats.comments,
                stats.issues.len()
            )
        }),
    );

    lines.join("\n")
}

/// Append a titled section with at most `TOP_ROWS` rows; empty sections are
/// skipped.
fn section(lines: &mut Vec<String>, title: &str, rows: impl Iterator<Item = String>) {
    let rows: Vec<String> = rows.take(TOP_ROWS).collect();
    if rows.is_empty() {
        return;
    }
    lines.push(String::new());
    lines.push(format!("{}:", title));
    lines.extend(rows.into_iter().map(|r| format!("  {}", r)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::ContentAnalyzer;
    use crate::core::issue::Issue;
    use crate::core::types::IssueKey;

    #[test]
    fn renders_sections_and_skips_empty_ones() {
        let mut a = Issue::new(IssueKey::parse("A-1").unwrap(), "timeout during login");
        a.labels.insert("auth".to_string());
        let mut b = Issue::new(IssueKey::parse("A-2").unwrap(), "timeout during export");
        b.labels.insert("auth".to_string());

        let report = ContentAnalyzer::default().analyze([&a, &b]);
        let text = render(&report);

        assert!(text.starts_with("2 issues analyzed"));
        assert!(text.contains("Common terms:"));
        assert!(text.contains("timeout"));
        assert!(text.contains("Labels:"));
        assert!(!text.contains("Repetition anomalies:"));
        assert!(!text.contains("Tone:"));
        assert!(text.contains("Comments: 0 total"));
    }
}
