//! issue command - Show one issue in full

use anyhow::Result;

use super::parse_issue_key;
use crate::analysis::IssueDetails;
use crate::cli::Context;
use crate::ui::output;

/// Characters of each comment shown in text mode.
const COMMENT_PREVIEW: usize = 200;

/// Show an issue.
pub fn issue(ctx: &Context, key: &str) -> Result<()> {
    let key = parse_issue_key(key)?;
    let analyzer = ctx.analyzer()?;

    let rt = tokio::runtime::Runtime::new()?;
    let details = rt.block_on(analyzer.get_issue_details(&key))?;

    if ctx.json {
        output::json(&details)
    } else {
        output::print(render(&details), ctx.verbosity());
        Ok(())
    }
}

fn render(details: &IssueDetails) -> String {
    let issue = &details.issue;
    let mut lines = vec![
        format!("{}  {}", issue.key, issue.summary),
        format!(
            "Type: {}  Status: {} ({})  Priority: {}",
            issue.issue_type,
            issue.status,
            issue.status_category,
            issue.priority.as_deref().unwrap_or("-")
        ),
        format!(
            "Assignee: {}  Reporter: {}",
            issue.assignee.as_deref().unwrap_or("unassigned"),
            issue.reporter.as_deref().unwrap_or("-")
        ),
    ];

    if !issue.labels.is_empty() {
        lines.push(format!("Labels: {}", join(&issue.labels)));
    }
    if !issue.components.is_empty() {
        lines.push(format!("Components: {}", join(&issue.components)));
    }
    if let Some(url) = &issue.url {
        lines.push(format!("URL: {}", url));
    }

    if let Some(description) = issue.description.as_deref().filter(|d| !d.trim().is_empty()) {
        lines.push(String::new());
        lines.push("Description:".to_string());
        lines.extend(description.lines().map(|l| format!("  {}", l)));
    }

    if !issue.links.is_empty() {
        lines.push(String::new());
        lines.push("Links:".to_string());
        for link in &issue.links {
            let mut line = format!("  {} {}", link.kind, link.target);
            if let Some(original) = &link.unmapped_type {
                line.push_str(&format!(" (unmapped type \"{}\")", original));
            }
            lines.push(line);
        }
    }

    if !issue.comments.is_empty() {
        lines.push(String::new());
        lines.push(format!("Comments ({}):", issue.comments.len()));
        for comment in &issue.comments {
            lines.push(format!(
                "  [{} {}] {}",
                comment
                    .created
                    .map(|at| at.format("%Y-%m-%d").to_string())
                    .unwrap_or_else(|| "undated".to_string()),
                comment.author,
                output::truncate(&comment.body.replace('\n', " "), COMMENT_PREVIEW)
            ));
        }
    }

    if !issue.history.is_empty() {
        lines.push(String::new());
        lines.push(format!("History: {} changes", issue.history.len()));
    }

    if !details.anomalies.is_empty() {
        lines.push(String::new());
        lines.push("Data anomalies:".to_string());
        lines.push(output::format_list(&details.anomalies, "  - "));
    }

    lines.join("\n")
}

fn join<'a>(names: impl IntoIterator<Item = &'a String>) -> String {
    names
        .into_iter()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}
