//! search command - List a project's issues

use anyhow::Result;

use super::parse_project_key;
use crate::analysis::{SearchCriteria, SearchResult};
use crate::cli::Context;
use crate::ui::output;

/// Search a project; `limit` falls back to the configured search limit.
pub fn search(ctx: &Context, project: &str, filter: Option<String>, limit: Option<usize>) -> Result<()> {
    let project = parse_project_key(project)?;
    let analyzer = ctx.analyzer()?;
    let criteria = SearchCriteria {
        filter,
        limit: limit.unwrap_or(analyzer.config().search_limit),
    };

    let rt = tokio::runtime::Runtime::new()?;
    let result = rt.block_on(analyzer.search(&project, &criteria))?;

    if ctx.json {
        output::json(&result)
    } else {
        output::print(render(&result), ctx.verbosity());
        if result.truncated {
            output::warn(
                format!("showing the first {} matches; raise --limit for more", result.issues.len()),
                ctx.verbosity(),
            );
        }
        Ok(())
    }
}

fn render(result: &SearchResult) -> String {
    if result.issues.is_empty() {
        return format!("No issues found in {}", result.project);
    }

    let width = result
        .issues
        .iter()
        .map(|i| i.key.to_string().len())
        .max()
        .unwrap_or(0);
    result
        .issues
        .iter()
        .map(|i| {
            format!(
                "{:<width$}  {:<12}  {}",
                i.key.to_string(),
                output::truncate(&i.status, 12),
                i.summary,
                width = width
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}
