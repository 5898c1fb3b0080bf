//! config command - Show the effective configuration
//!
//! Tokens are never printed; only whether one is set.

use anyhow::Result;
use serde::Serialize;

use crate::analysis::AnalysisConfig;
use crate::cli::Context;
use crate::core::config::Config;
use crate::ui::output;

#[derive(Debug, Serialize)]
struct ConfigView {
    global_config: Option<String>,
    workspace_config: Option<String>,
    tracker: Option<TrackerView>,
    analysis: AnalysisView,
}

#[derive(Debug, Serialize)]
struct TrackerView {
    base_url: String,
    username: Option<String>,
    token_set: bool,
    epic_field: Option<String>,
}

#[derive(Debug, Serialize)]
struct AnalysisView {
    max_depth: usize,
    max_concurrency: usize,
    time_budget_secs: Option<u64>,
    search_limit: usize,
    content_window_days: u32,
    common_term_ratio: f64,
    top_terms: usize,
    anomaly_factor: f64,
    anomaly_min_repeats: usize,
    max_evidence_pairs: usize,
    detect_mentions: bool,
}

impl From<&AnalysisConfig> for AnalysisView {
    fn from(config: &AnalysisConfig) -> Self {
        Self {
            max_depth: config.max_depth,
            max_concurrency: config.max_concurrency,
            time_budget_secs: config.time_budget.map(|d| d.as_secs()),
            search_limit: config.search_limit,
            content_window_days: config.content_window_days,
            common_term_ratio: config.content.common_term_ratio,
            top_terms: config.content.top_terms,
            anomaly_factor: config.content.anomaly_factor,
            anomaly_min_repeats: config.content.anomaly_min_repeats,
            max_evidence_pairs: config.crossref.max_evidence_pairs,
            detect_mentions: config.crossref.detect_mentions,
        }
    }
}

fn view(config: &Config) -> ConfigView {
    ConfigView {
        global_config: config
            .global_config_loaded_from()
            .map(|p| p.display().to_string()),
        workspace_config: config
            .workspace_config_loaded_from()
            .map(|p| p.display().to_string()),
        tracker: config.tracker_settings().ok().map(|s| TrackerView {
            base_url: s.base_url,
            username: s.username,
            token_set: s.token.is_some(),
            epic_field: s.epic_field,
        }),
        analysis: AnalysisView::from(&config.analysis_config()),
    }
}

fn render(view: &ConfigView) -> String {
    let or_unset = |v: &Option<String>| v.clone().unwrap_or_else(|| "(not set)".to_string());
    let a = &view.analysis;

    let mut lines = vec![
        "# Sources".to_string(),
        format!("global = {}", or_unset(&view.global_config)),
        format!("workspace = {}", or_unset(&view.workspace_config)),
        String::new(),
        "# Tracker".to_string(),
    ];
    match &view.tracker {
        Some(t) => {
            lines.push(format!("tracker.base_url = {}", t.base_url));
            lines.push(format!("tracker.username = {}", or_unset(&t.username)));
            lines.push(format!(
                "tracker.token = {}",
                if t.token_set { "(set)" } else { "(not set)" }
            ));
            lines.push(format!("tracker.epic_field = {}", or_unset(&t.epic_field)));
        }
        None => lines.push("tracker.base_url = (not set)".to_string()),
    }
    lines.extend([
        String::new(),
        "# Analysis".to_string(),
        format!("analysis.max_depth = {}", a.max_depth),
        format!("analysis.max_concurrency = {}", a.max_concurrency),
        format!(
            "analysis.time_budget_secs = {}",
            a.time_budget_secs
                .map_or_else(|| "(unbounded)".to_string(), |s| s.to_string())
        ),
        format!("analysis.search_limit = {}", a.search_limit),
        format!("analysis.content_window_days = {}", a.content_window_days),
        format!("content.common_term_ratio = {}", a.common_term_ratio),
        format!("content.top_terms = {}", a.top_terms),
        format!("content.anomaly_factor = {}", a.anomaly_factor),
        format!("content.anomaly_min_repeats = {}", a.anomaly_min_repeats),
        format!("crossref.max_evidence_pairs = {}", a.max_evidence_pairs),
        format!("crossref.detect_mentions = {}", a.detect_mentions),
    ]);
    lines.join("\n")
}

/// Print the effective configuration.
pub fn config(ctx: &Context) -> Result<()> {
    let config = ctx.load_config()?;
    let view = view(&config);

    if ctx.json {
        output::json(&view)
    } else {
        output::print(render(&view), ctx.verbosity());
        Ok(())
    }
}
