//! cross-ref command - References between two projects

use anyhow::Result;

use super::parse_project_key;
use crate::analysis::CrossReferenceReport;
use crate::cli::Context;
use crate::ui::output;

/// Evidence pairs shown per reference in text mode.
const EVIDENCE_PREVIEW: usize = 5;

/// Compare two projects.
pub fn cross_ref(ctx: &Context, project_a: &str, project_b: &str) -> Result<()> {
    let project_a = parse_project_key(project_a)?;
    let project_b = parse_project_key(project_b)?;
    let analyzer = ctx.analyzer()?;

    let rt = tokio::runtime::Runtime::new()?;
    let report = rt.block_on(analyzer.cross_reference(&project_a, &project_b))?;

    if ctx.json {
        return output::json(&report);
    }
    output::print(render(&report), ctx.verbosity());
    if let Some(note) = output::completeness_note(&report.completeness) {
        output::warn(note, ctx.verbosity());
    }
    Ok(())
}

fn render(report: &CrossReferenceReport) -> String {
    let (a, b) = &report.projects;
    let mut lines = vec![format!(
        "{} ({} active issues) <-> {} ({} active issues): {} references",
        a,
        report.issues_examined.0,
        b,
        report.issues_examined.1,
        report.references.len()
    )];

    for reference in &report.references {
        lines.push(String::new());
        lines.push(format!(
            "{} \"{}\" ({} pairs)",
            reference.kind, reference.subject, reference.evidence_total
        ));
        for (left, right) in reference.evidence.iter().take(EVIDENCE_PREVIEW) {
            lines.push(format!("  {} <-> {}", left, right));
        }
        let hidden = reference.evidence_total.saturating_sub(EVIDENCE_PREVIEW);
        if hidden > 0 {
            lines.push(format!("  ... and {} more", hidden));
        }
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{Completeness, CrossReference, ReferenceKind};
    use crate::core::types::{IssueKey, ProjectKey};

    fn key(s: &str) -> IssueKey {
        IssueKey::parse(s).unwrap()
    }

    #[test]
    fn renders_references_with_evidence_preview() {
        let evidence: Vec<(IssueKey, IssueKey)> = (1..=7)
            .map(|n| (key(&format!("X-{n}")), key("Y-1")))
            .collect();
        let report = CrossReferenceReport {
            projects: (ProjectKey::new("X").unwrap(), ProjectKey::new("Y").unwrap()),
            issues_examined: (7, 1),
            references: vec![CrossReference {
                projects: (ProjectKey::new("X").unwrap(), ProjectKey::new("Y").unwrap()),
                kind: ReferenceKind::SharedComponent,
                subject: "auth".to_string(),
                evidence_total: evidence.len(),
                evidence,
                evidence_truncated: false,
            }],
            completeness: Completeness::Complete,
        };

        let text = render(&report);
        assert!(text.starts_with("X (7 active issues) <-> Y (1 active issues): 1 references"));
        assert!(text.contains("\"auth\" (7 pairs)"));
        assert!(text.contains("  X-1 <-> Y-1"));
        assert!(!text.contains("  X-6 <-> Y-1"));
        assert!(text.contains("... and 2 more"));
    }
}
