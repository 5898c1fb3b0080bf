//! Integration tests for the Jira REST client.
//!
//! A `wiremock` server stands in for the Jira instance so request shapes,
//! paging, and error mapping can be checked without network access.

use std::sync::Arc;

use futures::TryStreamExt;
use serde_json::{json, Value};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use issuelens::analysis::{
    AnalysisConfig, AnalysisError, Analyzer, DataAnomaly, PartialReason,
};
use issuelens::core::link::LinkKind;
use issuelens::core::types::{IssueKey, ProjectKey};
use issuelens::tracker::jira::{JiraAuth, JiraTracker};
use issuelens::tracker::{Tracker, TrackerError};

// =============================================================================
// Helpers
// =============================================================================

fn key(s: &str) -> IssueKey {
    IssueKey::parse(s).unwrap()
}

fn issue_json(key: &str, summary: &str, links: Value) -> Value {
    json!({
        "key": key,
        "fields": {
            "summary": summary,
            "issuetype": { "name": "Task" },
            "status": { "name": "In Progress", "statusCategory": { "key": "indeterminate" } },
            "labels": ["backend"],
            "components": [{ "name": "Auth" }],
            "issuelinks": links,
        }
    })
}

fn anonymous(server: &MockServer) -> JiraTracker {
    JiraTracker::new(server.uri(), JiraAuth::Anonymous).unwrap()
}

// =============================================================================
// fetch_issue
// =============================================================================

mod fetch {
    use super::*;

    #[tokio::test]
    async fn maps_fields_and_links() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/api/2/issue/CORE-7"))
            .and(query_param("expand", "changelog"))
            .respond_with(ResponseTemplate::new(200).set_body_json(issue_json(
                "CORE-7",
                "Login fails",
                json!([{
                    "type": { "name": "Blocks", "inward": "is blocked by", "outward": "blocks" },
                    "outwardIssue": { "key": "CORE-8" }
                }]),
            )))
            .expect(1)
            .mount(&server)
            .await;

        let raw = anonymous(&server).fetch_issue(&key("CORE-7")).await.unwrap();

        assert_eq!(raw.key, "CORE-7");
        assert_eq!(raw.summary, "Login fails");
        assert_eq!(raw.status, "In Progress");
        assert_eq!(raw.labels, vec!["backend".to_string()]);
        assert_eq!(raw.links.len(), 1);
        assert_eq!(raw.links[0].target, "CORE-8");
        assert_eq!(
            raw.url.as_deref(),
            Some(format!("{}/browse/CORE-7", server.uri()).as_str())
        );
    }

    #[tokio::test]
    async fn sends_basic_auth() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/api/2/issue/CORE-1"))
            .and(header("authorization", "Basic a2ltOnNlY3JldA=="))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(issue_json("CORE-1", "x", json!([]))),
            )
            .expect(1)
            .mount(&server)
            .await;

        let tracker = JiraTracker::new(
            server.uri(),
            JiraAuth::from_parts(Some("kim"), Some("secret")),
        )
        .unwrap();
        tracker.fetch_issue(&key("CORE-1")).await.unwrap();
    }

    #[tokio::test]
    async fn sends_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header("authorization", "Bearer pat-123"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(issue_json("CORE-1", "x", json!([]))),
            )
            .expect(1)
            .mount(&server)
            .await;

        let tracker =
            JiraTracker::new(server.uri(), JiraAuth::from_parts(None, Some("pat-123"))).unwrap();
        tracker.fetch_issue(&key("CORE-1")).await.unwrap();
    }

    #[tokio::test]
    async fn epic_loads_children() {
        let server = MockServer::start().await;
        let mut epic = issue_json("CORE-1", "Checkout epic", json!([]));
        epic["fields"]["issuetype"] = json!({ "name": "Epic" });
        Mock::given(method("GET"))
            .and(path("/rest/api/2/issue/CORE-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(epic))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/rest/api/2/search"))
            .and(query_param("jql", "parent = CORE-1 ORDER BY key ASC"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "startAt": 0,
                "total": 2,
                "issues": [{ "key": "CORE-2" }, { "key": "CORE-3" }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let raw = anonymous(&server).fetch_issue(&key("CORE-1")).await.unwrap();
        assert_eq!(raw.epic_children, vec!["CORE-2".to_string(), "CORE-3".to_string()]);
        assert_eq!(raw.epic_children_error, None);
    }

    #[tokio::test]
    async fn denied_epic_children_are_kept_as_error() {
        let server = MockServer::start().await;
        let mut epic = issue_json("CORE-1", "Checkout epic", json!([]));
        epic["fields"]["issuetype"] = json!({ "name": "Epic" });
        Mock::given(method("GET"))
            .and(path("/rest/api/2/issue/CORE-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(epic))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/rest/api/2/search"))
            .respond_with(
                ResponseTemplate::new(403).set_body_json(json!({ "errorMessages": ["forbidden"] })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let raw = anonymous(&server).fetch_issue(&key("CORE-1")).await.unwrap();
        assert_eq!(raw.summary, "Checkout epic");
        assert!(raw.epic_children.is_empty());
        assert!(matches!(
            raw.epic_children_error,
            Some(TrackerError::AccessDenied(_))
        ));
    }
}

// =============================================================================
// Error mapping
// =============================================================================

mod errors {
    use super::*;

    async fn fetch_with_status(status: u16, body: Value) -> TrackerError {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(status).set_body_json(body))
            .mount(&server)
            .await;
        anonymous(&server)
            .fetch_issue(&key("CORE-1"))
            .await
            .unwrap_err()
    }

    #[tokio::test]
    async fn not_found() {
        let err = fetch_with_status(
            404,
            json!({ "errorMessages": ["Issue does not exist or you do not have permission to see it."] }),
        )
        .await;
        assert!(matches!(err, TrackerError::NotFound(ref m) if m.contains("does not exist")));
    }

    #[tokio::test]
    async fn forbidden_is_access_denied() {
        let err = fetch_with_status(403, json!({ "errorMessages": ["forbidden"] })).await;
        assert!(matches!(err, TrackerError::AccessDenied(_)));
    }

    #[tokio::test]
    async fn unauthorized_is_auth_failure() {
        let err = fetch_with_status(401, json!({})).await;
        assert!(matches!(err, TrackerError::AuthFailed(ref m) if m == "credentials required"));
    }

    #[tokio::test]
    async fn rate_limited() {
        let err = fetch_with_status(429, json!({})).await;
        assert!(matches!(err, TrackerError::RateLimited));
    }

    #[tokio::test]
    async fn server_error_keeps_status() {
        let err = fetch_with_status(503, json!({ "errorMessages": ["maintenance"] })).await;
        assert!(matches!(err, TrackerError::Api { status: 503, .. }));
    }

    #[tokio::test]
    async fn garbage_body_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>login</html>"))
            .mount(&server)
            .await;
        let err = anonymous(&server)
            .fetch_issue(&key("CORE-1"))
            .await
            .unwrap_err();
        assert!(matches!(err, TrackerError::Malformed(_)));
    }

    #[tokio::test]
    async fn unreachable_host_is_network_error() {
        let tracker = JiraTracker::new("http://127.0.0.1:9", JiraAuth::Anonymous).unwrap();
        let err = tracker.fetch_issue(&key("CORE-1")).await.unwrap_err();
        assert!(matches!(err, TrackerError::Network(_)));
    }
}

// =============================================================================
// Search paging
// =============================================================================

mod search {
    use super::*;

    fn page(start_at: usize, total: usize, keys: &[&str]) -> ResponseTemplate {
        let issues: Vec<Value> = keys
            .iter()
            .map(|k| issue_json(k, "listed", json!([])))
            .collect();
        ResponseTemplate::new(200).set_body_json(json!({
            "startAt": start_at,
            "total": total,
            "issues": issues,
        }))
    }

    #[tokio::test]
    async fn follows_pages_until_total() {
        let server = MockServer::start().await;
        let keys: Vec<String> = (1..=60).map(|n| format!("CORE-{n}")).collect();
        let keys: Vec<&str> = keys.iter().map(String::as_str).collect();

        Mock::given(method("GET"))
            .and(path("/rest/api/2/search"))
            .and(query_param("jql", "project = CORE ORDER BY key ASC"))
            .and(query_param("startAt", "0"))
            .respond_with(page(0, 60, &keys[..50]))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/rest/api/2/search"))
            .and(query_param("startAt", "50"))
            .respond_with(page(50, 60, &keys[50..]))
            .expect(1)
            .mount(&server)
            .await;

        let tracker = anonymous(&server);
        let project = ProjectKey::new("CORE").unwrap();
        let issues: Vec<_> = tracker
            .search_issues(&project, None, 100)
            .try_collect()
            .await
            .unwrap();

        assert_eq!(issues.len(), 60);
        assert_eq!(issues[59].key, "CORE-60");
    }

    #[tokio::test]
    async fn filter_is_combined_with_project() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/api/2/search"))
            .and(query_param(
                "jql",
                "project = CORE AND (statusCategory != Done) ORDER BY key ASC",
            ))
            .respond_with(page(0, 1, &["CORE-3"]))
            .expect(1)
            .mount(&server)
            .await;

        let tracker = anonymous(&server);
        let project = ProjectKey::new("CORE").unwrap();
        let issues: Vec<_> = tracker
            .search_issues(&project, Some("statusCategory != Done"), 10)
            .try_collect()
            .await
            .unwrap();
        assert_eq!(issues.len(), 1);
    }

    #[tokio::test]
    async fn unknown_project_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/api/2/search"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "errorMessages": ["The value 'NOPE' does not exist for the field 'project'."]
            })))
            .mount(&server)
            .await;

        let tracker = anonymous(&server);
        let project = ProjectKey::new("NOPE").unwrap();
        let err = tracker
            .search_issues(&project, None, 10)
            .try_collect::<Vec<_>>()
            .await
            .unwrap_err();
        assert!(matches!(err, TrackerError::NotFound(_)));
    }
}

// =============================================================================
// Analyzer over HTTP
// =============================================================================

#[tokio::test]
async fn relationship_graph_over_http() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/api/2/issue/CORE-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(issue_json(
            "CORE-1",
            "Checkout",
            json!([
                { "type": { "name": "Blocks", "inward": "is blocked by", "outward": "blocks" },
                  "outwardIssue": { "key": "CORE-2" } },
                { "type": { "name": "Relates", "inward": "relates to", "outward": "relates to" },
                  "outwardIssue": { "key": "SEC-9" } }
            ]),
        )))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/api/2/issue/CORE-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(issue_json(
            "CORE-2",
            "Payments",
            json!([{ "type": { "name": "Blocks", "inward": "is blocked by", "outward": "blocks" },
                     "inwardIssue": { "key": "CORE-1" } }]),
        )))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/api/2/issue/SEC-9"))
        .respond_with(
            ResponseTemplate::new(403).set_body_json(json!({ "errorMessages": ["forbidden"] })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let analyzer = Analyzer::new(Arc::new(anonymous(&server)), AnalysisConfig::default());
    let report = analyzer
        .analyze_relationships(&key("CORE-1"), Some(1))
        .await
        .unwrap();

    assert_eq!(report.graph.edge_count(), 2);
    assert!(report
        .graph
        .has_edge(&key("CORE-1"), &key("CORE-2"), LinkKind::Blocks));
    assert!(report.graph.node(&key("SEC-9")).unwrap().is_unresolved());
    assert_eq!(report.graph.cross_project_edges().count(), 1);
    assert!(!report.completeness().is_complete());
}

#[tokio::test]
async fn missing_issue_over_http() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(json!({ "errorMessages": ["gone"] })),
        )
        .mount(&server)
        .await;

    let analyzer = Analyzer::new(Arc::new(anonymous(&server)), AnalysisConfig::default());
    let err = analyzer.get_issue_details(&key("CORE-5")).await.unwrap_err();
    assert!(matches!(err, AnalysisError::NotFound(_)));
}

#[tokio::test]
async fn denied_epic_children_over_http_are_partial() {
    let server = MockServer::start().await;
    let mut epic = issue_json("CORE-1", "Checkout epic", json!([]));
    epic["fields"]["issuetype"] = json!({ "name": "Epic" });
    Mock::given(method("GET"))
        .and(path("/rest/api/2/issue/CORE-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(epic))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/api/2/search"))
        .respond_with(
            ResponseTemplate::new(403).set_body_json(json!({ "errorMessages": ["forbidden"] })),
        )
        .mount(&server)
        .await;

    let analyzer = Analyzer::new(Arc::new(anonymous(&server)), AnalysisConfig::default());
    let report = analyzer
        .analyze_relationships(&key("CORE-1"), None)
        .await
        .unwrap();

    assert_eq!(report.graph.len(), 1);
    assert!(report.graph.anomalies().any(DataAnomaly::hides_links));
    assert_eq!(
        report.completeness().reasons(),
        vec![PartialReason::UnresolvedNodes]
    );
}
