//! tracker::jira
//!
//! Read-only Jira tracker over the REST v2 API.
//!
//! # Design
//!
//! Only two endpoints are used, both with `GET`:
//! - `/rest/api/2/issue/{key}?expand=changelog` for single issues
//! - `/rest/api/2/search` for paginated project searches
//!
//! The client has no code path that sends `POST`, `PUT` or `DELETE`.
//!
//! # Authentication
//!
//! - username + token: HTTP basic auth (Jira Cloud API tokens)
//! - token only: bearer auth (Data Center personal access tokens)
//! - neither: anonymous, for public instances
//!
//! # Epics
//!
//! Team-managed projects report an issue's epic as its `parent`; the parent
//! is treated as an epic when its issue type is `Epic`. Company-managed
//! projects store the epic key in a custom field whose id is configured via
//! `tracker.epic_field`. For epics, children are loaded with an extra search.
//!
//! # Example
//!
//! ```ignore
//! use issuelens::tracker::jira::{JiraAuth, JiraTracker};
//!
//! let tracker = JiraTracker::new(
//!     "https://example.atlassian.net",
//!     JiraAuth::Basic { username: "me@example.com".into(), token: "secret".into() },
//! )?;
//! let issue = tracker.fetch_issue(&"PROJ-1".parse()?).await?;
//! ```

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use reqwest::header::ACCEPT;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::traits::{RawIssue, RawLink, SearchPage, Tracker, TrackerError};
use crate::core::config::TrackerSettings;
use crate::core::issue::{ChangeEvent, Comment};
use crate::core::link::Direction;
use crate::core::types::{IssueKey, ProjectKey};

/// User-Agent header value for API requests.
const USER_AGENT_VALUE: &str = "issuelens";

/// Per-request timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum epic children loaded for one epic.
const EPIC_CHILDREN_LIMIT: usize = 100;

/// How requests authenticate.
#[derive(Clone, PartialEq, Eq)]
pub enum JiraAuth {
    /// No credentials.
    Anonymous,
    /// HTTP basic auth with an API token as password.
    Basic { username: String, token: String },
    /// Bearer token.
    Bearer { token: String },
}

impl JiraAuth {
    /// Pick the auth scheme from optional username and token.
    pub fn from_parts(username: Option<&str>, token: Option<&str>) -> Self {
        match (username, token) {
            (Some(user), Some(token)) => JiraAuth::Basic {
                username: user.to_string(),
                token: token.to_string(),
            },
            (None, Some(token)) => JiraAuth::Bearer {
                token: token.to_string(),
            },
            (_, None) => JiraAuth::Anonymous,
        }
    }

    fn scheme(&self) -> &'static str {
        match self {
            JiraAuth::Anonymous => "anonymous",
            JiraAuth::Basic { .. } => "basic",
            JiraAuth::Bearer { .. } => "bearer",
        }
    }
}

// Custom Debug to avoid exposing tokens
impl std::fmt::Debug for JiraAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JiraAuth::Anonymous => f.write_str("Anonymous"),
            JiraAuth::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("token", &"[REDACTED]")
                .finish(),
            JiraAuth::Bearer { .. } => f
                .debug_struct("Bearer")
                .field("token", &"[REDACTED]")
                .finish(),
        }
    }
}

/// Jira tracker implementation.
pub struct JiraTracker {
    client: Client,
    /// Instance base URL without trailing slash.
    base_url: String,
    auth: JiraAuth,
    /// Custom field holding the epic key (e.g. `customfield_10014`).
    epic_field: Option<String>,
}

impl std::fmt::Debug for JiraTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JiraTracker")
            .field("base_url", &self.base_url)
            .field("auth", &self.auth.scheme())
            .field("epic_field", &self.epic_field)
            .finish()
    }
}

impl JiraTracker {
    /// Create a tracker for the instance at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns `TrackerError::Network` if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>, auth: JiraAuth) -> Result<Self, TrackerError> {
        let client = Client::builder()
            .user_agent(USER_AGENT_VALUE)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| TrackerError::Network(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            auth,
            epic_field: None,
        })
    }

    /// Create a tracker from resolved connection settings.
    pub fn from_settings(settings: &TrackerSettings) -> Result<Self, TrackerError> {
        let auth = JiraAuth::from_parts(settings.username.as_deref(), settings.token.as_deref());
        let mut tracker = Self::new(settings.base_url.clone(), auth)?;
        tracker.epic_field = settings.epic_field.clone();
        Ok(tracker)
    }

    /// Set the custom field that holds the epic key (builder pattern).
    pub fn with_epic_field(mut self, field: impl Into<String>) -> Self {
        self.epic_field = Some(field.into());
        self
    }

    /// The instance base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build an authenticated `GET` request for an API path.
    fn get(&self, path: &str) -> RequestBuilder {
        let builder = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .header(ACCEPT, "application/json");

        match &self.auth {
            JiraAuth::Anonymous => builder,
            JiraAuth::Basic { username, token } => builder.basic_auth(username, Some(token)),
            JiraAuth::Bearer { token } => builder.bearer_auth(token),
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, TrackerError> {
        request
            .send()
            .await
            .map_err(|e| TrackerError::Network(e.to_string()))
    }

    /// Handle API response, mapping errors appropriately.
    async fn handle_response<T: for<'de> Deserialize<'de>>(
        &self,
        response: Response,
    ) -> Result<T, TrackerError> {
        let status = response.status();

        if status.is_success() {
            response
                .json()
                .await
                .map_err(|e| TrackerError::Malformed(format!("failed to parse response: {}", e)))
        } else {
            self.handle_error_response(response, status).await
        }
    }

    /// Handle an error response from the API.
    async fn handle_error_response<T>(
        &self,
        response: Response,
        status: StatusCode,
    ) -> Result<T, TrackerError> {
        let message = match response.json::<JiraErrorResponse>().await {
            Ok(err) => err.message(),
            Err(_) => "Unknown error".to_string(),
        };

        Err(match status {
            StatusCode::UNAUTHORIZED => TrackerError::AuthFailed(if self.auth == JiraAuth::Anonymous {
                "credentials required".to_string()
            } else {
                "invalid or expired credentials".to_string()
            }),
            StatusCode::FORBIDDEN => TrackerError::AccessDenied(message),
            StatusCode::NOT_FOUND => TrackerError::NotFound(message),
            StatusCode::TOO_MANY_REQUESTS => TrackerError::RateLimited,
            // Jira rejects searches on unknown projects as bad JQL
            StatusCode::BAD_REQUEST if message.contains("does not exist for the field 'project'") => {
                TrackerError::NotFound(message)
            }
            _ if status.is_server_error() => TrackerError::Api {
                status: status.as_u16(),
                message: format!("Jira server error: {}", message),
            },
            _ => TrackerError::Api {
                status: status.as_u16(),
                message,
            },
        })
    }

    async fn run_search(
        &self,
        jql: &str,
        start_at: usize,
        max_results: usize,
        fields: &str,
    ) -> Result<JiraSearchResponse, TrackerError> {
        let request = self.get("/rest/api/2/search").query(&[
            ("jql", jql.to_string()),
            ("startAt", start_at.to_string()),
            ("maxResults", max_results.to_string()),
            ("fields", fields.to_string()),
            ("expand", "changelog".to_string()),
        ]);
        let response = self.send(request).await?;
        self.handle_response(response).await
    }

    /// Keys of the issues in an epic.
    async fn epic_children(&self, epic: &IssueKey) -> Result<Vec<String>, TrackerError> {
        let jql = epic_children_jql(epic, self.epic_field.as_deref());
        let result = self.run_search(&jql, 0, EPIC_CHILDREN_LIMIT, "key").await?;
        Ok(result.issues.into_iter().map(|i| i.key).collect())
    }

    fn browse_url(&self, key: &str) -> String {
        format!("{}/browse/{}", self.base_url, key)
    }

    /// Convert a Jira issue payload into a raw record.
    fn convert(&self, issue: JiraIssue) -> RawIssue {
        let JiraIssue {
            key,
            fields,
            changelog,
        } = issue;
        let url = Some(self.browse_url(&key));

        let (status, status_category) = fields
            .status
            .map(|s| {
                let category = s.status_category.map(|c| c.key).unwrap_or_default();
                (s.name, category)
            })
            .unwrap_or_default();

        let mut parent = None;
        let mut epic = self
            .epic_field
            .as_deref()
            .and_then(|field| fields.extra.get(field))
            .and_then(epic_key_from_value);
        if let Some(p) = fields.parent {
            if p.is_epic() {
                epic = epic.or(Some(p.key));
            } else {
                parent = Some(p.key);
            }
        }

        let comments = fields
            .comment
            .map(|page| page.comments)
            .unwrap_or_default()
            .into_iter()
            .map(|c| Comment {
                author: display_name(c.author),
                created: c.created.as_deref().and_then(parse_jira_datetime),
                body: c.body.unwrap_or_default(),
            })
            .collect();

        let history = changelog
            .map(|c| c.histories)
            .unwrap_or_default()
            .into_iter()
            .flat_map(|h| {
                let at = h.created.as_deref().and_then(parse_jira_datetime);
                let author = display_name(h.author);
                h.items.into_iter().map(move |item| ChangeEvent {
                    field: item.field,
                    from: item.from_string,
                    to: item.to_string,
                    at,
                    author: author.clone(),
                })
            })
            .collect();

        let links = fields
            .issuelinks
            .unwrap_or_default()
            .into_iter()
            .filter_map(JiraIssueLink::into_raw)
            .collect();

        RawIssue {
            summary: fields.summary.unwrap_or_default(),
            description: fields.description.filter(|d| !d.trim().is_empty()),
            issue_type: fields.issuetype.map(|t| t.name).unwrap_or_default(),
            status,
            status_category,
            priority: fields.priority.map(|p| p.name),
            assignee: fields.assignee.map(|u| u.display_name),
            reporter: fields.reporter.map(|u| u.display_name),
            created: fields.created.as_deref().and_then(parse_jira_datetime),
            updated: fields.updated.as_deref().and_then(parse_jira_datetime),
            labels: fields.labels.unwrap_or_default(),
            components: fields
                .components
                .unwrap_or_default()
                .into_iter()
                .map(|c| c.name)
                .collect(),
            comments,
            history,
            links,
            parent,
            subtasks: fields
                .subtasks
                .unwrap_or_default()
                .into_iter()
                .map(|s| s.key)
                .collect(),
            epic,
            epic_children: Vec::new(),
            epic_children_error: None,
            url,
            key,
        }
    }
}

#[async_trait]
impl Tracker for JiraTracker {
    fn name(&self) -> &'static str {
        "jira"
    }

    async fn fetch_issue(&self, key: &IssueKey) -> Result<RawIssue, TrackerError> {
        debug!(key = %key, "GET issue");
        let request = self
            .get(&format!("/rest/api/2/issue/{}", key))
            .query(&[("expand", "changelog"), ("fields", "*all")]);
        let response = self.send(request).await?;
        let issue: JiraIssue = self.handle_response(response).await?;

        let mut raw = self.convert(issue);
        if raw.issue_type.eq_ignore_ascii_case("epic") {
            // The epic itself is still usable; the gap is reported downstream.
            match self.epic_children(key).await {
                Ok(children) => raw.epic_children = children,
                Err(err) => {
                    warn!(epic = %key, error = %err, "could not load epic children");
                    raw.epic_children_error = Some(err);
                }
            }
        }
        Ok(raw)
    }

    async fn search_page(
        &self,
        project: &ProjectKey,
        filter: Option<&str>,
        start_at: usize,
        page_size: usize,
    ) -> Result<SearchPage, TrackerError> {
        let jql = build_jql(project, filter);
        debug!(%jql, start_at, page_size, "GET search");
        let result = self.run_search(&jql, start_at, page_size, "*all").await?;

        Ok(SearchPage {
            start_at: result.start_at,
            total: result.total,
            issues: result
                .issues
                .into_iter()
                .map(|issue| self.convert(issue))
                .collect(),
        })
    }
}

/// Build the project search query: `project = KEY [AND (filter)]`.
///
/// A trailing `ORDER BY` clause in the filter is kept outside the
/// parentheses; without one, results are ordered by key.
pub fn build_jql(project: &ProjectKey, filter: Option<&str>) -> String {
    let filter = filter.map(str::trim).filter(|f| !f.is_empty());
    let (clause, order) = match filter {
        Some(f) => split_order_by(f),
        None => (None, None),
    };

    let mut jql = format!("project = {}", project);
    if let Some(clause) = clause {
        jql.push_str(&format!(" AND ({})", clause));
    }
    jql.push_str(" ORDER BY ");
    jql.push_str(order.unwrap_or("key ASC"));
    jql
}

/// Split `clause ORDER BY fields` into its two halves.
fn split_order_by(filter: &str) -> (Option<&str>, Option<&str>) {
    let lower = filter.to_ascii_lowercase();
    match lower.rfind("order by") {
        Some(pos) => {
            let clause = filter[..pos].trim();
            let order = filter[pos + "order by".len()..].trim();
            (
                (!clause.is_empty()).then_some(clause),
                (!order.is_empty()).then_some(order),
            )
        }
        None => (Some(filter), None),
    }
}

fn epic_children_jql(epic: &IssueKey, epic_field: Option<&str>) -> String {
    let custom = epic_field
        .and_then(|f| f.strip_prefix("customfield_"))
        .filter(|id| id.bytes().all(|b| b.is_ascii_digit()));
    match custom {
        Some(id) => format!("parent = {epic} OR cf[{id}] = {epic} ORDER BY key ASC"),
        None => format!("parent = {epic} ORDER BY key ASC"),
    }
}

/// Parse Jira's timestamp format (`2024-01-15T10:30:00.000+0000`), falling
/// back to RFC 3339.
pub fn parse_jira_datetime(text: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f%z")
        .or_else(|_| DateTime::parse_from_rfc3339(text))
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|naive| naive.and_utc())
        })
}

fn display_name(user: Option<JiraUser>) -> String {
    user.map(|u| u.display_name)
        .unwrap_or_else(|| "unknown".to_string())
}

/// The epic custom field is a plain key on most instances and an object
/// with a `key` on some.
fn epic_key_from_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Object(map) => map.get("key").and_then(Value::as_str).map(str::to_string),
        _ => None,
    }
}

// =============================================================================
// API payloads
// =============================================================================

#[derive(Deserialize)]
struct JiraErrorResponse {
    #[serde(default, rename = "errorMessages")]
    error_messages: Vec<String>,
    #[serde(default)]
    errors: BTreeMap<String, String>,
}

impl JiraErrorResponse {
    fn message(self) -> String {
        let mut parts = self.error_messages;
        parts.extend(self.errors.into_iter().map(|(k, v)| format!("{}: {}", k, v)));
        if parts.is_empty() {
            "Unknown error".to_string()
        } else {
            parts.join("; ")
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct JiraSearchResponse {
    #[serde(default)]
    start_at: usize,
    #[serde(default)]
    total: Option<usize>,
    #[serde(default)]
    issues: Vec<JiraIssue>,
}

#[derive(Deserialize)]
struct JiraIssue {
    key: String,
    #[serde(default)]
    fields: JiraFields,
    #[serde(default)]
    changelog: Option<JiraChangelog>,
}

#[derive(Deserialize, Default)]
struct JiraFields {
    summary: Option<String>,
    description: Option<String>,
    issuetype: Option<JiraNamed>,
    status: Option<JiraStatus>,
    priority: Option<JiraNamed>,
    assignee: Option<JiraUser>,
    reporter: Option<JiraUser>,
    created: Option<String>,
    updated: Option<String>,
    labels: Option<Vec<String>>,
    components: Option<Vec<JiraNamed>>,
    comment: Option<JiraCommentPage>,
    issuelinks: Option<Vec<JiraIssueLink>>,
    parent: Option<JiraIssueRef>,
    subtasks: Option<Vec<JiraIssueRef>>,
    /// Custom fields, looked up by id.
    #[serde(flatten)]
    extra: BTreeMap<String, Value>,
}

#[derive(Deserialize)]
struct JiraNamed {
    name: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct JiraStatus {
    name: String,
    status_category: Option<JiraStatusCategory>,
}

#[derive(Deserialize)]
struct JiraStatusCategory {
    key: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct JiraUser {
    display_name: String,
}

#[derive(Deserialize)]
struct JiraCommentPage {
    #[serde(default)]
    comments: Vec<JiraComment>,
}

#[derive(Deserialize)]
struct JiraComment {
    author: Option<JiraUser>,
    body: Option<String>,
    created: Option<String>,
}

#[derive(Deserialize)]
struct JiraChangelog {
    #[serde(default)]
    histories: Vec<JiraHistory>,
}

#[derive(Deserialize)]
struct JiraHistory {
    author: Option<JiraUser>,
    created: Option<String>,
    #[serde(default)]
    items: Vec<JiraHistoryItem>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct JiraHistoryItem {
    field: String,
    from_string: Option<String>,
    to_string: Option<String>,
}

#[derive(Deserialize)]
struct JiraIssueRef {
    key: String,
    #[serde(default)]
    fields: Option<JiraIssueRefFields>,
}

impl JiraIssueRef {
    fn is_epic(&self) -> bool {
        self.fields
            .as_ref()
            .and_then(|f| f.issuetype.as_ref())
            .is_some_and(|t| t.name.eq_ignore_ascii_case("epic"))
    }
}

#[derive(Deserialize)]
struct JiraIssueRefFields {
    issuetype: Option<JiraNamed>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct JiraIssueLink {
    #[serde(rename = "type")]
    link_type: Option<JiraLinkType>,
    inward_issue: Option<JiraIssueRef>,
    outward_issue: Option<JiraIssueRef>,
}

#[derive(Deserialize, Default)]
struct JiraLinkType {
    #[serde(default)]
    name: String,
    #[serde(default)]
    inward: String,
    #[serde(default)]
    outward: String,
}

impl JiraIssueLink {
    /// Links without either end are dropped here; everything else is passed
    /// on for resolution, including links with an empty type.
    fn into_raw(self) -> Option<RawLink> {
        let link_type = self.link_type.unwrap_or_default();
        let (direction, target) = match (self.outward_issue, self.inward_issue) {
            (Some(out), _) => (Direction::Outbound, out.key),
            (None, Some(inw)) => (Direction::Inbound, inw.key),
            (None, None) => return None,
        };
        Some(RawLink {
            type_name: link_type.name,
            inward: link_type.inward,
            outward: link_type.outward,
            direction,
            target,
        })
    }
}
