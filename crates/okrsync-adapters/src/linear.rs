//! Linear GraphQL adapter.

use async_trait::async_trait;
use okrsync_core::{Page, Project, ProjectUpdate, WorkItem, WorkItemStatus};
use okrsync_http::{JsonHttpClient, TransportError};
use reqwest::header::AUTHORIZATION;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};

use crate::IssueTracker;

pub const LINEAR_API_URL: &str = "https://api.linear.app/graphql";
pub const ISSUES_PAGE_SIZE: u32 = 250;

/// Linear connections return newest first for `orderBy`, so `first: 1` is the latest update.
const PROJECT_QUERY: &str = r#"
query ProjectBySlug($slugId: String!) {
  projects(filter: { slugId: { eq: $slugId } }) {
    nodes {
      id
      name
      lead { name }
      state
      health
      updatedAt
      projectUpdates(first: 1, orderBy: createdAt) {
        nodes { body createdAt user { name } }
      }
    }
  }
}
"#;

const ISSUES_QUERY: &str = r#"
query IssuesByProject($projectId: ID!, $first: Int!, $after: String) {
  issues(
    filter: { project: { id: { eq: $projectId } } }
    first: $first
    after: $after
    orderBy: updatedAt
  ) {
    nodes {
      identifier
      title
      url
      updatedAt
      state { name type }
    }
    pageInfo { hasNextPage endCursor }
  }
}
"#;

#[derive(Debug, Clone)]
pub struct LinearConfig {
    pub api_key: String,
    pub api_url: String,
}

impl LinearConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_url: LINEAR_API_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LinearClient {
    http: JsonHttpClient,
    config: LinearConfig,
}

impl LinearClient {
    pub fn new(http: JsonHttpClient, config: LinearConfig) -> Self {
        Self { http, config }
    }

    async fn graphql<T: DeserializeOwned>(
        &self,
        query: &str,
        variables: JsonValue,
    ) -> Result<T, TransportError> {
        let request = self
            .http
            .post(&self.config.api_url)
            .header(AUTHORIZATION, &self.config.api_key)
            .json(&json!({ "query": query, "variables": variables }));
        let envelope: GraphQlResponse<T> = self.http.execute(request).await?;
        envelope.into_data()
    }
}

/// Linear filters projects on the short id that ends a project URL slug,
/// e.g. `9cb6b72850e3` in `authentication-workflows-9cb6b72850e3`.
pub fn slug_id_from_slug(slug: &str) -> &str {
    slug.rsplit('-').next().filter(|s| !s.is_empty()).unwrap_or(slug)
}

#[async_trait]
impl IssueTracker for LinearClient {
    async fn projects_by_slug(&self, slug: &str) -> Result<Vec<Project>, TransportError> {
        let data: ProjectsData = self
            .graphql(PROJECT_QUERY, json!({ "slugId": slug_id_from_slug(slug) }))
            .await?;
        Ok(data
            .projects
            .nodes
            .into_iter()
            .map(ProjectNode::into_project)
            .collect())
    }

    async fn work_items_page(
        &self,
        project_id: &str,
        after: Option<&str>,
    ) -> Result<Page<WorkItem>, TransportError> {
        let data: IssuesData = self
            .graphql(
                ISSUES_QUERY,
                json!({ "projectId": project_id, "first": ISSUES_PAGE_SIZE, "after": after }),
            )
            .await?;
        Ok(data.issues.into_page())
    }
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Option<Vec<GraphQlError>>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

impl<T> GraphQlResponse<T> {
    fn into_data(self) -> Result<T, TransportError> {
        if let Some(errors) = self.errors.filter(|e| !e.is_empty()) {
            let messages = errors
                .into_iter()
                .map(|e| e.message)
                .collect::<Vec<_>>()
                .join("; ");
            return Err(TransportError::GraphQl(messages));
        }
        self.data
            .ok_or_else(|| TransportError::GraphQl("response carried no data".to_string()))
    }
}

#[derive(Debug, Deserialize)]
struct Connection<T> {
    nodes: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct Named {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProjectsData {
    projects: Connection<ProjectNode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProjectNode {
    id: String,
    name: Option<String>,
    lead: Option<Named>,
    state: Option<String>,
    health: Option<String>,
    updated_at: Option<String>,
    project_updates: Option<Connection<ProjectUpdateNode>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProjectUpdateNode {
    #[serde(default)]
    body: String,
    created_at: String,
    user: Option<Named>,
}

impl ProjectNode {
    fn into_project(self) -> Project {
        let latest_update = self
            .project_updates
            .and_then(|c| c.nodes.into_iter().next())
            .map(|u| ProjectUpdate {
                author: u.user.and_then(|n| n.name),
                created_at: u.created_at,
                body: u.body,
            });
        Project {
            id: self.id,
            name: self.name,
            lead_name: self.lead.and_then(|n| n.name),
            state: self.state,
            health: self.health,
            updated_at: self.updated_at,
            latest_update,
        }
    }
}

#[derive(Debug, Deserialize)]
struct IssuesData {
    issues: IssueConnection,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IssueConnection {
    nodes: Vec<IssueNode>,
    page_info: PageInfo,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageInfo {
    #[serde(default)]
    has_next_page: bool,
    end_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IssueNode {
    identifier: Option<String>,
    title: String,
    url: Option<String>,
    #[serde(default)]
    updated_at: String,
    state: Option<IssueState>,
}

#[derive(Debug, Deserialize)]
struct IssueState {
    name: Option<String>,
    #[serde(rename = "type")]
    type_code: Option<String>,
}

impl IssueConnection {
    fn into_page(self) -> Page<WorkItem> {
        let items = self
            .nodes
            .into_iter()
            .map(|node| {
                let state = node.state;
                WorkItem {
                    identifier: node.identifier,
                    title: node.title,
                    url: node.url,
                    updated_at: node.updated_at,
                    status: WorkItemStatus {
                        type_code: state.as_ref().and_then(|s| s.type_code.clone()),
                        label: state.and_then(|s| s.name),
                    },
                }
            })
            .collect();
        Page {
            items,
            has_more: self.page_info.has_next_page,
            next_cursor: self.page_info.end_cursor,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const PROJECT_FIXTURE: &str = r#"{
        "data": {
            "projects": {
                "nodes": [
                    {
                        "id": "proj-1",
                        "name": "Authentication workflows",
                        "lead": { "name": "Sam Rivera" },
                        "state": "started",
                        "health": "onTrack",
                        "updatedAt": "2026-10-15T09:00:00.000Z",
                        "projectUpdates": {
                            "nodes": [
                                {
                                    "body": "SSO rollout at 60%.",
                                    "createdAt": "2026-10-14T16:20:00.000Z",
                                    "user": { "name": "Sam Rivera" }
                                }
                            ]
                        }
                    }
                ]
            }
        }
    }"#;

    const ISSUES_FIXTURE: &str = r#"{
        "data": {
            "issues": {
                "nodes": [
                    {
                        "identifier": "AUTH-41",
                        "title": "Enforce MFA for admins",
                        "url": "https://linear.app/acme/issue/AUTH-41",
                        "updatedAt": "2026-10-16T12:00:00.000Z",
                        "state": { "name": "In Review", "type": "started" }
                    },
                    {
                        "identifier": "AUTH-38",
                        "title": "Session revocation endpoint",
                        "url": "https://linear.app/acme/issue/AUTH-38",
                        "updatedAt": "2026-10-12T08:30:00.000Z",
                        "state": null
                    }
                ],
                "pageInfo": { "hasNextPage": true, "endCursor": "c-250" }
            }
        }
    }"#;

    #[test]
    fn project_query_asks_for_newest_update_only() {
        let compact: String = PROJECT_QUERY.split_whitespace().collect::<Vec<_>>().join(" ");
        assert!(compact.contains("projectUpdates(first: 1, orderBy: createdAt)"));
        assert!(compact.contains("projects(filter: { slugId: { eq: $slugId } })"));
    }

    #[test]
    fn parse_project_by_slug_response() {
        let envelope: GraphQlResponse<ProjectsData> = serde_json::from_str(PROJECT_FIXTURE).unwrap();
        let data = envelope.into_data().unwrap();
        let projects: Vec<Project> = data
            .projects
            .nodes
            .into_iter()
            .map(ProjectNode::into_project)
            .collect();

        assert_eq!(projects.len(), 1);
        let project = &projects[0];
        assert_eq!(project.id, "proj-1");
        assert_eq!(project.lead_name.as_deref(), Some("Sam Rivera"));
        assert_eq!(project.health.as_deref(), Some("onTrack"));
        assert_eq!(
            project.latest_update,
            Some(ProjectUpdate {
                author: Some("Sam Rivera".to_string()),
                created_at: "2026-10-14T16:20:00.000Z".to_string(),
                body: "SSO rollout at 60%.".to_string(),
            })
        );
    }

    #[test]
    fn project_without_updates_has_no_narrative() {
        let fixture = r#"{"data":{"projects":{"nodes":[
            {"id":"p","name":null,"lead":null,"state":null,"health":null,"updatedAt":null,
             "projectUpdates":{"nodes":[]}}
        ]}}}"#;
        let envelope: GraphQlResponse<ProjectsData> = serde_json::from_str(fixture).unwrap();
        let project = envelope.into_data().unwrap().projects.nodes.remove(0).into_project();
        assert_eq!(project.latest_update, None);
        assert_eq!(project.lead_name, None);
    }

    #[test]
    fn parse_issue_page_with_cursor() {
        let envelope: GraphQlResponse<IssuesData> = serde_json::from_str(ISSUES_FIXTURE).unwrap();
        let page = envelope.into_data().unwrap().issues.into_page();

        assert_eq!(page.continuation(), Some("c-250"));
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.items[0].display_title(), "AUTH-41: Enforce MFA for admins");
        assert_eq!(page.items[0].status.label.as_deref(), Some("In Review"));
        assert_eq!(page.items[0].status.type_code.as_deref(), Some("started"));
        assert_eq!(page.items[1].status, WorkItemStatus::default());
    }

    #[test]
    fn graphql_errors_become_transport_errors() {
        let envelope: GraphQlResponse<ProjectsData> = serde_json::from_str(
            r#"{"data": null, "errors": [{"message": "Authentication required"}, {"message": "rate limited"}]}"#,
        )
        .unwrap();
        let err = envelope.into_data().unwrap_err();
        assert!(matches!(&err, TransportError::GraphQl(m) if m == "Authentication required; rate limited"));
    }

    #[test]
    fn missing_data_is_an_error() {
        let envelope: GraphQlResponse<ProjectsData> = serde_json::from_str(r#"{}"#).unwrap();
        assert!(matches!(envelope.into_data(), Err(TransportError::GraphQl(_))));
    }

    #[test]
    fn slug_id_is_trailing_segment() {
        assert_eq!(slug_id_from_slug("authentication-workflows-9cb6b72850e3"), "9cb6b72850e3");
        assert_eq!(slug_id_from_slug("9cb6b72850e3"), "9cb6b72850e3");
        assert_eq!(slug_id_from_slug("trailing-"), "trailing-");
    }
}
