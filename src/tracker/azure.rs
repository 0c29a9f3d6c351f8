//! Azure DevOps Boards integration.
//!
//! Talks to the work item tracking REST API with a personal access token.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use super::{
    CreatedWorkItem, PatchOperation, TrackerError, TrackerResult, WorkItemId, WorkItemSummary,
    WorkItemTracker,
};

/// Default service root for Azure DevOps Services.
pub const DEFAULT_API_URL: &str = "https://dev.azure.com";

/// REST API version sent with every request.
pub const API_VERSION: &str = "7.1";

/// Maximum number of ids the batch work item endpoint accepts.
const MAX_BATCH_IDS: usize = 200;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Azure DevOps work item tracking client.
#[derive(Debug, Clone)]
pub struct AzureDevOpsClient {
    /// Personal access token
    token: String,
    /// Service root (https://dev.azure.com or an on-premises collection URL)
    api_url: String,
    /// Organization name
    organization: String,
    /// Project used for hierarchy link URLs
    project: String,
    /// HTTP client
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct WiqlResponse {
    #[serde(rename = "workItems", default)]
    work_items: Vec<WiqlReference>,
}

#[derive(Debug, Deserialize)]
struct WiqlReference {
    id: WorkItemId,
}

#[derive(Debug, Deserialize)]
struct WorkItemBatch {
    value: Vec<WorkItemRecord>,
}

#[derive(Debug, Deserialize)]
struct WorkItemRecord {
    id: WorkItemId,
    #[serde(default)]
    fields: WorkItemFields,
}

#[derive(Debug, Default, Deserialize)]
struct WorkItemFields {
    #[serde(rename = "System.Title", default)]
    title: String,
}

impl AzureDevOpsClient {
    /// Create a client for `organization`, linking within `project`.
    pub fn new(
        token: impl Into<String>,
        organization: impl Into<String>,
        project: impl Into<String>,
    ) -> TrackerResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("indiana/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            token: token.into(),
            api_url: DEFAULT_API_URL.to_string(),
            organization: organization.into(),
            project: project.into(),
            client,
        })
    }

    /// Point the client at a different service root.
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into().trim_end_matches('/').to_string();
        self
    }

    fn organization_url(&self) -> String {
        format!("{}/{}", self.api_url, urlencoding::encode(&self.organization))
    }

    fn project_url(&self, project: &str) -> String {
        format!("{}/{}", self.organization_url(), urlencoding::encode(project))
    }

    /// Endpoint that creates a work item of `type_name`.
    pub fn create_url(&self, project: &str, type_name: &str) -> String {
        format!(
            "{}/_apis/wit/workitems/${}?api-version={}",
            self.project_url(project),
            urlencoding::encode(type_name),
            API_VERSION
        )
    }

    /// Map non-success statuses to tracker errors.
    async fn check(response: reqwest::Response) -> TrackerResult<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(TrackerError::Unauthorized);
        }

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(TrackerError::RateLimited);
        }

        let body = response.text().await.unwrap_or_default();
        let message = error_message(&body);

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(TrackerError::NotFound(message));
        }

        Err(TrackerError::Api { status: status.as_u16(), message })
    }

    async fn fetch_titles(&self, ids: &[WorkItemId]) -> TrackerResult<Vec<WorkItemSummary>> {
        let mut items = Vec::with_capacity(ids.len());

        for chunk in ids.chunks(MAX_BATCH_IDS) {
            let id_list: Vec<String> = chunk.iter().map(ToString::to_string).collect();
            let url = format!(
                "{}/_apis/wit/workitems?ids={}&fields=System.Id,System.Title&api-version={}",
                self.organization_url(),
                id_list.join(","),
                API_VERSION
            );

            tracing::debug!(count = chunk.len(), "Fetching work item titles");

            let response =
                self.client.get(&url).basic_auth("", Some(&self.token)).send().await?;
            let batch: WorkItemBatch = Self::check(response).await?.json().await?;

            items.extend(
                batch
                    .value
                    .into_iter()
                    .map(|record| WorkItemSummary { id: record.id, title: record.fields.title }),
            );
        }

        Ok(items)
    }
}

#[async_trait]
impl WorkItemTracker for AzureDevOpsClient {
    async fn create_work_item(
        &self,
        document: &[PatchOperation],
        project: &str,
        type_name: &str,
    ) -> TrackerResult<CreatedWorkItem> {
        let url = self.create_url(project, type_name);

        let response = self
            .client
            .post(&url)
            .basic_auth("", Some(&self.token))
            .header("Content-Type", "application/json-patch+json")
            .json(document)
            .send()
            .await?;

        let created: CreatedWorkItem = Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| {
                TrackerError::InvalidResponse(format!("Failed to parse work item: {}", e))
            })?;

        Ok(created)
    }

    async fn query_work_items(&self, project: &str) -> TrackerResult<Vec<WorkItemSummary>> {
        let url =
            format!("{}/_apis/wit/wiql?api-version={}", self.project_url(project), API_VERSION);
        let body = serde_json::json!({ "query": project_query(project) });

        let response = self
            .client
            .post(&url)
            .basic_auth("", Some(&self.token))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let result: WiqlResponse = Self::check(response).await?.json().await?;
        let ids: Vec<WorkItemId> = result.work_items.iter().map(|r| r.id).collect();

        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut items = self.fetch_titles(&ids).await?;
        items.sort_by_key(|item| item.id);
        Ok(items)
    }

    fn work_item_url(&self, id: WorkItemId) -> String {
        format!("{}/{}", work_items_url(&self.api_url, &self.organization, &self.project), id)
    }

    fn name(&self) -> &str {
        "Azure DevOps"
    }
}

/// Base URL of a project's work items. Hierarchy links point below it.
pub fn work_items_url(api_url: &str, organization: &str, project: &str) -> String {
    format!(
        "{}/{}/{}/_apis/wit/workItems",
        api_url.trim_end_matches('/'),
        urlencoding::encode(organization),
        urlencoding::encode(project)
    )
}

/// WIQL query selecting every work item of a project.
pub fn project_query(project: &str) -> String {
    format!(
        "SELECT [System.Id], [System.Title] FROM WorkItems \
         WHERE [System.TeamProject] = '{}' AND [System.Id] > 0 ORDER BY [System.Id]",
        project.replace('\'', "''")
    )
}

/// Pull the `message` field out of an error body, falling back to the raw text.
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
        .unwrap_or_else(|| {
            let trimmed = body.trim();
            if trimmed.is_empty() {
                "no response body".to_string()
            } else {
                trimmed.to_string()
            }
        })
}
