//! Work item tracking backends.
//!
//! The importer only needs two things from a backend: create one work item
//! from a JSON Patch document, and list what already exists. Everything that
//! talks to a tracker goes through [`WorkItemTracker`].

pub mod azure;
pub mod memory;
pub mod patch;

pub use azure::AzureDevOpsClient;
pub use memory::{MemoryTracker, RecordedRequest};
pub use patch::{build_document, hierarchy_links, PatchOp, PatchOperation, Relation};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Identifier assigned to a work item by the backend.
pub type WorkItemId = u64;

/// Result type for tracker operations.
pub type TrackerResult<T> = Result<T, TrackerError>;

/// Error types for tracker operations.
#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Work item API error: {message} (status: {status})")]
    Api { status: u16, message: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Authentication failed, check the personal access token")]
    Unauthorized,

    #[error("Rate limit exceeded")]
    RateLimited,

    #[error("Unexpected response: {0}")]
    InvalidResponse(String),
}

/// A work item as returned by a successful create call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedWorkItem {
    /// Assigned identifier
    pub id: WorkItemId,
    /// REST URL of the new item, when the backend reports one
    #[serde(default)]
    pub url: Option<String>,
}

/// An existing work item as listed by the reporting query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItemSummary {
    /// Work item identifier
    pub id: WorkItemId,
    /// Work item title
    pub title: String,
}

/// A backend that can create and list work items.
#[async_trait]
pub trait WorkItemTracker: Send + Sync {
    /// Create a single work item of `type_name` in `project`.
    async fn create_work_item(
        &self,
        document: &[PatchOperation],
        project: &str,
        type_name: &str,
    ) -> TrackerResult<CreatedWorkItem>;

    /// List the work items of a project, ordered by id.
    async fn query_work_items(&self, project: &str) -> TrackerResult<Vec<WorkItemSummary>>;

    /// URL that hierarchy links use to point at work item `id`.
    fn work_item_url(&self, id: WorkItemId) -> String;

    /// Backend name for logs and output.
    fn name(&self) -> &str;
}

/// Format an existing work item for the listing output.
pub fn format_work_item_summary(item: &WorkItemSummary) -> String {
    format!("Work Item ID: {}, Title: {}", item.id, item.title)
}
