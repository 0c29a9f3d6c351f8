//! In-process tracker.
//!
//! Assigns sequential ids and records every request instead of calling a
//! server. Backs `--dry-run` and the test suites.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{
    hierarchy_links, patch, CreatedWorkItem, PatchOperation, TrackerError, TrackerResult,
    WorkItemId, WorkItemSummary, WorkItemTracker,
};

/// A creation request as received by [`MemoryTracker`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    /// Project the item was created in
    pub project: String,
    /// Requested work item type
    pub type_name: String,
    /// Patch document that was sent
    pub document: Vec<PatchOperation>,
    /// Id handed back, `None` when the request was rejected
    pub assigned_id: Option<WorkItemId>,
}

impl RecordedRequest {
    /// Title sent with the request.
    pub fn title(&self) -> Option<&str> {
        patch::field_value(&self.document, patch::TITLE_FIELD).and_then(|v| v.as_str())
    }

    /// Hierarchy link targets sent with the request.
    pub fn parent_links(&self) -> Vec<String> {
        hierarchy_links(&self.document)
    }
}

#[derive(Debug)]
struct State {
    next_id: WorkItemId,
    requests: Vec<RecordedRequest>,
    items: Vec<(String, WorkItemSummary)>,
}

/// Tracker that keeps everything in memory.
#[derive(Debug)]
pub struct MemoryTracker {
    base_url: String,
    rejected_types: HashSet<String>,
    latency: Option<Duration>,
    state: Mutex<State>,
}

impl Default for MemoryTracker {
    fn default() -> Self {
        Self::new("memory://work-items")
    }
}

impl MemoryTracker {
    /// Create a tracker whose work item URLs start with `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            rejected_types: HashSet::new(),
            latency: None,
            state: Mutex::new(State { next_id: 1, requests: Vec::new(), items: Vec::new() }),
        }
    }

    /// Reject every creation request for `type_name`, as a backend does for
    /// unknown work item types.
    pub fn reject_type(mut self, type_name: impl Into<String>) -> Self {
        self.rejected_types.insert(type_name.into());
        self
    }

    /// Suspend for `latency` before answering each request.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Every creation request received so far, in arrival order.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.lock().requests.clone()
    }

    /// Number of creation requests received so far.
    pub fn request_count(&self) -> usize {
        self.state.lock().requests.len()
    }

    /// Parse the id back out of a URL produced by [`WorkItemTracker::work_item_url`].
    pub fn id_from_url(&self, url: &str) -> Option<WorkItemId> {
        url.strip_prefix(&self.base_url)?.strip_prefix('/')?.parse().ok()
    }
}

#[async_trait]
impl WorkItemTracker for MemoryTracker {
    async fn create_work_item(
        &self,
        document: &[PatchOperation],
        project: &str,
        type_name: &str,
    ) -> TrackerResult<CreatedWorkItem> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let mut state = self.state.lock();
        let mut request = RecordedRequest {
            project: project.to_string(),
            type_name: type_name.to_string(),
            document: document.to_vec(),
            assigned_id: None,
        };

        if self.rejected_types.contains(type_name) {
            state.requests.push(request);
            return Err(TrackerError::Api {
                status: 400,
                message: format!(
                    "Work item type '{}' does not exist in project '{}'",
                    type_name, project
                ),
            });
        }

        let id = state.next_id;
        state.next_id += 1;
        request.assigned_id = Some(id);

        let title = request.title().unwrap_or_default().to_string();
        state.requests.push(request);
        state.items.push((project.to_string(), WorkItemSummary { id, title }));

        Ok(CreatedWorkItem { id, url: Some(self.work_item_url(id)) })
    }

    async fn query_work_items(&self, project: &str) -> TrackerResult<Vec<WorkItemSummary>> {
        let state = self.state.lock();
        Ok(state
            .items
            .iter()
            .filter(|(item_project, _)| item_project == project)
            .map(|(_, item)| item.clone())
            .collect())
    }

    fn work_item_url(&self, id: WorkItemId) -> String {
        format!("{}/{}", self.base_url, id)
    }

    fn name(&self) -> &str {
        "in-memory"
    }
}
