//! Hierarchy materialization.
//!
//! Turns an input forest into remote work items. The backend only creates one
//! item at a time and only accepts a parent reference once the parent's id is
//! known, so the walk is strictly top-down: a node is submitted only after its
//! parent has settled.
//!
//! What happens below a parent whose creation failed is decided by
//! [`OnParentFailure`]. The default keeps going and creates the children
//! without a parent link, so one rejected item never drops a whole subtree.

mod report;

pub use report::{
    format_node, format_report, format_summary, CreationOutcome, MaterializeReport, NodeReport,
    ReportSummary,
};

use futures::future::{join_all, BoxFuture};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;

use crate::model::{node_count, NodePath, WorkItemSpec};
use crate::tracker::{build_document, WorkItemId, WorkItemTracker};

/// Policy applied to the descendants of a node whose creation failed.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum OnParentFailure {
    /// Create the children anyway, without a parent link
    #[default]
    OrphanChildren,
    /// Do not submit any descendant of the failed node
    AbortSubtree,
}

/// Options for a materialization pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaterializeOptions {
    /// What to do below a failed node
    pub on_parent_failure: OnParentFailure,
    /// Maximum number of creation requests in flight. 1 walks the forest
    /// sequentially in document order.
    pub concurrency: usize,
}

impl Default for MaterializeOptions {
    fn default() -> Self {
        Self { on_parent_failure: OnParentFailure::default(), concurrency: 1 }
    }
}

/// Parent state handed to a node before it is submitted. Built only from the
/// parent's settled outcome and consumed once.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ParentLink {
    /// Root of the forest
    Root,
    /// Parent exists remotely
    Linked(WorkItemId),
    /// Parent failed, create without a link
    Orphaned { failed_parent: NodePath },
    /// An ancestor failed under `abort-subtree`, do not submit
    Skip { failed_ancestor: NodePath },
}

struct PendingNode<'f> {
    spec: &'f WorkItemSpec,
    path: NodePath,
    link: ParentLink,
}

/// Creates a forest of work items through a [`WorkItemTracker`].
pub struct Materializer<'a, T: ?Sized> {
    tracker: &'a T,
    project: &'a str,
    options: MaterializeOptions,
}

impl<'a, T: WorkItemTracker + ?Sized> Materializer<'a, T> {
    /// Create a materializer targeting `project`.
    pub fn new(tracker: &'a T, project: &'a str) -> Self {
        Self { tracker, project, options: MaterializeOptions::default() }
    }

    pub fn with_options(mut self, options: MaterializeOptions) -> Self {
        self.options = options;
        self.options.concurrency = self.options.concurrency.max(1);
        self
    }

    pub fn with_policy(mut self, policy: OnParentFailure) -> Self {
        self.options.on_parent_failure = policy;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.options.concurrency = concurrency.max(1);
        self
    }

    pub fn options(&self) -> MaterializeOptions {
        self.options
    }

    /// Create every node of `forest`. Never fails as a whole: each node's
    /// outcome is in the returned report, in pre-order.
    pub async fn materialize(&self, forest: &[WorkItemSpec]) -> MaterializeReport {
        tracing::info!(
            tracker = self.tracker.name(),
            project = self.project,
            nodes = node_count(forest),
            policy = ?self.options.on_parent_failure,
            concurrency = self.options.concurrency,
            "Creating work items"
        );

        let nodes = if self.options.concurrency <= 1 {
            self.run_sequential(forest).await
        } else {
            self.run_concurrent(forest).await
        };

        MaterializeReport { project: self.project.to_string(), nodes }
    }

    /// Depth-first worklist. Children are pushed in reverse so they pop in
    /// document order, right after their parent.
    async fn run_sequential(&self, forest: &[WorkItemSpec]) -> Vec<NodeReport> {
        let mut reports = Vec::with_capacity(node_count(forest));
        let mut pending: Vec<PendingNode<'_>> = forest
            .iter()
            .enumerate()
            .rev()
            .map(|(index, spec)| PendingNode {
                spec,
                path: NodePath::root(index),
                link: ParentLink::Root,
            })
            .collect();

        while let Some(node) = pending.pop() {
            let report = self.settle(node.spec, node.path, node.link).await;
            let link = self.child_link(&report);

            for (index, child) in node.spec.children.iter().enumerate().rev() {
                pending.push(PendingNode {
                    spec: child,
                    path: report.path.child(index),
                    link: link.clone(),
                });
            }

            reports.push(report);
        }

        reports
    }

    async fn run_concurrent(&self, forest: &[WorkItemSpec]) -> Vec<NodeReport> {
        let permits = Semaphore::new(self.options.concurrency);
        let roots = forest.iter().enumerate().map(|(index, spec)| {
            self.materialize_subtree(spec, NodePath::root(index), ParentLink::Root, &permits)
        });

        join_all(roots).await.into_iter().flatten().collect()
    }

    /// Settle one node, then run its child subtrees side by side. Results come
    /// back in pre-order whatever order the requests complete in.
    fn materialize_subtree<'s>(
        &'s self,
        spec: &'s WorkItemSpec,
        path: NodePath,
        link: ParentLink,
        permits: &'s Semaphore,
    ) -> BoxFuture<'s, Vec<NodeReport>> {
        async move {
            let report = {
                let _permit = match link {
                    ParentLink::Skip { .. } => None,
                    _ => permits.acquire().await.ok(),
                };
                self.settle(spec, path, link).await
            };

            let link = self.child_link(&report);
            let children = spec.children.iter().enumerate().map(|(index, child)| {
                self.materialize_subtree(child, report.path.child(index), link.clone(), permits)
            });
            let subtrees = join_all(children).await;

            let mut reports = Vec::with_capacity(spec.subtree_size());
            reports.push(report);
            reports.extend(subtrees.into_iter().flatten());
            reports
        }
        .boxed()
    }

    /// Submit a single node (or record it as skipped).
    async fn settle(&self, spec: &WorkItemSpec, path: NodePath, link: ParentLink) -> NodeReport {
        let (parent_id, failed_parent) = match link {
            ParentLink::Root => (None, None),
            ParentLink::Linked(id) => (Some(id), None),
            ParentLink::Orphaned { failed_parent } => (None, Some(failed_parent)),
            ParentLink::Skip { failed_ancestor } => {
                tracing::debug!(
                    path = %path,
                    title = spec.title,
                    ancestor = %failed_ancestor,
                    "Skipping work item"
                );
                let parent = path.parent();
                let mut report =
                    NodeReport::new(spec, path, CreationOutcome::Skipped { failed_ancestor });
                report.failed_parent = parent;
                return report;
            }
        };

        if let Some(ref failed) = failed_parent {
            tracing::warn!(
                path = %path,
                title = spec.title,
                parent = %failed,
                "Parent was not created, creating without a link"
            );
        }

        let parent_url = parent_id.map(|id| self.tracker.work_item_url(id));
        let document = build_document(spec, parent_url.as_deref());

        tracing::debug!(
            path = %path,
            title = spec.title,
            kind = spec.kind,
            parent = ?parent_id,
            "Submitting work item"
        );

        let submitted = self.tracker.create_work_item(&document, self.project, &spec.kind).await;
        let outcome = match submitted {
            Ok(created) => {
                tracing::info!(
                    path = %path,
                    id = created.id,
                    title = spec.title,
                    "Created work item"
                );
                CreationOutcome::Created { id: created.id }
            }
            Err(e) => {
                tracing::warn!(
                    path = %path,
                    title = spec.title,
                    kind = spec.kind,
                    error = %e,
                    "Failed to create work item"
                );
                CreationOutcome::Failed { reason: e.to_string() }
            }
        };

        let mut report = NodeReport::new(spec, path, outcome);
        report.parent_id = parent_id;
        report.failed_parent = failed_parent;
        report
    }

    /// Link handed to the children of a settled node.
    fn child_link(&self, report: &NodeReport) -> ParentLink {
        match &report.outcome {
            CreationOutcome::Created { id } => ParentLink::Linked(*id),
            CreationOutcome::Failed { .. } => match self.options.on_parent_failure {
                OnParentFailure::OrphanChildren => {
                    ParentLink::Orphaned { failed_parent: report.path.clone() }
                }
                OnParentFailure::AbortSubtree => {
                    ParentLink::Skip { failed_ancestor: report.path.clone() }
                }
            },
            CreationOutcome::Skipped { failed_ancestor } => {
                ParentLink::Skip { failed_ancestor: failed_ancestor.clone() }
            }
        }
    }
}

/// Create `forest` in `project` with default options.
pub async fn materialize<T: WorkItemTracker + ?Sized>(
    tracker: &T,
    forest: &[WorkItemSpec],
    project: &str,
) -> MaterializeReport {
    Materializer::new(tracker, project).materialize(forest).await
}
