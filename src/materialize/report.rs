//! Materialization results.

use serde::Serialize;

use crate::model::{NodePath, WorkItemSpec};
use crate::tracker::WorkItemId;

/// What happened to a single work item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CreationOutcome {
    /// The backend created the item
    Created { id: WorkItemId },
    /// The backend rejected the item or the request failed
    Failed { reason: String },
    /// Never submitted because an ancestor failed under `abort-subtree`
    Skipped { failed_ancestor: NodePath },
}

impl CreationOutcome {
    /// Remote id, if the item was created.
    pub fn id(&self) -> Option<WorkItemId> {
        match self {
            Self::Created { id } => Some(*id),
            _ => None,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, Self::Created { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped { .. })
    }
}

/// Outcome for one node of the input forest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeReport {
    /// Position in the input forest
    pub path: NodePath,
    /// Work item title
    pub title: String,
    /// Work item type
    #[serde(rename = "type")]
    pub kind: String,
    /// Remote id of the parent this item was linked to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<WorkItemId>,
    /// Path of the parent whose failure left this item unlinked
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_parent: Option<NodePath>,
    /// Result of the creation attempt
    #[serde(flatten)]
    pub outcome: CreationOutcome,
}

impl NodeReport {
    pub(crate) fn new(spec: &WorkItemSpec, path: NodePath, outcome: CreationOutcome) -> Self {
        Self {
            path,
            title: spec.title.clone(),
            kind: spec.kind.clone(),
            parent_id: None,
            failed_parent: None,
            outcome,
        }
    }

    /// Whether the item was meant to have a parent but was created without one.
    pub fn is_orphan(&self) -> bool {
        self.failed_parent.is_some() && !self.outcome.is_skipped()
    }
}

/// Counts over a whole report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReportSummary {
    pub total: usize,
    pub created: usize,
    pub failed: usize,
    pub orphaned: usize,
    pub skipped: usize,
}

/// Per-node outcomes of one materialization pass, in pre-order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MaterializeReport {
    /// Target project
    pub project: String,
    /// One entry per input node, parents before children
    pub nodes: Vec<NodeReport>,
}

impl MaterializeReport {
    /// Outcome of the node at `path`.
    pub fn get(&self, path: &NodePath) -> Option<&NodeReport> {
        self.nodes.iter().find(|n| &n.path == path)
    }

    /// Remote id of the node at `path`, if it was created.
    pub fn remote_id(&self, path: &NodePath) -> Option<WorkItemId> {
        self.get(path).and_then(|n| n.outcome.id())
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Whether any node failed or was skipped.
    pub fn has_failures(&self) -> bool {
        self.nodes.iter().any(|n| !n.outcome.is_created())
    }

    pub fn summary(&self) -> ReportSummary {
        ReportSummary {
            total: self.nodes.len(),
            created: self.nodes.iter().filter(|n| n.outcome.is_created()).count(),
            failed: self.nodes.iter().filter(|n| n.outcome.is_failed()).count(),
            orphaned: self.nodes.iter().filter(|n| n.is_orphan()).count(),
            skipped: self.nodes.iter().filter(|n| n.outcome.is_skipped()).count(),
        }
    }

    /// Nodes that did not get created.
    pub fn failures(&self) -> impl Iterator<Item = &NodeReport> {
        self.nodes.iter().filter(|n| !n.outcome.is_created())
    }
}

/// Format one node for display, indented by depth.
pub fn format_node(node: &NodeReport) -> String {
    let indent = "  ".repeat(node.path.depth());
    let orphan = if node.is_orphan() { " (orphaned)" } else { "" };

    match &node.outcome {
        CreationOutcome::Created { id } => {
            format!("{}✓ {} #{}: {}{}", indent, node.kind, id, node.title, orphan)
        }
        CreationOutcome::Failed { reason } => {
            format!("{}✗ {}: {} - {}{}", indent, node.kind, node.title, reason, orphan)
        }
        CreationOutcome::Skipped { failed_ancestor } => format!(
            "{}○ {}: {} - skipped, ancestor {} failed",
            indent, node.kind, node.title, failed_ancestor
        ),
    }
}

/// Format summary counts for display.
pub fn format_summary(summary: &ReportSummary) -> String {
    let mut line = format!(
        "Created: {}  Failed: {}  Orphaned: {}",
        summary.created, summary.failed, summary.orphaned
    );
    if summary.skipped > 0 {
        line.push_str(&format!("  Skipped: {}", summary.skipped));
    }
    line
}

/// Format a whole report: one line per node, then the summary.
pub fn format_report(report: &MaterializeReport) -> String {
    let mut out: Vec<String> = report.nodes.iter().map(format_node).collect();
    out.push(String::new());
    out.push(format_summary(&report.summary()));
    out.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(path: Vec<usize>, outcome: CreationOutcome) -> NodeReport {
        NodeReport::new(&WorkItemSpec::new("Item", "Task"), NodePath::from(path), outcome)
    }

    #[test]
    fn test_summary_counts() {
        let mut orphan = node(vec![0, 0], CreationOutcome::Created { id: 2 });
        orphan.failed_parent = Some(NodePath::root(0));
        let mut skipped =
            node(vec![0, 1], CreationOutcome::Skipped { failed_ancestor: NodePath::root(0) });
        skipped.failed_parent = Some(NodePath::root(0));

        let report = MaterializeReport {
            project: "p".to_string(),
            nodes: vec![
                node(vec![0], CreationOutcome::Failed { reason: "bad".to_string() }),
                orphan,
                skipped,
                node(vec![1], CreationOutcome::Created { id: 3 }),
            ],
        };

        let summary = report.summary();
        assert_eq!(
            summary,
            ReportSummary { total: 4, created: 2, failed: 1, orphaned: 1, skipped: 1 }
        );
        assert!(report.has_failures());
        assert_eq!(report.failures().count(), 2);
        assert_eq!(report.remote_id(&NodePath::root(1)), Some(3));
        assert_eq!(report.remote_id(&NodePath::root(0)), None);
    }

    #[test]
    fn test_format_node() {
        let created = node(vec![0, 1], CreationOutcome::Created { id: 12 });
        assert_eq!(format_node(&created), "  ✓ Task #12: Item");

        let mut failed = node(vec![0], CreationOutcome::Failed { reason: "rejected".to_string() });
        assert_eq!(format_node(&failed), "✗ Task: Item - rejected");
        failed.failed_parent = Some(NodePath::root(3));
        assert!(format_node(&failed).ends_with("(orphaned)"));
    }

    #[test]
    fn test_format_summary_hides_zero_skipped() {
        let summary = ReportSummary { total: 3, created: 3, ..Default::default() };
        assert_eq!(format_summary(&summary), "Created: 3  Failed: 0  Orphaned: 0");
    }

    #[test]
    fn test_serialize_outcome_inline() {
        let json = serde_json::to_value(node(vec![2], CreationOutcome::Created { id: 5 })).unwrap();
        assert_eq!(json["status"], "created");
        assert_eq!(json["id"], 5);
        assert_eq!(json["path"], serde_json::json!([2]));
        assert!(json.get("parent_id").is_none());
    }
}
