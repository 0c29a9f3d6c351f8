//! Work item document schema.
//!
//! Defines the JSON structure of an import document: an ordered forest of
//! work items, each carrying its own children.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// A single work item to create, together with its nested children.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkItemSpec {
    /// Title of the work item
    pub title: String,

    /// Description (HTML or plain text, may be empty)
    pub description: String,

    /// Backend work item type (Epic, Feature, User Story, Task, ...)
    #[serde(rename = "type")]
    pub kind: String,

    /// Acceptance criteria, only sent when non-empty
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "String::is_empty"
    )]
    pub acceptance_criteria: String,

    /// Child work items, created in order after this one
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub children: Vec<WorkItemSpec>,
}

impl WorkItemSpec {
    /// Create a childless work item.
    pub fn new(title: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
            kind: kind.into(),
            acceptance_criteria: String::new(),
            children: Vec::new(),
        }
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the acceptance criteria.
    pub fn with_acceptance_criteria(mut self, criteria: impl Into<String>) -> Self {
        self.acceptance_criteria = criteria.into();
        self
    }

    /// Append a child.
    pub fn with_child(mut self, child: WorkItemSpec) -> Self {
        self.children.push(child);
        self
    }

    /// Whether acceptance criteria should be sent to the backend.
    pub fn has_acceptance_criteria(&self) -> bool {
        !self.acceptance_criteria.is_empty()
    }

    /// Number of nodes in this subtree, including this one.
    pub fn subtree_size(&self) -> usize {
        let mut count = 0;
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            count += 1;
            stack.extend(&node.children);
        }
        count
    }
}

/// Treat an explicit `null` like a missing key.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Position of a node in a forest: the index of the root followed by the
/// child index at each level below it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodePath(Vec<usize>);

impl NodePath {
    /// Path of the root at `index`.
    pub fn root(index: usize) -> Self {
        Self(vec![index])
    }

    /// Path of this node's child at `index`.
    pub fn child(&self, index: usize) -> Self {
        let mut indices = self.0.clone();
        indices.push(index);
        Self(indices)
    }

    /// Depth in the forest (roots are at depth 0).
    pub fn depth(&self) -> usize {
        self.0.len().saturating_sub(1)
    }

    /// Path of the parent node, `None` for roots.
    pub fn parent(&self) -> Option<Self> {
        (self.0.len() > 1).then(|| Self(self.0[..self.0.len() - 1].to_vec()))
    }

    /// Raw indices.
    pub fn indices(&self) -> &[usize] {
        &self.0
    }
}

impl From<Vec<usize>> for NodePath {
    fn from(indices: Vec<usize>) -> Self {
        Self(indices)
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(ToString::to_string).collect();
        write!(f, "{}", parts.join("."))
    }
}

/// Total number of nodes in a forest.
pub fn node_count(forest: &[WorkItemSpec]) -> usize {
    forest.iter().map(WorkItemSpec::subtree_size).sum()
}

/// Find the node at `path`.
pub fn node_at<'a>(forest: &'a [WorkItemSpec], path: &NodePath) -> Option<&'a WorkItemSpec> {
    let (first, rest) = path.indices().split_first()?;
    let mut node = forest.get(*first)?;
    for index in rest {
        node = node.children.get(*index)?;
    }
    Some(node)
}
