//! JSON Patch documents for work item creation.
//!
//! Azure DevOps creates a work item from a list of `add` operations, one per
//! field, plus one per relation.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::WorkItemSpec;

/// Title field path.
pub const TITLE_FIELD: &str = "/fields/System.Title";

/// Description field path.
pub const DESCRIPTION_FIELD: &str = "/fields/System.Description";

/// Acceptance criteria field path.
pub const ACCEPTANCE_CRITERIA_FIELD: &str = "/fields/Microsoft.VSTS.Common.AcceptanceCriteria";

/// Path that appends a relation.
pub const RELATIONS_PATH: &str = "/relations/-";

/// Relation kind that points from a child to its parent.
pub const HIERARCHY_REVERSE: &str = "System.LinkTypes.Hierarchy-Reverse";

/// Patch operation kind. Creation only ever adds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchOp {
    Add,
}

/// One entry of a JSON Patch document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchOperation {
    pub op: PatchOp,
    pub path: String,
    pub value: Value,
}

impl PatchOperation {
    /// Add a value at `path`.
    pub fn add(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self { op: PatchOp::Add, path: path.into(), value: value.into() }
    }

    /// Parse the value as a relation if this operation appends one.
    pub fn relation(&self) -> Option<Relation> {
        if self.path != RELATIONS_PATH {
            return None;
        }
        serde_json::from_value(self.value.clone()).ok()
    }
}

/// A link from the new work item to another one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relation {
    /// Link type reference name
    pub rel: String,
    /// REST URL of the linked work item
    pub url: String,
    /// Link attributes
    #[serde(default)]
    pub attributes: RelationAttributes,
}

/// Attributes attached to a relation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationAttributes {
    /// Comment shown on the link
    #[serde(default)]
    pub comment: String,
}

impl Relation {
    /// Child-to-parent hierarchy link.
    pub fn parent(url: impl Into<String>, comment: impl Into<String>) -> Self {
        Self {
            rel: HIERARCHY_REVERSE.to_string(),
            url: url.into(),
            attributes: RelationAttributes { comment: comment.into() },
        }
    }

    /// Whether this is a child-to-parent hierarchy link.
    pub fn is_hierarchy(&self) -> bool {
        self.rel == HIERARCHY_REVERSE
    }
}

/// Build the creation document for `spec`, linking it to `parent_url` if given.
pub fn build_document(spec: &WorkItemSpec, parent_url: Option<&str>) -> Vec<PatchOperation> {
    let mut document = vec![
        PatchOperation::add(TITLE_FIELD, spec.title.as_str()),
        PatchOperation::add(DESCRIPTION_FIELD, spec.description.as_str()),
    ];

    if spec.has_acceptance_criteria() {
        document.push(PatchOperation::add(
            ACCEPTANCE_CRITERIA_FIELD,
            spec.acceptance_criteria.as_str(),
        ));
    }

    if let Some(url) = parent_url {
        let relation = Relation::parent(url, spec.description.as_str());
        // Serializing a struct of strings cannot fail.
        let value = serde_json::to_value(relation).unwrap_or(Value::Null);
        document.push(PatchOperation::add(RELATIONS_PATH, value));
    }

    document
}

/// URLs of every hierarchy link in a document.
pub fn hierarchy_links(document: &[PatchOperation]) -> Vec<String> {
    document
        .iter()
        .filter_map(PatchOperation::relation)
        .filter(Relation::is_hierarchy)
        .map(|r| r.url)
        .collect()
}

/// Value of the operation at `path`, if present.
pub fn field_value<'a>(document: &'a [PatchOperation], path: &str) -> Option<&'a Value> {
    document.iter().find(|op| op.path == path).map(|op| &op.value)
}
