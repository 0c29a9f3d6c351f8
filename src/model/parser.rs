//! Work item document parser.
//!
//! Reads import documents from disk and validates them before anything is
//! sent to the backend.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use super::{NodePath, WorkItemSpec};

/// Result type for document loading.
pub type InputResult<T> = Result<T, InputError>;

/// Errors raised while loading an import document.
#[derive(Debug, thiserror::Error)]
pub enum InputError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid YAML document: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Work item {path}: {reason}")]
    Invalid { path: NodePath, reason: String },
}

/// Document formats accepted on input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Json,
    Yaml,
}

impl DocumentFormat {
    /// Pick the format from a file extension. Anything that is not YAML is
    /// treated as JSON.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => {
                Self::Yaml
            }
            _ => Self::Json,
        }
    }
}

/// Load and validate a forest from a file.
pub fn parse_forest(path: &Path) -> InputResult<Vec<WorkItemSpec>> {
    let content = std::fs::read_to_string(path)
        .map_err(|source| InputError::Io { path: path.to_path_buf(), source })?;
    let forest = parse_forest_str(&content, DocumentFormat::from_path(path))?;
    tracing::debug!(path = %path.display(), roots = forest.len(), "Loaded work item document");
    Ok(forest)
}

/// Parse and validate a forest from a string.
pub fn parse_forest_str(content: &str, format: DocumentFormat) -> InputResult<Vec<WorkItemSpec>> {
    let forest: Vec<WorkItemSpec> = match format {
        DocumentFormat::Json => parse_json(content)?,
        DocumentFormat::Yaml => serde_yaml::from_str(content)?,
    };
    validate_forest(&forest)?;
    Ok(forest)
}

/// JSON nesting has no depth limit; the stack grows on demand instead.
fn parse_json(content: &str) -> Result<Vec<WorkItemSpec>, serde_json::Error> {
    let mut deserializer = serde_json::Deserializer::from_str(content);
    deserializer.disable_recursion_limit();
    let stacked = serde_stacker::Deserializer::new(&mut deserializer);
    let forest = Vec::<WorkItemSpec>::deserialize(stacked)?;
    deserializer.end()?;
    Ok(forest)
}

/// Validate every node of a forest.
pub fn validate_forest(forest: &[WorkItemSpec]) -> InputResult<()> {
    let mut stack: Vec<(&WorkItemSpec, NodePath)> = forest
        .iter()
        .enumerate()
        .rev()
        .map(|(index, root)| (root, NodePath::root(index)))
        .collect();

    while let Some((item, path)) = stack.pop() {
        validate_node(item, &path)?;
        for (index, child) in item.children.iter().enumerate().rev() {
            stack.push((child, path.child(index)));
        }
    }

    Ok(())
}

fn validate_node(item: &WorkItemSpec, path: &NodePath) -> InputResult<()> {
    if item.title.trim().is_empty() {
        return Err(InputError::Invalid {
            path: path.clone(),
            reason: "title cannot be empty".to_string(),
        });
    }

    // The type is checked by the backend; a blank one only gets a warning here.
    if item.kind.trim().is_empty() {
        tracing::warn!(path = %path, title = item.title, "Work item has no type");
    }

    Ok(())
}
