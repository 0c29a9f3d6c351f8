#![allow(clippy::format_push_string)]

//! # Indiana
//!
//! Bulk-import a hierarchy of work items into Azure DevOps Boards.
//!
//! The input is one JSON document: an ordered forest of work items (epics,
//! features, tasks, ...) with their children nested inline. Indiana creates
//! each item through the work item tracking API and links every child to the
//! id its parent was assigned.
//!
//! ## Quick Start
//!
//! ```bash
//! export INDIANA_TOKEN=<personal access token>
//! indiana --orchestrator azdo --organization contoso --project fabrikam --file backlog.json
//!
//! # See what would be created without touching the backend
//! indiana --orchestrator azdo --organization contoso --project fabrikam \
//!         --file backlog.json --dry-run
//! ```
//!
//! ## Partial failure
//!
//! Each item is created independently. When the backend rejects an item, its
//! children are still created without a parent link by default
//! ([`OnParentFailure::OrphanChildren`]); [`OnParentFailure::AbortSubtree`]
//! skips them instead. Runs are not idempotent: importing the same document
//! twice creates every item twice.

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
// Allow common patterns that are intentional in this codebase
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::option_if_let_else)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]

pub mod config;
pub mod materialize;
pub mod model;
pub mod tracker;

pub use config::{ConfigError, Orchestrator, RawSettings, Requirements, Settings};
pub use materialize::{
    materialize, CreationOutcome, MaterializeOptions, MaterializeReport, Materializer,
    NodeReport, OnParentFailure, ReportSummary,
};
pub use model::{parse_forest, parse_forest_str, InputError, NodePath, WorkItemSpec};
pub use tracker::{
    AzureDevOpsClient, CreatedWorkItem, MemoryTracker, PatchOperation, TrackerError, WorkItemId,
    WorkItemSummary, WorkItemTracker,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "indiana";
