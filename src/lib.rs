//! Capstan - a hierarchical task-list engine.
//!
//! This library provides the model layer for a tree-structured todo list:
//! task records with rollup-aggregated progress and effort, cascading
//! done-state transitions, a replayable undo/redo log, and a persisted
//! document format.
//!
//! The crate is UI-agnostic: rendering, input dispatch, and file pickers are
//! a caller's concern. [`workspace::Workspace`] is the intended entry point
//! for interactive callers; the lower-level modules ([`tree`], [`rollup`],
//! [`done`], [`undo`]) are usable on their own.

pub mod document;
pub mod done;
pub mod models;
pub mod rollup;
pub mod session;
pub mod tree;
pub mod undo;
pub mod workspace;

/// Library-level error type for Capstan operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Node not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Malformed document: {0}")]
    Format(String),

    #[error("Document version {found} is newer than supported version {supported}")]
    UnsupportedVersion { found: String, supported: String },
}

/// Result type alias for Capstan operations.
pub type Result<T> = std::result::Result<T, Error>;
