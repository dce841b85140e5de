//! Keelson - a project board store with whole-project duplication.
//!
//! This library provides the core functionality for the `keelson` CLI tool:
//! SQLite-backed storage of projects, views, buckets and tasks, an access
//! policy over user/team grants and share links, and the duplication engine
//! that clones a project into a brand-new, fully independent one.

pub mod access;
pub mod cli;
pub mod commands;
pub mod config;
pub mod duplicate;
pub mod models;
pub mod storage;


/// Library-level error type for Keelson operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Not initialized: run `keelson system init` first")]
    NotInitialized,

    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Unique constraint conflict: {0}")]
    UniqueConstraintConflict(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

/// Result type alias for Keelson operations.
pub type Result<T> = std::result::Result<T, Error>;
