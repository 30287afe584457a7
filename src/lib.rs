//! # IPLM - IP Lifecycle Management
//!
//! Tracks semiconductor IP cores, the processes that produce them, and a
//! hierarchical classification taxonomy.
//!
//! IPLM provides:
//! - Entity records for Processes, Types and IPs with validation
//! - A materialized-path Type forest (path/level kept in sync on insert and move)
//! - An IP composition forest (SoC → Subsystem → Core)
//! - Tree-aware search ("every IP whose type is under Digital")
//! - Explicit, reportable cascading deletes
//! - SQLite-backed storage behind a narrow gateway trait

pub mod status;
pub mod process;
pub mod ip_type;
pub mod ip;
pub mod storage;
pub mod tree;
pub mod cascade;
pub mod taxonomy;
pub mod hierarchy;
pub mod find;
pub mod lifecycle;
pub mod config;
pub mod ui;

// Re-exports for convenient access
pub use status::IpStatus;
pub use process::{Process, ProcessUpdate};
pub use ip_type::IpType;
pub use ip::{Ip, IpUpdate, NewIp};
pub use storage::{Gateway, SqliteStore};
pub use tree::{Forest, Nested, TreeNode};
pub use cascade::{CascadePlan, CascadePolicy, CascadeReport};
pub use taxonomy::TypeTree;
pub use hierarchy::IpHierarchy;
pub use find::{FindCriteria, Finder};
pub use lifecycle::Lifecycle;

/// Result type alias for IPLM operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for IPLM operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A referenced entity is absent (by id or unique name)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Missing required field, invalid enum value or uniqueness collision
    #[error("Validation error: {0}")]
    Validation(String),

    /// A re-parent would make a node its own ancestor
    #[error("Cycle error: {0}")]
    Cycle(String),

    /// Stored data violates a structural invariant (e.g. a dangling parent link)
    #[error("Integrity error: {0}")]
    Integrity(String),

    /// The delete has dependents and the cascade was not acknowledged
    #[error("Cascade required: {0}")]
    CascadeRequired(CascadePlan),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
