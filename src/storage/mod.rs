//! Storage Layer - SQLite-backed persistence
//!
//! System of record is SQLite with tables:
//! - processes(id, name, node, fab, description)
//! - types(id, name, parent_id, path, level, description)
//! - ips(id, name, type_id, process_id, parent_ip_id, revision, status, provider, description, documentation)

pub mod gateway;
pub mod schema;
pub mod sqlite;

pub use gateway::{Condition, Fields, Gateway, Predicate, Record, Row, Table};
pub use sqlite::{SqliteStore, DbStats};
