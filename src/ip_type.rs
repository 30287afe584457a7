//! Type records - nodes of the classification taxonomy
//!
//! Types form a forest. Each node carries a materialized `path` (ancestor
//! names joined by `/`, ending with its own name) and a `level` (root = 0),
//! both derived from the parent chain and kept in sync by
//! [`crate::taxonomy::TypeTree`].

use rusqlite::types::Value;
use serde::{Deserialize, Serialize};
use crate::{Error, Result};
use crate::storage::{Fields, Record, Row, Table};
use crate::tree::TreeNode;

/// Separator between names in a materialized path
pub const PATH_SEPARATOR: char = '/';

/// A node in the type taxonomy (e.g. Digital → CPU → ARM)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpType {
    pub id: Option<i64>,
    pub name: String,
    pub parent_id: Option<i64>,
    /// Full ancestor-to-self name chain
    pub path: String,
    /// Depth in the forest, root = 0
    pub level: i64,
    pub description: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

impl IpType {
    /// Create a root type. Use [`IpType::placed_under`] to attach it to a parent.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: None,
            path: name.clone(),
            name,
            parent_id: None,
            level: 0,
            description: None,
            created_at: None,
            updated_at: None,
        }
    }

    /// Recompute `parent_id`, `path` and `level` for placement under `parent`
    /// (or at the root when `None`)
    pub fn placed_under(mut self, parent: Option<&IpType>) -> Self {
        match parent {
            Some(p) => {
                self.parent_id = p.id;
                self.path = child_path(&p.path, &self.name);
                self.level = p.level + 1;
            }
            None => {
                self.parent_id = None;
                self.path = self.name.clone();
                self.level = 0;
            }
        }
        self
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    /// True if `other` lies strictly below this node
    pub fn is_ancestor_of(&self, other: &IpType) -> bool {
        is_path_below(&other.path, &self.path)
    }

    /// True if this node lies strictly below `other`
    pub fn is_descendant_of(&self, other: &IpType) -> bool {
        is_path_below(&self.path, &other.path)
    }
}

/// Validate a type name: non-blank, no path separator
pub fn validate_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::Validation("type name must not be empty".to_string()));
    }
    if name.contains(PATH_SEPARATOR) {
        return Err(Error::Validation(format!(
            "type name '{}' must not contain '{}'",
            name, PATH_SEPARATOR
        )));
    }
    Ok(())
}

pub fn child_path(parent_path: &str, name: &str) -> String {
    format!("{}{}{}", parent_path, PATH_SEPARATOR, name)
}

/// `path` is strictly below `ancestor` in the materialized-path order
pub fn is_path_below(path: &str, ancestor: &str) -> bool {
    path.len() > ancestor.len() + 1
        && path.starts_with(ancestor)
        && path[ancestor.len()..].starts_with(PATH_SEPARATOR)
}

impl Record for IpType {
    const TABLE: Table = Table::Types;

    fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            id: Some(row.get_i64("id")?),
            name: row.get_string("name")?,
            parent_id: row.get_opt_i64("parent_id")?,
            path: row.get_string("path")?,
            level: row.get_i64("level")?,
            description: row.get_opt_string("description")?,
            created_at: row.get_opt_string("created_at")?,
            updated_at: row.get_opt_string("updated_at")?,
        })
    }

    fn to_fields(&self) -> Fields {
        vec![
            ("name", Value::Text(self.name.clone())),
            ("parent_id", self.parent_id.into()),
            ("path", Value::Text(self.path.clone())),
            ("level", Value::Integer(self.level)),
            ("description", self.description.clone().into()),
        ]
    }

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl TreeNode for IpType {
    fn node_id(&self) -> Option<i64> {
        self.id
    }

    fn parent(&self) -> Option<i64> {
        self.parent_id
    }

    fn label(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Display for IpType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (level {})", self.path, self.level)
    }
}
