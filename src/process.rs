//! Process records - the technology a set of IPs is built on

use rusqlite::types::Value;
use serde::{Deserialize, Serialize};
use crate::{Error, Result};
use crate::storage::{Fields, Record, Row, Table};

/// A fabrication process (technology node at a foundry)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Process {
    pub id: Option<i64>,
    /// Unique process name
    pub name: String,
    /// Technology node, e.g. "28nm"
    pub node: String,
    /// Foundry, e.g. "TSMC"
    pub fab: String,
    pub description: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

impl Process {
    pub fn new(name: impl Into<String>, node: impl Into<String>, fab: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            node: node.into(),
            fab: fab.into(),
            description: None,
            created_at: None,
            updated_at: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Check required fields are non-blank
    pub fn validate(&self) -> Result<()> {
        let missing: Vec<&str> = [("name", &self.name), ("node", &self.node), ("fab", &self.fab)]
            .into_iter()
            .filter(|(_, v)| v.trim().is_empty())
            .map(|(k, _)| k)
            .collect();
        if !missing.is_empty() {
            return Err(Error::Validation(format!(
                "process is missing required field(s): {}",
                missing.join(", ")
            )));
        }
        Ok(())
    }
}

impl Record for Process {
    const TABLE: Table = Table::Processes;

    fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            id: Some(row.get_i64("id")?),
            name: row.get_string("name")?,
            node: row.get_string("node")?,
            fab: row.get_string("fab")?,
            description: row.get_opt_string("description")?,
            created_at: row.get_opt_string("created_at")?,
            updated_at: row.get_opt_string("updated_at")?,
        })
    }

    fn to_fields(&self) -> Fields {
        vec![
            ("name", Value::Text(self.name.clone())),
            ("node", Value::Text(self.node.clone())),
            ("fab", Value::Text(self.fab.clone())),
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

impl std::fmt::Display for Process {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (node: {}, fab: {})", self.name, self.node, self.fab)
    }
}

/// Partial update of a process; `None` leaves the field untouched
#[derive(Debug, Clone, Default)]
pub struct ProcessUpdate {
    pub name: Option<String>,
    pub node: Option<String>,
    pub fab: Option<String>,
    pub description: Option<String>,
}

impl ProcessUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.node.is_none() && self.fab.is_none() && self.description.is_none()
    }

    pub fn apply_to(&self, process: &mut Process) {
        if let Some(name) = &self.name {
            process.name = name.clone();
        }
        if let Some(node) = &self.node {
            process.node = node.clone();
        }
        if let Some(fab) = &self.fab {
            process.fab = fab.clone();
        }
        if let Some(description) = &self.description {
            process.description = Some(description.clone());
        }
    }
}
