//! IP records - the tracked semiconductor IP cores
//!
//! Each IP references exactly one Type and one Process, and may reference a
//! parent IP. The parent links form a second forest, independent of the type
//! taxonomy, used for subsystem composition (SoC → CPU Subsystem → Core).

use rusqlite::types::Value;
use serde::{Deserialize, Serialize};
use crate::{Error, Result};
use crate::status::IpStatus;
use crate::storage::{Fields, Record, Row, Table};
use crate::tree::TreeNode;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ip {
    pub id: Option<i64>,
    /// Unique IP name
    pub name: String,
    pub type_id: i64,
    pub process_id: i64,
    pub parent_ip_id: Option<i64>,
    /// Free-form version string
    pub revision: String,
    pub status: IpStatus,
    pub provider: String,
    pub description: Option<String>,
    /// Documentation URL
    pub documentation: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

impl Ip {
    pub fn is_root(&self) -> bool {
        self.parent_ip_id.is_none()
    }
}

impl Record for Ip {
    const TABLE: Table = Table::Ips;

    fn from_row(row: &Row) -> Result<Self> {
        let status_str = row.get_string("status")?;
        let status = status_str.parse().map_err(|_| {
            Error::Integrity(format!("stored status '{}' is not a known status", status_str))
        })?;

        Ok(Self {
            id: Some(row.get_i64("id")?),
            name: row.get_string("name")?,
            type_id: row.get_i64("type_id")?,
            process_id: row.get_i64("process_id")?,
            parent_ip_id: row.get_opt_i64("parent_ip_id")?,
            revision: row.get_string("revision")?,
            status,
            provider: row.get_string("provider")?,
            description: row.get_opt_string("description")?,
            documentation: row.get_opt_string("documentation")?,
            created_at: row.get_opt_string("created_at")?,
            updated_at: row.get_opt_string("updated_at")?,
        })
    }

    fn to_fields(&self) -> Fields {
        vec![
            ("name", Value::Text(self.name.clone())),
            ("type_id", Value::Integer(self.type_id)),
            ("process_id", Value::Integer(self.process_id)),
            ("parent_ip_id", self.parent_ip_id.into()),
            ("revision", Value::Text(self.revision.clone())),
            ("status", Value::Text(self.status.as_str().to_string())),
            ("provider", Value::Text(self.provider.clone())),
            ("description", self.description.clone().into()),
            ("documentation", self.documentation.clone().into()),
        ]
    }

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl TreeNode for Ip {
    fn node_id(&self) -> Option<i64> {
        self.id
    }

    fn parent(&self) -> Option<i64> {
        self.parent_ip_id
    }

    fn label(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Display for Ip {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} rev {} [{}] by {}", self.name, self.revision, self.status, self.provider)
    }
}

/// Input for creating an IP.
///
/// Every required field is optional here so that all omissions can be
/// reported at once by [`NewIp::validate`].
#[derive(Debug, Clone, Default)]
pub struct NewIp {
    pub name: Option<String>,
    pub type_id: Option<i64>,
    pub process_id: Option<i64>,
    pub parent_ip_id: Option<i64>,
    pub revision: Option<String>,
    pub status: Option<String>,
    pub provider: Option<String>,
    pub description: Option<String>,
    pub documentation: Option<String>,
}

impl NewIp {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Default::default()
        }
    }

    pub fn type_id(mut self, id: i64) -> Self {
        self.type_id = Some(id);
        self
    }

    pub fn process_id(mut self, id: i64) -> Self {
        self.process_id = Some(id);
        self
    }

    pub fn parent_ip_id(mut self, id: i64) -> Self {
        self.parent_ip_id = Some(id);
        self
    }

    pub fn revision(mut self, revision: impl Into<String>) -> Self {
        self.revision = Some(revision.into());
        self
    }

    pub fn status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    pub fn provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn documentation(mut self, url: impl Into<String>) -> Self {
        self.documentation = Some(url.into());
        self
    }

    /// Check required fields and the status value, producing an unsaved [`Ip`].
    ///
    /// Referential checks (type, process, parent, name uniqueness) need the
    /// store and are done by [`crate::lifecycle::Lifecycle::create`].
    pub fn validate(self) -> Result<Ip> {
        fn present(value: &Option<String>) -> bool {
            value.as_deref().is_some_and(|v| !v.trim().is_empty())
        }

        let mut missing = Vec::new();
        if !present(&self.name) {
            missing.push("name");
        }
        if self.type_id.is_none() {
            missing.push("type_id");
        }
        if self.process_id.is_none() {
            missing.push("process_id");
        }
        if !present(&self.revision) {
            missing.push("revision");
        }
        if !present(&self.status) {
            missing.push("status");
        }
        if !present(&self.provider) {
            missing.push("provider");
        }
        if !missing.is_empty() {
            return Err(Error::Validation(format!(
                "IP is missing required field(s): {}",
                missing.join(", ")
            )));
        }

        let status: IpStatus = self.status.as_deref().unwrap_or_default().parse()?;

        Ok(Ip {
            id: None,
            name: self.name.unwrap_or_default(),
            type_id: self.type_id.unwrap_or_default(),
            process_id: self.process_id.unwrap_or_default(),
            parent_ip_id: self.parent_ip_id,
            revision: self.revision.unwrap_or_default(),
            status,
            provider: self.provider.unwrap_or_default(),
            description: self.description,
            documentation: self.documentation,
            created_at: None,
            updated_at: None,
        })
    }
}

/// Partial update of an IP; `None` leaves the field untouched.
///
/// `status` is kept as text so that an unrecognized value is rejected by
/// [`IpUpdate::apply_to`] before anything is written.
#[derive(Debug, Clone, Default)]
pub struct IpUpdate {
    pub name: Option<String>,
    pub type_id: Option<i64>,
    pub process_id: Option<i64>,
    pub revision: Option<String>,
    pub status: Option<String>,
    pub provider: Option<String>,
    pub description: Option<String>,
    pub documentation: Option<String>,
}

impl IpUpdate {
    pub fn status(status: impl Into<String>) -> Self {
        Self {
            status: Some(status.into()),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.type_id.is_none()
            && self.process_id.is_none()
            && self.revision.is_none()
            && self.status.is_none()
            && self.provider.is_none()
            && self.description.is_none()
            && self.documentation.is_none()
    }

    /// Apply the provided fields. On error `ip` is left untouched.
    pub fn apply_to(&self, ip: &mut Ip) -> Result<()> {
        let status = self.status.as_deref().map(str::parse::<IpStatus>).transpose()?;
        for (field, value) in [("name", &self.name), ("revision", &self.revision), ("provider", &self.provider)] {
            if value.as_deref().is_some_and(|v| v.trim().is_empty()) {
                return Err(Error::Validation(format!("IP {} must not be empty", field)));
            }
        }

        if let Some(name) = &self.name {
            ip.name = name.clone();
        }
        if let Some(type_id) = self.type_id {
            ip.type_id = type_id;
        }
        if let Some(process_id) = self.process_id {
            ip.process_id = process_id;
        }
        if let Some(revision) = &self.revision {
            ip.revision = revision.clone();
        }
        if let Some(status) = status {
            ip.status = status;
        }
        if let Some(provider) = &self.provider {
            ip.provider = provider.clone();
        }
        if let Some(description) = &self.description {
            ip.description = Some(description.clone());
        }
        if let Some(documentation) = &self.documentation {
            ip.documentation = Some(documentation.clone());
        }
        Ok(())
    }
}
