//! Cascading deletes as an explicit, reportable operation
//!
//! Deleting a Type removes its descendant Types and every IP typed under
//! them; deleting a Process removes its IPs; deleting an IP removes its
//! descendant IPs. Rather than relying on the store's foreign-key cascade,
//! the core computes the full dependent set up front as a [`CascadePlan`],
//! lets the caller see it, and then deletes leaf-first, one checked write at
//! a time.

use std::collections::HashSet;
use serde::Serialize;
use crate::{Error, Result};
use crate::ip::Ip;
use crate::storage::{Gateway, Table};
use crate::tree::Forest;

/// What to do when the target of a delete has dependents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CascadePolicy {
    /// Refuse with [`Error::CascadeRequired`] if anything else would be removed
    #[default]
    Restrict,
    /// Remove the target and all of its dependents
    Cascade,
}

/// One row scheduled for deletion
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Removal {
    pub table: Table,
    pub id: i64,
    pub name: String,
}

impl Removal {
    pub fn new(table: Table, id: i64, name: impl Into<String>) -> Self {
        Self { table, id, name: name.into() }
    }
}

/// Full set of rows a delete would remove, in execution order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CascadePlan {
    pub target: Removal,
    /// Dependents, every child before its parent; the target goes last
    pub dependents: Vec<Removal>,
}

impl CascadePlan {
    pub fn new(target: Removal) -> Self {
        Self { target, dependents: Vec::new() }
    }

    pub fn has_dependents(&self) -> bool {
        !self.dependents.is_empty()
    }

    /// Number of dependents in `table`
    pub fn count(&self, table: Table) -> usize {
        self.dependents.iter().filter(|r| r.table == table).count()
    }

    pub fn push(&mut self, removal: Removal) {
        self.dependents.push(removal);
    }

    /// Schedule the IP subtrees rooted at `roots`, children before parents.
    /// Ids already scheduled are skipped.
    pub fn add_ip_subtrees(&mut self, forest: &Forest<Ip>, roots: impl IntoIterator<Item = i64>) {
        let mut scheduled: HashSet<i64> = self
            .dependents
            .iter()
            .filter(|r| r.table == Table::Ips)
            .map(|r| r.id)
            .collect();
        if self.target.table == Table::Ips {
            scheduled.insert(self.target.id);
        }

        for root in roots {
            for id in forest.leaf_first(root) {
                if scheduled.insert(id) {
                    if let Some(ip) = forest.get(id) {
                        self.dependents.push(Removal::new(Table::Ips, id, ip.name.clone()));
                    }
                }
            }
        }
    }

    /// Delete dependents then the target.
    ///
    /// A row that has vanished mid-cascade is reported as an integrity
    /// failure naming how far the cascade got.
    pub fn execute<G: Gateway>(self, gateway: &G) -> Result<CascadeReport> {
        let total = self.dependents.len() + 1;
        let mut removed = Vec::with_capacity(self.dependents.len());

        for removal in self.dependents.iter().chain(std::iter::once(&self.target)) {
            if let Err(err) = gateway.delete(removal.table, removal.id) {
                tracing::warn!(
                    target_name = %self.target.name,
                    done = removed.len(),
                    total,
                    "cascade interrupted"
                );
                return Err(match err {
                    Error::NotFound(_) => Error::Integrity(format!(
                        "cascade for {} '{}' stopped after {} of {} deletions: {} '{}' (id {}) was already gone",
                        self.target.table,
                        self.target.name,
                        removed.len(),
                        total,
                        removal.table,
                        removal.name,
                        removal.id
                    )),
                    other => other,
                });
            }
            if removal.id != self.target.id || removal.table != self.target.table {
                removed.push(removal.clone());
            }
        }

        if !removed.is_empty() {
            tracing::warn!(
                target_name = %self.target.name,
                types = removed.iter().filter(|r| r.table == Table::Types).count(),
                ips = removed.iter().filter(|r| r.table == Table::Ips).count(),
                "cascade removed dependents"
            );
        }

        Ok(CascadeReport { target: self.target, removed })
    }

    /// Apply `policy`: refuse if there are dependents under `Restrict`,
    /// otherwise execute
    pub fn run<G: Gateway>(self, gateway: &G, policy: CascadePolicy) -> Result<CascadeReport> {
        if self.has_dependents() && policy == CascadePolicy::Restrict {
            return Err(Error::CascadeRequired(self));
        }
        self.execute(gateway)
    }
}

fn summarize(removals: &[&Removal]) -> String {
    removals
        .iter()
        .map(|r| r.name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

impl std::fmt::Display for CascadePlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let types: Vec<&Removal> = self.dependents.iter().filter(|r| r.table == Table::Types).collect();
        let ips: Vec<&Removal> = self.dependents.iter().filter(|r| r.table == Table::Ips).collect();

        write!(f, "deleting {} '{}' would also remove", self.target.table, self.target.name)?;
        let mut parts = Vec::new();
        if !types.is_empty() {
            parts.push(format!("{} type(s) [{}]", types.len(), summarize(&types)));
        }
        if !ips.is_empty() {
            parts.push(format!("{} IP(s) [{}]", ips.len(), summarize(&ips)));
        }
        write!(f, " {}; confirm the cascade to proceed", parts.join(" and "))
    }
}

/// Outcome of an executed delete
#[derive(Debug, Clone, Serialize)]
pub struct CascadeReport {
    pub target: Removal,
    /// Dependents that were removed along with the target
    pub removed: Vec<Removal>,
}

impl CascadeReport {
    pub fn count(&self, table: Table) -> usize {
        self.removed.iter().filter(|r| r.table == table).count()
    }
}
