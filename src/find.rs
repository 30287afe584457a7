//! Find engine - ad-hoc filtering over IP records
//!
//! Criteria are optional and AND-ed together. Name-valued criteria (type,
//! process) must resolve or the query fails with `NotFound`; attribute
//! criteria (fab, node) that match no process simply match no IP.

use std::time::{SystemTime, UNIX_EPOCH};
use serde::Serialize;
use crate::{Error, Result};
use crate::ip::Ip;
use crate::ip_type::IpType;
use crate::lifecycle::Lifecycle;
use crate::process::Process;
use crate::status::IpStatus;
use crate::storage::{Gateway, Predicate};
use crate::taxonomy::TypeTree;

/// Filter criteria for [`Finder::find`]. An empty set matches every IP.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FindCriteria {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<IpStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    /// Type name or full path
    #[serde(skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
    /// With `type_name`, also match IPs typed anywhere below it
    pub include_descendants: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub type_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub process_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub process_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fab: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node: Option<String>,
    /// Only IPs without a parent IP
    pub roots_only: bool,
}

impl FindCriteria {
    pub fn status(mut self, status: IpStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn type_tree(mut self, type_name: impl Into<String>) -> Self {
        self.type_name = Some(type_name.into());
        self.include_descendants = true;
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Exported IP with its references spelled out
#[derive(Debug, Clone, Serialize)]
pub struct PackedIp {
    #[serde(flatten)]
    pub ip: Ip,
    #[serde(rename = "type")]
    pub type_path: String,
    pub process: Process,
    pub parent: Option<String>,
    pub children: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PackMetadata {
    pub count: usize,
    pub criteria: FindCriteria,
    /// Seconds since the Unix epoch
    pub packed_at: u64,
    pub version: &'static str,
}

/// Serialisable export of a find result
#[derive(Debug, Clone, Serialize)]
pub struct Pack {
    pub metadata: PackMetadata,
    pub ips: Vec<PackedIp>,
}

/// Query engine over IP records
pub struct Finder<'a, G: Gateway> {
    store: &'a G,
}

impl<'a, G: Gateway> Finder<'a, G> {
    pub fn new(store: &'a G) -> Self {
        Self { store }
    }

    /// Compose the criteria into a single predicate over `ips`
    fn predicate(&self, criteria: &FindCriteria) -> Result<Predicate> {
        let mut predicate = Predicate::all();

        if let Some(name) = &criteria.name {
            predicate = predicate.eq("name", name.clone());
        }
        if let Some(status) = criteria.status {
            predicate = predicate.eq("status", status.as_str().to_string());
        }
        if let Some(provider) = &criteria.provider {
            predicate = predicate.eq("provider", provider.clone());
        }
        if let Some(type_name) = &criteria.type_name {
            let tree = TypeTree::new(self.store);
            let id = tree.resolve(type_name)?.id.unwrap_or_default();
            let ids: Vec<i64> = if criteria.include_descendants {
                tree.subtree_of(id)?.filter_map(|t| t.id).collect()
            } else {
                vec![id]
            };
            predicate = predicate.in_list("type_id", ids);
        }
        if let Some(type_id) = criteria.type_id {
            TypeTree::new(self.store).get(type_id)?;
            predicate = predicate.eq("type_id", type_id);
        }

        let life = Lifecycle::new(self.store);
        if let Some(process_name) = &criteria.process_name {
            let process = life.process_by_name(process_name)?;
            predicate = predicate.eq("process_id", process.id.unwrap_or_default());
        }
        if let Some(process_id) = criteria.process_id {
            life.process(process_id)?;
            predicate = predicate.eq("process_id", process_id);
        }
        if criteria.fab.is_some() || criteria.node.is_some() {
            let mut by_attr = Predicate::all();
            if let Some(fab) = &criteria.fab {
                by_attr = by_attr.eq("fab", fab.clone());
            }
            if let Some(node) = &criteria.node {
                by_attr = by_attr.eq("node", node.clone());
            }
            let ids: Vec<i64> = self
                .store
                .find_many::<Process>(&by_attr)?
                .into_iter()
                .filter_map(|p| p.id)
                .collect();
            predicate = predicate.in_list("process_id", ids);
        }
        if criteria.roots_only {
            predicate = predicate.is_null("parent_ip_id");
        }

        Ok(predicate.order_by("name"))
    }

    /// IPs matching every given criterion, ordered by name
    pub fn find(&self, criteria: &FindCriteria) -> Result<Vec<Ip>> {
        let predicate = self.predicate(criteria)?;
        tracing::debug!(?predicate, "find");
        let ips = self.store.find_many(&predicate)?;
        tracing::debug!(matches = ips.len(), "find complete");
        Ok(ips)
    }

    /// Find, then bundle each match with its type, process, parent and
    /// direct children
    pub fn pack(&self, criteria: &FindCriteria) -> Result<Pack> {
        let ips = self.find(criteria)?;
        let life = Lifecycle::new(self.store);

        let mut packed = Vec::with_capacity(ips.len());
        for ip in ips {
            let type_path = self
                .store
                .get::<IpType>(ip.type_id)?
                .map(|t| t.path)
                .ok_or_else(|| {
                    Error::Integrity(format!(
                        "IP '{}' references missing type id {}",
                        ip.name, ip.type_id
                    ))
                })?;
            let process = life.process(ip.process_id)?;
            let parent = ip
                .parent_ip_id
                .map(|id| life.ip(id).map(|p| p.name))
                .transpose()?;
            let children = self
                .store
                .find_many::<Ip>(
                    &Predicate::all()
                        .eq("parent_ip_id", ip.id.unwrap_or_default())
                        .order_by("name"),
                )?
                .into_iter()
                .map(|c| c.name)
                .collect();
            packed.push(PackedIp { ip, type_path, process, parent, children });
        }

        let packed_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        tracing::info!(count = packed.len(), "packed IPs");

        Ok(Pack {
            metadata: PackMetadata {
                count: packed.len(),
                criteria: criteria.clone(),
                packed_at,
                version: env!("CARGO_PKG_VERSION"),
            },
            ips: packed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ip::NewIp;
    use crate::storage::SqliteStore;

    /// Types: Digital → CPU → ARM, Digital → Memory, Analog
    /// Processes: P1 (28nm, TSMC), P2 (7nm, Samsung)
    fn setup() -> SqliteStore {
        let store = SqliteStore::open_in_memory().unwrap();
        let tree = TypeTree::new(&store);
        let life = Lifecycle::new(&store);
        let digital = tree.create_type("Digital", None, None).unwrap();
        let cpu = tree.create_type("CPU", digital.id, None).unwrap();
        let arm = tree.create_type("ARM", cpu.id, None).unwrap();
        let memory = tree.create_type("Memory", digital.id, None).unwrap();
        let analog = tree.create_type("Analog", None, None).unwrap();
        let p1 = life.create_process(Process::new("P1", "28nm", "TSMC")).unwrap();
        let p2 = life.create_process(Process::new("P2", "7nm", "Samsung")).unwrap();

        let rows = [
            ("Core1", &arm, &p1, "alpha", "ARM Ltd", None),
            ("Core2", &cpu, &p2, "production", "ARM Ltd", None),
            ("Sram", &memory, &p1, "production", "Memco", Some("Core1")),
            ("Pll", &analog, &p2, "beta", "Analogix", None),
        ];
        for (name, ip_type, process, status, provider, parent) in rows {
            let mut new_ip = NewIp::new(name)
                .type_id(ip_type.id.unwrap())
                .process_id(process.id.unwrap())
                .revision("1.0")
                .status(status)
                .provider(provider);
            if let Some(parent) = parent {
                new_ip = new_ip.parent_ip_id(life.ip_by_name(parent).unwrap().id.unwrap());
            }
            life.create(new_ip).unwrap();
        }
        store
    }

    fn find(store: &SqliteStore, criteria: FindCriteria) -> Vec<String> {
        Finder::new(store)
            .find(&criteria)
            .unwrap()
            .into_iter()
            .map(|ip| ip.name)
            .collect()
    }

    #[test]
    fn test_empty_criteria_returns_all_in_stable_order() {
        let store = setup();
        let first = find(&store, FindCriteria::default());
        assert_eq!(first, vec!["Core1", "Core2", "Pll", "Sram"]);
        assert_eq!(first, find(&store, FindCriteria::default()));
        assert!(FindCriteria::default().is_empty());
        assert!(!FindCriteria::default().status(IpStatus::Beta).is_empty());
    }

    #[test]
    fn test_single_criteria() {
        let store = setup();
        assert_eq!(find(&store, FindCriteria::default().status(IpStatus::Production)), vec!["Core2", "Sram"]);
        assert_eq!(
            find(&store, FindCriteria { provider: Some("ARM Ltd".into()), ..Default::default() }),
            vec!["Core1", "Core2"]
        );
        assert_eq!(find(&store, FindCriteria { name: Some("Pll".into()), ..Default::default() }), vec!["Pll"]);
        assert_eq!(
            find(&store, FindCriteria { process_name: Some("P1".into()), ..Default::default() }),
            vec!["Core1", "Sram"]
        );
        assert_eq!(find(&store, FindCriteria { roots_only: true, ..Default::default() }), vec!["Core1", "Core2", "Pll"]);
    }

    #[test]
    fn test_type_tree_mode() {
        let store = setup();
        assert_eq!(find(&store, FindCriteria::default().type_tree("Digital")), vec!["Core1", "Core2", "Sram"]);
        assert_eq!(find(&store, FindCriteria::default().type_tree("CPU")), vec!["Core1", "Core2"]);

        let exact = FindCriteria { type_name: Some("CPU".into()), ..Default::default() };
        assert_eq!(find(&store, exact), vec!["Core2"]);
        let by_path = FindCriteria { type_name: Some("Digital/CPU/ARM".into()), ..Default::default() };
        assert_eq!(find(&store, by_path), vec!["Core1"]);
    }

    #[test]
    fn test_criteria_are_anded() {
        let store = setup();
        let criteria = FindCriteria {
            status: Some(IpStatus::Production),
            process_name: Some("P2".into()),
            ..FindCriteria::default().type_tree("Digital")
        };
        assert_eq!(find(&store, criteria), vec!["Core2"]);

        let none = FindCriteria {
            status: Some(IpStatus::Obsolete),
            ..FindCriteria::default().type_tree("Digital")
        };
        assert!(find(&store, none).is_empty());
    }

    #[test]
    fn test_unresolved_names_are_not_found() {
        let store = setup();
        let finder = Finder::new(&store);
        let by_type = FindCriteria { type_name: Some("Nope".into()), ..Default::default() };
        let by_process = FindCriteria { process_name: Some("Nope".into()), ..Default::default() };

        assert!(matches!(finder.find(&by_type), Err(Error::NotFound(_))));
        assert!(matches!(finder.find(&by_process), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_fab_and_node_filter_through_processes() {
        let store = setup();
        assert_eq!(find(&store, FindCriteria { fab: Some("Samsung".into()), ..Default::default() }), vec!["Core2", "Pll"]);
        assert_eq!(find(&store, FindCriteria { node: Some("28nm".into()), ..Default::default() }), vec!["Core1", "Sram"]);
        assert!(find(&store, FindCriteria { fab: Some("Intel".into()), ..Default::default() }).is_empty());
    }

    #[test]
    fn test_pack() {
        let store = setup();
        let pack = Finder::new(&store)
            .pack(&FindCriteria::default().type_tree("Digital"))
            .unwrap();

        assert_eq!(pack.metadata.count, 3);
        let core1 = &pack.ips[0];
        assert_eq!(core1.ip.name, "Core1");
        assert_eq!(core1.type_path, "Digital/CPU/ARM");
        assert_eq!(core1.process.name, "P1");
        assert_eq!(core1.children, vec!["Sram"]);
        assert_eq!(pack.ips[2].parent.as_deref(), Some("Core1"));

        let json = serde_json::to_value(&pack).unwrap();
        assert_eq!(json["metadata"]["criteria"]["type_name"], "Digital");
        assert_eq!(json["ips"][0]["type"], "Digital/CPU/ARM");
        assert_eq!(json["ips"][0]["status"], "alpha");
    }

    #[test]
    fn test_pack_reports_missing_type() {
        let store = setup();
        store
            .connection()
            .execute_batch(
                "PRAGMA foreign_keys = OFF;
                 UPDATE ips SET type_id = 4242 WHERE name = 'Pll';",
            )
            .unwrap();

        let criteria = FindCriteria { name: Some("Pll".into()), ..Default::default() };
        let err = Finder::new(&store).pack(&criteria).unwrap_err();
        assert!(matches!(err, Error::Integrity(msg) if msg.contains("Pll") && msg.contains("4242")));
    }
}
