//! IP composition hierarchy
//!
//! IPs link to a parent IP through `parent_ip_id`, forming a forest that is
//! independent of the Type taxonomy (SoC → CPU Subsystem → Core). This
//! module attaches and detaches children, walks the forest and renders it.

use std::collections::HashMap;
use serde::Serialize;
use crate::{Error, Result};
use crate::cascade::{CascadePlan, CascadePolicy, CascadeReport, Removal};
use crate::ip::Ip;
use crate::ip_type::IpType;
use crate::lifecycle::Lifecycle;
use crate::process::Process;
use crate::status::IpStatus;
use crate::storage::{Gateway, Predicate, Table};
use crate::taxonomy::TypeTree;
use crate::tree::{Forest, Nested};

/// Which part of the IP forest to show
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeScope {
    /// Every root IP
    All,
    /// The subtree under one IP
    Ip(String),
    /// IPs built on a process, each with its subtree
    Process(String),
    /// IPs typed under a type (or its descendants), each with its subtree
    Type(String),
}

/// One IP in a nested hierarchy, with its type and process resolved
#[derive(Debug, Clone, Serialize)]
pub struct IpNode {
    pub id: i64,
    pub name: String,
    pub revision: String,
    pub status: IpStatus,
    pub provider: String,
    /// Full path of the IP's type
    #[serde(rename = "type")]
    pub type_path: String,
    pub process: String,
}

/// Type paths and process names by id, for labelling IPs
struct Names {
    types: HashMap<i64, String>,
    processes: HashMap<i64, String>,
}

impl Names {
    fn load<G: Gateway>(store: &G) -> Result<Self> {
        let types = store
            .find_many::<IpType>(&Predicate::all())?
            .into_iter()
            .filter_map(|t| t.id.map(|id| (id, t.path)))
            .collect();
        let processes = store
            .find_many::<Process>(&Predicate::all())?
            .into_iter()
            .filter_map(|p| p.id.map(|id| (id, p.name)))
            .collect();
        Ok(Self { types, processes })
    }

    fn type_path(&self, id: i64) -> &str {
        self.types.get(&id).map_or("?", String::as_str)
    }

    fn process(&self, id: i64) -> &str {
        self.processes.get(&id).map_or("?", String::as_str)
    }

    fn node(&self, ip: &Ip) -> IpNode {
        IpNode {
            id: ip.id.unwrap_or_default(),
            name: ip.name.clone(),
            revision: ip.revision.clone(),
            status: ip.status,
            provider: ip.provider.clone(),
            type_path: self.type_path(ip.type_id).to_string(),
            process: self.process(ip.process_id).to_string(),
        }
    }

    fn label(&self, ip: &Ip, details: bool) -> String {
        if details {
            format!(
                "{} (rev {}, {}, {}) [{} @ {}]",
                ip.name,
                ip.revision,
                ip.status,
                ip.provider,
                self.type_path(ip.type_id),
                self.process(ip.process_id)
            )
        } else {
            ip.name.clone()
        }
    }
}

pub struct IpHierarchy<'a, G: Gateway> {
    store: &'a G,
}

impl<'a, G: Gateway> IpHierarchy<'a, G> {
    pub fn new(store: &'a G) -> Self {
        Self { store }
    }

    fn lookup(&self, name: &str) -> Result<Ip> {
        Lifecycle::new(self.store).ip_by_name(name)
    }

    /// Load every IP into an arena
    pub fn forest(&self) -> Result<Forest<Ip>> {
        Ok(Forest::new(self.store.find_many::<Ip>(&Predicate::all())?))
    }

    /// IPs without a parent, by name
    pub fn find_root_ips(&self) -> Result<Vec<Ip>> {
        self.store
            .find_many(&Predicate::all().is_null("parent_ip_id").order_by("name"))
    }

    /// Direct children of the named IP, by name
    pub fn children_of(&self, name: &str) -> Result<Vec<Ip>> {
        let parent = self.lookup(name)?;
        self.store.find_many(
            &Predicate::all()
                .eq("parent_ip_id", parent.id.unwrap_or_default())
                .order_by("name"),
        )
    }

    /// Parent chain of the named IP, nearest first
    pub fn ancestors(&self, name: &str) -> Result<Vec<Ip>> {
        let ip = self.lookup(name)?;
        let forest = self.forest()?;
        Ok(forest
            .ancestors(ip.id.unwrap_or_default())?
            .into_iter()
            .cloned()
            .collect())
    }

    /// The named IP with its full descendant tree
    pub fn ip_hierarchy(&self, name: &str) -> Result<Nested<IpNode>> {
        self.nested(&TreeScope::Ip(name.to_string()))?
            .pop()
            .ok_or_else(|| Error::NotFound(format!("IP '{}'", name)))
    }

    /// Attach `child_name` under `parent_name`, moving it if it already has
    /// another parent
    pub fn add_child_ip(&self, parent_name: &str, child_name: &str) -> Result<Ip> {
        let parent = self.lookup(parent_name)?;
        let mut child = self.lookup(child_name)?;
        let parent_id = parent.id.unwrap_or_default();
        let child_id = child.id.unwrap_or_default();

        if parent_id == child_id {
            return Err(Error::Cycle(format!("IP '{}' cannot be its own parent", child.name)));
        }
        let forest = self.forest()?;
        if forest.is_descendant(parent_id, child_id) {
            return Err(Error::Cycle(format!(
                "'{}' is below '{}', so it cannot become its parent",
                parent.name, child.name
            )));
        }
        if child.parent_ip_id == Some(parent_id) {
            return Ok(child);
        }

        child.parent_ip_id = Some(parent_id);
        self.store.save_record(&child)?;
        tracing::info!(parent = %parent.name, child = %child.name, "attached child IP");
        Lifecycle::new(self.store).ip(child_id)
    }

    /// Detach `child_name` from `parent_name`. The child is kept, as a root.
    pub fn remove_child_ip(&self, parent_name: &str, child_name: &str) -> Result<Ip> {
        let parent = self.lookup(parent_name)?;
        let mut child = self.lookup(child_name)?;
        if child.parent_ip_id.is_none() || child.parent_ip_id != parent.id {
            return Err(Error::Validation(format!(
                "IP '{}' is not a child of '{}'",
                child.name, parent.name
            )));
        }

        child.parent_ip_id = None;
        self.store.save_record(&child)?;
        tracing::info!(parent = %parent.name, child = %child.name, "detached child IP");
        Lifecycle::new(self.store).ip_by_name(child_name)
    }

    /// The IP plus all of its descendant IPs
    pub fn delete_plan(&self, name: &str) -> Result<CascadePlan> {
        let ip = self.lookup(name)?;
        let id = ip.id.unwrap_or_default();
        let forest = self.forest()?;

        let mut plan = CascadePlan::new(Removal::new(Table::Ips, id, ip.name));
        let children: Vec<i64> = forest.children(id).iter().filter_map(|c| c.id).collect();
        plan.add_ip_subtrees(&forest, children);
        Ok(plan)
    }

    pub fn delete_ip(&self, name: &str, policy: CascadePolicy) -> Result<CascadeReport> {
        let report = self.delete_plan(name)?.run(self.store, policy)?;
        tracing::info!(ip = %name, removed = report.removed.len(), "deleted IP");
        Ok(report)
    }

    /// Roots of the view selected by `scope`. For process and type scopes
    /// these are the selected IPs whose parent is not itself selected.
    pub fn scope_roots(&self, scope: &TreeScope, forest: &Forest<Ip>) -> Result<Vec<i64>> {
        let selected: Vec<Ip> = match scope {
            TreeScope::All => return Ok(forest.root_ids().to_vec()),
            TreeScope::Ip(name) => return Ok(vec![self.lookup(name)?.id.unwrap_or_default()]),
            TreeScope::Process(name) => {
                let process = Lifecycle::new(self.store).process_by_name(name)?;
                self.store.find_many(
                    &Predicate::all()
                        .eq("process_id", process.id.unwrap_or_default())
                        .order_by("name"),
                )?
            }
            TreeScope::Type(name) => {
                let tree = TypeTree::new(self.store);
                let ip_type = tree.resolve(name)?;
                tree.descendant_ips_of_type(ip_type.id.unwrap_or_default(), true)?
            }
        };

        let ids: Vec<i64> = selected.iter().filter_map(|ip| ip.id).collect();
        Ok(selected
            .iter()
            .filter(|ip| ip.parent_ip_id.is_none_or(|p| !ids.contains(&p)))
            .filter_map(|ip| ip.id)
            .collect())
    }

    /// The selected part of the IP forest as nested structures, one per root
    pub fn nested(&self, scope: &TreeScope) -> Result<Vec<Nested<IpNode>>> {
        let forest = self.forest()?;
        let roots = self.scope_roots(scope, &forest)?;
        let names = Names::load(self.store)?;
        Ok(roots
            .into_iter()
            .filter_map(|id| forest.nested(id, &|ip: &Ip| names.node(ip)))
            .collect())
    }

    /// Render the selected part of the IP forest as a text tree
    pub fn render(&self, scope: &TreeScope, details: bool) -> Result<String> {
        let forest = self.forest()?;
        let roots = self.scope_roots(scope, &forest)?;
        let names = Names::load(self.store)?;
        Ok(forest.render(Some(&roots), &|ip: &Ip| names.label(ip, details)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ip::NewIp;
    use crate::storage::SqliteStore;

    /// SoC → {CpuSub → {Core1, Core2}, Dsp}; Standalone
    fn setup() -> SqliteStore {
        let store = SqliteStore::open_in_memory().unwrap();
        let tree = TypeTree::new(&store);
        let life = Lifecycle::new(&store);
        let digital = tree.create_type("Digital", None, None).unwrap();
        let cpu = tree.create_type("CPU", digital.id, None).unwrap();
        let analog = tree.create_type("Analog", None, None).unwrap();
        let p1 = life.create_process(Process::new("P1", "28nm", "TSMC")).unwrap();
        let p2 = life.create_process(Process::new("P2", "7nm", "TSMC")).unwrap();

        let mk = |name: &str, type_id: Option<i64>, process_id: Option<i64>, parent: Option<&Ip>| {
            let mut new_ip = NewIp::new(name)
                .type_id(type_id.unwrap())
                .process_id(process_id.unwrap())
                .revision("1.0")
                .status("alpha")
                .provider("ACME");
            if let Some(parent) = parent {
                new_ip = new_ip.parent_ip_id(parent.id.unwrap());
            }
            life.create(new_ip).unwrap()
        };
        let soc = mk("SoC", digital.id, p1.id, None);
        let sub = mk("CpuSub", cpu.id, p1.id, Some(&soc));
        mk("Core1", cpu.id, p2.id, Some(&sub));
        mk("Core2", cpu.id, p2.id, Some(&sub));
        mk("Dsp", analog.id, p1.id, Some(&soc));
        mk("Standalone", analog.id, p2.id, None);
        store
    }

    fn names(ips: Vec<Ip>) -> Vec<String> {
        ips.into_iter().map(|ip| ip.name).collect()
    }

    #[test]
    fn test_find_root_ips() {
        let store = setup();
        let h = IpHierarchy::new(&store);
        assert_eq!(names(h.find_root_ips().unwrap()), vec!["SoC", "Standalone"]);
    }

    #[test]
    fn test_ip_hierarchy_nests_descendants() {
        let store = setup();
        let h = IpHierarchy::new(&store);

        let tree = h.ip_hierarchy("SoC").unwrap();
        assert_eq!(tree.node.name, "SoC");
        assert_eq!(tree.node.type_path, "Digital");
        assert_eq!(tree.size(), 5);
        assert_eq!(tree.children[0].node.name, "CpuSub");
        assert_eq!(tree.children[0].node.type_path, "Digital/CPU");
        assert_eq!(tree.children[0].children.len(), 2);

        let json = serde_json::to_value(&tree).unwrap();
        assert_eq!(json["type"], "Digital");
        assert_eq!(json["children"][1]["name"], "Dsp");

        assert!(matches!(h.ip_hierarchy("Nope"), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_ancestors() {
        let store = setup();
        let h = IpHierarchy::new(&store);
        assert_eq!(names(h.ancestors("Core1").unwrap()), vec!["CpuSub", "SoC"]);
        assert!(h.ancestors("SoC").unwrap().is_empty());
    }

    #[test]
    fn test_add_child_rejects_cycles() {
        let store = setup();
        let h = IpHierarchy::new(&store);

        assert!(matches!(h.add_child_ip("Core1", "SoC"), Err(Error::Cycle(_))));
        assert!(matches!(h.add_child_ip("SoC", "SoC"), Err(Error::Cycle(_))));
        assert_eq!(names(h.find_root_ips().unwrap()), vec!["SoC", "Standalone"]);
    }

    #[test]
    fn test_add_and_remove_child() {
        let store = setup();
        let h = IpHierarchy::new(&store);

        let child = h.add_child_ip("SoC", "Standalone").unwrap();
        assert_eq!(child.parent_ip_id, h.lookup("SoC").unwrap().id);
        assert_eq!(names(h.children_of("SoC").unwrap()), vec!["CpuSub", "Dsp", "Standalone"]);

        let detached = h.remove_child_ip("SoC", "Standalone").unwrap();
        assert!(detached.is_root());
        assert_eq!(store.count(Table::Ips).unwrap(), 6);

        assert!(matches!(h.remove_child_ip("SoC", "Core1"), Err(Error::Validation(_))));
        assert!(matches!(h.remove_child_ip("SoC", "Standalone"), Err(Error::Validation(_))));
    }

    #[test]
    fn test_delete_ip_cascades_to_descendants() {
        let store = setup();
        let h = IpHierarchy::new(&store);

        let err = h.delete_ip("CpuSub", CascadePolicy::Restrict).unwrap_err();
        assert!(matches!(err, Error::CascadeRequired(ref plan) if plan.count(Table::Ips) == 2));
        assert_eq!(store.count(Table::Ips).unwrap(), 6);

        let report = h.delete_ip("SoC", CascadePolicy::Cascade).unwrap();
        assert_eq!(report.count(Table::Ips), 4);
        assert_eq!(store.count(Table::Ips).unwrap(), 1);
        assert_eq!(names(h.find_root_ips().unwrap()), vec!["Standalone"]);
    }

    #[test]
    fn test_delete_leaf_ip_with_restrict() {
        let store = setup();
        let h = IpHierarchy::new(&store);
        let report = h.delete_ip("Core2", CascadePolicy::Restrict).unwrap();
        assert!(report.removed.is_empty());
        assert_eq!(store.count(Table::Ips).unwrap(), 5);
    }

    #[test]
    fn test_scope_roots() {
        let store = setup();
        let h = IpHierarchy::new(&store);
        let forest = h.forest().unwrap();
        let labels = |ids: Vec<i64>| -> Vec<String> {
            ids.iter().map(|id| forest.get(*id).unwrap().name.clone()).collect()
        };

        assert_eq!(labels(h.scope_roots(&TreeScope::All, &forest).unwrap()), vec!["SoC", "Standalone"]);
        assert_eq!(
            labels(h.scope_roots(&TreeScope::Process("P2".into()), &forest).unwrap()),
            vec!["Core1", "Core2", "Standalone"]
        );
        assert_eq!(
            labels(h.scope_roots(&TreeScope::Type("CPU".into()), &forest).unwrap()),
            vec!["CpuSub"]
        );
        assert!(matches!(
            h.scope_roots(&TreeScope::Process("P9".into()), &forest),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_nested_by_process() {
        let store = setup();
        let h = IpHierarchy::new(&store);
        let trees = h.nested(&TreeScope::Process("P1".into())).unwrap();
        assert_eq!(trees.len(), 1);
        assert_eq!(trees[0].node.name, "SoC");
        assert_eq!(trees[0].size(), 5);
    }

    #[test]
    fn test_render() {
        let store = setup();
        let h = IpHierarchy::new(&store);

        let text = h.render(&TreeScope::Ip("SoC".into()), false).unwrap();
        let expected = "\
SoC
├─ CpuSub
│  ├─ Core1
│  └─ Core2
└─ Dsp
";
        assert_eq!(text, expected);

        let detailed = h.render(&TreeScope::Ip("Dsp".into()), true).unwrap();
        assert_eq!(detailed, "Dsp (rev 1.0, alpha, ACME) [Analog @ P1]\n");
    }
}
