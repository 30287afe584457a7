//! Type taxonomy engine
//!
//! Maintains the materialized `path`/`level` of every Type under insert and
//! move, and answers subtree/ancestor questions, including the tree-aware
//! IP lookup ("all IPs whose type is under Digital").
//!
//! Invariants kept here:
//! - root: `path == name`, `level == 0`
//! - child: `path == parent.path + "/" + name`, `level == parent.level + 1`
//! - paths are unique, so a path names exactly one node

use std::collections::HashSet;
use crate::{Error, Result};
use crate::cascade::{CascadePlan, CascadePolicy, CascadeReport, Removal};
use crate::ip::Ip;
use crate::ip_type::{self, IpType, PATH_SEPARATOR};
use crate::storage::{Gateway, Predicate, Table};
use crate::tree::Forest;

/// Operations over the Type forest
pub struct TypeTree<'a, G: Gateway> {
    store: &'a G,
}

impl<'a, G: Gateway> TypeTree<'a, G> {
    pub fn new(store: &'a G) -> Self {
        Self { store }
    }

    /// Fetch a type by id
    pub fn get(&self, id: i64) -> Result<IpType> {
        self.store
            .get::<IpType>(id)?
            .ok_or_else(|| Error::NotFound(format!("type with id {}", id)))
    }

    /// Resolve a type by bare name or by full path.
    ///
    /// Names are not unique across the forest; a bare name resolves to the
    /// first match in path order, while `Digital/CPU` matches one node exactly.
    pub fn resolve(&self, name_or_path: &str) -> Result<IpType> {
        let predicate = if name_or_path.contains(PATH_SEPARATOR) {
            Predicate::all().eq("path", name_or_path.to_string())
        } else {
            Predicate::all()
                .eq("name", name_or_path.to_string())
                .order_by("path")
        };
        self.store
            .find_one::<IpType>(&predicate)?
            .ok_or_else(|| Error::NotFound(format!("type '{}'", name_or_path)))
    }

    /// All types in path order (a depth-first listing)
    pub fn list(&self) -> Result<Vec<IpType>> {
        self.store.find_many(&Predicate::all().order_by("path"))
    }

    pub fn roots(&self) -> Result<Vec<IpType>> {
        self.store
            .find_many(&Predicate::all().is_null("parent_id").order_by("name"))
    }

    pub fn children_of(&self, id: i64) -> Result<Vec<IpType>> {
        self.get(id)?;
        self.store
            .find_many(&Predicate::all().eq("parent_id", id).order_by("name"))
    }

    /// True if `descendant` lies strictly below `ancestor`
    pub fn is_ancestor_of(&self, ancestor: i64, descendant: i64) -> Result<bool> {
        Ok(self.get(ancestor)?.is_ancestor_of(&self.get(descendant)?))
    }

    /// Load the whole taxonomy into an arena
    pub fn forest(&self) -> Result<Forest<IpType>> {
        Ok(Forest::new(self.list()?))
    }

    fn ensure_path_free(&self, path: &str, ignore: &HashSet<i64>) -> Result<()> {
        let taken = self
            .store
            .find_many::<IpType>(&Predicate::all().eq("path", path.to_string()))?
            .into_iter()
            .any(|t| t.id.is_some_and(|id| !ignore.contains(&id)));
        if taken {
            return Err(Error::Validation(format!("type path '{}' already exists", path)));
        }
        Ok(())
    }

    /// Create a type at the root or under `parent_id`
    pub fn create_type(&self, name: &str, parent_id: Option<i64>, description: Option<&str>) -> Result<IpType> {
        ip_type::validate_name(name)?;

        let parent = parent_id.map(|id| self.get(id)).transpose()?;
        let mut node = IpType::new(name).placed_under(parent.as_ref());
        node.description = description.map(str::to_string);

        self.ensure_path_free(&node.path, &HashSet::new())?;

        let id = self.store.insert_record(&node)?;
        tracing::info!(path = %node.path, id, "created type");
        self.get(id)
    }

    /// Move a type (with its whole subtree) under `new_parent_id`, or to the
    /// root when `None`.
    ///
    /// Every descendant keeps its path suffix relative to the moved node.
    /// All checks run before the first write; the writes themselves are
    /// independent (node first, then descendants in path order).
    pub fn reparent_type(&self, id: i64, new_parent_id: Option<i64>) -> Result<IpType> {
        let node = self.get(id)?;

        if new_parent_id == Some(id) {
            return Err(Error::Cycle(format!("type '{}' cannot be its own parent", node.path)));
        }
        let new_parent = new_parent_id.map(|p| self.get(p)).transpose()?;
        if let Some(parent) = &new_parent {
            let forest = self.forest()?;
            if forest.is_descendant(parent.id.unwrap_or_default(), id) || node.is_ancestor_of(parent) {
                return Err(Error::Cycle(format!(
                    "cannot move '{}' under its own descendant '{}'",
                    node.path, parent.path
                )));
            }
        }
        if node.parent_id == new_parent_id {
            return Ok(node);
        }

        let old_path = node.path.clone();
        let old_level = node.level;
        let descendants: Vec<IpType> = self.subtree_of(id)?.filter(|t| t.id != Some(id)).collect();

        let moved = node.placed_under(new_parent.as_ref());
        let subtree_ids: HashSet<i64> = descendants.iter().filter_map(|t| t.id).chain([id]).collect();
        self.ensure_path_free(&moved.path, &subtree_ids)?;

        self.store.save_record(&moved)?;
        for mut descendant in descendants {
            descendant.path = format!("{}{}", moved.path, &descendant.path[old_path.len()..]);
            descendant.level = descendant.level - old_level + moved.level;
            self.store.save_record(&descendant)?;
        }

        tracing::info!(from = %old_path, to = %moved.path, "moved type");
        self.get(id)
    }

    /// The node itself and every type whose path lies under it.
    ///
    /// Reads the current persisted state once; later writes are not seen by
    /// an iterator already handed out.
    pub fn subtree_of(&self, id: i64) -> Result<impl Iterator<Item = IpType>> {
        let root = self.get(id)?;
        let nodes: Vec<IpType> = self
            .store
            .find_many(&Predicate::all().path_within("path", root.path).order_by("path"))?;
        Ok(nodes.into_iter())
    }

    /// Parent chain from the node's parent up to its root.
    ///
    /// Walks `parent_id` links in storage. A link to a missing row is an
    /// integrity failure, reported rather than repaired.
    pub fn ancestors_of(&self, id: i64) -> Result<Vec<IpType>> {
        let node = self.get(id)?;
        let mut seen = HashSet::from([id]);
        let mut ancestors = Vec::new();
        let mut next = node.parent_id;

        while let Some(parent_id) = next {
            if !seen.insert(parent_id) {
                return Err(Error::Integrity(format!(
                    "parent chain of type '{}' loops back to id {}",
                    node.path, parent_id
                )));
            }
            let parent = self.store.get::<IpType>(parent_id)?.ok_or_else(|| {
                Error::Integrity(format!(
                    "type '{}' has a dangling parent link to id {}",
                    ancestors.last().map_or(node.path.as_str(), |t: &IpType| t.path.as_str()),
                    parent_id
                ))
            })?;
            next = parent.parent_id;
            ancestors.push(parent);
        }
        Ok(ancestors)
    }

    /// IPs typed as `id` itself, or as anything in its subtree
    pub fn descendant_ips_of_type(&self, id: i64, include_descendants: bool) -> Result<Vec<Ip>> {
        let type_ids: Vec<i64> = if include_descendants {
            self.subtree_of(id)?.filter_map(|t| t.id).collect()
        } else {
            self.get(id)?;
            vec![id]
        };
        self.store
            .find_many(&Predicate::all().in_list("type_id", type_ids).order_by("name"))
    }

    /// Everything deleting `id` would remove: its descendant types, the IPs
    /// typed under any of them, and those IPs' child IPs
    pub fn delete_plan(&self, id: i64) -> Result<CascadePlan> {
        let node = self.get(id)?;
        let forest = self.forest()?;
        let subtree: Vec<i64> = self.subtree_of(id)?.filter_map(|t| t.id).collect();

        let mut plan = CascadePlan::new(Removal::new(Table::Types, id, node.path.clone()));

        let ips = Forest::new(self.store.find_many::<Ip>(&Predicate::all())?);
        let typed: Vec<i64> = self
            .store
            .find_many::<Ip>(&Predicate::all().in_list("type_id", subtree.clone()).order_by("name"))?
            .into_iter()
            .filter_map(|ip| ip.id)
            .collect();
        plan.add_ip_subtrees(&ips, typed);

        for type_id in forest.leaf_first(id) {
            if type_id == id {
                continue;
            }
            if let Some(t) = forest.get(type_id) {
                plan.push(Removal::new(Table::Types, type_id, t.path.clone()));
            }
        }
        // nodes reachable by path but not by parent links (inconsistent data)
        for type_id in subtree {
            if type_id != id && !plan.dependents.iter().any(|r| r.table == Table::Types && r.id == type_id) {
                return Err(Error::Integrity(format!(
                    "type id {} lies under '{}' by path but not by parent links",
                    type_id, node.path
                )));
            }
        }

        Ok(plan)
    }

    /// Delete a type. With dependents, `Restrict` fails with
    /// [`Error::CascadeRequired`] and `Cascade` removes them all.
    pub fn delete_type(&self, id: i64, policy: CascadePolicy) -> Result<CascadeReport> {
        let report = self.delete_plan(id)?.run(self.store, policy)?;
        tracing::info!(path = %report.target.name, removed = report.removed.len(), "deleted type");
        Ok(report)
    }

    /// Check every stored path/level against the parent links
    pub fn verify(&self) -> Result<()> {
        let forest = self.forest()?;
        for node in self.list()? {
            let id = node.id.unwrap_or_default();
            let expected_path = forest.label_path(id)?.join("/");
            let expected_level = forest.ancestors(id)?.len() as i64;
            if node.path != expected_path || node.level != expected_level {
                return Err(Error::Integrity(format!(
                    "type id {} stores path '{}' level {}, expected '{}' level {}",
                    id, node.path, node.level, expected_path, expected_level
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::Lifecycle;
    use crate::process::Process;
    use crate::ip::NewIp;
    use crate::storage::SqliteStore;

    struct Fixture {
        store: SqliteStore,
    }

    /// Digital → CPU → {ARM, RISC-V}; Digital → Memory; Analog → ADC
    fn fixture() -> Fixture {
        let store = SqliteStore::open_in_memory().unwrap();
        {
            let tree = TypeTree::new(&store);
            let digital = tree.create_type("Digital", None, Some("Digital IP")).unwrap();
            let cpu = tree.create_type("CPU", digital.id, None).unwrap();
            tree.create_type("ARM", cpu.id, None).unwrap();
            tree.create_type("RISC-V", cpu.id, None).unwrap();
            tree.create_type("Memory", digital.id, None).unwrap();
            let analog = tree.create_type("Analog", None, None).unwrap();
            tree.create_type("ADC", analog.id, None).unwrap();
        }
        Fixture { store }
    }

    fn paths(types: impl IntoIterator<Item = IpType>) -> Vec<String> {
        types.into_iter().map(|t| t.path).collect()
    }

    fn add_ip(store: &SqliteStore, name: &str, type_path: &str, parent: Option<i64>) -> Ip {
        let tree = TypeTree::new(store);
        let life = Lifecycle::new(store);
        let process = match life.process_by_name("P1") {
            Ok(p) => p,
            Err(_) => life.create_process(Process::new("P1", "28nm", "TSMC")).unwrap(),
        };
        let mut new_ip = NewIp::new(name)
            .type_id(tree.resolve(type_path).unwrap().id.unwrap())
            .process_id(process.id.unwrap())
            .revision("1.0")
            .status("alpha")
            .provider("ACME");
        if let Some(parent) = parent {
            new_ip = new_ip.parent_ip_id(parent);
        }
        life.create(new_ip).unwrap()
    }

    #[test]
    fn test_create_computes_path_and_level() {
        let f = fixture();
        let tree = TypeTree::new(&f.store);

        let arm = tree.resolve("ARM").unwrap();
        assert_eq!(arm.path, "Digital/CPU/ARM");
        assert_eq!(arm.level, 2);
        assert_eq!(tree.resolve("Digital").unwrap().level, 0);
        assert_eq!(tree.resolve("Digital/CPU").unwrap().name, "CPU");
        tree.verify().unwrap();
    }

    #[test]
    fn test_roots_children_and_listing() {
        let f = fixture();
        let tree = TypeTree::new(&f.store);
        let digital = tree.resolve("Digital").unwrap().id.unwrap();
        let arm = tree.resolve("ARM").unwrap().id.unwrap();

        assert_eq!(paths(tree.roots().unwrap()), vec!["Analog", "Digital"]);
        assert_eq!(paths(tree.children_of(digital).unwrap()), vec!["Digital/CPU", "Digital/Memory"]);
        assert_eq!(tree.list().unwrap().len(), 7);
        assert!(tree.is_ancestor_of(digital, arm).unwrap());
        assert!(!tree.is_ancestor_of(arm, digital).unwrap());
        assert!(!tree.is_ancestor_of(digital, digital).unwrap());
    }

    #[test]
    fn test_create_with_missing_parent_is_not_found() {
        let f = fixture();
        let tree = TypeTree::new(&f.store);
        let before = f.store.count(Table::Types).unwrap();

        assert!(matches!(tree.create_type("X", Some(999), None), Err(Error::NotFound(_))));
        assert_eq!(f.store.count(Table::Types).unwrap(), before);
    }

    #[test]
    fn test_create_rejects_bad_name_and_duplicate_path() {
        let f = fixture();
        let tree = TypeTree::new(&f.store);
        let digital = tree.resolve("Digital").unwrap();

        assert!(matches!(tree.create_type("a/b", None, None), Err(Error::Validation(_))));
        assert!(matches!(tree.create_type("CPU", digital.id, None), Err(Error::Validation(_))));
        // same name under a different parent is fine
        let analog = tree.resolve("Analog").unwrap();
        let cpu2 = tree.create_type("CPU", analog.id, None).unwrap();
        assert_eq!(cpu2.path, "Analog/CPU");
        assert_eq!(tree.resolve("CPU").unwrap().path, "Analog/CPU");
    }

    #[test]
    fn test_subtree_includes_self_and_exact_prefix_matches() {
        let f = fixture();
        let tree = TypeTree::new(&f.store);
        // "Digital2" shares a string prefix with "Digital" but is not under it
        tree.create_type("Digital2", None, None).unwrap();
        let digital = tree.resolve("Digital").unwrap();

        let subtree = paths(tree.subtree_of(digital.id.unwrap()).unwrap());
        assert_eq!(
            subtree,
            vec!["Digital", "Digital/CPU", "Digital/CPU/ARM", "Digital/CPU/RISC-V", "Digital/Memory"]
        );
    }

    #[test]
    fn test_ancestors_walk_to_root() {
        let f = fixture();
        let tree = TypeTree::new(&f.store);
        let arm = tree.resolve("ARM").unwrap();

        assert_eq!(paths(tree.ancestors_of(arm.id.unwrap()).unwrap()), vec!["Digital/CPU", "Digital"]);
        let digital = tree.resolve("Digital").unwrap();
        assert!(tree.ancestors_of(digital.id.unwrap()).unwrap().is_empty());
        assert!(matches!(tree.ancestors_of(999), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_ancestors_report_dangling_link() {
        let f = fixture();
        let tree = TypeTree::new(&f.store);
        let arm = tree.resolve("ARM").unwrap().id.unwrap();
        f.store
            .connection()
            .execute_batch(
                "PRAGMA foreign_keys = OFF;
                 UPDATE types SET parent_id = 12345 WHERE name = 'CPU';",
            )
            .unwrap();

        let err = tree.ancestors_of(arm).unwrap_err();
        assert!(matches!(err, Error::Integrity(msg) if msg.contains("12345")));
    }

    #[test]
    fn test_reparent_rewrites_subtree() {
        let f = fixture();
        let tree = TypeTree::new(&f.store);
        let cpu = tree.resolve("CPU").unwrap();
        let analog = tree.resolve("Analog").unwrap();

        let moved = tree.reparent_type(cpu.id.unwrap(), analog.id).unwrap();
        assert_eq!(moved.path, "Analog/CPU");
        assert_eq!(moved.level, 1);

        let arm = tree.get(tree.resolve("ARM").unwrap().id.unwrap()).unwrap();
        assert_eq!(arm.path, "Analog/CPU/ARM");
        assert_eq!(arm.level, 2);
        tree.verify().unwrap();

        // and back to the root
        let root = tree.reparent_type(cpu.id.unwrap(), None).unwrap();
        assert_eq!(root.path, "CPU");
        assert_eq!(root.level, 0);
        assert_eq!(tree.resolve("RISC-V").unwrap().path, "CPU/RISC-V");
        assert_eq!(tree.resolve("RISC-V").unwrap().level, 1);
        tree.verify().unwrap();
    }

    #[test]
    fn test_reparent_into_own_subtree_is_cycle_and_changes_nothing() {
        let f = fixture();
        let tree = TypeTree::new(&f.store);
        let digital = tree.resolve("Digital").unwrap();
        let arm = tree.resolve("ARM").unwrap();
        let before = paths(tree.list().unwrap());

        assert!(matches!(tree.reparent_type(digital.id.unwrap(), arm.id), Err(Error::Cycle(_))));
        assert!(matches!(tree.reparent_type(digital.id.unwrap(), digital.id), Err(Error::Cycle(_))));
        assert_eq!(paths(tree.list().unwrap()), before);
    }

    #[test]
    fn test_reparent_to_missing_parent_is_not_found() {
        let f = fixture();
        let tree = TypeTree::new(&f.store);
        let cpu = tree.resolve("CPU").unwrap();
        assert!(matches!(tree.reparent_type(cpu.id.unwrap(), Some(999)), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_reparent_onto_existing_path_is_rejected() {
        let f = fixture();
        let tree = TypeTree::new(&f.store);
        let analog = tree.resolve("Analog").unwrap();
        tree.create_type("CPU", analog.id, None).unwrap();
        let cpu = tree.resolve("Digital/CPU").unwrap();

        assert!(matches!(tree.reparent_type(cpu.id.unwrap(), analog.id), Err(Error::Validation(_))));
    }

    #[test]
    fn test_descendant_ips_of_type() {
        let f = fixture();
        let tree = TypeTree::new(&f.store);
        add_ip(&f.store, "Core1", "Digital/CPU/ARM", None);
        add_ip(&f.store, "Mem1", "Digital/Memory", None);
        add_ip(&f.store, "Adc1", "Analog/ADC", None);
        let digital = tree.resolve("Digital").unwrap().id.unwrap();

        let all: Vec<_> = tree
            .descendant_ips_of_type(digital, true)
            .unwrap()
            .into_iter()
            .map(|ip| ip.name)
            .collect();
        assert_eq!(all, vec!["Core1", "Mem1"]);
        assert!(tree.descendant_ips_of_type(digital, false).unwrap().is_empty());
    }

    #[test]
    fn test_delete_type_requires_acknowledgement() {
        let f = fixture();
        let tree = TypeTree::new(&f.store);
        add_ip(&f.store, "Core1", "Digital/CPU/ARM", None);
        let digital = tree.resolve("Digital").unwrap().id.unwrap();
        let types_before = f.store.count(Table::Types).unwrap();

        let err = tree.delete_type(digital, CascadePolicy::Restrict).unwrap_err();
        let Error::CascadeRequired(plan) = err else {
            panic!("expected cascade error");
        };
        assert_eq!(plan.count(Table::Types), 4);
        assert_eq!(plan.count(Table::Ips), 1);
        assert_eq!(f.store.count(Table::Types).unwrap(), types_before);
    }

    #[test]
    fn test_delete_type_cascades_to_types_and_ips() {
        let f = fixture();
        let tree = TypeTree::new(&f.store);
        let soc = add_ip(&f.store, "SoC", "Analog/ADC", None);
        let core = add_ip(&f.store, "Core1", "Digital/CPU/ARM", soc.id);
        // child of a doomed IP, typed outside the deleted subtree
        add_ip(&f.store, "Cache", "Analog", core.id);
        add_ip(&f.store, "Adc1", "Analog/ADC", None);
        let digital = tree.resolve("Digital").unwrap().id.unwrap();

        let report = tree.delete_type(digital, CascadePolicy::Cascade).unwrap();
        assert_eq!(report.count(Table::Types), 4);
        assert_eq!(report.count(Table::Ips), 2);

        assert_eq!(f.store.count(Table::Types).unwrap(), 2);
        let remaining: Vec<_> = f
            .store
            .find_many::<Ip>(&Predicate::all().order_by("name"))
            .unwrap()
            .into_iter()
            .map(|ip| ip.name)
            .collect();
        assert_eq!(remaining, vec!["Adc1", "SoC"]);
    }

    #[test]
    fn test_delete_leaf_type_without_dependents() {
        let f = fixture();
        let tree = TypeTree::new(&f.store);
        let adc = tree.resolve("ADC").unwrap().id.unwrap();

        let report = tree.delete_type(adc, CascadePolicy::Restrict).unwrap();
        assert!(report.removed.is_empty());
        assert!(matches!(tree.get(adc), Err(Error::NotFound(_))));
    }
}
