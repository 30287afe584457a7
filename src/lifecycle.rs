//! Lifecycle operations for IPs and Processes
//!
//! Create, update, release and delete, with the referential checks the
//! records cannot do on their own (unique names, referenced rows exist).
//! Every check runs before the first write, so a failed call leaves the
//! store as it was.

use crate::{Error, Result};
use crate::cascade::{CascadePlan, CascadePolicy, CascadeReport, Removal};
use crate::ip::{Ip, IpUpdate, NewIp};
use crate::ip_type::IpType;
use crate::process::{Process, ProcessUpdate};
use crate::status::IpStatus;
use crate::storage::{Gateway, Predicate, Table};
use crate::tree::Forest;

pub struct Lifecycle<'a, G: Gateway> {
    store: &'a G,
}

impl<'a, G: Gateway> Lifecycle<'a, G> {
    pub fn new(store: &'a G) -> Self {
        Self { store }
    }

    // ========== Process Operations ==========

    pub fn process_by_name(&self, name: &str) -> Result<Process> {
        self.store
            .find_one::<Process>(&Predicate::all().eq("name", name.to_string()))?
            .ok_or_else(|| Error::NotFound(format!("process '{}'", name)))
    }

    pub fn process(&self, id: i64) -> Result<Process> {
        self.store
            .get::<Process>(id)?
            .ok_or_else(|| Error::NotFound(format!("process with id {}", id)))
    }

    pub fn list_processes(&self) -> Result<Vec<Process>> {
        self.store.find_many(&Predicate::all().order_by("name"))
    }

    fn ensure_process_name_free(&self, name: &str) -> Result<()> {
        if self.store.find_one::<Process>(&Predicate::all().eq("name", name.to_string()))?.is_some() {
            return Err(Error::Validation(format!("process '{}' already exists", name)));
        }
        Ok(())
    }

    pub fn create_process(&self, process: Process) -> Result<Process> {
        process.validate()?;
        self.ensure_process_name_free(&process.name)?;

        let id = self.store.insert_record(&process)?;
        tracing::info!(process = %process.name, id, "created process");
        self.process(id)
    }

    pub fn update_process(&self, name: &str, update: &ProcessUpdate) -> Result<Process> {
        let current = self.process_by_name(name)?;
        let mut process = current.clone();
        update.apply_to(&mut process);
        process.validate()?;
        if process.name != current.name {
            self.ensure_process_name_free(&process.name)?;
        }

        self.store.save_record(&process)?;
        tracing::info!(process = %process.name, "updated process");
        self.process_by_name(&process.name)
    }

    /// The process plus every IP built on it and their child IPs
    pub fn process_delete_plan(&self, name: &str) -> Result<CascadePlan> {
        let process = self.process_by_name(name)?;
        let id = process.id.unwrap_or_default();
        let mut plan = CascadePlan::new(Removal::new(Table::Processes, id, process.name));

        let forest = Forest::new(self.store.find_many::<Ip>(&Predicate::all())?);
        let dependents: Vec<i64> = self
            .store
            .find_many::<Ip>(&Predicate::all().eq("process_id", id).order_by("name"))?
            .into_iter()
            .filter_map(|ip| ip.id)
            .collect();
        plan.add_ip_subtrees(&forest, dependents);
        Ok(plan)
    }

    pub fn delete_process(&self, name: &str, policy: CascadePolicy) -> Result<CascadeReport> {
        let report = self.process_delete_plan(name)?.run(self.store, policy)?;
        tracing::info!(process = %name, removed = report.removed.len(), "deleted process");
        Ok(report)
    }

    // ========== IP Operations ==========

    pub fn ip_by_name(&self, name: &str) -> Result<Ip> {
        self.store
            .find_one::<Ip>(&Predicate::all().eq("name", name.to_string()))?
            .ok_or_else(|| Error::NotFound(format!("IP '{}'", name)))
    }

    pub fn ip(&self, id: i64) -> Result<Ip> {
        self.store
            .get::<Ip>(id)?
            .ok_or_else(|| Error::NotFound(format!("IP with id {}", id)))
    }

    pub fn list_ips(&self) -> Result<Vec<Ip>> {
        self.store.find_many(&Predicate::all().order_by("name"))
    }

    fn ensure_ip_name_free(&self, name: &str) -> Result<()> {
        if self.store.find_one::<Ip>(&Predicate::all().eq("name", name.to_string()))?.is_some() {
            return Err(Error::Validation(format!("IP '{}' already exists", name)));
        }
        Ok(())
    }

    fn ensure_references(&self, ip: &Ip) -> Result<()> {
        if self.store.get::<IpType>(ip.type_id)?.is_none() {
            return Err(Error::NotFound(format!("type with id {}", ip.type_id)));
        }
        self.process(ip.process_id)?;
        if let Some(parent) = ip.parent_ip_id {
            self.ip(parent)?;
        }
        Ok(())
    }

    /// Validate and persist a new IP
    pub fn create(&self, new_ip: NewIp) -> Result<Ip> {
        let ip = new_ip.validate()?;
        self.ensure_ip_name_free(&ip.name)?;
        self.ensure_references(&ip)?;

        let id = self.store.insert_record(&ip)?;
        tracing::info!(ip = %ip.name, id, status = %ip.status, "created IP");
        self.ip(id)
    }

    /// Apply the provided fields to the IP named `name`.
    ///
    /// An invalid status, blank field, taken name or missing type/process
    /// fails before anything is written.
    pub fn update(&self, name: &str, update: &IpUpdate) -> Result<Ip> {
        let current = self.ip_by_name(name)?;
        let mut ip = current.clone();
        update.apply_to(&mut ip)?;
        if ip.name != current.name {
            self.ensure_ip_name_free(&ip.name)?;
        }
        self.ensure_references(&ip)?;

        if ip == current {
            return Ok(current);
        }
        self.store.save_record(&ip)?;
        tracing::info!(ip = %ip.name, status = %ip.status, "updated IP");
        self.ip_by_name(&ip.name)
    }

    /// Mark an IP as production. Releasing an already released IP is a no-op.
    pub fn release(&self, name: &str) -> Result<Ip> {
        let mut ip = self.ip_by_name(name)?;
        if ip.status == IpStatus::Production {
            tracing::debug!(ip = %ip.name, "already released");
            return Ok(ip);
        }

        let previous = ip.status;
        ip.status = IpStatus::Production;
        self.store.save_record(&ip)?;
        tracing::info!(ip = %ip.name, from = %previous, "released IP");
        self.ip_by_name(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SqliteStore;
    use crate::taxonomy::TypeTree;

    struct Ids {
        cpu: i64,
        p1: i64,
    }

    fn setup(store: &SqliteStore) -> Ids {
        let tree = TypeTree::new(store);
        let digital = tree.create_type("Digital", None, None).unwrap();
        let cpu = tree.create_type("CPU", digital.id, None).unwrap();
        let p1 = Lifecycle::new(store)
            .create_process(Process::new("P1", "28nm", "TSMC"))
            .unwrap();
        Ids { cpu: cpu.id.unwrap(), p1: p1.id.unwrap() }
    }

    fn core(ids: &Ids, name: &str) -> NewIp {
        NewIp::new(name)
            .type_id(ids.cpu)
            .process_id(ids.p1)
            .revision("1.0")
            .status("alpha")
            .provider("ARM")
    }

    #[test]
    fn test_create_process_and_duplicate() {
        let store = SqliteStore::open_in_memory().unwrap();
        let life = Lifecycle::new(&store);

        let p = life.create_process(Process::new("P1", "28nm", "TSMC")).unwrap();
        assert!(p.id.is_some());
        assert!(p.created_at.is_some());

        let err = life.create_process(Process::new("P1", "7nm", "Samsung")).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(matches!(life.create_process(Process::new("P2", " ", "TSMC")), Err(Error::Validation(_))));
        assert_eq!(store.count(Table::Processes).unwrap(), 1);
    }

    #[test]
    fn test_update_process_rename_checks_uniqueness() {
        let store = SqliteStore::open_in_memory().unwrap();
        let life = Lifecycle::new(&store);
        life.create_process(Process::new("P1", "28nm", "TSMC")).unwrap();
        life.create_process(Process::new("P2", "7nm", "TSMC")).unwrap();

        let taken = ProcessUpdate { name: Some("P2".into()), ..Default::default() };
        assert!(matches!(life.update_process("P1", &taken), Err(Error::Validation(_))));

        let update = ProcessUpdate { node: Some("22nm".into()), ..Default::default() };
        let p = life.update_process("P1", &update).unwrap();
        assert_eq!(p.node, "22nm");
        assert_eq!(p.fab, "TSMC");
    }

    #[test]
    fn test_create_ip() {
        let store = SqliteStore::open_in_memory().unwrap();
        let ids = setup(&store);
        let life = Lifecycle::new(&store);

        let ip = life.create(core(&ids, "Core1").description("Main core")).unwrap();
        assert_eq!(ip.status, IpStatus::Alpha);
        assert_eq!(ip.description.as_deref(), Some("Main core"));
        assert_eq!(life.ip_by_name("Core1").unwrap(), ip);
    }

    #[test]
    fn test_create_duplicate_name_does_not_mutate() {
        let store = SqliteStore::open_in_memory().unwrap();
        let ids = setup(&store);
        let life = Lifecycle::new(&store);
        let original = life.create(core(&ids, "Core1")).unwrap();

        let err = life.create(core(&ids, "Core1").revision("2.0").provider("Other")).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(store.count(Table::Ips).unwrap(), 1);
        assert_eq!(life.ip_by_name("Core1").unwrap(), original);
    }

    #[test]
    fn test_create_with_missing_references_is_not_found() {
        let store = SqliteStore::open_in_memory().unwrap();
        let ids = setup(&store);
        let life = Lifecycle::new(&store);

        assert!(matches!(life.create(core(&ids, "A").type_id(999)), Err(Error::NotFound(_))));
        assert!(matches!(life.create(core(&ids, "B").process_id(999)), Err(Error::NotFound(_))));
        assert!(matches!(life.create(core(&ids, "C").parent_ip_id(999)), Err(Error::NotFound(_))));
        assert_eq!(store.count(Table::Ips).unwrap(), 0);
    }

    #[test]
    fn test_create_missing_fields_is_validation() {
        let store = SqliteStore::open_in_memory().unwrap();
        setup(&store);
        let life = Lifecycle::new(&store);

        assert!(matches!(life.create(NewIp::new("Core1")), Err(Error::Validation(_))));
        assert_eq!(store.count(Table::Ips).unwrap(), 0);
    }

    #[test]
    fn test_release_is_idempotent() {
        let store = SqliteStore::open_in_memory().unwrap();
        let ids = setup(&store);
        let life = Lifecycle::new(&store);
        life.create(core(&ids, "Core1")).unwrap();

        assert_eq!(life.release("Core1").unwrap().status, IpStatus::Production);
        assert_eq!(life.release("Core1").unwrap().status, IpStatus::Production);
        assert!(matches!(life.release("Nope"), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_update_bad_status_keeps_persisted_state() {
        let store = SqliteStore::open_in_memory().unwrap();
        let ids = setup(&store);
        let life = Lifecycle::new(&store);
        life.create(core(&ids, "Core1")).unwrap();
        life.release("Core1").unwrap();

        let err = life.update("Core1", &IpUpdate::status("invalid_status")).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(life.ip_by_name("Core1").unwrap().status, IpStatus::Production);
    }

    #[test]
    fn test_update_applies_given_fields_only() {
        let store = SqliteStore::open_in_memory().unwrap();
        let ids = setup(&store);
        let life = Lifecycle::new(&store);
        life.create(core(&ids, "Core1")).unwrap();

        let update = IpUpdate {
            revision: Some("2.0".into()),
            status: Some("obsolete".into()),
            ..Default::default()
        };
        let ip = life.update("Core1", &update).unwrap();
        assert_eq!(ip.revision, "2.0");
        assert_eq!(ip.status, IpStatus::Obsolete);
        assert_eq!(ip.provider, "ARM");

        // obsolete is not terminal
        let ip = life.update("Core1", &IpUpdate::status("beta")).unwrap();
        assert_eq!(ip.status, IpStatus::Beta);
    }

    #[test]
    fn test_update_rename_and_references() {
        let store = SqliteStore::open_in_memory().unwrap();
        let ids = setup(&store);
        let life = Lifecycle::new(&store);
        life.create(core(&ids, "Core1")).unwrap();
        life.create(core(&ids, "Core2")).unwrap();

        let taken = IpUpdate { name: Some("Core2".into()), ..Default::default() };
        assert!(matches!(life.update("Core1", &taken), Err(Error::Validation(_))));

        let bad_type = IpUpdate { type_id: Some(999), ..Default::default() };
        assert!(matches!(life.update("Core1", &bad_type), Err(Error::NotFound(_))));

        let rename = IpUpdate { name: Some("Core1b".into()), ..Default::default() };
        assert_eq!(life.update("Core1", &rename).unwrap().name, "Core1b");
        assert!(matches!(life.ip_by_name("Core1"), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_delete_process_cascades_to_ips() {
        let store = SqliteStore::open_in_memory().unwrap();
        let ids = setup(&store);
        let life = Lifecycle::new(&store);
        let p2 = life.create_process(Process::new("P2", "7nm", "TSMC")).unwrap();
        let soc = life.create(core(&ids, "SoC")).unwrap();
        // child on another process still goes with its parent
        life.create(core(&ids, "Sub").process_id(p2.id.unwrap()).parent_ip_id(soc.id.unwrap()))
            .unwrap();
        life.create(core(&ids, "Other").process_id(p2.id.unwrap())).unwrap();

        let err = life.delete_process("P1", CascadePolicy::Restrict).unwrap_err();
        assert!(matches!(err, Error::CascadeRequired(ref plan) if plan.count(Table::Ips) == 2));
        assert_eq!(store.count(Table::Ips).unwrap(), 3);

        let report = life.delete_process("P1", CascadePolicy::Cascade).unwrap();
        assert_eq!(report.count(Table::Ips), 2);
        assert_eq!(store.count(Table::Processes).unwrap(), 1);
        assert_eq!(store.count(Table::Ips).unwrap(), 1);
        assert!(life.ip_by_name("Other").is_ok());
    }
}
