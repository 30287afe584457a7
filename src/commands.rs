//! CLI command handlers
//!
//! Each handler calls one core operation and formats the result. Command
//! results go to stdout; warnings and errors go to stderr.

use std::collections::HashMap;
use std::path::Path;
use clap::ValueEnum;
use owo_colors::OwoColorize;
use iplm::cascade::{CascadePolicy, CascadeReport};
use iplm::config::{self, IplmConfig};
use iplm::find::{FindCriteria, Finder};
use iplm::hierarchy::{IpHierarchy, TreeScope};
use iplm::storage::{Gateway, Predicate, SqliteStore};
use iplm::ui::{self, Icons, IpRow, ProcessRow, TypeRow};
use iplm::{Error, Ip, IpType, IpUpdate, Lifecycle, NewIp, Process, ProcessUpdate, TypeTree};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl OutputFormat {
    pub fn is_json(&self) -> bool {
        *self == OutputFormat::Json
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn policy(cascade: bool) -> CascadePolicy {
    if cascade { CascadePolicy::Cascade } else { CascadePolicy::Restrict }
}

/// Report a delete, or explain why it was refused
fn finish_delete(result: iplm::Result<CascadeReport>) -> anyhow::Result<()> {
    match result {
        Ok(report) => {
            for removal in &report.removed {
                ui::removed(removal);
            }
            ui::success(&format!(
                "Deleted {} '{}'{}",
                report.target.table,
                report.target.name,
                if report.removed.is_empty() {
                    String::new()
                } else {
                    format!(" and {} dependent(s)", report.removed.len())
                }
            ));
            Ok(())
        }
        Err(Error::CascadeRequired(plan)) => {
            ui::cascade_refused(&plan);
            anyhow::bail!("delete of {} '{}' not confirmed", plan.target.table, plan.target.name)
        }
        Err(e) => Err(e.into()),
    }
}

fn or_dash(value: Option<&str>) -> String {
    value.map_or_else(|| ui::muted("-"), str::to_string)
}

// ========== Database ==========

pub fn run_db_init(config_path: &Path, db_path: &Path, force: bool) -> anyhow::Result<()> {
    if config_path.exists() && !force {
        ui::status(Icons::GEAR, "Config", &format!("{} (existing)", config_path.display()));
    } else {
        let config = IplmConfig {
            database: Some(db_path.to_string_lossy().into_owned()),
            ..IplmConfig::initial()
        };
        config::write_config(config_path, &config, force)?;
        ui::status(Icons::GEAR, "Config", &config_path.display().to_string());
    }

    config::ensure_db_dir(db_path)?;
    SqliteStore::open(db_path)?;
    ui::status(Icons::DATABASE, "Database", &db_path.display().to_string());
    ui::success("Database initialized");
    Ok(())
}

pub fn run_db_status(store: &SqliteStore, db_path: &Path) -> anyhow::Result<()> {
    let stats = store.stats()?;
    ui::header("IPLM Database Status");
    ui::status(Icons::DATABASE, "Database", &db_path.display().to_string());

    let processes = stats.processes.to_string();
    let types = stats.types.to_string();
    let ips = stats.ips.to_string();
    ui::section(&format!("{} Records", Icons::STATS));
    println!(
        "{}",
        ui::stats_table(&[("Processes", processes.as_str()), ("Types", types.as_str()), ("IPs", ips.as_str())])
    );

    match TypeTree::new(store).verify() {
        Ok(()) => ui::success("Type paths consistent"),
        Err(e) => ui::warn(&e.to_string()),
    }
    Ok(())
}

// ========== Process ==========

pub fn run_process_create(store: &SqliteStore, process: Process) -> anyhow::Result<()> {
    let process = Lifecycle::new(store).create_process(process)?;
    ui::success(&format!("Created process {}", process));
    Ok(())
}

pub fn run_process_list(store: &SqliteStore, format: OutputFormat) -> anyhow::Result<()> {
    let processes = Lifecycle::new(store).list_processes()?;
    if format.is_json() {
        return print_json(&processes);
    }
    if processes.is_empty() {
        println!("No processes found.");
        return Ok(());
    }
    let rows: Vec<ProcessRow> = processes.iter().map(ProcessRow::from).collect();
    println!("{}", ui::render(&rows));
    Ok(())
}

pub fn run_process_show(store: &SqliteStore, name: &str, format: OutputFormat) -> anyhow::Result<()> {
    let process = Lifecycle::new(store).process_by_name(name)?;
    let criteria = FindCriteria { process_name: Some(name.to_string()), ..Default::default() };
    let ips: Vec<String> = Finder::new(store).find(&criteria)?.into_iter().map(|ip| ip.name).collect();

    if format.is_json() {
        return print_json(&serde_json::json!({ "process": process, "ips": ips }));
    }
    ui::header(&format!("Process {}", process.name));
    ui::status(Icons::FACTORY, "Fab", &process.fab);
    ui::info("Node", &process.node);
    ui::info("Description", &or_dash(process.description.as_deref()));
    ui::info("Created", &or_dash(process.created_at.as_deref()));
    ui::info("Updated", &or_dash(process.updated_at.as_deref()));
    ui::info("IPs", &if ips.is_empty() { ui::muted("none") } else { ips.join(", ") });
    Ok(())
}

pub fn run_process_update(store: &SqliteStore, name: &str, update: ProcessUpdate) -> anyhow::Result<()> {
    if update.is_empty() {
        anyhow::bail!("nothing to update; pass at least one field");
    }
    let process = Lifecycle::new(store).update_process(name, &update)?;
    ui::success(&format!("Updated process {}", process));
    Ok(())
}

pub fn run_process_delete(store: &SqliteStore, name: &str, cascade: bool) -> anyhow::Result<()> {
    finish_delete(Lifecycle::new(store).delete_process(name, policy(cascade)))
}

// ========== Type ==========

fn resolve_parent(tree: &TypeTree<'_, SqliteStore>, parent: Option<&str>) -> anyhow::Result<Option<i64>> {
    Ok(match parent {
        Some(name) => tree.resolve(name)?.id,
        None => None,
    })
}

pub fn run_type_create(
    store: &SqliteStore,
    name: &str,
    parent: Option<&str>,
    description: Option<&str>,
) -> anyhow::Result<()> {
    let tree = TypeTree::new(store);
    let parent_id = resolve_parent(&tree, parent)?;
    let created = tree.create_type(name, parent_id, description)?;
    ui::success(&format!("Created type {}", created));
    Ok(())
}

pub fn run_type_list(store: &SqliteStore, format: OutputFormat) -> anyhow::Result<()> {
    let types = TypeTree::new(store).list()?;
    if format.is_json() {
        return print_json(&types);
    }
    if types.is_empty() {
        println!("No types found.");
        return Ok(());
    }
    let rows: Vec<TypeRow> = types.iter().map(TypeRow::from).collect();
    println!("{}", ui::render(&rows));
    Ok(())
}

pub fn run_type_tree(store: &SqliteStore) -> anyhow::Result<()> {
    let forest = TypeTree::new(store).forest()?;
    if forest.is_empty() {
        println!("No types found.");
        return Ok(());
    }
    print!("{}", forest.render(None, &|t: &IpType| t.name.clone()));
    Ok(())
}

pub fn run_type_show(store: &SqliteStore, name: &str, format: OutputFormat) -> anyhow::Result<()> {
    let tree = TypeTree::new(store);
    let node = tree.resolve(name)?;
    let id = node.id.unwrap_or_default();
    let children: Vec<String> = tree.children_of(id)?.into_iter().map(|t| t.name).collect();
    let ancestors: Vec<String> = tree.ancestors_of(id)?.into_iter().map(|t| t.path).collect();
    let direct = tree.descendant_ips_of_type(id, false)?.len();
    let total = tree.descendant_ips_of_type(id, true)?.len();

    if format.is_json() {
        return print_json(&serde_json::json!({
            "type": node,
            "ancestors": ancestors,
            "children": children,
            "ips": direct,
            "ips_including_descendants": total,
        }));
    }
    ui::header(&format!("Type {}", node.path));
    ui::info("Name", &node.name);
    ui::info("Level", &node.level.to_string());
    ui::info("Ancestors", &if ancestors.is_empty() { ui::muted("root") } else { ancestors.join(" ← ") });
    ui::info("Children", &if children.is_empty() { ui::muted("none") } else { children.join(", ") });
    ui::info("Description", &or_dash(node.description.as_deref()));
    ui::info("IPs", &format!("{} ({} including subtypes)", direct, total));
    Ok(())
}

pub fn run_type_move(store: &SqliteStore, name: &str, parent: Option<&str>) -> anyhow::Result<()> {
    let tree = TypeTree::new(store);
    let node = tree.resolve(name)?;
    let parent_id = resolve_parent(&tree, parent)?;
    let moved = tree.reparent_type(node.id.unwrap_or_default(), parent_id)?;
    ui::success(&format!("Moved {} to {}", node.path, moved.path));
    Ok(())
}

pub fn run_type_delete(store: &SqliteStore, name: &str, cascade: bool) -> anyhow::Result<()> {
    let tree = TypeTree::new(store);
    let node = tree.resolve(name)?;
    finish_delete(tree.delete_type(node.id.unwrap_or_default(), policy(cascade)))
}

// ========== IP ==========

/// IP fields as given on the command line, with references by name
#[derive(Debug, Clone, Default)]
pub struct IpInput {
    pub name: String,
    pub type_name: String,
    pub process: String,
    pub revision: String,
    pub status: String,
    pub provider: String,
    pub description: Option<String>,
    pub documentation: Option<String>,
    pub parent: Option<String>,
}

/// Changes to an IP as given on the command line
#[derive(Debug, Clone, Default)]
pub struct IpChanges {
    pub update: IpUpdate,
    pub type_name: Option<String>,
    pub process: Option<String>,
}

fn ip_rows(store: &SqliteStore, ips: &[Ip]) -> anyhow::Result<Vec<IpRow>> {
    let types: HashMap<i64, String> = store
        .find_many::<IpType>(&Predicate::all())?
        .into_iter()
        .filter_map(|t| t.id.map(|id| (id, t.path)))
        .collect();
    let processes: HashMap<i64, String> = store
        .find_many::<Process>(&Predicate::all())?
        .into_iter()
        .filter_map(|p| p.id.map(|id| (id, p.name)))
        .collect();
    let names: HashMap<i64, String> = store
        .find_many::<Ip>(&Predicate::all())?
        .into_iter()
        .filter_map(|ip| ip.id.map(|id| (id, ip.name)))
        .collect();
    let lookup = |map: &HashMap<i64, String>, id: Option<i64>| {
        id.and_then(|id| map.get(&id).cloned()).unwrap_or_default()
    };

    Ok(ips
        .iter()
        .map(|ip| IpRow {
            name: ip.name.clone(),
            revision: ip.revision.clone(),
            status: ui::ip_status(ip.status),
            provider: ip.provider.clone(),
            type_path: lookup(&types, Some(ip.type_id)),
            process: lookup(&processes, Some(ip.process_id)),
            parent: lookup(&names, ip.parent_ip_id),
        })
        .collect())
}

fn print_ips(store: &SqliteStore, ips: &[Ip], format: OutputFormat) -> anyhow::Result<()> {
    if format.is_json() {
        return print_json(&ips);
    }
    if ips.is_empty() {
        println!("No IPs found.");
        return Ok(());
    }
    println!("{}", ui::render(&ip_rows(store, ips)?));
    println!("{}", ui::dim(&format!("{} IP(s)", ips.len())));
    Ok(())
}

pub fn run_ip_create(store: &SqliteStore, input: IpInput) -> anyhow::Result<()> {
    let life = Lifecycle::new(store);
    let type_id = TypeTree::new(store).resolve(&input.type_name)?.id.unwrap_or_default();
    let process_id = life.process_by_name(&input.process)?.id.unwrap_or_default();

    let mut new_ip = NewIp::new(input.name)
        .type_id(type_id)
        .process_id(process_id)
        .revision(input.revision)
        .status(input.status)
        .provider(input.provider);
    if let Some(description) = input.description {
        new_ip = new_ip.description(description);
    }
    if let Some(documentation) = input.documentation {
        new_ip = new_ip.documentation(documentation);
    }
    if let Some(parent) = &input.parent {
        new_ip = new_ip.parent_ip_id(life.ip_by_name(parent)?.id.unwrap_or_default());
    }

    let ip = life.create(new_ip)?;
    ui::success(&format!("Created IP {}", ip));
    Ok(())
}

pub fn run_ip_list(store: &SqliteStore, format: OutputFormat) -> anyhow::Result<()> {
    let ips = Lifecycle::new(store).list_ips()?;
    print_ips(store, &ips, format)
}

pub fn run_ip_show(store: &SqliteStore, name: &str, format: OutputFormat) -> anyhow::Result<()> {
    let criteria = FindCriteria { name: Some(name.to_string()), ..Default::default() };
    let pack = Finder::new(store).pack(&criteria)?;
    let Some(packed) = pack.ips.into_iter().next() else {
        return Err(Error::NotFound(format!("IP '{}'", name)).into());
    };

    if format.is_json() {
        return print_json(&packed);
    }
    let ip = &packed.ip;
    ui::header(&format!("IP {}", ip.name));
    ui::status(Icons::CHIP, "Revision", &ip.revision);
    ui::info("Status", &ui::ip_status(ip.status));
    ui::info("Provider", &ip.provider);
    ui::info("Type", &packed.type_path);
    ui::info("Process", &packed.process.to_string());
    ui::info("Parent", &or_dash(packed.parent.as_deref()));
    ui::info(
        "Children",
        &if packed.children.is_empty() { ui::muted("none") } else { packed.children.join(", ") },
    );
    ui::info("Description", &or_dash(ip.description.as_deref()));
    ui::info("Documentation", &or_dash(ip.documentation.as_deref()));
    ui::info("Created", &or_dash(ip.created_at.as_deref()));
    ui::info("Updated", &or_dash(ip.updated_at.as_deref()));
    Ok(())
}

pub fn run_ip_find(store: &SqliteStore, criteria: &FindCriteria, format: OutputFormat) -> anyhow::Result<()> {
    if !format.is_json() {
        println!("{} Searching IPs...", Icons::SEARCH);
    }
    let ips = Finder::new(store).find(criteria)?;
    print_ips(store, &ips, format)
}

pub fn run_ip_release(store: &SqliteStore, name: &str) -> anyhow::Result<()> {
    let ip = Lifecycle::new(store).release(name)?;
    ui::success(&format!("{} {} is now {}", Icons::PACKAGE, ip.name, ui::ip_status(ip.status)));
    Ok(())
}

pub fn run_ip_update(store: &SqliteStore, name: &str, changes: IpChanges) -> anyhow::Result<()> {
    let mut update = changes.update;
    if let Some(type_name) = &changes.type_name {
        update.type_id = TypeTree::new(store).resolve(type_name)?.id;
    }
    if let Some(process) = &changes.process {
        update.process_id = Lifecycle::new(store).process_by_name(process)?.id;
    }
    if update.is_empty() {
        anyhow::bail!("nothing to update; pass at least one field");
    }

    let ip = Lifecycle::new(store).update(name, &update)?;
    ui::success(&format!("Updated IP {}", ip));
    Ok(())
}

pub fn run_ip_tree(store: &SqliteStore, scope: &TreeScope, details: bool, format: OutputFormat) -> anyhow::Result<()> {
    let hierarchy = IpHierarchy::new(store);
    if format.is_json() {
        return print_json(&hierarchy.nested(scope)?);
    }

    let text = hierarchy.render(scope, details)?;
    if text.is_empty() {
        println!("No IPs found.");
        return Ok(());
    }
    println!("{} {}", Icons::TREE, ui::dim("IP hierarchy"));
    print!("{}", text);
    Ok(())
}

pub fn run_ip_add_child(store: &SqliteStore, parent: &str, child: &str) -> anyhow::Result<()> {
    IpHierarchy::new(store).add_child_ip(parent, child)?;
    ui::success(&format!("{} {} → {}", Icons::LINK, parent, child));
    Ok(())
}

pub fn run_ip_remove_child(store: &SqliteStore, parent: &str, child: &str) -> anyhow::Result<()> {
    IpHierarchy::new(store).remove_child_ip(parent, child)?;
    ui::success(&format!("Detached {} from {}", child, parent));
    Ok(())
}

pub fn run_ip_delete(store: &SqliteStore, name: &str, cascade: bool) -> anyhow::Result<()> {
    finish_delete(IpHierarchy::new(store).delete_ip(name, policy(cascade)))
}

pub fn run_ip_pack(store: &SqliteStore, criteria: &FindCriteria, output: Option<&Path>) -> anyhow::Result<()> {
    if criteria.is_empty() {
        ui::warn("no criteria given; packing every IP");
    }
    let pack = Finder::new(store).pack(criteria)?;
    let json = serde_json::to_string_pretty(&pack)?;
    match output {
        Some(path) => {
            std::fs::write(path, json)?;
            ui::success(&format!(
                "{} Packed {} IP(s) into {}",
                Icons::PACKAGE,
                pack.metadata.count,
                path.display().bold()
            ));
        }
        None => println!("{}", json),
    }
    Ok(())
}
