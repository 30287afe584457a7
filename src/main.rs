//! IPLM CLI - Command-line interface for IP lifecycle management

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use iplm::config::{self, IplmConfig};
use iplm::find::FindCriteria;
use iplm::hierarchy::TreeScope;
use iplm::storage::SqliteStore;
use iplm::{IpStatus, IpUpdate, Process, ProcessUpdate};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;

use commands::{IpChanges, IpInput, OutputFormat};

#[derive(Parser)]
#[command(name = "iplm")]
#[command(version)]
#[command(about = "IP Lifecycle Management - track semiconductor IP, processes and type taxonomies")]
#[command(long_about = r#"
IPLM tracks semiconductor IP cores, the fabrication processes they are built
on, and a hierarchical type taxonomy.

Example usage:
  iplm db init
  iplm type create --name Digital
  iplm type create --name CPU --parent Digital
  iplm process create --name P1 --node 28nm --fab TSMC
  iplm ip create --name Core1 --type CPU --process P1 --provider ARM
  iplm ip find --type Digital --descendants
  iplm ip release Core1
"#)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to the database file
    #[arg(short, long, global = true)]
    database: Option<PathBuf>,

    /// Path to the config file (default: iplm.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize or inspect the database
    Db {
        #[command(subcommand)]
        action: DbCommand,
    },

    /// Manage fabrication processes
    Process {
        #[command(subcommand)]
        action: ProcessCommand,
    },

    /// Manage the type taxonomy
    Type {
        #[command(subcommand)]
        action: TypeCommand,
    },

    /// Manage IPs
    Ip {
        #[command(subcommand)]
        action: IpCommand,
    },
}

#[derive(Subcommand)]
enum DbCommand {
    /// Create the schema and a default iplm.toml
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },

    /// Show row counts and check type paths
    Status,
}

#[derive(Subcommand)]
enum ProcessCommand {
    /// Create a process
    Create {
        #[arg(long)]
        name: String,
        /// Technology node, e.g. 28nm
        #[arg(long)]
        node: String,
        /// Foundry, e.g. TSMC
        #[arg(long)]
        fab: String,
        #[arg(long)]
        description: Option<String>,
    },

    /// List all processes
    List {
        #[arg(short, long, value_enum, default_value_t)]
        format: OutputFormat,
    },

    /// Show one process and the IPs built on it
    Show {
        name: String,
        #[arg(short, long, value_enum, default_value_t)]
        format: OutputFormat,
    },

    /// Update process fields
    Update {
        name: String,
        /// New name
        #[arg(long = "name")]
        new_name: Option<String>,
        #[arg(long)]
        node: Option<String>,
        #[arg(long)]
        fab: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },

    /// Delete a process
    Delete {
        name: String,
        /// Also delete every IP built on it
        #[arg(long)]
        cascade: bool,
    },
}

#[derive(Subcommand)]
enum TypeCommand {
    /// Create a type, at the root or under a parent
    Create {
        #[arg(long)]
        name: String,
        /// Parent type name or path (e.g. Digital/CPU)
        #[arg(long)]
        parent: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },

    /// List all types in path order
    List {
        #[arg(short, long, value_enum, default_value_t)]
        format: OutputFormat,
    },

    /// Show the type taxonomy as a tree
    Tree,

    /// Show one type
    Show {
        /// Type name or path
        name: String,
        #[arg(short, long, value_enum, default_value_t)]
        format: OutputFormat,
    },

    /// Move a type (and its subtree) under another parent
    Move {
        /// Type name or path
        name: String,
        /// New parent name or path; omit to make it a root
        #[arg(long)]
        parent: Option<String>,
    },

    /// Delete a type
    Delete {
        /// Type name or path
        name: String,
        /// Also delete subtypes and every IP typed under them
        #[arg(long)]
        cascade: bool,
    },
}

/// Filters shared by `ip find` and `ip pack`
#[derive(clap::Args, Default)]
struct FindArgs {
    #[arg(long)]
    name: Option<String>,
    /// Type name or path
    #[arg(long = "type")]
    type_name: Option<String>,
    /// With --type, include IPs of all subtypes
    #[arg(long, requires = "type_name")]
    descendants: bool,
    #[arg(long)]
    process: Option<String>,
    #[arg(long)]
    status: Option<String>,
    #[arg(long)]
    provider: Option<String>,
    #[arg(long)]
    fab: Option<String>,
    #[arg(long)]
    node: Option<String>,
    /// Only IPs without a parent IP
    #[arg(long)]
    roots: bool,
}

impl FindArgs {
    fn into_criteria(self) -> anyhow::Result<FindCriteria> {
        let status = self.status.as_deref().map(str::parse::<IpStatus>).transpose()?;
        Ok(FindCriteria {
            name: self.name,
            status,
            provider: self.provider,
            type_name: self.type_name,
            include_descendants: self.descendants,
            process_name: self.process,
            fab: self.fab,
            node: self.node,
            roots_only: self.roots,
            ..Default::default()
        })
    }
}

#[derive(Subcommand)]
enum IpCommand {
    /// Create an IP
    Create {
        #[arg(long)]
        name: String,
        /// Type name or path
        #[arg(long = "type")]
        type_name: String,
        /// Process name
        #[arg(long)]
        process: String,
        #[arg(long, default_value = "1.0")]
        revision: String,
        #[arg(long, default_value = "alpha")]
        status: String,
        #[arg(long)]
        provider: String,
        #[arg(long)]
        description: Option<String>,
        /// Documentation URL
        #[arg(long)]
        documentation: Option<String>,
        /// Parent IP name
        #[arg(long)]
        parent: Option<String>,
    },

    /// List all IPs
    List {
        #[arg(short, long, value_enum, default_value_t)]
        format: OutputFormat,
    },

    /// Show one IP
    Show {
        name: String,
        #[arg(short, long, value_enum, default_value_t)]
        format: OutputFormat,
    },

    /// Find IPs matching all given filters
    Find {
        #[command(flatten)]
        filters: FindArgs,
        #[arg(short, long, value_enum, default_value_t)]
        format: OutputFormat,
    },

    /// Mark an IP as production
    Release { name: String },

    /// Update IP fields
    Update {
        name: String,
        /// New name
        #[arg(long = "name")]
        new_name: Option<String>,
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        revision: Option<String>,
        #[arg(long)]
        provider: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        documentation: Option<String>,
        /// Type name or path
        #[arg(long = "type")]
        type_name: Option<String>,
        #[arg(long)]
        process: Option<String>,
    },

    /// Show the IP hierarchy
    Tree {
        /// Root the tree at this IP
        #[arg(conflicts_with_all = ["process", "type_name"])]
        name: Option<String>,
        /// IPs built on this process
        #[arg(long, conflicts_with = "type_name")]
        process: Option<String>,
        /// IPs typed under this type
        #[arg(long = "type")]
        type_name: Option<String>,
        /// Include revision, status, provider, type and process
        #[arg(long)]
        details: bool,
        #[arg(short, long, value_enum, default_value_t)]
        format: OutputFormat,
    },

    /// Attach an IP under a parent IP
    AddChild { parent: String, child: String },

    /// Detach an IP from its parent (the IP is kept)
    RemoveChild { parent: String, child: String },

    /// Delete an IP
    Delete {
        name: String,
        /// Also delete every descendant IP
        #[arg(long)]
        cascade: bool,
    },

    /// Export matching IPs with their references as JSON
    Pack {
        #[command(flatten)]
        filters: FindArgs,
        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn init_logging(verbose: bool, config: &IplmConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = if verbose {
            "debug"
        } else {
            config.log_level.as_deref().unwrap_or("info")
        };
        EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"))
    });

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = config::load_effective(cli.config.as_deref())?;
    init_logging(cli.verbose, &config);

    let db_path = config::resolve_database_path(cli.database.as_deref(), &config);
    tracing::debug!(database = %db_path.display(), "resolved database");

    if let Commands::Db { action: DbCommand::Init { force } } = cli.command {
        let config_path = cli.config.unwrap_or_else(config::default_config_path);
        return commands::run_db_init(&config_path, &db_path, force);
    }

    config::ensure_db_dir(&db_path)?;
    let store = SqliteStore::open(&db_path)?;

    match cli.command {
        Commands::Db { action } => match action {
            DbCommand::Init { .. } => Ok(()),
            DbCommand::Status => commands::run_db_status(&store, &db_path),
        },

        Commands::Process { action } => match action {
            ProcessCommand::Create { name, node, fab, description } => {
                let mut process = Process::new(name, node, fab);
                process.description = description;
                commands::run_process_create(&store, process)
            }
            ProcessCommand::List { format } => commands::run_process_list(&store, format),
            ProcessCommand::Show { name, format } => commands::run_process_show(&store, &name, format),
            ProcessCommand::Update { name, new_name, node, fab, description } => {
                let update = ProcessUpdate { name: new_name, node, fab, description };
                commands::run_process_update(&store, &name, update)
            }
            ProcessCommand::Delete { name, cascade } => commands::run_process_delete(&store, &name, cascade),
        },

        Commands::Type { action } => match action {
            TypeCommand::Create { name, parent, description } => {
                commands::run_type_create(&store, &name, parent.as_deref(), description.as_deref())
            }
            TypeCommand::List { format } => commands::run_type_list(&store, format),
            TypeCommand::Tree => commands::run_type_tree(&store),
            TypeCommand::Show { name, format } => commands::run_type_show(&store, &name, format),
            TypeCommand::Move { name, parent } => commands::run_type_move(&store, &name, parent.as_deref()),
            TypeCommand::Delete { name, cascade } => commands::run_type_delete(&store, &name, cascade),
        },

        Commands::Ip { action } => match action {
            IpCommand::Create {
                name,
                type_name,
                process,
                revision,
                status,
                provider,
                description,
                documentation,
                parent,
            } => {
                let input = IpInput {
                    name,
                    type_name,
                    process,
                    revision,
                    status,
                    provider,
                    description,
                    documentation,
                    parent,
                };
                commands::run_ip_create(&store, input)
            }
            IpCommand::List { format } => commands::run_ip_list(&store, format),
            IpCommand::Show { name, format } => commands::run_ip_show(&store, &name, format),
            IpCommand::Find { filters, format } => {
                commands::run_ip_find(&store, &filters.into_criteria()?, format)
            }
            IpCommand::Release { name } => commands::run_ip_release(&store, &name),
            IpCommand::Update {
                name,
                new_name,
                status,
                revision,
                provider,
                description,
                documentation,
                type_name,
                process,
            } => {
                let changes = IpChanges {
                    update: IpUpdate {
                        name: new_name,
                        status,
                        revision,
                        provider,
                        description,
                        documentation,
                        ..Default::default()
                    },
                    type_name,
                    process,
                };
                commands::run_ip_update(&store, &name, changes)
            }
            IpCommand::Tree { name, process, type_name, details, format } => {
                let scope = match (name, process, type_name) {
                    (Some(name), _, _) => TreeScope::Ip(name),
                    (None, Some(process), _) => TreeScope::Process(process),
                    (None, None, Some(type_name)) => TreeScope::Type(type_name),
                    (None, None, None) => TreeScope::All,
                };
                commands::run_ip_tree(&store, &scope, details, format)
            }
            IpCommand::AddChild { parent, child } => commands::run_ip_add_child(&store, &parent, &child),
            IpCommand::RemoveChild { parent, child } => commands::run_ip_remove_child(&store, &parent, &child),
            IpCommand::Delete { name, cascade } => commands::run_ip_delete(&store, &name, cascade),
            IpCommand::Pack { filters, output } => {
                commands::run_ip_pack(&store, &filters.into_criteria()?, output.as_deref())
            }
        },
    }
}
