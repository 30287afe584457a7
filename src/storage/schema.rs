//! Database schema definitions

/// SQL to create the processes table
pub const CREATE_PROCESSES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS processes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    node TEXT NOT NULL,
    fab TEXT NOT NULL,
    description TEXT,
    created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
    updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
)
"#;

/// SQL to create the types table
/// `path` and `level` are denormalized from the parent chain
pub const CREATE_TYPES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS types (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    parent_id INTEGER REFERENCES types(id) ON DELETE CASCADE,
    path TEXT NOT NULL,
    level INTEGER NOT NULL DEFAULT 0,
    description TEXT,
    created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
    updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
)
"#;

/// SQL to create the ips table
pub const CREATE_IPS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS ips (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    type_id INTEGER NOT NULL REFERENCES types(id) ON DELETE CASCADE,
    process_id INTEGER NOT NULL REFERENCES processes(id) ON DELETE CASCADE,
    parent_ip_id INTEGER REFERENCES ips(id) ON DELETE CASCADE,
    revision TEXT NOT NULL,
    status TEXT NOT NULL CHECK (status IN ('alpha', 'beta', 'production', 'obsolete')),
    provider TEXT NOT NULL,
    description TEXT,
    documentation TEXT,
    created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
    updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
)
"#;

/// SQL to create indexes
pub const CREATE_INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_types_parent ON types(parent_id)",
    "CREATE INDEX IF NOT EXISTS idx_types_path ON types(path)",
    "CREATE INDEX IF NOT EXISTS idx_types_name ON types(name)",
    "CREATE INDEX IF NOT EXISTS idx_ips_type ON ips(type_id)",
    "CREATE INDEX IF NOT EXISTS idx_ips_process ON ips(process_id)",
    "CREATE INDEX IF NOT EXISTS idx_ips_parent ON ips(parent_ip_id)",
    "CREATE INDEX IF NOT EXISTS idx_ips_status ON ips(status)",
    "CREATE INDEX IF NOT EXISTS idx_ips_provider ON ips(provider)",
];

pub const PROCESS_COLUMNS: &[&str] = &[
    "id", "name", "node", "fab", "description", "created_at", "updated_at",
];

pub const TYPE_COLUMNS: &[&str] = &[
    "id", "name", "parent_id", "path", "level", "description", "created_at", "updated_at",
];

pub const IP_COLUMNS: &[&str] = &[
    "id",
    "name",
    "type_id",
    "process_id",
    "parent_ip_id",
    "revision",
    "status",
    "provider",
    "description",
    "documentation",
    "created_at",
    "updated_at",
];

/// All schema creation statements, parents before dependents
pub fn all_schema_statements() -> Vec<&'static str> {
    let mut stmts = vec![
        CREATE_PROCESSES_TABLE,
        CREATE_TYPES_TABLE,
        CREATE_IPS_TABLE,
    ];
    stmts.extend(CREATE_INDEXES.iter().copied());
    stmts
}
