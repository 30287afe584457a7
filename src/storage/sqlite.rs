//! SQLite storage implementation

use std::path::Path;
use rusqlite::{Connection, params_from_iter};
use rusqlite::types::Value;
use crate::{Result, Error};
use super::gateway::{Condition, Gateway, Predicate, Row, Table};
use super::schema;

/// SQLite-backed implementation of the persistence gateway
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open a database file (creates if doesn't exist)
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Initialize the database schema
    fn initialize_schema(&self) -> Result<()> {
        self.conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        for stmt in schema::all_schema_statements() {
            self.conn.execute(stmt, [])?;
        }
        Ok(())
    }

    /// Raw connection, for tests that need to corrupt data behind the gateway
    #[cfg(test)]
    pub(crate) fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Get database statistics
    pub fn stats(&self) -> Result<DbStats> {
        Ok(DbStats {
            processes: self.count(Table::Processes)?,
            types: self.count(Table::Types)?,
            ips: self.count(Table::Ips)?,
        })
    }

    fn check_columns<'c>(table: Table, columns: impl IntoIterator<Item = &'c str>) -> Result<()> {
        for column in columns {
            if !table.has_column(column) {
                return Err(Error::Validation(format!(
                    "unknown column '{}' for table {}",
                    column, table
                )));
            }
        }
        Ok(())
    }

    /// Build `SELECT ... FROM table WHERE ... ORDER BY ..., id`
    fn select_sql(table: Table, predicate: &Predicate) -> Result<(String, Vec<Value>)> {
        Self::check_columns(table, predicate.columns())?;

        let mut clauses = Vec::new();
        let mut params: Vec<Value> = Vec::new();

        for condition in predicate.conditions() {
            match condition {
                Condition::Eq(column, value) => {
                    params.push(value.clone());
                    clauses.push(format!("{} = ?{}", column, params.len()));
                }
                Condition::IsNull(column) => {
                    clauses.push(format!("{} IS NULL", column));
                }
                Condition::In(column, values) => {
                    if values.is_empty() {
                        clauses.push("0".to_string());
                        continue;
                    }
                    let mut placeholders = Vec::with_capacity(values.len());
                    for value in values {
                        params.push(value.clone());
                        placeholders.push(format!("?{}", params.len()));
                    }
                    clauses.push(format!("{} IN ({})", column, placeholders.join(", ")));
                }
                Condition::PathWithin(column, path) => {
                    params.push(Value::Text(path.clone()));
                    let exact = params.len();
                    params.push(Value::Text(format!("{}/", path)));
                    let prefix = params.len();
                    clauses.push(format!(
                        "({c} = ?{exact} OR substr({c}, 1, length(?{prefix})) = ?{prefix})",
                        c = column,
                        exact = exact,
                        prefix = prefix,
                    ));
                }
            }
        }

        let mut sql = format!("SELECT {} FROM {}", table.columns().join(", "), table);
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }

        let mut order: Vec<&str> = predicate.ordering().to_vec();
        order.push("id");
        sql.push_str(" ORDER BY ");
        sql.push_str(&order.join(", "));

        Ok((sql, params))
    }

    /// Helper to convert a rusqlite row to a gateway Row
    fn read_row(table: Table, row: &rusqlite::Row) -> rusqlite::Result<Row> {
        let mut values = Vec::with_capacity(table.columns().len());
        for (idx, column) in table.columns().iter().enumerate() {
            values.push((*column, row.get::<_, Value>(idx)?));
        }
        Ok(Row::new(values))
    }
}

impl Gateway for SqliteStore {
    fn insert(&self, table: Table, fields: &[(&'static str, Value)]) -> Result<i64> {
        Self::check_columns(table, fields.iter().map(|(c, _)| *c))?;

        let columns: Vec<&str> = fields.iter().map(|(c, _)| *c).collect();
        let placeholders: Vec<String> = (1..=fields.len()).map(|i| format!("?{}", i)).collect();
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            table,
            columns.join(", "),
            placeholders.join(", ")
        );
        tracing::debug!(%sql, "insert");

        self.conn
            .execute(&sql, params_from_iter(fields.iter().map(|(_, v)| v)))?;
        Ok(self.conn.last_insert_rowid())
    }

    fn update(&self, table: Table, id: i64, fields: &[(&'static str, Value)]) -> Result<()> {
        Self::check_columns(table, fields.iter().map(|(c, _)| *c))?;

        let mut assignments: Vec<String> = fields
            .iter()
            .enumerate()
            .map(|(i, (c, _))| format!("{} = ?{}", c, i + 1))
            .collect();
        assignments.push("updated_at = CURRENT_TIMESTAMP".to_string());

        let sql = format!(
            "UPDATE {} SET {} WHERE id = ?{}",
            table,
            assignments.join(", "),
            fields.len() + 1
        );
        tracing::debug!(%sql, id, "update");

        let mut params: Vec<Value> = fields.iter().map(|(_, v)| v.clone()).collect();
        params.push(Value::Integer(id));

        let changed = self.conn.execute(&sql, params_from_iter(params.iter()))?;
        if changed == 0 {
            return Err(Error::NotFound(format!("no row with id {} in {}", id, table)));
        }
        Ok(())
    }

    fn delete(&self, table: Table, id: i64) -> Result<()> {
        let sql = format!("DELETE FROM {} WHERE id = ?1", table);
        tracing::debug!(%sql, id, "delete");

        let changed = self.conn.execute(&sql, [id])?;
        if changed == 0 {
            return Err(Error::NotFound(format!("no row with id {} in {}", id, table)));
        }
        Ok(())
    }

    fn query_one(&self, table: Table, predicate: &Predicate) -> Result<Option<Row>> {
        let mut rows = self.query_many(table, predicate)?;
        if rows.is_empty() {
            Ok(None)
        } else {
            Ok(Some(rows.swap_remove(0)))
        }
    }

    fn query_many(&self, table: Table, predicate: &Predicate) -> Result<Vec<Row>> {
        let (sql, params) = Self::select_sql(table, predicate)?;
        tracing::debug!(%sql, "query");

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(params.iter()), |row| Self::read_row(table, row))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    fn count(&self, table: Table) -> Result<usize> {
        let sql = format!("SELECT COUNT(*) FROM {}", table);
        let count: i64 = self.conn.query_row(&sql, [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

/// Database statistics
#[derive(Debug, Clone, serde::Serialize)]
pub struct DbStats {
    pub processes: usize,
    pub types: usize,
    pub ips: usize,
}

impl std::fmt::Display for DbStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Database Statistics:")?;
        writeln!(f, "  Processes: {}", self.processes)?;
        writeln!(f, "  Types: {}", self.types)?;
        writeln!(f, "  IPs: {}", self.ips)
    }
}
