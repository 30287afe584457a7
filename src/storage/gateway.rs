//! Persistence gateway contract
//!
//! The core never writes SQL. It talks to the store through [`Gateway`],
//! a narrow table-level interface (insert / update / delete / query), and
//! maps rows to entity records through [`Record`].

use rusqlite::types::Value;
use serde::Serialize;
use crate::{Error, Result};
use super::schema;

/// The three persisted tables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Table {
    Processes,
    Types,
    Ips,
}

impl Table {
    pub fn as_str(&self) -> &'static str {
        match self {
            Table::Processes => "processes",
            Table::Types => "types",
            Table::Ips => "ips",
        }
    }

    /// Column list in select order
    pub fn columns(&self) -> &'static [&'static str] {
        match self {
            Table::Processes => schema::PROCESS_COLUMNS,
            Table::Types => schema::TYPE_COLUMNS,
            Table::Ips => schema::IP_COLUMNS,
        }
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns().contains(&column)
    }
}

impl std::fmt::Display for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Column/value pairs written by insert and update
pub type Fields = Vec<(&'static str, Value)>;

/// A single filter condition. All conditions of a [`Predicate`] are AND-ed.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// `column = value`
    Eq(&'static str, Value),
    /// `column IS NULL`
    IsNull(&'static str),
    /// `column IN (values)`; an empty list matches nothing
    In(&'static str, Vec<Value>),
    /// `column` equals the path or starts with `path + "/"`
    PathWithin(&'static str, String),
}

impl Condition {
    pub fn column(&self) -> &'static str {
        match self {
            Condition::Eq(c, _) | Condition::IsNull(c) | Condition::In(c, _) | Condition::PathWithin(c, _) => *c,
        }
    }
}

/// Conjunction of conditions plus an ordering.
///
/// The store appends `id` to every ordering, so two identical queries over
/// unchanged data always return rows in the same order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Predicate {
    conditions: Vec<Condition>,
    order_by: Vec<&'static str>,
}

impl Predicate {
    /// Match every row
    pub fn all() -> Self {
        Self::default()
    }

    pub fn eq(mut self, column: &'static str, value: impl Into<Value>) -> Self {
        self.conditions.push(Condition::Eq(column, value.into()));
        self
    }

    pub fn is_null(mut self, column: &'static str) -> Self {
        self.conditions.push(Condition::IsNull(column));
        self
    }

    pub fn in_list<V: Into<Value>>(mut self, column: &'static str, values: impl IntoIterator<Item = V>) -> Self {
        self.conditions
            .push(Condition::In(column, values.into_iter().map(Into::into).collect()));
        self
    }

    pub fn path_within(mut self, column: &'static str, path: impl Into<String>) -> Self {
        self.conditions.push(Condition::PathWithin(column, path.into()));
        self
    }

    pub fn order_by(mut self, column: &'static str) -> Self {
        self.order_by.push(column);
        self
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn ordering(&self) -> &[&'static str] {
        &self.order_by
    }

    /// Every column this predicate touches
    pub fn columns(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.conditions
            .iter()
            .map(Condition::column)
            .chain(self.order_by.iter().copied())
    }
}

/// A fetched row, keyed by column name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    values: Vec<(&'static str, Value)>,
}

impl Row {
    pub fn new(values: Vec<(&'static str, Value)>) -> Self {
        Self { values }
    }

    pub fn value(&self, column: &str) -> Option<&Value> {
        self.values
            .iter()
            .find(|(c, _)| *c == column)
            .map(|(_, v)| v)
    }

    pub fn get_i64(&self, column: &str) -> Result<i64> {
        self.get_opt_i64(column)?
            .ok_or_else(|| Error::Integrity(format!("column '{}' is NULL", column)))
    }

    pub fn get_opt_i64(&self, column: &str) -> Result<Option<i64>> {
        match self.value(column) {
            Some(Value::Integer(i)) => Ok(Some(*i)),
            Some(Value::Null) => Ok(None),
            Some(other) => Err(Error::Integrity(format!(
                "column '{}' holds {:?}, expected an integer",
                column, other
            ))),
            None => Err(Error::Integrity(format!("column '{}' missing from row", column))),
        }
    }

    pub fn get_string(&self, column: &str) -> Result<String> {
        self.get_opt_string(column)?
            .ok_or_else(|| Error::Integrity(format!("column '{}' is NULL", column)))
    }

    pub fn get_opt_string(&self, column: &str) -> Result<Option<String>> {
        match self.value(column) {
            Some(Value::Text(s)) => Ok(Some(s.clone())),
            Some(Value::Null) => Ok(None),
            Some(other) => Err(Error::Integrity(format!(
                "column '{}' holds {:?}, expected text",
                column, other
            ))),
            None => Err(Error::Integrity(format!("column '{}' missing from row", column))),
        }
    }
}

/// An entity record persisted in one table
pub trait Record: Sized {
    const TABLE: Table;

    fn from_row(row: &Row) -> Result<Self>;

    /// Writable columns (everything except `id` and the timestamps)
    fn to_fields(&self) -> Fields;

    /// Identity, `None` until first persisted
    fn id(&self) -> Option<i64>;

    fn name(&self) -> &str;
}

/// Narrow persistence interface consumed by the core.
///
/// A handle is passed explicitly to every core operation; there is no
/// ambient connection.
pub trait Gateway {
    /// Insert a row and return its generated id
    fn insert(&self, table: Table, fields: &[(&'static str, Value)]) -> Result<i64>;

    /// Overwrite the given columns of row `id`. Fails with `NotFound` if absent.
    fn update(&self, table: Table, id: i64, fields: &[(&'static str, Value)]) -> Result<()>;

    /// Delete row `id`. Fails with `NotFound` if absent.
    fn delete(&self, table: Table, id: i64) -> Result<()>;

    fn query_one(&self, table: Table, predicate: &Predicate) -> Result<Option<Row>>;

    fn query_many(&self, table: Table, predicate: &Predicate) -> Result<Vec<Row>>;

    fn count(&self, table: Table) -> Result<usize>;

    /// Fetch a record by id
    fn get<R: Record>(&self, id: i64) -> Result<Option<R>> {
        self.find_one(&Predicate::all().eq("id", id))
    }

    fn find_one<R: Record>(&self, predicate: &Predicate) -> Result<Option<R>> {
        self.query_one(R::TABLE, predicate)?
            .map(|row| R::from_row(&row))
            .transpose()
    }

    fn find_many<R: Record>(&self, predicate: &Predicate) -> Result<Vec<R>> {
        self.query_many(R::TABLE, predicate)?
            .iter()
            .map(R::from_row)
            .collect()
    }

    /// Insert a new record, returning the generated id
    fn insert_record<R: Record>(&self, record: &R) -> Result<i64> {
        self.insert(R::TABLE, &record.to_fields())
    }

    /// Write every field of an already persisted record
    fn save_record<R: Record>(&self, record: &R) -> Result<()> {
        let id = record.id().ok_or_else(|| {
            Error::Validation(format!("'{}' has not been persisted yet", record.name()))
        })?;
        self.update(R::TABLE, id, &record.to_fields())
    }
}
