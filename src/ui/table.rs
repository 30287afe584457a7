use tabled::{settings::Style, Table, Tabled};
use crate::{IpType, Process};

#[derive(Tabled)]
pub struct TableRow {
    #[tabled(rename = "Metric")]
    pub metric: String,
    #[tabled(rename = "Value")]
    pub value: String,
}

#[derive(Default)]
pub struct TableBuilder {
    rows: Vec<TableRow>,
}

impl TableBuilder {
    pub fn new() -> Self {
        Self { rows: Vec::new() }
    }

    pub fn add_row(&mut self, label: &str, value: &str) {
        self.rows.push(TableRow {
            metric: label.to_string(),
            value: value.to_string(),
        });
    }

    pub fn build(&self) -> String {
        if self.rows.is_empty() {
            return String::new();
        }
        render(&self.rows)
    }
}

pub fn stats_table(stats: &[(&str, &str)]) -> String {
    let mut builder = TableBuilder::new();
    for (label, value) in stats {
        builder.add_row(label, value);
    }
    builder.build()
}

#[derive(Tabled)]
pub struct ProcessRow {
    #[tabled(rename = "Name")]
    pub name: String,
    #[tabled(rename = "Node")]
    pub node: String,
    #[tabled(rename = "Fab")]
    pub fab: String,
    #[tabled(rename = "Description")]
    pub description: String,
}

impl From<&Process> for ProcessRow {
    fn from(p: &Process) -> Self {
        Self {
            name: p.name.clone(),
            node: p.node.clone(),
            fab: p.fab.clone(),
            description: p.description.clone().unwrap_or_default(),
        }
    }
}

#[derive(Tabled)]
pub struct TypeRow {
    #[tabled(rename = "Path")]
    pub path: String,
    #[tabled(rename = "Level")]
    pub level: i64,
    #[tabled(rename = "Description")]
    pub description: String,
}

impl From<&IpType> for TypeRow {
    fn from(t: &IpType) -> Self {
        Self {
            path: t.path.clone(),
            level: t.level,
            description: t.description.clone().unwrap_or_default(),
        }
    }
}

/// One IP with its references already resolved to names
#[derive(Tabled)]
pub struct IpRow {
    #[tabled(rename = "Name")]
    pub name: String,
    #[tabled(rename = "Revision")]
    pub revision: String,
    #[tabled(rename = "Status")]
    pub status: String,
    #[tabled(rename = "Provider")]
    pub provider: String,
    #[tabled(rename = "Type")]
    pub type_path: String,
    #[tabled(rename = "Process")]
    pub process: String,
    #[tabled(rename = "Parent")]
    pub parent: String,
}

/// Render rows with the rounded style; empty input renders nothing
pub fn render<R: Tabled>(rows: &[R]) -> String {
    if rows.is_empty() {
        return String::new();
    }
    Table::new(rows).with(Style::rounded()).to_string()
}
