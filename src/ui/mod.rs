pub mod icons;
pub mod output;
pub mod table;
pub mod theme;

pub use icons::Icons;
pub use output::{
    cascade_refused, dim, header, info, ip_status, muted, removed, section, status, success, warn,
};
pub use table::{render, stats_table, IpRow, ProcessRow, TableBuilder, TypeRow};
pub use theme::{theme, Theme};
