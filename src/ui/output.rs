use crate::ui::{theme, Icons};
use crate::cascade::{CascadePlan, Removal};
use crate::IpStatus;
use owo_colors::OwoColorize;

pub fn header(text: &str) {
    println!("{} {}", Icons::ROCKET, text.style(theme().header.clone()));
}

pub fn status(icon: &str, label: &str, value: &str) {
    println!("{} {}: {}", icon, label.style(theme().dim.clone()), value);
}

pub fn success(label: &str) {
    println!("{} {}", Icons::CHECK, label.style(theme().success.clone()));
}

pub fn warn(label: &str) {
    eprintln!("{} {}", Icons::WARN, label.style(theme().warn.clone()));
}

pub fn info(label: &str, value: &str) {
    println!(
        "{} {}: {}",
        Icons::INFO.style(theme().info.clone()),
        label.style(theme().dim.clone()),
        value
    );
}

pub fn section(title: &str) {
    println!();
    println!("━{}━", title.style(theme().header.clone()));
}

pub fn dim(text: &str) -> String {
    text.style(theme().dim.clone()).to_string()
}

pub fn muted(text: &str) -> String {
    text.style(theme().muted.clone()).to_string()
}

pub fn ip_status(status: IpStatus) -> String {
    status.as_str().style(theme().status(status)).to_string()
}

pub fn removed(removal: &Removal) {
    println!(
        "  {} {} {} {}",
        Icons::DEL.style(theme().error.clone()),
        removal.table.style(theme().dim.clone()),
        removal.name,
        muted(&format!("(id {})", removal.id))
    );
}

/// Explain a refused delete and how to confirm it
pub fn cascade_refused(plan: &CascadePlan) {
    warn(&format!(
        "{} {} '{}' has dependents that would be deleted with it:",
        Icons::LINK,
        plan.target.table,
        plan.target.name
    ));
    for removal in &plan.dependents {
        eprintln!("  {} {} {}", removal.table, removal.name, muted(&format!("(id {})", removal.id)));
    }
    eprintln!("{}", dim("re-run with --cascade to delete them all"));
}
