use comfy_table::{Cell, Table};

use super::open_db;
use crate::drafting::{self, NewMatchRule, MATCH_TYPES};
use crate::error::{BookError, Result};

pub fn add(rule: &NewMatchRule) -> Result<()> {
    if !MATCH_TYPES.contains(&rule.match_type) {
        return Err(BookError::InvalidInput(format!(
            "match type '{}' (expected one of: {})",
            rule.match_type,
            MATCH_TYPES.join(", ")
        )));
    }
    let conn = open_db()?;
    let id = drafting::add_rule(&conn, rule)?;
    let target: Vec<&str> = [rule.contact, rule.category, rule.purpose]
        .into_iter()
        .flatten()
        .collect();
    println!("Added rule {id}: '{}' \u{2192} {}", rule.pattern, target.join(" / "));
    Ok(())
}

pub fn list() -> Result<()> {
    let conn = open_db()?;
    let mut table = Table::new();
    table.set_header(vec!["ID", "Pattern", "Type", "Contact", "Category", "Purpose", "Priority", "Hits"]);
    for r in drafting::list_rules(&conn)? {
        table.add_row(vec![
            Cell::new(r.id),
            Cell::new(r.pattern),
            Cell::new(r.match_type),
            Cell::new(r.contact.unwrap_or_default()),
            Cell::new(r.category.unwrap_or_default()),
            Cell::new(r.purpose.unwrap_or_default()),
            Cell::new(r.priority),
            Cell::new(r.hit_count),
        ]);
    }
    println!("Rules\n{table}");
    Ok(())
}

pub fn delete(id: i64) -> Result<()> {
    let conn = open_db()?;
    drafting::delete_rule(&conn, id)?;
    println!("Deleted rule {id}");
    Ok(())
}
