use comfy_table::{Cell, Table};

use super::open_db;
use crate::contacts;
use crate::error::Result;

pub fn add(
    name: &str,
    iban: Option<&str>,
    category: Option<&str>,
    purpose: Option<&str>,
    notes: Option<&str>,
) -> Result<()> {
    let conn = open_db()?;
    contacts::add_contact(&conn, name, iban, category, purpose, notes)?;
    println!("Added contact: {name}");
    Ok(())
}

pub fn list() -> Result<()> {
    let conn = open_db()?;
    let rows = contacts::list_contacts(&conn)?;

    let mut table = Table::new();
    table.set_header(vec!["ID", "Name", "IBAN", "Category", "Purpose", "Notes"]);
    for c in rows {
        table.add_row(vec![
            Cell::new(c.id),
            Cell::new(c.name),
            Cell::new(c.iban.unwrap_or_default()),
            Cell::new(c.default_category.unwrap_or_default()),
            Cell::new(c.default_purpose.unwrap_or_default()),
            Cell::new(c.notes.unwrap_or_default()),
        ]);
    }
    println!("Contacts\n{table}");
    Ok(())
}
