use comfy_table::{Cell, Table};

use super::open_db;
use crate::categories;
use crate::error::Result;

pub fn add(name: &str, category_type: &str, description: Option<&str>) -> Result<()> {
    let conn = open_db()?;
    categories::add_category(&conn, name, category_type, description)?;
    println!("Added category: {name} ({category_type})");
    Ok(())
}

pub fn list() -> Result<()> {
    let conn = open_db()?;
    let mut table = Table::new();
    table.set_header(vec!["ID", "Name", "Type", "Description"]);
    for c in categories::list_categories(&conn)? {
        table.add_row(vec![
            Cell::new(c.id),
            Cell::new(c.name),
            Cell::new(c.category_type),
            Cell::new(c.description.unwrap_or_default()),
        ]);
    }
    println!("Categories\n{table}");
    Ok(())
}

pub fn add_purpose(name: &str, description: Option<&str>) -> Result<()> {
    let conn = open_db()?;
    categories::add_purpose(&conn, name, description)?;
    println!("Added purpose: {name}");
    Ok(())
}

pub fn list_purposes() -> Result<()> {
    let conn = open_db()?;
    let mut table = Table::new();
    table.set_header(vec!["ID", "Name", "Description"]);
    for p in categories::list_purposes(&conn)? {
        table.add_row(vec![
            Cell::new(p.id),
            Cell::new(p.name),
            Cell::new(p.description.unwrap_or_default()),
        ]);
    }
    println!("Purposes\n{table}");
    Ok(())
}
