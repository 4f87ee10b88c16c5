use comfy_table::{Cell, Table};

use super::open_db;
use super::postings::amount_cell;
use crate::drafting::{self, DraftEdit};
use crate::error::Result;

pub fn list(status: &str) -> Result<()> {
    let conn = open_db()?;
    let rows = drafting::list_drafts(&conn, Some(status))?;
    if rows.is_empty() {
        println!("No {status} drafts.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec![
        "ID", "Date", "Account", "Description", "Counterparty", "Amount", "Contact", "Category", "Purpose",
    ]);
    for d in rows {
        table.add_row(vec![
            Cell::new(d.id),
            Cell::new(d.booking_date),
            Cell::new(d.account),
            Cell::new(d.description),
            Cell::new(d.counterparty.unwrap_or_default()),
            amount_cell(d.amount),
            Cell::new(d.contact.unwrap_or_default()),
            Cell::new(d.category.unwrap_or_default()),
            Cell::new(d.purpose.unwrap_or_default()),
        ]);
    }
    println!("Drafts ({status})\n{table}");
    Ok(())
}

pub fn apply() -> Result<()> {
    let conn = open_db()?;
    let result = drafting::apply_rules(&conn)?;
    println!("{} matched by rules, {} left to review", result.matched, result.unmatched);
    Ok(())
}

pub fn book(ids: &[i64]) -> Result<()> {
    let conn = open_db()?;
    let ids = if ids.is_empty() { None } else { Some(ids) };
    let booked = drafting::book_drafts(&conn, ids)?;
    println!("Booked {booked} draft(s)");
    Ok(())
}

pub fn discard(id: i64) -> Result<()> {
    let conn = open_db()?;
    drafting::discard_draft(&conn, id)?;
    println!("Discarded draft {id}");
    Ok(())
}

pub fn edit(id: i64, edit: &DraftEdit) -> Result<()> {
    let conn = open_db()?;
    drafting::update_draft(&conn, id, edit)?;
    println!("Updated draft {id}");
    Ok(())
}
