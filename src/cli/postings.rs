use colored::Colorize;
use comfy_table::{Cell, Table};

use super::open_db;
use crate::error::Result;
use crate::fmt::money;
use crate::models::{NewPosting, Posting};
use crate::postings::{self, Assignment, PostingFilter};

pub(crate) fn amount_cell(amount: f64) -> Cell {
    if amount < 0.0 {
        Cell::new(money(amount).red())
    } else {
        Cell::new(money(amount).green())
    }
}

pub(crate) fn posting_table(rows: &[Posting]) -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        "ID", "Date", "Account", "Description", "Amount", "Contact", "Category", "Purpose",
    ]);
    for p in rows {
        table.add_row(vec![
            Cell::new(p.id),
            Cell::new(&p.booking_date),
            Cell::new(&p.account),
            Cell::new(&p.description),
            amount_cell(p.amount),
            Cell::new(p.contact.as_deref().unwrap_or("")),
            Cell::new(p.category.as_deref().unwrap_or("")),
            Cell::new(p.purpose.as_deref().or(p.savings_plan.as_deref()).unwrap_or("")),
        ]);
    }
    table
}

pub fn add(posting: &NewPosting) -> Result<()> {
    let conn = open_db()?;
    let id = postings::add_posting(&conn, posting)?;
    println!("Added posting {id}: {} {}", posting.description, money(posting.amount));
    Ok(())
}

pub fn list(from: Option<String>, to: Option<String>, account: Option<String>) -> Result<()> {
    let conn = open_db()?;
    let rows = postings::list_postings(&conn, &PostingFilter { from, to, account })?;
    if rows.is_empty() {
        println!("No postings found.");
        return Ok(());
    }
    println!("Postings\n{}", posting_table(&rows));
    Ok(())
}

pub fn assign(id: i64, assignment: &Assignment) -> Result<()> {
    let conn = open_db()?;
    postings::assign_posting(&conn, id, assignment)?;
    println!("Updated posting {id}");
    Ok(())
}

pub fn delete(id: i64) -> Result<()> {
    let conn = open_db()?;
    postings::delete_posting(&conn, id)?;
    println!("Deleted posting {id}");
    Ok(())
}
