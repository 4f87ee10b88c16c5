use colored::Colorize;
use comfy_table::{Cell, Table};

use super::open_db;
use super::postings::{amount_cell, posting_table};
use crate::budget::default_range;
use crate::error::Result;
use crate::fmt::money;
use crate::postings::PostingFilter;
use crate::reports;
use crate::settings::load_settings;

pub fn balance() -> Result<()> {
    let conn = open_db()?;
    let report = reports::get_balance(&conn)?;

    let mut table = Table::new();
    table.set_header(vec!["Account", "Type", "Currency", "Balance"]);
    for a in &report.accounts {
        table.add_row(vec![
            Cell::new(&a.name),
            Cell::new(&a.account_type),
            Cell::new(&a.currency),
            amount_cell(a.balance),
        ]);
    }
    table.add_row(vec![
        Cell::new("Total".bold()),
        Cell::new(""),
        Cell::new(""),
        Cell::new(money(report.total).bold()),
    ]);
    println!("Balances\n{table}");
    Ok(())
}

pub fn cashflow(from: Option<String>, to: Option<String>) -> Result<()> {
    let conn = open_db()?;
    let settings = load_settings();
    let (default_from, default_to) = default_range(&settings, chrono::Local::now().date_naive());
    let from = from.unwrap_or_else(|| default_from.to_string());
    let to = to.unwrap_or_else(|| default_to.to_string());
    let report = reports::get_cashflow(&conn, &from, &to)?;

    let mut table = Table::new();
    table.set_header(vec!["Month", "Inflows", "Outflows", "Net", "Running"]);
    for m in &report.months {
        table.add_row(vec![
            Cell::new(&m.month),
            Cell::new(money(m.inflows)),
            Cell::new(money(m.outflows)),
            amount_cell(m.net),
            Cell::new(money(m.running_balance)),
        ]);
    }
    table.add_row(vec![
        Cell::new("Total".bold()),
        Cell::new(money(report.total_inflows)),
        Cell::new(money(report.total_outflows)),
        amount_cell(report.total_inflows + report.total_outflows),
        Cell::new(""),
    ]);
    println!("Cash flow {from} to {to}\n{table}");
    Ok(())
}

pub fn register(from: Option<String>, to: Option<String>, account: Option<String>) -> Result<()> {
    let conn = open_db()?;
    let report = reports::get_register(&conn, &PostingFilter { from, to, account })?;
    println!("Register\n{}", posting_table(&report.rows));
    println!("{} postings, total {}", report.count, money(report.total));
    Ok(())
}
