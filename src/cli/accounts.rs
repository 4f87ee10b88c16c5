use colored::Colorize;
use comfy_table::{Cell, Table};

use super::open_db;
use crate::accounts::{self, NewAccount};
use crate::error::Result;
use crate::fmt::money;
use crate::settings::load_settings;

pub fn add(
    name: &str,
    account_type: &str,
    institution: Option<&str>,
    iban: Option<&str>,
    currency: Option<&str>,
    opening_balance: f64,
) -> Result<()> {
    let conn = open_db()?;
    let settings = load_settings();
    let account = NewAccount {
        name,
        account_type,
        institution,
        iban,
        currency: currency.unwrap_or(&settings.currency),
        opening_balance,
    };
    accounts::add_account(&conn, &account)?;
    println!("Added account: {name}");
    Ok(())
}

pub fn list(include_closed: bool) -> Result<()> {
    let conn = open_db()?;
    let rows = accounts::list_accounts(&conn, include_closed)?;

    let mut table = Table::new();
    table.set_header(vec!["ID", "Name", "Type", "Institution", "IBAN", "Currency", "Balance"]);
    for a in rows {
        let name = if a.is_active { a.name.normal() } else { format!("{} (closed)", a.name).dimmed() };
        table.add_row(vec![
            Cell::new(a.id),
            Cell::new(name),
            Cell::new(a.account_type),
            Cell::new(a.institution.unwrap_or_default()),
            Cell::new(a.iban.unwrap_or_default()),
            Cell::new(a.currency),
            Cell::new(money(a.balance)),
        ]);
    }
    println!("Accounts\n{table}");
    Ok(())
}

pub fn close(name: &str) -> Result<()> {
    let conn = open_db()?;
    accounts::close_account(&conn, name)?;
    println!("Closed account: {name}");
    Ok(())
}
