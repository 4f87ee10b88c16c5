use comfy_table::{Cell, Table};

use super::postings::amount_cell;
use super::{date_or_today, open_db};
use crate::error::Result;
use crate::fmt::money;
use crate::securities;
use crate::settings::load_settings;

pub fn add(name: &str, isin: &str, symbol: Option<&str>, currency: Option<&str>) -> Result<()> {
    let conn = open_db()?;
    let settings = load_settings();
    securities::add_security(&conn, name, isin, symbol, currency.unwrap_or(&settings.currency))?;
    println!("Added security: {name} ({})", isin.trim().to_uppercase());
    Ok(())
}

pub fn list() -> Result<()> {
    let conn = open_db()?;
    let mut table = Table::new();
    table.set_header(vec!["ID", "Name", "ISIN", "Symbol", "Currency"]);
    for s in securities::list_securities(&conn)? {
        table.add_row(vec![
            Cell::new(s.id),
            Cell::new(s.name),
            Cell::new(s.isin),
            Cell::new(s.symbol.unwrap_or_default()),
            Cell::new(s.currency),
        ]);
    }
    println!("Securities\n{table}");
    Ok(())
}

pub fn price(security: &str, price: f64, date: Option<String>) -> Result<()> {
    let conn = open_db()?;
    let date = date_or_today(date);
    securities::set_price(&conn, security, &date, price)?;
    println!("Price for {security} on {date}: {}", money(price));
    Ok(())
}

pub fn holdings() -> Result<()> {
    let conn = open_db()?;
    let rows = securities::holdings(&conn)?;
    if rows.is_empty() {
        println!("No holdings.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["Security", "ISIN", "Quantity", "Cost", "Price", "As of", "Value", "Unrealized"]);
    for h in rows {
        table.add_row(vec![
            Cell::new(h.name),
            Cell::new(h.isin),
            Cell::new(format!("{:.4}", h.quantity)),
            Cell::new(money(h.cost_basis)),
            Cell::new(h.latest_price.map(money).unwrap_or_default()),
            Cell::new(h.price_date.unwrap_or_default()),
            Cell::new(h.market_value.map(money).unwrap_or_default()),
            h.unrealized.map(amount_cell).unwrap_or_else(|| Cell::new("")),
        ]);
    }
    println!("Holdings\n{table}");
    Ok(())
}
