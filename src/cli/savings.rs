use colored::Colorize;
use comfy_table::{Cell, Table};

use super::{date_or_today, open_db};
use crate::error::Result;
use crate::fmt::money;
use crate::savings::{self, NewSavingsPlan, SavingsStatus};

pub fn add(
    name: &str,
    account: &str,
    target: f64,
    monthly: f64,
    start: Option<String>,
    target_date: Option<&str>,
) -> Result<()> {
    let conn = open_db()?;
    let start = date_or_today(start);
    savings::add_plan(
        &conn,
        &NewSavingsPlan {
            name,
            account,
            target_amount: target,
            monthly_amount: monthly,
            start_date: &start,
            target_date,
        },
    )?;
    println!("Added savings plan: {name} (target {})", money(target));
    Ok(())
}

pub fn list() -> Result<()> {
    let conn = open_db()?;
    let today = chrono::Local::now().date_naive();
    let rows = savings::plan_progress(&conn, today)?;
    if rows.is_empty() {
        println!("No savings plans.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec![
        "Plan", "Account", "Target", "Saved", "Expected", "Remaining", "Done", "Status", "Projected",
    ]);
    for p in rows {
        let status = match p.status {
            SavingsStatus::Reached => p.status.label().green().bold(),
            SavingsStatus::OnTrack => p.status.label().green(),
            SavingsStatus::Behind => p.status.label().red(),
        };
        table.add_row(vec![
            Cell::new(p.name),
            Cell::new(p.account),
            Cell::new(money(p.target_amount)),
            Cell::new(money(p.saved)),
            Cell::new(money(p.expected)),
            Cell::new(money(p.remaining)),
            Cell::new(format!("{:.1}%", p.percent)),
            Cell::new(status),
            Cell::new(p.projected_completion.map(|d| d.to_string()).unwrap_or_default()),
        ]);
    }
    println!("Savings plans\n{table}");
    Ok(())
}
