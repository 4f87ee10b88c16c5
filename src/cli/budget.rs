use std::path::PathBuf;

use colored::Colorize;
use comfy_table::{Cell, Table};

use super::open_db;
use super::postings::amount_cell;
use crate::budget::export::export_xlsx;
use crate::budget::report::{Kpis, RuleLine};
use crate::budget::{self, NewBudgetRule, RuleInterval};
use crate::error::Result;
use crate::fmt::{money, percent};
use crate::settings::load_settings;

pub fn add_rule(
    name: &str,
    amount: f64,
    purpose: Option<&str>,
    category: Option<&str>,
    interval: &str,
    start: &str,
    end: Option<&str>,
) -> Result<()> {
    let conn = open_db()?;
    let interval: RuleInterval = interval.parse()?;
    let rule = NewBudgetRule {
        name,
        purpose,
        category,
        amount,
        interval,
        start_date: start,
        end_date: end,
    };
    let id = budget::add_rule(&conn, &rule)?;
    println!("Added budget rule {id}: {name} {} {interval}", money(amount));
    Ok(())
}

pub fn rules() -> Result<()> {
    let conn = open_db()?;
    let mut table = Table::new();
    table.set_header(vec!["ID", "Name", "Scope", "Amount", "Interval", "Start", "End"]);
    for r in budget::list_rules(&conn)? {
        let name = if r.is_active { r.name.normal() } else { r.name.dimmed() };
        table.add_row(vec![
            Cell::new(r.id),
            Cell::new(name),
            Cell::new(r.scope_label()),
            amount_cell(r.amount),
            Cell::new(r.interval),
            Cell::new(r.start_date),
            Cell::new(r.end_date.map(|d| d.to_string()).unwrap_or_default()),
        ]);
    }
    println!("Budget rules\n{table}");
    Ok(())
}

pub fn delete_rule(id: i64) -> Result<()> {
    let conn = open_db()?;
    budget::delete_rule(&conn, id)?;
    println!("Deleted budget rule {id}");
    Ok(())
}

fn variance_cell(variance: f64) -> Cell {
    if variance < 0.0 {
        Cell::new(money(variance).red().bold())
    } else {
        Cell::new(money(variance))
    }
}

fn rule_table(lines: &[RuleLine]) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["Rule", "Scope", "Interval", "Due", "Planned", "Actual", "Variance", "Used"]);
    for line in lines {
        table.add_row(vec![
            Cell::new(&line.name),
            Cell::new(&line.scope),
            Cell::new(&line.interval),
            Cell::new(line.occurrences),
            Cell::new(money(line.planned)),
            Cell::new(money(line.actual)),
            variance_cell(line.variance),
            Cell::new(percent(line.utilization)),
        ]);
    }
    table
}

fn kpi_row(label: String, k: &Kpis) -> Vec<Cell> {
    vec![
        Cell::new(label),
        Cell::new(money(k.planned_income)),
        Cell::new(money(k.planned_expense)),
        Cell::new(money(k.actual_income)),
        Cell::new(money(k.actual_expense)),
        Cell::new(money(k.unbudgeted_income)),
        Cell::new(money(k.unbudgeted_expense)),
        amount_cell(k.net),
        variance_cell(k.variance),
    ]
}

pub fn report(
    from: Option<String>,
    to: Option<String>,
    granularity: Option<String>,
    export: Option<String>,
) -> Result<()> {
    let conn = open_db()?;
    let settings = load_settings();
    let today = chrono::Local::now().date_naive();
    let (from, to, granularity) = budget::resolve_range(
        &settings,
        from.as_deref(),
        to.as_deref(),
        granularity.as_deref(),
        today,
    )?;
    let report = budget::build_report(&conn, from, to, granularity)?;

    let mut summary = Table::new();
    summary.set_header(vec![
        "Period", "Plan in", "Plan out", "Actual in", "Actual out", "Unbudgeted in", "Unbudgeted out", "Net",
        "Variance",
    ]);
    for p in &report.periods {
        summary.add_row(kpi_row(p.period.label.clone(), &p.kpis));
    }
    summary.add_row(kpi_row("Total".bold().to_string(), &report.kpis));
    println!(
        "Budget {} to {} by {} ({})\n{summary}",
        report.from, report.to, report.granularity, settings.currency
    );

    if !report.totals.is_empty() {
        println!("\nRules\n{}", rule_table(&report.totals));
    }

    let unbudgeted: Vec<_> = report.periods.iter().flat_map(|p| &p.unbudgeted).collect();
    if !unbudgeted.is_empty() {
        let mut table = Table::new();
        table.set_header(vec!["ID", "Date", "Description", "Amount"]);
        for u in unbudgeted {
            table.add_row(vec![
                Cell::new(u.posting_id),
                Cell::new(u.date),
                Cell::new(&u.description),
                amount_cell(u.amount),
            ]);
        }
        println!("\nUnbudgeted\n{table}");
    }

    if let Some(path) = export {
        let path = PathBuf::from(path);
        export_xlsx(&report, &path)?;
        println!("\nExported to {}", path.display());
    }
    Ok(())
}

pub fn plan(from: Option<String>, to: Option<String>, granularity: Option<String>) -> Result<()> {
    let conn = open_db()?;
    let settings = load_settings();
    let today = chrono::Local::now().date_naive();
    let (from, to, granularity) = budget::resolve_range(
        &settings,
        from.as_deref(),
        to.as_deref(),
        granularity.as_deref(),
        today,
    )?;
    let plan = budget::build_plan(&conn, from, to, granularity)?;

    let mut table = Table::new();
    table.set_header(vec!["Period", "Planned income", "Planned expense", "Net"]);
    for p in &plan.periods {
        table.add_row(vec![
            Cell::new(&p.period.label),
            Cell::new(money(p.planned_income)),
            Cell::new(money(p.planned_expense)),
            amount_cell(p.net),
        ]);
    }
    table.add_row(vec![
        Cell::new("Total".bold()),
        Cell::new(money(plan.planned_income)),
        Cell::new(money(plan.planned_expense)),
        amount_cell(plan.net),
    ]);
    println!("Budget plan {} to {} by {}\n{table}", plan.from, plan.to, plan.granularity);

    if !plan.totals.is_empty() {
        let mut rules = Table::new();
        rules.set_header(vec!["Rule", "Scope", "Interval", "Due", "Planned"]);
        for line in &plan.totals {
            rules.add_row(vec![
                Cell::new(&line.name),
                Cell::new(&line.scope),
                Cell::new(&line.interval),
                Cell::new(line.occurrences),
                Cell::new(money(line.planned)),
            ]);
        }
        println!("\nRules\n{rules}");
    }
    Ok(())
}
