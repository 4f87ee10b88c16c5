use std::fmt::Write as _;
use std::path::Path;

use chrono::{Datelike, Local, Months, NaiveDate};
use rusqlite::Connection;

use super::open_db;
use crate::accounts::{add_account, NewAccount};
use crate::budget::{self, NewBudgetRule, RuleInterval};
use crate::categories::add_purpose;
use crate::contacts::add_contact;
use crate::drafting::{self, NewMatchRule};
use crate::error::Result;
use crate::importer::import_file;
use crate::models::NewPosting;
use crate::postings::add_posting;
use crate::savings::{add_plan, NewSavingsPlan};
use crate::securities::{add_security, set_price};
use crate::settings::get_data_dir;

const ACCOUNT_NAME: &str = "Giro";
const SAVINGS_ACCOUNT: &str = "Tagesgeld";
const DEPOT_ACCOUNT: &str = "Depot";
const SAVINGS_PLAN: &str = "Emergency fund";
const ETF_ISIN: &str = "IE00B4L5Y983";
const MONTHS: u32 = 12;

struct StatementLine {
    date: NaiveDate,
    description: &'static str,
    amount: f64,
    counterparty: &'static str,
    iban: &'static str,
}

/// Contacts recognised by IBAN: (name, iban, default category).
const CONTACTS: &[(&str, &str, &str)] = &[
    ("Acme GmbH", "DE02120300000000202051", "Salary"),
    ("Hausverwaltung Meyer", "DE02500105170137075030", "Rent"),
    ("Stadtwerke", "DE89370400440532013000", "Utilities"),
];

/// Drafting rules: (pattern, category, purpose).
const RULES: &[(&str, &str, Option<&str>)] = &[
    ("REWE", "Groceries", Some("Household")),
    ("EDEKA", "Groceries", Some("Household")),
    ("DB VERTRIEB", "Transport", Some("Mobility")),
    ("ARAL", "Transport", Some("Mobility")),
    ("SPOTIFY", "Subscriptions", None),
    ("ALLIANZ", "Insurance", None),
];

/// Grocery runs cycled per month.
const GROCERIES: &[(f64, f64, f64)] = &[
    (-84.12, -61.37, -102.55),
    (-73.80, -95.10, -58.24),
    (-110.05, -66.90, -79.43),
    (-68.33, -88.71, -91.02),
];

fn day(year: i32, month: u32, day: u32) -> NaiveDate {
    (1..=day)
        .rev()
        .find_map(|d| NaiveDate::from_ymd_opt(year, month, d))
        .unwrap_or_default()
}

fn first_month(today: NaiveDate) -> NaiveDate {
    let first = day(today.year(), today.month(), 1);
    first - Months::new(MONTHS - 1)
}

/// One bank statement covering the last twelve months, current month included.
fn generate_statement(today: NaiveDate) -> Vec<StatementLine> {
    let start = first_month(today);
    let mut lines = Vec::new();

    for i in 0..MONTHS {
        let month = start + Months::new(i);
        let (y, m) = (month.year(), month.month());
        let idx = i as usize;

        lines.push(StatementLine {
            date: day(y, m, 1),
            description: "GEHALT",
            amount: 3200.00,
            counterparty: "Acme GmbH",
            iban: CONTACTS[0].1,
        });
        lines.push(StatementLine {
            date: day(y, m, 3),
            description: "MIETE",
            amount: -950.00,
            counterparty: "Hausverwaltung Meyer",
            iban: CONTACTS[1].1,
        });
        lines.push(StatementLine {
            date: day(y, m, 5),
            description: "ABSCHLAG STROM GAS",
            amount: -85.00,
            counterparty: "Stadtwerke",
            iban: CONTACTS[2].1,
        });
        lines.push(StatementLine {
            date: day(y, m, 7),
            description: "SPOTIFY AB",
            amount: -10.99,
            counterparty: "",
            iban: "",
        });
        lines.push(StatementLine {
            date: day(y, m, 12),
            description: "DB VERTRIEB GMBH DEUTSCHLANDTICKET",
            amount: -58.00,
            counterparty: "",
            iban: "",
        });

        let (g1, g2, g3) = GROCERIES[idx % GROCERIES.len()];
        lines.push(StatementLine { date: day(y, m, 9), description: "REWE MARKT", amount: g1, counterparty: "", iban: "" });
        lines.push(StatementLine { date: day(y, m, 16), description: "EDEKA CENTER", amount: g2, counterparty: "", iban: "" });
        lines.push(StatementLine { date: day(y, m, 23), description: "REWE MARKT", amount: g3, counterparty: "", iban: "" });

        if idx % 2 == 1 {
            lines.push(StatementLine {
                date: day(y, m, 20),
                description: "ARAL TANKSTELLE",
                amount: -64.30 - idx as f64,
                counterparty: "",
                iban: "",
            });
        }
        if idx == 2 {
            lines.push(StatementLine {
                date: day(y, m, 15),
                description: "ALLIANZ VERSICHERUNG",
                amount: -240.00,
                counterparty: "",
                iban: "",
            });
        }
        if idx % 4 == 3 {
            lines.push(StatementLine {
                date: day(y, m, 27),
                description: "HOTEL ZUR POST",
                amount: -180.00,
                counterparty: "",
                iban: "",
            });
        }
    }
    lines
}

fn write_statement(lines: &[StatementLine], path: &Path) -> Result<()> {
    let mut content = String::from("date,valuta_date,amount,description,counterparty,iban\n");
    for l in lines {
        let _ = writeln!(
            content,
            "{d},{d},{:.2},{},{},{}",
            l.amount,
            l.description,
            l.counterparty,
            l.iban,
            d = l.date.format("%Y-%m-%d"),
        );
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, content)?;
    Ok(())
}

#[derive(Debug)]
struct DemoSummary {
    drafted: usize,
    matched: usize,
    booked: usize,
    open: usize,
}

fn iso(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn insert_master_data(conn: &Connection, start: &str) -> Result<()> {
    for (name, account_type) in [
        (ACCOUNT_NAME, "checking"),
        (SAVINGS_ACCOUNT, "savings"),
        (DEPOT_ACCOUNT, "depot"),
    ] {
        add_account(
            conn,
            &NewAccount {
                name,
                account_type,
                institution: Some("Demo Bank"),
                iban: None,
                currency: "EUR",
                opening_balance: if name == ACCOUNT_NAME { 1500.0 } else { 0.0 },
            },
        )?;
    }
    add_purpose(conn, "Household", Some("Food and everyday shopping"))?;
    add_purpose(conn, "Mobility", Some("Getting around"))?;

    for (name, iban, category) in CONTACTS {
        add_contact(conn, name, Some(*iban), Some(*category), None, None)?;
    }
    for (pattern, category, purpose) in RULES {
        drafting::add_rule(
            conn,
            &NewMatchRule {
                pattern,
                match_type: "contains",
                category: Some(*category),
                purpose: *purpose,
                ..NewMatchRule::default()
            },
        )?;
    }

    let budget_rules: &[(&str, Option<&str>, Option<&str>, f64, RuleInterval)] = &[
        ("Salary", None, Some("Salary"), 3200.0, RuleInterval::Monthly),
        ("Rent", None, Some("Rent"), -950.0, RuleInterval::Monthly),
        ("Energy", None, Some("Utilities"), -255.0, RuleInterval::Quarterly),
        ("Household", Some("Household"), None, -300.0, RuleInterval::Monthly),
        ("Mobility", Some("Mobility"), None, -100.0, RuleInterval::Monthly),
        ("Streaming", None, Some("Subscriptions"), -10.99, RuleInterval::Monthly),
        ("Insurance", None, Some("Insurance"), -240.0, RuleInterval::Yearly),
    ];
    for (name, purpose, category, amount, interval) in budget_rules {
        budget::add_rule(
            conn,
            &NewBudgetRule {
                name,
                purpose: *purpose,
                category: *category,
                amount: *amount,
                interval: *interval,
                start_date: start,
                end_date: None,
            },
        )?;
    }

    add_plan(
        conn,
        &NewSavingsPlan {
            name: SAVINGS_PLAN,
            account: SAVINGS_ACCOUNT,
            target_amount: 6000.0,
            monthly_amount: 250.0,
            start_date: start,
            target_date: None,
        },
    )?;
    add_security(conn, "iShares Core MSCI World", ETF_ISIN, Some("EUNL"), "EUR")?;
    Ok(())
}

/// Savings transfers every month and an ETF purchase every quarter.
fn insert_manual_postings(conn: &Connection, start: NaiveDate) -> Result<()> {
    for i in 0..MONTHS {
        let month = start + Months::new(i);
        let date = iso(day(month.year(), month.month(), 2));
        add_posting(
            conn,
            &NewPosting {
                account: ACCOUNT_NAME.into(),
                booking_date: date.clone(),
                amount: -250.0,
                description: "Transfer to Tagesgeld".into(),
                category: Some("Transfer".into()),
                ..NewPosting::default()
            },
        )?;
        add_posting(
            conn,
            &NewPosting {
                account: SAVINGS_ACCOUNT.into(),
                booking_date: date.clone(),
                amount: 250.0,
                description: "Transfer from Giro".into(),
                category: Some("Transfer".into()),
                savings_plan: Some(SAVINGS_PLAN.into()),
                ..NewPosting::default()
            },
        )?;
        if i % 3 == 0 {
            let price = 80.0 + i as f64 * 1.5;
            set_price(conn, ETF_ISIN, &date, price)?;
            add_posting(
                conn,
                &NewPosting {
                    account: DEPOT_ACCOUNT.into(),
                    booking_date: date,
                    amount: -500.0,
                    description: "Buy iShares Core MSCI World".into(),
                    category: Some("Savings".into()),
                    security: Some(ETF_ISIN.into()),
                    quantity: Some(((500.0 / price) * 10_000.0).round() / 10_000.0),
                    ..NewPosting::default()
                },
            )?;
        }
    }
    Ok(())
}

fn insert_demo_data(conn: &Connection, work_dir: &Path, today: NaiveDate) -> Result<DemoSummary> {
    let start = first_month(today);
    insert_master_data(conn, &iso(start))?;
    insert_manual_postings(conn, start)?;
    set_price(conn, ETF_ISIN, &iso(today), 98.40)?;

    let statement = work_dir.join("demo-statement.csv");
    write_statement(&generate_statement(today), &statement)?;
    let imported = import_file(conn, &statement, ACCOUNT_NAME, Some("generic_csv"))?;
    let applied = drafting::apply_rules(conn)?;

    // Everything before the current month is booked; the rest stays for review.
    let current = day(today.year(), today.month(), 1);
    let to_book: Vec<i64> = drafting::list_drafts(conn, Some("open"))?
        .into_iter()
        .filter(|d| d.booking_date < iso(current))
        .map(|d| d.id)
        .collect();
    let booked = if to_book.is_empty() {
        0
    } else {
        drafting::book_drafts(conn, Some(&to_book))?
    };

    Ok(DemoSummary {
        drafted: imported.drafted,
        matched: applied.matched,
        booked,
        open: imported.drafted - booked,
    })
}

pub fn run() -> Result<()> {
    let conn = open_db()?;

    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM accounts WHERE name = ?1)",
        [ACCOUNT_NAME],
        |r| r.get(0),
    )?;
    if exists {
        println!("Demo data already loaded (account '{ACCOUNT_NAME}' exists).");
        return Ok(());
    }

    let today = Local::now().date_naive();
    let summary = insert_demo_data(&conn, &get_data_dir().join("imports"), today)?;
    tracing::info!(?summary, "demo data loaded");

    println!("Demo data loaded!");
    println!("  Accounts:     {ACCOUNT_NAME}, {SAVINGS_ACCOUNT}, {DEPOT_ACCOUNT}");
    println!("  Drafted:      {}", summary.drafted);
    println!("  Matched:      {}", summary.matched);
    println!("  Booked:       {}", summary.booked);
    println!("  Open drafts:  {}", summary.open);
    println!();
    println!("Try these next:");
    println!("  pocketbook drafts list");
    println!("  pocketbook budget report");
    println!("  pocketbook budget report --granularity quarter");
    println!("  pocketbook savings list");
    println!("  pocketbook securities holdings");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::budget::{build_report, Granularity};
    use crate::db::test_db;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_day_clamps_to_month_end() {
        assert_eq!(day(2025, 2, 31), d("2025-02-28"));
        assert_eq!(day(2024, 2, 30), d("2024-02-29"));
        assert_eq!(day(2025, 4, 9), d("2025-04-09"));
    }

    #[test]
    fn test_statement_spans_twelve_months() {
        let lines = generate_statement(d("2025-06-18"));
        let first = lines.iter().map(|l| l.date).min().unwrap();
        let last = lines.iter().map(|l| l.date).max().unwrap();
        assert_eq!(first, d("2024-07-01"));
        assert_eq!(last.format("%Y-%m").to_string(), "2025-06");
        // 8 fixed lines a month, fuel every other month, one insurance, hotel three times
        assert_eq!(lines.len(), 12 * 8 + 6 + 1 + 3);
    }

    #[test]
    fn test_demo_creates_data() {
        let (dir, conn) = test_db();
        let today = d("2025-06-18");
        let summary = insert_demo_data(&conn, dir.path(), today).unwrap();

        let accounts: i64 = conn.query_row("SELECT count(*) FROM accounts", [], |r| r.get(0)).unwrap();
        assert_eq!(accounts, 3);
        assert_eq!(summary.drafted, generate_statement(today).len());
        assert!(summary.matched > 0);
        assert!(summary.open > 0, "current month should stay open");
        assert_eq!(summary.booked + summary.open, summary.drafted);

        let unassigned: i64 = conn
            .query_row(
                "SELECT count(*) FROM postings WHERE description = 'HOTEL ZUR POST' AND category_id IS NULL",
                [],
                |r| r.get(0),
            )
            .unwrap();
        // the third hotel night falls in the current month and is still a draft
        assert_eq!(unassigned, 2);
    }

    #[test]
    fn test_demo_budget_report_has_actuals() {
        let (dir, conn) = test_db();
        let today = d("2025-06-18");
        insert_demo_data(&conn, dir.path(), today).unwrap();

        let report = build_report(&conn, d("2024-07-01"), d("2025-05-31"), Granularity::Month).unwrap();
        assert_eq!(report.periods.len(), 11);
        let salary = report.totals.iter().find(|l| l.name == "Salary").unwrap();
        assert_eq!(salary.planned, 3200.0 * 11.0);
        assert_eq!(salary.actual, salary.planned);
        assert!(report.kpis.unbudgeted_expense < 0.0, "hotel stays unbudgeted");
    }
}
