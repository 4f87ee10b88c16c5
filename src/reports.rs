use rusqlite::Connection;
use serde::Serialize;

use crate::error::{parse_iso_date, BookError, Result};
use crate::models::Posting;
use crate::postings::{list_postings, PostingFilter};

// ---------------------------------------------------------------------------
// Balance
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct AccountBalance {
    pub name: String,
    pub account_type: String,
    pub currency: String,
    pub balance: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct BalanceReport {
    pub accounts: Vec<AccountBalance>,
    pub total: f64,
}

pub fn get_balance(conn: &Connection) -> Result<BalanceReport> {
    let mut stmt = conn.prepare(
        "SELECT a.name, a.account_type, a.currency, \
                a.opening_balance + COALESCE(SUM(p.amount), 0) as balance \
         FROM accounts a LEFT JOIN postings p ON a.id = p.account_id \
         WHERE a.is_active = 1 \
         GROUP BY a.id ORDER BY a.name",
    )?;
    let accounts: Vec<AccountBalance> = stmt
        .query_map([], |row| {
            Ok(AccountBalance {
                name: row.get(0)?,
                account_type: row.get(1)?,
                currency: row.get(2)?,
                balance: row.get(3)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let total: f64 = accounts.iter().map(|a| a.balance).sum();
    Ok(BalanceReport { accounts, total })
}

// ---------------------------------------------------------------------------
// Cash Flow
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct CashflowMonth {
    pub month: String,
    pub inflows: f64,
    pub outflows: f64,
    pub net: f64,
    pub running_balance: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CashflowReport {
    pub months: Vec<CashflowMonth>,
    pub total_inflows: f64,
    pub total_outflows: f64,
}

/// Monthly money in and out. Moves between own accounts are left out.
pub fn get_cashflow(conn: &Connection, from: &str, to: &str) -> Result<CashflowReport> {
    if parse_iso_date(from)? > parse_iso_date(to)? {
        return Err(BookError::InvalidDate(format!("{from} is after {to}")));
    }
    let mut stmt = conn.prepare(
        "SELECT substr(p.booking_date, 1, 7) as month, \
         SUM(CASE WHEN p.amount > 0 THEN p.amount ELSE 0 END) as inflows, \
         SUM(CASE WHEN p.amount < 0 THEN p.amount ELSE 0 END) as outflows \
         FROM postings p LEFT JOIN categories c ON p.category_id = c.id \
         WHERE p.booking_date BETWEEN ?1 AND ?2 \
           AND (c.category_type IS NULL OR c.category_type != 'transfer') \
         GROUP BY substr(p.booking_date, 1, 7) ORDER BY month",
    )?;
    let raw: Vec<(String, f64, f64)> = stmt
        .query_map([from, to], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut months = Vec::new();
    let mut running = 0.0f64;
    for (m, inflows, outflows) in raw {
        running += inflows + outflows;
        months.push(CashflowMonth {
            month: m,
            inflows,
            outflows,
            net: inflows + outflows,
            running_balance: running,
        });
    }

    Ok(CashflowReport {
        total_inflows: months.iter().map(|m| m.inflows).sum(),
        total_outflows: months.iter().map(|m| m.outflows).sum(),
        months,
    })
}

// ---------------------------------------------------------------------------
// Register
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct RegisterReport {
    pub rows: Vec<Posting>,
    pub total: f64,
    pub count: usize,
}

pub fn get_register(conn: &Connection, filter: &PostingFilter) -> Result<RegisterReport> {
    let rows = list_postings(conn, filter)?;
    let total = rows.iter().map(|r| r.amount).sum();
    let count = rows.len();
    Ok(RegisterReport { rows, total, count })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_db;

    fn setup(conn: &Connection) {
        conn.execute(
            "INSERT INTO accounts (name, account_type, opening_balance) VALUES ('Giro', 'checking', 500.0)",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO accounts (name, account_type) VALUES ('Tagesgeld', 'savings')",
            [],
        )
        .unwrap();
        let transfer: i64 = conn
            .query_row("SELECT id FROM categories WHERE name = 'Transfer'", [], |r| r.get(0))
            .unwrap();
        let rows: &[(i64, &str, f64, Option<i64>)] = &[
            (1, "2025-01-05", 2000.0, None),
            (1, "2025-01-10", -300.0, None),
            (1, "2025-01-20", -400.0, Some(transfer)),
            (2, "2025-01-20", 400.0, Some(transfer)),
            (1, "2025-02-05", -150.0, None),
        ];
        for (account, date, amount, category) in rows {
            conn.execute(
                "INSERT INTO postings (account_id, booking_date, valuta_date, amount, description, category_id) \
                 VALUES (?1, ?2, ?2, ?3, 'x', ?4)",
                rusqlite::params![account, date, amount, category],
            )
            .unwrap();
        }
    }

    #[test]
    fn test_balance_includes_opening_balance() {
        let (_dir, conn) = test_db();
        setup(&conn);
        let report = get_balance(&conn).unwrap();
        assert_eq!(report.accounts.len(), 2);
        assert_eq!(report.accounts[0].name, "Giro");
        assert_eq!(report.accounts[0].balance, 1650.0);
        assert_eq!(report.accounts[1].balance, 400.0);
        assert_eq!(report.total, 2050.0);
    }

    #[test]
    fn test_cashflow_skips_transfers() {
        let (_dir, conn) = test_db();
        setup(&conn);
        let report = get_cashflow(&conn, "2025-01-01", "2025-12-31").unwrap();
        assert_eq!(report.months.len(), 2);
        assert_eq!(report.months[0].month, "2025-01");
        assert_eq!(report.months[0].inflows, 2000.0);
        assert_eq!(report.months[0].outflows, -300.0);
        assert_eq!(report.months[1].running_balance, 1550.0);
        assert_eq!(report.total_outflows, -450.0);
        assert!(get_cashflow(&conn, "2025-12-31", "2025-01-01").is_err());
    }

    #[test]
    fn test_register_totals() {
        let (_dir, conn) = test_db();
        setup(&conn);
        let filter = PostingFilter {
            account: Some("Giro".into()),
            ..PostingFilter::default()
        };
        let report = get_register(&conn, &filter).unwrap();
        assert_eq!(report.count, 4);
        assert_eq!(report.total, 1150.0);
    }
}
