use chrono::{Datelike, Months, NaiveDate};
use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;

use crate::accounts::find_account_id;
use crate::error::{parse_iso_date, BookError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SavingsStatus {
    Reached,
    OnTrack,
    Behind,
}

impl SavingsStatus {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Reached => "reached",
            Self::OnTrack => "on track",
            Self::Behind => "behind",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SavingsProgress {
    pub id: i64,
    pub name: String,
    pub account: String,
    pub target_amount: f64,
    pub monthly_amount: f64,
    pub saved: f64,
    pub expected: f64,
    pub remaining: f64,
    pub percent: f64,
    pub status: SavingsStatus,
    pub target_date: Option<String>,
    pub projected_completion: Option<NaiveDate>,
}

pub struct NewSavingsPlan<'a> {
    pub name: &'a str,
    pub account: &'a str,
    pub target_amount: f64,
    pub monthly_amount: f64,
    pub start_date: &'a str,
    pub target_date: Option<&'a str>,
}

pub fn add_plan(conn: &Connection, plan: &NewSavingsPlan) -> Result<i64> {
    let account_id = find_account_id(conn, plan.account)?;
    let start = parse_iso_date(plan.start_date)?;
    if let Some(target) = plan.target_date {
        if parse_iso_date(target)? < start {
            return Err(BookError::InvalidDate(format!(
                "target date {target} is before start date {}",
                plan.start_date
            )));
        }
    }
    if plan.target_amount <= 0.0 || plan.monthly_amount < 0.0 {
        return Err(BookError::InvalidInput(
            "target must be positive and the monthly amount must not be negative".into(),
        ));
    }
    conn.execute(
        "INSERT INTO savings_plans (name, account_id, target_amount, monthly_amount, start_date, target_date) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        rusqlite::params![
            plan.name,
            account_id,
            plan.target_amount,
            plan.monthly_amount,
            plan.start_date,
            plan.target_date,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn resolve_plan(conn: &Connection, name: Option<&str>) -> Result<Option<i64>> {
    let Some(name) = name else {
        return Ok(None);
    };
    conn.query_row("SELECT id FROM savings_plans WHERE name = ?1", [name], |row| row.get(0))
        .optional()?
        .map(Some)
        .ok_or_else(|| BookError::UnknownSavingsPlan(name.to_string()))
}

/// Calendar months from `start` through `today`, counting both ends.
fn months_elapsed(start: NaiveDate, today: NaiveDate) -> u32 {
    if today < start {
        return 0;
    }
    let diff = (today.year() - start.year()) * 12 + today.month() as i32 - start.month() as i32;
    diff as u32 + 1
}

pub fn plan_progress(conn: &Connection, today: NaiveDate) -> Result<Vec<SavingsProgress>> {
    let mut stmt = conn.prepare(
        "SELECT sp.id, sp.name, a.name, sp.target_amount, sp.monthly_amount, sp.start_date, \
                sp.target_date, COALESCE(SUM(p.amount), 0) \
         FROM savings_plans sp \
         JOIN accounts a ON sp.account_id = a.id \
         LEFT JOIN postings p ON p.savings_plan_id = sp.id \
         WHERE sp.is_active = 1 \
         GROUP BY sp.id ORDER BY sp.name",
    )?;
    let raw: Vec<(i64, String, String, f64, f64, String, Option<String>, f64)> = stmt
        .query_map([], |row| {
            Ok((
                row.get(0)?,
                row.get(1)?,
                row.get(2)?,
                row.get(3)?,
                row.get(4)?,
                row.get(5)?,
                row.get(6)?,
                row.get(7)?,
            ))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut result = Vec::with_capacity(raw.len());
    for (id, name, account, target, monthly, start, target_date, saved) in raw {
        let start = parse_iso_date(&start)?;
        let expected = (monthly * months_elapsed(start, today) as f64).min(target);
        let remaining = (target - saved).max(0.0);
        let status = if saved >= target {
            SavingsStatus::Reached
        } else if saved >= expected {
            SavingsStatus::OnTrack
        } else {
            SavingsStatus::Behind
        };
        let projected_completion = if remaining > 0.0 && monthly > 0.0 {
            let months = (remaining / monthly).ceil() as u32;
            today.checked_add_months(Months::new(months))
        } else {
            None
        };
        result.push(SavingsProgress {
            id,
            name,
            account,
            target_amount: target,
            monthly_amount: monthly,
            saved,
            expected,
            remaining,
            percent: if target > 0.0 { saved / target * 100.0 } else { 0.0 },
            status,
            target_date,
            projected_completion,
        });
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_db;

    fn date(s: &str) -> NaiveDate {
        parse_iso_date(s).unwrap()
    }

    fn setup(conn: &Connection) -> i64 {
        conn.execute(
            "INSERT INTO accounts (name, account_type) VALUES ('Tagesgeld', 'savings')",
            [],
        )
        .unwrap();
        add_plan(
            conn,
            &NewSavingsPlan {
                name: "Emergency fund",
                account: "Tagesgeld",
                target_amount: 1200.0,
                monthly_amount: 100.0,
                start_date: "2025-01-15",
                target_date: Some("2025-12-31"),
            },
        )
        .unwrap()
    }

    fn deposit(conn: &Connection, plan_id: i64, date: &str, amount: f64) {
        conn.execute(
            "INSERT INTO postings (account_id, booking_date, valuta_date, amount, description, savings_plan_id) \
             VALUES (1, ?1, ?1, ?2, 'Deposit', ?3)",
            rusqlite::params![date, amount, plan_id],
        )
        .unwrap();
    }

    #[test]
    fn test_months_elapsed() {
        assert_eq!(months_elapsed(date("2025-01-15"), date("2025-01-01")), 0);
        assert_eq!(months_elapsed(date("2025-01-15"), date("2025-01-20")), 1);
        assert_eq!(months_elapsed(date("2025-01-15"), date("2025-04-01")), 4);
        assert_eq!(months_elapsed(date("2024-11-30"), date("2025-02-01")), 4);
    }

    #[test]
    fn test_on_track_and_projection() {
        let (_dir, conn) = test_db();
        let id = setup(&conn);
        deposit(&conn, id, "2025-01-20", 100.0);
        deposit(&conn, id, "2025-02-20", 100.0);
        deposit(&conn, id, "2025-03-20", 150.0);
        let progress = plan_progress(&conn, date("2025-03-25")).unwrap();
        let p = &progress[0];
        assert_eq!(p.saved, 350.0);
        assert_eq!(p.expected, 300.0);
        assert_eq!(p.remaining, 850.0);
        assert_eq!(p.status, SavingsStatus::OnTrack);
        // 850 / 100 -> 9 more months
        assert_eq!(p.projected_completion, Some(date("2025-12-25")));
    }

    #[test]
    fn test_behind_and_reached() {
        let (_dir, conn) = test_db();
        let id = setup(&conn);
        deposit(&conn, id, "2025-01-20", 50.0);
        let p = &plan_progress(&conn, date("2025-03-01")).unwrap()[0];
        assert_eq!(p.status, SavingsStatus::Behind);

        deposit(&conn, id, "2025-03-02", 1200.0);
        let p = &plan_progress(&conn, date("2025-03-05")).unwrap()[0];
        assert_eq!(p.status, SavingsStatus::Reached);
        assert_eq!(p.remaining, 0.0);
        assert!(p.projected_completion.is_none());
    }

    #[test]
    fn test_rejects_target_before_start() {
        let (_dir, conn) = test_db();
        conn.execute(
            "INSERT INTO accounts (name, account_type) VALUES ('Tagesgeld', 'savings')",
            [],
        )
        .unwrap();
        let err = add_plan(
            &conn,
            &NewSavingsPlan {
                name: "Bad",
                account: "Tagesgeld",
                target_amount: 10.0,
                monthly_amount: 1.0,
                start_date: "2025-06-01",
                target_date: Some("2025-01-01"),
            },
        )
        .unwrap_err();
        assert!(matches!(err, BookError::InvalidDate(_)));
    }
}
