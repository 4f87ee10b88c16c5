use rusqlite::Connection;

use crate::accounts::find_account_id;
use crate::categories::{resolve_category, resolve_purpose};
use crate::contacts::resolve_contact;
use crate::error::{parse_iso_date, BookError, Result};
use crate::models::{NewPosting, Posting};
use crate::savings::resolve_plan;
use crate::securities::resolve_security;

#[derive(Debug, Clone, Default)]
pub struct PostingFilter {
    pub from: Option<String>,
    pub to: Option<String>,
    pub account: Option<String>,
}

/// Optional re-assignments; `None` leaves the field untouched.
#[derive(Debug, Clone, Default)]
pub struct Assignment<'a> {
    pub contact: Option<&'a str>,
    pub category: Option<&'a str>,
    pub purpose: Option<&'a str>,
    pub savings_plan: Option<&'a str>,
}

pub fn add_posting(conn: &Connection, posting: &NewPosting) -> Result<i64> {
    let account_id = find_account_id(conn, &posting.account)?;
    let booking = parse_iso_date(&posting.booking_date)?;
    let valuta = match &posting.valuta_date {
        Some(v) => parse_iso_date(v)?,
        None => booking,
    };
    if posting.description.trim().is_empty() {
        return Err(BookError::InvalidInput("posting description is empty".into()));
    }
    let contact_id = resolve_contact(conn, posting.contact.as_deref())?;
    let category_id = resolve_category(conn, posting.category.as_deref())?;
    let purpose_id = resolve_purpose(conn, posting.purpose.as_deref())?;
    let plan_id = resolve_plan(conn, posting.savings_plan.as_deref())?;
    let security_id = resolve_security(conn, posting.security.as_deref())?;
    if security_id.is_some() != posting.quantity.is_some() {
        return Err(BookError::InvalidInput(
            "security postings need both a security and a quantity".into(),
        ));
    }

    conn.execute(
        "INSERT INTO postings (account_id, booking_date, valuta_date, amount, description, \
         contact_id, category_id, purpose_id, savings_plan_id, security_id, quantity) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        rusqlite::params![
            account_id,
            booking.format("%Y-%m-%d").to_string(),
            valuta.format("%Y-%m-%d").to_string(),
            posting.amount,
            posting.description.trim(),
            contact_id,
            category_id,
            purpose_id,
            plan_id,
            security_id,
            posting.quantity,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn assign_posting(conn: &Connection, id: i64, assignment: &Assignment) -> Result<()> {
    ensure_exists(conn, id)?;
    if let Some(id_) = resolve_contact(conn, assignment.contact)? {
        conn.execute("UPDATE postings SET contact_id = ?1 WHERE id = ?2", [id_, id])?;
    }
    if let Some(id_) = resolve_category(conn, assignment.category)? {
        conn.execute("UPDATE postings SET category_id = ?1 WHERE id = ?2", [id_, id])?;
    }
    if let Some(id_) = resolve_purpose(conn, assignment.purpose)? {
        conn.execute("UPDATE postings SET purpose_id = ?1 WHERE id = ?2", [id_, id])?;
    }
    if let Some(id_) = resolve_plan(conn, assignment.savings_plan)? {
        conn.execute("UPDATE postings SET savings_plan_id = ?1 WHERE id = ?2", [id_, id])?;
    }
    Ok(())
}

pub fn delete_posting(conn: &Connection, id: i64) -> Result<()> {
    ensure_exists(conn, id)?;
    // A booked draft falls back to open so the statement line is not lost.
    conn.execute(
        "UPDATE statement_drafts SET status = 'open', posting_id = NULL WHERE posting_id = ?1",
        [id],
    )?;
    conn.execute("DELETE FROM postings WHERE id = ?1", [id])?;
    Ok(())
}

fn ensure_exists(conn: &Connection, id: i64) -> Result<()> {
    let mut stmt = conn.prepare_cached("SELECT 1 FROM postings WHERE id = ?1")?;
    if stmt.exists([id])? {
        Ok(())
    } else {
        Err(BookError::NotFound { entity: "posting", id })
    }
}

pub fn list_postings(conn: &Connection, filter: &PostingFilter) -> Result<Vec<Posting>> {
    let mut clauses = Vec::new();
    let mut params: Vec<String> = Vec::new();
    if let Some(from) = &filter.from {
        parse_iso_date(from)?;
        params.push(from.clone());
        clauses.push(format!("p.booking_date >= ?{}", params.len()));
    }
    if let Some(to) = &filter.to {
        parse_iso_date(to)?;
        params.push(to.clone());
        clauses.push(format!("p.booking_date <= ?{}", params.len()));
    }
    if let Some(account) = &filter.account {
        params.push(account.clone());
        clauses.push(format!("a.name = ?{}", params.len()));
    }
    let where_clause = if clauses.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", clauses.join(" AND "))
    };

    let sql = format!(
        "SELECT p.id, a.name, p.booking_date, p.valuta_date, p.amount, p.description, \
                ct.name, cat.name, bp.name, sp.name, s.name, p.quantity \
         FROM postings p \
         JOIN accounts a ON p.account_id = a.id \
         LEFT JOIN contacts ct ON p.contact_id = ct.id \
         LEFT JOIN categories cat ON p.category_id = cat.id \
         LEFT JOIN budget_purposes bp ON p.purpose_id = bp.id \
         LEFT JOIN savings_plans sp ON p.savings_plan_id = sp.id \
         LEFT JOIN securities s ON p.security_id = s.id \
         {where_clause} \
         ORDER BY p.booking_date, p.id"
    );
    let mut stmt = conn.prepare(&sql)?;
    let param_values: Vec<&dyn rusqlite::types::ToSql> = params
        .iter()
        .map(|p| p as &dyn rusqlite::types::ToSql)
        .collect();
    let rows = stmt
        .query_map(param_values.as_slice(), |row| {
            Ok(Posting {
                id: row.get(0)?,
                account: row.get(1)?,
                booking_date: row.get(2)?,
                valuta_date: row.get(3)?,
                amount: row.get(4)?,
                description: row.get(5)?,
                contact: row.get(6)?,
                category: row.get(7)?,
                purpose: row.get(8)?,
                savings_plan: row.get(9)?,
                security: row.get(10)?,
                quantity: row.get(11)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_db;

    fn setup(conn: &Connection) {
        conn.execute(
            "INSERT INTO accounts (name, account_type) VALUES ('Giro', 'checking')",
            [],
        )
        .unwrap();
    }

    fn posting(date: &str, amount: f64, description: &str) -> NewPosting {
        NewPosting {
            account: "Giro".into(),
            booking_date: date.into(),
            amount,
            description: description.into(),
            ..NewPosting::default()
        }
    }

    #[test]
    fn test_add_posting_defaults_valuta() {
        let (_dir, conn) = test_db();
        setup(&conn);
        let mut p = posting("2025-02-03", -12.5, "Bakery");
        p.category = Some("Groceries".into());
        add_posting(&conn, &p).unwrap();
        let rows = list_postings(&conn, &PostingFilter::default()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].valuta_date, "2025-02-03");
        assert_eq!(rows[0].category.as_deref(), Some("Groceries"));
    }

    #[test]
    fn test_add_posting_validates() {
        let (_dir, conn) = test_db();
        setup(&conn);
        assert!(matches!(
            add_posting(&conn, &posting("02/03/2025", 1.0, "x")),
            Err(BookError::InvalidDate(_))
        ));
        assert!(matches!(
            add_posting(&conn, &posting("2025-02-03", 1.0, "  ")),
            Err(BookError::InvalidInput(_))
        ));
        let mut p = posting("2025-02-03", 1.0, "x");
        p.account = "Elsewhere".into();
        assert!(matches!(add_posting(&conn, &p), Err(BookError::UnknownAccount(_))));
    }

    #[test]
    fn test_list_filters_by_range_and_account() {
        let (_dir, conn) = test_db();
        setup(&conn);
        add_posting(&conn, &posting("2025-01-10", -1.0, "a")).unwrap();
        add_posting(&conn, &posting("2025-02-10", -2.0, "b")).unwrap();
        add_posting(&conn, &posting("2025-03-10", -3.0, "c")).unwrap();
        let filter = PostingFilter {
            from: Some("2025-02-01".into()),
            to: Some("2025-03-31".into()),
            account: Some("Giro".into()),
        };
        let rows = list_postings(&conn, &filter).unwrap();
        assert_eq!(rows.iter().map(|r| r.description.as_str()).collect::<Vec<_>>(), vec!["b", "c"]);
        let none = PostingFilter {
            account: Some("Other".into()),
            ..PostingFilter::default()
        };
        assert!(list_postings(&conn, &none).unwrap().is_empty());
    }

    #[test]
    fn test_assign_and_delete() {
        let (_dir, conn) = test_db();
        setup(&conn);
        crate::categories::add_purpose(&conn, "Holiday", None).unwrap();
        let id = add_posting(&conn, &posting("2025-01-10", -300.0, "Hotel")).unwrap();
        let assignment = Assignment {
            category: Some("Travel"),
            purpose: Some("Holiday"),
            ..Assignment::default()
        };
        assign_posting(&conn, id, &assignment).unwrap();
        let rows = list_postings(&conn, &PostingFilter::default()).unwrap();
        assert_eq!(rows[0].category.as_deref(), Some("Travel"));
        assert_eq!(rows[0].purpose.as_deref(), Some("Holiday"));

        delete_posting(&conn, id).unwrap();
        assert!(matches!(
            delete_posting(&conn, id),
            Err(BookError::NotFound { entity: "posting", .. })
        ));
    }

    #[test]
    fn test_security_posting_needs_quantity() {
        let (_dir, conn) = test_db();
        setup(&conn);
        crate::securities::add_security(&conn, "World ETF", "IE00B4L5Y983", None, "EUR").unwrap();
        let mut p = posting("2025-01-10", -500.0, "Buy ETF");
        p.security = Some("IE00B4L5Y983".into());
        assert!(add_posting(&conn, &p).is_err());
        p.quantity = Some(5.0);
        add_posting(&conn, &p).unwrap();
    }
}
