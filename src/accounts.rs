use rusqlite::{Connection, OptionalExtension};

use crate::error::{BookError, Result};
use crate::models::{Account, ACCOUNT_TYPES};

pub struct NewAccount<'a> {
    pub name: &'a str,
    pub account_type: &'a str,
    pub institution: Option<&'a str>,
    pub iban: Option<&'a str>,
    pub currency: &'a str,
    pub opening_balance: f64,
}

pub fn add_account(conn: &Connection, account: &NewAccount) -> Result<i64> {
    if !ACCOUNT_TYPES.contains(&account.account_type) {
        return Err(BookError::InvalidInput(format!(
            "account type '{}' (expected one of: {})",
            account.account_type,
            ACCOUNT_TYPES.join(", ")
        )));
    }
    conn.execute(
        "INSERT INTO accounts (name, account_type, institution, iban, currency, opening_balance) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        rusqlite::params![
            account.name,
            account.account_type,
            account.institution,
            account.iban.map(normalize_iban),
            account.currency,
            account.opening_balance,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn find_account_id(conn: &Connection, name: &str) -> Result<i64> {
    conn.query_row("SELECT id FROM accounts WHERE name = ?1", [name], |row| row.get(0))
        .optional()?
        .ok_or_else(|| BookError::UnknownAccount(name.to_string()))
}

pub fn list_accounts(conn: &Connection, include_closed: bool) -> Result<Vec<Account>> {
    let mut stmt = conn.prepare(
        "SELECT a.id, a.name, a.account_type, a.institution, a.iban, a.currency, \
                a.opening_balance, a.is_active, \
                a.opening_balance + COALESCE(SUM(p.amount), 0) AS balance \
         FROM accounts a LEFT JOIN postings p ON p.account_id = a.id \
         WHERE a.is_active = 1 OR ?1 \
         GROUP BY a.id ORDER BY a.name",
    )?;
    let rows = stmt
        .query_map([include_closed], |row| {
            Ok(Account {
                id: row.get(0)?,
                name: row.get(1)?,
                account_type: row.get(2)?,
                institution: row.get(3)?,
                iban: row.get(4)?,
                currency: row.get(5)?,
                opening_balance: row.get(6)?,
                is_active: row.get(7)?,
                balance: row.get(8)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Deactivate an account. Only allowed once its balance has been brought to zero.
pub fn close_account(conn: &Connection, name: &str) -> Result<()> {
    let id = find_account_id(conn, name)?;
    let balance: f64 = conn.query_row(
        "SELECT a.opening_balance + COALESCE(SUM(p.amount), 0) \
         FROM accounts a LEFT JOIN postings p ON p.account_id = a.id \
         WHERE a.id = ?1 GROUP BY a.id",
        [id],
        |row| row.get(0),
    )?;
    if balance.abs() >= 0.005 {
        return Err(BookError::InvalidInput(format!(
            "account '{name}' still has a balance of {balance:.2}"
        )));
    }
    conn.execute("UPDATE accounts SET is_active = 0 WHERE id = ?1", [id])?;
    tracing::info!(account = name, "account closed");
    Ok(())
}

/// Strip whitespace and uppercase, so `de89 3704 ...` compares equal to `DE893704...`.
pub fn normalize_iban(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_db;

    fn checking(name: &str) -> NewAccount<'_> {
        NewAccount {
            name,
            account_type: "checking",
            institution: Some("Sparkasse"),
            iban: Some("de89 3704 0044 0532 0130 00"),
            currency: "EUR",
            opening_balance: 100.0,
        }
    }

    #[test]
    fn test_add_and_list_with_balance() {
        let (_dir, conn) = test_db();
        let id = add_account(&conn, &checking("Giro")).unwrap();
        conn.execute(
            "INSERT INTO postings (account_id, booking_date, valuta_date, amount, description) \
             VALUES (?1, '2025-01-02', '2025-01-02', -40.0, 'Groceries')",
            [id],
        )
        .unwrap();
        let accounts = list_accounts(&conn, false).unwrap();
        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0].balance, 60.0);
        assert_eq!(accounts[0].iban.as_deref(), Some("DE89370400440532013000"));
    }

    #[test]
    fn test_rejects_unknown_type() {
        let (_dir, conn) = test_db();
        let mut account = checking("Giro");
        account.account_type = "crypto";
        assert!(matches!(add_account(&conn, &account), Err(BookError::InvalidInput(_))));
    }

    #[test]
    fn test_find_unknown_account() {
        let (_dir, conn) = test_db();
        let err = find_account_id(&conn, "Nope").unwrap_err();
        assert!(matches!(err, BookError::UnknownAccount(name) if name == "Nope"));
    }

    #[test]
    fn test_close_requires_zero_balance() {
        let (_dir, conn) = test_db();
        let id = add_account(&conn, &checking("Giro")).unwrap();
        assert!(close_account(&conn, "Giro").is_err());
        conn.execute(
            "INSERT INTO postings (account_id, booking_date, valuta_date, amount, description) \
             VALUES (?1, '2025-01-02', '2025-01-02', -100.0, 'Withdrawal')",
            [id],
        )
        .unwrap();
        close_account(&conn, "Giro").unwrap();
        assert!(list_accounts(&conn, false).unwrap().is_empty());
        assert_eq!(list_accounts(&conn, true).unwrap().len(), 1);
    }
}
