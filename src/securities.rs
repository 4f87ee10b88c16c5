use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;

use crate::error::{parse_iso_date, BookError, Result};

#[derive(Debug, Clone, Serialize)]
pub struct Security {
    pub id: i64,
    pub name: String,
    pub isin: String,
    pub symbol: Option<String>,
    pub currency: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Holding {
    pub security_id: i64,
    pub name: String,
    pub isin: String,
    pub quantity: f64,
    pub cost_basis: f64,
    pub latest_price: Option<f64>,
    pub price_date: Option<String>,
    pub market_value: Option<f64>,
    pub unrealized: Option<f64>,
}

/// ISIN check: two-letter country, nine alphanumerics, Luhn check digit over
/// the base-36 expansion.
pub fn is_valid_isin(isin: &str) -> bool {
    let bytes = isin.as_bytes();
    if bytes.len() != 12
        || !bytes[..2].iter().all(|b| b.is_ascii_uppercase())
        || !bytes[2..11].iter().all(|b| b.is_ascii_uppercase() || b.is_ascii_digit())
        || !bytes[11].is_ascii_digit()
    {
        return false;
    }
    let mut digits = Vec::with_capacity(22);
    for c in isin[..11].chars() {
        let Some(v) = c.to_digit(36) else {
            return false;
        };
        if v >= 10 {
            digits.push(v / 10);
        }
        digits.push(v % 10);
    }
    let sum: u32 = digits
        .iter()
        .rev()
        .enumerate()
        .map(|(i, d)| {
            if i % 2 == 0 {
                let doubled = d * 2;
                if doubled > 9 { doubled - 9 } else { doubled }
            } else {
                *d
            }
        })
        .sum();
    let check = (10 - sum % 10) % 10;
    isin[11..].parse::<u32>().map(|d| d == check).unwrap_or(false)
}

pub fn add_security(
    conn: &Connection,
    name: &str,
    isin: &str,
    symbol: Option<&str>,
    currency: &str,
) -> Result<i64> {
    let isin = isin.trim().to_uppercase();
    if !is_valid_isin(&isin) {
        return Err(BookError::InvalidInput(format!("'{isin}' is not a valid ISIN")));
    }
    conn.execute(
        "INSERT INTO securities (name, isin, symbol, currency) VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![name, isin, symbol, currency],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn list_securities(conn: &Connection) -> Result<Vec<Security>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, isin, symbol, currency FROM securities WHERE is_active = 1 ORDER BY name",
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok(Security {
                id: row.get(0)?,
                name: row.get(1)?,
                isin: row.get(2)?,
                symbol: row.get(3)?,
                currency: row.get(4)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Look a security up by ISIN, symbol or name, in that order.
pub fn find_security_id(conn: &Connection, key: &str) -> Result<i64> {
    conn.query_row(
        "SELECT id FROM securities WHERE isin = upper(?1) OR symbol = ?1 OR name = ?1 \
         ORDER BY (isin = upper(?1)) DESC, (symbol = ?1) DESC LIMIT 1",
        [key],
        |row| row.get(0),
    )
    .optional()?
    .ok_or_else(|| BookError::UnknownSecurity(key.to_string()))
}

pub fn resolve_security(conn: &Connection, key: Option<&str>) -> Result<Option<i64>> {
    key.map(|k| find_security_id(conn, k)).transpose()
}

pub fn set_price(conn: &Connection, key: &str, date: &str, price: f64) -> Result<()> {
    let security_id = find_security_id(conn, key)?;
    parse_iso_date(date)?;
    if price < 0.0 {
        return Err(BookError::InvalidInput("price must not be negative".into()));
    }
    conn.execute(
        "INSERT INTO security_prices (security_id, price_date, price) VALUES (?1, ?2, ?3) \
         ON CONFLICT(security_id, price_date) DO UPDATE SET price = excluded.price",
        rusqlite::params![security_id, date, price],
    )?;
    Ok(())
}

pub fn holdings(conn: &Connection) -> Result<Vec<Holding>> {
    let mut stmt = conn.prepare(
        "SELECT s.id, s.name, s.isin, SUM(p.quantity), -SUM(p.amount), \
                (SELECT price FROM security_prices sp WHERE sp.security_id = s.id \
                 ORDER BY price_date DESC LIMIT 1), \
                (SELECT price_date FROM security_prices sp WHERE sp.security_id = s.id \
                 ORDER BY price_date DESC LIMIT 1) \
         FROM securities s JOIN postings p ON p.security_id = s.id \
         GROUP BY s.id HAVING abs(SUM(p.quantity)) > 1e-9 \
         ORDER BY s.name",
    )?;
    let rows = stmt
        .query_map([], |row| {
            let quantity: f64 = row.get(3)?;
            let cost_basis: f64 = row.get(4)?;
            let latest_price: Option<f64> = row.get(5)?;
            let market_value = latest_price.map(|p| p * quantity);
            Ok(Holding {
                security_id: row.get(0)?,
                name: row.get(1)?,
                isin: row.get(2)?,
                quantity,
                cost_basis,
                latest_price,
                price_date: row.get(6)?,
                market_value,
                unrealized: market_value.map(|v| v - cost_basis),
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_db;

    #[test]
    fn test_isin_validation() {
        assert!(is_valid_isin("IE00B4L5Y983"));
        assert!(is_valid_isin("US0378331005"));
        assert!(is_valid_isin("DE0005140008"));
        assert!(!is_valid_isin("IE00B4L5Y984"));
        assert!(!is_valid_isin("ie00b4l5y983"));
        assert!(!is_valid_isin("IE00B4L5Y98"));
    }

    #[test]
    fn test_add_security_rejects_bad_isin() {
        let (_dir, conn) = test_db();
        assert!(add_security(&conn, "Junk", "XX0000000000", None, "EUR").is_err());
        add_security(&conn, "World ETF", "ie00b4l5y983", Some("EUNL"), "EUR").unwrap();
        assert_eq!(list_securities(&conn).unwrap()[0].isin, "IE00B4L5Y983");
    }

    #[test]
    fn test_find_by_isin_symbol_or_name() {
        let (_dir, conn) = test_db();
        let id = add_security(&conn, "World ETF", "IE00B4L5Y983", Some("EUNL"), "EUR").unwrap();
        assert_eq!(find_security_id(&conn, "IE00B4L5Y983").unwrap(), id);
        assert_eq!(find_security_id(&conn, "EUNL").unwrap(), id);
        assert_eq!(find_security_id(&conn, "World ETF").unwrap(), id);
        assert!(matches!(find_security_id(&conn, "Gold"), Err(BookError::UnknownSecurity(_))));
    }

    #[test]
    fn test_holdings_valuation() {
        let (_dir, conn) = test_db();
        conn.execute("INSERT INTO accounts (name, account_type) VALUES ('Depot', 'depot')", [])
            .unwrap();
        let id = add_security(&conn, "World ETF", "IE00B4L5Y983", None, "EUR").unwrap();
        for (date, amount, qty) in [("2025-01-02", -800.0, 10.0), ("2025-02-03", -420.0, 5.0), ("2025-03-03", 170.0, -2.0)] {
            conn.execute(
                "INSERT INTO postings (account_id, booking_date, valuta_date, amount, description, security_id, quantity) \
                 VALUES (1, ?1, ?1, ?2, 'trade', ?3, ?4)",
                rusqlite::params![date, amount, id, qty],
            )
            .unwrap();
        }
        set_price(&conn, "IE00B4L5Y983", "2025-03-01", 80.0).unwrap();
        set_price(&conn, "IE00B4L5Y983", "2025-03-31", 90.0).unwrap();
        set_price(&conn, "IE00B4L5Y983", "2025-03-31", 95.0).unwrap();

        let h = &holdings(&conn).unwrap()[0];
        assert_eq!(h.quantity, 13.0);
        assert_eq!(h.cost_basis, 1050.0);
        assert_eq!(h.latest_price, Some(95.0));
        assert_eq!(h.price_date.as_deref(), Some("2025-03-31"));
        assert_eq!(h.market_value, Some(1235.0));
        assert_eq!(h.unrealized, Some(185.0));
    }

    #[test]
    fn test_sold_out_positions_are_hidden() {
        let (_dir, conn) = test_db();
        conn.execute("INSERT INTO accounts (name, account_type) VALUES ('Depot', 'depot')", [])
            .unwrap();
        let id = add_security(&conn, "Apple", "US0378331005", None, "USD").unwrap();
        for (amount, qty) in [(-100.0, 1.0), (120.0, -1.0)] {
            conn.execute(
                "INSERT INTO postings (account_id, booking_date, valuta_date, amount, description, security_id, quantity) \
                 VALUES (1, '2025-01-02', '2025-01-02', ?1, 'trade', ?2, ?3)",
                rusqlite::params![amount, id, qty],
            )
            .unwrap();
        }
        assert!(holdings(&conn).unwrap().is_empty());
    }
}
