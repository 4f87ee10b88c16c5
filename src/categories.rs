use rusqlite::{Connection, OptionalExtension};

use crate::error::{BookError, Result};
use crate::models::{Category, Purpose};

pub const CATEGORY_TYPES: &[&str] = &["income", "expense", "transfer"];

pub fn add_category(
    conn: &Connection,
    name: &str,
    category_type: &str,
    description: Option<&str>,
) -> Result<i64> {
    if !CATEGORY_TYPES.contains(&category_type) {
        return Err(BookError::InvalidInput(format!(
            "category type '{category_type}' (expected income, expense or transfer)"
        )));
    }
    conn.execute(
        "INSERT INTO categories (name, category_type, description) VALUES (?1, ?2, ?3)",
        rusqlite::params![name, category_type, description],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn list_categories(conn: &Connection) -> Result<Vec<Category>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, category_type, description FROM categories \
         WHERE is_active = 1 ORDER BY category_type, name",
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok(Category {
                id: row.get(0)?,
                name: row.get(1)?,
                category_type: row.get(2)?,
                description: row.get(3)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn find_category_id(conn: &Connection, name: &str) -> Result<i64> {
    conn.query_row("SELECT id FROM categories WHERE name = ?1", [name], |row| row.get(0))
        .optional()?
        .ok_or_else(|| BookError::UnknownCategory(name.to_string()))
}

pub fn add_purpose(conn: &Connection, name: &str, description: Option<&str>) -> Result<i64> {
    conn.execute(
        "INSERT INTO budget_purposes (name, description) VALUES (?1, ?2)",
        rusqlite::params![name, description],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn list_purposes(conn: &Connection) -> Result<Vec<Purpose>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, description FROM budget_purposes WHERE is_active = 1 ORDER BY name",
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok(Purpose {
                id: row.get(0)?,
                name: row.get(1)?,
                description: row.get(2)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn find_purpose_id(conn: &Connection, name: &str) -> Result<i64> {
    conn.query_row("SELECT id FROM budget_purposes WHERE name = ?1", [name], |row| row.get(0))
        .optional()?
        .ok_or_else(|| BookError::UnknownPurpose(name.to_string()))
}

/// Resolve an optional category name, turning a miss into an error.
pub fn resolve_category(conn: &Connection, name: Option<&str>) -> Result<Option<i64>> {
    name.map(|n| find_category_id(conn, n)).transpose()
}

pub fn resolve_purpose(conn: &Connection, name: Option<&str>) -> Result<Option<i64>> {
    name.map(|n| find_purpose_id(conn, n)).transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_db;

    #[test]
    fn test_add_category_and_find() {
        let (_dir, conn) = test_db();
        let id = add_category(&conn, "Pets", "expense", Some("Vet, food")).unwrap();
        assert_eq!(find_category_id(&conn, "Pets").unwrap(), id);
        assert!(list_categories(&conn).unwrap().iter().any(|c| c.name == "Pets"));
    }

    #[test]
    fn test_rejects_unknown_category_type() {
        let (_dir, conn) = test_db();
        assert!(add_category(&conn, "Odd", "asset", None).is_err());
    }

    #[test]
    fn test_purposes() {
        let (_dir, conn) = test_db();
        add_purpose(&conn, "Holiday 2025", Some("Summer trip")).unwrap();
        add_purpose(&conn, "Car", None).unwrap();
        let names: Vec<String> = list_purposes(&conn).unwrap().into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["Car", "Holiday 2025"]);
        assert!(matches!(find_purpose_id(&conn, "Boat"), Err(BookError::UnknownPurpose(_))));
    }

    #[test]
    fn test_resolve_optional_names() {
        let (_dir, conn) = test_db();
        assert_eq!(resolve_category(&conn, None).unwrap(), None);
        assert!(resolve_category(&conn, Some("Groceries")).unwrap().is_some());
        assert!(resolve_category(&conn, Some("Nope")).is_err());
    }
}
