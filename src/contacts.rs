use rusqlite::{Connection, OptionalExtension};

use crate::accounts::normalize_iban;
use crate::categories::{resolve_category, resolve_purpose};
use crate::error::{BookError, Result};
use crate::models::Contact;

/// The defaults a contact hands to drafts it is matched to.
#[derive(Debug, Clone, PartialEq)]
pub struct ContactDefaults {
    pub contact_id: i64,
    pub category_id: Option<i64>,
    pub purpose_id: Option<i64>,
}

pub fn add_contact(
    conn: &Connection,
    name: &str,
    iban: Option<&str>,
    default_category: Option<&str>,
    default_purpose: Option<&str>,
    notes: Option<&str>,
) -> Result<i64> {
    let category_id = resolve_category(conn, default_category)?;
    let purpose_id = resolve_purpose(conn, default_purpose)?;
    conn.execute(
        "INSERT INTO contacts (name, iban, default_category_id, default_purpose_id, notes) \
         VALUES (?1, ?2, ?3, ?4, ?5)",
        rusqlite::params![name, iban.map(normalize_iban), category_id, purpose_id, notes],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn list_contacts(conn: &Connection) -> Result<Vec<Contact>> {
    let mut stmt = conn.prepare(
        "SELECT c.id, c.name, c.iban, cat.name, bp.name, c.notes \
         FROM contacts c \
         LEFT JOIN categories cat ON c.default_category_id = cat.id \
         LEFT JOIN budget_purposes bp ON c.default_purpose_id = bp.id \
         ORDER BY c.name",
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok(Contact {
                id: row.get(0)?,
                name: row.get(1)?,
                iban: row.get(2)?,
                default_category: row.get(3)?,
                default_purpose: row.get(4)?,
                notes: row.get(5)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn find_contact_id(conn: &Connection, name: &str) -> Result<i64> {
    conn.query_row("SELECT id FROM contacts WHERE name = ?1", [name], |row| row.get(0))
        .optional()?
        .ok_or_else(|| BookError::UnknownContact(name.to_string()))
}

pub fn resolve_contact(conn: &Connection, name: Option<&str>) -> Result<Option<i64>> {
    name.map(|n| find_contact_id(conn, n)).transpose()
}

pub fn find_contact_by_iban(conn: &Connection, iban: &str) -> Result<Option<ContactDefaults>> {
    let found = conn
        .query_row(
            "SELECT id, default_category_id, default_purpose_id FROM contacts WHERE iban = ?1",
            [normalize_iban(iban)],
            |row| {
                Ok(ContactDefaults {
                    contact_id: row.get(0)?,
                    category_id: row.get(1)?,
                    purpose_id: row.get(2)?,
                })
            },
        )
        .optional()?;
    Ok(found)
}

pub fn contact_defaults(conn: &Connection, contact_id: i64) -> Result<ContactDefaults> {
    conn.query_row(
        "SELECT id, default_category_id, default_purpose_id FROM contacts WHERE id = ?1",
        [contact_id],
        |row| {
            Ok(ContactDefaults {
                contact_id: row.get(0)?,
                category_id: row.get(1)?,
                purpose_id: row.get(2)?,
            })
        },
    )
    .optional()?
    .ok_or(BookError::NotFound { entity: "contact", id: contact_id })
}
