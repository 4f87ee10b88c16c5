use std::collections::{BTreeMap, HashSet};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use rusqlite::types::{Value, ValueRef};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use zip::write::SimpleFileOptions;

use crate::error::{BookError, Result};

pub const FORMAT_VERSION: u32 = 1;

/// Entity tables in dependency order. Restore inserts front to back and
/// deletes back to front.
pub const TABLES: &[&str] = &[
    "accounts",
    "categories",
    "budget_purposes",
    "contacts",
    "savings_plans",
    "securities",
    "security_prices",
    "imports",
    "statement_drafts",
    "postings",
    "budget_rules",
    "rules",
    "metadata",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub format_version: u32,
    pub app_version: String,
    pub created_at: String,
    pub tables: BTreeMap<String, usize>,
}

#[derive(Debug)]
pub struct BackupSummary {
    pub path: PathBuf,
    pub tables: BTreeMap<String, usize>,
    pub total_rows: usize,
    pub size: u64,
}

pub fn default_backup_path(data_dir: &Path, now: NaiveDateTime) -> PathBuf {
    data_dir
        .join("backups")
        .join(format!("pocketbook-{}.zip", now.format("%Y%m%d-%H%M%S")))
}

/// True once anything beyond the seeded categories has been entered.
pub fn has_user_data(conn: &Connection) -> Result<bool> {
    let rows: i64 = conn.query_row(
        "SELECT (SELECT count(*) FROM accounts) + (SELECT count(*) FROM contacts) \
              + (SELECT count(*) FROM postings) + (SELECT count(*) FROM statement_drafts) \
              + (SELECT count(*) FROM budget_rules)",
        [],
        |row| row.get(0),
    )?;
    Ok(rows > 0)
}

fn to_json(value: ValueRef<'_>) -> serde_json::Value {
    match value {
        ValueRef::Null => serde_json::Value::Null,
        ValueRef::Integer(i) => i.into(),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        ValueRef::Text(t) => String::from_utf8_lossy(t).into_owned().into(),
        ValueRef::Blob(b) => hex::encode(b).into(),
    }
}

fn from_json(value: &serde_json::Value) -> Result<Value> {
    Ok(match value {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Integer(i64::from(*b)),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => Value::Integer(i),
            None => Value::Real(n.as_f64().unwrap_or_default()),
        },
        serde_json::Value::String(s) => Value::Text(s.clone()),
        other => return Err(BookError::Backup(format!("unsupported value {other}"))),
    })
}

fn table_columns(conn: &Connection, table: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
    let cols = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(cols)
}

fn dump_table(conn: &Connection, table: &str) -> Result<(String, usize)> {
    let columns = table_columns(conn, table)?;
    let mut stmt = conn.prepare(&format!("SELECT * FROM {table} ORDER BY rowid"))?;
    let mut rows = stmt.query([])?;
    let mut out = String::new();
    let mut count = 0usize;
    while let Some(row) = rows.next()? {
        let mut obj = serde_json::Map::new();
        for (i, col) in columns.iter().enumerate() {
            obj.insert(col.clone(), to_json(row.get_ref(i)?));
        }
        out.push_str(&serde_json::to_string(&serde_json::Value::Object(obj))?);
        out.push('\n');
        count += 1;
    }
    Ok((out, count))
}

pub fn create_backup(conn: &Connection, dest: &Path) -> Result<BackupSummary> {
    if let Some(parent) = dest.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let mut tables = BTreeMap::new();
    let mut dumps = Vec::with_capacity(TABLES.len());
    for table in TABLES {
        let (body, count) = dump_table(conn, table)?;
        tables.insert(table.to_string(), count);
        dumps.push((table, body));
    }
    let manifest = Manifest {
        format_version: FORMAT_VERSION,
        app_version: env!("CARGO_PKG_VERSION").to_string(),
        created_at: chrono::Local::now().format("%Y-%m-%dT%H:%M:%S").to_string(),
        tables: tables.clone(),
    };

    let file = std::fs::File::create(dest)?;
    let mut zip = zip::ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
    zip.start_file("manifest.json", options)?;
    zip.write_all(serde_json::to_string_pretty(&manifest)?.as_bytes())?;
    for (table, body) in &dumps {
        zip.start_file(format!("{table}.ndjson"), options)?;
        zip.write_all(body.as_bytes())?;
    }
    zip.finish()?;

    let total_rows = tables.values().sum();
    let size = std::fs::metadata(dest)?.len();
    tracing::info!(path = %dest.display(), rows = total_rows, size, "backup written");
    Ok(BackupSummary {
        path: dest.to_path_buf(),
        tables,
        total_rows,
        size,
    })
}

type Rows = Vec<serde_json::Map<String, serde_json::Value>>;

fn read_entry<R: Read + std::io::Seek>(archive: &mut zip::ZipArchive<R>, name: &str) -> Result<String> {
    let mut entry = archive.by_name(name).map_err(|e| match e {
        zip::result::ZipError::FileNotFound => {
            BookError::Backup(format!("archive is missing {name}"))
        }
        other => BookError::Zip(other),
    })?;
    let mut content = String::new();
    entry.read_to_string(&mut content)?;
    Ok(content)
}

/// Read and validate the whole archive before anything is touched.
fn read_archive(src: &Path) -> Result<(Manifest, Vec<(&'static str, Rows)>)> {
    let file = std::fs::File::open(src)?;
    let mut archive = zip::ZipArchive::new(file)?;
    let manifest: Manifest = serde_json::from_str(&read_entry(&mut archive, "manifest.json")?)
        .map_err(|e| BookError::Backup(format!("unreadable manifest: {e}")))?;
    if manifest.format_version != FORMAT_VERSION {
        return Err(BookError::Backup(format!(
            "unsupported format version {} (expected {FORMAT_VERSION})",
            manifest.format_version
        )));
    }
    if let Some(unknown) = manifest.tables.keys().find(|t| !TABLES.contains(&t.as_str())) {
        return Err(BookError::Backup(format!("unknown table '{unknown}'")));
    }

    let mut data = Vec::new();
    for &table in TABLES {
        let Some(&expected) = manifest.tables.get(table) else {
            continue;
        };
        let body = read_entry(&mut archive, &format!("{table}.ndjson"))?;
        let mut rows = Rows::new();
        for line in body.lines().filter(|l| !l.trim().is_empty()) {
            match serde_json::from_str::<serde_json::Value>(line)? {
                serde_json::Value::Object(obj) => rows.push(obj),
                _ => return Err(BookError::Backup(format!("{table}: row is not an object"))),
            }
        }
        if rows.len() != expected {
            return Err(BookError::Backup(format!(
                "{table}: manifest lists {expected} rows, archive has {}",
                rows.len()
            )));
        }
        data.push((table, rows));
    }
    Ok((manifest, data))
}

/// Replace every entity row with the archive's content in one transaction.
pub fn restore_backup(conn: &Connection, src: &Path) -> Result<BackupSummary> {
    let (manifest, data) = read_archive(src)?;

    let tx = conn.unchecked_transaction()?;
    for table in TABLES.iter().rev() {
        tx.execute(&format!("DELETE FROM {table}"), [])?;
    }
    for (table, rows) in &data {
        let known: HashSet<String> = table_columns(&tx, table)?.into_iter().collect();
        for row in rows {
            if let Some(col) = row.keys().find(|c| !known.contains(*c)) {
                return Err(BookError::Backup(format!("unknown column '{col}' in {table}")));
            }
            let cols: Vec<&str> = row.keys().map(String::as_str).collect();
            let placeholders: Vec<String> = (1..=cols.len()).map(|i| format!("?{i}")).collect();
            let values = row.values().map(from_json).collect::<Result<Vec<_>>>()?;
            tx.execute(
                &format!(
                    "INSERT INTO {table} ({}) VALUES ({})",
                    cols.join(", "),
                    placeholders.join(", ")
                ),
                rusqlite::params_from_iter(values),
            )?;
        }
    }
    tx.commit()?;

    let total_rows = manifest.tables.values().sum();
    tracing::info!(path = %src.display(), rows = total_rows, created = %manifest.created_at, "backup restored");
    Ok(BackupSummary {
        path: src.to_path_buf(),
        tables: manifest.tables,
        total_rows,
        size: std::fs::metadata(src)?.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::{add_account, NewAccount};
    use crate::db::test_db;
    use crate::models::NewPosting;
    use crate::postings::{add_posting, list_postings, PostingFilter};

    fn seed(conn: &Connection) {
        add_account(
            conn,
            &NewAccount {
                name: "Giro",
                account_type: "checking",
                institution: Some("Sparkasse"),
                iban: None,
                currency: "EUR",
                opening_balance: 1000.0,
            },
        )
        .unwrap();
        for (date, amount, desc) in [("2025-01-02", -850.0, "Rent"), ("2025-01-28", 3000.0, "Salary")] {
            add_posting(
                conn,
                &NewPosting {
                    account: "Giro".into(),
                    booking_date: date.into(),
                    amount,
                    description: desc.into(),
                    ..NewPosting::default()
                },
            )
            .unwrap();
        }
    }

    fn write_zip(path: &Path, files: &[(&str, &str)]) {
        let mut zip = zip::ZipWriter::new(std::fs::File::create(path).unwrap());
        for (name, body) in files {
            zip.start_file(*name, SimpleFileOptions::default()).unwrap();
            zip.write_all(body.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
    }

    #[test]
    fn test_default_backup_path() {
        let now = chrono::NaiveDate::from_ymd_opt(2025, 3, 9)
            .unwrap()
            .and_hms_opt(14, 5, 7)
            .unwrap();
        assert_eq!(
            default_backup_path(Path::new("/data"), now),
            PathBuf::from("/data/backups/pocketbook-20250309-140507.zip")
        );
    }

    #[test]
    fn test_backup_and_restore_into_fresh_db() {
        let (dir, conn) = test_db();
        seed(&conn);
        let path = dir.path().join("out").join("backup.zip");
        let summary = create_backup(&conn, &path).unwrap();
        assert_eq!(summary.tables["accounts"], 1);
        assert_eq!(summary.tables["postings"], 2);
        assert!(summary.size > 0);

        let (_dir2, fresh) = test_db();
        assert!(!has_user_data(&fresh).unwrap());
        let restored = restore_backup(&fresh, &path).unwrap();
        assert_eq!(restored.total_rows, summary.total_rows);
        let postings = list_postings(&fresh, &PostingFilter::default()).unwrap();
        assert_eq!(postings.len(), 2);
        assert_eq!(postings[0].amount, -850.0);
        let accounts = crate::accounts::list_accounts(&fresh, true).unwrap();
        assert_eq!(accounts[0].institution.as_deref(), Some("Sparkasse"));
        assert_eq!(accounts[0].balance, 3150.0);
    }

    #[test]
    fn test_restore_replaces_existing_rows() {
        let (dir, conn) = test_db();
        seed(&conn);
        let path = dir.path().join("backup.zip");
        create_backup(&conn, &path).unwrap();
        add_posting(
            &conn,
            &NewPosting {
                account: "Giro".into(),
                booking_date: "2025-02-01".into(),
                amount: -5.0,
                description: "Later".into(),
                ..NewPosting::default()
            },
        )
        .unwrap();
        restore_backup(&conn, &path).unwrap();
        assert_eq!(list_postings(&conn, &PostingFilter::default()).unwrap().len(), 2);
    }

    #[test]
    fn test_restore_rejects_unknown_table() {
        let (dir, conn) = test_db();
        let path = dir.path().join("bad.zip");
        write_zip(
            &path,
            &[(
                "manifest.json",
                r#"{"format_version":1,"app_version":"1.0.0","created_at":"x","tables":{"invoices":0}}"#,
            )],
        );
        let err = restore_backup(&conn, &path).unwrap_err();
        assert!(err.to_string().contains("unknown table"), "got: {err}");
    }

    #[test]
    fn test_restore_rejects_unknown_column_and_rolls_back() {
        let (dir, conn) = test_db();
        seed(&conn);
        let path = dir.path().join("bad.zip");
        write_zip(
            &path,
            &[
                (
                    "manifest.json",
                    r#"{"format_version":1,"app_version":"1.0.0","created_at":"x","tables":{"accounts":1}}"#,
                ),
                ("accounts.ndjson", "{\"id\":1,\"name\":\"Giro\",\"account_type\":\"checking\",\"colour\":\"red\"}\n"),
            ],
        );
        let err = restore_backup(&conn, &path).unwrap_err();
        assert!(matches!(err, BookError::Backup(_)));
        assert_eq!(list_postings(&conn, &PostingFilter::default()).unwrap().len(), 2);
    }

    #[test]
    fn test_restore_rejects_version_and_count_mismatch() {
        let (dir, conn) = test_db();
        let path = dir.path().join("v2.zip");
        write_zip(
            &path,
            &[(
                "manifest.json",
                r#"{"format_version":2,"app_version":"9.0.0","created_at":"x","tables":{}}"#,
            )],
        );
        assert!(restore_backup(&conn, &path).unwrap_err().to_string().contains("format version"));

        let path = dir.path().join("short.zip");
        write_zip(
            &path,
            &[
                (
                    "manifest.json",
                    r#"{"format_version":1,"app_version":"1.0.0","created_at":"x","tables":{"contacts":2}}"#,
                ),
                ("contacts.ndjson", "{\"id\":1,\"name\":\"A\"}\n"),
            ],
        );
        assert!(restore_backup(&conn, &path).unwrap_err().to_string().contains("manifest lists 2"));
    }
}
