use crate::backup::TABLES;
use crate::db::{db_path, get_connection, get_metadata};
use crate::error::Result;
use crate::fmt::format_bytes;
use crate::settings::load_settings;

pub fn run() -> Result<()> {
    let settings = load_settings();
    let db_path = db_path();

    println!("User:        {}", if settings.user_name.is_empty() { "(not set)" } else { &settings.user_name });
    println!("Data dir:    {}", settings.data_dir);
    println!("Database:    {}", db_path.display());
    println!("Currency:    {}", settings.currency);
    println!("Fiscal year: starts in month {:02}", settings.fiscal_start_month());

    if !db_path.exists() {
        println!();
        println!("Database not found. Run `pocketbook init` to set up.");
        return Ok(());
    }

    let size = std::fs::metadata(&db_path)?.len();
    println!("DB size:     {}", format_bytes(size));

    let conn = get_connection(&db_path)?;
    let schema = get_metadata(&conn, "schema_version");
    println!("Schema:      {}", schema.as_deref().unwrap_or("(unknown)"));

    let open_drafts: i64 = conn.query_row(
        "SELECT count(*) FROM statement_drafts WHERE status = 'open'",
        [],
        |r| r.get(0),
    )?;

    println!();
    for table in TABLES.iter().filter(|t| **t != "metadata") {
        let count: i64 = conn.query_row(&format!("SELECT count(*) FROM {table}"), [], |r| r.get(0))?;
        println!("{:<18} {count}", format!("{table}:"));
    }
    println!("{:<18} {open_drafts}", "open drafts:");
    Ok(())
}
