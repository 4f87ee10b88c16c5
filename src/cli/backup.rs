use std::path::PathBuf;

use comfy_table::{Cell, Table};

use super::open_db;
use crate::backup::{self, BackupSummary};
use crate::error::{BookError, Result};
use crate::fmt::format_bytes;
use crate::settings::get_data_dir;

fn print_summary(summary: &BackupSummary) {
    let mut table = Table::new();
    table.set_header(vec!["Table", "Rows"]);
    for (name, rows) in &summary.tables {
        table.add_row(vec![Cell::new(name), Cell::new(rows)]);
    }
    println!("{table}");
    println!("Rows: {}", summary.total_rows);
    println!("Size: {}", format_bytes(summary.size));
}

pub fn run(output: Option<String>) -> Result<()> {
    let conn = open_db()?;
    let dest = match output {
        Some(p) => PathBuf::from(p),
        None => backup::default_backup_path(&get_data_dir(), chrono::Local::now().naive_local()),
    };
    let summary = backup::create_backup(&conn, &dest)?;
    println!("Backup saved to {}", summary.path.display());
    print_summary(&summary);
    Ok(())
}

pub fn restore(file: &str, force: bool) -> Result<()> {
    let conn = open_db()?;
    if !force && backup::has_user_data(&conn)? {
        return Err(BookError::Backup(
            "the database already holds data; pass --force to replace it".into(),
        ));
    }
    let summary = backup::restore_backup(&conn, &PathBuf::from(file))?;
    println!("Restored {}", summary.path.display());
    print_summary(&summary);
    Ok(())
}
