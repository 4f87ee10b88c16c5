use std::path::PathBuf;

use colored::Colorize;

use super::open_db;
use crate::drafting::apply_rules;
use crate::error::Result;
use crate::importer::import_file;

pub fn run(file: &str, account: &str, format: Option<&str>) -> Result<()> {
    let file_path = PathBuf::from(file);
    let conn = open_db()?;

    let result = import_file(&conn, &file_path, account, format)?;

    if result.duplicate_file {
        println!("This file has already been imported (duplicate checksum).");
        return Ok(());
    }

    println!("Format: {}", result.format.name());
    println!(
        "{} drafted, {} skipped (duplicates), {} invalid",
        result.drafted, result.skipped, result.invalid
    );
    if result.invalid > 0 {
        println!(
            "{}",
            format!("{} rows could not be read (bad date or amount) and were not imported", result.invalid)
                .yellow()
        );
    }
    if result.drafted + result.skipped == 0 {
        println!("Nothing imported; the file can be imported again once fixed.");
        return Ok(());
    }

    let applied = apply_rules(&conn)?;
    println!("{} matched by rules, {} left to review", applied.matched, applied.unmatched);
    Ok(())
}
