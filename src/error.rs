use thiserror::Error;

#[derive(Error, Debug)]
pub enum BookError {
    #[error("Database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Spreadsheet error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    #[error("Unknown account: {0}")]
    UnknownAccount(String),

    #[error("Unknown contact: {0}")]
    UnknownContact(String),

    #[error("Unknown category: {0}")]
    UnknownCategory(String),

    #[error("Unknown purpose: {0}")]
    UnknownPurpose(String),

    #[error("Unknown security: {0}")]
    UnknownSecurity(String),

    #[error("Unknown savings plan: {0}")]
    UnknownSavingsPlan(String),

    #[error("Unknown format: {0}")]
    UnknownFormat(String),

    #[error("No importer recognizes {0}")]
    NoImporter(String),

    #[error("No {entity} with ID {id}")]
    NotFound { entity: &'static str, id: i64 },

    #[error("Invalid date: {0}")]
    InvalidDate(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Backup error: {0}")]
    Backup(String),

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, BookError>;

/// Parse an ISO `YYYY-MM-DD` date, mapping failures onto [`BookError::InvalidDate`].
pub fn parse_iso_date(raw: &str) -> Result<chrono::NaiveDate> {
    chrono::NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| BookError::InvalidDate(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_iso_date() {
        assert_eq!(
            parse_iso_date("2025-03-01").unwrap(),
            chrono::NaiveDate::from_ymd_opt(2025, 3, 1).unwrap()
        );
        let err = parse_iso_date("03/01/2025").unwrap_err();
        assert!(err.to_string().contains("Invalid date"), "got: {err}");
    }

    #[test]
    fn test_not_found_message() {
        let err = BookError::NotFound { entity: "posting", id: 7 };
        assert_eq!(err.to_string(), "No posting with ID 7");
    }
}
