use std::path::Path;

use rusqlite::Connection;
use sha2::{Digest, Sha256};

use crate::accounts::{find_account_id, normalize_iban};
use crate::error::{BookError, Result};
use crate::models::ParsedRow;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// `None` for anything that is not a finite number once currency symbols are stripped.
pub fn parse_amount(raw: &str) -> Option<f64> {
    let s = raw
        .replace(',', "")
        .replace('"', "")
        .replace(['$', '\u{20ac}', '\u{a3}'], "");
    let s = s.trim();
    let value = match s.strip_prefix('(').and_then(|v| v.strip_suffix(')')) {
        Some(inner) => -inner.trim().parse::<f64>().ok()?,
        None => s.parse::<f64>().ok()?,
    };
    value.is_finite().then_some(value)
}

/// European notation: `1.234,56` and `-12,30 €`.
pub fn parse_amount_decimal_comma(raw: &str) -> Option<f64> {
    let s = raw.replace('.', "").replace(',', ".");
    parse_amount(&s)
}

pub fn parse_date_iso(raw: &str) -> Option<String> {
    chrono::NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .ok()
        .map(|d| d.format("%Y-%m-%d").to_string())
}

pub fn parse_date_dmy(raw: &str) -> Option<String> {
    let raw = raw.trim();
    let parts: Vec<&str> = raw.split('.').collect();
    if parts.len() != 3 {
        return None;
    }
    let d: u32 = parts[0].parse().ok()?;
    let m: u32 = parts[1].parse().ok()?;
    let mut y: i32 = parts[2].parse().ok()?;
    if parts[2].len() == 2 {
        y += 2000;
    }
    chrono::NaiveDate::from_ymd_opt(y, m, d).map(|dt| dt.format("%Y-%m-%d").to_string())
}

#[cfg(any(feature = "xlsx", test))]
pub fn excel_serial_to_date(serial: f64) -> String {
    // Excel epoch is 1899-12-30 (accounting for the 1900 leap year bug)
    let base = chrono::NaiveDate::from_ymd_opt(1899, 12, 30).unwrap_or_default();
    let date = base + chrono::Duration::days(serial as i64);
    date.format("%Y-%m-%d").to_string()
}

fn compute_checksum(file_path: &Path) -> Result<String> {
    let data = std::fs::read(file_path)?;
    let mut hasher = Sha256::new();
    hasher.update(&data);
    Ok(hex::encode(hasher.finalize()))
}

/// Rows of the running import batch are not compared, so identical lines
/// within one statement all stay.
fn is_duplicate_row(conn: &Connection, account_id: i64, import_id: i64, row: &ParsedRow) -> Result<bool> {
    let mut stmt = conn.prepare_cached(
        "SELECT 1 FROM postings WHERE account_id = ?1 AND booking_date = ?2 AND amount = ?3 AND description = ?4 \
         UNION ALL \
         SELECT 1 FROM statement_drafts WHERE account_id = ?1 AND booking_date = ?2 AND amount = ?3 \
             AND description = ?4 AND status != 'discarded' \
             AND (import_id IS NULL OR import_id != ?5)",
    )?;
    Ok(stmt.exists(rusqlite::params![
        account_id,
        row.booking_date,
        row.amount,
        row.description,
        import_id
    ])?)
}

// ---------------------------------------------------------------------------
// Column mapping shared by the tabular formats
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct ColumnMap {
    booking: Option<usize>,
    valuta: Option<usize>,
    amount: Option<usize>,
    description: Option<usize>,
    counterparty: Option<usize>,
    iban: Option<usize>,
}

impl ColumnMap {
    fn from_header<'a>(header: impl IntoIterator<Item = &'a str>) -> Self {
        let mut map = ColumnMap::default();
        for (i, field) in header.into_iter().enumerate() {
            let f = field.trim().trim_start_matches('\u{feff}').to_lowercase();
            let slot = match f.as_str() {
                "date" | "booking date" | "booking_date" | "buchungstag" | "buchungsdatum" => {
                    &mut map.booking
                }
                "valuta" | "valuta_date" | "value date" | "value_date" | "valutadatum"
                | "wertstellung" => &mut map.valuta,
                "amount" | "betrag" | "betrag (eur)" => &mut map.amount,
                "description" | "memo" | "purpose" | "verwendungszweck" => &mut map.description,
                "counterparty" | "payee" | "name" | "beguenstigter/zahlungspflichtiger"
                | "name zahlungsbeteiligter" | "auftraggeber / begünstigter" => {
                    &mut map.counterparty
                }
                "iban" | "counterparty_iban" | "kontonummer/iban" | "iban zahlungsbeteiligter" => {
                    &mut map.iban
                }
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(i);
            }
        }
        map
    }

    fn is_complete(&self) -> bool {
        self.booking.is_some() && self.amount.is_some()
    }

    fn build_row(
        &self,
        get: impl Fn(usize) -> Option<String>,
        parse_date: fn(&str) -> Option<String>,
        parse_money: fn(&str) -> Option<f64>,
    ) -> Option<ParsedRow> {
        let booking_date = parse_date(&get(self.booking?)?)?;
        let valuta_date = self
            .valuta
            .and_then(&get)
            .and_then(|v| parse_date(&v))
            .unwrap_or_else(|| booking_date.clone());
        let amount = parse_money(&get(self.amount?)?)?;
        let counterparty = self.counterparty.and_then(&get).filter(|s| !s.is_empty());
        let description = self
            .description
            .and_then(&get)
            .filter(|s| !s.is_empty())
            .or_else(|| counterparty.clone())?;
        let counterparty_iban = self
            .iban
            .and_then(&get)
            .filter(|s| !s.is_empty())
            .map(|s| normalize_iban(&s));
        Some(ParsedRow {
            booking_date,
            valuta_date,
            description,
            amount,
            counterparty,
            counterparty_iban,
        })
    }
}

/// Rows a parser produced plus the data lines it had to reject.
#[derive(Debug, Default)]
pub struct ParsedStatement {
    pub rows: Vec<ParsedRow>,
    pub invalid: usize,
}

impl ParsedStatement {
    fn push(&mut self, row: Option<ParsedRow>) {
        match row {
            Some(row) => self.rows.push(row),
            None => self.invalid += 1,
        }
    }
}

// ---------------------------------------------------------------------------
// Importer kinds
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ImporterKind {
    GenericCsv,
    SemicolonCsv,
    #[cfg(feature = "xlsx")]
    Xlsx,
}

impl ImporterKind {
    pub fn key(&self) -> &'static str {
        match self {
            Self::GenericCsv => "generic_csv",
            Self::SemicolonCsv => "semicolon_csv",
            #[cfg(feature = "xlsx")]
            Self::Xlsx => "xlsx",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::GenericCsv => "Generic CSV (ISO dates, decimal point)",
            Self::SemicolonCsv => "Bank CSV (semicolons, DD.MM.YYYY, decimal comma)",
            #[cfg(feature = "xlsx")]
            Self::Xlsx => "Excel workbook (first sheet)",
        }
    }

    pub fn detect(&self, file_path: &Path) -> bool {
        match self {
            Self::GenericCsv => detect_csv(file_path, b',', "generic_csv"),
            Self::SemicolonCsv => detect_csv(file_path, b';', "semicolon_csv"),
            #[cfg(feature = "xlsx")]
            Self::Xlsx => file_path
                .extension()
                .is_some_and(|e| e.eq_ignore_ascii_case("xlsx")),
        }
    }

    pub fn parse(&self, file_path: &Path) -> Result<ParsedStatement> {
        match self {
            Self::GenericCsv => parse_csv(file_path, b',', parse_date_iso, parse_amount),
            Self::SemicolonCsv => {
                parse_csv(file_path, b';', parse_date_dmy, parse_amount_decimal_comma)
            }
            #[cfg(feature = "xlsx")]
            Self::Xlsx => parse_xlsx(file_path),
        }
    }
}

pub const ALL_IMPORTERS: &[ImporterKind] = &[
    #[cfg(feature = "xlsx")]
    ImporterKind::Xlsx,
    ImporterKind::SemicolonCsv,
    ImporterKind::GenericCsv,
];

pub fn get_by_key(key: &str) -> Option<ImporterKind> {
    ALL_IMPORTERS.iter().find(|i| i.key() == key).copied()
}

pub fn get_for_file(file_path: &Path) -> Option<ImporterKind> {
    ALL_IMPORTERS.iter().find(|i| i.detect(file_path)).copied()
}

// ---------------------------------------------------------------------------
// import_file
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct ImportResult {
    pub drafted: usize,
    pub skipped: usize,
    pub invalid: usize,
    pub duplicate_file: bool,
    pub format: ImporterKind,
}

pub fn import_file(
    conn: &Connection,
    file_path: &Path,
    account_name: &str,
    format_key: Option<&str>,
) -> Result<ImportResult> {
    let account_id = find_account_id(conn, account_name)?;

    let importer = if let Some(key) = format_key {
        get_by_key(key).ok_or_else(|| BookError::UnknownFormat(key.to_string()))?
    } else {
        get_for_file(file_path)
            .ok_or_else(|| BookError::NoImporter(file_path.display().to_string()))?
    };

    let checksum = compute_checksum(file_path)?;
    {
        let mut stmt =
            conn.prepare("SELECT 1 FROM imports WHERE checksum = ?1 AND account_id = ?2")?;
        if stmt.exists(rusqlite::params![checksum, account_id])? {
            tracing::info!(file = %file_path.display(), "statement already imported");
            return Ok(ImportResult {
                drafted: 0,
                skipped: 0,
                invalid: 0,
                duplicate_file: true,
                format: importer,
            });
        }
    }

    let ParsedStatement { rows: parsed_rows, invalid } = importer.parse(file_path)?;
    tracing::debug!(
        format = importer.key(),
        rows = parsed_rows.len(),
        invalid,
        "statement parsed"
    );
    if invalid > 0 {
        tracing::info!(file = %file_path.display(), invalid, "rows rejected");
    }
    // Nothing usable: leave the checksum unrecorded so the file can be retried.
    if parsed_rows.is_empty() {
        return Ok(ImportResult {
            drafted: 0,
            skipped: 0,
            invalid,
            duplicate_file: false,
            format: importer,
        });
    }

    let tx = conn.unchecked_transaction()?;
    let dates: Vec<&str> = parsed_rows.iter().map(|r| r.booking_date.as_str()).collect();
    tx.execute(
        "INSERT INTO imports (filename, account_id, record_count, date_range_start, date_range_end, checksum) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        rusqlite::params![
            file_path.file_name().and_then(|n| n.to_str()).unwrap_or(""),
            account_id,
            parsed_rows.len() as i64,
            dates.iter().min().copied(),
            dates.iter().max().copied(),
            checksum,
        ],
    )?;
    let import_id = tx.last_insert_rowid();

    let mut drafted = 0usize;
    let mut skipped = 0usize;
    for row in &parsed_rows {
        if is_duplicate_row(&tx, account_id, import_id, row)? {
            skipped += 1;
            continue;
        }
        tx.execute(
            "INSERT INTO statement_drafts (import_id, account_id, booking_date, valuta_date, amount, \
             description, counterparty, counterparty_iban) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            rusqlite::params![
                import_id,
                account_id,
                row.booking_date,
                row.valuta_date,
                row.amount,
                row.description,
                row.counterparty,
                row.counterparty_iban,
            ],
        )?;
        drafted += 1;
    }
    tx.commit()?;

    tracing::info!(
        file = %file_path.display(),
        account = account_name,
        drafted,
        skipped,
        invalid,
        "statement imported"
    );
    Ok(ImportResult {
        drafted,
        skipped,
        invalid,
        duplicate_file: false,
        format: importer,
    })
}

// ---------------------------------------------------------------------------
// CSV parsers
// ---------------------------------------------------------------------------

fn csv_reader(file_path: &Path, delimiter: u8) -> Result<csv::Reader<std::io::BufReader<std::fs::File>>> {
    let file = std::fs::File::open(file_path)?;
    Ok(csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(std::io::BufReader::new(file)))
}

fn detect_csv(file_path: &Path, delimiter: u8, key: &str) -> bool {
    if file_path
        .extension()
        .is_some_and(|e| e.eq_ignore_ascii_case("xlsx"))
    {
        return false;
    }
    let Ok(mut rdr) = csv_reader(file_path, delimiter) else {
        return false;
    };
    // Bank exports often carry a preamble; look at the first few records only.
    for result in rdr.records().take(20) {
        let Ok(record) = result else { continue };
        if record.len() < 2 {
            continue;
        }
        if ColumnMap::from_header(record.iter()).is_complete() {
            tracing::trace!(key, "header detected");
            return true;
        }
    }
    false
}

fn parse_csv(
    file_path: &Path,
    delimiter: u8,
    parse_date: fn(&str) -> Option<String>,
    parse_money: fn(&str) -> Option<f64>,
) -> Result<ParsedStatement> {
    let mut rdr = csv_reader(file_path, delimiter)?;
    let mut parsed = ParsedStatement::default();
    let mut columns: Option<ColumnMap> = None;

    for result in rdr.records() {
        let Ok(record) = result else { continue };
        if columns.is_none() {
            let candidate = ColumnMap::from_header(record.iter());
            if candidate.is_complete() {
                columns = Some(candidate);
            }
            continue;
        }
        let Some(map) = &columns else { continue };
        if record.iter().all(|f| f.trim().is_empty()) {
            continue;
        }
        let get = |i: usize| record.get(i).map(|s| s.trim().to_string());
        parsed.push(map.build_row(get, parse_date, parse_money));
    }
    if columns.is_none() {
        return Err(BookError::NoImporter(format!(
            "{} (no header with a date and an amount column)",
            file_path.display()
        )));
    }
    Ok(parsed)
}

// ---------------------------------------------------------------------------
// XLSX parser (feature-gated)
// ---------------------------------------------------------------------------

#[cfg(feature = "xlsx")]
fn parse_xlsx(file_path: &Path) -> Result<ParsedStatement> {
    use calamine::{Data, Reader};

    let mut workbook = calamine::open_workbook_auto(file_path)
        .map_err(|e| BookError::Other(format!("Failed to open XLSX: {e}")))?;
    let first = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| BookError::NoImporter(format!("{} has no sheets", file_path.display())))?;
    let range = workbook
        .worksheet_range(&first)
        .map_err(|e| BookError::Other(format!("Failed to read sheet {first}: {e}")))?;

    fn cell_text(cell: &Data) -> Option<String> {
        match cell {
            Data::Empty => None,
            Data::DateTime(dt) => Some(excel_serial_to_date(dt.as_f64())),
            Data::Float(f) => Some(f.to_string()),
            Data::Int(i) => Some(i.to_string()),
            other => Some(other.to_string().trim().to_string()),
        }
    }

    let mut parsed = ParsedStatement::default();
    let mut columns: Option<ColumnMap> = None;
    for row in range.rows() {
        if columns.is_none() {
            let header: Vec<String> = row.iter().map(|c| c.to_string()).collect();
            let candidate = ColumnMap::from_header(header.iter().map(String::as_str));
            if candidate.is_complete() {
                columns = Some(candidate);
            }
            continue;
        }
        let Some(map) = &columns else { continue };
        if row.iter().all(|c| matches!(c, Data::Empty)) {
            continue;
        }
        let booking_idx = map.booking;
        let get = |i: usize| {
            let cell = row.get(i)?;
            // Dates stored as plain serial numbers still need converting.
            match (Some(i) == booking_idx || Some(i) == map.valuta, cell) {
                (true, Data::Float(f)) => Some(excel_serial_to_date(*f)),
                (true, Data::Int(n)) => Some(excel_serial_to_date(*n as f64)),
                _ => cell_text(cell),
            }
        };
        parsed.push(map.build_row(get, parse_date_iso, parse_amount));
    }
    if columns.is_none() {
        return Err(BookError::NoImporter(format!(
            "{} (no header with a date and an amount column)",
            file_path.display()
        )));
    }
    Ok(parsed)
}
