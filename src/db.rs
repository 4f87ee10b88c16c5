use std::path::{Path, PathBuf};

use rusqlite::{Connection, OptionalExtension};

use crate::error::Result;
use crate::settings::get_data_dir;

pub const SCHEMA_VERSION: &str = "1";

pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS accounts (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    account_type TEXT NOT NULL,
    institution TEXT,
    iban TEXT,
    currency TEXT NOT NULL DEFAULT 'EUR',
    opening_balance REAL NOT NULL DEFAULT 0,
    is_active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS categories (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    category_type TEXT NOT NULL,
    description TEXT,
    is_active INTEGER NOT NULL DEFAULT 1
);

CREATE TABLE IF NOT EXISTS budget_purposes (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    description TEXT,
    is_active INTEGER NOT NULL DEFAULT 1
);

CREATE TABLE IF NOT EXISTS contacts (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    iban TEXT,
    default_category_id INTEGER,
    default_purpose_id INTEGER,
    notes TEXT,
    created_at TEXT DEFAULT (datetime('now')),
    FOREIGN KEY (default_category_id) REFERENCES categories(id),
    FOREIGN KEY (default_purpose_id) REFERENCES budget_purposes(id)
);

CREATE TABLE IF NOT EXISTS savings_plans (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    account_id INTEGER NOT NULL,
    target_amount REAL NOT NULL,
    monthly_amount REAL NOT NULL DEFAULT 0,
    start_date TEXT NOT NULL,
    target_date TEXT,
    is_active INTEGER NOT NULL DEFAULT 1,
    FOREIGN KEY (account_id) REFERENCES accounts(id)
);

CREATE TABLE IF NOT EXISTS securities (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    isin TEXT NOT NULL UNIQUE,
    symbol TEXT,
    currency TEXT NOT NULL DEFAULT 'EUR',
    is_active INTEGER NOT NULL DEFAULT 1
);

CREATE TABLE IF NOT EXISTS security_prices (
    id INTEGER PRIMARY KEY,
    security_id INTEGER NOT NULL,
    price_date TEXT NOT NULL,
    price REAL NOT NULL,
    UNIQUE (security_id, price_date),
    FOREIGN KEY (security_id) REFERENCES securities(id)
);

CREATE TABLE IF NOT EXISTS imports (
    id INTEGER PRIMARY KEY,
    filename TEXT NOT NULL,
    account_id INTEGER NOT NULL,
    import_date TEXT DEFAULT (datetime('now')),
    record_count INTEGER,
    date_range_start TEXT,
    date_range_end TEXT,
    checksum TEXT,
    FOREIGN KEY (account_id) REFERENCES accounts(id)
);

CREATE TABLE IF NOT EXISTS statement_drafts (
    id INTEGER PRIMARY KEY,
    import_id INTEGER,
    account_id INTEGER NOT NULL,
    booking_date TEXT NOT NULL,
    valuta_date TEXT NOT NULL,
    amount REAL NOT NULL,
    description TEXT NOT NULL,
    counterparty TEXT,
    counterparty_iban TEXT,
    contact_id INTEGER,
    category_id INTEGER,
    purpose_id INTEGER,
    status TEXT NOT NULL DEFAULT 'open',
    posting_id INTEGER,
    FOREIGN KEY (import_id) REFERENCES imports(id),
    FOREIGN KEY (account_id) REFERENCES accounts(id),
    FOREIGN KEY (contact_id) REFERENCES contacts(id),
    FOREIGN KEY (category_id) REFERENCES categories(id),
    FOREIGN KEY (purpose_id) REFERENCES budget_purposes(id)
);

CREATE TABLE IF NOT EXISTS postings (
    id INTEGER PRIMARY KEY,
    account_id INTEGER NOT NULL,
    booking_date TEXT NOT NULL,
    valuta_date TEXT NOT NULL,
    amount REAL NOT NULL,
    description TEXT NOT NULL,
    contact_id INTEGER,
    category_id INTEGER,
    purpose_id INTEGER,
    savings_plan_id INTEGER,
    security_id INTEGER,
    quantity REAL,
    draft_id INTEGER,
    created_at TEXT DEFAULT (datetime('now')),
    FOREIGN KEY (account_id) REFERENCES accounts(id),
    FOREIGN KEY (contact_id) REFERENCES contacts(id),
    FOREIGN KEY (category_id) REFERENCES categories(id),
    FOREIGN KEY (purpose_id) REFERENCES budget_purposes(id),
    FOREIGN KEY (savings_plan_id) REFERENCES savings_plans(id),
    FOREIGN KEY (security_id) REFERENCES securities(id),
    FOREIGN KEY (draft_id) REFERENCES statement_drafts(id)
);

CREATE INDEX IF NOT EXISTS idx_postings_booking_date ON postings(booking_date);

CREATE TABLE IF NOT EXISTS budget_rules (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    purpose_id INTEGER,
    category_id INTEGER,
    amount REAL NOT NULL,
    interval_months INTEGER NOT NULL DEFAULT 1,
    start_date TEXT NOT NULL,
    end_date TEXT,
    is_active INTEGER NOT NULL DEFAULT 1,
    CHECK ((purpose_id IS NULL) <> (category_id IS NULL)),
    CHECK (interval_months >= 1),
    FOREIGN KEY (purpose_id) REFERENCES budget_purposes(id),
    FOREIGN KEY (category_id) REFERENCES categories(id)
);

CREATE TABLE IF NOT EXISTS rules (
    id INTEGER PRIMARY KEY,
    pattern TEXT NOT NULL,
    match_type TEXT NOT NULL DEFAULT 'contains',
    contact_id INTEGER,
    category_id INTEGER,
    purpose_id INTEGER,
    priority INTEGER NOT NULL DEFAULT 0,
    hit_count INTEGER NOT NULL DEFAULT 0,
    is_active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT DEFAULT (datetime('now')),
    FOREIGN KEY (contact_id) REFERENCES contacts(id),
    FOREIGN KEY (category_id) REFERENCES categories(id),
    FOREIGN KEY (purpose_id) REFERENCES budget_purposes(id)
);
";

// (name, category_type, description)
const DEFAULT_CATEGORIES: &[(&str, &str, &str)] = &[
    // Income
    ("Salary", "income", "Wages and salary"),
    ("Interest & Dividends", "income", "Bank interest, dividends, coupons"),
    ("Refunds", "income", "Reimbursements and refunds"),
    ("Other Income", "income", "Anything else coming in"),
    // Expenses
    ("Rent", "expense", "Rent, service charges"),
    ("Utilities", "expense", "Power, water, heating, internet, phone"),
    ("Groceries", "expense", "Supermarket, bakery, market"),
    ("Dining Out", "expense", "Restaurants, cafes, takeaway"),
    ("Transport", "expense", "Public transport, fuel, car costs"),
    ("Insurance", "expense", "Health, liability, household insurance"),
    ("Health", "expense", "Pharmacy, doctors, co-payments"),
    ("Subscriptions", "expense", "Streaming, software, memberships"),
    ("Clothing", "expense", "Clothes and shoes"),
    ("Leisure", "expense", "Hobbies, sports, events"),
    ("Travel", "expense", "Holidays, hotels, flights"),
    ("Gifts & Donations", "expense", "Presents and charity"),
    ("Taxes & Fees", "expense", "Taxes, bank fees, licences"),
    ("Other Expenses", "expense", "Anything else going out"),
    // Transfers
    ("Transfer", "transfer", "Transfers between own accounts"),
    ("Savings", "transfer", "Moves into savings plans and depots"),
];

pub fn get_connection(db_path: &Path) -> Result<Connection> {
    let conn = Connection::open(db_path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn db_path() -> PathBuf {
    get_data_dir().join("pocketbook.db")
}

pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;

    let count: i64 = conn.query_row("SELECT count(*) FROM categories", [], |row| row.get(0))?;
    if count == 0 {
        for (name, category_type, description) in DEFAULT_CATEGORIES {
            conn.execute(
                "INSERT INTO categories (name, category_type, description) VALUES (?1, ?2, ?3)",
                rusqlite::params![name, category_type, description],
            )?;
        }
    }
    if get_metadata(conn, "schema_version").is_none() {
        set_metadata(conn, "schema_version", SCHEMA_VERSION)?;
    }
    Ok(())
}

pub fn get_metadata(conn: &Connection, key: &str) -> Option<String> {
    conn.query_row("SELECT value FROM metadata WHERE key = ?1", [key], |r| r.get(0))
        .optional()
        .ok()
        .flatten()
}

pub fn set_metadata(conn: &Connection, key: &str, value: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO metadata (key, value) VALUES (?1, ?2) \
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        [key, value],
    )?;
    Ok(())
}

/// Test fixture shared by the module tests.
#[cfg(test)]
pub(crate) fn test_db() -> (tempfile::TempDir, Connection) {
    let dir = tempfile::tempdir().unwrap();
    let conn = get_connection(&dir.path().join("test.db")).unwrap();
    init_db(&conn).unwrap();
    (dir, conn)
}
