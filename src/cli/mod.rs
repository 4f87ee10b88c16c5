pub mod accounts;
pub mod backup;
pub mod budget;
pub mod categories;
pub mod contacts;
pub mod demo;
pub mod drafts;
pub mod import;
pub mod init;
pub mod postings;
pub mod report;
pub mod rules;
pub mod savings;
pub mod securities;
#[cfg(feature = "server")]
pub mod serve;
pub mod status;

use clap::{Parser, Subcommand};
use rusqlite::Connection;

use crate::db::{db_path, get_connection};
use crate::error::{BookError, Result};

/// Open the configured database, refusing to create one implicitly.
pub(crate) fn open_db() -> Result<Connection> {
    let path = db_path();
    if !path.exists() {
        return Err(BookError::Other(format!(
            "database not found at {}. Run `pocketbook init` first",
            path.display()
        )));
    }
    get_connection(&path)
}

/// Resolve an optional ISO date argument, defaulting to today.
pub(crate) fn date_or_today(date: Option<String>) -> String {
    date.unwrap_or_else(|| chrono::Local::now().format("%Y-%m-%d").to_string())
}

#[derive(Parser)]
#[command(
    name = "pocketbook",
    version,
    about = "Personal finance: postings, statement drafting and budget planning."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Choose a data directory and initialize the database.
    Init {
        /// Path for pocketbook data (default: ~/Documents/pocketbook)
        #[arg(long = "data-dir")]
        data_dir: Option<String>,
    },
    /// Show the current database and summary statistics.
    Status,
    /// Manage accounts.
    Accounts {
        #[command(subcommand)]
        command: AccountsCommands,
    },
    /// Manage contacts (payees and payers).
    Contacts {
        #[command(subcommand)]
        command: ContactsCommands,
    },
    /// Manage categories.
    Categories {
        #[command(subcommand)]
        command: CategoriesCommands,
    },
    /// Manage budget purposes.
    Purposes {
        #[command(subcommand)]
        command: PurposesCommands,
    },
    /// Record and inspect booked postings.
    Postings {
        #[command(subcommand)]
        command: PostingsCommands,
    },
    /// Manage drafting rules.
    Rules {
        #[command(subcommand)]
        command: RulesCommands,
    },
    /// Import a bank statement (CSV or XLSX) as drafts.
    Import {
        /// Statement file
        file: String,
        /// Account the statement belongs to
        #[arg(long)]
        account: String,
        /// Importer key (generic_csv, semicolon_csv, xlsx)
        #[arg(long)]
        format: Option<String>,
    },
    /// Review, book or discard statement drafts.
    Drafts {
        #[command(subcommand)]
        command: DraftsCommands,
    },
    /// Budget rules, reports and plans.
    Budget {
        #[command(subcommand)]
        command: BudgetCommands,
    },
    /// Savings plans.
    Savings {
        #[command(subcommand)]
        command: SavingsCommands,
    },
    /// Securities, prices and holdings.
    Securities {
        #[command(subcommand)]
        command: SecuritiesCommands,
    },
    /// Account-level reports.
    Report {
        #[command(subcommand)]
        command: ReportCommands,
    },
    /// Write a zip backup of all data.
    Backup {
        /// Output path (default: <data_dir>/backups/pocketbook-YYYYMMDD-HHMMSS.zip)
        #[arg(long)]
        output: Option<String>,
    },
    /// Replace all data with the contents of a backup.
    Restore {
        /// Backup archive to restore
        file: String,
        /// Overwrite a database that already holds data
        #[arg(long)]
        force: bool,
    },
    /// Load sample data to explore pocketbook.
    Demo,
    /// Serve the JSON API and overview page.
    #[cfg(feature = "server")]
    Serve {
        /// Address to bind (default: server_bind setting)
        #[arg(long)]
        bind: Option<String>,
    },
    /// Print shell completions.
    Completions {
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand)]
pub enum AccountsCommands {
    /// Add a new account.
    Add {
        /// Account name, e.g. 'Giro'
        name: String,
        /// Account type: checking, savings, credit_card, depot, cash
        #[arg(long = "type")]
        account_type: String,
        #[arg(long)]
        institution: Option<String>,
        #[arg(long)]
        iban: Option<String>,
        /// Currency (default: currency setting)
        #[arg(long)]
        currency: Option<String>,
        #[arg(long = "opening-balance", default_value = "0", allow_hyphen_values = true)]
        opening_balance: f64,
    },
    /// List accounts with their balances.
    List {
        /// Include closed accounts
        #[arg(long)]
        all: bool,
    },
    /// Close an account.
    Close { name: String },
}

#[derive(Subcommand)]
pub enum ContactsCommands {
    /// Add a contact.
    Add {
        name: String,
        #[arg(long)]
        iban: Option<String>,
        /// Category assigned to drafts from this contact
        #[arg(long)]
        category: Option<String>,
        /// Purpose assigned to drafts from this contact
        #[arg(long)]
        purpose: Option<String>,
        #[arg(long)]
        notes: Option<String>,
    },
    /// List contacts.
    List,
}

#[derive(Subcommand)]
pub enum CategoriesCommands {
    /// Add a category.
    Add {
        name: String,
        /// Category type: income, expense, transfer
        #[arg(long = "type")]
        category_type: String,
        #[arg(long)]
        description: Option<String>,
    },
    /// List categories.
    List,
}

#[derive(Subcommand)]
pub enum PurposesCommands {
    /// Add a purpose.
    Add {
        name: String,
        #[arg(long)]
        description: Option<String>,
    },
    /// List purposes.
    List,
}

#[derive(Subcommand)]
pub enum PostingsCommands {
    /// Record a posting by hand.
    Add {
        #[arg(long)]
        account: String,
        /// Signed amount: negative for money going out
        #[arg(long, allow_hyphen_values = true)]
        amount: f64,
        #[arg(long)]
        description: String,
        /// Booking date: YYYY-MM-DD (default: today)
        #[arg(long)]
        date: Option<String>,
        /// Valuta date: YYYY-MM-DD (default: booking date)
        #[arg(long)]
        valuta: Option<String>,
        #[arg(long)]
        contact: Option<String>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        purpose: Option<String>,
        /// Savings plan this posting contributes to
        #[arg(long = "savings-plan")]
        savings_plan: Option<String>,
        /// Security name or ISIN
        #[arg(long)]
        security: Option<String>,
        #[arg(long, allow_hyphen_values = true)]
        quantity: Option<f64>,
    },
    /// List postings.
    List {
        /// Start date: YYYY-MM-DD
        #[arg(long = "from")]
        from_date: Option<String>,
        /// End date: YYYY-MM-DD
        #[arg(long = "to")]
        to_date: Option<String>,
        #[arg(long)]
        account: Option<String>,
    },
    /// Change the contact, category, purpose or savings plan of a posting.
    Assign {
        id: i64,
        #[arg(long)]
        contact: Option<String>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        purpose: Option<String>,
        #[arg(long = "savings-plan")]
        savings_plan: Option<String>,
    },
    /// Delete a posting. A booked draft goes back to open.
    Delete { id: i64 },
}

#[derive(Subcommand)]
pub enum RulesCommands {
    /// Add a drafting rule.
    Add {
        /// Text, prefix, regex or IBAN to match
        pattern: String,
        /// Match type: contains, starts_with, regex, iban
        #[arg(long = "match-type", default_value = "contains")]
        match_type: String,
        #[arg(long)]
        contact: Option<String>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        purpose: Option<String>,
        /// Rule priority (higher wins)
        #[arg(long, default_value = "0", allow_hyphen_values = true)]
        priority: i64,
    },
    /// List drafting rules.
    List,
    /// Delete a rule by ID.
    Delete { id: i64 },
}

#[derive(Subcommand)]
pub enum DraftsCommands {
    /// List drafts.
    List {
        /// Status filter: open, booked, discarded (default: open)
        #[arg(long, default_value = "open")]
        status: String,
    },
    /// Re-run drafting rules on open drafts.
    Apply,
    /// Book drafts into postings.
    Book {
        /// Draft IDs (default: every open draft)
        ids: Vec<i64>,
    },
    /// Discard a draft.
    Discard { id: i64 },
    /// Assign contact, category or purpose to a draft.
    Edit {
        id: i64,
        #[arg(long)]
        contact: Option<String>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        purpose: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum BudgetCommands {
    /// Add a recurring budget rule.
    AddRule {
        name: String,
        /// Signed amount: positive for income, negative for spending
        #[arg(long, allow_hyphen_values = true)]
        amount: f64,
        #[arg(long)]
        purpose: Option<String>,
        #[arg(long)]
        category: Option<String>,
        /// monthly, quarterly, yearly or a number of months
        #[arg(long, default_value = "monthly")]
        interval: String,
        /// First due date: YYYY-MM-DD
        #[arg(long)]
        start: String,
        /// Last possible due date: YYYY-MM-DD
        #[arg(long)]
        end: Option<String>,
    },
    /// List budget rules.
    Rules,
    /// Delete a budget rule.
    DeleteRule { id: i64 },
    /// Planned against actual, bucketed by period.
    Report {
        /// Start date: YYYY-MM-DD (default: start of fiscal year)
        #[arg(long = "from")]
        from_date: Option<String>,
        /// End date: YYYY-MM-DD (default: end of fiscal year)
        #[arg(long = "to")]
        to_date: Option<String>,
        /// month, quarter or year (default: default_granularity setting)
        #[arg(long)]
        granularity: Option<String>,
        /// Also write the report to an .xlsx file
        #[arg(long)]
        export: Option<String>,
    },
    /// Planned amounts only, per period.
    Plan {
        #[arg(long = "from")]
        from_date: Option<String>,
        #[arg(long = "to")]
        to_date: Option<String>,
        #[arg(long)]
        granularity: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum SavingsCommands {
    /// Add a savings plan.
    Add {
        name: String,
        /// Account the savings accumulate in
        #[arg(long)]
        account: String,
        #[arg(long)]
        target: f64,
        #[arg(long, default_value = "0")]
        monthly: f64,
        /// Start date: YYYY-MM-DD (default: today)
        #[arg(long)]
        start: Option<String>,
        /// Target date: YYYY-MM-DD
        #[arg(long = "target-date")]
        target_date: Option<String>,
    },
    /// Show progress of every savings plan.
    List,
}

#[derive(Subcommand)]
pub enum SecuritiesCommands {
    /// Add a security.
    Add {
        name: String,
        #[arg(long)]
        isin: String,
        #[arg(long)]
        symbol: Option<String>,
        /// Currency (default: currency setting)
        #[arg(long)]
        currency: Option<String>,
    },
    /// List securities.
    List,
    /// Record a price for a security.
    Price {
        /// Security name or ISIN
        security: String,
        price: f64,
        /// Price date: YYYY-MM-DD (default: today)
        #[arg(long)]
        date: Option<String>,
    },
    /// Current holdings with market value.
    Holdings,
}

#[derive(Subcommand)]
pub enum ReportCommands {
    /// Balance per account.
    Balance,
    /// Monthly inflows and outflows.
    Cashflow {
        /// Start date: YYYY-MM-DD (default: start of fiscal year)
        #[arg(long = "from")]
        from_date: Option<String>,
        /// End date: YYYY-MM-DD (default: end of fiscal year)
        #[arg(long = "to")]
        to_date: Option<String>,
    },
    /// Posting register with total.
    Register {
        #[arg(long = "from")]
        from_date: Option<String>,
        #[arg(long = "to")]
        to_date: Option<String>,
        #[arg(long)]
        account: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parses_negative_amounts() {
        let cli = Cli::try_parse_from([
            "pocketbook", "budget", "add-rule", "Rent", "--amount", "-950", "--category", "Rent",
            "--start", "2025-01-01",
        ])
        .unwrap();
        match cli.command {
            Commands::Budget {
                command: BudgetCommands::AddRule { amount, interval, .. },
            } => {
                assert_eq!(amount, -950.0);
                assert_eq!(interval, "monthly");
            }
            _ => panic!("wrong command"),
        }
    }
}
