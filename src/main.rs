mod accounts;
mod backup;
mod budget;
mod categories;
mod cli;
mod contacts;
mod db;
mod drafting;
mod error;
mod fmt;
mod importer;
mod models;
mod postings;
mod reports;
mod savings;
#[cfg(feature = "server")]
mod server;
mod securities;
mod settings;

use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use cli::{
    AccountsCommands, BudgetCommands, CategoriesCommands, Cli, Commands, ContactsCommands,
    DraftsCommands, PostingsCommands, PurposesCommands, ReportCommands, RulesCommands,
    SavingsCommands, SecuritiesCommands,
};
use drafting::{DraftEdit, NewMatchRule};
use models::NewPosting;
use postings::Assignment;

fn init_logging() {
    let filter = EnvFilter::try_from_env("POCKETBOOK_LOG")
        .or_else(|_| EnvFilter::try_new(settings::load_settings().log_filter))
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging();

    let result = match cli.command {
        Commands::Init { data_dir } => cli::init::run(data_dir),
        Commands::Status => cli::status::run(),
        Commands::Accounts { command } => match command {
            AccountsCommands::Add {
                name,
                account_type,
                institution,
                iban,
                currency,
                opening_balance,
            } => cli::accounts::add(
                &name,
                &account_type,
                institution.as_deref(),
                iban.as_deref(),
                currency.as_deref(),
                opening_balance,
            ),
            AccountsCommands::List { all } => cli::accounts::list(all),
            AccountsCommands::Close { name } => cli::accounts::close(&name),
        },
        Commands::Contacts { command } => match command {
            ContactsCommands::Add {
                name,
                iban,
                category,
                purpose,
                notes,
            } => cli::contacts::add(
                &name,
                iban.as_deref(),
                category.as_deref(),
                purpose.as_deref(),
                notes.as_deref(),
            ),
            ContactsCommands::List => cli::contacts::list(),
        },
        Commands::Categories { command } => match command {
            CategoriesCommands::Add {
                name,
                category_type,
                description,
            } => cli::categories::add(&name, &category_type, description.as_deref()),
            CategoriesCommands::List => cli::categories::list(),
        },
        Commands::Purposes { command } => match command {
            PurposesCommands::Add { name, description } => {
                cli::categories::add_purpose(&name, description.as_deref())
            }
            PurposesCommands::List => cli::categories::list_purposes(),
        },
        Commands::Postings { command } => match command {
            PostingsCommands::Add {
                account,
                amount,
                description,
                date,
                valuta,
                contact,
                category,
                purpose,
                savings_plan,
                security,
                quantity,
            } => cli::postings::add(&NewPosting {
                account,
                booking_date: cli::date_or_today(date),
                valuta_date: valuta,
                amount,
                description,
                contact,
                category,
                purpose,
                savings_plan,
                security,
                quantity,
            }),
            PostingsCommands::List {
                from_date,
                to_date,
                account,
            } => cli::postings::list(from_date, to_date, account),
            PostingsCommands::Assign {
                id,
                contact,
                category,
                purpose,
                savings_plan,
            } => cli::postings::assign(
                id,
                &Assignment {
                    contact: contact.as_deref(),
                    category: category.as_deref(),
                    purpose: purpose.as_deref(),
                    savings_plan: savings_plan.as_deref(),
                },
            ),
            PostingsCommands::Delete { id } => cli::postings::delete(id),
        },
        Commands::Rules { command } => match command {
            RulesCommands::Add {
                pattern,
                match_type,
                contact,
                category,
                purpose,
                priority,
            } => cli::rules::add(&NewMatchRule {
                pattern: &pattern,
                match_type: &match_type,
                contact: contact.as_deref(),
                category: category.as_deref(),
                purpose: purpose.as_deref(),
                priority,
            }),
            RulesCommands::List => cli::rules::list(),
            RulesCommands::Delete { id } => cli::rules::delete(id),
        },
        Commands::Import {
            file,
            account,
            format,
        } => cli::import::run(&file, &account, format.as_deref()),
        Commands::Drafts { command } => match command {
            DraftsCommands::List { status } => cli::drafts::list(&status),
            DraftsCommands::Apply => cli::drafts::apply(),
            DraftsCommands::Book { ids } => cli::drafts::book(&ids),
            DraftsCommands::Discard { id } => cli::drafts::discard(id),
            DraftsCommands::Edit {
                id,
                contact,
                category,
                purpose,
            } => cli::drafts::edit(
                id,
                &DraftEdit {
                    contact: contact.as_deref(),
                    category: category.as_deref(),
                    purpose: purpose.as_deref(),
                },
            ),
        },
        Commands::Budget { command } => match command {
            BudgetCommands::AddRule {
                name,
                amount,
                purpose,
                category,
                interval,
                start,
                end,
            } => cli::budget::add_rule(
                &name,
                amount,
                purpose.as_deref(),
                category.as_deref(),
                &interval,
                &start,
                end.as_deref(),
            ),
            BudgetCommands::Rules => cli::budget::rules(),
            BudgetCommands::DeleteRule { id } => cli::budget::delete_rule(id),
            BudgetCommands::Report {
                from_date,
                to_date,
                granularity,
                export,
            } => cli::budget::report(from_date, to_date, granularity, export),
            BudgetCommands::Plan {
                from_date,
                to_date,
                granularity,
            } => cli::budget::plan(from_date, to_date, granularity),
        },
        Commands::Savings { command } => match command {
            SavingsCommands::Add {
                name,
                account,
                target,
                monthly,
                start,
                target_date,
            } => cli::savings::add(&name, &account, target, monthly, start, target_date.as_deref()),
            SavingsCommands::List => cli::savings::list(),
        },
        Commands::Securities { command } => match command {
            SecuritiesCommands::Add {
                name,
                isin,
                symbol,
                currency,
            } => cli::securities::add(&name, &isin, symbol.as_deref(), currency.as_deref()),
            SecuritiesCommands::List => cli::securities::list(),
            SecuritiesCommands::Price {
                security,
                price,
                date,
            } => cli::securities::price(&security, price, date),
            SecuritiesCommands::Holdings => cli::securities::holdings(),
        },
        Commands::Report { command } => match command {
            ReportCommands::Balance => cli::report::balance(),
            ReportCommands::Cashflow { from_date, to_date } => cli::report::cashflow(from_date, to_date),
            ReportCommands::Register {
                from_date,
                to_date,
                account,
            } => cli::report::register(from_date, to_date, account),
        },
        Commands::Backup { output } => cli::backup::run(output),
        Commands::Restore { file, force } => cli::backup::restore(&file, force),
        Commands::Demo => cli::demo::run(),
        #[cfg(feature = "server")]
        Commands::Serve { bind } => cli::serve::run(bind),
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "pocketbook", &mut std::io::stdout());
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
