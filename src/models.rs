use serde::{Deserialize, Serialize};

pub const ACCOUNT_TYPES: &[&str] = &["checking", "savings", "credit_card", "depot", "cash"];

#[derive(Debug, Clone, Serialize)]
pub struct Account {
    pub id: i64,
    pub name: String,
    pub account_type: String,
    pub institution: Option<String>,
    pub iban: Option<String>,
    pub currency: String,
    pub opening_balance: f64,
    pub is_active: bool,
    pub balance: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Contact {
    pub id: i64,
    pub name: String,
    pub iban: Option<String>,
    pub default_category: Option<String>,
    pub default_purpose: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub category_type: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Purpose {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
}

/// A posting joined with the names of everything it points at.
#[derive(Debug, Clone, Serialize)]
pub struct Posting {
    pub id: i64,
    pub account: String,
    pub booking_date: String,
    pub valuta_date: String,
    pub amount: f64,
    pub description: String,
    pub contact: Option<String>,
    pub category: Option<String>,
    pub purpose: Option<String>,
    pub savings_plan: Option<String>,
    pub security: Option<String>,
    pub quantity: Option<f64>,
}

/// Input for a new posting. References are resolved by name.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewPosting {
    pub account: String,
    pub booking_date: String,
    #[serde(default)]
    pub valuta_date: Option<String>,
    pub amount: f64,
    pub description: String,
    #[serde(default)]
    pub contact: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub purpose: Option<String>,
    #[serde(default)]
    pub savings_plan: Option<String>,
    #[serde(default)]
    pub security: Option<String>,
    #[serde(default)]
    pub quantity: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatementDraft {
    pub id: i64,
    pub account: String,
    pub booking_date: String,
    pub valuta_date: String,
    pub amount: f64,
    pub description: String,
    pub counterparty: Option<String>,
    pub counterparty_iban: Option<String>,
    pub contact: Option<String>,
    pub category: Option<String>,
    pub purpose: Option<String>,
    pub status: String,
    pub posting_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MatchRule {
    pub id: i64,
    pub pattern: String,
    pub match_type: String,
    pub contact: Option<String>,
    pub category: Option<String>,
    pub purpose: Option<String>,
    pub priority: i64,
    pub hit_count: i64,
}

/// Intermediate representation from a statement parser before drafting.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedRow {
    pub booking_date: String,
    pub valuta_date: String,
    pub description: String,
    pub amount: f64,
    pub counterparty: Option<String>,
    pub counterparty_iban: Option<String>,
}
