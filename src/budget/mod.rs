pub mod allocation;
pub mod export;
pub mod interval;
pub mod periods;
pub mod report;

pub use interval::RuleInterval;
pub use periods::Granularity;
pub use report::{
    add_rule, build_plan, build_report, default_range, delete_rule, list_rules, resolve_range,
    BudgetReport, NewBudgetRule,
};

pub(crate) fn to_cents(amount: f64) -> i64 {
    (amount * 100.0).round() as i64
}

pub(crate) fn from_cents(cents: i64) -> f64 {
    cents as f64 / 100.0
}
