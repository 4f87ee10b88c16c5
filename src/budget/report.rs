use std::collections::HashMap;

use chrono::{Datelike, Months, NaiveDate};
use rusqlite::Connection;
use serde::Serialize;

use super::allocation::{allocate, Candidate, Occurrence, Scope};
use super::interval::{occurrences, RuleInterval};
use super::periods::{build_periods, Granularity, Period};
use super::{from_cents, to_cents};
use crate::categories::{resolve_category, resolve_purpose};
use crate::error::{parse_iso_date, BookError, Result};
use crate::settings::Settings;

// ---------------------------------------------------------------------------
// Budget rules
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct BudgetRule {
    pub id: i64,
    pub name: String,
    pub scope: Scope,
    pub scope_name: String,
    pub amount: f64,
    pub interval: RuleInterval,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub is_active: bool,
}

impl BudgetRule {
    pub fn scope_label(&self) -> String {
        match self.scope {
            Scope::Purpose(_) => format!("purpose: {}", self.scope_name),
            Scope::Category(_) => format!("category: {}", self.scope_name),
        }
    }
}

pub struct NewBudgetRule<'a> {
    pub name: &'a str,
    pub purpose: Option<&'a str>,
    pub category: Option<&'a str>,
    /// Signed: positive for planned income, negative for planned spending.
    pub amount: f64,
    pub interval: RuleInterval,
    pub start_date: &'a str,
    pub end_date: Option<&'a str>,
}

pub fn add_rule(conn: &Connection, rule: &NewBudgetRule) -> Result<i64> {
    if rule.purpose.is_some() == rule.category.is_some() {
        return Err(BookError::InvalidInput(
            "a budget rule needs exactly one of purpose or category".into(),
        ));
    }
    if to_cents(rule.amount) == 0 {
        return Err(BookError::InvalidInput("budget amount must not be zero".into()));
    }
    let start = parse_iso_date(rule.start_date)?;
    if let Some(end) = rule.end_date {
        if parse_iso_date(end)? < start {
            return Err(BookError::InvalidDate(format!(
                "end date {end} is before start date {}",
                rule.start_date
            )));
        }
    }
    let purpose_id = resolve_purpose(conn, rule.purpose)?;
    let category_id = resolve_category(conn, rule.category)?;

    conn.execute(
        "INSERT INTO budget_rules (name, purpose_id, category_id, amount, interval_months, start_date, end_date) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        rusqlite::params![
            rule.name,
            purpose_id,
            category_id,
            rule.amount,
            rule.interval.months(),
            rule.start_date,
            rule.end_date,
        ],
    )?;
    let id = conn.last_insert_rowid();
    tracing::debug!(id, name = rule.name, "budget rule added");
    Ok(id)
}

pub fn list_rules(conn: &Connection) -> Result<Vec<BudgetRule>> {
    let mut stmt = conn.prepare(
        "SELECT r.id, r.name, r.purpose_id, r.category_id, bp.name, c.name, r.amount, \
                r.interval_months, r.start_date, r.end_date, r.is_active \
         FROM budget_rules r \
         LEFT JOIN budget_purposes bp ON r.purpose_id = bp.id \
         LEFT JOIN categories c ON r.category_id = c.id \
         ORDER BY r.id",
    )?;
    #[allow(clippy::type_complexity)]
    let raw: Vec<(
        i64,
        String,
        Option<i64>,
        Option<i64>,
        Option<String>,
        Option<String>,
        f64,
        i64,
        String,
        Option<String>,
        bool,
    )> = stmt
        .query_map([], |row| {
            Ok((
                row.get(0)?,
                row.get(1)?,
                row.get(2)?,
                row.get(3)?,
                row.get(4)?,
                row.get(5)?,
                row.get(6)?,
                row.get(7)?,
                row.get(8)?,
                row.get(9)?,
                row.get(10)?,
            ))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut rules = Vec::with_capacity(raw.len());
    for (id, name, purpose_id, category_id, purpose, category, amount, months, start, end, active) in raw {
        let (scope, scope_name) = match (purpose_id, category_id) {
            (Some(pid), _) => (Scope::Purpose(pid), purpose.unwrap_or_default()),
            (None, Some(cid)) => (Scope::Category(cid), category.unwrap_or_default()),
            (None, None) => {
                return Err(BookError::Other(format!("budget rule {id} has no scope")));
            }
        };
        rules.push(BudgetRule {
            id,
            name,
            scope,
            scope_name,
            amount,
            interval: RuleInterval::from_months(months)?,
            start_date: parse_iso_date(&start)?,
            end_date: end.as_deref().map(parse_iso_date).transpose()?,
            is_active: active,
        });
    }
    Ok(rules)
}

pub fn delete_rule(conn: &Connection, id: i64) -> Result<()> {
    let deleted = conn.execute("DELETE FROM budget_rules WHERE id = ?1", [id])?;
    if deleted == 0 {
        return Err(BookError::NotFound { entity: "budget rule", id });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Report types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct RuleLine {
    pub rule_id: i64,
    pub name: String,
    pub scope: String,
    pub interval: String,
    pub occurrences: usize,
    pub planned: f64,
    pub actual: f64,
    pub variance: f64,
    pub utilization: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UnbudgetedLine {
    pub posting_id: i64,
    pub date: NaiveDate,
    pub description: String,
    pub amount: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Kpis {
    pub planned_income: f64,
    pub planned_expense: f64,
    pub actual_income: f64,
    pub actual_expense: f64,
    pub unbudgeted_income: f64,
    pub unbudgeted_expense: f64,
    pub total_income: f64,
    pub total_expense: f64,
    pub net: f64,
    pub variance: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PeriodReport {
    pub period: Period,
    pub rules: Vec<RuleLine>,
    pub unbudgeted: Vec<UnbudgetedLine>,
    pub kpis: Kpis,
}

#[derive(Debug, Clone, Serialize)]
pub struct BudgetReport {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub granularity: Granularity,
    pub periods: Vec<PeriodReport>,
    pub totals: Vec<RuleLine>,
    pub kpis: Kpis,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlanLine {
    pub rule_id: i64,
    pub name: String,
    pub scope: String,
    pub interval: String,
    pub occurrences: usize,
    pub planned: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlanPeriod {
    pub period: Period,
    pub lines: Vec<PlanLine>,
    pub planned_income: f64,
    pub planned_expense: f64,
    pub net: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct BudgetPlan {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub granularity: Granularity,
    pub periods: Vec<PlanPeriod>,
    pub totals: Vec<PlanLine>,
    pub planned_income: f64,
    pub planned_expense: f64,
    pub net: f64,
}

// Cent accumulators, converted to amounts only at the edges.

#[derive(Debug, Clone, Copy, Default)]
struct Tally {
    planned_income: i64,
    planned_expense: i64,
    actual_income: i64,
    actual_expense: i64,
    unbudgeted_income: i64,
    unbudgeted_expense: i64,
}

impl Tally {
    fn absorb(&mut self, other: &Tally) {
        self.planned_income += other.planned_income;
        self.planned_expense += other.planned_expense;
        self.actual_income += other.actual_income;
        self.actual_expense += other.actual_expense;
        self.unbudgeted_income += other.unbudgeted_income;
        self.unbudgeted_expense += other.unbudgeted_expense;
    }

    fn kpis(&self) -> Kpis {
        let total_income = self.actual_income + self.unbudgeted_income;
        let total_expense = self.actual_expense + self.unbudgeted_expense;
        Kpis {
            planned_income: from_cents(self.planned_income),
            planned_expense: from_cents(self.planned_expense),
            actual_income: from_cents(self.actual_income),
            actual_expense: from_cents(self.actual_expense),
            unbudgeted_income: from_cents(self.unbudgeted_income),
            unbudgeted_expense: from_cents(self.unbudgeted_expense),
            total_income: from_cents(total_income),
            total_expense: from_cents(total_expense),
            net: from_cents(total_income + total_expense),
            variance: from_cents(
                (self.actual_income + self.actual_expense)
                    - (self.planned_income + self.planned_expense),
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct LineTally {
    occurrences: usize,
    planned: i64,
    actual: i64,
}

impl LineTally {
    fn absorb(&mut self, other: &LineTally) {
        self.occurrences += other.occurrences;
        self.planned += other.planned;
        self.actual += other.actual;
    }

    fn rule_line(&self, rule: &BudgetRule) -> RuleLine {
        RuleLine {
            rule_id: rule.id,
            name: rule.name.clone(),
            scope: rule.scope_label(),
            interval: rule.interval.to_string(),
            occurrences: self.occurrences,
            planned: from_cents(self.planned),
            actual: from_cents(self.actual),
            variance: from_cents(self.actual - self.planned),
            utilization: (self.planned != 0)
                .then(|| self.actual as f64 * 100.0 / self.planned as f64),
        }
    }

    fn plan_line(&self, rule: &BudgetRule) -> PlanLine {
        PlanLine {
            rule_id: rule.id,
            name: rule.name.clone(),
            scope: rule.scope_label(),
            interval: rule.interval.to_string(),
            occurrences: self.occurrences,
            planned: from_cents(self.planned),
        }
    }
}

struct ReportPosting {
    candidate: Candidate,
    description: String,
}

fn active_rules(conn: &Connection) -> Result<Vec<BudgetRule>> {
    Ok(list_rules(conn)?.into_iter().filter(|r| r.is_active).collect())
}

/// Occurrences of every rule inside `period`, plus the index of the owning rule.
fn period_occurrences(rules: &[BudgetRule], period: &Period) -> (Vec<Occurrence>, Vec<usize>) {
    let mut occs = Vec::new();
    let mut owners = Vec::new();
    for (idx, rule) in rules.iter().enumerate() {
        for due in occurrences(rule.start_date, rule.end_date, rule.interval, period.start, period.end) {
            occs.push(Occurrence {
                rule_id: rule.id,
                scope: rule.scope,
                due,
                amount: to_cents(rule.amount),
            });
            owners.push(idx);
        }
    }
    (occs, owners)
}

/// Postings in `[from, to]`, leaving out anything filed under a transfer category.
fn load_postings(conn: &Connection, from: NaiveDate, to: NaiveDate) -> Result<Vec<ReportPosting>> {
    let mut stmt = conn.prepare(
        "SELECT p.id, p.booking_date, p.valuta_date, p.amount, p.purpose_id, p.category_id, p.description \
         FROM postings p \
         LEFT JOIN categories c ON p.category_id = c.id \
         WHERE p.booking_date >= ?1 AND p.booking_date <= ?2 \
           AND (c.category_type IS NULL OR c.category_type != 'transfer') \
         ORDER BY p.booking_date, p.id",
    )?;
    #[allow(clippy::type_complexity)]
    let raw: Vec<(i64, String, String, f64, Option<i64>, Option<i64>, String)> = stmt
        .query_map(
            [from.format("%Y-%m-%d").to_string(), to.format("%Y-%m-%d").to_string()],
            |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                    row.get(5)?,
                    row.get(6)?,
                ))
            },
        )?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    raw.into_iter()
        .map(|(id, booking, valuta, amount, purpose_id, category_id, description)| {
            Ok(ReportPosting {
                candidate: Candidate {
                    posting_id: id,
                    booking_date: parse_iso_date(&booking)?,
                    valuta_date: parse_iso_date(&valuta)?,
                    amount: to_cents(amount),
                    purpose_id,
                    category_id,
                },
                description,
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// build_report / build_plan
// ---------------------------------------------------------------------------

/// Planned against actual per period. Each period allocates its own
/// occurrences against its own postings.
pub fn build_report(
    conn: &Connection,
    from: NaiveDate,
    to: NaiveDate,
    granularity: Granularity,
) -> Result<BudgetReport> {
    let periods = build_periods(from, to, granularity)?;
    let rules = active_rules(conn)?;
    let range_from = periods.first().map_or(from, |p| p.start);
    let postings = load_postings(conn, range_from, to)?;
    let by_id: HashMap<i64, &ReportPosting> =
        postings.iter().map(|p| (p.candidate.posting_id, p)).collect();

    let mut total_lines = vec![LineTally::default(); rules.len()];
    let mut total = Tally::default();
    let mut period_reports = Vec::with_capacity(periods.len());

    for period in periods {
        let (occs, owners) = period_occurrences(&rules, &period);
        let candidates: Vec<Candidate> = postings
            .iter()
            .filter(|p| period.contains(p.candidate.booking_date))
            .map(|p| p.candidate.clone())
            .collect();
        let allocation = allocate(&occs, &candidates);

        let mut lines = vec![LineTally::default(); rules.len()];
        let mut tally = Tally::default();
        for (occ, &owner) in occs.iter().zip(&owners) {
            lines[owner].occurrences += 1;
            lines[owner].planned += occ.amount;
            if occ.amount > 0 {
                tally.planned_income += occ.amount;
            } else {
                tally.planned_expense += occ.amount;
            }
        }
        for m in &allocation.matches {
            lines[owners[m.occurrence]].actual += m.amount;
            if m.amount > 0 {
                tally.actual_income += m.amount;
            } else {
                tally.actual_expense += m.amount;
            }
        }
        let mut unbudgeted = Vec::with_capacity(allocation.unbudgeted.len());
        for u in &allocation.unbudgeted {
            if u.amount > 0 {
                tally.unbudgeted_income += u.amount;
            } else {
                tally.unbudgeted_expense += u.amount;
            }
            if let Some(p) = by_id.get(&u.posting_id) {
                unbudgeted.push(UnbudgetedLine {
                    posting_id: u.posting_id,
                    date: p.candidate.booking_date,
                    description: p.description.clone(),
                    amount: from_cents(u.amount),
                });
            }
        }

        let rule_lines = rules
            .iter()
            .zip(&lines)
            .filter(|(_, t)| t.occurrences > 0)
            .map(|(rule, t)| t.rule_line(rule))
            .collect();
        for (sum, t) in total_lines.iter_mut().zip(&lines) {
            sum.absorb(t);
        }
        total.absorb(&tally);
        period_reports.push(PeriodReport {
            period,
            rules: rule_lines,
            unbudgeted,
            kpis: tally.kpis(),
        });
    }

    let totals = rules
        .iter()
        .zip(&total_lines)
        .filter(|(_, t)| t.occurrences > 0)
        .map(|(rule, t)| t.rule_line(rule))
        .collect();

    tracing::info!(
        %from,
        %to,
        %granularity,
        periods = period_reports.len(),
        rules = rules.len(),
        postings = postings.len(),
        "budget report built"
    );
    Ok(BudgetReport {
        from: range_from,
        to,
        granularity,
        periods: period_reports,
        totals,
        kpis: total.kpis(),
    })
}

/// Planned amounts only, for looking ahead.
pub fn build_plan(
    conn: &Connection,
    from: NaiveDate,
    to: NaiveDate,
    granularity: Granularity,
) -> Result<BudgetPlan> {
    let periods = build_periods(from, to, granularity)?;
    let rules = active_rules(conn)?;
    let range_from = periods.first().map_or(from, |p| p.start);

    let mut total_lines = vec![LineTally::default(); rules.len()];
    let (mut income, mut expense) = (0i64, 0i64);
    let mut plan_periods = Vec::with_capacity(periods.len());

    for period in periods {
        let (occs, owners) = period_occurrences(&rules, &period);
        let mut lines = vec![LineTally::default(); rules.len()];
        let (mut p_income, mut p_expense) = (0i64, 0i64);
        for (occ, &owner) in occs.iter().zip(&owners) {
            lines[owner].occurrences += 1;
            lines[owner].planned += occ.amount;
            if occ.amount > 0 {
                p_income += occ.amount;
            } else {
                p_expense += occ.amount;
            }
        }
        for (sum, t) in total_lines.iter_mut().zip(&lines) {
            sum.absorb(t);
        }
        income += p_income;
        expense += p_expense;
        plan_periods.push(PlanPeriod {
            period,
            lines: rules
                .iter()
                .zip(&lines)
                .filter(|(_, t)| t.occurrences > 0)
                .map(|(rule, t)| t.plan_line(rule))
                .collect(),
            planned_income: from_cents(p_income),
            planned_expense: from_cents(p_expense),
            net: from_cents(p_income + p_expense),
        });
    }

    Ok(BudgetPlan {
        from: range_from,
        to,
        granularity,
        periods: plan_periods,
        totals: rules
            .iter()
            .zip(&total_lines)
            .filter(|(_, t)| t.occurrences > 0)
            .map(|(rule, t)| t.plan_line(rule))
            .collect(),
        planned_income: from_cents(income),
        planned_expense: from_cents(expense),
        net: from_cents(income + expense),
    })
}

/// The fiscal year containing `today`.
pub fn default_range(settings: &Settings, today: NaiveDate) -> (NaiveDate, NaiveDate) {
    let start_month = settings.fiscal_start_month();
    let year = if today.month() >= start_month {
        today.year()
    } else {
        today.year() - 1
    };
    let start = NaiveDate::from_ymd_opt(year, start_month, 1).unwrap_or(today);
    let end = start
        .checked_add_months(Months::new(12))
        .and_then(|next| next.pred_opt())
        .unwrap_or(today);
    (start, end)
}

/// Fill in missing report arguments from the fiscal year and the configured granularity.
pub fn resolve_range(
    settings: &Settings,
    from: Option<&str>,
    to: Option<&str>,
    granularity: Option<&str>,
    today: NaiveDate,
) -> Result<(NaiveDate, NaiveDate, Granularity)> {
    let (default_from, default_to) = default_range(settings, today);
    let from = from.map(parse_iso_date).transpose()?.unwrap_or(default_from);
    let to = to.map(parse_iso_date).transpose()?.unwrap_or(default_to);
    let granularity = granularity.unwrap_or(&settings.default_granularity).parse()?;
    Ok((from, to, granularity))
}
