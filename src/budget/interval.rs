use std::fmt;
use std::str::FromStr;

use chrono::{Months, NaiveDate};
use serde::Serialize;

use crate::error::{BookError, Result};

/// How often a budget rule recurs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RuleInterval {
    Monthly,
    Quarterly,
    Yearly,
    EveryMonths(u32),
}

impl RuleInterval {
    /// Map the stored `interval_months` column back onto an interval.
    pub fn from_months(months: i64) -> Result<Self> {
        match months {
            1 => Ok(Self::Monthly),
            3 => Ok(Self::Quarterly),
            12 => Ok(Self::Yearly),
            n if n >= 1 && n <= u32::MAX as i64 => Ok(Self::EveryMonths(n as u32)),
            n => Err(BookError::InvalidInput(format!("interval must be at least one month, got {n}"))),
        }
    }

    pub fn months(&self) -> u32 {
        match self {
            Self::Monthly => 1,
            Self::Quarterly => 3,
            Self::Yearly => 12,
            Self::EveryMonths(n) => *n,
        }
    }
}

impl fmt::Display for RuleInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Monthly => write!(f, "monthly"),
            Self::Quarterly => write!(f, "quarterly"),
            Self::Yearly => write!(f, "yearly"),
            Self::EveryMonths(n) => write!(f, "every {n} months"),
        }
    }
}

impl FromStr for RuleInterval {
    type Err = BookError;

    /// Accepts `monthly`, `quarterly`, `yearly` or a month count such as `2`.
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "monthly" | "month" => Ok(Self::Monthly),
            "quarterly" | "quarter" => Ok(Self::Quarterly),
            "yearly" | "year" | "annual" => Ok(Self::Yearly),
            other => {
                let n: i64 = other.parse().map_err(|_| {
                    BookError::InvalidInput(format!(
                        "unknown interval '{s}' (use monthly, quarterly, yearly or a month count)"
                    ))
                })?;
                Self::from_months(n)
            }
        }
    }
}

/// Due dates of a rule that fall inside `[from, to]`.
///
/// Each occurrence is computed from `start` directly, so a rule starting on
/// the 31st lands on the last day of shorter months without drifting.
pub fn occurrences(
    start: NaiveDate,
    end: Option<NaiveDate>,
    interval: RuleInterval,
    from: NaiveDate,
    to: NaiveDate,
) -> Vec<NaiveDate> {
    let limit = end.map_or(to, |e| e.min(to));
    let step = interval.months();
    let mut dates = Vec::new();
    let mut k: u32 = 0;
    loop {
        let Some(months) = k.checked_mul(step) else { break };
        let Some(due) = start.checked_add_months(Months::new(months)) else {
            break;
        };
        if due > limit {
            break;
        }
        if due >= from {
            dates.push(due);
        }
        k += 1;
    }
    dates
}
