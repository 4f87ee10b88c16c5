use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Months, NaiveDate};
use serde::Serialize;

use crate::error::{BookError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Month,
    Quarter,
    Year,
}

impl Granularity {
    fn months(&self) -> u32 {
        match self {
            Self::Month => 1,
            Self::Quarter => 3,
            Self::Year => 12,
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Month => "month",
            Self::Quarter => "quarter",
            Self::Year => "year",
        })
    }
}

impl FromStr for Granularity {
    type Err = BookError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "month" | "monthly" | "m" => Ok(Self::Month),
            "quarter" | "quarterly" | "q" => Ok(Self::Quarter),
            "year" | "yearly" | "y" => Ok(Self::Year),
            _ => Err(BookError::InvalidInput(format!(
                "unknown granularity '{s}' (use month, quarter or year)"
            ))),
        }
    }
}

/// One report bucket, both ends inclusive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Period {
    pub label: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl Period {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

/// First day of the calendar bucket containing `from`.
pub fn range_start(from: NaiveDate, granularity: Granularity) -> NaiveDate {
    let month = match granularity {
        Granularity::Month => from.month(),
        Granularity::Quarter => (from.month0() / 3) * 3 + 1,
        Granularity::Year => 1,
    };
    NaiveDate::from_ymd_opt(from.year(), month, 1).unwrap_or(from)
}

fn label(start: NaiveDate, granularity: Granularity) -> String {
    match granularity {
        Granularity::Month => start.format("%Y-%m").to_string(),
        Granularity::Quarter => format!("{}-Q{}", start.year(), start.month0() / 3 + 1),
        Granularity::Year => start.year().to_string(),
    }
}

pub fn build_periods(from: NaiveDate, to: NaiveDate, granularity: Granularity) -> Result<Vec<Period>> {
    if from > to {
        return Err(BookError::InvalidDate(format!("range start {from} is after range end {to}")));
    }
    let mut periods = Vec::new();
    let mut start = range_start(from, granularity);
    while start <= to {
        let next = start
            .checked_add_months(Months::new(granularity.months()))
            .ok_or_else(|| BookError::InvalidDate(format!("{start} is out of range")))?;
        let end = next.pred_opt().map_or(to, |last| last.min(to));
        periods.push(Period {
            label: label(start, granularity),
            start,
            end,
        });
        start = next;
    }
    Ok(periods)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_range_start() {
        assert_eq!(range_start(d("2025-05-17"), Granularity::Month), d("2025-05-01"));
        assert_eq!(range_start(d("2025-05-17"), Granularity::Quarter), d("2025-04-01"));
        assert_eq!(range_start(d("2025-12-31"), Granularity::Quarter), d("2025-10-01"));
        assert_eq!(range_start(d("2025-05-17"), Granularity::Year), d("2025-01-01"));
    }

    #[test]
    fn test_monthly_periods_clip_last_bucket() {
        let periods = build_periods(d("2025-01-10"), d("2025-03-15"), Granularity::Month).unwrap();
        let labels: Vec<&str> = periods.iter().map(|p| p.label.as_str()).collect();
        assert_eq!(labels, vec!["2025-01", "2025-02", "2025-03"]);
        assert_eq!(periods[0].start, d("2025-01-01"));
        assert_eq!(periods[1].end, d("2025-02-28"));
        assert_eq!(periods[2].end, d("2025-03-15"));
    }

    #[test]
    fn test_periods_are_contiguous() {
        let periods = build_periods(d("2024-11-05"), d("2026-02-01"), Granularity::Quarter).unwrap();
        assert_eq!(periods.first().unwrap().label, "2024-Q4");
        assert_eq!(periods.last().unwrap().label, "2026-Q1");
        for pair in periods.windows(2) {
            assert_eq!(pair[0].end.succ_opt().unwrap(), pair[1].start);
        }
    }

    #[test]
    fn test_single_day_range() {
        let periods = build_periods(d("2025-06-30"), d("2025-06-30"), Granularity::Year).unwrap();
        assert_eq!(periods.len(), 1);
        assert_eq!(periods[0].label, "2025");
        assert_eq!(periods[0].start, d("2025-01-01"));
        assert_eq!(periods[0].end, d("2025-06-30"));
    }

    #[test]
    fn test_inverted_range_is_rejected() {
        let err = build_periods(d("2025-02-01"), d("2025-01-01"), Granularity::Month).unwrap_err();
        assert!(matches!(err, BookError::InvalidDate(_)));
    }

    #[test]
    fn test_parse_granularity() {
        assert_eq!("Quarter".parse::<Granularity>().unwrap(), Granularity::Quarter);
        assert_eq!("y".parse::<Granularity>().unwrap(), Granularity::Year);
        assert!("week".parse::<Granularity>().is_err());
    }
}
