use std::path::Path;

use rust_xlsxwriter::{Format, Workbook, Worksheet};

use super::report::{BudgetReport, Kpis};
use crate::error::Result;

const SUMMARY_HEADERS: &[&str] = &[
    "Period",
    "Start",
    "End",
    "Planned income",
    "Planned expense",
    "Actual income",
    "Actual expense",
    "Unbudgeted income",
    "Unbudgeted expense",
    "Total income",
    "Total expense",
    "Net",
    "Variance",
];

const RULE_HEADERS: &[&str] = &[
    "Period",
    "Rule",
    "Scope",
    "Interval",
    "Occurrences",
    "Planned",
    "Actual",
    "Variance",
    "Utilization %",
];

const UNBUDGETED_HEADERS: &[&str] = &["Period", "Date", "Posting", "Description", "Amount"];

fn write_headers(sheet: &mut Worksheet, headers: &[&str], bold: &Format) -> Result<()> {
    for (col, title) in headers.iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, *title, bold)?;
        sheet.set_column_width(col as u16, (title.len() as f64 + 4.0).max(12.0))?;
    }
    Ok(())
}

fn write_kpis(sheet: &mut Worksheet, row: u32, kpis: &Kpis, money: &Format) -> Result<()> {
    let values = [
        kpis.planned_income,
        kpis.planned_expense,
        kpis.actual_income,
        kpis.actual_expense,
        kpis.unbudgeted_income,
        kpis.unbudgeted_expense,
        kpis.total_income,
        kpis.total_expense,
        kpis.net,
        kpis.variance,
    ];
    for (i, value) in values.iter().enumerate() {
        sheet.write_number_with_format(row, 3 + i as u16, *value, money)?;
    }
    Ok(())
}

/// Write `report` as a workbook with Summary, Rules and Unbudgeted sheets.
pub fn export_xlsx(report: &BudgetReport, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let bold = Format::new().set_bold();
    let money = Format::new().set_num_format("#,##0.00");
    let percent = Format::new().set_num_format("0.0");
    let mut workbook = Workbook::new();

    let summary = workbook.add_worksheet().set_name("Summary")?;
    write_headers(summary, SUMMARY_HEADERS, &bold)?;
    let mut row = 1u32;
    for period in &report.periods {
        summary.write_string(row, 0, &period.period.label)?;
        summary.write_string(row, 1, period.period.start.format("%Y-%m-%d").to_string())?;
        summary.write_string(row, 2, period.period.end.format("%Y-%m-%d").to_string())?;
        write_kpis(summary, row, &period.kpis, &money)?;
        row += 1;
    }
    summary.write_string_with_format(row, 0, "Total", &bold)?;
    summary.write_string(row, 1, report.from.format("%Y-%m-%d").to_string())?;
    summary.write_string(row, 2, report.to.format("%Y-%m-%d").to_string())?;
    write_kpis(summary, row, &report.kpis, &money)?;

    let rules = workbook.add_worksheet().set_name("Rules")?;
    write_headers(rules, RULE_HEADERS, &bold)?;
    let mut row = 1u32;
    for period in &report.periods {
        for line in &period.rules {
            rules.write_string(row, 0, &period.period.label)?;
            rules.write_string(row, 1, &line.name)?;
            rules.write_string(row, 2, &line.scope)?;
            rules.write_string(row, 3, &line.interval)?;
            rules.write_number(row, 4, line.occurrences as f64)?;
            rules.write_number_with_format(row, 5, line.planned, &money)?;
            rules.write_number_with_format(row, 6, line.actual, &money)?;
            rules.write_number_with_format(row, 7, line.variance, &money)?;
            if let Some(u) = line.utilization {
                rules.write_number_with_format(row, 8, u, &percent)?;
            }
            row += 1;
        }
    }

    let unbudgeted = workbook.add_worksheet().set_name("Unbudgeted")?;
    write_headers(unbudgeted, UNBUDGETED_HEADERS, &bold)?;
    let mut row = 1u32;
    for period in &report.periods {
        for line in &period.unbudgeted {
            unbudgeted.write_string(row, 0, &period.period.label)?;
            unbudgeted.write_string(row, 1, line.date.format("%Y-%m-%d").to_string())?;
            unbudgeted.write_number(row, 2, line.posting_id as f64)?;
            unbudgeted.write_string(row, 3, &line.description)?;
            unbudgeted.write_number_with_format(row, 4, line.amount, &money)?;
            row += 1;
        }
    }

    workbook.save(path)?;
    tracing::info!(path = %path.display(), periods = report.periods.len(), "budget report exported");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::budget::periods::{Granularity, Period};
    use crate::budget::report::{PeriodReport, RuleLine, UnbudgetedLine};
    use calamine::{open_workbook, Data, Reader, Xlsx};
    use chrono::NaiveDate;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn sample_report() -> BudgetReport {
        let kpis = Kpis {
            planned_income: 3000.0,
            planned_expense: -850.0,
            actual_income: 3000.0,
            actual_expense: -850.0,
            unbudgeted_income: 0.0,
            unbudgeted_expense: -42.5,
            total_income: 3000.0,
            total_expense: -892.5,
            net: 2107.5,
            variance: 0.0,
        };
        BudgetReport {
            from: d("2025-01-01"),
            to: d("2025-01-31"),
            granularity: Granularity::Month,
            periods: vec![PeriodReport {
                period: Period {
                    label: "2025-01".into(),
                    start: d("2025-01-01"),
                    end: d("2025-01-31"),
                },
                rules: vec![RuleLine {
                    rule_id: 1,
                    name: "Rent".into(),
                    scope: "category: Rent".into(),
                    interval: "monthly".into(),
                    occurrences: 1,
                    planned: -850.0,
                    actual: -850.0,
                    variance: 0.0,
                    utilization: Some(100.0),
                }],
                unbudgeted: vec![UnbudgetedLine {
                    posting_id: 9,
                    date: d("2025-01-12"),
                    description: "Pharmacy".into(),
                    amount: -42.5,
                }],
                kpis: kpis.clone(),
            }],
            totals: Vec::new(),
            kpis,
        }
    }

    #[test]
    fn test_export_writes_three_sheets() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("budget.xlsx");
        export_xlsx(&sample_report(), &path).unwrap();
        assert!(path.exists());

        let mut workbook: Xlsx<_> = open_workbook(&path).unwrap();
        assert_eq!(workbook.sheet_names(), vec!["Summary", "Rules", "Unbudgeted"]);

        let summary = workbook.worksheet_range("Summary").unwrap();
        assert_eq!(summary.get_value((0, 0)), Some(&Data::String("Period".into())));
        assert_eq!(summary.get_value((1, 0)), Some(&Data::String("2025-01".into())));
        assert_eq!(summary.get_value((2, 0)), Some(&Data::String("Total".into())));
        assert_eq!(summary.get_value((2, 11)), Some(&Data::Float(2107.5)));

        let rules = workbook.worksheet_range("Rules").unwrap();
        assert_eq!(rules.get_value((1, 1)), Some(&Data::String("Rent".into())));
        assert_eq!(rules.get_value((1, 5)), Some(&Data::Float(-850.0)));

        let unbudgeted = workbook.worksheet_range("Unbudgeted").unwrap();
        assert_eq!(unbudgeted.get_value((1, 3)), Some(&Data::String("Pharmacy".into())));
        assert_eq!(unbudgeted.get_value((1, 4)), Some(&Data::Float(-42.5)));
    }
}
