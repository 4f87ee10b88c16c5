use axum::extract::State;
use axum::response::Html;

use super::routes::{report_params, with_conn, ReportQuery};
use super::{ApiError, AppState};
use crate::budget::{self, BudgetReport};
use crate::fmt::{money, percent};
use crate::reports::BalanceReport;

fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

pub fn base_html(title: &str, content: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{} - Pocketbook</title>
    <style>
        body {{ font-family: system-ui, sans-serif; margin: 2rem; color: #1f2937; }}
        table {{ border-collapse: collapse; margin-bottom: 2rem; }}
        th, td {{ padding: 0.3rem 0.8rem; border-bottom: 1px solid #e5e7eb; }}
        td.num {{ text-align: right; font-variant-numeric: tabular-nums; }}
        .neg {{ color: #b91c1c; }}
    </style>
</head>
<body>
    {}
</body>
</html>"#,
        escape(title),
        content
    )
}

fn amount_cell(value: f64) -> String {
    let class = if value < 0.0 { "num neg" } else { "num" };
    format!("<td class='{class}'>{}</td>", money(value))
}

fn render(report: &BudgetReport, balances: &BalanceReport, currency: &str) -> String {
    let mut html = format!(
        "<h1>Budget {} to {}</h1><p>Amounts in {}</p>",
        report.from,
        report.to,
        escape(currency)
    );

    html.push_str("<h2>Accounts</h2><table><tr><th>Account</th><th>Type</th><th>Balance</th></tr>");
    for a in &balances.accounts {
        html.push_str(&format!(
            "<tr><td>{}</td><td>{}</td>{}</tr>",
            escape(&a.name),
            escape(&a.account_type),
            amount_cell(a.balance)
        ));
    }
    html.push_str(&format!("<tr><th colspan='2'>Total</th>{}</tr></table>", amount_cell(balances.total)));

    html.push_str(
        "<h2>Periods</h2><table><tr><th>Period</th><th>Planned income</th><th>Planned expense</th>\
         <th>Total income</th><th>Total expense</th><th>Net</th><th>Variance</th></tr>",
    );
    for p in &report.periods {
        html.push_str(&format!(
            "<tr><td>{}</td>{}{}{}{}{}{}</tr>",
            escape(&p.period.label),
            amount_cell(p.kpis.planned_income),
            amount_cell(p.kpis.planned_expense),
            amount_cell(p.kpis.total_income),
            amount_cell(p.kpis.total_expense),
            amount_cell(p.kpis.net),
            amount_cell(p.kpis.variance),
        ));
    }
    html.push_str("</table>");

    html.push_str(
        "<h2>Rules</h2><table><tr><th>Rule</th><th>Scope</th><th>Planned</th><th>Actual</th>\
         <th>Variance</th><th>Used</th></tr>",
    );
    for line in &report.totals {
        html.push_str(&format!(
            "<tr><td>{}</td><td>{}</td>{}{}{}<td class='num'>{}</td></tr>",
            escape(&line.name),
            escape(&line.scope),
            amount_cell(line.planned),
            amount_cell(line.actual),
            amount_cell(line.variance),
            percent(line.utilization),
        ));
    }
    html.push_str("</table>");
    html
}

/// Server-rendered overview of the current budget report.
pub async fn index_page(State(state): State<AppState>) -> Result<Html<String>, ApiError> {
    let today = chrono::Local::now().date_naive();
    let (from, to, granularity) = report_params(&state, &ReportQuery::default(), today)?;
    let (report, balances) = with_conn(&state, move |conn| {
        Ok((
            budget::build_report(conn, from, to, granularity)?,
            crate::reports::get_balance(conn)?,
        ))
    })
    .await?;
    let body = render(&report, &balances, &state.settings.currency);
    Ok(Html(base_html("Overview", &body)))
}
