//! Report rendering for external consumers
//!
//! JSON keeps the report's serialized shape with amounts as numbers. CSV has
//! two sections separated by a blank line: one row per service cost, then a
//! `SUMMARY` of per-service totals closed by a `TOTAL` row.

use orderbill_common::{BillingReport, OrderbillError, Result};
use rust_decimal::Decimal;

const LINE_ITEM_HEADER: [&str; 6] = [
    "order_id",
    "reference_number",
    "order_date",
    "service_id",
    "service_name",
    "amount",
];
const SUMMARY_HEADER: [&str; 3] = ["service_id", "service_name", "amount"];

/// Pretty-printed JSON
pub fn to_json(report: &BillingReport) -> Result<String> {
    Ok(serde_json::to_string_pretty(report)?)
}

/// Two-section CSV
pub fn to_csv(report: &BillingReport) -> Result<String> {
    let mut line_items = writer();
    line_items.write_record(LINE_ITEM_HEADER).map_err(export_err)?;
    for order in &report.orders {
        let order_date = order.order_date.to_string();
        for cost in &order.service_costs {
            line_items
                .write_record([
                    order.order_id.as_str(),
                    order.reference_number.as_deref().unwrap_or(""),
                    order_date.as_str(),
                    cost.service_id.as_str(),
                    cost.service_name.as_str(),
                    money(cost.amount).as_str(),
                ])
                .map_err(export_err)?;
        }
    }

    let mut summary = writer();
    summary.write_record(["SUMMARY"]).map_err(export_err)?;
    summary.write_record(SUMMARY_HEADER).map_err(export_err)?;
    for (service_id, total) in &report.service_totals {
        summary
            .write_record([
                service_id.as_str(),
                total.service_name.as_str(),
                money(total.amount).as_str(),
            ])
            .map_err(export_err)?;
    }
    summary
        .write_record(["TOTAL", "", money(report.total_amount).as_str()])
        .map_err(export_err)?;

    let mut out = finish(line_items)?;
    out.push('\n');
    out.push_str(&finish(summary)?);
    Ok(out)
}

fn writer() -> csv::Writer<Vec<u8>> {
    csv::WriterBuilder::new()
        .flexible(true)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new())
}

fn finish(writer: csv::Writer<Vec<u8>>) -> Result<String> {
    let bytes = writer
        .into_inner()
        .map_err(|e| OrderbillError::Export(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| OrderbillError::Export(e.to_string()))
}

fn money(amount: Decimal) -> String {
    format!("{:.2}", amount)
}

fn export_err(e: csv::Error) -> OrderbillError {
    OrderbillError::Export(format!("CSV write error: {}", e))
}
