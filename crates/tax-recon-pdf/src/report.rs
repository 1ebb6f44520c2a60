//! The reconciliation report document.

use crate::layout::{Color, Composer, Document, Font, Table};
use chrono::NaiveDateTime;
use tax_recon::reconcile::analysis::{
    DiffStats, MagnitudeSplit, Totals, key_findings, missing_by_date, mismatches_by_size,
    payment_breakdown, recommendations,
};
use tax_recon::reconcile::{ReconcileState, Reconciliation};
use tax_recon::{DateTime, TargetMonth, format_money, format_signed_money};

const RECORD_WIDTHS: [f32; 7] = [10.0, 34.0, 30.0, 22.0, 28.0, 28.0, 22.0];
const TAX_WIDTHS: [f32; 8] = [10.0, 32.0, 28.0, 20.0, 16.0, 16.0, 26.0, 26.0];
const DIFF_WIDTHS: [f32; 7] = [10.0, 34.0, 26.0, 26.0, 26.0, 26.0, 26.0];
const METRIC_WIDTHS: [f32; 2] = [100.0, 60.0];

/// Title page details shared by every generated document.
#[derive(Debug, Clone)]
pub struct ReportInfo {
    pub title: String,
    pub generated: NaiveDateTime,
}

impl ReportInfo {
    pub fn new(title: impl Into<String>, generated: NaiveDateTime) -> Self {
        ReportInfo {
            title: title.into(),
            generated,
        }
    }
}

pub(crate) fn format_date(date: Option<DateTime>) -> String {
    match date {
        Some(date) => date.format("%Y-%m-%d %H:%M").to_string(),
        None => "N/A".into(),
    }
}

pub(crate) fn title_page(
    composer: &mut Composer,
    info: &ReportInfo,
    subtitle: &str,
    month: TargetMonth,
    purpose: &str,
) {
    composer.skip_to(70.0);
    composer.centered(&info.title, 24.0, Font::Bold, Color::DARK_BLUE);
    composer.spacer(12.0);
    composer.centered(subtitle, 16.0, Font::Regular, Color::GREY);
    composer.centered(&month.long_name(), 16.0, Font::Regular, Color::GREY);
    composer.spacer(25.0);
    let generated = info.generated.format("%B %d, %Y at %I:%M %p");
    composer.centered(
        &format!("Report Generated: {generated}"),
        12.0,
        Font::Regular,
        Color::BLACK,
    );
    composer.centered(
        &format!("Analysis Period: {}", month.long_name()),
        12.0,
        Font::Regular,
        Color::BLACK,
    );
    composer.centered(
        &format!("Purpose: {purpose}"),
        12.0,
        Font::Regular,
        Color::BLACK,
    );
    composer.page_break();
}

fn metric_table(header_fill: Color, value_header: &str, rows: Vec<(&str, String)>) -> Table {
    let mut table = Table::new(["Metric", value_header], &METRIC_WIDTHS)
        .header_fill(header_fill)
        .body_fill(Color::BEIGE)
        .font_size(10.0);
    for (metric, value) in rows {
        table.push_row(vec![metric.to_owned(), value]);
    }
    table
}

/// Lay out the full reconciliation report for one month.
pub fn reconciliation_document(
    state: &ReconcileState,
    result: &Reconciliation,
    info: &ReportInfo,
) -> Document {
    let totals = Totals::new(state, result);
    let mut composer = Composer::new(info.title.clone());

    title_page(
        &mut composer,
        info,
        "Transaction vs Tax Report Analysis",
        state.month,
        "Identify missing records and amount mismatches",
    );
    executive_summary(&mut composer, &totals);
    tallies(&mut composer, &totals);
    missing_records(&mut composer, result, &totals);
    amount_differences(&mut composer, result);
    all_transactions(&mut composer, state);
    all_tax_records(&mut composer, state);
    recommendations_section(&mut composer, result);

    composer.finish()
}

fn executive_summary(composer: &mut Composer, totals: &Totals) {
    composer.heading("EXECUTIVE SUMMARY", Color::DARK_BLUE);
    composer.table(&metric_table(
        Color::DARK_BLUE,
        "Value",
        vec![
            ("Transaction Report Total", format_money(totals.transaction_total)),
            ("Tax Report Total", format_money(totals.tax_total)),
            ("Total Difference", format_money(totals.difference())),
            ("", String::new()),
            ("Missing Records", format!("{} orders", totals.missing)),
            ("Missing Amount", format_money(totals.missing_amount)),
            ("Amount Differences", format!("{} orders", totals.mismatches)),
            ("Difference Amount", format_money(totals.discrepancy)),
            ("", String::new()),
            (
                "Total Orders (Transaction)",
                totals.transaction_orders.to_string(),
            ),
            ("Total Orders (Tax)", totals.tax_records.to_string()),
            ("Matching Orders", totals.matched.to_string()),
        ],
    ));
    composer.page_break();
}

fn tallies(composer: &mut Composer, totals: &Totals) {
    composer.heading("OVERALL TALLY", Color::DARK_BLUE);
    composer.table(&metric_table(
        Color::DARK_BLUE,
        "Value",
        vec![
            (
                "Total rows in transaction report",
                totals.transaction_rows.to_string(),
            ),
            (
                "Total orders in transaction report",
                totals.transaction_orders.to_string(),
            ),
            ("Total records in tax report", totals.tax_records.to_string()),
            ("Total matching records", totals.matched.to_string()),
            ("Records missing in tax report", totals.missing.to_string()),
            (
                "Records with amount differences",
                totals.mismatches.to_string(),
            ),
            ("Records only in tax report", totals.only_in_tax.to_string()),
        ],
    ));

    composer.heading("AMOUNT TALLY", Color::DARK_GREEN);
    composer.table(&metric_table(
        Color::DARK_GREEN,
        "Amount",
        vec![
            ("Total transaction amount", format_money(totals.transaction_total)),
            ("Total tax report amount", format_money(totals.tax_total)),
            ("Difference (Trans - Tax)", format_money(totals.difference())),
            (
                "Total missing transaction value",
                format_money(totals.missing_amount),
            ),
            ("Total amount discrepancy", format_money(totals.discrepancy)),
        ],
    ));
    composer.page_break();
}

fn missing_records(composer: &mut Composer, result: &Reconciliation, totals: &Totals) {
    composer.heading("MISSING RECORDS DETAILED ANALYSIS", Color::DARK_RED);
    composer.line(&format!("Total Missing Records: {}", totals.missing));
    composer.line(&format!(
        "Total Missing Amount: {}",
        format_money(totals.missing_amount)
    ));

    if result.missing_in_tax.is_empty() {
        composer.spacer(4.0);
        composer.line("No missing records found!");
        composer.page_break();
        return;
    }

    composer.subheading("MISSING RECORDS SUMMARY TABLE");
    let mut table = Table::new(
        [
            "#",
            "Order ID",
            "Date",
            "Amount",
            "Location",
            "Payment Type",
            "Gateway",
        ],
        &RECORD_WIDTHS,
    )
    .header_fill(Color::DARK_RED);
    for (index, order) in missing_by_date(result).into_iter().enumerate() {
        table.push_row(vec![
            (index + 1).to_string(),
            order.order_id.clone(),
            format_date(order.date),
            format_money(order.amount),
            order.location.clone(),
            order.payment_type.clone(),
            order.payment_gateway.clone(),
        ]);
    }
    composer.paginated_table("MISSING RECORDS", &table);

    composer.subheading("ANALYSIS BY PAYMENT TYPE");
    let mut breakdown = Table::new(["Payment Type", "Count", "Total Amount"], &[60.0, 30.0, 50.0])
        .header_fill(Color::DARK_RED)
        .font_size(9.0);
    for entry in payment_breakdown(&result.missing_in_tax) {
        breakdown.push_row(vec![
            entry.payment_type,
            entry.count.to_string(),
            format_money(entry.amount),
        ]);
    }
    composer.table(&breakdown);
    composer.page_break();
}

fn amount_differences(composer: &mut Composer, result: &Reconciliation) {
    composer.heading("AMOUNT DIFFERENCES DETAILED ANALYSIS", Color::DARK_GREEN);
    let mismatches = mismatches_by_size(result);
    composer.line(&format!(
        "Total Orders with Amount Differences: {}",
        mismatches.len()
    ));
    if let Some(stats) = DiffStats::of(&result.matched) {
        composer.line(&format!(
            "Total Amount Difference: {}",
            format_money(stats.sum)
        ));
        composer.line(&format!("Average Difference: {}", format_money(stats.mean)));
        composer.line(&format!("Maximum Difference: {}", format_money(stats.max)));
        composer.line(&format!("Minimum Difference: {}", format_money(stats.min)));
    }

    if mismatches.is_empty() {
        composer.spacer(4.0);
        composer.line("No significant amount differences found!");
        composer.page_break();
        return;
    }

    composer.subheading("AMOUNT DIFFERENCES SUMMARY TABLE");
    let mut table = Table::new(
        [
            "#",
            "Order ID",
            "Trans Amount",
            "Tax Amount",
            "Difference",
            "Tip",
            "Tax",
        ],
        &DIFF_WIDTHS,
    )
    .header_fill(Color::DARK_GREEN);
    for (index, pair) in mismatches.iter().enumerate() {
        table.push_row(vec![
            (index + 1).to_string(),
            pair.order.order_id.clone(),
            format_money(pair.order.amount),
            format_money(pair.tax.total_sum),
            format_signed_money(pair.amount_diff()),
            format_money(pair.tax.tip),
            format_money(pair.tax.tax),
        ]);
    }
    composer.paginated_table("AMOUNT DIFFERENCES", &table);

    let split = MagnitudeSplit::of(mismatches.iter().copied());
    composer.subheading("DIFFERENCE MAGNITUDE ANALYSIS");
    composer.bullet(&format!(
        "Positive Differences: {} orders (Tax Report lower than Transaction)",
        split.positive_count
    ));
    composer.bullet(&format!(
        "Negative Differences: {} orders (Tax Report higher than Transaction)",
        split.negative_count
    ));
    composer.bullet(&format!(
        "Total Positive Impact: {}",
        format_money(split.positive_sum)
    ));
    composer.bullet(&format!(
        "Total Negative Impact: {}",
        format_money(split.negative_sum)
    ));
    composer.page_break();
}

fn all_transactions(composer: &mut Composer, state: &ReconcileState) {
    let title = format!("ALL TRANSACTION RECORDS ({})", state.month.long_name());
    composer.heading(&title, Color::DARK_BLUE);
    composer.line(&format!("Total Records: {}", state.orders.len()));
    composer.line(&format!(
        "Total Amount: {}",
        format_money(state.transaction_total())
    ));
    composer.spacer(3.0);

    let mut table = Table::new(
        [
            "#",
            "Order ID",
            "Date",
            "Amount",
            "Location",
            "Payment Type",
            "Gateway",
        ],
        &RECORD_WIDTHS,
    );
    for (index, order) in state.orders.iter().enumerate() {
        table.push_row(vec![
            (index + 1).to_string(),
            order.order_id.clone(),
            format_date(order.date),
            format_money(order.amount),
            order.location.clone(),
            order.payment_type.clone(),
            order.payment_gateway.clone(),
        ]);
    }
    composer.paginated_table("ALL TRANSACTION RECORDS", &table);
    composer.page_break();
}

fn all_tax_records(composer: &mut Composer, state: &ReconcileState) {
    let title = format!("ALL TAX RECORDS ({})", state.month.long_name());
    composer.heading(&title, Color::DARK_GREEN);
    composer.line(&format!("Total Records: {}", state.tax_records.len()));
    composer.line(&format!("Total Amount: {}", format_money(state.tax_total())));
    composer.spacer(3.0);

    let mut table = Table::new(
        [
            "#",
            "Order ID",
            "Date",
            "Total Sum",
            "Tip",
            "Tax",
            "Order Status",
            "Payment Status",
        ],
        &TAX_WIDTHS,
    )
    .header_fill(Color::DARK_GREEN);
    for (index, record) in state.tax_records.iter().enumerate() {
        table.push_row(vec![
            (index + 1).to_string(),
            record.order_id.clone(),
            format_date(record.date),
            format_money(record.total_sum),
            format_money(record.tip),
            format_money(record.tax),
            record.order_status_or_na().to_owned(),
            record.payment_status_or_na().to_owned(),
        ]);
    }
    composer.paginated_table("ALL TAX RECORDS", &table);
    composer.page_break();
}

fn recommendations_section(composer: &mut Composer, result: &Reconciliation) {
    composer.heading("RECOMMENDATIONS & NEXT STEPS", Color::DARK_BLUE);

    composer.subheading("Key Findings");
    for finding in key_findings(result) {
        let marker = if finding.ok { "[OK]" } else { "[!]" };
        composer.line(&format!("{marker} {}", finding.text));
    }
    if !result.only_in_tax.is_empty() {
        composer.line(&format!(
            "[!] {} tax records have no matching transaction",
            result.only_in_tax.len()
        ));
    }
    if !result.duplicate_tax_ids.is_empty() {
        composer.line(&format!(
            "[!] {} order ids appear more than once in the tax report",
            result.duplicate_tax_ids.len()
        ));
    }

    let recommendations = recommendations(result);
    composer.subheading("Immediate Actions");
    for action in &recommendations.actions {
        composer.bullet(action);
    }
    composer.subheading("Ongoing Monitoring");
    for item in recommendations.monitoring {
        composer.bullet(item);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tax_recon::filter::parse_date_str;
    use tax_recon::{Category, TaxRecord, TransactionRecord};

    fn transaction(order_id: &str, amount: &str, date: &str) -> TransactionRecord {
        TransactionRecord {
            order_id: order_id.into(),
            amount: amount.parse().unwrap(),
            date: parse_date_str(date),
            secondary_date: None,
            location: "Main".into(),
            payment_type: "physicalCard".into(),
            payment_gateway: "stripe".into(),
            source: "pos".into(),
        }
    }

    fn tax(order_id: &str, total_sum: &str) -> TaxRecord {
        TaxRecord {
            order_id: order_id.into(),
            date: parse_date_str("2025-08-15 12:00:00"),
            total_sum: total_sum.parse().unwrap(),
            tip: Default::default(),
            tax: Default::default(),
            module_name: "pos".into(),
            order_status: Some("completed".into()),
            payment_status: None,
        }
    }

    fn info() -> ReportInfo {
        ReportInfo::new(
            "Reconciliation Report",
            parse_date_str("2025-09-01 09:30:00").unwrap(),
        )
    }

    fn state(transactions: Vec<TransactionRecord>, taxes: Vec<TaxRecord>) -> ReconcileState {
        ReconcileState::prepare(
            "2025-08".parse().unwrap(),
            &Category::new("pos"),
            transactions,
            taxes,
            false,
        )
    }

    #[test]
    fn sections_in_order() {
        let state = state(
            vec![
                transaction("1754594250742", "14.54", "2025-08-07 10:00:00"),
                transaction("A", "10.00", "2025-08-01 10:00:00"),
                transaction("C", "20.00", "2025-08-03 10:00:00"),
            ],
            vec![tax("A", "10.00"), tax("C", "19.50")],
        );
        let result = state.reconcile();
        let document = reconciliation_document(&state, &result, &info());

        let headings = [
            "Reconciliation Report",
            "EXECUTIVE SUMMARY",
            "OVERALL TALLY",
            "MISSING RECORDS DETAILED ANALYSIS",
            "AMOUNT DIFFERENCES DETAILED ANALYSIS",
            "ALL TRANSACTION RECORDS (August 2025)",
            "ALL TAX RECORDS (August 2025)",
            "RECOMMENDATIONS & NEXT STEPS",
        ];
        let pages: Vec<_> = headings
            .iter()
            .map(|heading| document.find_page(heading).unwrap())
            .collect();
        assert!(pages.windows(2).all(|pair| pair[0] < pair[1]), "{pages:?}");

        assert!(document.contains("Report Generated: September 01, 2025 at 09:30 AM"));
        assert!(document.contains("Total Missing Records: 1"));
        assert!(document.contains("+$0.50"));
        assert!(document.contains("- Investigate 1 missing Order IDs in Tax Report system"));
        assert!(document.contains("N/A"));
    }

    #[test]
    fn executive_summary_values() {
        let state = state(
            vec![
                transaction("A", "10.00", "2025-08-01"),
                transaction("B", "1234.5", "2025-08-02"),
            ],
            vec![tax("A", "10.00")],
        );
        let result = state.reconcile();
        let document = reconciliation_document(&state, &result, &info());
        let page = document.find_page("EXECUTIVE SUMMARY").unwrap();
        let texts: Vec<_> = document.pages[page].texts().collect();
        insta::assert_snapshot!(texts.join("\n"), @r"
        EXECUTIVE SUMMARY
        Metric
        Value
        Transaction Report Total
        $1,244.50
        Tax Report Total
        $10.00
        Total Difference
        $1,234.50
        Missing Records
        1 orders
        Missing Amount
        $1,234.50
        Amount Differences
        0 orders
        Difference Amount
        $0.00
        Total Orders (Transaction)
        2
        Total Orders (Tax)
        1
        Matching Orders
        1
        ");
    }

    #[test]
    fn difference_extremes_keep_their_sign() {
        let state = state(
            vec![
                transaction("A", "10.00", "2025-08-01"),
                transaction("B", "20.00", "2025-08-02"),
            ],
            vec![tax("A", "11.00"), tax("B", "23.00")],
        );
        let result = state.reconcile();
        let document = reconciliation_document(&state, &result, &info());
        assert!(document.contains("Maximum Difference: -$1.00"));
        assert!(document.contains("Minimum Difference: -$3.00"));
    }

    #[test]
    fn clean_month_has_no_detail_tables() {
        let state = state(
            vec![transaction("A", "10.00", "2025-08-01")],
            vec![tax("A", "10.00")],
        );
        let result = state.reconcile();
        let document = reconciliation_document(&state, &result, &info());
        assert!(document.contains("No missing records found!"));
        assert!(document.contains("No significant amount differences found!"));
        assert!(document.contains("- All data is consistent - no action required!"));
        assert!(!document.contains("MISSING RECORDS SUMMARY TABLE"));
    }

    #[test]
    fn empty_inputs_still_produce_a_document() {
        let state = state(vec![], vec![]);
        let result = state.reconcile();
        let document = reconciliation_document(&state, &result, &info());
        assert!(document.contains("Total Records: 0"));
        assert!(!document.contains("Average Difference: $0.00"));
    }
}
