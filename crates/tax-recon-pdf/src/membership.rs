use crate::layout::{Color, Composer, Document, Table};
use crate::report::{ReportInfo, format_date, title_page};
use tax_recon::membership::MembershipReport;
use tax_recon::membership_tax::MembershipTaxReport;
use tax_recon::{Decimal, format_money};

fn percent(rate: Option<Decimal>) -> String {
    match rate {
        Some(rate) => format!("{:.2}%", tax_recon::cents(rate)),
        None => "N/A".into(),
    }
}

/// Lay out the membership sales report for one month.
pub fn membership_document(report: &MembershipReport, info: &ReportInfo) -> Document {
    let mut composer = Composer::new(info.title.clone());
    title_page(
        &mut composer,
        info,
        "Membership Sales Analysis",
        report.month,
        "Classify membership sales and check them against the tax report",
    );

    composer.heading("MEMBERSHIP SUMMARY", Color::DARK_BLUE);
    let mut summary = Table::new(
        [
            "Membership Type",
            "Count",
            "Total Amount",
            "Total Tax",
            "Effective Tax %",
        ],
        &[44.0, 22.0, 36.0, 36.0, 36.0],
    )
    .body_fill(Color::BEIGE)
    .font_size(9.0);
    for row in report.summary() {
        summary.push_row(vec![
            row.label(),
            row.count.to_string(),
            format_money(row.amount),
            format_money(row.tax),
            percent(row.effective_rate()),
        ]);
    }
    composer.table(&summary);

    composer.heading("TAX REPORT MATCH STATUS", Color::DARK_GREEN);
    let ((matched, matched_amount), (unmatched, unmatched_amount)) = report.match_status();
    let mut status = Table::new(["Status", "Count", "Amount"], &[60.0, 30.0, 50.0])
        .header_fill(Color::DARK_GREEN)
        .body_fill(Color::BEIGE)
        .font_size(9.0);
    status.push_row(vec![
        "Matched".into(),
        matched.to_string(),
        format_money(matched_amount),
    ]);
    status.push_row(vec![
        "Not Matched".into(),
        unmatched.to_string(),
        format_money(unmatched_amount),
    ]);
    composer.table(&status);
    composer.line(&format!(
        "Tax rate applied to sales without a reported tax: {}",
        percent(Some(report.tax_rate))
    ));
    composer.page_break();

    let title = format!("ALL MEMBERSHIP SALES ({})", report.month.long_name());
    composer.heading(&title, Color::DARK_BLUE);
    composer.line(&format!("Total Records: {}", report.sales.len()));
    composer.line(&format!(
        "Total Amount: {}",
        format_money(report.total_amount())
    ));
    composer.spacer(3.0);

    let mut table = Table::new(
        [
            "#",
            "Order ID",
            "Date",
            "Amount",
            "Type",
            "In Tax Report",
            "Tax",
        ],
        &[10.0, 34.0, 30.0, 24.0, 24.0, 28.0, 24.0],
    );
    for (index, sale) in report.sales.iter().enumerate() {
        table.push_row(vec![
            (index + 1).to_string(),
            sale.transaction.order_id.clone(),
            format_date(sale.transaction.date),
            format_money(sale.transaction.amount),
            sale.kind.to_string(),
            String::from(if sale.matched { "Yes" } else { "No" }),
            format_money(sale.tax),
        ]);
    }
    composer.paginated_table("ALL MEMBERSHIP SALES", &table);

    composer.finish()
}

/// Lay out the membership tax summary built from the membership export.
pub fn membership_tax_document(report: &MembershipTaxReport, info: &ReportInfo) -> Document {
    let mut composer = Composer::new(info.title.clone());
    title_page(
        &mut composer,
        info,
        "Membership Tax Summary",
        report.month,
        "Total membership sales and tax by membership type",
    );

    composer.heading("MEMBERSHIP TAX SUMMARY", Color::DARK_BLUE);
    composer.line(if report.used_fallback {
        "Selected by purchase date (no updates in this month)"
    } else {
        "Selected by last update date"
    });
    composer.spacer(3.0);
    let mut summary = Table::new(
        [
            "Membership Type",
            "Count",
            "Total Amount",
            "Total Tax",
            "Effective Tax %",
        ],
        &[56.0, 20.0, 34.0, 30.0, 34.0],
    )
    .body_fill(Color::BEIGE)
    .font_size(9.0);
    for row in report.summary() {
        summary.push_row(vec![
            row.label().to_owned(),
            row.count.to_string(),
            format_money(row.total),
            format_money(row.tax),
            percent(row.effective_rate()),
        ]);
    }
    composer.table(&summary);

    if report.sales.is_empty() {
        composer.line("No membership sales in this month.");
        return composer.finish();
    }
    composer.page_break();

    let title = format!("MEMBERSHIP RECORDS WITH FINAL TAX ({})", report.month.long_name());
    composer.heading(&title, Color::DARK_BLUE);
    composer.line(&format!("Total Records: {}", report.sales.len()));
    composer.line(&format!(
        "Final Tax: {}",
        format_money(report.total_final_tax())
    ));
    composer.spacer(3.0);

    let mut table = Table::new(
        ["#", "Membership ID", "Type", "Amount", "Tax", "Tax %", "Final Tax"],
        &[10.0, 30.0, 40.0, 24.0, 22.0, 22.0, 26.0],
    )
    .body_fill(Color::LAVENDER);
    for (index, sale) in report.sales.iter().enumerate() {
        table.push_row(vec![
            (index + 1).to_string(),
            sale.id.clone(),
            sale.type_name.clone(),
            format_money(sale.total),
            sale.tax.map(format_money).unwrap_or_else(|| "N/A".into()),
            percent(sale.tax_percentage()),
            format_money(sale.final_tax()),
        ]);
    }
    composer.paginated_table("MEMBERSHIP RECORDS WITH FINAL TAX", &table);

    composer.finish()
}
