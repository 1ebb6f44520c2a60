use anstyle::{AnsiColor, Color, Style};
use std::fmt::{self, Write as _};
use std::io::IsTerminal as _;
use tax_recon::membership::MembershipReport;
use tax_recon::membership_tax::MembershipTaxReport;
use tax_recon::reconcile::analysis::{
    Totals, key_findings, missing_by_date, mismatches_by_size, recommendations,
};
use tax_recon::reconcile::{ReconcileState, Reconciliation};
use tax_recon::{DateTime, Decimal, format_money, format_signed_money};

pub struct Palette {
    missing: Style,
    mismatch: Style,
    ok: Style,
    heading: Style,
}

impl Palette {
    pub fn for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Palette::colored()
        } else {
            Palette::plain()
        }
    }

    pub fn colored() -> Self {
        Palette {
            missing: Style::new().fg_color(Some(Color::Ansi(AnsiColor::Yellow))),
            mismatch: Style::new().fg_color(Some(Color::Ansi(AnsiColor::Red))),
            ok: Style::new().fg_color(Some(Color::Ansi(AnsiColor::Green))),
            heading: Style::new().bold(),
        }
    }

    pub fn plain() -> Self {
        Palette {
            missing: Style::new(),
            mismatch: Style::new(),
            ok: Style::new(),
            heading: Style::new(),
        }
    }
}

fn rate(rate: Option<Decimal>) -> String {
    rate.map(|rate| format!("{:.2}%", tax_recon::cents(rate)))
        .unwrap_or_else(|| "N/A".into())
}

fn date(date: Option<DateTime>) -> String {
    date.map(|date| date.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "N/A".into())
}

pub fn render_diff(
    state: &ReconcileState,
    result: &Reconciliation,
    palette: &Palette,
) -> Result<String, fmt::Error> {
    let Palette {
        missing,
        mismatch,
        ok,
        heading,
    } = palette;
    let totals = Totals::new(state, result);
    let mut out = String::new();

    writeln!(
        out,
        "{heading}━━━ {} ━━━{heading:#}",
        state.month.long_name()
    )?;
    writeln!(out, "  {} transaction rows", totals.transaction_rows)?;
    writeln!(out, "  {} orders in transaction report", totals.transaction_orders)?;
    writeln!(out, "  {} records in tax report", totals.tax_records)?;
    writeln!(out)?;

    if !result.missing_in_tax.is_empty() {
        writeln!(out, "{missing}━━━ Missing in Tax Report ━━━{missing:#}")?;
        for order in missing_by_date(result) {
            writeln!(
                out,
                "  {:<16} {:<16} {:>12}  {}",
                order.order_id,
                date(order.date),
                format_money(order.amount),
                order.payment_type
            )?;
        }
        writeln!(out)?;
    }

    let mismatches = mismatches_by_size(result);
    if !mismatches.is_empty() {
        writeln!(out, "{mismatch}━━━ Amount Differences ━━━{mismatch:#}")?;
        for pair in &mismatches {
            writeln!(
                out,
                "  {:<16} {:>12} vs {:>12}  {}",
                pair.order.order_id,
                format_money(pair.order.amount),
                format_money(pair.tax.total_sum),
                format_signed_money(pair.amount_diff())
            )?;
        }
        writeln!(out)?;
    }

    if !result.only_in_tax.is_empty() {
        writeln!(out, "{heading}━━━ Only in Tax Report ━━━{heading:#}")?;
        for record in &result.only_in_tax {
            writeln!(
                out,
                "  {:<16} {:<16} {:>12}",
                record.order_id,
                date(record.date),
                format_money(record.total_sum)
            )?;
        }
        writeln!(out)?;
    }

    if !result.has_findings() {
        writeln!(out, "{ok}✓ All transactions match!{ok:#}")?;
    }

    writeln!(out, "{heading}━━━ Summary ━━━{heading:#}")?;
    writeln!(
        out,
        "  Transaction total: {}",
        format_money(totals.transaction_total)
    )?;
    writeln!(out, "  Tax report total:  {}", format_money(totals.tax_total))?;
    writeln!(out, "  Difference:        {}", format_money(totals.difference()))?;
    writeln!(out, "  {} order(s) matched", totals.matched)?;
    if totals.missing > 0 {
        writeln!(
            out,
            "  {missing}{}{missing:#} order(s) missing from tax report ({})",
            totals.missing,
            format_money(totals.missing_amount)
        )?;
    }
    if totals.mismatches > 0 {
        writeln!(
            out,
            "  {mismatch}{}{mismatch:#} order(s) with amount differences ({} total discrepancy)",
            totals.mismatches,
            format_money(totals.discrepancy)
        )?;
    }
    if !result.duplicate_tax_ids.is_empty() {
        writeln!(
            out,
            "  {} order id(s) appear more than once in the tax report",
            result.duplicate_tax_ids.len()
        )?;
    }

    if result.has_findings() {
        writeln!(out)?;
        writeln!(out, "{heading}━━━ Key Findings ━━━{heading:#}")?;
        for finding in key_findings(result) {
            let (style, marker) = if finding.ok { (ok, "✓") } else { (missing, "✗") };
            writeln!(out, "  {style}{marker}{style:#} {}", finding.text)?;
        }
        writeln!(out, "{heading}━━━ Recommended Actions ━━━{heading:#}")?;
        for action in recommendations(result).actions {
            writeln!(out, "  - {action}")?;
        }
    }

    Ok(out)
}

pub fn render_membership(
    report: &MembershipReport,
    palette: &Palette,
) -> Result<String, fmt::Error> {
    let Palette {
        missing, heading, ..
    } = palette;
    let mut out = String::new();

    writeln!(
        out,
        "{heading}━━━ Memberships {} ━━━{heading:#}",
        report.month.long_name()
    )?;
    writeln!(
        out,
        "  {:<12} {:>5} {:>12} {:>10} {:>7}",
        "Type", "Count", "Amount", "Tax", "Rate"
    )?;
    for row in report.summary() {
        writeln!(
            out,
            "  {:<12} {:>5} {:>12} {:>10} {:>7}",
            row.label(),
            row.count,
            format_money(row.amount),
            format_money(row.tax),
            rate(row.effective_rate())
        )?;
    }
    writeln!(out)?;

    let ((matched, matched_amount), (unmatched, unmatched_amount)) = report.match_status();
    writeln!(out, "{heading}━━━ Tax Report Match ━━━{heading:#}")?;
    writeln!(
        out,
        "  {matched} matched ({})",
        format_money(matched_amount)
    )?;
    writeln!(
        out,
        "  {missing}{unmatched}{missing:#} not matched ({})",
        format_money(unmatched_amount)
    )?;
    writeln!(
        out,
        "  estimated tax rate: {:.2}%",
        tax_recon::cents(report.tax_rate)
    )?;

    Ok(out)
}

pub fn render_membership_tax(
    report: &MembershipTaxReport,
    palette: &Palette,
) -> Result<String, fmt::Error> {
    let Palette {
        missing, heading, ..
    } = palette;
    let mut out = String::new();

    writeln!(
        out,
        "{heading}━━━ Membership Tax {} ━━━{heading:#}",
        report.month.long_name()
    )?;
    if report.used_fallback {
        writeln!(
            out,
            "  {missing}no updates in {}, selected by purchase date{missing:#}",
            report.month.long_name()
        )?;
    }
    writeln!(
        out,
        "  {:<20} {:>5} {:>12} {:>10} {:>7}",
        "Type", "Count", "Amount", "Tax", "Rate"
    )?;
    for row in report.summary() {
        writeln!(
            out,
            "  {:<20} {:>5} {:>12} {:>10} {:>7}",
            row.label(),
            row.count,
            format_money(row.total),
            format_money(row.tax),
            rate(row.effective_rate())
        )?;
    }
    writeln!(out)?;
    writeln!(
        out,
        "  final tax with estimates: {}",
        format_money(report.total_final_tax())
    )?;

    Ok(out)
}
