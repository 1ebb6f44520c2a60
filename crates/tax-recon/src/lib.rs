pub mod filter;
pub mod grouping;
pub mod membership;
pub mod membership_tax;
pub mod reconcile;
pub mod records;
pub mod table;

pub type Decimal = rust_decimal::Decimal;
pub type DateTime = chrono::NaiveDateTime;

pub use anyhow::Result;

pub use filter::{Category, TargetMonth};
pub use grouping::GroupedOrder;
pub use records::{TaxRecord, TransactionRecord};

/// Amount differences strictly above this are reported as mismatches.
pub fn mismatch_epsilon() -> Decimal {
    Decimal::new(1, 2)
}

/// Format a decimal as dollars with thousands separators, e.g. `$1,234.50`.
pub fn format_money(value: Decimal) -> String {
    let rounded = cents(value);
    let sign = if rounded.is_sign_negative() && !rounded.is_zero() {
        "-"
    } else {
        ""
    };
    format!("{sign}${}", group_thousands(rounded.abs()))
}

/// Like [`format_money`] but always carries a sign, e.g. `+$0.50`.
pub fn format_signed_money(value: Decimal) -> String {
    let rounded = cents(value);
    if rounded.is_sign_negative() && !rounded.is_zero() {
        format_money(rounded)
    } else {
        format!("+{}", format_money(rounded))
    }
}

/// Round half away from zero to two decimals for display.
pub fn cents(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, rust_decimal::RoundingStrategy::MidpointAwayFromZero)
}

fn group_thousands(value: Decimal) -> String {
    let text = format!("{value:.2}");
    let (int_part, frac_part) = text.split_once('.').unwrap_or((text.as_str(), "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, digit) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    format!("{grouped}.{frac_part}")
}
