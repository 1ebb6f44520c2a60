//! Figures derived from a [`Reconciliation`] for the reports.

use super::{MatchedOrder, ReconcileState, Reconciliation};
use crate::Decimal;
use crate::grouping::GroupedOrder;
use std::cmp::Reverse;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
pub struct Totals {
    pub transaction_rows: usize,
    pub transaction_orders: usize,
    pub tax_records: usize,
    pub matched: usize,
    pub missing: usize,
    pub mismatches: usize,
    pub only_in_tax: usize,
    pub transaction_total: Decimal,
    pub tax_total: Decimal,
    pub missing_amount: Decimal,
    /// Sum of the amount differences over all matched orders.
    pub discrepancy: Decimal,
}

impl Totals {
    pub fn new(state: &ReconcileState, result: &Reconciliation) -> Self {
        Totals {
            transaction_rows: state.transaction_rows,
            transaction_orders: state.orders.len(),
            tax_records: state.tax_records.len(),
            matched: result.matched.len(),
            missing: result.missing_in_tax.len(),
            mismatches: result.significant_mismatches().count(),
            only_in_tax: result.only_in_tax.len(),
            transaction_total: state.transaction_total(),
            tax_total: state.tax_total(),
            missing_amount: result.missing_in_tax.iter().map(|order| order.amount).sum(),
            discrepancy: result.matched.iter().map(MatchedOrder::amount_diff).sum(),
        }
    }

    /// Transaction total minus tax total.
    pub fn difference(&self) -> Decimal {
        self.transaction_total - self.tax_total
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiffStats {
    pub sum: Decimal,
    pub mean: Decimal,
    pub max: Decimal,
    pub min: Decimal,
}

impl DiffStats {
    /// Statistics over the differences of every matched order, `None` without matches.
    pub fn of(matched: &[MatchedOrder]) -> Option<Self> {
        let diffs: Vec<Decimal> = matched.iter().map(MatchedOrder::amount_diff).collect();
        let max = diffs.iter().copied().max()?;
        let min = diffs.iter().copied().min()?;
        let sum: Decimal = diffs.iter().sum();
        let mean = sum / Decimal::from(diffs.len());
        Some(DiffStats {
            sum,
            mean,
            max,
            min,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PaymentBreakdown {
    pub payment_type: String,
    pub count: usize,
    pub amount: Decimal,
}

/// Count and amount of the given orders per payment type, ordered by payment type.
pub fn payment_breakdown(orders: &[GroupedOrder]) -> Vec<PaymentBreakdown> {
    let mut by_type: BTreeMap<&str, (usize, Decimal)> = BTreeMap::new();
    for order in orders {
        let entry = by_type.entry(order.payment_type.as_str()).or_default();
        entry.0 += 1;
        entry.1 += order.amount;
    }
    by_type
        .into_iter()
        .map(|(payment_type, (count, amount))| PaymentBreakdown {
            payment_type: payment_type.to_owned(),
            count,
            amount,
        })
        .collect()
}

/// Significant mismatches split by the sign of the difference.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MagnitudeSplit {
    /// Tax report lower than the transactions.
    pub positive_count: usize,
    pub positive_sum: Decimal,
    /// Tax report higher than the transactions.
    pub negative_count: usize,
    pub negative_sum: Decimal,
}

impl MagnitudeSplit {
    pub fn of<'a>(pairs: impl IntoIterator<Item = &'a MatchedOrder>) -> Self {
        let mut split = MagnitudeSplit::default();
        for pair in pairs {
            let diff = pair.amount_diff();
            if diff.is_sign_positive() && !diff.is_zero() {
                split.positive_count += 1;
                split.positive_sum += diff;
            } else if diff.is_sign_negative() && !diff.is_zero() {
                split.negative_count += 1;
                split.negative_sum += diff;
            }
        }
        split
    }
}

/// Missing orders, earliest first.
pub fn missing_by_date(result: &Reconciliation) -> Vec<&GroupedOrder> {
    let mut missing: Vec<_> = result.missing_in_tax.iter().collect();
    missing.sort_by_key(|order| (order.date.is_none(), order.date));
    missing
}

/// Significant mismatches, largest absolute difference first.
pub fn mismatches_by_size(result: &Reconciliation) -> Vec<&MatchedOrder> {
    let mut mismatches: Vec<_> = result.significant_mismatches().collect();
    mismatches.sort_by(|a, b| {
        Reverse(a.amount_diff().abs())
            .cmp(&Reverse(b.amount_diff().abs()))
            .then_with(|| a.order.order_id.cmp(&b.order.order_id))
    });
    mismatches
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    pub ok: bool,
    pub text: &'static str,
}

pub fn key_findings(result: &Reconciliation) -> Vec<Finding> {
    let mut findings = Vec::new();
    if result.missing_in_tax.is_empty() {
        findings.push(Finding {
            ok: true,
            text: "All transactions present in Tax Report",
        });
    } else {
        findings.push(Finding {
            ok: false,
            text: "Some transactions are missing from Tax Report",
        });
    }
    if result.significant_mismatches().next().is_none() {
        findings.push(Finding {
            ok: true,
            text: "All amounts match correctly",
        });
    } else {
        findings.push(Finding {
            ok: false,
            text: "Some amount mismatches found",
        });
    }
    findings
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recommendations {
    /// Follow-up actions for this month's findings.
    pub actions: Vec<String>,
    pub monitoring: Vec<&'static str>,
}

pub fn recommendations(result: &Reconciliation) -> Recommendations {
    let missing = result.missing_in_tax.len();
    let mismatches = result.significant_mismatches().count();

    let mut actions = Vec::new();
    if missing > 0 {
        actions.push(format!(
            "Investigate {missing} missing Order IDs in Tax Report system"
        ));
        actions.push("Check if cash transactions are properly recorded in tax system".into());
        actions.push("Verify tax calculation process for missing orders".into());
        actions.push("Contact tax system administrator to resolve missing records".into());
    }
    if mismatches > 0 {
        actions.push(format!("Review {mismatches} orders with amount discrepancies"));
        actions.push("Verify tip and tax calculations in Tax Report".into());
        actions.push("Cross-check amount calculations with source systems".into());
        actions.push("Update tax calculation formulas if needed".into());
    }
    if missing == 0 && mismatches == 0 {
        actions.push("All data is consistent - no action required!".into());
    }

    Recommendations {
        actions,
        monitoring: vec![
            "Run this analysis monthly to catch discrepancies early",
            "Set up automated alerts for missing records",
            "Implement data validation checks in both systems",
            "Create reconciliation procedures for future reporting",
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::parse_date_str;
    use crate::reconcile::reconcile;
    use crate::records::TaxRecord;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn order(order_id: &str, amount: &str, date: &str, payment_type: &str) -> GroupedOrder {
        GroupedOrder {
            order_id: order_id.into(),
            amount: dec(amount),
            date: parse_date_str(date),
            location: "Main".into(),
            payment_type: payment_type.into(),
            payment_gateway: "stripe".into(),
            line_count: 1,
        }
    }

    fn tax(order_id: &str, total_sum: &str) -> TaxRecord {
        TaxRecord {
            order_id: order_id.into(),
            date: parse_date_str("2025-08-15"),
            total_sum: dec(total_sum),
            tip: Decimal::ZERO,
            tax: Decimal::ZERO,
            module_name: "pos".into(),
            order_status: None,
            payment_status: None,
        }
    }

    fn sample() -> (Vec<GroupedOrder>, Vec<TaxRecord>) {
        let orders = vec![
            order("A", "10.00", "2025-08-01", "cash"),
            order("B", "14.54", "2025-08-07", "physicalCard"),
            order("C", "20.00", "2025-08-03", "cash"),
            order("D", "31.82", "2025-08-27", "physicalCard"),
            order("E", "353.63", "2025-08-31", "physicalCard"),
            order("F", "5.00", "2025-08-04", "cash"),
        ];
        let taxes = vec![
            tax("A", "10.00"),
            tax("C", "19.50"),
            tax("F", "7.00"),
            tax("Z", "1.00"),
        ];
        (orders, taxes)
    }

    #[test]
    fn totals() {
        let (orders, taxes) = sample();
        let result = reconcile(&orders, &taxes);
        let state = ReconcileState {
            month: "2025-08".parse().unwrap(),
            orders,
            tax_records: taxes,
            transaction_rows: 8,
        };
        let totals = Totals::new(&state, &result);

        assert_eq!(totals.transaction_rows, 8);
        assert_eq!(totals.transaction_orders, 6);
        assert_eq!(totals.tax_records, 4);
        assert_eq!(totals.matched, 3);
        assert_eq!(totals.missing, 3);
        assert_eq!(totals.mismatches, 2);
        assert_eq!(totals.only_in_tax, 1);
        assert_eq!(totals.transaction_total, dec("434.99"));
        assert_eq!(totals.tax_total, dec("37.50"));
        assert_eq!(totals.difference(), dec("397.49"));
        assert_eq!(totals.missing_amount, dec("399.99"));
        assert_eq!(totals.discrepancy, dec("-1.50"));
    }

    #[test]
    fn diff_stats() {
        let (orders, taxes) = sample();
        let result = reconcile(&orders, &taxes);
        let stats = DiffStats::of(&result.matched).unwrap();
        assert_eq!(stats.sum, dec("-1.50"));
        assert_eq!(stats.mean, dec("-0.50"));
        assert_eq!(stats.max, dec("0.50"));
        assert_eq!(stats.min, dec("-2.00"));

        assert_eq!(DiffStats::of(&[]), None);
    }

    #[test]
    fn missing_payment_breakdown() {
        let (orders, taxes) = sample();
        let result = reconcile(&orders, &taxes);
        let breakdown = payment_breakdown(&result.missing_in_tax);
        assert_eq!(
            breakdown,
            [PaymentBreakdown {
                payment_type: "physicalCard".into(),
                count: 3,
                amount: dec("399.99"),
            }]
        );
    }

    #[test]
    fn orderings() {
        let (orders, taxes) = sample();
        let result = reconcile(&orders, &taxes);

        let missing: Vec<_> = missing_by_date(&result)
            .into_iter()
            .map(|order| order.order_id.as_str())
            .collect();
        assert_eq!(missing, ["B", "D", "E"]);

        let mismatches: Vec<_> = mismatches_by_size(&result)
            .into_iter()
            .map(|pair| pair.order.order_id.as_str())
            .collect();
        assert_eq!(mismatches, ["F", "C"]);
    }

    #[test]
    fn magnitude_split() {
        let (orders, taxes) = sample();
        let result = reconcile(&orders, &taxes);
        let split = MagnitudeSplit::of(result.significant_mismatches());
        assert_eq!(
            split,
            MagnitudeSplit {
                positive_count: 1,
                positive_sum: dec("0.50"),
                negative_count: 1,
                negative_sum: dec("-2.00"),
            }
        );
    }

    #[test]
    fn recommendations_follow_findings() {
        let (orders, taxes) = sample();
        let result = reconcile(&orders, &taxes);
        let recs = recommendations(&result);
        assert_eq!(recs.actions.len(), 8);
        assert_eq!(
            recs.actions[0],
            "Investigate 3 missing Order IDs in Tax Report system"
        );
        assert_eq!(recs.actions[4], "Review 2 orders with amount discrepancies");
        assert_eq!(recs.monitoring.len(), 4);
        assert!(key_findings(&result).iter().all(|finding| !finding.ok));

        let clean = reconcile(&orders[..1], &taxes);
        let recs = recommendations(&clean);
        assert_eq!(recs.actions, ["All data is consistent - no action required!"]);
        assert!(key_findings(&clean).iter().all(|finding| finding.ok));
    }
}
