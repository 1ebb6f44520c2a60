//! Reconciling grouped transaction orders against the tax report.

pub mod analysis;

use crate::filter::{Category, TargetMonth, filter_month, filter_month_or_fallback};
use crate::grouping::{GroupedOrder, group_orders};
use crate::records::{TaxColumns, TaxRecord, TransactionColumns, TransactionRecord};
use crate::table::Table;
use crate::{DateTime, Decimal, Result, mismatch_epsilon};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

/// An order found in both reports.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchedOrder {
    pub order: GroupedOrder,
    pub tax: TaxRecord,
}

impl MatchedOrder {
    /// Transaction amount minus the tax report's total.
    pub fn amount_diff(&self) -> Decimal {
        self.order.amount - self.tax.total_sum
    }

    pub fn is_significant(&self) -> bool {
        self.amount_diff().abs() > mismatch_epsilon()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reconciliation {
    /// Orders without a tax record.
    pub missing_in_tax: Vec<GroupedOrder>,
    pub matched: Vec<MatchedOrder>,
    /// Tax records without a transaction order. Not part of `matched`/`missing_in_tax`.
    pub only_in_tax: Vec<TaxRecord>,
    /// Order ids carried by more than one tax record; only the first was matched.
    pub duplicate_tax_ids: Vec<String>,
}

impl Reconciliation {
    pub fn significant_mismatches(&self) -> impl Iterator<Item = &MatchedOrder> {
        self.matched.iter().filter(|pair| pair.is_significant())
    }

    pub fn has_findings(&self) -> bool {
        !self.missing_in_tax.is_empty() || self.significant_mismatches().next().is_some()
    }
}

/// Where the reports are and which slice of them to compare.
#[derive(Debug, Clone)]
pub struct ReconcileConfig {
    pub transactions_path: PathBuf,
    pub tax_path: PathBuf,
    pub month: TargetMonth,
    pub category: Category,
    pub transaction_columns: TransactionColumns,
    pub tax_columns: TaxColumns,
    /// Transaction date column to filter by when the primary one matches nothing.
    pub fallback_date_column: Option<String>,
}

impl ReconcileConfig {
    pub fn new(
        transactions_path: impl Into<PathBuf>,
        tax_path: impl Into<PathBuf>,
        month: TargetMonth,
        category: Category,
    ) -> Self {
        ReconcileConfig {
            transactions_path: transactions_path.into(),
            tax_path: tax_path.into(),
            month,
            category,
            transaction_columns: TransactionColumns::default(),
            tax_columns: TaxColumns::default(),
            fallback_date_column: None,
        }
    }

    /// Load both reports and narrow them down to the configured month and category.
    pub fn read(&self) -> Result<ReconcileState> {
        let transactions = TransactionRecord::from_table(
            &Table::read(&self.transactions_path)?,
            &self.transaction_columns,
            self.fallback_date_column.as_deref(),
        )?;
        let tax_records =
            TaxRecord::from_table(&Table::read(&self.tax_path)?, &self.tax_columns)?;

        Ok(ReconcileState::prepare(
            self.month,
            &self.category,
            transactions,
            tax_records,
            self.fallback_date_column.is_some(),
        ))
    }
}

/// Filtered and grouped inputs of one reconciliation run.
#[derive(Debug, Clone)]
pub struct ReconcileState {
    pub month: TargetMonth,
    pub orders: Vec<GroupedOrder>,
    pub tax_records: Vec<TaxRecord>,
    /// Transaction rows in the window before grouping.
    pub transaction_rows: usize,
}

impl ReconcileState {
    pub fn prepare(
        month: TargetMonth,
        category: &Category,
        transactions: Vec<TransactionRecord>,
        tax_records: Vec<TaxRecord>,
        use_fallback_date: bool,
    ) -> Self {
        let transactions: Vec<_> = transactions
            .into_iter()
            .filter(|record| category.matches_transaction(record))
            .collect();
        let secondary = |record: &TransactionRecord| record.secondary_date;
        let transactions = filter_month_or_fallback(
            transactions,
            month,
            |record| record.date,
            use_fallback_date
                .then_some(&secondary as &dyn Fn(&TransactionRecord) -> Option<DateTime>),
        );

        let tax_records = filter_month(
            tax_records
                .into_iter()
                .filter(|record| category.matches_tax(record)),
            month,
            |record| record.date,
        );

        let transaction_rows = transactions.len();
        let orders = group_orders(transactions);
        tracing::info!(
            %month,
            module = %category.module,
            transaction_rows,
            orders = orders.len(),
            tax_records = tax_records.len(),
            "prepared reconciliation inputs"
        );

        ReconcileState {
            month,
            orders,
            tax_records,
            transaction_rows,
        }
    }

    pub fn reconcile(&self) -> Reconciliation {
        reconcile(&self.orders, &self.tax_records)
    }

    pub fn transaction_total(&self) -> Decimal {
        self.orders.iter().map(|order| order.amount).sum()
    }

    pub fn tax_total(&self) -> Decimal {
        self.tax_records.iter().map(|record| record.total_sum).sum()
    }
}

/// Compare grouped orders with tax records by order id.
///
/// Every order ends up in exactly one of `missing_in_tax` or `matched`. When
/// several tax records share an id, the earliest dated one is used.
pub fn reconcile(orders: &[GroupedOrder], tax_records: &[TaxRecord]) -> Reconciliation {
    let mut tax_by_id: HashMap<&str, &TaxRecord> = HashMap::with_capacity(tax_records.len());
    let mut duplicate_tax_ids = Vec::new();
    for record in tax_records {
        let existing_date = tax_by_id
            .get(record.order_id.as_str())
            .map(|existing| existing.date);
        match existing_date {
            None => {
                tax_by_id.insert(&record.order_id, record);
            }
            Some(existing_date) => {
                if !duplicate_tax_ids.contains(&record.order_id) {
                    duplicate_tax_ids.push(record.order_id.clone());
                }
                if precedes(record.date, existing_date) {
                    tax_by_id.insert(&record.order_id, record);
                }
            }
        }
    }
    if !duplicate_tax_ids.is_empty() {
        tracing::warn!(
            ids = ?duplicate_tax_ids,
            "tax report has several records for the same order, matching the first"
        );
    }

    let mut missing_in_tax = Vec::new();
    let mut matched = Vec::new();
    for order in orders {
        match tax_by_id.get(order.order_id.as_str()) {
            Some(tax) => matched.push(MatchedOrder {
                order: order.clone(),
                tax: (*tax).clone(),
            }),
            None => missing_in_tax.push(order.clone()),
        }
    }

    // One entry per id, in tax report order, carrying the record matching would pick.
    let mut seen: HashSet<&str> = orders.iter().map(|order| order.order_id.as_str()).collect();
    let only_in_tax = tax_records
        .iter()
        .filter(|record| seen.insert(record.order_id.as_str()))
        .filter_map(|record| tax_by_id.get(record.order_id.as_str()))
        .map(|record| (*record).clone())
        .collect();

    Reconciliation {
        missing_in_tax,
        matched,
        only_in_tax,
        duplicate_tax_ids,
    }
}

fn precedes(candidate: Option<DateTime>, current: Option<DateTime>) -> bool {
    match (candidate, current) {
        (Some(candidate), Some(current)) => candidate < current,
        (Some(_), None) => true,
        (None, _) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::parse_date_str;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn order(order_id: &str, amount: &str) -> GroupedOrder {
        GroupedOrder {
            order_id: order_id.into(),
            amount: dec(amount),
            date: parse_date_str("2025-08-10 12:00:00"),
            location: "Main".into(),
            payment_type: "physicalCard".into(),
            payment_gateway: "stripe".into(),
            line_count: 1,
        }
    }

    fn tax(order_id: &str, total_sum: &str) -> TaxRecord {
        TaxRecord {
            order_id: order_id.into(),
            date: parse_date_str("2025-08-10 12:00:00"),
            total_sum: dec(total_sum),
            tip: Decimal::ZERO,
            tax: Decimal::ZERO,
            module_name: "pos".into(),
            order_status: None,
            payment_status: None,
        }
    }

    fn ids<'a>(orders: impl IntoIterator<Item = &'a GroupedOrder>) -> Vec<&'a str> {
        orders.into_iter().map(|o| o.order_id.as_str()).collect()
    }

    #[test]
    fn exact_match_and_missing_order() {
        let orders = [order("A", "10.00"), order("B", "5.00")];
        let taxes = [tax("A", "10.00")];
        let result = reconcile(&orders, &taxes);

        assert_eq!(ids(&result.missing_in_tax), ["B"]);
        assert_eq!(result.matched.len(), 1);
        assert_eq!(result.matched[0].order.order_id, "A");
        assert_eq!(result.matched[0].tax.order_id, "A");
        assert_eq!(result.matched[0].amount_diff(), Decimal::ZERO);
        assert_eq!(result.significant_mismatches().count(), 0);
        assert!(result.has_findings());
    }

    #[test]
    fn half_dollar_is_significant() {
        let result = reconcile(&[order("C", "20.00")], &[tax("C", "19.50")]);
        assert_eq!(result.matched[0].amount_diff(), dec("0.50"));
        let mismatches: Vec<_> = result.significant_mismatches().collect();
        assert_eq!(mismatches.len(), 1);
        assert_eq!(mismatches[0].order.order_id, "C");
    }

    #[test]
    fn one_cent_is_not_significant() {
        let result = reconcile(
            &[order("D", "10.01"), order("E", "10.00")],
            &[tax("D", "10.00"), tax("E", "10.01")],
        );
        assert_eq!(result.matched[0].amount_diff(), dec("0.01"));
        assert_eq!(result.matched[1].amount_diff(), dec("-0.01"));
        assert_eq!(result.significant_mismatches().count(), 0);
        assert!(!result.has_findings());

        let result = reconcile(&[order("F", "10.02")], &[tax("F", "10.00")]);
        assert_eq!(result.significant_mismatches().count(), 1);
    }

    #[test]
    fn empty_tax_report_leaves_everything_missing() {
        let orders = [order("A", "1.00"), order("B", "2.00")];
        let result = reconcile(&orders, &[]);
        assert_eq!(ids(&result.missing_in_tax), ["A", "B"]);
        assert!(result.matched.is_empty());
        assert!(result.only_in_tax.is_empty());
    }

    #[test]
    fn empty_inputs() {
        assert_eq!(reconcile(&[], &[]), Reconciliation::default());
    }

    #[test]
    fn tax_only_orders_are_listed_separately() {
        let result = reconcile(&[order("A", "1.00")], &[tax("A", "1.00"), tax("Z", "9.00")]);
        assert!(result.missing_in_tax.is_empty());
        assert_eq!(result.matched.len(), 1);
        assert_eq!(result.only_in_tax.len(), 1);
        assert_eq!(result.only_in_tax[0].order_id, "Z");
    }

    #[test]
    fn duplicate_tax_ids_match_once() {
        let mut later = tax("A", "7.00");
        later.date = parse_date_str("2025-08-11 12:00:00");
        let result = reconcile(&[order("A", "7.00")], &[later, tax("A", "6.00")]);

        assert_eq!(result.matched.len(), 1);
        assert_eq!(result.matched[0].tax.total_sum, dec("6.00"));
        assert_eq!(result.duplicate_tax_ids, ["A"]);
    }

    #[test]
    fn duplicate_tax_only_ids_are_listed_once() {
        let mut later = tax("Z", "9.00");
        later.date = parse_date_str("2025-08-12 12:00:00");
        let result = reconcile(
            &[order("A", "1.00")],
            &[later, tax("Y", "2.00"), tax("Z", "8.00"), tax("A", "1.00")],
        );

        let only: Vec<_> = result
            .only_in_tax
            .iter()
            .map(|record| (record.order_id.as_str(), record.total_sum))
            .collect();
        assert_eq!(only, [("Z", dec("8.00")), ("Y", dec("2.00"))]);
        assert_eq!(result.duplicate_tax_ids, ["Z"]);
    }

    #[test]
    fn every_order_is_matched_or_missing() {
        let orders: Vec<_> = (0..50)
            .map(|i| order(&format!("O{i}"), &format!("{i}.25")))
            .collect();
        let taxes: Vec<_> = (0..50)
            .filter(|i| i % 3 != 0)
            .map(|i| tax(&format!("O{i}"), &format!("{i}.20")))
            .chain((0..5).map(|i| tax(&format!("X{i}"), "1.00")))
            .collect();

        let first = reconcile(&orders, &taxes);
        assert_eq!(first.matched.len() + first.missing_in_tax.len(), orders.len());
        for pair in &first.matched {
            assert_eq!(pair.amount_diff(), pair.order.amount - pair.tax.total_sum);
            assert!(!first.missing_in_tax.contains(&pair.order));
        }
        assert_eq!(first.significant_mismatches().count(), first.matched.len());
        assert_eq!(first.only_in_tax.len(), 5);

        let second = reconcile(&orders, &taxes);
        assert_eq!(first, second);
    }

    #[test]
    fn prepare_filters_module_and_month() {
        let month: TargetMonth = "2025-08".parse().unwrap();
        let transaction = |id: &str, source: &str, date: &str, amount: &str| TransactionRecord {
            order_id: id.into(),
            amount: dec(amount),
            date: parse_date_str(date),
            secondary_date: None,
            location: "Main".into(),
            payment_type: "cash".into(),
            payment_gateway: "none".into(),
            source: source.into(),
        };
        let mut july_tax = tax("T3", "3.00");
        july_tax.date = parse_date_str("2025-07-31 23:00:00");
        let mut online_tax = tax("T4", "4.00");
        online_tax.module_name = "online".into();

        let state = ReconcileState::prepare(
            month,
            &Category::new("pos"),
            vec![
                transaction("1", "pos", "2025-08-01 08:00:00", "1.00"),
                transaction("1", "pos", "2025-08-01 08:01:00", "2.00"),
                transaction("MEM2", "pos", "2025-08-02", "50.00"),
                transaction("3", "online", "2025-08-03", "7.00"),
                transaction("4", "pos", "2025-09-01", "9.00"),
                transaction("5", "pos", "n/a", "9.00"),
            ],
            vec![tax("1", "3.00"), july_tax, online_tax],
            false,
        );

        assert_eq!(state.transaction_rows, 2);
        assert_eq!(state.orders.len(), 1);
        assert_eq!(state.orders[0].amount, dec("3.00"));
        assert_eq!(state.tax_records.len(), 1);
        assert_eq!(state.transaction_total(), dec("3.00"));
        assert_eq!(state.tax_total(), dec("3.00"));
        assert!(!state.reconcile().has_findings());
    }

    #[test]
    fn prepare_uses_fallback_date_when_primary_is_empty() {
        let month: TargetMonth = "2025-08".parse().unwrap();
        let record = TransactionRecord {
            order_id: "1".into(),
            amount: dec("5.00"),
            date: parse_date_str("2025-10-01"),
            secondary_date: parse_date_str("2025-08-20"),
            location: String::new(),
            payment_type: String::new(),
            payment_gateway: String::new(),
            source: "pos".into(),
        };

        let state = ReconcileState::prepare(
            month,
            &Category::new("pos"),
            vec![record.clone()],
            vec![],
            true,
        );
        assert_eq!(state.orders.len(), 1);

        let state =
            ReconcileState::prepare(month, &Category::new("pos"), vec![record], vec![], false);
        assert!(state.orders.is_empty());
    }
}
