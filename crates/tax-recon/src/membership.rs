//! Membership sales for one month, checked against the tax report and the
//! membership export.
//!
//! Membership transactions carry a `MEM` order id prefix. Each one is
//! classified as a new or a recurring membership by comparing its date with
//! the subscription start date from the membership export, and gets a tax
//! figure: the tax report's value when the order is there, otherwise an
//! estimate at the most common tax rate observed this month.

use crate::filter::{Category, TargetMonth, filter_month, parse_date};
use crate::records::{TaxColumns, TaxRecord, TransactionColumns, TransactionRecord};
use crate::table::Table;
use crate::{DateTime, Decimal, Result};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::path::PathBuf;

/// Tax rate in percent used when no membership order has a reported tax.
pub fn default_tax_rate() -> Decimal {
    Decimal::new(888, 2)
}

/// Column names of the membership export. Only `id` and `start_date` are
/// needed to classify sales; the rest feed the export tax summary.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "snake_case")]
pub struct MembershipColumns {
    pub id: String,
    pub start_date: String,
    pub type_name: String,
    pub total: String,
    pub tax: String,
    pub updated_at: String,
    /// Date used when nothing in the month matches `updated_at`. May be absent.
    pub purchased_on: String,
}

impl Default for MembershipColumns {
    fn default() -> Self {
        MembershipColumns {
            id: "membershipid".into(),
            start_date: "subscriptionstartdate".into(),
            type_name: "membershiptypename".into(),
            total: "total".into(),
            tax: "tax".into(),
            updated_at: "updatedat".into(),
            purchased_on: "purchasedon".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Membership {
    pub id: String,
    pub start_date: Option<DateTime>,
}

impl Membership {
    /// Rows without a membership id are skipped.
    pub fn from_table(table: &Table, columns: &MembershipColumns) -> Result<Vec<Self>> {
        let id = table.column(&columns.id)?;
        let start_date = table.column(&columns.start_date)?;

        let memberships: Vec<_> = table
            .rows()
            .filter(|row| !row.get(id).is_empty())
            .map(|row| Membership {
                id: row.get(id).to_id_text(),
                start_date: parse_date(row.get(start_date)),
            })
            .collect();

        tracing::info!(
            file = %table.source().display(),
            memberships = memberships.len(),
            "read membership export"
        );
        Ok(memberships)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MembershipType {
    New,
    Recurring,
}

impl fmt::Display for MembershipType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MembershipType::New => f.write_str("New"),
            MembershipType::Recurring => f.write_str("Recurring"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MembershipSale {
    pub transaction: TransactionRecord,
    pub kind: MembershipType,
    /// Whether the order id appears in the tax report for the month.
    pub matched: bool,
    pub reported_tax: Option<Decimal>,
    /// Reported tax, or the estimate at the month's tax rate.
    pub tax: Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MembershipSummaryRow {
    /// `None` for the grand total row.
    pub kind: Option<MembershipType>,
    pub count: usize,
    pub amount: Decimal,
    pub tax: Decimal,
}

impl MembershipSummaryRow {
    /// Tax as a percentage of the amount, `None` when the amount is zero.
    pub fn effective_rate(&self) -> Option<Decimal> {
        if self.amount.is_zero() {
            None
        } else {
            Some(self.tax / self.amount * Decimal::ONE_HUNDRED)
        }
    }

    pub fn label(&self) -> String {
        match self.kind {
            Some(kind) => kind.to_string(),
            None => "Grand Total".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MembershipReport {
    pub month: TargetMonth,
    pub sales: Vec<MembershipSale>,
    /// Percent applied to sales without a reported tax.
    pub tax_rate: Decimal,
}

impl MembershipReport {
    pub fn build(
        month: TargetMonth,
        transactions: Vec<TransactionRecord>,
        tax_records: Vec<TaxRecord>,
        memberships: &[Membership],
    ) -> Self {
        let category = Category::memberships();
        let transactions = filter_month(
            transactions
                .into_iter()
                .filter(|record| category.matches_transaction(record)),
            month,
            |record| record.date,
        );
        let tax_records = filter_month(tax_records, month, |record| record.date);

        let mut start_dates: HashMap<&str, Option<DateTime>> = HashMap::new();
        for membership in memberships {
            start_dates
                .entry(membership.id.as_str())
                .or_insert(membership.start_date);
        }
        let tax_ids: HashSet<&str> = tax_records
            .iter()
            .map(|record| record.order_id.as_str())
            .collect();
        let mut reported: HashMap<&str, Decimal> = HashMap::new();
        for record in &tax_records {
            reported.entry(record.order_id.as_str()).or_insert(record.tax);
        }

        let classified: Vec<_> = transactions
            .into_iter()
            .map(|transaction| {
                let start = start_dates
                    .get(transaction.order_id.as_str())
                    .copied()
                    .flatten();
                let kind = match (transaction.date, start) {
                    (Some(date), Some(start)) if date.date() == start.date() => MembershipType::New,
                    _ => MembershipType::Recurring,
                };
                let matched = tax_ids.contains(transaction.order_id.as_str());
                let reported_tax = reported.get(transaction.order_id.as_str()).copied();
                (transaction, kind, matched, reported_tax)
            })
            .collect();

        let tax_rate = most_common_rate(
            classified
                .iter()
                .filter_map(|(transaction, _, _, tax)| tax.map(|tax| (transaction.amount, tax))),
        )
        .unwrap_or_else(default_tax_rate);

        let sales: Vec<_> = classified
            .into_iter()
            .map(|(transaction, kind, matched, reported_tax)| {
                let tax = reported_tax
                    .unwrap_or_else(|| transaction.amount * tax_rate / Decimal::ONE_HUNDRED);
                MembershipSale {
                    transaction,
                    kind,
                    matched,
                    reported_tax,
                    tax,
                }
            })
            .collect();

        tracing::info!(
            %month,
            sales = sales.len(),
            matched = sales.iter().filter(|sale| sale.matched).count(),
            %tax_rate,
            "built membership report"
        );

        MembershipReport {
            month,
            sales,
            tax_rate,
        }
    }

    pub fn total_amount(&self) -> Decimal {
        self.sales.iter().map(|sale| sale.transaction.amount).sum()
    }

    /// `(orders, amount)` found / not found in the tax report. Orders are
    /// distinct order ids; the amount covers every sale row of those orders.
    pub fn match_status(&self) -> ((usize, Decimal), (usize, Decimal)) {
        let mut matched = (HashSet::new(), Decimal::ZERO);
        let mut not_matched = (HashSet::new(), Decimal::ZERO);
        for sale in &self.sales {
            let bucket = if sale.matched {
                &mut matched
            } else {
                &mut not_matched
            };
            bucket.0.insert(sale.transaction.order_id.as_str());
            bucket.1 += sale.transaction.amount;
        }
        (
            (matched.0.len(), matched.1),
            (not_matched.0.len(), not_matched.1),
        )
    }

    /// One row per membership type followed by a grand total row.
    pub fn summary(&self) -> Vec<MembershipSummaryRow> {
        let mut by_kind: BTreeMap<MembershipType, MembershipSummaryRow> = BTreeMap::new();
        for sale in &self.sales {
            let row = by_kind.entry(sale.kind).or_insert(MembershipSummaryRow {
                kind: Some(sale.kind),
                count: 0,
                amount: Decimal::ZERO,
                tax: Decimal::ZERO,
            });
            row.count += 1;
            row.amount += sale.transaction.amount;
            row.tax += sale.tax;
        }

        let mut rows: Vec<_> = by_kind.into_values().collect();
        let total = MembershipSummaryRow {
            kind: None,
            count: rows.iter().map(|row| row.count).sum(),
            amount: rows.iter().map(|row| row.amount).sum(),
            tax: rows.iter().map(|row| row.tax).sum(),
        };
        rows.push(total);
        rows
    }
}

/// Most frequent tax percentage (to two decimals) among sales with a
/// positive amount. Ties go to the lowest rate.
fn most_common_rate(sales: impl Iterator<Item = (Decimal, Decimal)>) -> Option<Decimal> {
    let mut counts: BTreeMap<Decimal, usize> = BTreeMap::new();
    for (amount, tax) in sales {
        if amount > Decimal::ZERO {
            let rate = (tax / amount * Decimal::ONE_HUNDRED).round_dp(2);
            *counts.entry(rate).or_default() += 1;
        }
    }
    let max = counts.values().copied().max()?;
    counts
        .into_iter()
        .find(|(_, count)| *count == max)
        .map(|(rate, _)| rate)
}

/// Files and columns of a membership run.
#[derive(Debug, Clone)]
pub struct MembershipConfig {
    pub transactions_path: PathBuf,
    pub tax_path: PathBuf,
    pub memberships_path: PathBuf,
    pub month: TargetMonth,
    pub transaction_columns: TransactionColumns,
    pub tax_columns: TaxColumns,
    pub membership_columns: MembershipColumns,
}

impl MembershipConfig {
    pub fn new(
        transactions_path: impl Into<PathBuf>,
        tax_path: impl Into<PathBuf>,
        memberships_path: impl Into<PathBuf>,
        month: TargetMonth,
    ) -> Self {
        MembershipConfig {
            transactions_path: transactions_path.into(),
            tax_path: tax_path.into(),
            memberships_path: memberships_path.into(),
            month,
            transaction_columns: TransactionColumns::default(),
            tax_columns: TaxColumns::default(),
            membership_columns: MembershipColumns::default(),
        }
    }

    pub fn read(&self) -> Result<MembershipReport> {
        let transactions = TransactionRecord::from_table(
            &Table::read(&self.transactions_path)?,
            &self.transaction_columns,
            None,
        )?;
        let tax_records =
            TaxRecord::from_table(&Table::read(&self.tax_path)?, &self.tax_columns)?;
        let memberships = Membership::from_table(
            &Table::read(&self.memberships_path)?,
            &self.membership_columns,
        )?;

        Ok(MembershipReport::build(
            self.month,
            transactions,
            tax_records,
            &memberships,
        ))
    }
}
