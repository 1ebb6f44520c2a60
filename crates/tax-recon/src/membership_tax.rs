//! Membership tax summary taken straight from the membership export.
//!
//! The export has one row per membership purchase with its type, total and
//! tax. A row belongs to the month by its `updatedat` date; when no row does,
//! the `purchasedon` date is used instead.

use crate::filter::{TargetMonth, filter_month_or_fallback, parse_date};
use crate::membership::{MembershipColumns, default_tax_rate};
use crate::records::{money, optional_money};
use crate::table::Table;
use crate::{DateTime, Decimal, Result};
use std::collections::BTreeMap;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq)]
pub struct ExportSale {
    pub id: String,
    pub type_name: String,
    pub total: Decimal,
    /// `None` when the export leaves the tax empty.
    pub tax: Option<Decimal>,
    pub updated_at: Option<DateTime>,
    pub purchased_on: Option<DateTime>,
}

impl ExportSale {
    /// Rows with neither an id nor a total are skipped. The `purchased_on`
    /// column may be missing from the export.
    pub fn from_table(table: &Table, columns: &MembershipColumns) -> Result<Vec<Self>> {
        let id = table.column(&columns.id)?;
        let type_name = table.column(&columns.type_name)?;
        let total = table.column(&columns.total)?;
        let tax = table.column(&columns.tax)?;
        let updated_at = table.column(&columns.updated_at)?;
        let purchased_on = table.optional_column(&columns.purchased_on);

        let mut sales = Vec::with_capacity(table.len());
        for row in table.rows() {
            if row.get(id).is_empty() && row.get(total).is_empty() {
                continue;
            }
            let name = row.get(type_name).to_text();
            sales.push(ExportSale {
                id: row.get(id).to_id_text(),
                type_name: if name.is_empty() { "N/A".into() } else { name },
                total: money(table, &row, total)?,
                tax: optional_money(table, &row, tax)?,
                updated_at: parse_date(row.get(updated_at)),
                purchased_on: purchased_on.and_then(|column| parse_date(row.get(column))),
            });
        }

        tracing::info!(
            file = %table.source().display(),
            sales = sales.len(),
            "read membership export sales"
        );
        Ok(sales)
    }

    /// Reported tax as a percentage of the total, `None` for a zero total.
    pub fn tax_percentage(&self) -> Option<Decimal> {
        (self.total > Decimal::ZERO)
            .then(|| self.tax.unwrap_or_default() / self.total * Decimal::ONE_HUNDRED)
    }

    /// The reported tax when positive, otherwise the total at the default rate.
    pub fn final_tax(&self) -> Decimal {
        match self.tax {
            Some(tax) if tax > Decimal::ZERO => tax,
            _ => self.total * default_tax_rate() / Decimal::ONE_HUNDRED,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeSummaryRow {
    /// `None` for the grand total row.
    pub type_name: Option<String>,
    pub count: usize,
    pub total: Decimal,
    pub tax: Decimal,
}

impl TypeSummaryRow {
    pub fn effective_rate(&self) -> Option<Decimal> {
        (self.total > Decimal::ZERO).then(|| self.tax / self.total * Decimal::ONE_HUNDRED)
    }

    pub fn label(&self) -> &str {
        self.type_name.as_deref().unwrap_or("Grand Total")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MembershipTaxReport {
    pub month: TargetMonth,
    pub sales: Vec<ExportSale>,
    /// Sales were selected by `purchased_on` because no `updated_at` fell in the month.
    pub used_fallback: bool,
}

impl MembershipTaxReport {
    pub fn build(month: TargetMonth, sales: Vec<ExportSale>) -> Self {
        let purchased_on = |sale: &ExportSale| sale.purchased_on;
        let sales = filter_month_or_fallback(
            sales,
            month,
            |sale| sale.updated_at,
            Some(&purchased_on as &dyn Fn(&ExportSale) -> Option<DateTime>),
        );
        let used_fallback = !sales.is_empty()
            && !sales
                .iter()
                .any(|sale| sale.updated_at.is_some_and(|date| month.contains(&date)));

        tracing::info!(
            %month,
            sales = sales.len(),
            used_fallback,
            "built membership tax summary"
        );
        MembershipTaxReport {
            month,
            sales,
            used_fallback,
        }
    }

    pub fn total_amount(&self) -> Decimal {
        self.sales.iter().map(|sale| sale.total).sum()
    }

    pub fn total_final_tax(&self) -> Decimal {
        self.sales.iter().map(ExportSale::final_tax).sum()
    }

    /// One row per membership type name in name order, then the grand total.
    /// Empty taxes count as zero here.
    pub fn summary(&self) -> Vec<TypeSummaryRow> {
        let mut by_type: BTreeMap<&str, TypeSummaryRow> = BTreeMap::new();
        for sale in &self.sales {
            let row = by_type
                .entry(sale.type_name.as_str())
                .or_insert_with(|| TypeSummaryRow {
                    type_name: Some(sale.type_name.clone()),
                    count: 0,
                    total: Decimal::ZERO,
                    tax: Decimal::ZERO,
                });
            row.count += 1;
            row.total += sale.total;
            row.tax += sale.tax.unwrap_or_default();
        }

        let mut rows: Vec<_> = by_type.into_values().collect();
        let total = TypeSummaryRow {
            type_name: None,
            count: rows.iter().map(|row| row.count).sum(),
            total: rows.iter().map(|row| row.total).sum(),
            tax: rows.iter().map(|row| row.tax).sum(),
        };
        rows.push(total);
        rows
    }
}

#[derive(Debug, Clone)]
pub struct MembershipTaxConfig {
    pub memberships_path: PathBuf,
    pub month: TargetMonth,
    pub columns: MembershipColumns,
}

impl MembershipTaxConfig {
    pub fn new(memberships_path: impl Into<PathBuf>, month: TargetMonth) -> Self {
        MembershipTaxConfig {
            memberships_path: memberships_path.into(),
            month,
            columns: MembershipColumns::default(),
        }
    }

    pub fn read(&self) -> Result<MembershipTaxReport> {
        let sales = ExportSale::from_table(&Table::read(&self.memberships_path)?, &self.columns)?;
        Ok(MembershipTaxReport::build(self.month, sales))
    }
}
