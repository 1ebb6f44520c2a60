//! Typed rows of the transaction report and the tax report.

use crate::filter::parse_date;
use crate::table::{Table, TableRow};
use crate::{DateTime, Decimal, Result};
use anyhow::Context;
use serde::Deserialize;

/// Column names of the transaction report.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "snake_case")]
pub struct TransactionColumns {
    pub order_id: String,
    pub date: String,
    pub amount: String,
    pub location: String,
    pub payment_type: String,
    pub payment_gateway: String,
    pub source: String,
}

impl Default for TransactionColumns {
    fn default() -> Self {
        TransactionColumns {
            order_id: "Order ID".into(),
            date: "Transaction Date".into(),
            amount: "Amount".into(),
            location: "Location".into(),
            payment_type: "Payment Type".into(),
            payment_gateway: "Payment Gateway".into(),
            source: "Source".into(),
        }
    }
}

/// Column names of the tax report. The status columns may be absent.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "snake_case")]
pub struct TaxColumns {
    pub order_id: String,
    pub date: String,
    pub total_sum: String,
    pub tip: String,
    pub tax: String,
    pub module_name: String,
    pub order_status: String,
    pub payment_status: String,
}

impl Default for TaxColumns {
    fn default() -> Self {
        TaxColumns {
            order_id: "Order ID".into(),
            date: "Date".into(),
            total_sum: "Total Sum".into(),
            tip: "Tip".into(),
            tax: "Tax".into(),
            module_name: "Module Name".into(),
            order_status: "Order Status".into(),
            payment_status: "Payment Status".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransactionRecord {
    pub order_id: String,
    pub amount: Decimal,
    pub date: Option<DateTime>,
    /// Alternate date, only read when a fallback date column is configured.
    pub secondary_date: Option<DateTime>,
    pub location: String,
    pub payment_type: String,
    pub payment_gateway: String,
    pub source: String,
}

impl TransactionRecord {
    pub fn from_table(
        table: &Table,
        columns: &TransactionColumns,
        fallback_date: Option<&str>,
    ) -> Result<Vec<Self>> {
        let order_id = table.column(&columns.order_id)?;
        let date = table.column(&columns.date)?;
        let amount = table.column(&columns.amount)?;
        let location = table.column(&columns.location)?;
        let payment_type = table.column(&columns.payment_type)?;
        let payment_gateway = table.column(&columns.payment_gateway)?;
        let source = table.column(&columns.source)?;
        let secondary = fallback_date.map(|name| table.column(name)).transpose()?;

        let mut records = Vec::with_capacity(table.len());
        for row in table.rows() {
            if row.is_blank() {
                continue;
            }
            records.push(TransactionRecord {
                order_id: row.get(order_id).to_id_text(),
                amount: money(table, &row, amount)?,
                date: parse_date(row.get(date)),
                secondary_date: secondary.and_then(|column| parse_date(row.get(column))),
                location: row.get(location).to_text(),
                payment_type: row.get(payment_type).to_text(),
                payment_gateway: row.get(payment_gateway).to_text(),
                source: row.get(source).to_text(),
            });
        }

        tracing::info!(
            file = %table.source().display(),
            records = records.len(),
            "read transaction report"
        );
        Ok(records)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TaxRecord {
    pub order_id: String,
    pub date: Option<DateTime>,
    pub total_sum: Decimal,
    pub tip: Decimal,
    pub tax: Decimal,
    pub module_name: String,
    pub order_status: Option<String>,
    pub payment_status: Option<String>,
}

impl TaxRecord {
    pub fn from_table(table: &Table, columns: &TaxColumns) -> Result<Vec<Self>> {
        let order_id = table.column(&columns.order_id)?;
        let date = table.column(&columns.date)?;
        let total_sum = table.column(&columns.total_sum)?;
        let tip = table.column(&columns.tip)?;
        let tax = table.column(&columns.tax)?;
        let module_name = table.column(&columns.module_name)?;
        let order_status = table.optional_column(&columns.order_status);
        let payment_status = table.optional_column(&columns.payment_status);

        let text = |row: &TableRow<'_>, column: Option<usize>| {
            column
                .map(|column| row.get(column).to_text())
                .filter(|value| !value.is_empty())
        };

        let mut records = Vec::with_capacity(table.len());
        for row in table.rows() {
            if row.is_blank() {
                continue;
            }
            records.push(TaxRecord {
                order_id: row.get(order_id).to_id_text(),
                date: parse_date(row.get(date)),
                total_sum: money(table, &row, total_sum)?,
                tip: money(table, &row, tip)?,
                tax: money(table, &row, tax)?,
                module_name: row.get(module_name).to_text(),
                order_status: text(&row, order_status),
                payment_status: text(&row, payment_status),
            });
        }

        tracing::info!(
            file = %table.source().display(),
            records = records.len(),
            "read tax report"
        );
        Ok(records)
    }

    pub fn order_status_or_na(&self) -> &str {
        self.order_status.as_deref().unwrap_or("N/A")
    }

    pub fn payment_status_or_na(&self) -> &str {
        self.payment_status.as_deref().unwrap_or("N/A")
    }
}

// empty money cells count as zero, as a spreadsheet sum would
pub(crate) fn money(table: &Table, row: &TableRow<'_>, column: usize) -> Result<Decimal> {
    Ok(optional_money(table, row, column)?.unwrap_or_default())
}

pub(crate) fn optional_money(
    table: &Table,
    row: &TableRow<'_>,
    column: usize,
) -> Result<Option<Decimal>> {
    row.get(column).to_decimal().with_context(|| {
        format!(
            "Invalid value in column '{}' at row {} of {}",
            table.headers()[column],
            row.line(),
            table.source().display()
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Cell;

    fn text(s: &str) -> Cell {
        Cell::Text(s.to_owned())
    }

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn transaction_table(rows: Vec<Vec<Cell>>) -> Table {
        Table::new(
            "trans.xlsx",
            headers(&[
                "Order ID",
                "Transaction Date",
                "Amount",
                "Location",
                "Payment Type",
                "Payment Gateway",
                "Source",
            ]),
            rows,
        )
    }

    #[test]
    fn maps_transaction_rows() {
        let table = transaction_table(vec![
            vec![
                Cell::Number(1754594250742.0),
                text("2025-08-07 10:15:00"),
                Cell::Number(14.54),
                text("Main"),
                text("physicalCard"),
                text("stripe"),
                text("pos"),
            ],
            vec![Cell::Empty; 7],
            vec![
                text("MEM-1"),
                text("not a date"),
                Cell::Empty,
                text("Main"),
                text("cash"),
                Cell::Empty,
                text("pos"),
            ],
        ]);

        let records =
            TransactionRecord::from_table(&table, &TransactionColumns::default(), None).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].order_id, "1754594250742");
        assert_eq!(records[0].amount, "14.54".parse::<Decimal>().unwrap());
        assert!(records[0].date.is_some());
        assert_eq!(records[0].payment_gateway, "stripe");
        assert_eq!(records[1].date, None);
        assert!(records[1].amount.is_zero());
        assert_eq!(records[1].payment_gateway, "");
    }

    #[test]
    fn missing_transaction_column_is_fatal() {
        let table = Table::new("trans.xlsx", headers(&["Order ID", "Amount"]), vec![]);
        let error = TransactionRecord::from_table(&table, &TransactionColumns::default(), None)
            .unwrap_err()
            .to_string();
        assert!(error.starts_with("Column 'Transaction Date' not found in trans.xlsx"));
    }

    #[test]
    fn fallback_column_must_exist_when_configured() {
        let table = transaction_table(vec![]);
        assert!(
            TransactionRecord::from_table(
                &table,
                &TransactionColumns::default(),
                Some("Purchased On")
            )
            .is_err()
        );
    }

    #[test]
    fn invalid_amount_reports_row() {
        let table = transaction_table(vec![vec![
            text("1"),
            text("2025-08-01"),
            text("ten dollars"),
            text("Main"),
            text("cash"),
            text("none"),
            text("pos"),
        ]]);
        let error = TransactionRecord::from_table(&table, &TransactionColumns::default(), None)
            .unwrap_err()
            .to_string();
        assert_eq!(
            error,
            "Invalid value in column 'Amount' at row 2 of trans.xlsx"
        );
    }

    #[test]
    fn tax_status_columns_are_optional() {
        let table = Table::new(
            "tax.xlsx",
            headers(&["Order ID", "Date", "Total Sum", "Tip", "Tax", "Module Name"]),
            vec![vec![
                text("1001"),
                text("2025-08-02"),
                text("10.00"),
                text("1.00"),
                text("0.80"),
                text("pos"),
            ]],
        );
        let records = TaxRecord::from_table(&table, &TaxColumns::default()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].order_status, None);
        assert_eq!(records[0].order_status_or_na(), "N/A");
        assert_eq!(records[0].payment_status_or_na(), "N/A");
        assert_eq!(records[0].tax, "0.80".parse::<Decimal>().unwrap());
    }
}
