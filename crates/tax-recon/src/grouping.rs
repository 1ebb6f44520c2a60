use crate::{DateTime, Decimal, TransactionRecord};
use std::collections::HashMap;

/// All transaction rows of one order collapsed into a single row.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupedOrder {
    pub order_id: String,
    pub amount: Decimal,
    pub date: Option<DateTime>,
    pub location: String,
    pub payment_type: String,
    pub payment_gateway: String,
    /// Number of transaction rows summed into this order.
    pub line_count: usize,
}

/// Group transaction rows by order id, summing the amounts.
///
/// Descriptive fields come from the earliest dated row of each order; rows
/// without a date rank last and equal dates keep their input order. The
/// result is sorted by date, then order id.
pub fn group_orders(records: impl IntoIterator<Item = TransactionRecord>) -> Vec<GroupedOrder> {
    let mut orders: Vec<GroupedOrder> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for record in records {
        match index.get(&record.order_id) {
            Some(&position) => {
                let order = &mut orders[position];
                order.amount += record.amount;
                order.line_count += 1;
                if is_earlier(record.date, order.date) {
                    order.date = record.date;
                    order.location = record.location;
                    order.payment_type = record.payment_type;
                    order.payment_gateway = record.payment_gateway;
                }
            }
            None => {
                index.insert(record.order_id.clone(), orders.len());
                orders.push(GroupedOrder {
                    order_id: record.order_id,
                    amount: record.amount,
                    date: record.date,
                    location: record.location,
                    payment_type: record.payment_type,
                    payment_gateway: record.payment_gateway,
                    line_count: 1,
                });
            }
        }
    }

    sort_by_date(&mut orders);
    orders
}

pub fn sort_by_date(orders: &mut [GroupedOrder]) {
    orders.sort_by(|a, b| {
        date_key(a.date)
            .cmp(&date_key(b.date))
            .then_with(|| a.order_id.cmp(&b.order_id))
    });
}

// strictly earlier, so ties keep the row seen first
fn is_earlier(candidate: Option<DateTime>, current: Option<DateTime>) -> bool {
    date_key(candidate) < date_key(current)
}

// `None` sorts after every date
fn date_key(date: Option<DateTime>) -> (bool, Option<DateTime>) {
    (date.is_none(), date)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::parse_date_str;

    fn row(order_id: &str, amount: &str, date: &str, payment_type: &str) -> TransactionRecord {
        TransactionRecord {
            order_id: order_id.into(),
            amount: amount.parse().unwrap(),
            date: parse_date_str(date),
            secondary_date: None,
            location: "Main".into(),
            payment_type: payment_type.into(),
            payment_gateway: "stripe".into(),
            source: "pos".into(),
        }
    }

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn split_tenders_are_summed() {
        let orders = group_orders(vec![
            row("A", "6.00", "2025-08-02 10:00:00", "cash"),
            row("B", "5.00", "2025-08-01 09:00:00", "card"),
            row("A", "4.00", "2025-08-02 10:05:00", "card"),
        ]);

        assert_eq!(orders.len(), 2);
        assert_eq!(orders[0].order_id, "B");
        assert_eq!(orders[1].order_id, "A");
        assert_eq!(orders[1].amount, dec("10.00"));
        assert_eq!(orders[1].line_count, 2);
        assert_eq!(orders[1].payment_type, "cash");
    }

    #[test]
    fn earliest_row_wins_regardless_of_input_order() {
        let orders = group_orders(vec![
            row("A", "4.00", "2025-08-02 10:05:00", "card"),
            row("A", "6.00", "2025-08-02 10:00:00", "cash"),
        ]);
        assert_eq!(orders[0].payment_type, "cash");
        assert_eq!(orders[0].date, parse_date_str("2025-08-02 10:00:00"));
    }

    #[test]
    fn equal_dates_keep_first_seen_row() {
        let orders = group_orders(vec![
            row("A", "4.00", "2025-08-02 10:00:00", "card"),
            row("A", "6.00", "2025-08-02 10:00:00", "cash"),
        ]);
        assert_eq!(orders[0].payment_type, "card");
    }

    #[test]
    fn undated_rows_never_win() {
        let orders = group_orders(vec![
            row("A", "1.00", "garbage", "gift"),
            row("A", "2.00", "2025-08-05", "card"),
        ]);
        assert_eq!(orders[0].payment_type, "card");
        assert_eq!(orders[0].amount, dec("3.00"));
    }

    #[test]
    fn grouping_preserves_the_total() {
        let rows = vec![
            row("A", "1.10", "2025-08-01", "cash"),
            row("B", "2.20", "2025-08-02", "cash"),
            row("A", "3.30", "2025-08-03", "card"),
            row("C", "-0.40", "2025-08-04", "card"),
            row("B", "5.55", "2025-08-05", "card"),
        ];
        let before: Decimal = rows.iter().map(|r| r.amount).sum();
        let orders = group_orders(rows);
        let after: Decimal = orders.iter().map(|o| o.amount).sum();
        assert_eq!(before, after);
        assert_eq!(orders.len(), 3);
    }

    #[test]
    fn empty_input() {
        assert!(group_orders(Vec::new()).is_empty());
    }
}
