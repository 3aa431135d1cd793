//! Per-user RFM-style metrics.
//!
//! Recency is the mean days between orders, frequency the highest order
//! number, and basket size the mean number of products per order. Only
//! users with all three values end up in the result.

use csv::StringRecord;
use std::collections::BTreeMap;

use crate::error::Result;
use crate::table::{JoinIndex, Table};

/// Header of the metrics table, row key first.
pub const RFM_HEADERS: [&str; 4] = ["user_id", "frequency", "avg_days_between_orders", "avg_basket_size"];

/// Aggregate order behaviour of one user.
#[derive(Debug, Clone, PartialEq)]
pub struct UserRfm {
    /// User identifier
    pub user_id: i64,
    /// Highest order sequence number
    pub frequency: i64,
    /// Mean days since the prior order, over orders where it is known
    pub avg_days_between_orders: f64,
    /// Mean number of products per order
    pub avg_basket_size: f64,
}

#[derive(Default)]
struct Mean {
    sum: f64,
    count: usize,
}

impl Mean {
    fn push(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    fn value(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }
}

/// Compute metrics for every user with a complete set of values, ordered by user id.
///
/// `orders` needs `order_id`, `user_id`, `order_number` and
/// `days_since_prior_order`; `order_products` needs `order_id`. Missing
/// recency values are skipped, not zero-filled.
pub fn compute_user_rfm(orders: &Table, order_products: &Table) -> Result<Vec<UserRfm>> {
    let users = orders.integers("user_id")?;
    let order_numbers = orders.integers("order_number")?;
    let days = orders.numbers("days_since_prior_order")?;

    let mut frequency: BTreeMap<i64, Option<i64>> = BTreeMap::new();
    let mut recency: BTreeMap<i64, Mean> = BTreeMap::new();
    for ((user, number), day) in users.iter().zip(&order_numbers).zip(&days) {
        let Some(user) = *user else {
            continue;
        };
        let max = frequency.entry(user).or_insert(None);
        if let Some(number) = *number {
            *max = Some(max.map_or(number, |current| current.max(number)));
        }
        let mean = recency.entry(user).or_default();
        if let Some(day) = *day {
            mean.push(day);
        }
    }

    // Orders without any product rows have no basket size.
    let basket_sizes = order_products.group_size("order_id", "basket_size")?;
    let by_order = JoinIndex::new(&orders.name, &orders.headers, &basket_sizes, "order_id")?;
    let mut basket: BTreeMap<i64, Mean> = BTreeMap::new();
    for (row, user) in orders.rows.iter().zip(&users) {
        let Some(user) = *user else {
            continue;
        };
        for matched in by_order.matches(row) {
            // second column of the group sizes is the count
            if let Some(size) = matched.get(1).and_then(|text| text.parse::<usize>().ok()) {
                basket.entry(user).or_default().push(size as f64);
            }
        }
    }

    let metrics = frequency
        .into_iter()
        .filter_map(|(user_id, frequency)| {
            Some(UserRfm {
                user_id,
                frequency: frequency?,
                avg_days_between_orders: recency.get(&user_id)?.value()?,
                avg_basket_size: basket.get(&user_id)?.value()?,
            })
        })
        .collect();
    Ok(metrics)
}

/// Render metrics as a table keyed by `user_id`.
///
/// Averages use the shortest representation that reads back to the same
/// value, always with a fractional part (`5.0`, `1.5`).
pub fn to_table(metrics: &[UserRfm]) -> Table {
    let mut table = Table::new("user_rfm_metrics", RFM_HEADERS.iter().map(ToString::to_string).collect());
    table.rows = metrics
        .iter()
        .map(|m| {
            StringRecord::from(vec![
                m.user_id.to_string(),
                m.frequency.to_string(),
                format!("{:?}", m.avg_days_between_orders),
                format!("{:?}", m.avg_basket_size),
            ])
        })
        .collect();
    table
}
