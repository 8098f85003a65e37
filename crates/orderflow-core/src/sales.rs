//! Daily sales aggregate rows.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::order::Order;

/// Maximum number of rows served from the daily sales view.
pub const DAILY_SALES_LIMIT: usize = 30;

/// One row of the daily sales view: revenue summed per UTC creation date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySale {
    pub date: NaiveDate,
    pub total_revenue: f64,
}

impl DailySale {
    /// Aggregates orders by UTC creation date, newest date first.
    ///
    /// Returns every date; callers that serve the view truncate to
    /// [`DAILY_SALES_LIMIT`].
    pub fn aggregate<'a>(orders: impl IntoIterator<Item = &'a Order>) -> Vec<DailySale> {
        let mut by_date: BTreeMap<NaiveDate, f64> = BTreeMap::new();
        for order in orders {
            *by_date.entry(order.created_at.date_naive()).or_default() += order.amount;
        }
        by_date
            .into_iter()
            .rev()
            .map(|(date, total_revenue)| DailySale {
                date,
                total_revenue,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    fn order_on(day: u32, hour: u32, amount: f64) -> Order {
        Order::with_id(
            Uuid::new_v4(),
            "Widget",
            amount,
            Utc.with_ymd_and_hms(2024, 3, day, hour, 0, 0).unwrap(),
        )
    }

    #[test]
    fn aggregate_sums_per_day_newest_first() {
        let orders = vec![
            order_on(1, 9, 10.0),
            order_on(1, 23, 5.5),
            order_on(3, 0, 100.0),
            order_on(2, 12, 1.0),
        ];

        let rows = DailySale::aggregate(&orders);

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].date, NaiveDate::from_ymd_opt(2024, 3, 3).unwrap());
        assert_eq!(rows[0].total_revenue, 100.0);
        assert_eq!(rows[1].date, NaiveDate::from_ymd_opt(2024, 3, 2).unwrap());
        assert_eq!(rows[2].date, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert_eq!(rows[2].total_revenue, 15.5);
    }

    #[test]
    fn date_serializes_as_calendar_day() {
        let row = DailySale {
            date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            total_revenue: 12.5,
        };
        let value = serde_json::to_value(&row).unwrap();
        assert_eq!(value["date"], "2024-03-01");
        assert_eq!(value["total_revenue"], 12.5);
    }
}
