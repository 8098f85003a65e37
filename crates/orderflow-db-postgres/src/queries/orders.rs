//! Order and daily sales queries.

use chrono::{DateTime, NaiveDate, Utc};
use orderflow_core::{DAILY_SALES_LIMIT, DailySale, Order};
use orderflow_storage::{InsertOutcome, StorageError};
use sqlx_core::query::query;
use sqlx_core::query_as::query_as;
use sqlx_postgres::PgConnection;
use uuid::Uuid;

use crate::error::map_sqlx_error;

type OrderRow = (Uuid, String, f64, DateTime<Utc>);

fn row_to_order((id, product_name, amount, created_at): OrderRow) -> Order {
    Order::with_id(id, product_name, amount, created_at)
}

/// Inserts the order unless its id is already present.
pub async fn insert_if_absent(
    conn: &mut PgConnection,
    order: &Order,
) -> Result<InsertOutcome, StorageError> {
    let result = query(
        "INSERT INTO orders (id, product_name, amount, created_at) \
         VALUES ($1, $2, $3, $4) \
         ON CONFLICT (id) DO NOTHING",
    )
    .bind(order.id)
    .bind(&order.product_name)
    .bind(order.amount)
    .bind(order.created_at)
    .execute(conn)
    .await
    .map_err(|e| map_sqlx_error("insert_if_absent", e))?;

    if result.rows_affected() == 0 {
        Ok(InsertOutcome::AlreadyPresent)
    } else {
        Ok(InsertOutcome::Inserted)
    }
}

/// Plain insert; a duplicate id is an error. Used inside transactions.
pub async fn insert(conn: &mut PgConnection, order: &Order) -> Result<(), StorageError> {
    query(
        "INSERT INTO orders (id, product_name, amount, created_at) \
         VALUES ($1, $2, $3, $4)",
    )
    .bind(order.id)
    .bind(&order.product_name)
    .bind(order.amount)
    .bind(order.created_at)
    .execute(conn)
    .await
    .map_err(|e| map_sqlx_error("insert", e))?;
    Ok(())
}

pub async fn get_by_id(conn: &mut PgConnection, id: Uuid) -> Result<Order, StorageError> {
    let row: Option<OrderRow> = query_as(
        "SELECT id, product_name, amount, created_at FROM orders WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(conn)
    .await
    .map_err(|e| map_sqlx_error("get_by_id", e))?;

    row.map(row_to_order)
        .ok_or_else(|| StorageError::not_found(id))
}

pub async fn daily_sales(conn: &mut PgConnection) -> Result<Vec<DailySale>, StorageError> {
    let rows: Vec<(NaiveDate, f64)> = query_as(
        "SELECT sale_date, total_revenue FROM daily_sales_mv \
         ORDER BY sale_date DESC LIMIT $1",
    )
    .bind(DAILY_SALES_LIMIT as i64)
    .fetch_all(conn)
    .await
    .map_err(|e| map_sqlx_error("daily_sales", e))?;

    Ok(rows
        .into_iter()
        .map(|(date, total_revenue)| DailySale {
            date,
            total_revenue,
        })
        .collect())
}

/// Rebuilds the view without blocking its readers.
pub async fn refresh_daily_sales(conn: &mut PgConnection) -> Result<(), StorageError> {
    query("REFRESH MATERIALIZED VIEW CONCURRENTLY daily_sales_mv")
        .execute(conn)
        .await
        .map_err(|e| map_sqlx_error("refresh_daily_sales", e))?;
    Ok(())
}
