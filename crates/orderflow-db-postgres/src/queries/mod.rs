//! SQL query implementations.
//!
//! Queries take a `&mut PgConnection` so the same statement runs against a
//! pooled connection or inside a transaction.

pub mod orders;
