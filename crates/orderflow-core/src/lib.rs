pub mod error;
pub mod id;
pub mod order;
pub mod sales;

pub use error::{CoreError, Result};
pub use id::{generate_id, parse_id};
pub use order::{BulkOrderRequest, NewOrder, Order};
pub use sales::{DAILY_SALES_LIMIT, DailySale};
