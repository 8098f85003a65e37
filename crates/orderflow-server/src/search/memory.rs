//! In-process search index with Elasticsearch-shaped responses.

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use orderflow_core::Order;
use serde_json::json;
use uuid::Uuid;

use super::{OrderIndexer, OrderSearch, SearchError};

#[derive(Debug, Default)]
pub struct MemorySearchIndex {
    docs: DashMap<Uuid, Order>,
}

impl MemorySearchIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    pub fn get(&self, id: Uuid) -> Option<Order> {
        self.docs.get(&id).map(|doc| doc.clone())
    }
}

fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
}

/// Any query token equal to any product name token, ignoring case.
fn matches(query: &[String], product_name: &str) -> bool {
    tokens(product_name).any(|t| query.contains(&t))
}

#[async_trait]
impl OrderIndexer for MemorySearchIndex {
    async fn upsert(&self, order: &Order) -> Result<(), SearchError> {
        self.docs.insert(order.id, order.clone());
        Ok(())
    }
}

#[async_trait]
impl OrderSearch for MemorySearchIndex {
    async fn search(&self, term: &str) -> Result<Bytes, SearchError> {
        let query: Vec<String> = tokens(term).collect();
        let mut found: Vec<Order> = self
            .docs
            .iter()
            .filter(|doc| matches(&query, &doc.product_name))
            .map(|doc| doc.clone())
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let hits: Vec<_> = found
            .iter()
            .map(|order| {
                json!({
                    "_index": "orders",
                    "_id": order.id,
                    "_score": 1.0,
                    "_source": order,
                })
            })
            .collect();
        let body = json!({
            "timed_out": false,
            "hits": {
                "total": { "value": hits.len(), "relation": "eq" },
                "hits": hits,
            }
        });
        Ok(Bytes::from(serde_json::to_vec(&body)?))
    }
}
