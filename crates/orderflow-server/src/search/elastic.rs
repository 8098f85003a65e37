//! Elasticsearch over its REST API.

use async_trait::async_trait;
use bytes::Bytes;
use orderflow_core::Order;
use serde_json::json;

use super::{OrderIndexer, OrderSearch, SearchError};
use crate::config::SearchConfig;

#[derive(Debug, Clone)]
pub struct ElasticsearchClient {
    http: reqwest::Client,
    base_url: String,
    index: String,
}

impl ElasticsearchClient {
    pub fn new(config: &SearchConfig) -> Result<Self, SearchError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()?;
        Ok(Self {
            http,
            base_url: config.url.trim_end_matches('/').to_string(),
            index: config.index.clone(),
        })
    }

    fn doc_url(&self, id: &uuid::Uuid) -> String {
        format!("{}/{}/_doc/{}", self.base_url, self.index, id)
    }

    fn search_url(&self) -> String {
        format!("{}/{}/_search", self.base_url, self.index)
    }
}

/// Turns a non-2xx response into `SearchError::Status`, keeping the body.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, SearchError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(SearchError::Status {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl OrderIndexer for ElasticsearchClient {
    async fn upsert(&self, order: &Order) -> Result<(), SearchError> {
        let response = self
            .http
            .put(self.doc_url(&order.id))
            .json(order)
            .send()
            .await?;
        check_status(response).await?;
        tracing::debug!(order_id = %order.id, index = %self.index, "order indexed");
        Ok(())
    }
}

#[async_trait]
impl OrderSearch for ElasticsearchClient {
    async fn search(&self, term: &str) -> Result<Bytes, SearchError> {
        let query = json!({
            "query": {
                "match": { "product_name": term }
            }
        });
        let response = self
            .http
            .post(self.search_url())
            .query(&[("track_total_hits", "true")])
            .json(&query)
            .send()
            .await?;
        Ok(check_status(response).await?.bytes().await?)
    }
}
