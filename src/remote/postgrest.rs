//! PostgREST-backed gateway.
//!
//! Speaks the row-filter dialect of a hosted Postgres service: equality
//! filters as `column=eq.value` query parameters, ordering as
//! `order=column.direction`, and `Prefer: return=representation` to get
//! stored rows back from writes. Authentication is the service access key
//! sent as both `apikey` and bearer token.
//!
//! The change feed is implemented by polling the band-scoped table and
//! comparing a hash of the response body. That catches inserts, updates,
//! and deletes alike, at the cost of a small periodic read; the trait
//! only promises best-effort delivery.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::remote::{ChangeFeed, ChangeNotice, QueryOptions, RemoteGateway, Result};
use crate::shared::config::AppConfig;
use crate::shared::error::RemoteError;

use async_trait::async_trait;

/// Buffered notices per feed; a slow consumer coalesces into re-queries
/// anyway, so a small buffer is enough.
const FEED_BUFFER: usize = 8;

/// Gateway to a PostgREST-compatible remote store.
#[derive(Debug, Clone)]
pub struct PostgrestGateway {
    client: Client,
    base_url: String,
    api_key: String,
    poll_interval: Duration,
}

impl PostgrestGateway {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.remote_url.clone(),
            api_key: config.api_key.clone(),
            poll_interval: config.poll_interval,
        }
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.client
            .request(method, url)
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", self.api_key))
    }

    /// Map a non-success response to a `RemoteError`.
    async fn reject(response: Response) -> RemoteError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                RemoteError::Auth(format!("{status}: {body}"))
            }
            _ => RemoteError::Rejected(format!("{status}: {body}")),
        }
    }
}

/// Render a filter value the way PostgREST expects it in a query string.
fn filter_repr(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn query_params(options: &QueryOptions) -> Vec<(String, String)> {
    let mut params = vec![("select".to_string(), "*".to_string())];
    if let Some(band_id) = &options.band_id {
        params.push(("band_id".to_string(), format!("eq.{band_id}")));
    }
    for (column, value) in &options.filters {
        params.push((column.clone(), format!("eq.{}", filter_repr(value))));
    }
    if let Some(order) = &options.order_by {
        let direction = if order.ascending { "asc" } else { "desc" };
        params.push(("order".to_string(), format!("{}.{direction}", order.column)));
    }
    params
}

#[async_trait]
impl RemoteGateway for PostgrestGateway {
    async fn query(&self, table: &str, options: &QueryOptions) -> Result<Vec<Value>> {
        let response = self
            .request(Method::GET, &self.table_url(table))
            .query(&query_params(options))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::reject(response).await);
        }

        let rows: Vec<Value> = response
            .json()
            .await
            .map_err(|e| RemoteError::Payload(e.to_string()))?;
        Ok(rows)
    }

    async fn insert(&self, table: &str, record: &Value) -> Result<Value> {
        let response = self
            .request(Method::POST, &self.table_url(table))
            .header("Prefer", "return=representation")
            .json(&[record])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::reject(response).await);
        }

        let mut rows: Vec<Value> = response
            .json()
            .await
            .map_err(|e| RemoteError::Payload(e.to_string()))?;
        rows.pop()
            .ok_or_else(|| RemoteError::Payload("insert returned no representation".into()))
    }

    async fn update(&self, table: &str, id: &str, fields: &Value) -> Result<()> {
        let response = self
            .request(Method::PATCH, &self.table_url(table))
            .query(&[("id", format!("eq.{id}"))])
            .header("Prefer", "return=representation")
            .json(fields)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::reject(response).await);
        }

        // PostgREST answers 200 with an empty array when the filter
        // matched nothing; surface that as a missing row.
        let rows: Vec<Value> = response
            .json()
            .await
            .map_err(|e| RemoteError::Payload(e.to_string()))?;
        if rows.is_empty() {
            return Err(RemoteError::NotFound {
                table: table.to_string(),
                id: id.to_string(),
            });
        }
        Ok(())
    }

    async fn delete(&self, table: &str, id: &str) -> Result<()> {
        let response = self
            .request(Method::DELETE, &self.table_url(table))
            .query(&[("id", format!("eq.{id}"))])
            .send()
            .await?;

        // Deleting a row that is already gone counts as success.
        if response.status().is_success() || response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        Err(Self::reject(response).await)
    }

    async fn health(&self) -> Result<()> {
        // Any HTTP answer means the store is reachable; auth problems are
        // a different failure mode than being offline.
        self.request(Method::GET, &format!("{}/rest/v1/", self.base_url))
            .send()
            .await?;
        Ok(())
    }

    fn subscribe(&self, table: &str, band_id: &str) -> ChangeFeed {
        let (tx, rx) = mpsc::channel(FEED_BUFFER);
        let gateway = self.clone();
        let table = table.to_string();
        let band_id = band_id.to_string();

        let task = tokio::spawn(async move {
            let url = gateway.table_url(&table);
            let params = [
                ("select".to_string(), "*".to_string()),
                ("band_id".to_string(), format!("eq.{band_id}")),
            ];
            let mut watermark: Option<u64> = None;
            let mut ticker = tokio::time::interval(gateway.poll_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;

                let body = match gateway
                    .request(Method::GET, &url)
                    .query(&params)
                    .send()
                    .await
                {
                    Ok(response) if response.status().is_success() => {
                        match response.text().await {
                            Ok(body) => body,
                            Err(_) => continue,
                        }
                    }
                    // Transport or auth trouble: the feed stays quiet and
                    // tries again next tick.
                    _ => continue,
                };

                let mut hasher = DefaultHasher::new();
                body.hash(&mut hasher);
                let digest = hasher.finish();

                match watermark {
                    None => watermark = Some(digest),
                    Some(previous) if previous != digest => {
                        watermark = Some(digest);
                        let notice = ChangeNotice {
                            table: table.clone(),
                        };
                        if tx.send(notice).await.is_err() {
                            break;
                        }
                    }
                    Some(_) => {}
                }
            }
        });

        ChangeFeed::new(rx, task)
    }
}
