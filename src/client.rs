//! HTTP client for the remote index service.
//!
//! Wraps the service's REST contract: schema read (`GET /indexes/{name}`),
//! index create (`POST /indexes`), index delete (`DELETE /indexes/{name}`),
//! paginated document search (`POST /indexes/{name}/docs/search`), and bulk
//! document upload (`POST /indexes/{name}/docs/index`). Authentication is a
//! per-service `api-key` header; an `api-version` query parameter is
//! appended when configured.
//!
//! # Retry Strategy
//!
//! Transient conditions are retried with exponential backoff
//! (1s, 2s, 4s, ..., capped at 2^5) up to `max_retries`:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//!
//! Every request carries the configured timeout, so a stuck call fails its
//! job instead of stalling the whole pool.

use anyhow::Result;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

use crate::config::{ExportConfig, ServiceConfig};
use crate::error::MirrorError;

/// Cheaply cloneable handle to one index service; clones share the
/// underlying connection pool, so each scheduled job can own one.
#[derive(Clone)]
pub struct SearchClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    api_version: Option<String>,
    max_retries: u32,
}

/// One page request against an index: `search=*` narrowed by a filter,
/// ordered for deterministic re-pagination, windowed by `top`/`skip`.
#[derive(Debug, Clone)]
pub struct SearchQuery {
    pub filter: Option<String>,
    pub order_by: Option<String>,
    pub top: usize,
    pub skip: usize,
    pub include_count: bool,
}

impl SearchQuery {
    fn to_body(&self) -> Value {
        let mut body = serde_json::json!({
            "search": "*",
            "top": self.top,
            "skip": self.skip,
            "count": self.include_count,
        });
        if let Some(filter) = &self.filter {
            body["filter"] = Value::String(filter.clone());
        }
        if let Some(order_by) = &self.order_by {
            body["orderby"] = Value::String(order_by.clone());
        }
        body
    }
}

/// One page of search results. `total_count` is only present when the
/// query asked for it.
#[derive(Debug, Deserialize)]
pub struct SearchPage {
    #[serde(rename = "@odata.count")]
    pub total_count: Option<i64>,
    #[serde(default)]
    pub value: Vec<Value>,
}

/// Terminal failure of one logical request, after retries. The status is
/// `None` for transport-level failures.
#[derive(Debug)]
pub struct RequestFailure {
    pub status: Option<reqwest::StatusCode>,
    pub reason: String,
}

impl SearchClient {
    pub fn connect(service: &ServiceConfig, tuning: &ExportConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(tuning.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            endpoint: service.endpoint.trim_end_matches('/').to_string(),
            api_key: service.api_key.clone(),
            api_version: service.api_version.clone(),
            max_retries: tuning.max_retries,
        })
    }

    /// Fetch the raw schema document for an index. The body is returned
    /// byte-for-byte so it can be persisted verbatim.
    pub async fn get_index_schema(&self, index: &str) -> Result<String, MirrorError> {
        let path = format!("indexes/{}", index);
        let response = self
            .send_with_retry(|| self.request(reqwest::Method::GET, &path))
            .await
            .map_err(|failure| MirrorError::SchemaFetch {
                index: index.to_string(),
                reason: failure.reason,
            })?;
        response.text().await.map_err(|e| MirrorError::SchemaFetch {
            index: index.to_string(),
            reason: e.to_string(),
        })
    }

    /// Create an index from a raw schema document. Non-2xx is fatal for
    /// the run — the caller must not proceed to upload documents.
    pub async fn create_index(&self, index: &str, schema: &str) -> Result<(), MirrorError> {
        self.send_with_retry(|| {
            self.request(reqwest::Method::POST, "indexes")
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(schema.to_string())
        })
        .await
        .map_err(|failure| MirrorError::IndexCreate {
            index: index.to_string(),
            reason: failure.reason,
        })?;
        Ok(())
    }

    /// Delete an index if it exists. Returns whether one was actually
    /// deleted; an absent index is not an error.
    pub async fn delete_index(&self, index: &str) -> Result<bool, MirrorError> {
        let path = format!("indexes/{}", index);
        match self
            .send_with_retry(|| self.request(reqwest::Method::DELETE, &path))
            .await
        {
            Ok(_) => Ok(true),
            Err(failure) if failure.status == Some(reqwest::StatusCode::NOT_FOUND) => Ok(false),
            Err(failure) => Err(MirrorError::IndexDelete {
                index: index.to_string(),
                reason: failure.reason,
            }),
        }
    }

    /// Run one page query against an index.
    pub async fn search(&self, index: &str, query: &SearchQuery) -> Result<SearchPage, MirrorError> {
        let path = format!("indexes/{}/docs/search", index);
        let body = query.to_body();
        let response = self
            .send_with_retry(|| self.request(reqwest::Method::POST, &path).json(&body))
            .await
            .map_err(|failure| MirrorError::Query {
                index: index.to_string(),
                skip: query.skip,
                reason: failure.reason,
            })?;
        response
            .json::<SearchPage>()
            .await
            .map_err(|e| MirrorError::Query {
                index: index.to_string(),
                skip: query.skip,
                reason: format!("invalid response body: {}", e),
            })
    }

    /// Total document count of an index, via a minimal counting query.
    pub async fn document_count(&self, index: &str) -> Result<i64, MirrorError> {
        let query = SearchQuery {
            filter: None,
            order_by: None,
            top: 1,
            skip: 0,
            include_count: true,
        };
        let page = self.search(index, &query).await?;
        page.total_count.ok_or_else(|| MirrorError::Query {
            index: index.to_string(),
            skip: 0,
            reason: "response did not include a total count".to_string(),
        })
    }

    /// Upload one document batch body (`{"value": [...]}`) verbatim.
    /// Error mapping is left to the caller, which knows the file involved.
    pub async fn upload_documents(
        &self,
        index: &str,
        payload: &str,
    ) -> Result<(), RequestFailure> {
        let path = format!("indexes/{}/docs/index", index);
        self.send_with_retry(|| {
            self.request(reqwest::Method::POST, &path)
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(payload.to_string())
        })
        .await?;
        Ok(())
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let mut builder = self
            .http
            .request(method, format!("{}/{}", self.endpoint, path))
            .header("api-key", &self.api_key);
        if let Some(version) = &self.api_version {
            builder = builder.query(&[("api-version", version)]);
        }
        builder
    }

    async fn send_with_retry<B>(&self, build: B) -> Result<reqwest::Response, RequestFailure>
    where
        B: Fn() -> reqwest::RequestBuilder,
    {
        let mut last = RequestFailure {
            status: None,
            reason: "request was never sent".to_string(),
        };

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            match build().send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(response);
                    }

                    let body = response.text().await.unwrap_or_default();
                    let failure = RequestFailure {
                        status: Some(status),
                        reason: format!("HTTP {}: {}", status, snippet(&body)),
                    };

                    if status.as_u16() == 429 || status.is_server_error() {
                        last = failure;
                        continue;
                    }

                    return Err(failure);
                }
                Err(e) => {
                    last = RequestFailure {
                        status: None,
                        reason: e.to_string(),
                    };
                }
            }
        }

        Err(last)
    }
}

/// Keep error bodies readable in diagnostics.
fn snippet(body: &str) -> String {
    const MAX: usize = 200;
    if body.len() <= MAX {
        return body.to_string();
    }
    let mut end = MAX;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_includes_window_and_count() {
        let query = SearchQuery {
            filter: Some("ts ge 2024-01-01T00:00:00Z and ts lt 2024-01-02T00:00:00Z".into()),
            order_by: Some("ts asc".into()),
            top: 500,
            skip: 1000,
            include_count: false,
        };
        let body = query.to_body();
        assert_eq!(body["search"], "*");
        assert_eq!(body["top"], 500);
        assert_eq!(body["skip"], 1000);
        assert_eq!(body["count"], false);
        assert_eq!(body["orderby"], "ts asc");
        assert!(body["filter"].as_str().unwrap().contains("ge 2024-01-01"));
    }

    #[test]
    fn body_omits_unset_filter_and_order() {
        let query = SearchQuery {
            filter: None,
            order_by: None,
            top: 1,
            skip: 0,
            include_count: true,
        };
        let body = query.to_body();
        assert!(body.get("filter").is_none());
        assert!(body.get("orderby").is_none());
        assert_eq!(body["count"], true);
    }

    #[test]
    fn snippet_truncates_long_bodies() {
        let long = "x".repeat(500);
        let cut = snippet(&long);
        assert!(cut.len() < long.len());
        assert!(cut.ends_with("..."));
        assert_eq!(snippet("short"), "short");
    }
}
