//! PostgREST-compatible HTTP backend.
//!
//! A page request looks like
//! `GET {base}/rest/v1/{table}?select=a,b&col=eq.v&col=not.is.null&order=col.asc`
//! with `Range-Unit: items` and `Range: from-to` headers.

use crate::{FetchError, Filter, PageRange, TableQuery, TabularSource};
use gwm_core::Row;
use log::{info, warn};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Client, StatusCode};
use std::time::Duration;

/// Retry behaviour for failed page requests.
///
/// The default makes a single attempt: a failed page fails the whole fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff: Duration::from_millis(1000),
        }
    }
}

/// HTTP client for a PostgREST endpoint.
#[derive(Debug, Clone)]
pub struct RestSource {
    client: Client,
    base_url: String,
    retry: RetryPolicy,
}

impl RestSource {
    /// Build a client for `base_url`. When `api_key` is set it is sent as
    /// both the `apikey` header and a bearer token.
    pub fn new(base_url: &str, api_key: Option<&str>, timeout: Duration) -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        if let Some(key) = api_key {
            let apikey = HeaderValue::from_str(key)
                .map_err(|e| FetchError::Transport(format!("invalid api key: {}", e)))?;
            let bearer = HeaderValue::from_str(&format!("Bearer {}", key))
                .map_err(|e| FetchError::Transport(format!("invalid api key: {}", e)))?;
            headers.insert("apikey", apikey);
            headers.insert(AUTHORIZATION, bearer);
        }
        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    /// Query-string pairs for `query`.
    pub fn query_pairs(query: &TableQuery) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        if !query.columns.is_empty() {
            pairs.push(("select".to_string(), query.columns.join(",")));
        }
        for filter in &query.filters {
            match filter {
                Filter::Eq(column, value) => pairs.push((column.clone(), format!("eq.{}", value))),
                Filter::NotNull(column) => pairs.push((column.clone(), "not.is.null".to_string())),
            }
        }
        if let Some((column, direction)) = &query.order {
            pairs.push(("order".to_string(), format!("{}.{}", column, direction.as_str())));
        }
        pairs
    }

    async fn request_once(&self, query: &TableQuery, range: PageRange) -> Result<Vec<Row>, FetchError> {
        let response = self
            .client
            .get(self.table_url(&query.table))
            .query(&Self::query_pairs(query))
            .header("Range-Unit", "items")
            .header("Range", range.to_string())
            .send()
            .await?;

        let status = response.status();
        // Asking for a range past the end of the result set
        if status == StatusCode::RANGE_NOT_SATISFIABLE {
            return Ok(Vec::new());
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::Status {
                status: status.as_u16(),
                body,
            });
        }
        let rows = response.json::<Vec<Row>>().await?;
        Ok(rows)
    }
}

impl TabularSource for RestSource {
    async fn fetch_range(&self, query: &TableQuery, range: PageRange) -> Result<Vec<Row>, FetchError> {
        let max_tries = self.retry.max_attempts.max(1);
        let mut backoff = self.retry.initial_backoff;
        let mut attempt = 1;
        loop {
            match self.request_once(query, range).await {
                Ok(rows) => return Ok(rows),
                Err(e) if attempt < max_tries => {
                    warn!(
                        "Attempt {}/{}: request for {} rows {} failed: {}",
                        attempt, max_tries, query.table, range, e
                    );
                    info!("Sleeping for {} milliseconds before retry", backoff.as_millis());
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Direction;

    #[test]
    fn builds_postgrest_query_string() {
        let query = TableQuery::new("nitrate_samples")
            .select(["point_code", "x", "y"])
            .not_null("point_code")
            .eq("aquifer_system", "Alta Pianura")
            .order_by("sample_date", Direction::Descending);
        let pairs = RestSource::query_pairs(&query);
        assert_eq!(
            pairs,
            vec![
                ("select".to_string(), "point_code,x,y".to_string()),
                ("point_code".to_string(), "not.is.null".to_string()),
                ("aquifer_system".to_string(), "eq.Alta Pianura".to_string()),
                ("order".to_string(), "sample_date.desc".to_string()),
            ]
        );
    }

    #[test]
    fn table_url_strips_trailing_slash() {
        let source = RestSource::new("https://example.org/", Some("key"), Duration::from_secs(5)).unwrap();
        assert_eq!(source.table_url("flow_measurements"), "https://example.org/rest/v1/flow_measurements");
    }

    #[test]
    fn default_policy_does_not_retry() {
        assert_eq!(RetryPolicy::default().max_attempts, 1);
    }

    #[tokio::test]
    async fn unreachable_backend_is_a_transport_error() {
        let source = RestSource::new("http://127.0.0.1:9", None, Duration::from_millis(500)).unwrap();
        let result = source
            .fetch_range(&TableQuery::new("well_depth"), PageRange::for_page(0, 10))
            .await;
        assert!(matches!(result, Err(FetchError::Transport(_))));
    }

    use crate::fetch_table;
    use std::sync::{Arc, Mutex};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serves the canned `(status, body)` responses one connection at a
    /// time, in order, and records each lowercased request head.
    async fn stub_backend(responses: Vec<(u16, &'static str)>) -> (String, Arc<Mutex<Vec<String>>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let requests = Arc::new(Mutex::new(Vec::new()));
        let seen = requests.clone();
        tokio::spawn(async move {
            for (status, body) in responses {
                let (mut socket, _) = listener.accept().await.unwrap();
                let mut head = Vec::new();
                let mut buf = [0u8; 1024];
                while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                    let n = socket.read(&mut buf).await.unwrap();
                    if n == 0 {
                        break;
                    }
                    head.extend_from_slice(&buf[..n]);
                }
                seen.lock().unwrap().push(String::from_utf8_lossy(&head).to_lowercase());
                let response = format!(
                    "HTTP/1.1 {} Stub\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                socket.write_all(response.as_bytes()).await.unwrap();
                let _ = socket.shutdown().await;
            }
        });
        (base_url, requests)
    }

    fn source(base_url: &str, api_key: Option<&str>) -> RestSource {
        RestSource::new(base_url, api_key, Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn range_not_satisfiable_ends_pagination() {
        let (base_url, requests) = stub_backend(vec![
            (206, r#"[{"point_code": "PZ1"}, {"point_code": "PZ2"}]"#),
            (416, r#"{"message": "Requested range not satisfiable"}"#),
        ])
        .await;
        let query = TableQuery::new("well_depth").select(["point_code"]);

        let rows = fetch_table(&source(&base_url, Some("secret")), &query, 2).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].code("point_code").as_deref(), Some("PZ2"));

        let requests = requests.lock().unwrap();
        assert_eq!(requests.len(), 2);
        assert!(requests[0].starts_with("get /rest/v1/well_depth?select=point_code "));
        assert!(requests[0].contains("\r\nrange-unit: items\r\n"));
        assert!(requests[0].contains("\r\nrange: 0-1\r\n"));
        assert!(requests[0].contains("\r\napikey: secret\r\n"));
        assert!(requests[0].contains("\r\nauthorization: bearer secret\r\n"));
        assert!(requests[1].contains("\r\nrange: 2-3\r\n"));
    }

    #[tokio::test]
    async fn error_status_keeps_body_and_is_not_retried_by_default() {
        let (base_url, requests) = stub_backend(vec![(500, "boom"), (206, "[]")]).await;

        let result = fetch_table(&source(&base_url, None), &TableQuery::new("well_depth"), 10).await;
        match result {
            Err(FetchError::Status { status, body }) => {
                assert_eq!(status, 500);
                assert_eq!(body, "boom");
            }
            other => panic!("expected a status error, got {:?}", other),
        }
        assert_eq!(requests.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn retries_stop_after_max_attempts() {
        let (base_url, requests) = stub_backend(vec![(503, "busy"), (503, "busy"), (503, "busy")]).await;
        let source = source(&base_url, None).with_retry(RetryPolicy {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(5),
        });

        let started = std::time::Instant::now();
        let result = source
            .fetch_range(&TableQuery::new("well_depth"), PageRange::for_page(0, 10))
            .await;
        assert!(matches!(result, Err(FetchError::Status { status: 503, .. })));
        assert_eq!(requests.lock().unwrap().len(), 3);
        // 5 ms then 10 ms between attempts
        assert!(started.elapsed() >= Duration::from_millis(15));
    }

    #[tokio::test]
    async fn retry_recovers_from_a_transient_failure() {
        let (base_url, requests) = stub_backend(vec![(500, "oops"), (206, r#"[{"point_code": "PZ9"}]"#)]).await;
        let source = source(&base_url, None).with_retry(RetryPolicy {
            max_attempts: 2,
            initial_backoff: Duration::from_millis(1),
        });

        let rows = fetch_table(&source, &TableQuery::new("well_depth"), 10).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(requests.lock().unwrap().len(), 2);
    }
}
