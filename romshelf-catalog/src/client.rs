use std::sync::Arc;

use serde::Deserialize;
use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};

use romshelf_core::{Catalog, CatalogEntry, CatalogError};

/// Minimum spacing between catalog API requests.
const MIN_REQUEST_INTERVAL: Duration = Duration::from_millis(500);

/// How much of an error body to carry into error messages.
const ERROR_BODY_LIMIT: usize = 200;

/// Wire shape of the catalog's search response.
#[derive(Debug, Deserialize)]
struct SearchResponse {
    results: Vec<CatalogEntry>,
}

/// Rate-limited HTTP client for the metadata catalog.
pub struct CatalogClient {
    http: reqwest::Client,
    base_url: String,
    last_request: Arc<Mutex<Instant>>,
}

impl CatalogClient {
    /// Build a client against `base_url` with a per-request timeout.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, CatalogError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CatalogError::Unreachable(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            last_request: Arc::new(Mutex::new(Instant::now() - MIN_REQUEST_INTERVAL)),
        })
    }

    /// Wait until at least [`MIN_REQUEST_INTERVAL`] has passed since the
    /// previous request.
    async fn rate_limit(&self) {
        let mut last = self.last_request.lock().await;
        let elapsed = last.elapsed();
        if elapsed < MIN_REQUEST_INTERVAL {
            tokio::time::sleep(MIN_REQUEST_INTERVAL - elapsed).await;
        }
        *last = Instant::now();
    }
}

impl Catalog for CatalogClient {
    async fn search(
        &self,
        title: &str,
        platform: Option<&str>,
    ) -> Result<Vec<CatalogEntry>, CatalogError> {
        self.rate_limit().await;

        let mut params: Vec<(&str, &str)> = vec![("title", title)];
        if let Some(p) = platform {
            params.push(("platform", p));
        }

        let resp = self
            .http
            .get(format!("{}/v1/search", self.base_url))
            .query(&params)
            .send()
            .await
            .map_err(|e| CatalogError::Unreachable(e.to_string()))?;

        let status = resp.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(CatalogError::RateLimited);
        }

        let body = resp
            .text()
            .await
            .map_err(|e| CatalogError::Unreachable(e.to_string()))?;

        if !status.is_success() {
            return Err(CatalogError::Server {
                status: status.as_u16(),
                message: truncate(&body, ERROR_BODY_LIMIT),
            });
        }

        let parsed: SearchResponse = serde_json::from_str(&body).map_err(|e| {
            log::debug!("catalog returned unparsable body: {}", truncate(&body, ERROR_BODY_LIMIT));
            CatalogError::Malformed(e.to_string())
        })?;

        Ok(parsed.results)
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        let mut end = max;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}…", &s[..end])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_response_shape() {
        let body = r#"{
            "results": [
                {"id": "g-42", "title": "Chrono Saga", "platform": "SNES",
                 "artwork_urls": ["https://cdn.example/c.png"]},
                {"id": "g-43", "title": "Chrono Saga II"}
            ]
        }"#;
        let parsed: SearchResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.results.len(), 2);
        assert_eq!(parsed.results[0].platform.as_deref(), Some("SNES"));
        assert!(parsed.results[1].artwork_urls.is_empty());
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("short", 200), "short");
        let long = "é".repeat(200);
        let cut = truncate(&long, 5);
        assert!(cut.chars().count() <= 4);
    }

    #[test]
    fn test_base_url_trailing_slash_stripped() {
        let client =
            CatalogClient::new("https://catalog.example/", Duration::from_secs(5)).unwrap();
        assert_eq!(client.base_url, "https://catalog.example");
    }
}
