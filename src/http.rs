use crate::error::{Error, Result};
use reqwest::{Client, RequestBuilder, StatusCode, header};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// reqwest client with bounded exponential-backoff retries on transient failures.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    max_retries: u32,
    base_delay_ms: u64,
}

impl HttpClient {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| Error::transport(e.to_string()))?;

        Ok(Self {
            client,
            max_retries: 3,
            base_delay_ms: 500,
        })
    }

    pub fn with_retries(mut self, max_retries: u32, base_delay_ms: u64) -> Self {
        self.max_retries = max_retries;
        self.base_delay_ms = base_delay_ms;
        self
    }

    pub async fn get_text(&self, url: &str, query: &[(&str, String)]) -> Result<String> {
        self.request_with_retry(|| self.client.get(url).query(query))
            .await
    }

    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let body = self.get_text(url, query).await?;
        serde_json::from_str(&body).map_err(|e| Error::parse(format!("JSON parse: {e}")))
    }

    pub async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        url: &str,
        body: &B,
    ) -> Result<T> {
        let payload = serde_json::to_string(body)
            .map_err(|e| Error::parse(format!("serialize request: {e}")))?;
        let text = self.post_json_raw(url, &payload, &[]).await?;
        serde_json::from_str(&text).map_err(|e| Error::parse(format!("JSON parse: {e}")))
    }

    /// POST with no body; the response body is discarded.
    pub async fn post_empty(&self, url: &str) -> Result<()> {
        self.request_with_retry(|| self.client.post(url)).await?;
        Ok(())
    }

    pub async fn post_json_raw(
        &self,
        url: &str,
        body: &str,
        headers: &[(&str, &str)],
    ) -> Result<String> {
        self.request_with_retry(|| {
            let mut req = self
                .client
                .post(url)
                .header(header::CONTENT_TYPE, "application/json")
                .body(body.to_string());
            for (k, v) in headers {
                req = req.header(*k, *v);
            }
            req
        })
        .await
    }

    async fn request_with_retry<F>(&self, build: F) -> Result<String>
    where
        F: Fn() -> RequestBuilder,
    {
        let mut last_error = Error::transport("no attempts made");
        let mut delay = self.base_delay_ms;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                debug!(attempt, delay_ms = delay, "retrying request");
                sleep(Duration::from_millis(delay)).await;
                delay = (delay * 2).min(30_000);
            }

            match build().send().await {
                Ok(resp) => return self.handle_response(resp).await,
                Err(e) => {
                    last_error = Error::transport(e.to_string());
                    if e.is_timeout() || e.is_connect() {
                        warn!(attempt, "transient failure, will retry");
                        continue;
                    }
                    return Err(last_error);
                }
            }
        }

        Err(last_error)
    }

    async fn handle_response(&self, resp: reqwest::Response) -> Result<String> {
        let status = resp.status();
        let url = resp.url().to_string();

        if status.is_success() {
            return resp.text().await.map_err(|e| Error::transport(e.to_string()));
        }
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = resp
                .headers()
                .get(header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok());
            return Err(Error::RateLimit {
                endpoint: extract_endpoint(&url),
                retry_after_secs: retry_after,
            });
        }
        let body = resp.text().await.unwrap_or_default();
        Err(Error::api_with_status(
            extract_endpoint(&url),
            body,
            status.as_u16(),
        ))
    }
}

/// Host plus path, without scheme or query string.
fn extract_endpoint(url: &str) -> String {
    let without_scheme = url.split("//").nth(1).unwrap_or(url);
    without_scheme
        .split(['?', '#'])
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or("unknown")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_strips_scheme_and_query() {
        assert_eq!(
            extract_endpoint("http://localhost:3001/api/metrics/basic?month=2024-03"),
            "localhost:3001/api/metrics/basic"
        );
        assert_eq!(extract_endpoint("https://example.com"), "example.com");
        assert_eq!(extract_endpoint("http://"), "unknown");
    }

    #[tokio::test]
    async fn unreachable_host_is_a_transport_error() {
        let http = HttpClient::new("test", Duration::from_secs(2))
            .unwrap()
            .with_retries(0, 1);
        let err = http.get_text("http://127.0.0.1:1/", &[]).await.unwrap_err();
        assert!(matches!(err, Error::Transport(_)), "got {err:?}");
        assert!(err.is_retryable());
    }
}
