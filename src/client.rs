use std::env;
use std::time::{Duration, Instant};

use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client as ReqwestClient, Response, header};
use serde::Deserialize;
use url::Url;

use crate::error::{Error, Result};
use crate::observability::{CLIENT_REQUEST_DURATION, CLIENT_REQUEST_ERRORS, CLIENT_REQUESTS};
use crate::types::{Capability, CapabilityList, QueryRequest, QueryResponse};

/// Backend origin used when neither configuration nor environment names one.
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8001";

/// Environment variable consulted for the backend origin.
pub const BACKEND_URL_ENV: &str = "ASKDATA_BACKEND_URL";

/// The query collaborator: answers natural-language questions.
///
/// The session controller only ever talks to this trait, which keeps it
/// independent of transport details and lets tests substitute scripted or
/// deferred backends.
#[async_trait::async_trait]
pub trait QueryService: Send + Sync {
    /// Ask one question.
    ///
    /// A transport failure and a `success: false` answer are both failures
    /// from the caller's point of view.
    async fn query(&self, request: QueryRequest) -> Result<QueryResponse>;

    /// List the capabilities the backend advertises.  Display only.
    async fn capabilities(&self) -> Result<Vec<Capability>> {
        Ok(Vec::new())
    }
}

/// HTTP client for the analytics backend.
#[derive(Debug, Clone)]
pub struct AnalyticsClient {
    client: ReqwestClient,
    base_url: Url,
    timeout: Option<Duration>,
}

impl AnalyticsClient {
    /// Create a new client.
    ///
    /// The backend origin can be provided directly or read from the
    /// `ASKDATA_BACKEND_URL` environment variable; it defaults to
    /// `http://localhost:8001`.  No timeout is applied.
    pub fn new(base_url: Option<String>) -> Result<Self> {
        Self::with_options(base_url, None)
    }

    /// Create a new client with an optional transport timeout.
    pub fn with_options(base_url: Option<String>, timeout: Option<Duration>) -> Result<Self> {
        let base_url = resolve_backend_url(base_url);
        let base_url = normalize_base_url(&base_url)?;

        let mut builder = ReqwestClient::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(|e| {
            Error::http_client(
                format!("Failed to build HTTP client: {}", e),
                Some(Box::new(e)),
            )
        })?;

        Ok(Self {
            client,
            base_url,
            timeout,
        })
    }

    /// The origin every request is resolved against.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(self.base_url.join(path)?)
    }

    fn default_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
        headers
    }

    fn map_send_error(&self, e: reqwest::Error) -> Error {
        if e.is_timeout() {
            Error::timeout(
                format!("Request timed out: {}", e),
                self.timeout.map(|t| t.as_secs_f64()),
            )
        } else if e.is_connect() {
            Error::connection(format!("Connection error: {}", e), Some(Box::new(e)))
        } else {
            Error::http_client(format!("Request failed: {}", e), Some(Box::new(e)))
        }
    }

    /// Convert a non-success HTTP response into an error.
    async fn process_error_response(response: Response) -> Error {
        let status_code = response.status().as_u16();

        #[derive(Deserialize)]
        struct ErrorBody {
            error: Option<String>,
            detail: Option<serde_json::Value>,
        }

        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                return Error::http_client(
                    format!("Failed to read error response: {}", e),
                    Some(Box::new(e)),
                );
            }
        };

        let parsed = serde_json::from_str::<ErrorBody>(&body).ok();
        let message = parsed
            .and_then(|b| {
                b.error.or_else(|| {
                    b.detail.map(|d| match d {
                        serde_json::Value::String(s) => s,
                        other => other.to_string(),
                    })
                })
            })
            .unwrap_or(body);
        Error::api(status_code, message)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.endpoint(path)?;
        let response = self
            .client
            .get(url)
            .headers(self.default_headers())
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        if !response.status().is_success() {
            return Err(Self::process_error_response(response).await);
        }

        response.json::<T>().await.map_err(|e| {
            Error::serialization(
                format!("Failed to parse response: {}", e),
                Some(Box::new(e)),
            )
        })
    }

    /// Send a question to `POST /query`.
    ///
    /// A well-formed answer reporting `success: false` is returned as
    /// [`Error::Backend`].
    pub async fn send(&self, request: &QueryRequest) -> Result<QueryResponse> {
        CLIENT_REQUESTS.click();
        let started = Instant::now();
        let result = self.post_query(request).await;
        CLIENT_REQUEST_DURATION.add(started.elapsed().as_secs_f64());
        if let Err(err) = &result {
            CLIENT_REQUEST_ERRORS.click();
            tracing::warn!(error = %err, "analytics query failed");
        }
        result
    }

    async fn post_query(&self, request: &QueryRequest) -> Result<QueryResponse> {
        let url = self.endpoint("query")?;
        let response = self
            .client
            .post(url)
            .headers(self.default_headers())
            .json(request)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        if !response.status().is_success() {
            return Err(Self::process_error_response(response).await);
        }

        let answer = response.json::<QueryResponse>().await.map_err(|e| {
            Error::serialization(
                format!("Failed to parse response: {}", e),
                Some(Box::new(e)),
            )
        })?;

        if !answer.success {
            let message = answer
                .error
                .unwrap_or_else(|| "backend reported failure".to_string());
            return Err(Error::backend(message));
        }
        Ok(answer)
    }

    /// Fetch the capability listing from `GET /tools`.
    pub async fn list_capabilities(&self) -> Result<CapabilityList> {
        self.get_json("tools").await
    }

    /// Fetch `GET /health`.  The shape of the body is backend specific.
    pub async fn health(&self) -> Result<serde_json::Value> {
        self.get_json("health").await
    }
}

#[async_trait::async_trait]
impl QueryService for AnalyticsClient {
    async fn query(&self, request: QueryRequest) -> Result<QueryResponse> {
        self.send(&request).await
    }

    async fn capabilities(&self) -> Result<Vec<Capability>> {
        Ok(self.list_capabilities().await?.tools)
    }
}

/// Pick the backend origin: explicit value, then environment, then default.
pub fn resolve_backend_url(explicit: Option<String>) -> String {
    explicit
        .or_else(|| env::var(BACKEND_URL_ENV).ok())
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_BACKEND_URL.to_string())
}

/// Parse an origin and make sure its path ends in `/` so that joins append.
pub fn normalize_base_url(raw: &str) -> Result<Url> {
    let mut url = Url::parse(raw.trim())?;
    if url.cannot_be_a_base() {
        return Err(Error::validation(
            format!("backend URL cannot be used as a base: {raw}"),
            Some("backend_url".to_string()),
        ));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = AnalyticsClient::new(Some("http://analytics.local:9000".to_string())).unwrap();
        assert_eq!(client.base_url().as_str(), "http://analytics.local:9000/");
        assert!(client.timeout.is_none());

        let client = AnalyticsClient::with_options(
            Some("https://example.com/api".to_string()),
            Some(Duration::from_secs(30)),
        )
        .unwrap();
        assert_eq!(client.base_url().as_str(), "https://example.com/api/");
        assert_eq!(client.timeout, Some(Duration::from_secs(30)));
    }

    #[test]
    fn endpoints_append_to_base_path() {
        let client = AnalyticsClient::new(Some("https://example.com/api".to_string())).unwrap();
        assert_eq!(
            client.endpoint("query").unwrap().as_str(),
            "https://example.com/api/query"
        );
        assert_eq!(
            client.endpoint("tools").unwrap().as_str(),
            "https://example.com/api/tools"
        );
    }

    #[test]
    fn invalid_base_urls_are_rejected() {
        assert!(normalize_base_url("not a url").is_err());
        let err = normalize_base_url("mailto:ops@example.com").unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn explicit_backend_url_wins() {
        assert_eq!(
            resolve_backend_url(Some("http://other:1234".to_string())),
            "http://other:1234"
        );
    }

    #[tokio::test]
    async fn unreachable_backend_is_a_transport_error() {
        // Port 9 (discard) on localhost is almost never listening.
        let client = AnalyticsClient::with_options(
            Some("http://127.0.0.1:9".to_string()),
            Some(Duration::from_secs(5)),
        )
        .unwrap();
        let err = client.send(&QueryRequest::new("anything")).await.unwrap_err();
        assert!(err.is_transport(), "{err}");
    }
}
