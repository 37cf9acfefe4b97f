//! Thin authenticated client for the Linode v4 HTTP API.

use std::time::Duration;

use linode_mcp_core::DEFAULT_API_URL;
use linode_mcp_core::auth::redact_token;
use linode_mcp_core::models::{ErrorBody, Page};
use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

const USER_AGENT: &str = concat!("linode-mcp/", env!("CARGO_PKG_VERSION"));
const PAGE_SIZE: u32 = 500;

#[derive(Debug, Error)]
pub enum ApiError {
    /// The provider answered with a non-2xx status.
    #[error("[{status}] {message}")]
    Status { status: u16, message: String },

    #[error("request failed: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("invalid response body: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("invalid API URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("failed to build HTTP client: {0}")]
    Build(#[source] reqwest::Error),

    #[error("no response within {0:?}")]
    DeadlineExceeded(Duration),
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// An authenticated client bound to one token and one API root.
/// Cheap to share: `reqwest::Client` is internally reference counted.
#[derive(Clone)]
pub struct LinodeClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl std::fmt::Debug for LinodeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinodeClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl LinodeClient {
    pub fn new(token: &str, api_url: Option<&str>, timeout: Duration) -> Result<Self, ApiError> {
        let raw = api_url.unwrap_or(DEFAULT_API_URL).trim();
        let parsed = reqwest::Url::parse(raw).map_err(|e| ApiError::InvalidUrl {
            url: raw.to_string(),
            reason: e.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ApiError::InvalidUrl {
                url: raw.to_string(),
                reason: format!("unsupported scheme '{}'", parsed.scheme()),
            });
        }

        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(ApiError::Build)?;

        Ok(Self {
            http,
            base_url: raw.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let body = self.send(Method::GET, path, &[], None).await?;
        decode(body)
    }

    pub async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let body = serde_json::to_value(body).map_err(ApiError::Decode)?;
        let response = self.send(Method::POST, path, &[], Some(body)).await?;
        decode(response)
    }

    /// POST for action endpoints whose response body carries nothing useful.
    pub async fn post_action<B: Serialize>(&self, path: &str, body: &B) -> Result<(), ApiError> {
        let body = serde_json::to_value(body).map_err(ApiError::Decode)?;
        self.send(Method::POST, path, &[], Some(body)).await?;
        Ok(())
    }

    pub async fn put<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let body = serde_json::to_value(body).map_err(ApiError::Decode)?;
        let response = self.send(Method::PUT, path, &[], Some(body)).await?;
        decode(response)
    }

    pub async fn delete(&self, path: &str) -> Result<(), ApiError> {
        self.send(Method::DELETE, path, &[], None).await?;
        Ok(())
    }

    /// Fetch every page of a collection endpoint and concatenate the items.
    pub async fn list_all<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>, ApiError> {
        let mut items = Vec::new();
        let mut page = 1_u32;
        loop {
            let query = [
                ("page".to_string(), page.to_string()),
                ("page_size".to_string(), PAGE_SIZE.to_string()),
            ];
            let body = self.send(Method::GET, path, &query, None).await?;
            let current: Page<T> = decode(body)?;
            items.extend(current.data);
            if current.pages <= page {
                break;
            }
            page += 1;
        }
        Ok(items)
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        query: &[(String, String)],
        body: Option<Value>,
    ) -> Result<Value, ApiError> {
        let mut url = reqwest::Url::parse(&format!("{}{}", self.base_url, path)).map_err(|e| {
            ApiError::InvalidUrl {
                url: format!("{}{}", self.base_url, path),
                reason: e.to_string(),
            }
        })?;
        if !query.is_empty() {
            let mut qp = url.query_pairs_mut();
            for (k, v) in query {
                qp.append_pair(k, v);
            }
        }

        tracing::trace!(%method, path, "provider request");
        let mut request = self
            .http
            .request(method, url)
            .bearer_auth(&self.token)
            .header("Accept", "application/json");
        if let Some(body) = body {
            tracing::trace!(body = %body, "provider request body");
            request = request.json(&body);
        }

        let response = request.send().await.map_err(ApiError::Transport)?;
        let status = response.status();
        let bytes = response.bytes().await.map_err(ApiError::Transport)?;
        tracing::trace!(status = status.as_u16(), bytes = bytes.len(), "provider response");

        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
                message: redact_token(&error_message(status, &bytes), &self.token),
            });
        }

        Ok(parse_response_body(&bytes))
    }
}

fn decode<T: DeserializeOwned>(value: Value) -> Result<T, ApiError> {
    serde_json::from_value(value).map_err(ApiError::Decode)
}

fn parse_response_body(bytes: &[u8]) -> Value {
    if bytes.is_empty() {
        return Value::Object(Default::default());
    }
    serde_json::from_slice(bytes).unwrap_or_else(|_| {
        Value::String(String::from_utf8_lossy(bytes).to_string())
    })
}

/// Join the provider's error reasons; fall back to the canonical status text.
fn error_message(status: StatusCode, bytes: &[u8]) -> String {
    let reasons: Vec<String> = serde_json::from_slice::<ErrorBody>(bytes)
        .map(|body| {
            body.errors
                .into_iter()
                .filter(|e| !e.reason.trim().is_empty())
                .map(|e| match e.field {
                    Some(field) if !field.is_empty() => format!("{field}: {}", e.reason),
                    _ => e.reason,
                })
                .collect()
        })
        .unwrap_or_default();

    if reasons.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("Unknown error")
            .to_string()
    } else {
        reasons.join("; ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_message_joins_reasons_with_fields() {
        let body = br#"{"errors":[{"reason":"Not found"}]}"#;
        assert_eq!(error_message(StatusCode::NOT_FOUND, body), "Not found");

        let body = br#"{"errors":[{"reason":"too small","field":"size"},{"reason":"bad region","field":"region"}]}"#;
        assert_eq!(
            error_message(StatusCode::BAD_REQUEST, body),
            "size: too small; region: bad region"
        );
    }

    #[test]
    fn error_message_falls_back_to_status_text() {
        assert_eq!(
            error_message(StatusCode::SERVICE_UNAVAILABLE, b"<html>oops</html>"),
            "Service Unavailable"
        );
        assert_eq!(
            error_message(StatusCode::NOT_FOUND, br#"{"errors":[]}"#),
            "Not Found"
        );
    }

    #[test]
    fn status_error_display_includes_code() {
        let err = ApiError::Status {
            status: 404,
            message: "Not found".to_string(),
        };
        assert_eq!(err.to_string(), "[404] Not found");
        assert_eq!(err.status(), Some(404));
        assert_eq!(
            ApiError::DeadlineExceeded(Duration::from_secs(60)).to_string(),
            "no response within 60s"
        );
    }

    #[test]
    fn new_rejects_non_http_urls() {
        let err = LinodeClient::new("t", Some("ftp://example.com"), Duration::from_secs(5))
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidUrl { .. }));
    }

    #[test]
    fn new_defaults_to_public_api_and_trims_slash() {
        let client = LinodeClient::new("t", None, Duration::from_secs(5)).unwrap();
        assert_eq!(client.base_url(), DEFAULT_API_URL);

        let client =
            LinodeClient::new("t", Some("http://127.0.0.1:9/v4/"), Duration::from_secs(5)).unwrap();
        assert_eq!(client.base_url(), "http://127.0.0.1:9/v4");
    }

    #[test]
    fn debug_output_hides_token() {
        let client = LinodeClient::new("secret-token", None, Duration::from_secs(5)).unwrap();
        assert!(!format!("{client:?}").contains("secret-token"));
    }

    #[test]
    fn empty_body_parses_as_object() {
        assert!(parse_response_body(b"").is_object());
    }
}
