//! Captured and synthetic responses.

use bytes::Bytes;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

/// A response as returned to the page and as stored in a cache namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    pub status: u16,
    pub status_text: String,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl FetchResponse {
    /// Create a response with the canonical status text for `status`.
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        let status_text = StatusCode::from_u16(status)
            .ok()
            .and_then(|s| s.canonical_reason())
            .unwrap_or("")
            .to_string();
        Self {
            status,
            status_text,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    /// Add a header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// True for 2xx statuses.
    pub fn is_ok(&self) -> bool {
        (200..=299).contains(&self.status)
    }

    /// Look up a header value (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    /// Body length in bytes.
    pub fn size(&self) -> u64 {
        self.body.len() as u64
    }
}

/// A canned response produced when the cache and the network both fail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyntheticResponse {
    pub status: u16,
    #[serde(default)]
    pub content_type: Option<String>,
    pub body: String,
}

impl SyntheticResponse {
    pub fn new(status: u16, content_type: Option<&str>, body: impl Into<String>) -> Self {
        Self {
            status,
            content_type: content_type.map(String::from),
            body: body.into(),
        }
    }

    /// 503 with a plain-text body and no explicit content type.
    pub fn unavailable(body: impl Into<String>) -> Self {
        Self::new(503, None, body)
    }

    /// 503 with a JSON `{"error": ...}` body.
    pub fn unavailable_json(message: &str) -> Self {
        Self::new(
            503,
            Some("application/json"),
            serde_json::json!({ "error": message }).to_string(),
        )
    }

    /// Returned when a request that bypasses the cache cannot reach the network.
    pub fn request_failed() -> Self {
        Self::unavailable("Request failed")
    }

    pub fn to_response(&self) -> FetchResponse {
        let response = FetchResponse::new(self.status, self.body.clone());
        match &self.content_type {
            Some(content_type) => response.with_header("Content-Type", content_type.clone()),
            None => response,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_text_and_ok() {
        let response = FetchResponse::new(503, "down");
        assert_eq!(response.status_text, "Service Unavailable");
        assert!(!response.is_ok());
        assert!(FetchResponse::new(204, "").is_ok());
    }

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let response = FetchResponse::new(200, "{}").with_header("Content-Type", "application/json");
        assert_eq!(response.content_type(), Some("application/json"));
        assert_eq!(response.header("CONTENT-TYPE"), Some("application/json"));
        assert_eq!(response.header("etag"), None);
    }

    #[test]
    fn test_json_synthetic_body() {
        let response = SyntheticResponse::unavailable_json("Data not available offline").to_response();
        assert_eq!(response.status, 503);
        assert_eq!(response.content_type(), Some("application/json"));
        let body: serde_json::Value = serde_json::from_slice(&response.body).unwrap();
        assert_eq!(body["error"], "Data not available offline");
    }
}
