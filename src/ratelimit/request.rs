//! Transport-independent view of an incoming request.

use std::borrow::Cow;
use std::collections::HashMap;
use std::net::SocketAddr;

use http::header::{HeaderMap, HeaderName, HeaderValue};
use serde::Deserialize;
use tracing::warn;

/// The parts of a request the limiter looks at.
#[derive(Debug, Clone, Default)]
pub struct RequestInfo {
    /// HTTP method, e.g. `GET`
    pub method: String,
    /// Request path, without the query string
    pub path: String,
    /// Transport-level peer address, usually `host:port`
    pub remote_addr: String,
    /// Request headers
    pub headers: HeaderMap,
}

impl RequestInfo {
    /// Create a request descriptor with no headers.
    pub fn new(
        method: impl Into<String>,
        path: impl Into<String>,
        remote_addr: impl Into<String>,
    ) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            remote_addr: remote_addr.into(),
            headers: HeaderMap::new(),
        }
    }

    /// Add a header. Names or values that are not valid HTTP are skipped.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                self.headers.append(name, value);
            }
            _ => warn!(header = %name, "Skipping invalid request header"),
        }
        self
    }

    /// Build a descriptor from an `http::Request` and the connection's peer.
    pub fn from_http<B>(request: &http::Request<B>, peer: SocketAddr) -> Self {
        Self {
            method: request.method().as_str().to_string(),
            path: request.uri().path().to_string(),
            remote_addr: peer.to_string(),
            headers: request.headers().clone(),
        }
    }

    /// Get a header value as a string.
    ///
    /// A missing header reads as `""`. Bytes that are not valid UTF-8 are
    /// replaced with U+FFFD, so distinct values stay distinct.
    pub fn header(&self, name: &str) -> Cow<'_, str> {
        self.headers
            .get(name)
            .map_or(Cow::Borrowed(""), |v| String::from_utf8_lossy(v.as_bytes()))
    }
}

/// Serialized form of a request descriptor, as read by the `webrate` binary.
#[derive(Debug, Clone, Deserialize)]
pub struct RequestRecord {
    /// HTTP method
    pub method: String,
    /// Request path, `/` when absent
    #[serde(default = "default_path")]
    pub path: String,
    /// Peer address, usually `host:port`
    #[serde(default)]
    pub remote_addr: String,
    /// Header names and values
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

fn default_path() -> String {
    "/".to_string()
}

impl From<RequestRecord> for RequestInfo {
    fn from(record: RequestRecord) -> Self {
        record.headers.iter().fold(
            RequestInfo::new(record.method, record.path, record.remote_addr),
            |request, (name, value)| request.with_header(name, value),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let request = RequestInfo::new("GET", "/", "1.2.3.4:80").with_header("X-Real-IP", "5.6.7.8");

        assert_eq!(request.header("x-real-ip"), "5.6.7.8");
        assert_eq!(request.header("X-REAL-IP"), "5.6.7.8");
        assert_eq!(request.header("x-forwarded-for"), "");
    }

    #[test]
    fn test_non_ascii_header_values_stay_distinct() {
        let mut request = RequestInfo::new("GET", "/", "");
        request
            .headers
            .insert("x-api-key", HeaderValue::from_bytes(b"caf\xc3\xa9").unwrap());
        assert_eq!(request.header("x-api-key"), "caf\u{e9}");

        request
            .headers
            .insert("x-api-key", HeaderValue::from_bytes(b"bad\xff").unwrap());
        assert_eq!(request.header("x-api-key"), "bad\u{fffd}");
    }

    #[test]
    fn test_invalid_header_is_skipped() {
        let request = RequestInfo::new("GET", "/", "").with_header("bad header", "v");
        assert!(request.headers.is_empty());
    }

    #[test]
    fn test_from_http_request() {
        let request = http::Request::builder()
            .method("POST")
            .uri("http://example.com/login?next=/home")
            .header("X-Forwarded-For", "9.9.9.9")
            .body(())
            .unwrap();
        let peer: SocketAddr = "10.0.0.1:51234".parse().unwrap();

        let info = RequestInfo::from_http(&request, peer);

        assert_eq!(info.method, "POST");
        assert_eq!(info.path, "/login");
        assert_eq!(info.remote_addr, "10.0.0.1:51234");
        assert_eq!(info.header("x-forwarded-for"), "9.9.9.9");
    }

    #[test]
    fn test_request_record_conversion() {
        let record: RequestRecord = serde_json::from_str(
            r#"{"method":"POST","remote_addr":"1.2.3.4:80","headers":{"X-Client":"abc"}}"#,
        )
        .unwrap();

        let info = RequestInfo::from(record);

        assert_eq!(info.method, "POST");
        assert_eq!(info.path, "/");
        assert_eq!(info.header("x-client"), "abc");
    }
}
