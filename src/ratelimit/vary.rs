//! Key policies that decide which requests share a quota.
//!
//! A policy maps a request to a string key. Requests with equal keys count
//! against the same window; different keys are fully independent.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use super::request::RequestInfo;

/// Separator placed between key components.
const KEY_SEPARATOR: char = '\n';

/// Derives the rate limit key for a request.
///
/// Implementations must be deterministic and free of side effects. Any
/// `Fn(&RequestInfo) -> String` closure is a policy.
pub trait KeyPolicy: Send + Sync {
    /// Compute the key for `request`.
    fn key(&self, request: &RequestInfo) -> String;
}

impl<F> KeyPolicy for F
where
    F: Fn(&RequestInfo) -> String + Send + Sync,
{
    fn key(&self, request: &RequestInfo) -> String {
        self(request)
    }
}

/// Built-in policy selector used in configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyPolicyKind {
    /// See [`ByClientAddress`]
    #[default]
    ClientAddress,
    /// See [`ByPathAndClientAddress`]
    PathAndClientAddress,
}

/// Groups requests by client address.
///
/// Without a header name, the address is the request's remote address with
/// any port removed. With a header name, the header value is used as is,
/// unless `strip_header_port` is set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ByClientAddress {
    header_name: Option<String>,
    strip_header_port: bool,
}

impl ByClientAddress {
    /// Key by the remote address, or by `header_name` when it is non-empty.
    pub fn new(header_name: impl Into<String>) -> Self {
        let header_name = header_name.into();
        Self {
            header_name: (!header_name.is_empty()).then_some(header_name),
            strip_header_port: false,
        }
    }

    /// Also strip a port suffix from header values.
    pub fn strip_header_port(mut self, strip: bool) -> Self {
        self.strip_header_port = strip;
        self
    }

    /// Get the client address for `request`.
    pub fn client_address<'a>(&self, request: &'a RequestInfo) -> Cow<'a, str> {
        match &self.header_name {
            None => Cow::Borrowed(host_only(&request.remote_addr)),
            Some(name) if self.strip_header_port => match request.header(name) {
                Cow::Borrowed(value) => Cow::Borrowed(host_only(value)),
                Cow::Owned(value) => Cow::Owned(host_only(&value).to_string()),
            },
            Some(name) => request.header(name),
        }
    }
}

impl KeyPolicy for ByClientAddress {
    fn key(&self, request: &RequestInfo) -> String {
        self.client_address(request).into_owned()
    }
}

/// Groups requests by path and client address.
///
/// The key is the path and the [`ByClientAddress`] key joined by a newline,
/// which cannot appear in either part.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ByPathAndClientAddress {
    address: ByClientAddress,
}

impl ByPathAndClientAddress {
    /// Key by path and the remote address, or `header_name` when non-empty.
    pub fn new(header_name: impl Into<String>) -> Self {
        Self {
            address: ByClientAddress::new(header_name),
        }
    }

    /// Also strip a port suffix from header values.
    pub fn strip_header_port(mut self, strip: bool) -> Self {
        self.address = self.address.strip_header_port(strip);
        self
    }
}

impl KeyPolicy for ByPathAndClientAddress {
    fn key(&self, request: &RequestInfo) -> String {
        let address = self.address.client_address(request);
        let mut key = String::with_capacity(request.path.len() + 1 + address.len());
        key.push_str(&request.path);
        key.push(KEY_SEPARATOR);
        key.push_str(&address);
        key
    }
}

/// Return the host part of `addr`, or `addr` itself if it has no port.
fn host_only(addr: &str) -> &str {
    split_host_port(addr).map_or(addr, |(host, _)| host)
}

/// Split `host:port` or `[host]:port` into its parts.
///
/// Returns `None` when there is no port, when an unbracketed host contains a
/// colon (a bare IPv6 address), or when the port contains one.
fn split_host_port(addr: &str) -> Option<(&str, &str)> {
    if let Some(rest) = addr.strip_prefix('[') {
        let (host, after) = rest.split_once(']')?;
        let port = after.strip_prefix(':')?;
        if host.contains('[') || port.contains([':', '[', ']']) {
            return None;
        }
        return Some((host, port));
    }

    let (host, port) = addr.rsplit_once(':')?;
    if host.contains([':', '[', ']']) || port.contains(['[', ']']) {
        return None;
    }
    Some((host, port))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(path: &str, remote_addr: &str) -> RequestInfo {
        RequestInfo::new("GET", path, remote_addr)
    }

    #[test]
    fn test_split_host_port() {
        assert_eq!(split_host_port("1.2.3.4:8080"), Some(("1.2.3.4", "8080")));
        assert_eq!(split_host_port("localhost:80"), Some(("localhost", "80")));
        assert_eq!(split_host_port("[::1]:443"), Some(("::1", "443")));
        assert_eq!(split_host_port("1.2.3.4:"), Some(("1.2.3.4", "")));
        assert_eq!(split_host_port("1.2.3.4"), None);
        assert_eq!(split_host_port("::1"), None);
        assert_eq!(split_host_port("[::1]"), None);
        assert_eq!(split_host_port("[::1]:80:90"), None);
        assert_eq!(split_host_port(""), None);
    }

    #[test]
    fn test_client_address_strips_port() {
        let policy = ByClientAddress::new("");
        assert_eq!(policy.key(&request("/", "1.2.3.4:8080")), "1.2.3.4");
        assert_eq!(policy.key(&request("/", "[2001:db8::1]:8080")), "2001:db8::1");
    }

    #[test]
    fn test_client_address_without_port_is_unchanged() {
        let policy = ByClientAddress::new("");
        assert_eq!(policy.key(&request("/", "1.2.3.4")), "1.2.3.4");
        assert_eq!(policy.key(&request("/", "not an address")), "not an address");
    }

    #[test]
    fn test_client_address_is_deterministic() {
        let policy = ByClientAddress::default();
        let a = request("/a", "1.2.3.4:1111");
        let b = request("/b", "1.2.3.4:1111");
        assert_eq!(policy.key(&a), policy.key(&b));
    }

    #[test]
    fn test_address_with_extra_port_is_unchanged() {
        let policy = ByClientAddress::new("");
        assert_eq!(policy.key(&request("/", "[::1]:80:90")), "[::1]:80:90");
    }

    #[test]
    fn test_non_ascii_header_keys_are_independent() {
        let policy = ByClientAddress::new("X-Api-Key");
        fn with_key(value: &[u8]) -> RequestInfo {
            let mut req = request("/", "10.0.0.1:5555");
            req.headers
                .insert("x-api-key", http::HeaderValue::from_bytes(value).unwrap());
            req
        }

        let a = policy.key(&with_key(b"caf\xc3\xa9"));
        let b = policy.key(&with_key(b"na\xc3\xafve"));

        assert_eq!(a, "caf\u{e9}");
        assert_eq!(b, "na\u{ef}ve");
        assert_ne!(a, b);
    }

    #[test]
    fn test_client_address_from_header_verbatim() {
        let policy = ByClientAddress::new("X-Real-IP");
        let req = request("/", "10.0.0.1:5555").with_header("X-Real-IP", "5.6.7.8:9000");

        assert_eq!(policy.key(&req), "5.6.7.8:9000");
    }

    #[test]
    fn test_client_address_from_header_with_stripping() {
        let policy = ByClientAddress::new("X-Real-IP").strip_header_port(true);
        let req = request("/", "10.0.0.1:5555").with_header("X-Real-IP", "5.6.7.8:9000");

        assert_eq!(policy.key(&req), "5.6.7.8");
    }

    #[test]
    fn test_missing_header_yields_empty_key() {
        let policy = ByClientAddress::new("X-Real-IP");
        assert_eq!(policy.key(&request("/", "10.0.0.1:5555")), "");
    }

    #[test]
    fn test_path_and_client_address() {
        let policy = ByPathAndClientAddress::new("");
        assert_eq!(policy.key(&request("/foo", "1.2.3.4:80")), "/foo\n1.2.3.4");
    }

    #[test]
    fn test_path_and_address_differs_from_address() {
        let req = request("/foo", "1.2.3.4");
        let by_address = ByClientAddress::new("").key(&req);
        let by_path = ByPathAndClientAddress::new("").key(&req);

        assert_ne!(by_address, by_path);
    }

    #[test]
    fn test_path_and_header_with_stripping() {
        let policy = ByPathAndClientAddress::new("x-client").strip_header_port(true);
        let req = request("/login", "").with_header("x-client", "[::1]:99");

        assert_eq!(policy.key(&req), "/login\n::1");
    }

    #[test]
    fn test_closure_policy() {
        let policy = |req: &RequestInfo| format!("{}\n{}", req.method, req.path);
        assert_eq!(KeyPolicy::key(&policy, &request("/x", "")), "GET\n/x");
    }

    #[test]
    fn test_policy_kind_deserialize() {
        let kind: KeyPolicyKind = serde_yaml::from_str("path_and_client_address").unwrap();
        assert_eq!(kind, KeyPolicyKind::PathAndClientAddress);
        assert_eq!(KeyPolicyKind::default(), KeyPolicyKind::ClientAddress);
    }
}
