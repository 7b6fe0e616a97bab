use crate::tls::TlsTrustPolicy;

/// Scheme of the backend API server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendScheme {
    Http,
    Https,
}

impl BackendScheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendScheme::Http => "http",
            BackendScheme::Https => "https",
        }
    }

    /// The matching WebSocket scheme (`http→ws`, `https→wss`).
    pub fn ws_str(&self) -> &'static str {
        match self {
            BackendScheme::Http => "ws",
            BackendScheme::Https => "wss",
        }
    }
}

/// Where and how the gateway talks to the API server.
///
/// Constructed once at startup and shared by reference into the gateway
/// and the relay; never mutated afterwards.
#[derive(Debug)]
pub struct ProxyEndpoint {
    pub scheme: BackendScheme,
    pub host: String,
    pub trust: TlsTrustPolicy,
    /// Expected `Origin` of upgrade requests. `None` means any origin is
    /// accepted (logged as permissive).
    pub origin: Option<String>,
}

impl ProxyEndpoint {
    /// Rewrite a request path (with query) onto the backend's HTTP base.
    pub fn http_url(&self, path_and_query: &str) -> String {
        format!("{}://{}{}", self.scheme.as_str(), self.host, path_and_query)
    }

    /// Rewrite a request path (with query) onto the backend's WebSocket
    /// base.
    pub fn ws_url(&self, path_and_query: &str) -> String {
        format!("{}://{}{}", self.scheme.ws_str(), self.host, path_and_query)
    }
}
