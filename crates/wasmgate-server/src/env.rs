//! Request-derived guest environment construction.
//!
//! Every guest run sees the same fixed key set, in the same order:
//! `http_path`, `http_method`, `http_host`, `http_query`, `remote_addr`.

/// The environment map injected into one guest run.
///
/// Built once per request from fixed request fields and immutable
/// afterwards; the sandbox binds the pairs as WASI environment variables.
#[derive(Debug, Clone)]
pub struct RequestEnv {
    /// Decoded request path, including the leading slash.
    pub path: String,
    /// HTTP method (GET, POST, ...).
    pub method: String,
    /// Value of the Host header.
    pub host: String,
    /// Raw (still URL-encoded) query string, empty if absent.
    pub query: String,
    /// Peer address of the connection.
    pub remote_addr: String,
}

impl RequestEnv {
    /// Flatten into ordered key/value pairs for the sandbox.
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        vec![
            ("http_path".to_string(), self.path.clone()),
            ("http_method".to_string(), self.method.clone()),
            ("http_host".to_string(), self.host.clone()),
            ("http_query".to_string(), self.query.clone()),
            ("remote_addr".to_string(), self.remote_addr.clone()),
        ]
    }
}
