use std::sync::Arc;
use std::time::Duration;

use client::{Config, Proxy};


/// Number of connections kept open for a single stream
pub const MAX_CONNECTIONS: usize = 4;
/// Number of redirects followed on open
pub const MAX_REDIRECTS: usize = 20;
/// Maximum size of response headers (status line included)
pub const MAX_HEAD: usize = 1024;
/// Connections not read for this long are closed on seek
pub const IDLE_TIMEOUT_MS: u64 = 5000;
/// Limit for every blocking socket operation
pub const IO_TIMEOUT: Duration = Duration::from_millis(30000);
/// Seek reads ahead up to at least this many bytes instead of reconnecting
pub const READAHEAD_MIN: u64 = 32 * 1024;
/// Size of the scratch buffer used to discard data
pub const READAHEAD_QUANTUM: usize = 16 * 1024;
/// First pipelined chunk, doubled on each request
pub const PIPELINE_CHUNK: u64 = 32 * 1024;
/// Chunks larger than this are replaced by a request for the rest
pub const PIPELINE_CHUNK_MAX: u64 = 1024 * 1024;
/// Requests sent over a single connection (servers limit this too)
pub const MAX_REQUESTS: u32 = 100;
/// Connections with fewer requests left are not reused on seek
pub const MIN_REQUESTS_LEFT: u32 = 7;
/// Smoothing of the read rate estimate, weight is `1/2^shift`
pub const READ_RATE_SHIFT: u32 = 3;
/// Smoothing of the connect time estimate, weight is `1/2^shift`
pub const CONNECT_RATE_SHIFT: u32 = 4;


impl Config {
    /// Create a config with defaults
    pub fn new() -> Config {
        Config {
            proxy: None,
            skip_certificate_check: false,
            tunnel_fast_open: false,
        }
    }
    /// Connect through HTTP proxy
    ///
    /// Plain `http` requests are sent to the proxy with an absolute url,
    /// `https` urls are tunneled using `CONNECT`.
    pub fn proxy(&mut self, host: &str, port: u16) -> &mut Self {
        let (user, pass) = match self.proxy.take() {
            Some(p) => (p.user, p.pass),
            None => (None, None),
        };
        self.proxy = Some(Proxy {
            host: host.to_string(),
            port: port,
            user: user,
            pass: pass,
        });
        self
    }
    /// Basic authentication for the proxy
    ///
    /// Has no effect unless `proxy()` is also set.
    pub fn proxy_credentials(&mut self, user: &str, pass: &str)
        -> &mut Self
    {
        if let Some(ref mut proxy) = self.proxy {
            proxy.user = Some(user.to_string());
            proxy.pass = Some(pass.to_string());
        }
        self
    }
    /// Don't verify server certificates
    ///
    /// Default is `false`. Only useful for testing.
    pub fn skip_certificate_check(&mut self, value: bool) -> &mut Self {
        self.skip_certificate_check = value;
        self
    }
    /// Send TLS client hello together with proxy `CONNECT` request
    ///
    /// Saves a round trip but some proxies drop data sent before they
    /// reply. Default is `false`.
    pub fn tunnel_fast_open(&mut self, value: bool) -> &mut Self {
        self.tunnel_fast_open = value;
        self
    }
    /// Create a Arc'd config clone to pass to the constructor
    ///
    /// This is just a convenience method.
    pub fn done(&mut self) -> Arc<Config> {
        Arc::new(self.clone())
    }
}

impl Proxy {
    pub fn host(&self) -> &str {
        &self.host
    }
    pub fn port(&self) -> u16 {
        self.port
    }
    /// Credentials, if proxy requires authentication
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (&self.user, &self.pass) {
            (&Some(ref u), &Some(ref p)) => Some((&u[..], &p[..])),
            _ => None,
        }
    }
}
