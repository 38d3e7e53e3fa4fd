//! The seekable HTTP/1.x stream client
//!
//! A stream keeps a few persistent connections to the same resource and
//! picks the cheapest one when seeking: reading ahead on a connection that
//! is close to the target, pipelining a new range request on it, or
//! opening a new connection.
mod config;
mod conn;
mod connect;
mod encoder;
mod errors;
mod head;
mod parser;
mod planner;
mod pool;
mod stream;
mod tls;
mod transport;

pub use self::errors::Error;
pub use self::stream::HttpStream;


/// Proxy server used for all connections of a stream
#[derive(Debug, Clone)]
pub struct Proxy {
    host: String,
    port: u16,
    user: Option<String>,
    pass: Option<String>,
}

/// Fine-grained configuration of the stream
#[derive(Debug, Clone)]
pub struct Config {
    proxy: Option<Proxy>,
    skip_certificate_check: bool,
    tunnel_fast_open: bool,
}
