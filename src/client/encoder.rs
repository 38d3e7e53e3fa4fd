//! Request text for the stream
//!
//! The `GET` request is built once per url and only the `Range` header at
//! its tail is rewritten for every subsequent request.
use std::io::Write;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use netbuf::Buf;

use uri::ParsedUrl;
use version::Version;
use client::Proxy;
use client::config::PIPELINE_CHUNK_MAX;


/// A `GET` request with a rewritable `Range` header
#[derive(Debug)]
pub struct Request {
    buf: Buf,
    /// Offset of the minor version digit on the request line
    version_pos: usize,
    /// Offset of the range value, right after `Range: bytes=`
    tail: usize,
}

fn basic_auth(buf: &mut Buf, header: &str, user: &str, pass: &str) {
    let credentials = BASE64.encode(format!("{}:{}", user, pass));
    write!(buf, "{}: Basic {}\r\n", header, credentials).unwrap();
}

impl Request {
    /// Initial request, asks for the whole resource
    ///
    /// When connecting through a proxy without a tunnel the request line
    /// contains the absolute url.
    pub fn new(url: &ParsedUrl, proxy: Option<&Proxy>) -> Request {
        let mut buf = Buf::new();
        let forward = if url.is_tls() { None } else { proxy };
        if forward.is_some() {
            write!(buf, "GET {} ", url).unwrap();
        } else {
            write!(buf, "GET {} ", url.path()).unwrap();
        }
        let version_pos = buf.len() + "HTTP/1.".len();
        write!(buf, "{}\r\n", Version::Http10).unwrap();
        write!(buf, "Host: {}\r\n", url.host_header()).unwrap();
        buf.extend(b"User-Agent: .\r\n");
        if let Some((user, pass)) = forward.and_then(|p| p.credentials()) {
            basic_auth(&mut buf, "Proxy-Authorization", user, pass);
        }
        if let Some(user) = url.user() {
            basic_auth(&mut buf, "Authorization",
                user, url.pass().unwrap_or(""));
        }
        buf.extend(b"Referer: /\r\nRange: bytes=");
        let tail = buf.len();
        buf.extend(b"0-\r\n\r\n");
        Request {
            buf: buf,
            version_pos: version_pos,
            tail: tail,
        }
    }
    /// Switches the request line to `HTTP/1.1` in place
    pub fn upgrade(&mut self) {
        if self.buf[..][self.version_pos] == b'1' {
            return;
        }
        let rest = self.buf[..][self.version_pos+1..].to_vec();
        self.buf.remove_range(self.version_pos..);
        self.buf.extend(b"1");
        self.buf.extend(&rest);
    }
    /// Rewrites the range and returns the whole request
    ///
    /// The `end` is exclusive, `None` asks for the rest of the resource.
    pub fn range(&mut self, start: u64, end: Option<u64>) -> &[u8] {
        self.buf.remove_range(self.tail..);
        match end {
            Some(end) => write!(self.buf, "{}-{}\r\n\r\n", start, end-1),
            None => write!(self.buf, "{}-\r\n\r\n", start),
        }.unwrap();
        &self.buf[..]
    }
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..]
    }
}

/// Request to open a tunnel through the proxy
pub fn connect_request(url: &ParsedUrl, proxy: &Proxy) -> Buf {
    let mut buf = Buf::new();
    let authority = url.authority();
    write!(buf, "CONNECT {} HTTP/1.1\r\n", authority).unwrap();
    write!(buf, "Host: {}\r\n", authority).unwrap();
    buf.extend(b"User-Agent: .\r\n");
    if let Some((user, pass)) = proxy.credentials() {
        basic_auth(&mut buf, "Proxy-Authorization", user, pass);
    }
    buf.extend(b"Proxy-Connection: keep-alive\r\n\r\n");
    buf
}

/// Range of the next request and the chunk size for the one after it
///
/// A chunk is requested only while the resource extends beyond it, chunks
/// double each time and when they grow over the limit the rest of the
/// resource is requested instead.
pub fn plan_range(pos: u64, chunk: Option<u64>, content_length: Option<u64>)
    -> (Option<u64>, Option<u64>)
{
    match (chunk, content_length) {
        (Some(chunk), Some(len)) if pos.saturating_add(chunk) < len => {
            let next = chunk.saturating_mul(2);
            let next = if next > PIPELINE_CHUNK_MAX { None } else { Some(next) };
            (Some(pos + chunk), next)
        }
        _ => (None, None),
    }
}
