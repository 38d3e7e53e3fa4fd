//! A tiny threaded HTTP server serving one resource with byte ranges
#![allow(dead_code)]

use std::io::{BufRead, BufReader, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use env_logger;
use rcgen::{CertificateParams, KeyPair};
use rustls::{ServerConfig, ServerConnection, StreamOwned};
use rustls::crypto::ring;
use rustls::pki_types::{PrivateKeyDer, PrivatePkcs8KeyDer};


/// Misbehaviour on a single request
#[derive(Debug, Clone, Copy)]
pub enum Fault {
    /// Reply with this status (e.g. `404 Not Found`) and close
    Status(&'static str),
    /// Close the connection without a reply
    Close,
}

#[derive(Clone)]
pub struct Options {
    pub data: Arc<Vec<u8>>,
    /// Reply `206` to range requests, `200` otherwise
    pub ranges: bool,
    /// Reply with `HTTP/1.1` and keep connection open
    pub http11: bool,
    pub server: Option<&'static str>,
    /// Close the first connection after this many body bytes
    pub cut_after: Option<usize>,
    /// Stop sending the response to `bytes=0-` after this many bytes
    pub stall_after: Option<usize>,
    /// `(connection, request, fault)`, requests are counted per
    /// connection, `CONNECT` included
    pub faults: Vec<(usize, usize, Fault)>,
    /// Accept TLS connections and `CONNECT` tunnels (refused otherwise)
    pub tls: Option<Arc<ServerConfig>>,
}

pub struct Server {
    addr: SocketAddr,
    connections: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<String>>>,
}

struct Peer {
    num: usize,
    addr: SocketAddr,
    options: Options,
    requests: Arc<Mutex<Vec<String>>>,
    served: usize,
}

/// Deterministic test payload
pub fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8 ^ (i >> 12) as u8).collect()
}

/// Server side of TLS with a fresh self-signed certificate
pub fn tls_config() -> Arc<ServerConfig> {
    let key = KeyPair::generate().unwrap();
    let params = CertificateParams::new(vec!["localhost".to_string()])
        .unwrap();
    let cert = params.self_signed(&key).unwrap();
    let der = PrivatePkcs8KeyDer::from(key.serialize_der());
    let config = ServerConfig::builder_with_provider(
            Arc::new(ring::default_provider()))
        .with_safe_default_protocol_versions().unwrap()
        .with_no_client_auth()
        .with_single_cert(vec![cert.der().clone()], PrivateKeyDer::Pkcs8(der))
        .unwrap();
    Arc::new(config)
}

impl Options {
    pub fn new(len: usize) -> Options {
        Options {
            data: Arc::new(payload(len)),
            ranges: true,
            http11: true,
            server: None,
            cut_after: None,
            stall_after: None,
            faults: Vec::new(),
            tls: None,
        }
    }
}

impl Server {
    pub fn start(options: Options) -> Server {
        env_logger::try_init().ok();
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let connections = Arc::new(AtomicUsize::new(0));
        let requests = Arc::new(Mutex::new(Vec::new()));
        let conns = connections.clone();
        let reqs = requests.clone();
        thread::spawn(move || {
            for sock in listener.incoming() {
                let sock = match sock {
                    Ok(sock) => sock,
                    Err(_) => continue,
                };
                let mut peer = Peer {
                    num: conns.fetch_add(1, Ordering::SeqCst),
                    addr: addr,
                    options: options.clone(),
                    requests: reqs.clone(),
                    served: 0,
                };
                thread::spawn(move || peer.handle(sock));
            }
        });
        Server {
            addr: addr,
            connections: connections,
            requests: requests,
        }
    }
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
    pub fn https_url(&self, path: &str) -> String {
        format!("https://{}{}", self.addr, path)
    }
    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }
    /// Request heads received so far
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
    /// Values of `Range` headers received so far
    pub fn ranges(&self) -> Vec<String> {
        self.requests().iter().filter_map(|req| {
            req.lines()
                .find(|line| line.starts_with("Range: "))
                .map(|line| line["Range: ".len()..].to_string())
        }).collect()
    }
}

fn read_request<S: Read>(reader: &mut BufReader<S>) -> Option<String> {
    let mut head = String::new();
    loop {
        let mut line = String::new();
        match reader.read_line(&mut line) {
            Ok(0) | Err(_) => return None,
            Ok(_) => {}
        }
        head.push_str(&line);
        if line == "\r\n" {
            return Some(head);
        }
    }
}

fn send<S: Read + Write>(reader: &mut BufReader<S>, data: &[u8]) -> bool {
    let out = reader.get_mut();
    out.write_all(data).and_then(|()| out.flush()).is_ok()
}

fn parse_range(head: &str, len: usize) -> Option<(usize, usize)> {
    let value = head.lines()
        .find(|line| line.starts_with("Range: bytes="))?;
    let value = &value["Range: bytes=".len()..];
    let dash = value.find('-')?;
    let start = value[..dash].parse().ok()?;
    let end = match &value[dash+1..] {
        "" => len,
        last => last.parse::<usize>().ok()? + 1,
    };
    Some((start, end.min(len)))
}

fn request_path(head: &str) -> String {
    let target = head.split(' ').nth(1).unwrap_or("/");
    match target.find("://") {
        Some(idx) => {
            let rest = &target[idx+3..];
            rest.find('/').map(|i| rest[i..].to_string())
                .unwrap_or_else(|| "/".to_string())
        }
        None => target.to_string(),
    }
}

impl Peer {
    fn handle(&mut self, sock: TcpStream) {
        let mut first = [0u8; 1];
        // TLS records of the handshake start with 0x16
        let hello = sock.peek(&mut first).map_or(false, |n| n == 1)
            && first[0] == 0x16;
        if hello {
            if let Some(config) = self.options.tls.clone() {
                let conn = ServerConnection::new(config).unwrap();
                self.serve(&mut BufReader::new(StreamOwned::new(conn, sock)));
                return;
            }
        }
        let mut reader = BufReader::new(sock);
        if !self.serve(&mut reader) {
            return;
        }
        let config = match self.options.tls.clone() {
            Some(config) => config,
            None => return,
        };
        // client hello might be sent along with the CONNECT
        let early = reader.buffer().to_vec();
        let sock = reader.into_inner();
        let mut conn = ServerConnection::new(config).unwrap();
        let mut early = &early[..];
        while !early.is_empty() {
            conn.read_tls(&mut early).unwrap();
        }
        conn.process_new_packets().unwrap();
        self.serve(&mut BufReader::new(StreamOwned::new(conn, sock)));
    }
    fn fault(&self) -> Option<Fault> {
        self.options.faults.iter()
            .find(|&&(conn, req, _)| conn == self.num && req == self.served)
            .map(|&(_, _, fault)| fault)
    }
    /// Serves requests until the connection is done
    ///
    /// Returns true when a tunnel is established.
    fn serve<S: Read + Write>(&mut self, reader: &mut BufReader<S>) -> bool {
        let version = if self.options.http11 { "HTTP/1.1" } else { "HTTP/1.0" };
        let server = self.options.server
            .map(|s| format!("Server: {}\r\n", s))
            .unwrap_or_default();
        while let Some(head) = read_request(reader) {
            self.requests.lock().unwrap().push(head.clone());
            let fault = self.fault();
            self.served += 1;
            match fault {
                Some(Fault::Status(status)) => {
                    let reply = format!("{} {}\r\n{}Content-Length: 0\r\n\r\n",
                        version, status, server);
                    send(reader, reply.as_bytes());
                    return false;
                }
                Some(Fault::Close) => return false,
                None => {}
            }
            if head.starts_with("CONNECT ") {
                if self.options.tls.is_some() {
                    return send(reader,
                        b"HTTP/1.1 200 Connection established\r\n\r\n");
                }
                send(reader, b"HTTP/1.1 403 Forbidden\r\n\r\n");
                return false;
            }
            let path = request_path(&head);
            if path.starts_with("/hop/") {
                let hops: usize = path["/hop/".len()..].parse().unwrap();
                if hops > 0 {
                    // alternate absolute and relative locations
                    let location = if hops % 2 == 0 {
                        format!("http://{}/hop/{}", self.addr, hops - 1)
                    } else {
                        format!("{}", hops - 1)
                    };
                    let reply = format!("{} 302 Found\r\n{}Location: {}\r\n\
                        Content-Length: 0\r\n\r\n", version, server, location);
                    if !send(reader, reply.as_bytes()) {
                        return false;
                    }
                    continue;
                }
            }
            let data = self.options.data.clone();
            let range = if self.options.ranges {
                parse_range(&head, data.len())
            } else {
                None
            };
            let (status, start, end) = match range {
                Some((start, end)) if start < data.len() => {
                    let status = format!("206 Partial Content\r\n\
                        Content-Range: bytes {}-{}/{}",
                        start, end - 1, data.len());
                    (status, start, end)
                }
                _ => ("200 OK".to_string(), 0, data.len()),
            };
            let reply = format!("{} {}\r\n{}Content-Length: {}\r\n\r\n",
                version, status, server, end - start);
            if !send(reader, reply.as_bytes()) {
                return false;
            }
            let body = &data[start..end];
            if let Some(cut) = self.options.cut_after {
                if self.num == 0 && cut < body.len() {
                    send(reader, &body[..cut]);
                    return false;
                }
            }
            if let Some(stall) = self.options.stall_after {
                if head.contains("Range: bytes=0-\r\n") && stall < body.len() {
                    send(reader, &body[..stall]);
                    // keep the connection open until the client goes away
                    let mut buf = [0u8; 1024];
                    while let Ok(n) = reader.read(&mut buf) {
                        if n == 0 {
                            break;
                        }
                    }
                    return false;
                }
            }
            if !send(reader, body) {
                return false;
            }
            if !self.options.http11 {
                return false;
            }
        }
        false
    }
}
