use std::cmp::min;
use std::io::{self, Read, Seek, SeekFrom};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use netbuf::Buf;

use uri::{ParsedUrl, resolve_location};
use client::{Config, Error};
use client::config::{IO_TIMEOUT, MAX_CONNECTIONS, MAX_REDIRECTS};
use client::config::{PIPELINE_CHUNK, PIPELINE_CHUNK_MAX, READAHEAD_QUANTUM};
use client::config::CONNECT_RATE_SHIFT;
use client::conn::{Connection, Pending};
use client::connect::{connect, resolve};
use client::encoder::{Request, connect_request, plan_range};
use client::parser::{initial_reply, range_reply, Reply};
use client::planner::{judge, pipeline_threshold, Candidate, Plan};
use client::pool::Pool;
use client::tls::{TlsContext, Tunnel};
use client::transport::{IoStatus, Transport};


/// A remote resource read as a seekable byte stream
///
/// Reads and seeks block the calling thread, every single wait on the
/// network is limited by a timeout of 30 seconds.
pub struct HttpStream {
    config: Arc<Config>,
    url: ParsedUrl,
    location: String,
    /// Host and port the addresses below were resolved for
    resolved: Option<(String, u16)>,
    addrs: Vec<SocketAddr>,
    /// Origin of the cached TLS session
    origin: Option<(String, u16)>,
    tls: Option<TlsContext>,
    request: Request,
    tunnel: Option<Buf>,
    pool: Pool<Connection>,
    current: Option<usize>,
    pos: u64,
    content_length: Option<u64>,
    seekable: bool,
    pipeline: bool,
    /// Smoothed time to establish a connection, milliseconds
    connect_rate: i64,
}

fn millis(start: Instant) -> i64 {
    start.elapsed().as_millis() as i64
}

fn offset(base: u64, off: i64) -> Result<u64, Error> {
    if off >= 0 {
        base.checked_add(off as u64)
    } else {
        base.checked_sub(off.unsigned_abs())
    }.ok_or(Error::InvalidSeek)
}

impl HttpStream {
    /// Opens the url following redirects
    ///
    /// The first response tells whether the server supports ranges and
    /// persistent connections, the body of that response is read next.
    pub fn open(url: &str, config: &Arc<Config>) -> Result<HttpStream, Error> {
        let parsed = ParsedUrl::parse(url)?;
        let request = Request::new(&parsed, config.proxy.as_ref());
        let mut stream = HttpStream {
            config: config.clone(),
            url: parsed,
            location: url.to_string(),
            resolved: None,
            addrs: Vec::new(),
            origin: None,
            tls: None,
            request: request,
            tunnel: None,
            pool: Pool::new(MAX_CONNECTIONS),
            current: None,
            pos: 0,
            content_length: None,
            seekable: false,
            pipeline: false,
            connect_rate: 0,
        };
        let mut redirects = 0;
        loop {
            stream.prepare()?;
            let start = Instant::now();
            let mut conn = stream.dial()?;
            let elapsed = millis(start);
            conn.send(stream.request.as_bytes())?;
            let head = conn.read_head()?;
            match initial_reply(&head)? {
                Reply::Content { content_length, seekable, pipeline } => {
                    debug!("Opened {}, length {:?}, seekable: {}, \
                        pipelining: {}",
                        stream.url, content_length, seekable, pipeline);
                    stream.content_length = content_length;
                    stream.seekable = seekable;
                    stream.pipeline = pipeline;
                    if pipeline {
                        stream.request.upgrade();
                    }
                    conn.end = content_length;
                    stream.connect_rate = elapsed.max(1);
                    let idx = stream.adopt(conn);
                    stream.current = Some(idx);
                    return Ok(stream);
                }
                Reply::Redirect(location) => {
                    conn.close(true);
                    redirects += 1;
                    if redirects > MAX_REDIRECTS {
                        return Err(Error::TooManyRedirects);
                    }
                    let next = resolve_location(&stream.location, &location);
                    debug!("Redirected to {}", next);
                    stream.url = ParsedUrl::parse(&next)?;
                    stream.location = next;
                }
            }
        }
    }
    /// Resolves addresses and builds requests for the current url
    fn prepare(&mut self) -> Result<(), Error> {
        let target = match self.config.proxy {
            Some(ref proxy) => (proxy.host().to_string(), proxy.port()),
            None => (self.url.host().to_string(), self.url.port()),
        };
        if self.resolved.as_ref() != Some(&target) {
            self.addrs = resolve(&target.0, target.1)?;
            trace!("Resolved {}:{} to {:?}", target.0, target.1, self.addrs);
            self.resolved = Some(target);
        }
        let origin = (self.url.host().to_string(), self.url.port());
        if self.origin.as_ref() != Some(&origin) {
            if let Some(ref mut tls) = self.tls {
                tls.forget_session();
            }
            self.origin = Some(origin);
        }
        if self.url.is_tls() && self.tls.is_none() {
            let verify = !self.config.skip_certificate_check;
            self.tls = Some(TlsContext::new(verify)?);
        }
        self.request = Request::new(&self.url, self.config.proxy.as_ref());
        self.tunnel = match self.config.proxy {
            Some(ref proxy) if self.url.is_tls() => {
                Some(connect_request(&self.url, proxy))
            }
            _ => None,
        };
        Ok(())
    }
    /// Establishes a new connection, handshake included
    fn dial(&mut self) -> Result<Connection, Error> {
        let (sock, addr) = connect(&self.addrs, IO_TIMEOUT)?;
        // next connect tries the address that worked first
        self.addrs.retain(|a| *a != addr);
        self.addrs.insert(0, addr);
        let transport = match self.tls {
            Some(ref tls) if self.url.is_tls() => {
                let fast_open = self.config.tunnel_fast_open;
                let tunnel = self.tunnel.as_ref().map(|buf| Tunnel {
                    request: &buf[..],
                    fast_open: fast_open,
                });
                tls.connect(self.url.host(), sock, tunnel)?
            }
            _ => Transport::Plain(sock),
        };
        Ok(Connection::new(transport))
    }
    fn update_connect_rate(&mut self, ms: i64) {
        self.connect_rate += (ms.max(1) - self.connect_rate
            + (1 << (CONNECT_RATE_SHIFT - 1))) >> CONNECT_RATE_SHIFT;
    }
    /// Puts connection into the pool, evicting the least recently used
    fn adopt(&mut self, conn: Connection) -> usize {
        if self.pool.is_full() {
            if let Some(lru) = self.pool.lru() {
                debug!("Pool is full, closing connection {}", lru);
                self.evict(lru);
            }
        }
        match self.pool.insert(conn) {
            Ok(idx) => idx,
            Err(_) => unreachable!(),
        }
    }
    /// Closes connection gracefully
    fn evict(&mut self, idx: usize) {
        if self.current == Some(idx) {
            self.current = None;
        }
        if let Some(conn) = self.pool.remove(idx) {
            conn.close(true);
        }
    }
    /// Drops a broken connection
    fn abandon(&mut self, idx: usize) {
        if self.current == Some(idx) {
            self.current = None;
        }
        if let Some(conn) = self.pool.remove(idx) {
            conn.close(false);
        }
    }
    /// Opens a new connection and reads the response head for `pos`
    fn open_at(&mut self, pos: u64, chunk: Option<u64>)
        -> Result<usize, Error>
    {
        let start = Instant::now();
        let mut conn = self.dial()?;
        let elapsed = millis(start);
        self.update_connect_rate(elapsed);
        debug!("New connection for offset {} in {} ms, {} in pool",
            pos, elapsed, self.pool.len());
        conn.chunk = chunk;
        let idx = self.adopt(conn);
        let result = self.send_request(idx, pos)
            .and_then(|()| self.handle_response(idx));
        match result {
            Ok(()) => {
                self.current = Some(idx);
                Ok(idx)
            }
            Err(e) => {
                self.abandon(idx);
                Err(e)
            }
        }
    }
    fn send_request(&mut self, idx: usize, pos: u64) -> Result<(), Error> {
        let content_length = self.content_length;
        let conn = self.pool.at(idx);
        let (end, next) = plan_range(pos, conn.chunk, content_length);
        trace!("Requesting {}..{:?} on {}", pos, end, idx);
        conn.send(self.request.range(pos, end))?;
        conn.chunk = next;
        conn.pending = Pending::Requested { start: pos, end: end };
        Ok(())
    }
    /// Reads the head of the outstanding response
    fn handle_response(&mut self, idx: usize) -> Result<(), Error> {
        let known = self.content_length;
        let conn = self.pool.at(idx);
        let (start, end) = match conn.pending {
            Pending::Requested { start, end } => (start, end),
            Pending::Idle => unreachable!(),
        };
        let head = conn.read_head()?;
        trace!("Response {} {} for {}..{:?} on {}",
            head.code(), head.reason(), start, end, idx);
        let reply = range_reply(&head, start, end, known)?;
        conn.pending = Pending::Idle;
        conn.pos = start;
        conn.end = Some(reply.end);
        if reply.close {
            conn.requests_left = 0;
        }
        if known.is_none() {
            self.content_length = Some(reply.length);
        }
        Ok(())
    }
    /// Continues reading after an error or a seek past the end
    fn resume(&mut self) -> Result<bool, Error> {
        match self.content_length {
            Some(len) if self.seekable && self.pos < len => {
                let pos = self.pos;
                self.reposition(pos)?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
    /// Reads from the current connection
    ///
    /// Crosses response boundaries: sends the next request (or reopens
    /// the connection) when the current response is exhausted.
    fn read_body(&mut self, buf: &mut [u8], blocking: bool)
        -> Result<usize, Error>
    {
        loop {
            let idx = self.current.ok_or(Error::Closed)?;
            let (pos, end, pending, left) = {
                let conn = self.pool.at(idx);
                (conn.pos, conn.end, conn.pending, conn.requests_left)
            };
            if end == Some(pos) {
                if end == self.content_length {
                    return Ok(0);
                }
                if pending == Pending::Idle {
                    if !self.pipeline || left == 0 {
                        self.evict(idx);
                        self.open_at(pos, None)?;
                        continue;
                    }
                    self.send_request(idx, pos)?;
                }
                if !blocking && !self.pool.at(idx).readable_now() {
                    return Ok(0);
                }
                match self.handle_response(idx) {
                    Ok(()) => continue,
                    Err(ref e) if e.is_transient() && self.pipeline => {
                        debug!("Pipelined response failed: {}, reconnecting",
                            e);
                        let start = match self.pool.at(idx).pending {
                            Pending::Requested { start, .. } => start,
                            Pending::Idle => pos,
                        };
                        self.abandon(idx);
                        self.open_at(start, None)?;
                        continue;
                    }
                    Err(e) => return Err(e),
                }
            }
            let want = match end {
                Some(end) => min(buf.len() as u64, end - pos) as usize,
                None => buf.len(),
            };
            match self.pool.at(idx).read(&mut buf[..want], blocking) {
                IoStatus::Ready(n) => {
                    self.maybe_pipeline(idx);
                    return Ok(n);
                }
                IoStatus::NotReady => return Ok(0),
                IoStatus::Closed => {
                    if end.is_some() {
                        return Err(Error::ResetOnResponseBody);
                    }
                    debug!("Response finished at {}", pos);
                    self.content_length = Some(pos);
                    self.abandon(idx);
                    return Ok(0);
                }
                IoStatus::Failed(e) => return Err(e.into()),
            }
        }
    }
    /// Sends next request early when the response is about to end
    fn maybe_pipeline(&mut self, idx: usize) {
        if !self.pipeline {
            return;
        }
        let connect_rate = self.connect_rate;
        let content_length = self.content_length;
        let end = {
            let conn = self.pool.at(idx);
            let end = match conn.end {
                Some(end) if Some(end) != content_length => end,
                _ => return,
            };
            if conn.pending != Pending::Idle || conn.requests_left == 0 {
                return;
            }
            let chunk = conn.chunk.unwrap_or(PIPELINE_CHUNK_MAX);
            let thresh = pipeline_threshold(chunk, connect_rate,
                                            conn.read_rate());
            if end - conn.pos > thresh || !conn.can_send_now() {
                return;
            }
            end
        };
        if let Err(e) = self.send_request(idx, end) {
            debug!("Can't pipeline request at {}: {}", end, e);
        }
    }
    fn read_some(&mut self, buf: &mut [u8], blocking: bool)
        -> Result<usize, Error>
    {
        if buf.is_empty() {
            return Ok(0);
        }
        let mut retried = false;
        loop {
            if self.current.is_none() && !self.resume()? {
                return Ok(0);
            }
            match self.read_body(buf, blocking) {
                Ok(n) => {
                    self.pos += n as u64;
                    return Ok(n);
                }
                Err(e) => {
                    if let Some(idx) = self.current {
                        warn!("Read error at {}: {}", self.pos, e);
                        self.abandon(idx);
                    }
                    if e.is_transient() && self.seekable && !retried {
                        retried = true;
                        continue;
                    }
                    return Err(e);
                }
            }
        }
    }
    /// Reads up to `nmemb` items of `size` bytes each
    ///
    /// Returns the number of complete items read. Bytes are read as they
    /// arrive when `size` is 1, larger items are read whole. Errors are
    /// logged and end the read.
    pub fn read_items(&mut self, buf: &mut [u8], size: usize, nmemb: usize)
        -> usize
    {
        if size == 0 {
            return 0;
        }
        let nmemb = min(nmemb, buf.len() / size);
        if size == 1 {
            return self.read_logged(&mut buf[..nmemb]);
        }
        for item in 0..nmemb {
            let chunk = &mut buf[item*size..(item+1)*size];
            let mut done = 0;
            while done < size {
                match self.read_logged(&mut chunk[done..]) {
                    0 => return item,
                    n => done += n,
                }
            }
        }
        nmemb
    }
    fn read_logged(&mut self, buf: &mut [u8]) -> usize {
        match self.read_some(buf, true) {
            Ok(n) => n,
            Err(e) => {
                warn!("Error reading {}: {}", self.url, e);
                0
            }
        }
    }
    /// Reads whatever has arrived without waiting for the body
    ///
    /// Returns zero both at the end of the stream and when no data is
    /// ready yet. Requests are still written in blocking mode, and so is
    /// a new connection opened after an error or when the server can't
    /// take another request on the current one.
    pub fn try_read(&mut self, buf: &mut [u8]) -> Result<usize, Error> {
        self.read_some(buf, false)
    }
    /// Moves the read position
    ///
    /// Seeking at or past the end does no network requests, reads from
    /// there return end of file.
    pub fn seek(&mut self, from: SeekFrom) -> Result<u64, Error> {
        if !self.seekable {
            return Err(Error::NotSeekable);
        }
        let len = self.content_length.unwrap_or(0);
        let target = match from {
            SeekFrom::Start(off) => off,
            SeekFrom::Current(off) => offset(self.pos, off)?,
            SeekFrom::End(off) => offset(len, off)?,
        };
        if target >= len {
            self.current = None;
            self.pos = target;
            return Ok(target);
        }
        if let Some(idx) = self.current {
            if self.pool.at(idx).pos == target && self.pos == target {
                return Ok(target);
            }
        }
        self.reposition(target)?;
        Ok(target)
    }
    /// Makes some connection ready to read from `target`
    ///
    /// Read position is left intact on error, the next read reconnects
    /// there.
    fn reposition(&mut self, target: u64) -> Result<(), Error> {
        self.attach(target)?;
        self.pos = target;
        Ok(())
    }
    fn attach(&mut self, target: u64) -> Result<(), Error> {
        self.current = None;
        let now = Instant::now();
        for idx in self.pool.order() {
            if self.pool.get(idx).is_none() {
                // evicted while reusing an earlier connection
                continue;
            }
            let plan = {
                let conn = self.pool.at(idx);
                let pending = match conn.pending {
                    Pending::Requested { start, end } => Some((start, end)),
                    Pending::Idle => None,
                };
                let candidate = Candidate {
                    pos: conn.pos,
                    end: conn.end,
                    pending: pending,
                    available: conn.available(),
                    idle_ms: conn.idle_ms(now),
                    requests_left: conn.requests_left,
                    read_rate: conn.read_rate(),
                };
                judge(&candidate, target, self.connect_rate, self.pipeline)
            };
            let result = match plan {
                Plan::Skip => continue,
                Plan::Evict => {
                    debug!("Closing stale connection {}", idx);
                    self.evict(idx);
                    continue;
                }
                Plan::ReadAhead => self.read_ahead(idx, target),
                Plan::Pipeline => self.pipeline_to(idx, target),
            };
            match result {
                Ok(()) => {
                    if let Some(cur) = self.current {
                        self.pool.touch(cur);
                    }
                    return Ok(());
                }
                Err(e) => {
                    debug!("Can't reuse connection {} for {}: {}",
                        idx, target, e);
                    if let Some(cur) = self.current.take() {
                        self.abandon(cur);
                    }
                    self.abandon(idx);
                }
            }
        }
        let chunk = if self.pipeline { Some(PIPELINE_CHUNK) } else { None };
        match self.open_at(target, chunk) {
            Ok(_) => {}
            Err(ref e) if e.is_transient() => {
                debug!("Retrying connect for {}: {}", target, e);
                self.open_at(target, chunk)?;
            }
            Err(e) => return Err(e),
        }
        Ok(())
    }
    /// Skips data on the connection up to `target`
    fn read_ahead(&mut self, idx: usize, target: u64) -> Result<(), Error> {
        let mut scratch = [0u8; READAHEAD_QUANTUM];
        self.current = Some(idx);
        let mut pos = self.pool.at(idx).pos;
        trace!("Reading ahead {} bytes on {}", target - pos, idx);
        while pos < target {
            let want = min(target - pos, scratch.len() as u64) as usize;
            match self.read_body(&mut scratch[..want], true)? {
                0 => return Err(Error::ResetOnResponseBody),
                n => pos += n as u64,
            }
        }
        Ok(())
    }
    /// Requests `target` on the connection and skips the current response
    fn pipeline_to(&mut self, idx: usize, target: u64) -> Result<(), Error> {
        let mut scratch = [0u8; READAHEAD_QUANTUM];
        self.current = Some(idx);
        self.pool.at(idx).chunk = Some(PIPELINE_CHUNK);
        self.send_request(idx, target)?;
        {
            let conn = self.pool.at(idx);
            let left = conn.end.map_or(0, |end| end - conn.pos);
            trace!("Pipelining {} on {}, skipping {} bytes",
                target, idx, left);
            conn.drain(left, &mut scratch)?;
        }
        self.handle_response(idx)
    }
    /// Current read position
    pub fn tell(&self) -> u64 {
        self.pos
    }
    /// Length of the resource if known
    pub fn content_length(&self) -> Option<u64> {
        self.content_length
    }
    /// Server supports byte ranges
    pub fn is_seekable(&self) -> bool {
        self.seekable
    }
    /// Server supports persistent connections and pipelining
    pub fn is_pipelined(&self) -> bool {
        self.pipeline
    }
    /// Final url, after redirects
    pub fn url(&self) -> &str {
        &self.location
    }
    /// Closes all connections gracefully
    pub fn close(self) {}
}

impl Drop for HttpStream {
    fn drop(&mut self) {
        if !self.pool.is_empty() {
            debug!("Closing {} connections to {}",
                self.pool.len(), self.location);
        }
        for idx in self.pool.order() {
            self.evict(idx);
        }
    }
}

impl Read for HttpStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.read_some(buf, true).map_err(Into::into)
    }
}

impl Seek for HttpStream {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        HttpStream::seek(self, pos).map_err(Into::into)
    }
}
