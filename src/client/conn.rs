use std::cmp::min;
use std::time::Instant;

use netbuf::Buf;

use client::Error;
use client::config::{MAX_HEAD, MAX_REQUESTS, READ_RATE_SHIFT};
use client::head::Head;
use client::parser::read_head;
use client::transport::{Transport, IoStatus};


/// Request sent on the connection whose response is not read yet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pending {
    Idle,
    /// Range `start..end`, `None` end is the rest of the resource
    Requested { start: u64, end: Option<u64> },
}

/// A single socket with its place in the resource
pub struct Connection {
    transport: Transport,
    /// Data read past the response head
    buf: Buf,
    /// Offset of the next body byte
    pub pos: u64,
    /// End of the current response body, `None` reads until close
    pub end: Option<u64>,
    pub pending: Pending,
    pub requests_left: u32,
    /// Size of the next request, `None` asks for the rest
    pub chunk: Option<u64>,
    /// Smoothed throughput, bytes per second
    read_rate: i64,
    read_time: Instant,
    read_bytes: u64,
    last_used: Instant,
}

impl Connection {
    pub fn new(transport: Transport) -> Connection {
        let now = Instant::now();
        Connection {
            transport: transport,
            buf: Buf::new(),
            pos: 0,
            end: None,
            pending: Pending::Idle,
            requests_left: MAX_REQUESTS,
            chunk: None,
            read_rate: 0,
            read_time: now,
            read_bytes: 0,
            last_used: now,
        }
    }
    pub fn send(&mut self, data: &[u8]) -> Result<(), Error> {
        self.transport.send(data)?;
        self.requests_left = self.requests_left.saturating_sub(1);
        self.last_used = Instant::now();
        Ok(())
    }
    /// Request fits into the socket buffer right now
    pub fn can_send_now(&self) -> bool {
        self.transport.writable_now()
    }
    /// Reads and parses the next response head
    pub fn read_head(&mut self) -> Result<Head, Error> {
        let len = read_head(&mut self.transport, &mut self.buf, MAX_HEAD)?;
        let head = Head::parse(&self.buf[..len]);
        self.buf.consume(len);
        self.last_used = Instant::now();
        self.read_time = self.last_used;
        self.read_bytes = 0;
        head
    }
    /// Reads body bytes, buffered ones first
    ///
    /// Caller is responsible for not reading past the response end.
    pub fn read(&mut self, buf: &mut [u8], blocking: bool) -> IoStatus {
        let result = if self.buf.len() > 0 {
            let n = min(buf.len(), self.buf.len());
            buf[..n].copy_from_slice(&self.buf[..n]);
            self.buf.consume(n);
            IoStatus::Ready(n)
        } else {
            if blocking && self.transport.available() == 0 {
                self.update_read_rate(Instant::now());
            }
            self.transport.read_some(buf, blocking)
        };
        if let IoStatus::Ready(n) = result {
            self.pos += n as u64;
            self.read_bytes += n as u64;
            self.last_used = Instant::now();
        }
        result
    }
    /// Discards `bytes` of the body
    pub fn drain(&mut self, mut bytes: u64, scratch: &mut [u8])
        -> Result<(), Error>
    {
        while bytes > 0 {
            let want = min(bytes, scratch.len() as u64) as usize;
            match self.read(&mut scratch[..want], true) {
                IoStatus::Ready(n) => bytes -= n as u64,
                IoStatus::NotReady => {}
                IoStatus::Closed => return Err(Error::ResetOnResponseBody),
                IoStatus::Failed(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
    /// Next read returns without waiting
    pub fn readable_now(&mut self) -> bool {
        self.buf.len() > 0 || self.transport.readable_now()
    }
    /// Bytes readable without waiting
    pub fn available(&mut self) -> u64 {
        self.buf.len() as u64 + self.transport.available()
    }
    pub fn idle_ms(&self, now: Instant) -> u64 {
        now.duration_since(self.last_used).as_millis() as u64
    }
    pub fn read_rate(&self) -> i64 {
        self.read_rate
    }
    /// Folds bytes read since the last sample into the rate estimate
    ///
    /// Called right before blocking, so the sample covers the time data
    /// was flowing without waits on our side.
    pub fn update_read_rate(&mut self, now: Instant) {
        if self.read_bytes > 0 {
            let ms = now.duration_since(self.read_time).as_millis() as i64;
            let sample = self.read_bytes as i64 * 1000 / ms.max(1);
            self.read_rate += (sample - self.read_rate
                + (1 << (READ_RATE_SHIFT - 1))) >> READ_RATE_SHIFT;
        }
        self.read_time = now;
        self.read_bytes = 0;
    }
    pub fn close(self, graceful: bool) {
        self.transport.close(graceful)
    }
}
