//! Plain and TLS sockets behind a single blocking interface
use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream};

#[cfg(unix)] use libc;
use rustls::{ClientConnection, StreamOwned};


/// Outcome of a single read on the transport
#[derive(Debug)]
pub enum IoStatus {
    /// This many bytes were read (never zero)
    Ready(usize),
    /// Non-blocking read found nothing to read
    NotReady,
    /// Peer closed the connection
    Closed,
    /// Error, including expired wait in blocking mode
    Failed(io::Error),
}

pub enum Transport {
    Plain(TcpStream),
    Tls(Box<StreamOwned<ClientConnection, TcpStream>>),
}

impl Transport {
    pub fn socket(&self) -> &TcpStream {
        match *self {
            Transport::Plain(ref sock) => sock,
            Transport::Tls(ref tls) => &tls.sock,
        }
    }
    fn read_raw(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match *self {
            Transport::Plain(ref mut sock) => sock.read(buf),
            Transport::Tls(ref mut tls) => tls.read(buf),
        }
    }
    /// Reads at most `buf.len()` bytes
    ///
    /// Blocking reads wait for the socket timeout, non-blocking ones
    /// return `NotReady` when nothing has arrived yet.
    pub fn read_some(&mut self, buf: &mut [u8], blocking: bool) -> IoStatus {
        if !blocking {
            if let Err(e) = self.socket().set_nonblocking(true) {
                return IoStatus::Failed(e);
            }
        }
        let result = loop {
            match self.read_raw(buf) {
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {
                    continue;
                }
                result => break result,
            }
        };
        if !blocking {
            if let Err(e) = self.socket().set_nonblocking(false) {
                return IoStatus::Failed(e);
            }
        }
        match result {
            Ok(0) => IoStatus::Closed,
            Ok(n) => IoStatus::Ready(n),
            Err(ref e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                IoStatus::Closed
            }
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                if blocking {
                    // socket timeout expired
                    IoStatus::Failed(io::ErrorKind::TimedOut.into())
                } else {
                    IoStatus::NotReady
                }
            }
            Err(e) => IoStatus::Failed(e),
        }
    }
    /// Writes the whole buffer
    pub fn send(&mut self, data: &[u8]) -> io::Result<()> {
        self.write_all(data)?;
        self.flush()
    }
    /// Bytes that may be read without blocking
    ///
    /// For TLS this counts both decrypted data and raw bytes in the
    /// socket receive queue, so it is an estimate.
    pub fn available(&mut self) -> u64 {
        let queued = receive_queue(self.socket());
        let plain = match *self {
            Transport::Plain(_) => 0,
            Transport::Tls(ref mut tls) => {
                tls.conn.process_new_packets()
                    .map(|state| state.plaintext_bytes_to_read() as u64)
                    .unwrap_or(0)
            }
        };
        queued + plain
    }
    /// Returns true if a read would not block
    ///
    /// End of stream and socket errors count as readable.
    pub fn readable_now(&mut self) -> bool {
        self.available() > 0 || receive_ready(self.socket())
    }
    /// Returns true if a request can be written without blocking
    pub fn writable_now(&self) -> bool {
        send_room(self.socket())
    }
    /// Closes the connection
    ///
    /// Graceful close of a TLS connection sends `close_notify` first.
    pub fn close(self, graceful: bool) {
        match self {
            Transport::Plain(sock) => {
                if !graceful {
                    sock.shutdown(Shutdown::Both).ok();
                }
            }
            Transport::Tls(mut tls) => {
                if graceful {
                    tls.conn.send_close_notify();
                    let stream = &mut *tls;
                    stream.conn.write_tls(&mut stream.sock).ok();
                } else {
                    tls.sock.shutdown(Shutdown::Both).ok();
                }
            }
        }
    }
}

impl Read for Transport {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.read_raw(buf)
    }
}

impl Write for Transport {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match *self {
            Transport::Plain(ref mut sock) => sock.write(buf),
            Transport::Tls(ref mut tls) => tls.write(buf),
        }
    }
    fn flush(&mut self) -> io::Result<()> {
        match *self {
            Transport::Plain(ref mut sock) => sock.flush(),
            Transport::Tls(ref mut tls) => tls.flush(),
        }
    }
}

#[cfg(unix)]
fn receive_queue(sock: &TcpStream) -> u64 {
    use std::os::unix::io::AsRawFd;
    let mut value: libc::c_int = 0;
    let rc = unsafe {
        libc::ioctl(sock.as_raw_fd(), libc::FIONREAD,
                    &mut value as *mut libc::c_int)
    };
    if rc < 0 || value < 0 { 0 } else { value as u64 }
}

#[cfg(not(unix))]
fn receive_queue(_sock: &TcpStream) -> u64 {
    0
}

#[cfg(unix)]
fn receive_ready(sock: &TcpStream) -> bool {
    use std::os::unix::io::AsRawFd;
    let mut pfd = libc::pollfd {
        fd: sock.as_raw_fd(),
        events: libc::POLLIN,
        revents: 0,
    };
    let rc = unsafe { libc::poll(&mut pfd, 1, 0) };
    rc > 0 && pfd.revents != 0
}

#[cfg(not(unix))]
fn receive_ready(_sock: &TcpStream) -> bool {
    true
}

#[cfg(unix)]
fn send_room(sock: &TcpStream) -> bool {
    use std::os::unix::io::AsRawFd;
    let mut pfd = libc::pollfd {
        fd: sock.as_raw_fd(),
        events: libc::POLLOUT,
        revents: 0,
    };
    let rc = unsafe { libc::poll(&mut pfd, 1, 0) };
    rc > 0 && pfd.revents & libc::POLLOUT != 0
}

#[cfg(not(unix))]
fn send_room(_sock: &TcpStream) -> bool {
    true
}
