//! Name resolution and racing connects over address families
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};

use client::Error;


/// Resolves host name, returns addresses in resolver order
pub fn resolve(host: &str, port: u16) -> Result<Vec<SocketAddr>, Error> {
    let addrs: Vec<_> = (host, port).to_socket_addrs()?.collect();
    if addrs.is_empty() {
        return Err(Error::NoAddress);
    }
    Ok(addrs)
}

/// Splits addresses by family, IPv6 goes first
fn families(addrs: &[SocketAddr]) -> Vec<Vec<SocketAddr>> {
    let (v6, v4): (Vec<_>, Vec<_>) = addrs.iter().cloned()
        .partition(|a| a.is_ipv6());
    let mut result = Vec::with_capacity(2);
    for family in vec![v6, v4] {
        if !family.is_empty() {
            // reversed so that `pop()` yields addresses in order
            result.push(family.into_iter().rev().collect());
        }
    }
    result
}

fn finish(sock: TcpStream, timeout: Duration) -> Result<TcpStream, Error> {
    sock.set_nonblocking(false)?;
    sock.set_nodelay(true)?;
    sock.set_read_timeout(Some(timeout))?;
    sock.set_write_timeout(Some(timeout))?;
    Ok(sock)
}

#[cfg(unix)]
mod race {
    use std::io;
    use std::net::{SocketAddr, TcpStream};
    use std::os::unix::io::AsRawFd;
    use std::time::Instant;

    use libc;
    use socket2::{Domain, Protocol, Socket, Type};

    use client::Error;

    pub struct Attempt {
        pub socket: Socket,
        pub addr: SocketAddr,
        pub family: usize,
    }

    /// Starts a non-blocking connect to the next address of a family
    pub fn start(queue: &mut Vec<SocketAddr>, family: usize)
        -> Option<Attempt>
    {
        while let Some(addr) = queue.pop() {
            match begin(addr) {
                Ok(socket) => {
                    return Some(Attempt {
                        socket: socket,
                        addr: addr,
                        family: family,
                    });
                }
                Err(e) => debug!("Connect to {} failed: {}", addr, e),
            }
        }
        None
    }

    fn begin(addr: SocketAddr) -> io::Result<Socket> {
        let socket = Socket::new(Domain::for_address(addr), Type::STREAM,
                                 Some(Protocol::TCP))?;
        socket.set_nonblocking(true)?;
        match socket.connect(&addr.into()) {
            Ok(()) => Ok(socket),
            Err(ref e) if e.raw_os_error() == Some(libc::EINPROGRESS) => {
                Ok(socket)
            }
            Err(e) => Err(e),
        }
    }

    /// Waits until some of the attempts are ready or the deadline passes
    ///
    /// Returns indexes of attempts that have completed (either way).
    pub fn wait(attempts: &[Attempt], deadline: Instant)
        -> Result<Vec<usize>, Error>
    {
        let mut fds: Vec<_> = attempts.iter().map(|a| libc::pollfd {
            fd: a.socket.as_raw_fd(),
            events: libc::POLLOUT,
            revents: 0,
        }).collect();
        loop {
            let now = Instant::now();
            if now >= deadline {
                return Err(Error::ConnectTimeout);
            }
            let left = deadline - now;
            let ms = (left.as_millis().max(1))
                .min(libc::c_int::max_value() as u128) as libc::c_int;
            let rc = unsafe {
                libc::poll(fds.as_mut_ptr(), fds.len() as libc::nfds_t, ms)
            };
            if rc < 0 {
                let err = io::Error::last_os_error();
                if err.kind() == io::ErrorKind::Interrupted {
                    continue;
                }
                return Err(err.into());
            }
            if rc == 0 {
                continue;
            }
            return Ok(fds.iter().enumerate()
                .filter(|&(_, f)| f.revents != 0)
                .map(|(i, _)| i)
                .collect());
        }
    }

    /// Checks the outcome of a completed attempt
    pub fn outcome(attempt: Attempt) -> Result<TcpStream, io::Error> {
        if let Some(err) = attempt.socket.take_error()? {
            return Err(err);
        }
        Ok(attempt.socket.into())
    }
}

/// Connects to the first address that answers
///
/// One connect per address family is in flight at any time, the family
/// that fails moves on to its next address. The first established
/// connection wins and the rest are dropped.
#[cfg(unix)]
pub fn connect(addrs: &[SocketAddr], timeout: Duration)
    -> Result<(TcpStream, SocketAddr), Error>
{
    let deadline = Instant::now() + timeout;
    let mut queues = families(addrs);
    let mut attempts = Vec::with_capacity(queues.len());
    for (family, queue) in queues.iter_mut().enumerate() {
        attempts.extend(race::start(queue, family));
    }
    while !attempts.is_empty() {
        let mut ready = race::wait(&attempts, deadline)?;
        // removing from the end keeps smaller indexes valid
        ready.sort_by(|a, b| b.cmp(a));
        let mut retry = Vec::new();
        for idx in ready {
            let attempt = attempts.swap_remove(idx);
            let (addr, family) = (attempt.addr, attempt.family);
            match race::outcome(attempt) {
                Ok(sock) => {
                    debug!("Connected to {}", addr);
                    return Ok((finish(sock, timeout)?, addr));
                }
                Err(e) => {
                    debug!("Connect to {} failed: {}", addr, e);
                    retry.push(family);
                }
            }
        }
        for family in retry {
            attempts.extend(race::start(&mut queues[family], family));
        }
    }
    Err(Error::ConnectFailed)
}

#[cfg(not(unix))]
pub fn connect(addrs: &[SocketAddr], timeout: Duration)
    -> Result<(TcpStream, SocketAddr), Error>
{
    let deadline = Instant::now() + timeout;
    for mut queue in families(addrs) {
        while let Some(addr) = queue.pop() {
            let now = Instant::now();
            if now >= deadline {
                return Err(Error::ConnectTimeout);
            }
            match TcpStream::connect_timeout(&addr, deadline - now) {
                Ok(sock) => return Ok((finish(sock, timeout)?, addr)),
                Err(e) => debug!("Connect to {} failed: {}", addr, e),
            }
        }
    }
    Err(Error::ConnectFailed)
}


#[cfg(test)]
mod test {
    use std::net::{SocketAddr, TcpListener};
    use std::time::Duration;
    use client::Error;
    use super::{connect, resolve, families};

    #[test]
    fn ipv6_first() {
        let addrs: Vec<SocketAddr> = vec![
            "127.0.0.1:80".parse().unwrap(),
            "[::1]:80".parse().unwrap(),
            "10.0.0.1:80".parse().unwrap(),
        ];
        let mut fams = families(&addrs);
        assert_eq!(fams.len(), 2);
        assert_eq!(fams[0].pop(), Some(addrs[1]));
        assert_eq!(fams[1].pop(), Some(addrs[0]));
        assert_eq!(fams[1].pop(), Some(addrs[2]));
    }

    #[test]
    fn local() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let addrs = resolve("127.0.0.1", addr.port()).unwrap();
        let (sock, winner) = connect(&addrs, Duration::from_secs(5)).unwrap();
        assert_eq!(winner, addr);
        assert!(sock.nodelay().unwrap());
        assert_eq!(sock.read_timeout().unwrap(), Some(Duration::from_secs(5)));
    }

    #[test]
    fn refused() {
        let addr = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap()
        };
        match connect(&[addr], Duration::from_secs(5)) {
            Err(Error::ConnectFailed) => {}
            other => panic!("unexpected {:?}", other.map(|(_, a)| a)),
        }
    }

    #[test]
    fn nothing_to_try() {
        assert!(matches!(connect(&[], Duration::from_secs(1)),
                         Err(Error::ConnectFailed)));
    }
}
