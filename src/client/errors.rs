use std::io;

use httparse::Error as HttpError;
use rustls;


quick_error! {
    #[derive(Debug)]
    /// Error opening, reading or seeking a stream
    pub enum Error {
        /// Scheme of the url is not supported
        UnsupportedScheme {
            description("scheme of this url is not supported")
        }
        /// Url can't be parsed
        BadUrl(reason: &'static str) {
            description("malformed url")
            display("malformed url: {}", reason)
        }
        /// I/O (basically networking) error
        Io(err: io::Error) {
            description("IO error")
            display("IO error: {}", err)
            from()
        }
        /// TLS handshake or record layer error
        Tls(err: rustls::Error) {
            description("TLS error")
            display("TLS error: {}", err)
            from()
        }
        /// Host name can't be used as TLS server name
        InvalidServerName {
            description("host name is not valid for TLS")
        }
        /// Name resolution returned nothing usable
        NoAddress {
            description("host name resolved to no addresses")
        }
        /// Every address of every family failed to connect
        ConnectFailed {
            description("can't connect to any of the addresses")
        }
        /// Bounded wait for connection has expired
        ConnectTimeout {
            description("timed out while connecting")
        }
        /// Response doesn't start with `HTTP`
        NotHttp {
            description("response is not HTTP")
        }
        /// Response head is larger than we are willing to buffer
        HeadersTooLarge {
            description("response headers are too large")
        }
        /// Status line can't be parsed
        BadStatusLine {
            description("bad status line")
        }
        /// Bad response headers received
        Header(err: HttpError) {
            description("bad headers")
            display("bad headers: {}", err)
            from()
        }
        /// Bad `Content-Length` header
        BadContentLength {
            description("bad content length")
        }
        /// Duplicate `Content-Length` header
        DuplicateContentLength {
            description("duplicate content length")
        }
        /// Bad `Content-Range` header
        BadContentRange {
            description("bad content range")
        }
        /// Duplicate `Content-Range` header
        DuplicateContentRange {
            description("duplicate content range")
        }
        /// Partial content without `Content-Range` header
        MissingContentRange {
            description("partial content without content range")
        }
        /// `Content-Length` disagrees with `Content-Range`
        LengthMismatch {
            description("content length doesn't match content range")
        }
        /// Server returned a range different from the one requested
        RangeMismatch {
            description("server returned a range different from requested")
        }
        /// Status code we can't handle here
        UnexpectedStatus(code: u16) {
            description("unexpected status code")
            display("unexpected status code: {}", code)
        }
        /// Server timed out waiting for our request (408)
        RequestTimeout {
            description("server timed out waiting for request")
        }
        /// Redirect status that is not followed
        UnsupportedRedirect(code: u16) {
            description("unsupported redirect")
            display("unsupported redirect status: {}", code)
        }
        /// Redirect without a `Location` header
        MissingLocation {
            description("redirect without location")
        }
        /// Redirect limit exceeded
        TooManyRedirects {
            description("too many redirects")
        }
        /// Proxy didn't accept `CONNECT` request
        ProxyRefused(code: u16) {
            description("proxy refused to open a tunnel")
            display("proxy refused to open a tunnel: {}", code)
        }
        /// Connection reset by peer when reading response headers
        ResetOnResponseHeaders {
            description("connection closed prematurely while reading headers")
        }
        /// Connection reset by peer when reading response body
        ResetOnResponseBody {
            description("connection closed prematurely while reading body")
        }
        /// Connection closed before any byte of response arrived
        ///
        /// Usually means server dropped an idle keep-alive connection.
        Closed {
            description("connection closed before response")
        }
        /// Server doesn't support byte ranges
        NotSeekable {
            description("stream is not seekable")
        }
        /// Seek to a negative or overflowing offset
        InvalidSeek {
            description("invalid seek offset")
        }
    }
}

impl Error {
    /// Returns true if the request may succeed on a fresh connection
    ///
    /// Timeouts are not included: a bounded wait that expired fails the
    /// current call.
    pub fn is_transient(&self) -> bool {
        use self::Error::*;
        match *self {
            Closed | RequestTimeout => true,
            ResetOnResponseHeaders | ResetOnResponseBody => true,
            Io(ref e) => matches!(e.kind(),
                io::ErrorKind::ConnectionReset |
                io::ErrorKind::ConnectionAborted |
                io::ErrorKind::BrokenPipe |
                io::ErrorKind::UnexpectedEof),
            _ => false,
        }
    }
}

impl From<Error> for io::Error {
    fn from(err: Error) -> io::Error {
        match err {
            Error::Io(e) => e,
            Error::InvalidSeek => {
                io::Error::new(io::ErrorKind::InvalidInput, err)
            }
            err => io::Error::new(io::ErrorKind::Other, err),
        }
    }
}

#[cfg(test)]
mod test {
    use std::io;
    use super::Error;

    #[test]
    fn transient() {
        assert!(Error::Closed.is_transient());
        assert!(Error::RequestTimeout.is_transient());
        assert!(Error::ResetOnResponseBody.is_transient());
        assert!(Error::from(io::Error::new(
            io::ErrorKind::ConnectionReset, "reset")).is_transient());
        assert!(!Error::from(io::Error::new(
            io::ErrorKind::TimedOut, "timeout")).is_transient());
        assert!(!Error::RangeMismatch.is_transient());
        assert!(!Error::TooManyRedirects.is_transient());
        assert!(!Error::BadUrl("x").is_transient());
    }

    #[test]
    fn io_conversion() {
        let e: io::Error = Error::InvalidSeek.into();
        assert_eq!(e.kind(), io::ErrorKind::InvalidInput);
        let e: io::Error = Error::UnexpectedStatus(500).into();
        assert_eq!(e.kind(), io::ErrorKind::Other);
        assert_eq!(e.to_string(), "unexpected status code: 500");
    }
}
