use std::io::{self, Read};
use std::str::from_utf8;

use netbuf::Buf;

use headers;
use version::Version;
use client::Error;
use client::head::Head;


/// Value of `Content-Range` header
///
/// `range` is inclusive and is `None` for `bytes */len`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentRange {
    pub range: Option<(u64, u64)>,
    pub length: Option<u64>,
}

/// What the first response tells about the resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Content {
        content_length: Option<u64>,
        seekable: bool,
        pipeline: bool,
    },
    Redirect(String),
}

/// Validated response to a range request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeReply {
    /// End of the body, exclusive
    pub end: u64,
    /// Length of the whole resource
    pub length: u64,
    /// Server asked to close connection after this response
    pub close: bool,
}

#[derive(Debug, Default)]
struct Fields {
    content_length: Option<u64>,
    content_range: Option<ContentRange>,
    close: bool,
    pipelining_broken: bool,
}

fn is_disconnect(err: &io::Error) -> bool {
    matches!(err.kind(),
        io::ErrorKind::ConnectionReset |
        io::ErrorKind::ConnectionAborted |
        io::ErrorKind::UnexpectedEof)
}

fn find_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|x| x == b"\r\n\r\n").map(|x| x + 4)
}

/// Reads response head into the buffer, returns its length
///
/// Bytes after the head (start of the body or the next response) are left
/// in the buffer.
pub fn read_head<R: Read>(io: &mut R, buf: &mut Buf, limit: usize)
    -> Result<usize, Error>
{
    loop {
        {
            let data = &buf[..];
            let prefix = &data[..data.len().min(4)];
            if !prefix.eq_ignore_ascii_case(&b"HTTP"[..prefix.len()]) {
                return Err(Error::NotHttp);
            }
            match find_end(&data[..data.len().min(limit)]) {
                Some(end) => return Ok(end),
                None if data.len() >= limit => {
                    return Err(Error::HeadersTooLarge);
                }
                None => {}
            }
        }
        let before = buf.len();
        match buf.read_from(io) {
            Ok(0) if before == 0 => return Err(Error::Closed),
            Ok(0) => return Err(Error::ResetOnResponseHeaders),
            Ok(_) => {}
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(ref e) if before == 0 && is_disconnect(e) => {
                return Err(Error::Closed);
            }
            Err(e) => return Err(e.into()),
        }
    }
}

fn number(value: &[u8]) -> Option<u64> {
    if value.is_empty() || !value.iter().all(|x| x.is_ascii_digit()) {
        return None;
    }
    from_utf8(value).ok().and_then(|x| x.parse().ok())
}

pub fn parse_content_length(value: &[u8]) -> Result<u64, Error> {
    number(value).ok_or(Error::BadContentLength)
}

/// Parses `bytes first-last/length`, either part may be `*`
pub fn parse_content_range(value: &[u8]) -> Result<ContentRange, Error> {
    use client::Error::BadContentRange;
    if value.len() < 5 || !value[..5].eq_ignore_ascii_case(b"bytes") {
        return Err(BadContentRange);
    }
    let rest = &value[5..];
    let spaces = rest.iter().take_while(|&&x| x == b' ' || x == b'\t')
        .count();
    if spaces == 0 {
        return Err(BadContentRange);
    }
    let rest = &rest[spaces..];
    let slash = rest.iter().position(|&x| x == b'/')
        .ok_or(BadContentRange)?;
    let (range, length) = (&rest[..slash], &rest[slash+1..]);
    let range = if range == b"*" {
        None
    } else {
        let dash = range.iter().position(|&x| x == b'-')
            .ok_or(BadContentRange)?;
        let first = number(&range[..dash]).ok_or(BadContentRange)?;
        let last = number(&range[dash+1..]).ok_or(BadContentRange)?;
        if last < first {
            return Err(BadContentRange);
        }
        Some((first, last))
    };
    let length = if length == b"*" {
        None
    } else {
        Some(number(length).ok_or(BadContentRange)?)
    };
    match (range, length) {
        (Some((_, last)), Some(len)) if last >= len => Err(BadContentRange),
        (None, None) => Err(BadContentRange),
        _ => Ok(ContentRange { range: range, length: length }),
    }
}

fn scan_headers(head: &Head) -> Result<Fields, Error> {
    let mut fields = Fields::default();
    for (name, value) in head.headers() {
        if headers::is_content_length(name) {
            if fields.content_length.is_some() {
                return Err(Error::DuplicateContentLength);
            }
            fields.content_length = Some(parse_content_length(value)?);
        } else if headers::is_content_range(name) {
            if fields.content_range.is_some() {
                return Err(Error::DuplicateContentRange);
            }
            fields.content_range = Some(parse_content_range(value)?);
        } else if headers::is_connection(name) {
            if headers::has_close_token(value) {
                fields.close = true;
            }
        } else if headers::is_server(name) {
            if headers::pipelining_broken(value) {
                fields.pipelining_broken = true;
            }
        }
    }
    Ok(fields)
}

/// Classifies response to the initial `Range: bytes=0-` request
pub fn initial_reply(head: &Head) -> Result<Reply, Error> {
    let code = head.code();
    match code {
        200..=299 => {}
        300 | 301 | 302 | 307 => {
            return head.find(headers::is_location)
                .filter(|x| !x.is_empty())
                .map(|x| Reply::Redirect(x.to_string()))
                .ok_or(Error::MissingLocation);
        }
        303..=399 => return Err(Error::UnsupportedRedirect(code)),
        _ => return Err(Error::UnexpectedStatus(code)),
    }
    let fields = scan_headers(head)?;
    let mut content_length = fields.content_length;
    let mut seekable = false;
    match code {
        204 => {
            if content_length.unwrap_or(0) != 0 {
                return Err(Error::BadContentLength);
            }
            content_length = Some(0);
        }
        206 => {
            let crange = fields.content_range
                .ok_or(Error::MissingContentRange)?;
            let (first, last) = crange.range.ok_or(Error::BadContentRange)?;
            if first != 0 {
                return Err(Error::RangeMismatch);
            }
            let end = last.checked_add(1).ok_or(Error::BadContentRange)?;
            let length = match crange.length {
                Some(len) if len != end => return Err(Error::RangeMismatch),
                Some(len) => len,
                None => end,
            };
            if content_length.map_or(false, |x| x != length) {
                return Err(Error::LengthMismatch);
            }
            content_length = Some(length);
            seekable = true;
        }
        _ => {
            let total = fields.content_range.and_then(|x| x.length);
            if let (Some(len), Some(total)) = (content_length, total) {
                if len != total {
                    return Err(Error::LengthMismatch);
                }
            }
        }
    }
    Ok(Reply::Content {
        content_length: content_length,
        seekable: seekable,
        pipeline: head.version() == Version::Http11
            && !fields.close && !fields.pipelining_broken,
    })
}

/// Validates response to a range request sent on an open stream
///
/// `end` is exclusive, `None` means the rest of the resource was requested.
pub fn range_reply(head: &Head, start: u64, end: Option<u64>,
    known_length: Option<u64>)
    -> Result<RangeReply, Error>
{
    match head.code() {
        206 => {}
        408 => return Err(Error::RequestTimeout),
        code => return Err(Error::UnexpectedStatus(code)),
    }
    let fields = scan_headers(head)?;
    let crange = fields.content_range.ok_or(Error::MissingContentRange)?;
    let (first, last) = crange.range.ok_or(Error::BadContentRange)?;
    if first != start {
        return Err(Error::RangeMismatch);
    }
    let got_end = last.checked_add(1).ok_or(Error::BadContentRange)?;
    let length = match end {
        Some(end) => {
            if got_end != end {
                return Err(Error::RangeMismatch);
            }
            match (crange.length, known_length) {
                (Some(len), Some(known)) if len != known => {
                    return Err(Error::LengthMismatch);
                }
                (Some(len), _) => len,
                (None, Some(known)) => known.max(got_end),
                (None, None) => got_end,
            }
        }
        None => {
            let expected = crange.length.or(known_length);
            if expected.map_or(false, |x| x != got_end) {
                return Err(Error::RangeMismatch);
            }
            got_end
        }
    };
    if fields.content_length.map_or(false, |x| x != got_end - first) {
        return Err(Error::LengthMismatch);
    }
    Ok(RangeReply {
        end: got_end,
        length: length,
        close: fields.close,
    })
}
