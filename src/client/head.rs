use std::str::from_utf8;

use httparse;

use version::Version;
use client::Error;


/// Number of headers to allocate on a stack
const MIN_HEADERS: usize = 16;
/// A hard limit on the number of headers
const MAX_HEADERS: usize = 256;


/// Response status line and headers
///
/// Header names keep their original case, values are trimmed and folded
/// continuation lines are merged into a single line.
#[derive(Debug)]
pub struct Head {
    version: Version,
    code: u16,
    reason: String,
    headers: Vec<(String, Vec<u8>)>,
}

fn digits(s: &[u8]) -> usize {
    s.iter().position(|x| !x.is_ascii_digit()).unwrap_or(s.len())
}

fn trim(mut val: &[u8]) -> &[u8] {
    while let Some((first, rest)) = val.split_first() {
        if !matches!(*first, b' ' | b'\t' | b'\r' | b'\n') {
            break;
        }
        val = rest;
    }
    while let Some((last, rest)) = val.split_last() {
        if !matches!(*last, b' ' | b'\t' | b'\r' | b'\n') {
            break;
        }
        val = rest;
    }
    val
}

/// Parses `HTTP/1.x NNN reason\r\n`, returns length including CRLF
fn status_line(buf: &[u8]) -> Result<(Version, u16, String, usize), Error> {
    use client::Error::BadStatusLine;
    let line_end = buf.windows(2).position(|x| x == b"\r\n")
        .ok_or(BadStatusLine)?;
    let line = &buf[..line_end];
    if line.len() < 5 || !line[..5].eq_ignore_ascii_case(b"HTTP/") {
        return Err(BadStatusLine);
    }
    let rest = &line[5..];
    let n = digits(rest);
    let major = &rest[..n];
    let zeros = major.iter().take_while(|&&x| x == b'0').count();
    if &major[zeros..] != b"1" {
        return Err(BadStatusLine);
    }
    let rest = &rest[n..];
    if rest.first() != Some(&b'.') {
        return Err(BadStatusLine);
    }
    let rest = &rest[1..];
    let n = digits(rest);
    if n == 0 {
        return Err(BadStatusLine);
    }
    let version = Version::from_minor(&rest[..n]);
    let rest = &rest[n..];
    if rest.first() != Some(&b' ') {
        return Err(BadStatusLine);
    }
    let rest = &rest[1..];
    let n = digits(rest);
    let mut code = &rest[..n];
    while code.len() > 3 && code[0] == b'0' {
        code = &code[1..];
    }
    if code.len() != 3 {
        return Err(BadStatusLine);
    }
    let code = code.iter().fold(0u16, |acc, &x| acc*10 + (x - b'0') as u16);
    let rest = &rest[n..];
    // Some servers omit the space when reason is empty
    let reason = match rest.split_first() {
        None => &rest[..],
        Some((&b' ', reason)) => reason,
        Some(_) => return Err(BadStatusLine),
    };
    if reason.iter().any(|&x| x < 0x20 && x != b'\t' || x == 0x7f) {
        return Err(BadStatusLine);
    }
    let reason = String::from_utf8_lossy(reason).into_owned();
    Ok((version, code, reason, line_end + 2))
}

/// Replaces line breaks of folded header lines by spaces
fn unfold(block: &[u8]) -> Vec<u8> {
    let mut result = block.to_vec();
    for idx in 0..result.len().saturating_sub(2) {
        if &result[idx..idx+2] == b"\r\n" &&
            matches!(result[idx+2], b' ' | b'\t')
        {
            result[idx] = b' ';
            result[idx+1] = b' ';
        }
    }
    result
}

impl Head {
    /// Parses a complete response head (up to and including an empty line)
    pub fn parse(raw: &[u8]) -> Result<Head, Error> {
        let (version, code, reason, line_len) = status_line(raw)?;
        let block = unfold(&raw[line_len..]);
        let mut vec;
        let mut headers = [httparse::EMPTY_HEADER; MIN_HEADERS];
        let parsed = {
            let mut result = httparse::parse_headers(&block, &mut headers);
            if matches!(result, Err(httparse::Error::TooManyHeaders)) {
                vec = vec![httparse::EMPTY_HEADER; MAX_HEADERS];
                result = httparse::parse_headers(&block, &mut vec);
            }
            match result? {
                httparse::Status::Complete((_, headers)) => {
                    headers.iter()
                    .map(|h| (h.name.to_string(), trim(h.value).to_vec()))
                    .collect()
                }
                httparse::Status::Partial => {
                    return Err(httparse::Error::NewLine.into());
                }
            }
        };
        Ok(Head {
            version: version,
            code: code,
            reason: reason,
            headers: parsed,
        })
    }
    pub fn version(&self) -> Version {
        self.version
    }
    pub fn code(&self) -> u16 {
        self.code
    }
    pub fn reason(&self) -> &str {
        &self.reason
    }
    /// Iterator over all headers in the order received
    pub fn headers(&self) -> impl Iterator<Item=(&str, &[u8])> {
        self.headers.iter().map(|&(ref n, ref v)| (&n[..], &v[..]))
    }
    /// First header matching the predicate, converted to string
    pub fn find<F: Fn(&str) -> bool>(&self, name: F) -> Option<&str> {
        self.headers.iter()
            .find(|&&(ref n, _)| name(&n[..]))
            .and_then(|&(_, ref v)| from_utf8(&v[..]).ok())
    }
}
