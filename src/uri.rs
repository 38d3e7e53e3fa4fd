//! Parser for `http`, `https` and `file` urls
//!
//! Only the subset needed to open a stream is supported: no relative
//! references and no scheme other than the three above.
use std::fmt;

use percent_encoding::percent_decode_str;
use url::Url;

use client::Error;


/// Url scheme supported by the stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Http,
    Https,
}

/// Parsed `http` or `https` url
///
/// User, password and host are unescaped. The path is kept escaped (it's
/// sent on the request line as is), it always starts with a slash and
/// includes the query string. The fragment is dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedUrl {
    scheme: Scheme,
    user: Option<String>,
    pass: Option<String>,
    host: String,
    port: u16,
    path: String,
}

fn is_scheme(c: u8) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, b'+' | b'-' | b'.')
}

fn is_unreserved(c: u8) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, b'-' | b'.' | b'_' | b'~')
}

fn is_sub_delim(c: u8) -> bool {
    matches!(c, b'!' | b'$' | b'&' | b'\'' | b'(' | b')'
              | b'*' | b'+' | b',' | b';' | b'=')
}

fn is_pchar_base(c: u8) -> bool {
    is_unreserved(c) || is_sub_delim(c) || c == b'%'
}

// pchar without '@', used for userinfo and IP literals
fn is_pchar_no_at(c: u8) -> bool {
    is_pchar_base(c) || c == b':'
}

fn is_path(c: u8) -> bool {
    is_pchar_no_at(c) || c == b'@' || c == b'/'
}

fn is_query(c: u8) -> bool {
    is_path(c) || c == b'?'
}

fn span<F: Fn(u8) -> bool>(s: &[u8], f: F) -> usize {
    s.iter().position(|&c| !f(c)).unwrap_or(s.len())
}

/// Checks every escape before anything is unescaped
///
/// Each `%` must be followed by two hex digits and `%00` is not allowed.
fn validate_escapes(s: &[u8]) -> Result<(), Error> {
    let mut iter = s.iter().enumerate();
    while let Some((idx, &ch)) = iter.next() {
        if ch != b'%' {
            continue;
        }
        match (s.get(idx+1), s.get(idx+2)) {
            (Some(&b'0'), Some(&b'0')) => {
                return Err(Error::BadUrl("escaped NUL character"));
            }
            (Some(a), Some(b))
                if a.is_ascii_hexdigit() && b.is_ascii_hexdigit()
            => {
                iter.next();
                iter.next();
            }
            _ => return Err(Error::BadUrl("invalid percent escape")),
        }
    }
    Ok(())
}

/// Invalid utf-8 sequences become replacement characters
fn unescape(s: &str) -> String {
    percent_decode_str(s).decode_utf8_lossy().into_owned()
}

fn split_scheme(src: &str) -> Result<(&str, &str), Error> {
    let end = span(src.as_bytes(), is_scheme);
    if end == 0 || src.as_bytes().get(end) != Some(&b':') {
        return Err(Error::BadUrl("no scheme"));
    }
    Ok((&src[..end], &src[end+1..]))
}

impl Scheme {
    /// Port used when url has none
    pub fn default_port(&self) -> u16 {
        match *self {
            Scheme::Http => 80,
            Scheme::Https => 443,
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Scheme::Http => f.write_str("http"),
            Scheme::Https => f.write_str("https"),
        }
    }
}

impl ParsedUrl {
    /// Parse an absolute `http` or `https` url
    pub fn parse(src: &str) -> Result<ParsedUrl, Error> {
        let (scheme, rest) = split_scheme(src)?;
        let scheme = if scheme.eq_ignore_ascii_case("http") {
            Scheme::Http
        } else if scheme.eq_ignore_ascii_case("https") {
            Scheme::Https
        } else {
            return Err(Error::UnsupportedScheme);
        };
        if !rest.starts_with("//") {
            return Err(Error::BadUrl("no authority"));
        }
        let authority = &rest[2..];
        validate_escapes(authority.as_bytes())?;

        let info_end = span(authority.as_bytes(), is_pchar_no_at);
        let (user, pass, hostport) =
            if authority.as_bytes().get(info_end) == Some(&b'@') {
                let info = &authority[..info_end];
                let (user, pass) = match info.find(':') {
                    Some(idx) => (&info[..idx], Some(&info[idx+1..])),
                    None => (info, None),
                };
                let user = unescape(user);
                // Would be ambiguous in basic auth
                if user.contains(':') {
                    return Err(Error::BadUrl("colon in user name"));
                }
                let pass = match pass {
                    Some(p) => Some(unescape(p)),
                    None => None,
                };
                (Some(user), pass, &authority[info_end+1..])
            } else {
                (None, None, authority)
            };

        let hbytes = hostport.as_bytes();
        let (host, host_end) = if hbytes.first() == Some(&b'[') {
            let end = 1 + span(&hbytes[1..], is_pchar_no_at);
            if hbytes.get(end) != Some(&b']') {
                return Err(Error::BadUrl("unterminated IP literal"));
            }
            (&hostport[1..end], end+1)
        } else {
            let end = span(hbytes, is_pchar_base);
            (&hostport[..end], end)
        };
        if host.is_empty() {
            return Err(Error::BadUrl("empty host"));
        }

        let mut port = scheme.default_port();
        let mut rest = &hostport[host_end..];
        if rest.starts_with(':') {
            let ndigits = span(&rest.as_bytes()[1..], |c| c.is_ascii_digit());
            if ndigits > 0 {
                let digits = rest[1..ndigits+1].trim_start_matches('0');
                if digits.len() > 5 {
                    return Err(Error::BadUrl("port is out of range"));
                }
                let value = if digits.is_empty() {
                    0
                } else {
                    digits.parse::<u32>()
                        .map_err(|_| Error::BadUrl("invalid port"))?
                };
                if value > 65535 {
                    return Err(Error::BadUrl("port is out of range"));
                }
                port = value as u16;
            }
            rest = &rest[ndigits+1..];
        }

        let pbytes = rest.as_bytes();
        let path_end = span(pbytes, is_path);
        if path_end > 0 && pbytes[0] != b'/' {
            return Err(Error::BadUrl("path must be absolute"));
        }
        let mut end = path_end;
        if pbytes.get(end) == Some(&b'?') {
            end += 1 + span(&pbytes[end+1..], is_query);
        }
        let path = &rest[..end];
        let mut tail = &rest[end..];
        if tail.starts_with('#') {
            let fragment = 1 + span(&tail.as_bytes()[1..], is_query);
            tail = &tail[fragment..];
        }
        if !tail.is_empty() {
            return Err(Error::BadUrl("unexpected character"));
        }
        let path = if path.is_empty() || path.starts_with('?') {
            format!("/{}", path)
        } else {
            path.to_string()
        };
        Ok(ParsedUrl {
            scheme: scheme,
            user: user,
            pass: pass,
            host: unescape(host),
            port: port,
            path: path,
        })
    }
    pub fn scheme(&self) -> Scheme {
        self.scheme
    }
    /// Returns true for `https` urls
    pub fn is_tls(&self) -> bool {
        self.scheme == Scheme::Https
    }
    pub fn user(&self) -> Option<&str> {
        self.user.as_ref().map(|x| &x[..])
    }
    pub fn pass(&self) -> Option<&str> {
        self.pass.as_ref().map(|x| &x[..])
    }
    /// Host name or IP address, without brackets for IPv6 literals
    pub fn host(&self) -> &str {
        &self.host
    }
    pub fn port(&self) -> u16 {
        self.port
    }
    /// Escaped path including the query
    pub fn path(&self) -> &str {
        &self.path
    }
    /// `host:port`, used for `CONNECT` and its `Host` header
    pub fn authority(&self) -> String {
        format!("{}:{}", HostFmt(&self.host), self.port)
    }
    /// Value of the `Host` header, port is omitted when it's the default
    pub fn host_header(&self) -> String {
        if self.port == self.scheme.default_port() {
            HostFmt(&self.host).to_string()
        } else {
            self.authority()
        }
    }
}

/// Url without credentials, as it's sent on request line to a proxy
impl fmt::Display for ParsedUrl {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}://{}{}", self.scheme, self.host_header(), self.path)
    }
}

struct HostFmt<'a>(&'a str);

impl<'a> fmt::Display for HostFmt<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.0.contains(':') {
            write!(f, "[{}]", self.0)
        } else {
            f.write_str(self.0)
        }
    }
}

/// Parses `file:` url and returns an unescaped local path
///
/// Only an empty host or `localhost` is accepted. Ports, IP literals,
/// queries and fragments are rejected.
pub fn parse_file_url(src: &str) -> Result<String, Error> {
    let (scheme, rest) = split_scheme(src)?;
    if !scheme.eq_ignore_ascii_case("file") {
        return Err(Error::UnsupportedScheme);
    }
    validate_escapes(rest.as_bytes())?;
    let path = if rest.starts_with("//") {
        let authority = &rest[2..];
        let host_end = span(authority.as_bytes(), is_pchar_base);
        if host_end > 0 {
            // "localhost" fully escaped is 27 characters
            if host_end > 27 {
                return Err(Error::BadUrl("file url host is not localhost"));
            }
            let host = unescape(&authority[..host_end]);
            if !host.eq_ignore_ascii_case("localhost") {
                return Err(Error::BadUrl("file url host is not localhost"));
            }
        }
        &authority[host_end..]
    } else {
        rest
    };
    if !path.starts_with('/') {
        return Err(Error::BadUrl("file path must be absolute"));
    }
    if span(path.as_bytes(), is_path) != path.len() {
        return Err(Error::BadUrl("unexpected character in file url"));
    }
    Ok(unescape(path))
}

/// Resolves value of `Location` header relative to the current url
pub fn resolve_location(base: &str, location: &str) -> String {
    match Url::parse(base).and_then(|b| b.join(location)) {
        Ok(url) => url.to_string(),
        Err(_) => location.to_string(),
    }
}
