pub fn is_content_length(val: &str) -> bool {
    val.eq_ignore_ascii_case("Content-Length")
}

pub fn is_content_range(val: &str) -> bool {
    val.eq_ignore_ascii_case("Content-Range")
}

pub fn is_connection(val: &str) -> bool {
    val.eq_ignore_ascii_case("Connection")
}

pub fn is_location(val: &str) -> bool {
    val.eq_ignore_ascii_case("Location")
}

pub fn is_server(val: &str) -> bool {
    val.eq_ignore_ascii_case("Server")
}

// header value is byte sequence
// we need case insensitive comparison and strip out of the whitespace
pub fn is_close(val: &[u8]) -> bool {
    if val.len() < "close".len() {
        return false;
    }
    let mut iter = val.iter();
    for (idx, &ch) in iter.by_ref().enumerate() {
        match ch {
            b'\r' | b'\n' | b' ' | b'\t' => continue,
            b'c' | b'C' => {
                if idx + "close".len() > val.len() {
                    return false;
                }
                break;
            }
            _ => return false,
        }
    }
    for (idx, ch) in iter.by_ref().take(4).enumerate() {
        if b"lose"[idx] != ch.to_ascii_lowercase() {
            return false;
        }
    }
    for &ch in iter {
        if !matches!(ch, b'\r' | b'\n' | b' ' | b'\t') {
            return false;
        }
    }
    return true;
}

/// Value of `Connection` header contains `close` token
pub fn has_close_token(val: &[u8]) -> bool {
    val.split(|&x| x == b',').any(is_close)
}

/// Servers known to break on pipelined requests
///
/// Matched as a case-sensitive prefix of the `Server` header.
const PIPELINE_BROKEN: &'static [&'static [u8]] = &[
    b"EFAServer/",
    b"Microsoft-IIS/4.",
    b"Microsoft-IIS/5.",
    b"Netscape-Enterprise/3.",
    b"Netscape-Enterprise/4.",
    b"Netscape-Enterprise/5.",
    b"Netscape-Enterprise/6.",
    b"WebLogic 3.",
    b"WebLogic 4.",
    b"WebLogic 5.",
    b"WebLogic 6.",
    b"Winstone Servlet Engine v0.",
];

pub fn pipelining_broken(server: &[u8]) -> bool {
    PIPELINE_BROKEN.iter().any(|prefix| server.starts_with(prefix))
}
