use std::fmt;

/// Enum reprsenting HTTP version.
#[derive(Debug, Clone, PartialEq, Eq, Copy)]
pub enum Version {
    Http10,
    Http11,
}

impl Version {
    /// Version from the minor number of `HTTP/1.x`
    ///
    /// Anything newer than 1.0 is treated as 1.1, it's the only thing we
    /// care about: whether persistent connections are supported.
    pub fn from_minor(minor: &[u8]) -> Version {
        if minor.iter().all(|&x| x == b'0') {
            Version::Http10
        } else {
            Version::Http11
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Version::Http10 => f.write_str("HTTP/1.0"),
            Version::Http11 => f.write_str("HTTP/1.1"),
        }
    }
}
