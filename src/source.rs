//! Opening either a local file or a remote stream by url
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::sync::Arc;

use client::{Config, Error, HttpStream};
use uri::parse_file_url;


/// Seekable byte source behind a url
pub enum UrlSource {
    File(File),
    Http(HttpStream),
}

/// Opens `file:`, `http:` or `https:` url
pub fn open_url(url: &str, config: &Arc<Config>) -> Result<UrlSource, Error> {
    let is_file = url.get(..5)
        .map_or(false, |s| s.eq_ignore_ascii_case("file:"));
    if is_file {
        let path = parse_file_url(url)?;
        Ok(UrlSource::File(File::open(path)?))
    } else {
        HttpStream::open(url, config).map(UrlSource::Http)
    }
}

impl Read for UrlSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match *self {
            UrlSource::File(ref mut f) => f.read(buf),
            UrlSource::Http(ref mut s) => s.read(buf),
        }
    }
}

impl Seek for UrlSource {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        match *self {
            UrlSource::File(ref mut f) => f.seek(pos),
            UrlSource::Http(ref mut s) => Seek::seek(s, pos),
        }
    }
}


#[cfg(test)]
mod test {
    use std::env;
    use std::fs::File;
    use std::io::{Read, Seek, SeekFrom, Write};
    use client::{Config, Error};
    use super::{open_url, UrlSource};

    #[test]
    fn local_file() {
        let path = env::temp_dir().join("tk-http-stream-source-test.txt");
        File::create(&path).unwrap().write_all(b"hello world").unwrap();
        let url = format!("file://{}", path.display());
        let mut src = open_url(&url, &Config::new().done()).unwrap();
        assert!(matches!(src, UrlSource::File(_)));
        src.seek(SeekFrom::Start(6)).unwrap();
        let mut data = String::new();
        src.read_to_string(&mut data).unwrap();
        assert_eq!(data, "world");
    }

    #[test]
    fn bad_scheme() {
        let cfg = Config::new().done();
        assert!(matches!(open_url("ftp://example.com/", &cfg),
                         Err(Error::UnsupportedScheme)));
        assert!(matches!(open_url("file://example.com/x", &cfg),
                         Err(Error::BadUrl(_))));
    }
}
