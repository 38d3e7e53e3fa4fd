//! Seekable HTTP(S) byte stream
//!
//! Turns a remote resource into something that implements `Read` and
//! `Seek`. Seeking uses byte range requests over a few persistent
//! connections, pipelined where the server allows it.
//!
//! ```no_run
//! use std::io::{Read, Seek, SeekFrom};
//! use tk_http_stream::{Config, HttpStream};
//!
//! let mut stream = HttpStream::open("http://example.com/song.opus",
//!                                   &Config::new().done()).unwrap();
//! stream.seek(SeekFrom::Start(4096)).unwrap();
//! let mut buf = [0u8; 1024];
//! stream.read(&mut buf).unwrap();
//! ```
#![recursion_limit="256"]

extern crate base64;
extern crate httparse;
extern crate libc;
extern crate netbuf;
extern crate percent_encoding;
extern crate rustls;
extern crate socket2;
extern crate url;
extern crate webpki_roots;
#[macro_use(quick_error)] extern crate quick_error;
#[macro_use] extern crate log;
#[cfg(test)] extern crate rcgen;


pub mod client;
mod headers;
mod source;
mod uri;
mod version;

pub use client::{Config, Error, HttpStream};
pub use source::{UrlSource, open_url};
pub use uri::{ParsedUrl, Scheme, parse_file_url};
pub use version::Version;
