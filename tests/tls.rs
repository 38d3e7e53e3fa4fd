extern crate env_logger;
extern crate rcgen;
extern crate rustls;
extern crate tk_http_stream;

mod support;

use std::io::{Read, SeekFrom};

use tk_http_stream::{Config, HttpStream};
use support::{Options, Server, payload, tls_config};


#[test]
fn direct() {
    let server = Server::start(Options {
        tls: Some(tls_config()),
        .. Options::new(300_000)
    });
    let data = payload(300_000);
    let cfg = Config::new().skip_certificate_check(true).done();
    let mut stream = HttpStream::open(&server.https_url("/x"), &cfg).unwrap();
    assert_eq!(stream.content_length(), Some(300_000));
    assert!(stream.is_seekable());
    assert!(stream.is_pipelined());
    let mut buf = vec![0u8; 1000];
    stream.read_exact(&mut buf).unwrap();
    assert!(buf == &data[..1000]);

    stream.seek(SeekFrom::Start(250_000)).unwrap();
    let mut rest = Vec::new();
    stream.read_to_end(&mut rest).unwrap();
    assert!(rest == &data[250_000..]);

    stream.seek(SeekFrom::Start(10)).unwrap();
    stream.read_exact(&mut buf[..100]).unwrap();
    assert!(&buf[..100] == &data[10..110]);
    assert!(server.requests()[0].starts_with("GET /x HTTP/1.0\r\n"));
}

#[test]
fn certificate_checked() {
    let server = Server::start(Options {
        tls: Some(tls_config()),
        .. Options::new(1000)
    });
    let cfg = Config::new().done();
    assert!(HttpStream::open(&server.https_url("/"), &cfg).is_err());
    assert!(server.requests().is_empty());
}

fn tunnel(fast_open: bool) {
    let server = Server::start(Options {
        tls: Some(tls_config()),
        .. Options::new(100_000)
    });
    let cfg = Config::new()
        .proxy("127.0.0.1", server.addr().port())
        .skip_certificate_check(true)
        .tunnel_fast_open(fast_open)
        .done();
    let mut stream = HttpStream::open("https://origin.test/a.opus", &cfg)
        .unwrap();
    let mut data = Vec::new();
    stream.read_to_end(&mut data).unwrap();
    assert!(data == payload(100_000));

    stream.seek(SeekFrom::Start(5000)).unwrap();
    let mut buf = vec![0u8; 100];
    stream.read_exact(&mut buf).unwrap();
    assert!(buf == &payload(100_000)[5000..5100]);

    let requests = server.requests();
    assert_eq!(requests[0], "CONNECT origin.test:443 HTTP/1.1\r\n\
        Host: origin.test:443\r\n\
        User-Agent: .\r\n\
        Proxy-Connection: keep-alive\r\n\r\n");
    assert!(requests[1].starts_with("GET /a.opus HTTP/1.0\r\n\
        Host: origin.test\r\n"));
    let tunnels = requests.iter()
        .filter(|r| r.starts_with("CONNECT ")).count();
    assert_eq!(tunnels, server.connections());
}

#[test]
fn tunnel_after_reply() {
    tunnel(false);
}

#[test]
fn tunnel_fast_open() {
    tunnel(true);
}
