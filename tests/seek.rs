extern crate env_logger;
extern crate rcgen;
extern crate rustls;
extern crate tk_http_stream;

mod support;

use std::io::{self, Read, SeekFrom};

use tk_http_stream::{Config, Error, HttpStream};
use support::{Fault, Options, Server, payload};


#[test]
fn past_end() {
    let server = Server::start(Options::new(50_000));
    let cfg = Config::new().done();
    let mut stream = HttpStream::open(&server.url("/"), &cfg).unwrap();
    assert_eq!(stream.seek(SeekFrom::Start(50_000)).unwrap(), 50_000);
    let mut buf = [0u8; 100];
    assert_eq!(stream.read(&mut buf).unwrap(), 0);
    assert_eq!(stream.seek(SeekFrom::End(10)).unwrap(), 50_010);
    assert_eq!(stream.tell(), 50_010);
    assert_eq!(stream.read(&mut buf).unwrap(), 0);
    assert_eq!(server.connections(), 1);

    assert_eq!(stream.seek(SeekFrom::Start(0)).unwrap(), 0);
    let mut data = Vec::new();
    stream.read_to_end(&mut data).unwrap();
    assert!(data == payload(50_000));
    assert_eq!(server.connections(), 1);
}

#[test]
fn invalid() {
    let server = Server::start(Options::new(1000));
    let cfg = Config::new().done();
    let mut stream = HttpStream::open(&server.url("/"), &cfg).unwrap();
    stream.seek(SeekFrom::Start(10)).unwrap();
    match stream.seek(SeekFrom::Current(-11)) {
        Err(Error::InvalidSeek) => {}
        other => panic!("unexpected {:?}", other),
    }
    match stream.seek(SeekFrom::End(-1001)) {
        Err(Error::InvalidSeek) => {}
        other => panic!("unexpected {:?}", other),
    }
    let err = io::Seek::seek(&mut stream, SeekFrom::Current(-100))
        .unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    assert_eq!(stream.tell(), 10);
    assert_eq!(stream.seek(SeekFrom::Current(-10)).unwrap(), 0);
    assert_eq!(stream.seek(SeekFrom::End(-1000)).unwrap(), 0);
}

#[test]
fn reuse_most_recent() {
    let server = Server::start(Options {
        stall_after: Some(1000),
        .. Options::new(1_000_000)
    });
    let data = payload(1_000_000);
    let cfg = Config::new().done();
    let mut stream = HttpStream::open(&server.url("/"), &cfg).unwrap();
    let mut buf = vec![0u8; 1000];

    stream.seek(SeekFrom::Start(500_000)).unwrap();
    stream.read_exact(&mut buf).unwrap();
    assert!(buf == &data[500_000..501_000]);
    assert_eq!(server.connections(), 2);

    // close enough to read ahead
    stream.seek(SeekFrom::Start(510_000)).unwrap();
    stream.read_exact(&mut buf[..100]).unwrap();
    assert!(&buf[..100] == &data[510_000..510_100]);
    assert_eq!(server.connections(), 2);

    // behind the position but near the response end, pipelined
    stream.seek(SeekFrom::Start(500_500)).unwrap();
    stream.read_exact(&mut buf).unwrap();
    assert!(buf == &data[500_500..501_500]);
    assert_eq!(server.connections(), 2);
    assert!(server.ranges().iter().any(|r| r == "bytes=500500-533267"));

    // far behind, still no new connection
    stream.seek(SeekFrom::Start(10)).unwrap();
    stream.read_exact(&mut buf[..500]).unwrap();
    assert!(&buf[..500] == &data[10..510]);
    assert_eq!(server.connections(), 2);
}

#[test]
fn pool_limit() {
    let server = Server::start(Options {
        http11: false,
        stall_after: Some(1000),
        .. Options::new(1_000_000)
    });
    let data = payload(1_000_000);
    let cfg = Config::new().done();
    let mut stream = HttpStream::open(&server.url("/"), &cfg).unwrap();
    let mut buf = vec![0u8; 100];
    // can't read backwards, so every seek needs a connection
    for i in 0..6 {
        let pos = 900_000 - i * 100_000;
        stream.seek(SeekFrom::Start(pos as u64)).unwrap();
        stream.read_exact(&mut buf).unwrap();
        assert!(buf == &data[pos..pos+100]);
    }
    assert_eq!(server.connections(), 7);
    stream.close();
}

#[test]
fn failed_seek_keeps_position() {
    let server = Server::start(Options {
        cut_after: Some(5000),
        faults: vec![(1, 0, Fault::Status("404 Not Found"))],
        .. Options::new(1_000_000)
    });
    let data = payload(1_000_000);
    let cfg = Config::new().done();
    let mut stream = HttpStream::open(&server.url("/"), &cfg).unwrap();
    let mut buf = vec![0u8; 100];
    stream.read_exact(&mut buf).unwrap();

    // reading ahead hits the cut, the new connection gets 404
    match stream.seek(SeekFrom::Start(20_000)) {
        Err(Error::UnexpectedStatus(404)) => {}
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(stream.tell(), 100);
    assert_eq!(server.connections(), 2);

    stream.read_exact(&mut buf).unwrap();
    assert!(buf == &data[100..200]);
    assert_eq!(stream.tell(), 200);
    assert_eq!(server.connections(), 3);
    assert_eq!(server.ranges()[2], "bytes=100-32867");
}
