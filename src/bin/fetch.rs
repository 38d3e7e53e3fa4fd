extern crate tk_http_stream;
extern crate argparse;
extern crate env_logger;
#[macro_use] extern crate log;

use std::env;
use std::io::{self, Write};
use std::process::exit;

use argparse::{ArgumentParser, Store, StoreTrue, StoreOption};
use tk_http_stream::{Config, open_url};


pub struct Options {
    pub url: String,
    pub offset: Option<u64>,
    pub proxy: Option<String>,
    pub proxy_user: Option<String>,
    pub insecure: bool,
}

fn split_pair<'a>(value: &'a str, at_last: bool, what: &str)
    -> (&'a str, &'a str)
{
    let idx = if at_last { value.rfind(':') } else { value.find(':') };
    match idx {
        Some(idx) => (&value[..idx], &value[idx+1..]),
        None => {
            error!("Bad {} {:?}, expected two parts separated by colon",
                what, value);
            exit(2);
        }
    }
}

pub fn main() {
    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "warn");
    }
    env_logger::init();

    let mut opt = Options {
        url: String::new(),
        offset: None,
        proxy: None,
        proxy_user: None,
        insecure: false,
    };
    {
        let mut ap = ArgumentParser::new();
        ap.set_description("Streams a url to stdout");
        ap.refer(&mut opt.url)
            .add_argument("url", Store, "
                Fetch specified url (http, https or file)
            ").required();
        ap.refer(&mut opt.offset)
            .add_option(&["-o", "--offset"], StoreOption,
                "Seek to this byte offset first");
        ap.refer(&mut opt.proxy)
            .add_option(&["--proxy"], StoreOption,
                "Use HTTP proxy at HOST:PORT");
        ap.refer(&mut opt.proxy_user)
            .add_option(&["--proxy-user"], StoreOption,
                "Proxy credentials as USER:PASS");
        ap.refer(&mut opt.insecure)
            .add_option(&["-k", "--insecure"], StoreTrue,
                "Don't verify server certificates");
        ap.parse_args_or_exit();
    }

    let mut cfg = Config::new();
    cfg.skip_certificate_check(opt.insecure);
    if let Some(ref proxy) = opt.proxy {
        let (host, port) = split_pair(proxy, true, "proxy");
        let host = host.trim_start_matches('[').trim_end_matches(']');
        match port.parse() {
            Ok(port) => cfg.proxy(host, port),
            Err(_) => {
                error!("Bad proxy port {:?}", port);
                exit(2);
            }
        };
    }
    if let Some(ref creds) = opt.proxy_user {
        let (user, pass) = split_pair(creds, false, "proxy credentials");
        cfg.proxy_credentials(user, pass);
    }
    let cfg = cfg.done();

    let mut source = match open_url(&opt.url, &cfg) {
        Ok(source) => source,
        Err(e) => {
            error!("Can't open {}: {}", opt.url, e);
            exit(1);
        }
    };
    if let Some(offset) = opt.offset {
        if let Err(e) = io::Seek::seek(&mut source,
                                       io::SeekFrom::Start(offset))
        {
            error!("Can't seek to {}: {}", offset, e);
            exit(1);
        }
    }
    let stdout = io::stdout();
    let mut out = stdout.lock();
    match io::copy(&mut source, &mut out) {
        Ok(bytes) => debug!("Fetched {} bytes", bytes),
        Err(e) => {
            error!("Error reading {}: {}", opt.url, e);
            exit(1);
        }
    }
    out.flush().ok();
}
