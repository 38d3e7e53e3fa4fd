//! TLS context shared by all connections of a stream
use std::convert::TryFrom;
use std::io::Write;
use std::net::TcpStream;
use std::sync::Arc;

use netbuf::Buf;
use rustls::{self, ClientConfig, ClientConnection, RootCertStore};
use rustls::{DigitallySignedStruct, SignatureScheme, StreamOwned};
use rustls::client::Resumption;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified};
use rustls::client::danger::ServerCertVerifier;
use rustls::crypto::{self, CryptoProvider};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use webpki_roots;

use client::Error;
use client::config::MAX_HEAD;
use client::head::Head;
use client::parser::read_head;
use client::transport::Transport;


/// Client configuration and the single cached session
pub struct TlsContext {
    config: Arc<ClientConfig>,
}

/// `CONNECT` request to send before the handshake
pub struct Tunnel<'a> {
    pub request: &'a [u8],
    /// Write client hello right after the request
    pub fast_open: bool,
}

#[derive(Debug)]
struct NoVerification(Arc<CryptoProvider>);

impl TlsContext {
    pub fn new(verify: bool) -> Result<TlsContext, Error> {
        let provider = Arc::new(crypto::ring::default_provider());
        let builder = ClientConfig::builder_with_provider(provider.clone())
            .with_safe_default_protocol_versions()?;
        let mut config = if verify {
            let roots = RootCertStore {
                roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
            };
            builder.with_root_certificates(roots).with_no_client_auth()
        } else {
            builder.dangerous()
                .with_custom_certificate_verifier(
                    Arc::new(NoVerification(provider)))
                .with_no_client_auth()
        };
        config.resumption = Resumption::in_memory_sessions(1);
        Ok(TlsContext {
            config: Arc::new(config),
        })
    }
    /// Drops the cached session, used when the origin changes
    pub fn forget_session(&mut self) {
        let mut config = (*self.config).clone();
        config.resumption = Resumption::in_memory_sessions(1);
        self.config = Arc::new(config);
    }
    /// Performs the handshake, opening a proxy tunnel first if requested
    pub fn connect(&self, host: &str, mut sock: TcpStream,
        tunnel: Option<Tunnel>)
        -> Result<Transport, Error>
    {
        let name = ServerName::try_from(host.to_string())
            .map_err(|_| Error::InvalidServerName)?;
        let mut conn = ClientConnection::new(self.config.clone(), name)?;
        if let Some(tunnel) = tunnel {
            let mut out = tunnel.request.to_vec();
            if tunnel.fast_open {
                while conn.wants_write() {
                    conn.write_tls(&mut out)?;
                }
            }
            sock.write_all(&out)?;
            let mut buf = Buf::new();
            let len = read_head(&mut sock, &mut buf, MAX_HEAD)?;
            let head = Head::parse(&buf[..len])?;
            if head.code() / 100 != 2 {
                return Err(Error::ProxyRefused(head.code()));
            }
            debug!("Tunnel to {} established", host);
            buf.consume(len);
            // Server hello may arrive in the same packet as the reply
            while buf.len() > 0 {
                let n = {
                    let mut data = &buf[..];
                    conn.read_tls(&mut data)?
                };
                buf.consume(n);
                conn.process_new_packets()?;
            }
        }
        while conn.is_handshaking() {
            conn.complete_io(&mut sock)?;
        }
        trace!("TLS handshake with {} done, resumed: {:?}",
            host, conn.handshake_kind());
        Ok(Transport::Tls(Box::new(StreamOwned::new(conn, sock))))
    }
}

impl ServerCertVerifier for NoVerification {
    fn verify_server_cert(&self, _end_entity: &CertificateDer,
        _intermediates: &[CertificateDer], _server_name: &ServerName,
        _ocsp_response: &[u8], _now: UnixTime)
        -> Result<ServerCertVerified, rustls::Error>
    {
        Ok(ServerCertVerified::assertion())
    }
    fn verify_tls12_signature(&self, message: &[u8], cert: &CertificateDer,
        dss: &DigitallySignedStruct)
        -> Result<HandshakeSignatureValid, rustls::Error>
    {
        crypto::verify_tls12_signature(message, cert, dss,
            &self.0.signature_verification_algorithms)
    }
    fn verify_tls13_signature(&self, message: &[u8], cert: &CertificateDer,
        dss: &DigitallySignedStruct)
        -> Result<HandshakeSignatureValid, rustls::Error>
    {
        crypto::verify_tls13_signature(message, cert, dss,
            &self.0.signature_verification_algorithms)
    }
    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.0.signature_verification_algorithms.supported_schemes()
    }
}
