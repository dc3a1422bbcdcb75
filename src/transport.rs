//! Line transport over TCP, TLS, or an in-memory duplex stream.
//!
//! A [`Transport`] owns one socket wrapped in a [`Framed`] [`LineCodec`]:
//! complete inbound lines come out of [`Transport::next_line`], outbound
//! lines go in through [`Transport::send_line`] and pick up their `\r\n`
//! terminator in the codec.

use std::io;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::io::DuplexStream;
use tokio::net::TcpStream;
use tokio_util::codec::Framed;
use tracing::{debug, warn};

#[cfg(feature = "tls")]
use tokio_rustls::client::TlsStream;

use crate::error::{ConnectionError, ProtocolError};
use crate::line::LineCodec;

/// Address and security settings for one server.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerAddr {
    pub host: String,
    pub port: u16,
    pub tls: bool,
}

/// Opens transports on behalf of the reconnect supervisor.
#[async_trait]
pub trait Connector: Send {
    /// Attempt to open a new transport.
    async fn connect(&mut self) -> Result<Transport, ConnectionError>;
}

/// Connects to a real server over the network.
#[derive(Clone, Debug)]
pub struct ServerConnector {
    addr: ServerAddr,
}

impl ServerConnector {
    pub fn new(addr: ServerAddr) -> Self {
        Self { addr }
    }
}

#[async_trait]
impl Connector for ServerConnector {
    async fn connect(&mut self) -> Result<Transport, ConnectionError> {
        Transport::open(&self.addr.host, self.addr.port, self.addr.tls).await
    }
}

#[allow(clippy::large_enum_variant)]
pub enum Transport {
    Tcp {
        framed: Framed<TcpStream, LineCodec>,
    },
    #[cfg(feature = "tls")]
    Tls {
        framed: Framed<TlsStream<TcpStream>, LineCodec>,
    },
    /// In-process stream, for embedding and tests.
    Duplex {
        framed: Framed<DuplexStream, LineCodec>,
    },
}

impl Transport {
    /// Resolve `host` and connect to the first candidate address that
    /// accepts, optionally wrapping the socket in TLS.
    pub async fn open(host: &str, port: u16, use_tls: bool) -> Result<Self, ConnectionError> {
        let stream = connect_tcp(host, port).await?;

        if use_tls {
            #[cfg(feature = "tls")]
            {
                let stream = tls::handshake(host, stream).await?;
                return Ok(Self::tls(stream));
            }
            #[cfg(not(feature = "tls"))]
            {
                drop(stream);
                return Err(ConnectionError::TlsUnavailable);
            }
        }

        Ok(Self::tcp(stream))
    }

    pub fn tcp(stream: TcpStream) -> Self {
        if let Err(e) = Self::enable_keepalive(&stream) {
            warn!("failed to enable TCP keepalive: {}", e);
        }

        Self::Tcp {
            framed: Framed::new(stream, LineCodec::new()),
        }
    }

    fn enable_keepalive(stream: &TcpStream) -> io::Result<()> {
        use socket2::{SockRef, TcpKeepalive};

        let sock = SockRef::from(stream);
        let keepalive = TcpKeepalive::new()
            .with_time(Duration::from_secs(120))
            .with_interval(Duration::from_secs(30));

        sock.set_tcp_keepalive(&keepalive)
    }

    #[cfg(feature = "tls")]
    pub fn tls(stream: TlsStream<TcpStream>) -> Self {
        if let Err(e) = Self::enable_keepalive(stream.get_ref().0) {
            warn!("failed to enable TCP keepalive: {}", e);
        }

        Self::Tls {
            framed: Framed::new(stream, LineCodec::new()),
        }
    }

    pub fn duplex(stream: DuplexStream) -> Self {
        Self::Duplex {
            framed: Framed::new(stream, LineCodec::new()),
        }
    }

    pub fn is_tls(&self) -> bool {
        #[cfg(feature = "tls")]
        {
            matches!(self, Self::Tls { .. })
        }
        #[cfg(not(feature = "tls"))]
        {
            false
        }
    }

    /// Wait for the next complete line.
    ///
    /// Returns `None` once the peer has closed the stream. Cancel-safe.
    pub async fn next_line(&mut self) -> Option<Result<String, ProtocolError>> {
        match self {
            Transport::Tcp { framed } => framed.next().await,
            #[cfg(feature = "tls")]
            Transport::Tls { framed } => framed.next().await,
            Transport::Duplex { framed } => framed.next().await,
        }
    }

    /// Send one line; the terminator is appended by the codec.
    pub async fn send_line(&mut self, line: String) -> Result<(), ProtocolError> {
        match self {
            Transport::Tcp { framed } => framed.send(line).await,
            #[cfg(feature = "tls")]
            Transport::Tls { framed } => framed.send(line).await,
            Transport::Duplex { framed } => framed.send(line).await,
        }
    }

    /// Flush pending output and shut the write side down.
    pub async fn close(&mut self) {
        let result = match self {
            Transport::Tcp { framed } => SinkExt::<String>::close(framed).await,
            #[cfg(feature = "tls")]
            Transport::Tls { framed } => SinkExt::<String>::close(framed).await,
            Transport::Duplex { framed } => SinkExt::<String>::close(framed).await,
        };
        if let Err(e) = result {
            debug!(error = %e, "error while closing transport");
        }
    }
}

/// Try each resolved address in order until one connects.
async fn connect_tcp(host: &str, port: u16) -> Result<TcpStream, ConnectionError> {
    let addrs: Vec<_> = tokio::net::lookup_host((host, port))
        .await
        .map_err(|source| ConnectionError::Resolve {
            host: host.to_string(),
            port,
            source,
        })?
        .collect();

    let mut last = None;
    for addr in addrs {
        match TcpStream::connect(addr).await {
            Ok(stream) => {
                debug!(%addr, "tcp connected");
                return Ok(stream);
            }
            Err(e) => {
                debug!(%addr, error = %e, "candidate address refused");
                last = Some(e);
            }
        }
    }

    match last {
        Some(last) => Err(ConnectionError::Refused {
            host: host.to_string(),
            port,
            last,
        }),
        None => Err(ConnectionError::NoAddresses {
            host: host.to_string(),
            port,
        }),
    }
}

#[cfg(feature = "tls")]
mod tls {
    use std::sync::Arc;

    use tokio::net::TcpStream;
    use tokio_rustls::client::TlsStream;
    use tokio_rustls::rustls::{self, pki_types::ServerName, ClientConfig, RootCertStore};
    use tokio_rustls::TlsConnector;
    use tracing::{debug, warn};

    use crate::error::ConnectionError;

    fn client_config(host: &str) -> Result<ClientConfig, ConnectionError> {
        let tls_error = |reason: String| ConnectionError::Tls {
            host: host.to_string(),
            reason,
        };

        let native = rustls_native_certs::load_native_certs();
        for e in &native.errors {
            warn!(error = %e, "failed to load a native certificate");
        }

        let mut roots = RootCertStore::empty();
        let (added, ignored) = roots.add_parsable_certificates(native.certs);
        debug!(added, ignored, "loaded native root certificates");

        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let config = ClientConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()
            .map_err(|e| tls_error(e.to_string()))?
            .with_root_certificates(roots)
            .with_no_client_auth();
        Ok(config)
    }

    pub(super) async fn handshake(
        host: &str,
        stream: TcpStream,
    ) -> Result<TlsStream<TcpStream>, ConnectionError> {
        let tls_error = |reason: String| ConnectionError::Tls {
            host: host.to_string(),
            reason,
        };

        let connector = TlsConnector::from(Arc::new(client_config(host)?));
        let server_name =
            ServerName::try_from(host.to_string()).map_err(|e| tls_error(e.to_string()))?;

        let stream = connector
            .connect(server_name, stream)
            .await
            .map_err(|e| tls_error(e.to_string()))?;
        debug!(host, "tls handshake complete");
        Ok(stream)
    }
}
