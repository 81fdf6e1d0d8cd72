//! Network collaborators opening and upgrading SMTP streams

use std::{
    fmt,
    io::{self, Read, Write},
    net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs},
    time::Duration,
};

#[cfg(feature = "native-tls")]
use std::mem;

#[cfg(feature = "native-tls")]
use native_tls::{TlsConnector, TlsStream};

use crate::error::{self, Error};

/// A stream an SMTP session runs over
pub trait SmtpStream: Read + Write {
    /// Upgrades the stream to TLS, validating the certificate against `domain`
    fn upgrade_tls(&mut self, domain: &str) -> Result<(), Error>;

    /// Tells if the stream is currently encrypted
    fn is_encrypted(&self) -> bool;

    /// Shuts down both halves of the connection
    fn shutdown(&mut self) -> io::Result<()>;
}

/// Opens plaintext streams to an SMTP server
///
/// The SMTP transport only reaches the network through this trait.
pub trait Connector {
    /// Stream produced by this connector
    type Stream: SmtpStream;

    /// Connects to `server` on `port`
    fn connect(
        &self,
        server: &str,
        port: u16,
        timeout: Option<Duration>,
    ) -> Result<Self::Stream, Error>;
}

/// Connects over TCP, upgrading with `native-tls`
#[derive(Debug, Default, Clone, Copy)]
pub struct TcpConnector;

impl Connector for TcpConnector {
    type Stream = NetworkStream;

    fn connect(
        &self,
        server: &str,
        port: u16,
        timeout: Option<Duration>,
    ) -> Result<NetworkStream, Error> {
        let addrs = (server, port)
            .to_socket_addrs()
            .map_err(error::connection)?;
        let tcp_stream = try_connect(addrs, timeout)?;

        tcp_stream
            .set_read_timeout(timeout)
            .map_err(error::network)?;
        tcp_stream
            .set_write_timeout(timeout)
            .map_err(error::network)?;

        Ok(NetworkStream::new(InnerNetworkStream::Tcp(tcp_stream)))
    }
}

fn try_connect<T: Iterator<Item = SocketAddr>>(
    addrs: T,
    timeout: Option<Duration>,
) -> Result<TcpStream, Error> {
    let mut last_err = None;

    for addr in addrs {
        let result = match timeout {
            Some(timeout) => TcpStream::connect_timeout(&addr, timeout),
            None => TcpStream::connect(addr),
        };
        match result {
            Ok(stream) => return Ok(stream),
            Err(err) => last_err = Some(err),
        }
    }

    // Could not connect to any of the socket addresses
    Err(match last_err {
        Some(last_err) => error::connection(last_err),
        None => error::connection("could not resolve to any address"),
    })
}

/// A network stream
pub struct NetworkStream {
    inner: InnerNetworkStream,
}

/// Represents the different types of underlying network streams
#[allow(clippy::large_enum_variant)]
enum InnerNetworkStream {
    /// Plain TCP stream
    Tcp(TcpStream),
    /// Encrypted TCP stream
    #[cfg(feature = "native-tls")]
    NativeTls(TlsStream<TcpStream>),
    /// Can't be built
    None,
}

impl NetworkStream {
    fn new(inner: InnerNetworkStream) -> Self {
        NetworkStream { inner }
    }

    /// Returns peer's address
    pub fn peer_addr(&self) -> io::Result<SocketAddr> {
        match &self.inner {
            InnerNetworkStream::Tcp(s) => s.peer_addr(),
            #[cfg(feature = "native-tls")]
            InnerNetworkStream::NativeTls(s) => s.get_ref().peer_addr(),
            InnerNetworkStream::None => Err(none_stream()),
        }
    }

    #[cfg(feature = "native-tls")]
    fn upgrade_native_tls(tcp_stream: TcpStream, domain: &str) -> Result<Self, Error> {
        let connector = TlsConnector::new().map_err(|e| error::tls(e.to_string()))?;
        let stream = connector
            .connect(domain, tcp_stream)
            .map_err(|e| error::tls(e.to_string()))?;
        Ok(NetworkStream::new(InnerNetworkStream::NativeTls(stream)))
    }
}

impl fmt::Debug for NetworkStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetworkStream")
            .field("encrypted", &self.is_encrypted())
            .finish_non_exhaustive()
    }
}

impl SmtpStream for NetworkStream {
    fn upgrade_tls(&mut self, domain: &str) -> Result<(), Error> {
        match &self.inner {
            #[cfg(not(feature = "native-tls"))]
            InnerNetworkStream::Tcp(_) => {
                let _ = domain;
                Err(error::client(
                    "STARTTLS requires the native-tls feature to be enabled",
                ))
            }
            #[cfg(feature = "native-tls")]
            InnerNetworkStream::Tcp(_) => {
                // get owned TcpStream
                let tcp_stream = mem::replace(&mut self.inner, InnerNetworkStream::None);
                let InnerNetworkStream::Tcp(tcp_stream) = tcp_stream else {
                    return Err(error::client("stream changed during TLS upgrade"));
                };

                *self = Self::upgrade_native_tls(tcp_stream, domain)?;
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn is_encrypted(&self) -> bool {
        match self.inner {
            InnerNetworkStream::Tcp(_) | InnerNetworkStream::None => false,
            #[cfg(feature = "native-tls")]
            InnerNetworkStream::NativeTls(_) => true,
        }
    }

    fn shutdown(&mut self) -> io::Result<()> {
        match &mut self.inner {
            InnerNetworkStream::Tcp(s) => s.shutdown(Shutdown::Both),
            #[cfg(feature = "native-tls")]
            InnerNetworkStream::NativeTls(s) => s.get_ref().shutdown(Shutdown::Both),
            InnerNetworkStream::None => Ok(()),
        }
    }
}

impl Read for NetworkStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match &mut self.inner {
            InnerNetworkStream::Tcp(s) => s.read(buf),
            #[cfg(feature = "native-tls")]
            InnerNetworkStream::NativeTls(s) => s.read(buf),
            InnerNetworkStream::None => Err(none_stream()),
        }
    }
}

impl Write for NetworkStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match &mut self.inner {
            InnerNetworkStream::Tcp(s) => s.write(buf),
            #[cfg(feature = "native-tls")]
            InnerNetworkStream::NativeTls(s) => s.write(buf),
            InnerNetworkStream::None => Err(none_stream()),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match &mut self.inner {
            InnerNetworkStream::Tcp(s) => s.flush(),
            #[cfg(feature = "native-tls")]
            InnerNetworkStream::NativeTls(s) => s.flush(),
            InnerNetworkStream::None => Err(none_stream()),
        }
    }
}

fn none_stream() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "stream lost during TLS upgrade")
}

#[cfg(test)]
mod test {
    use std::net::TcpListener;

    use super::*;

    #[test]
    fn connect_to_local_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let stream = TcpConnector
            .connect("127.0.0.1", port, Some(Duration::from_secs(5)))
            .unwrap();

        assert!(!stream.is_encrypted());
        assert_eq!(stream.peer_addr().unwrap().port(), port);
    }

    #[test]
    fn connection_refused_is_transport_error() {
        // Bind then drop to get a port nobody listens on
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };

        let err = TcpConnector
            .connect("127.0.0.1", port, Some(Duration::from_secs(5)))
            .unwrap_err();

        assert!(err.is_transport());
    }
}
