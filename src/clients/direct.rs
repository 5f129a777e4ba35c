use crate::channel::BoxedChannel;
use crate::endpoint::Endpoint;
use crate::general::ConnectionTimeouts;
use crate::proxy::{ProxyConstructor, TunnelFactory};
use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};
use tokio::net::TcpStream;
use tokio::time::timeout;

/// A [`TunnelFactory`] that connects straight to the destination,
/// skipping SOCKS5 entirely. Used by the demo binary when no outbound
/// proxy is configured, and by tests that want a tunnel without
/// standing up a SOCKS5 server.
///
/// Domain-name destinations are resolved with the standard library's
/// blocking-free `lookup_host`; [`Endpoint::Dns`] is otherwise only
/// ever handed to a real proxy, which resolves it on the far side.
pub struct DirectConnect {
    timeouts: ConnectionTimeouts,
}

#[derive(Debug)]
pub enum ErrorKind {
    OperationTimeoutReached,
    Io(std::io::Error),
    NoAddressesResolved,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            ErrorKind::OperationTimeoutReached => f.write_str("operation timeout reached"),
            ErrorKind::Io(e) => write!(f, "i/o error: {}", e),
            ErrorKind::NoAddressesResolved => f.write_str("host resolved to no addresses"),
        }
    }
}

impl std::error::Error for ErrorKind {}

impl DirectConnect {
    pub fn new(timeouts: ConnectionTimeouts) -> DirectConnect {
        DirectConnect { timeouts }
    }
}

/// `DirectConnect` also satisfies [`ProxyConstructor`] over a stream
/// already connected to the destination: the handshake is a no-op, so
/// it can stand in for a real proxy constructor in tests that want to
/// exercise that trait's shape without a SOCKS5 server.
#[async_trait::async_trait]
impl ProxyConstructor for DirectConnect {
    type Stream = TcpStream;
    type ProxyStream = TcpStream;
    type ErrorKind = Infallible;

    async fn connect(&mut self, stream: Self::Stream) -> Result<Self::ProxyStream, Infallible> {
        Ok(stream)
    }
}

#[async_trait::async_trait]
impl TunnelFactory for DirectConnect {
    type Error = ErrorKind;

    async fn create(&self, destination: Endpoint) -> Result<BoxedChannel, ErrorKind> {
        let addr: SocketAddr = match destination {
            Endpoint::Ipv4(addr, port) => SocketAddr::new(IpAddr::V4(addr), port),
            Endpoint::Ipv6(addr, port) => SocketAddr::new(IpAddr::V6(addr), port),
            Endpoint::Dns(host, port) => {
                let lookup = timeout(self.timeouts.connecting_timeout, tokio::net::lookup_host((host.as_str(), port)))
                    .await
                    .map_err(|_| ErrorKind::OperationTimeoutReached)?
                    .map_err(ErrorKind::Io)?;
                lookup
                    .into_iter()
                    .next()
                    .ok_or(ErrorKind::NoAddressesResolved)?
            }
        };

        let stream = timeout(self.timeouts.connecting_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| ErrorKind::OperationTimeoutReached)?
            .map_err(ErrorKind::Io)?;

        Ok(Box::new(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn timeouts() -> ConnectionTimeouts {
        ConnectionTimeouts::new(
            Duration::from_secs(2),
            Duration::from_secs(2),
            Duration::from_secs(2),
        )
    }

    #[tokio::test]
    async fn connects_straight_to_an_ipv4_literal() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 5];
            stream.read_exact(&mut buf).await.unwrap();
            assert_eq!(&buf, b"hello");
        });

        let direct = DirectConnect::new(timeouts());
        let destination = match addr {
            SocketAddr::V4(v4) => Endpoint::Ipv4(*v4.ip(), v4.port()),
            SocketAddr::V6(v6) => Endpoint::Ipv6(*v6.ip(), v6.port()),
        };

        let mut tunnel = direct.create(destination).await.unwrap();
        tunnel.write_all(b"hello").await.unwrap();
        server.await.unwrap();
    }
}
