use crate::channel::BoxedChannel;
use crate::clients::socks5::stream::Socks5Stream;
use crate::credential::OutboundCredential;
use crate::endpoint::Endpoint;
use crate::general::ConnectionTimeouts;
use crate::proxy::{ProxyConstructor, TunnelFactory};
use std::net::SocketAddr;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Which round-trip shape [`Socks5Client`] uses to perform the
/// handshake.
///
/// `Sequential` waits for each server reply before sending the next
/// frame, as RFC 1928 describes it. `Pipelined` writes the method
/// negotiation, (if a credential is configured) the username/password
/// sub-negotiation, and the connect request back to back in a single
/// write, trading one or two round trips for the risk that a strict
/// server rejects the unsolicited bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Sequential,
    Pipelined,
}

/// A [`TunnelFactory`] that reaches a destination by connecting to a
/// SOCKS5 proxy and performing the RFC 1928 handshake over it.
#[derive(Clone)]
pub struct Socks5Client {
    proxy_addr: SocketAddr,
    credential: Option<OutboundCredential>,
    mode: Mode,
    timeouts: ConnectionTimeouts,
}

/// An error that can occur while connecting to a service through a
/// SOCKS5 proxy.
#[derive(Debug)]
pub enum ErrorKind {
    /// The TCP connection to the proxy server itself could not be
    /// established in time, or at all.
    OperationTimeoutReached,
    /// The proxy could not be reached.
    OutboundConnectFailed(std::io::Error),
    /// An I/O error occurred while speaking the handshake.
    Io(std::io::Error),
    /// The proxy closed the connection before completing the
    /// handshake.
    OutboundClosed,
    /// The method negotiation reply was malformed, or selected a
    /// method neither side offered.
    NegotiateRejected,
    /// The server requires username/password authentication but this
    /// client has no credential configured for it.
    AuthRequiredButNoCredential,
    /// The server rejected the username/password sub-negotiation.
    AuthRejected,
    /// The server rejected the connect request, or the reply could
    /// not be parsed.
    ConnectRejected,
    /// The destination could not be represented in a SOCKS5 address.
    InvalidDestination,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            ErrorKind::OperationTimeoutReached => f.write_str("operation timeout reached"),
            ErrorKind::OutboundConnectFailed(e) => write!(f, "could not reach proxy: {}", e),
            ErrorKind::Io(e) => write!(f, "i/o error: {}", e),
            ErrorKind::OutboundClosed => f.write_str("proxy closed the connection"),
            ErrorKind::NegotiateRejected => f.write_str("method negotiation rejected"),
            ErrorKind::AuthRequiredButNoCredential => {
                f.write_str("proxy requires authentication but none is configured")
            }
            ErrorKind::AuthRejected => f.write_str("proxy rejected username/password"),
            ErrorKind::ConnectRejected => f.write_str("proxy rejected the connect request"),
            ErrorKind::InvalidDestination => f.write_str("destination is not a valid SOCKS5 address"),
        }
    }
}

impl std::error::Error for ErrorKind {}

impl From<crate::endpoint::InvalidDestination> for ErrorKind {
    fn from(_: crate::endpoint::InvalidDestination) -> ErrorKind {
        ErrorKind::InvalidDestination
    }
}

impl Socks5Client {
    pub fn new(proxy_addr: SocketAddr, timeouts: ConnectionTimeouts) -> Socks5Client {
        Socks5Client {
            proxy_addr,
            credential: None,
            mode: Mode::Sequential,
            timeouts,
        }
    }

    pub fn with_credential(mut self, credential: OutboundCredential) -> Socks5Client {
        self.credential = Some(credential);
        self
    }

    pub fn with_mode(mut self, mode: Mode) -> Socks5Client {
        self.mode = mode;
        self
    }

    fn negotiate_frame(&self) -> Vec<u8> {
        if self.credential.is_some() {
            vec![0x05, 0x01, 0x02]
        } else {
            vec![0x05, 0x01, 0x00]
        }
    }

    fn connect_frame(destination: &Endpoint) -> Vec<u8> {
        let mut frame = vec![0x05, 0x01, 0x00];
        frame.extend(destination.to_connect_body());
        frame
    }

    async fn write_all_timed(
        &self,
        stream: &mut TcpStream,
        buf: &[u8],
    ) -> Result<(), ErrorKind> {
        timeout(self.timeouts.write_timeout, stream.write_all(buf))
            .await
            .map_err(|_| ErrorKind::OperationTimeoutReached)?
            .map_err(ErrorKind::Io)
    }

    async fn read_exact_timed(
        &self,
        stream: &mut TcpStream,
        buf: &mut [u8],
    ) -> Result<(), ErrorKind> {
        let n = timeout(self.timeouts.read_timeout, stream.read_exact(buf))
            .await
            .map_err(|_| ErrorKind::OperationTimeoutReached)?
            .map_err(ErrorKind::Io)?;
        if n < buf.len() {
            return Err(ErrorKind::OutboundClosed);
        }
        Ok(())
    }

    /// Reads and validates a SOCKS5 connect reply (VER, REP, RSV,
    /// ATYP, BND.ADDR, BND.PORT), discarding the bound address once
    /// validated. Uses `read_exact` throughout so a reply split across
    /// many small TCP segments is handled transparently.
    async fn read_connect_reply(&self, stream: &mut TcpStream) -> Result<(), ErrorKind> {
        let mut header = [0u8; 4];
        self.read_exact_timed(stream, &mut header).await?;

        if header[0] != 0x05 || header[1] != 0x00 {
            return Err(ErrorKind::ConnectRejected);
        }

        match header[3] {
            0x01 => {
                let mut tail = [0u8; 4 + 2];
                self.read_exact_timed(stream, &mut tail).await
            }
            0x04 => {
                let mut tail = [0u8; 16 + 2];
                self.read_exact_timed(stream, &mut tail).await
            }
            0x03 => {
                let mut len = [0u8; 1];
                self.read_exact_timed(stream, &mut len).await?;
                let mut tail = vec![0u8; len[0] as usize + 2];
                self.read_exact_timed(stream, &mut tail).await
            }
            // An ATYP we don't recognize means we can't know how many
            // trailing bytes to consume; treat the reply as rejected
            // without reading further.
            _ => Err(ErrorKind::ConnectRejected),
        }
    }

    async fn connect_sequential(
        &self,
        mut stream: TcpStream,
        destination: Endpoint,
    ) -> Result<Socks5Stream, ErrorKind> {
        self.write_all_timed(&mut stream, &self.negotiate_frame())
            .await?;

        let mut negotiate_reply = [0u8; 2];
        self.read_exact_timed(&mut stream, &mut negotiate_reply)
            .await?;
        if negotiate_reply[0] != 0x05 {
            return Err(ErrorKind::NegotiateRejected);
        }

        match negotiate_reply[1] {
            0x00 => {}
            0x02 => {
                let credential = self
                    .credential
                    .as_ref()
                    .ok_or(ErrorKind::AuthRequiredButNoCredential)?;
                self.write_all_timed(&mut stream, credential.as_bytes())
                    .await?;

                let mut auth_reply = [0u8; 2];
                self.read_exact_timed(&mut stream, &mut auth_reply).await?;
                if auth_reply != [0x01, 0x00] {
                    return Err(ErrorKind::AuthRejected);
                }
            }
            _ => return Err(ErrorKind::NegotiateRejected),
        }

        self.write_all_timed(&mut stream, &Self::connect_frame(&destination))
            .await?;
        self.read_connect_reply(&mut stream).await?;

        Ok(Socks5Stream {
            wrapped_stream: stream,
        })
    }

    /// Writes the method negotiation, the username/password
    /// sub-negotiation (if a credential is configured), and the
    /// connect request as a single write, then reads the replies in
    /// that fixed order.
    ///
    /// The auth reply is read whenever this client offered a
    /// credential, regardless of which method the server's negotiate
    /// reply actually selected: a server that offers a strict
    /// RFC 1928 state machine is expected to pick X'02' whenever it is
    /// among the offered methods and the server requires
    /// authentication, and one that genuinely doesn't need auth is
    /// expected to not have consumed the pipelined auth packet as
    /// anything meaningful. A conformant but unusually strict server
    /// may still close the connection here; `Mode::Sequential` exists
    /// for that case.
    async fn connect_pipelined(
        &self,
        mut stream: TcpStream,
        destination: Endpoint,
    ) -> Result<Socks5Stream, ErrorKind> {
        let auth_sent = self.credential.is_some();

        let mut outbound = self.negotiate_frame();
        if let Some(credential) = &self.credential {
            outbound.extend_from_slice(credential.as_bytes());
        }
        outbound.extend(Self::connect_frame(&destination));

        self.write_all_timed(&mut stream, &outbound).await?;

        let mut negotiate_reply = [0u8; 2];
        self.read_exact_timed(&mut stream, &mut negotiate_reply)
            .await?;
        if negotiate_reply[0] != 0x05 || !matches!(negotiate_reply[1], 0x00 | 0x02) {
            return Err(ErrorKind::NegotiateRejected);
        }
        if negotiate_reply[1] == 0x02 && !auth_sent {
            return Err(ErrorKind::AuthRequiredButNoCredential);
        }

        if auth_sent {
            let mut auth_reply = [0u8; 2];
            self.read_exact_timed(&mut stream, &mut auth_reply).await?;
            if auth_reply != [0x01, 0x00] {
                return Err(ErrorKind::AuthRejected);
            }
        }

        self.read_connect_reply(&mut stream).await?;

        Ok(Socks5Stream {
            wrapped_stream: stream,
        })
    }
}

/// Adapts a [`Socks5Client`] and a concrete destination into a
/// [`ProxyConstructor`] — the handshake-only shape the wire protocol
/// is naturally expressed in, and the one the original `async-proxy`
/// clients implement. [`Socks5Client::create`] builds one of these
/// per call and drives it over a stream already connected to the
/// proxy, keeping the per-call destination out of `Socks5Client`
/// itself so one client can serve many destinations.
struct Socks5Handshake<'a> {
    client: &'a Socks5Client,
    destination: Endpoint,
}

#[async_trait::async_trait]
impl<'a> ProxyConstructor for Socks5Handshake<'a> {
    type Stream = TcpStream;
    type ProxyStream = Socks5Stream;
    type ErrorKind = ErrorKind;

    async fn connect(
        &mut self,
        stream: Self::Stream,
    ) -> Result<Self::ProxyStream, Self::ErrorKind> {
        match self.client.mode {
            Mode::Sequential => {
                self.client
                    .connect_sequential(stream, self.destination.clone())
                    .await
            }
            Mode::Pipelined => {
                self.client
                    .connect_pipelined(stream, self.destination.clone())
                    .await
            }
        }
    }
}

#[async_trait::async_trait]
impl TunnelFactory for Socks5Client {
    type Error = ErrorKind;

    async fn create(&self, destination: Endpoint) -> Result<BoxedChannel, ErrorKind> {
        debug!(proxy = %self.proxy_addr, %destination, mode = ?self.mode, "connecting to SOCKS5 proxy");

        let stream = timeout(self.timeouts.connecting_timeout, TcpStream::connect(self.proxy_addr))
            .await
            .map_err(|_| ErrorKind::OperationTimeoutReached)?
            .map_err(ErrorKind::OutboundConnectFailed)?;

        let mut handshake = Socks5Handshake {
            client: self,
            destination: destination.clone(),
        };
        let tunnel = handshake.connect(stream).await.map_err(|e| {
            warn!(proxy = %self.proxy_addr, %destination, error = %e, "SOCKS5 handshake failed");
            e
        })?;

        debug!(proxy = %self.proxy_addr, %destination, "SOCKS5 tunnel established");
        Ok(Box::new(tunnel))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt as _, AsyncWriteExt as _};
    use tokio::net::{TcpListener, TcpStream};

    fn timeouts() -> ConnectionTimeouts {
        ConnectionTimeouts::new(
            Duration::from_secs(2),
            Duration::from_secs(2),
            Duration::from_secs(2),
        )
    }

    async fn loopback_pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let connect = TcpStream::connect(addr);
        let accept = async { listener.accept().await.unwrap().0 };
        let (client, server) = tokio::join!(connect, accept);
        (client.unwrap(), server)
    }

    #[tokio::test]
    async fn sequential_no_auth_connect_succeeds() {
        let (client_stream, mut server_stream) = loopback_pair().await;
        let client = Socks5Client::new("127.0.0.1:1".parse().unwrap(), timeouts());

        let server = tokio::spawn(async move {
            let mut negotiate = [0u8; 3];
            server_stream.read_exact(&mut negotiate).await.unwrap();
            assert_eq!(negotiate, [0x05, 0x01, 0x00]);
            server_stream.write_all(&[0x05, 0x00]).await.unwrap();

            let mut connect = [0u8; 10];
            server_stream.read_exact(&mut connect).await.unwrap();
            assert_eq!(connect[0..4], [0x05, 0x01, 0x00, 0x01]);
            server_stream
                .write_all(&[0x05, 0x00, 0x00, 0x01, 0, 0, 0, 0, 0, 0])
                .await
                .unwrap();
        });

        let destination = Endpoint::Ipv4(std::net::Ipv4Addr::new(1, 2, 3, 4), 80);
        client
            .connect_sequential(client_stream, destination)
            .await
            .unwrap();
        server.await.unwrap();
    }

    #[tokio::test]
    async fn sequential_rejects_auth_demand_without_credential() {
        let (client_stream, mut server_stream) = loopback_pair().await;
        let client = Socks5Client::new("127.0.0.1:1".parse().unwrap(), timeouts());

        let server = tokio::spawn(async move {
            let mut negotiate = [0u8; 3];
            server_stream.read_exact(&mut negotiate).await.unwrap();
            server_stream.write_all(&[0x05, 0x02]).await.unwrap();
        });

        let destination = Endpoint::Ipv4(std::net::Ipv4Addr::new(1, 2, 3, 4), 80);
        let result = client.connect_sequential(client_stream, destination).await;
        assert!(matches!(result, Err(ErrorKind::AuthRequiredButNoCredential)));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn pipelined_connect_with_credential_reads_three_replies_in_order() {
        let (client_stream, mut server_stream) = loopback_pair().await;
        let credential = OutboundCredential::from_user_pass("u", "p").unwrap();
        let client = Socks5Client::new("127.0.0.1:1".parse().unwrap(), timeouts())
            .with_credential(credential)
            .with_mode(Mode::Pipelined);

        let server = tokio::spawn(async move {
            let mut negotiate = [0u8; 3];
            server_stream.read_exact(&mut negotiate).await.unwrap();
            assert_eq!(negotiate, [0x05, 0x01, 0x02]);

            let mut auth = [0u8; 5];
            server_stream.read_exact(&mut auth).await.unwrap();
            assert_eq!(auth, [0x01, 0x01, b'u', 0x01, b'p']);

            let mut connect = [0u8; 10];
            server_stream.read_exact(&mut connect).await.unwrap();

            server_stream.write_all(&[0x05, 0x02]).await.unwrap();
            server_stream.write_all(&[0x01, 0x00]).await.unwrap();
            server_stream
                .write_all(&[0x05, 0x00, 0x00, 0x01, 0, 0, 0, 0, 0, 0])
                .await
                .unwrap();
        });

        let destination = Endpoint::Ipv4(std::net::Ipv4Addr::new(1, 2, 3, 4), 80);
        client
            .connect_pipelined(client_stream, destination)
            .await
            .unwrap();
        server.await.unwrap();
    }

    #[tokio::test]
    async fn connect_reply_split_across_many_small_reads_still_succeeds() {
        let (client_stream, mut server_stream) = loopback_pair().await;
        let client = Socks5Client::new("127.0.0.1:1".parse().unwrap(), timeouts());

        let server = tokio::spawn(async move {
            let mut negotiate = [0u8; 3];
            server_stream.read_exact(&mut negotiate).await.unwrap();
            server_stream.write_all(&[0x05, 0x00]).await.unwrap();

            let mut connect = [0u8; 10];
            server_stream.read_exact(&mut connect).await.unwrap();

            let reply = [0x05, 0x00, 0x00, 0x01, 0, 0, 0, 0, 0, 0];
            for byte in reply {
                server_stream.write_all(&[byte]).await.unwrap();
            }
        });

        let destination = Endpoint::Ipv4(std::net::Ipv4Addr::new(1, 2, 3, 4), 80);
        client
            .connect_sequential(client_stream, destination)
            .await
            .unwrap();
        server.await.unwrap();
    }

    #[tokio::test]
    async fn rejects_unknown_atyp_in_connect_reply() {
        let (client_stream, mut server_stream) = loopback_pair().await;
        let client = Socks5Client::new("127.0.0.1:1".parse().unwrap(), timeouts());

        let server = tokio::spawn(async move {
            let mut negotiate = [0u8; 3];
            server_stream.read_exact(&mut negotiate).await.unwrap();
            server_stream.write_all(&[0x05, 0x00]).await.unwrap();

            let mut connect = [0u8; 10];
            server_stream.read_exact(&mut connect).await.unwrap();
            server_stream
                .write_all(&[0x05, 0x00, 0x00, 0x7f])
                .await
                .unwrap();
        });

        let destination = Endpoint::Ipv4(std::net::Ipv4Addr::new(1, 2, 3, 4), 80);
        let result = client.connect_sequential(client_stream, destination).await;
        assert!(matches!(result, Err(ErrorKind::ConnectRejected)));
        server.await.unwrap();
    }
}
