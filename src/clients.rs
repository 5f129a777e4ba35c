/// Module contains the implementation of
/// the proxification protocol Socks5 and
/// utilities related to the protocol.
///
/// # Example
///
/// ```
/// use http_to_socks5::clients::socks5::{Socks5Client, Mode};
/// use http_to_socks5::general::ConnectionTimeouts;
/// use http_to_socks5::endpoint::Endpoint;
/// use http_to_socks5::proxy::TunnelFactory;
/// use std::net::SocketAddr;
/// use std::time::Duration;
///
/// #[tokio::main]
/// async fn main() {
///     let proxy_addr: SocketAddr = "127.0.0.1:1080".parse().unwrap();
///     let timeouts = ConnectionTimeouts::new(
///         Duration::from_secs(8),
///         Duration::from_secs(8),
///         Duration::from_secs(8),
///     );
///
///     let client = Socks5Client::new(proxy_addr, timeouts).with_mode(Mode::Pipelined);
///     let destination = Endpoint::resolve("example.com", 80).unwrap();
///     let _tunnel = client.create(destination).await;
/// }
/// ```
pub mod socks5;

/// A trivial [`crate::proxy::TunnelFactory`] that connects straight
/// to the destination, with no outbound SOCKS5 hop.
pub mod direct;
