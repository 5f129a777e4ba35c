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
///
///     let destination = Endpoint::resolve("example.com", 80).unwrap();
///     match client.create(destination).await {
///         Ok(_tunnel) => { /* relay bytes over the tunnel */ }
///         Err(e) => eprintln!("could not reach destination through proxy: {}", e),
///     }
/// }
/// ```
pub mod client;
pub mod stream;

pub use client::{Mode, Socks5Client};
pub use stream::Socks5Stream;
