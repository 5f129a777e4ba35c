//! Accepts HTTP-proxy connections and forwards each one straight to
//! its destination, with no outbound SOCKS5 hop. Useful for manually
//! exercising `HeaderParser`/`ProxySession`/`BytePump` without also
//! standing up a SOCKS5 server.
use http_to_socks5::clients::direct::DirectConnect;
use http_to_socks5::general::ConnectionTimeouts;
use http_to_socks5::session::ProxySession;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let listen_addr: SocketAddr = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "127.0.0.1:8080".to_string())
        .parse()?;

    let listener = TcpListener::bind(listen_addr).await?;
    info!("listening on {} with no outbound SOCKS5 hop", listen_addr);

    let timeouts = ConnectionTimeouts::new(
        Duration::from_secs(10),
        Duration::from_secs(10),
        Duration::from_secs(10),
    );
    let session = Arc::new(ProxySession::new(DirectConnect::new(timeouts), None));

    loop {
        let (stream, peer) = listener.accept().await?;
        let session = Arc::clone(&session);

        tokio::spawn(async move {
            if let Err(e) = session.run(Box::new(stream)).await {
                warn!("session with {} ended: {}", peer, e);
            }
        });
    }
}
