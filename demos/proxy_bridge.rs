//! Accepts HTTP-proxy connections and forwards each one through a
//! SOCKS5 proxy read from a TOML config file.
//!
//! Out of the specified core — a thin entrypoint wiring `TcpListener`,
//! `Config`, `Socks5Client` and `ProxySession` together, the same way
//! the teacher crate's own `examples/socks5-trivial.rs` is a thin
//! wiring demo rather than library code.
use http_to_socks5::clients::socks5::{Mode, Socks5Client};
use http_to_socks5::config::Config;
use http_to_socks5::general::ConnectionTimeouts;
use http_to_socks5::session::ProxySession;
use std::path::PathBuf;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("proxy-bridge.toml"));

    let config = Config::load(&config_path)?;

    let listener = TcpListener::bind(config.listen_addr).await?;
    info!(
        "listening on {} (backlog {}), forwarding through {}",
        config.listen_addr, config.backlog, config.outbound_addr
    );

    loop {
        let (stream, peer) = listener.accept().await?;
        let config = config.clone();

        tokio::spawn(async move {
            let timeouts = ConnectionTimeouts::new(
                Duration::from_secs(10),
                Duration::from_secs(10),
                Duration::from_secs(10),
            );

            let mut outbound = Socks5Client::new(config.outbound_addr, timeouts).with_mode(Mode::Pipelined);
            if let Some(credential) = config.outbound_credential {
                outbound = outbound.with_credential(credential);
            }

            let session = ProxySession::new(outbound, config.inbound_credential);
            if let Err(e) = session.run(Box::new(stream)).await {
                warn!("session with {} ended: {}", peer, e);
            }
        });
    }
}
