//! # http-to-socks5
//!
//! A protocol-translating proxy: accepts inbound connections speaking
//! HTTP/1.1 proxy semantics (`CONNECT` tunneling and absolute-form
//! requests) and forwards each one through an outbound SOCKS5 proxy.
//! Once the outbound tunnel is up, the session becomes a transparent
//! byte pump joining the two sides until either closes.

/// Module responsible for functionality
/// related to proxy clients interfaces
/// (eg. common definitions and traits)
pub mod proxy;

/// Module responsible for client implementations
/// of known and most-used proxification protocols —
/// currently SOCKS5 and a trivial direct-connect stand-in.
pub mod clients;

/// Just a structure containing
/// connecting/read/write timeouts
pub mod general;

/// A boxed, type-erased duplex byte channel, and the trait that
/// qualifies a stream to be one.
pub mod channel;

/// The destination a tunnel is opened to: an IP literal or a
/// (punycoded) DNS host, plus port.
pub mod endpoint;

/// Pre-encoded inbound and outbound proxy credentials.
pub mod credential;

/// The process-wide pool of reusable header-parsing buffers.
pub mod bufpool;

/// Incremental HTTP/1.1 request-line and header-block parsing.
pub mod header;

/// Per-connection protocol state machine: parses the request, checks
/// proxy authentication, opens a tunnel, and relays bytes.
pub mod session;

/// The bidirectional byte relay with half-close and bounded grace.
pub mod pump;

/// TOML-based process configuration.
pub mod config;
