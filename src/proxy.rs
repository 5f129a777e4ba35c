use crate::channel::{BoxedChannel, DuplexChannel};
use crate::endpoint::Endpoint;

/// A general trait that represents
/// something that constructs a proxy stream,
/// something, where we can write to and read from
/// just as from a usual stream but through a proxy.
///
/// This is the low-level half of the tunnel abstraction: given a
/// stream that is already connected to the *proxy server itself*
/// (not the final destination), perform whatever protocol handshake
/// the proxy requires and hand back a stream positioned right after
/// it, ready to carry application bytes. [`crate::clients::socks5`]
/// implements this for the SOCKS5 wire protocol.
#[async_trait::async_trait]
pub trait ProxyConstructor {
    /// Represents a stream that the proxy
    /// client operates on (sends protocol data over it)
    type Stream: Send;
    /// Represents the actual proxy stream,
    /// returned by the connect function
    type ProxyStream: DuplexChannel;
    /// Used for internal proxy error indication
    type ErrorKind;

    /// Takes ownership of an existant stream,
    /// establishes a proxixied connection on the stream
    /// and returns the proxy stream if the connection was
    /// successful, unless an error
    async fn connect(&mut self, stream: Self::Stream)
        -> Result<Self::ProxyStream, Self::ErrorKind>
    where
        Self: Sized;
}

/// The boundary between the HTTP-side state machine
/// ([`crate::session::ProxySession`]) and whatever carries bytes to
/// the destination. A `TunnelFactory` owns both legs of the job a
/// [`ProxyConstructor`] leaves undone: it opens the transport
/// connection to the proxy (or, for [`crate::clients::direct`], to
/// the destination itself) and drives the handshake over it.
///
/// [`crate::clients::socks5::Socks5Client`] is the production
/// implementation; [`crate::clients::direct::DirectConnect`] is a
/// trivial same-process substitute used by tests and by the demo
/// binary when no outbound SOCKS5 proxy is configured.
#[async_trait::async_trait]
pub trait TunnelFactory: Send + Sync {
    /// Indicates why a tunnel could not be created. Callers only
    /// need to know that it failed (see `TunnelFailure` in the error
    /// taxonomy) — the concrete kind is for logging, not for shaping
    /// the client-facing response.
    type Error: std::fmt::Display + Send;

    /// Produces a duplex channel connected to `destination`, or fails.
    async fn create(&self, destination: Endpoint) -> Result<BoxedChannel, Self::Error>;
}
