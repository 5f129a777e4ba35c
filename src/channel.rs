use tokio::io::{AsyncRead, AsyncWrite};

/// A duplex byte channel: independent read and write halves that
/// can be driven concurrently by [`crate::pump::BytePump`].
///
/// Any owned, `Send`, `Unpin` stream that implements both halves of
/// `tokio::io` qualifies automatically — a bare `TcpStream`, a wrapped
/// SOCKS5 stream such as [`crate::clients::socks5::Socks5Stream`], or
/// a test double built on `tokio::io::duplex`.
pub trait DuplexChannel: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin + ?Sized> DuplexChannel for T {}

/// A boxed, type-erased [`DuplexChannel`].
///
/// [`crate::session::ProxySession`] stores both the inbound and the
/// outbound channel as `BoxedChannel` so it does not need to be generic
/// over whichever `ProxyConstructor::ProxyStream` the configured tunnel
/// factory happens to produce.
pub type BoxedChannel = Box<dyn DuplexChannel>;
