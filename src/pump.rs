use crate::channel::BoxedChannel;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;

/// How long the still-open direction is given to finish on its own
/// once the other direction has seen a clean EOF (or failed), before
/// the session is torn down regardless of what it was doing.
const HALF_CLOSE_GRACE: Duration = Duration::from_millis(2000);

const COPY_BUFFER_SIZE: usize = 4096;

/// An error from one of the two relay directions. Carries which
/// direction failed so [`crate::session::ProxySession`] can log it
/// without guessing.
#[derive(Debug)]
pub enum ErrorKind {
    ClientToServer(std::io::Error),
    ServerToClient(std::io::Error),
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            ErrorKind::ClientToServer(e) => write!(f, "client-to-server relay failed: {}", e),
            ErrorKind::ServerToClient(e) => write!(f, "server-to-client relay failed: {}", e),
        }
    }
}

impl std::error::Error for ErrorKind {}

/// Relays bytes in both directions between a client channel and a
/// server channel until both sides have closed.
///
/// The two directions run as independent cooperative loops. Once
/// either one finishes — clean EOF or an I/O error — the other is
/// given [`HALF_CLOSE_GRACE`] to also finish naturally (this is the
/// half-close window: a client that has sent its last byte and shut
/// its write side still gets to read the server's trailing response).
/// If it hasn't finished by then it is abandoned: `run` returns and
/// dropping its reader/writer closes the underlying connection.
pub struct BytePump;

impl BytePump {
    pub async fn run(client: BoxedChannel, server: BoxedChannel) -> Result<(), ErrorKind> {
        let (mut client_read, mut client_write) = tokio::io::split(client);
        let (mut server_read, mut server_write) = tokio::io::split(server);

        let client_to_server = Self::pump_direction(&mut client_read, &mut server_write);
        let server_to_client = Self::pump_direction(&mut server_read, &mut client_write);
        tokio::pin!(client_to_server, server_to_client);

        enum Finished {
            ClientToServer(Result<(), std::io::Error>),
            ServerToClient(Result<(), std::io::Error>),
        }

        let first = tokio::select! {
            result = &mut client_to_server => Finished::ClientToServer(result),
            result = &mut server_to_client => Finished::ServerToClient(result),
        };

        match first {
            Finished::ClientToServer(result) => {
                result.map_err(ErrorKind::ClientToServer)?;
                if let Ok(result) = timeout(HALF_CLOSE_GRACE, server_to_client).await {
                    result.map_err(ErrorKind::ServerToClient)?;
                }
            }
            Finished::ServerToClient(result) => {
                result.map_err(ErrorKind::ServerToClient)?;
                if let Ok(result) = timeout(HALF_CLOSE_GRACE, client_to_server).await {
                    result.map_err(ErrorKind::ClientToServer)?;
                }
            }
        }

        Ok(())
    }

    /// Copies bytes from `reader` to `writer` until EOF, flushing the
    /// writer once the source is exhausted so the peer sees the data
    /// promptly rather than sitting in a socket buffer.
    async fn pump_direction<R, W>(reader: &mut R, writer: &mut W) -> Result<(), std::io::Error>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut buf = vec![0u8; COPY_BUFFER_SIZE];

        loop {
            let read = reader.read(&mut buf).await?;
            if read == 0 {
                writer.flush().await?;
                return Ok(());
            }
            writer.write_all(&buf[..read]).await?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    #[tokio::test]
    async fn relays_bytes_both_ways_and_stops_on_double_eof() {
        let (client_near, mut client_far) = duplex(64);
        let (server_near, mut server_far) = duplex(64);

        let relay = tokio::spawn(BytePump::run(Box::new(client_near), Box::new(server_near)));

        client_far.write_all(b"ping").await.unwrap();
        let mut buf = [0u8; 4];
        server_far.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ping");

        server_far.write_all(b"pong").await.unwrap();
        client_far.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"pong");

        drop(client_far);
        drop(server_far);

        relay.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn half_close_lets_the_other_direction_finish_sending() {
        let (client_near, mut client_far) = duplex(64);
        let (server_near, mut server_far) = duplex(64);

        let relay = tokio::spawn(BytePump::run(Box::new(client_near), Box::new(server_near)));

        // The client shuts its write side early; the server still
        // has a final message queued and should get to deliver it
        // within the half-close grace window rather than being cut
        // off.
        client_far.shutdown().await.unwrap();

        server_far.write_all(b"late").await.unwrap();
        let mut buf = [0u8; 4];
        client_far.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"late");

        server_far.shutdown().await.unwrap();

        relay.await.unwrap().unwrap();
    }
}
