use crate::channel::BoxedChannel;
use crate::credential::InboundCredential;
use crate::endpoint::{Endpoint, InvalidDestination};
use crate::header::{self, HeaderParser, ParsedRequest};
use crate::proxy::TunnelFactory;
use crate::pump::{self, BytePump};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

const RESPONSE_CONNECTION_ESTABLISHED: &[u8] = b"HTTP/1.1 200 Connection Established\n\n";
const RESPONSE_BAD_REQUEST: &[u8] = b"HTTP/1.1 400 Bad Request\nConnection: close\n\n";
const RESPONSE_FORBIDDEN: &[u8] = b"HTTP/1.1 403 Forbidden\nConnection: close\n\n";
const RESPONSE_AUTH_REQUIRED: &[u8] =
    b"HTTP/1.1 407 Proxy Authentication Required\nProxy-Authenticate: Basic realm=\"proxy\"\n\n";
const RESPONSE_PROXY_FAILURE: &[u8] = b"HTTP/1.1 500 Proxy Failure\nConnection: close\n\n";

/// Why a session ended before it could start pumping bytes.
///
/// This exists for logging, not for the client: the session has
/// already written whatever status line corresponds to each variant
/// (or none, for [`SessionError::TransferError`]) by the time it
/// returns one.
#[derive(Debug)]
pub enum SessionError {
    InboundProtocolError(header::ErrorKind),
    AuthFailure,
    DestinationError(String),
    TunnelFailure(String),
    TransferError(pump::ErrorKind),
    Io(std::io::Error),
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            SessionError::InboundProtocolError(e) => write!(f, "inbound protocol error: {}", e),
            SessionError::AuthFailure => f.write_str("inbound proxy authentication failed"),
            SessionError::DestinationError(reason) => write!(f, "bad destination: {}", reason),
            SessionError::TunnelFailure(reason) => write!(f, "tunnel failure: {}", reason),
            SessionError::TransferError(e) => write!(f, "transfer error: {}", e),
            SessionError::Io(e) => write!(f, "i/o error: {}", e),
        }
    }
}

impl std::error::Error for SessionError {}

impl From<std::io::Error> for SessionError {
    fn from(e: std::io::Error) -> SessionError {
        SessionError::Io(e)
    }
}

/// Drives one inbound HTTP-proxy connection end to end: parses the
/// request, checks proxy authentication, opens a tunnel to the
/// destination through `tunnel_factory`, and relays bytes until
/// either side closes.
pub struct ProxySession<F: TunnelFactory> {
    tunnel_factory: F,
    inbound_credential: Option<InboundCredential>,
}

impl<F: TunnelFactory> ProxySession<F> {
    pub fn new(tunnel_factory: F, inbound_credential: Option<InboundCredential>) -> ProxySession<F> {
        ProxySession {
            tunnel_factory,
            inbound_credential,
        }
    }

    pub async fn run(&self, mut inbound: BoxedChannel) -> Result<(), SessionError> {
        let parsed = match HeaderParser::parse(&mut inbound).await {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(error = %e, "rejecting inbound request: malformed headers");
                inbound.write_all(RESPONSE_BAD_REQUEST).await?;
                return Err(SessionError::InboundProtocolError(e));
            }
        };
        debug!(method = %parsed.method, url = %parsed.url, "parsed inbound request");

        if let Err(rejected_with_403) = self.check_authorization(&parsed) {
            let response = if rejected_with_403 {
                RESPONSE_FORBIDDEN
            } else {
                RESPONSE_AUTH_REQUIRED
            };
            inbound.write_all(response).await?;
            return Err(SessionError::AuthFailure);
        }

        if parsed.method.eq_ignore_ascii_case("CONNECT") {
            self.run_connect(inbound, parsed).await
        } else {
            self.run_forward(inbound, parsed).await
        }
    }

    /// `Ok(())` if authorized or no credential is configured.
    /// `Err(true)` means reject with 403 (wrong credential).
    /// `Err(false)` means reject with 407 (missing credential).
    fn check_authorization(&self, parsed: &ParsedRequest) -> Result<(), bool> {
        let expected = match &self.inbound_credential {
            None => return Ok(()),
            Some(credential) => credential,
        };

        let presented = match &parsed.proxy_authorization {
            None => return Err(false),
            Some(value) => value,
        };

        let trimmed = presented.trim();
        if trimmed.len() < 6 || !trimmed.as_bytes()[..6].eq_ignore_ascii_case(b"Basic ") {
            return Err(true);
        }
        let token = trimmed[6..].trim();

        if token == expected.token() {
            Ok(())
        } else {
            Err(true)
        }
    }

    async fn run_connect(
        &self,
        mut inbound: BoxedChannel,
        parsed: ParsedRequest,
    ) -> Result<(), SessionError> {
        let destination = match parse_connect_target(&parsed.url) {
            Ok(destination) => destination,
            Err(reason) => {
                inbound.write_all(RESPONSE_BAD_REQUEST).await?;
                return Err(SessionError::DestinationError(reason));
            }
        };

        let mut outbound = match self.tunnel_factory.create(destination).await {
            Ok(outbound) => outbound,
            Err(e) => {
                inbound.write_all(RESPONSE_PROXY_FAILURE).await?;
                return Err(SessionError::TunnelFailure(e.to_string()));
            }
        };

        inbound.write_all(RESPONSE_CONNECTION_ESTABLISHED).await?;
        if !parsed.remaining_bytes.is_empty() {
            outbound.write_all(&parsed.remaining_bytes).await?;
        }

        BytePump::run(inbound, outbound)
            .await
            .map_err(SessionError::TransferError)
    }

    async fn run_forward(
        &self,
        mut inbound: BoxedChannel,
        parsed: ParsedRequest,
    ) -> Result<(), SessionError> {
        let (destination, path_and_query) = match parse_absolute_uri(&parsed.url) {
            Ok(parts) => parts,
            Err(reason) => {
                inbound.write_all(RESPONSE_BAD_REQUEST).await?;
                return Err(SessionError::DestinationError(reason));
            }
        };

        let mut outbound = match self.tunnel_factory.create(destination).await {
            Ok(outbound) => outbound,
            Err(e) => {
                inbound.write_all(RESPONSE_PROXY_FAILURE).await?;
                return Err(SessionError::TunnelFailure(e.to_string()));
            }
        };

        let mut request = format!("{} {} HTTP/1.1\n", parsed.method, path_and_query);
        for (name, value) in &parsed.headers {
            request.push_str(name);
            request.push_str(": ");
            request.push_str(value);
            request.push('\n');
        }
        request.push('\n');

        outbound.write_all(request.as_bytes()).await?;
        if !parsed.remaining_bytes.is_empty() {
            outbound.write_all(&parsed.remaining_bytes).await?;
        }

        BytePump::run(inbound, outbound)
            .await
            .map_err(SessionError::TransferError)
    }
}

/// Splits a CONNECT request-target (`HOST:PORT`) at its last colon,
/// per the grammar in §4.3: no bracket handling, unlike
/// [`parse_absolute_uri`]'s authority component.
fn parse_connect_target(url: &str) -> Result<Endpoint, String> {
    let idx = url.rfind(':').ok_or_else(|| "missing port".to_string())?;
    let (host, port) = (&url[..idx], &url[idx + 1..]);
    if host.is_empty() {
        return Err("empty host".to_string());
    }
    let port: u16 = port.parse().map_err(|_| "invalid port".to_string())?;
    Endpoint::resolve(host, port).map_err(|e: InvalidDestination| e.to_string())
}

/// Parses an absolute-form request URI (`http://host[:port]/path?query`)
/// into a destination and the origin-form path-and-query to forward.
fn parse_absolute_uri(url: &str) -> Result<(Endpoint, String), String> {
    let rest = url
        .strip_prefix("http://")
        .ok_or_else(|| "only the http scheme is supported".to_string())?;

    let (authority, path_and_query) = match rest.find('/') {
        Some(idx) => (&rest[..idx], &rest[idx..]),
        None => (rest, "/"),
    };

    if authority.is_empty() {
        return Err("empty authority".to_string());
    }

    let (host, port) = split_host_port(authority, 80)?;
    let destination = Endpoint::resolve(&host, port).map_err(|e: InvalidDestination| e.to_string())?;
    Ok((destination, path_and_query.to_string()))
}

/// Splits `user-info@`-free `host[:port]` authority, stripping
/// brackets from an IPv6 literal host before returning it.
fn split_host_port(authority: &str, default_port: u16) -> Result<(String, u16), String> {
    if let Some(rest) = authority.strip_prefix('[') {
        let end = rest.find(']').ok_or_else(|| "unterminated IPv6 literal".to_string())?;
        let host = rest[..end].to_string();
        let after = &rest[end + 1..];
        let port = match after.strip_prefix(':') {
            Some(port_str) => port_str.parse().map_err(|_| "invalid port".to_string())?,
            None if after.is_empty() => default_port,
            None => return Err("trailing characters after IPv6 literal".to_string()),
        };
        return Ok((host, port));
    }

    match authority.rfind(':') {
        Some(idx) => {
            let host = authority[..idx].to_string();
            let port: u16 = authority[idx + 1..]
                .parse()
                .map_err(|_| "invalid port".to_string())?;
            Ok((host, port))
        }
        None => Ok((authority.to_string(), default_port)),
    }
}
