use byteorder::{BigEndian, ByteOrder};
use std::net::{Ipv4Addr, Ipv6Addr};

/// Represents a destination address of a service, to which a user
/// wants to connect through a SOCKS5 proxy.
///
/// Mirrors the SOCKS5 address-type byte (ATYP): IPv4, a domain name,
/// or IPv6.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// Represents an IPv4 address
    Ipv4(Ipv4Addr, u16),
    /// Represents an IPv6 address
    Ipv6(Ipv6Addr, u16),
    /// Represents a domain name, carried in its ASCII-compatible
    /// (punycoded) form. See [`Endpoint::dns`].
    Dns(String, u16),
}

/// Indicates that a domain name could not be turned into a valid
/// SOCKS5 destination.
#[derive(Debug)]
pub enum InvalidDestination {
    /// The host is not valid ASCII/IDN, or punycoding it failed.
    NotAscii,
    /// The punycoded host is longer than the 255-byte limit the
    /// SOCKS5 wire format allows.
    TooLong,
}

impl std::fmt::Display for InvalidDestination {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            InvalidDestination::NotAscii => f.write_str("host could not be converted to ASCII"),
            InvalidDestination::TooLong => f.write_str("host exceeds 255 bytes once punycoded"),
        }
    }
}

impl std::error::Error for InvalidDestination {}

impl Endpoint {
    /// Builds a `Dns` endpoint, punycoding `host` if necessary and
    /// rejecting it once the ASCII-compatible form exceeds 255 bytes
    /// (the length a single SOCKS5 connect frame can carry).
    pub fn dns(host: &str, port: u16) -> Result<Endpoint, InvalidDestination> {
        let ascii_host = idna::domain_to_ascii(host).map_err(|_| InvalidDestination::NotAscii)?;

        if ascii_host.len() > 255 {
            return Err(InvalidDestination::TooLong);
        }

        Ok(Endpoint::Dns(ascii_host, port))
    }

    /// Parses `host` as a literal IPv4/IPv6 address, falling back to
    /// [`Endpoint::dns`] when it is not one. This is the policy
    /// `ProxySession` uses for both `CONNECT host:port` targets and
    /// the host component of absolute-form URIs.
    pub fn resolve(host: &str, port: u16) -> Result<Endpoint, InvalidDestination> {
        if let Ok(addr) = host.parse::<Ipv4Addr>() {
            return Ok(Endpoint::Ipv4(addr, port));
        }

        // Bracketed IPv6 literals (`[::1]`) have already been
        // stripped of their brackets by the caller.
        if let Ok(addr) = host.parse::<Ipv6Addr>() {
            return Ok(Endpoint::Ipv6(addr, port));
        }

        Endpoint::dns(host, port)
    }

    pub fn port(&self) -> u16 {
        match self {
            Endpoint::Ipv4(_, port) => *port,
            Endpoint::Ipv6(_, port) => *port,
            Endpoint::Dns(_, port) => *port,
        }
    }

    /// Returns the length in bytes of the destination as it is
    /// represented in a SOCKS5 connect frame, address-type byte
    /// included.
    pub fn len_as_buffer(&self) -> usize {
        match self {
            Endpoint::Ipv4(_, _) => 1 + 4,
            Endpoint::Ipv6(_, _) => 1 + 16,
            Endpoint::Dns(host, _) => 1 + 1 + host.len(),
        }
    }

    /// Writes the address-type byte and address body (everything but
    /// the trailing port) into `buf`, which must be exactly
    /// [`Endpoint::len_as_buffer`] bytes long.
    pub(crate) fn write_address(&self, buf: &mut [u8]) {
        match self {
            Endpoint::Ipv4(addr, _) => {
                buf[0] = 0x01;
                buf[1..5].copy_from_slice(&addr.octets());
            }
            Endpoint::Ipv6(addr, _) => {
                buf[0] = 0x04;
                buf[1..17].copy_from_slice(&addr.octets());
            }
            Endpoint::Dns(host, _) => {
                buf[0] = 0x03;
                buf[1] = host.len() as u8;
                buf[2..2 + host.len()].copy_from_slice(host.as_bytes());
            }
        }
    }

    /// Serializes the full SOCKS5 connect-request body for this
    /// destination: address-type byte, address, and big-endian port.
    pub(crate) fn to_connect_body(&self) -> Vec<u8> {
        let addr_len = self.len_as_buffer();
        let mut buf = vec![0u8; addr_len + 2];
        self.write_address(&mut buf[..addr_len]);
        BigEndian::write_u16(&mut buf[addr_len..], self.port());
        buf
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Endpoint::Ipv4(addr, port) => write!(f, "{}:{}", addr, port),
            Endpoint::Ipv6(addr, port) => write!(f, "[{}]:{}", addr, port),
            Endpoint::Dns(host, port) => write!(f, "{}:{}", host, port),
        }
    }
}
