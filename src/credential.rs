use base64::{engine::general_purpose::STANDARD, Engine};

/// The inbound-side credential: the Base64 token a client must
/// present in `Proxy-Authorization: Basic <token>` for
/// [`crate::session::ProxySession`] to let the request through.
///
/// Encoded once, at configuration time, from a raw `user:pass` pair —
/// never re-derived per request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundCredential {
    token: String,
}

impl InboundCredential {
    pub fn from_user_pass(username: &str, password: &str) -> InboundCredential {
        let raw = format!("{}:{}", username, password);
        InboundCredential {
            token: STANDARD.encode(raw.as_bytes()),
        }
    }

    /// The exact Base64 token expected after `Basic `.
    pub fn token(&self) -> &str {
        &self.token
    }
}

/// The outbound-side credential: a pre-serialized SOCKS5
/// username/password sub-negotiation packet (RFC 1929), built once
/// and replayed for every connect.
///
/// Layout: `0x01, usernameLen, username, passwordLen, password`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundCredential {
    packet: Vec<u8>,
}

/// Returned when a username or password is longer than the 255-byte
/// field the SOCKS5 sub-negotiation packet allows.
#[derive(Debug)]
pub struct CredentialTooLong;

impl std::fmt::Display for CredentialTooLong {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str("username or password exceeds 255 bytes")
    }
}

impl std::error::Error for CredentialTooLong {}

impl OutboundCredential {
    pub fn from_user_pass(
        username: &str,
        password: &str,
    ) -> Result<OutboundCredential, CredentialTooLong> {
        if username.len() > 255 || password.len() > 255 {
            return Err(CredentialTooLong);
        }

        let mut packet = Vec::with_capacity(2 + username.len() + password.len() + 1);
        packet.push(0x01);
        packet.push(username.len() as u8);
        packet.extend_from_slice(username.as_bytes());
        packet.push(password.len() as u8);
        packet.extend_from_slice(password.as_bytes());

        Ok(OutboundCredential { packet })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.packet
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inbound_credential_matches_known_vector() {
        let cred = InboundCredential::from_user_pass("u", "p");
        assert_eq!(cred.token(), "dTpw");
    }

    #[test]
    fn outbound_credential_serializes_per_rfc1929() {
        let cred = OutboundCredential::from_user_pass("u", "p").unwrap();
        assert_eq!(cred.as_bytes(), &[0x01, 0x01, b'u', 0x01, b'p']);
    }

    #[test]
    fn outbound_credential_rejects_oversized_fields() {
        let long = "a".repeat(256);
        assert!(OutboundCredential::from_user_pass(&long, "p").is_err());
    }
}
