use crate::credential::{InboundCredential, OutboundCredential};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::Path;

fn default_backlog() -> u32 {
    1024
}

/// The on-disk shape of the configuration file, deserialized directly
/// by `serde` + `toml` before [`Config::from_raw`] validates and
/// normalizes it.
#[derive(Debug, Deserialize)]
struct RawConfig {
    listen_addr: String,
    #[serde(default = "default_backlog")]
    backlog: u32,
    outbound_addr: String,
    inbound_credential: Option<(String, String)>,
    outbound_credential: Option<(String, String)>,
}

/// Validated, process-wide configuration: where to listen, where to
/// forward, the connection backlog, and the optional inbound/outbound
/// credentials. Immutable once loaded; held behind an `Arc` and shared
/// read-only across accepted connections.
#[derive(Debug, Clone)]
pub struct Config {
    pub listen_addr: SocketAddr,
    pub backlog: u32,
    pub outbound_addr: SocketAddr,
    pub inbound_credential: Option<InboundCredential>,
    pub outbound_credential: Option<OutboundCredential>,
}

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    InvalidAddress(String),
    CredentialTooLong,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "could not read config file: {}", e),
            ConfigError::Parse(e) => write!(f, "could not parse config file: {}", e),
            ConfigError::InvalidAddress(addr) => write!(f, "invalid socket address: {}", addr),
            ConfigError::CredentialTooLong => {
                f.write_str("configured username or password exceeds 255 bytes")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl Config {
    pub fn load(path: &Path) -> Result<Config, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        Config::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Config, ConfigError> {
        let raw: RawConfig = toml::from_str(contents).map_err(ConfigError::Parse)?;
        Config::from_raw(raw)
    }

    fn from_raw(raw: RawConfig) -> Result<Config, ConfigError> {
        let listen_addr = raw
            .listen_addr
            .parse()
            .map_err(|_| ConfigError::InvalidAddress(raw.listen_addr.clone()))?;
        let outbound_addr = raw
            .outbound_addr
            .parse()
            .map_err(|_| ConfigError::InvalidAddress(raw.outbound_addr.clone()))?;

        let inbound_credential = raw
            .inbound_credential
            .map(|(user, pass)| InboundCredential::from_user_pass(&user, &pass));

        let outbound_credential = raw
            .outbound_credential
            .map(|(user, pass)| OutboundCredential::from_user_pass(&user, &pass))
            .transpose()
            .map_err(|_| ConfigError::CredentialTooLong)?;

        Ok(Config {
            listen_addr,
            backlog: raw.backlog,
            outbound_addr,
            inbound_credential,
            outbound_credential,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_minimal_document() {
        let document = r#"
            listen_addr = "127.0.0.1:8080"
            outbound_addr = "127.0.0.1:1080"
        "#;

        let config = Config::from_toml_str(document).unwrap();
        assert_eq!(config.listen_addr, "127.0.0.1:8080".parse().unwrap());
        assert_eq!(config.outbound_addr, "127.0.0.1:1080".parse().unwrap());
        assert_eq!(config.backlog, 1024);
        assert!(config.inbound_credential.is_none());
        assert!(config.outbound_credential.is_none());
    }

    #[test]
    fn encodes_the_inbound_credential_exactly_once() {
        let document = r#"
            listen_addr = "127.0.0.1:8080"
            outbound_addr = "127.0.0.1:1080"
            inbound_credential = ["u", "p"]
        "#;

        let config = Config::from_toml_str(document).unwrap();
        assert_eq!(config.inbound_credential.unwrap().token(), "dTpw");
    }

    #[test]
    fn rejects_an_invalid_listen_address() {
        let document = r#"
            listen_addr = "not-an-address"
            outbound_addr = "127.0.0.1:1080"
        "#;

        assert!(matches!(
            Config::from_toml_str(document),
            Err(ConfigError::InvalidAddress(_))
        ));
    }

    #[test]
    fn respects_an_explicit_backlog() {
        let document = r#"
            listen_addr = "127.0.0.1:8080"
            outbound_addr = "127.0.0.1:1080"
            backlog = 256
        "#;

        let config = Config::from_toml_str(document).unwrap();
        assert_eq!(config.backlog, 256);
    }
}
