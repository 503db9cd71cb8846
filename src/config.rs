//! Client configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

fn default_port() -> u16 {
    6667
}

fn default_nick() -> String {
    "unconfigured".to_string()
}

fn default_ident() -> String {
    "airc".to_string()
}

fn default_realname() -> String {
    "airc client".to_string()
}

/// Connection settings, immutable after construction.
///
/// Consumed by [`crate::Client::connect`]; none of the fields are re-read
/// after the connection is established.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Hostname or IP of the server to connect to.
    pub host: String,
    /// Port the server is listening on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Nickname for the connection.
    #[serde(default = "default_nick")]
    pub nick: String,
    /// Client identification string.
    #[serde(default = "default_ident")]
    pub ident: String,
    /// Real name (not important, but required by the handshake).
    #[serde(default = "default_realname")]
    pub realname: String,
    /// Server password, if required.
    #[serde(default)]
    pub password: Option<String>,
    /// Negotiate TLS on connect.
    #[serde(default)]
    pub use_tls: bool,
}

impl Config {
    /// Create a config for the given host with default settings.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: default_port(),
            nick: default_nick(),
            ident: default_ident(),
            realname: default_realname(),
            password: None,
            use_tls: false,
        }
    }

    /// Load a config from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&raw)?)
    }

    /// Set the server port.
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the nickname.
    pub fn nick(mut self, nick: impl Into<String>) -> Self {
        self.nick = nick.into();
        self
    }

    /// Set the ident string.
    pub fn ident(mut self, ident: impl Into<String>) -> Self {
        self.ident = ident.into();
        self
    }

    /// Set the real name.
    pub fn realname(mut self, realname: impl Into<String>) -> Self {
        self.realname = realname.into();
        self
    }

    /// Set the server password.
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Enable or disable TLS.
    pub fn tls(mut self, use_tls: bool) -> Self {
        self.use_tls = use_tls;
        self
    }
}
