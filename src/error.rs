//! Error types for the client library.
//!
//! Connection establishment is the only operation that surfaces errors to
//! the caller. Steady-state loop failures (transient reads/writes, bad
//! lines, panicking handlers) are logged and recovered internally.

use thiserror::Error;

/// Convenience type alias for Results using [`ClientError`].
pub type Result<T, E = ClientError> = std::result::Result<T, E>;

/// Errors surfaced while establishing or using a connection.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ClientError {
    /// I/O error while connecting or during the handshake.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// TLS negotiation failure.
    #[error("tls error: {0}")]
    Tls(#[from] tokio_rustls::rustls::Error),

    /// The configured host is not a valid TLS server name.
    #[error("invalid server name for TLS: {0}")]
    InvalidServerName(String),

    /// The outbound queue is closed; the send loop has exited.
    #[error("outbound queue closed")]
    QueueClosed,
}

/// Errors loading a [`crate::Config`] from disk.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// Could not read the config file.
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// The file was not valid TOML for a config.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}
