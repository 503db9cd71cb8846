//! # airc
//!
//! An asynchronous, line-oriented IRC client library.
//!
//! The connection engine decouples socket I/O from application logic with
//! two bounded queues and cooperating tokio tasks:
//!
//! ```text
//! wire ──▶ receive loop ──▶ line framer ──▶ (keep-alive reply | inbound queue)
//!                                                                  │
//!                                          event dispatcher ◀──────┘
//!                                                │
//!                                        registered handlers
//!
//! raw()/helpers ──▶ outbound queue ──▶ send loop ──▶ wire
//! ```
//!
//! [`Client`] exposes the raw-line interface (send a line, take the next
//! tokenized line); [`Bot`] layers an event-dispatch system on top so
//! application code reacts to named events (join, message, notice, ...)
//! without handling framing or parsing itself.
//!
//! The library favors availability over strict correctness: malformed
//! inbound lines and panicking handlers are logged and survived, and only
//! connection establishment surfaces an error to the caller.
//!
//! ## Quick start
//!
//! ```no_run
//! use airc::{Bot, Config};
//!
//! # async fn run() -> Result<(), airc::ClientError> {
//! let config = Config::new("irc.libera.chat")
//!     .port(6697)
//!     .tls(true)
//!     .nick("examplebot");
//!
//! let bot = Bot::connect(config).await?;
//! bot.on_channel_message(|source, channel, message| {
//!     println!("[{channel}] <{}> {message}", source.nick);
//! });
//! bot.client().join("#rust", None).await?;
//! # Ok(())
//! # }
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod bot;
pub mod client;
pub mod config;
pub mod error;
pub mod event;
pub mod handler;
pub mod line;
pub mod prefix;
pub mod transport;

pub use self::bot::Bot;
pub use self::client::{Client, ConnState};
pub use self::config::Config;
pub use self::error::{ClientError, ConfigError};
pub use self::event::{Event, EventKind, ParsedLine};
pub use self::handler::{Handler, Registry};
pub use self::line::LineCodec;
pub use self::prefix::Source;
pub use self::transport::TransportStream;
