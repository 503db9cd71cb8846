//! Event classification for inbound protocol lines.
//!
//! A tokenized line becomes one or more [`Event`]s when its first token is
//! a valid `nick!user@host` prefix and its command token is recognized.
//! PRIVMSG yields both the generic message event and the channel/private
//! specific variant.
//!
//! Argument marker convention: the leading `:` is stripped from the first
//! token of every rest-of-line argument and from single `:`-marked
//! arguments (JOIN channel, NICK new nick), uniformly across commands.
//! The `#` channel marker is never stripped.

use tracing::debug;

use crate::prefix::Source;

/// Named event categories, used as handler registry keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// A user joined a channel.
    Join,
    /// A user left a channel.
    Part,
    /// A user was kicked from a channel.
    Kick,
    /// A channel topic changed.
    Topic,
    /// Any PRIVMSG, channel or private.
    Message,
    /// A PRIVMSG addressed to a channel.
    ChannelMessage,
    /// A PRIVMSG addressed directly to us.
    PrivateMessage,
    /// A NOTICE.
    Notice,
    /// A user changed nick.
    Nick,
}

impl EventKind {
    /// Every kind, in declaration order. Used to pre-declare registry
    /// entries.
    pub const ALL: [EventKind; 9] = [
        EventKind::Join,
        EventKind::Part,
        EventKind::Kick,
        EventKind::Topic,
        EventKind::Message,
        EventKind::ChannelMessage,
        EventKind::PrivateMessage,
        EventKind::Notice,
        EventKind::Nick,
    ];
}

/// A parsed protocol event carrying the fields its command defines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// JOIN: channel joined.
    Join {
        /// Channel name.
        channel: String,
    },
    /// PART: channel left, with an optional parting message.
    Part {
        /// Channel name.
        channel: String,
        /// Parting message; empty when absent.
        message: String,
    },
    /// KICK: someone was removed from a channel.
    Kick {
        /// Channel name.
        channel: String,
        /// Nick of the user who was kicked.
        kicked: String,
        /// Kick reason; empty when absent.
        reason: String,
    },
    /// TOPIC: channel topic changed.
    Topic {
        /// Channel name.
        channel: String,
        /// New topic text.
        topic: String,
    },
    /// Generic PRIVMSG, fired for channel and private messages alike.
    Message {
        /// Channel name or our own nick.
        target: String,
        /// Message text.
        message: String,
    },
    /// PRIVMSG addressed to a channel.
    ChannelMessage {
        /// Channel name.
        channel: String,
        /// Message text.
        message: String,
    },
    /// PRIVMSG addressed directly to us.
    PrivateMessage {
        /// Message text.
        message: String,
    },
    /// NOTICE to a channel or user.
    Notice {
        /// Channel name or nick the notice was addressed to.
        target: String,
        /// Notice text.
        message: String,
    },
    /// NICK: a user changed nick.
    Nick {
        /// The new nick.
        new_nick: String,
    },
}

impl Event {
    /// The registry key for this event.
    pub fn kind(&self) -> EventKind {
        match self {
            Event::Join { .. } => EventKind::Join,
            Event::Part { .. } => EventKind::Part,
            Event::Kick { .. } => EventKind::Kick,
            Event::Topic { .. } => EventKind::Topic,
            Event::Message { .. } => EventKind::Message,
            Event::ChannelMessage { .. } => EventKind::ChannelMessage,
            Event::PrivateMessage { .. } => EventKind::PrivateMessage,
            Event::Notice { .. } => EventKind::Notice,
            Event::Nick { .. } => EventKind::Nick,
        }
    }
}

/// A line that parsed into a source identity and its events.
///
/// `events` holds one entry for most commands and two for PRIVMSG
/// (generic message first, then the channel/private variant).
#[derive(Debug, Clone)]
pub struct ParsedLine {
    /// Who originated the line.
    pub source: Source,
    /// The events to dispatch, in firing order.
    pub events: Vec<Event>,
}

/// Strip the leading `:` argument marker from a single token.
fn strip_marker(token: &str) -> String {
    token.strip_prefix(':').unwrap_or(token).to_string()
}

/// Join remaining tokens into one space-separated argument, stripping the
/// leading `:` marker.
fn join_rest(tokens: &[String]) -> String {
    let joined = tokens.join(" ");
    joined.strip_prefix(':').unwrap_or(&joined).to_string()
}

/// Parse a tokenized inbound line into dispatchable events.
///
/// Returns `None` when the first token is not a `:`-marked source prefix
/// matching `nick!user@host` (silent drop), when the command is missing
/// required arguments, or when the command is unrecognized (logged at
/// debug level). Never fails loudly; the dispatcher survives any input.
pub fn parse_line(tokens: &[String]) -> Option<ParsedLine> {
    let prefix = tokens.first()?.strip_prefix(':')?;
    let source = Source::parse(prefix)?;
    let command = tokens.get(1)?;

    let events = match command.as_str() {
        "JOIN" => vec![Event::Join {
            channel: strip_marker(tokens.get(2)?),
        }],
        "PART" => vec![Event::Part {
            channel: tokens.get(2)?.clone(),
            message: join_rest(&tokens[3..]),
        }],
        "KICK" => vec![Event::Kick {
            channel: tokens.get(2)?.clone(),
            kicked: tokens.get(3)?.clone(),
            reason: join_rest(&tokens[4..]),
        }],
        "TOPIC" => vec![Event::Topic {
            channel: tokens.get(2)?.clone(),
            topic: join_rest(&tokens[3..]),
        }],
        "PRIVMSG" => {
            let target = tokens.get(2)?.clone();
            let message = join_rest(&tokens[3..]);
            let specific = if target.starts_with('#') {
                Event::ChannelMessage {
                    channel: target.clone(),
                    message: message.clone(),
                }
            } else {
                Event::PrivateMessage {
                    message: message.clone(),
                }
            };
            // Generic message first, then the specific variant.
            vec![Event::Message { target, message }, specific]
        }
        "NOTICE" => vec![Event::Notice {
            target: tokens.get(2)?.clone(),
            message: join_rest(&tokens[3..]),
        }],
        "NICK" => vec![Event::Nick {
            new_nick: strip_marker(tokens.get(2)?),
        }],
        other => {
            debug!(command = %other, "unrecognized command, dropping line");
            return None;
        }
    };

    Some(ParsedLine { source, events })
}
