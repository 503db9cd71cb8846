//! Source prefix parsing.
//!
//! The leading token of an addressed IRC line identifies the originating
//! entity as `nick!user@host`. Lines whose prefix does not match this
//! grammar (server names, numerics, bare commands) are not dispatched as
//! events.

/// Identity of the entity that originated a line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    /// Nickname.
    pub nick: String,
    /// Username (ident).
    pub user: String,
    /// Hostname; any remaining text after the `@`.
    pub host: String,
}

/// Characters allowed in the nick and user components.
fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric()
        || matches!(
            c,
            '[' | ']' | '{' | '}' | '|' | '^' | '-' | '_' | '~' | '<' | '>'
        )
}

impl Source {
    /// Parse a `nick!user@host` prefix token.
    ///
    /// The leading `:` addressing marker must already be stripped. Returns
    /// `None` unless all three components are present, with nick and user
    /// drawn from the allowed symbol set.
    pub fn parse(s: &str) -> Option<Self> {
        let (nick, rest) = s.split_once('!')?;
        let (user, host) = rest.split_once('@')?;

        if nick.is_empty() || user.is_empty() || host.is_empty() {
            return None;
        }
        if !nick.chars().all(is_name_char) || !user.chars().all(is_name_char) {
            return None;
        }

        Some(Self {
            nick: nick.to_string(),
            user: user.to_string(),
            host: host.to_string(),
        })
    }
}
