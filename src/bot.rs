//! Event-dispatch layer atop the raw client.
//!
//! The dispatcher runs in its own task, blocking on the inbound queue and
//! interruptible by the client's stop signal. For each dequeued line it
//! parses a source identity and command, then fires every handler
//! registered for the resulting event kind, in registration order, on the
//! dispatcher task. Lines it cannot parse are dropped; handler panics are
//! isolated per callback.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::client::Client;
use crate::config::Config;
use crate::error::ClientError;
use crate::event::{parse_line, Event, EventKind};
use crate::handler::{Handler, Registry};
use crate::prefix::Source;

/// An IRC client with a handler registry and a dispatcher loop.
///
/// Handler notation:
/// - `on_join(source, channel)`
/// - `on_part(source, channel, message)`
/// - `on_kick(source, channel, kicked, reason)`
/// - `on_topic(source, channel, topic)`
/// - `on_message(source, target, message)` - fires for every PRIVMSG
/// - `on_channel_message(source, channel, message)`
/// - `on_private_message(source, message)`
/// - `on_notice(source, target, message)`
/// - `on_nick(source, new_nick)`
///
/// A channel PRIVMSG fires `on_message` handlers and then
/// `on_channel_message` handlers; a private one fires `on_message` and
/// then `on_private_message`.
pub struct Bot {
    client: Arc<Client>,
    registry: Arc<Registry>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
}

impl Bot {
    /// Connect and start the dispatcher alongside the client's I/O loops.
    pub async fn connect(config: Config) -> Result<Self, ClientError> {
        let client = Arc::new(Client::connect(config).await?);
        let registry = Arc::new(Registry::new());
        let dispatcher = tokio::spawn(dispatch_loop(client.clone(), registry.clone()));

        Ok(Self {
            client,
            registry,
            dispatcher: Mutex::new(Some(dispatcher)),
        })
    }

    /// The underlying raw client, for sending traffic.
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Register a callback for an event kind and get it back.
    ///
    /// Callbacks fire in registration order and are never removed.
    pub fn on(&self, kind: EventKind, handler: Handler) -> Handler {
        self.registry.register(kind, handler)
    }

    /// Register a callback for channel joins.
    pub fn on_join(&self, f: impl Fn(&Source, &str) + Send + Sync + 'static) {
        self.on(
            EventKind::Join,
            Arc::new(move |source, event| {
                if let Event::Join { channel } = event {
                    f(source, channel);
                }
            }),
        );
    }

    /// Register a callback for channel parts.
    pub fn on_part(&self, f: impl Fn(&Source, &str, &str) + Send + Sync + 'static) {
        self.on(
            EventKind::Part,
            Arc::new(move |source, event| {
                if let Event::Part { channel, message } = event {
                    f(source, channel, message);
                }
            }),
        );
    }

    /// Register a callback for kicks.
    pub fn on_kick(&self, f: impl Fn(&Source, &str, &str, &str) + Send + Sync + 'static) {
        self.on(
            EventKind::Kick,
            Arc::new(move |source, event| {
                if let Event::Kick {
                    channel,
                    kicked,
                    reason,
                } = event
                {
                    f(source, channel, kicked, reason);
                }
            }),
        );
    }

    /// Register a callback for topic changes.
    pub fn on_topic(&self, f: impl Fn(&Source, &str, &str) + Send + Sync + 'static) {
        self.on(
            EventKind::Topic,
            Arc::new(move |source, event| {
                if let Event::Topic { channel, topic } = event {
                    f(source, channel, topic);
                }
            }),
        );
    }

    /// Register a callback for every PRIVMSG, channel or private.
    pub fn on_message(&self, f: impl Fn(&Source, &str, &str) + Send + Sync + 'static) {
        self.on(
            EventKind::Message,
            Arc::new(move |source, event| {
                if let Event::Message { target, message } = event {
                    f(source, target, message);
                }
            }),
        );
    }

    /// Register a callback for channel messages.
    pub fn on_channel_message(&self, f: impl Fn(&Source, &str, &str) + Send + Sync + 'static) {
        self.on(
            EventKind::ChannelMessage,
            Arc::new(move |source, event| {
                if let Event::ChannelMessage { channel, message } = event {
                    f(source, channel, message);
                }
            }),
        );
    }

    /// Register a callback for private messages.
    pub fn on_private_message(&self, f: impl Fn(&Source, &str) + Send + Sync + 'static) {
        self.on(
            EventKind::PrivateMessage,
            Arc::new(move |source, event| {
                if let Event::PrivateMessage { message } = event {
                    f(source, message);
                }
            }),
        );
    }

    /// Register a callback for notices.
    pub fn on_notice(&self, f: impl Fn(&Source, &str, &str) + Send + Sync + 'static) {
        self.on(
            EventKind::Notice,
            Arc::new(move |source, event| {
                if let Event::Notice { target, message } = event {
                    f(source, target, message);
                }
            }),
        );
    }

    /// Register a callback for nick changes.
    pub fn on_nick(&self, f: impl Fn(&Source, &str) + Send + Sync + 'static) {
        self.on(
            EventKind::Nick,
            Arc::new(move |source, event| {
                if let Event::Nick { new_nick } = event {
                    f(source, new_nick);
                }
            }),
        );
    }

    /// Stop the client's loops and wait for the dispatcher to exit.
    pub async fn stop(&self) {
        self.client.stop().await;
        let handle = self.dispatcher.lock().take();
        if let Some(handle) = handle {
            if handle.await.is_err() {
                warn!("dispatcher task did not shut down cleanly");
            }
        }
    }
}

/// Drain the inbound queue and fire handlers for every line that parses.
///
/// Lines with no valid source prefix are dropped silently; unrecognized
/// commands are logged inside the parser. Exits on the stop signal or
/// when the inbound queue closes.
async fn dispatch_loop(client: Arc<Client>, registry: Arc<Registry>) {
    info!("dispatch loop started");
    let mut shutdown = client.shutdown_signal();
    loop {
        tokio::select! {
            _ = shutdown.recv() => break,
            line = client.next_line() => {
                let Some(tokens) = line else { break };
                if let Some(parsed) = parse_line(&tokens) {
                    for event in &parsed.events {
                        registry.dispatch(&parsed.source, event);
                    }
                }
            }
        }
    }
    info!("dispatch loop stopped");
}
