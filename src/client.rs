//! Connection manager and the concurrent I/O engine.
//!
//! Each connection runs two tokio tasks communicating with application
//! code exclusively through bounded queues and one stop signal:
//!
//! ```text
//!   raw() ──▶ [Outbound Queue] ──▶ Send Loop ──▶ wire
//!                    ▲
//!                    │ keep-alive reply
//!   wire ──▶ Receive Loop ──▶ Line Processor ──▶ [Inbound Queue]
//!                                                      │
//!                                         next_line() / dispatcher
//! ```
//!
//! The send loop drains the outbound queue in strict FIFO order; the
//! receive loop frames bytes into lines, answers keep-alive probes
//! inline, and queues everything else for consumption. Both loops exit
//! cooperatively on the shared stop signal, and [`Client::stop`] waits
//! for them before returning, so nothing touches the connection after
//! teardown.

use std::io;

use futures_util::{Sink, SinkExt, Stream, StreamExt};
use parking_lot::Mutex;
use tokio::io::split;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::ClientError;
use crate::line::LineCodec;
use crate::transport::TransportStream;

/// Depth of the outbound and inbound queues.
const QUEUE_DEPTH: usize = 64;

/// Pause before retrying a write that would block.
const RETRY_DELAY: Duration = Duration::from_millis(10);

/// Connection lifecycle states, owned by the [`Client`]. The loops read
/// the stop signal but never mutate lifecycle state themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    /// No transport established yet.
    Unconnected,
    /// Loops running, traffic flowing.
    Running,
    /// Stop requested, loops winding down.
    Stopping,
    /// All loops joined, connection torn down.
    Stopped,
}

/// Asynchronous, line-oriented IRC client.
///
/// Created by [`Client::connect`], which establishes the transport,
/// spawns the I/O loops, and performs the registration handshake. All
/// outbound traffic, including the handshake and convenience helpers,
/// goes through [`Client::raw`].
pub struct Client {
    config: Config,
    out_tx: mpsc::Sender<String>,
    inbound: tokio::sync::Mutex<mpsc::Receiver<Vec<String>>>,
    shutdown_tx: broadcast::Sender<()>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    state: Mutex<ConnState>,
}

impl Client {
    /// Connect to the configured server, start the I/O loops, and send
    /// the registration handshake (PASS if configured, NICK, USER).
    ///
    /// This is the only operation that surfaces errors to the caller;
    /// once running, loop failures are logged and recovered internally.
    pub async fn connect(config: Config) -> Result<Self, ClientError> {
        let stream = TransportStream::connect(&config.host, config.port, config.use_tls).await?;
        let (read_half, write_half) = split(stream);
        let reader = FramedRead::new(read_half, LineCodec::new());
        let writer = FramedWrite::new(write_half, LineCodec::new());

        let (out_tx, out_rx) = mpsc::channel(QUEUE_DEPTH);
        let (in_tx, in_rx) = mpsc::channel(QUEUE_DEPTH);
        let (shutdown_tx, _) = broadcast::channel(4);

        let tasks = vec![
            tokio::spawn(send_loop(writer, out_rx, shutdown_tx.subscribe())),
            tokio::spawn(receive_loop(
                reader,
                out_tx.clone(),
                in_tx,
                shutdown_tx.subscribe(),
            )),
        ];

        let client = Self {
            config,
            out_tx,
            inbound: tokio::sync::Mutex::new(in_rx),
            shutdown_tx,
            tasks: Mutex::new(tasks),
            state: Mutex::new(ConnState::Running),
        };

        client.handshake().await?;
        info!(host = %client.config.host, port = client.config.port, "connected");
        Ok(client)
    }

    async fn handshake(&self) -> Result<(), ClientError> {
        if let Some(password) = &self.config.password {
            self.raw(format!("PASS {password}")).await?;
        }
        self.raw(format!("NICK {}", self.config.nick)).await?;
        self.raw(format!(
            "USER {} {} localhost :{}",
            self.config.ident, self.config.host, self.config.realname
        ))
        .await?;
        Ok(())
    }

    /// Queue a raw line for transmission.
    ///
    /// This is the sole boundary for outbound traffic. The line is
    /// normalized to end in exactly one CRLF before it enters the queue.
    pub async fn raw(&self, line: impl Into<String>) -> Result<(), ClientError> {
        self.out_tx
            .send(normalize(line.into()))
            .await
            .map_err(|_| ClientError::QueueClosed)
    }

    /// Join a channel, prepending `#` when missing.
    pub async fn join(&self, channel: &str, key: Option<&str>) -> Result<(), ClientError> {
        let channel = if channel.starts_with('#') {
            channel.to_string()
        } else {
            format!("#{channel}")
        };
        match key {
            Some(key) => self.raw(format!("JOIN {channel} {key}")).await,
            None => self.raw(format!("JOIN {channel}")).await,
        }
    }

    /// Send a PRIVMSG to a channel or nick.
    pub async fn privmsg(&self, target: &str, message: &str) -> Result<(), ClientError> {
        self.raw(format!("PRIVMSG {target} :{message}")).await
    }

    /// Send a NOTICE to a channel or nick.
    pub async fn notice(&self, target: &str, message: &str) -> Result<(), ClientError> {
        self.raw(format!("NOTICE {target} :{message}")).await
    }

    /// Take the next tokenized inbound line.
    ///
    /// Returns `None` once the connection has closed and the queue has
    /// drained. Keep-alive probes never appear here.
    pub async fn next_line(&self) -> Option<Vec<String>> {
        self.inbound.lock().await.recv().await
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnState {
        *self.state.lock()
    }

    /// Subscribe to the stop signal. Used by the dispatcher loop.
    pub(crate) fn shutdown_signal(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    /// Enqueue a QUIT, signal the loops to stop, and wait for every loop
    /// task to exit before returning.
    pub async fn stop(&self) {
        *self.state.lock() = ConnState::Stopping;

        if self.raw("QUIT").await.is_err() {
            debug!("send loop already gone, skipping QUIT");
        }
        let _ = self.shutdown_tx.send(());

        let handles: Vec<JoinHandle<()>> = self.tasks.lock().drain(..).collect();
        for handle in handles {
            if handle.await.is_err() {
                warn!("loop task did not shut down cleanly");
            }
        }

        *self.state.lock() = ConnState::Stopped;
        info!("client stopped");
    }
}

/// Normalize a line to end in exactly one CRLF.
pub(crate) fn normalize(mut line: String) -> String {
    while line.ends_with('\n') || line.ends_with('\r') {
        line.pop();
    }
    line.push_str("\r\n");
    line
}

/// Action the receive loop takes for one framed line.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum LineAction {
    /// Enqueue a keep-alive reply; the line does not reach the inbound
    /// queue.
    Reply(String),
    /// Push the tokenized line onto the inbound queue.
    Forward(Vec<String>),
    /// Blank line, nothing to do.
    Skip,
}

/// Classify one framed line.
///
/// Keep-alive probes are answered immediately with the probe's argument
/// (leading `:` marker stripped); everything else is tokenized and queued
/// unconditionally - the dispatcher discards what it cannot parse.
pub(crate) fn process_line(line: &str) -> LineAction {
    let tokens: Vec<String> = line.split_whitespace().map(str::to_string).collect();
    match tokens.first().map(String::as_str) {
        None => LineAction::Skip,
        Some("PING") => {
            let reply = match tokens.get(1) {
                Some(arg) => format!("PONG {}", arg.strip_prefix(':').unwrap_or(arg)),
                None => "PONG".to_string(),
            };
            LineAction::Reply(reply)
        }
        Some(_) => LineAction::Forward(tokens),
    }
}

/// Write one line to the sink, retrying as long as the write would block.
///
/// The same item is retried in place, so later queue entries can never
/// overtake it. Non-transient errors are returned to the caller.
async fn send_one<S>(sink: &mut S, line: String) -> io::Result<()>
where
    S: Sink<String, Error = io::Error> + Unpin,
{
    loop {
        match sink.send(line.clone()).await {
            Ok(()) => return Ok(()),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => sleep(RETRY_DELAY).await,
            Err(e) => return Err(e),
        }
    }
}

/// Drain the outbound queue into the connection, strictly in order.
///
/// Runs until the stop signal is observed or the queue closes. On stop,
/// already-queued lines are flushed first so a trailing QUIT reaches the
/// wire. A failed write is logged and the loop moves on; one bad write
/// never kills the send path.
pub(crate) async fn send_loop<S>(
    mut sink: S,
    mut out_rx: mpsc::Receiver<String>,
    mut shutdown: broadcast::Receiver<()>,
) where
    S: Sink<String, Error = io::Error> + Unpin,
{
    info!("send loop started");
    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                while let Ok(line) = out_rx.try_recv() {
                    if let Err(e) = send_one(&mut sink, line).await {
                        warn!(error = %e, "write failed during drain");
                        break;
                    }
                }
                break;
            }
            item = out_rx.recv() => {
                let Some(line) = item else { break };
                if let Err(e) = send_one(&mut sink, line).await {
                    warn!(error = %e, "write failed, dropping line");
                }
            }
        }
    }
    info!("send loop stopped");
}

/// Read framed lines from the connection until the stop signal or EOF.
///
/// Keep-alive probes are answered via the outbound queue; every other
/// line is tokenized onto the inbound queue. Read errors are logged and
/// the loop keeps going - only an explicit stop or a closed connection
/// terminates it.
pub(crate) async fn receive_loop<R>(
    mut lines: R,
    out_tx: mpsc::Sender<String>,
    in_tx: mpsc::Sender<Vec<String>>,
    mut shutdown: broadcast::Receiver<()>,
) where
    R: Stream<Item = io::Result<String>> + Unpin,
{
    info!("receive loop started");
    loop {
        tokio::select! {
            _ = shutdown.recv() => break,
            next = lines.next() => match next {
                Some(Ok(line)) => {
                    debug!(line = %line, "received");
                    match process_line(&line) {
                        LineAction::Reply(reply) => {
                            if out_tx.send(normalize(reply)).await.is_err() {
                                break;
                            }
                        }
                        LineAction::Forward(tokens) => {
                            if in_tx.send(tokens).await.is_err() {
                                break;
                            }
                        }
                        LineAction::Skip => {}
                    }
                }
                Some(Err(e)) => warn!(error = %e, "read error"),
                None => {
                    info!("connection closed by peer");
                    break;
                }
            }
        }
    }
    info!("receive loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::pin::Pin;
    use std::sync::{Arc, Mutex};
    use std::task::{Context, Poll};

    #[test]
    fn test_normalize_appends_single_crlf() {
        assert_eq!(normalize("NICK a".to_string()), "NICK a\r\n");
        assert_eq!(normalize("NICK a\r\n".to_string()), "NICK a\r\n");
        assert_eq!(normalize("NICK a\n".to_string()), "NICK a\r\n");
        assert_eq!(normalize("NICK a\r\n\r\n".to_string()), "NICK a\r\n");
    }

    #[test]
    fn test_process_line_answers_ping() {
        assert_eq!(
            process_line("PING :token123"),
            LineAction::Reply("PONG token123".to_string())
        );
        assert_eq!(
            process_line("PING irc.example.com"),
            LineAction::Reply("PONG irc.example.com".to_string())
        );
        assert_eq!(process_line("PING"), LineAction::Reply("PONG".to_string()));
    }

    #[test]
    fn test_process_line_forwards_everything_else() {
        assert_eq!(
            process_line(":a!b@c JOIN :#test"),
            LineAction::Forward(vec![
                ":a!b@c".to_string(),
                "JOIN".to_string(),
                ":#test".to_string()
            ])
        );
        // Unparseable lines are still forwarded; the dispatcher drops them.
        assert_eq!(
            process_line("garbage line"),
            LineAction::Forward(vec!["garbage".to_string(), "line".to_string()])
        );
    }

    #[test]
    fn test_process_line_skips_blank() {
        assert_eq!(process_line(""), LineAction::Skip);
        assert_eq!(process_line("   "), LineAction::Skip);
    }

    /// Sink that rejects the first `failures_left` writes with WouldBlock.
    struct FlakySink {
        failures_left: usize,
        sent: Arc<Mutex<Vec<String>>>,
    }

    impl Sink<String> for FlakySink {
        type Error = io::Error;

        fn poll_ready(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn start_send(mut self: Pin<&mut Self>, item: String) -> io::Result<()> {
            if self.failures_left > 0 {
                self.failures_left -= 1;
                return Err(io::Error::new(io::ErrorKind::WouldBlock, "would block"));
            }
            self.sent.lock().unwrap().push(item);
            Ok(())
        }

        fn poll_flush(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_close(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn test_send_fifo_preserved_under_retry() {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let sink = FlakySink {
            failures_left: 3,
            sent: sent.clone(),
        };
        let (out_tx, out_rx) = mpsc::channel(8);
        let (shutdown_tx, _) = broadcast::channel(1);

        for line in ["one\r\n", "two\r\n", "three\r\n"] {
            out_tx.send(line.to_string()).await.unwrap();
        }
        // Closing the queue lets the loop exit once it has drained.
        drop(out_tx);

        send_loop(sink, out_rx, shutdown_tx.subscribe()).await;

        assert_eq!(
            *sent.lock().unwrap(),
            vec![
                "one\r\n".to_string(),
                "two\r\n".to_string(),
                "three\r\n".to_string()
            ]
        );
    }

    #[tokio::test]
    async fn test_send_loop_survives_hard_write_error() {
        struct BrokenOnceSink {
            failed: bool,
            sent: Arc<Mutex<Vec<String>>>,
        }

        impl Sink<String> for BrokenOnceSink {
            type Error = io::Error;

            fn poll_ready(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<io::Result<()>> {
                Poll::Ready(Ok(()))
            }

            fn start_send(mut self: Pin<&mut Self>, item: String) -> io::Result<()> {
                if !self.failed {
                    self.failed = true;
                    return Err(io::Error::new(io::ErrorKind::BrokenPipe, "broken"));
                }
                self.sent.lock().unwrap().push(item);
                Ok(())
            }

            fn poll_flush(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<io::Result<()>> {
                Poll::Ready(Ok(()))
            }

            fn poll_close(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<io::Result<()>> {
                Poll::Ready(Ok(()))
            }
        }

        let sent = Arc::new(Mutex::new(Vec::new()));
        let sink = BrokenOnceSink {
            failed: false,
            sent: sent.clone(),
        };
        let (out_tx, out_rx) = mpsc::channel(8);
        let (shutdown_tx, _) = broadcast::channel(1);

        out_tx.send("lost\r\n".to_string()).await.unwrap();
        out_tx.send("kept\r\n".to_string()).await.unwrap();
        drop(out_tx);

        send_loop(sink, out_rx, shutdown_tx.subscribe()).await;

        // The failed line is dropped, the loop keeps running.
        assert_eq!(*sent.lock().unwrap(), vec!["kept\r\n".to_string()]);
    }

    #[tokio::test]
    async fn test_receive_loop_routes_ping_and_lines() {
        let input = futures_util::stream::iter(vec![
            Ok("PING :token123".to_string()),
            Ok(":alice!a@host JOIN :#test".to_string()),
            Err(io::Error::other("transient")),
            Ok(":bob!b@host PRIVMSG #test :hi".to_string()),
        ]);
        let (out_tx, mut out_rx) = mpsc::channel(8);
        let (in_tx, mut in_rx) = mpsc::channel(8);
        let (shutdown_tx, _) = broadcast::channel(1);

        receive_loop(input, out_tx, in_tx, shutdown_tx.subscribe()).await;

        // Exactly one keep-alive reply, already normalized.
        assert_eq!(out_rx.recv().await, Some("PONG token123\r\n".to_string()));
        assert!(out_rx.try_recv().is_err());

        // The PING never reached the inbound queue; the read error was
        // survived and the line after it still arrived.
        let first = in_rx.recv().await.unwrap();
        assert_eq!(first[1], "JOIN");
        let second = in_rx.recv().await.unwrap();
        assert_eq!(second[1], "PRIVMSG");
        assert!(in_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_send_loop_drains_queue_on_shutdown() {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let sink = FlakySink {
            failures_left: 0,
            sent: sent.clone(),
        };
        let (out_tx, out_rx) = mpsc::channel(8);
        let (shutdown_tx, _) = broadcast::channel(1);
        let shutdown_rx = shutdown_tx.subscribe();

        out_tx.send("QUIT\r\n".to_string()).await.unwrap();
        shutdown_tx.send(()).unwrap();

        send_loop(sink, out_rx, shutdown_rx).await;

        assert_eq!(*sent.lock().unwrap(), vec!["QUIT\r\n".to_string()]);
    }
}
