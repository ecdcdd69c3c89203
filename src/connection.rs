//! Manager session management
//!
//! One authenticated socket, reused while it answers a Ping and rebuilt
//! lazily when it does not. Callers serialize access; see
//! [`QueueStatusClient`](crate::QueueStatusClient).

use std::future::Future;
use std::time::Duration;
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, info, trace, warn};

use crate::{
    command::AmiAction,
    config::AmiConfig,
    error::{AmiError, AmiResult},
    event::AmiEvent,
    fields::{AmiField, EventName},
    protocol::BlockReader,
};

/// Where the session is in its connect/login cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConnectionState {
    /// No socket.
    Disconnected,
    /// TCP connect and banner in progress.
    Connecting,
    /// `Login` sent, waiting for the acknowledgment.
    Authenticating,
    /// Authenticated and idle.
    Ready,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Authenticating => write!(f, "authenticating"),
            ConnectionState::Ready => write!(f, "ready"),
        }
    }
}

/// Run `fut` with a deadline, mapping expiry to [`AmiError::Timeout`].
async fn with_timeout<T>(
    limit: Duration,
    fut: impl Future<Output = AmiResult<T>>,
) -> AmiResult<T> {
    match timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(AmiError::Timeout {
            timeout_ms: limit.as_millis() as u64,
        }),
    }
}

/// Establish a TCP connection with a timeout.
async fn tcp_connect_with_timeout(
    host: &str,
    port: u16,
    connect_timeout: Duration,
) -> AmiResult<TcpStream> {
    let tcp_result = timeout(connect_timeout, TcpStream::connect((host, port))).await;

    match tcp_result {
        Ok(Ok(s)) => {
            debug!("[CONNECT] TCP connection established");
            Ok(s)
        }
        Ok(Err(e)) => {
            warn!("[CONNECT] TCP connect failed: {}", e);
            Err(AmiError::Io(e))
        }
        Err(_) => {
            let timeout_ms = connect_timeout.as_millis() as u64;
            warn!("[CONNECT] TCP connect timed out after {}ms", timeout_ms);
            Err(AmiError::Timeout { timeout_ms })
        }
    }
}

/// Both halves of one socket. They live and die together.
struct AmiConnection {
    reader: BlockReader<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
}

impl AmiConnection {
    /// Connect and consume the greeting banner.
    async fn connect(config: &AmiConfig) -> AmiResult<Self> {
        let stream =
            tcp_connect_with_timeout(&config.host, config.port, config.connect_timeout).await?;
        let (read_half, writer) = stream.into_split();
        let mut conn = Self {
            reader: BlockReader::new(BufReader::new(read_half)),
            writer,
        };

        let banner = with_timeout(config.connect_timeout, conn.reader.read_line()).await?;
        if banner.is_empty() {
            return Err(AmiError::ConnectionClosed);
        }
        debug!("[CONNECT] Banner: {}", banner.trim_end());
        Ok(conn)
    }

    /// Send `Login` with events off and check the acknowledgment.
    async fn login(&mut self, config: &AmiConfig) -> AmiResult<()> {
        let login = AmiAction::Login {
            username: config
                .username
                .clone(),
            secret: config
                .secret
                .clone(),
            events_off: true,
        };
        debug!("[AUTH] Sending Login for {} [REDACTED]", config.username);
        self.send(&login.to_wire_format()?)
            .await?;

        let ack = self
            .read_event(config.read_timeout)
            .await?;
        if !ack.is_success() {
            let reason = match ack.message() {
                "" => "Authentication failed",
                m => m,
            };
            warn!("[AUTH] Login rejected: {}", reason);
            return Err(AmiError::auth_failed(reason));
        }
        debug!("[AUTH] Authentication accepted");
        Ok(())
    }

    async fn send(&mut self, wire: &str) -> AmiResult<()> {
        self.writer
            .write_all(wire.as_bytes())
            .await?;
        Ok(())
    }

    async fn read_event(&mut self, limit: Duration) -> AmiResult<AmiEvent> {
        with_timeout(limit, self.reader.read_event()).await
    }

    async fn read_raw(&mut self, limit: Duration) -> AmiResult<String> {
        let raw = with_timeout(limit, self.reader.read_block()).await?;
        if raw.is_empty() {
            return Err(AmiError::ConnectionClosed);
        }
        trace!("[RECV] {:?}", raw.trim_end());
        Ok(raw)
    }

    /// Ping round trip; any reply other than success or `Pong` fails.
    async fn probe(&mut self, limit: Duration) -> AmiResult<()> {
        self.send(&AmiAction::Ping.to_wire_format()?)
            .await?;
        let reply = self
            .read_event(limit)
            .await?;
        if reply.is_success() || reply.field(AmiField::Ping) == Some("Pong") {
            Ok(())
        } else {
            Err(AmiError::protocol_error(format!(
                "unexpected Ping reply: {:?}",
                reply
            )))
        }
    }
}

/// A lazily (re)connected manager session.
///
/// Transport failures drop the socket and return the session to
/// [`ConnectionState::Disconnected`]; the next
/// [`ensure_connected()`](Self::ensure_connected) builds a fresh one.
pub struct AmiSession {
    config: AmiConfig,
    conn: Option<AmiConnection>,
    state: ConnectionState,
}

impl std::fmt::Debug for AmiSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AmiSession")
            .field("host", &self.config.host)
            .field("port", &self.config.port)
            .field("state", &self.state)
            .finish()
    }
}

impl AmiSession {
    /// Create a disconnected session; nothing touches the network yet.
    pub fn new(config: AmiConfig) -> Self {
        Self {
            config,
            conn: None,
            state: ConnectionState::Disconnected,
        }
    }

    pub fn config(&self) -> &AmiConfig {
        &self.config
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.conn
            .is_some()
    }

    /// Make sure an authenticated socket is available.
    ///
    /// A held socket is probed with `Ping` first and reused if it answers
    /// within the probe timeout. Otherwise it is dropped and a new one is
    /// opened and logged in. There is no retry here; the next call tries again.
    pub async fn ensure_connected(&mut self) -> AmiResult<()> {
        let probe_timeout = self
            .config
            .probe_timeout;
        if let Some(conn) = self
            .conn
            .as_mut()
        {
            match conn
                .probe(probe_timeout)
                .await
            {
                Ok(()) => {
                    trace!("[CONNECT] Reusing live session");
                    return Ok(());
                }
                Err(e) => {
                    debug!("[CONNECT] Probe failed, reconnecting: {}", e);
                    self.discard();
                }
            }
        }

        info!(
            "[CONNECT] Connecting to AMI at {}:{}",
            self.config.host, self.config.port
        );
        self.state = ConnectionState::Connecting;
        let mut conn = match AmiConnection::connect(&self.config).await {
            Ok(conn) => conn,
            Err(e) => {
                self.discard();
                return Err(e);
            }
        };

        self.state = ConnectionState::Authenticating;
        if let Err(e) = conn
            .login(&self.config)
            .await
        {
            self.discard();
            return Err(e);
        }

        self.conn = Some(conn);
        self.state = ConnectionState::Ready;
        info!("[CONNECT] Connected and authenticated");
        Ok(())
    }

    /// Drop the socket without any protocol exchange.
    pub fn discard(&mut self) {
        if self
            .conn
            .take()
            .is_some()
        {
            debug!("[CONNECT] Session discarded");
        }
        self.state = ConnectionState::Disconnected;
    }

    /// Drop the session if `result` is a transport-class failure.
    fn track<T>(&mut self, result: AmiResult<T>) -> AmiResult<T> {
        if let Err(e) = &result {
            if e.is_connection_error() {
                warn!("[CONNECT] Dropping session after error: {}", e);
                self.discard();
            }
        }
        result
    }

    /// Encode and write one action.
    ///
    /// Encoding errors (embedded newlines) are returned before anything is
    /// written and leave the session intact.
    pub async fn send_action(&mut self, action: &AmiAction) -> AmiResult<()> {
        let wire = action.to_wire_format()?;
        match action {
            AmiAction::Login { .. } => debug!("Sending action: Login [REDACTED]"),
            _ => debug!("Sending action: {}", action.name()),
        }
        let result = match self
            .conn
            .as_mut()
        {
            Some(conn) => {
                conn.send(&wire)
                    .await
            }
            None => Err(AmiError::NotConnected),
        };
        self.track(result)
    }

    /// Read the next block, bounded by the read timeout.
    pub async fn read_event(&mut self) -> AmiResult<AmiEvent> {
        let limit = self
            .config
            .read_timeout;
        let result = match self
            .conn
            .as_mut()
        {
            Some(conn) => {
                conn.read_event(limit)
                    .await
            }
            None => Err(AmiError::NotConnected),
        };
        self.track(result)
    }

    /// Read the next block undecoded.
    pub async fn read_raw_block(&mut self, limit: Duration) -> AmiResult<String> {
        let result = match self
            .conn
            .as_mut()
        {
            Some(conn) => {
                conn.read_raw(limit)
                    .await
            }
            None => Err(AmiError::NotConnected),
        };
        self.track(result)
    }

    /// Send `action` and gather every block up to the `terminator` event.
    ///
    /// Success acknowledgments are skipped and the terminator itself is not
    /// returned. A `Response: Error` ends the sequence with
    /// [`AmiError::ActionRejected`]; the session stays usable because the
    /// PBX sends nothing after it.
    pub async fn collect_until(
        &mut self,
        action: &AmiAction,
        terminator: EventName,
    ) -> AmiResult<Vec<AmiEvent>> {
        self.send_action(action)
            .await?;
        let mut events = Vec::new();
        loop {
            let event = self
                .read_event()
                .await?;
            if event.is_event(terminator) {
                break;
            }
            if event.is_error() {
                warn!("{} rejected: {}", action.name(), event.message());
                return Err(AmiError::ActionRejected {
                    response: event
                        .message()
                        .to_string(),
                });
            }
            if event.event_name().is_none() && event.is_success() {
                trace!("{} acknowledged: {}", action.name(), event.message());
                continue;
            }
            events.push(event);
        }
        debug!("{} returned {} blocks", action.name(), events.len());
        Ok(events)
    }

    /// Send `Logoff` best-effort and drop the socket.
    pub async fn logoff(&mut self) {
        if self.conn.is_some() {
            info!("Client requested disconnect");
            let limit = self
                .config
                .probe_timeout;
            if self
                .send_action(&AmiAction::Logoff)
                .await
                .is_ok()
            {
                let _ = self
                    .read_raw_block(limit)
                    .await;
            }
        }
        self.discard();
    }
}
