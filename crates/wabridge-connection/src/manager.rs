//! The Connection Manager actor.
//!
//! Owns the single live connection and runs the lifecycle state
//! machine. Everything funnels through one event queue: external
//! commands, client events and timer firings are processed strictly
//! one at a time, so no two transitions interleave. Each connect
//! attempt gets an epoch; timers and event forwarders carry the epoch
//! they were created under, and anything stamped with a superseded
//! epoch is dropped on arrival. A stale retry can therefore never
//! resurrect an attempt that a manual reset or pairing request has
//! replaced.

use std::{
    sync::{Arc, RwLock},
    time::Duration,
};

use thiserror::Error;
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
};
use wabridge_core::{
    creds::Credentials,
    event::{ClientEvent, DisconnectCause, InboundMessage},
    jid,
    log_buffer::LogBuffer,
    status::{ConnectionStatus, PairingArtifact},
    traits::{
        Connector, DEFAULT_PROTOCOL_VERSION, LiveConnection, ProtocolVersion, SendError,
        SessionStore, StoreError,
    },
};

use crate::{backoff, qr, relay};

/// Tuning for delays, backoff and the retry budget.
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Base delay for transient-disconnect retries.
    pub reconnect_base_delay: Duration,
    /// Cap on the transient-disconnect retry delay.
    pub reconnect_max_delay: Duration,
    /// Delay before the single reconnect that follows a remote logout.
    pub logged_out_delay: Duration,
    /// Delay between a manual reset and its connect attempt.
    pub reset_delay: Duration,
    /// Settle delay before requesting a pairing code on a new handle.
    pub pairing_code_delay: Duration,
    /// Budget for the best-effort version fetch.
    pub version_fetch_timeout: Duration,
    /// Consecutive connect-sequence failures before auto-retry stops.
    pub max_connect_retries: u32,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            reconnect_base_delay: Duration::from_secs(2),
            reconnect_max_delay: Duration::from_secs(60),
            logged_out_delay: Duration::from_secs(2),
            reset_delay: Duration::from_secs(1),
            pairing_code_delay: Duration::from_secs(3),
            version_fetch_timeout: Duration::from_secs(5),
            max_connect_retries: 10,
        }
    }
}

/// Manager operation error.
#[derive(Debug, Error)]
pub enum ManagerError {
    #[error("invalid phone number")]
    InvalidPhone,
    #[error("connection manager is gone")]
    Closed,
}

/// Point-in-time view of the observable lifecycle state.
#[derive(Debug, Clone)]
pub struct StatusSnapshot {
    pub status: ConnectionStatus,
    pub artifact: Option<PairingArtifact>,
    pub reconnect_attempts: u32,
}

struct Shared {
    status: ConnectionStatus,
    artifact: Option<PairingArtifact>,
    reconnect_attempts: u32,
}

enum Command {
    Pair {
        phone: String,
        reply: oneshot::Sender<Result<(), ManagerError>>,
    },
    Reset {
        reply: oneshot::Sender<()>,
    },
    Send {
        to: String,
        text: String,
        reply: oneshot::Sender<Result<(), SendError>>,
    },
}

enum Internal {
    Client { epoch: u64, event: ClientEvent },
    ConnectDue { epoch: u64 },
    PairingCodeDue { epoch: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum PairingMode {
    Scan,
    Code(String),
}

/// Cloneable handle the HTTP facade and relay callers talk through.
///
/// Reads come straight from shared state; mutations are enqueued as
/// commands and applied by the actor alone.
#[derive(Clone)]
pub struct ManagerHandle {
    cmd_tx: mpsc::Sender<Command>,
    shared: Arc<RwLock<Shared>>,
    logs: Arc<LogBuffer>,
}

impl ManagerHandle {
    /// Current status, pairing artifact and attempt counter.
    #[must_use]
    pub fn snapshot(&self) -> StatusSnapshot {
        let shared = self.shared.read().unwrap();
        StatusSnapshot {
            status: shared.status,
            artifact: shared.artifact.clone(),
            reconnect_attempts: shared.reconnect_attempts,
        }
    }

    /// Diagnostic log lines, newest first.
    #[must_use]
    pub fn logs(&self) -> Vec<String> {
        self.logs.snapshot()
    }

    /// Start code-based pairing for a phone number.
    ///
    /// # Errors
    /// Returns error if the number has no digits or the manager is
    /// gone.
    pub async fn pair(&self, phone: &str) -> Result<(), ManagerError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Pair {
                phone: phone.to_string(),
                reply: tx,
            })
            .await
            .map_err(|_| ManagerError::Closed)?;
        rx.await.map_err(|_| ManagerError::Closed)?
    }

    /// Wipe the session and restart pairing from scratch.
    ///
    /// # Errors
    /// Returns error if the manager is gone.
    pub async fn reset(&self) -> Result<(), ManagerError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Reset { reply: tx })
            .await
            .map_err(|_| ManagerError::Closed)?;
        rx.await.map_err(|_| ManagerError::Closed)
    }

    /// Send a text message; rejected unless connected.
    ///
    /// # Errors
    /// `SendError::NotConnected` outside the connected state, the
    /// underlying send error otherwise.
    pub async fn send_text(&self, to: &str, text: &str) -> Result<(), SendError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Send {
                to: to.to_string(),
                text: text.to_string(),
                reply: tx,
            })
            .await
            .map_err(|_| SendError::Closed)?;
        rx.await.map_err(|_| SendError::Closed)?
    }
}

/// The actor owning the live handle and the state machine.
pub struct ConnectionManager<S, C>
where
    S: SessionStore,
    C: Connector,
{
    store: S,
    connector: C,
    config: ManagerConfig,
    shared: Arc<RwLock<Shared>>,
    logs: Arc<LogBuffer>,
    cmd_rx: mpsc::Receiver<Command>,
    internal_tx: mpsc::Sender<Internal>,
    internal_rx: mpsc::Receiver<Internal>,
    conn: Option<C::Conn>,
    forwarder: Option<JoinHandle<()>>,
    epoch: u64,
    mode: PairingMode,
    connect_failures: u32,
    pending_wipe: bool,
    version: ProtocolVersion,
}

impl<S, C> ConnectionManager<S, C>
where
    S: SessionStore + 'static,
    C: Connector,
{
    /// Create the actor and its handle.
    #[must_use]
    pub fn new(store: S, connector: C, config: ManagerConfig) -> (Self, ManagerHandle) {
        let shared = Arc::new(RwLock::new(Shared {
            status: ConnectionStatus::Initializing,
            artifact: None,
            reconnect_attempts: 0,
        }));
        let logs = Arc::new(LogBuffer::new());
        let (cmd_tx, cmd_rx) = mpsc::channel(32);
        let (internal_tx, internal_rx) = mpsc::channel(64);

        let handle = ManagerHandle {
            cmd_tx,
            shared: Arc::clone(&shared),
            logs: Arc::clone(&logs),
        };

        let manager = Self {
            store,
            connector,
            config,
            shared,
            logs,
            cmd_rx,
            internal_tx,
            internal_rx,
            conn: None,
            forwarder: None,
            epoch: 0,
            mode: PairingMode::Scan,
            connect_failures: 0,
            pending_wipe: false,
            version: DEFAULT_PROTOCOL_VERSION,
        };
        (manager, handle)
    }

    /// Start the actor; the first connect attempt is scheduled
    /// immediately.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn run(mut self) {
        self.schedule_connect(Duration::ZERO);
        loop {
            tokio::select! {
                maybe_cmd = self.cmd_rx.recv() => match maybe_cmd {
                    Some(cmd) => self.on_command(cmd).await,
                    // all handles dropped: shut down
                    None => break,
                },
                maybe_ev = self.internal_rx.recv() => {
                    if let Some(ev) = maybe_ev {
                        self.on_internal(ev).await;
                    }
                }
            }
        }
        self.release_handle().await;
    }

    fn status(&self) -> ConnectionStatus {
        self.shared.read().unwrap().status
    }

    fn set_status(&self, status: ConnectionStatus) {
        let mut shared = self.shared.write().unwrap();
        shared.status = status;
        // the artifact dies the instant we leave the state that made it
        if !status.accepts_pairing_artifact() {
            shared.artifact = None;
        }
    }

    fn publish_artifact(&self, status: ConnectionStatus, artifact: PairingArtifact) {
        let mut shared = self.shared.write().unwrap();
        shared.status = status;
        shared.artifact = Some(artifact);
        shared.reconnect_attempts = 0;
    }

    fn log(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::info!("{message}");
        self.logs.push(message);
    }

    fn schedule_connect(&self, delay: Duration) {
        let tx = self.internal_tx.clone();
        let epoch = self.epoch;
        tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            let _ = tx.send(Internal::ConnectDue { epoch }).await;
        });
    }

    fn schedule_pairing_code(&self) {
        let tx = self.internal_tx.clone();
        let epoch = self.epoch;
        let delay = self.config.pairing_code_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(Internal::PairingCodeDue { epoch }).await;
        });
    }

    fn spawn_forwarder(&mut self, mut events: mpsc::Receiver<ClientEvent>) {
        let tx = self.internal_tx.clone();
        let epoch = self.epoch;
        self.forwarder = Some(tokio::spawn(async move {
            let mut saw_closed = false;
            while let Some(event) = events.recv().await {
                saw_closed = matches!(event, ClientEvent::Closed(_));
                if tx.send(Internal::Client { epoch, event }).await.is_err() {
                    return;
                }
            }
            if !saw_closed {
                let event = ClientEvent::Closed(DisconnectCause::Transient(
                    "event stream ended".into(),
                ));
                let _ = tx.send(Internal::Client { epoch, event }).await;
            }
        }));
    }

    async fn release_handle(&mut self) {
        if let Some(forwarder) = self.forwarder.take() {
            forwarder.abort();
        }
        if let Some(mut conn) = self.conn.take() {
            conn.close().await;
        }
    }

    /// Invalidate every pending timer and in-flight client event.
    fn supersede(&mut self) {
        self.epoch += 1;
    }

    async fn on_command(&mut self, cmd: Command) {
        match cmd {
            Command::Pair { phone, reply } => {
                let digits = jid::digits(&phone);
                if digits.is_empty() {
                    let _ = reply.send(Err(ManagerError::InvalidPhone));
                    return;
                }
                self.log(format!("Pairing requested for {digits}"));
                self.supersede();
                self.release_handle().await;
                self.mode = PairingMode::Code(digits);
                self.connect_failures = 0;
                {
                    let mut shared = self.shared.write().unwrap();
                    shared.reconnect_attempts = 0;
                }
                self.set_status(ConnectionStatus::Connecting);
                self.schedule_connect(Duration::ZERO);
                let _ = reply.send(Ok(()));
            }
            Command::Reset { reply } => {
                self.log("Manual reset: wiping session and restarting pairing");
                self.supersede();
                self.release_handle().await;
                if let Err(e) = self.store.clear().await {
                    self.log(format!("Session wipe failed: {e}; retrying before next attempt"));
                    self.pending_wipe = true;
                } else {
                    self.pending_wipe = false;
                }
                self.mode = PairingMode::Scan;
                self.connect_failures = 0;
                {
                    let mut shared = self.shared.write().unwrap();
                    shared.artifact = None;
                    shared.reconnect_attempts = 0;
                    shared.status = ConnectionStatus::Disconnected;
                }
                self.schedule_connect(self.config.reset_delay);
                let _ = reply.send(());
            }
            Command::Send { to, text, reply } => {
                let result = self.do_send(&to, &text).await;
                let _ = reply.send(result);
            }
        }
    }

    async fn do_send(&mut self, to: &str, text: &str) -> Result<(), SendError> {
        if self.status() != ConnectionStatus::Connected {
            return Err(SendError::NotConnected);
        }
        let Some(conn) = self.conn.as_ref() else {
            return Err(SendError::NotConnected);
        };
        conn.send_text(&jid::normalize(to), text).await
    }

    async fn on_internal(&mut self, ev: Internal) {
        match ev {
            Internal::ConnectDue { epoch } if epoch == self.epoch => {
                self.connect_attempt().await;
            }
            Internal::PairingCodeDue { epoch } if epoch == self.epoch => {
                self.request_pairing_code().await;
            }
            Internal::Client { epoch, event } if epoch == self.epoch => {
                self.on_client_event(event).await;
            }
            // stamped with a superseded epoch: a stale timer or an
            // event from a torn-down attempt
            Internal::ConnectDue { .. }
            | Internal::PairingCodeDue { .. }
            | Internal::Client { .. } => {}
        }
    }

    async fn connect_attempt(&mut self) {
        // each attempt is its own generation; leftovers from the
        // previous one are stale from here on
        self.supersede();
        self.release_handle().await;
        self.set_status(ConnectionStatus::Connecting);

        if self.pending_wipe {
            if let Err(e) = self.store.clear().await {
                self.log(format!("Session wipe still failing: {e}"));
                self.connect_failed();
                return;
            }
            self.pending_wipe = false;
        }

        let creds = match self.load_creds().await {
            Ok(creds) => creds,
            Err(e) => {
                self.log(format!("Session load failed: {e}"));
                self.connect_failed();
                return;
            }
        };

        self.refresh_version().await;

        match self.connector.connect(creds, self.version).await {
            Ok((conn, events)) => {
                self.connect_failures = 0;
                self.conn = Some(conn);
                self.spawn_forwarder(events);
                if matches!(self.mode, PairingMode::Code(_)) {
                    self.schedule_pairing_code();
                }
                self.log("Connection opened; waiting for session");
            }
            Err(e) => {
                self.log(format!("Connect failed: {e}"));
                self.connect_failed();
            }
        }
    }

    /// Load stored credentials. Absence means a fresh pairing flow;
    /// any other failure aborts the attempt so a real remote session
    /// is never shadowed by a fabricated identity.
    async fn load_creds(&self) -> Result<Option<Credentials>, StoreError> {
        match self.store.read(Credentials::STORAGE_KEY).await? {
            None => Ok(None),
            Some(blob) => Credentials::from_blob(&blob)
                .map(Some)
                .map_err(|e| StoreError::Corrupt(e.to_string())),
        }
    }

    fn connect_failed(&mut self) {
        self.connect_failures += 1;
        self.set_status(ConnectionStatus::Error);
        if self.connect_failures > self.config.max_connect_retries {
            self.log("Retry budget exhausted; waiting for manual reset");
            return;
        }
        let delay = backoff::delay(
            self.connect_failures,
            self.config.reconnect_base_delay,
            self.config.reconnect_max_delay,
        );
        self.schedule_connect(delay);
    }

    async fn refresh_version(&mut self) {
        let fetch = self.connector.latest_version();
        match tokio::time::timeout(self.config.version_fetch_timeout, fetch).await {
            Ok(Ok(version)) => {
                if version != self.version {
                    self.log(format!("Using protocol version {version}"));
                }
                self.version = version;
            }
            Ok(Err(e)) => {
                tracing::debug!("Version fetch failed, keeping {}: {e}", self.version);
            }
            Err(_) => {
                tracing::debug!("Version fetch timed out, keeping {}", self.version);
            }
        }
    }

    async fn request_pairing_code(&mut self) {
        let PairingMode::Code(phone) = self.mode.clone() else {
            return;
        };
        if self.status() != ConnectionStatus::Connecting {
            return;
        }
        let Some(conn) = self.conn.as_ref() else {
            return;
        };
        match conn.request_pairing_code(&phone).await {
            Ok(code) => {
                self.publish_artifact(ConnectionStatus::Pairing, PairingArtifact::Code(code));
                self.log("Pairing code issued; enter it on the phone");
            }
            Err(e) => {
                self.log(format!("Pairing code request failed: {e}"));
                self.release_handle().await;
                self.connect_failed();
            }
        }
    }

    async fn on_client_event(&mut self, event: ClientEvent) {
        match event {
            ClientEvent::QrIssued(payload) => self.on_qr(&payload),
            ClientEvent::CredsUpdate(creds) => self.persist_creds(&creds).await,
            ClientEvent::KeysUpdate(mutations) => self.persist_keys(mutations).await,
            ClientEvent::Opened => {
                self.set_status(ConnectionStatus::Connected);
                {
                    let mut shared = self.shared.write().unwrap();
                    shared.reconnect_attempts = 0;
                }
                self.connect_failures = 0;
                self.log("Authenticated session open");
            }
            ClientEvent::Message(msg) => self.on_message(msg).await,
            ClientEvent::Closed(cause) => self.on_closed(cause).await,
        }
    }

    fn on_qr(&mut self, payload: &str) {
        if self.mode != PairingMode::Scan {
            // code-based pairing was requested for this attempt
            return;
        }
        if self.status() == ConnectionStatus::Connected {
            return;
        }
        match qr::data_url(payload) {
            Ok(url) => {
                self.publish_artifact(ConnectionStatus::Scanning, PairingArtifact::Qr(url));
                self.log("QR challenge issued; scan to pair");
            }
            Err(e) => self.log(format!("QR render failed: {e}")),
        }
    }

    /// The store write is the durable commit point for a credential
    /// update; failing it is fatal for this connection attempt.
    async fn persist_creds(&mut self, creds: &Credentials) {
        let result = match creds.to_blob() {
            Ok(blob) => self.store.write(Credentials::STORAGE_KEY, &blob).await,
            Err(e) => Err(StoreError::Corrupt(e.to_string())),
        };
        if let Err(e) = result {
            self.log(format!("Credential persist failed: {e}"));
            self.release_handle().await;
            self.connect_failed();
        }
    }

    async fn persist_keys(&mut self, mutations: Vec<wabridge_core::event::KeyMutation>) {
        for m in mutations {
            let key = m.storage_key();
            let result = match &m.value {
                Some(value) => self.store.write(&key, value).await,
                None => self.store.remove(&key).await,
            };
            if let Err(e) = result {
                self.log(format!("Key persist failed for {key}: {e}"));
                self.release_handle().await;
                self.connect_failed();
                return;
            }
        }
    }

    async fn on_message(&mut self, msg: InboundMessage) {
        if self.status() != ConnectionStatus::Connected {
            return;
        }
        if !relay::should_reply(&msg) {
            return;
        }
        let text = msg.text.as_deref().unwrap_or_default();
        let who = msg
            .push_name
            .clone()
            .unwrap_or_else(|| jid::bare(&msg.sender).to_string());
        self.log(format!("Message from {who}: {text}"));

        let reply = relay::echo_reply(text);
        if let Some(conn) = self.conn.as_ref() {
            if let Err(e) = conn.send_text(&msg.chat, &reply).await {
                self.log(format!("Auto-reply failed: {e}"));
            }
        }
    }

    async fn on_closed(&mut self, cause: DisconnectCause) {
        self.release_handle().await;
        match cause {
            DisconnectCause::LoggedOut => {
                self.log("Logged out by remote: wiping session");
                self.set_status(ConnectionStatus::LoggedOut);
                if let Err(e) = self.store.clear().await {
                    self.log(format!("Session wipe failed: {e}; retrying before next attempt"));
                    self.pending_wipe = true;
                }
                self.mode = PairingMode::Scan;
                {
                    let mut shared = self.shared.write().unwrap();
                    shared.reconnect_attempts = 0;
                }
                // exactly one scheduled reconnect, starting a fresh
                // pairing flow
                self.schedule_connect(self.config.logged_out_delay);
            }
            DisconnectCause::Transient(reason) => {
                let attempts = {
                    let mut shared = self.shared.write().unwrap();
                    shared.reconnect_attempts += 1;
                    shared.reconnect_attempts
                };
                self.set_status(ConnectionStatus::Reconnecting);
                let delay = backoff::delay(
                    attempts,
                    self.config.reconnect_base_delay,
                    self.config.reconnect_max_delay,
                );
                self.log(format!(
                    "Connection closed ({reason}); retry {attempts} in {delay:?}"
                ));
                self.schedule_connect(delay);
            }
        }
    }
}
