//! WebSocket connector for the protocol sidecar.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use uuid::Uuid;
use wabridge_core::{
    creds::Credentials,
    event::{ClientEvent, DisconnectCause, InboundMessage},
    traits::{ConnectError, Connector, LiveConnection, ProtocolVersion, SendError},
};

use crate::{
    protocol::{self, BridgeMessage, SidecarMessage},
    version,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const CLOSE_GRACE: Duration = Duration::from_millis(50);

type Pending = Arc<Mutex<HashMap<String, oneshot::Sender<SidecarMessage>>>>;

/// Sidecar endpoints.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub ws_url: String,
    pub http_url: String,
}

impl GatewayConfig {
    /// Derive both endpoints from the sidecar's HTTP base URL.
    #[must_use]
    pub fn from_base(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        let ws_url = if let Some(rest) = base.strip_prefix("https://") {
            format!("wss://{rest}/socket")
        } else if let Some(rest) = base.strip_prefix("http://") {
            format!("ws://{rest}/socket")
        } else {
            format!("ws://{base}/socket")
        };
        Self {
            ws_url,
            http_url: base.to_string(),
        }
    }
}

/// `Connector` backed by the sidecar's WebSocket endpoint.
pub struct WsConnector {
    config: GatewayConfig,
    http: reqwest::Client,
}

impl WsConnector {
    #[must_use]
    pub fn new(config: GatewayConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl Connector for WsConnector {
    type Conn = GatewayConnection;

    async fn connect(
        &self,
        creds: Option<Credentials>,
        version: ProtocolVersion,
    ) -> Result<(GatewayConnection, mpsc::Receiver<ClientEvent>), ConnectError> {
        let (ws, _) = connect_async(self.config.ws_url.as_str())
            .await
            .map_err(|e| ConnectError::Handshake(e.to_string()))?;
        let (mut sink, mut stream) = ws.split();

        let creds = creds
            .map(|c| serde_json::to_value(&c))
            .transpose()
            .map_err(|e| ConnectError::Protocol(e.to_string()))?;

        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<BridgeMessage>();
        out_tx
            .send(BridgeMessage::Connect {
                creds,
                version: [version.0, version.1, version.2],
            })
            .map_err(|_| ConnectError::Closed)?;

        let writer = tokio::spawn(async move {
            while let Some(msg) = out_rx.recv().await {
                let json = match serde_json::to_string(&msg) {
                    Ok(j) => j,
                    Err(e) => {
                        tracing::error!("Failed to serialize sidecar command: {e}");
                        continue;
                    }
                };
                if sink.send(Message::Text(json.into())).await.is_err() {
                    break;
                }
            }
        });

        let (event_tx, event_rx) = mpsc::channel::<ClientEvent>(64);
        let pending: Pending = Arc::new(Mutex::new(HashMap::new()));
        let pending_reader = Arc::clone(&pending);

        let reader = tokio::spawn(async move {
            let mut saw_closed = false;
            while let Some(next) = stream.next().await {
                let text = match next {
                    Ok(Message::Text(t)) => t,
                    Ok(Message::Close(_)) => break,
                    Ok(_) => continue,
                    Err(e) => {
                        tracing::warn!("Gateway socket error: {e}");
                        break;
                    }
                };

                let msg: SidecarMessage = match serde_json::from_str(text.as_str()) {
                    Ok(m) => m,
                    Err(e) => {
                        tracing::warn!("Invalid sidecar message: {e}");
                        continue;
                    }
                };

                if let Some(event) = route(msg, &pending_reader) {
                    saw_closed = matches!(event, ClientEvent::Closed(_));
                    if event_tx.send(event).await.is_err() {
                        return;
                    }
                    if saw_closed {
                        break;
                    }
                }
            }
            if !saw_closed {
                let _ = event_tx
                    .send(ClientEvent::Closed(DisconnectCause::Transient(
                        "gateway stream ended".into(),
                    )))
                    .await;
            }
        });

        Ok((
            GatewayConnection {
                out_tx,
                pending,
                reader,
                writer,
            },
            event_rx,
        ))
    }

    async fn latest_version(&self) -> Result<ProtocolVersion, ConnectError> {
        version::fetch(&self.http, &self.config.http_url).await
    }
}

/// Turn a sidecar message into a client event, or absorb it if it is
/// a correlated request reply (or undecodable).
fn route(msg: SidecarMessage, pending: &Pending) -> Option<ClientEvent> {
    match msg {
        reply @ (SidecarMessage::PairingCode { .. } | SidecarMessage::SendResult { .. }) => {
            fulfill(pending, reply);
            None
        }
        SidecarMessage::Qr { data } => Some(ClientEvent::QrIssued(data)),
        SidecarMessage::Open => Some(ClientEvent::Opened),
        SidecarMessage::Closed { code, reason } => Some(ClientEvent::Closed(
            protocol::classify_close(code, &reason),
        )),
        SidecarMessage::CredsUpdate { creds } => match serde_json::from_value(creds) {
            Ok(creds) => Some(ClientEvent::CredsUpdate(creds)),
            Err(e) => {
                tracing::warn!("Undecodable credential update: {e}");
                None
            }
        },
        SidecarMessage::KeysUpdate { entries } => {
            let mut mutations = Vec::with_capacity(entries.len());
            for entry in entries {
                match entry.decode() {
                    Ok(m) => mutations.push(m),
                    Err(e) => tracing::warn!("Undecodable key entry: {e}"),
                }
            }
            Some(ClientEvent::KeysUpdate(mutations))
        }
        SidecarMessage::Message {
            chat,
            participant,
            from_me,
            text,
            push_name,
        } => {
            let sender = participant.unwrap_or_else(|| chat.clone());
            Some(ClientEvent::Message(InboundMessage {
                chat,
                sender,
                from_me,
                text,
                push_name,
            }))
        }
    }
}

fn fulfill(pending: &Pending, reply: SidecarMessage) {
    let (SidecarMessage::PairingCode { id, .. } | SidecarMessage::SendResult { id, .. }) = &reply
    else {
        return;
    };
    let id = id.clone();
    match pending.lock().unwrap().remove(&id) {
        Some(tx) => {
            let _ = tx.send(reply);
        }
        None => tracing::warn!("Unmatched reply id {id}"),
    }
}

enum RequestError {
    Closed,
    TimedOut,
}

/// A single open sidecar session.
pub struct GatewayConnection {
    out_tx: mpsc::UnboundedSender<BridgeMessage>,
    pending: Pending,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl GatewayConnection {
    async fn request(
        &self,
        make: impl FnOnce(String) -> BridgeMessage + Send,
    ) -> Result<SidecarMessage, RequestError> {
        let id = Uuid::new_v4().to_string();
        let (tx, rx) = oneshot::channel();
        self.pending.lock().unwrap().insert(id.clone(), tx);

        if self.out_tx.send(make(id.clone())).is_err() {
            self.pending.lock().unwrap().remove(&id);
            return Err(RequestError::Closed);
        }

        match tokio::time::timeout(REQUEST_TIMEOUT, rx).await {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(_)) => Err(RequestError::Closed),
            Err(_) => {
                self.pending.lock().unwrap().remove(&id);
                Err(RequestError::TimedOut)
            }
        }
    }
}

#[async_trait]
impl LiveConnection for GatewayConnection {
    async fn request_pairing_code(&self, phone: &str) -> Result<String, ConnectError> {
        let phone = phone.to_string();
        let reply = self
            .request(move |id| BridgeMessage::RequestPairingCode { id, phone })
            .await
            .map_err(|e| match e {
                RequestError::Closed => ConnectError::Closed,
                RequestError::TimedOut => {
                    ConnectError::Protocol("pairing code request timed out".into())
                }
            })?;
        match reply {
            SidecarMessage::PairingCode { code, .. } => Ok(code),
            _ => Err(ConnectError::Protocol("unexpected pairing reply".into())),
        }
    }

    async fn send_text(&self, to: &str, text: &str) -> Result<(), SendError> {
        let (to, text) = (to.to_string(), text.to_string());
        let reply = self
            .request(move |id| BridgeMessage::SendText { id, to, text })
            .await
            .map_err(|e| match e {
                RequestError::Closed => SendError::Closed,
                RequestError::TimedOut => SendError::Rejected("send timed out".into()),
            })?;
        match reply {
            SidecarMessage::SendResult { success: true, .. } => Ok(()),
            SidecarMessage::SendResult { error, .. } => Err(SendError::Rejected(
                error.unwrap_or_else(|| "send failed".into()),
            )),
            _ => Err(SendError::Rejected("unexpected send reply".into())),
        }
    }

    async fn close(&mut self) {
        let _ = self.out_tx.send(BridgeMessage::Close);
        // let the writer flush the close command before tearing down
        tokio::time::sleep(CLOSE_GRACE).await;
        self.reader.abort();
        self.writer.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ws_url_derived_from_base() {
        let cfg = GatewayConfig::from_base("http://127.0.0.1:8077/");
        assert_eq!(cfg.ws_url, "ws://127.0.0.1:8077/socket");
        assert_eq!(cfg.http_url, "http://127.0.0.1:8077");

        let cfg = GatewayConfig::from_base("https://gateway.internal");
        assert_eq!(cfg.ws_url, "wss://gateway.internal/socket");
    }
}
