//! Registry of live websocket clients and the inbound message queue.
//!
//! Socket tasks push parsed envelopes onto a bounded queue; a single
//! processor task drains it and answers through each client's outbound
//! channel. Replies never touch the socket directly.

use std::sync::Arc;

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{Mutex, RwLock, mpsc};
use tokio::task::JoinHandle;

use super::messages::{Message, MessageType};

/// Reason sent when a client talks before presenting a token.
pub const INVALID_TOKEN: &str = "invalid token";

/// Reason sent when the inbound queue has no room left.
pub const QUEUE_FULL: &str = "message queue is full";

/// Frame the socket task should write next.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    /// Serialize and send as a text frame.
    Message(Message),
    /// Send a close frame and stop.
    Close,
}

/// A registered client.
#[derive(Debug, Clone)]
pub struct ClientConnection {
    /// Connection id (32 hex characters).
    pub uuid: String,
    /// Clinic given in the connect URL.
    pub clinic_id: i64,
    /// Token from the last accepted `CONNECTION` message.
    pub token: Option<String>,
    outbound: mpsc::UnboundedSender<Outbound>,
}

impl ClientConnection {
    /// Queues `message` for delivery. Returns `false` when the socket is gone.
    pub fn send(&self, message: Message) -> bool {
        self.outbound.send(Outbound::Message(message)).is_ok()
    }

    fn close(&self) {
        let _ = self.outbound.send(Outbound::Close);
    }
}

/// Message waiting for the queue processor.
#[derive(Debug, Clone)]
struct Queued {
    uuid: String,
    message: Message,
}

/// Shared registry of websocket clients.
#[derive(Debug)]
pub struct ConnectionManager {
    clients: RwLock<Vec<ClientConnection>>,
    queue_tx: mpsc::Sender<Queued>,
    queue_rx: Mutex<Option<mpsc::Receiver<Queued>>>,
}

impl ConnectionManager {
    /// Creates a manager whose inbound queue holds `capacity` messages.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (queue_tx, queue_rx) = mpsc::channel(capacity.max(1));
        Self {
            clients: RwLock::new(Vec::new()),
            queue_tx,
            queue_rx: Mutex::new(Some(queue_rx)),
        }
    }

    /// Registers a client for `clinic_id` and greets it with `CREATE_UUID`.
    ///
    /// The returned receiver yields every frame the socket should write.
    pub async fn register(
        &self,
        clinic_id: i64,
    ) -> (ClientConnection, mpsc::UnboundedReceiver<Outbound>) {
        let (outbound, rx) = mpsc::unbounded_channel();
        let client = ClientConnection {
            uuid: uuid::Uuid::new_v4().simple().to_string(),
            clinic_id,
            token: None,
            outbound,
        };
        client.send(Message::create_uuid(clinic_id, &client.uuid));
        self.clients.write().await.push(client.clone());
        tracing::info!(uuid = %client.uuid, clinic_id, "ws client connected");
        (client, rx)
    }

    /// Handles a text frame from client `uuid`: valid envelopes are
    /// queued, anything else is answered with `INVALID`.
    ///
    /// Never waits on the queue. When it is full the client gets an
    /// `ERROR` with [`QUEUE_FULL`] and the message is dropped.
    pub async fn receive(&self, uuid: &str, text: &str) {
        let Some(client) = self.get_connection_by_uuid(uuid).await else {
            return;
        };
        match serde_json::from_str::<Message>(text) {
            Ok(message) => {
                let queued = Queued {
                    uuid: uuid.to_string(),
                    message,
                };
                match self.queue_tx.try_send(queued) {
                    Ok(()) => {}
                    Err(TrySendError::Full(_)) => {
                        tracing::warn!(%uuid, "ws queue full; dropping message");
                        client.send(Message::error(client.clinic_id, QUEUE_FULL));
                    }
                    Err(TrySendError::Closed(_)) => {
                        tracing::warn!(%uuid, "ws queue closed; dropping message");
                    }
                }
            }
            Err(err) => {
                tracing::debug!(%uuid, error = %err, "invalid ws message");
                client.send(Message::invalid(client.clinic_id));
            }
        }
    }

    /// Removes `uuid` and asks its socket to close. Returns whether the
    /// client was registered.
    pub async fn disconnect(&self, uuid: &str) -> bool {
        let removed = {
            let mut clients = self.clients.write().await;
            clients
                .iter()
                .position(|c| c.uuid == uuid)
                .map(|idx| clients.remove(idx))
        };
        match removed {
            Some(client) => {
                client.close();
                tracing::info!(%uuid, clinic_id = client.clinic_id, "ws client disconnected");
                true
            }
            None => false,
        }
    }

    /// Every registered client, in connection order.
    pub async fn get_all_connections(&self) -> Vec<ClientConnection> {
        self.clients.read().await.clone()
    }

    /// Client with the given connection id.
    pub async fn get_connection_by_uuid(&self, uuid: &str) -> Option<ClientConnection> {
        self.clients
            .read()
            .await
            .iter()
            .find(|c| c.uuid == uuid)
            .cloned()
    }

    /// First client registered for `clinic_id`.
    pub async fn get_connection_by_clinic_id(&self, clinic_id: i64) -> Option<ClientConnection> {
        self.clients
            .read()
            .await
            .iter()
            .find(|c| c.clinic_id == clinic_id)
            .cloned()
    }

    /// Sends `message` to every client of `clinic_id`. Returns how many
    /// clients it was queued for.
    pub async fn broadcast_clinic_messages(&self, clinic_id: i64, message: &Message) -> usize {
        self.clients
            .read()
            .await
            .iter()
            .filter(|c| c.clinic_id == clinic_id)
            .filter(|c| c.send(message.clone()))
            .count()
    }

    /// Applies the protocol rules to one queued message.
    pub async fn process_message(&self, uuid: &str, message: Message) {
        let Some(client) = self.get_connection_by_uuid(uuid).await else {
            tracing::debug!(%uuid, "message from a client that already left");
            return;
        };

        if message.message_type == MessageType::Connection {
            let Some(token) = message.connection_token().map(str::to_string) else {
                client.send(Message::invalid(client.clinic_id));
                return;
            };
            if let Some(stored) = self
                .clients
                .write()
                .await
                .iter_mut()
                .find(|c| c.uuid == uuid)
            {
                stored.token = Some(token);
            }
            client.send(Message::new(MessageType::Connection, message.clinic_id));
        } else if client.token.is_none() {
            client.send(Message::error(client.clinic_id, INVALID_TOKEN));
            self.disconnect(uuid).await;
        } else {
            client.send(Message::invalid(client.clinic_id));
        }
    }

    /// Spawns the task that drains the queue. Only the first call starts
    /// a processor; later calls return `None`.
    pub async fn start_queue_processor(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        let mut rx = self.queue_rx.lock().await.take()?;
        let manager = Arc::clone(self);
        let handle = tokio::spawn(async move {
            while let Some(Queued { uuid, message }) = rx.recv().await {
                tracing::info!(%uuid, message_type = message.message_type.code(), "processing message");
                manager.process_message(&uuid, message).await;
            }
            tracing::debug!("ws queue processor stopped");
        });
        tracing::info!("ws queue processor started");
        Some(handle)
    }
}
