use std::io::{self, Read};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A message pushed to connected viewers over SSE.
///
/// Document updates are sent as unnamed `data:` frames so the browser's
/// `EventSource.onmessage` handler receives them without subscribing to a
/// custom event name. Keep-alives are SSE comment frames, which browsers
/// ignore entirely.
#[derive(Debug, Clone)]
pub enum SseMessage {
    Document { html: String },
    KeepAlive,
}

impl SseMessage {
    /// Format message as SSE protocol text
    fn format(&self) -> String {
        match self {
            SseMessage::Document { html } => {
                format!("data: {}\n\n", serde_json::json!({ "html": html }))
            }
            SseMessage::KeepAlive => ": keep-alive\n\n".to_string(),
        }
    }
}

pub struct SseClient {
    id: String,
    sender: std::sync::mpsc::Sender<SseMessage>,
}

/// Registry of connected SSE viewers.
///
/// Viewers register when they open the update stream and are dropped again
/// once sending to them fails. Broadcasts fan out to every registered viewer.
pub struct SseRegistry {
    clients: Arc<Mutex<Vec<SseClient>>>,
}

impl SseRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            clients: Arc::new(Mutex::new(Vec::new())),
        })
    }

    /// Register a new viewer and return its ID and message receiver.
    ///
    /// The initial message is queued before the viewer is registered, so a
    /// freshly connected browser always receives the current document first,
    /// even when nothing has been rendered yet.
    pub fn register(&self, initial: SseMessage) -> (String, std::sync::mpsc::Receiver<SseMessage>) {
        let id = uuid::Uuid::new_v4().to_string();
        let (sender, receiver) = std::sync::mpsc::channel();

        // The receiver is still in scope here, this send cannot fail
        let _ = sender.send(initial);

        let client = SseClient {
            id: id.clone(),
            sender,
        };

        let mut clients = self.clients.lock().unwrap();
        clients.push(client);
        tracing::debug!(client_id = %id, total_clients = clients.len(), "SSE viewer registered");

        (id, receiver)
    }

    /// Unregister a viewer by ID. Unregistering an unknown ID is a no-op.
    pub fn unregister(&self, id: &str) {
        let mut clients = self.clients.lock().unwrap();
        clients.retain(|c| c.id != id);
        tracing::debug!(client_id = %id, remaining_clients = clients.len(), "SSE viewer unregistered");
    }

    /// Broadcast a message to all connected viewers.
    pub fn broadcast(&self, message: SseMessage) {
        let mut clients = self.clients.lock().unwrap();

        // Remove viewers where send fails (disconnected)
        clients.retain(|client| match client.sender.send(message.clone()) {
            Ok(_) => true,
            Err(_) => {
                tracing::debug!(client_id = %client.id, "Removing disconnected SSE viewer");
                false
            }
        });

        tracing::debug!(
            message_type = message_kind(&message),
            active_clients = clients.len(),
            "SSE message broadcast"
        );
    }

    /// Get the current number of connected viewers
    pub fn client_count(&self) -> usize {
        self.clients.lock().unwrap().len()
    }

    /// Spawn a thread that broadcasts a keep-alive comment every 30 seconds.
    ///
    /// Proxies and browsers may close SSE connections that stay silent for
    /// too long, and the periodic send also flushes out dead connections.
    pub fn start_keepalive_thread(self: Arc<Self>) {
        std::thread::spawn(move || {
            loop {
                std::thread::sleep(Duration::from_secs(30));
                self.broadcast(SseMessage::KeepAlive);
            }
        });
        tracing::info!("SSE keep-alive thread started");
    }
}

fn message_kind(message: &SseMessage) -> &'static str {
    match message {
        SseMessage::Document { .. } => "document",
        SseMessage::KeepAlive => "keep-alive",
    }
}

/// Bridges the mpsc receiver to tiny_http's streaming response body.
///
/// tiny_http sends chunked response bodies by pulling from a `Read`
/// implementation. `read` blocks on the channel until the next message
/// arrives, which is fine because each request runs on its own thread.
pub struct SseStream {
    receiver: std::sync::mpsc::Receiver<SseMessage>,
    buffer: Vec<u8>,
    position: usize,
}

impl SseStream {
    pub fn new(receiver: std::sync::mpsc::Receiver<SseMessage>) -> Self {
        Self {
            receiver,
            buffer: Vec::new(),
            position: 0,
        }
    }
}

impl Read for SseStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        // If buffer is exhausted, wait for next message
        while self.position >= self.buffer.len() {
            match self.receiver.recv() {
                Ok(message) => {
                    self.buffer = message.format().into_bytes();
                    self.position = 0;
                }
                Err(_) => {
                    // Channel closed, end of stream
                    return Ok(0);
                }
            }
        }

        // Copy from buffer to output
        let remaining = self.buffer.len() - self.position;
        let to_copy = remaining.min(buf.len());
        buf[..to_copy].copy_from_slice(&self.buffer[self.position..self.position + to_copy]);
        self.position += to_copy;

        Ok(to_copy)
    }
}
