//! Bridge between the local canvas and a session's draw channel.

use crate::sync::{DrawChannel, DrawEvent, DrawMessage, SyncResult, session_topic};

/// Queues local draw events for the session and filters incoming ones.
#[derive(Debug, Clone)]
pub struct SyncBridge {
    /// Identifies this participant; echoes carrying it are ignored.
    client_id: String,
    /// Current session (if joined).
    session_id: Option<String>,
    /// Pending outgoing messages.
    outgoing: Vec<DrawMessage>,
}

impl SyncBridge {
    /// Create a bridge with a fresh random client id.
    pub fn new() -> Self {
        Self::with_client_id(uuid::Uuid::new_v4().to_string())
    }

    pub fn with_client_id(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            session_id: None,
            outgoing: Vec::new(),
        }
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn is_joined(&self) -> bool {
        self.session_id.is_some()
    }

    /// Topic this bridge publishes on, if joined.
    pub fn topic(&self) -> Option<String> {
        self.session_id.as_deref().map(session_topic)
    }

    /// Join a session. Messages queued for a previous session are dropped.
    pub fn join(&mut self, session_id: &str) {
        if self.session_id.as_deref() != Some(session_id) {
            self.outgoing.clear();
        }
        log::info!("Joined session {} as {}", session_id, self.client_id);
        self.session_id = Some(session_id.to_string());
    }

    pub fn leave(&mut self) {
        if let Some(session) = self.session_id.take() {
            log::info!("Left session {}", session);
        }
        self.outgoing.clear();
    }

    /// Queue a local event. Does nothing while not joined.
    pub fn queue(&mut self, event: DrawEvent) {
        let Some(session) = &self.session_id else {
            return;
        };
        self.outgoing
            .push(DrawMessage::new(session.clone(), self.client_id.clone(), event));
    }

    /// Take all pending outgoing messages.
    pub fn take_outgoing(&mut self) -> Vec<DrawMessage> {
        std::mem::take(&mut self.outgoing)
    }

    pub fn has_outgoing(&self) -> bool {
        !self.outgoing.is_empty()
    }

    /// Whether an incoming message belongs to our session and came from someone else.
    pub fn accepts(&self, message: &DrawMessage) -> bool {
        match &self.session_id {
            Some(session) => message.session_id == *session && message.client_id != self.client_id,
            None => false,
        }
    }

    /// Publish pending messages, then return the remote messages to apply.
    ///
    /// A failed publish keeps the unsent messages queued for the next flush.
    pub fn exchange(&mut self, channel: &mut dyn DrawChannel) -> SyncResult<Vec<DrawMessage>> {
        let pending = self.take_outgoing();
        let mut sent = 0;
        for message in &pending {
            if let Err(e) = channel.publish(message) {
                log::warn!("Failed to publish {}: {}", message.event.kind(), e);
                break;
            }
            sent += 1;
        }
        if sent < pending.len() {
            let mut unsent: Vec<DrawMessage> = pending.into_iter().skip(sent).collect();
            unsent.append(&mut self.outgoing);
            self.outgoing = unsent;
        }

        let incoming = channel.poll()?;
        Ok(incoming.into_iter().filter(|m| self.accepts(m)).collect())
    }
}

impl Default for SyncBridge {
    fn default() -> Self {
        Self::new()
    }
}
