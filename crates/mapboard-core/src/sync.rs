//! Draw message contract shared by every participant of a session.
//!
//! Each local state transition of the tool engine is described by one
//! [`DrawEvent`]; the event is wrapped in a [`DrawMessage`] carrying the
//! session and originating client, and serialized as a flat JSON object
//! tagged by `type`:
//!
//! ```json
//! {"sessionId":"s1","clientId":"c1","type":"stroke:segment","strokeId":"k","x":1.0,"y":2.0}
//! ```
//!
//! Delivery is abstracted behind [`DrawChannel`]; [`MemoryChannel`] is an
//! in-process hub used by tests and single-process hosts.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use kurbo::Point;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::style::{Rgb, ToolKind};

/// Errors raised while moving draw messages.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Failed to (de)serialize draw message: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Channel error: {0}")]
    Channel(String),
}

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// One drawing transition, tagged on the wire by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DrawEvent {
    #[serde(rename = "stroke:start", rename_all = "camelCase")]
    StrokeStart {
        stroke_id: String,
        tool: ToolKind,
        color: Rgb,
        x: f64,
        y: f64,
        /// Stroke width already converted to world units by the sender.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        world_width: Option<f64>,
    },
    #[serde(rename = "stroke:segment", rename_all = "camelCase")]
    StrokeSegment { stroke_id: String, x: f64, y: f64 },
    #[serde(rename = "stroke:end", rename_all = "camelCase")]
    StrokeEnd { stroke_id: String },
    #[serde(rename = "shape:rect", rename_all = "camelCase")]
    ShapeRect {
        x: f64,
        y: f64,
        x2: f64,
        y2: f64,
        color: Rgb,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        world_width: Option<f64>,
    },
    #[serde(rename = "shape:ellipse", rename_all = "camelCase")]
    ShapeEllipse {
        x: f64,
        y: f64,
        x2: f64,
        y2: f64,
        color: Rgb,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        world_width: Option<f64>,
    },
    #[serde(rename = "clear")]
    Clear,
    #[serde(rename = "snapshot", rename_all = "camelCase")]
    Snapshot {
        data_url: String,
        origin_x: f64,
        origin_y: f64,
    },
}

impl DrawEvent {
    /// Wire name of the variant.
    pub fn kind(&self) -> &'static str {
        match self {
            DrawEvent::StrokeStart { .. } => "stroke:start",
            DrawEvent::StrokeSegment { .. } => "stroke:segment",
            DrawEvent::StrokeEnd { .. } => "stroke:end",
            DrawEvent::ShapeRect { .. } => "shape:rect",
            DrawEvent::ShapeEllipse { .. } => "shape:ellipse",
            DrawEvent::Clear => "clear",
            DrawEvent::Snapshot { .. } => "snapshot",
        }
    }

    /// Whether the event writes to the surface and takes a history snapshot.
    pub fn is_destructive(&self) -> bool {
        !matches!(
            self,
            DrawEvent::StrokeSegment { .. } | DrawEvent::StrokeEnd { .. }
        )
    }

    pub(crate) fn stroke_start(stroke_id: &str, tool: ToolKind, color: Rgb, at: Point, world_width: f64) -> Self {
        DrawEvent::StrokeStart {
            stroke_id: stroke_id.to_string(),
            tool,
            color,
            x: at.x,
            y: at.y,
            world_width: Some(world_width),
        }
    }

    pub(crate) fn stroke_segment(stroke_id: &str, at: Point) -> Self {
        DrawEvent::StrokeSegment {
            stroke_id: stroke_id.to_string(),
            x: at.x,
            y: at.y,
        }
    }
}

/// A draw event addressed to a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrawMessage {
    pub session_id: String,
    pub client_id: String,
    #[serde(flatten)]
    pub event: DrawEvent,
}

impl DrawMessage {
    pub fn new(session_id: impl Into<String>, client_id: impl Into<String>, event: DrawEvent) -> Self {
        Self {
            session_id: session_id.into(),
            client_id: client_id.into(),
            event,
        }
    }

    pub fn to_json(&self) -> SyncResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> SyncResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Topic name a session's draw messages are broadcast on.
pub fn session_topic(session_id: &str) -> String {
    format!("/topic/sessao.{session_id}")
}

/// Transport for draw messages.
///
/// Implementations deliver every published message to the other
/// participants; ordering and retries are their own concern.
pub trait DrawChannel {
    /// Send a message to the other participants.
    fn publish(&mut self, message: &DrawMessage) -> SyncResult<()>;

    /// Take every message received since the last poll.
    fn poll(&mut self) -> SyncResult<Vec<DrawMessage>>;
}

#[derive(Debug, Default)]
struct Hub {
    /// Undelivered serialized messages per connected endpoint.
    queues: HashMap<usize, VecDeque<String>>,
    next_id: usize,
}

impl Hub {
    fn open(&mut self) -> usize {
        let id = self.next_id;
        self.next_id += 1;
        self.queues.insert(id, VecDeque::new());
        id
    }
}

/// In-memory broadcast hub. Open more endpoints with [`MemoryChannel::connect`].
///
/// Each endpoint owns a queue that is drained by `poll` and released when
/// the endpoint is dropped.
#[derive(Debug)]
pub struct MemoryChannel {
    hub: Arc<Mutex<Hub>>,
    id: usize,
}

impl MemoryChannel {
    /// Create a hub and its first endpoint.
    pub fn new() -> Self {
        let mut hub = Hub::default();
        let id = hub.open();
        Self {
            hub: Arc::new(Mutex::new(hub)),
            id,
        }
    }

    /// Open another endpoint on the same hub.
    ///
    /// The new endpoint only sees messages published after it connected.
    pub fn connect(&self) -> SyncResult<Self> {
        let id = self.lock()?.open();
        Ok(Self {
            hub: Arc::clone(&self.hub),
            id,
        })
    }

    fn lock(&self) -> SyncResult<MutexGuard<'_, Hub>> {
        self.hub
            .lock()
            .map_err(|e| SyncError::Channel(format!("Lock error: {}", e)))
    }
}

impl Default for MemoryChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for MemoryChannel {
    fn drop(&mut self) {
        if let Ok(mut hub) = self.hub.lock() {
            hub.queues.remove(&self.id);
        }
    }
}

impl DrawChannel for MemoryChannel {
    fn publish(&mut self, message: &DrawMessage) -> SyncResult<()> {
        let json = message.to_json()?;
        let mut hub = self.lock()?;
        for (id, queue) in hub.queues.iter_mut() {
            if *id != self.id {
                queue.push_back(json.clone());
            }
        }
        Ok(())
    }

    fn poll(&mut self) -> SyncResult<Vec<DrawMessage>> {
        let pending: Vec<String> = match self.lock()?.queues.get_mut(&self.id) {
            Some(queue) => queue.drain(..).collect(),
            None => Vec::new(),
        };
        let mut received = Vec::with_capacity(pending.len());
        for json in pending {
            match DrawMessage::from_json(&json) {
                Ok(message) => received.push(message),
                Err(e) => log::warn!("Dropping malformed draw message: {}", e),
            }
        }
        Ok(received)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stroke_start_wire_format() {
        let msg = DrawMessage::new(
            "s1",
            "c1",
            DrawEvent::StrokeStart {
                stroke_id: "k".into(),
                tool: ToolKind::Eraser,
                color: Rgb::new(0xe6, 0xbd, 0x3b),
                x: 1.5,
                y: -2.0,
                world_width: None,
            },
        );
        let value: serde_json::Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();
        assert_eq!(value["type"], "stroke:start");
        assert_eq!(value["sessionId"], "s1");
        assert_eq!(value["clientId"], "c1");
        assert_eq!(value["strokeId"], "k");
        assert_eq!(value["tool"], "eraser");
        assert_eq!(value["color"], "#e6bd3b");
        assert_eq!(value["x"], 1.5);
        assert!(value.get("worldWidth").is_none());
    }

    #[test]
    fn test_parse_messages_from_peer() {
        let rect = DrawMessage::from_json(
            r##"{"type":"shape:rect","sessionId":"s","clientId":"c","x":0,"y":1,"x2":10,"y2":11,"color":"#ffffff"}"##,
        )
        .unwrap();
        assert_eq!(
            rect.event,
            DrawEvent::ShapeRect {
                x: 0.0,
                y: 1.0,
                x2: 10.0,
                y2: 11.0,
                color: Rgb::white(),
                world_width: None,
            }
        );

        let clear = DrawMessage::from_json(r#"{"type":"clear","sessionId":"s","clientId":"c"}"#).unwrap();
        assert_eq!(clear.event, DrawEvent::Clear);

        let snap = DrawMessage::from_json(
            r#"{"type":"snapshot","sessionId":"s","clientId":"c","dataUrl":"data:x","originX":2048,"originY":10}"#,
        )
        .unwrap();
        assert_eq!(snap.event.kind(), "snapshot");
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        let result = DrawMessage::from_json(r#"{"type":"laser","sessionId":"s","clientId":"c"}"#);
        assert!(matches!(result, Err(SyncError::Serialization(_))));
    }

    #[test]
    fn test_segment_roundtrip() {
        let msg = DrawMessage::new("s", "c", DrawEvent::stroke_segment("k", Point::new(3.0, 4.0)));
        let back = DrawMessage::from_json(&msg.to_json().unwrap()).unwrap();
        assert_eq!(back, msg);
        assert!(!back.event.is_destructive());
    }

    #[test]
    fn test_session_topic() {
        assert_eq!(session_topic("42"), "/topic/sessao.42");
    }

    #[test]
    fn test_memory_channel_broadcasts_to_others() {
        let mut a = MemoryChannel::new();
        let mut b = a.connect().unwrap();
        let mut c = a.connect().unwrap();

        a.publish(&DrawMessage::new("s", "a", DrawEvent::Clear)).unwrap();

        assert!(a.poll().unwrap().is_empty());
        assert_eq!(b.poll().unwrap().len(), 1);
        assert_eq!(c.poll().unwrap()[0].client_id, "a");
        // Already consumed.
        assert!(b.poll().unwrap().is_empty());
    }

    #[test]
    fn test_late_endpoint_skips_history() {
        let mut a = MemoryChannel::new();
        a.publish(&DrawMessage::new("s", "a", DrawEvent::Clear)).unwrap();
        let mut late = a.connect().unwrap();
        assert!(late.poll().unwrap().is_empty());
    }

    #[test]
    fn test_delivered_messages_are_released() {
        let mut a = MemoryChannel::new();
        let mut b = a.connect().unwrap();
        let c = a.connect().unwrap();
        a.publish(&DrawMessage::new("s", "a", DrawEvent::Clear)).unwrap();
        assert_eq!(a.hub.lock().unwrap().queues[&c.id].len(), 1);

        // A dropped endpoint no longer holds undelivered messages.
        let c_id = c.id;
        drop(c);
        assert!(!a.hub.lock().unwrap().queues.contains_key(&c_id));

        assert_eq!(b.poll().unwrap().len(), 1);
        let hub = a.hub.lock().unwrap();
        assert!(hub.queues.values().all(|queue| queue.is_empty()));
    }
}
