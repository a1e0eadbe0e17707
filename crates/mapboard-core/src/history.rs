//! Bounded undo/redo of full raster snapshots.

use std::collections::VecDeque;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use kurbo::Point;
use thiserror::Error;
use tiny_skia::Pixmap;

use crate::surface::RasterSurface;

const DATA_URL_PREFIX: &str = "data:image/png;base64,";

/// Snapshot encode/decode errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SnapshotError {
    #[error("PNG encoding failed: {0}")]
    Encode(String),
    #[error("PNG decoding failed: {0}")]
    Decode(String),
    #[error("Not a PNG data URL")]
    InvalidDataUrl,
    #[error("Invalid base64: {0}")]
    Base64(String),
    #[error("Snapshot is {actual:?} but claims {expected:?}")]
    SizeMismatch {
        expected: (u32, u32),
        actual: (u32, u32),
    },
}

/// An immutable PNG-encoded copy of the surface bitmap and its origin.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    png: Vec<u8>,
    width: u32,
    height: u32,
    origin: Point,
}

impl Snapshot {
    /// Encode the current state of `surface`.
    pub fn capture(surface: &RasterSurface) -> Result<Self, SnapshotError> {
        let png = surface
            .pixmap()
            .encode_png()
            .map_err(|e| SnapshotError::Encode(e.to_string()))?;
        Ok(Self {
            png,
            width: surface.width(),
            height: surface.height(),
            origin: surface.origin(),
        })
    }

    /// Wrap already-encoded PNG bytes. Validity is only checked on decode.
    pub fn from_png(png: Vec<u8>, width: u32, height: u32, origin: Point) -> Self {
        Self {
            png,
            width,
            height,
            origin,
        }
    }

    /// Parse a `data:image/png;base64,...` URL received from a peer.
    pub fn from_data_url(data_url: &str, origin: Point) -> Result<Self, SnapshotError> {
        let encoded = data_url
            .strip_prefix(DATA_URL_PREFIX)
            .ok_or(SnapshotError::InvalidDataUrl)?;
        let png = STANDARD
            .decode(encoded)
            .map_err(|e| SnapshotError::Base64(e.to_string()))?;
        let pixmap = Pixmap::decode_png(&png).map_err(|e| SnapshotError::Decode(e.to_string()))?;
        Ok(Self {
            png,
            width: pixmap.width(),
            height: pixmap.height(),
            origin,
        })
    }

    pub fn to_data_url(&self) -> String {
        format!("{DATA_URL_PREFIX}{}", STANDARD.encode(&self.png))
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn origin(&self) -> Point {
        self.origin
    }

    /// Encoded size in bytes.
    pub fn byte_len(&self) -> usize {
        self.png.len()
    }

    /// Decode into a fresh bitmap.
    pub fn decode(&self) -> Result<Pixmap, SnapshotError> {
        let pixmap = Pixmap::decode_png(&self.png).map_err(|e| SnapshotError::Decode(e.to_string()))?;
        if (pixmap.width(), pixmap.height()) != (self.width, self.height) {
            return Err(SnapshotError::SizeMismatch {
                expected: (self.width, self.height),
                actual: (pixmap.width(), pixmap.height()),
            });
        }
        Ok(pixmap)
    }

    /// Replace the surface bitmap and origin with this snapshot.
    ///
    /// On error the surface is left untouched.
    pub fn restore_into(&self, surface: &mut RasterSurface) -> Result<(), SnapshotError> {
        let pixmap = self.decode()?;
        surface.replace(pixmap, self.origin);
        Ok(())
    }
}

/// Undo and redo stacks, each holding at most `max_depth` snapshots.
#[derive(Debug, Clone)]
pub struct HistoryManager {
    undo_stack: VecDeque<Snapshot>,
    redo_stack: VecDeque<Snapshot>,
    max_depth: usize,
}

impl HistoryManager {
    pub fn new(max_depth: usize) -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: VecDeque::new(),
            max_depth: max_depth.max(1),
        }
    }

    fn push_bounded(stack: &mut VecDeque<Snapshot>, snapshot: Snapshot, max_depth: usize) {
        stack.push_back(snapshot);
        while stack.len() > max_depth {
            stack.pop_front();
        }
    }

    /// Record the surface before a destructive action.
    ///
    /// Clears the redo stack. An encode failure is logged and skipped.
    pub fn push_snapshot(&mut self, surface: &RasterSurface) {
        match Snapshot::capture(surface) {
            Ok(snapshot) => self.push(snapshot),
            Err(e) => log::warn!("Skipping history snapshot: {e}"),
        }
    }

    /// Push an existing snapshot onto the undo stack, clearing redo.
    pub fn push(&mut self, snapshot: Snapshot) {
        log::debug!("History push ({} bytes)", snapshot.byte_len());
        Self::push_bounded(&mut self.undo_stack, snapshot, self.max_depth);
        self.redo_stack.clear();
    }

    /// Restore the most recent undo snapshot.
    ///
    /// Returns `false` (and changes nothing) when there is nothing to undo
    /// or the snapshot cannot be decoded.
    pub fn undo(&mut self, surface: &mut RasterSurface) -> bool {
        Self::step(&mut self.undo_stack, &mut self.redo_stack, self.max_depth, surface)
    }

    /// Mirror of [`HistoryManager::undo`].
    pub fn redo(&mut self, surface: &mut RasterSurface) -> bool {
        Self::step(&mut self.redo_stack, &mut self.undo_stack, self.max_depth, surface)
    }

    fn step(
        from: &mut VecDeque<Snapshot>,
        to: &mut VecDeque<Snapshot>,
        max_depth: usize,
        surface: &mut RasterSurface,
    ) -> bool {
        let Some(target) = from.back() else {
            return false;
        };
        let current = match Snapshot::capture(surface) {
            Ok(current) => current,
            Err(e) => {
                log::warn!("Cannot snapshot current surface: {e}");
                return false;
            }
        };
        if let Err(e) = target.restore_into(surface) {
            log::warn!("Ignoring corrupt history entry: {e}");
            return false;
        }
        log::debug!(
            "Restored {}x{} snapshot, origin ({}, {})",
            target.width(),
            target.height(),
            target.origin().x,
            target.origin().y
        );
        from.pop_back();
        Self::push_bounded(to, current, max_depth);
        true
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_depth(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_depth(&self) -> usize {
        self.redo_stack.len()
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Undo entries, oldest first.
    pub fn undo_entries(&self) -> impl Iterator<Item = &Snapshot> {
        self.undo_stack.iter()
    }
}
