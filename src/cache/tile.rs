use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use crate::cache::lock;
use crate::cache::task::TaskEvent;
use crate::display::argb::ArgbImage;
use crate::foundation::core::FrameId;
use crate::foundation::rect::RectInt;
use crate::surface::Surface;

/// The cache unit: one rendered rectangle of one frame.
///
/// `surface` holds the raw render output until conversion; `display` holds
/// the converted compositor image afterwards; `event` is set exactly while
/// work is in flight. An erased tile has all three cleared, which is how a
/// stale completion recognizes it.
#[derive(Debug)]
pub struct Tile {
    pub frame: FrameId,
    pub rect: RectInt,
    pub surface: Mutex<Option<Surface>>,
    pub display: Mutex<Option<ArgbImage>>,
    pub event: Mutex<Option<Arc<TaskEvent>>>,
}

impl Tile {
    pub fn new(frame: FrameId, rect: RectInt) -> Self {
        Self {
            frame,
            rect,
            surface: Mutex::new(None),
            display: Mutex::new(None),
            event: Mutex::new(None),
        }
    }

    /// True while the tile's render task has not completed.
    pub fn in_flight(&self) -> bool {
        lock(&self.event).is_some()
    }

    /// True once the display image is available.
    pub fn display_ready(&self) -> bool {
        lock(&self.display).is_some()
    }

    /// True when every field has been cleared by erasure.
    pub(crate) fn is_removed(&self) -> bool {
        lock(&self.event).is_none()
            && lock(&self.surface).is_none()
            && lock(&self.display).is_none()
    }
}

/// Tiles of one frame, in insertion order.
pub type TileList = Vec<Arc<Tile>>;

/// All cached tiles, keyed by frame.
pub type TileMap = BTreeMap<FrameId, TileList>;

/// Rendering progress of one frame, for the timeline status strip.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum FrameStatus {
    /// Nothing rendered.
    #[default]
    None,
    /// Some region is rendered, none in flight.
    PartiallyDone,
    /// At least one tile is in flight.
    InProcess,
    /// The whole window is covered by converted tiles.
    Done,
}

/// Per-frame status snapshot.
pub type StatusMap = BTreeMap<FrameId, FrameStatus>;
