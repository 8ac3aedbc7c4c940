use kurbo::Point;

use crate::cache::task::SceneTask;
use crate::foundation::core::{Fps, Time};
use crate::foundation::rect::RectInt;

/// The document side of the cache: evaluates the scene into render tasks
/// and describes the timeline.
pub trait SceneSource: Send {
    /// Timeline frame rate.
    fn frame_rate(&self) -> Fps;

    /// Inclusive timeline bounds `[t0, t1]`.
    fn time_bounds(&self) -> (Time, Time);

    /// Document top-left and bottom-right corners in user space. Swapped
    /// components along an axis mean the document is flipped on that axis.
    fn document_corners(&self) -> (Point, Point);

    /// Build a render-task tree for the scene at `time`. `None` means the
    /// scene cannot be evaluated; affected tiles render as diagnostics.
    fn build_task(&mut self, time: Time) -> Option<Box<dyn SceneTask>>;
}

/// What the host viewport currently shows. Pushed into the cache before
/// every scheduling pass.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewState {
    /// Current timeline position.
    pub time: Time,
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Visible region of the frame, in viewport pixel coordinates.
    pub window_rect: RectInt,
    /// Offset of the frame origin inside the host window.
    pub window_offset: (i32, i32),
    /// Whether onion skinning is enabled.
    pub onion_skin: bool,
    /// Past neighbor frames to overlay.
    pub past: u32,
    /// Future neighbor frames to overlay.
    pub future: u32,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            time: Time::ZERO,
            width: 0,
            height: 0,
            window_rect: RectInt::default(),
            window_offset: (0, 0),
            onion_skin: false,
            past: 0,
            future: 0,
        }
    }
}
