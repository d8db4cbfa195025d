use runtime::FrameScheduler;

use crate::input::InputEvent;

/// Size of the host element in CSS pixels.
#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct HostSize {
    pub width: f64,
    pub height: f64,
}

impl HostSize {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Cursor {
    Grab,
    Grabbing,
}

impl Cursor {
    pub fn as_css(self) -> &'static str {
        match self {
            Cursor::Grab => "grab",
            Cursor::Grabbing => "grabbing",
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ListenerKind {
    PointerDown,
    PointerMove,
    PointerUp,
    PointerLeave,
    Wheel,
    /// Window resize, not element resize.
    Resize,
}

impl ListenerKind {
    /// Registration order.
    pub const ALL: [ListenerKind; 6] = [
        ListenerKind::PointerDown,
        ListenerKind::PointerMove,
        ListenerKind::PointerUp,
        ListenerKind::PointerLeave,
        ListenerKind::Wheel,
        ListenerKind::Resize,
    ];

    pub fn event_name(self) -> &'static str {
        match self {
            ListenerKind::PointerDown => "pointerdown",
            ListenerKind::PointerMove => "pointermove",
            ListenerKind::PointerUp => "pointerup",
            ListenerKind::PointerLeave => "pointerleave",
            ListenerKind::Wheel => "wheel",
            ListenerKind::Resize => "resize",
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ListenerId(pub u64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostError(pub String);

impl std::fmt::Display for HostError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for HostError {}

/// The element a viewer draws into, and the document around it.
///
/// Listeners registered here queue [`InputEvent`]s that the session drains
/// once per frame. Implementations are cheap handles: clones refer to the
/// same element.
pub trait HostSurface: FrameScheduler + Clone {
    fn size(&self) -> HostSize;

    fn set_cursor(&mut self, cursor: Cursor);

    /// Hands the cursor back to the page's own styling.
    fn clear_cursor(&mut self);

    /// Suppresses document scrolling while a viewer is mounted.
    fn set_scroll_suppressed(&mut self, suppressed: bool);

    fn add_listener(&mut self, kind: ListenerKind) -> Result<ListenerId, HostError>;

    fn remove_listener(&mut self, id: ListenerId);

    fn drain_input(&mut self) -> Vec<InputEvent>;
}
