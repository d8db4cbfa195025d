/// One entry in a session's lifecycle trace.
///
/// `frame_index` is the index of the last frame that began before the event
/// was emitted, or `None` when it happened before the first frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub frame_index: Option<u64>,
    pub kind: &'static str,
    pub message: String,
}

/// Ordered, append-only lifecycle trace.
#[derive(Debug, Default)]
pub struct EventBus {
    current_frame: Option<u64>,
    events: Vec<Event>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_frame(&mut self, frame_index: u64) {
        self.current_frame = Some(frame_index);
    }

    pub fn emit(&mut self, kind: &'static str, message: impl Into<String>) {
        self.events.push(Event {
            frame_index: self.current_frame,
            kind,
            message: message.into(),
        });
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Event kinds in emission order.
    pub fn kinds(&self) -> Vec<&'static str> {
        self.events.iter().map(|e| e.kind).collect()
    }

    pub fn count(&self, kind: &str) -> usize {
        self.events.iter().filter(|e| e.kind == kind).count()
    }

    pub fn drain(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }
}
