//! In-memory host and loader for driving viewers in tests.

use std::cell::RefCell;
use std::collections::{BTreeMap, VecDeque};
use std::rc::Rc;

use gpu::GpuBackend;
use runtime::{FrameRequestId, FrameScheduler, ManualScheduler, ScheduleError};

use crate::error::ErrorChannel;
use crate::host::{Cursor, HostError, HostSize, HostSurface, ListenerId, ListenerKind};
use crate::input::InputEvent;
use crate::texture::{LoadTicket, TextureLoader};
use crate::viewer::Viewer;

#[derive(Debug, Default)]
struct FakeHostState {
    size: HostSize,
    cursor: Option<Cursor>,
    scroll_changes: Vec<bool>,
    listeners: BTreeMap<ListenerId, ListenerKind>,
    next_listener: u64,
    fail_listener: Option<ListenerKind>,
    input: VecDeque<InputEvent>,
    scheduler: ManualScheduler,
}

#[derive(Debug, Clone, Default)]
pub struct FakeHost(Rc<RefCell<FakeHostState>>);

impl FakeHost {
    pub fn new(width: f64, height: f64) -> Self {
        let host = Self::default();
        host.set_size(width, height);
        host
    }

    pub fn set_size(&self, width: f64, height: f64) {
        self.0.borrow_mut().size = HostSize::new(width, height);
    }

    pub fn push(&self, event: InputEvent) {
        self.0.borrow_mut().input.push_back(event);
    }

    pub fn cursor(&self) -> Option<Cursor> {
        self.0.borrow().cursor
    }

    pub fn scroll_suppressed(&self) -> bool {
        self.0.borrow().scroll_changes.last().copied().unwrap_or(false)
    }

    pub fn scroll_changes(&self) -> Vec<bool> {
        self.0.borrow().scroll_changes.clone()
    }

    pub fn listener_count(&self) -> usize {
        self.0.borrow().listeners.len()
    }

    pub fn fail_listener(&self, kind: ListenerKind) {
        self.0.borrow_mut().fail_listener = Some(kind);
    }

    pub fn fail_frames(&self, fail: bool) {
        self.0.borrow_mut().scheduler.set_fail_requests(fail);
    }

    pub fn queued_frames(&self) -> usize {
        self.0.borrow().scheduler.queued()
    }

    pub fn requested_frames(&self) -> u64 {
        self.0.borrow().scheduler.requested_total()
    }

    pub fn take_due(&self) -> Vec<FrameRequestId> {
        self.0.borrow_mut().scheduler.take_due()
    }
}

impl FrameScheduler for FakeHost {
    fn request_frame(&mut self) -> Result<FrameRequestId, ScheduleError> {
        self.0.borrow_mut().scheduler.request_frame()
    }

    fn cancel_frame(&mut self, id: FrameRequestId) {
        self.0.borrow_mut().scheduler.cancel_frame(id);
    }
}

impl HostSurface for FakeHost {
    fn size(&self) -> HostSize {
        self.0.borrow().size
    }

    fn set_cursor(&mut self, cursor: Cursor) {
        self.0.borrow_mut().cursor = Some(cursor);
    }

    fn clear_cursor(&mut self) {
        self.0.borrow_mut().cursor = None;
    }

    fn set_scroll_suppressed(&mut self, suppressed: bool) {
        self.0.borrow_mut().scroll_changes.push(suppressed);
    }

    fn add_listener(&mut self, kind: ListenerKind) -> Result<ListenerId, HostError> {
        let mut state = self.0.borrow_mut();
        if state.fail_listener == Some(kind) {
            return Err(HostError(format!("{} listener rejected", kind.event_name())));
        }
        state.next_listener += 1;
        let id = ListenerId(state.next_listener);
        state.listeners.insert(id, kind);
        Ok(id)
    }

    fn remove_listener(&mut self, id: ListenerId) {
        self.0.borrow_mut().listeners.remove(&id);
    }

    fn drain_input(&mut self) -> Vec<InputEvent> {
        self.0.borrow_mut().input.drain(..).collect()
    }
}

/// Records load requests; tests deliver results by hand.
#[derive(Debug, Clone, Default)]
pub struct FakeLoader(Rc<RefCell<Vec<(LoadTicket, String)>>>);

impl FakeLoader {
    pub fn take_requests(&self) -> Vec<(LoadTicket, String)> {
        std::mem::take(&mut *self.0.borrow_mut())
    }
}

impl TextureLoader for FakeLoader {
    fn load(&mut self, ticket: LoadTicket, locator: &str) {
        self.0.borrow_mut().push((ticket, locator.to_string()));
    }
}

pub fn error_sink() -> (ErrorChannel, Rc<RefCell<Vec<String>>>) {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();
    let channel = ErrorChannel::new(move |msg| sink.borrow_mut().push(msg.to_string()));
    (channel, seen)
}

/// Fires the host's due animation frame, if one is queued.
pub fn run_frame<G: GpuBackend, L: TextureLoader>(
    viewer: &mut Viewer<G, FakeHost, L>,
    host: &FakeHost,
    timestamp_ms: f64,
) -> bool {
    if host.take_due().is_empty() {
        return false;
    }
    viewer.tick(timestamp_ms)
}
