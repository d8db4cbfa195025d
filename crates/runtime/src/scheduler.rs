use std::cell::Cell;
use std::collections::BTreeSet;
use std::rc::Rc;

use crate::frame::{Frame, FrameClock};

/// Identifier the host returns for a pending animation-frame request.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FrameRequestId(pub i64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduleError {
    /// The loop was cancelled; it never restarts.
    Cancelled,
    /// The host refused the request (no window, detached document, ...).
    Host(String),
}

impl std::fmt::Display for ScheduleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScheduleError::Cancelled => write!(f, "frame loop already cancelled"),
            ScheduleError::Host(msg) => write!(f, "animation frame request failed: {msg}"),
        }
    }
}

impl std::error::Error for ScheduleError {}

/// The platform's animation-frame primitive.
pub trait FrameScheduler {
    fn request_frame(&mut self) -> Result<FrameRequestId, ScheduleError>;
    fn cancel_frame(&mut self, id: FrameRequestId);
}

/// Shared, single-threaded cancellation flag. Tripping it is permanent.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Rc<Cell<bool>>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.set(true);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.get()
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Running,
    Cancelled,
}

/// A render loop modelled as one task on the host's event loop.
///
/// Each iteration is: host delivers a tick → [`FrameLoop::begin_frame`] →
/// caller does its per-frame work → [`FrameLoop::reschedule`]. At most one
/// request is outstanding at any time.
#[derive(Debug)]
pub struct FrameLoop {
    state: LoopState,
    pending: Option<FrameRequestId>,
    clock: FrameClock,
    token: CancelToken,
}

impl Default for FrameLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameLoop {
    pub fn new() -> Self {
        Self {
            state: LoopState::Idle,
            pending: None,
            clock: FrameClock::new(),
            token: CancelToken::new(),
        }
    }

    pub fn with_token(token: CancelToken) -> Self {
        Self {
            token,
            ..Self::new()
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == LoopState::Running
    }

    pub fn pending_request(&self) -> Option<FrameRequestId> {
        self.pending
    }

    pub fn token(&self) -> CancelToken {
        self.token.clone()
    }

    pub fn frames_begun(&self) -> u64 {
        self.clock.frames_elapsed()
    }

    pub fn start(&mut self, scheduler: &mut impl FrameScheduler) -> Result<(), ScheduleError> {
        match self.state {
            LoopState::Running => Ok(()),
            LoopState::Cancelled => Err(ScheduleError::Cancelled),
            LoopState::Idle => {
                if self.token.is_cancelled() {
                    self.state = LoopState::Cancelled;
                    return Err(ScheduleError::Cancelled);
                }
                self.pending = Some(scheduler.request_frame()?);
                self.state = LoopState::Running;
                Ok(())
            }
        }
    }

    /// Consumes the outstanding request and returns the frame to run.
    ///
    /// Returns `None` for ticks that must not run: the loop is cancelled, was
    /// never started, or the tick does not correspond to an outstanding
    /// request (a duplicate or late callback).
    pub fn begin_frame(&mut self, timestamp_ms: f64) -> Option<Frame> {
        if self.state != LoopState::Running || self.token.is_cancelled() {
            return None;
        }
        self.pending.take()?;
        Some(self.clock.tick(timestamp_ms))
    }

    pub fn reschedule(&mut self, scheduler: &mut impl FrameScheduler) -> Result<(), ScheduleError> {
        if self.state != LoopState::Running || self.token.is_cancelled() {
            return Err(ScheduleError::Cancelled);
        }
        if self.pending.is_none() {
            self.pending = Some(scheduler.request_frame()?);
        }
        Ok(())
    }

    /// Synchronous and idempotent.
    pub fn cancel(&mut self, scheduler: &mut impl FrameScheduler) {
        if let Some(id) = self.pending.take() {
            scheduler.cancel_frame(id);
        }
        if self.state != LoopState::Cancelled {
            tracing::trace!(frames = self.clock.frames_elapsed(), "frame loop cancelled");
        }
        self.state = LoopState::Cancelled;
        self.token.cancel();
    }
}

/// Deterministic [`FrameScheduler`] for headless drivers and tests.
///
/// Requests are queued until the driver fires them with [`ManualScheduler::take_due`].
#[derive(Debug, Default)]
pub struct ManualScheduler {
    next_id: i64,
    queued: BTreeSet<FrameRequestId>,
    requested_total: u64,
    cancelled_total: u64,
    fail_requests: bool,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every following request fail, as a detached document would.
    pub fn set_fail_requests(&mut self, fail: bool) {
        self.fail_requests = fail;
    }

    pub fn queued(&self) -> usize {
        self.queued.len()
    }

    pub fn requested_total(&self) -> u64 {
        self.requested_total
    }

    pub fn cancelled_total(&self) -> u64 {
        self.cancelled_total
    }

    /// Removes and returns every queued request, oldest first.
    pub fn take_due(&mut self) -> Vec<FrameRequestId> {
        std::mem::take(&mut self.queued).into_iter().collect()
    }
}

impl FrameScheduler for ManualScheduler {
    fn request_frame(&mut self) -> Result<FrameRequestId, ScheduleError> {
        if self.fail_requests {
            return Err(ScheduleError::Host("requests disabled".to_string()));
        }
        self.next_id += 1;
        let id = FrameRequestId(self.next_id);
        self.queued.insert(id);
        self.requested_total += 1;
        Ok(id)
    }

    fn cancel_frame(&mut self, id: FrameRequestId) {
        if self.queued.remove(&id) {
            self.cancelled_total += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{CancelToken, FrameLoop, LoopState, ManualScheduler, ScheduleError};

    #[test]
    fn start_requests_exactly_one_frame() {
        let mut sched = ManualScheduler::new();
        let mut lp = FrameLoop::new();
        lp.start(&mut sched).unwrap();
        lp.start(&mut sched).unwrap();
        assert_eq!(sched.queued(), 1);
        assert!(lp.is_running());
    }

    #[test]
    fn tick_then_reschedule_keeps_one_request_outstanding() {
        let mut sched = ManualScheduler::new();
        let mut lp = FrameLoop::new();
        lp.start(&mut sched).unwrap();

        for i in 0..5 {
            assert_eq!(sched.take_due().len(), 1);
            let frame = lp.begin_frame(i as f64 * 16.0).unwrap();
            assert_eq!(frame.index, i);
            lp.reschedule(&mut sched).unwrap();
        }
        assert_eq!(sched.queued(), 1);
        assert_eq!(lp.frames_begun(), 5);
    }

    #[test]
    fn duplicate_tick_without_request_does_not_run() {
        let mut sched = ManualScheduler::new();
        let mut lp = FrameLoop::new();
        lp.start(&mut sched).unwrap();
        assert!(lp.begin_frame(0.0).is_some());
        assert!(lp.begin_frame(1.0).is_none());
    }

    #[test]
    fn cancel_is_synchronous_and_idempotent() {
        let mut sched = ManualScheduler::new();
        let mut lp = FrameLoop::new();
        let token = lp.token();
        lp.start(&mut sched).unwrap();

        lp.cancel(&mut sched);
        lp.cancel(&mut sched);
        assert_eq!(lp.state(), LoopState::Cancelled);
        assert_eq!(sched.queued(), 0);
        assert_eq!(sched.cancelled_total(), 1);
        assert!(token.is_cancelled());

        // A callback the host had already queued still fires: it must not run.
        assert!(lp.begin_frame(16.0).is_none());
        assert_eq!(lp.reschedule(&mut sched), Err(ScheduleError::Cancelled));
        assert_eq!(lp.start(&mut sched), Err(ScheduleError::Cancelled));
    }

    #[test]
    fn shared_token_stops_the_loop() {
        let token = CancelToken::new();
        let mut sched = ManualScheduler::new();
        let mut lp = FrameLoop::with_token(token.clone());
        lp.start(&mut sched).unwrap();
        token.cancel();
        assert!(lp.begin_frame(0.0).is_none());
    }

    #[test]
    fn host_refusal_leaves_loop_idle() {
        let mut sched = ManualScheduler::new();
        sched.set_fail_requests(true);
        let mut lp = FrameLoop::new();
        assert!(matches!(lp.start(&mut sched), Err(ScheduleError::Host(_))));
        assert_eq!(lp.state(), LoopState::Idle);
    }
}
