use foundation::time::Time;

/// Nominal delta for the first frame, before any timestamp pair exists.
pub const NOMINAL_DT_S: f64 = 1.0 / 60.0;

/// Largest delta a single frame may report (tab switches, breakpoints).
pub const MAX_DT_S: f64 = 0.1;

/// Frame metadata.
///
/// This is the timebase handed to per-frame work. It is intentionally small
/// and pure so it can be recorded and replayed.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Frame {
    /// 0-based frame index.
    pub index: u64,
    /// Delta time (seconds).
    pub dt_s: f64,
    /// Engine time at the start of the frame (seconds).
    pub time: Time,
}

impl Frame {
    /// Fixed-timestep frame.
    pub fn new(index: u64, dt_s: f64) -> Self {
        Self {
            index,
            dt_s,
            time: Time(index as f64 * dt_s),
        }
    }

    pub fn next(self) -> Self {
        Self::new(self.index + 1, self.dt_s)
    }
}

/// Turns host animation-frame timestamps into [`Frame`]s.
///
/// Deltas are clamped to `[0, MAX_DT_S]` and engine time is the sum of the
/// clamped deltas, so a stalled tab does not produce a huge jump.
#[derive(Debug, Clone, Default)]
pub struct FrameClock {
    next_index: u64,
    last_timestamp_ms: Option<f64>,
    time_s: f64,
}

impl FrameClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames_elapsed(&self) -> u64 {
        self.next_index
    }

    pub fn tick(&mut self, timestamp_ms: f64) -> Frame {
        let dt_s = match self.last_timestamp_ms {
            Some(last) if timestamp_ms.is_finite() => {
                ((timestamp_ms - last) / 1000.0).clamp(0.0, MAX_DT_S)
            }
            _ => NOMINAL_DT_S,
        };
        if timestamp_ms.is_finite() {
            self.last_timestamp_ms = Some(timestamp_ms);
        }

        let frame = Frame {
            index: self.next_index,
            dt_s,
            time: Time(self.time_s),
        };
        self.next_index += 1;
        self.time_s += dt_s;
        frame
    }
}

#[cfg(test)]
mod tests {
    use super::{Frame, FrameClock, MAX_DT_S, NOMINAL_DT_S};
    use foundation::time::Time;

    #[test]
    fn frame_time_is_deterministic() {
        let a = Frame::new(10, 1.0 / 60.0);
        let b = Frame::new(10, 1.0 / 60.0);
        assert_eq!(a, b);
        assert_eq!(a.time, Time(10.0 / 60.0));
    }

    #[test]
    fn next_advances_index_and_time() {
        let f0 = Frame::new(0, 0.5);
        let f1 = f0.next();
        assert_eq!(f1.index, 1);
        assert_eq!(f1.time, Time(0.5));
    }

    #[test]
    fn clock_uses_timestamp_deltas() {
        let mut clock = FrameClock::new();
        let f0 = clock.tick(1000.0);
        assert_eq!(f0.index, 0);
        assert_eq!(f0.dt_s, NOMINAL_DT_S);

        let f1 = clock.tick(1020.0);
        assert_eq!(f1.index, 1);
        assert!((f1.dt_s - 0.02).abs() < 1e-12);
        assert_eq!(f1.time, Time(NOMINAL_DT_S));
    }

    #[test]
    fn clock_clamps_stalls_and_backwards_time() {
        let mut clock = FrameClock::new();
        clock.tick(0.0);
        assert_eq!(clock.tick(60_000.0).dt_s, MAX_DT_S);
        assert_eq!(clock.tick(10.0).dt_s, 0.0);
        assert_eq!(clock.frames_elapsed(), 3);
    }
}
