use foundation::math::Vec2;

use crate::host::Cursor;

/// Input delivered by the host's listeners, in CSS pixels.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum InputEvent {
    PointerDown { x: f64, y: f64 },
    PointerMove { x: f64, y: f64 },
    PointerUp,
    PointerLeave,
    Wheel { delta_y: f64 },
    Resize,
}

/// What one frame's worth of input asks for.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Gesture {
    /// Sum of pointer movement while a button was held.
    pub drag_delta: Vec2,
    /// Wheel deltas in arrival order. Each is applied and clamped on its own.
    pub wheel_deltas: Vec<f64>,
    pub cursor: Option<Cursor>,
    pub resized: bool,
}

/// Accumulates input between frames.
#[derive(Debug, Default)]
pub struct GestureState {
    last_pointer: Option<Vec2>,
    pending: Gesture,
}

impl GestureState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_dragging(&self) -> bool {
        self.last_pointer.is_some()
    }

    pub fn apply(&mut self, event: InputEvent) {
        match event {
            InputEvent::PointerDown { x, y } => {
                self.last_pointer = Some(Vec2::new(x, y));
                self.pending.cursor = Some(Cursor::Grabbing);
            }
            InputEvent::PointerMove { x, y } => {
                if let Some(last) = self.last_pointer {
                    let now = Vec2::new(x, y);
                    self.pending.drag_delta += now - last;
                    self.last_pointer = Some(now);
                }
            }
            InputEvent::PointerUp | InputEvent::PointerLeave => {
                self.last_pointer = None;
                self.pending.cursor = Some(Cursor::Grab);
            }
            InputEvent::Wheel { delta_y } => {
                if delta_y.is_finite() {
                    self.pending.wheel_deltas.push(delta_y);
                }
            }
            InputEvent::Resize => self.pending.resized = true,
        }
    }

    /// Takes the accumulated gesture. Drag state carries over.
    pub fn drain(&mut self) -> Gesture {
        std::mem::take(&mut self.pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn moves_only_count_while_dragging() {
        let mut g = GestureState::new();
        g.apply(InputEvent::PointerMove { x: 5.0, y: 5.0 });
        g.apply(InputEvent::PointerDown { x: 10.0, y: 10.0 });
        g.apply(InputEvent::PointerMove { x: 14.0, y: 7.0 });
        g.apply(InputEvent::PointerMove { x: 20.0, y: 7.0 });

        let gesture = g.drain();
        assert_eq!(gesture.drag_delta, Vec2::new(10.0, -3.0));
        assert_eq!(gesture.cursor, Some(Cursor::Grabbing));
        assert!(g.is_dragging());
    }

    #[test]
    fn drag_continues_across_frames() {
        let mut g = GestureState::new();
        g.apply(InputEvent::PointerDown { x: 0.0, y: 0.0 });
        g.drain();
        g.apply(InputEvent::PointerMove { x: 3.0, y: 4.0 });
        let gesture = g.drain();
        assert_eq!(gesture.drag_delta, Vec2::new(3.0, 4.0));
        assert_eq!(gesture.cursor, None);
    }

    #[test]
    fn leave_ends_the_drag_and_restores_cursor() {
        let mut g = GestureState::new();
        g.apply(InputEvent::PointerDown { x: 0.0, y: 0.0 });
        g.apply(InputEvent::PointerLeave);
        g.apply(InputEvent::PointerMove { x: 50.0, y: 0.0 });

        let gesture = g.drain();
        assert_eq!(gesture.drag_delta, Vec2::ZERO);
        assert_eq!(gesture.cursor, Some(Cursor::Grab));
        assert!(!g.is_dragging());
    }

    #[test]
    fn wheel_deltas_keep_their_order() {
        let mut g = GestureState::new();
        g.apply(InputEvent::Wheel { delta_y: 100.0 });
        g.apply(InputEvent::Wheel { delta_y: f64::NAN });
        g.apply(InputEvent::Wheel { delta_y: -40.0 });
        g.apply(InputEvent::Resize);

        let gesture = g.drain();
        assert_eq!(gesture.wheel_deltas, vec![100.0, -40.0]);
        assert!(gesture.resized);
        assert_eq!(g.drain(), Gesture::default());
    }
}
