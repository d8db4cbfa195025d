use std::cell::RefCell;
use std::collections::{BTreeMap, VecDeque};
use std::rc::{Rc, Weak};

use runtime::{FrameRequestId, FrameScheduler, ScheduleError};
use viewer::{Cursor, HostError, HostSize, HostSurface, InputEvent, ListenerId, ListenerKind};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;

struct DomListener {
    target: web_sys::EventTarget,
    kind: ListenerKind,
    closure: Closure<dyn FnMut(web_sys::Event)>,
}

struct DomHostInner {
    window: web_sys::Window,
    container: web_sys::HtmlElement,
    input: VecDeque<InputEvent>,
    listeners: BTreeMap<ListenerId, DomListener>,
    next_listener: u64,
    frame_callback: Option<Closure<dyn FnMut(f64)>>,
    holds_scroll_lock: bool,
}

/// Page-wide count of hosts that want body scrolling suppressed. The first
/// holder saves the body's `overflow`; only the last one restores it.
#[derive(Debug, Default)]
struct ScrollLock {
    holders: u32,
    saved: Option<String>,
}

impl ScrollLock {
    /// True when the caller is the first holder and must hide overflow.
    fn acquire(&mut self, current: impl FnOnce() -> String) -> bool {
        self.holders += 1;
        if self.holders > 1 {
            return false;
        }
        self.saved = Some(current());
        true
    }

    /// The `overflow` value to put back once the last holder leaves.
    fn release(&mut self) -> Option<String> {
        if self.holders == 0 {
            return None;
        }
        self.holders -= 1;
        if self.holders > 0 {
            return None;
        }
        Some(
            self.saved
                .take()
                .filter(|value| !value.is_empty())
                .unwrap_or_else(|| "auto".to_string()),
        )
    }
}

thread_local! {
    static SCROLL_LOCK: RefCell<ScrollLock> = RefCell::new(ScrollLock::default());
}

/// The container element a viewer draws into, plus the window around it.
///
/// Listeners only queue [`InputEvent`]s; the viewer drains them on its next
/// animation frame.
#[derive(Clone)]
pub struct DomHost(Rc<RefCell<DomHostInner>>);

impl std::fmt::Debug for DomHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.0.borrow();
        f.debug_struct("DomHost")
            .field("listeners", &inner.listeners.len())
            .field("queued_input", &inner.input.len())
            .finish()
    }
}

fn host_error(what: &str, err: JsValue) -> HostError {
    HostError(format!("{what}: {err:?}"))
}

impl DomHost {
    pub fn new(container: web_sys::HtmlElement) -> Result<Self, JsValue> {
        let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;
        Ok(Self(Rc::new(RefCell::new(DomHostInner {
            window,
            container,
            input: VecDeque::new(),
            listeners: BTreeMap::new(),
            next_listener: 0,
            frame_callback: None,
            holds_scroll_lock: false,
        }))))
    }

    pub fn container(&self) -> web_sys::HtmlElement {
        self.0.borrow().container.clone()
    }

    /// Installs the callback every requested animation frame invokes.
    pub fn set_frame_callback(&self, callback: Closure<dyn FnMut(f64)>) {
        self.0.borrow_mut().frame_callback = Some(callback);
    }

    fn body_style(&self) -> Option<web_sys::CssStyleDeclaration> {
        let inner = self.0.borrow();
        inner.window.document()?.body().map(|body| body.style())
    }
}

fn translate(kind: ListenerKind, event: &web_sys::Event) -> Option<InputEvent> {
    match kind {
        ListenerKind::PointerDown | ListenerKind::PointerMove => {
            let pointer = event.dyn_ref::<web_sys::MouseEvent>()?;
            let (x, y) = (f64::from(pointer.client_x()), f64::from(pointer.client_y()));
            Some(if kind == ListenerKind::PointerDown {
                InputEvent::PointerDown { x, y }
            } else {
                InputEvent::PointerMove { x, y }
            })
        }
        ListenerKind::PointerUp => Some(InputEvent::PointerUp),
        ListenerKind::PointerLeave => Some(InputEvent::PointerLeave),
        ListenerKind::Wheel => {
            let wheel = event.dyn_ref::<web_sys::WheelEvent>()?;
            // Zooming replaces page scroll while over the viewer.
            event.prevent_default();
            Some(InputEvent::Wheel {
                delta_y: wheel.delta_y(),
            })
        }
        ListenerKind::Resize => Some(InputEvent::Resize),
    }
}

impl FrameScheduler for DomHost {
    fn request_frame(&mut self) -> Result<FrameRequestId, ScheduleError> {
        let inner = self.0.borrow();
        let callback = inner
            .frame_callback
            .as_ref()
            .ok_or_else(|| ScheduleError::Host("no frame callback installed".to_string()))?;
        inner
            .window
            .request_animation_frame(callback.as_ref().unchecked_ref())
            .map(|id| FrameRequestId(i64::from(id)))
            .map_err(|err| ScheduleError::Host(format!("requestAnimationFrame failed: {err:?}")))
    }

    fn cancel_frame(&mut self, id: FrameRequestId) {
        let Ok(id) = i32::try_from(id.0) else {
            return;
        };
        if let Err(err) = self.0.borrow().window.cancel_animation_frame(id) {
            tracing::debug!(?err, "cancelAnimationFrame failed");
        }
    }
}

impl HostSurface for DomHost {
    fn size(&self) -> HostSize {
        let inner = self.0.borrow();
        HostSize::new(
            f64::from(inner.container.client_width()),
            f64::from(inner.container.client_height()),
        )
    }

    fn set_cursor(&mut self, cursor: Cursor) {
        let inner = self.0.borrow();
        if let Err(err) = inner.container.style().set_property("cursor", cursor.as_css()) {
            tracing::debug!(?err, "cursor style rejected");
        }
    }

    fn clear_cursor(&mut self) {
        let inner = self.0.borrow();
        if let Err(err) = inner.container.style().remove_property("cursor") {
            tracing::debug!(?err, "cursor style not cleared");
        }
    }

    fn set_scroll_suppressed(&mut self, suppressed: bool) {
        let Some(style) = self.body_style() else {
            return;
        };
        {
            let mut inner = self.0.borrow_mut();
            if inner.holds_scroll_lock == suppressed {
                return;
            }
            inner.holds_scroll_lock = suppressed;
        }
        let result = if suppressed {
            let first = SCROLL_LOCK.with(|lock| {
                lock.borrow_mut()
                    .acquire(|| style.get_property_value("overflow").unwrap_or_default())
            });
            if !first {
                return;
            }
            style.set_property("overflow", "hidden")
        } else {
            match SCROLL_LOCK.with(|lock| lock.borrow_mut().release()) {
                Some(previous) => style.set_property("overflow", &previous),
                None => return,
            }
        };
        if let Err(err) = result {
            tracing::debug!(?err, "body overflow rejected");
        }
    }

    fn add_listener(&mut self, kind: ListenerKind) -> Result<ListenerId, HostError> {
        let queue: Weak<RefCell<DomHostInner>> = Rc::downgrade(&self.0);
        let closure = Closure::<dyn FnMut(web_sys::Event)>::new(move |event: web_sys::Event| {
            let Some(inner) = queue.upgrade() else {
                return;
            };
            if let Some(input) = translate(kind, &event) {
                inner.borrow_mut().input.push_back(input);
            }
        });

        let mut inner = self.0.borrow_mut();
        let target: web_sys::EventTarget = match kind {
            ListenerKind::Resize => inner.window.clone().into(),
            _ => inner.container.clone().into(),
        };
        let options = web_sys::AddEventListenerOptions::new();
        options.set_passive(kind != ListenerKind::Wheel);
        target
            .add_event_listener_with_callback_and_add_event_listener_options(
                kind.event_name(),
                closure.as_ref().unchecked_ref(),
                &options,
            )
            .map_err(|err| host_error(kind.event_name(), err))?;

        inner.next_listener += 1;
        let id = ListenerId(inner.next_listener);
        inner.listeners.insert(
            id,
            DomListener {
                target,
                kind,
                closure,
            },
        );
        Ok(id)
    }

    fn remove_listener(&mut self, id: ListenerId) {
        let Some(listener) = self.0.borrow_mut().listeners.remove(&id) else {
            return;
        };
        if let Err(err) = listener.target.remove_event_listener_with_callback(
            listener.kind.event_name(),
            listener.closure.as_ref().unchecked_ref(),
        ) {
            tracing::debug!(?err, event = listener.kind.event_name(), "listener removal failed");
        }
    }

    fn drain_input(&mut self) -> Vec<InputEvent> {
        self.0.borrow_mut().input.drain(..).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn nested_holders_restore_overflow_once() {
        let mut lock = ScrollLock::default();
        assert!(lock.acquire(|| "scroll".to_string()));
        // A second viewer sees the body already hidden.
        assert!(!lock.acquire(|| "hidden".to_string()));

        assert_eq!(lock.release(), None);
        assert_eq!(lock.release(), Some("scroll".to_string()));
        assert_eq!(lock.release(), None);
    }

    #[test]
    fn unset_overflow_restores_to_auto() {
        let mut lock = ScrollLock::default();
        assert!(lock.acquire(String::new));
        assert_eq!(lock.release(), Some("auto".to_string()));
    }

    #[test]
    fn lock_can_be_taken_again_after_release() {
        let mut lock = ScrollLock::default();
        lock.acquire(|| "visible".to_string());
        lock.release();
        assert!(lock.acquire(|| "clip".to_string()));
        assert_eq!(lock.release(), Some("clip".to_string()));
    }
}
