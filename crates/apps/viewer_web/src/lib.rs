use console_error_panic_hook::set_once;
use std::cell::RefCell;
use std::rc::{Rc, Weak};
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::spawn_local;

use gpu::{GpuBackend, SurfaceSize};
use viewer::{ErrorChannel, HostSurface, SessionId, Viewer, ViewerConfig};

mod dom;
mod loader;
mod route;
mod wgpu;

use dom::DomHost;
use loader::ImageLoader;
use wgpu::WgpuBackend;

pub(crate) type WebViewer = Viewer<WgpuBackend, DomHost, ImageLoader>;

#[wasm_bindgen(start)]
pub fn start() -> Result<(), JsValue> {
    set_once();
    // A second module instance on the page finds the logger already set.
    let _ = console_log::init_with_level(log::Level::Info);
    Ok(())
}

/// Panorama viewer bound to one container element.
///
/// The same instance serves a modal (call `open` with each new image) and a
/// standalone page (`open_by_hash`). Failures reach `on_error(message)`;
/// nothing throws across this boundary except a malformed config.
#[wasm_bindgen]
pub struct PanoramaViewer {
    viewer: Rc<RefCell<WebViewer>>,
    host: DomHost,
    errors: ErrorChannel,
}

#[wasm_bindgen]
impl PanoramaViewer {
    #[wasm_bindgen(constructor)]
    pub fn new(container: web_sys::HtmlElement, on_error: js_sys::Function) -> Result<PanoramaViewer, JsValue> {
        // Deferred to a microtask: reports are raised while the viewer is
        // borrowed, and the callback may call straight back into it.
        let errors = ErrorChannel::new(move |message| {
            let callback = on_error.clone();
            let message = JsValue::from_str(message);
            spawn_local(async move {
                if let Err(err) = callback.call1(&JsValue::NULL, &message) {
                    tracing::warn!(?err, "on_error callback threw");
                }
            });
        });
        let host = DomHost::new(container)?;
        let viewer = Rc::new_cyclic(|weak: &Weak<RefCell<WebViewer>>| {
            RefCell::new(Viewer::new(
                host.clone(),
                ImageLoader::new(weak.clone()),
                ViewerConfig::default(),
                errors.clone(),
            ))
        });

        let frame_target = Rc::downgrade(&viewer);
        host.set_frame_callback(Closure::<dyn FnMut(f64)>::new(move |timestamp_ms: f64| {
            if let Some(viewer) = frame_target.upgrade() {
                viewer.borrow_mut().tick(timestamp_ms);
            }
        }));

        Ok(PanoramaViewer { viewer, host, errors })
    }

    /// Shows `image_url`, replacing whatever is shown. Re-opening the image
    /// already shown keeps the current session.
    pub fn open(&self, image_url: String) {
        if self.viewer.borrow().locator() == Some(image_url.as_str()) {
            return;
        }
        open_url(&self.viewer, &self.host, image_url);
    }

    /// Like `open`, with a JSON `ViewerConfig`. Unknown fields are ignored,
    /// missing ones take their defaults.
    pub fn open_with_config(&self, image_url: String, config_json: &str) -> Result<(), JsValue> {
        let config = ViewerConfig::from_json(config_json).map_err(|e| JsValue::from_str(&e.to_string()))?;
        self.viewer.borrow_mut().set_config(config);
        open_url(&self.viewer, &self.host, image_url);
        Ok(())
    }

    /// Standalone route: looks the image up by its content hash first.
    pub fn open_by_hash(&self, api_base: String, hash: String) {
        let viewer = Rc::downgrade(&self.viewer);
        let host = self.host.clone();
        let errors = self.errors.clone();
        spawn_local(async move {
            match route::resolve_hash(&api_base, &hash).await {
                Ok(image_url) => {
                    if let Some(viewer) = viewer.upgrade() {
                        open_url(&viewer, &host, image_url);
                    }
                }
                Err(err) => errors.report_message(&err.to_string()),
            }
        });
    }

    /// Tears the current session down. The viewer can be opened again.
    pub fn close(&self) {
        self.viewer.borrow_mut().close();
    }

    pub fn fov_deg(&self) -> Option<f64> {
        self.viewer.borrow().fov_deg()
    }
}

impl Drop for PanoramaViewer {
    fn drop(&mut self) {
        if let Ok(mut viewer) = self.viewer.try_borrow_mut() {
            viewer.close();
        }
    }
}

fn open_url(viewer: &Rc<RefCell<WebViewer>>, host: &DomHost, image_url: String) {
    let (id, size) = {
        let mut viewer = viewer.borrow_mut();
        let id = viewer.begin_open(image_url);
        let css = host.size();
        (id, SurfaceSize::from_css(css.width, css.height, viewer.config().pixel_ratio))
    };
    let container = host.container();
    let target = Rc::downgrade(viewer);
    spawn_local(async move {
        let context = WgpuBackend::acquire(&container, size).await;
        finish_open(&target, id, context);
    });
}

fn finish_open(
    target: &Weak<RefCell<WebViewer>>,
    id: SessionId,
    context: Result<WgpuBackend, gpu::GpuError>,
) {
    match target.upgrade() {
        Some(viewer) => {
            // Mount failures were already reported through on_error.
            if let Err(err) = viewer.borrow_mut().finish_open(id, context) {
                tracing::debug!(session = %id, error = %err, "open did not complete");
            }
        }
        None => {
            if let Ok(mut gpu) = context {
                gpu.release();
            }
        }
    }
}
