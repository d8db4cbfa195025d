use foundation::{ResourceHandle, ResourceKind};
use gpu::{GpuBackend, GpuError, Renderer, ResourceLedger};
use runtime::{CancelToken, EventBus, FrameLoop, Metrics};
use scene::{CameraState, PanoramaScene, build_panorama_sphere};

use crate::config::ViewerConfig;
use crate::error::{ErrorChannel, ViewerError};
use crate::host::{Cursor, HostSurface, ListenerId, ListenerKind};
use crate::input::GestureState;
use crate::orbit::{OrbitController, WheelZoom};
use crate::resize::ResizeReactor;
use crate::texture::{LoadTicket, TextureLoadError, TextureLoadOutcome, TextureLoader, upload_texture};

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SessionId(pub u64);

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TextureState {
    Pending { seq: u64 },
    Settled(TextureLoadOutcome),
}

/// Everything one mounted image owns.
///
/// Resources are acquired in a fixed order by [`ViewerSession::mount`] and
/// released in reverse by [`ViewerSession::dispose`], which also runs on
/// drop. After disposal no method acquires anything.
pub struct ViewerSession<G: GpuBackend, H: HostSurface> {
    id: SessionId,
    locator: String,
    config: ViewerConfig,
    host: H,
    errors: ErrorChannel,
    gpu: Option<G>,
    ledger: ResourceLedger,
    camera: CameraState,
    scene: PanoramaScene,
    orbit: OrbitController,
    zoom: WheelZoom,
    gestures: GestureState,
    resize: ResizeReactor,
    frame_loop: FrameLoop,
    token: CancelToken,
    listeners: Vec<ListenerId>,
    scroll_suppressed: bool,
    cursor_set: bool,
    texture: Option<TextureState>,
    disposed: bool,
    events: EventBus,
    metrics: Metrics,
}

impl<G: GpuBackend, H: HostSurface> ViewerSession<G, H> {
    /// Acquires everything for `locator` and starts rendering.
    ///
    /// Order: scroll suppression, rendering context, sphere geometry,
    /// texture request, input listeners, render loop. If a step fails the
    /// error is reported on `errors`, the steps already taken are undone and
    /// the loop never starts.
    pub fn mount(
        id: SessionId,
        locator: impl Into<String>,
        config: ViewerConfig,
        host: H,
        errors: ErrorChannel,
        loader: &mut impl TextureLoader,
        acquire: impl FnOnce() -> Result<G, GpuError>,
    ) -> Result<Self, ViewerError> {
        let locator = locator.into();
        let size = host.size();
        let camera = config.initial_camera(if size.height > 0.0 { size.width / size.height } else { 1.0 });
        let token = CancelToken::new();
        let mut session = Self {
            id,
            orbit: OrbitController::new(&config.orbit),
            zoom: WheelZoom::new(&config.camera),
            resize: ResizeReactor::new(config.pixel_ratio),
            frame_loop: FrameLoop::with_token(token.clone()),
            token,
            locator,
            config,
            host,
            errors,
            gpu: None,
            ledger: ResourceLedger::new(),
            camera,
            scene: PanoramaScene::new(),
            gestures: GestureState::new(),
            listeners: Vec::new(),
            scroll_suppressed: false,
            cursor_set: false,
            texture: None,
            disposed: false,
            events: EventBus::new(),
            metrics: Metrics::new(),
        };
        tracing::info!(session = %id, locator = %session.locator, "mounting panorama");
        session.events.emit("mount", session.locator.clone());

        if let Err(err) = session.acquire_resources(loader, acquire) {
            session.errors.report(&err);
            session.events.emit("mount_failed", err.to_string());
            session.dispose();
            return Err(err);
        }
        Ok(session)
    }

    fn acquire_resources(
        &mut self,
        loader: &mut impl TextureLoader,
        acquire: impl FnOnce() -> Result<G, GpuError>,
    ) -> Result<(), ViewerError> {
        self.host.set_scroll_suppressed(true);
        self.scroll_suppressed = true;

        let gpu = acquire().map_err(ViewerError::Context)?;
        self.ledger.track(gpu.context());
        let gpu = self.gpu.insert(gpu);
        self.events.emit("context_acquired", gpu.context().to_string());

        if let Some(change) = self.resize.observe(self.host.size()) {
            self.camera.set_aspect_from_size(change.css.width, change.css.height);
            gpu.resize_surface(change.backing);
        }

        let sphere = &self.config.sphere;
        let mesh = build_panorama_sphere(sphere.radius, sphere.width_segments, sphere.height_segments);
        let geometry = gpu.create_geometry(&mesh).map_err(ViewerError::Geometry)?;
        self.ledger.track(geometry);
        self.scene.set_geometry(geometry, mesh.index_count())?;
        self.events.emit("geometry_created", geometry.to_string());
        self.sync_gauges();

        let ticket = LoadTicket {
            session: self.id,
            seq: 1,
            token: self.token.clone(),
        };
        self.texture = Some(TextureState::Pending { seq: ticket.seq });
        loader.load(ticket, &self.locator);
        self.events.emit("texture_requested", self.locator.clone());

        // Input queued for an earlier session must not reach this one.
        self.host.drain_input();
        for kind in ListenerKind::ALL {
            let id = self.host.add_listener(kind)?;
            self.listeners.push(id);
        }
        self.host.set_cursor(Cursor::Grab);
        self.cursor_set = true;
        self.events.emit("listeners_attached", self.listeners.len().to_string());

        self.frame_loop.start(&mut self.host)?;
        self.events.emit("loop_started", "");
        Ok(())
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn locator(&self) -> &str {
        &self.locator
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    pub fn camera(&self) -> &CameraState {
        &self.camera
    }

    pub fn scene(&self) -> &PanoramaScene {
        &self.scene
    }

    pub fn ledger(&self) -> &ResourceLedger {
        &self.ledger
    }

    pub fn backend(&self) -> Option<&G> {
        self.gpu.as_ref()
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub fn texture_state(&self) -> Option<&TextureState> {
        self.texture.as_ref()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_running(&self) -> bool {
        self.frame_loop.is_running()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Runs one animation-frame callback. Returns whether a frame rendered.
    pub fn tick(&mut self, timestamp_ms: f64) -> bool {
        if self.disposed {
            return false;
        }
        let Some(frame) = self.frame_loop.begin_frame(timestamp_ms) else {
            return false;
        };
        self.events.set_frame(frame.index);

        for event in self.host.drain_input() {
            self.gestures.apply(event);
        }
        let gesture = self.gestures.drain();
        if let Some(cursor) = gesture.cursor {
            self.host.set_cursor(cursor);
        }
        for delta_y in gesture.wheel_deltas {
            self.zoom.apply(&mut self.camera, delta_y);
            self.metrics.inc_counter("wheel_events", 1);
        }

        // Polled every frame so layout changes without a window resize are
        // caught as well.
        let size = self.host.size();
        if let Some(change) = self.resize.observe(size) {
            self.camera.set_aspect_from_size(change.css.width, change.css.height);
            if let Some(gpu) = self.gpu.as_mut() {
                gpu.resize_surface(change.backing);
            }
            self.metrics.inc_counter("resize_applied", 1);
            tracing::debug!(
                session = %self.id,
                width = change.backing.width,
                height = change.backing.height,
                window_resize = gesture.resized,
                "surface resized"
            );
        }

        self.orbit.rotate_by_pixels(gesture.drag_delta, size.height);
        self.orbit.update(&mut self.camera);

        let rendered = match self.gpu.as_mut() {
            Some(gpu) => {
                let render_frame = Renderer::collect(&self.scene, &self.camera, self.config.clear_color);
                match gpu.render(&render_frame) {
                    Ok(()) => true,
                    Err(err) => {
                        tracing::warn!(session = %self.id, error = %err, "frame not rendered");
                        self.events.emit("render_failed", err.to_string());
                        false
                    }
                }
            }
            None => false,
        };
        if rendered {
            self.metrics.inc_counter("frames_rendered", 1);
        }

        if let Err(err) = self.frame_loop.reschedule(&mut self.host) {
            tracing::warn!(session = %self.id, error = %err, "render loop stopped");
            self.events.emit("loop_stalled", err.to_string());
        }
        rendered
    }

    /// Applies a texture result delivered for `ticket`.
    ///
    /// Results for a disposed session, or for a request this session is no
    /// longer waiting on, are discarded without touching anything.
    pub fn settle_texture(
        &mut self,
        ticket: &LoadTicket,
        result: Result<G::Image, TextureLoadError>,
    ) -> TextureLoadOutcome {
        let waiting = matches!(self.texture, Some(TextureState::Pending { seq }) if seq == ticket.seq);
        if self.disposed || ticket.is_cancelled() || ticket.session != self.id || !waiting {
            tracing::debug!(session = %self.id, "discarding stale texture result");
            self.events.emit("texture_discarded", ticket.seq.to_string());
            return TextureLoadOutcome::Discarded;
        }
        let Some(gpu) = self.gpu.as_mut() else {
            return TextureLoadOutcome::Discarded;
        };

        let uploaded = match result {
            Ok(image) => upload_texture(gpu, &mut self.ledger, &image),
            Err(err) => Err(err),
        };
        let attached = match uploaded {
            Ok((texture, material)) => match self.scene.attach_material(texture, material) {
                Ok(()) => Ok((texture, material)),
                Err(err) => {
                    release_handle(gpu, &mut self.ledger, material);
                    release_handle(gpu, &mut self.ledger, texture);
                    Err(ViewerError::Scene(err))
                }
            },
            Err(err) => Err(ViewerError::TextureLoad(err)),
        };

        let outcome = match attached {
            Ok((texture, material)) => {
                tracing::info!(session = %self.id, %texture, "panorama texture attached");
                self.events.emit("texture_attached", texture.to_string());
                TextureLoadOutcome::Attached { texture, material }
            }
            Err(err) => {
                self.errors.report(&err);
                self.events.emit("texture_failed", err.to_string());
                TextureLoadOutcome::Failed(err.to_string())
            }
        };
        self.sync_gauges();
        self.texture = Some(TextureState::Settled(outcome.clone()));
        outcome
    }

    /// Tears everything down in reverse acquisition order. Idempotent.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        self.events.emit("dispose", self.locator.clone());

        self.frame_loop.cancel(&mut self.host);

        for id in self.listeners.drain(..).rev() {
            self.host.remove_listener(id);
        }
        let dropped = self.host.drain_input().len();
        if dropped > 0 {
            tracing::debug!(session = %self.id, dropped, "discarded unprocessed input");
        }

        if self.scene.mesh().is_some() {
            self.events.emit("mesh_released", "");
        }
        let (material, texture) = self.scene.detach_material();
        let geometry = self.scene.take_geometry();
        if let Some(gpu) = self.gpu.as_mut() {
            for handle in [material, texture, geometry].into_iter().flatten() {
                release_handle(gpu, &mut self.ledger, handle);
            }
            let context = gpu.context();
            if self.ledger.release(context) {
                gpu.release();
            }
        }

        if self.cursor_set {
            self.host.clear_cursor();
            self.cursor_set = false;
        }
        if self.scroll_suppressed {
            self.host.set_scroll_suppressed(false);
            self.scroll_suppressed = false;
        }

        self.sync_gauges();
        tracing::info!(
            session = %self.id,
            leaked = self.ledger.total_live(),
            "panorama session disposed"
        );
    }

    fn sync_gauges(&mut self) {
        self.metrics
            .set_gauge("gpu_live_resources", self.ledger.total_live() as i64);
        self.metrics.set_gauge(
            "gpu_live_textures",
            self.ledger.live_count(ResourceKind::Texture) as i64,
        );
    }
}

fn release_handle<G: GpuBackend>(gpu: &mut G, ledger: &mut ResourceLedger, handle: ResourceHandle) {
    if ledger.release(handle) {
        gpu.destroy(handle);
    }
}

impl<G: GpuBackend, H: HostSurface> Drop for ViewerSession<G, H> {
    fn drop(&mut self) {
        self.dispose();
    }
}
