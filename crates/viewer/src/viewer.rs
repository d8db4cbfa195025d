use gpu::{GpuBackend, GpuError};

use crate::config::ViewerConfig;
use crate::error::{ErrorChannel, ViewerError};
use crate::host::HostSurface;
use crate::session::{SessionId, ViewerSession};
use crate::texture::{LoadTicket, TextureLoadError, TextureLoadOutcome, TextureLoader};

#[derive(Debug, Clone)]
struct PendingOpen {
    id: SessionId,
    locator: String,
}

/// The reusable panorama component: one host surface, one error channel,
/// at most one live session.
///
/// Replacing the image tears the old session down completely before the
/// new one acquires anything.
pub struct Viewer<G: GpuBackend, H: HostSurface, L: TextureLoader> {
    host: H,
    loader: L,
    config: ViewerConfig,
    errors: ErrorChannel,
    session: Option<ViewerSession<G, H>>,
    pending: Option<PendingOpen>,
    next_session: u64,
}

impl<G: GpuBackend, H: HostSurface, L: TextureLoader> Viewer<G, H, L> {
    pub fn new(host: H, loader: L, config: ViewerConfig, errors: ErrorChannel) -> Self {
        Self {
            host,
            loader,
            config,
            errors,
            session: None,
            pending: None,
            next_session: 0,
        }
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    /// Takes effect for the next session.
    pub fn set_config(&mut self, config: ViewerConfig) {
        self.config = config;
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn loader(&self) -> &L {
        &self.loader
    }

    pub fn session(&self) -> Option<&ViewerSession<G, H>> {
        self.session.as_ref()
    }

    pub fn session_mut(&mut self) -> Option<&mut ViewerSession<G, H>> {
        self.session.as_mut()
    }

    pub fn locator(&self) -> Option<&str> {
        match (&self.session, &self.pending) {
            (Some(session), _) => Some(session.locator()),
            (None, Some(pending)) => Some(&pending.locator),
            (None, None) => None,
        }
    }

    fn allocate_id(&mut self) -> SessionId {
        self.next_session += 1;
        SessionId(self.next_session)
    }

    /// Mounts `locator` with a context acquired synchronously by `acquire`.
    pub fn open(
        &mut self,
        locator: impl Into<String>,
        acquire: impl FnOnce() -> Result<G, GpuError>,
    ) -> Result<SessionId, ViewerError> {
        self.close();
        let id = self.allocate_id();
        self.mount(id, locator.into(), acquire)
    }

    /// Switches to `locator`. Re-opening the image already shown is a no-op.
    pub fn set_locator(
        &mut self,
        locator: impl Into<String>,
        acquire: impl FnOnce() -> Result<G, GpuError>,
    ) -> Result<SessionId, ViewerError> {
        let locator = locator.into();
        if let Some(session) = &self.session {
            if session.locator() == locator && !session.is_disposed() {
                return Ok(session.id());
            }
        }
        tracing::debug!(%locator, "panorama locator changed");
        self.open(locator, acquire)
    }

    /// First half of an open whose context is acquired asynchronously.
    ///
    /// The current session is torn down now. Pass the returned id and the
    /// acquisition result to [`Viewer::finish_open`].
    pub fn begin_open(&mut self, locator: impl Into<String>) -> SessionId {
        self.close();
        let id = self.allocate_id();
        self.pending = Some(PendingOpen {
            id,
            locator: locator.into(),
        });
        id
    }

    /// Completes [`Viewer::begin_open`]. A context that arrives for a
    /// superseded or closed request is released on the spot.
    pub fn finish_open(&mut self, id: SessionId, context: Result<G, GpuError>) -> Result<SessionId, ViewerError> {
        match self.pending.take() {
            Some(pending) if pending.id == id => self.mount(id, pending.locator, move || context),
            other => {
                self.pending = other;
                if let Ok(mut gpu) = context {
                    gpu.release();
                }
                tracing::debug!(session = %id, "dropping context for superseded open");
                Err(ViewerError::Superseded)
            }
        }
    }

    fn mount(
        &mut self,
        id: SessionId,
        locator: String,
        acquire: impl FnOnce() -> Result<G, GpuError>,
    ) -> Result<SessionId, ViewerError> {
        let session = ViewerSession::mount(
            id,
            locator,
            self.config.clone(),
            self.host.clone(),
            self.errors.clone(),
            &mut self.loader,
            acquire,
        )?;
        self.session = Some(session);
        Ok(id)
    }

    /// Tears down the current session, if any, and forgets a pending open.
    pub fn close(&mut self) {
        self.pending = None;
        if let Some(mut session) = self.session.take() {
            session.dispose();
        }
    }

    /// Routes a texture result to the session that requested it.
    pub fn deliver_texture(
        &mut self,
        ticket: &LoadTicket,
        result: Result<G::Image, TextureLoadError>,
    ) -> TextureLoadOutcome {
        match self.session.as_mut() {
            Some(session) if session.id() == ticket.session => session.settle_texture(ticket, result),
            _ => {
                tracing::debug!(session = %ticket.session, "texture result for an inactive session");
                TextureLoadOutcome::Discarded
            }
        }
    }

    /// Animation-frame callback. Returns whether a frame rendered.
    pub fn tick(&mut self, timestamp_ms: f64) -> bool {
        self.session
            .as_mut()
            .is_some_and(|session| session.tick(timestamp_ms))
    }

    pub fn fov_deg(&self) -> Option<f64> {
        self.session.as_ref().map(|session| session.camera().fov_deg())
    }
}
