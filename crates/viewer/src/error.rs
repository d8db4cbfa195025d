use std::rc::Rc;

use gpu::GpuError;
use runtime::ScheduleError;
use scene::SceneError;

use crate::config::ConfigError;
use crate::host::HostError;
use crate::texture::TextureLoadError;

#[derive(Debug, Clone, PartialEq)]
pub enum ViewerError {
    Config(ConfigError),
    /// No rendering context could be acquired.
    Context(GpuError),
    Geometry(GpuError),
    Scene(SceneError),
    Listener(HostError),
    Schedule(ScheduleError),
    TextureLoad(TextureLoadError),
    /// A context arrived for an open request that was replaced or closed.
    Superseded,
}

impl std::fmt::Display for ViewerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ViewerError::Config(err) => write!(f, "{err}"),
            ViewerError::Context(err) => write!(f, "Failed to initialize renderer: {err}"),
            ViewerError::Geometry(err) => write!(f, "Failed to create panorama geometry: {err}"),
            ViewerError::Scene(err) => write!(f, "Failed to build panorama scene: {err}"),
            ViewerError::Listener(err) => write!(f, "Failed to attach input listeners: {err}"),
            ViewerError::Schedule(err) => write!(f, "Failed to start render loop: {err}"),
            ViewerError::TextureLoad(err) => write!(f, "Failed to load image texture: {err}"),
            ViewerError::Superseded => write!(f, "open request superseded"),
        }
    }
}

impl std::error::Error for ViewerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ViewerError::Config(err) => Some(err),
            ViewerError::Context(err) | ViewerError::Geometry(err) => Some(err),
            ViewerError::Scene(err) => Some(err),
            ViewerError::Listener(err) => Some(err),
            ViewerError::Schedule(err) => Some(err),
            ViewerError::TextureLoad(err) => Some(err),
            ViewerError::Superseded => None,
        }
    }
}

impl From<ConfigError> for ViewerError {
    fn from(err: ConfigError) -> Self {
        ViewerError::Config(err)
    }
}

impl From<SceneError> for ViewerError {
    fn from(err: SceneError) -> Self {
        ViewerError::Scene(err)
    }
}

impl From<HostError> for ViewerError {
    fn from(err: HostError) -> Self {
        ViewerError::Listener(err)
    }
}

impl From<ScheduleError> for ViewerError {
    fn from(err: ScheduleError) -> Self {
        ViewerError::Schedule(err)
    }
}

impl From<TextureLoadError> for ViewerError {
    fn from(err: TextureLoadError) -> Self {
        ViewerError::TextureLoad(err)
    }
}

/// The embedder's `on_error(message)` callback.
#[derive(Clone)]
pub struct ErrorChannel(Rc<dyn Fn(&str)>);

impl ErrorChannel {
    pub fn new(callback: impl Fn(&str) + 'static) -> Self {
        Self(Rc::new(callback))
    }

    /// Drops every report.
    pub fn silent() -> Self {
        Self::new(|_| {})
    }

    pub fn report(&self, err: &ViewerError) {
        self.report_message(&err.to_string());
    }

    /// Reports a failure that happened outside a session, such as resolving
    /// where the image lives.
    pub fn report_message(&self, message: &str) {
        tracing::warn!(error = %message, "viewer error");
        (self.0)(message);
    }
}

impl std::fmt::Debug for ErrorChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ErrorChannel")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[test]
    fn channel_receives_display_text() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        let channel = ErrorChannel::new(move |msg| sink.borrow_mut().push(msg.to_string()));

        channel.report(&ViewerError::TextureLoad(TextureLoadError::Network(
            "404 Not Found".to_string(),
        )));
        assert_eq!(
            seen.borrow().as_slice(),
            ["Failed to load image texture: network error: 404 Not Found"]
        );
    }

    #[test]
    fn errors_chain_their_source() {
        use std::error::Error;
        let err = ViewerError::Context(GpuError::ContextUnavailable("no adapter".to_string()));
        assert!(err.source().is_some());
        assert!(ViewerError::Superseded.source().is_none());
    }
}
