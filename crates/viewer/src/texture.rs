use foundation::ResourceHandle;
use gpu::{GpuBackend, GpuError, ResourceLedger};
use runtime::CancelToken;

use crate::session::SessionId;

/// Names one texture request. The platform loader hands it back with the
/// result so the viewer can route the result to the session that asked.
#[derive(Debug, Clone)]
pub struct LoadTicket {
    pub session: SessionId,
    pub seq: u64,
    /// Tripped when the requesting session is disposed.
    pub token: CancelToken,
}

impl LoadTicket {
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Starts fetching and decoding an image.
///
/// `load` must not block and must not report errors synchronously: the
/// result, success or failure, is delivered later through
/// `Viewer::deliver_texture` with the same ticket. A loader may stop early
/// once the ticket is cancelled, without delivering anything.
pub trait TextureLoader {
    fn load(&mut self, ticket: LoadTicket, locator: &str);
}

#[derive(Debug, Clone, PartialEq)]
pub enum TextureLoadError {
    Network(String),
    Decode(String),
    Unsupported(String),
    Upload(GpuError),
}

impl std::fmt::Display for TextureLoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TextureLoadError::Network(msg) => write!(f, "network error: {msg}"),
            TextureLoadError::Decode(msg) => write!(f, "image could not be decoded: {msg}"),
            TextureLoadError::Unsupported(msg) => write!(f, "unsupported image: {msg}"),
            TextureLoadError::Upload(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for TextureLoadError {}

impl From<GpuError> for TextureLoadError {
    fn from(err: GpuError) -> Self {
        match err {
            GpuError::ImageDecode(msg) => TextureLoadError::Decode(msg),
            other => TextureLoadError::Upload(other),
        }
    }
}

/// How a delivered texture result settled.
#[derive(Debug, Clone, PartialEq)]
pub enum TextureLoadOutcome {
    Attached {
        texture: ResourceHandle,
        material: ResourceHandle,
    },
    Failed(String),
    /// The result arrived for a session that is gone or no longer waiting.
    Discarded,
}

/// Uploads a decoded image and builds the material sampling it.
///
/// Both objects are tracked in `ledger`. On failure nothing stays
/// allocated.
pub fn upload_texture<G: GpuBackend>(
    gpu: &mut G,
    ledger: &mut ResourceLedger,
    image: &G::Image,
) -> Result<(ResourceHandle, ResourceHandle), TextureLoadError> {
    let texture = gpu.create_texture(image)?;
    ledger.track(texture);
    match gpu.create_material(texture) {
        Ok(material) => {
            ledger.track(material);
            Ok((texture, material))
        }
        Err(err) => {
            if ledger.release(texture) {
                gpu.destroy(texture);
            }
            Err(err.into())
        }
    }
}
