//! Panorama viewer engine: one equirectangular image on an inward-facing
//! sphere, looked at from its center.
//!
//! The engine is platform-neutral. A host supplies a [`HostSurface`], a
//! [`TextureLoader`] and a [`gpu::GpuBackend`]; the `viewer_web` app wires
//! those to the browser.

pub mod config;
pub mod error;
pub mod host;
pub mod input;
pub mod orbit;
pub mod resize;
pub mod session;
pub mod texture;
pub mod viewer;

#[cfg(test)]
mod testing;

pub use config::*;
pub use error::*;
pub use host::*;
pub use input::*;
pub use orbit::*;
pub use resize::*;
pub use session::*;
pub use texture::*;
pub use viewer::*;
