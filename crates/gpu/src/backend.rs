use foundation::ResourceHandle;
use scene::SphereMesh;

use crate::renderer::RenderFrame;

/// Backing size of the drawing surface in device pixels.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct SurfaceSize {
    pub width: u32,
    pub height: u32,
}

impl SurfaceSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Backing size for a surface measured in CSS pixels. Never smaller than
    /// 1×1, since zero-sized surfaces cannot be configured.
    pub fn from_css(width: f64, height: f64, pixel_ratio: f64) -> Self {
        let scale = |v: f64| {
            let px = (v * pixel_ratio).round();
            if px.is_finite() && px >= 1.0 { px.min(u32::MAX as f64) as u32 } else { 1 }
        };
        Self {
            width: scale(width),
            height: scale(height),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GpuError {
    /// No adapter, device or surface could be obtained.
    ContextUnavailable(String),
    /// The context was released or lost.
    ContextLost,
    ImageDecode(String),
    TextureTooLarge { width: u32, height: u32, max: u32 },
    TextureUpload(String),
    GeometryUpload(String),
    MaterialCreation(String),
    UnknownResource(ResourceHandle),
    Render(String),
}

impl std::fmt::Display for GpuError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GpuError::ContextUnavailable(msg) => write!(f, "rendering context unavailable: {msg}"),
            GpuError::ContextLost => write!(f, "rendering context lost"),
            GpuError::ImageDecode(msg) => write!(f, "image could not be decoded: {msg}"),
            GpuError::TextureTooLarge { width, height, max } => write!(
                f,
                "image {width}x{height} exceeds the device texture limit of {max}"
            ),
            GpuError::TextureUpload(msg) => write!(f, "texture upload failed: {msg}"),
            GpuError::GeometryUpload(msg) => write!(f, "geometry upload failed: {msg}"),
            GpuError::MaterialCreation(msg) => write!(f, "material creation failed: {msg}"),
            GpuError::UnknownResource(handle) => write!(f, "unknown resource {handle}"),
            GpuError::Render(msg) => write!(f, "render failed: {msg}"),
        }
    }
}

impl std::error::Error for GpuError {}

/// A rendering context and the objects created on it.
///
/// Constructing a backend acquires the context; [`GpuBackend::release`] gives
/// it back. Every created object is named by a [`ResourceHandle`] and lives
/// until [`GpuBackend::destroy`] or release. Backends are used from a single
/// thread.
pub trait GpuBackend {
    /// Decoded image the platform hands over for upload.
    type Image;

    /// Handle naming the context itself in the resource ledger.
    fn context(&self) -> ResourceHandle;

    fn surface_size(&self) -> SurfaceSize;

    fn max_texture_dimension(&self) -> u32;

    fn resize_surface(&mut self, size: SurfaceSize);

    fn create_geometry(&mut self, mesh: &SphereMesh) -> Result<ResourceHandle, GpuError>;

    fn create_texture(&mut self, image: &Self::Image) -> Result<ResourceHandle, GpuError>;

    /// Unlit material sampling `texture`.
    fn create_material(&mut self, texture: ResourceHandle) -> Result<ResourceHandle, GpuError>;

    fn render(&mut self, frame: &RenderFrame) -> Result<(), GpuError>;

    fn destroy(&mut self, handle: ResourceHandle);

    /// Releases the surface and the context. Idempotent.
    fn release(&mut self);
}

/// Rejects images the device cannot hold in a single texture.
pub fn check_texture_dimensions(width: u32, height: u32, max: u32) -> Result<(), GpuError> {
    if width == 0 || height == 0 {
        return Err(GpuError::ImageDecode(format!("image has no pixels ({width}x{height})")));
    }
    if width > max || height > max {
        return Err(GpuError::TextureTooLarge { width, height, max });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn css_size_scales_by_pixel_ratio() {
        assert_eq!(SurfaceSize::from_css(400.0, 300.0, 2.0), SurfaceSize::new(800, 600));
        assert_eq!(SurfaceSize::from_css(400.0, 300.0, 1.0), SurfaceSize::new(400, 300));
    }

    #[test]
    fn css_size_never_collapses() {
        assert_eq!(SurfaceSize::from_css(0.0, 0.0, 1.0), SurfaceSize::new(1, 1));
        assert_eq!(SurfaceSize::from_css(f64::NAN, -3.0, 1.0), SurfaceSize::new(1, 1));
    }

    #[test]
    fn texture_limits() {
        assert!(check_texture_dimensions(4096, 2048, 8192).is_ok());
        assert_eq!(
            check_texture_dimensions(16384, 8192, 8192),
            Err(GpuError::TextureTooLarge {
                width: 16384,
                height: 8192,
                max: 8192
            })
        );
        assert!(matches!(
            check_texture_dimensions(0, 10, 8192),
            Err(GpuError::ImageDecode(_))
        ));
    }

    #[test]
    fn errors_describe_themselves() {
        let err = GpuError::TextureTooLarge {
            width: 10,
            height: 5,
            max: 4,
        };
        assert_eq!(err.to_string(), "image 10x5 exceeds the device texture limit of 4");
    }
}
