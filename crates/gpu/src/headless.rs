use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use foundation::{HandleAllocator, ResourceHandle, ResourceKind};
use scene::SphereMesh;

use crate::backend::{GpuBackend, GpuError, SurfaceSize, check_texture_dimensions};
use crate::renderer::RenderFrame;

/// Decoded image as seen by the headless backend: dimensions only.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct HeadlessImage {
    pub width: u32,
    pub height: u32,
}

impl HeadlessImage {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

#[derive(Debug, Default)]
struct HeadlessState {
    allocator: HandleAllocator,
    live: BTreeMap<ResourceHandle, u64>,
    surface: SurfaceSize,
    resizes: Vec<SurfaceSize>,
    frames: Vec<RenderFrame>,
    created: BTreeMap<ResourceKind, u64>,
    destroyed: BTreeMap<ResourceKind, u64>,
    released: bool,
    fail_texture: Option<String>,
    fail_material: Option<String>,
    fail_render: Option<String>,
}

impl HeadlessState {
    fn mint(&mut self, kind: ResourceKind, bytes: u64) -> ResourceHandle {
        let handle = ResourceHandle {
            kind,
            handle: self.allocator.allocate(),
        };
        self.live.insert(handle, bytes);
        *self.created.entry(kind).or_insert(0) += 1;
        handle
    }
}

/// [`GpuBackend`] that keeps no device state.
///
/// Records every frame and surface resize, counts resources by kind, and can
/// be told to fail texture, material or render calls. Tests keep a
/// [`HeadlessProbe`] to inspect it after the owning session is gone.
#[derive(Debug)]
pub struct HeadlessBackend {
    context: ResourceHandle,
    max_texture_dimension: u32,
    state: Rc<RefCell<HeadlessState>>,
}

impl HeadlessBackend {
    pub const DEFAULT_MAX_TEXTURE_DIMENSION: u32 = 8192;

    pub fn new(surface: SurfaceSize) -> Self {
        let mut state = HeadlessState {
            surface,
            ..HeadlessState::default()
        };
        let context = state.mint(ResourceKind::Context, 0);
        Self {
            context,
            max_texture_dimension: Self::DEFAULT_MAX_TEXTURE_DIMENSION,
            state: Rc::new(RefCell::new(state)),
        }
    }

    pub fn with_max_texture_dimension(mut self, max: u32) -> Self {
        self.max_texture_dimension = max;
        self
    }

    pub fn probe(&self) -> HeadlessProbe {
        HeadlessProbe {
            state: self.state.clone(),
        }
    }

    fn ensure_active(&self) -> Result<(), GpuError> {
        if self.state.borrow().released {
            return Err(GpuError::ContextLost);
        }
        Ok(())
    }
}

impl GpuBackend for HeadlessBackend {
    type Image = HeadlessImage;

    fn context(&self) -> ResourceHandle {
        self.context
    }

    fn surface_size(&self) -> SurfaceSize {
        self.state.borrow().surface
    }

    fn max_texture_dimension(&self) -> u32 {
        self.max_texture_dimension
    }

    fn resize_surface(&mut self, size: SurfaceSize) {
        let mut state = self.state.borrow_mut();
        if state.released {
            return;
        }
        state.surface = size;
        state.resizes.push(size);
    }

    fn create_geometry(&mut self, mesh: &SphereMesh) -> Result<ResourceHandle, GpuError> {
        self.ensure_active()?;
        let mut state = self.state.borrow_mut();
        Ok(state.mint(ResourceKind::Geometry, mesh.byte_size() as u64))
    }

    fn create_texture(&mut self, image: &HeadlessImage) -> Result<ResourceHandle, GpuError> {
        self.ensure_active()?;
        check_texture_dimensions(image.width, image.height, self.max_texture_dimension)?;
        let mut state = self.state.borrow_mut();
        if let Some(msg) = state.fail_texture.take() {
            return Err(GpuError::TextureUpload(msg));
        }
        let bytes = u64::from(image.width) * u64::from(image.height) * 4;
        Ok(state.mint(ResourceKind::Texture, bytes))
    }

    fn create_material(&mut self, texture: ResourceHandle) -> Result<ResourceHandle, GpuError> {
        self.ensure_active()?;
        let mut state = self.state.borrow_mut();
        if !state.live.contains_key(&texture) {
            return Err(GpuError::UnknownResource(texture));
        }
        if let Some(msg) = state.fail_material.take() {
            return Err(GpuError::MaterialCreation(msg));
        }
        Ok(state.mint(ResourceKind::Material, 0))
    }

    fn render(&mut self, frame: &RenderFrame) -> Result<(), GpuError> {
        self.ensure_active()?;
        let mut state = self.state.borrow_mut();
        if let Some(msg) = state.fail_render.take() {
            return Err(GpuError::Render(msg));
        }
        state.frames.push(frame.clone());
        Ok(())
    }

    fn destroy(&mut self, handle: ResourceHandle) {
        let mut state = self.state.borrow_mut();
        if state.live.remove(&handle).is_some() {
            state.allocator.release(handle.handle);
            *state.destroyed.entry(handle.kind).or_insert(0) += 1;
        }
    }

    fn release(&mut self) {
        let mut state = self.state.borrow_mut();
        if state.released {
            return;
        }
        state.released = true;
        let context = self.context;
        if state.live.remove(&context).is_some() {
            state.allocator.release(context.handle);
            *state.destroyed.entry(ResourceKind::Context).or_insert(0) += 1;
        }
    }
}

/// Shared view of a [`HeadlessBackend`]'s bookkeeping.
#[derive(Debug, Clone)]
pub struct HeadlessProbe {
    state: Rc<RefCell<HeadlessState>>,
}

impl HeadlessProbe {
    pub fn live_count(&self, kind: ResourceKind) -> usize {
        self.state.borrow().live.keys().filter(|h| h.kind == kind).count()
    }

    pub fn total_live(&self) -> usize {
        self.state.borrow().live.len()
    }

    pub fn live_bytes(&self) -> u64 {
        self.state.borrow().live.values().sum()
    }

    pub fn created(&self, kind: ResourceKind) -> u64 {
        self.state.borrow().created.get(&kind).copied().unwrap_or(0)
    }

    pub fn destroyed(&self, kind: ResourceKind) -> u64 {
        self.state.borrow().destroyed.get(&kind).copied().unwrap_or(0)
    }

    pub fn is_released(&self) -> bool {
        self.state.borrow().released
    }

    pub fn surface_size(&self) -> SurfaceSize {
        self.state.borrow().surface
    }

    pub fn resizes(&self) -> Vec<SurfaceSize> {
        self.state.borrow().resizes.clone()
    }

    pub fn frames_rendered(&self) -> usize {
        self.state.borrow().frames.len()
    }

    pub fn last_frame(&self) -> Option<RenderFrame> {
        self.state.borrow().frames.last().cloned()
    }

    /// The next texture upload fails with `message`.
    pub fn fail_next_texture(&self, message: impl Into<String>) {
        self.state.borrow_mut().fail_texture = Some(message.into());
    }

    pub fn fail_next_material(&self, message: impl Into<String>) {
        self.state.borrow_mut().fail_material = Some(message.into());
    }

    pub fn fail_next_render(&self, message: impl Into<String>) {
        self.state.borrow_mut().fail_render = Some(message.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::Renderer;
    use scene::{CameraState, FovRange, PanoramaScene, build_panorama_sphere};

    fn backend() -> HeadlessBackend {
        HeadlessBackend::new(SurfaceSize::new(800, 600))
    }

    #[test]
    fn counts_resources_by_kind() {
        let mut gpu = backend();
        let probe = gpu.probe();
        assert_eq!(probe.live_count(ResourceKind::Context), 1);

        let geo = gpu.create_geometry(&build_panorama_sphere(500.0, 8, 4)).unwrap();
        let tex = gpu.create_texture(&HeadlessImage::new(4096, 2048)).unwrap();
        let mat = gpu.create_material(tex).unwrap();
        assert_eq!(probe.total_live(), 4);
        assert!(probe.live_bytes() >= 4096 * 2048 * 4);

        gpu.destroy(mat);
        gpu.destroy(mat);
        gpu.destroy(tex);
        gpu.destroy(geo);
        gpu.release();
        gpu.release();
        assert_eq!(probe.total_live(), 0);
        assert_eq!(probe.destroyed(ResourceKind::Material), 1);
        assert_eq!(probe.destroyed(ResourceKind::Context), 1);
        assert!(probe.is_released());
    }

    #[test]
    fn oversized_and_empty_images_are_rejected() {
        let mut gpu = backend().with_max_texture_dimension(4096);
        assert!(matches!(
            gpu.create_texture(&HeadlessImage::new(8192, 4096)),
            Err(GpuError::TextureTooLarge { max: 4096, .. })
        ));
        assert!(matches!(
            gpu.create_texture(&HeadlessImage::new(0, 0)),
            Err(GpuError::ImageDecode(_))
        ));
        assert_eq!(gpu.probe().live_count(ResourceKind::Texture), 0);
    }

    #[test]
    fn injected_failures_fire_once() {
        let mut gpu = backend();
        let probe = gpu.probe();
        probe.fail_next_texture("out of memory");
        assert_eq!(
            gpu.create_texture(&HeadlessImage::new(2, 1)),
            Err(GpuError::TextureUpload("out of memory".to_string()))
        );
        assert!(gpu.create_texture(&HeadlessImage::new(2, 1)).is_ok());
    }

    #[test]
    fn released_backend_refuses_work() {
        let mut gpu = backend();
        gpu.release();
        let frame = Renderer::collect(
            &PanoramaScene::new(),
            &CameraState::new(75.0, FovRange::default(), 1.0, 0.1, 2000.0),
            [0.0; 4],
        );
        assert_eq!(gpu.render(&frame), Err(GpuError::ContextLost));
        assert_eq!(
            gpu.create_geometry(&build_panorama_sphere(1.0, 3, 2)),
            Err(GpuError::ContextLost)
        );
        gpu.resize_surface(SurfaceSize::new(1, 1));
        assert!(gpu.probe().resizes().is_empty());
    }

    #[test]
    fn material_needs_a_live_texture() {
        let mut gpu = backend();
        let tex = gpu.create_texture(&HeadlessImage::new(2, 1)).unwrap();
        gpu.destroy(tex);
        assert_eq!(gpu.create_material(tex), Err(GpuError::UnknownResource(tex)));
    }
}
