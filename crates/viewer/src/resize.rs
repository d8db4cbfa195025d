use gpu::SurfaceSize;

use crate::host::HostSize;

/// A size change the session must apply.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ResizeChange {
    pub css: HostSize,
    pub backing: SurfaceSize,
}

impl ResizeChange {
    /// Camera aspect for this size; a zero height yields 1.
    pub fn aspect(&self) -> f64 {
        if self.css.height <= 0.0 {
            1.0
        } else {
            self.css.width / self.css.height
        }
    }
}

/// Reports host size changes, once per distinct size.
#[derive(Debug, Clone)]
pub struct ResizeReactor {
    pixel_ratio: f64,
    applied: Option<HostSize>,
}

impl ResizeReactor {
    pub fn new(pixel_ratio: f64) -> Self {
        Self {
            pixel_ratio,
            applied: None,
        }
    }

    pub fn applied(&self) -> Option<HostSize> {
        self.applied
    }

    pub fn observe(&mut self, size: HostSize) -> Option<ResizeChange> {
        if self.applied == Some(size) {
            return None;
        }
        self.applied = Some(size);
        Some(ResizeChange {
            css: size,
            backing: SurfaceSize::from_css(size.width, size.height, self.pixel_ratio),
        })
    }
}
