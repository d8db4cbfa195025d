use std::f64::consts::PI;

use foundation::math::{Mat4, Vec3, mat4_look_at_rh, mat4_mul, mat4_perspective_rh_z0};

/// Keeps the view direction off the poles so the look-at basis stays defined.
pub const POLAR_EPSILON: f64 = 1e-6;

/// Look direction in spherical coordinates.
///
/// `theta` is the azimuth around +Y, `phi` the polar angle from +Y. The
/// camera looks along `-(sin φ sin θ, cos φ, sin φ cos θ)`, so the default
/// `(0, π/2)` looks down -Z.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Orientation {
    pub theta: f64,
    pub phi: f64,
}

impl Default for Orientation {
    fn default() -> Self {
        Self {
            theta: 0.0,
            phi: PI / 2.0,
        }
    }
}

impl Orientation {
    pub fn new(theta: f64, phi: f64) -> Self {
        Self { theta, phi }.make_safe()
    }

    pub fn make_safe(self) -> Self {
        Self {
            theta: self.theta,
            phi: self.phi.clamp(POLAR_EPSILON, PI - POLAR_EPSILON),
        }
    }

    pub fn forward(self) -> Vec3 {
        let sin_phi = self.phi.sin();
        Vec3::new(
            -sin_phi * self.theta.sin(),
            -self.phi.cos(),
            -sin_phi * self.theta.cos(),
        )
    }
}

/// Inclusive field-of-view bounds in degrees.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct FovRange {
    pub min_deg: f64,
    pub max_deg: f64,
}

impl FovRange {
    pub fn new(min_deg: f64, max_deg: f64) -> Self {
        Self { min_deg, max_deg }
    }

    pub fn clamp(&self, fov_deg: f64) -> f64 {
        if fov_deg.is_nan() {
            return self.max_deg;
        }
        fov_deg.clamp(self.min_deg, self.max_deg)
    }

    pub fn contains(&self, fov_deg: f64) -> bool {
        fov_deg >= self.min_deg && fov_deg <= self.max_deg
    }
}

impl Default for FovRange {
    fn default() -> Self {
        Self::new(10.0, 75.0)
    }
}

/// Perspective camera pinned at the sphere center.
///
/// Only orientation, field of view and aspect ever change; the position is
/// the origin for the lifetime of the camera.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct CameraState {
    fov_deg: f64,
    fov_range: FovRange,
    aspect: f64,
    near: f64,
    far: f64,
    orientation: Orientation,
}

impl CameraState {
    pub fn new(fov_deg: f64, fov_range: FovRange, aspect: f64, near: f64, far: f64) -> Self {
        Self {
            fov_deg: fov_range.clamp(fov_deg),
            fov_range,
            aspect: sanitize_aspect(aspect),
            near,
            far,
            orientation: Orientation::default(),
        }
    }

    pub fn fov_deg(&self) -> f64 {
        self.fov_deg
    }

    pub fn fov_range(&self) -> FovRange {
        self.fov_range
    }

    pub fn aspect(&self) -> f64 {
        self.aspect
    }

    pub fn near(&self) -> f64 {
        self.near
    }

    pub fn far(&self) -> f64 {
        self.far
    }

    pub fn position(&self) -> Vec3 {
        Vec3::ZERO
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    pub fn set_orientation(&mut self, orientation: Orientation) {
        self.orientation = orientation.make_safe();
    }

    /// Sets the field of view, clamped to the camera's range. Returns the
    /// value actually applied.
    pub fn set_fov_deg(&mut self, fov_deg: f64) -> f64 {
        self.fov_deg = self.fov_range.clamp(fov_deg);
        self.fov_deg
    }

    pub fn add_fov_deg(&mut self, delta_deg: f64) -> f64 {
        self.set_fov_deg(self.fov_deg + delta_deg)
    }

    /// Aspect from a surface size; a zero or negative height yields 1.
    pub fn set_aspect_from_size(&mut self, width: f64, height: f64) {
        self.aspect = if height <= 0.0 {
            1.0
        } else {
            sanitize_aspect(width / height)
        };
    }

    pub fn view_matrix(&self) -> Mat4 {
        let eye = self.position();
        mat4_look_at_rh(eye, eye + self.orientation.forward(), Vec3::UP)
    }

    pub fn projection_matrix(&self) -> Mat4 {
        mat4_perspective_rh_z0(self.fov_deg.to_radians(), self.aspect, self.near, self.far)
    }

    pub fn view_proj(&self) -> Mat4 {
        mat4_mul(self.projection_matrix(), self.view_matrix())
    }
}

fn sanitize_aspect(aspect: f64) -> f64 {
    if aspect.is_finite() && aspect > 0.0 {
        aspect.max(1e-6)
    } else {
        1.0
    }
}
