use std::f64::consts::TAU;

use foundation::math::Vec2;
use scene::{CameraState, Orientation};

use crate::config::{CameraConfig, OrbitConfig};

/// Pending rotation below this (radians, per axis) is dropped.
pub const SETTLE_EPSILON: f64 = 1e-6;

/// Rotation requested but not yet applied.
#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct SphericalDelta {
    pub theta: f64,
    pub phi: f64,
}

impl SphericalDelta {
    fn is_settled(&self) -> bool {
        self.theta.abs() < SETTLE_EPSILON && self.phi.abs() < SETTLE_EPSILON
    }
}

/// Turns pointer drags into camera orientation, with optional damping.
///
/// A drag of one surface height at `rotate_speed = 1` is a full turn.
/// Damped rotation applies `damping_factor` of the pending delta each frame
/// and keeps the rest, so the view coasts to a stop after release.
#[derive(Debug, Clone)]
pub struct OrbitController {
    rotate_speed: f64,
    damping: Option<f64>,
    pending: SphericalDelta,
}

impl OrbitController {
    pub fn new(config: &OrbitConfig) -> Self {
        Self {
            rotate_speed: config.rotate_speed,
            damping: config.enable_damping.then_some(config.damping_factor),
            pending: SphericalDelta::default(),
        }
    }

    pub fn pending(&self) -> SphericalDelta {
        self.pending
    }

    pub fn is_settled(&self) -> bool {
        self.pending.is_settled()
    }

    /// Queues rotation for a pointer movement on a surface `surface_height`
    /// CSS pixels tall.
    pub fn rotate_by_pixels(&mut self, delta: Vec2, surface_height: f64) {
        if delta == Vec2::ZERO {
            return;
        }
        let height = if surface_height > 0.0 { surface_height } else { 1.0 };
        let scaled = delta.scale(self.rotate_speed);
        self.pending.theta -= TAU * scaled.x / height;
        self.pending.phi -= TAU * scaled.y / height;
    }

    /// Applies this frame's share of the pending rotation. Returns whether
    /// the orientation changed.
    pub fn update(&mut self, camera: &mut CameraState) -> bool {
        if self.pending.is_settled() {
            self.pending = SphericalDelta::default();
            return false;
        }
        let factor = self.damping.unwrap_or(1.0);
        let current = camera.orientation();
        camera.set_orientation(Orientation::new(
            current.theta + self.pending.theta * factor,
            current.phi + self.pending.phi * factor,
        ));

        match self.damping {
            Some(factor) => {
                self.pending.theta *= 1.0 - factor;
                self.pending.phi *= 1.0 - factor;
                if self.pending.is_settled() {
                    self.pending = SphericalDelta::default();
                }
            }
            None => self.pending = SphericalDelta::default(),
        }
        true
    }
}

/// Field-of-view zoom driven by wheel deltas.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct WheelZoom {
    pub fov_per_delta: f64,
}

impl WheelZoom {
    pub fn new(config: &CameraConfig) -> Self {
        Self {
            fov_per_delta: config.wheel_fov_scale,
        }
    }

    /// Adds `delta_y * fov_per_delta` to the field of view, clamped to the
    /// camera's range. Returns the new field of view.
    pub fn apply(&self, camera: &mut CameraState, delta_y: f64) -> f64 {
        camera.add_fov_deg(delta_y * self.fov_per_delta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ViewerConfig;
    use std::f64::consts::PI;

    fn camera() -> CameraState {
        ViewerConfig::default().initial_camera(800.0 / 600.0)
    }

    #[test]
    fn undamped_drag_applies_in_one_frame() {
        let config = OrbitConfig {
            enable_damping: false,
            ..OrbitConfig::default()
        };
        let mut orbit = OrbitController::new(&config);
        let mut cam = camera();

        orbit.rotate_by_pixels(Vec2::new(100.0, 0.0), 600.0);
        assert!(orbit.update(&mut cam));
        let expected = -TAU * (100.0 * -0.3) / 600.0;
        assert!((cam.orientation().theta - expected).abs() < 1e-12);
        assert!(orbit.is_settled());
        assert!(!orbit.update(&mut cam));
    }

    #[test]
    fn damping_converges_to_the_full_rotation() {
        let mut orbit = OrbitController::new(&OrbitConfig::default());
        let mut cam = camera();
        orbit.rotate_by_pixels(Vec2::new(0.0, 60.0), 600.0);
        let total = -TAU * (60.0 * -0.3) / 600.0;

        assert!(orbit.update(&mut cam));
        let first_step = cam.orientation().phi - PI / 2.0;
        assert!((first_step - total * 0.05).abs() < 1e-12);

        let mut frames = 1;
        while orbit.update(&mut cam) {
            frames += 1;
            assert!(frames < 1000, "damping never settled");
        }
        assert!(frames > 1);
        let moved = cam.orientation().phi - PI / 2.0;
        assert!((moved - total).abs() < 1e-4);
    }

    #[test]
    fn vertical_rotation_stops_at_the_poles() {
        let config = OrbitConfig {
            enable_damping: false,
            ..OrbitConfig::default()
        };
        let mut orbit = OrbitController::new(&config);
        let mut cam = camera();
        orbit.rotate_by_pixels(Vec2::new(0.0, 100_000.0), 600.0);
        orbit.update(&mut cam);
        let phi = cam.orientation().phi;
        assert!(phi > 0.0 && phi < PI);
    }

    #[test]
    fn zero_height_surface_does_not_divide_by_zero() {
        let mut orbit = OrbitController::new(&OrbitConfig::default());
        orbit.rotate_by_pixels(Vec2::new(1.0, 1.0), 0.0);
        assert!(orbit.pending().theta.is_finite());
    }

    #[test]
    fn wheel_zoom_saturates_at_the_range() {
        let zoom = WheelZoom::new(&CameraConfig::default());
        let mut cam = camera();
        for _ in 0..20 {
            zoom.apply(&mut cam, 500.0);
        }
        assert_eq!(cam.fov_deg(), 75.0);
        for _ in 0..20 {
            zoom.apply(&mut cam, -500.0);
        }
        assert_eq!(cam.fov_deg(), 10.0);
        assert_eq!(zoom.apply(&mut cam, 100.0), 15.0);
    }

    #[test]
    fn fov_stays_in_range_for_any_delta_sequence() {
        let zoom = WheelZoom::new(&CameraConfig::default());
        let mut cam = camera();
        let mut seed: u64 = 0x2545_f491_4f6c_dd1d;
        for _ in 0..500 {
            seed ^= seed << 13;
            seed ^= seed >> 7;
            seed ^= seed << 17;
            let delta = (seed % 4001) as f64 - 2000.0;
            let fov = zoom.apply(&mut cam, delta);
            assert!((10.0..=75.0).contains(&fov));
            assert_eq!(cam.set_fov_deg(fov), fov);
        }
    }
}
