use serde::{Deserialize, Serialize};

use scene::{CameraState, FovRange};

/// Viewer configuration. Every field has a documented default, and a JSON
/// document may set any subset of them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub camera: CameraConfig,
    pub orbit: OrbitConfig,
    pub sphere: SphereConfig,
    /// Device pixels per CSS pixel for the drawing surface.
    pub pixel_ratio: f64,
    /// Linear RGBA drawn behind the sphere.
    pub clear_color: [f64; 4],
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Initial vertical field of view.
    pub fov_deg: f64,
    pub min_fov_deg: f64,
    pub max_fov_deg: f64,
    /// Degrees of field of view per unit of wheel `deltaY`.
    pub wheel_fov_scale: f64,
    pub near: f64,
    pub far: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrbitConfig {
    /// Multiplier on pointer deltas. Negative drags the image with the
    /// pointer.
    pub rotate_speed: f64,
    pub enable_damping: bool,
    /// Fraction of the pending rotation applied per frame.
    pub damping_factor: f64,
    /// Accepted for compatibility; the camera never dollies.
    pub zoom_speed: f64,
    /// Accepted for compatibility; the camera never leaves the center.
    pub min_distance: f64,
    /// Accepted for compatibility; the camera never leaves the center.
    pub max_distance: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SphereConfig {
    pub radius: f32,
    pub width_segments: u32,
    pub height_segments: u32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fov_deg: 75.0,
            min_fov_deg: 10.0,
            max_fov_deg: 75.0,
            wheel_fov_scale: 0.05,
            near: 0.1,
            far: 2000.0,
        }
    }
}

impl Default for OrbitConfig {
    fn default() -> Self {
        Self {
            rotate_speed: -0.3,
            enable_damping: true,
            damping_factor: 0.05,
            zoom_speed: 0.5,
            min_distance: 0.1,
            max_distance: 1000.0,
        }
    }
}

impl Default for SphereConfig {
    fn default() -> Self {
        Self {
            radius: 500.0,
            width_segments: 60,
            height_segments: 40,
        }
    }
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            camera: CameraConfig::default(),
            orbit: OrbitConfig::default(),
            sphere: SphereConfig::default(),
            pixel_ratio: 1.0,
            clear_color: [0.0, 0.0, 0.0, 1.0],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    Parse(String),
    Invalid { field: &'static str, reason: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Parse(msg) => write!(f, "invalid viewer config: {msg}"),
            ConfigError::Invalid { field, reason } => write!(f, "invalid viewer config: {field} {reason}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::Parse(err.to_string())
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

impl ViewerConfig {
    /// Parses and validates a JSON document.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: ViewerConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let cam = &self.camera;
        if !(cam.min_fov_deg > 0.0 && cam.max_fov_deg < 180.0) {
            return Err(invalid("camera.min_fov_deg/max_fov_deg", "must lie in (0, 180)"));
        }
        if cam.min_fov_deg > cam.max_fov_deg {
            return Err(invalid("camera.min_fov_deg", "must not exceed max_fov_deg"));
        }
        if !cam.fov_deg.is_finite() {
            return Err(invalid("camera.fov_deg", "must be finite"));
        }
        if !cam.wheel_fov_scale.is_finite() {
            return Err(invalid("camera.wheel_fov_scale", "must be finite"));
        }
        if !(cam.near > 0.0 && cam.far > cam.near) {
            return Err(invalid("camera.near/far", "need 0 < near < far"));
        }
        if f64::from(self.sphere.radius) >= cam.far {
            return Err(invalid("sphere.radius", "must be inside the far plane"));
        }
        if !(self.sphere.radius > 0.0 && self.sphere.radius.is_finite()) {
            return Err(invalid("sphere.radius", "must be positive"));
        }
        if self.sphere.width_segments < 3 || self.sphere.height_segments < 2 {
            return Err(invalid("sphere segments", "need at least 3x2"));
        }
        let orbit = &self.orbit;
        if !orbit.rotate_speed.is_finite() {
            return Err(invalid("orbit.rotate_speed", "must be finite"));
        }
        if !(orbit.damping_factor > 0.0 && orbit.damping_factor <= 1.0) {
            return Err(invalid("orbit.damping_factor", "must lie in (0, 1]"));
        }
        if !(self.pixel_ratio > 0.0 && self.pixel_ratio.is_finite()) {
            return Err(invalid("pixel_ratio", "must be positive"));
        }
        Ok(())
    }

    pub fn fov_range(&self) -> FovRange {
        FovRange::new(self.camera.min_fov_deg, self.camera.max_fov_deg)
    }

    /// Camera at the sphere center with the configured lens.
    pub fn initial_camera(&self, aspect: f64) -> CameraState {
        CameraState::new(
            self.camera.fov_deg,
            self.fov_range(),
            aspect,
            self.camera.near,
            self.camera.far,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_match_documented_values() {
        let c = ViewerConfig::default();
        assert_eq!(c.camera.fov_deg, 75.0);
        assert_eq!((c.camera.min_fov_deg, c.camera.max_fov_deg), (10.0, 75.0));
        assert_eq!(c.camera.wheel_fov_scale, 0.05);
        assert_eq!((c.camera.near, c.camera.far), (0.1, 2000.0));
        assert_eq!(c.orbit.rotate_speed, -0.3);
        assert!(c.orbit.enable_damping);
        assert_eq!(c.orbit.damping_factor, 0.05);
        assert_eq!(c.orbit.zoom_speed, 0.5);
        assert_eq!((c.orbit.min_distance, c.orbit.max_distance), (0.1, 1000.0));
        assert_eq!(c.sphere.radius, 500.0);
        assert_eq!((c.sphere.width_segments, c.sphere.height_segments), (60, 40));
        assert_eq!(c.pixel_ratio, 1.0);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn partial_json_keeps_other_defaults() {
        let c = ViewerConfig::from_json(r#"{ "camera": { "fov_deg": 60 }, "pixel_ratio": 2 }"#).unwrap();
        assert_eq!(c.camera.fov_deg, 60.0);
        assert_eq!(c.camera.max_fov_deg, 75.0);
        assert_eq!(c.pixel_ratio, 2.0);
        assert_eq!(c.orbit, OrbitConfig::default());
        assert_eq!(c.sphere, SphereConfig::default());
    }

    #[test]
    fn empty_document_is_the_default() {
        assert_eq!(ViewerConfig::from_json("{}").unwrap(), ViewerConfig::default());
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(ViewerConfig::from_json("not json"), Err(ConfigError::Parse(_))));
        assert!(matches!(
            ViewerConfig::from_json(r#"{ "camera": { "min_fov_deg": 80 } }"#),
            Err(ConfigError::Invalid { .. })
        ));
        assert!(matches!(
            ViewerConfig::from_json(r#"{ "sphere": { "radius": 5000 } }"#),
            Err(ConfigError::Invalid { field: "sphere.radius", .. })
        ));
        assert!(matches!(
            ViewerConfig::from_json(r#"{ "orbit": { "damping_factor": 0 } }"#),
            Err(ConfigError::Invalid { field: "orbit.damping_factor", .. })
        ));
    }

    #[test]
    fn initial_camera_clamps_fov() {
        let mut c = ViewerConfig::default();
        c.camera.fov_deg = 120.0;
        let cam = c.initial_camera(2.0);
        assert_eq!(cam.fov_deg(), 75.0);
        assert_eq!(cam.aspect(), 2.0);
    }
}
