use super::vec::Vec3;

/// Column-major 4x4 matrix, laid out the way WGSL expects `mat4x4<f32>`.
pub type Mat4 = [[f32; 4]; 4];

pub const MAT4_IDENTITY: Mat4 = [
    [1.0, 0.0, 0.0, 0.0],
    [0.0, 1.0, 0.0, 0.0],
    [0.0, 0.0, 1.0, 0.0],
    [0.0, 0.0, 0.0, 1.0],
];

pub fn mat4_mul(a: Mat4, b: Mat4) -> Mat4 {
    // Column-major matrix multiply: c = a * b
    let mut c = [[0.0f32; 4]; 4];
    for col in 0..4 {
        for row in 0..4 {
            c[col][row] = a[0][row] * b[col][0]
                + a[1][row] * b[col][1]
                + a[2][row] * b[col][2]
                + a[3][row] * b[col][3];
        }
    }
    c
}

/// Transforms a point (w = 1) and returns the homogeneous result.
pub fn mat4_transform_point(m: Mat4, p: Vec3) -> [f32; 4] {
    let v = [p.x as f32, p.y as f32, p.z as f32, 1.0];
    let mut out = [0.0f32; 4];
    for (row, slot) in out.iter_mut().enumerate() {
        *slot = m[0][row] * v[0] + m[1][row] * v[1] + m[2][row] * v[2] + m[3][row] * v[3];
    }
    out
}

/// Right-handed perspective projection with a `[0, 1]` depth range.
pub fn mat4_perspective_rh_z0(fov_y_rad: f64, aspect: f64, near: f64, far: f64) -> Mat4 {
    let f = 1.0 / (0.5 * fov_y_rad).tan();
    let m00 = (f / aspect) as f32;
    let m11 = f as f32;
    let m22 = (far / (near - far)) as f32;
    let m23 = ((near * far) / (near - far)) as f32;

    // Column-major form of:
    // [ m00,  0,   0,   0 ]
    // [  0,  m11,  0,   0 ]
    // [  0,   0,  m22, m23 ]
    // [  0,   0,  -1,   0 ]
    [
        [m00, 0.0, 0.0, 0.0],
        [0.0, m11, 0.0, 0.0],
        [0.0, 0.0, m22, -1.0],
        [0.0, 0.0, m23, 0.0],
    ]
}

pub fn mat4_look_at_rh(eye: Vec3, target: Vec3, up: Vec3) -> Mat4 {
    let f = (target - eye).normalize();
    let s = f.cross(up).normalize();
    let u = s.cross(f);

    let ex = -s.dot(eye);
    let ey = -u.dot(eye);
    let ez = f.dot(eye);

    [
        [s.x as f32, u.x as f32, (-f.x) as f32, 0.0],
        [s.y as f32, u.y as f32, (-f.y) as f32, 0.0],
        [s.z as f32, u.z as f32, (-f.z) as f32, 0.0],
        [ex as f32, ey as f32, ez as f32, 1.0],
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_is_neutral() {
        let p = mat4_perspective_rh_z0(1.0, 1.5, 0.1, 100.0);
        assert_eq!(mat4_mul(MAT4_IDENTITY, p), p);
        assert_eq!(mat4_mul(p, MAT4_IDENTITY), p);
    }

    #[test]
    fn look_at_maps_target_onto_negative_z() {
        let view = mat4_look_at_rh(Vec3::ZERO, Vec3::new(1.0, 0.0, 0.0), Vec3::UP);
        let p = mat4_transform_point(view, Vec3::new(5.0, 0.0, 0.0));
        assert!(p[0].abs() < 1e-6);
        assert!(p[1].abs() < 1e-6);
        assert!((p[2] + 5.0).abs() < 1e-5);
    }

    #[test]
    fn perspective_depth_range_is_zero_to_one() {
        let proj = mat4_perspective_rh_z0(60f64.to_radians(), 1.0, 0.5, 50.0);
        let near = mat4_transform_point(proj, Vec3::new(0.0, 0.0, -0.5));
        let far = mat4_transform_point(proj, Vec3::new(0.0, 0.0, -50.0));
        assert!((near[2] / near[3]).abs() < 1e-5);
        assert!((far[2] / far[3] - 1.0).abs() < 1e-5);
    }
}
