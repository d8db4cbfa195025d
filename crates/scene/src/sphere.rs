use std::f32::consts::{PI, TAU};

/// Which side of the sphere the front faces point to.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Facing {
    Outward,
    /// Mirrored on X: visible from the center, and an equirectangular image
    /// mapped onto it reads left-to-right from the inside.
    Inward,
}

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SphereVertex {
    pub position: [f32; 3],
    /// Texture coordinates with a top-left origin: `v = 0` is the north pole,
    /// i.e. the top row of the equirectangular image.
    pub uv: [f32; 2],
}

#[derive(Debug, Clone, PartialEq)]
pub struct SphereMesh {
    pub radius: f32,
    pub vertices: Vec<SphereVertex>,
    pub indices: Vec<u32>,
}

impl SphereMesh {
    pub fn vertex_count(&self) -> u32 {
        self.vertices.len() as u32
    }

    pub fn index_count(&self) -> u32 {
        self.indices.len() as u32
    }

    /// Size of the vertex and index data as uploaded to the device.
    pub fn byte_size(&self) -> usize {
        std::mem::size_of_val(self.vertices.as_slice()) + std::mem::size_of_val(self.indices.as_slice())
    }
}

/// The sphere a panorama is projected onto: inward-facing, centered at the
/// origin.
pub fn build_panorama_sphere(radius: f32, width_segments: u32, height_segments: u32) -> SphereMesh {
    build_sphere(radius, width_segments, height_segments, Facing::Inward)
}

/// UV sphere with `width_segments` around the equator and `height_segments`
/// from pole to pole. The pole rows emit one triangle per segment instead of
/// a degenerate quad.
pub fn build_sphere(radius: f32, width_segments: u32, height_segments: u32, facing: Facing) -> SphereMesh {
    let width_segments = width_segments.max(3);
    let height_segments = height_segments.max(2);
    let mirror = match facing {
        Facing::Outward => 1.0,
        Facing::Inward => -1.0,
    };

    let stride = width_segments + 1;
    let mut vertices = Vec::with_capacity((stride * (height_segments + 1)) as usize);
    for iy in 0..=height_segments {
        let v = iy as f32 / height_segments as f32;
        let theta = v * PI;
        let sin_t = theta.sin();
        let cos_t = theta.cos();

        // Center the pole texels within their segment.
        let u_offset = if iy == 0 {
            0.5 / width_segments as f32
        } else if iy == height_segments {
            -0.5 / width_segments as f32
        } else {
            0.0
        };

        for ix in 0..=width_segments {
            let u = ix as f32 / width_segments as f32;
            let phi = u * TAU;

            let x = -radius * phi.cos() * sin_t;
            let y = radius * cos_t;
            let z = radius * phi.sin() * sin_t;
            vertices.push(SphereVertex {
                position: [x * mirror, y, z],
                uv: [u + u_offset, v],
            });
        }
    }

    let mut indices = Vec::with_capacity((width_segments * (height_segments - 1) * 6) as usize);
    for iy in 0..height_segments {
        for ix in 0..width_segments {
            let a = iy * stride + ix + 1;
            let b = iy * stride + ix;
            let c = (iy + 1) * stride + ix;
            let d = (iy + 1) * stride + ix + 1;

            if iy != 0 {
                indices.extend_from_slice(&[a, b, d]);
            }
            if iy != height_segments - 1 {
                indices.extend_from_slice(&[b, c, d]);
            }
        }
    }

    SphereMesh {
        radius,
        vertices,
        indices,
    }
}
