use foundation::ResourceHandle;
use foundation::math::Mat4;
use scene::{CameraState, PanoramaScene};

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum RenderCommand {
    Clear {
        color: [f64; 4],
    },
    DrawMesh {
        geometry: ResourceHandle,
        material: ResourceHandle,
        index_count: u32,
    },
}

/// Everything a backend needs to draw one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderFrame {
    pub view_proj: Mat4,
    pub commands: Vec<RenderCommand>,
}

impl RenderFrame {
    /// True when the frame draws the panorama mesh, not just the clear colour.
    pub fn is_textured(&self) -> bool {
        self.commands
            .iter()
            .any(|c| matches!(c, RenderCommand::DrawMesh { .. }))
    }

    pub fn clear_color(&self) -> Option<[f64; 4]> {
        self.commands.iter().find_map(|c| match c {
            RenderCommand::Clear { color } => Some(*color),
            _ => None,
        })
    }
}

pub struct Renderer;

impl Renderer {
    /// Clears, then draws the mesh if the scene has one. A scene without a
    /// material renders as the clear colour alone.
    pub fn collect(scene: &PanoramaScene, camera: &CameraState, clear_color: [f64; 4]) -> RenderFrame {
        let mut commands = vec![RenderCommand::Clear { color: clear_color }];
        if let Some(mesh) = scene.mesh() {
            commands.push(RenderCommand::DrawMesh {
                geometry: mesh.geometry,
                material: mesh.material,
                index_count: mesh.index_count,
            });
        }
        RenderFrame {
            view_proj: camera.view_proj(),
            commands,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{RenderCommand, Renderer};
    use foundation::{Handle, ResourceHandle, ResourceKind};
    use scene::{CameraState, FovRange, PanoramaScene};

    fn handle(kind: ResourceKind) -> ResourceHandle {
        ResourceHandle {
            kind,
            handle: Handle::new(0, 0),
        }
    }

    fn camera() -> CameraState {
        CameraState::new(75.0, FovRange::default(), 2.0, 0.1, 2000.0)
    }

    #[test]
    fn untextured_scene_only_clears() {
        let mut scene = PanoramaScene::new();
        scene.set_geometry(handle(ResourceKind::Geometry), 36).unwrap();

        let frame = Renderer::collect(&scene, &camera(), [0.0, 0.0, 0.0, 1.0]);
        assert!(!frame.is_textured());
        assert_eq!(frame.clear_color(), Some([0.0, 0.0, 0.0, 1.0]));
        assert_eq!(frame.view_proj, camera().view_proj());
    }

    #[test]
    fn textured_scene_draws_the_mesh() {
        let mut scene = PanoramaScene::new();
        scene.set_geometry(handle(ResourceKind::Geometry), 36).unwrap();
        scene
            .attach_material(handle(ResourceKind::Texture), handle(ResourceKind::Material))
            .unwrap();

        let frame = Renderer::collect(&scene, &camera(), [0.0; 4]);
        assert!(matches!(
            frame.commands.as_slice(),
            [
                RenderCommand::Clear { .. },
                RenderCommand::DrawMesh { index_count: 36, .. }
            ]
        ));
    }
}
