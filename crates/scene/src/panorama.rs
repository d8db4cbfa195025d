use foundation::ResourceHandle;

/// Draw binding of geometry and material. Has no GPU object of its own.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Mesh {
    pub geometry: ResourceHandle,
    pub material: ResourceHandle,
    pub index_count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SceneError {
    GeometryAlreadySet,
    MaterialAlreadyAttached,
    NoGeometry,
}

impl std::fmt::Display for SceneError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SceneError::GeometryAlreadySet => write!(f, "scene already has a sphere geometry"),
            SceneError::MaterialAlreadyAttached => write!(f, "scene already has a material"),
            SceneError::NoGeometry => write!(f, "material attached before geometry"),
        }
    }
}

impl std::error::Error for SceneError {}

/// The one-sphere scene of a viewer session.
///
/// The mesh is derived rather than stored, so it exists exactly when both
/// geometry and material do.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PanoramaScene {
    geometry: Option<(ResourceHandle, u32)>,
    material: Option<ResourceHandle>,
    texture: Option<ResourceHandle>,
}

impl PanoramaScene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_geometry(&mut self, geometry: ResourceHandle, index_count: u32) -> Result<(), SceneError> {
        if self.geometry.is_some() {
            return Err(SceneError::GeometryAlreadySet);
        }
        self.geometry = Some((geometry, index_count));
        Ok(())
    }

    /// Takes ownership of a texture and the material sampling it.
    pub fn attach_material(&mut self, texture: ResourceHandle, material: ResourceHandle) -> Result<(), SceneError> {
        if self.geometry.is_none() {
            return Err(SceneError::NoGeometry);
        }
        if self.material.is_some() {
            return Err(SceneError::MaterialAlreadyAttached);
        }
        self.texture = Some(texture);
        self.material = Some(material);
        Ok(())
    }

    pub fn geometry(&self) -> Option<ResourceHandle> {
        self.geometry.map(|(handle, _)| handle)
    }

    pub fn material(&self) -> Option<ResourceHandle> {
        self.material
    }

    pub fn texture(&self) -> Option<ResourceHandle> {
        self.texture
    }

    pub fn mesh(&self) -> Option<Mesh> {
        let (geometry, index_count) = self.geometry?;
        let material = self.material?;
        Some(Mesh {
            geometry,
            material,
            index_count,
        })
    }

    /// Removes the material and its texture, material first.
    pub fn detach_material(&mut self) -> (Option<ResourceHandle>, Option<ResourceHandle>) {
        (self.material.take(), self.texture.take())
    }

    pub fn take_geometry(&mut self) -> Option<ResourceHandle> {
        self.geometry.take().map(|(handle, _)| handle)
    }

    pub fn is_empty(&self) -> bool {
        self.geometry.is_none() && self.material.is_none() && self.texture.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use foundation::{Handle, ResourceKind};

    fn handle(kind: ResourceKind, index: u32) -> ResourceHandle {
        ResourceHandle {
            kind,
            handle: Handle::new(index, 0),
        }
    }

    #[test]
    fn mesh_requires_geometry_and_material() {
        let mut scene = PanoramaScene::new();
        assert!(scene.mesh().is_none());

        scene.set_geometry(handle(ResourceKind::Geometry, 0), 14040).unwrap();
        assert!(scene.mesh().is_none());

        scene
            .attach_material(handle(ResourceKind::Texture, 0), handle(ResourceKind::Material, 0))
            .unwrap();
        let mesh = scene.mesh().unwrap();
        assert_eq!(mesh.index_count, 14040);
        assert_eq!(mesh.material.kind, ResourceKind::Material);

        let (material, texture) = scene.detach_material();
        assert!(material.is_some() && texture.is_some());
        assert!(scene.mesh().is_none());
        assert!(scene.take_geometry().is_some());
        assert!(scene.is_empty());
    }

    #[test]
    fn only_one_geometry_and_one_material() {
        let mut scene = PanoramaScene::new();
        assert_eq!(
            scene.attach_material(handle(ResourceKind::Texture, 0), handle(ResourceKind::Material, 0)),
            Err(SceneError::NoGeometry)
        );
        scene.set_geometry(handle(ResourceKind::Geometry, 0), 6).unwrap();
        assert_eq!(
            scene.set_geometry(handle(ResourceKind::Geometry, 1), 6),
            Err(SceneError::GeometryAlreadySet)
        );
        scene
            .attach_material(handle(ResourceKind::Texture, 0), handle(ResourceKind::Material, 0))
            .unwrap();
        assert_eq!(
            scene.attach_material(handle(ResourceKind::Texture, 1), handle(ResourceKind::Material, 1)),
            Err(SceneError::MaterialAlreadyAttached)
        );
    }

    #[test]
    fn detach_and_take_are_idempotent() {
        let mut scene = PanoramaScene::new();
        assert_eq!(scene.detach_material(), (None, None));
        assert_eq!(scene.take_geometry(), None);
    }
}
