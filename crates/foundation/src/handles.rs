/// Generational handle: `(index, generation)`.
///
/// A released index is recycled with a bumped generation, so a stale copy of
/// an old handle never compares equal to the resource that reuses its slot.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Handle(u32, u32);

impl Handle {
    pub fn new(index: u32, generation: u32) -> Self {
        Handle(index, generation)
    }

    pub fn index(self) -> u32 {
        self.0
    }

    pub fn generation(self) -> u32 {
        self.1
    }
}

/// Kinds of device-resident objects a viewer session owns.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ResourceKind {
    /// Rendering context plus its presentation surface.
    Context,
    Geometry,
    Texture,
    Material,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 4] = [
        ResourceKind::Context,
        ResourceKind::Geometry,
        ResourceKind::Texture,
        ResourceKind::Material,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ResourceKind::Context => "context",
            ResourceKind::Geometry => "geometry",
            ResourceKind::Texture => "texture",
            ResourceKind::Material => "material",
        }
    }
}

/// A typed handle to a device-resident object.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResourceHandle {
    pub kind: ResourceKind,
    pub handle: Handle,
}

impl std::fmt::Display for ResourceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}#{}v{}",
            self.kind.as_str(),
            self.handle.index(),
            self.handle.generation()
        )
    }
}

/// Hands out generational handles and recycles released slots.
#[derive(Debug, Default)]
pub struct HandleAllocator {
    generations: Vec<u32>,
    free: Vec<u32>,
}

impl HandleAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&mut self) -> Handle {
        if let Some(index) = self.free.pop() {
            return Handle(index, self.generations[index as usize]);
        }
        let index = self.generations.len() as u32;
        self.generations.push(0);
        Handle(index, 0)
    }

    /// Returns `false` when `handle` is stale or was already released.
    pub fn release(&mut self, handle: Handle) -> bool {
        match self.generations.get_mut(handle.0 as usize) {
            Some(generation) if *generation == handle.1 => {
                *generation = generation.wrapping_add(1);
                self.free.push(handle.0);
                true
            }
            _ => false,
        }
    }

    pub fn is_live(&self, handle: Handle) -> bool {
        self.generations.get(handle.0 as usize) == Some(&handle.1) && !self.free.contains(&handle.0)
    }
}
