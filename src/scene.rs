// Scene module for the mirror renderer

use glam::Vec3;

use crate::backend::{MeshHandle, ReflectionTarget, RenderBackend, TextureHandle};
use crate::camera::Camera;
use crate::error::{RenderError, SceneError};
use crate::math::{Plane, Transform};
use crate::reflection::reflect_camera;

/// Surface response of an object to the directional light.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Material {
    pub ambient: Vec3,
    pub diffuse: Vec3,
    pub specular: Vec3,
    pub shininess: f32,
    /// Entry in the backend's texture cache. The cache owns the texture.
    pub texture: Option<TextureHandle>,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            ambient: Vec3::splat(1.0),
            diffuse: Vec3::splat(1.0),
            specular: Vec3::splat(1.0),
            shininess: 32.0,
            texture: None,
        }
    }
}

/// Reflective capability: the mirror's offscreen target and its face in
/// local space.
#[derive(Debug)]
pub struct Reflector {
    target: ReflectionTarget,
    local_normal: Vec3,
}

impl Reflector {
    /// A reflector facing local +Z, matching [`Mesh::quad`](crate::mesh::Mesh::quad).
    pub fn new(target: ReflectionTarget) -> Self {
        Self {
            target,
            local_normal: Vec3::Z,
        }
    }

    pub fn target(&self) -> &ReflectionTarget {
        &self.target
    }

    /// The mirror plane for an object placed at `transform`.
    pub fn world_plane(&self, transform: &Transform) -> Result<Plane, SceneError> {
        Plane::from_point_normal(
            transform.position,
            transform.transform_direction(self.local_normal),
        )
    }
}

/// Represents an object within the 3D scene.
#[derive(Debug)]
pub struct SceneObject {
    pub name: String,
    pub transform: Transform,
    pub material: Material,
    mesh: MeshHandle,
    reflector: Option<Reflector>,
}

impl SceneObject {
    /// Creates a new opaque scene object.
    pub fn new(name: impl Into<String>, mesh: MeshHandle, transform: Transform, material: Material) -> Self {
        Self {
            name: name.into(),
            transform,
            material,
            mesh,
            reflector: None,
        }
    }

    /// Creates a mirror, allocating its reflection target once, here.
    pub fn new_mirror<B: RenderBackend>(
        backend: &mut B,
        name: impl Into<String>,
        mesh: MeshHandle,
        transform: Transform,
        material: Material,
        resolution: (u32, u32),
    ) -> Result<Self, RenderError> {
        let name = name.into();
        let target = backend.create_reflection_target(&name, resolution.0, resolution.1)?;
        log::info!(
            "Created mirror {:?} with a {}x{} reflection target",
            name,
            resolution.0,
            resolution.1
        );
        Ok(Self {
            name,
            transform,
            material,
            mesh,
            reflector: Some(Reflector::new(target)),
        })
    }

    pub fn mesh(&self) -> MeshHandle {
        self.mesh
    }

    pub fn is_mirror(&self) -> bool {
        self.reflector.is_some()
    }

    /// Mirror view of this object, if it is reflective.
    pub fn as_mirror(&self) -> Option<MirrorView<'_>> {
        self.reflector.as_ref().map(|reflector| MirrorView {
            object: self,
            reflector,
        })
    }
}

/// Borrowed view of a reflective [`SceneObject`].
#[derive(Debug, Clone, Copy)]
pub struct MirrorView<'a> {
    object: &'a SceneObject,
    reflector: &'a Reflector,
}

impl<'a> MirrorView<'a> {
    pub fn name(&self) -> &'a str {
        &self.object.name
    }

    /// The mirror plane under the object's current transform.
    pub fn world_plane(&self) -> Result<Plane, SceneError> {
        self.reflector.world_plane(&self.object.transform)
    }

    /// Always the same target, allocated when the mirror was created.
    pub fn reflection_target(&self) -> &'a ReflectionTarget {
        &self.reflector.target
    }

    /// Reflected camera for `real`, or `None` when `real` is behind the mirror.
    pub fn reflection_camera(&self, real: &Camera) -> Result<Option<Camera>, SceneError> {
        let plane = self.world_plane()?;
        Ok(reflect_camera(
            real,
            &plane,
            self.reflection_target().aspect_ratio(),
        ))
    }
}

/// Represents the entire 3D scene.
#[derive(Debug, Default)]
pub struct Scene {
    objects: Vec<SceneObject>,
}

impl Scene {
    /// Creates a new, empty scene.
    pub fn new() -> Self {
        Self {
            objects: Vec::new(),
        }
    }

    /// Adds an object to the scene and returns its index.
    pub fn add_object(&mut self, object: SceneObject) -> usize {
        self.objects.push(object);
        self.objects.len() - 1
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn objects(&self) -> &[SceneObject] {
        &self.objects
    }

    pub fn objects_mut(&mut self) -> &mut [SceneObject] {
        &mut self.objects
    }

    pub fn iter(&self) -> impl Iterator<Item = &SceneObject> {
        self.objects.iter()
    }

    /// Mirrors with their registry index, in registry order.
    pub fn mirrors(&self) -> impl Iterator<Item = (usize, MirrorView<'_>)> {
        self.objects
            .iter()
            .enumerate()
            .filter_map(|(index, object)| object.as_mirror().map(|mirror| (index, mirror)))
    }

    /// Gets an immutable reference to an object by name.
    pub fn get_object(&self, name: &str) -> Option<&SceneObject> {
        self.objects.iter().find(|obj| obj.name == name)
    }
}
