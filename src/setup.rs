//! Turns a [`SceneConfig`] into a live [`Scene`] on a backend.
//!
//! All GPU allocation for the scene happens here, once: meshes (shared by
//! every object of the same shape), textures and mirror reflection targets.

use std::collections::HashMap;
use std::path::Path;

use crate::backend::{MeshHandle, RenderBackend, TextureHandle};
use crate::camera::Camera;
use crate::config::{CameraConfig, MaterialConfig, ObjectConfig, SceneConfig, Shape};
use crate::error::{RenderError, SetupError};
use crate::math::Transform;
use crate::mesh::Mesh;
use crate::scene::{Material, Scene, SceneObject};

const SPHERE_STACKS: u32 = 24;
const SPHERE_SLICES: u32 = 48;

/// Build every configured object. A reflection target that cannot be
/// allocated aborts setup.
pub fn build_scene<B: RenderBackend>(config: &SceneConfig, backend: &mut B) -> Result<Scene, SetupError> {
    let mut meshes: HashMap<Shape, MeshHandle> = HashMap::new();
    let mut scene = Scene::new();

    for object in &config.objects {
        let mesh = match meshes.get(&object.shape) {
            Some(mesh) => *mesh,
            None => {
                let mesh = backend.create_mesh(&shape_mesh(object.shape))?;
                meshes.insert(object.shape, mesh);
                mesh
            }
        };
        scene.add_object(build_object(object, mesh, backend)?);
    }

    log::info!(
        "Scene ready: {} objects, {} mirrors",
        scene.len(),
        scene.mirrors().count()
    );
    Ok(scene)
}

/// The main camera described by `config`, sized for a `width` x `height` target.
pub fn build_camera(config: &CameraConfig, width: u32, height: u32) -> Camera {
    let mut camera = Camera::new(config.position, config.target);
    camera.set_focal_length(config.focal_length);
    camera.set_depth_range(config.near, config.far);
    camera.set_viewport_size(width, height);
    camera
}

fn build_object<B: RenderBackend>(
    config: &ObjectConfig,
    mesh: MeshHandle,
    backend: &mut B,
) -> Result<SceneObject, SetupError> {
    let transform = Transform::from_euler_degrees(config.position, config.rotation, config.scale);
    let material = Material {
        ambient: config.material.ambient,
        diffuse: config.material.diffuse,
        specular: config.material.specular,
        shininess: config.material.shininess,
        texture: load_material_texture(&config.name, &config.material, backend),
    };

    match config.mirror {
        Some(mirror) => {
            if config.shape != Shape::Quad {
                log::warn!(
                    "Mirror {:?} uses shape {:?}; its plane is still the local XY plane",
                    config.name,
                    config.shape
                );
            }
            let [width, height] = mirror.resolution;
            SceneObject::new_mirror(backend, config.name.clone(), mesh, transform, material, (width, height))
                .map_err(|source| SetupError::Object {
                    name: config.name.clone(),
                    source,
                })
        }
        None => Ok(SceneObject::new(config.name.clone(), mesh, transform, material)),
    }
}

fn shape_mesh(shape: Shape) -> Mesh {
    match shape {
        Shape::Cube => Mesh::cube(),
        Shape::Sphere => Mesh::sphere(SPHERE_STACKS, SPHERE_SLICES),
        Shape::Quad => Mesh::quad(),
    }
}

/// Textures that fail to load leave the object untextured.
fn load_material_texture<B: RenderBackend>(
    object: &str,
    material: &MaterialConfig,
    backend: &mut B,
) -> Option<TextureHandle> {
    let path = material.texture.as_deref()?;
    match load_texture(path, backend) {
        Ok(texture) => Some(texture),
        Err(err) => {
            log::warn!("Object {:?}: texture {} not loaded: {}", object, path.display(), err);
            None
        }
    }
}

/// Decode an image file and upload it as RGBA8.
pub fn load_texture<B: RenderBackend>(path: &Path, backend: &mut B) -> Result<TextureHandle, RenderError> {
    let label = path.display().to_string();
    let image = image::open(path)
        .map_err(|err| RenderError::InvalidTexture {
            label: label.clone(),
            reason: err.to_string(),
        })?
        .to_rgba8();
    let (width, height) = image.dimensions();
    backend.create_texture(&label, width, height, image.as_raw())
}
