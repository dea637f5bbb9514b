use std::{
    fs,
    io::ErrorKind,
    path::Path,
    time::{Duration, Instant},
};

use anyhow::{Context, Result};
use log::{info, warn};

use crate::{
    config::ExportConfig,
    descriptor::{
        entity::{Collider, Entity, Rigidbody},
        material::Material,
        part::Part,
        rig::Rig,
        scene::{Camera, Light, LightProbe, Scene, Skybox},
    },
    error::Error,
    scene::{MeshSource, Object, ObjectData, SceneGraph},
};

/// Subdirectories created unconditionally at the export root. `audio` and
/// `colliders` are reserved by the engine's layout and stay empty for now.
pub const DIRECTORIES: [&str; 8] = [
    "audio",
    "colliders",
    "entities",
    "materials",
    "parts",
    "scenes",
    "skyboxes",
    "textures",
];

/// Summary of a finished export.
#[derive(Debug)]
pub struct Report {
    pub elapsed: Duration,
    pub entities: usize,
    pub cameras: usize,
    pub lights: usize,
    /// Objects skipped over recoverable per-object failures.
    pub skipped: usize,
}

/// Walks the scene graph and writes the whole output tree under `root`:
/// the directory skeleton, one descriptor per exportable object, the shared
/// scene descriptor, and every referenced binary asset.
///
/// Re-exporting over an existing tree overwrites files in place. Recoverable
/// per-object failures are logged and counted; filesystem failures abort.
pub fn export_scene(graph: &SceneGraph, config: &ExportConfig, root: &Path) -> Result<Report> {
    let start = Instant::now();

    create_dir_tolerant(root)?;
    for directory in DIRECTORIES {
        create_dir_tolerant(&root.join(directory))?;
    }

    let mut scene = Scene::new(&graph.name);
    let mut skipped = 0;

    for object in &graph.objects {
        match &object.data {
            ObjectData::Mesh(mesh) => {
                match export_entity(graph, object, mesh, config, root) {
                    Ok(reference) => scene.entities.push(reference),
                    // Typed failures are per-object; everything else is
                    // filesystem trouble and fatal.
                    Err(error) => match error.root_cause().downcast_ref::<Error>() {
                        Some(recoverable) => {
                            warn!("skipping \"{}\": {}", object.name, recoverable);
                            skipped += 1;
                        }
                        None => return Err(error),
                    },
                }
            }
            ObjectData::Empty => {
                let entity = Entity::new(object);
                scene.entities.push(entity.write(root, config)?);
            }
            ObjectData::Camera(camera) => scene.cameras.push(Camera::new(object, camera)),
            ObjectData::Light(light) => scene.lights.push(Light::new(object, light)),
            ObjectData::LightProbe => scene.light_probes.push(LightProbe::new(object, config)),
            // Armatures surface through the rig of the mesh they deform.
            ObjectData::Armature(_) => {}
            ObjectData::Unknown => {
                warn!("skipping \"{}\": unrecognized object kind", object.name);
                skipped += 1;
            }
        }
    }

    if let Some(world) = &graph.world {
        if let Some(mut skybox) = Skybox::new(world) {
            scene.skybox = Some(skybox.write(root, config)?);
        }
    }

    scene.write(root)?;

    let report = Report {
        elapsed: start.elapsed(),
        entities: scene.entities.len(),
        cameras: scene.cameras.len(),
        lights: scene.lights.len(),
        skipped,
    };
    info!(
        "exported scene \"{}\": {} entities, {} cameras, {} lights, {} skipped",
        graph.name, report.entities, report.cameras, report.lights, report.skipped
    );

    Ok(report)
}

/// Exports one mesh object: geometry container, part and material
/// descriptors, physics data, and the rig when an armature parents the
/// object. Returns the entity descriptor's reference path.
fn export_entity(
    graph: &SceneGraph,
    object: &Object,
    mesh: &MeshSource,
    config: &ExportConfig,
    root: &Path,
) -> Result<String> {
    let mut entity = Entity::new(object);
    let mut part = Part::new(object, mesh, config)?;

    // An unresolvable material costs the material, not the entity.
    if let Some(source) = &mesh.material {
        match Material::resolve(source, config) {
            Ok(mut material) => entity.materials.push(material.save(root, config)?),
            Err(error) => warn!("material \"{}\" skipped: {:#}", source.name, error),
        }
    }

    entity.parts.push(part.write(root, config)?);
    entity.shader = Some(config.shader.clone());
    entity.rigidbody = object.rigid_body.as_ref().map(Rigidbody::new);
    entity.collider = object
        .rigid_body
        .as_ref()
        .and_then(|body| Collider::new(body, mesh));

    if let Some(parent) = object.parent.as_deref().and_then(|name| graph.object(name)) {
        if let ObjectData::Armature(armature) = &parent.data {
            entity.rig = Some(Rig::new(parent, armature, mesh, part.name(), graph.fps)?);
        }
    }

    entity.write(root, config)
}

/// Creates a directory, treating an already existing one as success.
pub(crate) fn create_dir_tolerant(path: &Path) -> Result<()> {
    match fs::create_dir(path) {
        Ok(()) => Ok(()),
        Err(error) if error.kind() == ErrorKind::AlreadyExists => Ok(()),
        Err(error) => {
            Err(error).with_context(|| format!("failed to create {}", path.display()))
        }
    }
}
