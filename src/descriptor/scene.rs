use std::{fs::File, io::BufWriter, path::Path};

use anyhow::{Context, Result};
use image::{codecs::hdr::HdrEncoder, Rgb};
use serde::Serialize;

use crate::{
    config::ExportConfig,
    descriptor::{schema, write_json},
    scene::{CameraSource, ImageSource, LightSource, Object, WorldSource},
};

/// The scene descriptor tying the export together. Entities and the skybox
/// are referenced by descriptor path; cameras, lights, and light probes are
/// small enough to embed inline. Empty collections are omitted.
#[derive(Debug, Serialize)]
pub struct Scene {
    #[serde(rename = "$schema")]
    schema: String,
    name: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub entities: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub cameras: Vec<Camera>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub lights: Vec<Light>,
    #[serde(rename = "light probes", skip_serializing_if = "Vec::is_empty")]
    pub light_probes: Vec<LightProbe>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skybox: Option<String>,
}

impl Scene {
    pub fn new(name: &str) -> Self {
        Self {
            schema: schema("scene"),
            name: name.to_string(),
            entities: Vec::new(),
            cameras: Vec::new(),
            lights: Vec::new(),
            light_probes: Vec::new(),
            skybox: None,
        }
    }

    /// Writes the descriptor under `scenes/`.
    pub fn write(&self, root: &Path) -> Result<()> {
        write_json(&root.join(format!("scenes/{}.json", self.name)), self)
    }
}

/// A camera descriptor. Front, up, and location derive from the camera
/// object's world matrix: the view direction is the negated local Z axis.
#[derive(Debug, Serialize)]
pub struct Camera {
    #[serde(rename = "$schema")]
    schema: String,
    name: String,
    fov: f32,
    near: f32,
    far: f32,
    front: [f32; 3],
    up: [f32; 3],
    location: [f32; 3],
}

impl Camera {
    pub fn new(object: &Object, camera: &CameraSource) -> Self {
        let world = object.world_matrix();

        Self {
            schema: schema("camera"),
            name: object.name.clone(),
            fov: camera.fov,
            near: camera.clip_start,
            far: camera.clip_end,
            front: (-world.z_axis.truncate()).to_array(),
            up: world.y_axis.truncate().to_array(),
            location: world.w_axis.truncate().to_array(),
        }
    }
}

/// A light descriptor. The emitted color is pre-multiplied by the light's
/// energy, the scale the engine expects.
#[derive(Debug, Serialize)]
pub struct Light {
    #[serde(rename = "$schema")]
    schema: String,
    name: String,
    location: [f32; 3],
    color: [f32; 3],
}

impl Light {
    pub fn new(object: &Object, light: &LightSource) -> Self {
        Self {
            schema: schema("light"),
            name: object.name.clone(),
            location: object.location,
            color: light.color.map(|component| component * light.energy),
        }
    }
}

/// A light probe descriptor: placement plus the configured cubemap size.
#[derive(Debug, Serialize)]
pub struct LightProbe {
    #[serde(rename = "$schema")]
    schema: String,
    name: String,
    location: [f32; 3],
    size: u32,
}

impl LightProbe {
    pub fn new(object: &Object, config: &ExportConfig) -> Self {
        Self {
            schema: schema("light-probe"),
            name: object.name.clone(),
            location: object.location,
            size: config.light_probe_resolution,
        }
    }
}

/// The skybox: the world's equirectangular environment image, re-encoded as
/// Radiance HDR next to its descriptor.
#[derive(Debug, Serialize)]
pub struct Skybox<'a> {
    #[serde(rename = "$schema")]
    schema: String,
    name: String,
    environment: String,
    #[serde(skip)]
    image: &'a ImageSource,
}

impl<'a> Skybox<'a> {
    /// Returns `None` when the world has no environment image to export.
    pub fn new(world: &'a WorldSource) -> Option<Self> {
        world.environment.as_ref().map(|image| Self {
            schema: schema("skybox"),
            name: world.name.clone(),
            environment: String::new(),
            image,
        })
    }

    /// Writes the environment image and the descriptor under `skyboxes/`,
    /// returning the descriptor's reference path.
    pub fn write(&mut self, root: &Path, config: &ExportConfig) -> Result<String> {
        let environment = format!("skyboxes/{}.hdr", self.name);

        let rgba = self.image.rgba()?;
        let pixels: Vec<Rgb<f32>> = rgba
            .pixels()
            .map(|pixel| Rgb([0, 1, 2].map(|channel| pixel[channel] as f32 / 255.)))
            .collect();

        let file = File::create(root.join(&environment))
            .with_context(|| format!("failed to create {}", environment))?;
        HdrEncoder::new(BufWriter::new(file))
            .encode(&pixels, rgba.width() as usize, rgba.height() as usize)
            .with_context(|| format!("failed to encode {}", environment))?;
        self.environment = config.reference(root, &environment);

        let descriptor = format!("skyboxes/{}.json", self.name);
        write_json(&root.join(&descriptor), self)?;

        Ok(config.reference(root, &descriptor))
    }
}
