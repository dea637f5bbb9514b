use std::{fs, path::Path};

use anyhow::{Context, Result};
use serde::Serialize;

use crate::{
    config::ExportConfig,
    descriptor::{schema, write_json},
    format::ply::{exporter, internal::Ply},
    scene::{MeshSource, Object},
};

/// A part descriptor: one mesh bound to its geometry container, shader, and
/// material name. The `path` field references the container, not the
/// descriptor itself.
#[derive(Debug, Serialize)]
pub struct Part {
    #[serde(rename = "$schema")]
    schema: String,
    name: String,
    shader: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    material: Option<String>,
    path: String,
    #[serde(skip)]
    geometry: Ply,
}

impl Part {
    /// Exports the object's geometry and binds the descriptor fields.
    /// Nothing is written until [`Part::write`].
    pub fn new(object: &Object, mesh: &MeshSource, config: &ExportConfig) -> Result<Self> {
        let geometry = exporter::export_mesh(object, mesh, config)?;

        Ok(Self {
            schema: schema("part"),
            name: mesh.name.clone(),
            shader: config.shader.clone(),
            material: mesh.material.as_ref().map(|material| material.name.clone()),
            path: String::new(),
            geometry,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Writes the geometry container and the descriptor under `parts/` and
    /// returns the reference path of the descriptor.
    pub fn write(&mut self, root: &Path, config: &ExportConfig) -> Result<String> {
        let container = format!("parts/{}.ply", self.name);
        fs::write(root.join(&container), self.geometry.to_bytes()?)
            .with_context(|| format!("failed to write parts/{}.ply", self.name))?;
        self.path = config.reference(root, &container);

        let descriptor = format!("parts/{}.json", self.name);
        write_json(&root.join(&descriptor), self)?;

        Ok(config.reference(root, &descriptor))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use crate::scene::Polygon;

    use super::*;

    #[test]
    fn descriptor_carries_shader_and_material() {
        let config = ExportConfig::default();
        let object = object();
        let mesh = match &object.data {
            crate::scene::ObjectData::Mesh(mesh) => mesh,
            _ => unreachable!(),
        };

        let part = Part::new(&object, mesh, &config).unwrap();
        let json = serde_json::to_value(&part).unwrap();

        assert_eq!("triangle", json["name"]);
        assert_eq!("G10/shaders/G10 PBR.json", json["shader"]);
        assert_eq!(
            "https://raw.githubusercontent.com/Jacob-C-Smith/G10-Schema/main/part-schema.json",
            json["$schema"]
        );
        assert!(json.get("material").is_none());
    }

    fn object() -> Object {
        Object {
            name: String::from("triangle"),
            location: [0.; 3],
            rotation: [1., 0., 0., 0.],
            scale: [1.; 3],
            world: std::cell::Cell::new(glam::Mat4::IDENTITY.to_cols_array_2d()),
            parent: None,
            rigid_body: None,
            data: crate::scene::ObjectData::Mesh(MeshSource {
                name: String::from("triangle"),
                positions: vec![[0., 0., 0.], [1., 0., 0.], [0., 1., 0.]],
                normals: vec![[0., 0., 1.]; 3],
                polygons: vec![Polygon {
                    vertices: vec![0, 1, 2],
                    uvs: vec![[0., 0.], [1., 0.], [0., 1.]],
                    colors: None,
                }],
                vertex_groups: Vec::new(),
                material: None,
            }),
        }
    }
}
