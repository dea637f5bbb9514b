use std::collections::HashMap;

use anyhow::Result;
use byteorder::{WriteBytesExt, LE};
use glam::{Vec2, Vec3A};

use crate::{
    config::{ExportConfig, VertexChannels},
    error::Error,
    format::ply::{
        internal::{Ply, Property, ScalarType},
        weights::{self, Influence},
    },
    scene::{MeshSource, Object, Polygon},
};

/// Exports an object's polygon mesh as a geometry container. The object's
/// world matrix is baked at identity for the duration of the export, since
/// placement belongs to the entity transform, not the geometry.
pub fn export_mesh(object: &Object, mesh: &MeshSource, config: &ExportConfig) -> Result<Ply> {
    let _world = object.bake_identity();
    build(mesh, config)
}

fn build(mesh: &MeshSource, config: &ExportConfig) -> Result<Ply> {
    let channels = config.vertex_channels;
    validate(mesh, channels)?;

    let influences = (channels.bg || channels.bw).then(|| weights::resolve(mesh));

    let mut ply = Ply::new();
    ply.comment = (!config.comment.is_empty()).then(|| config.comment.clone());
    ply.properties = properties(channels);

    // A packed record is the exact identity of its vertex, so corners dedup
    // by byte equality. First occurrence wins the index.
    let mut seen: HashMap<Vec<u8>, u32> = HashMap::new();

    for (polygon_index, polygon) in mesh.polygons.iter().enumerate() {
        if polygon.vertices.len() < 3 {
            return Err(Error::DegeneratePolygon {
                mesh: mesh.name.clone(),
                polygon: polygon_index,
            }
            .into());
        }

        // Fan triangulation around the first corner.
        for fan in 1..polygon.vertices.len() - 1 {
            let corners = [0, fan, fan + 1];

            let basis = if channels.txyz || channels.bxyz {
                triangle_basis(mesh, polygon, &corners).ok_or(Error::DegenerateUv {
                    mesh: mesh.name.clone(),
                    face: polygon_index,
                })?
            } else {
                (Vec3A::ZERO, Vec3A::ZERO)
            };

            let mut face = [0; 3];
            for (slot, &corner) in corners.iter().enumerate() {
                let record = pack_corner(
                    mesh,
                    polygon,
                    corner,
                    basis,
                    influences.as_deref(),
                    channels,
                )?;

                face[slot] = match seen.get(&record) {
                    Some(&index) => index,
                    None => {
                        let index = ply.vertices.len() as u32;
                        seen.insert(record.clone(), index);
                        ply.vertices.push(record);
                        index
                    }
                };
            }
            ply.faces.push(face);
        }
    }

    Ok(ply)
}

/// Rejects malformed mesh shapes before any corner is packed, so the
/// indexing in the hot path cannot go out of bounds. Layers are only
/// required for the channels that read them.
fn validate(mesh: &MeshSource, channels: VertexChannels) -> Result<()> {
    let vertex_count = mesh.positions.len();

    if channels.nxyz && mesh.normals.len() != vertex_count {
        return Err(Error::LayerMismatch {
            mesh: mesh.name.clone(),
            layer: "normal",
        }
        .into());
    }

    for (polygon_index, polygon) in mesh.polygons.iter().enumerate() {
        if polygon.vertices.iter().any(|&vertex| vertex as usize >= vertex_count) {
            return Err(Error::VertexOutOfRange {
                mesh: mesh.name.clone(),
                polygon: polygon_index,
            }
            .into());
        }
        if channels.requires_uv() && polygon.uvs.len() != polygon.vertices.len() {
            return Err(Error::MissingUvLayer {
                mesh: mesh.name.clone(),
            }
            .into());
        }
        if channels.rgba {
            if let Some(colors) = &polygon.colors {
                if colors.len() != polygon.vertices.len() {
                    return Err(Error::LayerMismatch {
                        mesh: mesh.name.clone(),
                        layer: "color",
                    }
                    .into());
                }
            }
        }
    }

    Ok(())
}

/// Computes the tangent and bitangent of a triangle from its uv deltas.
/// Returns `None` when the uv mapping is degenerate and the basis would be
/// non-finite.
fn triangle_basis(
    mesh: &MeshSource,
    polygon: &Polygon,
    corners: &[usize; 3],
) -> Option<(Vec3A, Vec3A)> {
    let position = |corner: usize| Vec3A::from(mesh.positions[polygon.vertices[corner] as usize]);
    let uv = |corner: usize| Vec2::from(polygon.uvs[corner]);

    let edge1 = position(corners[1]) - position(corners[0]);
    let edge2 = position(corners[2]) - position(corners[0]);
    let delta1 = uv(corners[1]) - uv(corners[0]);
    let delta2 = uv(corners[2]) - uv(corners[0]);

    let ratio = 1. / (delta1.x * delta2.y - delta2.x * delta1.y);
    let tangent = (edge1 * delta2.y - edge2 * delta1.y) * ratio;
    let bitangent = (edge2 * delta1.x - edge1 * delta2.x) * ratio;

    (tangent.is_finite() && bitangent.is_finite()).then(|| (tangent, bitangent))
}

/// Packs one polygon corner into its little-endian record, channel by
/// channel in declaration order.
fn pack_corner(
    mesh: &MeshSource,
    polygon: &Polygon,
    corner: usize,
    basis: (Vec3A, Vec3A),
    influences: Option<&[Influence]>,
    channels: VertexChannels,
) -> Result<Vec<u8>> {
    let vertex = polygon.vertices[corner] as usize;
    let mut record = Vec::new();

    if channels.xyz {
        for coordinate in mesh.positions[vertex] {
            record.write_f32::<LE>(coordinate)?;
        }
    }
    if channels.uv {
        for coordinate in polygon.uvs[corner] {
            record.write_f32::<LE>(coordinate)?;
        }
    }
    if channels.nxyz {
        for component in mesh.normals[vertex] {
            record.write_f32::<LE>(component)?;
        }
    }
    if channels.txyz {
        for component in basis.0.to_array() {
            record.write_f32::<LE>(component)?;
        }
    }
    if channels.bxyz {
        for component in basis.1.to_array() {
            record.write_f32::<LE>(component)?;
        }
    }
    if channels.rgba {
        let color = polygon
            .colors
            .as_ref()
            .map(|colors| colors[corner])
            .unwrap_or([1.; 4]);
        for component in color {
            record.write_u8((component.clamp(0., 1.) * 255.).round() as u8)?;
        }
    }

    let influence = influences
        .map(|influences| influences.get(vertex).copied().unwrap_or_default())
        .unwrap_or_default();
    if channels.bg {
        for group in influence.groups {
            record.write_i32::<LE>(group)?;
        }
    }
    if channels.bw {
        for weight in influence.weights {
            record.write_f32::<LE>(weight)?;
        }
    }

    Ok(record)
}

/// Declares the vertex properties matching the selected channels, with types
/// agreeing with the packed payload.
fn properties(channels: VertexChannels) -> Vec<Property> {
    let mut properties = Vec::new();
    let mut float = |names: &[&'static str]| {
        for &name in names {
            properties.push(Property {
                kind: ScalarType::Float,
                name,
            });
        }
    };

    if channels.xyz {
        float(&["x", "y", "z"]);
    }
    if channels.uv {
        float(&["s", "t"]);
    }
    if channels.nxyz {
        float(&["nx", "ny", "nz"]);
    }
    if channels.txyz {
        float(&["tx", "ty", "tz"]);
    }
    if channels.bxyz {
        float(&["bx", "by", "bz"]);
    }

    if channels.rgba {
        for name in ["red", "green", "blue", "alpha"] {
            properties.push(Property {
                kind: ScalarType::Uchar,
                name,
            });
        }
    }
    if channels.bg {
        for name in ["b0", "b1", "b2", "b3"] {
            properties.push(Property {
                kind: ScalarType::Int,
                name,
            });
        }
    }
    if channels.bw {
        for name in ["w0", "w1", "w2", "w3"] {
            properties.push(Property {
                kind: ScalarType::Float,
                name,
            });
        }
    }

    properties
}
