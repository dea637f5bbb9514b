use std::path::Path;

use anyhow::Result;
use serde::Serialize;

use crate::{
    config::ExportConfig,
    descriptor::{rig::Rig, round3, schema, write_json},
    scene::{CollisionShape, MeshSource, Object, RigidBodyKind, RigidBodySource},
};

/// An entity descriptor stitching a part, material, transform, and physics
/// data together. Absent pieces are omitted from the JSON entirely.
#[derive(Debug, Serialize)]
pub struct Entity {
    #[serde(rename = "$schema")]
    schema: String,
    name: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub parts: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub materials: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shader: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transform: Option<Transform>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rigidbody: Option<Rigidbody>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collider: Option<Collider>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rig: Option<Rig>,
}

impl Entity {
    /// Starts an entity with its name and transform. An empty-kind object is
    /// complete at this point; mesh entities get their remaining pieces
    /// filled in by the assembler.
    pub fn new(object: &Object) -> Self {
        Self {
            schema: schema("entity"),
            name: object.name.clone(),
            parts: Vec::new(),
            materials: Vec::new(),
            shader: None,
            transform: Some(Transform::new(object)),
            rigidbody: None,
            collider: None,
            rig: None,
        }
    }

    /// Writes the descriptor under `entities/` and returns its reference
    /// path.
    pub fn write(&self, root: &Path, config: &ExportConfig) -> Result<String> {
        let descriptor = format!("entities/{}.json", self.name);
        write_json(&root.join(&descriptor), self)?;

        Ok(config.reference(root, &descriptor))
    }
}

/// A transform descriptor. Components are rounded to three decimal places.
#[derive(Debug, PartialEq, Serialize)]
pub struct Transform {
    #[serde(rename = "$schema")]
    schema: String,
    location: [f32; 3],
    quaternion: [f32; 4],
    scale: [f32; 3],
}

impl Transform {
    pub fn new(object: &Object) -> Self {
        Self {
            schema: schema("transform"),
            location: object.location.map(round3),
            quaternion: object.rotation.map(round3),
            scale: object.scale.map(round3),
        }
    }
}

/// A rigidbody descriptor. Mass only applies to active bodies and is only
/// serialized for them.
#[derive(Debug, PartialEq, Serialize)]
pub struct Rigidbody {
    #[serde(rename = "$schema")]
    schema: String,
    active: bool,
    friction: f32,
    bounce: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    mass: Option<f32>,
}

impl Rigidbody {
    pub fn new(source: &RigidBodySource) -> Self {
        let active = source.kind == RigidBodyKind::Active;

        Self {
            schema: schema("rigidbody"),
            active,
            friction: source.friction,
            bounce: source.restitution,
            mass: active.then(|| source.mass),
        }
    }
}

/// A collider descriptor: the rigidbody's shape tag plus the local-space
/// bounding box of the mesh.
#[derive(Debug, PartialEq, Serialize)]
pub struct Collider {
    #[serde(rename = "$schema")]
    schema: String,
    #[serde(rename = "type")]
    shape: CollisionShape,
    max: [f32; 3],
    min: [f32; 3],
}

impl Collider {
    /// Scans the mesh for its axis-aligned bounds, seeded from the first
    /// vertex so meshes entirely off-origin still bound correctly. A mesh
    /// without vertices has no bounds and no collider.
    pub fn new(source: &RigidBodySource, mesh: &MeshSource) -> Option<Self> {
        let first = *mesh.positions.first()?;
        let mut min = first;
        let mut max = first;

        for position in &mesh.positions[1..] {
            for axis in 0..3 {
                min[axis] = min[axis].min(position[axis]);
                max[axis] = max[axis].max(position[axis]);
            }
        }

        Some(Self {
            schema: schema("collider"),
            shape: source.collision_shape,
            max: max.map(round3),
            min: min.map(round3),
        })
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use crate::scene::{ObjectData, Polygon};

    use super::*;

    #[test]
    fn transform_components_round_to_three_places() {
        let object = Object {
            name: String::from("crate"),
            location: [1.00049, -2.0004, 0.12349],
            rotation: [0.707107, 0., 0.707107, 0.],
            scale: [1., 1., 1.],
            world: Default::default(),
            parent: None,
            rigid_body: None,
            data: ObjectData::Empty,
        };

        let transform = Transform::new(&object);

        assert_eq!([1., -2., 0.123], transform.location);
        assert_eq!([0.707, 0., 0.707, 0.], transform.quaternion);
    }

    #[test]
    fn mass_is_gated_on_the_active_flag() {
        let mut source = RigidBodySource {
            kind: RigidBodyKind::Active,
            mass: 4.5,
            friction: 0.5,
            restitution: 0.1,
            collision_shape: CollisionShape::Box,
        };

        let active = Rigidbody::new(&source);
        assert_eq!(Some(4.5), active.mass);
        assert!(active.active);

        source.kind = RigidBodyKind::Passive;
        let passive = Rigidbody::new(&source);
        assert_eq!(None, passive.mass);
        let json = serde_json::to_value(&passive).unwrap();
        assert!(json.get("mass").is_none());
    }

    #[test]
    fn collider_bounds_are_seeded_from_the_first_vertex() {
        let source = RigidBodySource {
            kind: RigidBodyKind::Passive,
            mass: 0.,
            friction: 0.5,
            restitution: 0.,
            collision_shape: CollisionShape::ConvexHull,
        };
        // All coordinates positive, so zero-seeded bounds would be wrong.
        let mesh = mesh(vec![[2., 3., 4.], [5., 3.5, 6.], [3., 7., 5.]]);

        let collider = Collider::new(&source, &mesh).unwrap();

        assert_eq!([2., 3., 4.], collider.min);
        assert_eq!([5., 7., 6.], collider.max);

        let json = serde_json::to_value(&collider).unwrap();
        assert_eq!("CONVEX_HULL", json["type"]);
    }

    #[test]
    fn empty_mesh_has_no_collider() {
        let source = RigidBodySource {
            kind: RigidBodyKind::Passive,
            mass: 0.,
            friction: 0.,
            restitution: 0.,
            collision_shape: CollisionShape::Box,
        };

        assert_eq!(None, Collider::new(&source, &mesh(Vec::new())));
    }

    #[test]
    fn empty_entity_omits_absent_pieces() {
        let object = Object {
            name: String::from("marker"),
            location: [0.; 3],
            rotation: [1., 0., 0., 0.],
            scale: [1.; 3],
            world: Default::default(),
            parent: None,
            rigid_body: None,
            data: ObjectData::Empty,
        };

        let json = serde_json::to_value(Entity::new(&object)).unwrap();

        assert_eq!("marker", json["name"]);
        assert!(json.get("transform").is_some());
        for absent in ["parts", "materials", "shader", "rigidbody", "collider", "rig"] {
            assert!(json.get(absent).is_none(), "{} should be omitted", absent);
        }
    }

    fn mesh(positions: Vec<[f32; 3]>) -> MeshSource {
        MeshSource {
            name: String::from("mesh"),
            positions,
            normals: Vec::new(),
            polygons: Vec::<Polygon>::new(),
            vertex_groups: Vec::new(),
            material: None,
        }
    }
}
