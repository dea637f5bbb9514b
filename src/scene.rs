use std::{
    cell::{Cell, RefCell},
    collections::HashMap,
};

use anyhow::{anyhow, Result};
use glam::Mat4;
use serde::{Deserialize, Serialize};

use crate::config::MaterialChannel;

/// The scene-graph object model handed over by the host tool. The export
/// pipeline only reads it, apart from two sanctioned transient mutations:
/// an object's world matrix (baked at identity around a geometry export) and
/// an armature's animation cursor (repointed while sampling poses). Both are
/// interior and restored through guards, error paths included.
#[derive(Debug, Serialize, Deserialize)]
pub struct SceneGraph {
    pub name: String,
    /// Frame rate used to convert strip start frames into seconds.
    pub fps: f32,
    pub objects: Vec<Object>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub world: Option<WorldSource>,
}

impl SceneGraph {
    /// Looks an object up by name. Parent references resolve through here.
    pub fn object(&self, name: &str) -> Option<&Object> {
        self.objects.iter().find(|object| object.name == name)
    }
}

/// One object of the scene graph, with its kind payload.
#[derive(Debug, Serialize, Deserialize)]
pub struct Object {
    pub name: String,
    pub location: [f32; 3],
    /// Unit quaternion, w first.
    pub rotation: [f32; 4],
    pub scale: [f32; 3],
    /// Column-major world matrix.
    #[serde(default = "identity")]
    pub world: Cell<[[f32; 4]; 4]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rigid_body: Option<RigidBodySource>,
    pub data: ObjectData,
}

fn identity() -> Cell<[[f32; 4]; 4]> {
    Cell::new(Mat4::IDENTITY.to_cols_array_2d())
}

impl Object {
    pub fn world_matrix(&self) -> Mat4 {
        Mat4::from_cols_array_2d(&self.world.get())
    }

    /// Sets the world matrix to identity for the duration of the returned
    /// guard. Geometry must be baked without the object transform applied.
    pub fn bake_identity(&self) -> WorldGuard<'_> {
        let saved = self.world.get();
        self.world.set(Mat4::IDENTITY.to_cols_array_2d());
        WorldGuard {
            slot: &self.world,
            saved,
        }
    }
}

/// Restores an object's world matrix when dropped.
pub struct WorldGuard<'a> {
    slot: &'a Cell<[[f32; 4]; 4]>,
    saved: [[f32; 4]; 4],
}

impl Drop for WorldGuard<'_> {
    fn drop(&mut self) {
        self.slot.set(self.saved);
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ObjectData {
    Mesh(MeshSource),
    Camera(CameraSource),
    Light(LightSource),
    LightProbe,
    Armature(ArmatureSource),
    Empty,
    /// Any kind tag this exporter does not recognize. The assembler skips
    /// these with a warning instead of failing the whole scene load.
    #[serde(other)]
    Unknown,
}

/// Polygon mesh data with per-corner attribute layers.
#[derive(Debug, Serialize, Deserialize)]
pub struct MeshSource {
    pub name: String,
    pub positions: Vec<[f32; 3]>,
    /// Per-vertex normals, parallel to `positions`.
    pub normals: Vec<[f32; 3]>,
    pub polygons: Vec<Polygon>,
    /// Vertex groups double as the bone list: group indices are the stable
    /// bone indices the geometry container and the rig agree on.
    #[serde(default)]
    pub vertex_groups: Vec<VertexGroup>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub material: Option<MaterialSource>,
}

/// An n-gon face. Uv and color layers are per corner, parallel to `vertices`.
#[derive(Debug, Serialize, Deserialize)]
pub struct Polygon {
    pub vertices: Vec<u32>,
    #[serde(default)]
    pub uvs: Vec<[f32; 2]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub colors: Option<Vec<[f32; 4]>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VertexGroup {
    pub name: String,
    /// (vertex index, weight) memberships of this group.
    pub weights: Vec<(u32, f32)>,
}

/// A material as authored in the host: a name and, when supported, the
/// principled shader node the resolver reads channel inputs from.
#[derive(Debug, Serialize, Deserialize)]
pub struct MaterialSource {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub principled: Option<PrincipledNode>,
}

/// The recognized physically-based parameter block. Each field mirrors one
/// input slot on the host's principled shader node.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PrincipledNode {
    pub albedo: ChannelInput,
    pub normal: ChannelInput,
    pub rough: ChannelInput,
    pub metal: ChannelInput,
    pub ao: ChannelInput,
    pub height: ChannelInput,
    pub emit: ChannelInput,
}

impl PrincipledNode {
    pub fn input(&self, channel: MaterialChannel) -> &ChannelInput {
        match channel {
            MaterialChannel::Albedo => &self.albedo,
            MaterialChannel::Normal => &self.normal,
            MaterialChannel::Rough => &self.rough,
            MaterialChannel::Metal => &self.metal,
            MaterialChannel::Ao => &self.ao,
            MaterialChannel::Height => &self.height,
            MaterialChannel::Emit => &self.emit,
        }
    }
}

/// What one shader input slot is connected to.
#[derive(Debug, Default, Serialize, Deserialize)]
pub enum ChannelInput {
    /// Linked to an image texture node.
    Image(ImageNode),
    /// Linked to a node network this exporter cannot flatten.
    Node,
    /// Unlinked; carries the slot's default color or scalar (splatted).
    Value([f32; 4]),
    /// Unlinked with no default to synthesize from.
    #[default]
    Unconnected,
}

/// An image texture node with its sampling settings, in host vocabulary.
#[derive(Debug, Serialize, Deserialize)]
pub struct ImageNode {
    pub image: ImageSource,
    #[serde(default)]
    pub interpolation: Interpolation,
    #[serde(default)]
    pub extension: Extension,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Interpolation {
    #[default]
    Linear,
    Closest,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Extension {
    #[default]
    Repeat,
    Extend,
    Clip,
}

/// A user-authored image asset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageSource {
    pub name: String,
    pub width: u32,
    pub height: u32,
    /// Tightly packed RGBA8 rows; base64-encoded in scene files.
    #[serde(with = "base64_pixels")]
    pub pixels: Vec<u8>,
}

impl ImageSource {
    /// Decodes the packed rows into an owned pixel buffer.
    pub fn rgba(&self) -> Result<image::RgbaImage> {
        image::RgbaImage::from_raw(self.width, self.height, self.pixels.clone()).ok_or_else(|| {
            anyhow!(
                "image \"{}\" holds {} bytes, expected {}",
                self.name,
                self.pixels.len(),
                self.width as usize * self.height as usize * 4
            )
        })
    }
}

mod base64_pixels {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&base64::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        base64::decode(text).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CameraSource {
    /// Field of view, in degrees.
    pub fov: f32,
    pub clip_start: f32,
    pub clip_end: f32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LightSource {
    pub color: [f32; 3],
    pub energy: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RigidBodyKind {
    Active,
    Passive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CollisionShape {
    Box,
    Sphere,
    Capsule,
    Cylinder,
    Cone,
    ConvexHull,
    Mesh,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RigidBodySource {
    pub kind: RigidBodyKind,
    pub mass: f32,
    pub friction: f32,
    pub restitution: f32,
    pub collision_shape: CollisionShape,
}

/// The scene's world settings; the equirectangular environment image feeds
/// the skybox.
#[derive(Debug, Serialize, Deserialize)]
pub struct WorldSource {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<ImageSource>,
}

/// A bone hierarchy with its animation tracks.
#[derive(Debug, Serialize, Deserialize)]
pub struct ArmatureSource {
    pub bones: Vec<SourceBone>,
    #[serde(default)]
    pub tracks: Vec<NlaTrack>,
    /// Which action is evaluated at which frame right now. Sampling repoints
    /// it through [`ArmatureSource::set_cursor`] and restores it on drop.
    #[serde(default)]
    pub cursor: RefCell<Cursor>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SourceBone {
    pub name: String,
    /// Rest-pose head position, armature space.
    pub head: [f32; 3],
    /// Rest-pose tail position, armature space.
    pub tail: [f32; 3],
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NlaTrack {
    pub name: String,
    pub strips: Vec<NlaStrip>,
}

/// A named, time-positioned animation segment.
#[derive(Debug, Serialize, Deserialize)]
pub struct NlaStrip {
    pub name: String,
    pub frame_start: f32,
    /// Name of the action evaluated while this strip is active.
    pub action: String,
    /// Posed head/tail per bone under this strip's action. Bones without an
    /// entry evaluate to their rest pose.
    #[serde(default)]
    pub pose: HashMap<String, PosedBone>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PosedBone {
    pub head: [f32; 3],
    pub tail: [f32; 3],
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Cursor {
    pub active_action: Option<String>,
    pub frame: i32,
}

impl ArmatureSource {
    /// Follows parent references from an arbitrary bone to the hierarchy
    /// root. Returns `None` for an armature without bones.
    pub fn root_bone(&self) -> Option<&SourceBone> {
        let mut bone = self.bones.first()?;
        while let Some(parent) = &bone.parent {
            match self.bones.iter().find(|candidate| &candidate.name == parent) {
                Some(found) => bone = found,
                None => break,
            }
        }
        Some(bone)
    }

    pub fn children_of<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a SourceBone> + 'a {
        self.bones
            .iter()
            .filter(move |bone| bone.parent.as_deref() == Some(name))
    }

    /// Repoints the animation cursor and returns a guard that restores the
    /// previous cursor state when dropped.
    pub fn set_cursor(&self, action: &str, frame: i32) -> CursorGuard<'_> {
        let saved = self.cursor.borrow().clone();
        *self.cursor.borrow_mut() = Cursor {
            active_action: Some(action.to_string()),
            frame,
        };
        CursorGuard {
            cursor: &self.cursor,
            saved: Some(saved),
        }
    }

    /// Evaluates a bone under the cursor's active action, falling back to the
    /// rest pose when no strip poses it.
    pub fn evaluate(&self, bone: &SourceBone) -> PosedBone {
        if let Some(action) = self.cursor.borrow().active_action.as_deref() {
            for track in &self.tracks {
                for strip in &track.strips {
                    if strip.action == action {
                        if let Some(posed) = strip.pose.get(&bone.name) {
                            return posed.clone();
                        }
                    }
                }
            }
        }

        PosedBone {
            head: bone.head,
            tail: bone.tail,
        }
    }
}

/// Restores an armature's animation cursor when dropped.
pub struct CursorGuard<'a> {
    cursor: &'a RefCell<Cursor>,
    saved: Option<Cursor>,
}

impl Drop for CursorGuard<'_> {
    fn drop(&mut self) {
        if let Some(saved) = self.saved.take() {
            *self.cursor.borrow_mut() = saved;
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn armature() -> ArmatureSource {
        ArmatureSource {
            bones: vec![
                SourceBone {
                    name: String::from("hand"),
                    head: [0., 2., 0.],
                    tail: [0., 3., 0.],
                    parent: Some(String::from("arm")),
                },
                SourceBone {
                    name: String::from("arm"),
                    head: [0., 0., 0.],
                    tail: [0., 2., 0.],
                    parent: None,
                },
            ],
            tracks: vec![NlaTrack {
                name: String::from("track"),
                strips: vec![NlaStrip {
                    name: String::from("wave"),
                    frame_start: 10.,
                    action: String::from("wave_action"),
                    pose: HashMap::from([(
                        String::from("hand"),
                        PosedBone {
                            head: [1., 2., 0.],
                            tail: [1., 3., 0.],
                        },
                    )]),
                }],
            }],
            cursor: RefCell::default(),
        }
    }

    #[test]
    fn root_bone_follows_parents() {
        let armature = armature();
        assert_eq!("arm", armature.root_bone().unwrap().name);
    }

    #[test]
    fn cursor_guard_restores_previous_state() {
        let armature = armature();
        {
            let _guard = armature.set_cursor("wave_action", 10);
            assert_eq!(
                Some("wave_action"),
                armature.cursor.borrow().active_action.as_deref()
            );
        }
        assert_eq!(None, armature.cursor.borrow().active_action);
        assert_eq!(0, armature.cursor.borrow().frame);
    }

    #[test]
    fn evaluate_prefers_the_active_pose() {
        let armature = armature();
        let hand = &armature.bones[0];

        // Rest pose without a cursor.
        assert_eq!([0., 2., 0.], armature.evaluate(hand).head);

        let _guard = armature.set_cursor("wave_action", 10);
        assert_eq!([1., 2., 0.], armature.evaluate(hand).head);
        // Bones the action does not pose stay at rest.
        assert_eq!([0., 0., 0.], armature.evaluate(&armature.bones[1]).head);
    }

    #[test]
    fn unrecognized_kinds_deserialize_to_unknown() {
        let json = r#"{
            "name": "speaker",
            "location": [0, 0, 0],
            "rotation": [1, 0, 0, 0],
            "scale": [1, 1, 1],
            "data": { "kind": "SPEAKER", "volume": 11 }
        }"#;

        let object: Object = serde_json::from_str(json).unwrap();

        assert!(matches!(object.data, ObjectData::Unknown));
    }

    #[test]
    fn world_guard_restores_the_matrix() {
        let object = Object {
            name: String::from("cube"),
            location: [0.; 3],
            rotation: [1., 0., 0., 0.],
            scale: [1.; 3],
            world: Cell::new(Mat4::from_translation(glam::Vec3::X).to_cols_array_2d()),
            parent: None,
            rigid_body: None,
            data: ObjectData::Empty,
        };

        let before = object.world.get();
        {
            let _guard = object.bake_identity();
            assert_eq!(Mat4::IDENTITY, object.world_matrix());
        }
        assert_eq!(before, object.world.get());
    }
}
