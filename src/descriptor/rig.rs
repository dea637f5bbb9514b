use std::{cmp::Ordering, collections::HashMap};

use anyhow::{Context, Result};
use serde::Serialize;

use crate::{
    descriptor::schema,
    error::Error,
    scene::{ArmatureSource, MeshSource, NlaStrip, Object, SourceBone},
};

/// A rig descriptor: the bone hierarchy in rest pose plus one sampled pose
/// per animation strip, grouped into actions.
#[derive(Debug, Serialize)]
pub struct Rig {
    #[serde(rename = "$schema")]
    schema: String,
    name: String,
    #[serde(rename = "bone count")]
    bone_count: usize,
    #[serde(rename = "part name")]
    part_name: String,
    actions: Vec<Action>,
    bones: Bone,
}

impl Rig {
    /// Samples the armature's animation tracks and snapshots the bone tree.
    /// Bone indices come from the deformed mesh's vertex groups, so the rig
    /// and the geometry container agree on them. The armature's animation
    /// cursor is restored after sampling, error paths included.
    pub fn new(
        object: &Object,
        armature: &ArmatureSource,
        mesh: &MeshSource,
        part_name: &str,
        fps: f32,
    ) -> Result<Self> {
        // Deltas divide by the frame rate; zero or NaN would serialize as
        // null.
        if !(fps > 0.) {
            return Err(Error::InvalidFrameRate {
                rig: object.name.clone(),
            }
            .into());
        }

        let indexes: HashMap<&str, i32> = mesh
            .vertex_groups
            .iter()
            .enumerate()
            .map(|(index, group)| (group.name.as_str(), index as i32))
            .collect();

        let root = armature
            .root_bone()
            .with_context(|| format!("armature \"{}\" has no bones", object.name))?;

        let mut actions = Vec::new();
        for track in &armature.tracks {
            let mut strips: Vec<&NlaStrip> = track.strips.iter().collect();
            strips.sort_by(|a, b| {
                a.frame_start
                    .partial_cmp(&b.frame_start)
                    .unwrap_or(Ordering::Equal)
            });

            let mut action = Action {
                name: track.name.clone(),
                poses: Vec::new(),
                pose_sequence: Vec::new(),
            };

            for strip in strips {
                let delta = strip.frame_start / fps;
                let frame = (delta * fps).round() as i32;

                let bones = {
                    let _cursor = armature.set_cursor(&strip.action, frame);
                    Bone::snapshot(armature, root, &indexes)
                };

                action.poses.push(PoseSnapshot {
                    name: strip.name.clone(),
                    bones,
                });
                action.pose_sequence.push(Pose {
                    name: strip.name.clone(),
                    delta,
                });
            }

            actions.push(action);
        }

        Ok(Self {
            schema: schema("rig"),
            name: object.name.clone(),
            bone_count: armature.bones.len(),
            part_name: part_name.to_string(),
            actions,
            bones: Bone::snapshot(armature, root, &indexes),
        })
    }
}

/// One bone of the hierarchy, evaluated under the armature's current cursor.
#[derive(Debug, PartialEq, Serialize)]
pub struct Bone {
    name: String,
    head: [f32; 3],
    tail: [f32; 3],
    index: i32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    children: Vec<Bone>,
}

impl Bone {
    /// Snapshots the tree rooted at `bone`. Bones without a matching vertex
    /// group carry index -1.
    fn snapshot(armature: &ArmatureSource, bone: &SourceBone, indexes: &HashMap<&str, i32>) -> Self {
        let posed = armature.evaluate(bone);

        Self {
            name: bone.name.clone(),
            head: posed.head,
            tail: posed.tail,
            index: indexes.get(bone.name.as_str()).copied().unwrap_or(-1),
            children: armature
                .children_of(&bone.name)
                .map(|child| Self::snapshot(armature, child, indexes))
                .collect(),
        }
    }
}

/// An action: one sampled pose per strip plus the timeline of the poses.
#[derive(Debug, Serialize)]
pub struct Action {
    name: String,
    poses: Vec<PoseSnapshot>,
    #[serde(rename = "pose sequence")]
    pose_sequence: Vec<Pose>,
}

/// The whole bone tree as captured for one pose.
#[derive(Debug, Serialize)]
pub struct PoseSnapshot {
    name: String,
    bones: Bone,
}

/// A timeline entry: the pose name and its offset in seconds.
#[derive(Debug, PartialEq, Serialize)]
pub struct Pose {
    name: String,
    delta: f32,
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::HashMap as Map;

    use pretty_assertions::assert_eq;

    use crate::scene::{NlaTrack, ObjectData, Polygon, PosedBone, VertexGroup};

    use super::*;

    #[test]
    fn poses_are_ordered_by_start_frame() {
        let (object, armature, mesh) = rigged();

        let rig = Rig::new(&object, &armature, &mesh, "body", 24.).unwrap();

        let action = &rig.actions[0];
        let names: Vec<_> = action
            .pose_sequence
            .iter()
            .map(|pose| pose.name.as_str())
            .collect();
        assert_eq!(vec!["crouch", "idle", "jump"], names);

        let deltas: Vec<_> = action.pose_sequence.iter().map(|pose| pose.delta).collect();
        assert_eq!(vec![5. / 24., 30. / 24., 60. / 24.], deltas);
    }

    #[test]
    fn snapshots_capture_the_posed_bones() {
        let (object, armature, mesh) = rigged();

        let rig = Rig::new(&object, &armature, &mesh, "body", 24.).unwrap();

        // The crouch strip poses the spine lower.
        let crouch = &rig.actions[0].poses[0];
        assert_eq!("crouch", crouch.name);
        assert_eq!([0., 0., 0.5], crouch.bones.tail);

        // The rest-pose tree is captured without a cursor.
        assert_eq!([0., 0., 1.], rig.bones.tail);
        assert_eq!(0, rig.bones.index);
    }

    #[test]
    fn cursor_is_restored_after_sampling() {
        let (object, armature, mesh) = rigged();

        Rig::new(&object, &armature, &mesh, "body", 24.).unwrap();

        assert_eq!(None, armature.cursor.borrow().active_action);
    }

    #[test]
    fn non_positive_frame_rate_is_an_error() {
        let (object, armature, mesh) = rigged();

        let error = Rig::new(&object, &armature, &mesh, "body", 0.).unwrap_err();

        assert_eq!(
            Some(&Error::InvalidFrameRate {
                rig: String::from("skeleton"),
            }),
            error.downcast_ref(),
        );
    }

    #[test]
    fn unmatched_bones_get_sentinel_indices() {
        let (object, armature, mut mesh) = rigged();
        mesh.vertex_groups.clear();

        let rig = Rig::new(&object, &armature, &mesh, "body", 24.).unwrap();

        assert_eq!(-1, rig.bones.index);
    }

    fn rigged() -> (Object, ArmatureSource, MeshSource) {
        let strip = |name: &str, frame_start: f32, tail_z: f32| NlaStrip {
            name: name.to_string(),
            frame_start,
            action: format!("{}_action", name),
            pose: Map::from([(
                String::from("spine"),
                PosedBone {
                    head: [0.; 3],
                    tail: [0., 0., tail_z],
                },
            )]),
        };

        let armature = ArmatureSource {
            bones: vec![SourceBone {
                name: String::from("spine"),
                head: [0.; 3],
                tail: [0., 0., 1.],
                parent: None,
            }],
            tracks: vec![NlaTrack {
                name: String::from("base"),
                strips: vec![
                    strip("idle", 30., 1.),
                    strip("crouch", 5., 0.5),
                    strip("jump", 60., 1.5),
                ],
            }],
            cursor: RefCell::default(),
        };

        let object = Object {
            name: String::from("skeleton"),
            location: [0.; 3],
            rotation: [1., 0., 0., 0.],
            scale: [1.; 3],
            world: Default::default(),
            parent: None,
            rigid_body: None,
            data: ObjectData::Empty,
        };

        let mesh = MeshSource {
            name: String::from("body"),
            positions: vec![[0.; 3]],
            normals: vec![[0., 0., 1.]],
            polygons: Vec::<Polygon>::new(),
            vertex_groups: vec![VertexGroup {
                name: String::from("spine"),
                weights: vec![(0, 1.)],
            }],
            material: None,
        };

        (object, armature, mesh)
    }
}
