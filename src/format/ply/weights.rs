use crate::scene::MeshSource;

/// Per-vertex skinning influences, truncated to the four strongest. Unused
/// slots keep a group index of -1 and a weight of zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Influence {
    pub groups: [i32; 4],
    pub weights: [f32; 4],
}

impl Default for Influence {
    fn default() -> Self {
        Self {
            groups: [-1; 4],
            weights: [0.; 4],
        }
    }
}

impl Influence {
    /// Inserts a candidate influence, keeping the slots sorted by descending
    /// weight. Weaker slots shift right and the weakest falls off. Ties keep
    /// the earlier entry in place, so group order breaks them.
    fn insert(&mut self, group: i32, weight: f32) {
        for slot in 0..4 {
            if weight > self.weights[slot] {
                for moved in (slot + 1..4).rev() {
                    self.groups[moved] = self.groups[moved - 1];
                    self.weights[moved] = self.weights[moved - 1];
                }
                self.groups[slot] = group;
                self.weights[slot] = weight;
                return;
            }
        }
    }
}

/// Gathers the vertex-group memberships of every vertex and resolves each to
/// its top four influences. Group indices are the bone indices the rig uses.
pub fn resolve(mesh: &MeshSource) -> Vec<Influence> {
    let mut influences = vec![Influence::default(); mesh.positions.len()];

    for (group, vertex_group) in mesh.vertex_groups.iter().enumerate() {
        for &(vertex, weight) in &vertex_group.weights {
            if let Some(influence) = influences.get_mut(vertex as usize) {
                influence.insert(group as i32, weight);
            }
        }
    }

    influences
}
