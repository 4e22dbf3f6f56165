use smallvec::SmallVec;
use ultraviolet::DVec3;

use super::node::NodeId;
use super::octree::SpatialChargeTree;
use crate::space_charge::{coulomb_sample, FieldSample, SlotKey};

impl SpatialChargeTree {
    /// Barnes-Hut traversal gathering potential and field at `location`.
    ///
    /// Nodes that hold the excluded particle are never approximated; they are
    /// always descended so the particle itself can be skipped explicitly.
    pub(super) fn evaluate(&self, location: DVec3, excluded: Option<SlotKey>) -> FieldSample {
        let k = self.params.coulomb_constant;
        let theta = self.params.theta;
        let mut excluded_path: SmallVec<[NodeId; 32]> = SmallVec::new();
        if let Some(key) = excluded {
            let mut cursor = Some(self.registry[key].payload.leaf);
            while let Some(id) = cursor {
                excluded_path.push(id);
                cursor = self.nodes[id].parent;
            }
        }

        let mut sample = FieldSample::default();
        let mut stack = vec![self.root];

        while let Some(id) = stack.pop() {
            let node = &self.nodes[id];
            if node.is_empty() {
                continue;
            }

            if node.is_leaf() {
                for &key in &node.bucket {
                    if Some(key) == excluded {
                        continue;
                    }
                    let p = &self.registry[key].payload;
                    sample += coulomb_sample(location - p.location, p.charge, k, self.e_sq);
                }
                continue;
            }

            let d = location - node.centroid;
            let dist = d.mag();
            let far = dist > 0.0 && node.cube.size < theta * dist;
            if far && !excluded_path.contains(&id) {
                sample += coulomb_sample(d, node.charge, k, self.e_sq);
            } else {
                stack.extend(node.child_ids());
            }
        }

        sample
    }
}
