use smallvec::SmallVec;
use ultraviolet::DVec3;

use super::cube::Cube;
use crate::space_charge::SlotKey;

pub type NodeId = usize;

#[derive(Clone, Debug)]
pub struct Node {
    pub cube: Cube,
    pub parent: Option<NodeId>,
    pub children: [Option<NodeId>; 8],
    /// Particles held directly; only leaves carry any.
    pub bucket: SmallVec<[SlotKey; 4]>,
    /// Particles in this subtree. Kept current by every mutation.
    pub count: usize,
    pub charge: f64,
    pub abs_charge: f64,
    /// |q|-weighted center of the subtree's charges.
    pub centroid: DVec3,
}

impl Node {
    pub fn new(cube: Cube, parent: Option<NodeId>) -> Self {
        Self {
            cube,
            parent,
            children: [None; 8],
            bucket: SmallVec::new(),
            count: 0,
            charge: 0.0,
            abs_charge: 0.0,
            centroid: cube.center,
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.children.iter().all(Option::is_none)
    }

    pub fn is_branch(&self) -> bool {
        !self.is_leaf()
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn child_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.children.iter().flatten().copied()
    }
}
