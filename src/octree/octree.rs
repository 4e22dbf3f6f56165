use rayon::prelude::*;
use tracing::debug;
use ultraviolet::DVec3;

use super::cube::Cube;
use super::node::{Node, NodeId};
use crate::config;
use crate::particle::Particle;
use crate::profile_scope;
use crate::space_charge::{is_finite, FieldCalculator, FieldSample, ParticleRegistry, SlotKey, SpaceChargeError};

/// Fixed tree parameters, chosen at construction.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TreeParams {
    /// Opening angle: a node of edge `s` at distance `d` is used as a point charge when `s / d < theta`.
    pub theta: f64,
    pub leaf_capacity: usize,
    /// Leaves at this depth take any number of particles (coincident charges).
    pub max_depth: usize,
    pub softening: f64,
    pub coulomb_constant: f64,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            theta: config::TREE_THETA,
            leaf_capacity: config::TREE_LEAF_CAPACITY,
            max_depth: config::TREE_MAX_DEPTH,
            softening: config::SOFTENING_LENGTH_M,
            coulomb_constant: crate::units::COULOMB_CONSTANT,
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub(super) struct TreeParticle {
    pub location: DVec3,
    pub charge: f64,
    pub leaf: NodeId,
}

#[derive(Clone, Copy, Debug, Default)]
struct Aggregate {
    charge: f64,
    abs_charge: f64,
    weighted: DVec3,
}

impl Aggregate {
    fn add(&mut self, charge: f64, abs_charge: f64, at: DVec3) {
        self.charge += charge;
        self.abs_charge += abs_charge;
        self.weighted += at * abs_charge;
    }
}

/// Barnes-Hut octree over the registered particles, updated incrementally.
///
/// Nodes live in an arena with parent links so a particle can be detached from
/// its leaf without a search from the root. The root grows by doubling when a
/// particle lands outside of it.
pub struct SpatialChargeTree {
    pub(super) params: TreeParams,
    pub(super) e_sq: f64,
    pub(super) nodes: Vec<Node>,
    free_nodes: Vec<NodeId>,
    pub(super) root: NodeId,
    pub(super) registry: ParticleRegistry<TreeParticle>,
    pub(super) stale: bool,
}

impl SpatialChargeTree {
    pub fn new(domain: Cube, params: TreeParams) -> Self {
        Self {
            e_sq: params.softening * params.softening,
            params: TreeParams {
                leaf_capacity: params.leaf_capacity.max(1),
                ..params
            },
            nodes: vec![Node::new(domain, None)],
            free_nodes: Vec::new(),
            root: 0,
            registry: ParticleRegistry::new(),
            stale: false,
        }
    }

    pub fn params(&self) -> &TreeParams {
        &self.params
    }

    pub fn root_cube(&self) -> Cube {
        self.nodes[self.root].cube
    }

    /// Net charge of the whole tree as of the last aggregation.
    pub fn total_charge(&self) -> f64 {
        self.nodes[self.root].charge
    }

    pub fn root_centroid(&self) -> DVec3 {
        self.nodes[self.root].centroid
    }

    /// Live nodes reachable from the root.
    pub fn node_count(&self) -> usize {
        self.nodes.len() - self.free_nodes.len()
    }

    pub fn is_stale(&self) -> bool {
        self.stale
    }

    fn alloc_node(&mut self, cube: Cube, parent: Option<NodeId>) -> NodeId {
        match self.free_nodes.pop() {
            Some(id) => {
                self.nodes[id] = Node::new(cube, parent);
                id
            }
            None => {
                self.nodes.push(Node::new(cube, parent));
                self.nodes.len() - 1
            }
        }
    }

    fn child_or_insert(&mut self, node: NodeId, octant: usize) -> NodeId {
        if let Some(child) = self.nodes[node].children[octant] {
            return child;
        }
        let cube = self.nodes[node].cube.into_octant(octant);
        let child = self.alloc_node(cube, Some(node));
        self.nodes[node].children[octant] = Some(child);
        child
    }

    fn grow_root(&mut self, location: DVec3) {
        while !self.nodes[self.root].cube.contains(location) {
            let old = self.root;
            let (cube, octant) = self.nodes[old].cube.grow_towards(location);
            let root = self.alloc_node(cube, None);
            self.nodes[root].children[octant] = Some(old);
            self.nodes[root].count = self.nodes[old].count;
            self.nodes[old].parent = Some(root);
            self.root = root;
            debug!(size = cube.size, "octree root grown");
        }
    }

    /// Descend from the root and drop `key` into the first leaf with room,
    /// splitting full leaves on the way.
    fn place(&mut self, key: SlotKey, location: DVec3) {
        let mut node = self.root;
        let mut depth = 0;
        loop {
            self.nodes[node].count += 1;
            if self.nodes[node].is_leaf() {
                if self.nodes[node].bucket.len() < self.params.leaf_capacity
                    || depth >= self.params.max_depth
                {
                    self.nodes[node].bucket.push(key);
                    self.registry[key].payload.leaf = node;
                    return;
                }
                self.split(node);
            }
            let octant = self.nodes[node].cube.octant(location);
            node = self.child_or_insert(node, octant);
            depth += 1;
        }
    }

    fn split(&mut self, node: NodeId) {
        #[cfg(feature = "debug_octree")]
        println!("SpatialChargeTree::split: node {}", node);
        let keys = std::mem::take(&mut self.nodes[node].bucket);
        for key in keys {
            let location = self.registry[key].payload.location;
            let octant = self.nodes[node].cube.octant(location);
            let child = self.child_or_insert(node, octant);
            self.nodes[child].bucket.push(key);
            self.nodes[child].count += 1;
            self.registry[key].payload.leaf = child;
        }
    }

    /// Take `key` out of its leaf and prune nodes left empty.
    fn detach(&mut self, key: SlotKey) {
        let leaf = self.registry[key].payload.leaf;
        self.nodes[leaf].bucket.retain(|k| *k != key);

        let mut cursor = Some(leaf);
        while let Some(node) = cursor {
            self.nodes[node].count -= 1;
            cursor = self.nodes[node].parent;
        }

        let mut node = leaf;
        while node != self.root && self.nodes[node].is_empty() {
            let Some(parent) = self.nodes[node].parent else { break };
            for slot in self.nodes[parent].children.iter_mut() {
                if *slot == Some(node) {
                    *slot = None;
                }
            }
            self.nodes[node] = Node::new(self.nodes[node].cube, None);
            self.free_nodes.push(node);
            node = parent;
        }
    }

    /// Node ids grouped by depth, root first.
    fn levels(&self) -> Vec<Vec<NodeId>> {
        let mut levels = vec![vec![self.root]];
        loop {
            let next: Vec<NodeId> = levels[levels.len() - 1]
                .iter()
                .flat_map(|&n| self.nodes[n].child_ids())
                .collect();
            if next.is_empty() {
                break;
            }
            levels.push(next);
        }
        levels
    }

    fn aggregate_node(&self, id: NodeId) -> Aggregate {
        let node = &self.nodes[id];
        let mut agg = Aggregate::default();
        for &key in &node.bucket {
            let p = &self.registry[key].payload;
            agg.add(p.charge, p.charge.abs(), p.location);
        }
        for child in node.child_ids() {
            let c = &self.nodes[child];
            agg.add(c.charge, c.abs_charge, c.centroid);
        }
        agg
    }

    /// Field and potential at an arbitrary point from every registered particle.
    pub fn sample_at(&self, location: DVec3) -> Result<FieldSample, SpaceChargeError> {
        if self.stale {
            return Err(SpaceChargeError::StaleChargeDistribution);
        }
        Ok(self.evaluate(location, None))
    }
}

impl FieldCalculator for SpatialChargeTree {
    fn insert_particle(&mut self, particle: &Particle, ext_index: usize) -> Result<(), SpaceChargeError> {
        profile_scope!("tree_insert");
        if !is_finite(particle.location) {
            return Err(SpaceChargeError::NonFiniteLocation { index: ext_index });
        }
        let key = self.registry.insert(
            particle.id,
            ext_index,
            TreeParticle {
                location: particle.location,
                charge: particle.charge,
                leaf: self.root,
            },
        )?;
        self.grow_root(particle.location);
        self.place(key, particle.location);
        self.stale = true;
        Ok(())
    }

    fn remove_particle(&mut self, ext_index: usize) -> Result<(), SpaceChargeError> {
        let key = self.registry.key_by_index(ext_index)?;
        self.detach(key);
        self.registry.remove(ext_index)?;
        self.stale = true;
        Ok(())
    }

    fn update_particle(&mut self, particle: &Particle, ext_index: usize) -> Result<(), SpaceChargeError> {
        let key = self.registry.key_by_index(ext_index)?;
        let entry = &self.registry[key];
        if entry.id != particle.id {
            return Err(SpaceChargeError::ParticleMismatch {
                index: ext_index,
                expected: entry.id,
                found: particle.id,
            });
        }
        if !is_finite(particle.location) {
            return Err(SpaceChargeError::NonFiniteLocation { index: ext_index });
        }

        let leaf = entry.payload.leaf;
        let payload = &mut self.registry[key].payload;
        payload.location = particle.location;
        payload.charge = particle.charge;
        if !self.nodes[leaf].cube.contains(particle.location) {
            self.detach(key);
            self.grow_root(particle.location);
            self.place(key, particle.location);
        }
        self.stale = true;
        Ok(())
    }

    fn number_of_particles(&self) -> usize {
        self.registry.len()
    }

    /// Bottom-up pass, one parallel sweep per tree level.
    fn compute_charge_distribution(&mut self) {
        profile_scope!("charge_aggregation");
        for level in self.levels().iter().rev() {
            let updates: Vec<(NodeId, Aggregate)> = level
                .par_iter()
                .map(|&id| (id, self.aggregate_node(id)))
                .collect();
            for (id, agg) in updates {
                let node = &mut self.nodes[id];
                node.charge = agg.charge;
                node.abs_charge = agg.abs_charge;
                node.centroid = if agg.abs_charge > 0.0 {
                    agg.weighted / agg.abs_charge
                } else {
                    node.cube.center
                };
            }
        }
        self.stale = false;
    }

    fn sample_space_charge(&self, particle: &Particle) -> Result<FieldSample, SpaceChargeError> {
        if self.stale {
            return Err(SpaceChargeError::StaleChargeDistribution);
        }
        let key = self.registry.key_by_particle(particle.id)?;
        Ok(self.evaluate(particle.location, Some(key)))
    }
}
