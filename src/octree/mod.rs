pub mod cube;
pub mod node;

pub use cube::Cube;
pub use node::Node;

mod field;
mod octree;
pub use octree::{SpatialChargeTree, TreeParams};
