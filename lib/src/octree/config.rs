//! Build-time tuning parameters.

use serde::{Deserialize, Serialize};

/// Parameters controlling octree subdivision.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OctreeBuildParams {
    /// Stop subdividing once a node's largest dimension falls below this.
    pub min_octant_size: f32,
    /// Nodes holding this many objects or fewer are left as leaves.
    pub min_objects_to_split: usize,
    /// Expand the root bound to a cube before the first split, so child
    /// regions stay cubic at every level.
    pub cubify: bool,
    /// Record the bounds of every ray-intersected octant during hit tests,
    /// for diagnostic visualization.
    pub record_hit_path_bounds: bool,
}

impl Default for OctreeBuildParams {
    fn default() -> Self {
        Self {
            min_octant_size: 1e-4,
            min_objects_to_split: 2,
            cubify: false,
            record_hit_path_bounds: false,
        }
    }
}
