//! # raypick
//!
//! Static octree spatial index for ray picking and nearest-point queries
//! over triangle meshes, line sets, point clouds, and instanced geometry.
//!
//! The octree is built once over borrowed geometry buffers and then queried
//! repeatedly, the access pattern of interactive picking, where a scene is
//! loaded once and hit-tested every pointer move. Octants live by value in a
//! flat array linked by integer indices, objects are partitioned in place
//! into contiguous per-octant slices, and every traversal (build included)
//! runs on an explicit stack rather than recursion.
//!
//! Queries take `&self`, so a built tree can serve concurrent lookups.
//!
//! ```
//! use glam::Vec3;
//! use raypick::{OctreeBuildParams, PointOctree};
//!
//! let points = vec![Vec3::ZERO, Vec3::new(5.0, 0.0, 0.0)];
//! let mut octree = PointOctree::from_points(&points, OctreeBuildParams::default());
//! octree.build_tree();
//!
//! let nearest = octree
//!     .find_nearest_point_from_point(None, Vec3::new(4.0, 1.0, 0.0), 1.0)
//!     .unwrap();
//! assert_eq!(nearest.point, Vec3::new(5.0, 0.0, 0.0));
//! ```

mod error;
pub mod geometry;
pub mod octree;
pub mod query;

pub use error::{Error, Result};
pub use geometry::{BoundingBox, BoundingSphere, Ray};
pub use octree::{
    InstanceOctree, InstanceShape, LineOctree, LineShape, MeshOctree, MeshShape, ObjectEntry,
    Octant, OctantArray, OctreeBuildParams, OctreeShape, PointOctree, PointShape, StaticOctree,
};
pub use query::{
    GeometryHandle, HitDetail, HitResult, ModelHandle, NearestResult, PickContext, RayQuery,
};
