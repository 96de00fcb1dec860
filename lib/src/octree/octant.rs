//! Flat-array octant storage.
//!
//! The tree is an arena: octants live by value in one contiguous array and
//! refer to each other through plain integer indices, so a built tree is a
//! single allocation traversed without pointer chasing.

use crate::geometry::BoundingBox;
use log::warn;
use std::ops::{Index, IndexMut};

/// Sentinel for an absent parent or child link.
pub const NO_LINK: i32 = -1;

/// One tree node, stored by value in an [`OctantArray`].
///
/// `start..end` is a half-open range into the shared objects array holding
/// the objects this node owns directly; objects that have migrated into a
/// child are no longer in the range.
#[derive(Debug, Clone, Copy)]
pub struct Octant {
    /// Region covered by this node.
    pub bound: BoundingBox,
    /// Index of the parent octant, [`NO_LINK`] for the root.
    pub parent: i32,
    /// Own position in the storage array.
    pub index: i32,
    /// First owned object.
    pub start: usize,
    /// One past the last owned object.
    pub end: usize,
    /// Whether subdivision has been attempted for this node.
    pub is_built: bool,
    children: [i32; 8],
    child_mask: u8,
}

impl Octant {
    pub(crate) fn new(parent: i32, index: i32, bound: BoundingBox) -> Self {
        Self {
            bound,
            parent,
            index,
            start: 0,
            end: 0,
            is_built: false,
            children: [NO_LINK; 8],
            child_mask: 0,
        }
    }

    /// Number of objects owned directly by this node.
    #[inline]
    pub fn count(&self) -> usize {
        self.end - self.start
    }

    /// Whether the node owns no objects directly.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Whether any child slot is populated.
    #[inline]
    pub fn has_children(&self) -> bool {
        self.child_mask != 0
    }

    /// Occupancy bitmask: bit `i` is set when child slot `i` is populated.
    #[inline]
    pub fn child_mask(&self) -> u8 {
        self.child_mask
    }

    /// Index of the child in `slot`, if populated.
    #[inline]
    pub fn child(&self, slot: usize) -> Option<usize> {
        let child = self.children[slot];
        (child != NO_LINK).then(|| child as usize)
    }

    pub(crate) fn set_child(&mut self, slot: usize, index: i32) {
        self.children[slot] = index;
        self.child_mask |= 1 << slot;
    }
}

/// Growable, contiguous octant storage.
///
/// Indices handed out by [`OctantArray::add`] stay valid across growth;
/// capacity doubles on overflow and growth past the addressable maximum is
/// refused rather than attempted.
#[derive(Debug, Default)]
pub struct OctantArray {
    octants: Vec<Octant>,
}

impl OctantArray {
    /// Initial capacity the engine seeds a build with.
    pub const DEFAULT_CAPACITY: usize = 16;

    /// Links are stored as `i32`, which caps the addressable octant count.
    const MAX_LEN: usize = i32::MAX as usize;

    /// Create an empty array.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty array with room for `capacity` octants.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            octants: Vec::with_capacity(capacity.min(Self::MAX_LEN)),
        }
    }

    /// Number of octants stored.
    #[inline]
    pub fn len(&self) -> usize {
        self.octants.len()
    }

    /// Whether the array holds no octants.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.octants.is_empty()
    }

    /// Get an octant by index.
    #[inline]
    pub fn get(&self, index: usize) -> Option<&Octant> {
        self.octants.get(index)
    }

    /// Iterate over all octants in index order.
    pub fn iter(&self) -> std::slice::Iter<'_, Octant> {
        self.octants.iter()
    }

    /// Seed the array with the root octant owning `object_count` objects.
    pub(crate) fn push_root(&mut self, bound: BoundingBox, object_count: usize) -> usize {
        debug_assert!(self.octants.is_empty(), "root must be the first octant");
        let mut root = Octant::new(NO_LINK, 0, bound);
        root.end = object_count;
        self.octants.push(root);
        0
    }

    /// Append a new octant as child `slot` of `parent`.
    ///
    /// Returns `None` when growth would pass the addressable maximum; the
    /// caller leaves the affected branch unsplit.
    pub(crate) fn add(&mut self, parent: usize, slot: usize, bound: BoundingBox) -> Option<usize> {
        let index = self.octants.len();
        if index >= Self::MAX_LEN {
            warn!("octant array at addressable capacity ({index}); branch left unsplit");
            return None;
        }
        if index == self.octants.capacity() {
            let target = (self.octants.capacity().max(1) * 2).min(Self::MAX_LEN);
            self.octants.reserve_exact(target - index);
        }
        self.octants.push(Octant::new(parent as i32, index as i32, bound));
        self.octants[parent].set_child(slot, index as i32);
        Some(index)
    }

    /// Shrink the backing storage to the used count once the build is done.
    pub fn compact(&mut self) {
        self.octants.shrink_to_fit();
    }
}

impl Index<usize> for OctantArray {
    type Output = Octant;

    #[inline]
    fn index(&self, index: usize) -> &Octant {
        &self.octants[index]
    }
}

impl IndexMut<usize> for OctantArray {
    #[inline]
    fn index_mut(&mut self, index: usize) -> &mut Octant {
        &mut self.octants[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    fn unit_bound() -> BoundingBox {
        BoundingBox::new(Vec3::ZERO, Vec3::ONE)
    }

    #[test]
    fn test_root_and_child_wiring() {
        let mut octants = OctantArray::new();
        let root = octants.push_root(unit_bound(), 12);
        assert_eq!(root, 0);
        assert_eq!(octants[root].count(), 12);
        assert_eq!(octants[root].parent, NO_LINK);
        assert!(!octants[root].has_children());

        let child = octants.add(root, 3, unit_bound()).unwrap();
        assert_eq!(octants[child].parent, 0);
        assert_eq!(octants[child].index as usize, child);
        assert_eq!(octants[root].child(3), Some(child));
        assert_eq!(octants[root].child(2), None);
        assert_eq!(octants[root].child_mask(), 0b0000_1000);
    }

    #[test]
    fn test_indices_stable_across_growth() {
        let mut octants = OctantArray::with_capacity(2);
        let root = octants.push_root(unit_bound(), 0);
        let mut children = Vec::new();
        for slot in 0..8 {
            children.push(octants.add(root, slot, unit_bound()).unwrap());
        }
        for (slot, &child) in children.iter().enumerate() {
            assert_eq!(octants[root].child(slot), Some(child));
            assert_eq!(octants[child].parent, 0);
        }
        assert_eq!(octants[root].child_mask(), 0xFF);

        octants.compact();
        assert_eq!(octants.len(), 9);
        assert_eq!(octants[root].child(7), Some(children[7]));
    }
}
