//! Broadcast expansion of a source buffer onto a destination selection
//!
//! Source axes are right-aligned against the destination's selected
//! shape. A source axis of size 1, or a missing leading axis, replicates
//! across the full destination extent of that axis. Any other mismatch
//! is an error, never a silent truncation.

use crate::error::{SelectError, SelectResult};
use crate::selection::Selection;
use crate::selector::AxisSelector;

/// One destination element paired with the source element that fills it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BroadcastPair {
    /// Destination coordinate in dataset space
    pub coord: Vec<u64>,
    /// Row-major index into the flat source buffer
    pub source_index: u64,
}

/// Expand a source of `source_shape` onto `dest`
///
/// Returns a lazy iterator of `(destination coordinate, source index)`
/// pairs in the destination's row-major selection order. Point-selected
/// destination axes are rejected: the caller must pre-expand the source
/// to matching element counts for those.
pub fn expand(source_shape: &[u64], dest: &Selection) -> SelectResult<BroadcastIter> {
    for sel in dest.selectors() {
        if matches!(sel, AxisSelector::Points(_)) {
            return Err(SelectError::UnsupportedSelection(
                "cannot broadcast onto a point selection".to_string(),
            ));
        }
    }

    let dest_shape = dest.selected_shape();
    if source_shape.len() > dest_shape.len() {
        return Err(SelectError::ShapeMismatch {
            src: source_shape.to_vec(),
            dest: dest_shape,
        });
    }

    // Right-align the source against the destination. source_extent[axis]
    // is the source size along each destination axis, 1 where the source
    // has no axis.
    let offset = dest_shape.len() - source_shape.len();
    let mut source_extent = vec![1u64; dest_shape.len()];
    source_extent[offset..].copy_from_slice(source_shape);
    for (s, d) in source_extent.iter().zip(&dest_shape) {
        if *s != 1 && s != d {
            return Err(SelectError::ShapeMismatch {
                src: source_shape.to_vec(),
                dest: dest_shape,
            });
        }
    }

    Ok(BroadcastIter {
        dest: dest.clone(),
        dest_shape,
        source_extent,
        next_ordinal: 0,
        total: dest.num_elements(),
    })
}

/// Lazy sequence of broadcast pairs, row-major over the destination
#[derive(Debug, Clone)]
pub struct BroadcastIter {
    dest: Selection,
    dest_shape: Vec<u64>,
    source_extent: Vec<u64>,
    next_ordinal: u64,
    total: u64,
}

impl BroadcastIter {
    /// Total number of pairs the iterator yields
    pub fn len(&self) -> u64 {
        self.total
    }

    /// True when the destination selects nothing
    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    fn source_index_for(&self, ordinal: u64) -> u64 {
        // Decompose the destination ordinal into per-axis positions, then
        // recompose against the source extents with size-1 axes pinned
        // to 0.
        let rank = self.dest_shape.len();
        let mut rem = ordinal;
        let mut positions = vec![0u64; rank];
        for axis in (0..rank).rev() {
            positions[axis] = rem % self.dest_shape[axis];
            rem /= self.dest_shape[axis];
        }
        let mut index = 0u64;
        for axis in 0..rank {
            let pos = if self.source_extent[axis] == 1 {
                0
            } else {
                positions[axis]
            };
            index = index * self.source_extent[axis] + pos;
        }
        index
    }
}

impl Iterator for BroadcastIter {
    type Item = BroadcastPair;

    fn next(&mut self) -> Option<BroadcastPair> {
        if self.next_ordinal >= self.total {
            return None;
        }
        let ordinal = self.next_ordinal;
        self.next_ordinal += 1;
        let coord = self.dest.coord_at(ordinal)?;
        Some(BroadcastPair {
            coord,
            source_index: self.source_index_for(ordinal),
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = (self.total - self.next_ordinal) as usize;
        (left, Some(left))
    }
}
