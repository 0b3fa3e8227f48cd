//! Per-axis selectors
//!
//! `AxisSelector` is the canonical form of a selection along one axis.
//! Exactly one selector applies per axis; the combination across axes is
//! owned by `Selection`.

use serde::{Deserialize, Serialize};

use crate::error::{SelectError, SelectResult};

/// Canonical selection along a single axis
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AxisSelector {
    /// Every index of the axis
    All,
    /// Regular range, stop exclusive, step >= 1
    Range {
        /// First selected index
        start: u64,
        /// Exclusive upper bound
        stop: u64,
        /// Distance between selected indices
        step: u64,
    },
    /// `count` blocks of `block` contiguous indices, block i starting at
    /// `start + i * stride`
    MultiBlock {
        /// Start of the first block
        start: u64,
        /// Number of blocks
        count: u64,
        /// Distance between block starts
        stride: u64,
        /// Contiguous indices per block
        block: u64,
    },
    /// Explicit index list, not required to be monotonic
    Points(Vec<u64>),
}

impl AxisSelector {
    /// Build a multi-block selector, rejecting overlapping blocks
    pub fn multi_block(start: u64, count: u64, stride: u64, block: u64) -> SelectResult<Self> {
        if count == 0 || block == 0 || stride == 0 {
            return Err(SelectError::InvalidSelection(
                "multi-block count, stride and block must be positive".to_string(),
            ));
        }
        if block > stride && count > 1 {
            return Err(SelectError::InvalidSelection(format!(
                "multi-block with block {block} > stride {stride} selects overlapping blocks"
            )));
        }
        Ok(AxisSelector::MultiBlock {
            start,
            count,
            stride,
            block,
        })
    }

    /// Number of indices this selector picks on an axis of size `extent`
    pub fn count(&self, extent: u64) -> u64 {
        match self {
            AxisSelector::All => extent,
            AxisSelector::Range { start, stop, step } => {
                if stop <= start {
                    0
                } else {
                    (stop - start).div_ceil(*step)
                }
            }
            AxisSelector::MultiBlock { count, block, .. } => count * block,
            AxisSelector::Points(points) => points.len() as u64,
        }
    }

    /// Check every selected index lies in `[0, extent)`
    pub fn validate(&self, extent: u64) -> SelectResult<()> {
        match self {
            AxisSelector::All => Ok(()),
            AxisSelector::Range { start, stop, step } => {
                if *step == 0 {
                    return Err(SelectError::InvalidSelection("step must be >= 1".to_string()));
                }
                if stop < start {
                    return Err(SelectError::InvalidSelection(
                        "reverse-order range".to_string(),
                    ));
                }
                if *stop > extent {
                    return Err(SelectError::InvalidSelection(format!(
                        "range stop {stop} out of bounds for axis of size {extent}"
                    )));
                }
                Ok(())
            }
            AxisSelector::MultiBlock {
                start,
                count,
                stride,
                block,
            } => {
                if *count == 0 || *block == 0 || *stride == 0 {
                    return Err(SelectError::InvalidSelection(
                        "multi-block count, stride and block must be positive".to_string(),
                    ));
                }
                if *block > *stride && *count > 1 {
                    return Err(SelectError::InvalidSelection(
                        "multi-block blocks overlap".to_string(),
                    ));
                }
                let last = start + (count - 1) * stride + block;
                if last > extent {
                    return Err(SelectError::InvalidSelection(format!(
                        "multi-block extends to {last} past axis of size {extent}"
                    )));
                }
                Ok(())
            }
            AxisSelector::Points(points) => {
                for p in points {
                    if *p >= extent {
                        return Err(SelectError::InvalidSelection(format!(
                            "point {p} out of bounds for axis of size {extent}"
                        )));
                    }
                }
                Ok(())
            }
        }
    }

    /// Iterate the selected indices, in selection order
    pub fn iter(&self, extent: u64) -> AxisIter {
        match self {
            AxisSelector::All => AxisIter::Range {
                next: 0,
                stop: extent,
                step: 1,
            },
            AxisSelector::Range { start, stop, step } => AxisIter::Range {
                next: *start,
                stop: *stop,
                step: *step,
            },
            AxisSelector::MultiBlock {
                start,
                count,
                stride,
                block,
            } => AxisIter::MultiBlock {
                start: *start,
                count: *count,
                stride: *stride,
                block: *block,
                i: 0,
                j: 0,
            },
            AxisSelector::Points(points) => AxisIter::Points {
                points: points.clone(),
                pos: 0,
            },
        }
    }

    /// Position of `index` within this selector's enumeration
    ///
    /// Returns `None` when `index` is not selected. For `Points` with
    /// duplicates, the first occurrence wins.
    pub fn ordinal_of(&self, index: u64, extent: u64) -> Option<u64> {
        match self {
            AxisSelector::All => (index < extent).then_some(index),
            AxisSelector::Range { start, stop, step } => {
                if index < *start || index >= *stop || (index - start) % step != 0 {
                    None
                } else {
                    Some((index - start) / step)
                }
            }
            AxisSelector::MultiBlock {
                start,
                count,
                stride,
                block,
            } => {
                if index < *start {
                    return None;
                }
                let rel = index - start;
                let i = rel / stride;
                let j = rel % stride;
                (i < *count && j < *block).then(|| i * block + j)
            }
            AxisSelector::Points(points) => points
                .iter()
                .position(|p| *p == index)
                .map(|pos| pos as u64),
        }
    }

    /// Distinct chunk indices this selector touches, ascending
    pub fn chunk_indices(&self, chunk_len: u64, extent: u64) -> Vec<u64> {
        match self {
            AxisSelector::Points(points) => {
                let mut chunks: Vec<u64> = points.iter().map(|p| p / chunk_len).collect();
                chunks.sort_unstable();
                chunks.dedup();
                chunks
            }
            _ => {
                let (first, last) = match self.index_bounds(extent) {
                    Some(b) => b,
                    None => return Vec::new(),
                };
                (first / chunk_len..=last / chunk_len)
                    .filter(|c| self.intersect_chunk(*c, chunk_len, extent).is_some())
                    .collect()
            }
        }
    }

    /// First and last selected index, if any
    fn index_bounds(&self, extent: u64) -> Option<(u64, u64)> {
        match self {
            AxisSelector::All => (extent > 0).then(|| (0, extent - 1)),
            AxisSelector::Range { start, step, .. } => {
                let n = self.count(extent);
                (n > 0).then(|| (*start, start + (n - 1) * step))
            }
            AxisSelector::MultiBlock {
                start,
                count,
                stride,
                block,
            } => Some((*start, start + (count - 1) * stride + block - 1)),
            AxisSelector::Points(points) => {
                let min = points.iter().min()?;
                let max = points.iter().max()?;
                Some((*min, *max))
            }
        }
    }

    /// Intersect this selector with chunk `chunk_idx`, re-expressed in
    /// chunk-local coordinates
    ///
    /// Returns `None` when the chunk holds no selected index. The local
    /// axis extent is `min(chunk_len, extent - chunk_offset)`.
    pub fn intersect_chunk(&self, chunk_idx: u64, chunk_len: u64, extent: u64) -> Option<AxisSelector> {
        let off = chunk_idx * chunk_len;
        if off >= extent {
            return None;
        }
        let local_extent = chunk_len.min(extent - off);

        match self {
            AxisSelector::All => Some(AxisSelector::Range {
                start: 0,
                stop: local_extent,
                step: 1,
            }),
            AxisSelector::Range { start, stop, step } => {
                let lo = off.max(*start);
                let hi = (off + local_extent).min(*stop);
                if hi <= lo {
                    return None;
                }
                // First selected index >= lo, congruent with start mod step.
                let first = if lo <= *start {
                    *start
                } else {
                    start + (lo - start).div_ceil(*step) * step
                };
                if first >= hi {
                    return None;
                }
                Some(AxisSelector::Range {
                    start: first - off,
                    stop: hi - off,
                    step: *step,
                })
            }
            AxisSelector::MultiBlock { .. } => {
                let hi = off + local_extent;
                let local: Vec<u64> = self
                    .iter(extent)
                    .skip_while(|i| *i < off)
                    .take_while(|i| *i < hi)
                    .map(|i| i - off)
                    .collect();
                (!local.is_empty()).then(|| AxisSelector::Points(local))
            }
            AxisSelector::Points(points) => {
                let hi = off + local_extent;
                let local: Vec<u64> = points
                    .iter()
                    .filter(|p| **p >= off && **p < hi)
                    .map(|p| p - off)
                    .collect();
                (!local.is_empty()).then(|| AxisSelector::Points(local))
            }
        }
    }
}

/// Iterator over the indices an `AxisSelector` picks
#[derive(Debug, Clone)]
pub enum AxisIter {
    /// Range walk (also used for `All`)
    Range {
        /// Next index to yield
        next: u64,
        /// Exclusive upper bound
        stop: u64,
        /// Step
        step: u64,
    },
    /// Multi-block walk
    MultiBlock {
        /// Start of the first block
        start: u64,
        /// Number of blocks
        count: u64,
        /// Distance between block starts
        stride: u64,
        /// Indices per block
        block: u64,
        /// Current block
        i: u64,
        /// Position within the current block
        j: u64,
    },
    /// Point list walk
    Points {
        /// The point list
        points: Vec<u64>,
        /// Next position
        pos: usize,
    },
}

impl Iterator for AxisIter {
    type Item = u64;

    fn next(&mut self) -> Option<u64> {
        match self {
            AxisIter::Range { next, stop, step } => {
                if *next >= *stop {
                    None
                } else {
                    let v = *next;
                    *next += *step;
                    Some(v)
                }
            }
            AxisIter::MultiBlock {
                start,
                count,
                stride,
                block,
                i,
                j,
            } => {
                if *i >= *count {
                    return None;
                }
                let v = *start + *i * *stride + *j;
                *j += 1;
                if *j == *block {
                    *j = 0;
                    *i += 1;
                }
                Some(v)
            }
            AxisIter::Points { points, pos } => {
                let v = points.get(*pos).copied();
                if v.is_some() {
                    *pos += 1;
                }
                v
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_multiblock_coordinates() {
        // start=1 count=3 stride=4 block=2 over size 11 -> {1,2,5,6,9,10}
        let sel = AxisSelector::multi_block(1, 3, 4, 2).unwrap();
        sel.validate(11).unwrap();
        let coords: Vec<u64> = sel.iter(11).collect();
        assert_eq!(coords, vec![1, 2, 5, 6, 9, 10]);
        assert_eq!(sel.count(11), 6);
    }

    #[test]
    fn test_multiblock_overlap_rejected() {
        assert!(AxisSelector::multi_block(0, 3, 2, 3).is_err());
        // A single block may exceed the stride; nothing overlaps.
        assert!(AxisSelector::multi_block(0, 1, 2, 3).is_ok());
    }

    #[test]
    fn test_range_iteration_and_count() {
        let sel = AxisSelector::Range {
            start: 2,
            stop: 11,
            step: 3,
        };
        sel.validate(11).unwrap();
        assert_eq!(sel.iter(11).collect::<Vec<_>>(), vec![2, 5, 8]);
        assert_eq!(sel.count(11), 3);

        assert!(AxisSelector::Range {
            start: 0,
            stop: 12,
            step: 1
        }
        .validate(11)
        .is_err());
        assert!(AxisSelector::Range {
            start: 0,
            stop: 4,
            step: 0
        }
        .validate(11)
        .is_err());
    }

    #[test]
    fn test_ordinals() {
        let sel = AxisSelector::Range {
            start: 2,
            stop: 11,
            step: 3,
        };
        assert_eq!(sel.ordinal_of(2, 11), Some(0));
        assert_eq!(sel.ordinal_of(8, 11), Some(2));
        assert_eq!(sel.ordinal_of(3, 11), None);

        let mb = AxisSelector::multi_block(1, 3, 4, 2).unwrap();
        assert_eq!(mb.ordinal_of(1, 11), Some(0));
        assert_eq!(mb.ordinal_of(6, 11), Some(3));
        assert_eq!(mb.ordinal_of(4, 11), None);

        let pts = AxisSelector::Points(vec![7, 2, 4]);
        assert_eq!(pts.ordinal_of(2, 11), Some(1));
        assert_eq!(pts.ordinal_of(9, 11), None);
    }

    #[test]
    fn test_chunk_intersection_range() {
        // Indices 2,5,8 over chunks of 4: chunk 0 gets {2}, chunk 1 gets {5},
        // chunk 2 gets {8}.
        let sel = AxisSelector::Range {
            start: 2,
            stop: 11,
            step: 3,
        };
        assert_eq!(sel.chunk_indices(4, 11), vec![0, 1, 2]);
        assert_eq!(
            sel.intersect_chunk(1, 4, 11),
            Some(AxisSelector::Range {
                start: 1,
                stop: 4,
                step: 3
            })
        );
    }

    #[test]
    fn test_chunk_intersection_skips_untouched_chunks() {
        // Step larger than the chunk: indices 0 and 8 touch chunks 0 and 2 only.
        let sel = AxisSelector::Range {
            start: 0,
            stop: 9,
            step: 8,
        };
        assert_eq!(sel.chunk_indices(4, 12), vec![0, 2]);
        assert!(sel.intersect_chunk(1, 4, 12).is_none());
    }

    #[test]
    fn test_chunk_intersection_points_preserves_order() {
        let sel = AxisSelector::Points(vec![9, 1, 5, 2]);
        assert_eq!(sel.chunk_indices(4, 11), vec![0, 1, 2]);
        assert_eq!(
            sel.intersect_chunk(0, 4, 11),
            Some(AxisSelector::Points(vec![1, 2]))
        );
    }

    #[test]
    fn test_chunk_intersection_trailing_partial_chunk() {
        let sel = AxisSelector::All;
        // Axis of 10 with chunks of 4: last chunk holds only 2 indices.
        assert_eq!(
            sel.intersect_chunk(2, 4, 10),
            Some(AxisSelector::Range {
                start: 0,
                stop: 2,
                step: 1
            })
        );
        assert!(sel.intersect_chunk(3, 4, 10).is_none());
    }
}
