//! Chunk planning
//!
//! Maps a selection over a chunked dataset to the set of chunks it
//! touches, with the selection re-expressed in each chunk's local
//! coordinates. Plans are logical descriptors only; no chunk buffer is
//! allocated here.

use crate::error::{SelectError, SelectResult};
use crate::selection::{CoordMode, Selection};
use crate::shape::Shape;

/// Chunk-shape heuristic tuning
const CHUNK_BASE: u64 = 16 * 1024;
const CHUNK_MIN: u64 = 8 * 1024;
const CHUNK_MAX: u64 = 1024 * 1024;

/// One chunk a selection touches
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkPlan {
    /// Chunk coordinate, one index per axis
    pub chunk_coord: Vec<u64>,
    /// Element offset of the chunk's origin in dataset space
    pub chunk_offset: Vec<u64>,
    /// The original selection restricted to this chunk, in chunk-local
    /// coordinates
    pub local: Selection,
}

impl ChunkPlan {
    /// Map a chunk-local coordinate back to dataset space
    pub fn to_global(&self, local_coord: &[u64]) -> Vec<u64> {
        local_coord
            .iter()
            .zip(&self.chunk_offset)
            .map(|(l, o)| l + o)
            .collect()
    }
}

/// Compute the chunks `selection` touches, row-major over chunk coords
///
/// The returned order is deterministic: chunk coordinate tuples ascend
/// with the last axis varying fastest. Empty intersections never appear.
pub fn plan_chunks(
    shape: &Shape,
    chunk_shape: Option<&[u64]>,
    selection: &Selection,
) -> SelectResult<Vec<ChunkPlan>> {
    ChunkIter::new(shape, chunk_shape, selection)?.collect()
}

/// Restartable lazy traversal of the chunks a selection touches
///
/// Yields the same sequence as [`plan_chunks`] without materializing it.
#[derive(Debug, Clone)]
pub struct ChunkIter {
    selection: Selection,
    shape: Vec<u64>,
    chunk_shape: Vec<u64>,
    // Per-axis candidate chunk indices, ascending.
    axis_chunks: Vec<Vec<u64>>,
    // Position into axis_chunks per axis; None once exhausted.
    cursor: Option<Vec<usize>>,
}

impl ChunkIter {
    /// Build an iterator positioned at the first touched chunk
    pub fn new(
        shape: &Shape,
        chunk_shape: Option<&[u64]>,
        selection: &Selection,
    ) -> SelectResult<Self> {
        let chunk_shape = chunk_shape.ok_or(SelectError::NotChunked)?;
        if chunk_shape.len() != shape.rank() || chunk_shape.iter().any(|c| *c == 0) {
            return Err(SelectError::InvalidSelection(format!(
                "chunk shape {:?} for dataset shape {:?}",
                chunk_shape,
                shape.dims()
            )));
        }
        if selection.rank() != shape.rank() {
            return Err(SelectError::InvalidSelection(format!(
                "selection rank {} for dataset rank {}",
                selection.rank(),
                shape.rank()
            )));
        }

        let axis_chunks: Vec<Vec<u64>> = selection
            .selectors()
            .iter()
            .zip(chunk_shape)
            .zip(shape.dims())
            .map(|((sel, clen), extent)| sel.chunk_indices(*clen, *extent))
            .collect();
        let cursor = if axis_chunks.iter().any(|c| c.is_empty()) {
            None
        } else {
            Some(vec![0usize; axis_chunks.len()])
        };
        Ok(Self {
            selection: selection.clone(),
            shape: shape.dims().to_vec(),
            chunk_shape: chunk_shape.to_vec(),
            axis_chunks,
            cursor,
        })
    }

    /// Reset to the first touched chunk
    pub fn restart(&mut self) {
        self.cursor = if self.axis_chunks.iter().any(|c| c.is_empty()) {
            None
        } else {
            Some(vec![0usize; self.axis_chunks.len()])
        };
    }

    fn advance(cursor: &mut Vec<usize>, axis_chunks: &[Vec<u64>]) -> bool {
        // Row-major carry, last axis fastest.
        for axis in (0..cursor.len()).rev() {
            cursor[axis] += 1;
            if cursor[axis] < axis_chunks[axis].len() {
                return true;
            }
            cursor[axis] = 0;
        }
        false
    }

    fn plan_at(&self, chunk_coord: &[u64]) -> SelectResult<Option<ChunkPlan>> {
        let mut local_selectors = Vec::with_capacity(chunk_coord.len());
        let mut local_dims = Vec::with_capacity(chunk_coord.len());
        let mut chunk_offset = Vec::with_capacity(chunk_coord.len());
        for (axis, c) in chunk_coord.iter().enumerate() {
            let clen = self.chunk_shape[axis];
            let extent = self.shape[axis];
            let off = c * clen;
            match self.selection.selectors()[axis].intersect_chunk(*c, clen, extent) {
                // A candidate from the per-axis Cartesian product can
                // still miss; zipped point lists also prune here.
                None => return Ok(None),
                Some(local) => local_selectors.push(local),
            }
            local_dims.push(clen.min(extent - off));
            chunk_offset.push(off);
        }

        let local_shape = Shape::new(local_dims);
        let local = match self.selection.coord_mode() {
            CoordMode::Cartesian => Selection::new(local_selectors, &local_shape)?,
            CoordMode::Zipped => {
                // Per-axis intersection breaks tuple pairing; filter the
                // original tuples by chunk membership instead.
                let coords: Vec<Vec<u64>> = self
                    .selection
                    .iter_coords()
                    .filter(|coord| {
                        coord
                            .iter()
                            .zip(&chunk_offset)
                            .zip(local_shape.dims())
                            .all(|((i, off), dim)| *i >= *off && *i < off + dim)
                    })
                    .map(|coord| {
                        coord
                            .iter()
                            .zip(&chunk_offset)
                            .map(|(i, off)| i - off)
                            .collect()
                    })
                    .collect();
                if coords.is_empty() {
                    return Ok(None);
                }
                Selection::zipped_points(&coords, &local_shape)?
            }
        };
        let local = local.with_fields(self.selection.fields().to_vec());
        Ok(Some(ChunkPlan {
            chunk_coord: chunk_coord.to_vec(),
            chunk_offset,
            local,
        }))
    }
}

impl Iterator for ChunkIter {
    type Item = SelectResult<ChunkPlan>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let cursor = self.cursor.as_mut()?;
            let chunk_coord: Vec<u64> = cursor
                .iter()
                .enumerate()
                .map(|(axis, pos)| self.axis_chunks[axis][*pos])
                .collect();
            let more = Self::advance(cursor, &self.axis_chunks);
            if !more {
                self.cursor = None;
            }
            match self.plan_at(&chunk_coord) {
                Ok(Some(plan)) => return Some(Ok(plan)),
                Ok(None) => continue,
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

/// Pick a chunk shape for a dataset with no declared chunking
///
/// Scales a base chunk byte size with the dataset's total byte size,
/// then halves the chunk's slowest-varying axes until the chunk fits
/// under the ceiling. Unlimited axes are treated as size 1024 for the
/// estimate.
pub fn guess_chunk(shape: &Shape, item_size: u64) -> Vec<u64> {
    if shape.is_scalar() {
        return Vec::new();
    }
    let dims: Vec<u64> = shape
        .dims()
        .iter()
        .map(|d| if *d == 0 { 1024 } else { *d })
        .collect();

    let mut chunk = dims.clone();
    let dataset_bytes = dims.iter().product::<u64>() as f64 * item_size as f64;

    // Scale the target with the dataset size: 16 KiB at 1 MiB, doubling
    // per 10x, clamped to [8 KiB, 1 MiB].
    let scale = (dataset_bytes / (1024.0 * 1024.0)).max(f64::MIN_POSITIVE);
    let target = (CHUNK_BASE as f64 * 2f64.powf(scale.log10())) as u64;
    let target = target.clamp(CHUNK_MIN, CHUNK_MAX);

    let mut axis = 0usize;
    loop {
        let chunk_bytes: u64 = chunk.iter().product::<u64>() * item_size;
        if chunk_bytes <= target || chunk.iter().all(|c| *c == 1) {
            break;
        }
        if chunk[axis] > 1 {
            chunk[axis] = chunk[axis].div_ceil(2);
        }
        axis = (axis + 1) % chunk.len();
    }
    chunk
}
