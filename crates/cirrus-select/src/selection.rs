//! Canonical selections and the indexing-expression normalizer

use serde::{Deserialize, Serialize};

use crate::error::{SelectError, SelectResult};
use crate::selector::AxisSelector;
use crate::shape::Shape;

/// Interpretation of point lists spanning multiple axes
///
/// The two readings select genuinely different element sets, so the mode
/// is carried explicitly on the `Selection` rather than inferred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CoordMode {
    /// Per-axis point lists combine as a Cartesian product
    Cartesian,
    /// Per-axis point lists are zipped into coordinate tuples
    Zipped,
}

/// Boolean mask over one or more leading axes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mask {
    shape: Vec<u64>,
    bits: Vec<bool>,
}

impl Mask {
    /// Build a mask from row-major flags
    pub fn new(shape: Vec<u64>, bits: Vec<bool>) -> SelectResult<Self> {
        let size: u64 = shape.iter().product();
        if shape.is_empty() || size != bits.len() as u64 {
            return Err(SelectError::InvalidSelection(format!(
                "mask shape {:?} does not match {} flags",
                shape,
                bits.len()
            )));
        }
        Ok(Self { shape, bits })
    }

    /// Number of axes the mask covers
    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    /// Mask extent per axis
    pub fn shape(&self) -> &[u64] {
        &self.shape
    }

    /// Coordinates of the true entries, in row-major order
    pub fn true_coords(&self) -> Vec<Vec<u64>> {
        let mut coords = Vec::new();
        let mut cur = vec![0u64; self.shape.len()];
        for flag in &self.bits {
            if *flag {
                coords.push(cur.clone());
            }
            // Row-major increment with carry.
            for axis in (0..self.shape.len()).rev() {
                cur[axis] += 1;
                if cur[axis] < self.shape[axis] {
                    break;
                }
                cur[axis] = 0;
            }
        }
        coords
    }
}

/// One raw per-axis indexing argument, before normalization
///
/// Signed fields accept negative values, which count back from the end
/// of the axis the way the source conventions do.
#[derive(Debug, Clone, PartialEq)]
pub enum IndexArg {
    /// Single index; reduces the axis to one element
    Index(i64),
    /// `start:stop:step` slice with open ends
    Slice {
        /// First index, default 0
        start: Option<i64>,
        /// Exclusive upper bound, default axis size
        stop: Option<i64>,
        /// Step, default 1, must be positive
        step: Option<i64>,
    },
    /// Stands in for as many full axes as the rank requires
    Ellipsis,
    /// Explicit index list for one axis
    Points(Vec<i64>),
    /// Regular pattern of equally spaced blocks
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
    /// Boolean mask covering this and the following `mask.rank() - 1` axes
    Mask(Mask),
}

/// Canonical selection over an n-dimensional shape
///
/// Holds one `AxisSelector` per axis plus the side channels that do not
/// change rank: the compound field projection and the coordinate mode.
/// A `Selection` never references the storage object it was built
/// against, so it can be cached, split per chunk and replayed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    selectors: Vec<AxisSelector>,
    shape: Vec<u64>,
    coord_mode: CoordMode,
    fields: Vec<String>,
}

impl Selection {
    /// Build a selection from canonical selectors, validating bounds
    pub fn new(selectors: Vec<AxisSelector>, shape: &Shape) -> SelectResult<Self> {
        if selectors.len() != shape.rank() {
            return Err(SelectError::InvalidSelection(format!(
                "{} selectors for rank {}",
                selectors.len(),
                shape.rank()
            )));
        }
        for (sel, extent) in selectors.iter().zip(shape.dims()) {
            sel.validate(*extent)?;
            // Cartesian point lists may be unordered, but a repeated
            // point would be fetched twice and cannot be reassembled
            // from per-chunk responses. Zipped selections repeat
            // per-axis values freely and are built elsewhere.
            if let AxisSelector::Points(points) = sel {
                let mut sorted = points.clone();
                sorted.sort_unstable();
                if sorted.windows(2).any(|w| w[0] == w[1]) {
                    return Err(SelectError::InvalidSelection(
                        "point list contains duplicate coordinates".to_string(),
                    ));
                }
            }
        }
        Ok(Self {
            selectors,
            shape: shape.dims().to_vec(),
            coord_mode: CoordMode::Cartesian,
            fields: Vec::new(),
        })
    }

    /// Select every element of `shape`
    pub fn all(shape: &Shape) -> Self {
        Self {
            selectors: vec![AxisSelector::All; shape.rank()],
            shape: shape.dims().to_vec(),
            coord_mode: CoordMode::Cartesian,
            fields: Vec::new(),
        }
    }

    /// Build a zipped (paired-coordinate) point selection
    ///
    /// Each entry of `coords` is one full coordinate tuple; the per-axis
    /// point lists are aligned element-wise rather than crossed.
    pub fn zipped_points(coords: &[Vec<u64>], shape: &Shape) -> SelectResult<Self> {
        if coords.is_empty() {
            return Err(SelectError::InvalidSelection(
                "empty coordinate list".to_string(),
            ));
        }
        let rank = shape.rank();
        let mut axes: Vec<Vec<u64>> = vec![Vec::with_capacity(coords.len()); rank];
        for coord in coords {
            if coord.len() != rank {
                return Err(SelectError::InvalidSelection(format!(
                    "coordinate {:?} for rank {rank}",
                    coord
                )));
            }
            for (axis, idx) in coord.iter().enumerate() {
                if *idx >= shape.dims()[axis] {
                    return Err(SelectError::InvalidSelection(format!(
                        "point {idx} out of bounds for axis of size {}",
                        shape.dims()[axis]
                    )));
                }
                axes[axis].push(*idx);
            }
        }
        // Tuples repeat per-axis values freely, but a whole repeated
        // coordinate would be fetched twice.
        let mut seen = coords.to_vec();
        seen.sort_unstable();
        if seen.windows(2).any(|w| w[0] == w[1]) {
            return Err(SelectError::InvalidSelection(
                "coordinate list contains duplicates".to_string(),
            ));
        }
        Ok(Self {
            selectors: axes.into_iter().map(AxisSelector::Points).collect(),
            shape: shape.dims().to_vec(),
            coord_mode: CoordMode::Zipped,
            fields: Vec::new(),
        })
    }

    /// Attach a compound field projection
    pub fn with_fields(mut self, fields: Vec<String>) -> Self {
        self.fields = fields;
        self
    }

    /// Set the coordinate interpretation mode
    ///
    /// Zipped mode pairs per-axis point lists element-wise, so it
    /// requires a point list on every axis and equal list lengths.
    pub fn with_coord_mode(mut self, mode: CoordMode) -> SelectResult<Self> {
        if mode == CoordMode::Zipped {
            let mut common = None;
            for sel in &self.selectors {
                let AxisSelector::Points(points) = sel else {
                    return Err(SelectError::InvalidSelection(
                        "zipped mode requires a point list on every axis".to_string(),
                    ));
                };
                match common {
                    None => common = Some(points.len()),
                    Some(n) if n == points.len() => {}
                    Some(n) => {
                        return Err(SelectError::InvalidSelection(format!(
                            "zipped point lists of lengths {n} and {} cannot pair",
                            points.len()
                        )))
                    }
                }
            }
            if common.is_none() {
                return Err(SelectError::InvalidSelection(
                    "zipped mode requires at least one axis".to_string(),
                ));
            }
        }
        self.coord_mode = mode;
        Ok(self)
    }

    /// Per-axis selectors
    pub fn selectors(&self) -> &[AxisSelector] {
        &self.selectors
    }

    /// Shape the selection was built against
    pub fn shape(&self) -> &[u64] {
        &self.shape
    }

    /// Coordinate interpretation for point lists
    pub fn coord_mode(&self) -> CoordMode {
        self.coord_mode
    }

    /// Compound field projection, empty when the whole type transfers
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Number of axes
    pub fn rank(&self) -> usize {
        self.selectors.len()
    }

    /// Logical shape of the selected region
    ///
    /// In zipped mode every axis list has the same length and the result
    /// is one-dimensional.
    pub fn selected_shape(&self) -> Vec<u64> {
        match self.coord_mode {
            CoordMode::Zipped => {
                let n = self
                    .selectors
                    .first()
                    .map(|s| s.count(self.shape[0]))
                    .unwrap_or(0);
                vec![n]
            }
            CoordMode::Cartesian => self
                .selectors
                .iter()
                .zip(&self.shape)
                .map(|(s, extent)| s.count(*extent))
                .collect(),
        }
    }

    /// Total number of selected elements
    pub fn num_elements(&self) -> u64 {
        self.selected_shape().iter().product()
    }

    /// Iterate selected coordinates in row-major selection order
    pub fn iter_coords(&self) -> CoordIter {
        CoordIter {
            selection: self,
            next_ordinal: 0,
            total: self.num_elements(),
        }
    }

    /// Coordinate at position `ordinal` of the row-major enumeration
    pub fn coord_at(&self, ordinal: u64) -> Option<Vec<u64>> {
        if ordinal >= self.num_elements() {
            return None;
        }
        match self.coord_mode {
            CoordMode::Zipped => {
                let mut coord = Vec::with_capacity(self.rank());
                for sel in &self.selectors {
                    match sel {
                        AxisSelector::Points(points) => coord.push(points[ordinal as usize]),
                        _ => return None,
                    }
                }
                Some(coord)
            }
            CoordMode::Cartesian => {
                let counts = self.selected_shape();
                let mut rem = ordinal;
                let mut ordinals = vec![0u64; self.rank()];
                for axis in (0..self.rank()).rev() {
                    ordinals[axis] = rem % counts[axis];
                    rem /= counts[axis];
                }
                let mut coord = Vec::with_capacity(self.rank());
                for (axis, sel) in self.selectors.iter().enumerate() {
                    let idx = sel.iter(self.shape[axis]).nth(ordinals[axis] as usize)?;
                    coord.push(idx);
                }
                Some(coord)
            }
        }
    }

    /// Position of `coord` within the row-major enumeration
    pub fn ordinal(&self, coord: &[u64]) -> Option<u64> {
        if coord.len() != self.rank() {
            return None;
        }
        match self.coord_mode {
            CoordMode::Zipped => {
                let n = self.num_elements();
                (0..n).find(|ord| {
                    self.selectors.iter().zip(coord).all(|(sel, idx)| match sel {
                        AxisSelector::Points(points) => points[*ord as usize] == *idx,
                        _ => false,
                    })
                })
            }
            CoordMode::Cartesian => {
                let counts = self.selected_shape();
                let mut ordinal = 0u64;
                for (axis, sel) in self.selectors.iter().enumerate() {
                    let pos = sel.ordinal_of(coord[axis], self.shape[axis])?;
                    ordinal = ordinal * counts[axis] + pos;
                }
                Some(ordinal)
            }
        }
    }
}

/// Row-major iterator over selected coordinates
#[derive(Debug)]
pub struct CoordIter<'a> {
    selection: &'a Selection,
    next_ordinal: u64,
    total: u64,
}

impl Iterator for CoordIter<'_> {
    type Item = Vec<u64>;

    fn next(&mut self) -> Option<Vec<u64>> {
        if self.next_ordinal >= self.total {
            return None;
        }
        let coord = self.selection.coord_at(self.next_ordinal);
        self.next_ordinal += 1;
        coord
    }
}

/// Normalize a raw indexing expression against `shape`
///
/// Expands at most one `Ellipsis` to full axes, resolves negative indices
/// against the axis size, converts masks to point lists in row-major
/// order, and bounds-checks every axis.
pub fn normalize(args: &[IndexArg], shape: &Shape) -> SelectResult<Selection> {
    let rank = shape.rank();
    let expanded = expand_ellipsis(args, rank)?;

    // A full-rank mask zips into coordinate tuples rather than crossing
    // per-axis lists.
    if let [IndexArg::Mask(mask)] = expanded.as_slice() {
        if mask.rank() == rank && rank > 1 {
            if mask.shape() != shape.dims() {
                return Err(SelectError::InvalidSelection(format!(
                    "mask shape {:?} does not match dataset shape {:?}",
                    mask.shape(),
                    shape.dims()
                )));
            }
            let coords = mask.true_coords();
            return Selection::zipped_points(&coords, shape);
        }
    }

    let mut selectors = Vec::with_capacity(rank);
    let mut axis = 0usize;
    for arg in &expanded {
        match arg {
            IndexArg::Mask(mask) => {
                if mask.rank() != 1 {
                    return Err(SelectError::UnsupportedSelection(
                        "multi-axis mask must cover the full rank".to_string(),
                    ));
                }
                let extent = axis_extent(shape, axis)?;
                if mask.shape()[0] != extent {
                    return Err(SelectError::InvalidSelection(format!(
                        "mask length {} for axis of size {extent}",
                        mask.shape()[0]
                    )));
                }
                let points = mask.true_coords().into_iter().map(|c| c[0]).collect();
                selectors.push(AxisSelector::Points(points));
                axis += 1;
            }
            other => {
                let extent = axis_extent(shape, axis)?;
                selectors.push(normalize_axis(other, extent)?);
                axis += 1;
            }
        }
    }
    if axis != rank {
        return Err(SelectError::InvalidSelection(format!(
            "{axis} index arguments for rank {rank}"
        )));
    }
    Selection::new(selectors, shape)
}

fn axis_extent(shape: &Shape, axis: usize) -> SelectResult<u64> {
    shape.dims().get(axis).copied().ok_or_else(|| {
        SelectError::InvalidSelection(format!("too many index arguments for rank {}", shape.rank()))
    })
}

fn expand_ellipsis(args: &[IndexArg], rank: usize) -> SelectResult<Vec<IndexArg>> {
    let positions: Vec<usize> = args
        .iter()
        .enumerate()
        .filter(|(_, a)| matches!(a, IndexArg::Ellipsis))
        .map(|(i, _)| i)
        .collect();
    match positions.as_slice() {
        [] => {
            // An expression shorter than the rank selects whole trailing
            // axes, as if it ended with an ellipsis.
            let explicit: usize = args
                .iter()
                .map(|a| match a {
                    IndexArg::Mask(mask) => mask.rank(),
                    _ => 1,
                })
                .sum();
            if explicit < rank {
                let mut out = args.to_vec();
                out.extend(
                    std::iter::repeat(IndexArg::Slice {
                        start: None,
                        stop: None,
                        step: None,
                    })
                    .take(rank - explicit),
                );
                Ok(out)
            } else {
                Ok(args.to_vec())
            }
        }
        [pos] => {
            // A single-axis mask fills one axis; a multi-axis mask fills
            // its rank.
            let explicit: usize = args
                .iter()
                .filter(|a| !matches!(a, IndexArg::Ellipsis))
                .map(|a| match a {
                    IndexArg::Mask(mask) => mask.rank(),
                    _ => 1,
                })
                .sum();
            let fill = rank.checked_sub(explicit).ok_or_else(|| {
                SelectError::InvalidSelection(format!(
                    "{explicit} explicit axes exceed rank {rank}"
                ))
            })?;
            let mut out = Vec::with_capacity(args.len() - 1 + fill);
            out.extend_from_slice(&args[..*pos]);
            out.extend(
                std::iter::repeat(IndexArg::Slice {
                    start: None,
                    stop: None,
                    step: None,
                })
                .take(fill),
            );
            out.extend_from_slice(&args[pos + 1..]);
            Ok(out)
        }
        _ => Err(SelectError::InvalidSelection(
            "at most one ellipsis is allowed".to_string(),
        )),
    }
}

fn normalize_axis(arg: &IndexArg, extent: u64) -> SelectResult<AxisSelector> {
    match arg {
        IndexArg::Index(i) => {
            let idx = resolve_index(*i, extent)?;
            Ok(AxisSelector::Points(vec![idx]))
        }
        IndexArg::Slice { start, stop, step } => {
            let step = step.unwrap_or(1);
            if step < 1 {
                return Err(SelectError::InvalidSelection(format!(
                    "slice step must be >= 1, got {step}"
                )));
            }
            let start = match start {
                None => 0,
                Some(s) => resolve_bound(*s, extent)?,
            };
            let stop = match stop {
                None => extent,
                Some(s) => resolve_bound(*s, extent)?,
            };
            let stop = stop.max(start);
            if start == 0 && stop == extent && step == 1 {
                Ok(AxisSelector::All)
            } else {
                Ok(AxisSelector::Range {
                    start,
                    stop,
                    step: step as u64,
                })
            }
        }
        IndexArg::Points(points) => {
            let resolved: Vec<u64> = points
                .iter()
                .map(|p| resolve_index(*p, extent))
                .collect::<SelectResult<_>>()?;
            Ok(AxisSelector::Points(resolved))
        }
        IndexArg::MultiBlock {
            start,
            count,
            stride,
            block,
        } => {
            let sel = AxisSelector::multi_block(*start, *count, *stride, *block)?;
            sel.validate(extent)?;
            Ok(sel)
        }
        IndexArg::Ellipsis | IndexArg::Mask(_) => unreachable!("handled by caller"),
    }
}

/// Resolve a possibly negative index, requiring it in bounds
fn resolve_index(i: i64, extent: u64) -> SelectResult<u64> {
    let idx = if i < 0 { i + extent as i64 } else { i };
    if idx < 0 || idx as u64 >= extent {
        return Err(SelectError::InvalidSelection(format!(
            "index {i} out of bounds for axis of size {extent}"
        )));
    }
    Ok(idx as u64)
}

/// Resolve a possibly negative slice bound, clamping to the axis
fn resolve_bound(b: i64, extent: u64) -> SelectResult<u64> {
    let bound = if b < 0 { b + extent as i64 } else { b };
    if bound < 0 {
        return Ok(0);
    }
    let bound = bound as u64;
    if bound > extent {
        return Err(SelectError::InvalidSelection(format!(
            "bound {b} out of bounds for axis of size {extent}"
        )));
    }
    Ok(bound)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slice(start: Option<i64>, stop: Option<i64>, step: Option<i64>) -> IndexArg {
        IndexArg::Slice { start, stop, step }
    }

    #[test]
    fn test_ellipsis_expansion() {
        // [0, ..., 1] against (2,3,4) -> [Points[0], All, Points[1]]
        let shape = Shape::new(vec![2, 3, 4]);
        let sel = normalize(
            &[IndexArg::Index(0), IndexArg::Ellipsis, IndexArg::Index(1)],
            &shape,
        )
        .unwrap();
        assert_eq!(
            sel.selectors(),
            &[
                AxisSelector::Points(vec![0]),
                AxisSelector::All,
                AxisSelector::Points(vec![1]),
            ]
        );
        assert_eq!(sel.selected_shape(), vec![1, 3, 1]);
    }

    #[test]
    fn test_short_expression_selects_trailing_axes() {
        // dset[0] on a 2-D dataset selects all of row 0.
        let shape = Shape::new(vec![2, 3]);
        let sel = normalize(&[IndexArg::Index(0)], &shape).unwrap();
        assert_eq!(
            sel.selectors(),
            &[AxisSelector::Points(vec![0]), AxisSelector::All]
        );
        assert_eq!(sel.selected_shape(), vec![1, 3]);

        let shape = Shape::new(vec![2, 3, 4]);
        let sel = normalize(&[IndexArg::Index(1), slice(Some(0), Some(2), None)], &shape).unwrap();
        assert_eq!(sel.selected_shape(), vec![1, 2, 4]);
    }

    #[test]
    fn test_double_ellipsis_rejected() {
        let shape = Shape::new(vec![2, 3]);
        let err = normalize(&[IndexArg::Ellipsis, IndexArg::Ellipsis], &shape).unwrap_err();
        assert!(matches!(err, SelectError::InvalidSelection(_)));
    }

    #[test]
    fn test_too_many_args_rejected() {
        let shape = Shape::new(vec![4]);
        assert!(normalize(&[IndexArg::Index(0), IndexArg::Index(1)], &shape).is_err());
    }

    #[test]
    fn test_negative_index_and_bounds() {
        let shape = Shape::new(vec![10]);
        let sel = normalize(&[IndexArg::Index(-1)], &shape).unwrap();
        assert_eq!(sel.selectors(), &[AxisSelector::Points(vec![9])]);

        let sel = normalize(&[slice(Some(-4), Some(-1), None)], &shape).unwrap();
        assert_eq!(
            sel.selectors(),
            &[AxisSelector::Range {
                start: 6,
                stop: 9,
                step: 1
            }]
        );

        assert!(normalize(&[IndexArg::Index(10)], &shape).is_err());
        assert!(normalize(&[IndexArg::Index(-11)], &shape).is_err());
    }

    #[test]
    fn test_full_slice_becomes_all() {
        let shape = Shape::new(vec![10]);
        let sel = normalize(&[slice(None, None, None)], &shape).unwrap();
        assert_eq!(sel.selectors(), &[AxisSelector::All]);
    }

    #[test]
    fn test_zero_step_rejected() {
        let shape = Shape::new(vec![10]);
        assert!(normalize(&[slice(None, None, Some(0))], &shape).is_err());
        assert!(normalize(&[slice(None, None, Some(-1))], &shape).is_err());
    }

    #[test]
    fn test_duplicate_points_rejected() {
        // A repeated coordinate would be fetched twice and cannot be
        // reassembled from per-chunk responses.
        let shape = Shape::new(vec![8]);
        let err = normalize(&[IndexArg::Points(vec![1, 1, 5])], &shape).unwrap_err();
        assert!(matches!(err, SelectError::InvalidSelection(_)));

        // Unordered but distinct points stay legal, order preserved.
        let sel = normalize(&[IndexArg::Points(vec![5, 1, 3])], &shape).unwrap();
        assert_eq!(sel.selectors(), &[AxisSelector::Points(vec![5, 1, 3])]);
    }

    #[test]
    fn test_single_axis_mask() {
        let shape = Shape::new(vec![5, 3]);
        let mask = Mask::new(vec![5], vec![true, false, false, true, true]).unwrap();
        let sel = normalize(&[IndexArg::Mask(mask), IndexArg::Ellipsis], &shape).unwrap();
        assert_eq!(
            sel.selectors()[0],
            AxisSelector::Points(vec![0, 3, 4])
        );
        assert_eq!(sel.coord_mode(), CoordMode::Cartesian);
    }

    #[test]
    fn test_full_rank_mask_zips() {
        let shape = Shape::new(vec![2, 3]);
        let mask = Mask::new(
            vec![2, 3],
            vec![false, true, false, true, false, true],
        )
        .unwrap();
        let sel = normalize(&[IndexArg::Mask(mask)], &shape).unwrap();
        assert_eq!(sel.coord_mode(), CoordMode::Zipped);
        assert_eq!(sel.selected_shape(), vec![3]);
        let coords: Vec<Vec<u64>> = sel.iter_coords().collect();
        assert_eq!(coords, vec![vec![0, 1], vec![1, 0], vec![1, 2]]);
    }

    #[test]
    fn test_fields_side_channel_keeps_rank() {
        let shape = Shape::new(vec![6]);
        let sel = normalize(&[slice(Some(1), Some(5), None)], &shape)
            .unwrap()
            .with_fields(vec!["a".to_string(), "b".to_string()]);
        assert_eq!(sel.rank(), 1);
        assert_eq!(sel.fields(), &["a".to_string(), "b".to_string()]);
        assert_eq!(sel.selected_shape(), vec![4]);
    }

    #[test]
    fn test_cartesian_coord_enumeration() {
        let shape = Shape::new(vec![4, 4]);
        let sel = Selection::new(
            vec![
                AxisSelector::Points(vec![2, 0]),
                AxisSelector::Range {
                    start: 1,
                    stop: 4,
                    step: 2,
                },
            ],
            &shape,
        )
        .unwrap();
        // Point order is preserved; last axis varies fastest.
        let coords: Vec<Vec<u64>> = sel.iter_coords().collect();
        assert_eq!(
            coords,
            vec![vec![2, 1], vec![2, 3], vec![0, 1], vec![0, 3]]
        );
        assert_eq!(sel.ordinal(&[0, 3]), Some(3));
        assert_eq!(sel.ordinal(&[1, 1]), None);
        assert_eq!(sel.coord_at(2), Some(vec![0, 1]));
    }

    #[test]
    fn test_zipped_mode_requires_matching_point_lists() {
        let shape = Shape::new(vec![4, 4]);
        let sel = Selection::new(
            vec![
                AxisSelector::Points(vec![0, 1]),
                AxisSelector::Points(vec![2]),
            ],
            &shape,
        )
        .unwrap();
        let err = sel.with_coord_mode(CoordMode::Zipped).unwrap_err();
        assert!(matches!(err, SelectError::InvalidSelection(_)));

        let sel = Selection::new(
            vec![AxisSelector::Points(vec![0, 1]), AxisSelector::All],
            &shape,
        )
        .unwrap();
        assert!(sel.with_coord_mode(CoordMode::Zipped).is_err());

        let sel = Selection::new(
            vec![
                AxisSelector::Points(vec![0, 1]),
                AxisSelector::Points(vec![2, 3]),
            ],
            &shape,
        )
        .unwrap()
        .with_coord_mode(CoordMode::Zipped)
        .unwrap();
        assert_eq!(sel.num_elements(), 2);
        assert_eq!(sel.coord_at(1), Some(vec![1, 3]));
    }

    #[test]
    fn test_zipped_ordinal() {
        let shape = Shape::new(vec![4, 4]);
        let sel =
            Selection::zipped_points(&[vec![0, 1], vec![3, 2], vec![1, 1]], &shape).unwrap();
        assert_eq!(sel.num_elements(), 3);
        assert_eq!(sel.ordinal(&[3, 2]), Some(1));
        assert_eq!(sel.ordinal(&[3, 3]), None);
        assert_eq!(sel.coord_at(2), Some(vec![1, 1]));
    }
}
