//! Wire selection grammar
//!
//! Per-axis terms, ASCII, joined by `,` inside brackets:
//! - `*` selects the whole axis
//! - `start:stop` a contiguous range, `start:stop:step` a strided one
//! - `start:stop:stride:block` a multi-block pattern, stop derived from
//!   `start + count * stride`
//! - `[i,j,k]` an explicit point list
//!
//! Point lists spanning several axes are ambiguous between Cartesian and
//! paired-coordinate reading, so the wire form carries an explicit mode
//! tag; the decoder is a left inverse of the encoder for every canonical
//! selection.

use serde::{Deserialize, Serialize};

use cirrus_select::{AxisSelector, CoordMode, SelectError, Selection, Shape};

use crate::error::ClientResult;

/// Selections whose string form exceeds this ride in a request body
/// instead of a query parameter
pub const MAX_SELECT_QUERY_LEN: usize = 100;

/// Wire form of a canonical selection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireSelection {
    /// Bracketed, comma-joined per-axis terms
    pub select: String,
    /// Colon-joined compound field projection, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<String>,
    /// True when point lists pair element-wise instead of crossing
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub zipped: bool,
}

impl WireSelection {
    /// True when this selection should travel in a request body
    pub fn prefers_body(&self) -> bool {
        self.select.len() > MAX_SELECT_QUERY_LEN
    }
}

/// Serialize a canonical selection to its wire form
pub fn encode_selection(selection: &Selection) -> WireSelection {
    let terms: Vec<String> = selection
        .selectors()
        .iter()
        .map(encode_axis)
        .collect();
    let fields = if selection.fields().is_empty() {
        None
    } else {
        Some(selection.fields().join(":"))
    };
    WireSelection {
        select: format!("[{}]", terms.join(",")),
        fields,
        zipped: selection.coord_mode() == CoordMode::Zipped,
    }
}

fn encode_axis(sel: &AxisSelector) -> String {
    match sel {
        AxisSelector::All => "*".to_string(),
        AxisSelector::Range { start, stop, step } => {
            if *step == 1 {
                format!("{start}:{stop}")
            } else {
                format!("{start}:{stop}:{step}")
            }
        }
        AxisSelector::MultiBlock {
            start,
            count,
            stride,
            block,
        } => {
            let stop = start + count * stride;
            format!("{start}:{stop}:{stride}:{block}")
        }
        AxisSelector::Points(points) => {
            let list: Vec<String> = points.iter().map(|p| p.to_string()).collect();
            format!("[{}]", list.join(","))
        }
    }
}

/// Parse a wire selection back into a canonical selection over `shape`
pub fn decode_selection(wire: &WireSelection, shape: &Shape) -> ClientResult<Selection> {
    let body = wire
        .select
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .ok_or_else(|| {
            SelectError::InvalidSelection(format!("selection not bracketed: {}", wire.select))
        })?;

    let mut selectors = Vec::new();
    for term in split_terms(body) {
        selectors.push(decode_axis(&term)?);
    }

    let mut selection = if wire.zipped {
        zip_point_axes(&selectors, shape)?
    } else {
        Selection::new(selectors, shape)?
    };
    if let Some(fields) = &wire.fields {
        selection = selection.with_fields(fields.split(':').map(str::to_string).collect());
    }
    Ok(selection)
}

// A zipped tag pairs per-axis point lists element-wise, so every term
// must be a point list and all lists must have the same length.
fn zip_point_axes(selectors: &[AxisSelector], shape: &Shape) -> Result<Selection, SelectError> {
    let mut axes = Vec::with_capacity(selectors.len());
    for sel in selectors {
        let AxisSelector::Points(points) = sel else {
            return Err(SelectError::InvalidSelection(
                "zipped selection with a non-point term".to_string(),
            ));
        };
        axes.push(points);
    }
    let len = axes
        .first()
        .map(|a| a.len())
        .ok_or_else(|| SelectError::InvalidSelection("zipped selection of rank 0".to_string()))?;
    if axes.iter().any(|a| a.len() != len) {
        return Err(SelectError::InvalidSelection(
            "zipped point lists differ in length".to_string(),
        ));
    }
    let coords: Vec<Vec<u64>> = (0..len)
        .map(|i| axes.iter().map(|a| a[i]).collect())
        .collect();
    Selection::zipped_points(&coords, shape)
}

// Axis terms are comma-separated, but point lists nest brackets with
// commas of their own.
fn split_terms(body: &str) -> Vec<String> {
    let mut terms = Vec::new();
    let mut depth = 0usize;
    let mut cur = String::new();
    for c in body.chars() {
        match c {
            '[' => {
                depth += 1;
                cur.push(c);
            }
            ']' => {
                depth = depth.saturating_sub(1);
                cur.push(c);
            }
            ',' if depth == 0 => {
                terms.push(std::mem::take(&mut cur));
            }
            _ => cur.push(c),
        }
    }
    if !cur.is_empty() {
        terms.push(cur);
    }
    terms
}

fn decode_axis(term: &str) -> Result<AxisSelector, SelectError> {
    let term = term.trim();
    if term == "*" {
        return Ok(AxisSelector::All);
    }
    if let Some(list) = term.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
        let points: Vec<u64> = list
            .split(',')
            .map(|p| parse_u64(p.trim()))
            .collect::<Result<_, _>>()?;
        return Ok(AxisSelector::Points(points));
    }

    let parts: Vec<&str> = term.split(':').collect();
    match parts.as_slice() {
        [start, stop] => Ok(AxisSelector::Range {
            start: parse_u64(start)?,
            stop: parse_u64(stop)?,
            step: 1,
        }),
        [start, stop, step] => Ok(AxisSelector::Range {
            start: parse_u64(start)?,
            stop: parse_u64(stop)?,
            step: parse_u64(step)?,
        }),
        [start, stop, stride, block] => {
            let start = parse_u64(start)?;
            let stop = parse_u64(stop)?;
            let stride = parse_u64(stride)?;
            let block = parse_u64(block)?;
            if stride == 0 || stop < start || (stop - start) % stride != 0 {
                return Err(SelectError::InvalidSelection(format!(
                    "malformed multi-block term: {term}"
                )));
            }
            AxisSelector::multi_block(start, (stop - start) / stride, stride, block)
        }
        _ => Err(SelectError::InvalidSelection(format!(
            "unrecognized selection term: {term}"
        ))),
    }
}

fn parse_u64(s: &str) -> Result<u64, SelectError> {
    s.parse::<u64>()
        .map_err(|_| SelectError::InvalidSelection(format!("not an index: {s:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cirrus_select::{normalize, IndexArg};

    fn slice(start: i64, stop: i64, step: i64) -> IndexArg {
        IndexArg::Slice {
            start: Some(start),
            stop: Some(stop),
            step: Some(step),
        }
    }

    #[test]
    fn test_encode_terms() {
        let shape = Shape::new(vec![10, 10, 10]);
        let sel = normalize(
            &[
                IndexArg::Ellipsis,
                slice(2, 8, 1),
                IndexArg::Points(vec![1, 5]),
            ],
            &shape,
        )
        .unwrap();
        let wire = encode_selection(&sel);
        assert_eq!(wire.select, "[*,2:8,[1,5]]");
        assert!(!wire.zipped);
        assert!(wire.fields.is_none());
    }

    #[test]
    fn test_step_omitted_only_when_one() {
        let shape = Shape::new(vec![20]);
        let sel = normalize(&[slice(0, 20, 3)], &shape).unwrap();
        assert_eq!(encode_selection(&sel).select, "[0:20:3]");
    }

    #[test]
    fn test_multiblock_four_element_form() {
        let shape = Shape::new(vec![11]);
        let sel = normalize(
            &[IndexArg::MultiBlock {
                start: 1,
                count: 3,
                stride: 4,
                block: 2,
            }],
            &shape,
        )
        .unwrap();
        let wire = encode_selection(&sel);
        // stop = 1 + 3 * 4
        assert_eq!(wire.select, "[1:13:4:2]");
        let back = decode_selection(&wire, &shape).unwrap();
        assert_eq!(back, sel);
    }

    #[test]
    fn test_round_trip_mixed_selection() {
        let shape = Shape::new(vec![10, 10, 10, 11]);
        let sel = normalize(
            &[
                slice(1, 9, 2),
                IndexArg::Index(3),
                IndexArg::Ellipsis,
                IndexArg::MultiBlock {
                    start: 1,
                    count: 3,
                    stride: 4,
                    block: 2,
                },
            ],
            &shape,
        )
        .unwrap()
        .with_fields(vec!["temp".to_string(), "pressure".to_string()]);

        let wire = encode_selection(&sel);
        assert_eq!(wire.fields.as_deref(), Some("temp:pressure"));
        let back = decode_selection(&wire, &shape).unwrap();
        assert_eq!(back, sel);
    }

    #[test]
    fn test_round_trip_zipped_points() {
        let shape = Shape::new(vec![8, 8]);
        let sel =
            Selection::zipped_points(&[vec![0, 3], vec![5, 1], vec![2, 2]], &shape).unwrap();
        let wire = encode_selection(&sel);
        assert!(wire.zipped);
        assert_eq!(wire.select, "[[0,5,2],[3,1,2]]");
        let back = decode_selection(&wire, &shape).unwrap();
        assert_eq!(back, sel);
    }

    #[test]
    fn test_cartesian_and_zipped_do_not_collide() {
        // Same per-axis lists, different tags, different selections.
        let shape = Shape::new(vec![8, 8]);
        let zipped =
            Selection::zipped_points(&[vec![0, 0], vec![5, 5]], &shape).unwrap();
        let cartesian = normalize(
            &[IndexArg::Points(vec![0, 5]), IndexArg::Points(vec![0, 5])],
            &shape,
        )
        .unwrap();
        assert_eq!(encode_selection(&zipped).select, encode_selection(&cartesian).select);
        assert_ne!(encode_selection(&zipped), encode_selection(&cartesian));
        assert_eq!(zipped.num_elements(), 2);
        assert_eq!(cartesian.num_elements(), 4);
    }

    #[test]
    fn test_long_point_list_prefers_body() {
        let shape = Shape::new(vec![1000]);
        let points: Vec<i64> = (0..50).map(|i| i * 7).collect();
        let sel = normalize(&[IndexArg::Points(points)], &shape).unwrap();
        let wire = encode_selection(&sel);
        assert!(wire.select.len() > MAX_SELECT_QUERY_LEN);
        assert!(wire.prefers_body());

        let short = normalize(&[slice(0, 100, 1)], &Shape::new(vec![1000])).unwrap();
        assert!(!encode_selection(&short).prefers_body());
    }

    #[test]
    fn test_zipped_round_trip_with_repeated_axis_values() {
        // Distinct coordinates sharing a row index repeat a value in the
        // per-axis lists; that stays decodable in zipped mode.
        let shape = Shape::new(vec![8, 8]);
        let sel = Selection::zipped_points(&[vec![0, 1], vec![0, 2]], &shape).unwrap();
        let wire = encode_selection(&sel);
        assert_eq!(wire.select, "[[0,0],[1,2]]");
        let back = decode_selection(&wire, &shape).unwrap();
        assert_eq!(back, sel);
    }

    #[test]
    fn test_zipped_wire_with_ragged_point_lists_rejected() {
        // Paired-coordinate lists must all be the same length; a ragged
        // wire form has no coordinate reading.
        let shape = Shape::new(vec![8, 8]);
        let wire = WireSelection {
            select: "[[0,1],[2]]".to_string(),
            fields: None,
            zipped: true,
        };
        assert!(decode_selection(&wire, &shape).is_err());
        // The same terms read fine as a Cartesian cross.
        let wire = WireSelection {
            zipped: false,
            ..wire
        };
        let sel = decode_selection(&wire, &shape).unwrap();
        assert_eq!(sel.num_elements(), 2);
    }

    #[test]
    fn test_malformed_wire_rejected() {
        let shape = Shape::new(vec![10]);
        let bad = |s: &str| WireSelection {
            select: s.to_string(),
            fields: None,
            zipped: false,
        };
        assert!(decode_selection(&bad("0:5"), &shape).is_err());
        assert!(decode_selection(&bad("[0:5:1:2:9]"), &shape).is_err());
        assert!(decode_selection(&bad("[a:b]"), &shape).is_err());
        // stop not reachable from start by whole strides
        assert!(decode_selection(&bad("[1:12:4:2]"), &shape).is_err());
    }
}
