//! Dataset shape with optional growth limits

use serde::{Deserialize, Serialize};

/// Maximum extent of one axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Extent {
    /// Fixed maximum size
    Fixed(u64),
    /// Axis may grow without bound
    Unlimited,
}

/// Ordered sequence of axis sizes
///
/// `dims` is the current size per axis; `maxdims`, when present, carries
/// the growth limit per axis, where `Unlimited` is distinct from any
/// current size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shape {
    dims: Vec<u64>,
    maxdims: Option<Vec<Extent>>,
}

impl Shape {
    /// Create a fixed shape
    pub fn new(dims: Vec<u64>) -> Self {
        Self { dims, maxdims: None }
    }

    /// Create a scalar (rank 0) shape
    pub fn scalar() -> Self {
        Self::new(Vec::new())
    }

    /// Attach per-axis growth limits
    ///
    /// `maxdims` must have the same rank as `dims`; this is a programming
    /// error, so it panics rather than returning a result.
    pub fn with_maxdims(mut self, maxdims: Vec<Extent>) -> Self {
        assert_eq!(
            maxdims.len(),
            self.dims.len(),
            "maxdims rank must match dims rank"
        );
        self.maxdims = Some(maxdims);
        self
    }

    /// Number of axes
    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    /// Current size per axis
    pub fn dims(&self) -> &[u64] {
        &self.dims
    }

    /// Growth limits, if declared
    pub fn maxdims(&self) -> Option<&[Extent]> {
        self.maxdims.as_deref()
    }

    /// True for rank-0 shapes
    pub fn is_scalar(&self) -> bool {
        self.dims.is_empty()
    }

    /// Total number of elements
    pub fn size(&self) -> u64 {
        self.dims.iter().product()
    }

    /// True when any axis can grow past its current size
    pub fn is_resizable(&self) -> bool {
        match &self.maxdims {
            None => false,
            Some(maxdims) => maxdims.iter().zip(&self.dims).any(|(m, d)| match m {
                Extent::Unlimited => true,
                Extent::Fixed(n) => n > d,
            }),
        }
    }
}

impl From<Vec<u64>> for Shape {
    fn from(dims: Vec<u64>) -> Self {
        Shape::new(dims)
    }
}

impl From<&[u64]> for Shape {
    fn from(dims: &[u64]) -> Self {
        Shape::new(dims.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_basics() {
        let shape = Shape::new(vec![2, 3, 4]);
        assert_eq!(shape.rank(), 3);
        assert_eq!(shape.size(), 24);
        assert!(!shape.is_scalar());
        assert!(!shape.is_resizable());

        assert!(Shape::scalar().is_scalar());
        assert_eq!(Shape::scalar().size(), 1);
    }

    #[test]
    fn test_unlimited_marker() {
        let shape = Shape::new(vec![10, 4])
            .with_maxdims(vec![Extent::Unlimited, Extent::Fixed(4)]);
        assert!(shape.is_resizable());

        let fixed = Shape::new(vec![10, 4])
            .with_maxdims(vec![Extent::Fixed(10), Extent::Fixed(4)]);
        assert!(!fixed.is_resizable());
    }
}
