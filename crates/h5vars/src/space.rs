//! Dataspaces: an extent (current and maximum dims) plus a selection.

use h5vars_format::UNLIMITED as FORMAT_UNLIMITED;

use crate::error::{Error, Result};

/// Maximum-dimension sentinel for a dimension that can grow without bound.
pub const UNLIMITED: u64 = FORMAT_UNLIMITED;

/// Which elements of a dataspace take part in I/O.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    All,
    None,
    /// A regular, non-overlapping hyperslab.
    ///
    /// Per dimension: `count` blocks of `block` consecutive elements, the
    /// first at `start`, successive blocks `stride` apart.
    Hyperslab {
        start: Vec<u64>,
        stride: Vec<u64>,
        count: Vec<u64>,
        block: Vec<u64>,
    },
}

/// Number of elements in an array of `dims`, or `None` past `u64::MAX`.
pub(crate) fn element_count(dims: &[u64]) -> Option<u64> {
    if dims.contains(&0) {
        return Some(0);
    }
    dims.iter().try_fold(1u64, |acc, &d| acc.checked_mul(d))
}

/// One past the last coordinate a hyperslab touches in one dimension, or
/// `None` on overflow. An empty dimension touches nothing.
fn hyperslab_end(start: u64, stride: u64, count: u64, block: u64) -> Option<u64> {
    if count == 0 || block == 0 {
        return Some(0);
    }
    (count - 1)
        .checked_mul(stride)?
        .checked_add(start)?
        .checked_add(block)
}

/// Elements in `count` x `block` per dimension; `None` on overflow.
fn hyperslab_points(count: &[u64], block: &[u64]) -> Option<u64> {
    if count.contains(&0) || block.contains(&0) {
        return Some(0);
    }
    count
        .iter()
        .zip(block)
        .try_fold(1u64, |acc, (&c, &b)| acc.checked_mul(c.checked_mul(b)?))
}

/// Shape of a dataset or memory buffer, with the current selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dataspace {
    dims: Vec<u64>,
    max_dims: Vec<u64>,
    selection: Selection,
}

impl Dataspace {
    /// A simple dataspace; `max_dims` of `None` means fixed at `dims`.
    ///
    /// Current dims may be zero. Every maximum must be at least the current
    /// size or [`UNLIMITED`], and the element count must fit in a `u64`.
    pub fn simple(dims: &[u64], max_dims: Option<&[u64]>) -> Result<Self> {
        if element_count(dims).is_none() {
            return Err(Error::ExtentTooLarge(dims.to_vec()));
        }
        let max_dims = match max_dims {
            Some(max) => {
                if max.len() != dims.len() {
                    return Err(Error::RankMismatch {
                        expected: dims.len(),
                        actual: max.len(),
                    });
                }
                for (dim, (&size, &max)) in dims.iter().zip(max).enumerate() {
                    if max != UNLIMITED && size > max {
                        return Err(Error::ExceedsMaxDims { dim, size, max });
                    }
                }
                max.to_vec()
            }
            None => dims.to_vec(),
        };
        Ok(Self {
            dims: dims.to_vec(),
            max_dims,
            selection: Selection::All,
        })
    }

    /// Rank-0 space holding a single element.
    pub fn scalar() -> Self {
        Self {
            dims: Vec::new(),
            max_dims: Vec::new(),
            selection: Selection::All,
        }
    }

    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    pub fn dims(&self) -> &[u64] {
        &self.dims
    }

    pub fn max_dims(&self) -> &[u64] {
        &self.max_dims
    }

    /// `(dims, max_dims)`, as `H5Sget_simple_extent_dims` reports them.
    pub fn extent(&self) -> (Vec<u64>, Vec<u64>) {
        (self.dims.clone(), self.max_dims.clone())
    }

    pub fn num_elements(&self) -> u64 {
        element_count(&self.dims).unwrap_or(u64::MAX)
    }

    /// Whether any dimension may grow past its current size.
    pub fn is_extendible(&self) -> bool {
        self.dims
            .iter()
            .zip(&self.max_dims)
            .any(|(&d, &m)| m == UNLIMITED || m > d)
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn select_all(&mut self) {
        self.selection = Selection::All;
    }

    pub fn select_none(&mut self) {
        self.selection = Selection::None;
    }

    /// Replace the selection with a hyperslab.
    ///
    /// `stride` and `block` default to all ones. Strides must be non-zero,
    /// and blocks may not overlap (`block <= stride` wherever `count > 1`).
    /// A hyperslab whose coordinates or element count overflow `u64` is
    /// out of bounds for any extent. Bounds against this extent are checked
    /// when the selection is used for I/O.
    pub fn select_hyperslab(
        &mut self,
        start: &[u64],
        stride: Option<&[u64]>,
        count: &[u64],
        block: Option<&[u64]>,
    ) -> Result<()> {
        let rank = self.rank();
        let ones = vec![1u64; rank];
        let stride = stride.unwrap_or(&ones);
        let block = block.unwrap_or(&ones);
        for len in [start.len(), stride.len(), count.len(), block.len()] {
            if len != rank {
                return Err(Error::RankMismatch {
                    expected: rank,
                    actual: len,
                });
            }
        }
        for d in 0..rank {
            if stride[d] == 0 {
                return Err(Error::InvalidArgument(format!("stride[{d}] is zero")));
            }
            if count[d] > 1 && block[d] > stride[d] {
                return Err(Error::InvalidArgument(format!(
                    "blocks overlap in dimension {d}: block {} > stride {}",
                    block[d], stride[d]
                )));
            }
            if hyperslab_end(start[d], stride[d], count[d], block[d]).is_none() {
                return Err(Error::SelectionOutOfBounds);
            }
        }
        if hyperslab_points(count, block).is_none() {
            return Err(Error::SelectionOutOfBounds);
        }
        self.selection = Selection::Hyperslab {
            start: start.to_vec(),
            stride: stride.to_vec(),
            count: count.to_vec(),
            block: block.to_vec(),
        };
        Ok(())
    }

    /// Number of selected elements.
    pub fn selected_points(&self) -> u64 {
        match &self.selection {
            Selection::All => self.num_elements(),
            Selection::None => 0,
            Selection::Hyperslab { count, block, .. } => {
                hyperslab_points(count, block).unwrap_or(u64::MAX)
            }
        }
    }

    /// Number of selected elements, after checking that the selection lies
    /// inside the current extent.
    pub(crate) fn selection_size(&self) -> Result<u64> {
        match &self.selection {
            Selection::All => {
                element_count(&self.dims).ok_or_else(|| Error::ExtentTooLarge(self.dims.clone()))
            }
            Selection::None => Ok(0),
            Selection::Hyperslab {
                start,
                stride,
                count,
                block,
            } => {
                let points = hyperslab_points(count, block).ok_or(Error::SelectionOutOfBounds)?;
                if points == 0 {
                    return Ok(0);
                }
                for d in 0..self.rank() {
                    match hyperslab_end(start[d], stride[d], count[d], block[d]) {
                        Some(end) if end <= self.dims[d] => {}
                        _ => return Err(Error::SelectionOutOfBounds),
                    }
                }
                Ok(points)
            }
        }
    }

    /// Row-major linear indices of the selected elements, in selection order.
    pub(crate) fn selected_offsets(&self) -> Result<Offsets> {
        let remaining = self.selection_size()?;
        let rank = self.rank();
        let (start, stride, block, span) = match &self.selection {
            Selection::Hyperslab {
                start,
                stride,
                count,
                block,
            } => (
                start.clone(),
                stride.clone(),
                block.clone(),
                count.iter().zip(block).map(|(&c, &b)| c.saturating_mul(b)).collect(),
            ),
            Selection::All | Selection::None => {
                (vec![0; rank], vec![1; rank], vec![1; rank], self.dims.clone())
            }
        };
        Ok(Offsets {
            dims: self.dims.clone(),
            start,
            stride,
            block,
            span,
            pos: vec![0; rank],
            remaining,
        })
    }

    /// Rebuild with new current dims, keeping the maximums and resetting the
    /// selection.
    pub(crate) fn with_dims(&self, dims: &[u64]) -> Result<Self> {
        if element_count(dims).is_none() {
            return Err(Error::ExtentTooLarge(dims.to_vec()));
        }
        Ok(Self {
            dims: dims.to_vec(),
            max_dims: self.max_dims.clone(),
            selection: Selection::All,
        })
    }

    /// This extent with another space's selection.
    pub(crate) fn with_selection(&self, selection: &Selection) -> Self {
        Self {
            dims: self.dims.clone(),
            max_dims: self.max_dims.clone(),
            selection: selection.clone(),
        }
    }

    pub(crate) fn to_format(&self) -> h5vars_format::dataspace::Dataspace {
        if self.rank() == 0 {
            return h5vars_format::dataspace::Dataspace::scalar();
        }
        let max = (self.max_dims != self.dims).then(|| self.max_dims.clone());
        h5vars_format::dataspace::Dataspace::simple(self.dims.clone(), max)
    }

    pub(crate) fn from_format(space: &h5vars_format::dataspace::Dataspace) -> Result<Self> {
        let max_dims = space.max_dims.clone().unwrap_or_else(|| space.dims.clone());
        if max_dims.len() != space.dims.len() {
            return Err(Error::RankMismatch {
                expected: space.dims.len(),
                actual: max_dims.len(),
            });
        }
        if element_count(&space.dims).is_none() {
            return Err(Error::ExtentTooLarge(space.dims.clone()));
        }
        Ok(Self {
            dims: space.dims.clone(),
            max_dims,
            selection: Selection::All,
        })
    }
}

/// Iterator over the linear indices of a selection whose bounds have been
/// checked, so no index computation can overflow.
#[derive(Debug)]
pub(crate) struct Offsets {
    dims: Vec<u64>,
    start: Vec<u64>,
    stride: Vec<u64>,
    block: Vec<u64>,
    /// Coordinates covered per dimension (`count * block`).
    span: Vec<u64>,
    /// Position within `span` of the next element, per dimension.
    pos: Vec<u64>,
    remaining: u64,
}

impl Iterator for Offsets {
    type Item = u64;

    fn next(&mut self) -> Option<u64> {
        if self.remaining == 0 {
            return None;
        }
        let offset = (0..self.dims.len()).fold(0, |acc, d| {
            let p = self.pos[d];
            let coord = self.start[d] + p / self.block[d] * self.stride[d] + p % self.block[d];
            acc * self.dims[d] + coord
        });
        self.remaining -= 1;
        for d in (0..self.pos.len()).rev() {
            self.pos[d] += 1;
            if self.pos[d] < self.span[d] {
                break;
            }
            self.pos[d] = 0;
        }
        Some(offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn unlimited_extent() {
        let space = Dataspace::simple(&[0, 2, 3], Some(&[UNLIMITED, 2, 3])).unwrap();
        assert_eq!(space.extent(), (vec![0, 2, 3], vec![UNLIMITED, 2, 3]));
        assert_eq!(space.num_elements(), 0);
        assert!(space.is_extendible());
        assert!(!Dataspace::simple(&[3], None).unwrap().is_extendible());
    }

    #[test]
    fn max_below_current_rejected() {
        assert!(matches!(
            Dataspace::simple(&[4], Some(&[3])),
            Err(Error::ExceedsMaxDims { dim: 0, size: 4, max: 3 })
        ));
        assert!(matches!(
            Dataspace::simple(&[4], Some(&[4, 4])),
            Err(Error::RankMismatch { .. })
        ));
    }

    #[test]
    fn record_hyperslab_offsets() {
        let mut space = Dataspace::simple(&[2, 2, 3], None).unwrap();
        space
            .select_hyperslab(&[1, 0, 0], None, &[1, 1, 1], Some(&[1, 2, 3]))
            .unwrap();
        assert_eq!(space.selected_points(), 6);
        assert_eq!(
            space.selected_offsets().unwrap().collect::<Vec<_>>(),
            (6..12).collect::<Vec<_>>()
        );
    }

    #[test]
    fn strided_offsets() {
        let mut space = Dataspace::simple(&[4, 5], None).unwrap();
        space
            .select_hyperslab(&[0, 1], Some(&[2, 2]), &[2, 2], None)
            .unwrap();
        assert_eq!(
            space.selected_offsets().unwrap().collect::<Vec<_>>(),
            vec![1, 3, 11, 13]
        );
    }

    #[test]
    fn out_of_bounds_detected_on_use() {
        let mut space = Dataspace::simple(&[3], None).unwrap();
        space.select_hyperslab(&[2], None, &[2], None).unwrap();
        assert!(matches!(
            space.selected_offsets(),
            Err(Error::SelectionOutOfBounds)
        ));
    }

    #[test]
    fn invalid_hyperslabs() {
        let mut space = Dataspace::simple(&[10], None).unwrap();
        assert!(space.select_hyperslab(&[0], Some(&[0]), &[2], None).is_err());
        assert!(space
            .select_hyperslab(&[0], Some(&[2]), &[2], Some(&[3]))
            .is_err());
        assert!(space.select_hyperslab(&[0, 0], None, &[1], None).is_err());
        space.select_none();
        assert_eq!(space.selected_points(), 0);
    }

    #[test]
    fn format_max_dims_only_when_different() {
        let fixed = Dataspace::simple(&[3], None).unwrap().to_format();
        assert_eq!(fixed.max_dims, None);
        let grow = Dataspace::simple(&[0], Some(&[UNLIMITED])).unwrap().to_format();
        assert_eq!(Dataspace::from_format(&grow).unwrap().max_dims(), &[UNLIMITED]);
    }

    #[test]
    fn all_selection_walks_every_element() {
        let space = Dataspace::simple(&[2, 3], None).unwrap();
        assert_eq!(
            space.selected_offsets().unwrap().collect::<Vec<_>>(),
            (0..6).collect::<Vec<_>>()
        );
        let scalar = Dataspace::scalar();
        assert_eq!(scalar.selected_offsets().unwrap().collect::<Vec<_>>(), vec![0]);
        let mut none = space.clone();
        none.select_none();
        assert_eq!(none.selected_offsets().unwrap().count(), 0);
    }

    #[test]
    fn overflowing_extents_rejected() {
        assert!(matches!(
            Dataspace::simple(&[u64::MAX / 4, 2, 3], Some(&[UNLIMITED, 2, 3])),
            Err(Error::ExtentTooLarge(_))
        ));
        let huge = h5vars_format::dataspace::Dataspace::simple(vec![u64::MAX, 2], None);
        assert!(matches!(
            Dataspace::from_format(&huge),
            Err(Error::ExtentTooLarge(_))
        ));
        let grow = Dataspace::simple(&[1], Some(&[UNLIMITED])).unwrap();
        assert!(grow.with_dims(&[1 << 40]).is_ok());
        let grid = Dataspace::simple(&[1, 1 << 32], Some(&[UNLIMITED, UNLIMITED])).unwrap();
        assert!(matches!(
            grid.with_dims(&[1 << 32, 1 << 32]),
            Err(Error::ExtentTooLarge(_))
        ));
    }

    #[test]
    fn overflowing_hyperslabs_out_of_bounds() {
        let mut space = Dataspace::simple(&[10], Some(&[UNLIMITED])).unwrap();
        assert!(matches!(
            space.select_hyperslab(&[u64::MAX], None, &[1], None),
            Err(Error::SelectionOutOfBounds)
        ));
        assert!(matches!(
            space.select_hyperslab(&[0], Some(&[u64::MAX]), &[3], None),
            Err(Error::SelectionOutOfBounds)
        ));
        let mut grid = Dataspace::simple(&[4, 4], None).unwrap();
        assert!(matches!(
            grid.select_hyperslab(&[0, 0], None, &[1 << 33, 1 << 33], None),
            Err(Error::SelectionOutOfBounds)
        ));
        // Representable but far outside the extent.
        space
            .select_hyperslab(&[u64::MAX - 10], None, &[5], None)
            .unwrap();
        assert_eq!(space.selected_points(), 5);
        assert!(matches!(space.selection_size(), Err(Error::SelectionOutOfBounds)));
        assert!(matches!(space.selected_offsets(), Err(Error::SelectionOutOfBounds)));
    }

    #[test]
    fn empty_hyperslab_needs_no_bounds() {
        let mut space = Dataspace::simple(&[3], None).unwrap();
        space.select_hyperslab(&[7], None, &[0], None).unwrap();
        assert_eq!(space.selection_size().unwrap(), 0);
        assert_eq!(space.selected_offsets().unwrap().count(), 0);
    }

    proptest! {
        #[test]
        fn hyperslab_offsets_are_sorted_and_in_range(
            start in 0u64..4, stride in 1u64..4, count in 1u64..4, block in 1u64..2,
        ) {
            let len = start + (count - 1) * stride + block;
            let mut space = Dataspace::simple(&[len, 3], None).unwrap();
            space.select_hyperslab(&[start, 0], Some(&[stride, 1]), &[count, 1], Some(&[block, 3])).unwrap();
            let offsets: Vec<u64> = space.selected_offsets().unwrap().collect();
            prop_assert_eq!(offsets.len() as u64, space.selected_points());
            prop_assert!(offsets.windows(2).all(|w| w[0] < w[1]));
            prop_assert!(offsets.iter().all(|&o| o < space.num_elements()));
        }
    }
}
