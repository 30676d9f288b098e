//! Dataspace message (type 0x0001).

use crate::bytes::{put_uint, Reader};
use crate::error::FormatError;

/// Maximum-dimension value meaning "unlimited".
pub const UNLIMITED: u64 = u64::MAX;

/// Kind of dataspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataspaceType {
    Scalar,
    Simple,
    Null,
}

/// Parsed or to-be-written dataspace message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dataspace {
    pub space_type: DataspaceType,
    /// Current dimension sizes (empty for scalar and null).
    pub dims: Vec<u64>,
    /// Maximum sizes, [`UNLIMITED`] for an unlimited dimension.
    pub max_dims: Option<Vec<u64>>,
}

impl Dataspace {
    pub fn simple(dims: Vec<u64>, max_dims: Option<Vec<u64>>) -> Self {
        Self {
            space_type: DataspaceType::Simple,
            dims,
            max_dims,
        }
    }

    pub fn scalar() -> Self {
        Self {
            space_type: DataspaceType::Scalar,
            dims: Vec::new(),
            max_dims: None,
        }
    }

    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    /// Number of elements: 1 for scalar, 0 for null. Saturates at
    /// `u64::MAX`.
    pub fn num_elements(&self) -> u64 {
        match self.space_type {
            DataspaceType::Null => 0,
            _ if self.dims.contains(&0) => 0,
            _ => self
                .dims
                .iter()
                .try_fold(1u64, |acc, &d| acc.checked_mul(d))
                .unwrap_or(u64::MAX),
        }
    }

    /// Version 2 encoding.
    pub fn serialize(&self, length_size: u8) -> Vec<u8> {
        let mut buf = Vec::with_capacity(4 + 2 * self.dims.len() * length_size as usize);
        buf.push(2);
        buf.push(self.dims.len() as u8);
        buf.push(if self.max_dims.is_some() { 0x01 } else { 0x00 });
        buf.push(match self.space_type {
            DataspaceType::Scalar => 0,
            DataspaceType::Simple => 1,
            DataspaceType::Null => 2,
        });
        for &d in &self.dims {
            put_uint(&mut buf, d, length_size);
        }
        if let Some(max) = &self.max_dims {
            for &m in max {
                put_uint(&mut buf, m, length_size);
            }
        }
        buf
    }

    /// Parse version 1 or 2.
    pub fn parse(data: &[u8], length_size: u8) -> Result<Self, FormatError> {
        let mut r = Reader::new(data);
        let version = r.u8()?;
        let rank = r.u8()? as usize;
        let flags = r.u8()?;
        let space_type = match version {
            1 => {
                r.skip(5)?;
                if rank == 0 {
                    DataspaceType::Scalar
                } else {
                    DataspaceType::Simple
                }
            }
            2 => match r.u8()? {
                0 => DataspaceType::Scalar,
                1 => DataspaceType::Simple,
                2 => DataspaceType::Null,
                other => return Err(FormatError::InvalidDataspaceType(other)),
            },
            other => return Err(FormatError::InvalidDataspaceVersion(other)),
        };

        let dims = (0..rank)
            .map(|_| r.uint(length_size))
            .collect::<Result<Vec<_>, _>>()?;
        let max_dims = if flags & 0x01 != 0 {
            // A length-size field of all ones reads back as the sentinel.
            let raw = (0..rank)
                .map(|_| r.uint(length_size))
                .collect::<Result<Vec<_>, _>>()?;
            let all_ones = u64::MAX
                .checked_shr(64u32.saturating_sub(8 * u32::from(length_size)))
                .unwrap_or(0);
            Some(
                raw.into_iter()
                    .map(|m| if m == all_ones { UNLIMITED } else { m })
                    .collect(),
            )
        } else {
            None
        };

        Ok(Self {
            space_type,
            dims,
            max_dims,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn unlimited_first_dimension() {
        let ds = Dataspace::simple(vec![0, 2, 3], Some(vec![UNLIMITED, 2, 3]));
        let bytes = ds.serialize(8);
        assert_eq!(&bytes[..4], &[2, 3, 1, 1]);
        assert_eq!(bytes.len(), 4 + 6 * 8);
        let parsed = Dataspace::parse(&bytes, 8).unwrap();
        assert_eq!(parsed, ds);
        assert_eq!(parsed.num_elements(), 0);
    }

    #[test]
    fn scalar_has_one_element() {
        let ds = Dataspace::scalar();
        let parsed = Dataspace::parse(&ds.serialize(8), 8).unwrap();
        assert_eq!(parsed.space_type, DataspaceType::Scalar);
        assert_eq!(parsed.rank(), 0);
        assert_eq!(parsed.num_elements(), 1);
    }

    #[test]
    fn version_one_layout() {
        let mut data = vec![1, 1, 0x01, 0, 0, 0, 0, 0];
        data.extend_from_slice(&5u32.to_le_bytes());
        data.extend_from_slice(&u32::MAX.to_le_bytes());
        let parsed = Dataspace::parse(&data, 4).unwrap();
        assert_eq!(parsed.dims, vec![5]);
        assert_eq!(parsed.max_dims, Some(vec![UNLIMITED]));
    }

    #[test]
    fn element_count_saturates() {
        assert_eq!(Dataspace::simple(vec![u64::MAX, 2], None).num_elements(), u64::MAX);
        assert_eq!(Dataspace::simple(vec![u64::MAX, u64::MAX, 0], None).num_elements(), 0);
    }

    #[test]
    fn odd_length_size_does_not_panic() {
        // Rank 0 with the max-dims flag never reads a length field.
        for length_size in [0u8, 3, 9, 255] {
            let parsed = Dataspace::parse(&[2, 0, 0x01, 0], length_size).unwrap();
            assert_eq!(parsed.max_dims, Some(Vec::new()));
        }
        assert!(Dataspace::parse(&[2, 1, 0x01, 1, 5], 3).is_err());
    }

    #[test]
    fn bad_type_rejected() {
        assert_eq!(
            Dataspace::parse(&[2, 0, 0, 7], 8),
            Err(FormatError::InvalidDataspaceType(7))
        );
    }
}
