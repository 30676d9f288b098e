//! Data layout message (type 0x0008), version 3.

use crate::bytes::{put_address, put_uint, Reader};
use crate::error::FormatError;

const CLASS_COMPACT: u8 = 0;
const CLASS_CONTIGUOUS: u8 = 1;
const CLASS_CHUNKED: u8 = 2;

/// Where a dataset's raw data lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataLayout {
    /// Raw data stored inline in the message.
    Compact { data: Vec<u8> },
    /// One block; `address` is `None` until storage is allocated.
    Contiguous { address: Option<u64>, size: u64 },
    /// Chunks indexed by a v1 B-tree.
    Chunked {
        /// Root of the chunk B-tree, `None` when no chunk is allocated.
        btree_address: Option<u64>,
        /// Chunk dimensions in elements, one per dataset dimension.
        chunk_dims: Vec<u32>,
        element_size: u32,
    },
}

impl DataLayout {
    pub fn serialize(&self, offset_size: u8, length_size: u8) -> Vec<u8> {
        let mut buf = vec![3];
        match self {
            Self::Compact { data } => {
                buf.push(CLASS_COMPACT);
                buf.extend_from_slice(&(data.len() as u16).to_le_bytes());
                buf.extend_from_slice(data);
            }
            Self::Contiguous { address, size } => {
                buf.push(CLASS_CONTIGUOUS);
                put_address(&mut buf, *address, offset_size);
                put_uint(&mut buf, *size, length_size);
            }
            Self::Chunked {
                btree_address,
                chunk_dims,
                element_size,
            } => {
                buf.push(CLASS_CHUNKED);
                // The stored dimensionality counts the element size as an
                // extra, innermost dimension.
                buf.push(chunk_dims.len() as u8 + 1);
                put_address(&mut buf, *btree_address, offset_size);
                for d in chunk_dims {
                    buf.extend_from_slice(&d.to_le_bytes());
                }
                buf.extend_from_slice(&element_size.to_le_bytes());
            }
        }
        buf
    }

    pub fn parse(data: &[u8], offset_size: u8, length_size: u8) -> Result<Self, FormatError> {
        let mut r = Reader::new(data);
        let version = r.u8()?;
        let class = r.u8()?;
        if version != 3 {
            return Err(FormatError::UnsupportedLayout { version, class });
        }
        match class {
            CLASS_COMPACT => {
                let size = r.u16()? as usize;
                Ok(Self::Compact {
                    data: r.bytes(size)?.to_vec(),
                })
            }
            CLASS_CONTIGUOUS => Ok(Self::Contiguous {
                address: r.address(offset_size)?,
                size: r.uint(length_size)?,
            }),
            CLASS_CHUNKED => {
                let ndims = r.u8()? as usize;
                if ndims < 2 {
                    return Err(FormatError::UnsupportedLayout { version, class });
                }
                let btree_address = r.address(offset_size)?;
                let mut dims = (0..ndims).map(|_| r.u32()).collect::<Result<Vec<_>, _>>()?;
                let element_size = dims.pop().unwrap_or(0);
                if let Some(dim) = dims.iter().position(|&d| d == 0) {
                    return Err(FormatError::ZeroChunkDimension(dim));
                }
                Ok(Self::Chunked {
                    btree_address,
                    chunk_dims: dims,
                    element_size,
                })
            }
            _ => Err(FormatError::UnsupportedLayout { version, class }),
        }
    }
}
