//! Compact ("new-style") group messages: link info, group info, link.

use crate::bytes::{put_address, put_uint, Reader};
use crate::error::FormatError;

const LINK_TYPE_HARD: u8 = 0;
const LINK_TYPE_SOFT: u8 = 1;

/// Link info message (type 0x0002). Compact groups leave both the fractal
/// heap and the name index undefined.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LinkInfo {
    pub max_creation_index: Option<u64>,
    pub fractal_heap_address: Option<u64>,
    pub name_index_address: Option<u64>,
    pub creation_order_index_address: Option<u64>,
}

impl LinkInfo {
    pub fn serialize(&self, offset_size: u8) -> Vec<u8> {
        let mut flags = 0u8;
        if self.max_creation_index.is_some() {
            flags |= 0x01;
        }
        if self.creation_order_index_address.is_some() {
            flags |= 0x02;
        }
        let mut buf = vec![0, flags];
        if let Some(max) = self.max_creation_index {
            buf.extend_from_slice(&max.to_le_bytes());
        }
        put_address(&mut buf, self.fractal_heap_address, offset_size);
        put_address(&mut buf, self.name_index_address, offset_size);
        if self.creation_order_index_address.is_some() {
            put_address(&mut buf, self.creation_order_index_address, offset_size);
        }
        buf
    }

    pub fn parse(data: &[u8], offset_size: u8) -> Result<Self, FormatError> {
        let mut r = Reader::new(data);
        let version = r.u8()?;
        if version != 0 {
            return Err(FormatError::InvalidLinkVersion(version));
        }
        let flags = r.u8()?;
        let max_creation_index = if flags & 0x01 != 0 { Some(r.u64()?) } else { None };
        let fractal_heap_address = r.address(offset_size)?;
        let name_index_address = r.address(offset_size)?;
        let creation_order_index_address = if flags & 0x02 != 0 {
            r.address(offset_size)?
        } else {
            None
        };
        Ok(Self {
            max_creation_index,
            fractal_heap_address,
            name_index_address,
            creation_order_index_address,
        })
    }

    /// Links live in the object header rather than a fractal heap.
    pub fn is_compact(&self) -> bool {
        self.fractal_heap_address.is_none()
    }
}

/// Group info message (type 0x000A) with default storage thresholds.
pub fn group_info_message() -> Vec<u8> {
    vec![0, 0]
}

/// Where a link points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkTarget {
    /// Object header address.
    Hard(u64),
    /// Path to another object in the same file.
    Soft(String),
}

/// Link message (type 0x0006).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub name: String,
    pub target: LinkTarget,
}

impl Link {
    pub fn hard(name: impl Into<String>, address: u64) -> Self {
        Self {
            name: name.into(),
            target: LinkTarget::Hard(address),
        }
    }

    pub fn serialize(&self, offset_size: u8) -> Result<Vec<u8>, FormatError> {
        validate_name(&self.name)?;
        let name = self.name.as_bytes();
        let (width_bits, width) = match name.len() {
            n if n <= u8::MAX as usize => (0u8, 1u8),
            n if n <= u16::MAX as usize => (1, 2),
            _ => (2, 4),
        };
        let mut flags = width_bits;
        let soft = matches!(self.target, LinkTarget::Soft(_));
        if soft {
            flags |= 0x08;
        }
        // UTF-8 names carry the character set field.
        let ascii = name.is_ascii();
        if !ascii {
            flags |= 0x10;
        }

        let mut buf = vec![1, flags];
        if soft {
            buf.push(LINK_TYPE_SOFT);
        }
        if !ascii {
            buf.push(1);
        }
        put_uint(&mut buf, name.len() as u64, width);
        buf.extend_from_slice(name);
        match &self.target {
            LinkTarget::Hard(addr) => put_uint(&mut buf, *addr, offset_size),
            LinkTarget::Soft(path) => {
                buf.extend_from_slice(&(path.len() as u16).to_le_bytes());
                buf.extend_from_slice(path.as_bytes());
            }
        }
        Ok(buf)
    }

    pub fn parse(data: &[u8], offset_size: u8) -> Result<Self, FormatError> {
        let mut r = Reader::new(data);
        let version = r.u8()?;
        if version != 1 {
            return Err(FormatError::InvalidLinkVersion(version));
        }
        let flags = r.u8()?;
        let link_type = if flags & 0x08 != 0 { r.u8()? } else { LINK_TYPE_HARD };
        if flags & 0x04 != 0 {
            r.skip(8)?;
        }
        if flags & 0x10 != 0 {
            r.skip(1)?;
        }
        let name_len = r.uint(1 << (flags & 0x03))? as usize;
        let name = String::from_utf8_lossy(r.bytes(name_len)?).into_owned();
        let target = match link_type {
            LINK_TYPE_HARD => LinkTarget::Hard(r.uint(offset_size)?),
            LINK_TYPE_SOFT => {
                let len = r.u16()? as usize;
                LinkTarget::Soft(String::from_utf8_lossy(r.bytes(len)?).into_owned())
            }
            other => return Err(FormatError::UnsupportedLinkType(other)),
        };
        Ok(Self { name, target })
    }
}

/// A link name must be a single, non-empty path component.
pub fn validate_name(name: &str) -> Result<(), FormatError> {
    if name.is_empty() || name.contains('/') || name == "." {
        return Err(FormatError::InvalidLinkName(name.to_string()));
    }
    Ok(())
}
