//! HDF5 superblock, versions 2 and 3.

use crate::bytes::{put_address, put_uint, validate_sizes, Reader};
use crate::checksum::jenkins_lookup3;
use crate::error::FormatError;

/// The 8-byte magic at the start of every HDF5 superblock.
pub const HDF5_SIGNATURE: [u8; 8] = [0x89, b'H', b'D', b'F', b'\r', b'\n', 0x1a, b'\n'];

/// Version written by this crate.
pub const SUPERBLOCK_VERSION: u8 = 2;

/// Locate the superblock signature.
///
/// The signature may sit at offset 0 or at any power of two from 512 upward
/// (files with a user block).
pub fn find_signature(data: &[u8]) -> Result<usize, FormatError> {
    let mut offset = 0usize;
    loop {
        if offset + HDF5_SIGNATURE.len() > data.len() {
            return Err(FormatError::SignatureNotFound);
        }
        if data[offset..offset + HDF5_SIGNATURE.len()] == HDF5_SIGNATURE {
            return Ok(offset);
        }
        offset = if offset == 0 { 512 } else { offset * 2 };
    }
}

/// Parsed v2/v3 superblock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Superblock {
    /// Superblock version (2 or 3).
    pub version: u8,
    /// Size of offsets in bytes.
    pub offset_size: u8,
    /// Size of lengths in bytes.
    pub length_size: u8,
    /// File consistency flags.
    pub consistency_flags: u8,
    /// Absolute address that file addresses are relative to.
    pub base_address: u64,
    /// Superblock extension object header, if any.
    pub extension_address: Option<u64>,
    /// End-of-file address.
    pub end_of_file_address: u64,
    /// Root group object header address.
    pub root_group_address: u64,
}

impl Superblock {
    /// A v2 superblock with 8-byte offsets and lengths.
    pub fn new(root_group_address: u64, end_of_file_address: u64) -> Self {
        Self {
            version: SUPERBLOCK_VERSION,
            offset_size: 8,
            length_size: 8,
            consistency_flags: 0,
            base_address: 0,
            extension_address: None,
            end_of_file_address,
            root_group_address,
        }
    }

    /// Encoded size in bytes, including the checksum.
    pub fn encoded_size(&self) -> usize {
        12 + 4 * self.offset_size as usize + 4
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.encoded_size());
        buf.extend_from_slice(&HDF5_SIGNATURE);
        buf.push(self.version);
        buf.push(self.offset_size);
        buf.push(self.length_size);
        buf.push(self.consistency_flags);
        put_uint(&mut buf, self.base_address, self.offset_size);
        put_address(&mut buf, self.extension_address, self.offset_size);
        put_uint(&mut buf, self.end_of_file_address, self.offset_size);
        put_uint(&mut buf, self.root_group_address, self.offset_size);
        let checksum = jenkins_lookup3(&buf);
        buf.extend_from_slice(&checksum.to_le_bytes());
        buf
    }

    /// Parse the superblock whose signature starts at `offset`.
    pub fn parse(data: &[u8], offset: usize) -> Result<Self, FormatError> {
        let mut r = Reader::at(data, offset)?;
        if r.bytes(HDF5_SIGNATURE.len())? != HDF5_SIGNATURE {
            return Err(FormatError::SignatureNotFound);
        }
        let version = r.u8()?;
        if !matches!(version, 2 | 3) {
            return Err(FormatError::UnsupportedSuperblockVersion(version));
        }
        let offset_size = r.u8()?;
        let length_size = r.u8()?;
        validate_sizes(offset_size, length_size)?;
        let consistency_flags = r.u8()?;
        let base_address = r.uint(offset_size)?;
        let extension_address = r.address(offset_size)?;
        let end_of_file_address = r.uint(offset_size)?;
        let root_group_address = r.uint(offset_size)?;

        let covered = &data[offset..r.position()];
        let computed = jenkins_lookup3(covered);
        let stored = r.u32()?;
        if stored != computed {
            return Err(FormatError::ChecksumMismatch {
                structure: "superblock",
                stored,
                computed,
            });
        }

        Ok(Self {
            version,
            offset_size,
            length_size,
            consistency_flags,
            base_address,
            extension_address,
            end_of_file_address,
            root_group_address,
        })
    }
}
