//! Little-endian cursor and encoders shared by the message codecs.

use byteorder::{ByteOrder, LittleEndian};

use crate::error::FormatError;

/// The "undefined address" value: all bits set.
pub const UNDEFINED_ADDRESS: u64 = u64::MAX;

/// Bounds-checked little-endian reader over a byte slice.
#[derive(Debug, Clone)]
pub(crate) struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub(crate) fn at(data: &'a [u8], pos: usize) -> Result<Self, FormatError> {
        if pos > data.len() {
            return Err(FormatError::UnexpectedEof {
                expected: pos,
                available: data.len(),
            });
        }
        Ok(Self { data, pos })
    }

    pub(crate) fn position(&self) -> usize {
        self.pos
    }

    pub(crate) fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn ensure(&self, needed: usize) -> Result<(), FormatError> {
        match self.pos.checked_add(needed) {
            Some(end) if end <= self.data.len() => Ok(()),
            _ => Err(FormatError::UnexpectedEof {
                expected: self.pos.saturating_add(needed),
                available: self.data.len(),
            }),
        }
    }

    pub(crate) fn bytes(&mut self, len: usize) -> Result<&'a [u8], FormatError> {
        self.ensure(len)?;
        let out = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(out)
    }

    pub(crate) fn skip(&mut self, len: usize) -> Result<(), FormatError> {
        self.bytes(len).map(|_| ())
    }

    pub(crate) fn u8(&mut self) -> Result<u8, FormatError> {
        Ok(self.bytes(1)?[0])
    }

    pub(crate) fn u16(&mut self) -> Result<u16, FormatError> {
        Ok(LittleEndian::read_u16(self.bytes(2)?))
    }

    pub(crate) fn u32(&mut self) -> Result<u32, FormatError> {
        Ok(LittleEndian::read_u32(self.bytes(4)?))
    }

    pub(crate) fn u64(&mut self) -> Result<u64, FormatError> {
        Ok(LittleEndian::read_u64(self.bytes(8)?))
    }

    /// Read an unsigned integer of `size` bytes (1, 2, 4 or 8).
    pub(crate) fn uint(&mut self, size: u8) -> Result<u64, FormatError> {
        match size {
            1 => self.u8().map(u64::from),
            2 => self.u16().map(u64::from),
            4 => self.u32().map(u64::from),
            8 => self.u64(),
            other => Err(FormatError::InvalidOffsetSize(other)),
        }
    }

    /// Read a file address; the all-ones pattern maps to `None`.
    pub(crate) fn address(&mut self, size: u8) -> Result<Option<u64>, FormatError> {
        let raw = self.bytes(size as usize)?;
        if raw.iter().all(|&b| b == 0xFF) {
            return Ok(None);
        }
        let mut padded = [0u8; 8];
        padded[..raw.len()].copy_from_slice(raw);
        Ok(Some(LittleEndian::read_u64(&padded)))
    }
}

/// Append `value` as a little-endian integer of `size` bytes.
pub(crate) fn put_uint(buf: &mut Vec<u8>, value: u64, size: u8) {
    let bytes = value.to_le_bytes();
    buf.extend_from_slice(&bytes[..size as usize]);
}

/// Append an address, writing the undefined pattern for `None`.
pub(crate) fn put_address(buf: &mut Vec<u8>, address: Option<u64>, size: u8) {
    put_uint(buf, address.unwrap_or(UNDEFINED_ADDRESS), size);
}

pub(crate) fn validate_sizes(offset_size: u8, length_size: u8) -> Result<(), FormatError> {
    if !matches!(offset_size, 2 | 4 | 8) {
        return Err(FormatError::InvalidOffsetSize(offset_size));
    }
    if !matches!(length_size, 2 | 4 | 8) {
        return Err(FormatError::InvalidLengthSize(length_size));
    }
    Ok(())
}
