//! Fill value message (type 0x0005).

use crate::bytes::Reader;
use crate::error::FormatError;

/// When storage for a dataset is allocated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocTime {
    Early = 1,
    Late = 2,
    Incremental = 3,
}

/// When the fill value is written into newly allocated storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillTime {
    OnAlloc = 0,
    Never = 1,
    IfSet = 2,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FillValue {
    pub alloc_time: AllocTime,
    pub fill_time: FillTime,
    /// User-defined fill bytes; `None` means the library default (zeros).
    pub value: Option<Vec<u8>>,
}

impl FillValue {
    /// Library defaults: late allocation for contiguous data, incremental
    /// for chunked data, no user-defined value.
    pub fn default_for(chunked: bool) -> Self {
        Self {
            alloc_time: if chunked {
                AllocTime::Incremental
            } else {
                AllocTime::Late
            },
            fill_time: FillTime::IfSet,
            value: None,
        }
    }

    /// Version 3 encoding.
    pub fn serialize(&self) -> Vec<u8> {
        let mut flags = self.alloc_time as u8 | (self.fill_time as u8) << 2;
        if self.value.is_some() {
            flags |= 0x20;
        }
        let mut buf = vec![3, flags];
        if let Some(v) = &self.value {
            buf.extend_from_slice(&(v.len() as u32).to_le_bytes());
            buf.extend_from_slice(v);
        }
        buf
    }

    /// Parse versions 1 to 3.
    pub fn parse(data: &[u8]) -> Result<Self, FormatError> {
        let mut r = Reader::new(data);
        let version = r.u8()?;
        match version {
            1 | 2 => {
                let alloc_time = alloc_time(r.u8()?);
                let fill_time = fill_time(r.u8()?);
                let defined = r.u8()? != 0;
                let value = if version == 1 || defined {
                    read_value(&mut r)?
                } else {
                    None
                };
                Ok(Self {
                    alloc_time,
                    fill_time,
                    value,
                })
            }
            3 => {
                let flags = r.u8()?;
                let value = if flags & 0x20 != 0 {
                    read_value(&mut r)?
                } else {
                    None
                };
                Ok(Self {
                    alloc_time: alloc_time(flags & 0x03),
                    fill_time: fill_time((flags >> 2) & 0x03),
                    value,
                })
            }
            other => Err(FormatError::InvalidFillValueVersion(other)),
        }
    }
}

fn read_value(r: &mut Reader<'_>) -> Result<Option<Vec<u8>>, FormatError> {
    let size = r.u32()? as usize;
    if size == 0 {
        return Ok(None);
    }
    Ok(Some(r.bytes(size)?.to_vec()))
}

fn alloc_time(raw: u8) -> AllocTime {
    match raw {
        1 => AllocTime::Early,
        3 => AllocTime::Incremental,
        _ => AllocTime::Late,
    }
}

fn fill_time(raw: u8) -> FillTime {
    match raw {
        0 => FillTime::OnAlloc,
        1 => FillTime::Never,
        _ => FillTime::IfSet,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_encode_like_the_library() {
        assert_eq!(FillValue::default_for(false).serialize(), vec![3, 0x0a]);
        assert_eq!(FillValue::default_for(true).serialize(), vec![3, 0x0b]);
    }

    #[test]
    fn defined_value_survives() {
        let fv = FillValue {
            alloc_time: AllocTime::Early,
            fill_time: FillTime::OnAlloc,
            value: Some(vec![0xFF, 0xFF, 0xFF, 0xFF]),
        };
        assert_eq!(FillValue::parse(&fv.serialize()).unwrap(), fv);
    }

    #[test]
    fn version_two_undefined() {
        let fv = FillValue::parse(&[2, 2, 2, 0]).unwrap();
        assert_eq!(fv.value, None);
        assert_eq!(fv.alloc_time, AllocTime::Late);
    }
}
