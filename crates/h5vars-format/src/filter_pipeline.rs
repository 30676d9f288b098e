//! Filter pipeline message (type 0x000B).

use crate::bytes::Reader;
use crate::error::FormatError;

/// Well-known filter ids.
pub const FILTER_DEFLATE: u16 = 1;
pub const FILTER_SHUFFLE: u16 = 2;
pub const FILTER_FLETCHER32: u16 = 3;
pub const FILTER_SZIP: u16 = 4;
pub const FILTER_NBIT: u16 = 5;
pub const FILTER_SCALEOFFSET: u16 = 6;

/// Filter flag bit: the filter may be skipped if it fails.
pub const FILTER_FLAG_OPTIONAL: u16 = 0x0001;

/// Registered name of a predefined filter.
pub fn filter_name(filter_id: u16) -> Option<&'static str> {
    match filter_id {
        FILTER_DEFLATE => Some("deflate"),
        FILTER_SHUFFLE => Some("shuffle"),
        FILTER_FLETCHER32 => Some("fletcher32"),
        FILTER_SZIP => Some("szip"),
        FILTER_NBIT => Some("nbit"),
        FILTER_SCALEOFFSET => Some("scaleoffset"),
        _ => None,
    }
}

/// One filter of a pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterDescription {
    pub filter_id: u16,
    /// Name stored in the message, if any.
    pub name: Option<String>,
    /// Bit 0 marks the filter optional.
    pub flags: u16,
    /// Filter parameters ("client data").
    pub client_data: Vec<u32>,
}

impl FilterDescription {
    pub fn is_optional(&self) -> bool {
        self.flags & FILTER_FLAG_OPTIONAL != 0
    }

    /// Stored name, falling back to the registered one.
    pub fn display_name(&self) -> Option<&str> {
        self.name.as_deref().or_else(|| filter_name(self.filter_id))
    }
}

/// Ordered filters applied to every chunk of a dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterPipeline {
    pub version: u8,
    pub filters: Vec<FilterDescription>,
}

fn pad8(n: usize) -> usize {
    (n + 7) & !7
}

fn read_name(raw: &[u8]) -> String {
    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    String::from_utf8_lossy(&raw[..end]).into_owned()
}

impl FilterPipeline {
    pub fn new(filters: Vec<FilterDescription>) -> Self {
        Self {
            version: 1,
            filters,
        }
    }

    pub fn parse(data: &[u8]) -> Result<Self, FormatError> {
        let mut r = Reader::new(data);
        let version = r.u8()?;
        let count = r.u8()? as usize;
        let mut filters = Vec::with_capacity(count);
        match version {
            1 => {
                r.skip(6)?;
                for _ in 0..count {
                    let filter_id = r.u16()?;
                    let name_length = r.u16()? as usize;
                    let flags = r.u16()?;
                    let nvalues = r.u16()? as usize;
                    let name = if name_length > 0 {
                        let name = read_name(r.bytes(name_length)?);
                        r.skip(pad8(name_length) - name_length)?;
                        Some(name)
                    } else {
                        None
                    };
                    let client_data = (0..nvalues).map(|_| r.u32()).collect::<Result<Vec<_>, _>>()?;
                    if nvalues % 2 == 1 {
                        r.skip(4)?;
                    }
                    filters.push(FilterDescription {
                        filter_id,
                        name,
                        flags,
                        client_data,
                    });
                }
            }
            2 => {
                for _ in 0..count {
                    let filter_id = r.u16()?;
                    let name_length = if filter_id >= 256 { r.u16()? as usize } else { 0 };
                    let flags = r.u16()?;
                    let nvalues = r.u16()? as usize;
                    let name = if name_length > 0 {
                        Some(read_name(r.bytes(name_length)?))
                    } else {
                        None
                    };
                    let client_data = (0..nvalues).map(|_| r.u32()).collect::<Result<Vec<_>, _>>()?;
                    filters.push(FilterDescription {
                        filter_id,
                        name,
                        flags,
                        client_data,
                    });
                }
            }
            other => return Err(FormatError::InvalidFilterPipelineVersion(other)),
        }
        Ok(Self { version, filters })
    }

    /// Version 1 encoding. Names are NUL-terminated and padded to a multiple
    /// of eight bytes; the stored name length is the padded length.
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = vec![1, self.filters.len() as u8, 0, 0, 0, 0, 0, 0];
        for f in &self.filters {
            let name = f.display_name().map(|n| {
                let mut bytes = n.as_bytes().to_vec();
                bytes.push(0);
                bytes.resize(pad8(bytes.len()), 0);
                bytes
            });
            buf.extend_from_slice(&f.filter_id.to_le_bytes());
            let name_length = name.as_ref().map_or(0, Vec::len) as u16;
            buf.extend_from_slice(&name_length.to_le_bytes());
            buf.extend_from_slice(&f.flags.to_le_bytes());
            buf.extend_from_slice(&(f.client_data.len() as u16).to_le_bytes());
            if let Some(name) = name {
                buf.extend_from_slice(&name);
            }
            for v in &f.client_data {
                buf.extend_from_slice(&v.to_le_bytes());
            }
            if f.client_data.len() % 2 == 1 {
                buf.extend_from_slice(&[0; 4]);
            }
        }
        buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn deflate(level: u32) -> FilterDescription {
        FilterDescription {
            filter_id: FILTER_DEFLATE,
            name: None,
            flags: FILTER_FLAG_OPTIONAL,
            client_data: vec![level],
        }
    }

    #[test]
    fn v1_deflate_layout() {
        let bytes = FilterPipeline::new(vec![deflate(9)]).serialize();
        // header 8 + filter header 8 + "deflate\0" 8 + one value 4 + pad 4
        assert_eq!(bytes.len(), 32);
        assert_eq!(&bytes[8..16], &[1, 0, 8, 0, 1, 0, 1, 0]);
        assert_eq!(&bytes[16..24], b"deflate\0");
        let parsed = FilterPipeline::parse(&bytes).unwrap();
        assert_eq!(parsed.filters[0].name.as_deref(), Some("deflate"));
        assert_eq!(parsed.filters[0].client_data, vec![9]);
        assert!(parsed.filters[0].is_optional());
    }

    #[test]
    fn long_name_pads_to_sixteen() {
        let f = FilterDescription {
            filter_id: FILTER_FLETCHER32,
            name: None,
            flags: 0,
            client_data: vec![],
        };
        let bytes = FilterPipeline::new(vec![f]).serialize();
        // "fletcher32\0" is 11 bytes, padded to 16.
        assert_eq!(u16::from_le_bytes([bytes[10], bytes[11]]), 16);
        assert_eq!(bytes.len(), 8 + 8 + 16);
        let parsed = FilterPipeline::parse(&bytes).unwrap();
        assert_eq!(parsed.filters[0].display_name(), Some("fletcher32"));
        assert!(!parsed.filters[0].is_optional());
    }

    #[test]
    fn three_filter_pipeline() {
        let shuffle = FilterDescription {
            filter_id: FILTER_SHUFFLE,
            name: None,
            flags: FILTER_FLAG_OPTIONAL,
            client_data: vec![4],
        };
        let fletcher = FilterDescription {
            filter_id: FILTER_FLETCHER32,
            name: None,
            flags: 0,
            client_data: vec![],
        };
        let pipeline = FilterPipeline::new(vec![shuffle, deflate(1), fletcher]);
        let parsed = FilterPipeline::parse(&pipeline.serialize()).unwrap();
        let ids: Vec<u16> = parsed.filters.iter().map(|f| f.filter_id).collect();
        assert_eq!(ids, vec![FILTER_SHUFFLE, FILTER_DEFLATE, FILTER_FLETCHER32]);
        assert_eq!(parsed.filters[0].client_data, vec![4]);
    }

    #[test]
    fn v2_without_names() {
        let mut buf = vec![2u8, 1];
        buf.extend_from_slice(&FILTER_SZIP.to_le_bytes());
        buf.extend_from_slice(&1u16.to_le_bytes());
        buf.extend_from_slice(&2u16.to_le_bytes());
        buf.extend_from_slice(&32u32.to_le_bytes());
        buf.extend_from_slice(&4u32.to_le_bytes());
        let parsed = FilterPipeline::parse(&buf).unwrap();
        assert_eq!(parsed.version, 2);
        assert_eq!(parsed.filters[0].name, None);
        assert_eq!(parsed.filters[0].display_name(), Some("szip"));
        assert_eq!(parsed.filters[0].client_data, vec![32, 4]);
    }

    #[test]
    fn unknown_version() {
        assert_eq!(
            FilterPipeline::parse(&[9, 0]),
            Err(FormatError::InvalidFilterPipelineVersion(9))
        );
    }
}
