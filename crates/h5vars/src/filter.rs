//! Filter identifiers and the per-filter view returned by
//! [`DatasetCreate::filter`](crate::DatasetCreate::filter).

use std::fmt;

use h5vars_format::filter_pipeline::{
    filter_name, FILTER_DEFLATE, FILTER_FLETCHER32, FILTER_SHUFFLE, FILTER_SZIP,
};
use h5vars_format::filters;

/// `config` bit: the filter can encode in this build.
pub const FILTER_CONFIG_ENCODE_ENABLED: u32 = 0x0001;
/// `config` bit: the filter can decode in this build.
pub const FILTER_CONFIG_DECODE_ENABLED: u32 = 0x0002;

/// A filter identifier, predefined or registered by id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterId {
    Deflate,
    Shuffle,
    Fletcher32,
    Szip,
    Other(u16),
}

impl FilterId {
    /// Numeric id as stored in the filter pipeline message.
    pub fn code(self) -> u16 {
        match self {
            Self::Deflate => FILTER_DEFLATE,
            Self::Shuffle => FILTER_SHUFFLE,
            Self::Fletcher32 => FILTER_FLETCHER32,
            Self::Szip => FILTER_SZIP,
            Self::Other(id) => id,
        }
    }

    pub fn from_code(code: u16) -> Self {
        match code {
            FILTER_DEFLATE => Self::Deflate,
            FILTER_SHUFFLE => Self::Shuffle,
            FILTER_FLETCHER32 => Self::Fletcher32,
            FILTER_SZIP => Self::Szip,
            other => Self::Other(other),
        }
    }

    /// Registered name, if the id is a predefined filter.
    pub fn name(self) -> Option<&'static str> {
        filter_name(self.code())
    }
}

impl fmt::Display for FilterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{name} ({})", self.code()),
            None => write!(f, "#{}", self.code()),
        }
    }
}

/// Whether datasets using this filter can be written and read.
pub fn filter_available(id: FilterId) -> bool {
    filters::filter_available(id.code())
}

/// One entry of a dataset's filter pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterInfo {
    pub id: FilterId,
    /// Pipeline flags; bit 0 marks the filter optional.
    pub flags: u32,
    pub cd_values: Vec<u32>,
    /// Stored name, or the registered one, or empty.
    pub name: String,
    /// [`FILTER_CONFIG_ENCODE_ENABLED`] | [`FILTER_CONFIG_DECODE_ENABLED`]
    /// when the filter is available, 0 otherwise.
    pub config: u32,
}

impl FilterInfo {
    pub(crate) fn new(id: FilterId, flags: u32, cd_values: Vec<u32>, name: Option<&str>) -> Self {
        let config = if filter_available(id) {
            FILTER_CONFIG_ENCODE_ENABLED | FILTER_CONFIG_DECODE_ENABLED
        } else {
            0
        };
        Self {
            id,
            flags,
            cd_values,
            name: name.or_else(|| id.name()).unwrap_or_default().to_owned(),
            config,
        }
    }
}
