//! Dataset creation properties: layout, chunk shape, filter pipeline and
//! time tracking.

use h5vars_format::filter_pipeline::{FilterDescription, FilterPipeline, FILTER_FLAG_OPTIONAL};
use h5vars_format::layout::DataLayout;
use h5vars_format::reader::DatasetInfo;
use h5vars_format::{ByteOrder, Datatype};

use crate::convert::check_supported;
use crate::error::{Error, Result};
use crate::filter::{filter_available, FilterId, FilterInfo};
use crate::space::{Dataspace, UNLIMITED};

/// szip option bits, as the szip library defines them.
pub const SZIP_ALLOW_K13_OPTION_MASK: u32 = 1;
pub const SZIP_CHIP_OPTION_MASK: u32 = 2;
pub const SZIP_EC_OPTION_MASK: u32 = 4;
pub const SZIP_LSB_OPTION_MASK: u32 = 8;
pub const SZIP_MSB_OPTION_MASK: u32 = 16;
pub const SZIP_NN_OPTION_MASK: u32 = 32;
pub const SZIP_RAW_OPTION_MASK: u32 = 128;

const SZIP_MAX_PIXELS_PER_BLOCK: u32 = 32;
const SZIP_MAX_BLOCKS_PER_SCANLINE: u64 = 128;

/// Largest chunk, in bytes, a v1 B-tree record can describe.
const MAX_CHUNK_BYTES: u64 = u32::MAX as u64;

/// Raw data storage layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    Contiguous,
    Chunked,
}

/// Dataset creation property list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetCreate {
    layout: Layout,
    chunk: Option<Vec<u64>>,
    filters: Vec<FilterDescription>,
    track_times: bool,
}

impl Default for DatasetCreate {
    fn default() -> Self {
        Self {
            layout: Layout::Contiguous,
            chunk: None,
            filters: Vec::new(),
            track_times: true,
        }
    }
}

impl DatasetCreate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Switching to contiguous forgets any chunk shape.
    pub fn set_layout(&mut self, layout: Layout) -> Result<&mut Self> {
        if layout == Layout::Contiguous {
            self.chunk = None;
        }
        self.layout = layout;
        Ok(self)
    }

    /// Set the chunk shape and switch to chunked layout.
    pub fn set_chunk(&mut self, dims: &[u64]) -> Result<&mut Self> {
        if dims.is_empty() {
            return Err(Error::InvalidArgument("chunk rank must be at least 1".into()));
        }
        if let Some(d) = dims.iter().position(|&d| d == 0) {
            return Err(Error::InvalidArgument(format!("chunk dimension {d} is zero")));
        }
        if dims.iter().any(|&d| d > u64::from(u32::MAX)) {
            return Err(Error::InvalidArgument("chunk dimension exceeds 2^32 - 1".into()));
        }
        self.chunk = Some(dims.to_vec());
        self.layout = Layout::Chunked;
        Ok(self)
    }

    /// zlib compression at `level` (0 to 9).
    pub fn set_deflate(&mut self, level: u32) -> Result<&mut Self> {
        if level > 9 {
            return Err(Error::InvalidArgument(format!(
                "deflate level {level} is out of range 0..=9"
            )));
        }
        self.push_filter(FilterId::Deflate, FILTER_FLAG_OPTIONAL, vec![level]);
        Ok(self)
    }

    pub fn set_shuffle(&mut self) -> Result<&mut Self> {
        self.push_filter(FilterId::Shuffle, FILTER_FLAG_OPTIONAL, Vec::new());
        Ok(self)
    }

    pub fn set_fletcher32(&mut self) -> Result<&mut Self> {
        self.push_filter(FilterId::Fletcher32, 0, Vec::new());
        Ok(self)
    }

    /// szip compression. Fails when this build has no szip encoder.
    pub fn set_szip(&mut self, options_mask: u32, pixels_per_block: u32) -> Result<&mut Self> {
        if !filter_available(FilterId::Szip) {
            return Err(Error::FilterUnavailable(FilterId::Szip));
        }
        if pixels_per_block == 0
            || pixels_per_block % 2 != 0
            || pixels_per_block > SZIP_MAX_PIXELS_PER_BLOCK
        {
            return Err(Error::InvalidArgument(format!(
                "szip pixels per block {pixels_per_block} must be even and at most {SZIP_MAX_PIXELS_PER_BLOCK}"
            )));
        }
        let mask = (options_mask & !SZIP_CHIP_OPTION_MASK & !SZIP_LSB_OPTION_MASK & !SZIP_MSB_OPTION_MASK)
            | SZIP_ALLOW_K13_OPTION_MASK
            | SZIP_RAW_OPTION_MASK;
        self.push_filter(FilterId::Szip, FILTER_FLAG_OPTIONAL, vec![mask, pixels_per_block]);
        Ok(self)
    }

    /// Whether datasets record access/modification/change/birth times.
    pub fn set_obj_track_times(&mut self, track: bool) -> Result<&mut Self> {
        self.track_times = track;
        Ok(self)
    }

    /// Adding a filter already in the pipeline replaces it in place.
    fn push_filter(&mut self, id: FilterId, flags: u16, client_data: Vec<u32>) {
        let filter = FilterDescription {
            filter_id: id.code(),
            name: id.name().map(str::to_owned),
            flags,
            client_data,
        };
        match self.filters.iter_mut().find(|f| f.filter_id == id.code()) {
            Some(existing) => *existing = filter,
            None => self.filters.push(filter),
        }
    }

    pub fn layout(&self) -> Layout {
        self.layout
    }

    pub fn chunk(&self) -> Option<&[u64]> {
        self.chunk.as_deref()
    }

    pub fn obj_track_times(&self) -> bool {
        self.track_times
    }

    pub fn nfilters(&self) -> usize {
        self.filters.len()
    }

    pub fn filter(&self, index: usize) -> Result<FilterInfo> {
        let f = self.filters.get(index).ok_or(Error::FilterIndexOutOfRange {
            index,
            count: self.filters.len(),
        })?;
        Ok(FilterInfo::new(
            FilterId::from_code(f.filter_id),
            u32::from(f.flags),
            f.client_data.clone(),
            f.name.as_deref(),
        ))
    }

    pub(crate) fn pipeline(&self) -> Option<FilterPipeline> {
        (!self.filters.is_empty()).then(|| FilterPipeline::new(self.filters.clone()))
    }

    /// Validate against a dataset's type and space, and fill in the
    /// per-dataset filter parameters.
    pub(crate) fn resolve(&self, dtype: &Datatype, space: &Dataspace) -> Result<Self> {
        check_supported(dtype)?;
        let mut resolved = self.clone();
        if self.layout == Layout::Contiguous {
            if !self.filters.is_empty() {
                return Err(Error::InvalidArgument(
                    "filters require chunked layout".into(),
                ));
            }
            if space.is_extendible() {
                return Err(Error::InvalidArgument(
                    "extendible dataspaces require chunked layout".into(),
                ));
            }
            return Ok(resolved);
        }

        let chunk = self.chunk.as_deref().ok_or_else(|| {
            Error::InvalidArgument("chunked layout without chunk dimensions".into())
        })?;
        if space.rank() == 0 {
            return Err(Error::InvalidArgument("scalar datasets cannot be chunked".into()));
        }
        if chunk.len() != space.rank() {
            return Err(Error::RankMismatch {
                expected: space.rank(),
                actual: chunk.len(),
            });
        }
        for (dim, (&size, &max)) in chunk.iter().zip(space.max_dims()).enumerate() {
            if max != UNLIMITED && size > max {
                return Err(Error::ExceedsMaxDims { dim, size, max });
            }
        }
        let chunk_bytes = chunk
            .iter()
            .try_fold(dtype.size() as u64, |acc, &d| acc.checked_mul(d))
            .filter(|&bytes| bytes <= MAX_CHUNK_BYTES);
        if chunk_bytes.is_none() {
            return Err(Error::InvalidArgument(format!(
                "chunk {chunk:?} exceeds the 4 GiB limit"
            )));
        }

        for filter in &mut resolved.filters {
            let id = FilterId::from_code(filter.filter_id);
            if !filter_available(id) {
                return Err(Error::FilterUnavailable(id));
            }
            match id {
                FilterId::Shuffle => filter.client_data = vec![dtype.size() as u32],
                FilterId::Szip => filter.client_data = szip_parameters(filter, dtype, chunk)?,
                _ => {}
            }
        }
        Ok(resolved)
    }

    /// Properties as recorded in an existing dataset's header.
    pub(crate) fn from_info(info: &DatasetInfo) -> Self {
        let (layout, chunk) = match &info.layout {
            DataLayout::Chunked { chunk_dims, .. } => (
                Layout::Chunked,
                Some(chunk_dims.iter().map(|&d| u64::from(d)).collect()),
            ),
            _ => (Layout::Contiguous, None),
        };
        Self {
            layout,
            chunk,
            filters: info
                .pipeline
                .as_ref()
                .map(|p| p.filters.clone())
                .unwrap_or_default(),
            track_times: info.modified.is_some(),
        }
    }
}

/// `[mask | byte order, pixels per block, bits per pixel, pixels per scanline]`.
fn szip_parameters(filter: &FilterDescription, dtype: &Datatype, chunk: &[u64]) -> Result<Vec<u32>> {
    let [mask, ppb, ..] = filter.client_data[..] else {
        return Err(Error::InvalidArgument("szip filter without parameters".into()));
    };
    let order = match dtype.order() {
        ByteOrder::LittleEndian => SZIP_LSB_OPTION_MASK,
        ByteOrder::BigEndian => SZIP_MSB_OPTION_MASK,
    };
    let bits_per_pixel = dtype.size() as u32 * 8;
    let scanline = chunk.last().copied().unwrap_or(1);
    if scanline < u64::from(ppb) {
        return Err(Error::InvalidArgument(format!(
            "szip: fastest chunk dimension {scanline} is smaller than pixels per block {ppb}"
        )));
    }
    let pixels_per_scanline = scanline.min(u64::from(ppb) * SZIP_MAX_BLOCKS_PER_SCANLINE) as u32;
    Ok(vec![mask | order, ppb, bits_per_pixel, pixels_per_scanline])
}
