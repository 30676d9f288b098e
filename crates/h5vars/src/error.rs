//! Error type for the handle API.

use h5vars_format::error::FormatError;
use h5vars_format::Datatype;
use thiserror::Error;

use crate::filter::FilterId;

/// Errors returned by every fallible call in this crate.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error from the filesystem.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Encoding or decoding of the file image failed.
    #[error("HDF5 format error: {0}")]
    Format(#[from] FormatError),
    /// No link with this name in the group.
    #[error("{0:?} not found")]
    NotFound(String),
    /// A link with this name already exists in the group.
    #[error("{0:?} already exists")]
    AlreadyExists(String),
    /// The link exists but points at a dataset.
    #[error("{0:?} is not a group")]
    NotAGroup(String),
    /// The link exists but points at a group.
    #[error("{0:?} is not a dataset")]
    NotADataset(String),
    /// Modification attempted through a read-only file.
    #[error("file is opened read-only")]
    ReadOnly,
    /// The file was already closed.
    #[error("file is closed")]
    FileClosed,
    /// `File::close` while group or dataset handles are still open.
    #[error("cannot close file: {0} objects still open")]
    ObjectsStillOpen(usize),
    /// A parameter is out of range or inconsistent.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// The filter is known but this build cannot encode with it.
    #[error("filter {0} is not available")]
    FilterUnavailable(FilterId),
    /// `DatasetCreate::filter` index past the end of the pipeline.
    #[error("filter index {index} out of range ({count} filters)")]
    FilterIndexOutOfRange { index: usize, count: usize },
    /// Dimension lists of different ranks.
    #[error("rank mismatch: expected {expected}, got {actual}")]
    RankMismatch { expected: usize, actual: usize },
    /// Requested size beyond the maximum of its dimension.
    #[error("dimension {dim}: size {size} exceeds maximum {max}")]
    ExceedsMaxDims { dim: usize, size: u64, max: u64 },
    /// The element count of these dims does not fit in 64 bits.
    #[error("extent {0:?} holds more than 2^64 - 1 elements")]
    ExtentTooLarge(Vec<u64>),
    /// A buffer for this many elements cannot be allocated.
    #[error("cannot allocate {elements} elements of {element_size} bytes")]
    AllocationFailed { elements: u64, element_size: usize },
    /// Selection reaches outside the extent of its dataspace.
    #[error("selection lies outside the dataspace extent")]
    SelectionOutOfBounds,
    /// Memory and file selections differ in element count.
    #[error("memory selection has {memory} elements, file selection has {file}")]
    SelectionMismatch { memory: u64, file: u64 },
    /// Caller buffer too small for the memory dataspace.
    #[error("buffer holds {actual} bytes, {expected} needed")]
    BufferSize { expected: usize, actual: usize },
    /// No conversion path between the two types.
    #[error("cannot convert {from} to {to}")]
    ConversionUnsupported { from: Datatype, to: Datatype },
    /// Extending or resizing a dataset that is not chunked.
    #[error("operation requires chunked storage")]
    NotChunked,
}

/// Shorthand used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
