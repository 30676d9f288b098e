//! Error types for HDF5 format encoding and parsing.

use thiserror::Error;

/// Errors that can occur when reading or writing HDF5 binary structures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    /// The HDF5 magic signature was not found at any valid offset.
    #[error("HDF5 signature not found at any valid offset")]
    SignatureNotFound,
    /// The superblock version is not supported.
    #[error("unsupported superblock version: {0}")]
    UnsupportedSuperblockVersion(u8),
    /// Unexpected end of data.
    #[error("unexpected EOF: need {expected} bytes, have {available}")]
    UnexpectedEof {
        /// Number of bytes expected.
        expected: usize,
        /// Number of bytes actually available.
        available: usize,
    },
    /// Invalid offset size (must be 2, 4, or 8).
    #[error("invalid offset size: {0} (must be 2, 4, or 8)")]
    InvalidOffsetSize(u8),
    /// Invalid length size (must be 2, 4, or 8).
    #[error("invalid length size: {0} (must be 2, 4, or 8)")]
    InvalidLengthSize(u8),
    /// Metadata checksum mismatch.
    #[error("{structure} checksum mismatch: stored {stored:#010x}, computed {computed:#010x}")]
    ChecksumMismatch {
        /// The structure whose checksum failed.
        structure: &'static str,
        /// The checksum stored in the file.
        stored: u32,
        /// The checksum we computed.
        computed: u32,
    },
    /// Invalid object header signature.
    #[error("invalid object header signature")]
    InvalidObjectHeaderSignature,
    /// Invalid object header version.
    #[error("unsupported object header version: {0}")]
    InvalidObjectHeaderVersion(u8),
    /// Unknown message type that is marked as must-understand.
    #[error("unsupported message type {0:#06x} marked as must-understand")]
    UnsupportedMessage(u16),
    /// Chain of continuation chunks longer than any valid header.
    #[error("more than {0} object header continuation chunks")]
    TooManyContinuations(usize),
    /// A header message does not fit in the 16-bit size field.
    #[error("header message of {0} bytes is too large")]
    MessageTooLarge(usize),
    /// A required header message was not found.
    #[error("missing required {0} message")]
    MissingMessage(&'static str),
    /// Datatype class this crate does not handle.
    #[error("unsupported datatype class {0}")]
    UnsupportedDatatypeClass(u8),
    /// Datatype message version not recognized.
    #[error("invalid datatype version {0}")]
    InvalidDatatypeVersion(u8),
    /// Fixed-point width other than 1, 2, 4 or 8 bytes.
    #[error("unsupported integer size: {0} bytes")]
    UnsupportedIntegerSize(u32),
    /// Floating-point width other than 4 or 8 bytes.
    #[error("unsupported floating-point size: {0} bytes")]
    UnsupportedFloatSize(u32),
    /// Invalid dataspace message version.
    #[error("invalid dataspace version: {0}")]
    InvalidDataspaceVersion(u8),
    /// Invalid dataspace type.
    #[error("invalid dataspace type: {0}")]
    InvalidDataspaceType(u8),
    /// Data layout version or class this crate does not handle.
    #[error("unsupported data layout (version {version}, class {class})")]
    UnsupportedLayout {
        /// Layout message version.
        version: u8,
        /// Layout class.
        class: u8,
    },
    /// Invalid fill value message version.
    #[error("invalid fill value message version: {0}")]
    InvalidFillValueVersion(u8),
    /// Invalid link info, group info or link message version.
    #[error("invalid link message version: {0}")]
    InvalidLinkVersion(u8),
    /// Link type this crate does not handle.
    #[error("unsupported link type: {0}")]
    UnsupportedLinkType(u8),
    /// Link name is empty or contains a path separator.
    #[error("invalid link name: {0:?}")]
    InvalidLinkName(String),
    /// The group uses old-style symbol table storage.
    #[error("symbol-table groups are not supported")]
    UnsupportedGroupFormat,
    /// The object is neither a group nor a dataset.
    #[error("object at address {0:#x} is neither a group nor a dataset")]
    UnsupportedObject(u64),
    /// Invalid filter pipeline message version.
    #[error("invalid filter pipeline version: {0}")]
    InvalidFilterPipelineVersion(u8),
    /// Filter id with no implementation.
    #[error("unsupported filter id {0}")]
    UnsupportedFilter(u16),
    /// Known filter whose codec is not available in this build.
    #[error("filter {0} is not available")]
    FilterUnavailable(u16),
    /// Generic filter failure.
    #[error("filter error: {0}")]
    FilterError(String),
    /// Compression failure.
    #[error("compression error: {0}")]
    CompressionError(String),
    /// Decompression failure.
    #[error("decompression error: {0}")]
    DecompressionError(String),
    /// Fletcher32 checksum of chunk data did not match.
    #[error("fletcher32 mismatch: stored {stored:#010x}, computed {computed:#010x}")]
    Fletcher32Mismatch {
        /// The checksum stored after the chunk data.
        stored: u32,
        /// The checksum computed over the chunk data.
        computed: u32,
    },
    /// Invalid B-tree node signature.
    #[error("invalid B-tree node signature")]
    InvalidBTreeSignature,
    /// B-tree node of an unexpected type.
    #[error("unexpected B-tree node type {0}")]
    UnexpectedBTreeNodeType(u8),
    /// B-tree nesting deeper than any valid tree.
    #[error("B-tree depth exceeds {0} levels")]
    BTreeTooDeep(usize),
    /// A B-tree node is reachable along more than one path.
    #[error("B-tree node at {0:#x} visited twice")]
    BTreeCycle(u64),
    /// A child node whose level is not one below its parent's.
    #[error("B-tree node level {actual}, expected {expected}")]
    BTreeLevelMismatch {
        /// One below the parent's level.
        expected: u8,
        /// Level stored in the child.
        actual: u8,
    },
    /// Chunked layout with a zero-sized chunk dimension.
    #[error("chunk dimension {0} is zero")]
    ZeroChunkDimension(usize),
    /// Chunk offset that is not a multiple of the chunk dimensions.
    #[error("chunk offset {0:?} is not aligned to the chunk grid")]
    MisalignedChunk(Vec<u64>),
    /// Chunk rank does not match the dataset rank.
    #[error("chunk rank {actual} does not match dataset rank {expected}")]
    ChunkRankMismatch {
        /// Rank of the dataset.
        expected: usize,
        /// Rank found in the chunk.
        actual: usize,
    },
    /// Chunk data does not have the size implied by its dimensions.
    #[error("chunk holds {actual} bytes, expected {expected}")]
    ChunkSizeMismatch {
        /// Bytes implied by chunk dimensions and element size.
        expected: usize,
        /// Bytes actually present.
        actual: usize,
    },
    /// A chunk dimension or stored chunk size exceeds 32 bits.
    #[error("chunk size {0} does not fit in 32 bits")]
    ChunkTooLarge(u64),
    /// The byte size of a dataspace overflows the address space.
    #[error("dataspace {0:?} is too large to store")]
    DataspaceTooLarge(Vec<u64>),
    /// Raw data buffer does not match the dataspace and element size.
    #[error("dataset data holds {actual} bytes, expected {expected}")]
    DataSizeMismatch {
        /// Bytes implied by the dataspace.
        expected: usize,
        /// Bytes actually present.
        actual: usize,
    },
}
