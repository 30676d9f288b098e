//! HDF5 on-disk structures for the h5vars conformance suite.
//!
//! This crate encodes and decodes the subset of the HDF5 file format that
//! dataset creation, chunking and filtering exercise: the v2 superblock,
//! v2 object headers, datatype / dataspace / layout / fill value / filter
//! pipeline / link messages, the v1 B-tree chunk index, and the deflate,
//! shuffle and fletcher32 filters.
//!
//! [`writer::write_file`] turns a tree of [`writer::GroupSpec`]s into file
//! bytes; [`reader::FileReader`] walks those bytes back.

pub mod btree;
mod bytes;
pub mod checksum;
pub mod dataspace;
pub mod datatype;
pub mod error;
pub mod fill_value;
pub mod filter_pipeline;
pub mod filters;
pub mod layout;
pub mod link;
pub mod message_type;
pub mod object_header;
pub mod reader;
pub mod superblock;
pub mod writer;

pub use bytes::UNDEFINED_ADDRESS;
pub use dataspace::UNLIMITED;
pub use datatype::{ByteOrder, Datatype};
pub use error::FormatError;
