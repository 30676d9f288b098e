//! Serialize a tree of groups and datasets into HDF5 file bytes.
//!
//! Objects are emitted bottom-up: raw data and chunk indexes first, then
//! dataset headers, then the group headers that link to them, so every
//! address is known when its referrer is encoded. The superblock is patched
//! in at offset 0 once the root group address and the end of file are known.

use crate::btree::{write_chunk_btree, ChunkRecord};
use crate::dataspace::{Dataspace, DataspaceType};
use crate::datatype::Datatype;
use crate::error::FormatError;
use crate::fill_value::FillValue;
use crate::filter_pipeline::FilterPipeline;
use crate::filters::apply_forward;
use crate::layout::DataLayout;
use crate::link::{group_info_message, validate_name, Link, LinkInfo};
use crate::message_type::MessageType;
use crate::object_header::{ObjectHeaderWriter, ObjectTimes, MSG_FLAG_CONSTANT};
use crate::superblock::Superblock;

const OFFSET_SIZE: u8 = 8;
const LENGTH_SIZE: u8 = 8;

/// A group and everything below it.
#[derive(Debug, Clone, Default)]
pub struct GroupSpec {
    pub name: String,
    pub children: Vec<NodeSpec>,
}

#[derive(Debug, Clone)]
pub enum NodeSpec {
    Group(GroupSpec),
    Dataset(DatasetSpec),
}

impl NodeSpec {
    pub fn name(&self) -> &str {
        match self {
            Self::Group(g) => &g.name,
            Self::Dataset(d) => &d.name,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DatasetSpec {
    pub name: String,
    pub datatype: Datatype,
    pub dataspace: Dataspace,
    pub storage: StorageSpec,
    /// Object times stored in the header; `None` when time tracking is off.
    pub times: Option<ObjectTimes>,
}

#[derive(Debug, Clone)]
pub enum StorageSpec {
    /// One block holding every element in file byte order, or `None` when
    /// nothing has been written.
    Contiguous { data: Option<Vec<u8>> },
    Chunked {
        chunk_dims: Vec<u64>,
        pipeline: Option<FilterPipeline>,
        /// Allocated chunks; unfiltered and always a full chunk in size.
        chunks: Vec<ChunkSpec>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkSpec {
    /// Element coordinates of the chunk's first element.
    pub offset: Vec<u64>,
    pub data: Vec<u8>,
}

/// Encode the file whose root group is `root`.
pub fn write_file(root: &GroupSpec) -> Result<Vec<u8>, FormatError> {
    let placeholder = Superblock::new(0, 0);
    let mut w = FileBuffer {
        buf: vec![0u8; placeholder.encoded_size()],
    };
    let root_address = w.write_group(root)?;
    let superblock = Superblock::new(root_address, w.buf.len() as u64).serialize();
    w.buf[..superblock.len()].copy_from_slice(&superblock);
    log::debug!("encoded file: {} bytes, root group at {root_address:#x}", w.buf.len());
    Ok(w.buf)
}

struct FileBuffer {
    buf: Vec<u8>,
}

impl FileBuffer {
    fn append(&mut self, bytes: &[u8]) -> u64 {
        let address = self.buf.len() as u64;
        self.buf.extend_from_slice(bytes);
        address
    }

    fn write_group(&mut self, group: &GroupSpec) -> Result<u64, FormatError> {
        let mut links = Vec::with_capacity(group.children.len());
        for child in &group.children {
            validate_name(child.name())?;
            let address = match child {
                NodeSpec::Group(g) => self.write_group(g)?,
                NodeSpec::Dataset(d) => self.write_dataset(d)?,
            };
            links.push(Link::hard(child.name(), address));
        }

        let mut oh = ObjectHeaderWriter::new();
        oh.add_message(MessageType::LinkInfo, LinkInfo::default().serialize(OFFSET_SIZE));
        oh.add_message(MessageType::GroupInfo, group_info_message());
        for link in &links {
            oh.add_message(MessageType::Link, link.serialize(OFFSET_SIZE)?);
        }
        Ok(self.append(&oh.serialize()?))
    }

    fn write_dataset(&mut self, ds: &DatasetSpec) -> Result<u64, FormatError> {
        let element_size = ds.datatype.size();
        let (layout, pipeline) = match &ds.storage {
            StorageSpec::Contiguous { data } => {
                let size = ds
                    .dataspace
                    .dims
                    .iter()
                    .try_fold(element_size as u64, |acc, &d| acc.checked_mul(d))
                    .ok_or_else(|| FormatError::DataspaceTooLarge(ds.dataspace.dims.clone()))?;
                let size = if ds.dataspace.space_type == DataspaceType::Null { 0 } else { size };
                let address = match data {
                    Some(bytes) => {
                        if bytes.len() as u64 != size {
                            return Err(FormatError::DataSizeMismatch {
                                expected: size as usize,
                                actual: bytes.len(),
                            });
                        }
                        Some(self.append(bytes))
                    }
                    None => None,
                };
                (DataLayout::Contiguous { address, size }, None)
            }
            StorageSpec::Chunked {
                chunk_dims,
                pipeline,
                chunks,
            } => {
                let layout = self.write_chunks(ds, chunk_dims, pipeline.as_ref(), chunks)?;
                (layout, pipeline.as_ref())
            }
        };
        let chunked = matches!(layout, DataLayout::Chunked { .. });

        let mut oh = ObjectHeaderWriter::new();
        if let Some(times) = ds.times {
            oh = oh.with_times(times);
        }
        oh.add_message(MessageType::Dataspace, ds.dataspace.serialize(LENGTH_SIZE));
        oh.add_message_with_flags(MessageType::Datatype, ds.datatype.serialize(), MSG_FLAG_CONSTANT);
        oh.add_message_with_flags(
            MessageType::FillValue,
            FillValue::default_for(chunked).serialize(),
            MSG_FLAG_CONSTANT,
        );
        if let Some(p) = pipeline.filter(|p| !p.filters.is_empty()) {
            oh.add_message(MessageType::FilterPipeline, p.serialize());
        }
        oh.add_message(MessageType::DataLayout, layout.serialize(OFFSET_SIZE, LENGTH_SIZE));
        Ok(self.append(&oh.serialize()?))
    }

    fn write_chunks(
        &mut self,
        ds: &DatasetSpec,
        chunk_dims: &[u64],
        pipeline: Option<&FilterPipeline>,
        chunks: &[ChunkSpec],
    ) -> Result<DataLayout, FormatError> {
        let rank = ds.dataspace.rank();
        if chunk_dims.len() != rank {
            return Err(FormatError::ChunkRankMismatch {
                expected: rank,
                actual: chunk_dims.len(),
            });
        }
        if let Some(dim) = chunk_dims.iter().position(|&d| d == 0) {
            return Err(FormatError::ZeroChunkDimension(dim));
        }
        let stored_dims = chunk_dims
            .iter()
            .map(|&d| u32::try_from(d).map_err(|_| FormatError::ChunkTooLarge(d)))
            .collect::<Result<Vec<_>, _>>()?;
        let element_size = ds.datatype.size();
        let chunk_bytes = chunk_dims
            .iter()
            .try_fold(element_size as u64, |acc, &d| acc.checked_mul(d))
            .and_then(|bytes| usize::try_from(bytes).ok())
            .ok_or(FormatError::ChunkTooLarge(u64::MAX))?;

        let mut records = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            if chunk.offset.len() != rank {
                return Err(FormatError::ChunkRankMismatch {
                    expected: rank,
                    actual: chunk.offset.len(),
                });
            }
            if chunk.data.len() != chunk_bytes {
                return Err(FormatError::ChunkSizeMismatch {
                    expected: chunk_bytes,
                    actual: chunk.data.len(),
                });
            }
            let (stored, filter_mask) = match pipeline {
                Some(p) => apply_forward(p, &chunk.data, element_size)?,
                None => (chunk.data.clone(), 0),
            };
            let size = u32::try_from(stored.len())
                .map_err(|_| FormatError::ChunkTooLarge(stored.len() as u64))?;
            records.push(ChunkRecord {
                offset: chunk.offset.clone(),
                size,
                filter_mask,
                address: self.append(&stored),
            });
        }

        let (tree, btree_address) =
            write_chunk_btree(&records, chunk_dims, self.buf.len() as u64, OFFSET_SIZE)?;
        self.buf.extend_from_slice(&tree);

        Ok(DataLayout::Chunked {
            btree_address,
            chunk_dims: stored_dims,
            element_size: element_size as u32,
        })
    }
}
