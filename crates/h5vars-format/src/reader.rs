//! Navigate an HDF5 file image: superblock, groups, dataset headers and
//! raw data.

use crate::btree::read_chunk_btree;
use crate::bytes::Reader;
use crate::dataspace::Dataspace;
use crate::datatype::Datatype;
use crate::error::FormatError;
use crate::fill_value::FillValue;
use crate::filter_pipeline::FilterPipeline;
use crate::filters::apply_reverse;
use crate::layout::DataLayout;
use crate::link::{Link, LinkInfo};
use crate::message_type::MessageType;
use crate::object_header::{HeaderMessage, ObjectHeader};
use crate::superblock::{find_signature, Superblock};

/// What an object header describes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectInfo {
    Group { links: Vec<Link> },
    Dataset(DatasetInfo),
}

/// Metadata of one dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetInfo {
    pub datatype: Datatype,
    pub dataspace: Dataspace,
    pub layout: DataLayout,
    pub pipeline: Option<FilterPipeline>,
    pub fill_value: Option<FillValue>,
    /// Modification time in seconds, when the header records one.
    pub modified: Option<u32>,
}

/// Raw data of a dataset, still in file byte order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoredData {
    /// Contiguous or compact bytes; `None` when never allocated.
    Whole(Option<Vec<u8>>),
    /// Decoded chunks, each a full chunk in size.
    Chunks(Vec<StoredChunk>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredChunk {
    pub offset: Vec<u64>,
    pub data: Vec<u8>,
}

/// Read-only view of a file image.
#[derive(Debug)]
pub struct FileReader<'a> {
    /// The image from the base address on; file addresses index into this.
    data: &'a [u8],
    superblock: Superblock,
}

impl<'a> FileReader<'a> {
    pub fn new(file: &'a [u8]) -> Result<Self, FormatError> {
        let sig = find_signature(file)?;
        let superblock = Superblock::parse(file, sig)?;
        let base = superblock.base_address as usize;
        let data = file.get(base..).ok_or(FormatError::UnexpectedEof {
            expected: base,
            available: file.len(),
        })?;
        Ok(Self { data, superblock })
    }

    pub fn superblock(&self) -> &Superblock {
        &self.superblock
    }

    pub fn root_address(&self) -> u64 {
        self.superblock.root_group_address
    }

    fn header(&self, address: u64) -> Result<ObjectHeader, FormatError> {
        ObjectHeader::parse(
            self.data,
            address as usize,
            self.superblock.offset_size,
            self.superblock.length_size,
        )
    }

    /// Classify the object at `address` and decode its metadata.
    pub fn object(&self, address: u64) -> Result<ObjectInfo, FormatError> {
        let oh = self.header(address)?;
        let os = self.superblock.offset_size;
        let ls = self.superblock.length_size;

        if let Some(info) = oh.find(MessageType::LinkInfo) {
            if !LinkInfo::parse(&info.data, os)?.is_compact() {
                return Err(FormatError::UnsupportedGroupFormat);
            }
            let links = oh
                .find_all(MessageType::Link)
                .map(|m| Link::parse(&m.data, os))
                .collect::<Result<Vec<_>, _>>()?;
            return Ok(ObjectInfo::Group { links });
        }
        if oh.find(MessageType::SymbolTable).is_some() {
            return Err(FormatError::UnsupportedGroupFormat);
        }
        let Some(layout) = oh.find(MessageType::DataLayout) else {
            return Err(FormatError::UnsupportedObject(address));
        };

        let datatype = Datatype::parse(&required(&oh, MessageType::Datatype)?.data)?;
        let dataspace = Dataspace::parse(&required(&oh, MessageType::Dataspace)?.data, ls)?;
        let layout = DataLayout::parse(&layout.data, os, ls)?;
        let pipeline = oh
            .find(MessageType::FilterPipeline)
            .map(|m| FilterPipeline::parse(&m.data))
            .transpose()?;
        let fill_value = oh
            .find(MessageType::FillValue)
            .map(|m| FillValue::parse(&m.data))
            .transpose()?;
        let modified = match oh.times {
            Some(t) => Some(t.modification),
            None => oh
                .find(MessageType::ModificationTime)
                .map(|m| modification_time(&m.data))
                .transpose()?,
        };
        Ok(ObjectInfo::Dataset(DatasetInfo {
            datatype,
            dataspace,
            layout,
            pipeline,
            fill_value,
            modified,
        }))
    }

    /// Load a dataset's raw data, running chunks back through the filters.
    pub fn read_data(&self, info: &DatasetInfo) -> Result<StoredData, FormatError> {
        let element_size = info.datatype.size();
        match &info.layout {
            DataLayout::Compact { data } => Ok(StoredData::Whole(Some(data.clone()))),
            DataLayout::Contiguous { address: None, .. } => Ok(StoredData::Whole(None)),
            DataLayout::Contiguous {
                address: Some(addr),
                size,
            } => {
                let mut r = Reader::at(self.data, *addr as usize)?;
                Ok(StoredData::Whole(Some(r.bytes(*size as usize)?.to_vec())))
            }
            DataLayout::Chunked {
                btree_address: None,
                ..
            } => Ok(StoredData::Chunks(Vec::new())),
            DataLayout::Chunked {
                btree_address: Some(root),
                chunk_dims,
                ..
            } => {
                let rank = chunk_dims.len();
                if rank != info.dataspace.rank() {
                    return Err(FormatError::ChunkRankMismatch {
                        expected: info.dataspace.rank(),
                        actual: rank,
                    });
                }
                let chunk_bytes = chunk_dims
                    .iter()
                    .try_fold(element_size as u64, |acc, &d| acc.checked_mul(u64::from(d)))
                    .and_then(|bytes| usize::try_from(bytes).ok())
                    .ok_or_else(|| {
                        FormatError::ChunkTooLarge(
                            chunk_dims.iter().map(|&d| u64::from(d)).max().unwrap_or(0),
                        )
                    })?;
                let records = read_chunk_btree(self.data, *root, rank, self.superblock.offset_size)?;
                let mut chunks = Vec::with_capacity(records.len());
                for rec in records {
                    let aligned = rec
                        .offset
                        .iter()
                        .zip(chunk_dims)
                        .all(|(&o, &c)| o % u64::from(c) == 0);
                    if !aligned {
                        return Err(FormatError::MisalignedChunk(rec.offset));
                    }
                    let mut r = Reader::at(self.data, rec.address as usize)?;
                    let stored = r.bytes(rec.size as usize)?;
                    let data = match &info.pipeline {
                        Some(p) => apply_reverse(p, stored, rec.filter_mask, element_size)?,
                        None => stored.to_vec(),
                    };
                    if data.len() != chunk_bytes {
                        return Err(FormatError::ChunkSizeMismatch {
                            expected: chunk_bytes,
                            actual: data.len(),
                        });
                    }
                    chunks.push(StoredChunk {
                        offset: rec.offset,
                        data,
                    });
                }
                log::trace!("loaded {} chunks", chunks.len());
                Ok(StoredData::Chunks(chunks))
            }
        }
    }
}

fn required(oh: &ObjectHeader, msg_type: MessageType) -> Result<&HeaderMessage, FormatError> {
    oh.find(msg_type)
        .ok_or(FormatError::MissingMessage(msg_type.name()))
}

fn modification_time(data: &[u8]) -> Result<u32, FormatError> {
    let mut r = Reader::new(data);
    r.skip(4)?;
    r.u32()
}
