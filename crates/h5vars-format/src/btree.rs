//! Version 1 B-tree indexing raw data chunks (node type 1).
//!
//! Each node holds up to `2K` children and `2K + 1` keys, interleaved as
//! key, child, key, ..., key. A chunk key is the stored chunk size, its
//! filter mask and its element offset in every dimension plus a trailing
//! zero for the element-size dimension. Nodes are always written at full
//! capacity so a later writer could insert in place.

use std::collections::HashSet;

use crate::bytes::{put_address, put_uint, Reader};
use crate::error::FormatError;

const TREE: &[u8; 4] = b"TREE";
const NODE_TYPE_CHUNK: u8 = 1;
const MAX_DEPTH: usize = 32;

/// Indexed-storage K of the default file creation properties.
pub const CHUNK_BTREE_K: usize = 32;
const CAPACITY: usize = 2 * CHUNK_BTREE_K;

/// One stored chunk as seen by the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkRecord {
    /// Element coordinates of the chunk's first element.
    pub offset: Vec<u64>,
    /// Stored (filtered) size in bytes.
    pub size: u32,
    /// Bit `i` set when filter `i` was skipped for this chunk.
    pub filter_mask: u32,
    /// Address of the stored bytes.
    pub address: u64,
}

#[derive(Debug, Clone)]
struct Key {
    size: u32,
    filter_mask: u32,
    offset: Vec<u64>,
}

impl Key {
    fn encode(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.size.to_le_bytes());
        buf.extend_from_slice(&self.filter_mask.to_le_bytes());
        for &o in &self.offset {
            buf.extend_from_slice(&o.to_le_bytes());
        }
        buf.extend_from_slice(&0u64.to_le_bytes());
    }
}

fn key_size(rank: usize) -> usize {
    8 + 8 * (rank + 1)
}

/// Bytes occupied by one node of a tree over `rank`-dimensional chunks.
pub fn node_size(rank: usize, offset_size: u8) -> usize {
    let os = offset_size as usize;
    8 + 2 * os + (CAPACITY + 1) * key_size(rank) + CAPACITY * os
}

struct Entry {
    key: Key,
    child: u64,
}

/// Serialize a chunk index whose first node will live at `base_address`.
///
/// Returns the encoded nodes and the root address, or `None` for an empty
/// index. Leaves come first, the root last.
pub fn write_chunk_btree(
    records: &[ChunkRecord],
    chunk_dims: &[u64],
    base_address: u64,
    offset_size: u8,
) -> Result<(Vec<u8>, Option<u64>), FormatError> {
    let rank = chunk_dims.len();
    let mut sorted: Vec<&ChunkRecord> = records.iter().collect();
    sorted.sort_by(|a, b| a.offset.cmp(&b.offset));
    let Some(last) = sorted.last() else {
        return Ok((Vec::new(), None));
    };
    for r in &sorted {
        if r.offset.len() != rank {
            return Err(FormatError::ChunkRankMismatch {
                expected: rank,
                actual: r.offset.len(),
            });
        }
    }

    let final_key = Key {
        size: 0,
        filter_mask: 0,
        offset: last.offset.iter().zip(chunk_dims).map(|(o, d)| o + d).collect(),
    };
    let mut entries: Vec<Entry> = sorted
        .iter()
        .map(|r| Entry {
            key: Key {
                size: r.size,
                filter_mask: r.filter_mask,
                offset: r.offset.clone(),
            },
            child: r.address,
        })
        .collect();

    let node_len = node_size(rank, offset_size) as u64;
    let mut out = Vec::new();
    let mut next_address = base_address;
    let mut level = 0u8;
    loop {
        let groups: Vec<&[Entry]> = entries.chunks(CAPACITY).collect();
        let first = next_address;
        let mut parents = Vec::with_capacity(groups.len());
        for (i, group) in groups.iter().enumerate() {
            let address = first + i as u64 * node_len;
            let left = (i > 0).then(|| address - node_len);
            let right = (i + 1 < groups.len()).then(|| address + node_len);
            let right_key = groups.get(i + 1).map_or(&final_key, |g| &g[0].key);
            let start = out.len();
            encode_node(&mut out, level, group, right_key, left, right, offset_size);
            out.resize(start + node_len as usize, 0);
            parents.push(Entry {
                key: group[0].key.clone(),
                child: address,
            });
        }
        next_address += groups.len() as u64 * node_len;
        if parents.len() == 1 {
            log::trace!("chunk B-tree: {} levels, root at {first:#x}", level + 1);
            return Ok((out, Some(first)));
        }
        entries = parents;
        level += 1;
    }
}

fn encode_node(
    buf: &mut Vec<u8>,
    level: u8,
    entries: &[Entry],
    right_key: &Key,
    left: Option<u64>,
    right: Option<u64>,
    offset_size: u8,
) {
    buf.extend_from_slice(TREE);
    buf.push(NODE_TYPE_CHUNK);
    buf.push(level);
    buf.extend_from_slice(&(entries.len() as u16).to_le_bytes());
    put_address(buf, left, offset_size);
    put_address(buf, right, offset_size);
    for e in entries {
        e.key.encode(buf);
        put_uint(buf, e.child, offset_size);
    }
    right_key.encode(buf);
}

/// Collect every chunk reachable from the node at `address`.
///
/// Each node may be reached once, and every child must sit exactly one
/// level below its parent.
pub fn read_chunk_btree(
    data: &[u8],
    address: u64,
    rank: usize,
    offset_size: u8,
) -> Result<Vec<ChunkRecord>, FormatError> {
    let mut walk = Walk {
        data,
        rank,
        offset_size,
        visited: HashSet::new(),
        out: Vec::new(),
    };
    walk.visit(address, None, 0)?;
    Ok(walk.out)
}

struct Walk<'a> {
    data: &'a [u8],
    rank: usize,
    offset_size: u8,
    visited: HashSet<u64>,
    out: Vec<ChunkRecord>,
}

impl Walk<'_> {
    fn visit(&mut self, address: u64, expected_level: Option<u8>, depth: usize) -> Result<(), FormatError> {
        if depth > MAX_DEPTH {
            return Err(FormatError::BTreeTooDeep(MAX_DEPTH));
        }
        if !self.visited.insert(address) {
            return Err(FormatError::BTreeCycle(address));
        }
        let mut r = Reader::at(self.data, address as usize)?;
        if r.bytes(4)? != TREE {
            return Err(FormatError::InvalidBTreeSignature);
        }
        let node_type = r.u8()?;
        if node_type != NODE_TYPE_CHUNK {
            return Err(FormatError::UnexpectedBTreeNodeType(node_type));
        }
        let level = r.u8()?;
        if let Some(expected) = expected_level {
            if level != expected {
                return Err(FormatError::BTreeLevelMismatch {
                    expected,
                    actual: level,
                });
            }
        }
        let entries = r.u16()? as usize;
        r.skip(2 * self.offset_size as usize)?;

        for _ in 0..entries {
            let size = r.u32()?;
            let filter_mask = r.u32()?;
            let mut offset = (0..=self.rank).map(|_| r.u64()).collect::<Result<Vec<_>, _>>()?;
            offset.pop();
            let child = r.uint(self.offset_size)?;
            if level == 0 {
                self.out.push(ChunkRecord {
                    offset,
                    size,
                    filter_mask,
                    address: child,
                });
            } else {
                self.visit(child, Some(level - 1), depth + 1)?;
            }
        }
        Ok(())
    }
}
