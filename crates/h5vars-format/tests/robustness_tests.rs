//! Parsers return errors, never panic, on malformed input.

use std::collections::HashSet;

use h5vars_format::btree::read_chunk_btree;
use h5vars_format::dataspace::Dataspace;
use h5vars_format::fill_value::FillValue;
use h5vars_format::filter_pipeline::{
    FilterDescription, FilterPipeline, FILTER_DEFLATE, FILTER_FLETCHER32, FILTER_SHUFFLE,
};
use h5vars_format::layout::DataLayout;
use h5vars_format::link::{Link, LinkTarget};
use h5vars_format::object_header::ObjectHeader;
use h5vars_format::reader::{FileReader, ObjectInfo};
use h5vars_format::superblock::Superblock;
use h5vars_format::writer::{write_file, ChunkSpec, DatasetSpec, GroupSpec, NodeSpec, StorageSpec};
use h5vars_format::{Datatype, FormatError, UNLIMITED};

fn pattern(len: usize, seed: u16, step: u16) -> Vec<u8> {
    (0..len)
        .map(|i| ((i as u16).wrapping_mul(seed.wrapping_add(step)) & 0xFF) as u8)
        .collect()
}

// ---- Garbage into each parser ----

#[test]
fn pseudo_fuzz_message_parsers() {
    for seed in 0u16..100 {
        let data = pattern(256, seed, 7);
        let _ = Superblock::parse(&data, 0);
        let _ = ObjectHeader::parse(&data, 0, 8, 8);
        let _ = ObjectHeader::parse(&data, 0, 4, 4);
        let _ = Datatype::parse(&data);
        let _ = Dataspace::parse(&data, 8);
        let _ = DataLayout::parse(&data, 8, 8);
        let _ = FilterPipeline::parse(&data);
        let _ = FillValue::parse(&data);
        let _ = Link::parse(&data, 8);
        let _ = read_chunk_btree(&data, 0, 2, 8);
    }
}

#[test]
fn pseudo_fuzz_btree_node() {
    for seed in 0u16..100 {
        let mut data = b"TREE\x01".to_vec();
        data.extend(pattern(512, seed, 13));
        let _ = read_chunk_btree(&data, 0, 1, 8);
        let _ = read_chunk_btree(&data, 0, 3, 4);
    }
}

#[test]
fn truncated_layouts() {
    assert!(DataLayout::parse(&[3], 8, 8).is_err());
    assert!(DataLayout::parse(&[3, 2, 2], 8, 8).is_err());
    assert!(matches!(
        DataLayout::parse(&[3, 2, 1], 8, 8),
        Err(FormatError::UnsupportedLayout { version: 3, class: 2 })
    ));
}

// ---- Corrupted file images ----

fn small_file() -> Vec<u8> {
    let records: Vec<ChunkSpec> = (0..70u64)
        .map(|i| ChunkSpec {
            offset: vec![i * 2],
            data: [i as u16, !(i as u16)]
                .iter()
                .flat_map(|v| v.to_le_bytes())
                .collect(),
        })
        .collect();
    let guarded = DatasetSpec {
        name: "guarded".into(),
        datatype: Datatype::STD_I16LE,
        dataspace: Dataspace::simple(vec![140], Some(vec![UNLIMITED])),
        storage: StorageSpec::Chunked {
            chunk_dims: vec![2],
            pipeline: Some(FilterPipeline::new(vec![
                FilterDescription {
                    filter_id: FILTER_SHUFFLE,
                    name: None,
                    flags: 0,
                    client_data: vec![2],
                },
                FilterDescription {
                    filter_id: FILTER_FLETCHER32,
                    name: None,
                    flags: 0,
                    client_data: vec![],
                },
            ])),
            chunks: records,
        },
        times: None,
    };
    let packed = DatasetSpec {
        name: "packed".into(),
        datatype: Datatype::STD_I32BE,
        dataspace: Dataspace::simple(vec![4], None),
        storage: StorageSpec::Chunked {
            chunk_dims: vec![4],
            pipeline: Some(FilterPipeline::new(vec![FilterDescription {
                filter_id: FILTER_DEFLATE,
                name: Some("deflate".into()),
                flags: 0,
                client_data: vec![6],
            }])),
            chunks: vec![ChunkSpec {
                offset: vec![0],
                data: vec![0, 0, 0, 1, 0, 0, 0, 2, 0, 0, 0, 3, 0, 0, 0, 4],
            }],
        },
        times: None,
    };
    let plain = DatasetSpec {
        name: "plain".into(),
        datatype: Datatype::IEEE_F64LE,
        dataspace: Dataspace::simple(vec![2], None),
        storage: StorageSpec::Contiguous {
            data: Some([1.0f64, -1.0].iter().flat_map(|v| v.to_le_bytes()).collect()),
        },
        times: None,
    };
    let mut children = vec![NodeSpec::Dataset(guarded), NodeSpec::Dataset(plain)];
    if cfg!(feature = "deflate") {
        children.push(NodeSpec::Dataset(packed));
    }
    let root = GroupSpec {
        name: String::new(),
        children: vec![NodeSpec::Group(GroupSpec {
            name: "grp".into(),
            children,
        })],
    };
    write_file(&root).expect("encode file")
}

/// Visit every object and load every dataset's data, stopping at the
/// first error.
fn walk(bytes: &[u8]) -> Result<usize, FormatError> {
    let reader = FileReader::new(bytes)?;
    let mut pending = vec![reader.root_address()];
    let mut seen = HashSet::new();
    let mut datasets = 0;
    while let Some(address) = pending.pop() {
        if !seen.insert(address) {
            continue;
        }
        match reader.object(address)? {
            ObjectInfo::Group { links } => {
                pending.extend(links.into_iter().filter_map(|l| match l.target {
                    LinkTarget::Hard(a) => Some(a),
                    LinkTarget::Soft(_) => None,
                }));
            }
            ObjectInfo::Dataset(info) => {
                reader.read_data(&info)?;
                datasets += 1;
            }
        }
    }
    Ok(datasets)
}

#[test]
fn intact_image_walks_cleanly() {
    let expected = if cfg!(feature = "deflate") { 3 } else { 2 };
    assert_eq!(walk(&small_file()), Ok(expected));
}

#[test]
fn every_flipped_byte_is_an_error_or_harmless() {
    let bytes = small_file();
    for pos in 0..bytes.len() {
        let mut corrupted = bytes.clone();
        corrupted[pos] ^= 0xFF;
        let _ = walk(&corrupted);
    }
}

#[test]
fn truncated_images_fail() {
    let bytes = small_file();
    for len in (0..bytes.len()).step_by(97) {
        assert!(walk(&bytes[..len]).is_err(), "prefix of {len} bytes walked");
    }
}

#[test]
fn zero_chunk_dimension_not_written() {
    let root = GroupSpec {
        name: String::new(),
        children: vec![NodeSpec::Dataset(DatasetSpec {
            name: "empty".into(),
            datatype: Datatype::STD_I32LE,
            dataspace: Dataspace::simple(vec![0], Some(vec![UNLIMITED])),
            storage: StorageSpec::Chunked {
                chunk_dims: vec![0],
                pipeline: None,
                chunks: vec![ChunkSpec {
                    offset: vec![0],
                    data: Vec::new(),
                }],
            },
            times: None,
        })],
    };
    assert_eq!(write_file(&root), Err(FormatError::ZeroChunkDimension(0)));
}

#[test]
fn overflowing_contiguous_size_not_written() {
    let dims = vec![u64::MAX / 2, 3];
    let root = GroupSpec {
        name: String::new(),
        children: vec![NodeSpec::Dataset(DatasetSpec {
            name: "huge".into(),
            datatype: Datatype::STD_I32LE,
            dataspace: Dataspace::simple(dims.clone(), None),
            storage: StorageSpec::Contiguous { data: None },
            times: None,
        })],
    };
    assert_eq!(write_file(&root), Err(FormatError::DataspaceTooLarge(dims)));
}
