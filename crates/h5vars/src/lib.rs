//! Handle-oriented HDF5 API over `h5vars-format`.
//!
//! Files, groups and datasets are explicit handles that are closed when the
//! caller is done with them; dataspaces and dataset creation properties are
//! plain values. Datasets may be contiguous or chunked, extendible along
//! unlimited dimensions, and filtered through deflate, shuffle and
//! fletcher32.
//!
//! ```no_run
//! use h5vars::{Access, DatasetCreate, Dataspace, Datatype, File, UNLIMITED};
//!
//! let file = File::create("records.h5")?;
//! let group = file.create_group("met")?;
//! let space = Dataspace::simple(&[0, 4], Some(&[UNLIMITED, 4]))?;
//! let mut dcpl = DatasetCreate::new();
//! dcpl.set_chunk(&[1, 4])?.set_shuffle()?.set_deflate(6)?;
//! let ds = group.create_dataset("pressure", &Datatype::IEEE_F32BE, &space, &dcpl)?;
//! ds.extend(&[1, 4])?;
//! ds.write_all(&[1.0f32, 2.0, 3.0, 4.0])?;
//! ds.close()?;
//! group.close()?;
//! file.close()?;
//!
//! let file = File::open("records.h5", Access::ReadOnly)?;
//! let group = file.open_group("met")?;
//! let ds = group.open_dataset("pressure")?;
//! assert_eq!(ds.create_plist()?.nfilters(), 2);
//! let values: Vec<f32> = ds.read_all()?;
//! # Ok::<(), h5vars::Error>(())
//! ```

mod convert;
pub mod dataset;
pub mod error;
pub mod file;
pub mod filter;
pub mod group;
pub mod plist;
pub mod space;
pub mod types;

pub use dataset::Dataset;
pub use error::{Error, Result};
pub use file::{Access, File};
pub use filter::{filter_available, FilterId, FilterInfo};
pub use group::Group;
pub use plist::{DatasetCreate, Layout};
pub use space::{Dataspace, Selection, UNLIMITED};
pub use types::H5Native;

pub use h5vars_format::{ByteOrder, Datatype};
