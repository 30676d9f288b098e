//! The standard sections, in the order they run.

mod basic;
mod endian;
mod filters;
mod szip;

use std::fs;
use std::io;

use crate::config::HarnessConfig;
use crate::report::{Section, Step};

/// Group every section creates its datasets in.
pub(crate) const GRP_NAME: &str = "Henry_V";
pub(crate) const VAR_BOOL_NAME: &str = "Southhamptons_Battle_Record";
pub(crate) const DIM1_LEN: u64 = 3;
pub(crate) const BOOL_OUT: [bool; DIM1_LEN as usize] = [false, true, false];

/// A named section body.
#[derive(Debug, Clone, Copy)]
pub struct SectionDef {
    pub title: &'static str,
    pub run: fn(&mut Section<'_>) -> Step,
}

pub const STANDARD: &[SectionDef] = &[
    SectionDef {
        title: "HDF5 boolean variables",
        run: basic::bool_variables,
    },
    SectionDef {
        title: "HDF5 variable with unlimited dimension",
        run: basic::unlimited_dimension,
    },
    SectionDef {
        title: "HDF5 deflate filter setting and getting",
        run: filters::deflate,
    },
    SectionDef {
        title: "HDF5 deflate, fletcher32, shuffle filter setting and getting",
        run: filters::deflate_shuffle_fletcher32,
    },
    SectionDef {
        title: "HDF5 endianness control",
        run: endian::endianness,
    },
    SectionDef {
        title: "szip functionality",
        run: szip::szip,
    },
    SectionDef {
        title: "using szip and zlib on same var",
        run: szip::szip_and_zlib,
    },
];

/// Delete every file the standard sections may have written.
pub(crate) fn remove_outputs(config: &HarnessConfig) {
    let paths = std::iter::once(config.file_path()).chain(
        szip::VARIANTS
            .iter()
            .map(|variant| config.variant_path(variant.desc)),
    );
    for path in paths {
        match fs::remove_file(&path) {
            Ok(()) => log::debug!("removed {}", path.display()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => log::warn!("cannot remove {}: {err}", path.display()),
        }
    }
}
