//! szip on its own and combined with zlib.
//!
//! Datasets are created the way netCDF-4 creates them: chunked over the
//! whole variable with object time tracking turned off.

use h5vars::{filter_available, Access, DatasetCreate, Dataspace, Datatype, File, FilterId};

use super::GRP_NAME;
use crate::report::{Section, Step};
use crate::{check, h5};

const SZIP_VAR_NAME: &str = "szip_var";
const SZIP_DIM1_LEN: u64 = 32;
const BOTH_DIM1_LEN: u64 = 50;
const OPTIONS_MASK: u32 = 32;
const PIXELS_PER_BLOCK: u32 = 4;
const DEFLATE_LEVEL: u32 = 3;

/// One file of the szip/zlib combination check.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Variant {
    pub(crate) desc: &'static str,
    /// Filters in pipeline order.
    pub(crate) filters: &'static [FilterId],
}

pub(crate) const VARIANTS: &[Variant] = &[
    Variant {
        desc: "uncompressed",
        filters: &[],
    },
    Variant {
        desc: "zlib",
        filters: &[FilterId::Deflate],
    },
    Variant {
        desc: "szip",
        filters: &[FilterId::Szip],
    },
    Variant {
        desc: "zlib_and_szip",
        filters: &[FilterId::Deflate, FilterId::Szip],
    },
    Variant {
        desc: "szip_and_zlib",
        filters: &[FilterId::Szip, FilterId::Deflate],
    },
];

/// Write `0..len` as native ints to a fresh file at `path`, read it back
/// and compare.
fn round_trip(
    s: &mut Section<'_>,
    path: &std::path::Path,
    len: u64,
    filters: &[FilterId],
) -> Step {
    let data: Vec<i32> = (0..len as i32).collect();

    let file = h5!(s, File::create(path));
    let grp = h5!(s, file.create_group(GRP_NAME));
    let mut dcpl = DatasetCreate::new();
    h5!(s, dcpl.set_chunk(&[len]));
    h5!(s, dcpl.set_obj_track_times(false));
    for filter in filters {
        match filter {
            FilterId::Deflate => h5!(s, dcpl.set_deflate(DEFLATE_LEVEL).map(drop)),
            FilterId::Szip => h5!(s, dcpl.set_szip(OPTIONS_MASK, PIXELS_PER_BLOCK).map(drop)),
            other => {
                return Err(s.abort(file!(), line!(), format!("no setter for filter {other}")))
            }
        }
    }
    let space = h5!(s, Dataspace::simple(&[len], Some(&[len])));
    let ds = h5!(
        s,
        grp.create_dataset(SZIP_VAR_NAME, &Datatype::NATIVE_INT, &space, &dcpl)
    );
    h5!(s, ds.write_all(&data));
    h5!(s, ds.close());
    h5!(s, grp.close());
    h5!(s, file.close());

    let file = h5!(s, File::open(path, Access::ReadOnly));
    let grp = h5!(s, file.open_group(GRP_NAME));
    let ds = h5!(s, grp.open_dataset(SZIP_VAR_NAME));
    let plist = h5!(s, ds.create_plist());
    check!(
        s,
        !plist.obj_track_times(),
        "{}: times recorded although tracking was off",
        path.display()
    );
    check!(s, plist.nfilters() == filters.len(), "{} filters", plist.nfilters());
    let data_in: Vec<i32> = h5!(s, ds.read_all());
    check!(s, data_in == data, "{}: data differs after reopen", path.display());
    h5!(s, ds.close());
    h5!(s, grp.close());
    h5!(s, file.close());
    Ok(())
}

pub(super) fn szip(s: &mut Section<'_>) -> Step {
    if !filter_available(FilterId::Szip) {
        return Err(s.skip("szip encoder not available"));
    }
    let path = s.config().file_path();
    round_trip(s, &path, SZIP_DIM1_LEN, &[FilterId::Szip])
}

/// Every variant whose filters are all available runs; the rest are noted
/// and skipped.
pub(super) fn szip_and_zlib(s: &mut Section<'_>) -> Step {
    let mut ran = 0;
    for variant in VARIANTS {
        if let Some(missing) = variant.filters.iter().find(|&&f| !filter_available(f)) {
            s.note(&format!("{}: {missing} not available, skipped", variant.desc));
            continue;
        }
        let path = s.config().variant_path(variant.desc);
        round_trip(s, &path, BOTH_DIM1_LEN, variant.filters)?;
        ran += 1;
    }
    if ran == 0 {
        return Err(s.skip("no variant has its filters available"));
    }
    Ok(())
}
