//! Filter pipeline settings as read back from a reopened file.

use h5vars::{
    filter_available, Access, DatasetCreate, Dataspace, Datatype, File, FilterId, Layout,
};

use super::{BOOL_OUT, DIM1_LEN, GRP_NAME, VAR_BOOL_NAME};
use crate::report::{Section, Step};
use crate::{check, h5};

const DEFLATE_LEVEL: u32 = 9;
const DEFLATE_NAME: &str = "deflate";

/// Write the boolean record through a chunked dataset built by `configure`,
/// then reopen the file and return the dataset's creation properties.
fn write_and_reopen(
    s: &mut Section<'_>,
    configure: impl FnOnce(&mut DatasetCreate) -> h5vars::Result<()>,
) -> Result<DatasetCreate, crate::Abort> {
    let path = s.config().file_path();

    let file = h5!(s, File::create(&path));
    let grp = h5!(s, file.create_group(GRP_NAME));
    let mut dcpl = DatasetCreate::new();
    h5!(s, dcpl.set_layout(Layout::Chunked));
    h5!(s, dcpl.set_chunk(&[DIM1_LEN]));
    h5!(s, configure(&mut dcpl));
    let space = h5!(s, Dataspace::simple(&[DIM1_LEN], Some(&[DIM1_LEN])));
    let ds = h5!(
        s,
        grp.create_dataset(VAR_BOOL_NAME, &Datatype::NATIVE_HBOOL, &space, &dcpl)
    );
    h5!(s, ds.write_all(&BOOL_OUT));
    h5!(s, ds.close());
    h5!(s, grp.close());
    h5!(s, file.close());

    let file = h5!(s, File::open(&path, Access::ReadOnly));
    let grp = h5!(s, file.open_group(GRP_NAME));
    let ds = h5!(s, grp.open_dataset(VAR_BOOL_NAME));
    let plist = h5!(s, ds.create_plist());
    let bool_in: Vec<bool> = h5!(s, ds.read_all());
    check!(s, bool_in == BOOL_OUT, "filtered data read back as {bool_in:?}");
    h5!(s, ds.close());
    h5!(s, grp.close());
    h5!(s, file.close());
    Ok(plist)
}

pub(super) fn deflate(s: &mut Section<'_>) -> Step {
    if !filter_available(FilterId::Deflate) {
        return Err(s.skip("deflate is not available in this build"));
    }
    let plist = write_and_reopen(s, |dcpl| dcpl.set_deflate(DEFLATE_LEVEL).map(drop))?;

    check!(s, plist.nfilters() == 1, "{} filters", plist.nfilters());
    let filter = h5!(s, plist.filter(0));
    check!(s, filter.id == FilterId::Deflate, "filter 0 is {}", filter.id);
    check!(s, filter.cd_values == [DEFLATE_LEVEL], "cd values {:?}", filter.cd_values);
    check!(s, filter.name == DEFLATE_NAME, "filter name {:?}", filter.name);
    Ok(())
}

pub(super) fn deflate_shuffle_fletcher32(s: &mut Section<'_>) -> Step {
    if !filter_available(FilterId::Deflate) {
        return Err(s.skip("deflate is not available in this build"));
    }
    let plist = write_and_reopen(s, |dcpl| {
        dcpl.set_shuffle()?.set_deflate(DEFLATE_LEVEL)?.set_fletcher32()?;
        Ok(())
    })?;

    check!(s, plist.nfilters() == 3, "{} filters", plist.nfilters());
    let (mut shuffle, mut fletcher32, mut deflate) = (0, 0, 0);
    for index in 0..plist.nfilters() {
        let filter = h5!(s, plist.filter(index));
        match filter.id {
            FilterId::Shuffle => shuffle += 1,
            FilterId::Fletcher32 => fletcher32 += 1,
            FilterId::Deflate => {
                deflate += 1;
                check!(s, filter.cd_values == [DEFLATE_LEVEL], "cd values {:?}", filter.cd_values);
                check!(s, filter.name == DEFLATE_NAME, "filter name {:?}", filter.name);
            }
            _ => {}
        }
    }
    check!(
        s,
        shuffle > 0 && fletcher32 > 0 && deflate > 0,
        "found shuffle {shuffle}, fletcher32 {fletcher32}, deflate {deflate}"
    );
    Ok(())
}
