//! Boolean and unlimited-dimension datasets.

use h5vars::types::encode_slice;
use h5vars::{Access, DatasetCreate, Dataspace, Datatype, File, UNLIMITED};

use super::{BOOL_OUT, DIM1_LEN, GRP_NAME, VAR_BOOL_NAME};
use crate::report::{Section, Step};
use crate::{check, h5};

const GRP2_NAME: &str = "Some_3D_Met_Data";
const PRES_NAME: &str = "Pressure";
const TEMP_NAME: &str = "Temperature";
const LAT_LEN: u64 = 2;
const LON_LEN: u64 = 3;

pub(super) fn bool_variables(s: &mut Section<'_>) -> Step {
    let path = s.config().file_path();

    let file = h5!(s, File::create(&path));
    let grp = h5!(s, file.create_group(GRP_NAME));
    let space = h5!(s, Dataspace::simple(&[DIM1_LEN], Some(&[DIM1_LEN])));
    let ds = h5!(
        s,
        grp.create_dataset(VAR_BOOL_NAME, &Datatype::NATIVE_HBOOL, &space, &DatasetCreate::new())
    );
    h5!(s, ds.write_all(&BOOL_OUT));
    h5!(s, ds.close());
    h5!(s, grp.close());
    h5!(s, file.close());

    let file = h5!(s, File::open(&path, Access::ReadOnly));
    let grp = h5!(s, file.open_group(GRP_NAME));
    let ds = h5!(s, grp.open_dataset(VAR_BOOL_NAME));
    let dtype = h5!(s, ds.dtype());
    check!(s, dtype == Datatype::NATIVE_HBOOL, "stored as {dtype}");
    let bool_in: Vec<bool> = h5!(s, ds.read_all());
    check!(s, bool_in == BOOL_OUT, "read back {bool_in:?}, wrote {BOOL_OUT:?}");
    h5!(s, ds.close());
    h5!(s, grp.close());
    h5!(s, file.close());
    Ok(())
}

/// Check a dataset's extent is `[records, LAT_LEN, LON_LEN]` with an
/// unlimited first dimension.
fn check_record_extent(s: &mut Section<'_>, space: &Dataspace, records: u64) {
    let (dims, max_dims) = space.extent();
    check!(
        s,
        dims == [records, LAT_LEN, LON_LEN],
        "dims {dims:?}, expected [{records}, {LAT_LEN}, {LON_LEN}]"
    );
    check!(
        s,
        max_dims == [UNLIMITED, LAT_LEN, LON_LEN],
        "max dims {max_dims:?}"
    );
}

pub(super) fn unlimited_dimension(s: &mut Section<'_>) -> Step {
    let path = s.config().file_path();
    let record = [-666.666f32; (LAT_LEN * LON_LEN) as usize];
    let record_bytes = encode_slice(&record);

    let file = h5!(s, File::create(&path));
    let grp = h5!(s, file.create_group(GRP2_NAME));
    let space = h5!(
        s,
        Dataspace::simple(&[0, LAT_LEN, LON_LEN], Some(&[UNLIMITED, LAT_LEN, LON_LEN]))
    );
    let mut dcpl = DatasetCreate::new();
    h5!(s, dcpl.set_chunk(&[1, 1, 1]));
    let pres = h5!(s, grp.create_dataset(PRES_NAME, &Datatype::NATIVE_FLOAT, &space, &dcpl));
    let temp = h5!(s, grp.create_dataset(TEMP_NAME, &Datatype::NATIVE_FLOAT, &space, &dcpl));

    let space_in = h5!(s, pres.space());
    check_record_extent(s, &space_in, 0);

    // One record.
    let one = [1, LAT_LEN, LON_LEN];
    h5!(s, pres.extend(&one));
    h5!(s, temp.extend(&one));
    let mem_space = h5!(s, Dataspace::simple(&one, None));
    let write_space = h5!(s, Dataspace::simple(&one, None));
    h5!(
        s,
        pres.write_raw(&Datatype::IEEE_F32BE, Some(&mem_space), Some(&write_space), &record_bytes)
    );
    h5!(
        s,
        temp.write_raw(&Datatype::IEEE_F32LE, Some(&mem_space), Some(&write_space), &record_bytes)
    );
    let space_in = h5!(s, temp.space());
    check_record_extent(s, &space_in, 1);

    // A second record, written through a hyperslab.
    let two = [2, LAT_LEN, LON_LEN];
    h5!(s, pres.extend(&two));
    h5!(s, temp.extend(&two));
    let mut write_space = h5!(s, Dataspace::simple(&two, None));
    h5!(
        s,
        write_space.select_hyperslab(&[1, 0, 0], None, &[1, 1, 1], Some(&one))
    );
    h5!(
        s,
        pres.write_raw(&Datatype::IEEE_F32LE, Some(&mem_space), Some(&write_space), &record_bytes)
    );
    h5!(
        s,
        temp.write_raw(&Datatype::IEEE_F32LE, Some(&mem_space), Some(&write_space), &record_bytes)
    );
    let space_in = h5!(s, pres.space());
    check_record_extent(s, &space_in, 2);

    h5!(s, pres.close());
    h5!(s, temp.close());
    h5!(s, grp.close());
    check!(s, file.open_objects() == 0);
    h5!(s, file.close());

    // Both records survive the round trip; the big-endian write reads back
    // bit-identical through the same memory type.
    let file = h5!(s, File::open(&path, Access::ReadOnly));
    let grp = h5!(s, file.open_group(GRP2_NAME));
    for name in [PRES_NAME, TEMP_NAME] {
        let ds = h5!(s, grp.open_dataset(name));
        let space_in = h5!(s, ds.space());
        check_record_extent(s, &space_in, 2);

        let mut first = h5!(s, ds.space());
        h5!(s, first.select_hyperslab(&[0, 0, 0], None, &[1, 1, 1], Some(&one)));
        let first_type = if name == PRES_NAME {
            Datatype::IEEE_F32BE
        } else {
            Datatype::IEEE_F32LE
        };
        let mut bytes = vec![0u8; record_bytes.len()];
        h5!(s, ds.read_raw(&first_type, Some(&mem_space), Some(&first), &mut bytes));
        check!(s, bytes == record_bytes, "{name}: first record differs");

        let mut second = h5!(s, ds.space());
        h5!(s, second.select_hyperslab(&[1, 0, 0], None, &[1, 1, 1], Some(&one)));
        let values: Vec<f32> = h5!(s, ds.read(Some(&mem_space), Some(&second)));
        check!(s, values == record, "{name}: second record {values:?}");
        h5!(s, ds.close());
    }
    h5!(s, grp.close());
    h5!(s, file.close());
    Ok(())
}
