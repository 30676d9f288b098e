//! Datasets stored in native, little- and big-endian integer types.

use h5vars::{Access, ByteOrder, DatasetCreate, Dataspace, Datatype, File};

use super::{DIM1_LEN, GRP_NAME};
use crate::report::{Section, Step};
use crate::{check, h5};

const NATIVE_VAR_NAME: &str = "native_var";
const LE_VAR_NAME: &str = "le_var";
const BE_VAR_NAME: &str = "be_var";

pub(super) fn endianness(s: &mut Section<'_>) -> Step {
    let path = s.config().file_path();
    let data: Vec<i32> = (0..DIM1_LEN as i32).collect();

    let file = h5!(s, File::create(&path));
    let grp = h5!(s, file.create_group(GRP_NAME));
    let space = h5!(s, Dataspace::simple(&[DIM1_LEN], Some(&[DIM1_LEN])));
    let dcpl = DatasetCreate::new();
    let native = h5!(s, grp.create_dataset(NATIVE_VAR_NAME, &Datatype::NATIVE_INT, &space, &dcpl));
    let le = h5!(s, grp.create_dataset(LE_VAR_NAME, &Datatype::STD_I32LE, &space, &dcpl));
    let be = h5!(s, grp.create_dataset(BE_VAR_NAME, &Datatype::STD_I32BE, &space, &dcpl));
    h5!(s, native.write_all(&data));
    h5!(s, le.write_all(&data));
    h5!(s, be.write_all(&data));
    h5!(s, native.close());
    h5!(s, le.close());
    h5!(s, be.close());
    h5!(s, grp.close());
    h5!(s, file.close());

    let file = h5!(s, File::open(&path, Access::ReadOnly));
    let grp = h5!(s, file.open_group(GRP_NAME));

    let native = h5!(s, grp.open_dataset(NATIVE_VAR_NAME));
    let dtype = h5!(s, native.dtype());
    check!(s, dtype == dtype.native(), "{dtype} is not its own native type");
    let data_in: Vec<i32> = h5!(s, native.read_all());
    check!(s, data_in == data, "{NATIVE_VAR_NAME} read back as {data_in:?}");

    let le = h5!(s, grp.open_dataset(LE_VAR_NAME));
    let dtype = h5!(s, le.dtype());
    check!(s, dtype.order() == ByteOrder::LittleEndian, "{LE_VAR_NAME} stored as {dtype}");
    let data_in: Vec<i32> = h5!(s, le.read_all());
    check!(s, data_in == data, "{LE_VAR_NAME} read back as {data_in:?}");

    let be = h5!(s, grp.open_dataset(BE_VAR_NAME));
    let dtype = h5!(s, be.dtype());
    check!(s, dtype.order() == ByteOrder::BigEndian, "{BE_VAR_NAME} stored as {dtype}");
    let data_in: Vec<i32> = h5!(s, be.read_all());
    check!(s, data_in == data, "{BE_VAR_NAME} read back as {data_in:?}");

    h5!(s, native.close());
    h5!(s, le.close());
    h5!(s, be.close());
    h5!(s, grp.close());
    h5!(s, file.close());
    Ok(())
}
