//! Write, close, reopen and read back through the public handle API.

use h5vars::{
    Access, ByteOrder, DatasetCreate, Dataspace, Datatype, Error, File, FilterId, Layout,
    UNLIMITED,
};
use pretty_assertions::assert_eq;
use tempfile::{tempdir, TempDir};

fn scratch(name: &str) -> (TempDir, std::path::PathBuf) {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join(name);
    (dir, path)
}

#[test]
fn unlimited_records_extend_and_persist() {
    let (_dir, path) = scratch("records.h5");
    let file = File::create(&path).unwrap();
    let grp = file.create_group("met").unwrap();
    let space = Dataspace::simple(&[0, 2, 3], Some(&[UNLIMITED, 2, 3])).unwrap();
    let mut dcpl = DatasetCreate::new();
    dcpl.set_chunk(&[1, 1, 1]).unwrap();
    let ds = grp
        .create_dataset("temp", &Datatype::NATIVE_FLOAT, &space, &dcpl)
        .unwrap();
    assert_eq!(ds.space().unwrap().extent(), (vec![0, 2, 3], vec![UNLIMITED, 2, 3]));

    ds.extend(&[1, 2, 3]).unwrap();
    let record = [1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0];
    ds.write_all(&record).unwrap();

    ds.extend(&[2, 2, 3]).unwrap();
    let mem = Dataspace::simple(&[1, 2, 3], None).unwrap();
    let mut file_space = Dataspace::simple(&[2, 2, 3], None).unwrap();
    file_space
        .select_hyperslab(&[1, 0, 0], None, &[1, 1, 1], Some(&[1, 2, 3]))
        .unwrap();
    let second: Vec<f32> = record.iter().map(|v| v * 10.0).collect();
    ds.write(Some(&mem), Some(&file_space), &second).unwrap();

    // Extending never shrinks.
    ds.extend(&[1, 2, 3]).unwrap();
    assert_eq!(ds.space().unwrap().dims(), &[2, 2, 3]);
    assert!(matches!(ds.extend(&[2, 3, 3]), Err(Error::ExceedsMaxDims { dim: 1, .. })));
    ds.close().unwrap();
    grp.close().unwrap();
    file.close().unwrap();

    let file = File::open(&path, Access::ReadOnly).unwrap();
    let grp = file.open_group("met").unwrap();
    let ds = grp.open_dataset("temp").unwrap();
    assert_eq!(ds.space().unwrap().extent(), (vec![2, 2, 3], vec![UNLIMITED, 2, 3]));
    let all: Vec<f32> = ds.read_all().unwrap();
    assert_eq!(&all[..6], &record);
    assert_eq!(&all[6..], second.as_slice());
    let plist = ds.create_plist().unwrap();
    assert_eq!(plist.layout(), Layout::Chunked);
    assert_eq!(plist.chunk(), Some(&[1u64, 1, 1][..]));
    ds.close().unwrap();
    grp.close().unwrap();
    file.close().unwrap();
}

#[test]
fn filter_pipeline_survives_reopen() {
    let (_dir, path) = scratch("filters.h5");
    let file = File::create(&path).unwrap();
    let grp = file.create_group("g").unwrap();
    let space = Dataspace::simple(&[3], None).unwrap();
    let mut dcpl = DatasetCreate::new();
    dcpl.set_layout(Layout::Chunked)
        .unwrap()
        .set_chunk(&[3])
        .unwrap()
        .set_shuffle()
        .unwrap()
        .set_deflate(9)
        .unwrap()
        .set_fletcher32()
        .unwrap();
    let ds = grp
        .create_dataset("flags", &Datatype::NATIVE_HBOOL, &space, &dcpl)
        .unwrap();
    ds.write_all(&[false, true, false]).unwrap();
    ds.close().unwrap();
    grp.close().unwrap();
    file.close().unwrap();

    let file = File::open(&path, Access::ReadOnly).unwrap();
    let grp = file.open_group("g").unwrap();
    let ds = grp.open_dataset("flags").unwrap();
    let plist = ds.create_plist().unwrap();
    assert_eq!(plist.nfilters(), 3);
    let shuffle = plist.filter(0).unwrap();
    assert_eq!(shuffle.id, FilterId::Shuffle);
    assert_eq!(shuffle.cd_values, vec![1]);
    let deflate = plist.filter(1).unwrap();
    assert_eq!(deflate.id, FilterId::Deflate);
    assert_eq!(deflate.cd_values, vec![9]);
    assert_eq!(deflate.name, "deflate");
    assert_eq!(plist.filter(2).unwrap().id, FilterId::Fletcher32);
    assert_eq!(ds.read_all::<bool>().unwrap(), vec![false, true, false]);
    ds.close().unwrap();
    grp.close().unwrap();
    file.close().unwrap();
}

#[test]
fn byte_order_is_kept_per_dataset() {
    let (_dir, path) = scratch("endian.h5");
    let data = [0i32, 1, -2, 70_000];
    let file = File::create(&path).unwrap();
    let root = file.root_group().unwrap();
    let space = Dataspace::simple(&[4], None).unwrap();
    for (name, dtype) in [
        ("native", Datatype::NATIVE_INT),
        ("le", Datatype::STD_I32LE),
        ("be", Datatype::STD_I32BE),
    ] {
        let ds = root
            .create_dataset(name, &dtype, &space, &DatasetCreate::new())
            .unwrap();
        ds.write_all(&data).unwrap();
        ds.close().unwrap();
    }
    root.close().unwrap();
    file.close().unwrap();

    let raw = std::fs::read(&path).unwrap();
    let be_bytes: Vec<u8> = data.iter().flat_map(|v| v.to_be_bytes()).collect();
    assert!(raw.windows(be_bytes.len()).any(|w| w == be_bytes.as_slice()));

    let file = File::open(&path, Access::ReadOnly).unwrap();
    let root = file.root_group().unwrap();
    let native = root.open_dataset("native").unwrap();
    let dtype = native.dtype().unwrap();
    assert_eq!(dtype, dtype.native());
    native.close().unwrap();
    for (name, order) in [("le", ByteOrder::LittleEndian), ("be", ByteOrder::BigEndian)] {
        let ds = root.open_dataset(name).unwrap();
        assert_eq!(ds.dtype().unwrap().order(), order);
        assert_eq!(ds.read_all::<i32>().unwrap(), data);
        ds.close().unwrap();
    }
    root.close().unwrap();
    file.close().unwrap();
}

#[test]
fn unwritten_chunks_read_as_zero() {
    let (_dir, path) = scratch("sparse.h5");
    let file = File::create(&path).unwrap();
    let root = file.root_group().unwrap();
    let space = Dataspace::simple(&[8], None).unwrap();
    let mut dcpl = DatasetCreate::new();
    dcpl.set_chunk(&[2]).unwrap();
    let ds = root
        .create_dataset("sparse", &Datatype::STD_I64LE, &space, &dcpl)
        .unwrap();
    let mut sel = ds.space().unwrap();
    sel.select_hyperslab(&[5], None, &[2], None).unwrap();
    ds.write(None, Some(&sel), &[7i64, 8]).unwrap();
    ds.close().unwrap();
    root.close().unwrap();
    file.close().unwrap();

    let file = File::open(&path, Access::ReadOnly).unwrap();
    let root = file.root_group().unwrap();
    let ds = root.open_dataset("sparse").unwrap();
    assert_eq!(ds.read_all::<i64>().unwrap(), vec![0, 0, 0, 0, 0, 7, 8, 0]);
    let mut sel = ds.space().unwrap();
    sel.select_hyperslab(&[4], Some(&[2]), &[2], None).unwrap();
    assert_eq!(ds.read::<i64>(None, Some(&sel)).unwrap(), vec![0, 8]);
    ds.close().unwrap();
    root.close().unwrap();
    file.close().unwrap();
}

#[test]
fn many_chunks_need_a_deep_index() {
    let (_dir, path) = scratch("deep.h5");
    let values: Vec<u32> = (0..300).collect();
    let file = File::create(&path).unwrap();
    let root = file.root_group().unwrap();
    let space = Dataspace::simple(&[300], Some(&[UNLIMITED])).unwrap();
    let mut dcpl = DatasetCreate::new();
    dcpl.set_chunk(&[1]).unwrap().set_fletcher32().unwrap();
    let ds = root
        .create_dataset("many", &Datatype::STD_U32BE, &space, &dcpl)
        .unwrap();
    ds.write_all(&values).unwrap();
    ds.close().unwrap();
    root.close().unwrap();
    file.close().unwrap();

    let file = File::open(&path, Access::ReadOnly).unwrap();
    let root = file.root_group().unwrap();
    let ds = root.open_dataset("many").unwrap();
    assert_eq!(ds.read_all::<u32>().unwrap(), values);
    ds.close().unwrap();
    root.close().unwrap();
    file.close().unwrap();
}

#[test]
fn narrowing_conversion_clamps() {
    let (_dir, path) = scratch("clamp.h5");
    let file = File::create(&path).unwrap();
    let root = file.root_group().unwrap();
    let space = Dataspace::simple(&[3], None).unwrap();
    let ds = root
        .create_dataset("bytes", &Datatype::STD_U8LE, &space, &DatasetCreate::new())
        .unwrap();
    ds.write_all(&[-1i32, 128, 1000]).unwrap();
    assert_eq!(ds.read_all::<u8>().unwrap(), vec![0, 128, 255]);
    assert!(matches!(
        ds.write_all(&[1.0f32, 2.0, 3.0]),
        Err(Error::ConversionUnsupported { .. })
    ));
    ds.close().unwrap();
    root.close().unwrap();
    file.close().unwrap();
}

#[test]
fn set_extent_shrinks_and_discards() {
    let (_dir, path) = scratch("shrink.h5");
    let file = File::create(&path).unwrap();
    let root = file.root_group().unwrap();
    let space = Dataspace::simple(&[4], Some(&[UNLIMITED])).unwrap();
    let mut dcpl = DatasetCreate::new();
    dcpl.set_chunk(&[2]).unwrap();
    let ds = root
        .create_dataset("v", &Datatype::NATIVE_INT, &space, &dcpl)
        .unwrap();
    ds.write_all(&[1i32, 2, 3, 4]).unwrap();
    ds.set_extent(&[1]).unwrap();
    ds.set_extent(&[4]).unwrap();
    assert_eq!(ds.read_all::<i32>().unwrap(), vec![1, 0, 0, 0]);
    ds.close().unwrap();
    root.close().unwrap();
    file.close().unwrap();
}

#[test]
fn dropped_file_still_flushes() {
    let (_dir, path) = scratch("dropped.h5");
    {
        let file = File::create(&path).unwrap();
        let grp = file.create_group("kept").unwrap();
        grp.close().unwrap();
    }
    let file = File::open(&path, Access::ReadOnly).unwrap();
    let root = file.root_group().unwrap();
    assert_eq!(root.link_names().unwrap(), vec!["kept".to_string()]);
    root.close().unwrap();
    file.close().unwrap();
}

fn record_dataset(file: &File, chunk: &[u64]) -> h5vars::Dataset {
    let root = file.root_group().unwrap();
    let space = Dataspace::simple(&[0, 2, 3], Some(&[UNLIMITED, 2, 3])).unwrap();
    let mut dcpl = DatasetCreate::new();
    dcpl.set_chunk(chunk).unwrap();
    let ds = root
        .create_dataset("records", &Datatype::NATIVE_FLOAT, &space, &dcpl)
        .unwrap();
    root.close().unwrap();
    ds
}

#[test]
fn extent_past_u64_elements_rejected() {
    let (_dir, path) = scratch("huge.h5");
    let file = File::create(&path).unwrap();
    let ds = record_dataset(&file, &[1, 1, 1]);
    assert!(matches!(
        ds.extend(&[u64::MAX / 4, 2, 3]),
        Err(Error::ExtentTooLarge(_))
    ));
    assert!(matches!(
        ds.set_extent(&[u64::MAX, 2, 3]),
        Err(Error::ExtentTooLarge(_))
    ));
    assert_eq!(ds.space().unwrap().dims(), &[0, 2, 3]);
    ds.close().unwrap();
    file.close().unwrap();
}

#[test]
fn distant_record_written_without_filling_the_gap() {
    let (_dir, path) = scratch("distant.h5");
    let records = 1u64 << 32;
    let file = File::create(&path).unwrap();
    let ds = record_dataset(&file, &[1, 2, 3]);
    ds.extend(&[records, 2, 3]).unwrap();
    let mut last = ds.space().unwrap();
    last.select_hyperslab(&[records - 1, 0, 0], None, &[1, 2, 3], None)
        .unwrap();
    ds.write(None, Some(&last), &[1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0])
        .unwrap();
    ds.close().unwrap();
    file.close().unwrap();
    assert!(std::fs::metadata(&path).unwrap().len() < 64 * 1024);

    let file = File::open(&path, Access::ReadOnly).unwrap();
    let root = file.root_group().unwrap();
    let ds = root.open_dataset("records").unwrap();
    assert_eq!(ds.space().unwrap().dims(), &[records, 2, 3]);
    let back: Vec<f32> = ds.read(None, Some(&last)).unwrap();
    assert_eq!(back, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    let mut first = ds.space().unwrap();
    first.select_hyperslab(&[0, 0, 0], None, &[1, 2, 3], None).unwrap();
    assert_eq!(ds.read::<f32>(None, Some(&first)).unwrap(), vec![0.0; 6]);
    ds.close().unwrap();
    root.close().unwrap();
    file.close().unwrap();
}

#[test]
fn reading_an_enormous_extent_fails_cleanly() {
    let (_dir, path) = scratch("enormous.h5");
    let file = File::create(&path).unwrap();
    let ds = record_dataset(&file, &[1, 2, 3]);
    ds.extend(&[1 << 60, 2, 3]).unwrap();
    assert!(matches!(
        ds.read_all::<f32>(),
        Err(Error::AllocationFailed { .. })
    ));
    ds.close().unwrap();
    file.close().unwrap();
}

#[test]
fn overflowing_hyperslab_coordinates_rejected() {
    let (_dir, path) = scratch("coords.h5");
    let file = File::create(&path).unwrap();
    let ds = record_dataset(&file, &[1, 1, 1]);
    ds.extend(&[2, 2, 3]).unwrap();
    let mut space = ds.space().unwrap();
    assert!(matches!(
        space.select_hyperslab(&[u64::MAX, 0, 0], None, &[1, 1, 1], None),
        Err(Error::SelectionOutOfBounds)
    ));
    assert!(matches!(
        space.select_hyperslab(&[0, 0, 0], Some(&[u64::MAX, 1, 1]), &[2, 1, 1], None),
        Err(Error::SelectionOutOfBounds)
    ));

    // Representable, but beyond the extent.
    space
        .select_hyperslab(&[u64::MAX - 8, 0, 0], None, &[1, 2, 3], None)
        .unwrap();
    assert!(matches!(
        ds.write(None, Some(&space), &[0.0f32; 6]),
        Err(Error::SelectionOutOfBounds)
    ));
    assert!(matches!(
        ds.read::<f32>(None, Some(&space)),
        Err(Error::SelectionOutOfBounds)
    ));
    let mem = Dataspace::simple(&[6], None).unwrap();
    assert!(matches!(
        ds.read::<f32>(Some(&mem), Some(&space)),
        Err(Error::SelectionOutOfBounds)
    ));
    ds.close().unwrap();
    file.close().unwrap();
}

/// Open `path` and read every dataset it holds, nesting at most `depth`
/// groups deep.
fn read_everything(path: &std::path::Path) -> h5vars::Result<usize> {
    fn visit(group: &h5vars::Group, depth: usize) -> h5vars::Result<usize> {
        let mut datasets = 0;
        for name in group.link_names()? {
            match group.open_dataset(&name) {
                Ok(ds) => {
                    let elements = ds.space()?.num_elements();
                    if elements <= 4096 {
                        let dtype = ds.dtype()?;
                        let mut buf = vec![0u8; elements as usize * dtype.size()];
                        ds.read_raw(&dtype, None, None, &mut buf)?;
                    }
                    ds.close()?;
                    datasets += 1;
                }
                Err(Error::NotADataset(_)) if depth > 0 => {
                    let sub = group.open_group(&name)?;
                    datasets += visit(&sub, depth - 1)?;
                    sub.close()?;
                }
                Err(err) => return Err(err),
            }
        }
        Ok(datasets)
    }
    let file = File::open(path, Access::ReadOnly)?;
    let root = file.root_group()?;
    let datasets = visit(&root, 4)?;
    root.close()?;
    file.close()?;
    Ok(datasets)
}

#[test]
fn corrupted_files_fail_without_panicking() {
    let (dir, path) = scratch("pristine.h5");
    let file = File::create(&path).unwrap();
    let grp = file.create_group("g").unwrap();
    let space = Dataspace::simple(&[80], Some(&[UNLIMITED])).unwrap();
    let mut dcpl = DatasetCreate::new();
    dcpl.set_chunk(&[1]).unwrap().set_shuffle().unwrap();
    let ds = grp
        .create_dataset("chunked", &Datatype::STD_I16BE, &space, &dcpl)
        .unwrap();
    ds.write_all(&(0..80i16).collect::<Vec<_>>()).unwrap();
    ds.close().unwrap();
    let fixed = Dataspace::simple(&[2, 2], None).unwrap();
    let ds = grp
        .create_dataset("fixed", &Datatype::IEEE_F64LE, &fixed, &DatasetCreate::new())
        .unwrap();
    ds.write_all(&[1.0f64, 2.0, 3.0, 4.0]).unwrap();
    ds.close().unwrap();
    grp.close().unwrap();
    file.close().unwrap();
    assert_eq!(read_everything(&path).unwrap(), 2);

    let pristine = std::fs::read(&path).unwrap();
    let corrupted = dir.path().join("corrupted.h5");
    for pos in 0..pristine.len() {
        let mut bytes = pristine.clone();
        bytes[pos] ^= 0xFF;
        std::fs::write(&corrupted, &bytes).unwrap();
        let _ = read_everything(&corrupted);
    }
}
