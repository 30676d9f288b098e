//! Rust element types that map onto native HDF5 types.

use h5vars_format::Datatype;

/// A Rust value with a native-order HDF5 counterpart.
pub trait H5Native: Copy + Default + 'static {
    /// The memory type used when reading or writing slices of `Self`.
    const DATATYPE: Datatype;

    /// Append the native-order bytes of `self`.
    fn write_native(self, out: &mut Vec<u8>);

    /// Decode from exactly `DATATYPE.size()` native-order bytes.
    fn read_native(bytes: &[u8]) -> Self;
}

macro_rules! impl_native {
    ($($t:ty => $dt:ident),* $(,)?) => {$(
        impl H5Native for $t {
            const DATATYPE: Datatype = Datatype::$dt;

            fn write_native(self, out: &mut Vec<u8>) {
                out.extend_from_slice(&self.to_ne_bytes());
            }

            fn read_native(bytes: &[u8]) -> Self {
                let mut raw = [0u8; std::mem::size_of::<$t>()];
                raw.copy_from_slice(&bytes[..std::mem::size_of::<$t>()]);
                <$t>::from_ne_bytes(raw)
            }
        }
    )*};
}

impl_native!(
    i8 => NATIVE_SCHAR,
    u8 => NATIVE_UCHAR,
    i16 => NATIVE_SHORT,
    u16 => NATIVE_USHORT,
    i32 => NATIVE_INT,
    u32 => NATIVE_UINT,
    i64 => NATIVE_LLONG,
    u64 => NATIVE_ULLONG,
    f32 => NATIVE_FLOAT,
    f64 => NATIVE_DOUBLE,
);

/// Booleans are stored as one unsigned byte, 0 or 1.
impl H5Native for bool {
    const DATATYPE: Datatype = Datatype::NATIVE_HBOOL;

    fn write_native(self, out: &mut Vec<u8>) {
        out.push(u8::from(self));
    }

    fn read_native(bytes: &[u8]) -> Self {
        bytes[0] != 0
    }
}

/// Native-order bytes of a slice.
pub fn encode_slice<T: H5Native>(values: &[T]) -> Vec<u8> {
    let mut out = Vec::with_capacity(values.len() * T::DATATYPE.size());
    for &v in values {
        v.write_native(&mut out);
    }
    out
}

/// Decode native-order bytes; a trailing partial element is ignored.
pub fn decode_slice<T: H5Native>(bytes: &[u8]) -> Vec<T> {
    bytes
        .chunks_exact(T::DATATYPE.size())
        .map(T::read_native)
        .collect()
}
