//! Datatype message: fixed-point and IEEE floating-point classes.

use std::fmt;

use crate::bytes::Reader;
use crate::error::FormatError;

const CLASS_FIXED_POINT: u8 = 0;
const CLASS_FLOATING_POINT: u8 = 1;

/// Byte order of an atomic type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ByteOrder {
    LittleEndian,
    BigEndian,
}

impl ByteOrder {
    /// Byte order of the machine this code runs on.
    pub const fn native() -> Self {
        if cfg!(target_endian = "big") {
            Self::BigEndian
        } else {
            Self::LittleEndian
        }
    }

    fn bit(self) -> u8 {
        match self {
            Self::LittleEndian => 0,
            Self::BigEndian => 1,
        }
    }

    fn suffix(self) -> &'static str {
        match self {
            Self::LittleEndian => "LE",
            Self::BigEndian => "BE",
        }
    }
}

/// An atomic HDF5 datatype.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Datatype {
    /// Integer of `size` bytes.
    FixedPoint {
        size: u32,
        order: ByteOrder,
        signed: bool,
    },
    /// IEEE 754 binary32 (`size == 4`) or binary64 (`size == 8`).
    FloatingPoint { size: u32, order: ByteOrder },
}

const NATIVE: ByteOrder = ByteOrder::native();

impl Datatype {
    /// `H5T_NATIVE_HBOOL`: the library stores booleans as unsigned bytes.
    pub const NATIVE_HBOOL: Self = Self::fixed(1, NATIVE, false);
    pub const NATIVE_SCHAR: Self = Self::fixed(1, NATIVE, true);
    pub const NATIVE_UCHAR: Self = Self::fixed(1, NATIVE, false);
    pub const NATIVE_SHORT: Self = Self::fixed(2, NATIVE, true);
    pub const NATIVE_USHORT: Self = Self::fixed(2, NATIVE, false);
    pub const NATIVE_INT: Self = Self::fixed(4, NATIVE, true);
    pub const NATIVE_UINT: Self = Self::fixed(4, NATIVE, false);
    pub const NATIVE_LLONG: Self = Self::fixed(8, NATIVE, true);
    pub const NATIVE_ULLONG: Self = Self::fixed(8, NATIVE, false);
    pub const NATIVE_FLOAT: Self = Self::float(4, NATIVE);
    pub const NATIVE_DOUBLE: Self = Self::float(8, NATIVE);

    pub const STD_I8LE: Self = Self::fixed(1, ByteOrder::LittleEndian, true);
    pub const STD_U8LE: Self = Self::fixed(1, ByteOrder::LittleEndian, false);
    pub const STD_I16LE: Self = Self::fixed(2, ByteOrder::LittleEndian, true);
    pub const STD_I16BE: Self = Self::fixed(2, ByteOrder::BigEndian, true);
    pub const STD_I32LE: Self = Self::fixed(4, ByteOrder::LittleEndian, true);
    pub const STD_I32BE: Self = Self::fixed(4, ByteOrder::BigEndian, true);
    pub const STD_U32LE: Self = Self::fixed(4, ByteOrder::LittleEndian, false);
    pub const STD_U32BE: Self = Self::fixed(4, ByteOrder::BigEndian, false);
    pub const STD_I64LE: Self = Self::fixed(8, ByteOrder::LittleEndian, true);
    pub const STD_I64BE: Self = Self::fixed(8, ByteOrder::BigEndian, true);
    pub const IEEE_F32LE: Self = Self::float(4, ByteOrder::LittleEndian);
    pub const IEEE_F32BE: Self = Self::float(4, ByteOrder::BigEndian);
    pub const IEEE_F64LE: Self = Self::float(8, ByteOrder::LittleEndian);
    pub const IEEE_F64BE: Self = Self::float(8, ByteOrder::BigEndian);

    const fn fixed(size: u32, order: ByteOrder, signed: bool) -> Self {
        Self::FixedPoint {
            size,
            order,
            signed,
        }
    }

    const fn float(size: u32, order: ByteOrder) -> Self {
        Self::FloatingPoint { size, order }
    }

    /// Element size in bytes.
    pub fn size(&self) -> usize {
        match *self {
            Self::FixedPoint { size, .. } | Self::FloatingPoint { size, .. } => size as usize,
        }
    }

    pub fn order(&self) -> ByteOrder {
        match *self {
            Self::FixedPoint { order, .. } | Self::FloatingPoint { order, .. } => order,
        }
    }

    /// The same type with a different byte order.
    pub fn with_order(self, order: ByteOrder) -> Self {
        match self {
            Self::FixedPoint { size, signed, .. } => Self::fixed(size, order, signed),
            Self::FloatingPoint { size, .. } => Self::float(size, order),
        }
    }

    /// The same class and size in native byte order (`H5Tget_native_type`).
    pub fn native(self) -> Self {
        self.with_order(ByteOrder::native())
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(20);
        match *self {
            Self::FixedPoint {
                size,
                order,
                signed,
            } => {
                buf.push(0x10 | CLASS_FIXED_POINT);
                buf.push(order.bit() | if signed { 0x08 } else { 0 });
                buf.extend_from_slice(&[0, 0]);
                buf.extend_from_slice(&size.to_le_bytes());
                buf.extend_from_slice(&0u16.to_le_bytes());
                buf.extend_from_slice(&((size * 8) as u16).to_le_bytes());
            }
            Self::FloatingPoint { size, order } => {
                let (exp_loc, exp_size, mant_size, bias) = if size == 4 {
                    (23u8, 8u8, 23u8, 127u32)
                } else {
                    (52, 11, 52, 1023)
                };
                buf.push(0x10 | CLASS_FLOATING_POINT);
                // Implied-msb mantissa normalization, sign bit at the top.
                buf.push(0x20 | order.bit());
                buf.push((size * 8 - 1) as u8);
                buf.push(0);
                buf.extend_from_slice(&size.to_le_bytes());
                buf.extend_from_slice(&0u16.to_le_bytes());
                buf.extend_from_slice(&((size * 8) as u16).to_le_bytes());
                buf.extend_from_slice(&[exp_loc, exp_size, 0, mant_size]);
                buf.extend_from_slice(&bias.to_le_bytes());
            }
        }
        buf
    }

    pub fn parse(data: &[u8]) -> Result<Self, FormatError> {
        let mut r = Reader::new(data);
        let class_and_version = r.u8()?;
        let version = class_and_version >> 4;
        if !(1..=4).contains(&version) {
            return Err(FormatError::InvalidDatatypeVersion(version));
        }
        let class = class_and_version & 0x0F;
        let bits = r.bytes(3)?;
        let size = r.u32()?;
        let order = if bits[0] & 0x01 != 0 {
            ByteOrder::BigEndian
        } else {
            ByteOrder::LittleEndian
        };
        match class {
            CLASS_FIXED_POINT => {
                if !matches!(size, 1 | 2 | 4 | 8) {
                    return Err(FormatError::UnsupportedIntegerSize(size));
                }
                Ok(Self::fixed(size, order, bits[0] & 0x08 != 0))
            }
            CLASS_FLOATING_POINT => {
                if !matches!(size, 4 | 8) {
                    return Err(FormatError::UnsupportedFloatSize(size));
                }
                Ok(Self::float(size, order))
            }
            other => Err(FormatError::UnsupportedDatatypeClass(other)),
        }
    }
}

impl fmt::Display for Datatype {
    /// HDF5 predefined type names, e.g. `H5T_STD_I32BE`, `H5T_IEEE_F64LE`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::FixedPoint {
                size,
                order,
                signed,
            } => write!(
                f,
                "H5T_STD_{}{}{}",
                if signed { 'I' } else { 'U' },
                size * 8,
                order.suffix()
            ),
            Self::FloatingPoint { size, order } => {
                write!(f, "H5T_IEEE_F{}{}", size * 8, order.suffix())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn big_endian_int_encoding() {
        let bytes = Datatype::STD_I32BE.serialize();
        assert_eq!(bytes, vec![0x10, 0x09, 0, 0, 4, 0, 0, 0, 0, 0, 32, 0]);
        assert_eq!(Datatype::parse(&bytes).unwrap(), Datatype::STD_I32BE);
    }

    #[test]
    fn double_encoding() {
        let bytes = Datatype::IEEE_F64LE.serialize();
        assert_eq!(bytes.len(), 20);
        assert_eq!(&bytes[..4], &[0x11, 0x20, 63, 0]);
        assert_eq!(&bytes[12..16], &[52, 11, 0, 52]);
        assert_eq!(&bytes[16..], &1023u32.to_le_bytes());
        assert_eq!(Datatype::parse(&bytes).unwrap(), Datatype::IEEE_F64LE);
    }

    #[test]
    fn float_big_endian_keeps_order() {
        let parsed = Datatype::parse(&Datatype::IEEE_F32BE.serialize()).unwrap();
        assert_eq!(parsed.order(), ByteOrder::BigEndian);
        assert_eq!(parsed.size(), 4);
        assert_eq!(parsed.native(), Datatype::NATIVE_FLOAT);
    }

    #[test]
    fn other_classes_rejected() {
        // Class 3 (string), version 1.
        let data = [0x13, 0, 0, 0, 8, 0, 0, 0];
        assert_eq!(
            Datatype::parse(&data),
            Err(FormatError::UnsupportedDatatypeClass(3))
        );
    }

    #[test]
    fn odd_integer_sizes_rejected() {
        // Fixed point, version 1, sizes 0 and 3.
        for size in [0u8, 3] {
            let data = [0x10, 0, 0, 0, size, 0, 0, 0];
            assert_eq!(
                Datatype::parse(&data),
                Err(FormatError::UnsupportedIntegerSize(u32::from(size)))
            );
        }
    }

    #[test]
    fn names() {
        assert_eq!(Datatype::STD_I32BE.to_string(), "H5T_STD_I32BE");
        assert_eq!(Datatype::STD_U8LE.to_string(), "H5T_STD_U8LE");
        assert_eq!(Datatype::IEEE_F64LE.to_string(), "H5T_IEEE_F64LE");
    }

    #[test]
    fn native_bool_is_unsigned_byte() {
        assert_eq!(Datatype::NATIVE_HBOOL.size(), 1);
        assert_eq!(Datatype::NATIVE_HBOOL, Datatype::NATIVE_UCHAR);
        assert_eq!(Datatype::NATIVE_INT.order(), ByteOrder::native());
    }
}
