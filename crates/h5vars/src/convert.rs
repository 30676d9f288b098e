//! Element conversion between memory and file datatypes.
//!
//! Supported paths: identical types, byte-order swaps, integer to integer of
//! any width and signedness (out-of-range values clamp to the destination
//! range), and `f32` to `f64` or back. Integer/float mixes are rejected.

use h5vars_format::{ByteOrder, Datatype};

use crate::error::{Error, Result};

/// Fail unless `dtype` is an integer of 1, 2, 4 or 8 bytes or an IEEE
/// float of 4 or 8.
pub(crate) fn check_supported(dtype: &Datatype) -> Result<()> {
    let supported = match *dtype {
        Datatype::FixedPoint { size, .. } => matches!(size, 1 | 2 | 4 | 8),
        Datatype::FloatingPoint { size, .. } => matches!(size, 4 | 8),
    };
    if !supported {
        return Err(Error::InvalidArgument(format!("unsupported datatype {dtype}")));
    }
    Ok(())
}

/// Convert `src`, a packed array of `from` elements, into `to` elements.
pub(crate) fn convert(src: &[u8], from: &Datatype, to: &Datatype) -> Result<Vec<u8>> {
    if from == to {
        return Ok(src.to_vec());
    }
    let unsupported = || Error::ConversionUnsupported {
        from: *from,
        to: *to,
    };
    let in_size = from.size();
    let out_size = to.size();
    if in_size == 0 || out_size == 0 {
        return Err(unsupported());
    }
    let mut out = Vec::with_capacity(src.len() / in_size * out_size);

    match (*from, *to) {
        (Datatype::FixedPoint { signed: s1, .. }, Datatype::FixedPoint { signed: s2, .. })
            if in_size == out_size && s1 == s2 =>
        {
            swap_into(src, in_size, &mut out);
        }
        (Datatype::FixedPoint { signed: s_in, .. }, Datatype::FixedPoint { signed: s_out, .. }) => {
            if in_size > 8 || out_size > 8 {
                return Err(unsupported());
            }
            let (lo, hi) = int_range(out_size, s_out);
            for elem in src.chunks_exact(in_size) {
                let v = read_int(elem, from.order(), s_in).clamp(lo, hi);
                write_int(v, out_size, to.order(), &mut out);
            }
        }
        (Datatype::FloatingPoint { .. }, Datatype::FloatingPoint { .. }) if in_size == out_size => {
            swap_into(src, in_size, &mut out);
        }
        (Datatype::FloatingPoint { .. }, Datatype::FloatingPoint { .. }) => {
            for elem in src.chunks_exact(in_size) {
                let v = read_float(elem, from.order());
                write_float(v, out_size, to.order(), &mut out);
            }
        }
        _ => return Err(unsupported()),
    }
    Ok(out)
}

/// Same-size copy; reached only when the byte orders differ.
fn swap_into(src: &[u8], size: usize, out: &mut Vec<u8>) {
    for elem in src.chunks_exact(size) {
        out.extend(elem.iter().rev());
    }
}

fn to_le(bytes: &[u8], order: ByteOrder) -> [u8; 16] {
    let mut buf = [0u8; 16];
    match order {
        ByteOrder::LittleEndian => buf[..bytes.len()].copy_from_slice(bytes),
        ByteOrder::BigEndian => {
            for (dst, src) in buf.iter_mut().zip(bytes.iter().rev()) {
                *dst = *src;
            }
        }
    }
    buf
}

fn read_int(bytes: &[u8], order: ByteOrder, signed: bool) -> i128 {
    let buf = to_le(bytes, order);
    let raw = u128::from_le_bytes(buf);
    let bits = 8 * bytes.len() as u32;
    if signed && raw >> (bits - 1) & 1 == 1 {
        (raw | (u128::MAX << bits)) as i128
    } else {
        raw as i128
    }
}

fn write_int(v: i128, size: usize, order: ByteOrder, out: &mut Vec<u8>) {
    let le = v.to_le_bytes();
    match order {
        ByteOrder::LittleEndian => out.extend_from_slice(&le[..size]),
        ByteOrder::BigEndian => out.extend(le[..size].iter().rev()),
    }
}

fn int_range(size: usize, signed: bool) -> (i128, i128) {
    let bits = 8 * size as u32;
    if signed {
        (-(1i128 << (bits - 1)), (1i128 << (bits - 1)) - 1)
    } else {
        (0, (1i128 << bits) - 1)
    }
}

fn read_float(bytes: &[u8], order: ByteOrder) -> f64 {
    let buf = to_le(bytes, order);
    if bytes.len() == 4 {
        f64::from(f32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]))
    } else {
        f64::from_le_bytes([buf[0], buf[1], buf[2], buf[3], buf[4], buf[5], buf[6], buf[7]])
    }
}

fn write_float(v: f64, size: usize, order: ByteOrder, out: &mut Vec<u8>) {
    let le: Vec<u8> = if size == 4 {
        (v as f32).to_le_bytes().to_vec()
    } else {
        v.to_le_bytes().to_vec()
    };
    match order {
        ByteOrder::LittleEndian => out.extend_from_slice(&le),
        ByteOrder::BigEndian => out.extend(le.iter().rev()),
    }
}
