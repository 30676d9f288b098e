//! Filter implementations applied to chunk data: deflate, shuffle,
//! fletcher32. szip is recognised but has no codec.

use crate::error::FormatError;
use crate::filter_pipeline::{
    FilterDescription, FilterPipeline, FILTER_DEFLATE, FILTER_FLETCHER32, FILTER_SHUFFLE,
    FILTER_SZIP,
};

/// Whether this build can encode and decode with the given filter.
pub fn filter_available(filter_id: u16) -> bool {
    match filter_id {
        FILTER_DEFLATE => cfg!(feature = "deflate"),
        FILTER_SHUFFLE | FILTER_FLETCHER32 => true,
        _ => false,
    }
}

/// Run the pipeline forward over one chunk.
///
/// Returns the filtered bytes and the chunk's filter mask: bit `i` is set
/// when optional filter `i` failed and was skipped.
pub fn apply_forward(
    pipeline: &FilterPipeline,
    data: &[u8],
    element_size: usize,
) -> Result<(Vec<u8>, u32), FormatError> {
    let mut current = data.to_vec();
    let mut mask = 0u32;
    for (i, filter) in pipeline.filters.iter().enumerate() {
        match encode(filter, &current, element_size) {
            Ok(out) => {
                log::trace!(
                    "filter {} on chunk: {} -> {} bytes",
                    filter.filter_id,
                    current.len(),
                    out.len()
                );
                current = out;
            }
            Err(err) if filter.is_optional() => {
                log::warn!("optional filter {} skipped: {err}", filter.filter_id);
                mask |= mask_bit(i);
            }
            Err(err) => return Err(err),
        }
    }
    Ok((current, mask))
}

/// Undo the pipeline on one chunk, last filter first, skipping filters whose
/// bit is set in `filter_mask`.
pub fn apply_reverse(
    pipeline: &FilterPipeline,
    data: &[u8],
    filter_mask: u32,
    element_size: usize,
) -> Result<Vec<u8>, FormatError> {
    let mut current = data.to_vec();
    for (i, filter) in pipeline.filters.iter().enumerate().rev() {
        if filter_mask & mask_bit(i) != 0 {
            continue;
        }
        current = decode(filter, &current, element_size)?;
    }
    Ok(current)
}

/// Filters past the 32nd have no mask bit and are never skipped.
fn mask_bit(index: usize) -> u32 {
    u32::try_from(index)
        .ok()
        .and_then(|i| 1u32.checked_shl(i))
        .unwrap_or(0)
}

fn encode(filter: &FilterDescription, data: &[u8], element_size: usize) -> Result<Vec<u8>, FormatError> {
    match filter.filter_id {
        FILTER_DEFLATE => {
            let level = filter.client_data.first().copied().unwrap_or(6);
            deflate_compress(data, level)
        }
        FILTER_SHUFFLE => shuffle(data, shuffle_size(filter, element_size)),
        FILTER_FLETCHER32 => Ok(fletcher32_append(data)),
        FILTER_SZIP => Err(FormatError::FilterUnavailable(FILTER_SZIP)),
        other => Err(FormatError::UnsupportedFilter(other)),
    }
}

fn decode(filter: &FilterDescription, data: &[u8], element_size: usize) -> Result<Vec<u8>, FormatError> {
    match filter.filter_id {
        FILTER_DEFLATE => deflate_decompress(data),
        FILTER_SHUFFLE => unshuffle(data, shuffle_size(filter, element_size)),
        FILTER_FLETCHER32 => fletcher32_verify(data),
        FILTER_SZIP => Err(FormatError::FilterUnavailable(FILTER_SZIP)),
        other => Err(FormatError::UnsupportedFilter(other)),
    }
}

fn shuffle_size(filter: &FilterDescription, element_size: usize) -> usize {
    filter
        .client_data
        .first()
        .map_or(element_size, |&n| n as usize)
}

#[cfg(feature = "deflate")]
fn deflate_compress(data: &[u8], level: u32) -> Result<Vec<u8>, FormatError> {
    use std::io::Write;
    let mut encoder = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::new(level.min(9)));
    encoder
        .write_all(data)
        .map_err(|e| FormatError::CompressionError(e.to_string()))?;
    encoder
        .finish()
        .map_err(|e| FormatError::CompressionError(e.to_string()))
}

#[cfg(not(feature = "deflate"))]
fn deflate_compress(_data: &[u8], _level: u32) -> Result<Vec<u8>, FormatError> {
    Err(FormatError::FilterUnavailable(FILTER_DEFLATE))
}

#[cfg(feature = "deflate")]
fn deflate_decompress(data: &[u8]) -> Result<Vec<u8>, FormatError> {
    use std::io::Read;
    let mut decoder = flate2::read::ZlibDecoder::new(data);
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(|e| FormatError::DecompressionError(e.to_string()))?;
    Ok(out)
}

#[cfg(not(feature = "deflate"))]
fn deflate_decompress(_data: &[u8]) -> Result<Vec<u8>, FormatError> {
    Err(FormatError::FilterUnavailable(FILTER_DEFLATE))
}

/// Group byte `j` of every element into plane `j`. A trailing partial
/// element is left in place.
pub fn shuffle(data: &[u8], element_size: usize) -> Result<Vec<u8>, FormatError> {
    if element_size <= 1 {
        return Ok(data.to_vec());
    }
    let n = data.len() / element_size;
    let mut out = vec![0u8; data.len()];
    for i in 0..n {
        for j in 0..element_size {
            out[j * n + i] = data[i * element_size + j];
        }
    }
    let tail = n * element_size;
    out[tail..].copy_from_slice(&data[tail..]);
    Ok(out)
}

/// Inverse of [`shuffle`].
pub fn unshuffle(data: &[u8], element_size: usize) -> Result<Vec<u8>, FormatError> {
    if element_size <= 1 {
        return Ok(data.to_vec());
    }
    let n = data.len() / element_size;
    let mut out = vec![0u8; data.len()];
    for i in 0..n {
        for j in 0..element_size {
            out[i * element_size + j] = data[j * n + i];
        }
    }
    let tail = n * element_size;
    out[tail..].copy_from_slice(&data[tail..]);
    Ok(out)
}

/// The library's Fletcher-32 over big-endian 16-bit words, reduced by
/// end-around carry every 360 words. Sums wrap like the C `uint32_t` ones.
pub fn fletcher32(data: &[u8]) -> u32 {
    let fold = |s: u32| (s & 0xffff) + (s >> 16);
    let mut sum1: u32 = 0;
    let mut sum2: u32 = 0;

    let even = &data[..data.len() & !1];
    for block in even.chunks(720) {
        for word in block.chunks_exact(2) {
            sum1 = sum1.wrapping_add(u32::from(word[0]) << 8 | u32::from(word[1]));
            sum2 = sum2.wrapping_add(sum1);
        }
        sum1 = fold(sum1);
        sum2 = fold(sum2);
    }
    if let Some(&last) = data.get(even.len()) {
        sum1 = sum1.wrapping_add(u32::from(last) << 8);
        sum2 = sum2.wrapping_add(sum1);
        sum1 = fold(sum1);
        sum2 = fold(sum2);
    }
    sum1 = fold(sum1);
    sum2 = fold(sum2);
    sum2 << 16 | sum1
}

fn fletcher32_append(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() + 4);
    out.extend_from_slice(data);
    out.extend_from_slice(&fletcher32(data).to_le_bytes());
    out
}

fn fletcher32_verify(data: &[u8]) -> Result<Vec<u8>, FormatError> {
    if data.len() < 4 {
        return Err(FormatError::FilterError(
            "fletcher32: chunk shorter than its checksum".into(),
        ));
    }
    let (payload, trailer) = data.split_at(data.len() - 4);
    let stored = u32::from_le_bytes([trailer[0], trailer[1], trailer[2], trailer[3]]);
    let computed = fletcher32(payload);
    // Files from library versions before 1.6.3 stored the sum byte-reversed.
    if stored != computed && stored != computed.swap_bytes() {
        return Err(FormatError::Fletcher32Mismatch { stored, computed });
    }
    Ok(payload.to_vec())
}
