//! Dataset handles and their in-memory storage.
//!
//! Elements are held in file byte order. A contiguous dataset allocates its
//! single block on first write. A chunked dataset keeps only the chunks that
//! have been written, keyed by grid index, so an extent may be far larger
//! than memory and an unwritten region reads back as the fill value.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use h5vars_format::error::FormatError;
use h5vars_format::object_header::ObjectTimes;
use h5vars_format::reader::{DatasetInfo, StoredData};
use h5vars_format::writer::{ChunkSpec, DatasetSpec, StorageSpec};
use h5vars_format::Datatype;

use crate::convert::{check_supported, convert};
use crate::error::{Error, Result};
use crate::file::{FileState, ObjectHandle, Shared};
use crate::plist::{DatasetCreate, Layout};
use crate::space::{element_count, Dataspace, UNLIMITED};
use crate::types::{decode_slice, encode_slice, H5Native};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Storage {
    /// The single data block, `None` until first written.
    Contiguous(Option<Vec<u8>>),
    Chunked {
        chunk_dims: Vec<u64>,
        /// Written chunks by grid index (element offset / chunk dims). Each
        /// is a full chunk; elements past the extent hold the fill value.
        chunks: BTreeMap<Vec<u64>, Vec<u8>>,
    },
}

#[derive(Debug)]
pub(crate) struct DatasetNode {
    dtype: Datatype,
    space: Dataspace,
    dcpl: DatasetCreate,
    /// One element's worth of fill bytes.
    fill: Vec<u8>,
    storage: Storage,
    mtime: Option<u32>,
}

fn now_seconds() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as u32)
        .unwrap_or(0)
}

/// Bytes taken by `elements` elements of `size` bytes.
fn byte_len(elements: u64, size: usize) -> Result<usize> {
    elements
        .checked_mul(size as u64)
        .and_then(|n| usize::try_from(n).ok())
        .ok_or(Error::AllocationFailed {
            elements,
            element_size: size,
        })
}

/// An empty buffer with room for `elements` elements of `size` bytes.
fn try_buffer(elements: u64, size: usize) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    out.try_reserve_exact(byte_len(elements, size)?)
        .map_err(|_| Error::AllocationFailed {
            elements,
            element_size: size,
        })?;
    Ok(out)
}

/// `elements` copies of `fill`.
fn filled(fill: &[u8], elements: u64) -> Result<Vec<u8>> {
    let mut out = try_buffer(elements, fill.len())?;
    for _ in 0..elements {
        out.extend_from_slice(fill);
    }
    Ok(out)
}

/// Visit every coordinate of a `shape`-sized box in row-major order.
fn for_each_coord(shape: &[u64], mut f: impl FnMut(&[u64])) {
    if shape.contains(&0) {
        return;
    }
    let mut coord = vec![0u64; shape.len()];
    loop {
        f(&coord);
        let mut d = shape.len();
        loop {
            if d == 0 {
                return;
            }
            d -= 1;
            coord[d] += 1;
            if coord[d] < shape[d] {
                break;
            }
            coord[d] = 0;
        }
    }
}

/// Grid index of the chunk holding the element at row-major `offset` of an
/// array of `dims`, and the element's index inside that chunk.
fn chunk_position(offset: u64, dims: &[u64], chunk_dims: &[u64]) -> (Vec<u64>, usize) {
    let mut rest = offset;
    let mut index = vec![0u64; dims.len()];
    let mut within = vec![0u64; dims.len()];
    for d in (0..dims.len()).rev() {
        let coord = rest % dims[d];
        rest /= dims[d];
        index[d] = coord / chunk_dims[d];
        within[d] = coord % chunk_dims[d];
    }
    let inner = within
        .iter()
        .zip(chunk_dims)
        .fold(0, |acc, (&w, &c)| acc * c + w);
    (index, inner as usize)
}

/// Reset the elements of the chunk at grid `index` that lie outside `dims`.
fn clear_outside(chunk: &mut [u8], index: &[u64], chunk_dims: &[u64], dims: &[u64], fill: &[u8]) {
    let size = fill.len();
    let origin: Vec<u64> = index.iter().zip(chunk_dims).map(|(&i, &c)| i * c).collect();
    let mut inner = 0usize;
    for_each_coord(chunk_dims, |coord| {
        let outside = coord
            .iter()
            .zip(&origin)
            .zip(dims)
            .any(|((&w, &o), &n)| o.saturating_add(w) >= n);
        if outside {
            chunk[inner * size..(inner + 1) * size].copy_from_slice(fill);
        }
        inner += 1;
    });
}

impl DatasetNode {
    /// `dcpl` must already be resolved against `dtype` and `space`.
    pub(crate) fn new(dtype: Datatype, space: &Dataspace, dcpl: DatasetCreate) -> Self {
        let mut space = space.clone();
        space.select_all();
        let storage = match (dcpl.layout(), dcpl.chunk()) {
            (Layout::Chunked, Some(chunk)) => Storage::Chunked {
                chunk_dims: chunk.to_vec(),
                chunks: BTreeMap::new(),
            },
            _ => Storage::Contiguous(None),
        };
        Self {
            fill: vec![0u8; dtype.size()],
            mtime: dcpl.obj_track_times().then(now_seconds),
            dtype,
            space,
            dcpl,
            storage,
        }
    }

    /// Rebuild from a dataset header and its stored data.
    pub(crate) fn from_info(info: &DatasetInfo, stored: StoredData) -> Result<Self> {
        let dtype = info.datatype;
        let space = Dataspace::from_format(&info.dataspace)?;
        let dcpl = DatasetCreate::from_info(info);
        let fill = info
            .fill_value
            .as_ref()
            .and_then(|f| f.value.clone())
            .filter(|v| v.len() == dtype.size())
            .unwrap_or_else(|| vec![0u8; dtype.size()]);

        let storage = match stored {
            StoredData::Whole(data) => {
                if let Some(bytes) = &data {
                    let expected = byte_len(space.num_elements(), dtype.size())?;
                    if bytes.len() != expected {
                        return Err(FormatError::DataSizeMismatch {
                            expected,
                            actual: bytes.len(),
                        }
                        .into());
                    }
                }
                Storage::Contiguous(data)
            }
            StoredData::Chunks(stored) => {
                let chunk_dims = dcpl.chunk().map(<[u64]>::to_vec).unwrap_or_default();
                if chunk_dims.len() != space.rank() {
                    return Err(Error::RankMismatch {
                        expected: space.rank(),
                        actual: chunk_dims.len(),
                    });
                }
                if let Some(dim) = chunk_dims.iter().position(|&c| c == 0) {
                    return Err(FormatError::ZeroChunkDimension(dim).into());
                }
                let chunk_elements = element_count(&chunk_dims)
                    .ok_or_else(|| Error::ExtentTooLarge(chunk_dims.clone()))?;
                let chunk_bytes = byte_len(chunk_elements, dtype.size())?;

                let mut chunks = BTreeMap::new();
                for chunk in stored {
                    if chunk.offset.len() != chunk_dims.len() {
                        return Err(Error::RankMismatch {
                            expected: chunk_dims.len(),
                            actual: chunk.offset.len(),
                        });
                    }
                    if chunk.data.len() != chunk_bytes {
                        return Err(FormatError::ChunkSizeMismatch {
                            expected: chunk_bytes,
                            actual: chunk.data.len(),
                        }
                        .into());
                    }
                    if chunk.offset.iter().zip(space.dims()).any(|(&o, &n)| o >= n) {
                        log::debug!(
                            "ignoring chunk at {:?} outside extent {:?}",
                            chunk.offset,
                            space.dims()
                        );
                        continue;
                    }
                    let index: Vec<u64> = chunk
                        .offset
                        .iter()
                        .zip(&chunk_dims)
                        .map(|(&o, &c)| o / c)
                        .collect();
                    let mut data = chunk.data;
                    clear_outside(&mut data, &index, &chunk_dims, space.dims(), &fill);
                    chunks.insert(index, data);
                }
                Storage::Chunked { chunk_dims, chunks }
            }
        };
        Ok(Self {
            mtime: info.modified,
            dtype,
            space,
            dcpl,
            fill,
            storage,
        })
    }

    pub(crate) fn to_spec(&self, name: &str) -> DatasetSpec {
        let storage = match &self.storage {
            Storage::Contiguous(data) => StorageSpec::Contiguous { data: data.clone() },
            Storage::Chunked { chunk_dims, chunks } => StorageSpec::Chunked {
                chunk_dims: chunk_dims.clone(),
                pipeline: self.dcpl.pipeline(),
                chunks: chunks
                    .iter()
                    .map(|(index, data)| ChunkSpec {
                        offset: index.iter().zip(chunk_dims).map(|(&i, &c)| i * c).collect(),
                        data: data.clone(),
                    })
                    .collect(),
            },
        };
        DatasetSpec {
            name: name.to_owned(),
            datatype: self.dtype,
            dataspace: self.space.to_format(),
            storage,
            times: self.mtime.map(ObjectTimes::uniform),
        }
    }

    /// Stored bytes of the element at linear `offset`.
    fn element(&self, offset: u64) -> &[u8] {
        let size = self.dtype.size();
        match &self.storage {
            Storage::Contiguous(Some(data)) => {
                let at = offset as usize * size;
                &data[at..at + size]
            }
            Storage::Contiguous(None) => self.fill.as_slice(),
            Storage::Chunked { chunk_dims, chunks } => {
                let (index, inner) = chunk_position(offset, self.space.dims(), chunk_dims);
                match chunks.get(&index) {
                    Some(chunk) => &chunk[inner * size..(inner + 1) * size],
                    None => self.fill.as_slice(),
                }
            }
        }
    }

    /// Store one element at linear `offset`, allocating the contiguous block
    /// or the element's chunk on first touch.
    fn set_element(&mut self, offset: u64, value: &[u8]) -> Result<()> {
        let size = self.dtype.size();
        match &mut self.storage {
            Storage::Contiguous(data) => {
                if data.is_none() {
                    *data = Some(filled(&self.fill, self.space.num_elements())?);
                }
                if let Some(block) = data {
                    let at = offset as usize * size;
                    block[at..at + size].copy_from_slice(value);
                }
            }
            Storage::Chunked { chunk_dims, chunks } => {
                let (index, inner) = chunk_position(offset, self.space.dims(), chunk_dims);
                let chunk = match chunks.entry(index) {
                    Entry::Occupied(e) => e.into_mut(),
                    Entry::Vacant(e) => {
                        let elements: u64 = chunk_dims.iter().product();
                        e.insert(filled(&self.fill, elements)?)
                    }
                };
                chunk[inner * size..(inner + 1) * size].copy_from_slice(value);
            }
        }
        Ok(())
    }

    /// Change the extent. Chunks wholly outside the new extent are dropped,
    /// and elements a shrink cuts off read as fill if the extent grows back.
    fn resize(&mut self, dims: &[u64]) -> Result<()> {
        let space = self.space.with_dims(dims)?;
        let shrunk = self.space.dims().iter().zip(dims).any(|(&old, &new)| new < old);
        if let Storage::Chunked { chunk_dims, chunks } = &mut self.storage {
            let chunk_dims: &[u64] = chunk_dims;
            chunks.retain(|index, _| {
                index
                    .iter()
                    .zip(chunk_dims)
                    .zip(dims)
                    .all(|((&i, &c), &n)| i * c < n)
            });
            if shrunk {
                for (index, chunk) in chunks.iter_mut() {
                    clear_outside(chunk, index, chunk_dims, dims, &self.fill);
                }
            }
        }
        self.space = space;
        if self.mtime.is_some() {
            self.mtime = Some(now_seconds());
        }
        Ok(())
    }

    fn check_new_extent(&self, dims: &[u64]) -> Result<()> {
        if !matches!(self.storage, Storage::Chunked { .. }) {
            return Err(Error::NotChunked);
        }
        if dims.len() != self.space.rank() {
            return Err(Error::RankMismatch {
                expected: self.space.rank(),
                actual: dims.len(),
            });
        }
        for (dim, (&size, &max)) in dims.iter().zip(self.space.max_dims()).enumerate() {
            if max != UNLIMITED && size > max {
                return Err(Error::ExceedsMaxDims { dim, size, max });
            }
        }
        Ok(())
    }

    /// The dataset's current extent carrying `file_space`'s selection.
    fn file_selection(&self, file_space: Option<&Dataspace>) -> Result<Dataspace> {
        match file_space {
            None => Ok(self.space.clone()),
            Some(fs) => {
                if fs.rank() != self.space.rank() {
                    return Err(Error::RankMismatch {
                        expected: self.space.rank(),
                        actual: fs.rank(),
                    });
                }
                Ok(self.space.with_selection(fs.selection()))
            }
        }
    }

    #[cfg(test)]
    fn chunk_indices(&self) -> Vec<Vec<u64>> {
        match &self.storage {
            Storage::Chunked { chunks, .. } => chunks.keys().cloned().collect(),
            Storage::Contiguous(_) => Vec::new(),
        }
    }
}

/// Memory-side layout: `mem_space` as given, or a packed run of `count`
/// elements. Its selection must hold exactly `count` elements.
fn memory_selection(mem_space: Option<&Dataspace>, count: u64) -> Result<Dataspace> {
    let ms = match mem_space {
        Some(ms) => ms.clone(),
        None => Dataspace::simple(&[count], None)?,
    };
    let memory = ms.selection_size()?;
    if memory != count {
        return Err(Error::SelectionMismatch {
            memory,
            file: count,
        });
    }
    Ok(ms)
}

/// Fail unless `buf_len` bytes hold `mem_space`'s whole extent.
fn check_buffer(mem_space: &Dataspace, mem_size: usize, buf_len: usize) -> Result<()> {
    let needed = byte_len(mem_space.num_elements(), mem_size)?;
    if buf_len < needed {
        return Err(Error::BufferSize {
            expected: needed,
            actual: buf_len,
        });
    }
    Ok(())
}

/// An open dataset. Release it with [`Dataset::close`].
#[derive(Debug)]
pub struct Dataset {
    handle: ObjectHandle,
    index: usize,
}

impl Dataset {
    pub(crate) fn new(state: Shared, index: usize, name: &str) -> Self {
        Self {
            handle: ObjectHandle::new(state, "dataset", name),
            index,
        }
    }

    fn with_node<R>(&self, f: impl FnOnce(&DatasetNode) -> Result<R>) -> Result<R> {
        let state = self.handle.state().borrow();
        state.ensure_open()?;
        f(&state.datasets[self.index])
    }

    fn with_node_mut<R>(&self, f: impl FnOnce(&mut DatasetNode) -> Result<R>) -> Result<R> {
        let mut guard = self.handle.state().borrow_mut();
        let state: &mut FileState = &mut guard;
        state.ensure_writable()?;
        let out = f(&mut state.datasets[self.index])?;
        state.dirty = true;
        Ok(out)
    }

    pub fn name(&self) -> &str {
        self.handle.name()
    }

    /// Copy of the dataset's dataspace, everything selected.
    pub fn space(&self) -> Result<Dataspace> {
        self.with_node(|n| Ok(n.space.clone()))
    }

    /// The element type as stored in the file.
    pub fn dtype(&self) -> Result<Datatype> {
        self.with_node(|n| Ok(n.dtype))
    }

    /// Creation properties, with per-dataset filter parameters filled in.
    pub fn create_plist(&self) -> Result<DatasetCreate> {
        self.with_node(|n| Ok(n.dcpl.clone()))
    }

    /// Grow the dataset so each dimension is at least `dims[d]`.
    ///
    /// Never shrinks; see [`Dataset::set_extent`]. Growing allocates
    /// nothing. Fails with [`Error::ExtentTooLarge`] when the new element
    /// count does not fit in a `u64`.
    pub fn extend(&self, dims: &[u64]) -> Result<()> {
        self.with_node_mut(|n| {
            n.check_new_extent(dims)?;
            let grown: Vec<u64> = n
                .space
                .dims()
                .iter()
                .zip(dims)
                .map(|(&cur, &want)| cur.max(want))
                .collect();
            log::debug!(
                "extending {:?} from {:?} to {grown:?}",
                self.name(),
                n.space.dims()
            );
            n.resize(&grown)
        })
    }

    /// Set the extent to exactly `dims`; chunks wholly outside it are
    /// discarded.
    pub fn set_extent(&self, dims: &[u64]) -> Result<()> {
        self.with_node_mut(|n| {
            n.check_new_extent(dims)?;
            log::debug!(
                "resizing {:?} from {:?} to {dims:?}",
                self.name(),
                n.space.dims()
            );
            n.resize(dims)
        })
    }

    /// Write `buf`, packed `mem_type` elements laid out by `mem_space`, to
    /// the elements `file_space` selects.
    ///
    /// `None` selects everything on the file side; on the memory side it
    /// means a packed buffer with exactly as many elements as the file
    /// selection.
    pub fn write_raw(
        &self,
        mem_type: &Datatype,
        mem_space: Option<&Dataspace>,
        file_space: Option<&Dataspace>,
        buf: &[u8],
    ) -> Result<()> {
        check_supported(mem_type)?;
        self.with_node_mut(|n| {
            let file_sel = n.file_selection(file_space)?;
            let count = file_sel.selection_size()?;
            let mem_sel = memory_selection(mem_space, count)?;
            let mem_size = mem_type.size();
            check_buffer(&mem_sel, mem_size, buf.len())?;

            // Bounded by the buffer length checked above.
            let mut packed = Vec::with_capacity(count as usize * mem_size);
            for m in mem_sel.selected_offsets()? {
                let m = m as usize;
                packed.extend_from_slice(&buf[m * mem_size..(m + 1) * mem_size]);
            }
            let converted = convert(&packed, mem_type, &n.dtype)?;
            let size = n.dtype.size();
            for (value, f) in converted.chunks_exact(size).zip(file_sel.selected_offsets()?) {
                n.set_element(f, value)?;
            }
            log::trace!("wrote {count} elements to {:?}", self.name());
            Ok(())
        })
    }

    /// Read the elements `file_space` selects into `buf` as `mem_type`.
    /// Memory elements outside `mem_space`'s selection are left untouched.
    pub fn read_raw(
        &self,
        mem_type: &Datatype,
        mem_space: Option<&Dataspace>,
        file_space: Option<&Dataspace>,
        buf: &mut [u8],
    ) -> Result<()> {
        check_supported(mem_type)?;
        self.with_node(|n| {
            let file_sel = n.file_selection(file_space)?;
            let count = file_sel.selection_size()?;
            let mem_sel = memory_selection(mem_space, count)?;
            let mem_size = mem_type.size();
            check_buffer(&mem_sel, mem_size, buf.len())?;

            let mut packed = try_buffer(count, n.dtype.size())?;
            for f in file_sel.selected_offsets()? {
                packed.extend_from_slice(n.element(f));
            }
            let converted = convert(&packed, &n.dtype, mem_type)?;
            for (value, m) in converted.chunks_exact(mem_size).zip(mem_sel.selected_offsets()?) {
                let m = m as usize;
                buf[m * mem_size..(m + 1) * mem_size].copy_from_slice(value);
            }
            Ok(())
        })
    }

    /// Typed [`Dataset::write_raw`] using `T`'s native type.
    pub fn write<T: H5Native>(
        &self,
        mem_space: Option<&Dataspace>,
        file_space: Option<&Dataspace>,
        data: &[T],
    ) -> Result<()> {
        self.write_raw(&T::DATATYPE, mem_space, file_space, &encode_slice(data))
    }

    /// Typed [`Dataset::read_raw`]. The result holds `mem_space`'s full
    /// extent, or just the selected elements when `mem_space` is `None`.
    pub fn read<T: H5Native>(
        &self,
        mem_space: Option<&Dataspace>,
        file_space: Option<&Dataspace>,
    ) -> Result<Vec<T>> {
        let elements = match mem_space {
            Some(ms) => ms.num_elements(),
            None => self.with_node(|n| n.file_selection(file_space)?.selection_size())?,
        };
        let mut buf = filled(&vec![0u8; T::DATATYPE.size()], elements)?;
        self.read_raw(&T::DATATYPE, mem_space, file_space, &mut buf)?;
        Ok(decode_slice(&buf))
    }

    /// Write every element from a packed slice.
    pub fn write_all<T: H5Native>(&self, data: &[T]) -> Result<()> {
        self.write(None, None, data)
    }

    /// Read every element.
    pub fn read_all<T: H5Native>(&self) -> Result<Vec<T>> {
        self.read(None, None)
    }

    pub fn close(mut self) -> Result<()> {
        self.handle.release();
        Ok(())
    }
}
