//! Flat token arrays stored as 1-D NumPy `.npy` files of little-endian `i32`.
//!
//! [`TokenArrayWriter`] is a fixed-capacity arena: the file is sized for the
//! full capacity up front and mapped writable, and a separate counter tracks
//! how many slots hold valid ids. [`TokenArray`] maps an existing file
//! read-only so callers can slice it without loading it into memory.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Cursor, Write};
use std::ops::Range;
use std::path::{Path, PathBuf};

use log::{debug, info};
use memmap2::{Mmap, MmapMut};
use npyz::{DType, NpyHeader, TypeStr, WriteOptions, WriterBuilder};

use crate::errors::{ensure_file, format_error, Error, Result};

pub type TokenId = u32;

/// Bytes per stored element.
pub const ELEMENT_SIZE: usize = 4;

const DESCR: &str = "<i4";

fn token_dtype() -> Result<DType> {
    let ty: TypeStr = DESCR
        .parse()
        .map_err(|_| Error::InvalidConfig("token dtype is not a valid type string"))?;
    Ok(DType::new_scalar(ty))
}

/// Header bytes of an array declaring `len` elements.
fn header_bytes(len: u64) -> Result<Vec<u8>> {
    let mut header = Vec::new();
    // The writer is dropped before any row is pushed: only its header is
    // kept, the element slots are filled through the mapping.
    let writer = WriteOptions::<i32>::new()
        .dtype(token_dtype()?)
        .shape(&[len])
        .writer(&mut header)
        .begin_nd()?;
    drop(writer);
    Ok(header)
}

fn decode_ids(bytes: &[u8]) -> impl Iterator<Item = TokenId> + '_ {
    bytes
        .chunks_exact(ELEMENT_SIZE)
        .map(|chunk| TokenId::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
}

fn create_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

/// Streams `len` ids into a new array file at `path`.
pub(crate) fn write_ids(
    path: &Path,
    len: usize,
    ids: impl IntoIterator<Item = TokenId>,
) -> Result<()> {
    create_parent(path)?;
    let mut out = BufWriter::new(File::create(path)?);
    let mut writer = WriteOptions::<i32>::new()
        .dtype(token_dtype()?)
        .shape(&[len as u64])
        .writer(&mut out)
        .begin_nd()?;
    writer.extend(ids.into_iter().map(|id| id as i32))?;
    writer.finish()?;
    out.into_inner().map_err(|err| err.into_error())?.sync_all()?;
    Ok(())
}

/// Writes an in-memory token sequence as a token array file.
pub fn write_tokens(path: impl AsRef<Path>, tokens: &[TokenId]) -> Result<()> {
    write_ids(path.as_ref(), tokens.len(), tokens.iter().copied())
}

/// Pre-allocated, memory-mapped token array being filled front to back.
pub struct TokenArrayWriter {
    path: PathBuf,
    file: File,
    mmap: MmapMut,
    data_offset: usize,
    capacity: usize,
    len: usize,
}

impl TokenArrayWriter {
    /// Creates `path` sized for `capacity` elements and maps it for writing.
    pub fn create(path: impl AsRef<Path>, capacity: usize) -> Result<Self> {
        let path = path.as_ref();
        let header = header_bytes(capacity as u64)?;
        let total = capacity
            .checked_mul(ELEMENT_SIZE)
            .and_then(|bytes| bytes.checked_add(header.len()))
            .ok_or(Error::InvalidConfig("token capacity is too large"))?;

        create_parent(path)?;
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        file.write_all(&header)?;
        file.set_len(total as u64)?;

        // SAFETY: the file was just created by this writer and stays owned by
        // it for the lifetime of the mapping.
        let mmap = unsafe { MmapMut::map_mut(&file)? };
        debug!(
            "allocated token array {} with capacity {}",
            path.display(),
            capacity
        );

        Ok(Self {
            path: path.to_path_buf(),
            file,
            mmap,
            data_offset: header.len(),
            capacity,
            len: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of valid elements written so far.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len == self.capacity
    }

    /// Writes `id` into the next free slot. Returns `false`, writing nothing,
    /// once the array is full.
    pub fn push(&mut self, id: TokenId) -> bool {
        if self.is_full() {
            return false;
        }
        debug_assert!(id <= i32::MAX as u32);
        let start = self.data_offset + self.len * ELEMENT_SIZE;
        self.mmap[start..start + ELEMENT_SIZE].copy_from_slice(&id.to_le_bytes());
        self.len += 1;
        true
    }

    /// Flushes the array and makes its declared length equal the written
    /// length. When the array is short of capacity the valid prefix is
    /// rewritten into a new file which then replaces the original.
    pub fn finish(self) -> Result<FinishedArray> {
        let TokenArrayWriter {
            path,
            file,
            mmap,
            data_offset,
            capacity,
            len,
        } = self;

        mmap.flush()?;

        if len == capacity {
            drop(mmap);
            file.sync_all()?;
            return Ok(FinishedArray {
                path,
                len,
                capacity,
                truncated: false,
            });
        }

        let tmp_path = path.with_extension("npy.tmp");
        let valid = decode_ids(&mmap[data_offset..data_offset + len * ELEMENT_SIZE]);
        if let Err(err) = write_ids(&tmp_path, len, valid) {
            let _ = fs::remove_file(&tmp_path);
            return Err(err);
        }
        drop(mmap);
        drop(file);
        fs::rename(&tmp_path, &path)?;
        info!(
            "rewrote {} with {} of {} allocated elements",
            path.display(),
            len,
            capacity
        );

        Ok(FinishedArray {
            path,
            len,
            capacity,
            truncated: true,
        })
    }
}

/// Outcome of [`TokenArrayWriter::finish`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinishedArray {
    pub path: PathBuf,
    pub len: usize,
    pub capacity: usize,
    /// The persisted array was shrunk below its allocated capacity.
    pub truncated: bool,
}

/// Read-only memory-mapped token array.
pub struct TokenArray {
    path: PathBuf,
    mmap: Mmap,
    data_offset: usize,
    len: usize,
}

impl TokenArray {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        ensure_file(path, "token array")?;
        let file = File::open(path)?;

        // SAFETY: the mapping is read-only; the pipeline never modifies a
        // token array while another stage reads it.
        let mmap = unsafe { Mmap::map(&file)? };

        let mut cursor = Cursor::new(&mmap[..]);
        let header = NpyHeader::from_reader(&mut cursor)
            .map_err(|err| format_error(path, err.to_string()))?;
        let data_offset = cursor.position() as usize;

        let expected_dtype = token_dtype()?;
        if header.dtype() != expected_dtype {
            return Err(format_error(
                path,
                format!(
                    "expected dtype {}, found {}",
                    expected_dtype.descr(),
                    header.dtype().descr()
                ),
            ));
        }
        let len = match header.shape() {
            [len] => usize::try_from(*len)
                .map_err(|_| format_error(path, "declared shape overflows"))?,
            shape => {
                return Err(format_error(
                    path,
                    format!("expected a 1-D array, found shape {shape:?}"),
                ))
            }
        };

        let expected = len
            .checked_mul(ELEMENT_SIZE)
            .and_then(|bytes| bytes.checked_add(data_offset))
            .ok_or_else(|| format_error(path, "declared shape overflows"))?;
        if mmap.len() != expected {
            return Err(format_error(
                path,
                format!(
                    "header declares {} elements ({} bytes) but file holds {} bytes",
                    len,
                    expected,
                    mmap.len()
                ),
            ));
        }

        Ok(Self {
            path: path.to_path_buf(),
            mmap,
            data_offset,
            len,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn get(&self, index: usize) -> Option<TokenId> {
        if index >= self.len {
            return None;
        }
        let start = self.data_offset + index * ELEMENT_SIZE;
        let bytes: [u8; ELEMENT_SIZE] = self.mmap[start..start + ELEMENT_SIZE].try_into().ok()?;
        Some(TokenId::from_le_bytes(bytes))
    }

    pub fn iter(&self) -> impl Iterator<Item = TokenId> + '_ {
        self.range(0..self.len)
    }

    pub fn to_vec(&self) -> Vec<TokenId> {
        self.iter().collect()
    }

    /// Ids in `range`, which must lie within the array.
    pub(crate) fn range(&self, range: Range<usize>) -> impl Iterator<Item = TokenId> + '_ {
        let start = self.data_offset + range.start * ELEMENT_SIZE;
        let end = self.data_offset + range.end * ELEMENT_SIZE;
        decode_ids(&self.mmap[start..end])
    }
}
