use std::fs::File;
use std::io::{self, ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::vec;

use log::{debug, info};
use thiserror::Error;
use walkdir::WalkDir;

use crate::errors::{ensure_file, Error, Result};

/// One raw transcription: its bytes and the file it came from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Record {
    pub source: PathBuf,
    pub content: Vec<u8>,
}

impl Record {
    pub fn new(source: impl Into<PathBuf>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            source: source.into(),
            content: content.into(),
        }
    }
}

/// A record that could not be read from disk.
#[derive(Error, Debug)]
#[error("failed to read record {}: {error}", source_path.display())]
pub struct RecordError {
    pub source_path: PathBuf,
    #[source]
    pub error: io::Error,
}

pub type RecordResult = std::result::Result<Record, RecordError>;

/// Directory of transcription files, enumerated recursively in sorted path order.
#[derive(Clone, Debug)]
pub struct RecordDirectory {
    root: PathBuf,
    extension: String,
}

impl RecordDirectory {
    pub fn new(root: impl Into<PathBuf>, extension: impl Into<String>) -> Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(Error::MissingArtifact {
                what: "records directory",
                path: root,
            });
        }
        let extension = extension.into().trim_start_matches('.').to_string();
        if extension.is_empty() {
            return Err(Error::InvalidConfig("record extension must not be empty"));
        }
        Ok(Self { root, extension })
    }

    /// Every matching file below the root, sorted by path. Paths compare
    /// component by component, so `b/nested/z.abc` comes before `b/x.abc`.
    pub fn paths(&self) -> Result<Vec<PathBuf>> {
        let mut paths = Vec::new();
        for entry in WalkDir::new(&self.root).follow_links(true) {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let matches = entry
                .path()
                .extension()
                .and_then(|ext| ext.to_str())
                .map_or(false, |ext| ext == self.extension);
            if matches {
                paths.push(entry.into_path());
            }
        }
        paths.sort();
        Ok(paths)
    }

    pub fn stream(&self) -> Result<RecordStream> {
        let paths = self.paths()?;
        info!(
            "found {} .{} files in {}",
            paths.len(),
            self.extension,
            self.root.display()
        );
        Ok(RecordStream {
            total: paths.len(),
            paths: paths.into_iter(),
        })
    }
}

/// Lazily reads one record per file.
pub struct RecordStream {
    total: usize,
    paths: vec::IntoIter<PathBuf>,
}

impl RecordStream {
    pub fn total(&self) -> usize {
        self.total
    }
}

impl Iterator for RecordStream {
    type Item = RecordResult;

    fn next(&mut self) -> Option<Self::Item> {
        let path = self.paths.next()?;
        Some(match std::fs::read(&path) {
            Ok(content) => Ok(Record {
                source: path,
                content,
            }),
            Err(error) => Err(RecordError {
                source_path: path,
                error,
            }),
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.paths.size_hint()
    }
}

/// Bounded-size text chunks read from a corpus file.
///
/// Each chunk comes from at most `chunk_size` freshly read bytes plus the few
/// bytes of a UTF-8 sequence left incomplete by the previous read, so a chunk
/// boundary never splits a character. Invalid byte sequences are dropped and
/// counted. The iterator is single-use: every stage that needs the corpus
/// opens its own.
pub struct CorpusChunks {
    file: File,
    path: PathBuf,
    chunk_size: usize,
    carry: Vec<u8>,
    bytes_read: u64,
    invalid_bytes: u64,
    finished: bool,
}

impl CorpusChunks {
    pub fn open(path: impl AsRef<Path>, chunk_size: usize) -> Result<Self> {
        let path = path.as_ref();
        if chunk_size == 0 {
            return Err(Error::InvalidConfig("chunk size must be greater than zero"));
        }
        ensure_file(path, "corpus file")?;
        let file = File::open(path)?;
        debug!(
            "streaming {} in chunks of {} bytes",
            path.display(),
            chunk_size
        );
        Ok(Self {
            file,
            path: path.to_path_buf(),
            chunk_size,
            carry: Vec::new(),
            bytes_read: 0,
            invalid_bytes: 0,
            finished: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    /// Bytes dropped so far because they were not valid UTF-8.
    pub fn invalid_bytes(&self) -> u64 {
        self.invalid_bytes
    }
}

impl Iterator for CorpusChunks {
    type Item = io::Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.finished {
            let mut bytes = std::mem::take(&mut self.carry);
            let offset = bytes.len();
            bytes.resize(offset + self.chunk_size, 0);

            let read = match self.file.read(&mut bytes[offset..]) {
                Ok(read) => read,
                Err(err) if err.kind() == ErrorKind::Interrupted => {
                    bytes.truncate(offset);
                    self.carry = bytes;
                    continue;
                }
                Err(err) => {
                    self.finished = true;
                    return Some(Err(err));
                }
            };
            bytes.truncate(offset + read);
            self.bytes_read += read as u64;

            let at_eof = read == 0;
            if at_eof {
                self.finished = true;
            }

            let decoded = decode_utf8_dropping_invalid(&bytes, at_eof);
            self.invalid_bytes += decoded.dropped as u64;
            self.carry = bytes[decoded.consumed..].to_vec();

            if !decoded.text.is_empty() {
                return Some(Ok(decoded.text));
            }
        }
        None
    }
}

pub(crate) struct Decoded {
    pub text: String,
    pub dropped: usize,
    pub consumed: usize,
}

/// Decodes `bytes`, skipping invalid sequences. Unless `final_chunk` is set, an
/// incomplete sequence at the very end is left unconsumed for the next read.
pub(crate) fn decode_utf8_dropping_invalid(bytes: &[u8], final_chunk: bool) -> Decoded {
    let mut text = String::with_capacity(bytes.len());
    let mut dropped = 0;
    let mut consumed = 0;

    while consumed < bytes.len() {
        let rest = &bytes[consumed..];
        match std::str::from_utf8(rest) {
            Ok(valid) => {
                text.push_str(valid);
                consumed = bytes.len();
            }
            Err(err) => {
                let valid_up_to = err.valid_up_to();
                if let Ok(valid) = std::str::from_utf8(&rest[..valid_up_to]) {
                    text.push_str(valid);
                }
                match err.error_len() {
                    Some(len) => {
                        dropped += len;
                        consumed += valid_up_to + len;
                    }
                    None if final_chunk => {
                        dropped += rest.len() - valid_up_to;
                        consumed = bytes.len();
                    }
                    None => {
                        consumed += valid_up_to;
                        break;
                    }
                }
            }
        }
    }

    Decoded {
        text,
        dropped,
        consumed,
    }
}
