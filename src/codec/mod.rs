//! ZIP codec binding.
//!
//! [`Unzip`] is a cursor-style archive reader: position on an entry with
//! [`go_to_first`](Unzip::go_to_first)/[`go_to_next`](Unzip::go_to_next) or
//! [`locate`](Unzip::locate), then [`open_current`](Unzip::open_current),
//! [`read_current`](Unzip::read_current) and
//! [`close_current`](Unzip::close_current).
//!
//! A handle carries a mutable cursor and an open entry stream, so it is
//! `Send` but deliberately not `Sync`: concurrent readers must each open
//! their own handle on the same path.
//!
//! ## Architecture
//!
//! - [`structures`]: Data structures representing ZIP format elements
//! - [`parser`]: Low-level parsing of ZIP structures from raw bytes
//! - `stream`: Decompression of a single entry
//!
//! ## Supported Features
//!
//! - Standard ZIP format (PKZIP APPNOTE 6.3.x compatible)
//! - STORED (no compression) method
//! - DEFLATE compression method
//!
//! ## Limitations
//!
//! - No ZIP64 support
//! - No encryption support
//! - No multi-disk archive support

mod parser;
mod stream;
mod structures;

pub use parser::{CentralDirectory, ZipParser, parse_cdfh};
pub use structures::*;

use std::cell::Cell;
use std::io;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

use crate::io::LocalFileReader;
use stream::EntryStream;

/// Failure reported by the codec, with a minizip-compatible status code.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("end of entry list")]
    EndOfList,

    #[error("i/o failure: {0}")]
    Io(#[from] io::Error),

    #[error("invalid codec call: {0}")]
    Param(&'static str),

    #[error("malformed archive: {0}")]
    BadZipFile(String),

    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("internal codec failure: {0}")]
    Internal(String),

    #[error("crc mismatch: expected {expected:08x}, got {actual:08x}")]
    Crc { expected: u32, actual: u32 },

    #[error("corrupt compressed data: {0}")]
    Data(io::Error),
}

impl CodecError {
    pub const ERRNO: i32 = -1;
    pub const DATA_ERROR: i32 = -3;
    pub const END_OF_LIST_OF_FILE: i32 = -100;
    pub const PARAM_ERROR: i32 = -102;
    pub const BAD_ZIP_FILE: i32 = -103;
    pub const INTERNAL_ERROR: i32 = -104;
    pub const CRC_ERROR: i32 = -105;

    /// Numeric status code, as reported in read and open-entry errors.
    pub fn code(&self) -> i32 {
        match self {
            CodecError::EndOfList => Self::END_OF_LIST_OF_FILE,
            CodecError::Io(_) => Self::ERRNO,
            CodecError::Param(_) => Self::PARAM_ERROR,
            CodecError::BadZipFile(_) | CodecError::Unsupported(_) => Self::BAD_ZIP_FILE,
            CodecError::Internal(_) => Self::INTERNAL_ERROR,
            CodecError::Crc { .. } => Self::CRC_ERROR,
            CodecError::Data(_) => Self::DATA_ERROR,
        }
    }

    fn malformed(err: anyhow::Error) -> Self {
        CodecError::BadZipFile(format!("{err:#}"))
    }
}

/// How [`Unzip::locate`] compares entry names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseSensitivity {
    Sensitive,
    /// ASCII case folding, as common ZIP tools do
    Insensitive,
}

impl CaseSensitivity {
    fn matches(self, candidate: &str, wanted: &str) -> bool {
        match self {
            CaseSensitivity::Sensitive => candidate == wanted,
            CaseSensitivity::Insensitive => candidate.eq_ignore_ascii_case(wanted),
        }
    }
}

/// Archive-wide metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlobalInfo {
    pub entry_count: u64,
}

struct Position {
    index: u64,
    next_offset: usize,
    entry: ZipFileEntry,
}

/// An open archive reader bound to one file.
pub struct Unzip {
    path: PathBuf,
    parser: ZipParser<LocalFileReader>,
    directory: Option<CentralDirectory>,
    current: Option<Position>,
    stream: Option<EntryStream<LocalFileReader>>,
    _not_sync: PhantomData<Cell<()>>,
}

impl Unzip {
    /// Open `path` for reading. Only the file is opened here; the central
    /// directory is loaded on first use.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let reader = Arc::new(LocalFileReader::new(&path)?);
        log::trace!("codec handle opened for {}", path.display());
        Ok(Self {
            path,
            parser: ZipParser::new(reader),
            directory: None,
            current: None,
            stream: None,
            _not_sync: PhantomData,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn directory(&mut self) -> Result<&CentralDirectory, CodecError> {
        if self.directory.is_none() {
            let directory = self
                .parser
                .read_central_directory()
                .map_err(CodecError::malformed)?;
            self.directory = Some(directory);
        }
        self.directory
            .as_ref()
            .ok_or_else(|| CodecError::Internal("central directory missing after load".into()))
    }

    pub fn global_info(&mut self) -> Result<GlobalInfo, CodecError> {
        let directory = self.directory()?;
        Ok(GlobalInfo {
            entry_count: directory.total_entries,
        })
    }

    fn seek_entry(&mut self, index: u64, offset: usize) -> Result<(), CodecError> {
        self.stream = None;
        let directory = self.directory()?;
        if index >= directory.total_entries {
            self.current = None;
            return Err(CodecError::EndOfList);
        }
        let parsed = parse_cdfh(&directory.data, offset).map_err(CodecError::malformed);
        match parsed {
            Ok((entry, next_offset)) => {
                self.current = Some(Position {
                    index,
                    next_offset,
                    entry,
                });
                Ok(())
            }
            Err(e) => {
                self.current = None;
                Err(e)
            }
        }
    }

    /// Move to the first entry. Fails with [`CodecError::EndOfList`] on an
    /// empty archive.
    pub fn go_to_first(&mut self) -> Result<(), CodecError> {
        self.seek_entry(0, 0)
    }

    /// Move to the next entry. Fails with [`CodecError::EndOfList`] once
    /// the last entry has been passed.
    pub fn go_to_next(&mut self) -> Result<(), CodecError> {
        let (index, offset) = match &self.current {
            Some(position) => (position.index + 1, position.next_offset),
            None => return Err(CodecError::Param("no current entry")),
        };
        self.seek_entry(index, offset)
    }

    pub fn current_entry(&self) -> Result<&ZipFileEntry, CodecError> {
        self.current
            .as_ref()
            .map(|position| &position.entry)
            .ok_or(CodecError::Param("no current entry"))
    }

    /// Position on the first entry named `name`.
    ///
    /// On [`CodecError::EndOfList`] the previous position is restored.
    pub fn locate(&mut self, name: &str, case: CaseSensitivity) -> Result<(), CodecError> {
        let saved = self.current.take();

        let mut status = self.go_to_first();
        while status.is_ok() {
            if case.matches(&self.current_entry()?.file_name, name) {
                return Ok(());
            }
            status = self.go_to_next();
        }

        if matches!(status, Err(CodecError::EndOfList)) {
            self.current = saved;
        }
        status
    }

    /// Open the current entry for reading.
    pub fn open_current(&mut self) -> Result<(), CodecError> {
        let entry = self.current_entry()?;
        let data_offset = self
            .parser
            .get_data_offset(entry)
            .map_err(CodecError::malformed)?;
        let stream = EntryStream::new(self.parser.reader().clone(), data_offset, entry)?;
        self.stream = Some(stream);
        Ok(())
    }

    /// Read up to `buf.len()` decompressed bytes of the open entry.
    pub fn read_current(&mut self, buf: &mut [u8]) -> Result<usize, CodecError> {
        match self.stream.as_mut() {
            Some(stream) => stream.read(buf),
            None => Err(CodecError::Param("no entry is open")),
        }
    }

    /// Close the open entry, verifying its CRC-32 if it was read to the end.
    pub fn close_current(&mut self) -> Result<(), CodecError> {
        match self.stream.take() {
            Some(stream) => stream.finish(),
            None => Err(CodecError::Param("no entry is open")),
        }
    }

    /// Release the handle and its file descriptor.
    pub fn close(self) {
        log::trace!("codec handle closed for {}", self.path.display());
    }
}

impl std::fmt::Debug for Unzip {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Unzip")
            .field("path", &self.path)
            .field("entry", &self.current.as_ref().map(|p| &p.entry.file_name))
            .field("entry_open", &self.stream.is_some())
            .finish()
    }
}
