//! Decompressing reader over a single entry's data.

use flate2::read::DeflateDecoder;
use std::io::{self, Read};
use std::sync::Arc;

use crate::io::ReadAt;

use super::CodecError;
use super::structures::{CompressionMethod, ZipFileEntry};

/// A bounded window of the archive, read positionally.
pub(crate) struct SectionReader<R> {
    reader: Arc<R>,
    offset: u64,
    remaining: u64,
}

impl<R: ReadAt> SectionReader<R> {
    pub(crate) fn new(reader: Arc<R>, offset: u64, len: u64) -> Self {
        Self {
            reader,
            offset,
            remaining: len,
        }
    }
}

impl<R: ReadAt> Read for SectionReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.remaining == 0 || buf.is_empty() {
            return Ok(0);
        }
        let want = buf.len().min(usize::try_from(self.remaining).unwrap_or(usize::MAX));
        let n = self.reader.read_at(self.offset, &mut buf[..want])?;
        self.offset += n as u64;
        self.remaining -= n as u64;
        Ok(n)
    }
}

enum Decoder<R: ReadAt> {
    Stored(SectionReader<R>),
    Deflated(DeflateDecoder<SectionReader<R>>),
}

impl<R: ReadAt> Decoder<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Decoder::Stored(r) => r.read(buf),
            Decoder::Deflated(r) => r.read(buf),
        }
    }
}

/// The currently open entry of an [`Unzip`](super::Unzip) handle.
pub(crate) struct EntryStream<R: ReadAt> {
    decoder: Decoder<R>,
    hasher: crc32fast::Hasher,
    expected_crc: u32,
    /// Uncompressed bytes still owed by the entry
    remaining: u64,
}

impl<R: ReadAt> EntryStream<R> {
    pub(crate) fn new(
        reader: Arc<R>,
        data_offset: u64,
        entry: &ZipFileEntry,
    ) -> Result<Self, CodecError> {
        if entry.is_encrypted() {
            return Err(CodecError::Unsupported(format!(
                "{} is encrypted",
                entry.file_name
            )));
        }

        let section = SectionReader::new(reader, data_offset, entry.compressed_size);
        let decoder = match entry.compression_method {
            CompressionMethod::Stored => {
                if entry.compressed_size != entry.uncompressed_size {
                    return Err(CodecError::BadZipFile(format!(
                        "stored entry {} declares {} compressed but {} uncompressed bytes",
                        entry.file_name, entry.compressed_size, entry.uncompressed_size
                    )));
                }
                Decoder::Stored(section)
            }
            CompressionMethod::Deflate => Decoder::Deflated(DeflateDecoder::new(section)),
            CompressionMethod::Unknown(method) => {
                return Err(CodecError::Unsupported(format!(
                    "compression method {} used by {}",
                    method, entry.file_name
                )));
            }
        };

        Ok(Self {
            decoder,
            hasher: crc32fast::Hasher::new(),
            expected_crc: entry.crc32,
            remaining: entry.uncompressed_size,
        })
    }

    /// Fill `buf` with up to `remaining` bytes.
    ///
    /// Returns the number of bytes produced, which is
    /// `min(buf.len(), remaining)` unless the data ends early, in which
    /// case an error is returned instead of a short count.
    pub(crate) fn read(&mut self, buf: &mut [u8]) -> Result<usize, CodecError> {
        let want = buf.len().min(usize::try_from(self.remaining).unwrap_or(usize::MAX));
        let mut filled = 0;
        while filled < want {
            match self.decoder.read(&mut buf[filled..want]) {
                Ok(0) => {
                    return Err(CodecError::BadZipFile(format!(
                        "entry data ended after {} of {} bytes",
                        filled, want
                    )));
                }
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) if e.kind() == io::ErrorKind::InvalidInput
                    || e.kind() == io::ErrorKind::InvalidData =>
                {
                    return Err(CodecError::Data(e));
                }
                Err(e) => return Err(CodecError::Io(e)),
            }
        }
        self.hasher.update(&buf[..filled]);
        self.remaining -= filled as u64;
        Ok(filled)
    }

    /// Finish the entry, verifying the checksum when it was fully read.
    pub(crate) fn finish(self) -> Result<(), CodecError> {
        if self.remaining != 0 {
            return Ok(());
        }
        let actual = self.hasher.finalize();
        if actual != self.expected_crc {
            return Err(CodecError::Crc {
                expected: self.expected_crc,
                actual,
            });
        }
        Ok(())
    }
}
