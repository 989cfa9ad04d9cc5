//! Shared test utilities for integration tests.
//!
//! `#![allow(dead_code)]` is required because each integration test file
//! compiles as a separate crate and only uses a subset of these helpers.

#![allow(dead_code)]

use std::io::Write;
use std::path::{Path, PathBuf};

use flate2::Compression;
use flate2::write::DeflateEncoder;

const METHOD_STORED: u16 = 0;
const METHOD_DEFLATE: u16 = 8;
/// 1980-01-01 in DOS date format
const DOS_DATE: u16 = 0x0021;

struct FixtureEntry {
    name: Vec<u8>,
    method: u16,
    crc32: u32,
    uncompressed_size: u32,
    data: Vec<u8>,
}

/// Assembles ZIP archives byte by byte.
#[derive(Default)]
pub struct ZipBuilder {
    entries: Vec<FixtureEntry>,
    comment: Vec<u8>,
}

impl ZipBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stored(mut self, name: &str, data: &[u8]) -> Self {
        self.entries.push(FixtureEntry {
            name: name.as_bytes().to_vec(),
            method: METHOD_STORED,
            crc32: crc32fast::hash(data),
            uncompressed_size: data.len() as u32,
            data: data.to_vec(),
        });
        self
    }

    pub fn deflated(mut self, name: &str, data: &[u8]) -> Self {
        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        let compressed = encoder.finish().unwrap();
        self.entries.push(FixtureEntry {
            name: name.as_bytes().to_vec(),
            method: METHOD_DEFLATE,
            crc32: crc32fast::hash(data),
            uncompressed_size: data.len() as u32,
            data: compressed,
        });
        self
    }

    /// An entry whose payload is written as-is under an arbitrary method code.
    pub fn raw(mut self, name: &str, method: u16, data: &[u8]) -> Self {
        self.entries.push(FixtureEntry {
            name: name.as_bytes().to_vec(),
            method,
            crc32: crc32fast::hash(data),
            uncompressed_size: data.len() as u32,
            data: data.to_vec(),
        });
        self
    }

    /// Overwrite the checksum recorded for the most recently added entry.
    pub fn with_crc(mut self, crc32: u32) -> Self {
        if let Some(entry) = self.entries.last_mut() {
            entry.crc32 = crc32;
        }
        self
    }

    /// Overwrite the uncompressed size recorded for the most recently added
    /// entry, leaving its data untouched.
    pub fn declared_size(mut self, size: u32) -> Self {
        if let Some(entry) = self.entries.last_mut() {
            entry.uncompressed_size = size;
        }
        self
    }

    pub fn comment(mut self, comment: &str) -> Self {
        self.comment = comment.as_bytes().to_vec();
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut out = Vec::new();
        let mut offsets = Vec::with_capacity(self.entries.len());

        for entry in &self.entries {
            offsets.push(out.len() as u32);
            out.extend_from_slice(b"PK\x03\x04");
            put_u16(&mut out, 20);
            put_u16(&mut out, 0);
            put_u16(&mut out, entry.method);
            put_u16(&mut out, 0);
            put_u16(&mut out, DOS_DATE);
            put_u32(&mut out, entry.crc32);
            put_u32(&mut out, entry.data.len() as u32);
            put_u32(&mut out, entry.uncompressed_size);
            put_u16(&mut out, entry.name.len() as u16);
            put_u16(&mut out, 0);
            out.extend_from_slice(&entry.name);
            out.extend_from_slice(&entry.data);
        }

        let cd_offset = out.len() as u32;
        for (entry, offset) in self.entries.iter().zip(&offsets) {
            out.extend_from_slice(b"PK\x01\x02");
            put_u16(&mut out, 20);
            put_u16(&mut out, 20);
            put_u16(&mut out, 0);
            put_u16(&mut out, entry.method);
            put_u16(&mut out, 0);
            put_u16(&mut out, DOS_DATE);
            put_u32(&mut out, entry.crc32);
            put_u32(&mut out, entry.data.len() as u32);
            put_u32(&mut out, entry.uncompressed_size);
            put_u16(&mut out, entry.name.len() as u16);
            put_u16(&mut out, 0);
            put_u16(&mut out, 0);
            put_u16(&mut out, 0);
            put_u16(&mut out, 0);
            put_u32(&mut out, 0);
            put_u32(&mut out, *offset);
            out.extend_from_slice(&entry.name);
        }
        let cd_size = out.len() as u32 - cd_offset;

        out.extend_from_slice(b"PK\x05\x06");
        put_u16(&mut out, 0);
        put_u16(&mut out, 0);
        put_u16(&mut out, self.entries.len() as u16);
        put_u16(&mut out, self.entries.len() as u16);
        put_u32(&mut out, cd_size);
        put_u32(&mut out, cd_offset);
        put_u16(&mut out, self.comment.len() as u16);
        out.extend_from_slice(&self.comment);
        out
    }

    pub fn write(&self, dir: &Path, file_name: &str) -> PathBuf {
        write_bytes(dir, file_name, &self.build())
    }
}

pub fn write_bytes(dir: &Path, file_name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.join(file_name);
    std::fs::write(&path, bytes).unwrap();
    path
}

/// Deterministic, poorly compressible content distinct per `seed`.
pub fn patterned(seed: u32, len: usize) -> Vec<u8> {
    let mut state = seed.wrapping_mul(2654435761).wrapping_add(1);
    (0..len)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            state as u8
        })
        .collect()
}

fn put_u16(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn put_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_le_bytes());
}
