use crate::codec::{CaseSensitivity, CodecError, Unzip};
use crate::error::{Error, Result};

pub(crate) fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::InvalidArgument(
            "entry name must be a non-empty string".into(),
        ));
    }
    Ok(())
}

/// Position `unzip` on `name`, preferring an exact match over a
/// case-insensitive one.
fn locate(unzip: &mut Unzip, name: &str) -> Result<()> {
    let located = match unzip.locate(name, CaseSensitivity::Sensitive) {
        Err(CodecError::EndOfList) => unzip.locate(name, CaseSensitivity::Insensitive),
        other => other,
    };
    match located {
        Ok(()) => Ok(()),
        Err(CodecError::EndOfList) => Err(Error::EntryNotFound {
            name: name.to_string(),
        }),
        Err(e) => Err(Error::Directory {
            path: unzip.path().to_path_buf(),
            reason: e.to_string(),
        }),
    }
}

/// Decoded bytes are staged through a buffer of this size.
const READ_CHUNK: usize = 64 * 1024;

/// Reserve room for `size` bytes without touching it.
fn allocate(name: &str, size: u64) -> Result<(Vec<u8>, usize)> {
    let allocation_error = || Error::Allocation {
        name: name.to_string(),
        size,
    };
    let len = usize::try_from(size).map_err(|_| allocation_error())?;
    let mut buf = Vec::new();
    buf.try_reserve_exact(len).map_err(|_| allocation_error())?;
    Ok((buf, len))
}

/// Decode the open entry into `buf` until it holds `len` bytes or the
/// entry runs dry.
fn fill(unzip: &mut Unzip, buf: &mut Vec<u8>, len: usize) -> std::result::Result<(), CodecError> {
    let mut chunk = vec![0u8; READ_CHUNK.min(len)];
    while buf.len() < len {
        let want = chunk.len().min(len - buf.len());
        let n = unzip.read_current(&mut chunk[..want])?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    Ok(())
}

/// Read the whole decompressed contents of `name` through `unzip`.
///
/// The entry is closed before returning on every path that opened it.
pub(crate) fn read_entry(unzip: &mut Unzip, name: &str) -> Result<Vec<u8>> {
    locate(unzip, name)?;

    unzip.open_current().map_err(|e| {
        log::debug!("open of {} failed: {}", name, e);
        Error::OpenEntry {
            name: name.to_string(),
            code: e.code(),
        }
    })?;

    let size = match unzip.current_entry() {
        Ok(entry) => entry.uncompressed_size,
        Err(e) => {
            let _ = unzip.close_current();
            return Err(Error::OpenEntry {
                name: name.to_string(),
                code: e.code(),
            });
        }
    };

    let (mut buf, len) = match allocate(name, size) {
        Ok(reserved) => reserved,
        Err(e) => {
            let _ = unzip.close_current();
            return Err(e);
        }
    };

    let read = fill(unzip, &mut buf, len);
    let closed = unzip.close_current();

    let read_error = |e: CodecError| {
        log::debug!("read of {} failed: {}", name, e);
        Error::Read {
            name: name.to_string(),
            code: e.code(),
        }
    };
    read.map_err(read_error)?;
    closed.map_err(read_error)?;

    if buf.len() != len {
        return Err(Error::Read {
            name: name.to_string(),
            code: CodecError::BAD_ZIP_FILE,
        });
    }
    Ok(buf)
}
