use crate::codec::{CodecError, Unzip};
use crate::error::{Error, Result};

/// Maximum stored entry name length, terminator included.
pub const MAX_NAME_LEN: usize = 1024;

/// Entry names of an archive in central directory order.
///
/// Built once when the archive is opened and never modified afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryDirectory {
    names: Vec<String>,
}

impl EntryDirectory {
    /// Walk the whole central directory of `unzip`.
    ///
    /// Any name longer than [`MAX_NAME_LEN`] allows rejects the archive.
    pub(crate) fn build(unzip: &mut Unzip) -> Result<Self> {
        let info = unzip
            .global_info()
            .map_err(|e| directory_error(unzip, &e))?;

        // Capacity is only a hint; a hostile count must not drive allocation.
        let mut names = Vec::with_capacity(info.entry_count.min(4096) as usize);
        if info.entry_count > 0 {
            let mut status = unzip.go_to_first();
            while status.is_ok() {
                let entry = unzip
                    .current_entry()
                    .map_err(|e| directory_error(unzip, &e))?;
                if entry.raw_name.len() >= MAX_NAME_LEN {
                    let truncated = &entry.raw_name[..MAX_NAME_LEN - 1];
                    return Err(Error::NameTooLong {
                        name: String::from_utf8_lossy(truncated).into_owned(),
                    });
                }
                names.push(entry.file_name.clone());
                status = unzip.go_to_next();
            }
            if let Err(e) = status
                && !matches!(e, CodecError::EndOfList)
            {
                return Err(directory_error(unzip, &e));
            }
        }

        log::debug!(
            "{}: {} entries in central directory",
            unzip.path().display(),
            names.len()
        );
        Ok(Self { names })
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.names.iter()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }
}

impl<'a> IntoIterator for &'a EntryDirectory {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

fn directory_error(unzip: &Unzip, err: &CodecError) -> Error {
    Error::Directory {
        path: unzip.path().to_path_buf(),
        reason: err.to_string(),
    }
}
