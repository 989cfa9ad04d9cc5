//! The archive handle.
//!
//! [`ZipFile`] owns one codec handle and the cached [`EntryDirectory`].
//! Synchronous reads go through that handle. Background reads never touch
//! it: each one opens a private handle on the same path, because the codec
//! keeps cursor state that cannot be shared across threads.

mod directory;
mod read;

pub use directory::{EntryDirectory, MAX_NAME_LEN};
pub(crate) use read::read_entry;

use std::cell::{Cell, RefCell};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::codec::Unzip;
use crate::error::{Error, Result};
use crate::host::{Host, PendingRead, ReadRequest, Shared};
use crate::lifecycle::TaskGuard;
use read::validate_name;

/// State kept alive by the [`ZipFile`] and by every read it has in flight.
pub(crate) struct ArchiveInner {
    path: PathBuf,
    /// `None` once destroyed
    codec: RefCell<Option<Unzip>>,
    directory: EntryDirectory,
    outstanding: Cell<usize>,
}

impl ArchiveInner {
    pub(crate) fn retain_task(&self) {
        self.outstanding.set(self.outstanding.get() + 1);
    }

    pub(crate) fn release_task(&self) {
        let outstanding = self.outstanding.get();
        debug_assert!(outstanding > 0, "archive task released twice");
        self.outstanding.set(outstanding.saturating_sub(1));
    }

    fn is_destroyed(&self) -> bool {
        self.codec.borrow().is_none()
    }
}

impl Drop for ArchiveInner {
    fn drop(&mut self) {
        if let Some(unzip) = self.codec.get_mut().take() {
            log::debug!("{}: released", self.path.display());
            unzip.close();
        }
    }
}

/// An open ZIP archive.
///
/// Created by [`Host::open`]. All methods must be called on the host's
/// thread; completion callbacks of [`read_file`](ZipFile::read_file) run
/// there too, from [`Host::run`].
pub struct ZipFile {
    inner: Rc<ArchiveInner>,
    host: Rc<Shared>,
}

impl ZipFile {
    pub fn open(host: &Host, path: impl AsRef<Path>) -> Result<Self> {
        host.open(path)
    }

    pub(crate) fn open_in(host: Rc<Shared>, path: &Path) -> Result<Self> {
        let mut unzip = Unzip::open(path).map_err(|source| Error::Open {
            path: path.to_path_buf(),
            source,
        })?;
        // On error `unzip` is dropped here, closing the file.
        let directory = EntryDirectory::build(&mut unzip)?;
        log::debug!("{}: opened", path.display());

        Ok(Self {
            inner: Rc::new(ArchiveInner {
                path: path.to_path_buf(),
                codec: RefCell::new(Some(unzip)),
                directory,
                outstanding: Cell::new(0),
            }),
            host,
        })
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Number of entries, fixed at open time.
    pub fn count(&self) -> usize {
        self.inner.directory.len()
    }

    /// Entry names in central directory order.
    pub fn names(&self) -> &[String] {
        self.inner.directory.names()
    }

    pub fn directory(&self) -> &EntryDirectory {
        &self.inner.directory
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.is_destroyed()
    }

    /// Background reads scheduled on this archive and not yet delivered.
    pub fn pending_reads(&self) -> usize {
        self.inner.outstanding.get()
    }

    /// Read the whole decompressed contents of entry `name`.
    ///
    /// An exact name match wins; otherwise names are compared ignoring
    /// ASCII case.
    pub fn read_file_sync(&self, name: &str) -> Result<Vec<u8>> {
        validate_name(name)?;
        let mut codec = self.inner.codec.borrow_mut();
        let unzip = codec.as_mut().ok_or(Error::UseAfterDestroy)?;
        read_entry(unzip, name)
    }

    /// Read entry `name` on the background pool.
    ///
    /// Returns once the read is queued. `callback` receives the contents or
    /// the error during a later [`Host::run`]. An empty name, a destroyed
    /// archive, or a failure to open the private handle are reported here
    /// instead and `callback` is never called.
    pub fn read_file<F>(&self, name: &str, callback: F) -> Result<()>
    where
        F: FnOnce(Result<Vec<u8>>) + 'static,
    {
        validate_name(name)?;
        if self.inner.is_destroyed() {
            return Err(Error::UseAfterDestroy);
        }

        let unzip = Unzip::open(&self.inner.path).map_err(|source| Error::Open {
            path: self.inner.path.clone(),
            source,
        })?;

        let request = ReadRequest::new(self.host.next_task_id(), name, unzip);
        let guard = TaskGuard::new(&self.inner, self.host.keepalive());
        self.host
            .submit(request, PendingRead::new(name, Box::new(callback), guard));
        Ok(())
    }

    /// Close the archive's codec handle. Calling it again does nothing.
    ///
    /// Reads already scheduled keep their own handles and complete normally.
    pub fn destroy(&self) {
        if let Some(unzip) = self.inner.codec.borrow_mut().take() {
            log::debug!(
                "{}: destroyed with {} reads outstanding",
                self.inner.path.display(),
                self.pending_reads()
            );
            unzip.close();
        }
    }
}

impl std::fmt::Debug for ZipFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZipFile")
            .field("path", &self.inner.path)
            .field("count", &self.count())
            .field("destroyed", &self.is_destroyed())
            .field("pending_reads", &self.pending_reads())
            .finish()
    }
}
