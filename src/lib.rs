//! # zipfile
//!
//! Read entries of a ZIP archive synchronously or on a background pool.
//!
//! An archive is opened once; its entry names are listed at open time and
//! cached. Entry contents are read either on the calling thread with
//! [`ZipFile::read_file_sync`], or with [`ZipFile::read_file`], which queues
//! the read on the [`Host`]'s worker pool and hands the bytes to a callback
//! on the host's thread.
//!
//! The codec handle behind an archive keeps cursor state and is not safe to
//! share between threads, so every background read opens a private handle
//! on the archive path. An archive stays alive while reads are outstanding,
//! and [`Host::run`] returns once the last of them has been delivered.
//!
//! ## Features
//!
//! - STORED and DEFLATE entries, CRC-32 verified
//! - Exact name lookup with an ASCII case-insensitive fallback
//! - Archives with a stored entry name over [`MAX_NAME_LEN`] bytes are
//!   rejected as a whole
//!
//! ## Example
//!
//! ```no_run
//! use zipfile::Host;
//!
//! fn main() -> anyhow::Result<()> {
//!     let host = Host::new()?;
//!     let archive = host.open("archive.zip")?;
//!
//!     println!("{} entries", archive.count());
//!     let first = archive.read_file_sync(&archive.names()[0])?;
//!     println!("first entry is {} bytes", first.len());
//!
//!     archive.read_file("docs/readme.txt", |result| match result {
//!         Ok(bytes) => println!("readme is {} bytes", bytes.len()),
//!         Err(e) => eprintln!("{e}"),
//!     })?;
//!     host.run()?;
//!
//!     archive.destroy();
//!     Ok(())
//! }
//! ```

pub mod archive;
pub mod cli;
pub mod codec;
pub mod error;
pub mod host;
pub mod io;
pub mod lifecycle;

pub use archive::{EntryDirectory, MAX_NAME_LEN, ZipFile};
pub use cli::Cli;
pub use error::{Error, FatalError, Result};
pub use host::{Host, HostConfig};
pub use io::{LocalFileReader, ReadAt};
