//! The control thread and its background pool.
//!
//! A [`Host`] is created once at startup on the thread that will drive all
//! archive calls. Background reads run on a pool owned by the host; their
//! results queue up until [`Host::run`] or [`Host::run_once`] delivers them
//! to their callbacks on the control thread.
//!
//! ```no_run
//! use zipfile::Host;
//!
//! fn main() -> anyhow::Result<()> {
//!     let host = Host::new()?;
//!     let archive = host.open("bundle.zip")?;
//!     for name in archive.names() {
//!         let name_owned = name.clone();
//!         archive.read_file(name, move |result| match result {
//!             Ok(bytes) => println!("{}: {} bytes", name_owned, bytes.len()),
//!             Err(e) => eprintln!("{}: {}", name_owned, e),
//!         })?;
//!     }
//!     host.run()?;
//!     Ok(())
//! }
//! ```

mod config;
mod task;

pub use config::{HostConfig, THREADPOOL_SIZE_ENV};
pub(crate) use task::{PendingRead, ReadRequest};

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::io;
use std::path::Path;
use std::rc::Rc;

use tokio::runtime::{Builder, Runtime};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

use crate::archive::ZipFile;
use crate::error::{FatalError, Result};
use crate::lifecycle::Keepalive;
use task::Completion;

/// State shared between the host and the archives it opened.
pub(crate) struct Shared {
    runtime: Runtime,
    sender: UnboundedSender<Completion>,
    receiver: RefCell<UnboundedReceiver<Completion>>,
    pending: RefCell<HashMap<u64, PendingRead>>,
    next_id: Cell<u64>,
    keepalive: Keepalive,
}

impl Shared {
    pub(crate) fn keepalive(&self) -> &Keepalive {
        &self.keepalive
    }

    pub(crate) fn next_task_id(&self) -> u64 {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        id
    }

    /// Queue `request` on the pool; `pending` waits here for its completion.
    pub(crate) fn submit(&self, request: ReadRequest, pending: PendingRead) {
        let id = request.id;
        self.pending.borrow_mut().insert(id, pending);

        let sender = self.sender.clone();
        self.runtime.spawn_blocking(move || {
            let completion = request.execute();
            if sender.send(completion).is_err() {
                log::debug!("task {}: host gone, dropping result", id);
            }
        });
        log::debug!("task {}: scheduled", id);
    }

    fn deliver(&self, completion: Completion) -> std::result::Result<(), FatalError> {
        // Released before the callback runs so it may schedule more reads.
        let pending = self.pending.borrow_mut().remove(&completion.id);
        match pending {
            Some(pending) => pending.complete(completion),
            None => {
                log::warn!("completion for unknown task {}", completion.id);
                Ok(())
            }
        }
    }
}

/// Control-thread event loop owning the background read pool.
pub struct Host {
    shared: Rc<Shared>,
}

impl Host {
    /// A host configured from the environment, see [`HostConfig::from_env`].
    pub fn new() -> io::Result<Self> {
        Self::with_config(HostConfig::from_env())
    }

    pub fn with_config(config: HostConfig) -> io::Result<Self> {
        let pool_size = config.pool_size();
        let runtime = Builder::new_multi_thread()
            .worker_threads(1)
            .max_blocking_threads(pool_size)
            .thread_name(config.thread_name.clone())
            .build()?;
        let (sender, receiver) = unbounded_channel();
        log::debug!("host started with {} background threads", pool_size);

        Ok(Self {
            shared: Rc::new(Shared {
                runtime,
                sender,
                receiver: RefCell::new(receiver),
                pending: RefCell::new(HashMap::new()),
                next_id: Cell::new(0),
                keepalive: Keepalive::new(),
            }),
        })
    }

    /// Open the archive at `path` and cache its entry names.
    pub fn open(&self, path: impl AsRef<Path>) -> Result<ZipFile> {
        ZipFile::open_in(Rc::clone(&self.shared), path.as_ref())
    }

    /// Number of background reads not yet delivered.
    pub fn pending(&self) -> usize {
        self.shared.keepalive.count()
    }

    /// Deliver completions until no background read is outstanding.
    ///
    /// Returns early with the first [`FatalError`]; reads still in flight
    /// stay pending and a later call picks them up.
    pub fn run(&self) -> std::result::Result<(), FatalError> {
        while self.run_once()? {}
        Ok(())
    }

    /// Wait for and deliver one completion.
    ///
    /// Returns `Ok(false)` without blocking when nothing is outstanding,
    /// otherwise whether work remains after this delivery.
    pub fn run_once(&self) -> std::result::Result<bool, FatalError> {
        if !self.shared.keepalive.is_alive() {
            return Ok(false);
        }

        // `Shared` keeps a sender, so the channel stays open while we wait.
        let Some(completion) = self.shared.receiver.borrow_mut().blocking_recv() else {
            return Ok(false);
        };
        self.shared.deliver(completion)?;

        Ok(self.shared.keepalive.is_alive())
    }
}

impl std::fmt::Debug for Host {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Host")
            .field("pending", &self.pending())
            .finish()
    }
}
