//! Background read tasks.
//!
//! A task is split in two halves. [`ReadRequest`] is `Send` and travels to
//! the worker pool with its own [`Unzip`] handle; it comes back as a
//! [`Completion`]. [`PendingRead`] never leaves the control thread and
//! holds the callback together with the task's [`TaskGuard`].

use std::panic::{self, AssertUnwindSafe};

use crate::archive::read_entry;
use crate::codec::{CodecError, Unzip};
use crate::error::{Error, FatalError, Result};
use crate::lifecycle::TaskGuard;

pub(crate) type Callback = Box<dyn FnOnce(Result<Vec<u8>>)>;

/// Work shipped to the background pool.
pub(crate) struct ReadRequest {
    pub(crate) id: u64,
    name: String,
    unzip: Unzip,
}

/// Result shipped back to the control thread.
pub(crate) struct Completion {
    pub(crate) id: u64,
    unzip: Unzip,
    outcome: Result<Vec<u8>>,
}

impl ReadRequest {
    pub(crate) fn new(id: u64, name: &str, unzip: Unzip) -> Self {
        Self {
            id,
            name: name.to_string(),
            unzip,
        }
    }

    /// Runs on a worker thread; touches nothing but the task's own handle.
    pub(crate) fn execute(self) -> Completion {
        let ReadRequest {
            id,
            name,
            mut unzip,
        } = self;
        log::trace!("task {}: reading {}", id, name);

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| read_entry(&mut unzip, &name)))
            .unwrap_or_else(|_| {
                Err(Error::Read {
                    name: name.clone(),
                    code: CodecError::INTERNAL_ERROR,
                })
            });

        Completion { id, unzip, outcome }
    }
}

/// Control-thread half of a task.
pub(crate) struct PendingRead {
    name: String,
    callback: Callback,
    guard: TaskGuard,
}

impl PendingRead {
    pub(crate) fn new(name: &str, callback: Callback, guard: TaskGuard) -> Self {
        Self {
            name: name.to_string(),
            callback,
            guard,
        }
    }

    /// Deliver `completion` and tear the task down.
    ///
    /// The callback runs exactly once. The private handle is closed and the
    /// guard released before a callback panic is reported.
    pub(crate) fn complete(self, completion: Completion) -> std::result::Result<(), FatalError> {
        let PendingRead {
            name,
            callback,
            guard,
        } = self;
        let Completion { id, unzip, outcome } = completion;

        let delivered = panic::catch_unwind(AssertUnwindSafe(move || callback(outcome)));

        unzip.close();
        drop(guard);
        log::trace!("task {}: completed", id);

        delivered.map_err(|payload| FatalError::from_panic(name, payload))
    }
}
