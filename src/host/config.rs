/// Environment variable overriding the background pool size.
pub const THREADPOOL_SIZE_ENV: &str = "ZIPFILE_THREADPOOL_SIZE";

const DEFAULT_WORKER_THREADS: usize = 4;
const MAX_WORKER_THREADS: usize = 1024;

/// Settings for a [`Host`](super::Host), set through the builder methods.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostConfig {
    /// Upper bound on concurrently running background reads
    pub(crate) worker_threads: usize,
    /// Name given to background threads
    pub(crate) thread_name: String,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            worker_threads: DEFAULT_WORKER_THREADS,
            thread_name: "zipfile-worker".to_string(),
        }
    }
}

impl HostConfig {
    /// Defaults, with the pool size taken from `ZIPFILE_THREADPOOL_SIZE`
    /// when it holds a usable number.
    pub fn from_env() -> Self {
        let config = Self::default();
        match std::env::var(THREADPOOL_SIZE_ENV) {
            Ok(value) => match parse_pool_size(&value) {
                Some(threads) => config.worker_threads(threads),
                None => {
                    log::warn!("ignoring {}={:?}", THREADPOOL_SIZE_ENV, value);
                    config
                }
            },
            Err(_) => config,
        }
    }

    pub fn worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = threads.clamp(1, MAX_WORKER_THREADS);
        self
    }

    pub fn thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    /// Pool size handed to the runtime, always within `1..=1024`.
    pub(crate) fn pool_size(&self) -> usize {
        self.worker_threads.clamp(1, MAX_WORKER_THREADS)
    }
}

fn parse_pool_size(value: &str) -> Option<usize> {
    value
        .trim()
        .parse::<usize>()
        .ok()
        .filter(|&n| n > 0)
        .map(|n| n.min(MAX_WORKER_THREADS))
}
