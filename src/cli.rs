use clap::Parser;

use crate::host::HostConfig;

#[derive(Parser, Debug)]
#[command(name = "zipfile")]
#[command(version)]
#[command(about = "Read entries of a ZIP archive", long_about = None)]
#[command(after_help = "Examples:\n  \
  zipfile -l data.zip              list entries of data.zip\n  \
  zipfile data.zip 'docs/*' | more send docs/ entries via pipe into more\n  \
  zipfile -t -a data.zip           read every entry on the worker pool")]
pub struct Cli {
    /// ZIP file path
    #[arg(value_name = "FILE")]
    pub file: String,

    /// Entries to read (default: all); `*` and `?` match patterns
    #[arg(value_name = "ENTRIES")]
    pub files: Vec<String>,

    /// List entry names
    #[arg(short = 'l')]
    pub list: bool,

    /// List with archive summary, log more detail
    #[arg(short = 'v')]
    pub verbose: bool,

    /// Test entries: read each one and report its size instead of printing it
    #[arg(short = 't')]
    pub test: bool,

    /// Read entries on the background pool
    #[arg(short = 'a', long = "async")]
    pub background: bool,

    /// Size of the background pool [env: ZIPFILE_THREADPOOL_SIZE]
    #[arg(long, value_name = "N")]
    pub threads: Option<usize>,

    /// Exclude entries that follow
    #[arg(short = 'x', value_name = "ENTRY", num_args = 1..)]
    pub exclude: Vec<String>,

    /// Quiet mode (-qq => quieter)
    #[arg(short = 'q', action = clap::ArgAction::Count)]
    pub quiet: u8,
}

impl Cli {
    pub fn is_quiet(&self) -> bool {
        self.quiet > 0
    }

    pub fn is_very_quiet(&self) -> bool {
        self.quiet > 1
    }

    /// Default `env_logger` filter; `RUST_LOG` takes precedence.
    pub fn log_filter(&self) -> &'static str {
        if self.is_very_quiet() {
            "off"
        } else if self.is_quiet() {
            "error"
        } else if self.verbose {
            "debug"
        } else {
            "warn"
        }
    }

    pub fn host_config(&self) -> HostConfig {
        let config = HostConfig::from_env();
        match self.threads {
            Some(threads) => config.worker_threads(threads),
            None => config,
        }
    }
}
