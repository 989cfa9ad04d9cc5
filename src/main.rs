//! Main entry point for the zipfile CLI application.
//!
//! Lists, tests, or prints entries of a local ZIP archive, reading them
//! either on the main thread or on the background pool.

use anyhow::{Result, anyhow, bail};
use clap::Parser;
use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;

use zipfile::{Cli, Host, ZipFile};

type EntryResult = zipfile::Result<Vec<u8>>;

/// Application entry point.
fn main() -> Result<()> {
    let cli = Cli::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(cli.log_filter()))
        .init();

    let host = Host::with_config(cli.host_config())?;
    let archive = host.open(&cli.file)?;

    // List mode: display archive contents and exit
    if cli.list || cli.verbose {
        list_entries(&archive, cli.verbose);
        return Ok(());
    }

    let selected = select_entries(&archive, &cli);
    let results = if cli.background {
        read_background(&host, &archive, &selected)?
    } else {
        selected
            .iter()
            .map(|name| (name.to_string(), archive.read_file_sync(name)))
            .collect()
    };
    archive.destroy();

    report(&cli, results)
}

/// List entry names, optionally behind a summary line.
fn list_entries(archive: &ZipFile, verbose: bool) {
    if verbose {
        println!(
            "Archive: {}  ({} entries)",
            archive.path().display(),
            archive.count()
        );
        println!("{}", "-".repeat(70));
    }
    for name in archive.names() {
        println!("{}", name);
    }
}

/// Apply the positional patterns and `-x` exclusions.
///
/// Directory entries are skipped; they carry no data.
fn select_entries<'a>(archive: &'a ZipFile, cli: &Cli) -> Vec<&'a str> {
    archive
        .names()
        .iter()
        .map(String::as_str)
        .filter(|name| {
            if name.ends_with('/') {
                return false;
            }

            if !cli.files.is_empty() {
                let matches = cli.files.iter().map(String::as_str).any(|f| {
                    if has_glob_chars(f) {
                        glob_match(f, name)
                    } else {
                        // No wildcards: exact match on the full name or its last component
                        let basename = name.rsplit('/').next().unwrap_or(*name);
                        *name == f || basename == f
                    }
                });
                if !matches {
                    return false;
                }
            }

            !cli
                .exclude
                .iter()
                .any(|x| name.contains(x.as_str()) || glob_match(x, name))
        })
        .collect()
}

/// Queue every entry on the background pool and wait for all of them.
///
/// Results come back in completion order and are slotted back into
/// selection order.
fn read_background(
    host: &Host,
    archive: &ZipFile,
    names: &[&str],
) -> Result<Vec<(String, EntryResult)>> {
    let slots: Rc<RefCell<Vec<Option<EntryResult>>>> =
        Rc::new(RefCell::new(names.iter().map(|_| None).collect()));

    for (index, name) in names.iter().enumerate() {
        let slots = Rc::clone(&slots);
        archive.read_file(name, move |result| {
            slots.borrow_mut()[index] = Some(result);
        })?;
    }
    host.run()?;

    let delivered = slots.take();
    names
        .iter()
        .zip(delivered)
        .map(|(name, slot)| {
            let result = slot.ok_or_else(|| anyhow!("no result delivered for {}", name))?;
            Ok((name.to_string(), result))
        })
        .collect()
}

/// Print or test the read entries, failing if any of them failed.
fn report(cli: &Cli, results: Vec<(String, EntryResult)>) -> Result<()> {
    let total = results.len();
    let show_names = total > 1 && !cli.is_quiet();
    let mut failures = 0usize;
    let mut stdout = std::io::stdout().lock();

    for (name, result) in results {
        let data = match result {
            Ok(data) => data,
            Err(e) => {
                if !cli.is_very_quiet() {
                    eprintln!("{}: {}", name, e);
                }
                failures += 1;
                continue;
            }
        };

        if cli.test {
            if !cli.is_quiet() {
                writeln!(stdout, "    testing: {:<50} OK ({})", name, format_size(data.len() as u64))?;
            }
        } else {
            if show_names {
                writeln!(stdout, "--- {} ---", name)?;
            }
            stdout.write_all(&data)?;
        }
    }
    stdout.flush()?;

    if failures > 0 {
        bail!("{} of {} entries could not be read from {}", failures, total, cli.file);
    }
    if cli.test && !cli.is_very_quiet() {
        writeln!(stdout, "No errors detected in {}", cli.file)?;
    }
    Ok(())
}

/// Check if a pattern contains glob wildcard characters.
fn has_glob_chars(pattern: &str) -> bool {
    pattern.contains('*') || pattern.contains('?')
}

/// Match `text` against a pattern where `*` spans any run of characters
/// and `?` exactly one.
///
/// Only the most recent `*` is ever revisited, so matching is
/// O(pattern * text) rather than exponential.
fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();
    let (mut p, mut t) = (0, 0);
    // Position of the last `*` and the text index it currently absorbs up to
    let mut star: Option<(usize, usize)> = None;

    while t < text.len() {
        match pattern.get(p) {
            Some('*') => {
                star = Some((p, t));
                p += 1;
            }
            Some(&c) if c == '?' || c == text[t] => {
                p += 1;
                t += 1;
            }
            _ => match star {
                Some((star_p, star_t)) => {
                    p = star_p + 1;
                    t = star_t + 1;
                    star = Some((star_p, t));
                }
                None => return false,
            },
        }
    }
    pattern[p..].iter().all(|&c| c == '*')
}

/// Format a byte size into a human-readable string.
fn format_size(size: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if size >= GB {
        format!("{:.2} GB", size as f64 / GB as f64)
    } else if size >= MB {
        format!("{:.2} MB", size as f64 / MB as f64)
    } else if size >= KB {
        format!("{:.2} KB", size as f64 / KB as f64)
    } else {
        format!("{} bytes", size)
    }
}
