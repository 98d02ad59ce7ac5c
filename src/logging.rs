//! Log setup: every record goes to stdout and to the application log file as
//! `timestamp | LEVEL | module | message`. The file rotates by size while the
//! process runs, keeping a fixed number of backups.

use anyhow::{Context, Result};
use env_logger::{Builder, Target};
use log::LevelFilter;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::constants::{LOG_BACKUPS, LOG_MAX_BYTES};

/// Log file that rotates itself once a write would take it past its size cap.
pub struct RotatingLog {
    path: PathBuf,
    file: File,
    written: u64,
    max_bytes: u64,
    backups: usize,
}

impl RotatingLog {
    /// Opens the log for appending, rotating it first if it is already too big.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be rotated or opened
    pub fn open(path: impl Into<PathBuf>, max_bytes: u64, backups: usize) -> Result<Self> {
        let path = path.into();
        rotate(&path, max_bytes, backups)?;
        let file = open_append(&path)?;
        let written = file.metadata().map_or(0, |metadata| metadata.len());

        Ok(Self {
            path,
            file,
            written,
            max_bytes,
            backups,
        })
    }

    fn roll_over(&mut self) -> Result<()> {
        self.file.flush()?;
        shift_backups(&self.path, self.backups)?;
        self.file = open_append(&self.path)?;
        self.written = 0;
        Ok(())
    }
}

impl Write for RotatingLog {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let incoming = u64::try_from(buf.len()).unwrap_or(u64::MAX);
        if self.written > 0 && self.written.saturating_add(incoming) > self.max_bytes {
            self.roll_over().map_err(io::Error::other)?;
        }

        self.file.write_all(buf)?;
        self.written = self.written.saturating_add(incoming);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

/// Writes everything to stdout and to the log file.
struct TeeWriter {
    log: RotatingLog,
}

impl Write for TeeWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::stdout().write_all(buf)?;
        self.log.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stdout().flush()?;
        self.log.flush()
    }
}

/// Installs the global logger.
///
/// # Errors
///
/// Returns an error if the log directory or file cannot be created
pub fn init(level: LevelFilter, log_path: &Path) -> Result<()> {
    if let Some(parent) = log_path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Unable to create log directory {}", parent.display()))?;
    }
    let log = RotatingLog::open(log_path, LOG_MAX_BYTES, LOG_BACKUPS)?;

    Builder::new()
        .filter_level(level)
        .format(|buf, record| {
            writeln!(
                buf,
                "{} | {} | {} | {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.target(),
                record.args()
            )
        })
        .target(Target::Pipe(Box::new(TeeWriter { log })))
        .try_init()
        .context("Logger already initialized")
}

fn open_append(path: &Path) -> Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Unable to open log file {}", path.display()))
}

/// Shifts `app.log` to `app.log.1`, `app.log.1` to `app.log.2` and so on when
/// the file is larger than `max_bytes`. The oldest backup is dropped.
///
/// # Errors
///
/// Returns an error if a file cannot be renamed or removed
pub fn rotate(log_path: &Path, max_bytes: u64, backups: usize) -> Result<()> {
    let Ok(metadata) = fs::metadata(log_path) else {
        return Ok(());
    };
    if metadata.len() <= max_bytes {
        return Ok(());
    }

    shift_backups(log_path, backups)
}

fn shift_backups(log_path: &Path, backups: usize) -> Result<()> {
    if backups == 0 {
        return fs::remove_file(log_path)
            .with_context(|| format!("Unable to remove {}", log_path.display()));
    }

    let backup = |index: usize| -> PathBuf {
        let mut name = log_path.as_os_str().to_owned();
        name.push(format!(".{index}"));
        PathBuf::from(name)
    };

    for index in (1..backups).rev() {
        let from = backup(index);
        if from.exists() {
            fs::rename(&from, backup(index + 1))
                .with_context(|| format!("Unable to rotate {}", from.display()))?;
        }
    }
    fs::rename(log_path, backup(1))
        .with_context(|| format!("Unable to rotate {}", log_path.display()))?;

    Ok(())
}
