//! Filesystem operations that retry ephemeral errors
//!
//! Each operation wraps a single-shot primitive in the retry engine and has
//! the same result shape as the primitive, so it can be used in its place.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use backoff::SystemClock;
use fs2::FileExt;
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::classify::{Classifier, Operation};
use crate::retry::{RetryPolicy, Retrier};
use crate::{Error, RobustnessConfig, Result};

/// Single-shot filesystem calls the facade retries.
pub trait Primitives {
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;

    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;

    /// Remove `path` and everything below it. A missing path is not an error.
    fn remove_all(&self, path: &Path) -> io::Result<()>;
}

/// [`Primitives`] backed by `std::fs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdPrimitives;

impl Primitives for StdPrimitives {
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        fs::rename(from, to)
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        fs::read(path)
    }

    fn remove_all(&self, path: &Path) -> io::Result<()> {
        // `dir/.` would empty `dir` before failing
        if path.file_name().is_none() || ends_in_dot(path) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "refusing to remove a path ending in `.` or `..`",
            ));
        }

        let removed = match fs::symlink_metadata(path) {
            Err(e) => Err(e),
            Ok(meta) if meta.is_dir() => fs::remove_dir_all(path),
            Ok(_) => fs::remove_file(path),
        };
        ignore_not_found(removed)
    }
}

/// Whether the last raw segment of `path` is `.` or `..`.
///
/// `Path::file_name` skips a trailing `.`, so the string is inspected
/// directly.
fn ends_in_dot(path: &Path) -> bool {
    let raw = path.as_os_str().to_string_lossy();
    let trimmed = raw.trim_end_matches(std::path::is_separator);
    let last = trimmed.rsplit(std::path::is_separator).next().unwrap_or_default();
    last == "." || last == ".."
}

/// The path may vanish between the metadata lookup and the removal.
fn ignore_not_found(result: io::Result<()>) -> io::Result<()> {
    match result {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

/// Retrying filesystem facade.
///
/// Every call runs its own retry session on the calling thread; nothing is
/// shared between calls, so one value can serve any number of threads.
#[derive(Debug, Clone)]
pub struct RobustFs<P = StdPrimitives> {
    primitives: P,
    classifier: Classifier,
    policy: RetryPolicy,
    jitter_seed: Option<u64>,
    enable_fsync: bool,
}

impl RobustFs {
    /// Facade over `std::fs` with the platform's default classification.
    pub fn new() -> Self {
        Self::from_config(&RobustnessConfig::default())
    }

    pub fn from_config(config: &RobustnessConfig) -> Self {
        Self::with_primitives(StdPrimitives, config)
    }
}

impl Default for RobustFs {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Primitives> RobustFs<P> {
    pub fn with_primitives(primitives: P, config: &RobustnessConfig) -> Self {
        Self {
            primitives,
            classifier: Classifier::new(config.ephemeral_codes.clone()),
            policy: config.retry,
            jitter_seed: config.jitter_seed,
            enable_fsync: config.enable_fsync,
        }
    }

    /// Seed every retry session's jitter source, making the sleep schedule
    /// of each call reproducible.
    pub fn with_jitter_seed(mut self, seed: u64) -> Self {
        self.jitter_seed = Some(seed);
        self
    }

    pub fn jitter_seed(&self) -> Option<u64> {
        self.jitter_seed
    }

    pub fn primitives(&self) -> &P {
        &self.primitives
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Like [`std::fs::rename`], but retries ephemeral errors.
    ///
    /// "File not found" is retried here: the source may be briefly invisible
    /// while another process finishes with it.
    pub fn rename(&self, from: impl AsRef<Path>, to: impl AsRef<Path>) -> Result<()> {
        let (from, to) = (from.as_ref(), to.as_ref());
        self.run(Operation::Rename, from, || {
            self.primitives
                .rename(from, to)
                .map_err(|e| Error::link("rename", from, to, e))
        })
    }

    /// Like [`std::fs::read`], but retries ephemeral errors.
    ///
    /// "File not found" is reported on the first attempt.
    pub fn read_file(&self, path: impl AsRef<Path>) -> Result<Vec<u8>> {
        let path = path.as_ref();
        self.run(Operation::ReadFile, path, || {
            self.primitives.read(path).map_err(|e| Error::io(path, e))
        })
    }

    /// Remove a file or directory tree, retrying ephemeral errors.
    ///
    /// Succeeds if `path` does not exist.
    pub fn remove_all(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        self.run(Operation::RemoveAll, path, || {
            self.primitives.remove_all(path).map_err(|e| Error::io(path, e))
        })
    }

    /// Read a UTF-8 text file, retrying ephemeral errors.
    pub fn read_text(&self, path: impl AsRef<Path>) -> Result<String> {
        let path = path.as_ref();
        let bytes = self.read_file(path)?;
        String::from_utf8(bytes)
            .map_err(|e| Error::io(path, io::Error::new(io::ErrorKind::InvalidData, e)))
    }

    /// Write content atomically to a file with locking.
    ///
    /// Writes a temporary sibling under an exclusive advisory lock, then
    /// moves it into place with [`RobustFs::rename`]. The temporary file is
    /// removed if anything fails.
    pub fn write_atomic(&self, path: impl AsRef<Path>, content: &[u8]) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }

        let file_name = path.file_name().ok_or_else(|| {
            Error::io(
                path,
                io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"),
            )
        })?;

        // Same directory keeps the final rename on one filesystem
        static SEQ: AtomicU64 = AtomicU64::new(0);
        let temp_path = path.with_file_name(format!(
            ".{}.{}.{}.tmp",
            file_name.to_string_lossy(),
            std::process::id(),
            SEQ.fetch_add(1, Ordering::Relaxed)
        ));

        let result = self
            .write_temp(&temp_path, content)
            .and_then(|()| self.rename(&temp_path, path));

        if result.is_err() {
            if let Err(e) = self.remove_all(&temp_path) {
                tracing::warn!("Failed to clean up temp file {}: {}", temp_path.display(), e);
            }
        }
        result
    }

    /// Write text content to a file atomically.
    pub fn write_text(&self, path: impl AsRef<Path>, content: &str) -> Result<()> {
        self.write_atomic(path, content.as_bytes())
    }

    fn write_temp(&self, temp_path: &Path, content: &[u8]) -> Result<()> {
        let mut temp_file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(temp_path)
            .map_err(|e| Error::io(temp_path, e))?;

        FileExt::lock_exclusive(&temp_file).map_err(|e| Error::syscall("flock", temp_path, e))?;

        temp_file
            .write_all(content)
            .map_err(|e| Error::io(temp_path, e))?;

        if self.enable_fsync {
            temp_file
                .sync_all()
                .map_err(|e| Error::syscall("fsync", temp_path, e))?;
        }

        FileExt::unlock(&temp_file).map_err(|e| Error::syscall("flock", temp_path, e))?;

        // Handle closes here; Windows refuses to rename an open file
        Ok(())
    }

    fn run<T>(&self, op: Operation, path: &Path, mut call: impl FnMut() -> Result<T>) -> Result<T> {
        let mut attempts = 0u32;
        let attempt = || {
            attempts += 1;
            call().map_err(|err| {
                if self.classifier.is_retryable(op, &err) {
                    backoff::Error::transient(err)
                } else {
                    backoff::Error::permanent(err)
                }
            })
        };
        let result = match self.jitter_seed {
            Some(seed) => Retrier::with_parts(
                self.policy,
                StdRng::seed_from_u64(seed),
                SystemClock::default(),
            )
            .retry(attempt),
            None => Retrier::new(self.policy).retry(attempt),
        };

        if attempts > 1 {
            match &result {
                Ok(_) => tracing::debug!(
                    %op,
                    path = %path.display(),
                    attempts,
                    "Succeeded after retrying ephemeral errors"
                ),
                Err(e) => tracing::warn!(
                    %op,
                    path = %path.display(),
                    attempts,
                    error = %e,
                    "Gave up retrying ephemeral errors"
                ),
            }
        }
        result
    }
}

/// Like [`std::fs::rename`], but retries ephemeral errors.
pub fn rename(from: impl AsRef<Path>, to: impl AsRef<Path>) -> Result<()> {
    RobustFs::new().rename(from, to)
}

/// Like [`std::fs::read`], but retries ephemeral errors other than
/// "file not found".
pub fn read_file(path: impl AsRef<Path>) -> Result<Vec<u8>> {
    RobustFs::new().read_file(path)
}

/// Remove a file or directory tree, retrying ephemeral errors.
pub fn remove_all(path: impl AsRef<Path>) -> Result<()> {
    RobustFs::new().remove_all(path)
}

/// Read text content from a file.
pub fn read_text(path: impl AsRef<Path>) -> Result<String> {
    RobustFs::new().read_text(path)
}

/// Write content atomically to a file with locking.
pub fn write_atomic(path: impl AsRef<Path>, content: &[u8]) -> Result<()> {
    RobustFs::new().write_atomic(path, content)
}

/// Write text content to a file atomically.
pub fn write_text(path: impl AsRef<Path>, content: &str) -> Result<()> {
    RobustFs::new().write_text(path, content)
}
