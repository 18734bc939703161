//! Filesystem operations that survive ephemeral platform errors
//!
//! On some platforms, mandatory file locking and background scanners make
//! `rename`, `read` and recursive removal fail spuriously with errors such as
//! "access denied" or "sharing violation". The functions here retry those
//! errors for a bounded time and otherwise behave like their `std::fs`
//! counterparts.
//!
//! ```no_run
//! # fn main() -> robustio::Result<()> {
//! robustio::rename("cache.tmp", "cache.bin")?;
//! let bytes = robustio::read_file("cache.bin")?;
//! robustio::remove_all("scratch")?;
//! # let _ = bytes;
//! # Ok(())
//! # }
//! ```

pub mod classify;
pub mod code;
pub mod config;
pub mod error;
pub mod io;
pub mod logging;
pub mod retry;

pub use classify::{Classifier, EphemeralTable, Operation, is_ephemeral_error};
pub use code::{PlatformError, PlatformErrorCode};
pub use config::{ConfigStore, RobustnessConfig};
pub use error::{Error, Result};
pub use io::{
    Primitives, RobustFs, StdPrimitives, read_file, read_text, remove_all, rename, write_atomic,
    write_text,
};
pub use retry::{JitteredBackoff, Retrier, RetryPolicy, retry};
