//! Error types for robustio

use std::path::PathBuf;

/// Result type for robustio operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in robustio operations
///
/// The first three variants wrap a single [`std::io::Error`] with context.
/// The classifier looks through exactly one of these wrappers to find the
/// platform error code.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{op} {from} -> {to}: {source}")]
    Link {
        op: &'static str,
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{syscall} failed for {path}: {source}")]
    Syscall {
        syscall: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {format} config at {path}: {message}")]
    ConfigParse {
        path: PathBuf,
        format: String,
        message: String,
    },

    #[error("Failed to serialize {format} config for {path}: {message}")]
    ConfigSerialize {
        path: PathBuf,
        format: String,
        message: String,
    },

    #[error("Unsupported config format: {extension}")]
    UnsupportedFormat { extension: String },
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn link(
        op: &'static str,
        from: impl Into<PathBuf>,
        to: impl Into<PathBuf>,
        source: std::io::Error,
    ) -> Self {
        Self::Link {
            op,
            from: from.into(),
            to: to.into(),
            source,
        }
    }

    pub fn syscall(syscall: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Syscall {
            syscall,
            path: path.into(),
            source,
        }
    }

    /// The wrapped I/O error, one level down.
    ///
    /// Returns `None` for configuration errors, which carry no OS error.
    pub fn io_source(&self) -> Option<&std::io::Error> {
        match self {
            Self::Io { source, .. } | Self::Link { source, .. } | Self::Syscall { source, .. } => {
                Some(source)
            }
            Self::ConfigParse { .. } | Self::ConfigSerialize { .. } | Self::UnsupportedFormat { .. } => {
                None
            }
        }
    }

    /// Kind of the wrapped I/O error, if any.
    pub fn kind(&self) -> Option<std::io::ErrorKind> {
        self.io_source().map(std::io::Error::kind)
    }
}
