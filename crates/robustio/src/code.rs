//! Platform error codes.

use crate::Error;

/// A raw operating system error code.
///
/// Only equality and ordering matter here. Lower codes are treated as the more
/// specific diagnosis when a retry session has to pick one error to report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PlatformErrorCode(i32);

impl PlatformErrorCode {
    /// `ERROR_FILE_NOT_FOUND`. Also `ENOENT` on Unix.
    pub const FILE_NOT_FOUND: Self = Self(2);
    /// `ERROR_ACCESS_DENIED`
    pub const ACCESS_DENIED: Self = Self(5);
    /// `ERROR_SHARING_VIOLATION`: another process holds the file open
    /// in an incompatible mode.
    pub const SHARING_VIOLATION: Self = Self(32);

    pub const fn new(code: i32) -> Self {
        Self(code)
    }

    pub const fn get(self) -> i32 {
        self.0
    }
}

impl From<i32> for PlatformErrorCode {
    fn from(code: i32) -> Self {
        Self(code)
    }
}

impl std::fmt::Display for PlatformErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "os error {}", self.0)
    }
}

/// Errors that may carry a platform error code.
pub trait PlatformError {
    /// The platform code of this error, looking through at most one
    /// context wrapper.
    fn platform_code(&self) -> Option<PlatformErrorCode>;
}

impl PlatformError for std::io::Error {
    fn platform_code(&self) -> Option<PlatformErrorCode> {
        self.raw_os_error().map(PlatformErrorCode)
    }
}

impl PlatformError for Error {
    fn platform_code(&self) -> Option<PlatformErrorCode> {
        self.io_source().and_then(std::io::Error::raw_os_error).map(PlatformErrorCode)
    }
}

impl<E: PlatformError + ?Sized> PlatformError for &E {
    fn platform_code(&self) -> Option<PlatformErrorCode> {
        (**self).platform_code()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn codes_order_numerically() {
        assert!(PlatformErrorCode::FILE_NOT_FOUND < PlatformErrorCode::ACCESS_DENIED);
        assert!(PlatformErrorCode::ACCESS_DENIED < PlatformErrorCode::SHARING_VIOLATION);
    }

    #[test]
    fn raw_io_error_exposes_code() {
        let err = io::Error::from_raw_os_error(32);
        assert_eq!(err.platform_code(), Some(PlatformErrorCode::SHARING_VIOLATION));
    }

    #[test]
    fn synthetic_io_error_has_no_code() {
        let err = io::Error::new(io::ErrorKind::Other, "boom");
        assert_eq!(err.platform_code(), None);
    }

    #[test]
    fn wrapped_errors_expose_inner_code() {
        let path = Error::io("a.txt", io::Error::from_raw_os_error(5));
        let link = Error::link("rename", "a", "b", io::Error::from_raw_os_error(2));
        let sys = Error::syscall("fsync", "a", io::Error::from_raw_os_error(32));

        assert_eq!(path.platform_code(), Some(PlatformErrorCode::ACCESS_DENIED));
        assert_eq!(link.platform_code(), Some(PlatformErrorCode::FILE_NOT_FOUND));
        assert_eq!(sys.platform_code(), Some(PlatformErrorCode::SHARING_VIOLATION));
    }

    #[test]
    fn config_errors_have_no_code() {
        let err = Error::UnsupportedFormat {
            extension: "ini".into(),
        };
        assert_eq!(err.platform_code(), None);
    }
}
