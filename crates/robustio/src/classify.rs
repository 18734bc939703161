//! Ephemeral error classification
//!
//! Decides whether a failed filesystem call is worth retrying. The allow-list
//! of codes is data ([`EphemeralTable`]); per-operation refinements live on
//! [`Operation`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{Error, PlatformError, PlatformErrorCode};

/// Table of platform error codes and whether each one is ephemeral.
///
/// Codes missing from the table are not ephemeral. Serialized as the list of
/// ephemeral codes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<i32>", into = "Vec<i32>")]
pub struct EphemeralTable {
    codes: BTreeMap<PlatformErrorCode, bool>,
}

impl EphemeralTable {
    /// A table in which nothing is ephemeral.
    pub fn empty() -> Self {
        Self {
            codes: BTreeMap::new(),
        }
    }

    /// Codes Windows reports spuriously while scanners or other processes
    /// briefly hold a file.
    pub fn windows() -> Self {
        [
            PlatformErrorCode::ACCESS_DENIED,
            PlatformErrorCode::FILE_NOT_FOUND,
            PlatformErrorCode::SHARING_VIOLATION,
        ]
        .into_iter()
        .collect()
    }

    /// The table for the platform this crate was built for.
    ///
    /// Only Windows has a known class of self-resolving errors; elsewhere the
    /// table is empty and every failure is reported on the first attempt.
    pub fn platform_default() -> Self {
        if cfg!(windows) {
            Self::windows()
        } else {
            Self::empty()
        }
    }

    /// Mark `code` as ephemeral or not.
    pub fn set(&mut self, code: PlatformErrorCode, ephemeral: bool) -> &mut Self {
        self.codes.insert(code, ephemeral);
        self
    }

    pub fn is_ephemeral(&self, code: PlatformErrorCode) -> bool {
        self.codes.get(&code).copied().unwrap_or(false)
    }

    /// Ephemeral codes in ascending order.
    pub fn ephemeral_codes(&self) -> impl Iterator<Item = PlatformErrorCode> + '_ {
        self.codes
            .iter()
            .filter(|(_, ephemeral)| **ephemeral)
            .map(|(code, _)| *code)
    }
}

impl Default for EphemeralTable {
    fn default() -> Self {
        Self::platform_default()
    }
}

impl FromIterator<PlatformErrorCode> for EphemeralTable {
    fn from_iter<I: IntoIterator<Item = PlatformErrorCode>>(iter: I) -> Self {
        Self {
            codes: iter.into_iter().map(|code| (code, true)).collect(),
        }
    }
}

impl From<Vec<i32>> for EphemeralTable {
    fn from(codes: Vec<i32>) -> Self {
        codes.into_iter().map(PlatformErrorCode::new).collect()
    }
}

impl From<EphemeralTable> for Vec<i32> {
    fn from(table: EphemeralTable) -> Self {
        table.ephemeral_codes().map(PlatformErrorCode::get).collect()
    }
}

/// The filesystem operations the facade retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Rename,
    ReadFile,
    RemoveAll,
}

impl Operation {
    /// Get the string representation of the operation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rename => "rename",
            Self::ReadFile => "read_file",
            Self::RemoveAll => "remove_all",
        }
    }

    /// Whether this operation refuses to retry `code` even when the table
    /// calls it ephemeral.
    ///
    /// A read that fails with "file not found" is usually a file that really
    /// is absent, so retrying only adds latency. Rename and remove-all keep
    /// retrying it.
    pub fn excludes(&self, code: PlatformErrorCode) -> bool {
        match self {
            Self::ReadFile => code == PlatformErrorCode::FILE_NOT_FOUND,
            Self::Rename | Self::RemoveAll => false,
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Classifies errors as ephemeral using an [`EphemeralTable`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classifier {
    table: EphemeralTable,
}

impl Classifier {
    pub fn new(table: EphemeralTable) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &EphemeralTable {
        &self.table
    }

    /// Returns true if `err` may be resolved by waiting.
    ///
    /// Errors without a platform code are never ephemeral.
    pub fn is_ephemeral<E: PlatformError + ?Sized>(&self, err: &E) -> bool {
        err.platform_code()
            .is_some_and(|code| self.table.is_ephemeral(code))
    }

    /// Returns true if `op` should retry after failing with `err`.
    pub fn is_retryable<E: PlatformError + ?Sized>(&self, op: Operation, err: &E) -> bool {
        match err.platform_code() {
            Some(code) => self.table.is_ephemeral(code) && !op.excludes(code),
            None => false,
        }
    }
}

/// Returns true if `err` may be resolved by waiting, according to the
/// platform's default table.
pub fn is_ephemeral_error(err: &Error) -> bool {
    Classifier::default().is_ephemeral(err)
}
