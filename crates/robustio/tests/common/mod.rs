//! Shared fixtures for robustio integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::io;
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use robustio::{EphemeralTable, Primitives, RetryPolicy, RobustFs, RobustnessConfig};

pub const ACCESS_DENIED: i32 = 5;
pub const FILE_NOT_FOUND: i32 = 2;
pub const SHARING_VIOLATION: i32 = 32;
/// `ERROR_INVALID_PARAMETER`, never ephemeral.
pub const INVALID_PARAMETER: i32 = 87;

/// Primitives that replay a script of outcomes instead of touching disk.
///
/// Each step is `None` for success or `Some(code)` for a failure with that
/// raw OS code. The last step repeats once the script runs out.
pub struct ScriptedPrimitives {
    script: Mutex<VecDeque<Option<i32>>>,
    calls: AtomicUsize,
    contents: Vec<u8>,
}

impl ScriptedPrimitives {
    pub fn new(script: impl IntoIterator<Item = Option<i32>>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            calls: AtomicUsize::new(0),
            contents: b"scripted".to_vec(),
        }
    }

    /// Fail with each code in turn, then succeed.
    pub fn failing_then_ok(codes: &[i32]) -> Self {
        Self::new(codes.iter().copied().map(Some).chain([None]))
    }

    /// Fail with `code` on every call.
    pub fn always(code: i32) -> Self {
        Self::new([Some(code)])
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn contents(&self) -> &[u8] {
        &self.contents
    }

    fn step(&self) -> io::Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut script = self.script.lock().unwrap();
        let outcome = if script.len() > 1 {
            script.pop_front().flatten()
        } else {
            script.front().copied().flatten()
        };
        match outcome {
            Some(code) => Err(io::Error::from_raw_os_error(code)),
            None => Ok(()),
        }
    }
}

impl Primitives for ScriptedPrimitives {
    fn rename(&self, _from: &Path, _to: &Path) -> io::Result<()> {
        self.step()
    }

    fn read(&self, _path: &Path) -> io::Result<Vec<u8>> {
        self.step().map(|()| self.contents.clone())
    }

    fn remove_all(&self, _path: &Path) -> io::Result<()> {
        self.step()
    }
}

/// Windows classification with a short budget, independent of the host.
pub fn windows_config(budget: Duration) -> RobustnessConfig {
    RobustnessConfig {
        enable_fsync: false,
        ephemeral_codes: EphemeralTable::windows(),
        retry: RetryPolicy {
            initial_sleep: Duration::from_millis(1),
            budget,
        },
        jitter_seed: None,
    }
}

pub fn scripted_fs(primitives: ScriptedPrimitives) -> RobustFs<ScriptedPrimitives> {
    RobustFs::with_primitives(primitives, &windows_config(Duration::from_millis(100)))
}
