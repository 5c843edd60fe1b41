//! Host capability traits.
//!
//! The pipeline never talks to the host's global services directly. The two
//! things it needs from its environment — a software timestamp source and the
//! recording parent directory — are injected as small capability traits, so
//! the core can run under test (or in the demo binary) without a host.
//!
//! Unlike the hardware-facing capability traits elsewhere in this codebase,
//! these are synchronous: they are called from real-time capture and
//! acquisition contexts where an executor hop is not acceptable.
//!
//! # Contract
//! - `Clock::now_ms` is monotonic and cheap; it must never block.
//! - `PathProvider::recording_parent` returns the directory under which
//!   recording trees (`experiment<N>/recording<M>/...`) are created.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Instant;

/// Capability: monotonic software timestamps in milliseconds.
pub trait Clock: Send + Sync {
    /// Milliseconds on the host's monotonic software timeline.
    fn now_ms(&self) -> i64;
}

/// Capability: where recording trees live.
pub trait PathProvider: Send + Sync {
    /// Parent directory for recording trees.
    fn recording_parent(&self) -> PathBuf;
}

/// Production clock: milliseconds since construction, from `Instant`.
#[derive(Debug)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        self.origin.elapsed().as_millis() as i64
    }
}

/// Manually advanced clock for tests and simulations.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(start_ms: i64) -> Self {
        Self {
            now: AtomicI64::new(start_ms),
        }
    }

    pub fn advance(&self, delta_ms: i64) {
        self.now.fetch_add(delta_ms, Ordering::SeqCst);
    }

    pub fn set(&self, now_ms: i64) {
        self.now.store(now_ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Path provider backed by a fixed directory.
#[derive(Debug, Clone)]
pub struct FixedPathProvider {
    root: PathBuf,
}

impl FixedPathProvider {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }
}

impl PathProvider for FixedPathProvider {
    fn recording_parent(&self) -> PathBuf {
        self.root.clone()
    }
}
