//! Lock ordering + debug-only deadlock prevention + contention instrumentation.
//!
//! This module defines a **global lock hierarchy** for the small set of
//! process-global locks shared across the repository, trust, and search
//! layers. An inconsistent acquisition order across those layers is the
//! classic way to deadlock a long-running process.
//!
//! Design goals:
//! - **Zero release overhead**: ordering checks compile to no-ops outside
//!   `debug_assertions`.
//! - **Fail fast in debug**: panic *before* attempting an out-of-order lock.
//! - **Incremental adoption**: wrap only the locks that matter.
//! - **Contention visibility**: always-on lightweight tracking of acquire counts,
//!   contention events, wait times, and hold durations. Uses `try_lock()` first
//!   so uncontended acquires add only ~2 atomic increments (~2-4ns overhead).
//!
//! Rule (strict):
//! - When a thread already holds any lock(s), it may only acquire locks with a
//!   strictly higher `LockLevel::rank()`.
//!
//! If you need multiple locks, acquire them in ascending rank order, keep the
//! critical section tiny, and never hold these locks across blocking IO.

#![forbid(unsafe_code)]

#[cfg(debug_assertions)]
use std::cell::RefCell;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Instant;

use serde::{Deserialize, Serialize};

/// Extension trait for `Duration` that converts to nanoseconds as `u64`,
/// saturating to `u64::MAX` for extremely long durations (>585 years).
trait DurationNanosU64 {
    fn as_nanos_u64(&self) -> u64;
}

impl DurationNanosU64 for std::time::Duration {
    #[inline]
    fn as_nanos_u64(&self) -> u64 {
        self.as_nanos().try_into().unwrap_or(u64::MAX)
    }
}

/// Global lock hierarchy.
///
/// Lower rank must be acquired before higher rank when locks are nested.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum LockLevel {
    /// `PostRepository` / `SceneRepository` / `EventRepository` backing maps.
    Repo,
    /// `DirtySet` drained by the recompute worker.
    DirtySet,
    /// `ScoreStore` implementations backing trust-score reads/writes.
    ScoreStore,
    /// The process-wide ranking flag.
    RankingFlag,
}

impl LockLevel {
    /// Number of distinct lock levels.
    pub const COUNT: usize = 4;

    /// All lock levels in rank order (for iteration/snapshots).
    pub const ALL: [Self; Self::COUNT] = [
        Self::Repo,
        Self::DirtySet,
        Self::ScoreStore,
        Self::RankingFlag,
    ];

    /// Dense ordinal index [0..COUNT) for array-based stats lookup.
    #[must_use]
    pub const fn ordinal(self) -> usize {
        match self {
            Self::Repo => 0,
            Self::DirtySet => 1,
            Self::ScoreStore => 2,
            Self::RankingFlag => 3,
        }
    }

    /// Reverse mapping from ordinal back to `LockLevel`.
    #[must_use]
    pub const fn from_ordinal(ord: usize) -> Option<Self> {
        match ord {
            0 => Some(Self::Repo),
            1 => Some(Self::DirtySet),
            2 => Some(Self::ScoreStore),
            3 => Some(Self::RankingFlag),
            _ => None,
        }
    }

    /// Total order rank. Must be unique per variant.
    #[must_use]
    pub const fn rank(self) -> u16 {
        match self {
            Self::Repo => 10,
            Self::DirtySet => 20,
            Self::ScoreStore => 30,
            Self::RankingFlag => 40,
        }
    }
}

impl fmt::Display for LockLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}@{}", self.rank())
    }
}

// =============================================================================
// Lock contention tracking
// =============================================================================

/// Per-lock-level contention statistics (lock-free atomics).
struct LockStats {
    acquire_count: AtomicU64,
    contended_count: AtomicU64,
    total_wait_ns: AtomicU64,
    total_hold_ns: AtomicU64,
    max_wait_ns: AtomicU64,
    max_hold_ns: AtomicU64,
}

impl LockStats {
    const fn new() -> Self {
        Self {
            acquire_count: AtomicU64::new(0),
            contended_count: AtomicU64::new(0),
            total_wait_ns: AtomicU64::new(0),
            total_hold_ns: AtomicU64::new(0),
            max_wait_ns: AtomicU64::new(0),
            max_hold_ns: AtomicU64::new(0),
        }
    }

    #[inline]
    fn record_acquire(&self, contended: bool, wait_ns: u64) {
        self.acquire_count.fetch_add(1, Ordering::Relaxed);
        if contended {
            self.contended_count.fetch_add(1, Ordering::Relaxed);
            self.total_wait_ns.fetch_add(wait_ns, Ordering::Relaxed);
            update_max(&self.max_wait_ns, wait_ns);
        }
    }

    #[inline]
    fn record_hold(&self, hold_ns: u64) {
        self.total_hold_ns.fetch_add(hold_ns, Ordering::Relaxed);
        update_max(&self.max_hold_ns, hold_ns);
    }

    fn reset(&self) {
        self.acquire_count.store(0, Ordering::Relaxed);
        self.contended_count.store(0, Ordering::Relaxed);
        self.total_wait_ns.store(0, Ordering::Relaxed);
        self.total_hold_ns.store(0, Ordering::Relaxed);
        self.max_wait_ns.store(0, Ordering::Relaxed);
        self.max_hold_ns.store(0, Ordering::Relaxed);
    }
}

/// Lock-free CAS loop to update an atomic max value.
#[inline]
fn update_max(target: &AtomicU64, candidate: u64) {
    let mut current = target.load(Ordering::Relaxed);
    while candidate > current {
        match target.compare_exchange_weak(current, candidate, Ordering::Relaxed, Ordering::Relaxed)
        {
            Ok(_) => break,
            Err(actual) => current = actual,
        }
    }
}

fn global_lock_stats() -> &'static [LockStats] {
    static STATS: std::sync::LazyLock<Vec<LockStats>> =
        std::sync::LazyLock::new(|| (0..LockLevel::COUNT).map(|_| LockStats::new()).collect());
    &STATS
}

/// Snapshot of contention metrics for a single lock level.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockContentionEntry {
    /// Debug name of the lock level (e.g., `"Repo"`).
    pub lock_name: String,
    /// Hierarchy rank (lower = acquired first).
    pub rank: u16,
    /// Total number of successful acquisitions.
    pub acquire_count: u64,
    /// Number of acquisitions where `try_lock()` failed (i.e., lock was held).
    pub contended_count: u64,
    /// Cumulative nanoseconds spent waiting for contended acquires.
    pub total_wait_ns: u64,
    /// Cumulative nanoseconds the lock was held across all acquisitions.
    pub total_hold_ns: u64,
    /// Maximum single wait duration (ns).
    pub max_wait_ns: u64,
    /// Maximum single hold duration (ns).
    pub max_hold_ns: u64,
    /// `contended_count / acquire_count` (0.0 if no acquires).
    pub contention_ratio: f64,
}

/// Returns a snapshot of contention metrics for all lock levels.
///
/// Only includes levels that have been acquired at least once.
#[must_use]
pub fn lock_contention_snapshot() -> Vec<LockContentionEntry> {
    let stats = global_lock_stats();
    LockLevel::ALL
        .iter()
        .filter_map(|&level| {
            let s = &stats[level.ordinal()];
            let acquires = s.acquire_count.load(Ordering::Relaxed);
            if acquires == 0 {
                return None;
            }
            let contended = s.contended_count.load(Ordering::Relaxed);
            Some(LockContentionEntry {
                lock_name: format!("{level:?}"),
                rank: level.rank(),
                acquire_count: acquires,
                contended_count: contended,
                total_wait_ns: s.total_wait_ns.load(Ordering::Relaxed),
                total_hold_ns: s.total_hold_ns.load(Ordering::Relaxed),
                max_wait_ns: s.max_wait_ns.load(Ordering::Relaxed),
                max_hold_ns: s.max_hold_ns.load(Ordering::Relaxed),
                #[allow(clippy::cast_precision_loss)] // acceptable for ratio display
                contention_ratio: contended as f64 / acquires as f64,
            })
        })
        .collect()
}

/// Resets all lock contention counters to zero. Useful for test isolation.
pub fn lock_contention_reset() {
    let stats = global_lock_stats();
    for s in stats {
        s.reset();
    }
}

// =============================================================================
// Lock ordering enforcement
// =============================================================================

#[cfg(debug_assertions)]
thread_local! {
    static HELD_LOCKS: RefCell<Vec<LockLevel>> = const { RefCell::new(Vec::new()) };
}

#[inline]
#[allow(unused_variables)]
fn check_before_acquire(level: LockLevel) {
    #[cfg(debug_assertions)]
    HELD_LOCKS.with(|held| {
        let held = held.borrow();
        let Some(&last) = held.last() else {
            return;
        };
        assert!(
            level.rank() > last.rank(),
            "lock order violation: attempting to acquire {} while holding {}. held={:?}",
            level,
            last,
            held.as_slice()
        );
    });
}

#[inline]
#[allow(unused_variables)]
fn did_acquire(level: LockLevel) {
    #[cfg(debug_assertions)]
    HELD_LOCKS.with(|held| held.borrow_mut().push(level));
}

#[inline]
#[allow(unused_variables)]
fn did_release(level: LockLevel) {
    #[cfg(debug_assertions)]
    HELD_LOCKS.with(|held| {
        let mut held = held.borrow_mut();
        let last = held.pop();
        assert!(
            last == Some(level),
            "lock tracking corrupted: expected to release {}, popped={:?}, held={:?}",
            level,
            last,
            held.as_slice()
        );
    });
}

/// Mutex wrapper that enforces the global lock hierarchy in debug builds.
#[derive(Debug)]
pub struct OrderedMutex<T> {
    level: LockLevel,
    inner: Mutex<T>,
}

impl<T> OrderedMutex<T> {
    #[must_use]
    pub const fn new(level: LockLevel, value: T) -> Self {
        Self {
            level,
            inner: Mutex::new(value),
        }
    }

    #[must_use]
    pub const fn level(&self) -> LockLevel {
        self.level
    }

    pub fn lock(&self) -> OrderedMutexGuard<'_, T> {
        check_before_acquire(self.level);
        let stats = &global_lock_stats()[self.level.ordinal()];

        // Fast path: try non-blocking acquire first.
        match self.inner.try_lock() {
            Ok(guard) => {
                stats.record_acquire(false, 0);
                did_acquire(self.level);
                OrderedMutexGuard {
                    level: self.level,
                    acquired_at: Instant::now(),
                    guard,
                }
            }
            Err(std::sync::TryLockError::WouldBlock) => {
                // Slow path: contended — measure wait time.
                let start = Instant::now();
                let guard = self
                    .inner
                    .lock()
                    .unwrap_or_else(std::sync::PoisonError::into_inner);
                let wait_ns = start.elapsed().as_nanos_u64();
                let acquired_at = Instant::now();
                stats.record_acquire(true, wait_ns);
                did_acquire(self.level);
                OrderedMutexGuard {
                    level: self.level,
                    acquired_at,
                    guard,
                }
            }
            Err(std::sync::TryLockError::Poisoned(e)) => {
                stats.record_acquire(false, 0);
                did_acquire(self.level);
                OrderedMutexGuard {
                    level: self.level,
                    acquired_at: Instant::now(),
                    guard: e.into_inner(),
                }
            }
        }
    }

    #[allow(dead_code)]
    pub fn try_lock(&self) -> Option<OrderedMutexGuard<'_, T>> {
        check_before_acquire(self.level);
        let guard = self.inner.try_lock().ok()?;
        let stats = &global_lock_stats()[self.level.ordinal()];
        stats.record_acquire(false, 0);
        did_acquire(self.level);
        Some(OrderedMutexGuard {
            level: self.level,
            acquired_at: Instant::now(),
            guard,
        })
    }
}

pub struct OrderedMutexGuard<'a, T> {
    level: LockLevel,
    acquired_at: Instant,
    guard: MutexGuard<'a, T>,
}

impl<T> Drop for OrderedMutexGuard<'_, T> {
    fn drop(&mut self) {
        let hold_ns = self.acquired_at.elapsed().as_nanos_u64();
        global_lock_stats()[self.level.ordinal()].record_hold(hold_ns);
        did_release(self.level);
    }
}

impl<T> Deref for OrderedMutexGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.guard
    }
}

impl<T> DerefMut for OrderedMutexGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.guard
    }
}

/// `RwLock` wrapper that enforces the global lock hierarchy in debug builds.
#[derive(Debug)]
pub struct OrderedRwLock<T> {
    level: LockLevel,
    inner: RwLock<T>,
}

impl<T> OrderedRwLock<T> {
    #[must_use]
    pub const fn new(level: LockLevel, value: T) -> Self {
        Self {
            level,
            inner: RwLock::new(value),
        }
    }

    #[must_use]
    pub const fn level(&self) -> LockLevel {
        self.level
    }

    pub fn read(&self) -> OrderedRwLockReadGuard<'_, T> {
        check_before_acquire(self.level);
        let stats = &global_lock_stats()[self.level.ordinal()];

        match self.inner.try_read() {
            Ok(guard) => {
                stats.record_acquire(false, 0);
                did_acquire(self.level);
                OrderedRwLockReadGuard {
                    level: self.level,
                    acquired_at: Instant::now(),
                    guard,
                }
            }
            Err(std::sync::TryLockError::WouldBlock) => {
                let start = Instant::now();
                let guard = self
                    .inner
                    .read()
                    .unwrap_or_else(std::sync::PoisonError::into_inner);
                let wait_ns = start.elapsed().as_nanos_u64();
                let acquired_at = Instant::now();
                stats.record_acquire(true, wait_ns);
                did_acquire(self.level);
                OrderedRwLockReadGuard {
                    level: self.level,
                    acquired_at,
                    guard,
                }
            }
            Err(std::sync::TryLockError::Poisoned(e)) => {
                stats.record_acquire(false, 0);
                did_acquire(self.level);
                OrderedRwLockReadGuard {
                    level: self.level,
                    acquired_at: Instant::now(),
                    guard: e.into_inner(),
                }
            }
        }
    }

    pub fn write(&self) -> OrderedRwLockWriteGuard<'_, T> {
        check_before_acquire(self.level);
        let stats = &global_lock_stats()[self.level.ordinal()];

        match self.inner.try_write() {
            Ok(guard) => {
                stats.record_acquire(false, 0);
                did_acquire(self.level);
                OrderedRwLockWriteGuard {
                    level: self.level,
                    acquired_at: Instant::now(),
                    guard,
                }
            }
            Err(std::sync::TryLockError::WouldBlock) => {
                let start = Instant::now();
                let guard = self
                    .inner
                    .write()
                    .unwrap_or_else(std::sync::PoisonError::into_inner);
                let wait_ns = start.elapsed().as_nanos_u64();
                let acquired_at = Instant::now();
                stats.record_acquire(true, wait_ns);
                did_acquire(self.level);
                OrderedRwLockWriteGuard {
                    level: self.level,
                    acquired_at,
                    guard,
                }
            }
            Err(std::sync::TryLockError::Poisoned(e)) => {
                stats.record_acquire(false, 0);
                did_acquire(self.level);
                OrderedRwLockWriteGuard {
                    level: self.level,
                    acquired_at: Instant::now(),
                    guard: e.into_inner(),
                }
            }
        }
    }
}

pub struct OrderedRwLockReadGuard<'a, T> {
    level: LockLevel,
    acquired_at: Instant,
    guard: RwLockReadGuard<'a, T>,
}

impl<T> Drop for OrderedRwLockReadGuard<'_, T> {
    fn drop(&mut self) {
        let hold_ns = self.acquired_at.elapsed().as_nanos_u64();
        global_lock_stats()[self.level.ordinal()].record_hold(hold_ns);
        did_release(self.level);
    }
}

impl<T> Deref for OrderedRwLockReadGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.guard
    }
}

pub struct OrderedRwLockWriteGuard<'a, T> {
    level: LockLevel,
    acquired_at: Instant,
    guard: RwLockWriteGuard<'a, T>,
}

impl<T> Drop for OrderedRwLockWriteGuard<'_, T> {
    fn drop(&mut self) {
        let hold_ns = self.acquired_at.elapsed().as_nanos_u64();
        global_lock_stats()[self.level.ordinal()].record_hold(hold_ns);
        did_release(self.level);
    }
}

impl<T> Deref for OrderedRwLockWriteGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.guard
    }
}

impl<T> DerefMut for OrderedRwLockWriteGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.guard
    }
}
