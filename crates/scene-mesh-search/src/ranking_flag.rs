//! Process-wide ranking flag gating whether trust weight contributes to
//! search ranking.

use std::sync::LazyLock;

use scene_mesh_core::{LockLevel, OrderedRwLock};

/// A mutex-guarded optional boolean with a lazy, safe-by-default value of
/// `false`. `None` (never explicitly set) and `Some(false)` are
/// observationally identical to `get()` — the distinction only matters to
/// `is_initialized` for diagnostics.
pub struct RankingFlag {
    value: OrderedRwLock<Option<bool>>,
}

impl Default for RankingFlag {
    fn default() -> Self {
        Self::new()
    }
}

impl RankingFlag {
    #[must_use]
    pub fn new() -> Self {
        Self {
            value: OrderedRwLock::new(LockLevel::RankingFlag, None),
        }
    }

    /// Current value; uninitialized reads as `false`.
    #[must_use]
    pub fn get(&self) -> bool {
        self.value.read().unwrap_or(false)
    }

    /// Sets the flag. Idempotent in effect: setting the same value twice in
    /// a row has no observable difference from setting it once.
    pub fn set(&self, enabled: bool) {
        *self.value.write() = Some(enabled);
    }

    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.value.read().is_some()
    }
}

static GLOBAL_RANKING_FLAG: LazyLock<RankingFlag> = LazyLock::new(RankingFlag::new);

/// The process-wide default ranking flag. Most callers should construct
/// their own `RankingFlag` and inject it, but a shared singleton matches
/// the "process-wide" framing for small binaries and tests.
#[must_use]
pub fn global_ranking_flag() -> &'static RankingFlag {
    &GLOBAL_RANKING_FLAG
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_false_and_uninitialized() {
        let flag = RankingFlag::new();
        assert!(!flag.get());
        assert!(!flag.is_initialized());
    }

    #[test]
    fn set_is_idempotent_in_effect() {
        let flag = RankingFlag::new();
        flag.set(true);
        flag.set(true);
        assert!(flag.get());
        assert!(flag.is_initialized());
    }

    #[test]
    fn flapping_is_observable_immediately() {
        let flag = RankingFlag::new();
        flag.set(true);
        assert!(flag.get());
        flag.set(false);
        assert!(!flag.get());
    }

    #[test]
    fn global_ranking_flag_returns_consistent_reference() {
        let a = global_ranking_flag();
        let b = global_ranking_flag();
        assert!(std::ptr::eq(a, b));
    }
}
