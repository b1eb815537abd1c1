//! Single-worker background engine that drains the `DirtySet` on a tick,
//! writes fresh trust scores to a `ScoreStore`, and emits metrics.
//!
//! Lifecycle is grounded in the teacher's `CommitCoalescer`
//! (`mcp-agent-mail-storage::lib`): an `AtomicBool` shutdown flag, a
//! condvar used both for periodic wakeups and as the stop signal, and a
//! `JoinHandle` awaited on `stop`. Unlike the teacher's N-worker pool, this
//! engine runs exactly one worker, matching the single-threaded-per-cycle
//! requirement.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use chrono::Utc;
use scene_mesh_core::{JobMetricsSink, SceneTrustScore};
use uuid::Uuid;

use crate::data_source::{DataSource, ScoreStore};
use crate::dirty_set::DirtySet;
use crate::trust_model;

/// Summary of one recompute cycle, returned to callers of `recompute_now`
/// for tests and diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CycleReport {
    pub scenes_processed: usize,
    pub scenes_failed: usize,
    pub timed_out: bool,
    pub avg_weight_variance: f64,
}

struct Shared<D, S> {
    dirty: Arc<DirtySet>,
    data_source: Arc<D>,
    score_store: Arc<S>,
    metrics: Arc<dyn JobMetricsSink>,
    timeout: Duration,
    /// Serializes cycle execution so a background tick and an explicit
    /// `recompute_now` call can never run concurrently.
    cycle_lock: Mutex<()>,
}

impl<D: DataSource, S: ScoreStore> Shared<D, S> {
    fn run_cycle(&self) -> CycleReport {
        let _guard = self
            .cycle_lock
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        let snapshot = self.dirty.snapshot();
        if snapshot.is_empty() {
            return CycleReport::default();
        }

        let started = Instant::now();
        let deadline = started + self.timeout;

        let mut processed = 0usize;
        let mut failed = 0usize;
        let mut timed_out = false;
        let mut variance_sum = 0.0;
        let mut variance_count = 0usize;
        // Estimate of a per-scene recompute's cost, from the scene just
        // processed. Checking the deadline only at the top of the loop lets
        // a scene that is already running finish past it; refusing to start
        // a scene whose estimated completion would cross the deadline keeps
        // the cycle from overrunning by more than one scene's worth of time.
        let mut last_scene_duration: Option<Duration> = None;

        for scene_id in snapshot {
            let now = Instant::now();
            let would_cross_deadline = now >= deadline
                || last_scene_duration.is_some_and(|estimate| now + estimate > deadline);
            if would_cross_deadline {
                timed_out = true;
                self.metrics.inc_errors("recompute", "timeout");
                break;
            }

            let scene_started = Instant::now();
            if let Some(processed_scene) = self.recompute_one(scene_id, deadline) {
                processed += 1;
                if let Some(delta) = processed_scene.variance {
                    variance_sum += delta;
                    variance_count += 1;
                }
            } else {
                failed += 1;
            }
            last_scene_duration = Some(scene_started.elapsed());
        }

        let duration = started.elapsed();
        let status = if timed_out { "failure" } else { "success" };
        self.metrics.inc_total("recompute", status);
        self.metrics
            .observe_duration("recompute", duration.as_secs_f64());
        self.metrics.set_last_run(
            "recompute",
            u64::try_from(Utc::now().timestamp()).unwrap_or(0),
            processed as u64,
        );

        let avg_weight_variance = if variance_count > 0 {
            variance_sum / variance_count as f64
        } else {
            0.0
        };

        tracing::info!(
            duration_seconds = duration.as_secs_f64(),
            scenes_processed = processed,
            scenes_failed = failed,
            avg_weight_variance,
            "recompute cycle completed"
        );

        CycleReport {
            scenes_processed: processed,
            scenes_failed: failed,
            timed_out,
            avg_weight_variance,
        }
    }

    /// Recomputes and persists one scene's score. Returns `None` (and
    /// leaves the scene dirty) on a `DataSource`/`ScoreStore` error; the
    /// caller counts that as a per-scene failure, not a cycle abort.
    fn recompute_one(&self, scene_id: Uuid, deadline: Instant) -> Option<RecomputedScene> {
        let previous = self.score_store.get(scene_id).ok().flatten();

        let memberships = match self.data_source.memberships(scene_id, deadline) {
            Ok(m) => m,
            Err(err) => {
                self.metrics.inc_errors("recompute", "recompute_error");
                tracing::warn!(scene_id = %scene_id, error = %err, "recompute: failed to load memberships");
                return None;
            }
        };
        let alliances = match self.data_source.alliances(scene_id, deadline) {
            Ok(a) => a,
            Err(err) => {
                self.metrics.inc_errors("recompute", "recompute_error");
                tracing::warn!(scene_id = %scene_id, error = %err, "recompute: failed to load alliances");
                return None;
            }
        };

        let new_score = trust_model::score(&memberships, &alliances);
        let record = SceneTrustScore {
            scene_id,
            score: new_score,
            computed_at: Utc::now(),
        };

        if let Err(err) = self.score_store.save(record) {
            self.metrics.inc_errors("recompute", "recompute_error");
            tracing::warn!(scene_id = %scene_id, error = %err, "recompute: failed to persist score");
            return None;
        }

        self.dirty.clear(scene_id);
        let variance = previous.map(|p| (new_score - p.score).abs());
        Some(RecomputedScene { variance })
    }
}

struct RecomputedScene {
    variance: Option<f64>,
}

/// A periodically-ticking background worker that drains a `DirtySet`,
/// recomputes trust scores via a `DataSource`, and persists them to a
/// `ScoreStore`.
pub struct RecomputeEngine<D: DataSource + 'static, S: ScoreStore + 'static> {
    shared: Arc<Shared<D, S>>,
    interval: Duration,
    shutdown: Arc<AtomicBool>,
    wake: Arc<(Mutex<bool>, Condvar)>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl<D: DataSource, S: ScoreStore> RecomputeEngine<D, S> {
    #[must_use]
    pub fn new(
        dirty: Arc<DirtySet>,
        data_source: Arc<D>,
        score_store: Arc<S>,
        metrics: Arc<dyn JobMetricsSink>,
        interval: Duration,
        timeout: Duration,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                dirty,
                data_source,
                score_store,
                metrics,
                timeout,
                cycle_lock: Mutex::new(()),
            }),
            interval,
            shutdown: Arc::new(AtomicBool::new(false)),
            wake: Arc::new((Mutex::new(false), Condvar::new())),
            worker: Mutex::new(None),
        }
    }

    /// Starts the background worker. Idempotent: a call while already
    /// running is a no-op.
    pub fn start(&self) {
        let mut worker = self
            .worker
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if worker.is_some() {
            return;
        }

        self.shutdown.store(false, Ordering::Release);

        let shared = Arc::clone(&self.shared);
        let shutdown = Arc::clone(&self.shutdown);
        let wake = Arc::clone(&self.wake);
        let interval = self.interval;

        let handle = std::thread::Builder::new()
            .name("scene-mesh-recompute".to_string())
            .spawn(move || worker_loop(&shared, &shutdown, &wake, interval))
            .expect("failed to spawn recompute engine worker");
        *worker = Some(handle);
    }

    /// Signals the worker to stop and waits for it to finish its current
    /// cycle. A call while not running is a no-op.
    pub fn stop(&self) {
        let mut worker = self
            .worker
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let Some(handle) = worker.take() else {
            return;
        };

        self.shutdown.store(true, Ordering::Release);
        let (lock, cvar) = &*self.wake;
        *lock
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = true;
        cvar.notify_all();

        let _ = handle.join();
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.worker
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .is_some()
    }

    /// Forces one cycle to run now, blocking the caller until it completes.
    /// Safe to call whether or not the background worker is running — both
    /// paths serialize on the same cycle lock, so a tick and an explicit
    /// `recompute_now` never overlap.
    pub fn recompute_now(&self) -> CycleReport {
        self.shared.run_cycle()
    }
}

impl<D: DataSource, S: ScoreStore> Drop for RecomputeEngine<D, S> {
    fn drop(&mut self) {
        self.stop();
    }
}

fn worker_loop<D: DataSource, S: ScoreStore>(
    shared: &Arc<Shared<D, S>>,
    shutdown: &Arc<AtomicBool>,
    wake: &Arc<(Mutex<bool>, Condvar)>,
    interval: Duration,
) {
    loop {
        {
            let (lock, cvar) = &**wake;
            let guard = lock
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            let (mut woken, _timeout) = cvar
                .wait_timeout_while(guard, interval, |woken| {
                    !*woken && !shutdown.load(Ordering::Acquire)
                })
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            *woken = false;
        }

        if shutdown.load(Ordering::Acquire) {
            return;
        }

        shared.run_cycle();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scene_mesh_core::{Alliance, Error, Membership, Result, Role};
    use std::sync::atomic::AtomicU64;
    use std::thread;

    struct StaticDataSource {
        memberships: Vec<Membership>,
        alliances: Vec<Alliance>,
        per_call_delay: Duration,
    }

    impl DataSource for StaticDataSource {
        fn memberships(&self, _scene: Uuid, _deadline: Instant) -> Result<Vec<Membership>> {
            thread::sleep(self.per_call_delay);
            Ok(self.memberships.clone())
        }

        fn alliances(&self, _scene: Uuid, _deadline: Instant) -> Result<Vec<Alliance>> {
            Ok(self.alliances.clone())
        }
    }

    struct FailingDataSource;

    impl DataSource for FailingDataSource {
        fn memberships(&self, _scene: Uuid, _deadline: Instant) -> Result<Vec<Membership>> {
            Err(Error::DataSourceError("boom".to_string()))
        }

        fn alliances(&self, _scene: Uuid, _deadline: Instant) -> Result<Vec<Alliance>> {
            Err(Error::DataSourceError("boom".to_string()))
        }
    }

    #[derive(Default)]
    struct CountingMetrics {
        timeouts: AtomicU64,
        recompute_errors: AtomicU64,
    }

    impl JobMetricsSink for CountingMetrics {
        fn inc_total(&self, _name: &str, _status: &str) {}
        fn observe_duration(&self, _name: &str, _seconds: f64) {}
        fn inc_errors(&self, _name: &str, reason: &str) {
            match reason {
                "timeout" => {
                    self.timeouts.fetch_add(1, Ordering::Relaxed);
                }
                "recompute_error" => {
                    self.recompute_errors.fetch_add(1, Ordering::Relaxed);
                }
                _ => {}
            }
        }
    }

    fn membership(role: Role, trust_weight: f64) -> Membership {
        Membership {
            scene_id: Uuid::nil(),
            user_did: "did:plc:member".to_string(),
            role,
            trust_weight,
        }
    }

    #[test]
    fn empty_dirty_set_runs_cycle_with_no_side_effects() {
        let dirty = Arc::new(DirtySet::new());
        let data_source = Arc::new(StaticDataSource {
            memberships: vec![],
            alliances: vec![],
            per_call_delay: Duration::ZERO,
        });
        let score_store = Arc::new(crate::data_source::InMemoryScoreStore::new());
        let metrics: Arc<dyn JobMetricsSink> = Arc::new(CountingMetrics::default());
        let engine = RecomputeEngine::new(
            dirty,
            data_source,
            score_store,
            metrics,
            Duration::from_secs(30),
            Duration::from_secs(30),
        );
        let report = engine.recompute_now();
        assert_eq!(report, CycleReport::default());
    }

    #[test]
    fn recompute_now_clears_dirty_and_writes_score() {
        let dirty = Arc::new(DirtySet::new());
        let scene = Uuid::new_v4();
        dirty.mark(scene);
        let data_source = Arc::new(StaticDataSource {
            memberships: vec![membership(Role::Owner, 1.0)],
            alliances: vec![],
            per_call_delay: Duration::ZERO,
        });
        let score_store = Arc::new(crate::data_source::InMemoryScoreStore::new());
        let metrics: Arc<dyn JobMetricsSink> = Arc::new(CountingMetrics::default());
        let engine = RecomputeEngine::new(
            dirty.clone(),
            data_source,
            score_store.clone(),
            metrics,
            Duration::from_secs(30),
            Duration::from_secs(30),
        );

        let report = engine.recompute_now();
        assert_eq!(report.scenes_processed, 1);
        assert!(!dirty.contains(scene));
        assert!(
            score_store
                .get(scene)
                .unwrap()
                .is_some_and(|s| (s.score - 1.0).abs() <= 1e-9)
        );
    }

    #[test]
    fn data_source_error_leaves_scene_dirty() {
        let dirty = Arc::new(DirtySet::new());
        let scene = Uuid::new_v4();
        dirty.mark(scene);
        let data_source = Arc::new(FailingDataSource);
        let score_store = Arc::new(crate::data_source::InMemoryScoreStore::new());
        let metrics = Arc::new(CountingMetrics::default());
        let engine = RecomputeEngine::new(
            dirty.clone(),
            data_source,
            score_store,
            Arc::clone(&metrics) as Arc<dyn JobMetricsSink>,
            Duration::from_secs(30),
            Duration::from_secs(30),
        );

        let report = engine.recompute_now();
        assert_eq!(report.scenes_processed, 0);
        assert_eq!(report.scenes_failed, 1);
        assert!(dirty.contains(scene));
        assert_eq!(metrics.recompute_errors.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn cycle_times_out_and_leaves_remaining_scenes_dirty() {
        let dirty = Arc::new(DirtySet::new());
        let scenes: Vec<Uuid> = (0..10).map(|_| Uuid::new_v4()).collect();
        for scene in &scenes {
            dirty.mark(*scene);
        }
        let data_source = Arc::new(StaticDataSource {
            memberships: vec![membership(Role::Owner, 1.0)],
            alliances: vec![],
            per_call_delay: Duration::from_millis(200),
        });
        let score_store = Arc::new(crate::data_source::InMemoryScoreStore::new());
        let metrics = Arc::new(CountingMetrics::default());
        let engine = RecomputeEngine::new(
            dirty.clone(),
            data_source,
            score_store,
            Arc::clone(&metrics) as Arc<dyn JobMetricsSink>,
            Duration::from_secs(30),
            Duration::from_millis(500),
        );

        let report = engine.recompute_now();
        assert!(report.timed_out);
        assert_eq!(metrics.timeouts.load(Ordering::Relaxed), 1);
        assert!(scenes.iter().any(|s| dirty.contains(*s)));
        assert!(report.scenes_processed <= 2);
    }

    #[test]
    fn start_is_idempotent_and_stop_joins_the_worker() {
        let dirty = Arc::new(DirtySet::new());
        let data_source = Arc::new(StaticDataSource {
            memberships: vec![],
            alliances: vec![],
            per_call_delay: Duration::ZERO,
        });
        let score_store = Arc::new(crate::data_source::InMemoryScoreStore::new());
        let metrics: Arc<dyn JobMetricsSink> = Arc::new(CountingMetrics::default());
        let engine = RecomputeEngine::new(
            dirty,
            data_source,
            score_store,
            metrics,
            Duration::from_millis(20),
            Duration::from_secs(30),
        );

        engine.start();
        assert!(engine.is_running());
        engine.start();
        assert!(engine.is_running());

        engine.stop();
        assert!(!engine.is_running());
        engine.stop();
        assert!(!engine.is_running());
    }

    #[test]
    fn stop_without_start_is_a_no_op() {
        let dirty = Arc::new(DirtySet::new());
        let data_source = Arc::new(StaticDataSource {
            memberships: vec![],
            alliances: vec![],
            per_call_delay: Duration::ZERO,
        });
        let score_store = Arc::new(crate::data_source::InMemoryScoreStore::new());
        let metrics: Arc<dyn JobMetricsSink> = Arc::new(CountingMetrics::default());
        let engine = RecomputeEngine::new(
            dirty,
            data_source,
            score_store,
            metrics,
            Duration::from_secs(30),
            Duration::from_secs(30),
        );
        engine.stop();
        assert!(!engine.is_running());
    }
}
