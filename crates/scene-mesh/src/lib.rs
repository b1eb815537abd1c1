//! Wires the post/scene/event repositories, consent and label enforcement,
//! the trust recompute engine, and ranked search into a single
//! scene-discovery core.
//!
//! Write paths that feed the trust model mark their owning scene dirty in
//! the shared `DirtySet` (post create/upsert, membership and alliance
//! changes). The `RecomputeEngine` drains that set — on its own schedule
//! once started, or synchronously via `recompute_now` — and writes fresh
//! scores to the `ScoreStore`. `search` reads those scores back when
//! building a `SearchRanker` for a query. Reads never touch the engine.

#![forbid(unsafe_code)]

mod feed;
mod ingestion;
mod search;

use std::sync::Arc;

use scene_mesh_core::{Config, JobMetricsSink, RecomputeMetrics};
use scene_mesh_repo::{EventRepository, PostRepository, SceneRepository};
use scene_mesh_search::RankingFlag;
use scene_mesh_trust::{DirtySet, InMemoryDataSource, InMemoryScoreStore, RecomputeEngine};

pub use feed::FeedPage;
pub use search::SearchPage;

pub use scene_mesh_core::{
    Alliance, Error, Event, GeoPoint, Label, Membership, Post, Result, Role, Scene,
    SceneTrustScore, Visibility,
};
pub use scene_mesh_guard::label::{Context, Viewer};
pub use scene_mesh_repo::{
    BoundingBox, EventUpdate, FeedCursor, NewEvent, NewPost, NewScene, SceneUpdate, SearchCursor,
    UpsertOutcome,
};
pub use scene_mesh_search::SearchRanker;
pub use scene_mesh_trust::CycleReport;

/// The assembled scene-discovery core: repositories, dirty-set tracking, the
/// background trust recompute engine, and ranked search, wired together the
/// way the write path in spec §2 expects.
///
/// Repositories are exposed as public fields for operations that need no
/// cross-cutting wiring (e.g. `scenes.get_by_id`, `posts.list_by_scene`);
/// operations that touch more than one subsystem — ingestion that must mark
/// a scene dirty, search that must assemble a `SearchRanker` without
/// nesting locks — are methods on `SceneMesh` itself (see `ingestion.rs`,
/// `feed.rs`, `search.rs`).
pub struct SceneMesh {
    pub posts: PostRepository,
    pub scenes: SceneRepository,
    pub events: EventRepository,
    pub dirty: Arc<DirtySet>,
    pub data_source: Arc<InMemoryDataSource>,
    pub score_store: Arc<InMemoryScoreStore>,
    pub recompute: RecomputeEngine<InMemoryDataSource, InMemoryScoreStore>,
    pub ranking_flag: Arc<RankingFlag>,
}

impl SceneMesh {
    /// Assembles a fresh core from `config`. Does not start the background
    /// recompute worker — call `start_recompute_worker` once the caller is
    /// ready, or drive cycles explicitly with `recompute.recompute_now()`
    /// (the usual choice in tests).
    #[must_use]
    pub fn new(config: &Config) -> Self {
        let dirty = Arc::new(DirtySet::new());
        let data_source = Arc::new(InMemoryDataSource::new());
        let score_store = Arc::new(InMemoryScoreStore::new());
        let metrics: Arc<dyn JobMetricsSink> = Arc::new(RecomputeMetrics::new());
        let ranking_flag = Arc::new(RankingFlag::new());
        ranking_flag.set(config.ranking_flag_default);

        let recompute = RecomputeEngine::new(
            Arc::clone(&dirty),
            Arc::clone(&data_source),
            Arc::clone(&score_store),
            metrics,
            config.recompute_interval,
            config.recompute_timeout,
        );

        Self {
            posts: PostRepository::new(),
            scenes: SceneRepository::new(),
            events: EventRepository::new(),
            dirty,
            data_source,
            score_store,
            recompute,
            ranking_flag,
        }
    }

    /// Starts the background recompute worker.
    pub fn start_recompute_worker(&self) {
        self.recompute.start();
    }

    /// Stops the background recompute worker. Idempotent.
    pub fn stop_recompute_worker(&self) {
        self.recompute.stop();
    }
}

impl Default for SceneMesh {
    fn default() -> Self {
        Self::new(&Config::default())
    }
}
