//! Ranked search, wired so `SearchRanker`'s location lookup never reaches
//! back into a repository lock.
//!
//! `PostRepository::search_posts` calls the injected `PostScorer` from
//! inside the closure passed to `Iterator::map`, while its own `Repo`-level
//! read lock is still held. If `SearchRanker`'s `post_location` closure
//! queried `SceneRepository` directly, that would acquire a second
//! `Repo`-level lock while the first was live — two same-level locks
//! nested, which the lock-ordering assertion forbids. Building the location
//! map (and the trust-score map) up front, before `search_posts` is called,
//! and capturing them by value keeps the scoring closure itself lock-free.

use std::sync::Arc;

use chrono::Utc;
use scene_mesh_core::{GeoPoint, Post};
use scene_mesh_guard::label::{Context, Viewer, visible};
use scene_mesh_repo::SearchCursor;
use scene_mesh_search::SearchRanker;
use uuid::Uuid;

use crate::SceneMesh;

/// A search page after viewer-side label filtering. See `FeedPage` for why
/// the returned count can be smaller than `limit`.
#[derive(Debug, Clone)]
pub struct SearchPage {
    pub posts: Vec<Post>,
    pub next_cursor: Option<SearchCursor>,
}

impl SceneMesh {
    /// Ranked search over live, non-hidden posts, optionally scoped to a
    /// single scene.
    pub fn search(
        &self,
        query: &str,
        scene_filter: Option<Uuid>,
        limit: usize,
        cursor: Option<SearchCursor>,
        query_location: Option<GeoPoint>,
        viewer: &Viewer,
    ) -> SearchPage {
        let locations = self.scenes.precise_points();
        let trust_scores = self.score_store.snapshot_scores();
        let ranking_flag = Arc::clone(&self.ranking_flag);

        let ranker = SearchRanker::new(
            query_location,
            Utc::now(),
            move |post: &Post| post.scene_id.and_then(|id| locations.get(&id).copied()),
            ranking_flag,
        );

        let (page, next_cursor) = self.posts.search_posts(
            query,
            scene_filter,
            limit,
            cursor,
            Some(&trust_scores),
            &ranker,
        );

        SearchPage {
            posts: page
                .into_iter()
                .filter(|post| visible(post, viewer, Context::Search))
                .collect(),
            next_cursor,
        }
    }
}
