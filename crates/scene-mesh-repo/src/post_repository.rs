//! Indexed, cursor-paginated, ranked-searchable store of posts.
//!
//! Mirrors the teacher's `cache.rs` pattern of a single lock guarding a
//! small set of collections, with reads returning deep copies so callers
//! can never mutate repository-internal state through a returned
//! reference.

use std::collections::HashMap;

use chrono::Utc;
use scene_mesh_core::{Error, Label, LockLevel, OrderedRwLock, Post, RecordKey, Result};
use uuid::Uuid;

use crate::cursor::{FeedCursor, SearchCursor};

/// The byte that joins `authorDID` and `recordRKey` into a single secondary
/// index key. A null byte cannot appear in either field, so there is no
/// collision between e.g. `("a:b", "c")` and `("a", "b:c")`.
fn index_key(record: &RecordKey) -> String {
    format!("{}\0{}", record.record_did, record.record_rkey)
}

/// Fields required to create a new post. `id`, `created_at`, `updated_at`,
/// and `deleted_at` are assigned by the repository.
#[derive(Debug, Clone)]
pub struct NewPost {
    pub scene_id: Option<Uuid>,
    pub event_id: Option<Uuid>,
    pub author_did: String,
    pub text: String,
    pub attachments: Vec<String>,
    pub labels: Vec<Label>,
    pub record_key: Option<RecordKey>,
}

/// The outcome of an `upsert` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpsertOutcome {
    pub id: Uuid,
    pub inserted: bool,
}

/// Scores a post against a query for ranked search. Implemented by
/// `scene-mesh-search`'s `SearchRanker`; kept as a trait here so this
/// crate never needs to depend on the ranking crate.
pub trait PostScorer: Send + Sync {
    fn score(&self, post: &Post, query: &str, trust_weight: f64) -> f64;
}

struct State {
    posts: HashMap<Uuid, Post>,
    record_index: HashMap<String, Uuid>,
}

pub struct PostRepository {
    state: OrderedRwLock<State>,
}

impl Default for PostRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl PostRepository {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: OrderedRwLock::new(
                LockLevel::Repo,
                State {
                    posts: HashMap::new(),
                    record_index: HashMap::new(),
                },
            ),
        }
    }

    /// Assigns a fresh id and inserts `new`. Always creates a new row, even
    /// if `record_key` collides with an existing one — use `upsert` for
    /// idempotent ingestion.
    pub fn create(&self, new: NewPost) -> Result<Uuid> {
        let mut state = self.state.write();
        let id = Uuid::new_v4();
        let now = Utc::now();
        if let Some(key) = &new.record_key {
            state.record_index.insert(index_key(key), id);
        }
        state.posts.insert(
            id,
            Post {
                id,
                scene_id: new.scene_id,
                event_id: new.event_id,
                author_did: new.author_did,
                text: new.text,
                attachments: new.attachments,
                labels: new.labels,
                record_key: new.record_key,
                created_at: now,
                updated_at: now,
                deleted_at: None,
            },
        );
        Ok(id)
    }

    /// Idempotent ingestion entry point: a re-delivery of `new` under the
    /// same record key updates the existing row instead of inserting a
    /// duplicate.
    pub fn upsert(&self, new: NewPost) -> Result<UpsertOutcome> {
        let mut state = self.state.write();

        if let Some(key) = &new.record_key {
            let lookup = index_key(key);
            if let Some(&existing_id) = state.record_index.get(&lookup) {
                let now = Utc::now();
                if let Some(post) = state.posts.get_mut(&existing_id) {
                    post.text = new.text;
                    post.attachments = new.attachments;
                    post.labels = new.labels;
                    post.updated_at = now;
                }
                return Ok(UpsertOutcome {
                    id: existing_id,
                    inserted: false,
                });
            }
        }

        let id = Uuid::new_v4();
        let now = Utc::now();
        if let Some(key) = &new.record_key {
            state.record_index.insert(index_key(key), id);
        }
        state.posts.insert(
            id,
            Post {
                id,
                scene_id: new.scene_id,
                event_id: new.event_id,
                author_did: new.author_did,
                text: new.text,
                attachments: new.attachments,
                labels: new.labels,
                record_key: new.record_key,
                created_at: now,
                updated_at: now,
                deleted_at: None,
            },
        );
        Ok(UpsertOutcome { id, inserted: true })
    }

    /// Updates mutable fields (text/attachments/labels) on a live post.
    pub fn update(
        &self,
        id: Uuid,
        text: String,
        attachments: Vec<String>,
        labels: Vec<Label>,
    ) -> Result<()> {
        let mut state = self.state.write();
        let post = state.posts.get_mut(&id).ok_or(Error::NotFound(id))?;
        if post.deleted_at.is_some() {
            return Err(Error::Deleted(id));
        }
        post.text = text;
        post.attachments = attachments;
        post.labels = labels;
        post.updated_at = Utc::now();
        Ok(())
    }

    /// Soft-deletes a post. Idempotent observable behavior: the first call
    /// tombstones the post; the second returns `NotFound`.
    pub fn delete(&self, id: Uuid) -> Result<()> {
        let mut state = self.state.write();
        let post = state.posts.get_mut(&id).ok_or(Error::NotFound(id))?;
        if post.deleted_at.is_some() {
            return Err(Error::NotFound(id));
        }
        post.deleted_at = Some(Utc::now());
        Ok(())
    }

    /// Returns a deep copy of a live (non-tombstoned) post.
    pub fn get_by_id(&self, id: Uuid) -> Result<Post> {
        let state = self.state.read();
        state
            .posts
            .get(&id)
            .filter(|post| post.deleted_at.is_none())
            .cloned()
            .ok_or(Error::NotFound(id))
    }

    /// Returns a deep copy of a live post by its ingestion record key.
    pub fn get_by_record_key(&self, did: &str, rkey: &str) -> Result<Post> {
        let state = self.state.read();
        let lookup = format!("{did}\0{rkey}");
        let id = *state
            .record_index
            .get(&lookup)
            .ok_or_else(|| Error::NotFound(Uuid::nil()))?;
        state
            .posts
            .get(&id)
            .filter(|post| post.deleted_at.is_none())
            .cloned()
            .ok_or(Error::NotFound(id))
    }

    /// Cursor-paginated feed of posts attached to `scene_id`: not
    /// tombstoned, not labelled hidden, ordered `createdAt DESC, id ASC`.
    pub fn list_by_scene(
        &self,
        scene_id: Uuid,
        limit: usize,
        cursor: Option<FeedCursor>,
    ) -> (Vec<Post>, Option<FeedCursor>) {
        self.list_feed(limit, cursor, |post| post.scene_id == Some(scene_id))
    }

    /// Cursor-paginated feed of posts attached to `event_id`.
    pub fn list_by_event(
        &self,
        event_id: Uuid,
        limit: usize,
        cursor: Option<FeedCursor>,
    ) -> (Vec<Post>, Option<FeedCursor>) {
        self.list_feed(limit, cursor, |post| post.event_id == Some(event_id))
    }

    fn list_feed(
        &self,
        limit: usize,
        cursor: Option<FeedCursor>,
        scope: impl Fn(&Post) -> bool,
    ) -> (Vec<Post>, Option<FeedCursor>) {
        let state = self.state.read();
        let mut candidates: Vec<&Post> = state
            .posts
            .values()
            .filter(|post| {
                post.deleted_at.is_none() && !post.has_label(Label::Hidden) && scope(post)
            })
            .filter(|post| match &cursor {
                Some(c) => c.includes(post.created_at, post.id),
                None => true,
            })
            .collect();

        candidates.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));

        paginate(candidates, limit, |post| FeedCursor {
            created_at: post.created_at,
            id: post.id,
        })
    }

    /// Ranked search over live, non-hidden posts, optionally scoped to a
    /// single scene. `trust_scores` maps `sceneId -> trustWeight`; posts
    /// with no scene or no entry score `0.0` on the trust term.
    pub fn search_posts(
        &self,
        query: &str,
        scene_filter: Option<Uuid>,
        limit: usize,
        cursor: Option<SearchCursor>,
        trust_scores: Option<&HashMap<Uuid, f64>>,
        scorer: &dyn PostScorer,
    ) -> (Vec<Post>, Option<SearchCursor>) {
        let state = self.state.read();
        let mut scored: Vec<(f64, &Post)> = state
            .posts
            .values()
            .filter(|post| post.deleted_at.is_none() && !post.has_label(Label::Hidden))
            .filter(|post| scene_filter.is_none_or(|scene| post.scene_id == Some(scene)))
            .map(|post| {
                let trust_weight = post
                    .scene_id
                    .and_then(|scene| trust_scores.and_then(|scores| scores.get(&scene)))
                    .copied()
                    .unwrap_or(0.0);
                (scorer.score(post, query, trust_weight), post)
            })
            .filter(|(score, post)| match &cursor {
                Some(c) => c.includes(*score, post.id),
                None => true,
            })
            .collect();

        scored.sort_by(|(score_a, post_a), (score_b, post_b)| {
            score_b
                .partial_cmp(score_a)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(post_a.id.cmp(&post_b.id))
        });

        let (page, next_cursor) = paginate(scored, limit, |(score, post)| SearchCursor {
            score,
            id: post.id,
        });
        (page.into_iter().map(|(_, post)| post).collect(), next_cursor)
    }
}

/// Shared pagination mechanics for feed and search: take `limit + 1`
/// candidates to detect whether there is a next page, return a cursor
/// naming the last returned row only when one exists.
pub(crate) fn paginate<T: Clone, C>(
    mut candidates: Vec<T>,
    limit: usize,
    cursor_of: impl Fn(&T) -> C,
) -> (Vec<T>, Option<C>) {
    let has_more = candidates.len() > limit;
    candidates.truncate(limit);
    let next_cursor = if has_more {
        candidates.last().map(&cursor_of)
    } else {
        None
    };
    (candidates, next_cursor)
}
