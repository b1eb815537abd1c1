//! Cursor-paginated, label-aware repositories for posts, scenes, and
//! events.
//!
//! Each repository owns a single lock guarding its backing map(s) and
//! returns deep copies on every read path, so a caller can never mutate
//! repository-internal state through a returned value.

#![forbid(unsafe_code)]

pub mod cursor;
pub mod event_repository;
pub mod post_repository;
pub mod scene_repository;

pub use cursor::{FeedCursor, SearchCursor};
pub use event_repository::{EventRepository, EventUpdate, NewEvent};
pub use post_repository::{NewPost, PostRepository, PostScorer, UpsertOutcome};
pub use scene_repository::{BoundingBox, NewScene, SceneRepository, SceneUpdate};
