//! Event storage: scene-scoped, `ConsentGuard`-enforced on every write,
//! with the same feed-pagination shape as `PostRepository`.

use std::collections::HashMap;

use chrono::Utc;
use scene_mesh_core::{Error, Event, GeoPoint, LockLevel, OrderedRwLock, Result};
use scene_mesh_guard::enforce;
use uuid::Uuid;

use crate::cursor::FeedCursor;
use crate::post_repository::paginate;

/// Fields required to create a new event.
#[derive(Debug, Clone)]
pub struct NewEvent {
    pub scene_id: Uuid,
    pub name: String,
    pub allow_precise: bool,
    pub precise_point: Option<GeoPoint>,
    pub coarse_geohash: String,
}

/// Mutable fields of an existing event. `None` leaves the field unchanged.
#[derive(Debug, Clone, Default)]
pub struct EventUpdate {
    pub name: Option<String>,
    pub allow_precise: Option<bool>,
    pub precise_point: Option<Option<GeoPoint>>,
    pub coarse_geohash: Option<String>,
}

pub struct EventRepository {
    events: OrderedRwLock<HashMap<Uuid, Event>>,
}

impl Default for EventRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl EventRepository {
    #[must_use]
    pub fn new() -> Self {
        Self {
            events: OrderedRwLock::new(LockLevel::Repo, HashMap::new()),
        }
    }

    /// Creates an event. `scene_exists` must report whether `new.scene_id`
    /// references a live scene — the invariant that a new event's scene
    /// must exist (and not be tombstoned) at creation time is checked here
    /// rather than by taking a hard dependency on `SceneRepository`.
    pub fn create(&self, new: NewEvent, scene_exists: impl FnOnce(Uuid) -> bool) -> Result<Uuid> {
        if !scene_exists(new.scene_id) {
            return Err(Error::SceneNotFound(new.scene_id));
        }
        let mut events = self.events.write();
        let id = Uuid::new_v4();
        let now = Utc::now();
        let mut event = Event {
            id,
            scene_id: new.scene_id,
            name: new.name,
            allow_precise: new.allow_precise,
            precise_point: new.precise_point,
            coarse_geohash: new.coarse_geohash,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        enforce(&mut event);
        events.insert(id, event);
        Ok(id)
    }

    /// Updates mutable fields on a live event, owner-only by convention of
    /// the caller (this repository enforces liveness, not authorship).
    /// Re-runs `enforce` so a consent withdrawal takes effect immediately.
    pub fn update(&self, id: Uuid, update: EventUpdate) -> Result<()> {
        let mut events = self.events.write();
        let event = events.get_mut(&id).ok_or(Error::EventNotFound(id))?;
        if event.deleted_at.is_some() {
            return Err(Error::Deleted(id));
        }
        if let Some(name) = update.name {
            event.name = name;
        }
        if let Some(allow_precise) = update.allow_precise {
            event.allow_precise = allow_precise;
        }
        if let Some(precise_point) = update.precise_point {
            event.precise_point = precise_point;
        }
        if let Some(coarse_geohash) = update.coarse_geohash {
            event.coarse_geohash = coarse_geohash;
        }
        event.updated_at = Utc::now();
        enforce(event);
        Ok(())
    }

    pub fn delete(&self, id: Uuid) -> Result<()> {
        let mut events = self.events.write();
        let event = events.get_mut(&id).ok_or(Error::EventNotFound(id))?;
        if event.deleted_at.is_some() {
            return Err(Error::EventNotFound(id));
        }
        event.deleted_at = Some(Utc::now());
        Ok(())
    }

    pub fn get_by_id(&self, id: Uuid) -> Result<Event> {
        let events = self.events.read();
        let mut event = events
            .get(&id)
            .filter(|event| event.deleted_at.is_none())
            .cloned()
            .ok_or(Error::EventNotFound(id))?;
        enforce(&mut event);
        Ok(event)
    }

    pub fn list_by_scene(
        &self,
        scene_id: Uuid,
        limit: usize,
        cursor: Option<FeedCursor>,
    ) -> (Vec<Event>, Option<FeedCursor>) {
        let events = self.events.read();
        let mut candidates: Vec<Event> = events
            .values()
            .filter(|event| event.deleted_at.is_none() && event.scene_id == scene_id)
            .filter(|event| match &cursor {
                Some(c) => c.includes(event.created_at, event.id),
                None => true,
            })
            .cloned()
            .collect();
        candidates.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        for event in &mut candidates {
            enforce(event);
        }
        paginate(candidates, limit, |event| FeedCursor {
            created_at: event.created_at,
            id: event.id,
        })
    }
}
