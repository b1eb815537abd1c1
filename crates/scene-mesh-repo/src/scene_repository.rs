//! Scene storage: same shape as `PostRepository`, with `ConsentGuard`
//! enforced on every write path.

use std::collections::HashMap;

use chrono::Utc;
use scene_mesh_core::{Error, GeoPoint, LockLevel, OrderedRwLock, Result, Scene, Visibility};
use scene_mesh_guard::enforce;
use uuid::Uuid;

use crate::cursor::FeedCursor;

/// Fields required to create a new scene.
#[derive(Debug, Clone)]
pub struct NewScene {
    pub owner_did: String,
    pub name: String,
    pub allow_precise: bool,
    pub precise_point: Option<GeoPoint>,
    pub coarse_geohash: String,
    pub visibility: Visibility,
    pub tags: Vec<String>,
    pub palette: Vec<String>,
}

/// Mutable fields of an existing scene. `None` leaves the field unchanged.
#[derive(Debug, Clone, Default)]
pub struct SceneUpdate {
    pub name: Option<String>,
    pub allow_precise: Option<bool>,
    pub precise_point: Option<Option<GeoPoint>>,
    pub coarse_geohash: Option<String>,
    pub visibility: Option<Visibility>,
    pub tags: Option<Vec<String>>,
    pub palette: Option<Vec<String>>,
}

/// An axis-aligned bounding box for location-scoped queries. Only scenes
/// carrying a (consented) precise point can match.
#[derive(Debug, Clone, Copy)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub min_lng: f64,
    pub max_lat: f64,
    pub max_lng: f64,
}

impl BoundingBox {
    fn contains(&self, point: GeoPoint) -> bool {
        point.lat >= self.min_lat
            && point.lat <= self.max_lat
            && point.lng >= self.min_lng
            && point.lng <= self.max_lng
    }
}

pub struct SceneRepository {
    scenes: OrderedRwLock<HashMap<Uuid, Scene>>,
}

impl Default for SceneRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneRepository {
    #[must_use]
    pub fn new() -> Self {
        Self {
            scenes: OrderedRwLock::new(LockLevel::Repo, HashMap::new()),
        }
    }

    pub fn create(&self, new: NewScene) -> Result<Uuid> {
        let mut scenes = self.scenes.write();
        let id = Uuid::new_v4();
        let now = Utc::now();
        let mut scene = Scene {
            id,
            owner_did: new.owner_did,
            name: new.name,
            allow_precise: new.allow_precise,
            precise_point: new.precise_point,
            coarse_geohash: new.coarse_geohash,
            visibility: new.visibility,
            tags: new.tags,
            palette: new.palette,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        enforce(&mut scene);
        scenes.insert(id, scene);
        Ok(id)
    }

    pub fn update(&self, id: Uuid, update: SceneUpdate) -> Result<()> {
        let mut scenes = self.scenes.write();
        let scene = scenes.get_mut(&id).ok_or(Error::SceneNotFound(id))?;
        if scene.deleted_at.is_some() {
            return Err(Error::Deleted(id));
        }
        if let Some(name) = update.name {
            scene.name = name;
        }
        if let Some(allow_precise) = update.allow_precise {
            scene.allow_precise = allow_precise;
        }
        if let Some(precise_point) = update.precise_point {
            scene.precise_point = precise_point;
        }
        if let Some(coarse_geohash) = update.coarse_geohash {
            scene.coarse_geohash = coarse_geohash;
        }
        if let Some(visibility) = update.visibility {
            scene.visibility = visibility;
        }
        if let Some(tags) = update.tags {
            scene.tags = tags;
        }
        if let Some(palette) = update.palette {
            scene.palette = palette;
        }
        scene.updated_at = Utc::now();
        enforce(scene);
        Ok(())
    }

    /// Tombstones a scene. Idempotent observable behavior: the first call
    /// succeeds, the second returns `NotFound`. Tombstones are retained for
    /// dedupe and are never returned by reads.
    pub fn delete(&self, id: Uuid) -> Result<()> {
        let mut scenes = self.scenes.write();
        let scene = scenes.get_mut(&id).ok_or(Error::SceneNotFound(id))?;
        if scene.deleted_at.is_some() {
            return Err(Error::SceneNotFound(id));
        }
        scene.deleted_at = Some(Utc::now());
        Ok(())
    }

    /// Returns a live scene, re-applying `ConsentGuard` defensively on the
    /// returned copy so a bug in a write path can never leak precision.
    pub fn get_by_id(&self, id: Uuid) -> Result<Scene> {
        let scenes = self.scenes.read();
        let mut scene = scenes
            .get(&id)
            .filter(|scene| scene.deleted_at.is_none())
            .cloned()
            .ok_or(Error::SceneNotFound(id))?;
        enforce(&mut scene);
        Ok(scene)
    }

    /// Whether a live (non-tombstoned) scene exists with this id. Used by
    /// `EventRepository::create` to enforce the "scene must exist at event
    /// creation time" invariant without a circular struct dependency.
    #[must_use]
    pub fn exists_live(&self, id: Uuid) -> bool {
        self.scenes
            .read()
            .get(&id)
            .is_some_and(|scene| scene.deleted_at.is_none())
    }

    pub fn list_by_owner(
        &self,
        owner_did: &str,
        limit: usize,
        cursor: Option<FeedCursor>,
    ) -> (Vec<Scene>, Option<FeedCursor>) {
        let scenes = self.scenes.read();
        let mut candidates: Vec<Scene> = scenes
            .values()
            .filter(|scene| scene.deleted_at.is_none() && scene.owner_did == owner_did)
            .filter(|scene| match &cursor {
                Some(c) => c.includes(scene.created_at, scene.id),
                None => true,
            })
            .cloned()
            .collect();
        candidates.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        for scene in &mut candidates {
            enforce(scene);
        }
        crate::post_repository::paginate(candidates, limit, |scene| FeedCursor {
            created_at: scene.created_at,
            id: scene.id,
        })
    }

    /// A point-in-time `sceneId -> precisePoint` map covering every live
    /// scene with a (consented) precise point.
    ///
    /// Intended for a caller — such as the facade crate assembling a
    /// `SearchRanker` — to build up front, before calling into
    /// `PostRepository::search_posts`. `search_posts` runs its per-post
    /// scoring closure while holding its own read lock, so a scorer that
    /// queried this repository from inside that closure would nest two
    /// same-level locks; building this map first and capturing it by value
    /// avoids that entirely.
    #[must_use]
    pub fn precise_points(&self) -> HashMap<Uuid, GeoPoint> {
        self.scenes
            .read()
            .values()
            .filter(|scene| scene.deleted_at.is_none())
            .filter_map(|scene| scene.precise_point.map(|point| (scene.id, point)))
            .collect()
    }

    /// Scenes whose (consented) precise point falls within `bbox`.
    pub fn list_by_bbox(&self, bbox: BoundingBox, limit: usize) -> Vec<Scene> {
        let scenes = self.scenes.read();
        let mut candidates: Vec<Scene> = scenes
            .values()
            .filter(|scene| scene.deleted_at.is_none())
            .filter(|scene| scene.precise_point.is_some_and(|p| bbox.contains(p)))
            .cloned()
            .collect();
        candidates.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        candidates.truncate(limit);
        candidates
    }
}
