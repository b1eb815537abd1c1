//! External interfaces consumed by the recompute engine: `DataSource`
//! (memberships/alliances) and `ScoreStore` (persisted trust scores).

use std::collections::HashMap;
use std::time::Instant;

use scene_mesh_core::{Alliance, LockLevel, Membership, OrderedMutex, Result, SceneTrustScore};
use uuid::Uuid;

/// Supplies membership and alliance data for a scene. Implementations must
/// honour `deadline`: once it has passed, further blocking work on behalf of
/// this call is no longer useful to the caller and should be abandoned as
/// soon as is practical.
pub trait DataSource: Send + Sync {
    fn memberships(&self, scene: Uuid, deadline: Instant) -> Result<Vec<Membership>>;
    fn alliances(&self, scene: Uuid, deadline: Instant) -> Result<Vec<Alliance>>;
}

/// Persists and retrieves `SceneTrustScore`s. `RecomputeEngine` is the sole
/// writer; `get` returning `Ok(None)` means "never computed", not an error.
pub trait ScoreStore: Send + Sync {
    fn save(&self, score: SceneTrustScore) -> Result<()>;
    fn get(&self, scene: Uuid) -> Result<Option<SceneTrustScore>>;
}

/// Default thread-safe `ScoreStore` backed by a single lock-ordered mutex.
/// Safe because `RecomputeEngine` never calls `save` concurrently with
/// itself (the engine has exactly one worker), so the lock only ever
/// arbitrates against concurrent `get` readers.
pub struct InMemoryScoreStore {
    scores: OrderedMutex<HashMap<Uuid, SceneTrustScore>>,
}

impl Default for InMemoryScoreStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryScoreStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            scores: OrderedMutex::new(LockLevel::ScoreStore, HashMap::new()),
        }
    }

    /// A point-in-time `sceneId -> trustWeight` copy of every saved score.
    /// Not part of the `ScoreStore` trait (a remote-backed implementation
    /// may have no cheap way to enumerate everything it has ever stored);
    /// callers wiring an unscoped ranked search against this concrete store
    /// use it to build the `trustScores` map `SearchRanker` reads from.
    #[must_use]
    pub fn snapshot_scores(&self) -> HashMap<Uuid, f64> {
        self.scores
            .lock()
            .iter()
            .map(|(id, score)| (*id, score.score))
            .collect()
    }
}

impl ScoreStore for InMemoryScoreStore {
    fn save(&self, score: SceneTrustScore) -> Result<()> {
        self.scores.lock().insert(score.scene_id, score);
        Ok(())
    }

    fn get(&self, scene: Uuid) -> Result<Option<SceneTrustScore>> {
        Ok(self.scores.lock().get(&scene).copied())
    }
}

/// In-memory `DataSource` storing memberships and alliances keyed by the
/// scene they belong to. `Alliance` is keyed by its authoritative
/// `from_scene_id`, matching the "source scene is authoritative" rule.
///
/// Locked at the same level as the other in-process repositories: this
/// struct is never consulted from inside a held `PostRepository` or
/// `SceneRepository` guard (only from `RecomputeEngine`'s own worker or a
/// direct `recompute_now` call), so sharing `LockLevel::Repo` introduces no
/// nesting hazard.
pub struct InMemoryDataSource {
    memberships: OrderedMutex<HashMap<Uuid, Vec<Membership>>>,
    alliances: OrderedMutex<HashMap<Uuid, Vec<Alliance>>>,
}

impl Default for InMemoryDataSource {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryDataSource {
    #[must_use]
    pub fn new() -> Self {
        Self {
            memberships: OrderedMutex::new(LockLevel::Repo, HashMap::new()),
            alliances: OrderedMutex::new(LockLevel::Repo, HashMap::new()),
        }
    }

    /// Inserts or replaces a user's membership in a scene. Returns the scene
    /// id the caller should mark dirty.
    pub fn upsert_membership(&self, membership: Membership) -> Result<Uuid> {
        if !(0.0..=1.0).contains(&membership.trust_weight) {
            return Err(scene_mesh_core::Error::InvalidTrustWeight(
                membership.trust_weight,
            ));
        }
        let scene_id = membership.scene_id;
        let mut memberships = self.memberships.lock();
        let scene_memberships = memberships.entry(scene_id).or_default();
        if let Some(existing) = scene_memberships
            .iter_mut()
            .find(|m| m.user_did == membership.user_did)
        {
            *existing = membership;
        } else {
            scene_memberships.push(membership);
        }
        Ok(scene_id)
    }

    /// Removes a user's membership from a scene, if present. Returns the
    /// scene id the caller should mark dirty.
    pub fn remove_membership(&self, scene_id: Uuid, user_did: &str) -> Uuid {
        let mut memberships = self.memberships.lock();
        if let Some(scene_memberships) = memberships.get_mut(&scene_id) {
            scene_memberships.retain(|m| m.user_did != user_did);
        }
        scene_id
    }

    /// Inserts or replaces the edge `from -> to`. Returns `from_scene_id`,
    /// the authoritative (dirty-marked) side of the edge.
    pub fn upsert_alliance(&self, alliance: Alliance) -> Result<Uuid> {
        if !(0.0..=1.0).contains(&alliance.weight) {
            return Err(scene_mesh_core::Error::InvalidArgument(format!(
                "alliance weight {} out of range [0, 1]",
                alliance.weight
            )));
        }
        let from_scene_id = alliance.from_scene_id;
        let mut alliances = self.alliances.lock();
        let outgoing = alliances.entry(from_scene_id).or_default();
        if let Some(existing) = outgoing
            .iter_mut()
            .find(|a| a.to_scene_id == alliance.to_scene_id)
        {
            *existing = alliance;
        } else {
            outgoing.push(alliance);
        }
        Ok(from_scene_id)
    }

    /// Removes the edge `from -> to`, if present. Returns `from_scene_id`.
    pub fn remove_alliance(&self, from_scene_id: Uuid, to_scene_id: Uuid) -> Uuid {
        let mut alliances = self.alliances.lock();
        if let Some(outgoing) = alliances.get_mut(&from_scene_id) {
            outgoing.retain(|a| a.to_scene_id != to_scene_id);
        }
        from_scene_id
    }
}

impl DataSource for InMemoryDataSource {
    fn memberships(&self, scene: Uuid, _deadline: Instant) -> Result<Vec<Membership>> {
        Ok(self
            .memberships
            .lock()
            .get(&scene)
            .cloned()
            .unwrap_or_default())
    }

    fn alliances(&self, scene: Uuid, _deadline: Instant) -> Result<Vec<Alliance>> {
        Ok(self
            .alliances
            .lock()
            .get(&scene)
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use scene_mesh_core::Role;

    fn membership(scene: Uuid, user: &str, trust_weight: f64) -> Membership {
        Membership {
            scene_id: scene,
            user_did: user.to_string(),
            role: Role::Member,
            trust_weight,
        }
    }

    #[test]
    fn upsert_membership_rejects_out_of_range_trust_weight() {
        let source = InMemoryDataSource::new();
        let err = source
            .upsert_membership(membership(Uuid::new_v4(), "did:plc:a", 1.5))
            .unwrap_err();
        assert_eq!(err.error_type(), "INVALID_TRUST_WEIGHT");
    }

    #[test]
    fn upsert_membership_replaces_existing_entry_for_same_user() {
        let source = InMemoryDataSource::new();
        let scene = Uuid::new_v4();
        source
            .upsert_membership(membership(scene, "did:plc:a", 0.2))
            .unwrap();
        source
            .upsert_membership(membership(scene, "did:plc:a", 0.9))
            .unwrap();
        let all = source.memberships(scene, Instant::now()).unwrap();
        assert_eq!(all.len(), 1);
        assert!((all[0].trust_weight - 0.9).abs() <= 1e-9);
    }

    #[test]
    fn remove_membership_drops_only_the_named_user() {
        let source = InMemoryDataSource::new();
        let scene = Uuid::new_v4();
        source
            .upsert_membership(membership(scene, "did:plc:a", 0.5))
            .unwrap();
        source
            .upsert_membership(membership(scene, "did:plc:b", 0.5))
            .unwrap();
        source.remove_membership(scene, "did:plc:a");
        let remaining = source.memberships(scene, Instant::now()).unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].user_did, "did:plc:b");
    }

    #[test]
    fn alliance_is_keyed_by_the_authoritative_source_scene() {
        let source = InMemoryDataSource::new();
        let from = Uuid::new_v4();
        let to = Uuid::new_v4();
        source
            .upsert_alliance(Alliance {
                from_scene_id: from,
                to_scene_id: to,
                weight: 0.7,
            })
            .unwrap();
        assert_eq!(source.alliances(from, Instant::now()).unwrap().len(), 1);
        assert!(source.alliances(to, Instant::now()).unwrap().is_empty());
    }

    #[test]
    fn upsert_alliance_rejects_out_of_range_weight() {
        let source = InMemoryDataSource::new();
        let err = source
            .upsert_alliance(Alliance {
                from_scene_id: Uuid::new_v4(),
                to_scene_id: Uuid::new_v4(),
                weight: -0.1,
            })
            .unwrap_err();
        assert_eq!(err.error_type(), "INVALID_ARGUMENT");
    }

    #[test]
    fn get_of_unknown_scene_is_none_not_error() {
        let store = InMemoryScoreStore::new();
        assert!(store.get(Uuid::new_v4()).unwrap().is_none());
    }

    #[test]
    fn save_then_get_round_trips() {
        let store = InMemoryScoreStore::new();
        let scene = Uuid::new_v4();
        let score = SceneTrustScore {
            scene_id: scene,
            score: 0.42,
            computed_at: Utc::now(),
        };
        store.save(score).unwrap();
        let got = store.get(scene).unwrap().unwrap();
        assert!((got.score - 0.42).abs() <= 1e-9);
    }

    #[test]
    fn save_overwrites_previous_score_for_same_scene() {
        let store = InMemoryScoreStore::new();
        let scene = Uuid::new_v4();
        store
            .save(SceneTrustScore {
                scene_id: scene,
                score: 0.1,
                computed_at: Utc::now(),
            })
            .unwrap();
        store
            .save(SceneTrustScore {
                scene_id: scene,
                score: 0.9,
                computed_at: Utc::now(),
            })
            .unwrap();
        let got = store.get(scene).unwrap().unwrap();
        assert!((got.score - 0.9).abs() <= 1e-9);
    }

    #[test]
    fn snapshot_scores_reflects_every_saved_scene() {
        let store = InMemoryScoreStore::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        store
            .save(SceneTrustScore {
                scene_id: a,
                score: 0.3,
                computed_at: Utc::now(),
            })
            .unwrap();
        store
            .save(SceneTrustScore {
                scene_id: b,
                score: 0.6,
                computed_at: Utc::now(),
            })
            .unwrap();

        let snapshot = store.snapshot_scores();
        assert_eq!(snapshot.len(), 2);
        assert!((snapshot[&a] - 0.3).abs() <= 1e-9);
        assert!((snapshot[&b] - 0.6).abs() <= 1e-9);
    }
}
