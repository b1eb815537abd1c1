//! Cross-cutting write paths: anything that must mark a scene dirty, or
//! that checks one repository's state while writing to another, lives here
//! rather than as a bare pass-through to a single repository.

use uuid::Uuid;

use scene_mesh_core::{Alliance, Label, Membership, Result};
use scene_mesh_repo::{EventUpdate, NewEvent, NewPost, NewScene, SceneUpdate, UpsertOutcome};

use crate::SceneMesh;

impl SceneMesh {
    pub fn create_scene(&self, new: NewScene) -> Result<Uuid> {
        self.scenes.create(new)
    }

    pub fn update_scene(&self, id: Uuid, update: SceneUpdate) -> Result<()> {
        self.scenes.update(id, update)
    }

    pub fn delete_scene(&self, id: Uuid) -> Result<()> {
        self.scenes.delete(id)
    }

    /// Creates an event, checking that its scene is live without this crate
    /// taking a hard dependency between the two repositories.
    pub fn create_event(&self, new: NewEvent) -> Result<Uuid> {
        self.events
            .create(new, |scene_id| self.scenes.exists_live(scene_id))
    }

    pub fn update_event(&self, id: Uuid, update: EventUpdate) -> Result<()> {
        self.events.update(id, update)
    }

    pub fn delete_event(&self, id: Uuid) -> Result<()> {
        self.events.delete(id)
    }

    /// Creates a post. Marks the owning scene dirty — a fresh post nudges
    /// that scene onto the next recompute cycle, mirroring the ingestion
    /// data flow described for `Upsert` below.
    pub fn create_post(&self, new: NewPost) -> Result<Uuid> {
        let scene_id = new.scene_id;
        let id = self.posts.create(new)?;
        if let Some(scene_id) = scene_id {
            self.dirty.mark(scene_id);
        }
        Ok(id)
    }

    /// Idempotent ingestion entry point: `PostRepository.Upsert`, then mark
    /// the owning scene dirty.
    pub fn upsert_post(&self, new: NewPost) -> Result<UpsertOutcome> {
        let scene_id = new.scene_id;
        let outcome = self.posts.upsert(new)?;
        if let Some(scene_id) = scene_id {
            self.dirty.mark(scene_id);
        }
        Ok(outcome)
    }

    pub fn update_post(
        &self,
        id: Uuid,
        text: String,
        attachments: Vec<String>,
        labels: Vec<Label>,
    ) -> Result<()> {
        self.posts.update(id, text, attachments, labels)
    }

    pub fn delete_post(&self, id: Uuid) -> Result<()> {
        self.posts.delete(id)
    }

    /// Adds or updates a user's membership in a scene, marking the scene
    /// dirty: membership changes mark scene dirty.
    pub fn upsert_membership(&self, membership: Membership) -> Result<()> {
        let scene_id = self.data_source.upsert_membership(membership)?;
        self.dirty.mark(scene_id);
        Ok(())
    }

    pub fn remove_membership(&self, scene_id: Uuid, user_did: &str) {
        self.data_source.remove_membership(scene_id, user_did);
        self.dirty.mark(scene_id);
    }

    /// Adds or updates an outgoing alliance edge, marking the authoritative
    /// source scene dirty: alliance creation/change marks the source scene.
    pub fn upsert_alliance(&self, alliance: Alliance) -> Result<()> {
        let scene_id = self.data_source.upsert_alliance(alliance)?;
        self.dirty.mark(scene_id);
        Ok(())
    }

    pub fn remove_alliance(&self, from_scene_id: Uuid, to_scene_id: Uuid) {
        self.data_source.remove_alliance(from_scene_id, to_scene_id);
        self.dirty.mark(from_scene_id);
    }
}
