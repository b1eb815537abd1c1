//! Data models shared across the scene-mesh core: `Scene`, `Event`, `Post`,
//! `Membership`, `Alliance`, and `SceneTrustScore`.
//!
//! Cross-references between these types are plain ids (`Uuid`), never owning
//! references — posts reference a scene, memberships belong to a scene, but
//! neither side owns the other. This avoids a cyclic ownership graph in an
//! otherwise pointer-heavy domain.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A geographic point. Only ever materialized on a record when
/// `allow_precise` is `true` — `ConsentGuard` enforces this at every
/// persistence path.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

/// Visibility level for a `Scene`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Visibility {
    Public,
    Private,
    Unlisted,
}

// =============================================================================
// Scene
// =============================================================================

/// A curated group with an owner, a coarse public location, an optional
/// precise location, and a membership list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scene {
    pub id: Uuid,
    pub owner_did: String,
    pub name: String,
    pub allow_precise: bool,
    pub precise_point: Option<GeoPoint>,
    pub coarse_geohash: String,
    pub visibility: Visibility,
    pub tags: Vec<String>,
    pub palette: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

// =============================================================================
// Event
// =============================================================================

/// A scene-scoped occurrence with its own location consent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub scene_id: Uuid,
    pub name: String,
    pub allow_precise: bool,
    pub precise_point: Option<GeoPoint>,
    pub coarse_geohash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

// =============================================================================
// Post
// =============================================================================

/// The closed set of moderation labels. Case-sensitive, exhaustive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Label {
    Hidden,
    Nsfw,
    Flagged,
    Spam,
}

impl Label {
    /// The closed set of allowed labels, in canonical order.
    pub const ALL: [Self; 4] = [Self::Hidden, Self::Nsfw, Self::Flagged, Self::Spam];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Hidden => "hidden",
            Self::Nsfw => "nsfw",
            Self::Flagged => "flagged",
            Self::Spam => "spam",
        }
    }

    /// Parse a label from its canonical (case-sensitive) string form.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "hidden" => Some(Self::Hidden),
            "nsfw" => Some(Self::Nsfw),
            "flagged" => Some(Self::Flagged),
            "spam" => Some(Self::Spam),
            _ => None,
        }
    }
}

/// The `(authorDID, recordRKey)` identity of a post mirrored from an
/// external record (e.g. an AT Protocol commit). A post created directly
/// through this system (not ingested) has no record key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordKey {
    pub record_did: String,
    pub record_rkey: String,
}

/// A textual item attached to a scene and/or event, optionally mirrored from
/// an external record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: Uuid,
    pub scene_id: Option<Uuid>,
    pub event_id: Option<Uuid>,
    pub author_did: String,
    pub text: String,
    pub attachments: Vec<String>,
    pub labels: Vec<Label>,
    pub record_key: Option<RecordKey>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Post {
    #[must_use]
    pub fn has_label(&self, label: Label) -> bool {
        self.labels.contains(&label)
    }
}

// =============================================================================
// Membership / Alliance
// =============================================================================

/// The closed set of membership roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Owner,
    Curator,
    Member,
    Guest,
}

impl Role {
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "owner" => Some(Self::Owner),
            "curator" => Some(Self::Curator),
            "member" => Some(Self::Member),
            "guest" => Some(Self::Guest),
            _ => None,
        }
    }
}

/// A `(scene, user, role, trust weight)` tuple.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Membership {
    pub scene_id: Uuid,
    pub user_did: String,
    pub role: Role,
    pub trust_weight: f64,
}

/// A directed weighted edge between two scenes. The source scene is
/// authoritative: creation/change of an alliance marks the source scene
/// dirty, never the target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alliance {
    pub from_scene_id: Uuid,
    pub to_scene_id: Uuid,
    pub weight: f64,
}

// =============================================================================
// SceneTrustScore
// =============================================================================

/// The composite number the `RecomputeEngine` writes to the `ScoreStore`.
/// Absence (`ScoreStore::get` returning `None`) means "never computed".
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SceneTrustScore {
    pub scene_id: Uuid,
    pub score: f64,
    pub computed_at: DateTime<Utc>,
}
