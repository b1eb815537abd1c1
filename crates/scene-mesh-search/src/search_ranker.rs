//! Composite ranked-search scoring.
//!
//! `composite = 0.4 * text_relevance + 0.3 * proximity + 0.2 * recency
//! + 0.1 * trust_weight`. When the `RankingFlag` is disabled, `trust_weight`
//! is forced to `0.0` and its share is absorbed rather than rescaled, so
//! toggling the flag only ever raises a trusted scene's score.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use scene_mesh_core::{GeoPoint, Post};
use scene_mesh_repo::PostScorer;

use crate::ranking_flag::RankingFlag;

const WEIGHT_TEXT: f64 = 0.4;
const WEIGHT_PROXIMITY: f64 = 0.3;
const WEIGHT_RECENCY: f64 = 0.2;
const WEIGHT_TRUST: f64 = 0.1;

/// Decay half-life for the recency term, in hours.
const RECENCY_HALF_LIFE_HOURS: f64 = 24.0;

/// Distance (km) at which proximity score has decayed to one half.
const PROXIMITY_HALF_DISTANCE_KM: f64 = 10.0;

const EARTH_RADIUS_KM: f64 = 6371.0;

/// Scores posts for one search call. A fresh instance is constructed per
/// query since it captures the query's location and `now`; it is cheap
/// (a few fields) and holds no lock of its own beyond reading the shared
/// `RankingFlag`.
pub struct SearchRanker {
    query_location: Option<GeoPoint>,
    now: DateTime<Utc>,
    post_location: Box<dyn Fn(&Post) -> Option<GeoPoint> + Send + Sync>,
    ranking_flag: Arc<RankingFlag>,
}

impl SearchRanker {
    #[must_use]
    pub fn new(
        query_location: Option<GeoPoint>,
        now: DateTime<Utc>,
        post_location: impl Fn(&Post) -> Option<GeoPoint> + Send + Sync + 'static,
        ranking_flag: Arc<RankingFlag>,
    ) -> Self {
        Self {
            query_location,
            now,
            post_location: Box::new(post_location),
            ranking_flag,
        }
    }

    fn proximity(&self, post: &Post) -> f64 {
        let (Some(query), Some(candidate)) = (self.query_location, (self.post_location)(post))
        else {
            return 0.0;
        };
        let distance_km = haversine_km(query, candidate);
        PROXIMITY_HALF_DISTANCE_KM / (PROXIMITY_HALF_DISTANCE_KM + distance_km)
    }

    fn recency(&self, post: &Post) -> f64 {
        let age_hours = (self.now - post.created_at).num_seconds().max(0) as f64 / 3600.0;
        RECENCY_HALF_LIFE_HOURS / (RECENCY_HALF_LIFE_HOURS + age_hours)
    }
}

impl PostScorer for SearchRanker {
    fn score(&self, post: &Post, query: &str, trust_weight: f64) -> f64 {
        let effective_trust_weight = if self.ranking_flag.get() {
            trust_weight
        } else {
            0.0
        };

        WEIGHT_TEXT * text_relevance(query, &post.text)
            + WEIGHT_PROXIMITY * self.proximity(post)
            + WEIGHT_RECENCY * self.recency(post)
            + WEIGHT_TRUST * effective_trust_weight
    }
}

/// Deterministic query/post overlap ratio: the fraction of the query's
/// lowercase whitespace-delimited tokens that also appear in the post's
/// text. Opaque by design (spec only requires determinism, not a
/// particular IR algorithm).
fn text_relevance(query: &str, text: &str) -> f64 {
    let query_tokens: Vec<String> = query.split_whitespace().map(str::to_lowercase).collect();
    if query_tokens.is_empty() {
        return 0.0;
    }
    let text_lower = text.to_lowercase();
    let text_tokens: std::collections::HashSet<&str> = text_lower.split_whitespace().collect();
    let matched = query_tokens
        .iter()
        .filter(|t| text_tokens.contains(t.as_str()))
        .count();
    matched as f64 / query_tokens.len() as f64
}

fn haversine_km(a: GeoPoint, b: GeoPoint) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let dlat = (b.lat - a.lat).to_radians();
    let dlng = (b.lng - a.lng).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().asin()
}
