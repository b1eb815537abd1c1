//! Location-consent enforcement for `Scene` and `Event` records.
//!
//! `enforce` is total: it never fails and always leaves the record in a
//! state where `precise_point` is `None` whenever `allow_precise` is
//! `false`. Callers may freely carry both fields together in memory (e.g.
//! while toggling consent); only the persistence path must call `enforce`
//! immediately before the write commits.

use scene_mesh_core::{Event, Scene};

/// A record carrying a location-consent flag and an optional precise point.
///
/// Implemented for `Scene` and `Event`, the two entities whose writes must
/// pass through `enforce` before commit.
pub trait LocationConsent {
    fn allow_precise(&self) -> bool;
    fn clear_precise_point(&mut self);
}

impl LocationConsent for Scene {
    fn allow_precise(&self) -> bool {
        self.allow_precise
    }

    fn clear_precise_point(&mut self) {
        self.precise_point = None;
    }
}

impl LocationConsent for Event {
    fn allow_precise(&self) -> bool {
        self.allow_precise
    }

    fn clear_precise_point(&mut self) {
        self.precise_point = None;
    }
}

/// Clears `precise_point` on `record` whenever `allow_precise` is `false`.
///
/// Must be called on every repository mutation path (Create/Update/Upsert
/// of `Scene` and `Event`) immediately before the write commits.
pub fn enforce<T: LocationConsent>(record: &mut T) {
    if !record.allow_precise() {
        record.clear_precise_point();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use scene_mesh_core::{GeoPoint, Visibility};
    use uuid::Uuid;

    fn sample_scene(allow_precise: bool, point: Option<GeoPoint>) -> Scene {
        let now = Utc::now();
        Scene {
            id: Uuid::new_v4(),
            owner_did: "did:plc:owner".to_string(),
            name: "test scene".to_string(),
            allow_precise,
            precise_point: point,
            coarse_geohash: "u4pruy".to_string(),
            visibility: Visibility::Public,
            tags: vec![],
            palette: vec![],
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    #[test]
    fn clears_precise_point_when_consent_revoked() {
        let mut scene = sample_scene(false, Some(GeoPoint { lat: 1.0, lng: 2.0 }));
        enforce(&mut scene);
        assert!(scene.precise_point.is_none());
    }

    #[test]
    fn preserves_precise_point_when_consent_given() {
        let point = GeoPoint { lat: 1.0, lng: 2.0 };
        let mut scene = sample_scene(true, Some(point));
        enforce(&mut scene);
        assert_eq!(scene.precise_point, Some(point));
    }

    #[test]
    fn no_op_when_already_absent() {
        let mut scene = sample_scene(false, None);
        enforce(&mut scene);
        assert!(scene.precise_point.is_none());
    }

    proptest::proptest! {
        #[test]
        fn consent_is_total(allow_precise: bool, lat in -90.0..90.0f64, lng in -180.0..180.0f64) {
            let mut scene = sample_scene(allow_precise, Some(GeoPoint { lat, lng }));
            enforce(&mut scene);
            if !allow_precise {
                proptest::prop_assert!(scene.precise_point.is_none());
            } else {
                proptest::prop_assert!(scene.precise_point.is_some());
            }
        }
    }
}
