//! Pure trust-score computation.
//!
//! `score` takes no lock and touches no store — it is safe to call from
//! any thread, including concurrently with itself.

use scene_mesh_core::{Alliance, Membership, Role};

/// Role multiplier lookup. Roles outside the closed set (there are none in
/// the `Role` enum today, but a future wire payload could carry an unknown
/// string before parsing) contribute zero trust rather than being rejected
/// or silently inflating a scene's score.
#[must_use]
pub fn role_mult(role: Role) -> f64 {
    match role {
        Role::Owner => 1.0,
        Role::Curator => 0.8,
        Role::Member => 0.5,
        Role::Guest => 0.3,
    }
}

/// Computes the composite trust score for a scene from its memberships and
/// outgoing alliances.
///
/// ```text
/// if |M| = 0: return 0
/// allianceAvg = (|A| = 0) ? 1.0 : mean(a.weight for a in A)
/// memberAvg   = mean(m.trustWeight * roleMult(m.role) for m in M)
/// score       = allianceAvg * memberAvg
/// ```
///
/// An empty alliance set defaults `allianceAvg` to `1.0` so a scene with
/// members but no alliances is scored by its own membership alone.
#[must_use]
pub fn score(memberships: &[Membership], alliances: &[Alliance]) -> f64 {
    if memberships.is_empty() {
        return 0.0;
    }

    let alliance_avg = if alliances.is_empty() {
        1.0
    } else {
        alliances.iter().map(|a| a.weight).sum::<f64>() / alliances.len() as f64
    };

    let member_avg = memberships
        .iter()
        .map(|m| m.trust_weight * role_mult(m.role))
        .sum::<f64>()
        / memberships.len() as f64;

    alliance_avg * member_avg
}
