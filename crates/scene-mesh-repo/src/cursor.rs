//! Opaque pagination cursors.
//!
//! `FeedCursor` names the `(createdAt, id)` boundary of the last row
//! returned by a feed query; `SearchCursor` names the `(score, id)`
//! boundary of a ranked search. Both are stateless on the server: the
//! entire cursor lives in the string a client hands back on the next call.
//!
//! The struct shape mirrors the teacher's own `SearchCursor`
//! (`score: f64, id`) but the wire format does not: this one is the
//! human-readable `"<score:%.6f>:<id>"` form, not a bit-exact hex
//! encoding, because the fixed 6-decimal precision is itself part of the
//! round-trip contract and is meant to be observable in bug reports.

use chrono::{DateTime, SecondsFormat, Utc};
use uuid::Uuid;

/// The `(createdAt, id)` boundary of the last row returned by a feed page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedCursor {
    pub created_at: DateTime<Utc>,
    pub id: Uuid,
}

impl FeedCursor {
    #[must_use]
    pub fn encode(&self) -> String {
        format!(
            "{}:{}",
            self.created_at.to_rfc3339_opts(SecondsFormat::Nanos, true),
            self.id
        )
    }

    #[must_use]
    pub fn decode(token: &str) -> Option<Self> {
        let (ts, id) = token.rsplit_once(':')?;
        let created_at = DateTime::parse_from_rfc3339(ts).ok()?.with_timezone(&Utc);
        let id = Uuid::parse_str(id).ok()?;
        Some(Self { created_at, id })
    }

    /// Whether `(created_at, id)` is a strict successor of this cursor in
    /// `createdAt DESC, id ASC` order.
    #[must_use]
    pub fn includes(&self, created_at: DateTime<Utc>, id: Uuid) -> bool {
        created_at < self.created_at || (created_at == self.created_at && id > self.id)
    }
}

/// The `(score, id)` boundary of the last row returned by a ranked-search
/// page. Score is rounded to 6 decimal places on encode; decode restores
/// exactly that rounded value, not the pre-rounding float.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchCursor {
    pub score: f64,
    pub id: Uuid,
}

impl SearchCursor {
    #[must_use]
    pub fn encode(&self) -> String {
        format!("{:.6}:{}", self.score, self.id)
    }

    #[must_use]
    pub fn decode(token: &str) -> Option<Self> {
        let (score, id) = token.rsplit_once(':')?;
        let score = score.parse::<f64>().ok()?;
        let id = Uuid::parse_str(id).ok()?;
        Some(Self { score, id })
    }

    /// Whether `(score, id)` is a strict successor of this cursor in
    /// descending-score, ascending-id order.
    #[must_use]
    pub fn includes(&self, score: f64, id: Uuid) -> bool {
        score < self.score || (score == self.score && id > self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn feed_cursor_round_trips() {
        let cursor = FeedCursor {
            created_at: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
            id: Uuid::nil(),
        };
        let token = cursor.encode();
        let decoded = FeedCursor::decode(&token).expect("should decode");
        assert_eq!(decoded, cursor);
    }

    #[test]
    fn search_cursor_round_trips_to_six_decimals() {
        let cursor = SearchCursor {
            score: 0.123_456_789,
            id: Uuid::nil(),
        };
        let token = cursor.encode();
        assert_eq!(token, format!("0.123457:{}", Uuid::nil()));
        let decoded = SearchCursor::decode(&token).expect("should decode");
        assert!((decoded.score - 0.123_457).abs() < 1e-9);
    }

    #[test]
    fn search_cursor_decode_rejects_garbage() {
        assert!(SearchCursor::decode("not-a-cursor").is_none());
        assert!(SearchCursor::decode("abc:not-a-uuid").is_none());
    }

    #[test]
    fn feed_cursor_includes_strict_successor_only() {
        let t0 = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let t_earlier = Utc.with_ymd_and_hms(2025, 12, 31, 0, 0, 0).unwrap();
        let id_a = Uuid::from_u128(1);
        let id_b = Uuid::from_u128(2);
        let cursor = FeedCursor {
            created_at: t0,
            id: id_a,
        };

        assert!(cursor.includes(t_earlier, id_a));
        assert!(cursor.includes(t0, id_b));
        assert!(!cursor.includes(t0, id_a));
        assert!(!cursor.includes(t0, Uuid::from_u128(0)));
    }

    #[test]
    fn search_cursor_includes_strict_successor_only() {
        let id_a = Uuid::from_u128(1);
        let id_b = Uuid::from_u128(2);
        let cursor = SearchCursor {
            score: 0.5,
            id: id_a,
        };

        assert!(cursor.includes(0.4, id_a));
        assert!(cursor.includes(0.5, id_b));
        assert!(!cursor.includes(0.5, id_a));
        assert!(!cursor.includes(0.6, id_a));
    }
}
