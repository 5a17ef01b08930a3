//! Engagement scoring and time-decayed popularity.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::error::DomainError;

const DEFAULT_LIKE_WEIGHT: f64 = 2.0;
const DEFAULT_DISLIKE_WEIGHT: f64 = -1.0;
const DEFAULT_VIEW_WEIGHT: f64 = 0.1;
const DEFAULT_COMMENT_WEIGHT: f64 = 3.0;
const DEFAULT_GRAVITY: f64 = 1.8;

/// Offset added to the age in hours so that brand new items do not divide by ~0.
pub const POPULARITY_AGE_OFFSET_HOURS: f64 = 2.0;

/// Weight set applied to counter deltas. Injected into the stores at
/// construction time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    pub like_weight: f64,
    pub dislike_weight: f64,
    pub view_weight: f64,
    pub comment_weight: f64,
    pub gravity: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            like_weight: DEFAULT_LIKE_WEIGHT,
            dislike_weight: DEFAULT_DISLIKE_WEIGHT,
            view_weight: DEFAULT_VIEW_WEIGHT,
            comment_weight: DEFAULT_COMMENT_WEIGHT,
            gravity: DEFAULT_GRAVITY,
        }
    }
}

impl ScoringConfig {
    pub fn validate(self) -> Result<Self, DomainError> {
        let weights = [
            ("like_weight", self.like_weight),
            ("dislike_weight", self.dislike_weight),
            ("view_weight", self.view_weight),
            ("comment_weight", self.comment_weight),
            ("gravity", self.gravity),
        ];
        for (name, value) in weights {
            if !value.is_finite() {
                return Err(DomainError::validation(format!(
                    "scoring `{name}` must be a finite number"
                )));
            }
        }
        if self.gravity < 0.0 {
            return Err(DomainError::validation(
                "scoring `gravity` must not be negative",
            ));
        }
        Ok(self)
    }

    /// Full score for absolute counter values.
    pub fn score_for(&self, views: i64, likes: i64, dislikes: i64, comments: i64) -> f64 {
        CounterDelta {
            views,
            likes,
            dislikes,
            comments,
        }
        .score_delta(self)
    }
}

/// Signed counter changes applied together in one atomic store update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterDelta {
    pub views: i64,
    pub likes: i64,
    pub dislikes: i64,
    pub comments: i64,
}

impl CounterDelta {
    pub fn views(delta: i64) -> Self {
        Self {
            views: delta,
            ..Self::default()
        }
    }

    pub fn likes(delta: i64) -> Self {
        Self {
            likes: delta,
            ..Self::default()
        }
    }

    pub fn dislikes(delta: i64) -> Self {
        Self {
            dislikes: delta,
            ..Self::default()
        }
    }

    pub fn comments(delta: i64) -> Self {
        Self {
            comments: delta,
            ..Self::default()
        }
    }

    pub fn interactions(likes: i64, dislikes: i64) -> Self {
        Self {
            likes,
            dislikes,
            ..Self::default()
        }
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::default()
    }

    /// Change to `engagement_score` implied by this delta.
    pub fn score_delta(&self, config: &ScoringConfig) -> f64 {
        let mut delta = 0.0;
        if self.views != 0 {
            delta += self.views as f64 * config.view_weight;
        }
        if self.likes != 0 {
            delta += self.likes as f64 * config.like_weight;
        }
        if self.dislikes != 0 {
            delta += self.dislikes as f64 * config.dislike_weight;
        }
        if self.comments != 0 {
            delta += self.comments as f64 * config.comment_weight;
        }
        delta
    }
}

/// Age of an item in fractional hours, clamped at zero for clock skew.
pub fn age_in_hours(created_at: OffsetDateTime, now: OffsetDateTime) -> f64 {
    ((now - created_at).as_seconds_f64() / 3600.0).max(0.0)
}

/// `score / (age_hours + 2) ^ gravity`, computed at read time only.
pub fn popularity(
    engagement_score: f64,
    created_at: OffsetDateTime,
    now: OffsetDateTime,
    gravity: f64,
) -> f64 {
    let age = age_in_hours(created_at, now);
    engagement_score / (age + POPULARITY_AGE_OFFSET_HOURS).powf(gravity)
}
