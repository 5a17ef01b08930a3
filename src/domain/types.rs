//! Shared domain enumerations aligned with persisted database enums.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use super::error::DomainError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "interaction_action", rename_all = "snake_case")]
pub enum InteractionAction {
    Like,
    Dislike,
}

impl InteractionAction {
    pub fn as_str(self) -> &'static str {
        match self {
            InteractionAction::Like => "like",
            InteractionAction::Dislike => "dislike",
        }
    }

    /// Signed `(likes, dislikes)` deltas for adding (`sign = 1`) or removing
    /// (`sign = -1`) one interaction of this kind.
    pub fn counter_deltas(self, sign: i64) -> (i64, i64) {
        match self {
            InteractionAction::Like => (sign, 0),
            InteractionAction::Dislike => (0, sign),
        }
    }
}

impl fmt::Display for InteractionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InteractionAction {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "like" => Ok(InteractionAction::Like),
            "dislike" => Ok(InteractionAction::Dislike),
            other => Err(DomainError::validation(format!(
                "unknown interaction action `{other}`"
            ))),
        }
    }
}
