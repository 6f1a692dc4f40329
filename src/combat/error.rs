//! Combat errors

use thiserror::Error;

/// Errors surfaced by encounter operations. None of them are fatal; callers
/// decide whether to retry.
#[derive(Debug, Error)]
pub enum CombatError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("encounter has no active participants")]
    NoParticipants,

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("unsupported action: {0}")]
    UnsupportedAction(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl CombatError {
    pub fn encounter_not_found(id: i64) -> Self {
        Self::NotFound {
            entity: "encounter",
            id,
        }
    }

    pub fn participant_not_found(id: i64) -> Self {
        Self::NotFound {
            entity: "participant",
            id,
        }
    }

    pub fn combatant_not_found(id: i64) -> Self {
        Self::NotFound {
            entity: "combatant",
            id,
        }
    }
}

pub type CombatResult<T> = Result<T, CombatError>;
