//! The module contains the errors the engine can return.
//!
//! Every variant except [`Database`] is an expected, recoverable condition
//! carrying enough detail for the caller to build a corrected request:
//!
//! - [`NoEligibleRecipients`] when a group criterion selects nobody.
//! - [`ExceedsMaxDistributable`] when a group donation is larger than the
//!   combined need of the eligible recipients.
//! - [`ExceedsGoal`] when a single donation would push a recipient over its
//!   goal.
//! - [`PartialPersistenceFailure`] when one row of a group batch cannot be
//!   written; the whole batch has been rolled back.
//!
//! [`Database`] wraps storage failures and has no engine semantics.
//!
//!  [`NoEligibleRecipients`]: EngineError::NoEligibleRecipients
//!  [`ExceedsMaxDistributable`]: EngineError::ExceedsMaxDistributable
//!  [`ExceedsGoal`]: EngineError::ExceedsGoal
//!  [`PartialPersistenceFailure`]: EngineError::PartialPersistenceFailure
//!  [`Database`]: EngineError::Database
use sea_orm::DbErr;
use thiserror::Error;
use uuid::Uuid;

use crate::MoneyCents;

/// Engine custom errors.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("No eligible recipients found for the specified criteria")]
    NoEligibleRecipients,
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("Invalid bias factor: {0}")]
    InvalidBiasFactor(String),
    #[error("Invalid note: {0}")]
    InvalidNote(String),
    #[error("Invalid name: {0}")]
    InvalidName(String),
    #[error("Donation amount {requested} exceeds maximum distributable amount {max}")]
    ExceedsMaxDistributable {
        requested: MoneyCents,
        max: MoneyCents,
    },
    #[error("Donation would exceed the goal of recipient {recipient_id}: {projected} > {goal}")]
    ExceedsGoal {
        recipient_id: Uuid,
        projected: MoneyCents,
        goal: MoneyCents,
    },
    #[error("Failed to create donation for recipient {recipient_id}: {reason}")]
    PartialPersistenceFailure { recipient_id: Uuid, reason: String },
    #[error("\"{0}\" key not found!")]
    KeyNotFound(String),
    #[error("\"{0}\" already present!")]
    ExistingKey(String),
    #[error("Invalid id: {0}")]
    InvalidId(String),
    #[error(transparent)]
    Database(#[from] DbErr),
}

impl PartialEq for EngineError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::NoEligibleRecipients, Self::NoEligibleRecipients) => true,
            (Self::InvalidAmount(a), Self::InvalidAmount(b)) => a == b,
            (Self::InvalidBiasFactor(a), Self::InvalidBiasFactor(b)) => a == b,
            (Self::InvalidNote(a), Self::InvalidNote(b)) => a == b,
            (Self::InvalidName(a), Self::InvalidName(b)) => a == b,
            (
                Self::ExceedsMaxDistributable {
                    requested: r1,
                    max: m1,
                },
                Self::ExceedsMaxDistributable {
                    requested: r2,
                    max: m2,
                },
            ) => r1 == r2 && m1 == m2,
            (
                Self::ExceedsGoal {
                    recipient_id: i1,
                    projected: p1,
                    goal: g1,
                },
                Self::ExceedsGoal {
                    recipient_id: i2,
                    projected: p2,
                    goal: g2,
                },
            ) => i1 == i2 && p1 == p2 && g1 == g2,
            (
                Self::PartialPersistenceFailure {
                    recipient_id: a,
                    reason: ra,
                },
                Self::PartialPersistenceFailure {
                    recipient_id: b,
                    reason: rb,
                },
            ) => a == b && ra == rb,
            (Self::KeyNotFound(a), Self::KeyNotFound(b)) => a == b,
            (Self::ExistingKey(a), Self::ExistingKey(b)) => a == b,
            (Self::InvalidId(a), Self::InvalidId(b)) => a == b,
            (Self::Database(a), Self::Database(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}
