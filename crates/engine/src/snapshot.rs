//! Read-only view of a recipient taken at the start of a request.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::MoneyCents;

/// Immutable per-request view of a recipient.
///
/// Snapshots are built fresh from the store for every request and never
/// mutated: the allocation math produces new values instead. A snapshot with
/// no `goal` has no cap to fill and never receives funds.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipientSnapshot {
    pub id: Uuid,
    pub goal: Option<Decimal>,
    pub balance: Decimal,
}

impl RecipientSnapshot {
    pub fn new(id: Uuid, goal: Option<Decimal>, balance: Decimal) -> Self {
        Self { id, goal, balance }
    }

    /// Builds a snapshot from stored minor-unit values.
    pub fn from_cents(id: Uuid, goal: Option<MoneyCents>, balance: MoneyCents) -> Self {
        Self::new(id, goal.map(MoneyCents::to_decimal), balance.to_decimal())
    }

    /// `max(goal - balance, 0)`, or zero when the goal is not defined.
    pub fn need(&self) -> Decimal {
        match self.goal {
            Some(goal) => (goal - self.balance).max(Decimal::ZERO),
            None => Decimal::ZERO,
        }
    }

    /// Still under a defined goal, strictly.
    pub fn is_under_goal(&self) -> bool {
        self.goal.is_some_and(|goal| self.balance < goal)
    }
}
