//! Outcome types of group donations.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Candidate, Donation, MoneyCents};

/// The cents one eligible recipient gets out of a group donation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Share {
    pub candidate: Candidate,
    pub amount: MoneyCents,
}

impl Share {
    pub fn recipient_id(&self) -> Uuid {
        self.candidate.snapshot.id
    }
}

/// A group split converted to cents, aligned with the eligible recipients.
///
/// Recipients that get nothing still appear, with a zero amount.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupAllocation {
    pub shares: Vec<Share>,
    pub total_distributed: MoneyCents,
    /// Rounded to cents.
    pub average_amount: Decimal,
    pub max_distributable: MoneyCents,
}

impl GroupAllocation {
    /// Shares with a positive amount, the ones that become donations.
    pub fn funded(&self) -> impl Iterator<Item = &Share> + '_ {
        self.shares.iter().filter(|share| share.amount.is_positive())
    }
}

/// What a committed group donation wrote.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupDonationReceipt {
    pub batch_id: Uuid,
    pub total_amount: MoneyCents,
    pub donations: Vec<Donation>,
    pub allocation: GroupAllocation,
}
