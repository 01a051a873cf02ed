//! Command structs for engine operations.
//!
//! These types group parameters for donation writes and group previews,
//! keeping call sites readable and avoiding long argument lists.

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{Donor, GroupCriterion, MoneyCents};

/// Donate to one recipient.
#[derive(Clone, Debug)]
pub struct DonationNew {
    pub recipient_id: Uuid,
    pub amount: MoneyCents,
    pub donor: Donor,
    pub note: Option<String>,
}

impl DonationNew {
    #[must_use]
    pub fn new(recipient_id: Uuid, amount: MoneyCents) -> Self {
        Self {
            recipient_id,
            amount,
            donor: Donor::default(),
            note: None,
        }
    }

    #[must_use]
    pub fn donor(mut self, donor: Donor) -> Self {
        self.donor = donor;
        self
    }

    #[must_use]
    pub fn note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// Split one donation among every eligible recipient of a group.
#[derive(Clone, Debug)]
pub struct GroupDonationNew {
    pub criterion: GroupCriterion,
    pub amount: MoneyCents,
    /// `None` behaves as an equal split.
    pub bias_factor: Option<Decimal>,
    pub donor: Donor,
    pub note: Option<String>,
}

impl GroupDonationNew {
    #[must_use]
    pub fn new(criterion: GroupCriterion, amount: MoneyCents) -> Self {
        Self {
            criterion,
            amount,
            bias_factor: None,
            donor: Donor::default(),
            note: None,
        }
    }

    #[must_use]
    pub fn bias_factor(mut self, bias_factor: Decimal) -> Self {
        self.bias_factor = Some(bias_factor);
        self
    }

    #[must_use]
    pub fn donor(mut self, donor: Donor) -> Self {
        self.donor = donor;
        self
    }

    #[must_use]
    pub fn note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    /// The read-only part of the command.
    pub fn preview(&self) -> GroupPreviewCmd {
        GroupPreviewCmd {
            criterion: self.criterion.clone(),
            amount: self.amount,
            bias_factor: self.bias_factor,
        }
    }
}

/// Compute a group split without writing anything.
#[derive(Clone, Debug)]
pub struct GroupPreviewCmd {
    pub criterion: GroupCriterion,
    pub amount: MoneyCents,
    pub bias_factor: Option<Decimal>,
}

impl GroupPreviewCmd {
    #[must_use]
    pub fn new(criterion: GroupCriterion, amount: MoneyCents) -> Self {
        Self {
            criterion,
            amount,
            bias_factor: None,
        }
    }

    #[must_use]
    pub fn bias_factor(mut self, bias_factor: Decimal) -> Self {
        self.bias_factor = Some(bias_factor);
        self
    }
}
