//! Conversions from engine types to the `api_types` wire shapes.

use api_types::{
    donation::DonationView,
    group_donation::{GroupDonationCreated, GroupDonationPreview, RecipientShare},
    recipient::RecipientView,
};
use engine::{Donation, GroupAllocation, GroupDonationReceipt, MoneyCents, Recipient, Share};
use rust_decimal::Decimal;

pub fn recipient(recipient: &Recipient) -> RecipientView {
    RecipientView {
        id: recipient.id,
        name: recipient.name.clone(),
        organization: recipient.organization.clone(),
        campaign: recipient.campaign.clone(),
        goal_minor: recipient.goal.map(MoneyCents::cents),
        balance_minor: recipient.balance.cents(),
        max_can_receive_minor: recipient.max_can_receive().cents(),
        progress_percentage: (recipient.progress() * Decimal::ONE_HUNDRED).round_dp(1),
    }
}

pub fn donation(donation: &Donation) -> DonationView {
    DonationView {
        id: donation.id,
        amount_minor: donation.amount.cents(),
        name: donation.donor.display_name().to_string(),
        email: donation.donor.email.clone(),
        phone: donation.donor.phone.clone(),
        note: donation.note.clone(),
        recipient_id: donation.recipient_id,
        batch_id: donation.batch_id,
        created_at: donation.created_at,
    }
}

fn share(share: &Share) -> RecipientShare {
    let snapshot = &share.candidate.snapshot;
    let to_minor = |value: Decimal| MoneyCents::from_decimal_round(value).map(MoneyCents::cents);
    RecipientShare {
        recipient_id: snapshot.id,
        recipient_name: share.candidate.name.clone(),
        amount_minor: share.amount.cents(),
        goal_minor: snapshot.goal.and_then(to_minor),
        balance_minor: to_minor(snapshot.balance).unwrap_or_default(),
        max_can_receive_minor: to_minor(snapshot.need()).unwrap_or_default(),
    }
}

pub fn preview(allocation: &GroupAllocation) -> GroupDonationPreview {
    GroupDonationPreview {
        distributions: allocation.shares.iter().map(share).collect(),
        total_distributed_minor: allocation.total_distributed.cents(),
        average_amount: allocation.average_amount,
        max_distributable_minor: allocation.max_distributable.cents(),
    }
}

pub fn created(receipt: &GroupDonationReceipt) -> GroupDonationCreated {
    GroupDonationCreated {
        batch_id: receipt.batch_id,
        total_amount_minor: receipt.total_amount.cents(),
        recipient_count: receipt.donations.len(),
        average_amount: receipt.allocation.average_amount,
        distributions: receipt.allocation.funded().map(share).collect(),
    }
}
