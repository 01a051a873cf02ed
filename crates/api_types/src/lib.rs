use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod recipient {
    use super::*;

    #[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub struct RecipientView {
        pub id: Uuid,
        pub name: String,
        pub organization: Option<String>,
        pub campaign: Option<String>,
        pub goal_minor: Option<i64>,
        pub balance_minor: i64,
        pub max_can_receive_minor: i64,
        /// Balance over goal in percent, one decimal.
        pub progress_percentage: Decimal,
    }
}

pub mod donation {
    use super::*;

    #[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub struct DonationView {
        pub id: Uuid,
        pub amount_minor: i64,
        /// Donor name, `Anonymous` when none was given.
        pub name: String,
        pub email: Option<String>,
        pub phone: Option<String>,
        pub note: Option<String>,
        pub recipient_id: Uuid,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub batch_id: Option<Uuid>,
        pub created_at: DateTime<Utc>,
    }
}

pub mod group_donation {
    use super::*;

    /// What one recipient would get.
    #[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub struct RecipientShare {
        pub recipient_id: Uuid,
        pub recipient_name: String,
        pub amount_minor: i64,
        pub goal_minor: Option<i64>,
        pub balance_minor: i64,
        pub max_can_receive_minor: i64,
    }

    #[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub struct GroupDonationPreview {
        pub distributions: Vec<RecipientShare>,
        pub total_distributed_minor: i64,
        pub average_amount: Decimal,
        pub max_distributable_minor: i64,
    }

    #[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub struct GroupDonationCreated {
        pub batch_id: Uuid,
        pub total_amount_minor: i64,
        /// Donations written, one per recipient with a positive share.
        pub recipient_count: usize,
        pub average_amount: Decimal,
        pub distributions: Vec<RecipientShare>,
    }

    /// Body of a rejected group donation over the group's capacity.
    #[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub struct ExceedsMaxDistributable {
        pub error: String,
        pub requested_minor: i64,
        pub max_distributable_minor: i64,
    }
}
