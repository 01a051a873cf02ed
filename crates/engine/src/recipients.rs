//! The module contains `Recipient`, the entity donations accrue towards.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::{ActiveValue, prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Candidate, EngineError, MoneyCents, RecipientSnapshot, util::parse_uuid};

/// A recipient and the group attributes it is selected by.
///
/// The goal is the one of the recipient's campaign; a recipient outside any
/// campaign has no goal.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    pub id: Uuid,
    pub name: String,
    pub organization: Option<String>,
    pub campaign: Option<String>,
    pub goal: Option<MoneyCents>,
    pub balance: MoneyCents,
    pub created_at: DateTime<Utc>,
}

impl Recipient {
    /// `max(goal - balance, 0)`; zero without a goal.
    pub fn max_can_receive(&self) -> MoneyCents {
        match self.goal {
            Some(goal) if goal > self.balance => goal - self.balance,
            _ => MoneyCents::ZERO,
        }
    }

    /// Balance over goal; zero without a goal.
    pub fn progress(&self) -> Decimal {
        match self.goal {
            Some(goal) if goal.is_positive() => self.balance.to_decimal() / goal.to_decimal(),
            _ => Decimal::ZERO,
        }
    }

    pub fn has_reached_goal(&self) -> bool {
        self.goal.is_some_and(|goal| self.balance >= goal)
    }

    pub fn snapshot(&self) -> RecipientSnapshot {
        RecipientSnapshot::from_cents(self.id, self.goal, self.balance)
    }

    pub fn to_candidate(&self) -> Candidate {
        Candidate {
            snapshot: self.snapshot(),
            name: self.name.clone(),
            organization: self.organization.clone(),
            campaign: self.campaign.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "recipients")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub name: String,
    pub organization_id: Option<String>,
    pub campaign_id: Option<String>,
    pub balance_minor: i64,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::donations::Entity")]
    Donations,
    #[sea_orm(
        belongs_to = "super::organizations::Entity",
        from = "Column::OrganizationId",
        to = "super::organizations::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Organizations,
    #[sea_orm(
        belongs_to = "super::campaigns::Entity",
        from = "Column::CampaignId",
        to = "super::campaigns::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Campaigns,
}

impl Related<super::donations::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Donations.def()
    }
}

impl Related<super::organizations::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Organizations.def()
    }
}

impl Related<super::campaigns::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Campaigns.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Row to insert for a brand new recipient, balance starting at zero.
pub(crate) fn new_active_model(
    name: String,
    organization_id: Option<Uuid>,
    campaign_id: Option<Uuid>,
    created_at: DateTime<Utc>,
) -> (Uuid, ActiveModel) {
    let id = Uuid::new_v4();
    let model = ActiveModel {
        id: ActiveValue::Set(id.to_string()),
        name: ActiveValue::Set(name),
        organization_id: ActiveValue::Set(organization_id.map(|id| id.to_string())),
        campaign_id: ActiveValue::Set(campaign_id.map(|id| id.to_string())),
        balance_minor: ActiveValue::Set(0),
        created_at: ActiveValue::Set(created_at),
    };
    (id, model)
}

/// Joins a stored row with the names and goal of its groups.
impl TryFrom<(Model, Option<&super::organizations::Model>, Option<&super::campaigns::Model>)>
    for Recipient
{
    type Error = EngineError;

    fn try_from(
        (model, organization, campaign): (
            Model,
            Option<&super::organizations::Model>,
            Option<&super::campaigns::Model>,
        ),
    ) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_uuid(&model.id, "recipient")?,
            name: model.name,
            organization: organization.map(|o| o.name.clone()),
            campaign: campaign.map(|c| c.name.clone()),
            goal: campaign.and_then(|c| c.goal_minor).map(MoneyCents::new),
            balance: MoneyCents::new(model.balance_minor),
            created_at: model.created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recipient(goal: Option<i64>, balance: i64) -> Recipient {
        Recipient {
            id: Uuid::new_v4(),
            name: "Ada".to_string(),
            organization: None,
            campaign: Some("Lisbon".to_string()),
            goal: goal.map(MoneyCents::new),
            balance: MoneyCents::new(balance),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn max_can_receive_is_remaining_need() {
        assert_eq!(recipient(Some(10_000), 9_500).max_can_receive(), MoneyCents::new(500));
        assert_eq!(recipient(Some(10_000), 12_000).max_can_receive(), MoneyCents::ZERO);
        assert_eq!(recipient(None, 0).max_can_receive(), MoneyCents::ZERO);
    }

    #[test]
    fn progress_is_balance_over_goal() {
        assert_eq!(recipient(Some(10_000), 2_500).progress(), Decimal::new(25, 2));
        assert_eq!(recipient(None, 2_500).progress(), Decimal::ZERO);
        assert!(recipient(Some(100), 100).has_reached_goal());
        assert!(!recipient(None, 100).has_reached_goal());
    }
}
