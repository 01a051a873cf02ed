//! Campaigns carry the fundraising goal shared by their recipients (for
//! example a trip every enrolled student raises money for).

use sea_orm::entity::{ActiveValue, prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, MoneyCents, ResultEngine, util::parse_uuid};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Campaign {
    pub id: Uuid,
    pub name: String,
    /// Cap every recipient's balance must stay under. Without a goal the
    /// campaign's recipients cannot receive group donations.
    pub goal: Option<MoneyCents>,
}

impl Campaign {
    pub fn new(name: String, goal: Option<MoneyCents>) -> ResultEngine<Self> {
        if let Some(goal) = goal
            && !goal.is_positive()
        {
            return Err(EngineError::InvalidAmount(format!(
                "goal of campaign '{name}' must be > 0"
            )));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            name,
            goal,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "campaigns")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub name: String,
    pub goal_minor: Option<i64>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::recipients::Entity")]
    Recipients,
}

impl Related<super::recipients::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Recipients.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Campaign> for ActiveModel {
    fn from(value: &Campaign) -> Self {
        Self {
            id: ActiveValue::Set(value.id.to_string()),
            name: ActiveValue::Set(value.name.clone()),
            goal_minor: ActiveValue::Set(value.goal.map(MoneyCents::cents)),
        }
    }
}

impl TryFrom<Model> for Campaign {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_uuid(&model.id, "campaign")?,
            name: model.name,
            goal: model.goal_minor.map(MoneyCents::new),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn goal_must_be_positive() {
        assert!(Campaign::new("Lisbon".to_string(), Some(MoneyCents::ZERO)).is_err());
        assert!(Campaign::new("Lisbon".to_string(), Some(MoneyCents::new(-5))).is_err());
        assert!(Campaign::new("Lisbon".to_string(), None).is_ok());
    }
}
