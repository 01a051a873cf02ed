//! Donation records.
//!
//! A donation is an immutable row: creating one is the only way a recipient's
//! balance grows, and it grows by exactly the donation amount.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, MoneyCents, ResultEngine, util::parse_uuid};

/// Max length (in chars) of a donation note.
pub const NOTE_MAX_CHARS: usize = 300;

/// Optional donor contact details. Every field may be absent.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Donor {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

impl Donor {
    /// Name to show for the donation.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("Anonymous")
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Donation {
    pub id: Uuid,
    pub recipient_id: Uuid,
    pub amount: MoneyCents,
    pub donor: Donor,
    pub note: Option<String>,
    /// Shared by every donation created by the same group donation.
    pub batch_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl Donation {
    pub fn new(
        recipient_id: Uuid,
        amount: MoneyCents,
        donor: Donor,
        note: Option<String>,
        batch_id: Option<Uuid>,
        created_at: DateTime<Utc>,
    ) -> ResultEngine<Self> {
        if !amount.is_positive() {
            return Err(EngineError::InvalidAmount(
                "amount_minor must be > 0".to_string(),
            ));
        }
        validate_note(note.as_deref())?;
        Ok(Self {
            id: Uuid::new_v4(),
            recipient_id,
            amount,
            donor,
            note,
            batch_id,
            created_at,
        })
    }
}

pub(crate) fn validate_note(note: Option<&str>) -> ResultEngine<()> {
    if let Some(note) = note
        && note.chars().count() > NOTE_MAX_CHARS
    {
        return Err(EngineError::InvalidNote(format!(
            "note must be at most {NOTE_MAX_CHARS} characters"
        )));
    }
    Ok(())
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "donations")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub recipient_id: String,
    pub amount_minor: i64,
    pub donor_name: Option<String>,
    pub donor_email: Option<String>,
    pub donor_phone: Option<String>,
    pub note: Option<String>,
    pub batch_id: Option<String>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::recipients::Entity",
        from = "Column::RecipientId",
        to = "super::recipients::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Recipients,
}

impl Related<super::recipients::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Recipients.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Donation> for ActiveModel {
    fn from(value: &Donation) -> Self {
        Self {
            id: ActiveValue::Set(value.id.to_string()),
            recipient_id: ActiveValue::Set(value.recipient_id.to_string()),
            amount_minor: ActiveValue::Set(value.amount.cents()),
            donor_name: ActiveValue::Set(value.donor.name.clone()),
            donor_email: ActiveValue::Set(value.donor.email.clone()),
            donor_phone: ActiveValue::Set(value.donor.phone.clone()),
            note: ActiveValue::Set(value.note.clone()),
            batch_id: ActiveValue::Set(value.batch_id.map(|id| id.to_string())),
            created_at: ActiveValue::Set(value.created_at),
        }
    }
}

impl TryFrom<Model> for Donation {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_uuid(&model.id, "donation")?,
            recipient_id: parse_uuid(&model.recipient_id, "recipient")?,
            amount: MoneyCents::new(model.amount_minor),
            donor: Donor {
                name: model.donor_name,
                email: model.donor_email,
                phone: model.donor_phone,
            },
            note: model.note,
            batch_id: model
                .batch_id
                .as_deref()
                .map(|id| parse_uuid(id, "batch"))
                .transpose()?,
            created_at: model.created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_positive_amount() {
        let err = Donation::new(
            Uuid::new_v4(),
            MoneyCents::ZERO,
            Donor::default(),
            None,
            None,
            Utc::now(),
        )
        .unwrap_err();
        assert_eq!(
            err,
            EngineError::InvalidAmount("amount_minor must be > 0".to_string())
        );
    }

    #[test]
    fn rejects_long_note() {
        let note = "x".repeat(NOTE_MAX_CHARS + 1);
        let err = Donation::new(
            Uuid::new_v4(),
            MoneyCents::new(100),
            Donor::default(),
            Some(note),
            None,
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::InvalidNote(_)));
    }

    #[test]
    fn anonymous_donor() {
        assert_eq!(Donor::default().display_name(), "Anonymous");
    }
}
