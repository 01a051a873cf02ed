use chrono::Utc;
use sea_orm::{
    ConnectionTrait, QueryFilter, QueryOrder, QuerySelect, Statement, TransactionTrait,
    prelude::*,
};
use uuid::Uuid;

use crate::{
    Donation, DonationNew, Donor, EngineError, MoneyCents, ResultEngine, campaigns, donations,
    recipients,
    util::normalize_optional_text,
};

use super::{Engine, with_tx};

impl Engine {
    /// Donate to a single recipient.
    ///
    /// The recipient row is read under an exclusive lock and the balance is
    /// increased with a conditional update that re-checks the goal, so two
    /// concurrent donations can never push the recipient past its goal
    /// together. A rejected donation writes nothing.
    pub async fn donate(&self, cmd: DonationNew) -> ResultEngine<Donation> {
        let donation = Donation::new(
            cmd.recipient_id,
            cmd.amount,
            normalize_donor(cmd.donor),
            normalize_optional_text(cmd.note.as_deref()),
            None,
            Utc::now(),
        )?;

        let result = with_tx!(self, |db_tx| {
            let recipient = recipients::Entity::find_by_id(donation.recipient_id.to_string())
                .lock_exclusive()
                .one(&db_tx)
                .await?
                .ok_or_else(|| EngineError::KeyNotFound("recipient not exists".to_string()))?;
            let goal = recipient_goal(&db_tx, &recipient).await?;

            apply_guarded_increment(
                &db_tx,
                donation.recipient_id,
                MoneyCents::new(recipient.balance_minor),
                goal,
                donation.amount,
            )
            .await?;

            let model: donations::ActiveModel = (&donation).into();
            model.insert(&db_tx).await?;
            Ok(donation)
        });

        match &result {
            Ok(donation) => {
                self.preview_cache.invalidate_all();
                tracing::info!(
                    donation_id = %donation.id,
                    recipient_id = %donation.recipient_id,
                    amount = %donation.amount,
                    "donation created"
                );
            }
            Err(err @ EngineError::ExceedsGoal { .. }) => {
                tracing::warn!(recipient_id = %cmd.recipient_id, %err, "donation rejected");
            }
            Err(_) => {}
        }
        result
    }

    /// Donations, newest first, optionally restricted to one recipient.
    pub async fn list_donations(&self, recipient_id: Option<Uuid>) -> ResultEngine<Vec<Donation>> {
        let mut query = donations::Entity::find()
            .order_by_desc(donations::Column::CreatedAt)
            .order_by_desc(donations::Column::Id);
        if let Some(id) = recipient_id {
            query = query.filter(donations::Column::RecipientId.eq(id.to_string()));
        }
        query
            .all(&self.database)
            .await?
            .into_iter()
            .map(Donation::try_from)
            .collect()
    }
}

/// The goal of the recipient's campaign, if it has one.
pub(super) async fn recipient_goal<C>(
    db: &C,
    recipient: &recipients::Model,
) -> ResultEngine<Option<MoneyCents>>
where
    C: ConnectionTrait,
{
    let Some(campaign_id) = recipient.campaign_id.as_ref() else {
        return Ok(None);
    };
    let campaign = campaigns::Entity::find_by_id(campaign_id.clone())
        .one(db)
        .await?
        .ok_or_else(|| EngineError::KeyNotFound("campaign not exists".to_string()))?;
    Ok(campaign.goal_minor.map(MoneyCents::new))
}

/// Adds `amount` to the balance of a recipient without ever crossing `goal`.
///
/// `balance` is the value read by the caller and only short-circuits the
/// obvious rejection; the update itself re-checks the goal against the stored
/// balance and touches no row when it would be exceeded. A lost race reports
/// the projected balance from the stored row. Returns `balance + amount`.
pub(super) async fn apply_guarded_increment<C>(
    db: &C,
    recipient_id: Uuid,
    balance: MoneyCents,
    goal: Option<MoneyCents>,
    amount: MoneyCents,
) -> ResultEngine<MoneyCents>
where
    C: ConnectionTrait,
{
    let projected = add_checked(balance, amount)?;
    if let Some(goal) = goal
        && projected > goal
    {
        return Err(EngineError::ExceedsGoal {
            recipient_id,
            projected,
            goal,
        });
    }

    let backend = db.get_database_backend();
    let stmt = match goal {
        Some(goal) => Statement::from_sql_and_values(
            backend,
            "UPDATE recipients SET balance_minor = balance_minor + ? \
             WHERE id = ? AND balance_minor + ? <= ?",
            vec![
                amount.cents().into(),
                recipient_id.to_string().into(),
                amount.cents().into(),
                goal.cents().into(),
            ],
        ),
        None => Statement::from_sql_and_values(
            backend,
            "UPDATE recipients SET balance_minor = balance_minor + ? WHERE id = ?",
            vec![amount.cents().into(), recipient_id.to_string().into()],
        ),
    };

    let updated = db.execute(stmt).await?.rows_affected();
    if updated == 0 {
        let not_found = || EngineError::KeyNotFound("recipient not exists".to_string());
        let Some(goal) = goal else {
            return Err(not_found());
        };
        let stored = recipients::Entity::find_by_id(recipient_id.to_string())
            .one(db)
            .await?
            .ok_or_else(not_found)?;
        return Err(EngineError::ExceedsGoal {
            recipient_id,
            projected: add_checked(MoneyCents::new(stored.balance_minor), amount)?,
            goal,
        });
    }
    Ok(projected)
}

fn add_checked(balance: MoneyCents, amount: MoneyCents) -> ResultEngine<MoneyCents> {
    balance
        .checked_add(amount)
        .ok_or_else(|| EngineError::InvalidAmount("balance overflow".to_string()))
}

pub(super) fn normalize_donor(donor: Donor) -> Donor {
    Donor {
        name: normalize_optional_text(donor.name.as_deref()),
        email: normalize_optional_text(donor.email.as_deref()),
        phone: normalize_optional_text(donor.phone.as_deref()),
    }
}
