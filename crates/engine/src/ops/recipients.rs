use std::{cmp::Ordering, collections::HashMap};

use chrono::Utc;
use sea_orm::{
    ConnectionTrait, QueryFilter, QueryOrder, TransactionTrait, prelude::*, sea_query::Expr,
};
use uuid::Uuid;

use crate::{
    Campaign, Candidate, EngineError, GroupCriterion, MoneyCents, Organization, Recipient,
    ResultEngine, campaigns, organizations, recipients,
    util::normalize_required_name,
};

use super::{Engine, with_tx};

impl Engine {
    /// Add an organization. Names are unique, case-insensitively.
    pub async fn new_organization(&self, name: &str) -> ResultEngine<Uuid> {
        let name = normalize_required_name(name, "organization")?;
        with_tx!(self, |db_tx| {
            let exists = organizations::Entity::find()
                .filter(Expr::cust("LOWER(name)").eq(name.to_lowercase()))
                .one(&db_tx)
                .await?
                .is_some();
            if exists {
                return Err(EngineError::ExistingKey(name));
            }

            let organization = Organization::new(name);
            let model: organizations::ActiveModel = (&organization).into();
            model.insert(&db_tx).await?;
            tracing::info!(organization_id = %organization.id, name = %organization.name, "organization created");
            Ok(organization.id)
        })
    }

    /// Add a campaign. `goal` caps the balance of every enrolled recipient.
    pub async fn new_campaign(&self, name: &str, goal: Option<MoneyCents>) -> ResultEngine<Uuid> {
        let name = normalize_required_name(name, "campaign")?;
        let campaign = Campaign::new(name, goal)?;
        with_tx!(self, |db_tx| {
            let exists = campaigns::Entity::find()
                .filter(Expr::cust("LOWER(name)").eq(campaign.name.to_lowercase()))
                .one(&db_tx)
                .await?
                .is_some();
            if exists {
                return Err(EngineError::ExistingKey(campaign.name));
            }

            let model: campaigns::ActiveModel = (&campaign).into();
            model.insert(&db_tx).await?;
            tracing::info!(campaign_id = %campaign.id, name = %campaign.name, "campaign created");
            Ok(campaign.id)
        })
    }

    /// Add a recipient with a zero balance.
    pub async fn new_recipient(
        &self,
        name: &str,
        organization_id: Option<Uuid>,
        campaign_id: Option<Uuid>,
    ) -> ResultEngine<Uuid> {
        let name = normalize_required_name(name, "recipient")?;
        with_tx!(self, |db_tx| {
            if let Some(id) = organization_id {
                organizations::Entity::find_by_id(id.to_string())
                    .one(&db_tx)
                    .await?
                    .ok_or_else(|| EngineError::KeyNotFound("organization not exists".to_string()))?;
            }
            if let Some(id) = campaign_id {
                campaigns::Entity::find_by_id(id.to_string())
                    .one(&db_tx)
                    .await?
                    .ok_or_else(|| EngineError::KeyNotFound("campaign not exists".to_string()))?;
            }

            let (id, model) =
                recipients::new_active_model(name, organization_id, campaign_id, Utc::now());
            model.insert(&db_tx).await?;
            tracing::info!(recipient_id = %id, "recipient created");
            Ok(id)
        })
    }

    /// Look an organization up by its exact name.
    pub async fn organization_by_name(&self, name: &str) -> ResultEngine<Organization> {
        let model = organizations::Entity::find()
            .filter(organizations::Column::Name.eq(name))
            .one(&self.database)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound(name.to_string()))?;
        Organization::try_from(model)
    }

    /// Look a campaign up by its exact name.
    pub async fn campaign_by_name(&self, name: &str) -> ResultEngine<Campaign> {
        let model = campaigns::Entity::find()
            .filter(campaigns::Column::Name.eq(name))
            .one(&self.database)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound(name.to_string()))?;
        Campaign::try_from(model)
    }

    /// Return a recipient from DB.
    pub async fn recipient(&self, recipient_id: Uuid) -> ResultEngine<Recipient> {
        let model = recipients::Entity::find_by_id(recipient_id.to_string())
            .one(&self.database)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("recipient not exists".to_string()))?;
        let mut hydrated = hydrate(&self.database, vec![model]).await?;
        hydrated
            .pop()
            .ok_or_else(|| EngineError::KeyNotFound("recipient not exists".to_string()))
    }

    /// Every recipient, the ones that reached their goal last and the others
    /// by progress, highest first.
    pub async fn list_recipients(&self) -> ResultEngine<Vec<Recipient>> {
        let models = recipients::Entity::find()
            .order_by_asc(recipients::Column::CreatedAt)
            .order_by_asc(recipients::Column::Id)
            .all(&self.database)
            .await?;
        let mut list = hydrate(&self.database, models).await?;
        list.sort_by(by_progress);
        Ok(list)
    }
}

fn by_progress(a: &Recipient, b: &Recipient) -> Ordering {
    a.has_reached_goal()
        .cmp(&b.has_reached_goal())
        .then_with(|| b.progress().cmp(&a.progress()))
}

/// Loads the organizations and campaigns referenced by `models` and joins them
/// in. Output order follows `models`.
async fn hydrate<C>(db: &C, models: Vec<recipients::Model>) -> ResultEngine<Vec<Recipient>>
where
    C: ConnectionTrait,
{
    let organization_ids: Vec<String> = models
        .iter()
        .filter_map(|m| m.organization_id.clone())
        .collect();
    let campaign_ids: Vec<String> = models
        .iter()
        .filter_map(|m| m.campaign_id.clone())
        .collect();

    let organizations_by_id: HashMap<String, organizations::Model> = if organization_ids.is_empty() {
        HashMap::new()
    } else {
        organizations::Entity::find()
            .filter(organizations::Column::Id.is_in(organization_ids))
            .all(db)
            .await?
            .into_iter()
            .map(|m| (m.id.clone(), m))
            .collect()
    };
    let campaigns_by_id: HashMap<String, campaigns::Model> = if campaign_ids.is_empty() {
        HashMap::new()
    } else {
        campaigns::Entity::find()
            .filter(campaigns::Column::Id.is_in(campaign_ids))
            .all(db)
            .await?
            .into_iter()
            .map(|m| (m.id.clone(), m))
            .collect()
    };

    models
        .into_iter()
        .map(|model| {
            let organization = model
                .organization_id
                .as_ref()
                .and_then(|id| organizations_by_id.get(id));
            let campaign = model.campaign_id.as_ref().and_then(|id| campaigns_by_id.get(id));
            Recipient::try_from((model, organization, campaign))
        })
        .collect()
}

/// Current state of the recipients `criterion` can reach, in creation order.
///
/// The group name is resolved first so only its members are read; an unknown
/// name yields an empty pool. Eligibility itself is left to [`crate::select`].
pub(crate) async fn load_pool<C>(db: &C, criterion: &GroupCriterion) -> ResultEngine<Vec<Candidate>>
where
    C: ConnectionTrait,
{
    let mut query = recipients::Entity::find()
        .order_by_asc(recipients::Column::CreatedAt)
        .order_by_asc(recipients::Column::Id);

    match (criterion, criterion.filter_value()) {
        (GroupCriterion::Organization(_), Some(name)) => {
            let Some(organization) = organizations::Entity::find()
                .filter(organizations::Column::Name.eq(name))
                .one(db)
                .await?
            else {
                return Ok(Vec::new());
            };
            query = query.filter(recipients::Column::OrganizationId.eq(organization.id));
        }
        (GroupCriterion::Campaign(_), Some(name)) => {
            let Some(campaign) = campaigns::Entity::find()
                .filter(campaigns::Column::Name.eq(name))
                .one(db)
                .await?
            else {
                return Ok(Vec::new());
            };
            query = query.filter(recipients::Column::CampaignId.eq(campaign.id));
        }
        _ => {}
    }

    let models = query.all(db).await?;
    let pool = hydrate(db, models)
        .await?
        .iter()
        .map(Recipient::to_candidate)
        .collect();
    Ok(pool)
}
