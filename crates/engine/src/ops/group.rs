use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{ConnectionTrait, TransactionTrait, prelude::*};
use uuid::Uuid;

use crate::{
    AllocationPolicy, CachedGroup, Donation, Donor, EngineError, GroupAllocation,
    GroupCriterion, GroupDonationNew, GroupDonationReceipt, GroupPreviewCmd, MoneyCents,
    RecipientSnapshot, ResultEngine, Share, allocate, apportion, donations,
    donations::validate_note,
    max_distributable, select,
    util::normalize_optional_text,
};

use super::{
    Engine,
    donations::{apply_guarded_increment, normalize_donor},
    recipients::load_pool,
    with_tx,
};

impl Engine {
    /// Combined need of the recipients `criterion` currently reaches.
    pub async fn max_distributable(&self, criterion: &GroupCriterion) -> ResultEngine<MoneyCents> {
        let group = eligible_group(&self.database, criterion).await?;
        Ok(group.max_distributable)
    }

    /// Compute how a group donation would be split, without writing.
    ///
    /// The eligible group is memoized in the preview cache under
    /// [`GroupCriterion::cache_key`]; the split itself is computed on every
    /// call since it depends on the amount and the bias factor.
    pub async fn preview_group_donation(
        &self,
        cmd: GroupPreviewCmd,
    ) -> ResultEngine<GroupAllocation> {
        let key = cmd.criterion.cache_key();
        let group = match self.preview_cache.get(&key) {
            Some(group) => {
                tracing::debug!(%key, "preview cache hit");
                group
            }
            None => {
                let group = eligible_group(&self.database, &cmd.criterion).await?;
                self.preview_cache.put(&key, group.clone(), self.preview_ttl);
                group
            }
        };

        let policy = self.validate(&group, cmd.amount, cmd.bias_factor)?;
        Ok(split(group, cmd.amount, &policy))
    }

    /// Split one donation among every eligible recipient of a group.
    ///
    /// Eligibility is derived again from the store, inside the same DB
    /// transaction that writes the donations: the preview cache is never read
    /// here. One donation is created per recipient with a positive share, all
    /// sharing a fresh `batch_id`. Either every donation is written or none
    /// is: a failing row rolls the batch back and is reported as
    /// [`EngineError::PartialPersistenceFailure`].
    pub async fn group_donate(&self, cmd: GroupDonationNew) -> ResultEngine<GroupDonationReceipt> {
        let note = normalize_optional_text(cmd.note.as_deref());
        validate_note(note.as_deref())?;
        let donor = normalize_donor(cmd.donor);
        let criterion = cmd.criterion;
        let amount = cmd.amount;
        let bias_factor = cmd.bias_factor;

        let result = with_tx!(self, |db_tx| {
            let group = eligible_group(&db_tx, &criterion).await?;
            let policy = self.validate(&group, amount, bias_factor)?;
            let allocation = split(group, amount, &policy);

            let batch_id = Uuid::new_v4();
            let created_at = Utc::now();
            let mut written = Vec::new();
            for share in allocation.funded() {
                let donation = persist_share(
                    &db_tx,
                    share,
                    &donor,
                    note.clone(),
                    batch_id,
                    created_at,
                )
                .await
                .map_err(|err| {
                    tracing::warn!(
                        %batch_id,
                        recipient_id = %share.recipient_id(),
                        %err,
                        "group donation rolled back"
                    );
                    EngineError::PartialPersistenceFailure {
                        recipient_id: share.recipient_id(),
                        reason: err.to_string(),
                    }
                })?;
                written.push(donation);
            }

            let total_amount = written.iter().map(|d| d.amount).sum();
            Ok(GroupDonationReceipt {
                batch_id,
                total_amount,
                donations: written,
                allocation,
            })
        });

        if let Ok(receipt) = &result {
            self.preview_cache.invalidate_all();
            tracing::info!(
                batch_id = %receipt.batch_id,
                %criterion,
                donations = receipt.donations.len(),
                total = %receipt.total_amount,
                "group donation created"
            );
        }
        result
    }

    /// Checks a group request in a fixed order: eligibility, amount, max
    /// distributable, bias factor.
    fn validate(
        &self,
        group: &CachedGroup,
        amount: MoneyCents,
        bias_factor: Option<Decimal>,
    ) -> ResultEngine<AllocationPolicy> {
        if group.candidates.is_empty() {
            return Err(EngineError::NoEligibleRecipients);
        }
        if !amount.is_positive() {
            return Err(EngineError::InvalidAmount(
                "Amount must be greater than 0".to_string(),
            ));
        }
        if amount > group.max_distributable {
            return Err(EngineError::ExceedsMaxDistributable {
                requested: amount,
                max: group.max_distributable,
            });
        }
        self.policy(bias_factor)
    }
}

/// Selects the eligible recipients of `criterion` and their combined need.
async fn eligible_group<C>(db: &C, criterion: &GroupCriterion) -> ResultEngine<CachedGroup>
where
    C: ConnectionTrait,
{
    let pool = load_pool(db, criterion).await?;
    let candidates = select(criterion, &pool);
    let snapshots: Vec<RecipientSnapshot> =
        candidates.iter().map(|c| c.snapshot.clone()).collect();
    let max = MoneyCents::from_decimal_trunc(max_distributable(&snapshots))
        .ok_or_else(|| EngineError::InvalidAmount("max distributable overflow".to_string()))?;
    Ok(CachedGroup {
        candidates,
        max_distributable: max,
    })
}

/// Runs the allocation and converts its result to cents.
fn split(
    group: CachedGroup,
    amount: MoneyCents,
    policy: &AllocationPolicy,
) -> GroupAllocation {
    let snapshots: Vec<RecipientSnapshot> = group
        .candidates
        .iter()
        .map(|c| c.snapshot.clone())
        .collect();
    let result = allocate(amount.to_decimal(), &snapshots, policy);
    let cents = apportion(&result, &snapshots);

    let shares: Vec<Share> = group
        .candidates
        .into_iter()
        .zip(cents)
        .map(|(candidate, amount)| Share { candidate, amount })
        .collect();
    let total_distributed = shares.iter().map(|s| s.amount).sum();

    if result.total_distributed < amount.to_decimal() {
        tracing::debug!(
            requested = %amount,
            distributed = %result.total_distributed,
            "part of the group donation could not be placed"
        );
    }

    GroupAllocation {
        shares,
        total_distributed,
        average_amount: result.average_amount.round_dp(2),
        max_distributable: group.max_distributable,
    }
}

/// Writes the donation of one share, guarded like a single donation.
async fn persist_share<C>(
    db: &C,
    share: &Share,
    donor: &Donor,
    note: Option<String>,
    batch_id: Uuid,
    created_at: DateTime<Utc>,
) -> ResultEngine<Donation>
where
    C: ConnectionTrait,
{
    let snapshot = &share.candidate.snapshot;
    let balance = cents_of(snapshot.balance)?;
    let goal = snapshot.goal.map(cents_of).transpose()?;

    let donation = Donation::new(
        snapshot.id,
        share.amount,
        donor.clone(),
        note,
        Some(batch_id),
        created_at,
    )?;
    apply_guarded_increment(db, snapshot.id, balance, goal, share.amount).await?;
    let model: donations::ActiveModel = (&donation).into();
    model.insert(db).await?;
    Ok(donation)
}

fn cents_of(value: Decimal) -> ResultEngine<MoneyCents> {
    MoneyCents::from_decimal_round(value)
        .ok_or_else(|| EngineError::InvalidAmount(format!("{value} is out of range")))
}
