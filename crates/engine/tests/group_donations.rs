use std::{collections::HashMap, sync::Arc, time::Duration};

use rust_decimal::Decimal;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection};

use engine::{
    DonationNew, Donor, Engine, EngineError, GroupCriterion, GroupDonationNew, GroupPreviewCmd,
    MemoryPreviewCache, MoneyCents,
};
use migration::MigratorTrait;
use uuid::Uuid;

async fn engine_with_db() -> (Engine, DatabaseConnection) {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let engine = Engine::builder()
        .database(db.clone())
        .build()
        .await
        .unwrap();
    (engine, db)
}

async fn engine_with_cache() -> Engine {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    Engine::builder()
        .database(db)
        .preview_cache(Arc::new(MemoryPreviewCache::new()))
        .preview_ttl(Duration::from_secs(60))
        .build()
        .await
        .unwrap()
}

/// One recipient per goal, each in its own campaign, all in `organization`.
async fn seed_group(engine: &Engine, organization: &str, goals_minor: &[i64]) -> Vec<Uuid> {
    let organization_id = engine.new_organization(organization).await.unwrap();
    let mut ids = Vec::new();
    for (i, goal) in goals_minor.iter().enumerate() {
        let campaign_id = engine
            .new_campaign(
                &format!("{organization} trip {i}"),
                Some(MoneyCents::new(*goal)),
            )
            .await
            .unwrap();
        let id = engine
            .new_recipient(
                &format!("{organization} student {i}"),
                Some(organization_id),
                Some(campaign_id),
            )
            .await
            .unwrap();
        ids.push(id);
    }
    ids
}

fn by_recipient(shares: impl Iterator<Item = (Uuid, MoneyCents)>) -> HashMap<Uuid, i64> {
    shares.map(|(id, amount)| (id, amount.cents())).collect()
}

#[tokio::test]
async fn equal_split_redistributes_capped_excess() {
    let (engine, _db) = engine_with_db().await;
    let ids = seed_group(&engine, "Padova", &[2_000, 3_000, 2_500, 5_000]).await;

    let receipt = engine
        .group_donate(
            GroupDonationNew::new(
                GroupCriterion::Organization("Padova".to_string()),
                MoneyCents::new(10_000),
            )
            .donor(Donor {
                name: Some("Grace".to_string()),
                ..Donor::default()
            })
            .note("for the trip"),
        )
        .await
        .unwrap();

    let granted = by_recipient(receipt.donations.iter().map(|d| (d.recipient_id, d.amount)));
    assert_eq!(granted[&ids[0]], 2_000);
    assert_eq!(granted[&ids[1]], 2_750);
    assert_eq!(granted[&ids[2]], 2_500);
    assert_eq!(granted[&ids[3]], 2_750);
    assert_eq!(receipt.total_amount, MoneyCents::new(10_000));
    assert_eq!(receipt.allocation.total_distributed, MoneyCents::new(10_000));
    assert_eq!(receipt.allocation.average_amount, Decimal::from(25));
    assert_eq!(receipt.allocation.max_distributable, MoneyCents::new(12_500));
    assert!(
        receipt
            .donations
            .iter()
            .all(|d| d.batch_id == Some(receipt.batch_id) && d.note.as_deref() == Some("for the trip"))
    );

    for id in &ids {
        let recipient = engine.recipient(*id).await.unwrap();
        assert_eq!(recipient.balance.cents(), granted[id]);
    }
    assert!(engine.recipient(ids[0]).await.unwrap().has_reached_goal());
    assert_eq!(engine.list_donations(None).await.unwrap().len(), 4);
}

#[tokio::test]
async fn proportional_split_follows_need() {
    let (engine, _db) = engine_with_db().await;
    let ids = seed_group(&engine, "Milano", &[20_000, 30_000, 50_000]).await;

    let receipt = engine
        .group_donate(
            GroupDonationNew::new(
                GroupCriterion::Organization("Milano".to_string()),
                MoneyCents::new(80_000),
            )
            .bias_factor(Decimal::ONE),
        )
        .await
        .unwrap();

    let granted = by_recipient(receipt.donations.iter().map(|d| (d.recipient_id, d.amount)));
    assert_eq!(granted[&ids[0]], 16_000);
    assert_eq!(granted[&ids[1]], 24_000);
    assert_eq!(granted[&ids[2]], 40_000);
}

#[tokio::test]
async fn campaign_criterion_only_reaches_enrolled_recipients() {
    let (engine, _db) = engine_with_db().await;
    let lisbon = engine
        .new_campaign("Lisbon", Some(MoneyCents::new(10_000)))
        .await
        .unwrap();
    let oslo = engine
        .new_campaign("Oslo", Some(MoneyCents::new(10_000)))
        .await
        .unwrap();
    let ada = engine.new_recipient("Ada", None, Some(lisbon)).await.unwrap();
    let bob = engine.new_recipient("Bob", None, Some(oslo)).await.unwrap();

    let receipt = engine
        .group_donate(GroupDonationNew::new(
            GroupCriterion::from_parts("trip", Some("Lisbon")),
            MoneyCents::new(1_000),
        ))
        .await
        .unwrap();

    assert_eq!(receipt.donations.len(), 1);
    assert_eq!(receipt.donations[0].recipient_id, ada);
    assert_eq!(engine.recipient(bob).await.unwrap().balance, MoneyCents::ZERO);
}

#[tokio::test]
async fn tiny_amounts_only_create_positive_donations() {
    let (engine, _db) = engine_with_db().await;
    seed_group(&engine, "Torino", &[10_000, 10_000, 10_000]).await;

    let receipt = engine
        .group_donate(GroupDonationNew::new(
            GroupCriterion::Organization("Torino".to_string()),
            MoneyCents::new(1),
        ))
        .await
        .unwrap();

    assert_eq!(receipt.allocation.shares.len(), 3);
    assert_eq!(receipt.donations.len(), 1);
    assert_eq!(receipt.donations[0].amount, MoneyCents::new(1));
}

#[tokio::test]
async fn no_eligible_recipients() {
    let (engine, _db) = engine_with_db().await;
    let ids = seed_group(&engine, "Padova", &[1_000]).await;

    let err = engine
        .group_donate(GroupDonationNew::new(
            GroupCriterion::Campaign("Nowhere".to_string()),
            MoneyCents::new(100),
        ))
        .await
        .unwrap_err();
    assert_eq!(err, EngineError::NoEligibleRecipients);

    engine
        .donate(DonationNew::new(ids[0], MoneyCents::new(1_000)))
        .await
        .unwrap();
    let err = engine
        .group_donate(GroupDonationNew::new(
            GroupCriterion::Organization("Padova".to_string()),
            MoneyCents::new(100),
        ))
        .await
        .unwrap_err();
    assert_eq!(err, EngineError::NoEligibleRecipients);
}

#[tokio::test]
async fn validation_runs_in_order() {
    let (engine, _db) = engine_with_db().await;
    seed_group(&engine, "Padova", &[3_000]).await;
    let padova = GroupCriterion::Organization("Padova".to_string());

    let err = engine
        .group_donate(GroupDonationNew::new(
            GroupCriterion::Organization("Nowhere".to_string()),
            MoneyCents::ZERO,
        ))
        .await
        .unwrap_err();
    assert_eq!(err, EngineError::NoEligibleRecipients);

    let err = engine
        .group_donate(GroupDonationNew::new(padova.clone(), MoneyCents::ZERO))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidAmount(_)));

    let err = engine
        .group_donate(
            GroupDonationNew::new(padova.clone(), MoneyCents::new(5_000))
                .bias_factor(Decimal::from(2)),
        )
        .await
        .unwrap_err();
    assert_eq!(
        err,
        EngineError::ExceedsMaxDistributable {
            requested: MoneyCents::new(5_000),
            max: MoneyCents::new(3_000),
        }
    );

    let err = engine
        .group_donate(
            GroupDonationNew::new(padova, MoneyCents::new(1_000)).bias_factor(Decimal::from(2)),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidBiasFactor(_)));
}

#[tokio::test]
async fn failing_row_rolls_back_the_whole_batch() {
    let (engine, db) = engine_with_db().await;
    let ids = seed_group(&engine, "Padova", &[5_000, 5_000, 5_000]).await;
    let failing = ids[2];

    db.execute_unprepared(&format!(
        "CREATE TRIGGER reject_donation BEFORE INSERT ON donations \
         WHEN NEW.recipient_id = '{failing}' \
         BEGIN SELECT RAISE(ABORT, 'donations closed'); END;"
    ))
    .await
    .unwrap();

    let err = engine
        .group_donate(GroupDonationNew::new(
            GroupCriterion::Organization("Padova".to_string()),
            MoneyCents::new(9_000),
        ))
        .await
        .unwrap_err();
    match err {
        EngineError::PartialPersistenceFailure {
            recipient_id,
            reason,
        } => {
            assert_eq!(recipient_id, failing);
            assert!(reason.contains("donations closed"));
        }
        other => panic!("unexpected error: {other:?}"),
    }

    assert!(engine.list_donations(None).await.unwrap().is_empty());
    for id in ids {
        assert_eq!(engine.recipient(id).await.unwrap().balance, MoneyCents::ZERO);
    }
}

#[tokio::test]
async fn concurrent_fill_after_selection_rolls_back_the_batch() {
    let (engine, db) = engine_with_db().await;
    let ids = seed_group(&engine, "Padova", &[5_000, 5_000]).await;
    let (first, second) = (ids[0], ids[1]);

    // Whichever recipient is written first fills the other one to its goal,
    // as a single donation landing between selection and write would.
    for (written, filled) in [(first, second), (second, first)] {
        db.execute_unprepared(&format!(
            "CREATE TRIGGER fill_{n} AFTER INSERT ON donations \
             WHEN NEW.recipient_id = '{written}' \
             BEGIN UPDATE recipients SET balance_minor = 5000 WHERE id = '{filled}'; END;",
            n = written.simple()
        ))
        .await
        .unwrap();
    }

    let err = engine
        .group_donate(GroupDonationNew::new(
            GroupCriterion::Organization("Padova".to_string()),
            MoneyCents::new(2_000),
        ))
        .await
        .unwrap_err();
    match err {
        EngineError::PartialPersistenceFailure {
            recipient_id,
            reason,
        } => {
            assert!(ids.contains(&recipient_id));
            assert!(
                reason.ends_with(&format!("{recipient_id}: 60.00 > 50.00")),
                "{reason}"
            );
        }
        other => panic!("unexpected error: {other:?}"),
    }

    assert!(engine.list_donations(None).await.unwrap().is_empty());
    for id in ids {
        assert_eq!(engine.recipient(id).await.unwrap().balance, MoneyCents::ZERO);
    }
}

#[tokio::test]
async fn max_distributable_sums_remaining_needs() {
    let (engine, _db) = engine_with_db().await;
    let ids = seed_group(&engine, "Padova", &[2_000, 3_000]).await;
    engine
        .donate(DonationNew::new(ids[1], MoneyCents::new(500)))
        .await
        .unwrap();

    let max = engine
        .max_distributable(&GroupCriterion::Organization("Padova".to_string()))
        .await
        .unwrap();
    assert_eq!(max, MoneyCents::new(4_500));

    let max = engine
        .max_distributable(&GroupCriterion::Organization("Nowhere".to_string()))
        .await
        .unwrap();
    assert_eq!(max, MoneyCents::ZERO);
}

#[tokio::test]
async fn preview_writes_nothing() {
    let (engine, _db) = engine_with_db().await;
    let ids = seed_group(&engine, "Padova", &[2_000, 3_000, 2_500, 5_000]).await;

    let preview = engine
        .preview_group_donation(GroupPreviewCmd::new(
            GroupCriterion::Organization("Padova".to_string()),
            MoneyCents::new(10_000),
        ))
        .await
        .unwrap();

    let shares = by_recipient(preview.shares.iter().map(|s| (s.recipient_id(), s.amount)));
    assert_eq!(shares[&ids[1]], 2_750);
    assert_eq!(preview.total_distributed, MoneyCents::new(10_000));
    assert!(engine.list_donations(None).await.unwrap().is_empty());
}

#[tokio::test]
async fn preview_memoizes_group_until_a_donation_commits() {
    let engine = engine_with_cache().await;
    let campaign_id = engine
        .new_campaign("Lisbon", Some(MoneyCents::new(10_000)))
        .await
        .unwrap();
    engine
        .new_recipient("Ada", None, Some(campaign_id))
        .await
        .unwrap();
    let lisbon = GroupCriterion::Campaign("Lisbon".to_string());

    let first = engine
        .preview_group_donation(GroupPreviewCmd::new(lisbon.clone(), MoneyCents::new(1_000)))
        .await
        .unwrap();
    assert_eq!(first.shares.len(), 1);

    // Not visible to previews until the memoized group expires or is dropped.
    engine
        .new_recipient("Bob", None, Some(campaign_id))
        .await
        .unwrap();
    let cached = engine
        .preview_group_donation(GroupPreviewCmd::new(lisbon.clone(), MoneyCents::new(1_000)))
        .await
        .unwrap();
    assert_eq!(cached.shares.len(), 1);
    assert_eq!(cached.max_distributable, MoneyCents::new(10_000));

    // Commits always select from the store.
    let receipt = engine
        .group_donate(GroupDonationNew::new(lisbon.clone(), MoneyCents::new(1_000)))
        .await
        .unwrap();
    assert_eq!(receipt.donations.len(), 2);

    let fresh = engine
        .preview_group_donation(GroupPreviewCmd::new(lisbon, MoneyCents::new(1_000)))
        .await
        .unwrap();
    assert_eq!(fresh.shares.len(), 2);
    assert_eq!(fresh.max_distributable, MoneyCents::new(19_000));
}
