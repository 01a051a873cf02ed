use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Statement};

use engine::{DonationNew, Donor, Engine, EngineError, MoneyCents, NOTE_MAX_CHARS};
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

/// A recipient enrolled in a campaign with the given goal and balance.
async fn recipient_with(engine: &Engine, goal_minor: i64, balance_minor: i64) -> Uuid {
    let campaign_id = engine
        .new_campaign(&format!("Trip {}", Uuid::new_v4()), Some(MoneyCents::new(goal_minor)))
        .await
        .unwrap();
    let recipient_id = engine
        .new_recipient("Ada", None, Some(campaign_id))
        .await
        .unwrap();
    if balance_minor > 0 {
        engine
            .donate(DonationNew::new(recipient_id, MoneyCents::new(balance_minor)))
            .await
            .unwrap();
    }
    recipient_id
}

async fn donations_count(db: &DatabaseConnection, recipient_id: Uuid) -> i64 {
    let row = db
        .query_one(Statement::from_sql_and_values(
            db.get_database_backend(),
            "SELECT COUNT(*) AS n FROM donations WHERE recipient_id = ?",
            vec![recipient_id.to_string().into()],
        ))
        .await
        .unwrap()
        .unwrap();
    row.try_get("", "n").unwrap()
}

#[tokio::test]
async fn donation_over_goal_is_rejected_and_exact_fill_accepted() {
    let (engine, db) = engine_with_db().await;
    let recipient_id = recipient_with(&engine, 10_000, 9_500).await;

    let err = engine
        .donate(DonationNew::new(recipient_id, MoneyCents::new(1_000)))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        EngineError::ExceedsGoal {
            recipient_id,
            projected: MoneyCents::new(10_500),
            goal: MoneyCents::new(10_000),
        }
    );
    assert_eq!(donations_count(&db, recipient_id).await, 1);

    engine
        .donate(DonationNew::new(recipient_id, MoneyCents::new(500)))
        .await
        .unwrap();
    let recipient = engine.recipient(recipient_id).await.unwrap();
    assert_eq!(recipient.balance, MoneyCents::new(10_000));
    assert!(recipient.has_reached_goal());
    assert_eq!(donations_count(&db, recipient_id).await, 2);
}

#[tokio::test]
async fn concurrent_donations_never_exceed_goal() {
    let (engine, _db) = engine_with_db().await;
    let recipient_id = recipient_with(&engine, 10_000, 9_000).await;

    let (first, second) = tokio::join!(
        engine.donate(DonationNew::new(recipient_id, MoneyCents::new(800))),
        engine.donate(DonationNew::new(recipient_id, MoneyCents::new(800))),
    );

    let accepted = [first.is_ok(), second.is_ok()]
        .into_iter()
        .filter(|ok| *ok)
        .count();
    assert_eq!(accepted, 1);
    let rejected = first.err().or(second.err()).unwrap();
    assert!(matches!(rejected, EngineError::ExceedsGoal { .. }));

    let recipient = engine.recipient(recipient_id).await.unwrap();
    assert_eq!(recipient.balance, MoneyCents::new(9_800));
}

#[tokio::test]
async fn recipient_without_goal_accepts_any_amount() {
    let (engine, _db) = engine_with_db().await;
    let recipient_id = engine.new_recipient("Bob", None, None).await.unwrap();

    engine
        .donate(DonationNew::new(recipient_id, MoneyCents::new(123_456)))
        .await
        .unwrap();

    let recipient = engine.recipient(recipient_id).await.unwrap();
    assert_eq!(recipient.balance, MoneyCents::new(123_456));
    assert_eq!(recipient.goal, None);
}

#[tokio::test]
async fn donate_validates_input() {
    let (engine, _db) = engine_with_db().await;
    let recipient_id = recipient_with(&engine, 10_000, 0).await;

    let err = engine
        .donate(DonationNew::new(recipient_id, MoneyCents::ZERO))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidAmount(_)));

    let err = engine
        .donate(
            DonationNew::new(recipient_id, MoneyCents::new(100))
                .note("x".repeat(NOTE_MAX_CHARS + 1)),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidNote(_)));

    let err = engine
        .donate(DonationNew::new(Uuid::new_v4(), MoneyCents::new(100)))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        EngineError::KeyNotFound("recipient not exists".to_string())
    );
}

#[tokio::test]
async fn list_donations_newest_first_with_anonymous_donors() {
    let (engine, _db) = engine_with_db().await;
    let first = recipient_with(&engine, 10_000, 0).await;
    let second = recipient_with(&engine, 10_000, 0).await;

    engine
        .donate(
            DonationNew::new(first, MoneyCents::new(100)).donor(Donor {
                name: Some("  Grace ".to_string()),
                email: Some("grace@example.com".to_string()),
                phone: None,
            }),
        )
        .await
        .unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    engine
        .donate(DonationNew::new(first, MoneyCents::new(200)).note("  "))
        .await
        .unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    engine
        .donate(DonationNew::new(second, MoneyCents::new(300)))
        .await
        .unwrap();

    let all = engine.list_donations(None).await.unwrap();
    let amounts: Vec<i64> = all.iter().map(|d| d.amount.cents()).collect();
    assert_eq!(amounts, vec![300, 200, 100]);

    let of_first = engine.list_donations(Some(first)).await.unwrap();
    assert_eq!(of_first.len(), 2);
    assert_eq!(of_first[0].donor.display_name(), "Anonymous");
    assert_eq!(of_first[0].note, None);
    assert_eq!(of_first[1].donor.display_name(), "Grace");
}

#[tokio::test]
async fn catalog_names_are_unique_and_required() {
    let (engine, _db) = engine_with_db().await;

    engine.new_organization("Padova").await.unwrap();
    let err = engine.new_organization(" padova ").await.unwrap_err();
    assert_eq!(err, EngineError::ExistingKey("padova".to_string()));

    let err = engine.new_campaign("   ", None).await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidName(_)));

    let err = engine
        .new_campaign("Lisbon", Some(MoneyCents::ZERO))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidAmount(_)));

    let err = engine
        .new_recipient("Ada", Some(Uuid::new_v4()), None)
        .await
        .unwrap_err();
    assert_eq!(
        err,
        EngineError::KeyNotFound("organization not exists".to_string())
    );
}

#[tokio::test]
async fn list_recipients_puts_completed_goals_last() {
    let (engine, _db) = engine_with_db().await;
    let done = recipient_with(&engine, 1_000, 1_000).await;
    let half = recipient_with(&engine, 1_000, 500).await;
    let fresh = recipient_with(&engine, 1_000, 0).await;
    let most = recipient_with(&engine, 1_000, 900).await;

    let order: Vec<Uuid> = engine
        .list_recipients()
        .await
        .unwrap()
        .iter()
        .map(|r| r.id)
        .collect();
    assert_eq!(order, vec![most, half, fresh, done]);
}
