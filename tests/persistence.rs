use std::sync::Arc;

use guidepost_lib::models::FeedbackResponse;
use guidepost_lib::{
    AlertDecisionPipeline, Database, Detection, EngineSettings, ManualClock, StationarySignal,
    Zone,
};

#[tokio::test]
async fn profile_and_zones_survive_a_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("guidepost.sqlite3");
    let clock = ManualClock::default();

    {
        let db = Database::new(path.clone()).unwrap();
        let mut pipeline = AlertDecisionPipeline::open(
            Some(db),
            "alice",
            EngineSettings::default(),
            Arc::new(clock.clone()),
        )
        .await;
        for _ in 0..3 {
            pipeline
                .personalization()
                .record_feedback("chair", FeedbackResponse::Ignored);
        }
        pipeline.update_radius(Zone::Warning, 2.0).unwrap();
        pipeline.expand(Some(30.0));
    }

    let db = Database::new(path).unwrap();
    let pipeline = AlertDecisionPipeline::open(
        Some(db.clone()),
        "alice",
        EngineSettings::default(),
        Arc::new(clock.clone()),
    )
    .await;

    let chair = pipeline.personalization().preference("chair").unwrap();
    assert_eq!(chair.ignore_count, 3);
    assert_eq!(chair.priority_adjustment, -0.1);
    assert_eq!(pipeline.personalization().adjusted_priority("chair", 3), 4);

    let zones = pipeline.zones().config();
    assert_eq!(zones.warning_radius, 2.0);
    assert!(zones.expanded_awareness);

    let bob = AlertDecisionPipeline::open(
        Some(db),
        "bob",
        EngineSettings::default(),
        Arc::new(clock),
    )
    .await;
    assert!(bob.personalization().preferences().is_empty());
    assert_eq!(bob.zones().config().warning_radius, 1.5);
}

#[tokio::test]
async fn stale_expansion_collapses_on_first_batch_after_reload() {
    let db = Database::in_memory().unwrap();
    let clock = ManualClock::default();

    let mut first = AlertDecisionPipeline::open(
        Some(db.clone()),
        "alice",
        EngineSettings::default(),
        Arc::new(clock.clone()),
    )
    .await;
    first.expand(Some(10.0));
    drop(first);

    clock.advance_secs(60.0);
    let mut second = AlertDecisionPipeline::open(
        Some(db.clone()),
        "alice",
        EngineSettings::default(),
        Arc::new(clock),
    )
    .await;
    assert!(second.zones().config().expanded_awareness);

    second.process_batch(&[], StationarySignal::moving());
    assert!(!second.zones().config().expanded_awareness);

    let stored = db.load_zone_config("alice").await.unwrap().unwrap();
    assert!(!stored.expanded_awareness);
}

#[tokio::test]
async fn broken_storage_falls_back_to_defaults() {
    let db = Database::in_memory().unwrap();
    db.execute(|conn| {
        conn.execute_batch("DROP TABLE user_preferences;")?;
        Ok(())
    })
    .await
    .unwrap();

    let mut pipeline = AlertDecisionPipeline::open(
        Some(db),
        "alice",
        EngineSettings::default(),
        Arc::new(ManualClock::default()),
    )
    .await;
    assert!(pipeline.personalization().preferences().is_empty());

    pipeline
        .personalization()
        .record_feedback("door", FeedbackResponse::Acknowledged);
    let outcome =
        pipeline.process_batch(&[Detection::new("stairs", 0.4)], StationarySignal::moving());
    assert!(outcome.has_danger);
}

#[tokio::test]
async fn session_without_database_still_decides() {
    let mut pipeline = AlertDecisionPipeline::open(
        None,
        "guest",
        EngineSettings::default(),
        Arc::new(ManualClock::default()),
    )
    .await;
    let outcome =
        pipeline.process_batch(&[Detection::new("door", 1.2)], StationarySignal::moving());
    assert_eq!(outcome.alerts.len(), 1);
}
