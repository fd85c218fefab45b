//! End-to-end recovery of a bike with a promoted theft alert.

use std::sync::Arc;

use bikewatch::config::NotificationConfig;
use bikewatch::dispatch::NotificationKind;
use bikewatch::model::{BikeStatus, NewBike, NewStolenRecord, TheftAlertStatus};
use bikewatch::{
    EffectDispatcher, PathRenderer, RecordScope, RecordingNotifier, RecoveryDisplayStatus,
    RecoveryReport, RecoveryService, Storage,
};

fn stolen_bike_with_alert(storage: &mut Storage) -> (i64, i64) {
    let mut new = NewBike::new("WSBC602", "Surly");
    new.owner_name = Some("Sam".to_string());
    let bike = storage.register_bike(&new).unwrap();
    storage.add_photo(bike.id, "bikes/front.jpg", false).unwrap();

    let record = storage
        .report_stolen(bike.id, NewStolenRecord::default())
        .unwrap();
    storage
        .create_theft_alert(record.id, TheftAlertStatus::Active, Some(9))
        .unwrap();

    let renderer = PathRenderer::new("alert_images", ["jpg"]);
    let image = storage
        .generate_alert_image(record.id, None, &renderer)
        .unwrap();
    assert!(image.is_some());

    (bike.id, record.id)
}

#[tokio::test]
async fn recovery_notifies_once_and_becomes_displayable() {
    let mut storage = Storage::open_in_memory().unwrap();
    let (bike_id, record_id) = stolen_bike_with_alert(&mut storage);

    let notifier = Arc::new(RecordingNotifier::new());
    let dispatcher = EffectDispatcher::spawn(notifier.clone(), &NotificationConfig::default());

    let report: RecoveryReport = serde_json::from_str(
        r#"{
            "recovered_description": "Found it at the flea market",
            "index_helped_recovery": "1",
            "can_share_recovery": "true",
            "recovered_at": "2017-01-31T23:57:56",
            "timezone": "Atlantic/Reykjavik"
        }"#,
    )
    .unwrap();

    let mut service = RecoveryService::new(&mut storage, &dispatcher, chrono_tz::UTC);
    let first = service.record(record_id, &report).unwrap();
    let second = service.record(record_id, &report).unwrap();
    assert_eq!(first.effects.len(), 1);
    assert!(first.released_alert_image);
    assert!(second.effects.is_empty());
    assert_eq!(
        service.display_status(record_id).unwrap().status(),
        RecoveryDisplayStatus::WaitingOnDecision
    );
    drop(service);

    let stats = dispatcher.shutdown().await;
    assert_eq!(stats.delivered, 1);
    let delivered = notifier.delivered();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].kind, NotificationKind::PromotedAlertRecovered);
    assert_eq!(delivered[0].stolen_record_id, record_id);

    let record = storage.get_stolen_record(record_id).unwrap().unwrap();
    assert!(!record.current);
    assert!(record.index_helped_recovery);
    assert_eq!(
        record.recovered_at.unwrap().to_rfc3339(),
        "2017-01-31T23:57:56+00:00"
    );

    let bike = storage.get_bike(bike_id).unwrap().unwrap();
    assert_eq!(bike.status, BikeStatus::StatusWithOwner);
    assert_eq!(bike.current_stolen_record_id, None);
    assert!(storage.alert_image(record_id).unwrap().is_none());

    let unposted = storage
        .list_stolen_records(RecordScope::RecoveryUnposted, 10)
        .unwrap();
    assert_eq!(unposted.len(), 1);

    let display = storage.recovery_display_from_record(record_id).unwrap();
    assert_eq!(display.quote_by.as_deref(), Some("Sam"));
    storage.create_recovery_display(&display).unwrap();

    assert_eq!(
        storage.display_status(record_id).unwrap().status(),
        RecoveryDisplayStatus::Displayed
    );
    assert!(storage
        .list_stolen_records(RecordScope::RecoveryUnposted, 10)
        .unwrap()
        .is_empty());
    assert_eq!(
        storage
            .list_stolen_records(RecordScope::Displayable, 10)
            .unwrap()
            .len(),
        1
    );
}

#[tokio::test]
async fn missing_record_queues_nothing() {
    let mut storage = Storage::open_in_memory().unwrap();
    let notifier = Arc::new(RecordingNotifier::new());
    let dispatcher = EffectDispatcher::spawn(notifier.clone(), &NotificationConfig::default());

    let result = RecoveryService::new(&mut storage, &dispatcher, chrono_tz::UTC)
        .record(404, &RecoveryReport::default());
    assert!(matches!(result, Err(bikewatch::Error::StolenRecordNotFound(404))));

    let stats = dispatcher.shutdown().await;
    assert_eq!(stats.delivered, 0);
    assert!(notifier.delivered().is_empty());
}
