use chrono::{Duration, NaiveTime, Utc};
use pfa_schedule::audit::{self, Baseline, FieldChange, ScheduleChange, Snapshot, SnapshotJob};
use pfa_schedule::context::CallContext;
use pfa_schedule::models::{ClassInput, InstanceInput, Weekday};
use pfa_schedule::store::{ScheduleStore, StoreError};
use tempfile::TempDir;

async fn store_with_class() -> (ScheduleStore, i64) {
    let store = ScheduleStore::connect("sqlite::memory:", 1).await.unwrap();
    let class = store
        .create_class(&ClassInput {
            name: "Muay Thai".to_string(),
            categories: vec![],
            deleted: false,
        })
        .await
        .unwrap();
    (store, class.id)
}

fn slot(class_id: i64, start: (u32, u32), end: (u32, u32)) -> InstanceInput {
    InstanceInput {
        class_id,
        weekday: Weekday::Tuesday,
        start_time: NaiveTime::from_hms_opt(start.0, start.1, 0).unwrap(),
        end_time: NaiveTime::from_hms_opt(end.0, end.1, 0).unwrap(),
        time_span: None,
        deleted: false,
    }
}

#[tokio::test]
async fn test_first_run_creates_snapshot() {
    // Arrange
    let (store, class_id) = store_with_class().await;
    let instance = store
        .create_instance(&slot(class_id, (18, 0), (19, 0)))
        .await
        .unwrap();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("logs").join("schedule_snapshot.json");
    let job = SnapshotJob::new(&path);

    // Act
    let report = job
        .run(&store, &CallContext::job("detect-changes"))
        .await
        .unwrap();

    // Assert
    assert_eq!(report.baseline, Baseline::Missing);
    assert!(report.changes.is_empty());
    assert!(report.saved);

    let written: Snapshot =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    let record = &written[&instance.id.to_string()];
    assert_eq!(record.training_class, "Muay Thai");
    assert_eq!(record.weekday, "2");
    assert_eq!(record.start_time, "18:00:00");
    assert_eq!(record.end_time, "19:00:00");
}

#[tokio::test]
async fn test_rerun_without_changes_reports_nothing() {
    // Arrange
    let (store, class_id) = store_with_class().await;
    store
        .create_instance(&slot(class_id, (18, 0), (19, 0)))
        .await
        .unwrap();
    let dir = TempDir::new().unwrap();
    let job = SnapshotJob::new(dir.path().join("snapshot.json"));
    let ctx = CallContext::job("detect-changes");
    job.run(&store, &ctx).await.unwrap();

    // Act
    let report = job.run(&store, &ctx).await.unwrap();

    // Assert
    assert_eq!(report.baseline, Baseline::Loaded);
    assert!(report.changes.is_empty());
}

#[tokio::test]
async fn test_start_time_change_is_reported_once() {
    // Arrange
    let (store, class_id) = store_with_class().await;
    let instance = store
        .create_instance(&slot(class_id, (18, 0), (19, 0)))
        .await
        .unwrap();
    let dir = TempDir::new().unwrap();
    let job = SnapshotJob::new(dir.path().join("snapshot.json"));
    let ctx = CallContext::job("detect-changes");
    job.run(&store, &ctx).await.unwrap();

    store
        .update_instance(instance.id, &slot(class_id, (17, 30), (19, 0)))
        .await
        .unwrap();

    // Act
    let report = job.run(&store, &ctx).await.unwrap();

    // Assert
    assert_eq!(
        report.changes,
        vec![ScheduleChange::Modified {
            id: instance.id.to_string(),
            fields: vec![FieldChange {
                field: "start_time",
                previous: "18:00:00".to_string(),
                current: "17:30:00".to_string(),
            }],
        }]
    );
}

#[tokio::test]
async fn test_deleted_and_added_instances() {
    // Arrange
    let (store, class_id) = store_with_class().await;
    let old = store
        .create_instance(&slot(class_id, (6, 0), (7, 0)))
        .await
        .unwrap();
    let dir = TempDir::new().unwrap();
    let job = SnapshotJob::new(dir.path().join("snapshot.json"));
    let ctx = CallContext::job("detect-changes");
    job.run(&store, &ctx).await.unwrap();

    store.delete_instance(old.id).await.unwrap();
    let new = store
        .create_instance(&slot(class_id, (20, 0), (21, 0)))
        .await
        .unwrap();

    // Act
    let report = job.run(&store, &ctx).await.unwrap();

    // Assert
    assert_eq!(report.changes.len(), 2);
    assert!(report.changes.contains(&ScheduleChange::Deleted {
        id: old.id.to_string(),
        training_class: "Muay Thai".to_string(),
    }));
    assert!(report.changes.contains(&ScheduleChange::Added {
        id: new.id.to_string(),
        training_class: "Muay Thai".to_string(),
    }));
}

#[tokio::test]
async fn test_corrupt_snapshot_is_replaced() {
    // Arrange
    let (store, class_id) = store_with_class().await;
    store
        .create_instance(&slot(class_id, (18, 0), (19, 0)))
        .await
        .unwrap();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("snapshot.json");
    std::fs::write(&path, "{not json").unwrap();
    let job = SnapshotJob::new(&path);
    let ctx = CallContext::job("detect-changes");

    // Act
    let report = job.run(&store, &ctx).await.unwrap();

    // Assert - the error is reported but the snapshot is still rewritten
    assert!(matches!(report.baseline, Baseline::Unreadable(_)));
    assert!(report.saved);
    let rerun = job.run(&store, &ctx).await.unwrap();
    assert_eq!(rerun.baseline, Baseline::Loaded);
    assert!(rerun.changes.is_empty());
}

#[tokio::test]
async fn test_recently_modified_window() {
    // Arrange
    let (store, class_id) = store_with_class().await;
    let instance = store
        .create_instance(&slot(class_id, (18, 0), (19, 0)))
        .await
        .unwrap();
    let ctx = CallContext::job("check-modified");

    // Act
    let recent = audit::recently_modified(&store, &ctx, 7, Utc::now())
        .await
        .unwrap();
    let later = audit::recently_modified(&store, &ctx, 7, Utc::now() + Duration::days(30))
        .await
        .unwrap();

    // Assert
    assert_eq!(recent.instances.len(), 1);
    assert_eq!(recent.instances[0].id, instance.id);
    assert!(later.instances.is_empty());
    assert_eq!(later.days, 7);
}

#[tokio::test]
async fn test_recently_modified_rejects_oversized_window() {
    // Arrange
    let (store, _) = store_with_class().await;
    let ctx = CallContext::job("check-modified");

    // Act
    let result = audit::recently_modified(&store, &ctx, 1_000_000_000, Utc::now()).await;

    // Assert
    assert!(matches!(result, Err(StoreError::Validation(_))));
}
