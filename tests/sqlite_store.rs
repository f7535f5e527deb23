mod common;

use std::sync::Arc;

use common::{body, day, get, origin, FakeClientHost, FakeNetwork};
use focusflow_lib::{
    db::Database,
    progress::{load_progress, save_progress, ProgressRecord},
    store::{keys, load_json, save_json, KeyValueStore},
    worker::{CacheConfig, CacheStorage, Response, WorkerRegistration},
};
use reqwest::StatusCode;
use tempfile::tempdir;

#[tokio::test]
async fn values_survive_a_reopen() {
    let dir = tempdir().unwrap();
    {
        let db = Database::open_in(dir.path()).unwrap();
        save_json(&db, keys::VOLUME, &0.8f32).await.unwrap();
        save_json(&db, keys::CURRENT_TASK, "write report").await.unwrap();
        db.put(keys::THEME, "\"dark\"".into()).await.unwrap();
        db.remove(keys::THEME).await.unwrap();
    }

    let db = Database::open_in(dir.path()).unwrap();
    assert_eq!(load_json::<f32>(&db, keys::VOLUME).await.unwrap(), Some(0.8));
    assert_eq!(
        load_json::<String>(&db, keys::CURRENT_TASK).await.unwrap().as_deref(),
        Some("write report")
    );
    assert_eq!(db.get(keys::THEME).await.unwrap(), None);
}

#[tokio::test]
async fn corrupt_values_read_as_absent() {
    let dir = tempdir().unwrap();
    let db = Database::open_in(dir.path()).unwrap();
    db.put(keys::PROGRESS, "{not json".into()).await.unwrap();

    let record = load_progress(&db, day(2026, 3, 2)).await.unwrap();
    assert_eq!(record, ProgressRecord::fresh(day(2026, 3, 2)));
}

#[tokio::test]
async fn progress_round_trips_on_the_same_day() {
    let dir = tempdir().unwrap();
    let db = Database::open_in(dir.path()).unwrap();
    let today = day(2026, 3, 2);

    let mut record = ProgressRecord::fresh(today);
    record.record_focus(25);
    record.record_focus(25);
    save_progress(&db, &record).await.unwrap();

    let loaded = load_progress(&db, today).await.unwrap();
    assert_eq!(loaded.sessions_today, 2);
    assert_eq!(loaded.focus_minutes_today, 50);
    assert_eq!(loaded.streak_days, record.streak_days);
}

#[tokio::test]
async fn cache_partitions_in_sqlite() {
    let dir = tempdir().unwrap();
    let db = Database::open_in(dir.path()).unwrap();
    let response = Response::ok("audio/mpeg", &b"rain"[..]);

    assert!(db
        .store("audio-v1", "https://focus.example/sounds/rain.mp3", &response)
        .await
        .is_err());

    db.open("audio-v1").await.unwrap();
    db.open("audio-v1").await.unwrap();
    db.store("audio-v1", "https://focus.example/sounds/rain.mp3", &response)
        .await
        .unwrap();

    let hit = db
        .lookup("audio-v1", "https://focus.example/sounds/rain.mp3")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(hit.status, StatusCode::OK);
    assert_eq!(hit.content_type.as_deref(), Some("audio/mpeg"));
    assert_eq!(hit.body.as_ref(), b"rain");

    assert_eq!(db.partitions().await.unwrap(), vec!["audio-v1".to_string()]);
    assert!(db.delete("audio-v1").await.unwrap());
    assert!(!db.delete("audio-v1").await.unwrap());
    assert!(db
        .lookup("audio-v1", "https://focus.example/sounds/rain.mp3")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn registration_on_sqlite_evicts_old_generation() {
    let dir = tempdir().unwrap();
    let db = Arc::new(Database::open_in(dir.path()).unwrap());
    let network = Arc::new(FakeNetwork::serving_app());
    db.open("static-v0").await.unwrap();

    let registration = WorkerRegistration::new(
        origin(),
        db.clone(),
        network.clone(),
        Arc::new(FakeClientHost::default()),
    );
    registration
        .register(CacheConfig::default().with_version("v1"))
        .await
        .unwrap();

    assert_eq!(
        db.partitions().await.unwrap(),
        vec!["audio-v1".to_string(), "static-v1".to_string()]
    );

    network.set_offline(true);
    let shell = registration.fetch(&get("/index.html")).await;
    registration.settle().await;
    assert_eq!(body(&shell), "shell /index.html");
}
