//! Storage layer tests against an in-memory database.

#![allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]

use hotpatch_core::db::unix_timestamp;

use super::models::{AuditLog, Installation, Patch, Release};
use super::Database;

async fn test_db() -> Database {
    Database::open_in_memory().await.unwrap()
}

async fn seed_app(db: &Database, tier: &str) -> String {
    let id = uuid::Uuid::new_v4().to_string();
    db.create_app(&id, &format!("app-{id}"), "android", &format!("hash-{id}"), "owner-1", tier)
        .await
        .unwrap();
    id
}

fn release_row(app_id: &str, version: &str, channel: &str) -> Release {
    Release {
        id: uuid::Uuid::new_v4().to_string(),
        app_id: app_id.to_string(),
        version: version.to_string(),
        channel: channel.to_string(),
        bundle_url: format!("https://cdn.example.com/{version}.zip"),
        hash: "deadbeef".to_string(),
        signature: "sig".to_string(),
        mandatory: false,
        rollout_percentage: 100,
        is_encrypted: false,
        is_patch: false,
        base_version: None,
        key_id: None,
        size: 1024,
        is_active: true,
        created_at: unix_timestamp(),
    }
}

#[tokio::test]
async fn app_roundtrip_and_key_lookup() {
    let db = test_db().await;
    let id = seed_app(&db, "pro").await;

    let app = db.get_app(&id).await.unwrap();
    assert_eq!(app.tier, "pro");

    let by_key = db.get_app_by_key_hash(&format!("hash-{id}")).await.unwrap();
    assert_eq!(by_key.id, id);

    assert!(db.get_app_by_key_hash("no-such-hash").await.is_err());
}

#[tokio::test]
async fn insert_release_activated_deactivates_previous() {
    let db = test_db().await;
    let app_id = seed_app(&db, "pro").await;

    let mut r1 = release_row(&app_id, "1.0.0", "production");
    r1.created_at = 100;
    db.insert_release_activated(&r1).await.unwrap();

    let mut r2 = release_row(&app_id, "2.0.0", "production");
    r2.created_at = 200;
    db.insert_release_activated(&r2).await.unwrap();

    assert_eq!(db.count_active_releases(&app_id, "production").await.unwrap(), 1);

    let active = db.get_active_release(&app_id, "production").await.unwrap().unwrap();
    assert_eq!(active.release.version, "2.0.0");

    let old = db.get_release(&r1.id).await.unwrap();
    assert!(!old.is_active);
}

#[tokio::test]
async fn insert_release_activated_scoped_to_channel() {
    let db = test_db().await;
    let app_id = seed_app(&db, "pro").await;

    db.insert_release_activated(&release_row(&app_id, "1.0.0", "production"))
        .await
        .unwrap();
    db.insert_release_activated(&release_row(&app_id, "1.0.0", "beta"))
        .await
        .unwrap();

    assert_eq!(db.count_active_releases(&app_id, "production").await.unwrap(), 1);
    assert_eq!(db.count_active_releases(&app_id, "beta").await.unwrap(), 1);
}

#[tokio::test]
async fn duplicate_version_rejected_by_unique_index() {
    let db = test_db().await;
    let app_id = seed_app(&db, "pro").await;

    db.insert_release_activated(&release_row(&app_id, "1.0.0", "production"))
        .await
        .unwrap();
    assert!(db
        .release_version_exists(&app_id, "production", "1.0.0")
        .await
        .unwrap());

    let dup = release_row(&app_id, "1.0.0", "production");
    assert!(db.insert_release_activated(&dup).await.is_err());
}

#[tokio::test]
async fn activate_release_restores_archived_row() {
    let db = test_db().await;
    let app_id = seed_app(&db, "pro").await;

    let mut r1 = release_row(&app_id, "1.0.0", "production");
    r1.created_at = 100;
    db.insert_release_activated(&r1).await.unwrap();
    let mut r2 = release_row(&app_id, "2.0.0", "production");
    r2.created_at = 200;
    db.insert_release_activated(&r2).await.unwrap();

    // Rollback to r1
    let target = db.get_release(&r1.id).await.unwrap();
    db.activate_release(&target).await.unwrap();

    assert_eq!(db.count_active_releases(&app_id, "production").await.unwrap(), 1);
    let active = db.get_active_release(&app_id, "production").await.unwrap().unwrap();
    assert_eq!(active.release.id, r1.id);
}

#[tokio::test]
async fn active_release_tie_broken_by_created_at() {
    let db = test_db().await;
    let app_id = seed_app(&db, "pro").await;

    // Force two active rows with different creation times, bypassing the
    // deactivation step, to model the transient mid-publish state.
    let mut r1 = release_row(&app_id, "1.0.0", "production");
    r1.created_at = 100;
    let mut r2 = release_row(&app_id, "2.0.0", "production");
    r2.created_at = 200;
    db.insert_release_activated(&r1).await.unwrap();
    db.insert_release_activated(&r2).await.unwrap();
    db.activate_release(&db.get_release(&r1.id).await.unwrap())
        .await
        .unwrap();
    sqlx::query("UPDATE releases SET is_active = 1 WHERE id = ?")
        .bind(&r2.id)
        .execute(db.pool())
        .await
        .unwrap();

    let active = db.get_active_release(&app_id, "production").await.unwrap().unwrap();
    assert_eq!(active.release.version, "2.0.0");
}

#[tokio::test]
async fn list_releases_filters_and_counts() {
    let db = test_db().await;
    let app_id = seed_app(&db, "pro").await;

    for (v, ch) in [("1.0.0", "production"), ("2.0.0", "production"), ("1.0.0", "beta")] {
        db.insert_release_activated(&release_row(&app_id, v, ch))
            .await
            .unwrap();
    }

    let (all, total) = db.list_releases(&app_id, None, None, 20, 0).await.unwrap();
    assert_eq!(total, 3);
    assert_eq!(all.len(), 3);

    let (prod, total) = db
        .list_releases(&app_id, Some("production"), None, 20, 0)
        .await
        .unwrap();
    assert_eq!(total, 2);
    assert_eq!(prod.len(), 2);

    let (active, total) = db
        .list_releases(&app_id, Some("production"), Some(true), 20, 0)
        .await
        .unwrap();
    assert_eq!(total, 1);
    assert_eq!(active[0].version, "2.0.0");

    let (page2, _) = db.list_releases(&app_id, None, None, 2, 2).await.unwrap();
    assert_eq!(page2.len(), 1);
}

#[tokio::test]
async fn patches_attach_to_release() {
    let db = test_db().await;
    let app_id = seed_app(&db, "pro").await;

    let release = release_row(&app_id, "2.0.0", "production");
    db.insert_release_activated(&release).await.unwrap();

    let patch = Patch {
        id: uuid::Uuid::new_v4().to_string(),
        release_id: release.id.clone(),
        base_version: "1.0.0".to_string(),
        patch_url: "https://cdn.example.com/patch".to_string(),
        hash: "p1".to_string(),
        signature: "psig".to_string(),
        size: 64,
        created_at: unix_timestamp(),
    };
    db.create_patch(&patch).await.unwrap();

    let active = db.get_active_release(&app_id, "production").await.unwrap().unwrap();
    assert_eq!(active.patches.len(), 1);
    assert_eq!(active.patches[0].base_version, "1.0.0");
}

#[tokio::test]
async fn upsert_device_is_idempotent_on_device_id() {
    let db = test_db().await;
    let app_id = seed_app(&db, "free").await;

    let first = db
        .upsert_device("dev-abc", &app_id, "android", "1.0.0")
        .await
        .unwrap();
    let second = db
        .upsert_device("dev-abc", &app_id, "android", "1.1.0")
        .await
        .unwrap();

    // Same internal row, refreshed version
    assert_eq!(first.id, second.id);
    assert_eq!(second.current_version, "1.1.0");
    assert!(second.last_seen >= first.last_seen);

    let (devices, total) = db.list_devices(&app_id, 20, 0).await.unwrap();
    assert_eq!(total, 1);
    assert_eq!(devices.len(), 1);
}

#[tokio::test]
async fn installation_stats_group_by_status() {
    let db = test_db().await;
    let app_id = seed_app(&db, "free").await;
    let release = release_row(&app_id, "1.0.0", "production");
    db.insert_release_activated(&release).await.unwrap();
    let device = db
        .upsert_device("dev-1", &app_id, "android", "0.9.0")
        .await
        .unwrap();

    for status in ["applied", "applied", "failed"] {
        let inst = Installation {
            id: uuid::Uuid::new_v4().to_string(),
            device_id: device.id.clone(),
            release_id: release.id.clone(),
            status: status.to_string(),
            is_patch: false,
            download_size: 10,
            installed_at: unix_timestamp(),
        };
        db.create_installation(&inst).await.unwrap();
    }

    let stats = db.count_installations_by_status(&release.id).await.unwrap();
    assert_eq!(stats.get("applied"), Some(&2));
    assert_eq!(stats.get("failed"), Some(&1));
    assert_eq!(stats.get("rolled_back"), None);
}

#[tokio::test]
async fn channel_slug_unique_per_app() {
    let db = test_db().await;
    let app_id = seed_app(&db, "pro").await;

    db.create_channel(&uuid::Uuid::new_v4().to_string(), &app_id, "Production", "production", "")
        .await
        .unwrap();
    let dup = db
        .create_channel(&uuid::Uuid::new_v4().to_string(), &app_id, "Prod 2", "production", "")
        .await;
    assert!(dup.is_err());

    // Same slug on a different app is fine
    let other_app = seed_app(&db, "pro").await;
    db.create_channel(&uuid::Uuid::new_v4().to_string(), &other_app, "Production", "production", "")
        .await
        .unwrap();
}

#[tokio::test]
async fn webhook_roundtrip_and_active_filter() {
    let db = test_db().await;
    let app_id = seed_app(&db, "pro").await;

    let wh = db
        .create_webhook(
            &uuid::Uuid::new_v4().to_string(),
            &app_id,
            "https://example.com/hook",
            "secret",
            "release.created",
        )
        .await
        .unwrap();
    assert!(wh.is_active);

    sqlx::query("UPDATE webhooks SET is_active = 0 WHERE id = ?")
        .bind(&wh.id)
        .execute(db.pool())
        .await
        .unwrap();

    assert_eq!(db.list_webhooks(&app_id).await.unwrap().len(), 1);
    assert!(db.list_active_webhooks(&app_id).await.unwrap().is_empty());

    assert!(db.delete_webhook(&app_id, &wh.id).await.unwrap());
    assert!(!db.delete_webhook(&app_id, &wh.id).await.unwrap());
}

#[tokio::test]
async fn audit_logs_capped_and_newest_first() {
    let db = test_db().await;
    let app_id = seed_app(&db, "pro").await;

    for i in 0..5 {
        let entry = AuditLog {
            id: uuid::Uuid::new_v4().to_string(),
            app_id: app_id.clone(),
            actor: "system".to_string(),
            action: "release.create".to_string(),
            entity_id: format!("r-{i}"),
            metadata: String::new(),
            ip_address: String::new(),
            created_at: 1000 + i,
        };
        db.create_audit_log(&entry).await.unwrap();
    }

    let logs = db.list_audit_logs(&app_id, 3).await.unwrap();
    assert_eq!(logs.len(), 3);
    assert_eq!(logs[0].entity_id, "r-4");
}
