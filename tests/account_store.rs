//! Account store behaviour against a real SQLite database.

mod common;

use std::sync::Arc;

use logingate::config::DatabaseConfig;
use logingate::{
    AccountStore, Database, GateError, LegacySha256Hasher, PasswordHasher, SessionRegistry,
    TimestampMode,
};
use uuid::Uuid;

use common::{fast_hasher, ip, memory_store};

#[tokio::test]
async fn test_accounts_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let config = DatabaseConfig {
        url: format!("sqlite://{}", dir.path().join("accounts.db").display()),
        ..DatabaseConfig::default()
    };
    let id = Uuid::new_v4();

    {
        let db = Database::open(&config).await.unwrap();
        let store = AccountStore::new(&db, Arc::new(fast_hasher()));
        let account = store
            .create_account(id, "Steve", "password123", Some(ip("198.51.100.4")))
            .await
            .unwrap();
        account.set_email(Some("steve@example.com".to_string())).unwrap();
        store.save(&account).await.unwrap();
        db.pool().close().await;
    }

    let db = Database::open(&config).await.unwrap();
    let store = AccountStore::new(&db, Arc::new(fast_hasher()));
    let loaded = store.load_by_identifier(id).await.unwrap().unwrap();

    assert_eq!(loaded.username(), "Steve");
    assert_eq!(loaded.last_address(), Some(ip("198.51.100.4")));
    assert_eq!(loaded.email().as_deref(), Some("steve@example.com"));
    assert!(!loaded.is_logged_in());
}

#[tokio::test]
async fn test_roundtrip_in_both_timestamp_modes() {
    for mode in [TimestampMode::Native, TimestampMode::Text] {
        let store = memory_store(mode).await;
        let id = Uuid::new_v4();

        let created = store
            .create_account(id, "Alex", "password123", Some(ip("2001:db8::9")))
            .await
            .unwrap();
        created.set_logged_in(true);
        store.save(&created).await.unwrap();

        let loaded = store.load_by_name("Alex").await.unwrap().unwrap();
        let before = created.snapshot();
        let after = loaded.snapshot();

        assert_eq!(after.id, before.id);
        assert_eq!(after.last_address, before.last_address);
        assert_eq!(after.last_login, before.last_login, "mode {mode:?}");
        assert_eq!(after.password_hash, before.password_hash);
        assert!(!after.logged_in);
    }
}

#[tokio::test]
async fn test_login_flow_updates_persisted_state() {
    let store = memory_store(TimestampMode::Text).await;
    let registry = SessionRegistry::new(&Default::default());
    let id = Uuid::new_v4();
    store
        .create_account(id, "Steve", "password123", None)
        .await
        .unwrap();

    let account = Arc::new(store.load_by_identifier(id).await.unwrap().unwrap());
    registry.attach(Arc::clone(&account));

    registry
        .login(id, "password123", store.hasher().as_ref(), Some(ip("203.0.113.50")))
        .unwrap();
    store.save(&account).await.unwrap();

    let persisted = store.load_by_identifier(id).await.unwrap().unwrap();
    assert_eq!(persisted.last_address(), Some(ip("203.0.113.50")));
    assert_eq!(persisted.last_login(), account.last_login());
    assert!(registry.is_authenticated(id));

    let alts = store.load_all_by_address(ip("203.0.113.50")).await.unwrap();
    assert_eq!(alts.len(), 1);
}

#[tokio::test]
async fn test_legacy_hash_upgraded_after_login() {
    let store = memory_store(TimestampMode::Text).await;
    let registry = SessionRegistry::new(&Default::default());
    let id = Uuid::new_v4();

    let account = store
        .create_account(id, "Notch", "password123", None)
        .await
        .unwrap();
    account.set_password_hash(LegacySha256Hasher.hash("oldpassword").unwrap());
    store.save(&account).await.unwrap();

    let account = Arc::new(store.load_by_identifier(id).await.unwrap().unwrap());
    registry.attach(Arc::clone(&account));

    let outcome = registry
        .login(id, "oldpassword", store.hasher().as_ref(), None)
        .unwrap();
    assert!(outcome.needs_rehash);
    store
        .update_password(&outcome.account, "oldpassword")
        .await
        .unwrap();

    let reloaded = store.load_by_identifier(id).await.unwrap().unwrap();
    let reloaded = Arc::new(reloaded);
    registry.attach(Arc::clone(&reloaded));
    let outcome = registry
        .login(id, "oldpassword", store.hasher().as_ref(), None)
        .unwrap();
    assert!(!outcome.needs_rehash);
}

#[tokio::test]
async fn test_backend_errors_propagate() {
    let healthy = memory_store(TimestampMode::Text).await;

    // Break the table so every statement fails at the backend.
    let db = Database::open_in_memory().await.unwrap();
    let broken = AccountStore::new(&db, Arc::new(fast_hasher()));
    sqlx::query("DROP TABLE accounts")
        .execute(db.pool())
        .await
        .unwrap();

    assert!(matches!(
        broken.load_by_name("Steve").await,
        Err(GateError::Database(_))
    ));
    assert!(matches!(
        broken.delete_by_identifier(Uuid::new_v4()).await,
        Err(GateError::Database(_))
    ));

    // Separate databases are unaffected
    assert_eq!(healthy.count().await.unwrap(), 0);
}
