//! PostgreSQL credential store against a live database.
//!
//! Runs only when `DATABASE_URL` is set; otherwise each test returns early.

use chrono::{Duration, Utc};
use settle_core::auth::password::hash_password;
use settle_core::auth::queries::PgCredentialStore;
use settle_core::auth::secrets::{RESET_CODE_MAX_MISSES, digest_secret, generate_reset_token};
use settle_core::auth::store::CredentialStore;
use settle_core::models::auth::{PortalSubject, Role};
use sqlx::PgPool;

async fn store() -> Option<PgCredentialStore> {
    let url = std::env::var("DATABASE_URL").ok()?;
    let pool = PgPool::connect(&url).await.expect("connect");
    settle_core::migrate::migrate(&pool).await.expect("migrate");
    Some(PgCredentialStore::new(pool))
}

async fn insert_user(store: &PgCredentialStore, role: Role) -> (i64, String) {
    let email = format!("{}@example.test", generate_reset_token().to_lowercase());
    let id: i64 = sqlx::query_scalar(
        "INSERT INTO users (email, name, password_hash, role) \
         VALUES ($1, 'Test', $2, $3) RETURNING id",
    )
    .bind(&email)
    .bind(hash_password("Secret123!", 4).unwrap())
    .bind(role.as_str())
    .fetch_one(store.pool())
    .await
    .expect("insert user");
    (id, email)
}

#[tokio::test]
async fn finds_active_users_and_customers() {
    let Some(store) = store().await else { return };
    let (staff_id, staff_email) = insert_user(&store, Role::Manager).await;
    let (customer_id, customer_email) = insert_user(&store, Role::Customer).await;

    let user = store.find_user_by_email(&staff_email).await.unwrap().unwrap();
    assert_eq!(user.id, staff_id);
    assert_eq!(user.role, Role::Manager);

    assert!(store.find_portal_customer_by_email(&staff_email).await.unwrap().is_none());
    let customer = store
        .find_portal_customer_by_email(&customer_email)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(customer.user_id, customer_id);
}

#[tokio::test]
async fn reset_code_is_consumed_once() {
    let Some(store) = store().await else { return };
    let (id, email) = insert_user(&store, Role::Agent).await;
    let now = Utc::now();
    let digest = digest_secret("123456");

    store
        .upsert_reset_code(&email, &digest_secret("654321"), now + Duration::minutes(15))
        .await
        .unwrap();
    store
        .upsert_reset_code(&email, &digest, now + Duration::minutes(15))
        .await
        .unwrap();
    assert!(!store.reset_code_is_valid(&email, &digest_secret("654321"), now).await.unwrap());
    assert!(store.reset_code_is_valid(&email, &digest, now).await.unwrap());

    let new_hash = hash_password("NewSecret456", 4).unwrap();
    assert!(store.consume_reset_code(&email, &digest, &new_hash, now).await.unwrap());
    assert!(!store.consume_reset_code(&email, &digest, &new_hash, now).await.unwrap());

    let user = store.find_user_by_id(id).await.unwrap().unwrap();
    assert_eq!(user.password_hash, new_hash);
}

#[tokio::test]
async fn portal_token_is_consumed_once() {
    let Some(store) = store().await else { return };
    let (id, _) = insert_user(&store, Role::Customer).await;
    let now = Utc::now();
    let subject = PortalSubject::Customer(id);
    let first = digest_secret(&generate_reset_token());
    let second = digest_secret(&generate_reset_token());

    store
        .insert_portal_reset_token(subject, &first, now + Duration::hours(1), now)
        .await
        .unwrap();
    store
        .insert_portal_reset_token(subject, &second, now + Duration::hours(1), now)
        .await
        .unwrap();

    let new_hash = hash_password("Portal9876", 4).unwrap();
    assert!(store.consume_portal_reset_token(&first, &new_hash, now).await.unwrap().is_none());
    assert_eq!(
        store.consume_portal_reset_token(&second, &new_hash, now).await.unwrap(),
        Some(subject)
    );
    assert!(store.consume_portal_reset_token(&second, &new_hash, now).await.unwrap().is_none());
}

#[tokio::test]
async fn misses_discard_code_at_limit() {
    let Some(store) = store().await else { return };
    let (_, email) = insert_user(&store, Role::Admin).await;
    let now = Utc::now();
    let digest = digest_secret("246810");
    store
        .upsert_reset_code(&email, &digest, now + Duration::minutes(15))
        .await
        .unwrap();

    for _ in 1..RESET_CODE_MAX_MISSES {
        assert!(!store.record_reset_code_miss(&email, RESET_CODE_MAX_MISSES).await.unwrap());
    }
    assert!(store.reset_code_is_valid(&email, &digest, now).await.unwrap());
    assert!(store.record_reset_code_miss(&email, RESET_CODE_MAX_MISSES).await.unwrap());
    assert!(!store.reset_code_is_valid(&email, &digest, now).await.unwrap());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_code_consumers_succeed_once() {
    let Some(store) = store().await else { return };
    let (id, email) = insert_user(&store, Role::Agent).await;
    let now = Utc::now();
    let digest = digest_secret("135790");
    store
        .upsert_reset_code(&email, &digest, now + Duration::minutes(15))
        .await
        .unwrap();

    let tasks: Vec<_> = (0..8)
        .map(|i| {
            let store = store.clone();
            let email = email.clone();
            let digest = digest.clone();
            tokio::spawn(async move {
                let hash = format!("parallel-hash-{i}");
                let consumed = store
                    .consume_reset_code(&email, &digest, &hash, now)
                    .await
                    .unwrap();
                consumed.then_some(hash)
            })
        })
        .collect();

    let mut winners = Vec::new();
    for task in tasks {
        winners.extend(task.await.unwrap());
    }
    assert_eq!(winners.len(), 1);

    let user = store.find_user_by_id(id).await.unwrap().unwrap();
    assert_eq!(user.password_hash, winners[0]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_token_consumers_succeed_once() {
    let Some(store) = store().await else { return };
    let (id, _) = insert_user(&store, Role::Customer).await;
    let now = Utc::now();
    let subject = PortalSubject::Customer(id);
    let digest = digest_secret(&generate_reset_token());
    store
        .insert_portal_reset_token(subject, &digest, now + Duration::hours(1), now)
        .await
        .unwrap();

    let tasks: Vec<_> = (0..8)
        .map(|i| {
            let store = store.clone();
            let digest = digest.clone();
            tokio::spawn(async move {
                let hash = format!("parallel-hash-{i}");
                store
                    .consume_portal_reset_token(&digest, &hash, now)
                    .await
                    .unwrap()
                    .map(|subject| (subject, hash))
            })
        })
        .collect();

    let mut winners = Vec::new();
    for task in tasks {
        winners.extend(task.await.unwrap());
    }
    assert_eq!(winners.len(), 1);
    assert_eq!(winners[0].0, subject);

    let user = store.find_user_by_id(id).await.unwrap().unwrap();
    assert_eq!(user.password_hash, winners[0].1);
}
