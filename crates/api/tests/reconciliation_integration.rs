//! Integration tests for entitlement reconciliation against PostgreSQL.
//!
//! Run with: TEST_DATABASE_URL=postgres://... cargo test --test reconciliation_integration

mod common;

use common::{integer, setup_pool, string, TestSubscription};
use domain::models::{
    CustomerProfile, EntitlementKey, EntitlementValue, ObservedValue, RegistrationStatus,
};
use domain::services::{ReconcileDecision, ReconcileError, Reconciler};
use persistence::repositories::{CustomerRepository, EntitlementRepository, PgEntitlementStore};
use sqlx::PgPool;

async fn registered_subscription(pool: &PgPool) -> TestSubscription {
    let sub = TestSubscription::new();
    CustomerRepository::new(pool.clone())
        .upsert_resolved(&sub.customer, Some("Widget Pro"))
        .await
        .unwrap();
    sub
}

fn reconciler(pool: &PgPool) -> Reconciler<PgEntitlementStore> {
    Reconciler::new(PgEntitlementStore::new(pool.clone()))
}

fn key(sub: &TestSubscription, dimension: &str) -> EntitlementKey {
    EntitlementKey::new(sub.customer_identifier(), sub.product_code(), dimension)
}

async fn history_values(pool: &PgPool, key: &EntitlementKey) -> Vec<EntitlementValue> {
    EntitlementRepository::new(pool.clone())
        .history(key)
        .await
        .unwrap()
        .iter()
        .map(|row| row.value.to_value().unwrap())
        .collect()
}

#[tokio::test]
async fn test_seats_scenario() {
    let pool = setup_pool().await;
    let sub = registered_subscription(&pool).await;
    let reconciler = reconciler(&pool);
    let seats = key(&sub, "seats");

    let outcome = reconciler
        .reconcile(&[sub.observation("seats", integer(10))])
        .await
        .unwrap();
    assert_eq!(outcome.entitlements[0].decision, ReconcileDecision::Created);

    let outcome = reconciler
        .reconcile(&[sub.observation("seats", integer(10))])
        .await
        .unwrap();
    assert_eq!(outcome.entitlements[0].decision, ReconcileDecision::Unchanged);

    let outcome = reconciler
        .reconcile(&[sub.observation("seats", integer(20))])
        .await
        .unwrap();
    assert_eq!(outcome.entitlements[0].decision, ReconcileDecision::Changed);

    assert_eq!(
        history_values(&pool, &seats).await,
        vec![EntitlementValue::Integer(10), EntitlementValue::Integer(20)]
    );

    let current = EntitlementRepository::new(pool.clone())
        .current_for_customer(sub.customer_identifier())
        .await
        .unwrap();
    assert_eq!(current.len(), 1);
    assert_eq!(current[0].value.to_value().unwrap(), EntitlementValue::Integer(20));
    assert_eq!(current[0].product_name.as_deref(), Some("Widget Pro"));
}

#[tokio::test]
async fn test_replaying_batch_is_idempotent() {
    let pool = setup_pool().await;
    let sub = registered_subscription(&pool).await;
    let reconciler = reconciler(&pool);
    let batch = vec![
        sub.observation("seats", integer(5)),
        sub.observation("tier", string("pro")),
        sub.observation(
            "ratio",
            ObservedValue {
                double_value: Some(0.75),
                ..Default::default()
            },
        ),
    ];

    let first = reconciler.reconcile(&batch).await.unwrap();
    assert_eq!(first.created(), 3);

    let second = reconciler.reconcile(&batch).await.unwrap();
    assert_eq!(second.unchanged(), 3);
    assert_eq!(second.appended(), 0);

    let repo = EntitlementRepository::new(pool.clone());
    for dimension in ["seats", "tier", "ratio"] {
        assert_eq!(repo.count_for_key(&key(&sub, dimension)).await.unwrap(), 1);
    }
}

#[tokio::test]
async fn test_type_change_appends_record() {
    let pool = setup_pool().await;
    let sub = registered_subscription(&pool).await;
    let reconciler = reconciler(&pool);

    reconciler
        .reconcile(&[sub.observation("seats", integer(1))])
        .await
        .unwrap();
    let outcome = reconciler
        .reconcile(&[sub.observation("seats", string("1"))])
        .await
        .unwrap();

    assert_eq!(outcome.entitlements[0].decision, ReconcileDecision::Changed);
    assert_eq!(
        history_values(&pool, &key(&sub, "seats")).await,
        vec![
            EntitlementValue::Integer(1),
            EntitlementValue::String("1".to_string())
        ]
    );
}

#[tokio::test]
async fn test_invalid_value_rolls_back_batch() {
    let pool = setup_pool().await;
    let sub = registered_subscription(&pool).await;

    let result = reconciler(&pool)
        .reconcile(&[
            sub.observation("seats", integer(10)),
            sub.observation("broken", ObservedValue::default()),
        ])
        .await;

    match result {
        Err(ReconcileError::InvalidValue { key: bad }) => assert_eq!(bad.dimension, "broken"),
        other => panic!("Expected InvalidValue, got {:?}", other),
    }

    let repo = EntitlementRepository::new(pool.clone());
    assert_eq!(repo.count_for_key(&key(&sub, "seats")).await.unwrap(), 0);
    assert_eq!(repo.count_for_key(&key(&sub, "broken")).await.unwrap(), 0);
}

#[tokio::test]
async fn test_missing_expiration_on_create_is_rejected() {
    let pool = setup_pool().await;
    let sub = registered_subscription(&pool).await;
    let mut observation = sub.observation("seats", integer(3));
    observation.expiration_epoch_seconds = None;

    let result = reconciler(&pool).reconcile(&[observation]).await;

    assert!(matches!(
        result,
        Err(ReconcileError::PreconditionViolation(_))
    ));
    let repo = EntitlementRepository::new(pool.clone());
    assert_eq!(repo.count_for_key(&key(&sub, "seats")).await.unwrap(), 0);
}

#[tokio::test]
async fn test_missing_expiration_accepted_when_unchanged() {
    let pool = setup_pool().await;
    let sub = registered_subscription(&pool).await;
    let reconciler = reconciler(&pool);

    reconciler
        .reconcile(&[sub.observation("seats", integer(3))])
        .await
        .unwrap();

    let mut observation = sub.observation("seats", integer(3));
    observation.expiration_epoch_seconds = None;
    let outcome = reconciler.reconcile(&[observation]).await.unwrap();
    assert_eq!(outcome.unchanged(), 1);
}

#[tokio::test]
async fn test_same_key_twice_in_batch_keeps_order() {
    let pool = setup_pool().await;
    let sub = registered_subscription(&pool).await;

    let outcome = reconciler(&pool)
        .reconcile(&[
            sub.observation("seats", integer(1)),
            sub.observation("seats", integer(2)),
        ])
        .await
        .unwrap();

    assert_eq!(outcome.entitlements[0].decision, ReconcileDecision::Created);
    assert_eq!(outcome.entitlements[1].decision, ReconcileDecision::Changed);

    let history = EntitlementRepository::new(pool.clone())
        .history(&key(&sub, "seats"))
        .await
        .unwrap();
    assert_eq!(history.len(), 2);
    assert!(history[0].created_at < history[1].created_at);
    assert_eq!(history[1].value.to_value().unwrap(), EntitlementValue::Integer(2));
    assert_eq!(history[1].created_at, history[1].updated_at);
}

#[tokio::test]
async fn test_concurrent_reconciliations_append_once() {
    let pool = setup_pool().await;
    let sub = registered_subscription(&pool).await;
    let batch = vec![sub.observation("seats", integer(42))];

    let a = reconciler(&pool);
    let b = reconciler(&pool);
    let (first, second) = tokio::join!(a.reconcile(&batch), b.reconcile(&batch));

    let outcomes = [first.unwrap(), second.unwrap()];
    assert_eq!(outcomes.iter().map(|o| o.created()).sum::<usize>(), 1);
    assert_eq!(outcomes.iter().map(|o| o.unchanged()).sum::<usize>(), 1);

    let repo = EntitlementRepository::new(pool.clone());
    assert_eq!(repo.count_for_key(&key(&sub, "seats")).await.unwrap(), 1);
}

#[tokio::test]
async fn test_overlapping_batches_in_opposite_order_both_commit() {
    let pool = setup_pool().await;
    let sub = registered_subscription(&pool).await;
    let forward = vec![
        sub.observation("seats", integer(5)),
        sub.observation("tier", string("gold")),
        sub.observation("users", integer(50)),
    ];
    let backward: Vec<_> = forward.iter().rev().cloned().collect();

    for _ in 0..5 {
        let a = reconciler(&pool);
        let b = reconciler(&pool);
        let (first, second) = tokio::join!(a.reconcile(&forward), b.reconcile(&backward));
        first.unwrap();
        second.unwrap();
    }

    let repo = EntitlementRepository::new(pool.clone());
    for dimension in ["seats", "tier", "users"] {
        assert_eq!(repo.count_for_key(&key(&sub, dimension)).await.unwrap(), 1);
    }
}

#[tokio::test]
async fn test_registration_status_lifecycle() {
    let pool = setup_pool().await;
    let customers = CustomerRepository::new(pool.clone());

    assert_eq!(
        customers
            .registration_status(&common::unique_id("nobody"))
            .await
            .unwrap(),
        RegistrationStatus::NotFound
    );

    let sub = registered_subscription(&pool).await;
    reconciler(&pool)
        .reconcile(&[sub.observation("seats", integer(1))])
        .await
        .unwrap();

    assert_eq!(
        customers
            .registration_status(sub.customer_identifier())
            .await
            .unwrap(),
        RegistrationStatus::NeedsRegistration {
            product_name: Some("Widget Pro".to_string())
        }
    );

    let profile = CustomerProfile {
        name: "Jane Doe".to_string(),
        email: "jane@example.com".to_string(),
        phone: "+1 555 123 4567".to_string(),
        job_role: "CTO".to_string(),
        company: "Acme".to_string(),
        country: "US".to_string(),
    };
    assert!(customers
        .update_profile(sub.customer_identifier(), &profile)
        .await
        .unwrap());

    assert_eq!(
        customers
            .registration_status(sub.customer_identifier())
            .await
            .unwrap(),
        RegistrationStatus::Registered {
            product_name: Some("Widget Pro".to_string())
        }
    );

    let stored = customers
        .find_by_id(sub.customer_identifier())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.company.as_deref(), Some("Acme"));
    assert!(stored.updated_at >= stored.created_at);
}

#[tokio::test]
async fn test_update_profile_unknown_customer() {
    let pool = setup_pool().await;
    let profile = CustomerProfile {
        name: "A".to_string(),
        email: "a@example.com".to_string(),
        phone: "+1 555 000 0000".to_string(),
        job_role: "B".to_string(),
        company: "C".to_string(),
        country: "D".to_string(),
    };
    let updated = CustomerRepository::new(pool.clone())
        .update_profile(&common::unique_id("ghost"), &profile)
        .await
        .unwrap();
    assert!(!updated);
}

#[tokio::test]
async fn test_upsert_keeps_existing_product_name_and_profile() {
    let pool = setup_pool().await;
    let customers = CustomerRepository::new(pool.clone());
    let mut sub = registered_subscription(&pool).await;

    let profile = CustomerProfile {
        name: "Jane Doe".to_string(),
        email: "jane@example.com".to_string(),
        phone: "+1 555 123 4567".to_string(),
        job_role: "CTO".to_string(),
        company: "Acme".to_string(),
        country: "US".to_string(),
    };
    customers
        .update_profile(sub.customer_identifier(), &profile)
        .await
        .unwrap();

    sub.customer.aws_account_id = "210987654321".to_string();
    customers.upsert_resolved(&sub.customer, None).await.unwrap();

    let stored = customers
        .find_by_id(sub.customer_identifier())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.aws_account_id, "210987654321");
    assert_eq!(stored.name.as_deref(), Some("Jane Doe"));

    let product_name: Option<String> =
        sqlx::query_scalar("SELECT product_name FROM products WHERE product_code = $1")
            .bind(sub.product_code())
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(product_name.as_deref(), Some("Widget Pro"));
}

#[tokio::test]
async fn test_values_are_immutable() {
    let pool = setup_pool().await;
    let sub = registered_subscription(&pool).await;
    reconciler(&pool)
        .reconcile(&[sub.observation("seats", integer(7))])
        .await
        .unwrap();

    let history = EntitlementRepository::new(pool.clone())
        .history(&key(&sub, "seats"))
        .await
        .unwrap();
    let result = sqlx::query("UPDATE entitlement_values SET integer_value = 8 WHERE value_id = $1")
        .bind(history[0].value.value_id)
        .execute(&pool)
        .await;
    assert!(result.is_err());
}
