// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Quoting and charging against a real store.

use chrono::{Duration, Utc};
use parley_config::model::StorageConfig;
use parley_core::types::{ImageCapability, ModelEntry};
use parley_core::{ChatStore, ParleyError};
use parley_cost::{charge, quote_generation, speech_cost, ChargeReason, SpeechKind};
use parley_storage::SqliteStore;

async fn store(dir: &tempfile::TempDir) -> SqliteStore {
    let store = SqliteStore::new(StorageConfig {
        database_path: dir.path().join("cost.db").to_string_lossy().into_owned(),
        wal_mode: true,
    });
    store.initialize().await.unwrap();
    store
}

fn model(points: i64, reasoning: &str) -> ModelEntry {
    ModelEntry {
        name: "Chat".into(),
        id: "chat-1".into(),
        points,
        reasoning: reasoning.into(),
        image: ImageCapability::None,
        tools: false,
    }
}

#[tokio::test]
async fn non_member_pays_base_and_balance_drops() {
    let dir = tempfile::tempdir().unwrap();
    let store = store(&dir).await;
    let user = store.create_user("alice", None, 5).await.unwrap();

    let quote = quote_generation(&model(3, ""), false, &user, Utc::now()).unwrap();
    charge(&store, user.id, quote.cost, ChargeReason::Generation)
        .await
        .unwrap();

    assert_eq!(store.user(user.id).await.unwrap().unwrap().points, 2);
    let ledger = store.ledger(user.id).await.unwrap();
    assert_eq!(ledger[0].reason, "generation");
}

#[tokio::test]
async fn vip_reasoning_charges_three_and_switches_model() {
    let dir = tempfile::tempdir().unwrap();
    let store = store(&dir).await;
    let user = store.create_user("bob", None, 100).await.unwrap();
    store
        .set_membership(user.id, "VIP", Some(Utc::now() + Duration::days(7)))
        .await
        .unwrap();
    let user = store.user(user.id).await.unwrap().unwrap();

    let quote = quote_generation(&model(4, "chat-1-r"), true, &user, Utc::now()).unwrap();
    assert_eq!(quote.cost, 3);
    assert_eq!(quote.upstream_model, "chat-1-r");

    charge(&store, user.id, quote.cost, ChargeReason::Generation)
        .await
        .unwrap();
    assert_eq!(store.user(user.id).await.unwrap().unwrap().points, 97);
}

#[tokio::test]
async fn charge_rejects_overdraft_without_touching_balance() {
    let dir = tempfile::tempdir().unwrap();
    let store = store(&dir).await;
    let user = store.create_user("carol", None, 1).await.unwrap();

    let err = charge(&store, user.id, 2, ChargeReason::Tts)
        .await
        .unwrap_err();
    assert!(matches!(err, ParleyError::InsufficientCredits));
    assert_eq!(store.user(user.id).await.unwrap().unwrap().points, 1);
}

#[tokio::test]
async fn free_charge_skips_ledger() {
    let dir = tempfile::tempdir().unwrap();
    let store = store(&dir).await;
    let user = store.create_user("dave", None, 0).await.unwrap();
    store
        .set_membership(user.id, "SVIP", Some(Utc::now() + Duration::days(1)))
        .await
        .unwrap();
    let user = store.user(user.id).await.unwrap().unwrap();

    let cost = speech_cost(SpeechKind::Tts, &user, Utc::now()).unwrap();
    charge(&store, user.id, cost, ChargeReason::Tts).await.unwrap();
    assert!(store.ledger(user.id).await.unwrap().is_empty());
}
