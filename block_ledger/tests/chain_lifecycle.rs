// /////////////////////////////////////////////////////////////////////////////
// Block Ledger
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! End-to-end scenarios against a real in-memory SQLite-backed chain,
//! exercising the full stack (`ChainService` + `SqlBlockRepository` +
//! `LedgerCrypto`) the way a caller embedding this crate would.

use block_ledger::{
    ChainService, CryptoService, DatabaseConfig, EmbeddedMode, LedgerCrypto, PersistenceGateway, RecoveryManager,
    SqlBlockRepository,
};
use block_ledger_domain::{BlockFilter, BlockRepository, NewBlockParams, PublicKeyHex, SearchLevel};
use std::sync::Arc;

async fn new_chain() -> Arc<ChainService> {
    let config = DatabaseConfig::Embedded {
        mode: EmbeddedMode::Memory,
        path: String::new(),
    };
    let gateway = Arc::new(PersistenceGateway::connect(&config).await.unwrap());
    let repository: Arc<dyn BlockRepository> = Arc::new(SqlBlockRepository::new(gateway));
    let crypto = Arc::new(LedgerCrypto::default());
    Arc::new(ChainService::new(repository, crypto))
}

#[tokio::test]
async fn genesis_block_is_appended_and_recognized() {
    let chain = new_chain().await;
    let genesis = chain
        .append(PublicKeyHex::genesis(), None, NewBlockParams::new("genesis"))
        .await
        .unwrap();

    assert!(genesis.is_genesis());
    assert_eq!(chain.count().await.unwrap(), 1);
    assert_eq!(chain.last_block().await.unwrap().unwrap().block_number, 0);
}

#[tokio::test]
async fn chain_extends_with_signed_non_genesis_blocks_and_validates() {
    let chain = new_chain().await;
    chain
        .append(PublicKeyHex::genesis(), None, NewBlockParams::new("genesis"))
        .await
        .unwrap();

    let crypto = LedgerCrypto::default();
    let (signer, private_key) = crypto.generate_keypair().unwrap();

    for i in 1..=5 {
        chain
            .append(
                signer.clone(),
                Some(&private_key),
                NewBlockParams::new(format!("payload-{i}")),
            )
            .await
            .unwrap();
    }

    assert_eq!(chain.count().await.unwrap(), 6);
    chain.validate_chain().await.unwrap();

    let last = chain.last_block().await.unwrap().unwrap();
    assert_eq!(last.block_number, 5);
    assert_eq!(last.data, "payload-5");
}

#[tokio::test]
async fn non_genesis_append_without_private_key_is_rejected() {
    let chain = new_chain().await;
    chain
        .append(PublicKeyHex::genesis(), None, NewBlockParams::new("genesis"))
        .await
        .unwrap();

    let crypto = LedgerCrypto::default();
    let (signer, _private_key) = crypto.generate_keypair().unwrap();

    let result = chain.append(signer, None, NewBlockParams::new("unsigned")).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn encrypting_an_existing_block_preserves_hash_and_is_readable_with_password() {
    let chain = new_chain().await;
    chain
        .append(PublicKeyHex::genesis(), None, NewBlockParams::new("genesis"))
        .await
        .unwrap();

    let crypto = LedgerCrypto::default();
    let (signer, private_key) = crypto.generate_keypair().unwrap();
    let appended = chain
        .append(signer, Some(&private_key), NewBlockParams::new("secret payload"))
        .await
        .unwrap();

    chain.encrypt_existing(appended.block_number, "correct horse battery staple").await.unwrap();

    let stored = chain.by_number(appended.block_number).await.unwrap().unwrap();
    assert!(stored.is_encrypted);
    assert_eq!(stored.hash, appended.hash, "encrypting must not change the block hash");
    assert_eq!(stored.data, appended.data, "encrypting must not mutate stored plaintext data");

    let decrypted = chain
        .by_number_with_password(appended.block_number, "correct horse battery staple")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(decrypted.data, "secret payload");

    chain.validate_chain().await.unwrap();
}

#[tokio::test]
async fn rollback_removes_corrupted_suffix_and_chain_revalidates() {
    let chain = new_chain().await;
    chain
        .append(PublicKeyHex::genesis(), None, NewBlockParams::new("genesis"))
        .await
        .unwrap();

    let crypto = LedgerCrypto::default();
    let (signer, private_key) = crypto.generate_keypair().unwrap();
    for i in 1..=4 {
        chain
            .append(signer.clone(), Some(&private_key), NewBlockParams::new(format!("b{i}")))
            .await
            .unwrap();
    }
    assert_eq!(chain.count().await.unwrap(), 5);

    let removed = chain.rollback_to(2).await.unwrap();
    assert_eq!(removed, 3, "blocks 2, 3, 4 should be removed");
    assert_eq!(chain.count().await.unwrap(), 2);
    chain.validate_chain().await.unwrap();
}

#[tokio::test]
async fn recovery_reauthorizes_a_chain_after_its_signer_is_revoked() {
    let chain = new_chain().await;
    chain
        .append(PublicKeyHex::genesis(), None, NewBlockParams::new("genesis"))
        .await
        .unwrap();

    let crypto = LedgerCrypto::default();
    let (signer, private_key) = crypto.generate_keypair().unwrap();
    chain
        .append(signer.clone(), Some(&private_key), NewBlockParams::new("payload"))
        .await
        .unwrap();

    chain.revoke_key(&signer);
    assert!(!chain.validate().await.unwrap());

    let recovery = RecoveryManager::new(Arc::clone(&chain));
    let result = recovery.recover(signer, "alice").await.unwrap();

    assert!(result.success);
    assert!(chain.validate().await.unwrap());
    chain.validate_chain().await.unwrap();
}

#[tokio::test]
async fn recovery_falls_back_to_rollback_when_reauthorize_cannot_fix_structural_damage() {
    let chain = new_chain().await;
    chain
        .append(PublicKeyHex::genesis(), None, NewBlockParams::new("genesis"))
        .await
        .unwrap();
    let crypto = LedgerCrypto::default();
    let (signer, private_key) = crypto.generate_keypair().unwrap();
    chain
        .append(signer.clone(), Some(&private_key), NewBlockParams::new("payload"))
        .await
        .unwrap();

    let mut tampered = chain.by_number(1).await.unwrap().unwrap();
    tampered.signature = "tampered".to_string();
    chain.rollback_to(1).await.unwrap();
    chain.batch_append(vec![tampered]).await.unwrap();
    chain.revoke_key(&signer);

    let recovery = RecoveryManager::new(Arc::clone(&chain));
    let result = recovery.recover(signer, "alice").await.unwrap();

    assert!(result.success);
    assert_eq!(chain.count().await.unwrap(), 1);
    chain.validate_chain().await.unwrap();
}

#[tokio::test]
async fn streaming_delivers_every_block_exactly_once_across_many_batches() {
    let chain = new_chain().await;
    chain
        .append(PublicKeyHex::genesis(), None, NewBlockParams::new("genesis"))
        .await
        .unwrap();

    let crypto = LedgerCrypto::default();
    let (signer, private_key) = crypto.generate_keypair().unwrap();

    // Exercises the manual pagination loop across several 1000-row batches
    // without paying the cost of a true 25,000-block scale run in CI.
    const TOTAL_NON_GENESIS: u64 = 2_500;
    for i in 0..TOTAL_NON_GENESIS {
        chain
            .append(
                signer.clone(),
                Some(&private_key),
                NewBlockParams::new(format!("stream-{i}")),
            )
            .await
            .unwrap();
    }

    let mut seen = Vec::with_capacity((TOTAL_NON_GENESIS + 1) as usize);
    chain
        .stream(&BlockFilter::default(), &mut |block| {
            seen.push(block.block_number);
            Ok(())
        })
        .await
        .unwrap();

    assert_eq!(seen.len(), (TOTAL_NON_GENESIS + 1) as usize);
    for (idx, number) in seen.iter().enumerate() {
        assert_eq!(*number, idx as u64, "blocks must stream in contiguous order exactly once");
    }
}

#[tokio::test]
async fn metadata_search_finds_blocks_by_key_and_key_value() {
    let chain = new_chain().await;
    chain
        .append(PublicKeyHex::genesis(), None, NewBlockParams::new("genesis"))
        .await
        .unwrap();

    let crypto = LedgerCrypto::default();
    let (signer, private_key) = crypto.generate_keypair().unwrap();

    chain
        .append(
            signer.clone(),
            Some(&private_key),
            NewBlockParams::new("payload-a").with_custom_metadata(serde_json::json!({"dept": "finance"})),
        )
        .await
        .unwrap();
    chain
        .append(
            signer.clone(),
            Some(&private_key),
            NewBlockParams::new("payload-b").with_custom_metadata(serde_json::json!({"dept": "engineering"})),
        )
        .await
        .unwrap();

    let by_key = chain.search_metadata_key("dept", 10).await.unwrap();
    assert_eq!(by_key.len(), 2);

    let by_key_value = chain.search_metadata_key_value("dept", "finance", 10).await.unwrap();
    assert_eq!(by_key_value.len(), 1);
    assert_eq!(by_key_value[0].data, "payload-a");
}

#[tokio::test]
async fn content_search_honors_manual_keyword_level() {
    let chain = new_chain().await;
    chain
        .append(PublicKeyHex::genesis(), None, NewBlockParams::new("genesis"))
        .await
        .unwrap();

    let crypto = LedgerCrypto::default();
    let (signer, private_key) = crypto.generate_keypair().unwrap();
    chain
        .append(
            signer,
            Some(&private_key),
            NewBlockParams::new("payload").with_manual_keywords("urgent,reviewed"),
        )
        .await
        .unwrap();

    let found = chain.search_content("urgent", SearchLevel::FastOnly, 10).await.unwrap();
    assert_eq!(found.len(), 1);

    let not_found = chain.search_content("nonexistent", SearchLevel::FastOnly, 10).await.unwrap();
    assert!(not_found.is_empty());
}

#[tokio::test]
async fn export_then_import_round_trips_into_a_fresh_chain() {
    let chain = new_chain().await;
    chain
        .append(PublicKeyHex::genesis(), None, NewBlockParams::new("genesis"))
        .await
        .unwrap();
    let crypto = LedgerCrypto::default();
    let (signer, private_key) = crypto.generate_keypair().unwrap();
    chain
        .append(signer, Some(&private_key), NewBlockParams::new("exported-payload"))
        .await
        .unwrap();

    let exported = chain.export(None).await.unwrap();

    let fresh = new_chain().await;
    let imported_count = fresh.import(&exported).await.unwrap();

    assert_eq!(imported_count, 2);
    assert_eq!(fresh.count().await.unwrap(), 2);
    fresh.validate_chain().await.unwrap();
    assert_eq!(fresh.last_block().await.unwrap().unwrap().data, "exported-payload");
}
