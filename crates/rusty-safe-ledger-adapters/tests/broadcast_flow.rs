mod common;

use alloy::primitives::keccak256;
use rusty_safe_ledger_adapters::{co_sign, Broadcaster, ChainClientAdapter};
use rusty_safe_ledger_core::{CoreError, RemoveOutcome, SignatureMerge, TxLifecycle};

use common::{
    ledger_key, local_signer, memory_ledger, owner_address, transfer_tx, OWNER_A_KEY, OWNER_B_KEY,
};

#[test]
fn two_of_three_safe_collects_signatures_then_broadcasts() {
    let ledger = memory_ledger();
    let chain = ChainClientAdapter::deterministic();
    let signer = local_signer();
    let key = ledger_key();
    chain.set_threshold(key, 2).expect("threshold");

    ledger.save(key, transfer_tx(0), vec![]).expect("save");
    let broadcaster = Broadcaster::new(&ledger, &chain);

    co_sign(&ledger, &signer, key, 0, owner_address(OWNER_B_KEY)).expect("owner b signs");
    let readiness = broadcaster.readiness(key, 0).expect("readiness");
    assert_eq!(readiness.lifecycle, TxLifecycle::Queued);
    assert!(!readiness.is_executable());

    let err = broadcaster.broadcast(key, 0).expect_err("below threshold");
    assert!(matches!(err, CoreError::IllegalTransition(_)));

    let merge = co_sign(&ledger, &signer, key, 0, owner_address(OWNER_A_KEY)).expect("owner a signs");
    assert_eq!(merge, SignatureMerge::Added);
    let readiness = broadcaster.readiness(key, 0).expect("readiness");
    assert_eq!(readiness.signatures, 2);
    assert!(readiness.is_executable());

    let receipt = broadcaster.broadcast(key, 0).expect("broadcast");
    assert_eq!(receipt.transition.to, TxLifecycle::Broadcast);
    assert_eq!(receipt.safe_tx_hash, readiness.safe_tx_hash);
    assert_eq!(receipt.queue_cleanup, Ok(RemoveOutcome::Removed(1)));
    assert!(ledger.get(key, 0).expect("get").is_none());

    let records = chain.broadcasts().expect("records");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].tx_hash, receipt.chain_tx_hash);
    let selector = &keccak256(
        "execTransaction(address,uint256,bytes,uint8,uint256,uint256,uint256,address,address,bytes)",
    )[..4];
    assert_eq!(&records[0].calldata[..4], selector);
}

#[test]
fn future_nonce_waits_for_the_queue() {
    let ledger = memory_ledger();
    let chain = ChainClientAdapter::deterministic();
    let signer = local_signer();
    let key = ledger_key();

    ledger.save(key, transfer_tx(1), vec![]).expect("save");
    co_sign(&ledger, &signer, key, 1, owner_address(OWNER_A_KEY)).expect("sign");

    let broadcaster = Broadcaster::new(&ledger, &chain);
    let readiness = broadcaster.readiness(key, 1).expect("readiness");
    assert_eq!(readiness.lifecycle, TxLifecycle::ReadyToBroadcast);
    assert!(!readiness.is_executable());

    let err = broadcaster.broadcast(key, 1).expect_err("nonce gap");
    assert_eq!(err.field(), Some("nonce"));
    assert!(ledger.get(key, 1).expect("get").is_some());
}

#[test]
fn co_sign_requires_a_known_key_and_transaction() {
    let ledger = memory_ledger();
    let signer = local_signer();
    let key = ledger_key();

    let err = co_sign(&ledger, &signer, key, 0, owner_address(OWNER_A_KEY))
        .expect_err("no transaction");
    assert!(err.is_not_found());

    ledger.save(key, transfer_tx(0), vec![]).expect("save");
    let stranger = alloy::primitives::Address::repeat_byte(0x77);
    let err = co_sign(&ledger, &signer, key, 0, stranger).expect_err("unknown key");
    assert!(matches!(err, CoreError::Signing(_)));
}

#[test]
fn receipt_survives_queue_cleanup_failure() {
    let ledger = memory_ledger();
    let chain = ChainClientAdapter::deterministic();
    let signer = local_signer();
    let key = ledger_key();

    ledger.save(key, transfer_tx(0), vec![]).expect("save");
    co_sign(&ledger, &signer, key, 0, owner_address(OWNER_A_KEY)).expect("sign");
    ledger.storage().fail_writes(true).expect("disable writes");

    let receipt = Broadcaster::new(&ledger, &chain)
        .broadcast(key, 0)
        .expect("submitted transaction yields a receipt");
    let records = chain.broadcasts().expect("records");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].tx_hash, receipt.chain_tx_hash);

    let cleanup = receipt.queue_cleanup.expect_err("removal could not persist");
    assert!(cleanup.contains("writes disabled"));
    assert!(ledger.get(key, 0).expect("get").is_some());

    // the chain nonce moved on, so a retry cannot resubmit the same transaction
    ledger.storage().fail_writes(false).expect("enable writes");
    let err = Broadcaster::new(&ledger, &chain)
        .broadcast(key, 0)
        .expect_err("nonce already consumed");
    assert_eq!(err.field(), Some("nonce"));
    assert_eq!(chain.broadcasts().expect("records").len(), 1);
}
