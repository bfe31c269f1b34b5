mod common;

use alloy::primitives::{Address, U256};
use rusty_safe_ledger_core::{
    CoreError, ImportSummary, LedgerExport, LedgerKey, EXPORT_SCHEMA_VERSION,
};
use serde_json::json;

use common::{dummy_signature, ledger_key, new_ledger, safe_address, sample_tx};

fn owner(byte: u8) -> Address {
    Address::repeat_byte(byte)
}

#[test]
fn export_import_round_trip() {
    let source = new_ledger();
    let key = ledger_key();
    source
        .save(key, sample_tx(0), vec![dummy_signature(owner(1), 1)])
        .expect("save");
    source
        .save(
            key,
            sample_tx(1),
            vec![dummy_signature(owner(1), 2), dummy_signature(owner(2), 3)],
        )
        .expect("save");

    let exported = source.export_json(key).expect("export");
    let target = new_ledger();
    let summary = target.import(key, &exported).expect("import");
    assert_eq!(
        summary,
        ImportSummary {
            added: 2,
            ..ImportSummary::default()
        }
    );
    assert_eq!(
        target.get_all(key).expect("target"),
        source.get_all(key).expect("source")
    );

    // importing the same document again changes nothing
    let again = target.import(key, &exported).expect("reimport");
    assert_eq!(again.unchanged, 2);
    assert!(!again.changed());
}

#[test]
fn export_document_shape() {
    let ledger = new_ledger();
    ledger
        .save(ledger_key(), sample_tx(3), vec![dummy_signature(owner(1), 1)])
        .expect("save");
    let export: LedgerExport = ledger.export(ledger_key()).expect("export");
    assert_eq!(export.version, EXPORT_SCHEMA_VERSION);
    assert_eq!(export.key(), ledger_key());

    let value: serde_json::Value =
        serde_json::from_str(&export.to_json().expect("json")).expect("parse");
    let tx = &value["transactions"][0];
    assert_eq!(tx["data"]["nonce"], json!(3));
    assert_eq!(tx["data"]["value"], json!("3000"));
    assert_eq!(tx["data"]["operation"], json!(0));
    assert_eq!(tx["signatures"][0]["isContractSignature"], json!(false));
    assert!(tx["signatures"][0]["data"]
        .as_str()
        .expect("hex")
        .starts_with("0x"));
}

#[test]
fn legacy_single_transaction_import() {
    let ledger = new_ledger();
    let legacy = json!({
        "tx": {
            "data": {
                "to": "0x000000000000000000000000000000000000CAFE",
                "value": "0x0de0b6b3a7640000",
                "data": "0x",
                "operation": "0",
                "safeTxGas": 0,
                "baseGas": "0",
                "gasPrice": "0",
                "gasToken": null,
                "refundReceiver": "",
                "nonce": "12"
            },
            "signatures": [
                {"signer": "0x1111111111111111111111111111111111111111", "data": format!("0x{}1f", "ab".repeat(64))}
            ]
        }
    });

    let summary = ledger
        .import(ledger_key(), &legacy.to_string())
        .expect("legacy import");
    assert_eq!(summary.added, 1);

    let tx = ledger.get(ledger_key(), 12).expect("get").expect("present");
    assert_eq!(tx.data.value, U256::from(1_000_000_000_000_000_000u128));
    assert_eq!(tx.data.gas_token, Address::ZERO);
    assert_eq!(tx.signatures.len(), 1);
    assert!(!tx.signatures[0].is_contract_signature);
}

#[test]
fn bare_array_and_bare_transaction_shapes() {
    let ledger = new_ledger();
    let entry = |nonce: u64| {
        json!({
            "data": serde_json::to_value(sample_tx(nonce)).expect("tx json"),
            "signatures": []
        })
    };

    ledger
        .import(ledger_key(), &json!([entry(4), entry(2)]).to_string())
        .expect("array import");
    ledger
        .import(ledger_key(), &entry(8).to_string())
        .expect("bare import");

    let nonces: Vec<u64> = ledger
        .get_all(ledger_key())
        .expect("get_all")
        .iter()
        .map(|t| t.nonce())
        .collect();
    assert_eq!(nonces, vec![2, 4, 8]);
}

#[test]
fn import_merges_same_hash_and_replaces_different_hash() {
    let ledger = new_ledger();
    let key = ledger_key();
    ledger
        .save(key, sample_tx(0), vec![dummy_signature(owner(1), 1)])
        .expect("save");
    ledger.save(key, sample_tx(1), vec![]).expect("save");

    let mut replacement = sample_tx(1);
    replacement.value = U256::from(7);
    let document = LedgerExport::new(
        key,
        vec![
            rusty_safe_ledger_core::QueuedTransaction {
                data: sample_tx(0),
                signatures: vec![dummy_signature(owner(2), 2)],
            },
            rusty_safe_ledger_core::QueuedTransaction::new(replacement.clone()),
            rusty_safe_ledger_core::QueuedTransaction::new(sample_tx(2)),
        ],
    );

    let summary = ledger
        .import(key, &document.to_json().expect("json"))
        .expect("import");
    assert_eq!(
        summary,
        ImportSummary {
            added: 1,
            replaced: 1,
            merged: 1,
            unchanged: 0,
        }
    );

    let all = ledger.get_all(key).expect("get_all");
    assert_eq!(all[0].signature_count(), 2);
    assert_eq!(all[1].data, replacement);
    assert_eq!(all.len(), 3);
}

#[test]
fn rejected_import_is_atomic() {
    let ledger = new_ledger();
    let key = ledger_key();
    ledger.save(key, sample_tx(0), vec![]).expect("save");
    let writes = ledger.storage().writes();

    // second entry is malformed: the first must not be applied either
    let document = json!([
        {"data": serde_json::to_value(sample_tx(1)).expect("tx json"), "signatures": []},
        {"data": {"to": "not-an-address", "value": "0", "nonce": 2}}
    ]);
    let err = ledger
        .import(key, &document.to_string())
        .expect_err("malformed entry");
    assert!(matches!(err, CoreError::Import(_)));
    assert!(err.to_string().contains("transaction 1"));

    assert_eq!(ledger.get_all(key).expect("get_all").len(), 1);
    assert_eq!(ledger.storage().writes(), writes);
}

#[test]
fn malformed_json_and_bad_signatures_are_rejected() {
    let ledger = new_ledger();
    let err = ledger.import(ledger_key(), "{").expect_err("truncated");
    assert!(matches!(err, CoreError::Import(_)));

    let bad_sig = json!({
        "data": serde_json::to_value(sample_tx(0)).expect("tx json"),
        "signatures": [{"signer": "0x1111111111111111111111111111111111111111", "data": "0x1234"}]
    });
    let err = ledger
        .import(ledger_key(), &bad_sig.to_string())
        .expect_err("short signature");
    assert!(matches!(err, CoreError::Import(_)));
}

#[test]
fn conflicting_nonces_inside_one_document_are_rejected() {
    let ledger = new_ledger();
    let mut other = sample_tx(0);
    other.value = U256::from(1);
    let document = json!([
        {"data": serde_json::to_value(sample_tx(0)).expect("tx json")},
        {"data": serde_json::to_value(other).expect("tx json")}
    ]);
    let err = ledger
        .import(ledger_key(), &document.to_string())
        .expect_err("conflict");
    assert!(err.to_string().contains("conflicting transactions for nonce 0"));
}

#[test]
fn export_for_another_safe_or_chain_is_rejected() {
    let source = new_ledger();
    let other_chain = LedgerKey::new(safe_address(), 5);
    source.save(other_chain, sample_tx(0), vec![]).expect("save");
    let exported = source.export_json(other_chain).expect("export");

    let target = new_ledger();
    let err = target
        .import(ledger_key(), &exported)
        .expect_err("chain mismatch");
    assert!(err.to_string().contains("chain 5"));
    assert!(target.get_all(ledger_key()).expect("get_all").is_empty());
}
