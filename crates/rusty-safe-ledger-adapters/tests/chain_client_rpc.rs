mod common;

use std::io::Read;
use std::sync::{Arc, Mutex};
use std::thread;

use alloy::primitives::{keccak256, Address, Bytes, B256, U256};
use serde_json::{json, Value};
use tiny_http::{Response, Server, StatusCode};

use rusty_safe_ledger_adapters::{
    exec_transaction_calldata, ChainClientAdapter, LedgerAdapterConfig, RuntimeProfile,
};
use rusty_safe_ledger_core::{ChainClientPort, LedgerKey, PortError};

use common::{ledger_key, safe_address, transfer_tx};

const SENT_TX_HASH: &str = "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";

fn selector(signature: &str) -> String {
    format!("0x{}", alloy::hex::encode(&keccak256(signature)[..4]))
}

fn word(value: u64) -> String {
    format!("0x{}", alloy::hex::encode(U256::from(value).to_be_bytes::<32>()))
}

fn rpc_config(url: String) -> LedgerAdapterConfig {
    LedgerAdapterConfig {
        rpc_url: Some(url),
        rpc_timeout_ms: 5_000,
        executor_address: Some(Address::repeat_byte(0xee)),
        ..LedgerAdapterConfig::default()
    }
}

#[test]
fn reads_nonce_and_threshold_over_json_rpc() {
    let calls = Arc::new(Mutex::new(Vec::<Value>::new()));
    let (url, _join) = spawn_mock_node(Arc::clone(&calls), 1);
    let client = ChainClientAdapter::with_config(rpc_config(url));
    assert!(client.is_rpc());

    assert_eq!(client.nonce(&ledger_key()).expect("nonce"), 7);
    assert_eq!(client.threshold(&ledger_key()).expect("threshold"), 2);

    let calls = calls.lock().expect("calls lock");
    let eth_calls: Vec<&Value> = calls
        .iter()
        .filter(|c| c["method"] == "eth_call")
        .collect();
    assert_eq!(eth_calls.len(), 2);
    assert_eq!(
        eth_calls[0]["params"][0]["to"]
            .as_str()
            .expect("to")
            .to_ascii_lowercase(),
        format!("0x{}", alloy::hex::encode(safe_address()))
    );
    assert_eq!(eth_calls[0]["params"][1], "latest");
}

#[test]
fn broadcast_sends_exec_transaction() {
    let calls = Arc::new(Mutex::new(Vec::<Value>::new()));
    let (url, _join) = spawn_mock_node(Arc::clone(&calls), 1);
    let client = ChainClientAdapter::with_config(rpc_config(url));

    let signatures = Bytes::from(vec![0x11; 65]);
    let tx = transfer_tx(7);
    let hash = client
        .broadcast(&ledger_key(), &tx, &signatures)
        .expect("broadcast");
    assert_eq!(hash, SENT_TX_HASH.parse::<B256>().expect("hash"));

    let calls = calls.lock().expect("calls lock");
    let sent = calls
        .iter()
        .find(|c| c["method"] == "eth_sendTransaction")
        .expect("eth_sendTransaction issued");
    let params = &sent["params"][0];
    let data: Bytes = params["data"].as_str().expect("data").parse().expect("hex");
    assert_eq!(data, exec_transaction_calldata(&tx, &signatures));
    assert!(params["data"]
        .as_str()
        .expect("data")
        .starts_with(&selector(
            "execTransaction(address,uint256,bytes,uint8,uint256,uint256,uint256,address,address,bytes)"
        )));
    let from: Address = params["from"].as_str().expect("from").parse().expect("address");
    assert_eq!(from, Address::repeat_byte(0xee));
}

#[test]
fn wrong_chain_is_rejected_before_any_call() {
    let calls = Arc::new(Mutex::new(Vec::<Value>::new()));
    let (url, _join) = spawn_mock_node(Arc::clone(&calls), 1);
    let client = ChainClientAdapter::with_config(rpc_config(url));

    let err = client
        .nonce(&LedgerKey::new(safe_address(), 10))
        .expect_err("chain mismatch");
    assert!(matches!(err, PortError::Conflict(_)));
    let calls = calls.lock().expect("calls lock");
    assert!(calls.iter().all(|c| c["method"] != "eth_call"));
}

#[test]
fn rpc_error_surfaces_as_transport() {
    let calls = Arc::new(Mutex::new(Vec::<Value>::new()));
    let (url, _join) = spawn_mock_node(Arc::clone(&calls), 1);
    let client = ChainClientAdapter::with_config(LedgerAdapterConfig {
        executor_address: None,
        ..rpc_config(url)
    });

    // the mock node reports no unlocked accounts
    let err = client
        .broadcast(&ledger_key(), &transfer_tx(7), &Bytes::new())
        .expect_err("no executor");
    assert!(matches!(err, PortError::Policy(_)));

    let err = client
        .nonce(&LedgerKey::new(Address::repeat_byte(0x01), 1))
        .expect_err("reverted call");
    assert!(matches!(err, PortError::Transport(_)));
}

#[test]
fn production_profile_requires_rpc_runtime() {
    let client = ChainClientAdapter::with_config(LedgerAdapterConfig {
        runtime_profile: RuntimeProfile::Production,
        rpc_url: None,
        ..LedgerAdapterConfig::default()
    });
    let err = client
        .threshold(&ledger_key())
        .expect_err("runtime should be required");
    assert!(matches!(err, PortError::Policy(_)));
}

#[test]
fn deterministic_chain_tracks_nonce_and_broadcasts() {
    let client = ChainClientAdapter::deterministic();
    let key = ledger_key();
    client.set_threshold(key, 3).expect("threshold");
    assert_eq!(client.threshold(&key).expect("threshold"), 3);
    assert_eq!(client.nonce(&key).expect("nonce"), 0);

    let err = client
        .broadcast(&key, &transfer_tx(1), &Bytes::new())
        .expect_err("future nonce");
    assert!(matches!(err, PortError::Conflict(_)));

    client
        .broadcast(&key, &transfer_tx(0), &Bytes::new())
        .expect("broadcast");
    assert_eq!(client.nonce(&key).expect("nonce"), 1);
    assert_eq!(client.broadcasts().expect("records").len(), 1);
}

/// Minimal Ethereum node: answers for the BEEF Safe on `chain_id`, reverts
/// calls to any other address and has no unlocked accounts.
fn spawn_mock_node(
    calls: Arc<Mutex<Vec<Value>>>,
    chain_id: u64,
) -> (String, thread::JoinHandle<()>) {
    let server = Server::http("127.0.0.1:0").expect("start server");
    let addr = format!("http://{}", server.server_addr());
    let nonce_selector = selector("nonce()");
    let threshold_selector = selector("getThreshold()");
    let safe = format!("0x{}", alloy::hex::encode(safe_address()));

    let join = thread::spawn(move || {
        for _ in 0..32 {
            let mut req = match server.recv() {
                Ok(r) => r,
                Err(_) => break,
            };
            let mut body = String::new();
            let _ = req.as_reader().read_to_string(&mut body);
            let request: Value = serde_json::from_str(&body).unwrap_or(Value::Null);
            if let Ok(mut g) = calls.lock() {
                g.push(request.clone());
            }

            let params = &request["params"];
            let result = match request["method"].as_str().unwrap_or_default() {
                "eth_chainId" => Ok(json!(format!("{chain_id:#x}"))),
                "eth_accounts" => Ok(json!([])),
                "eth_sendTransaction" => Ok(json!(SENT_TX_HASH)),
                "eth_call" => {
                    let to = params[0]["to"].as_str().unwrap_or_default().to_ascii_lowercase();
                    let data = params[0]["data"].as_str().unwrap_or_default().to_owned();
                    if to != safe {
                        Err(json!({"code": -32000, "message": "execution reverted"}))
                    } else if data == nonce_selector {
                        Ok(json!(word(7)))
                    } else if data == threshold_selector {
                        Ok(json!(word(2)))
                    } else {
                        Err(json!({"code": -32000, "message": "unknown selector"}))
                    }
                }
                _ => Err(json!({"code": -32601, "message": "method not found"})),
            };

            let payload = match result {
                Ok(result) => json!({"jsonrpc": "2.0", "id": 1, "result": result}),
                Err(error) => json!({"jsonrpc": "2.0", "id": 1, "error": error}),
            };
            let response =
                Response::from_string(payload.to_string()).with_status_code(StatusCode(200));
            let _ = req.respond(response);
        }
    });

    (addr, join)
}
