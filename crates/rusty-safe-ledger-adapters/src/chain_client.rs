use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use alloy::primitives::{keccak256, Address, Bytes, B256, U256};
use alloy::sol_types::SolCall;
use serde_json::{json, Value};

use rusty_safe_ledger_core::{ChainClientPort, LedgerKey, PortError, SafeTransactionData};

use crate::LedgerAdapterConfig;

alloy::sol! {
    interface ISafe {
        function nonce() external view returns (uint256);
        function getThreshold() external view returns (uint256);
        function execTransaction(
            address to,
            uint256 value,
            bytes calldata data,
            uint8 operation,
            uint256 safeTxGas,
            uint256 baseGas,
            uint256 gasPrice,
            address gasToken,
            address payable refundReceiver,
            bytes memory signatures
        ) external payable returns (bool success);
    }
}

/// A broadcast accepted by the deterministic runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BroadcastRecord {
    pub key: LedgerKey,
    pub nonce: u64,
    pub calldata: Bytes,
    pub tx_hash: B256,
}

#[derive(Debug, Clone)]
pub struct ChainClientAdapter {
    mode: ChainMode,
    state: Arc<Mutex<DeterministicChain>>,
}

#[derive(Debug, Clone)]
enum ChainMode {
    Disabled(String),
    Deterministic,
    Rpc(RpcRuntime),
}

#[derive(Debug, Clone)]
struct RpcRuntime {
    url: String,
    client: reqwest::blocking::Client,
    executor: Option<Address>,
}

#[derive(Debug)]
struct DeterministicChain {
    nonces: HashMap<LedgerKey, u64>,
    thresholds: HashMap<LedgerKey, u64>,
    default_threshold: u64,
    broadcasts: Vec<BroadcastRecord>,
}

impl Default for DeterministicChain {
    fn default() -> Self {
        Self {
            nonces: HashMap::new(),
            thresholds: HashMap::new(),
            default_threshold: 1,
            broadcasts: Vec::new(),
        }
    }
}

impl Default for ChainClientAdapter {
    fn default() -> Self {
        Self::with_config(LedgerAdapterConfig::from_env())
    }
}

impl ChainClientAdapter {
    pub fn with_config(config: LedgerAdapterConfig) -> Self {
        let mode = if let Some(ref url) = config.rpc_url {
            let timeout = Duration::from_millis(config.rpc_timeout_ms);
            match reqwest::blocking::Client::builder().timeout(timeout).build() {
                Ok(client) => ChainMode::Rpc(RpcRuntime {
                    url: url.clone(),
                    client,
                    executor: config.executor_address,
                }),
                Err(e) if config.strict_runtime_required() => ChainMode::Disabled(format!(
                    "failed to initialize JSON-RPC client in production profile: {e}"
                )),
                Err(e) => {
                    tracing::warn!(error = %e, "JSON-RPC client unavailable, using deterministic chain");
                    ChainMode::Deterministic
                }
            }
        } else if config.strict_runtime_required() {
            ChainMode::Disabled("RPC URL not configured in production runtime profile".to_owned())
        } else {
            ChainMode::Deterministic
        };

        Self {
            mode,
            state: Arc::new(Mutex::new(DeterministicChain::default())),
        }
    }

    /// In-process chain: nonces start at zero, thresholds at one.
    pub fn deterministic() -> Self {
        Self {
            mode: ChainMode::Deterministic,
            state: Arc::new(Mutex::new(DeterministicChain::default())),
        }
    }

    pub fn is_rpc(&self) -> bool {
        matches!(self.mode, ChainMode::Rpc(_))
    }

    pub fn set_nonce(&self, key: LedgerKey, nonce: u64) -> Result<(), PortError> {
        self.lock()?.nonces.insert(key, nonce);
        Ok(())
    }

    pub fn set_threshold(&self, key: LedgerKey, threshold: u64) -> Result<(), PortError> {
        self.lock()?.thresholds.insert(key, threshold);
        Ok(())
    }

    pub fn broadcasts(&self) -> Result<Vec<BroadcastRecord>, PortError> {
        Ok(self.lock()?.broadcasts.clone())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, DeterministicChain>, PortError> {
        self.state
            .lock()
            .map_err(|e| PortError::Transport(format!("chain client lock poisoned: {e}")))
    }

    fn rpc(&self) -> Result<Option<&RpcRuntime>, PortError> {
        match &self.mode {
            ChainMode::Rpc(rpc) => Ok(Some(rpc)),
            ChainMode::Deterministic => Ok(None),
            ChainMode::Disabled(reason) => Err(PortError::Policy(reason.clone())),
        }
    }

    fn rpc_call(rpc: &RpcRuntime, method: &str, params: Value) -> Result<Value, PortError> {
        let payload = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });
        tracing::debug!(method, url = %rpc.url, "json-rpc request");
        let response = rpc
            .client
            .post(&rpc.url)
            .json(&payload)
            .send()
            .map_err(|e| PortError::Transport(format!("rpc request {method} failed: {e}")))?;
        let status = response.status();
        let body: Value = response
            .json()
            .map_err(|e| PortError::Transport(format!("rpc json decode failed: {e}")))?;
        if !status.is_success() {
            return Err(PortError::Transport(format!(
                "rpc status {status}: {body}"
            )));
        }
        if let Some(err) = body.get("error") {
            return Err(PortError::Transport(format!("rpc {method} returned error: {err}")));
        }
        body.get("result")
            .cloned()
            .ok_or_else(|| PortError::Transport(format!("rpc {method} missing result")))
    }

    /// The endpoint serves one chain; refuse to read or write a Safe on another.
    fn ensure_chain(rpc: &RpcRuntime, key: &LedgerKey) -> Result<(), PortError> {
        let result = Self::rpc_call(rpc, "eth_chainId", json!([]))?;
        let chain_id = json_quantity_to_u64(&result)?;
        if chain_id != key.chain_id {
            return Err(PortError::Conflict(format!(
                "rpc endpoint serves chain {chain_id}, ledger key is for chain {}",
                key.chain_id
            )));
        }
        Ok(())
    }

    fn eth_call_u256(rpc: &RpcRuntime, key: &LedgerKey, calldata: Vec<u8>) -> Result<U256, PortError> {
        Self::ensure_chain(rpc, key)?;
        let result = Self::rpc_call(
            rpc,
            "eth_call",
            json!([
                {"to": key.safe_address, "data": Bytes::from(calldata)},
                "latest"
            ]),
        )?;
        let raw = result
            .as_str()
            .ok_or_else(|| PortError::Validation("eth_call must return hex data".to_owned()))?;
        let bytes = alloy::hex::decode(raw)
            .map_err(|e| PortError::Validation(format!("invalid eth_call result: {e}")))?;
        if bytes.len() < 32 {
            return Err(PortError::Validation(format!(
                "eth_call returned {} bytes; is {} a Safe?",
                bytes.len(),
                key.safe_address
            )));
        }
        Ok(U256::from_be_slice(&bytes[..32]))
    }

    fn executor(rpc: &RpcRuntime) -> Result<Address, PortError> {
        if let Some(executor) = rpc.executor {
            return Ok(executor);
        }
        let accounts = Self::rpc_call(rpc, "eth_accounts", json!([]))?;
        accounts
            .as_array()
            .and_then(|a| a.first())
            .and_then(Value::as_str)
            .ok_or_else(|| PortError::Policy("no executor configured and node has no accounts".to_owned()))?
            .parse()
            .map_err(|e| PortError::Validation(format!("invalid account from node: {e}")))
    }
}

pub fn exec_transaction_calldata(tx: &SafeTransactionData, signatures: &Bytes) -> Bytes {
    ISafe::execTransactionCall {
        to: tx.to,
        value: tx.value,
        data: tx.data.clone(),
        operation: tx.operation.as_u8(),
        safeTxGas: tx.safe_tx_gas,
        baseGas: tx.base_gas,
        gasPrice: tx.gas_price,
        gasToken: tx.gas_token,
        refundReceiver: tx.refund_receiver,
        signatures: signatures.clone(),
    }
    .abi_encode()
    .into()
}

impl ChainClientPort for ChainClientAdapter {
    fn nonce(&self, key: &LedgerKey) -> Result<u64, PortError> {
        if let Some(rpc) = self.rpc()? {
            let value = Self::eth_call_u256(rpc, key, ISafe::nonceCall {}.abi_encode())?;
            return u64::try_from(value)
                .map_err(|_| PortError::Validation(format!("nonce {value} exceeds u64")));
        }
        Ok(self.lock()?.nonces.get(key).copied().unwrap_or_default())
    }

    fn threshold(&self, key: &LedgerKey) -> Result<u64, PortError> {
        if let Some(rpc) = self.rpc()? {
            let value = Self::eth_call_u256(rpc, key, ISafe::getThresholdCall {}.abi_encode())?;
            return u64::try_from(value)
                .map_err(|_| PortError::Validation(format!("threshold {value} exceeds u64")));
        }
        let g = self.lock()?;
        Ok(g.thresholds.get(key).copied().unwrap_or(g.default_threshold))
    }

    fn broadcast(
        &self,
        key: &LedgerKey,
        tx: &SafeTransactionData,
        signatures: &Bytes,
    ) -> Result<B256, PortError> {
        let calldata = exec_transaction_calldata(tx, signatures);

        if let Some(rpc) = self.rpc()? {
            Self::ensure_chain(rpc, key)?;
            let from = Self::executor(rpc)?;
            let result = Self::rpc_call(
                rpc,
                "eth_sendTransaction",
                json!([{"from": from, "to": key.safe_address, "data": calldata}]),
            )?;
            let hash = result.as_str().ok_or_else(|| {
                PortError::Transport("eth_sendTransaction must return hash".to_owned())
            })?;
            let parsed: B256 = hash
                .parse()
                .map_err(|e| PortError::Validation(format!("invalid tx hash: {e}")))?;
            tracing::info!(%key, nonce = tx.nonce, tx_hash = %parsed, "execTransaction submitted");
            return Ok(parsed);
        }

        let mut g = self.lock()?;
        let expected = g.nonces.get(key).copied().unwrap_or_default();
        if tx.nonce != expected {
            return Err(PortError::Conflict(format!(
                "transaction nonce {} does not match Safe nonce {expected}",
                tx.nonce
            )));
        }
        let mut seed = Vec::with_capacity(calldata.len() + 28);
        seed.extend_from_slice(key.safe_address.as_slice());
        seed.extend_from_slice(&key.chain_id.to_be_bytes());
        seed.extend_from_slice(&calldata);
        let tx_hash = keccak256(seed);
        g.nonces.insert(*key, expected + 1);
        g.broadcasts.push(BroadcastRecord {
            key: *key,
            nonce: tx.nonce,
            calldata,
            tx_hash,
        });
        Ok(tx_hash)
    }
}

fn json_quantity_to_u64(value: &Value) -> Result<u64, PortError> {
    if let Some(n) = value.as_u64() {
        return Ok(n);
    }
    let raw = value
        .as_str()
        .ok_or_else(|| PortError::Validation("quantity must be string or number".to_owned()))?;
    match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => raw.parse(),
    }
    .map_err(|e| PortError::Validation(format!("invalid quantity {raw}: {e}")))
}
