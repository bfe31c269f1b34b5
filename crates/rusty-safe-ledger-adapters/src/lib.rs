pub mod broadcast;
pub mod chain_client;
pub mod config;
pub mod signer;
pub mod storage;

pub use broadcast::{BroadcastReceipt, Broadcaster, Readiness};
pub use chain_client::{exec_transaction_calldata, BroadcastRecord, ChainClientAdapter};
pub use config::{ConfigError, LedgerAdapterConfig, RuntimeProfile};
pub use signer::{co_sign, LocalSignerAdapter};
pub use storage::{FileStorageAdapter, MemoryStorageAdapter};
