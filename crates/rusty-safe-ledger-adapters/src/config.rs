use std::path::PathBuf;
use std::str::FromStr;

use alloy::primitives::Address;
use thiserror::Error;

use rusty_safe_ledger_core::{ImportLimits, LedgerOptions, SafeVersion};

const ENV_PREFIX: &str = "RUSTY_SAFE_LEDGER_";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RuntimeProfile {
    #[default]
    Development,
    Production,
}

impl FromStr for RuntimeProfile {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(RuntimeProfile::Development),
            "production" | "prod" => Ok(RuntimeProfile::Production),
            other => Err(ConfigError::Invalid {
                var: "PROFILE",
                reason: format!("unknown runtime profile {other}"),
            }),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid RUSTY_SAFE_LEDGER_{var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

#[derive(Debug, Clone)]
pub struct LedgerAdapterConfig {
    pub runtime_profile: RuntimeProfile,
    pub storage_dir: PathBuf,
    pub storage_key_prefix: String,
    pub rpc_url: Option<String>,
    pub rpc_timeout_ms: u64,
    /// Account that submits `execTransaction`. Falls back to the node's first
    /// unlocked account.
    pub executor_address: Option<Address>,
    pub import_max_payload_bytes: usize,
    pub import_max_transactions: usize,
    pub share_link_max_bytes: usize,
    pub default_safe_version: String,
}

impl Default for LedgerAdapterConfig {
    fn default() -> Self {
        let limits = ImportLimits::default();
        Self {
            runtime_profile: RuntimeProfile::Development,
            storage_dir: PathBuf::from(".rusty-safe-ledger"),
            storage_key_prefix: "safe-txs".to_owned(),
            rpc_url: None,
            rpc_timeout_ms: 15_000,
            executor_address: None,
            import_max_payload_bytes: limits.max_payload_bytes,
            import_max_transactions: limits.max_transactions,
            share_link_max_bytes: 256 * 1024,
            default_safe_version: SafeVersion::latest().to_string(),
        }
    }
}

impl LedgerAdapterConfig {
    /// Defaults overridden by `RUSTY_SAFE_LEDGER_*` variables. Unparseable
    /// values are logged and ignored.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(profile) = env_parsed::<RuntimeProfile>("PROFILE") {
            config.runtime_profile = profile;
        }
        if let Some(dir) = env_var("STORAGE_DIR") {
            config.storage_dir = PathBuf::from(dir);
        }
        if let Some(prefix) = env_var("STORAGE_PREFIX") {
            config.storage_key_prefix = prefix;
        }
        config.rpc_url = env_var("RPC_URL").or(config.rpc_url);
        if let Some(ms) = env_parsed("RPC_TIMEOUT_MS") {
            config.rpc_timeout_ms = ms;
        }
        config.executor_address = env_parsed("EXECUTOR").or(config.executor_address);
        if let Some(bytes) = env_parsed("IMPORT_MAX_BYTES") {
            config.import_max_payload_bytes = bytes;
        }
        if let Some(count) = env_parsed("IMPORT_MAX_TXS") {
            config.import_max_transactions = count;
        }
        if let Some(bytes) = env_parsed("SHARE_LINK_MAX_BYTES") {
            config.share_link_max_bytes = bytes;
        }
        if let Some(version) = env_var("SAFE_VERSION") {
            config.default_safe_version = version;
        }

        config
    }

    /// Production refuses in-process fallbacks for anything that talks to a chain.
    pub fn strict_runtime_required(&self) -> bool {
        self.runtime_profile == RuntimeProfile::Production
    }

    pub fn import_limits(&self) -> ImportLimits {
        ImportLimits {
            max_payload_bytes: self.import_max_payload_bytes,
            max_transactions: self.import_max_transactions,
        }
    }

    pub fn safe_version(&self) -> Result<SafeVersion, ConfigError> {
        SafeVersion::parse(&self.default_safe_version).map_err(|e| ConfigError::Invalid {
            var: "SAFE_VERSION",
            reason: e.to_string(),
        })
    }

    pub fn ledger_options(&self) -> Result<LedgerOptions, ConfigError> {
        Ok(LedgerOptions {
            storage_prefix: self.storage_key_prefix.clone(),
            limits: self.import_limits(),
            safe_version: self.safe_version()?,
        })
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(format!("{ENV_PREFIX}{name}"))
        .ok()
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

fn env_parsed<T>(name: &str) -> Option<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = env_var(name)?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(var = %format!("{ENV_PREFIX}{name}"), value = %raw, error = %e, "ignoring invalid setting");
            None
        }
    }
}
