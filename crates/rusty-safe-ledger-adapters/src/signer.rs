use alloy::primitives::{Address, Bytes, B256};
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::SignerSync;

use rusty_safe_ledger_core::{
    verify_signature, CoreError, LedgerKey, PortError, Signature, SignatureMerge, SigningPort,
    StoragePort, TransactionLedger,
};

/// Signs with private keys held in process. Intended for development and
/// scripted co-signing; production keys belong in a wallet.
#[derive(Debug, Clone, Default)]
pub struct LocalSignerAdapter {
    signers: Vec<PrivateKeySigner>,
}

impl LocalSignerAdapter {
    pub fn from_private_keys<I, K>(keys: I) -> Result<Self, PortError>
    where
        I: IntoIterator<Item = K>,
        K: AsRef<str>,
    {
        let mut adapter = Self::default();
        for key in keys {
            adapter.add_private_key(key.as_ref())?;
        }
        Ok(adapter)
    }

    pub fn add_private_key(&mut self, key: &str) -> Result<Address, PortError> {
        let signer: PrivateKeySigner = key
            .trim()
            .parse()
            .map_err(|e| PortError::Validation(format!("invalid private key: {e}")))?;
        let address = signer.address();
        if !self.signers.iter().any(|s| s.address() == address) {
            self.signers.push(signer);
        }
        Ok(address)
    }

    fn signer(&self, address: Address) -> Result<&PrivateKeySigner, PortError> {
        self.signers
            .iter()
            .find(|s| s.address() == address)
            .ok_or_else(|| PortError::NotFound(format!("no local key for {address}")))
    }

    /// `eth_sign` flavour: signs the EIP-191 hash of the digest and marks it
    /// with `v` + 4 the way the Safe contract expects.
    pub fn sign_digest_eth_sign(&self, signer: Address, digest: B256) -> Result<Bytes, PortError> {
        let sig = self
            .signer(signer)?
            .sign_message_sync(digest.as_slice())
            .map_err(|e| PortError::Transport(format!("local signing failed: {e}")))?;
        let mut raw = sig.as_bytes();
        raw[64] += 4;
        Ok(Bytes::from(raw.to_vec()))
    }
}

impl SigningPort for LocalSignerAdapter {
    fn accounts(&self) -> Result<Vec<Address>, PortError> {
        Ok(self.signers.iter().map(PrivateKeySigner::address).collect())
    }

    fn sign_digest(&self, signer: Address, digest: B256) -> Result<Bytes, PortError> {
        let sig = self
            .signer(signer)?
            .sign_hash_sync(&digest)
            .map_err(|e| PortError::Transport(format!("local signing failed: {e}")))?;
        Ok(Bytes::from(sig.as_bytes().to_vec()))
    }
}

/// Has `owner` sign the queued transaction at `nonce` and merges the result
/// into the ledger.
pub fn co_sign<S, P>(
    ledger: &TransactionLedger<S>,
    signing: &P,
    key: LedgerKey,
    nonce: u64,
    owner: Address,
) -> Result<SignatureMerge, CoreError>
where
    S: StoragePort,
    P: SigningPort,
{
    let tx = ledger
        .get(key, nonce)?
        .ok_or_else(|| CoreError::NotFound(format!("transaction {nonce} for {key}")))?;
    let digest = ledger.safe_tx_hash(key, &tx.data);
    let raw = signing
        .sign_digest(owner, digest)
        .map_err(CoreError::Signing)?;
    let signature = Signature::eoa(owner, raw).normalized();
    verify_signature(digest, &signature)?;
    tracing::info!(%key, nonce, %owner, safe_tx_hash = %digest, "transaction co-signed");
    ledger.add_signature(key, nonce, signature)
}
