use crate::coin::{Outpoint, TxId};
use crate::storage::Store;
use anyhow::{anyhow, Result};
use rand::rngs::OsRng;
use rand::RngCore;

pub type Address = [u8; 32];

const OWNER_KEY: &[u8] = b"owner_key";

pub fn blake3_hash(data: &[u8]) -> [u8; 32] {
    *blake3::hash(data).as_bytes()
}

/// The purse's signing credential. Real script-level signing lives in the
/// injected transaction builder; this key only derives the owner identity
/// and produces the default builder's unlocking proofs.
#[derive(Clone)]
pub struct OwnerKey {
    secret: [u8; 32],
}

impl OwnerKey {
    pub fn generate() -> Self {
        let mut secret = [0u8; 32];
        OsRng.fill_bytes(&mut secret);
        OwnerKey { secret }
    }

    pub fn from_hex(s: &str) -> Result<Self> {
        let raw = hex::decode(s.trim()).map_err(|e| anyhow!("invalid secret hex: {}", e))?;
        if raw.len() != 32 {
            return Err(anyhow!("secret must be 32 bytes, got {}", raw.len()));
        }
        let mut secret = [0u8; 32];
        secret.copy_from_slice(&raw);
        Ok(OwnerKey { secret })
    }

    pub fn public(&self) -> [u8; 32] {
        blake3_hash(&self.secret)
    }

    pub fn address(&self) -> Address {
        blake3_hash(&self.public())
    }

    /// Keyed commitment binding this key to one input of one transaction.
    /// Stands in for a script-level signature in the default builder.
    pub fn prove_spend(&self, txid: &TxId, outpoint: &Outpoint) -> [u8; 32] {
        let mut msg = Vec::with_capacity(32 + 36);
        msg.extend_from_slice(txid);
        msg.extend_from_slice(&outpoint.key_bytes());
        *blake3::keyed_hash(&self.secret, &msg).as_bytes()
    }
}

/// Loads the owner key from the store, or creates and persists a new one.
/// Keeps the purse identity stable across restarts.
pub fn load_or_create(db: &Store) -> Result<OwnerKey> {
    if let Some(secret) = db.get::<[u8; 32]>("wallet", OWNER_KEY)? {
        return Ok(OwnerKey { secret });
    }
    println!("✨ No owner key found, creating a new one...");
    let key = OwnerKey::generate();
    db.put("wallet", OWNER_KEY, &key.secret)?;
    Ok(key)
}
