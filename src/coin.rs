use serde::{Serialize, Deserialize};
use std::fmt;
use std::str::FromStr;

pub type TxId = [u8; 32];

/// Raised when an outpoint string is not `<64-hex-txid>.<vout>`.
#[derive(Debug, thiserror::Error)]
#[error("malformed outpoint '{0}'")]
pub struct OutpointParseError(pub String);

/// Uniquely identifies a coin: the transaction that created it plus the
/// output index within that transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Outpoint {
    pub txid: TxId,
    pub vout: u32,
}

impl Outpoint {
    pub fn new(txid: TxId, vout: u32) -> Self {
        Outpoint { txid, vout }
    }

    /// Fixed-width key encoding: txid followed by the big-endian vout,
    /// so lexicographic key order matches (txid, vout) order.
    pub fn key_bytes(&self) -> [u8; 36] {
        let mut out = [0u8; 36];
        out[..32].copy_from_slice(&self.txid);
        out[32..].copy_from_slice(&self.vout.to_be_bytes());
        out
    }

    pub fn from_key_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != 36 {
            return None;
        }
        let mut txid = [0u8; 32];
        txid.copy_from_slice(&bytes[..32]);
        let mut vout_be = [0u8; 4];
        vout_be.copy_from_slice(&bytes[32..]);
        Some(Outpoint { txid, vout: u32::from_be_bytes(vout_be) })
    }
}

impl fmt::Display for Outpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", hex::encode(self.txid), self.vout)
    }
}

impl FromStr for Outpoint {
    type Err = OutpointParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (txid_hex, vout_str) = s
            .rsplit_once('.')
            .ok_or_else(|| OutpointParseError(s.to_string()))?;
        let raw = hex::decode(txid_hex).map_err(|_| OutpointParseError(s.to_string()))?;
        if raw.len() != 32 {
            return Err(OutpointParseError(s.to_string()));
        }
        let mut txid = [0u8; 32];
        txid.copy_from_slice(&raw);
        let vout = vout_str.parse().map_err(|_| OutpointParseError(s.to_string()))?;
        Ok(Outpoint { txid, vout })
    }
}

/// A spendable output owned by this purse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coin {
    pub outpoint: Outpoint,
    pub value: u64,
}
