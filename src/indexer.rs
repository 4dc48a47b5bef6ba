use crate::coin::Outpoint;
use crate::error::IndexerError;
use serde::Deserialize;

/// Client for the authoritative chain indexer: the source of truth the
/// purse rebuilds its inventory from during a resync.
pub struct IndexerClient {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
pub struct UnspentResponse {
    #[serde(default)]
    pub error: String,
    #[serde(default)]
    pub result: Vec<UnspentEntry>,
}

#[derive(Debug, Deserialize)]
pub struct UnspentEntry {
    pub tx_pos: u32,
    pub tx_hash: String,
    pub value: u64,
    #[serde(rename = "isSpentInMempoolTx", default)]
    pub is_spent: bool,
    #[serde(default)]
    pub status: String,
}

impl UnspentEntry {
    pub fn outpoint(&self) -> Result<Outpoint, crate::coin::OutpointParseError> {
        format!("{}.{}", self.tx_hash, self.tx_pos).parse()
    }
}

impl IndexerClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        IndexerClient { http: reqwest::Client::new(), base_url: base_url.into() }
    }

    /// Fetches every unspent output of `address`. Non-2xx responses,
    /// decode failures, and a non-empty application error field are all
    /// reported as errors; callers must not touch local state on failure.
    pub async fn unspent(&self, address: &str) -> Result<Vec<UnspentEntry>, IndexerError> {
        let url = format!(
            "{}/address/{}/unspent/all",
            self.base_url.trim_end_matches('/'),
            address
        );
        let resp = self.http.get(&url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(IndexerError::Status(status.as_u16()));
        }
        let body: UnspentResponse = resp.json().await?;
        if !body.error.is_empty() {
            return Err(IndexerError::Api(body.error));
        }
        Ok(body.result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_decodes_indexer_field_names() {
        let raw = r#"{
            "tx_pos": 2,
            "tx_hash": "0101010101010101010101010101010101010101010101010101010101010101",
            "value": 1234,
            "isSpentInMempoolTx": true,
            "status": "confirmed"
        }"#;
        let entry: UnspentEntry = serde_json::from_str(raw).expect("decode entry");
        assert!(entry.is_spent);
        assert_eq!(entry.value, 1234);
        let op = entry.outpoint().expect("outpoint");
        assert_eq!(op.vout, 2);
        assert_eq!(op.txid, [1u8; 32]);
    }

    #[test]
    fn malformed_tx_hash_is_reported() {
        let entry = UnspentEntry {
            tx_pos: 0,
            tx_hash: "not-hex".into(),
            value: 1,
            is_spent: false,
            status: String::new(),
        };
        assert!(entry.outpoint().is_err());
    }
}
