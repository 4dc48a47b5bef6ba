// Library interface for the paypurse funding engine.
// This allows tests and external consumers to drive the purse directly.

pub mod config;
pub mod crypto;
pub mod storage;
pub mod coin;
pub mod tx;
pub mod lease;
pub mod purse;
pub mod indexer;
pub mod error;
pub mod metrics;

pub use coin::{Coin, Outpoint, TxId};
pub use crypto::{Address, OwnerKey, blake3_hash};
pub use storage::Store;
pub use tx::{KbFeeBuilder, Transaction, TxBuilder, TxInput, TxOutput};
pub use purse::Purse;
pub use indexer::IndexerClient;
pub use error::{IndexerError, PurseError};
