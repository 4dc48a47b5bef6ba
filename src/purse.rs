use crate::coin::{Coin, Outpoint};
use crate::config::Config;
use crate::crypto::{self, Address, OwnerKey};
use crate::error::PurseError;
use crate::indexer::IndexerClient;
use crate::lease::LeaseTable;
use crate::metrics;
use crate::storage::Store;
use crate::tx::{KbFeeBuilder, Transaction, TxBuilder, TxInput};
use std::sync::Arc;
use std::time::Duration;

/// Selection never looks past the owner's top 25 coins in a single call.
/// Coins ranked below the window are unreachable until the window drains.
pub const SELECT_WINDOW: usize = 25;
/// How long a selected coin stays reserved before other callers may take it.
pub const LEASE_SECS: u64 = 60;
/// Safety margin added to the selection target during funding, covering
/// fee growth from the inputs the selection itself appends.
pub const FUND_MARGIN: u64 = 10;
/// The accumulation loop gives up after this many selection rounds rather
/// than spinning on a window other callers keep draining.
const MAX_FUND_ATTEMPTS: u32 = 8;

/// One account's spendable fund inventory.
///
/// Shared process-wide: any number of tasks may fund, observe, and resync
/// concurrently. Exactly-once spending rests on the atomicity of the
/// individual store operations and the lease table, not on a global lock.
pub struct Purse {
    db: Arc<Store>,
    address: Address,
    leases: LeaseTable,
    builder: Box<dyn TxBuilder>,
    indexer: IndexerClient,
    change_splits: u8,
}

impl Purse {
    pub fn new(
        db: Arc<Store>,
        key: &OwnerKey,
        builder: Box<dyn TxBuilder>,
        indexer: IndexerClient,
        change_splits: u8,
    ) -> Self {
        Purse {
            db,
            address: key.address(),
            leases: LeaseTable::new(),
            builder,
            indexer,
            change_splits,
        }
    }

    /// Builds a purse from configuration: loads (or creates) the owner key
    /// and wires up the default fee/signing builder. Fails fast on a
    /// malformed secret.
    pub fn open(db: Arc<Store>, cfg: &Config) -> anyhow::Result<Self> {
        let key = match &cfg.purse.secret_hex {
            Some(hex) => OwnerKey::from_hex(hex)?,
            None => crypto::load_or_create(&db)?,
        };
        let builder = Box::new(KbFeeBuilder::new(cfg.purse.fee_per_kb, key.clone()));
        let indexer = IndexerClient::new(cfg.indexer.base_url.clone());
        Ok(Purse::new(db, &key, builder, indexer, cfg.purse.change_splits))
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn address_hex(&self) -> String {
        hex::encode(self.address)
    }

    // ------------------------- ledger observation -------------------------

    /// Applies one confirmed (or accepted) transaction to the inventory:
    /// every input's outpoint is now spent, every output paying this
    /// address is a new coin keyed by (txid, vout). Removal of outpoints
    /// we never owned is a no-op.
    pub fn observe_tx(&self, tx: &Transaction) -> Result<(), PurseError> {
        for input in &tx.inputs {
            self.db.utxo_remove(&self.address, &input.outpoint)?;
        }
        let txid = tx.txid();
        for (vout, output) in tx.outputs.iter().enumerate() {
            if output.lock == self.address {
                let coin = Coin { outpoint: Outpoint::new(txid, vout as u32), value: output.value };
                self.db.utxo_insert(&self.address, &coin)?;
            }
        }
        Ok(())
    }

    // --------------------------- coin selection ---------------------------

    /// Reserves coins worth at least `target` from the top-value window.
    ///
    /// Every returned coin carries a fresh 60-second lease: no concurrent
    /// call can also return it while the lease lives. Contended candidates
    /// are skipped, and coins below the window are never considered — if
    /// the window cannot cover the target the call fails with
    /// `InsufficientFunds`, leaving the leases it did acquire to expire on
    /// their own.
    pub fn lock_coins(&self, target: u64) -> Result<Vec<Coin>, PurseError> {
        metrics::SELECT_CALLS.inc();
        if target == 0 {
            return Ok(Vec::new());
        }
        let window = self.db.utxo_top_by_value(&self.address, SELECT_WINDOW)?;
        let mut picked = Vec::new();
        let mut collected = 0u64;
        for coin in window {
            if collected >= target {
                break;
            }
            if self.leases.try_acquire(coin.outpoint, Duration::from_secs(LEASE_SECS)) {
                collected += coin.value;
                picked.push(coin);
            } else {
                metrics::LEASE_CONTENTION.inc();
            }
        }
        if collected < target {
            return Err(PurseError::InsufficientFunds { needed: target, reserved: collected });
        }
        Ok(picked)
    }

    // ------------------------------ funding ------------------------------

    /// Drives `tx` to a fully funded, signed draft ready for broadcast.
    ///
    /// Selection failures are terminal: the caller gets the error and any
    /// reservations taken along the way simply expire. On a failed call the
    /// draft may reference reserved coins; callers must discard it rather
    /// than reuse it.
    pub fn fund_and_sign(
        &self,
        tx: &mut Transaction,
        require_fully_funded: bool,
    ) -> Result<(), PurseError> {
        let mut total_in = 0u64;
        for input in &tx.inputs {
            total_in += input
                .source_value
                .ok_or(PurseError::MissingSourceOutput(input.outpoint))?;
        }
        let total_out = tx.output_total();
        if require_fully_funded && total_in < total_out {
            return Err(PurseError::InsufficientInputs { inputs: total_in, outputs: total_out });
        }

        let fee = self.builder.compute_fee(tx)?;
        let mut attempts = 0u32;
        while total_in < total_out + fee {
            attempts += 1;
            if attempts > MAX_FUND_ATTEMPTS {
                return Err(PurseError::InsufficientFunds {
                    needed: total_out + fee,
                    reserved: total_in,
                });
            }
            let coins = self.lock_coins(total_out + fee + FUND_MARGIN)?;
            for coin in coins {
                tx.add_input(TxInput::new(coin.outpoint, Some(coin.value)));
                total_in += coin.value;
            }
        }

        for _ in 0..self.change_splits {
            tx.add_change_output(self.address);
        }
        self.builder.distribute_change(tx)?;
        self.builder.sign(tx)?;
        metrics::FUNDED_TXS.inc();
        Ok(())
    }

    // ----------------------------- accounting -----------------------------

    /// Balance over the same top-25 window selection sees, not a full
    /// scan. Returns (total value, coin count).
    pub fn balance(&self) -> Result<(u64, usize), PurseError> {
        let window = self.db.utxo_top_by_value(&self.address, SELECT_WINDOW)?;
        let total = window.iter().map(|c| c.value).sum();
        Ok((total, window.len()))
    }

    // ---------------------------- reconciliation ----------------------------

    /// Full repair from the authoritative indexer: on a successful fetch
    /// the local inventory is dropped and rebuilt from the remote
    /// snapshot, excluding entries already spent in the mempool. Any fetch
    /// or decode failure leaves local state untouched. Individual insert
    /// failures are logged and skipped.
    pub async fn resync(&self) -> Result<(u64, usize), PurseError> {
        let entries = self.indexer.unspent(&self.address_hex()).await?;
        self.db.utxo_clear(&self.address)?;

        let mut total = 0u64;
        let mut count = 0usize;
        for entry in entries {
            if entry.is_spent {
                continue;
            }
            let outpoint = match entry.outpoint() {
                Ok(op) => op,
                Err(e) => {
                    eprintln!("⚠️  skipping malformed unspent entry: {}", e);
                    continue;
                }
            };
            if let Err(e) = self.db.utxo_insert(&self.address, &Coin { outpoint, value: entry.value }) {
                eprintln!("⚠️  skipping unspent entry {}: {}", outpoint, e);
                continue;
            }
            total += entry.value;
            count += 1;
        }
        metrics::RESYNCS.inc();
        println!("🔄 Resync complete: {} coins, {} units", count, total);
        Ok((total, count))
    }
}
