use crate::coin::{Coin, Outpoint};
use crate::crypto::Address;
use rocksdb::{ColumnFamilyDescriptor, Options, WriteBatch, DB};
use serde::{de::DeserializeOwned, Serialize};
use anyhow::{anyhow, Context, Result};

/// Per-outpoint index entries live in `utxo_index`; the value-ordered
/// entries live in `utxo` keyed so a forward iteration walks the owner's
/// coins in descending value order.
const CF_UTXO: &str = "utxo";
const CF_UTXO_INDEX: &str = "utxo_index";
const CF_WALLET: &str = "wallet";

const ADDR_LEN: usize = 32;
const UTXO_KEY_LEN: usize = ADDR_LEN + 8 + 36;

pub struct Store {
    pub db: DB,
    path: String,
}

impl Store {
    pub fn open(base_path: &str) -> Result<Self> {
        let cf_names = [CF_UTXO, CF_UTXO_INDEX, CF_WALLET];

        let mut cf_opts = Options::default();
        cf_opts.set_write_buffer_size(16 * 1024 * 1024);
        cf_opts.set_max_write_buffer_number(2);

        let cf_descriptors: Vec<ColumnFamilyDescriptor> = cf_names
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, cf_opts.clone()))
            .collect();

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);
        db_opts.set_max_open_files(256);

        std::fs::create_dir_all(base_path).ok();

        let db = DB::open_cf_descriptors(&db_opts, base_path, cf_descriptors)
            .with_context(|| format!("Failed to open database at '{base_path}'"))?;

        let store = Store { db, path: base_path.to_string() };
        store
            .health_check()
            .with_context(|| "Database health check failed during initialization")?;
        Ok(store)
    }

    /// Round-trips a sentinel key so a broken volume fails at startup
    /// instead of mid-funding.
    pub fn health_check(&self) -> Result<()> {
        let test_key = b"health_check";
        self.put(CF_WALLET, test_key, &b"ok".to_vec())
            .with_context(|| "Database write test failed")?;
        let value: Option<Vec<u8>> = self
            .get(CF_WALLET, test_key)
            .with_context(|| "Database read test failed")?;
        if value.as_deref() != Some(b"ok".as_slice()) {
            anyhow::bail!("Database read/write consistency check failed");
        }
        let cf = self.cf(CF_WALLET)?;
        self.db
            .delete_cf(cf, test_key)
            .with_context(|| "Database delete test failed")?;
        Ok(())
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    fn cf(&self, name: &str) -> Result<&rocksdb::ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| anyhow!("Column family '{}' not found", name))
    }

    pub fn put<T: Serialize>(&self, cf: &str, key: &[u8], value: &T) -> Result<()> {
        let encoded = bincode::serialize(value)
            .with_context(|| format!("Failed to serialize value for key '{key:?}' in CF '{cf}'"))?;
        let handle = self.cf(cf)?;
        self.db
            .put_cf(handle, key, &encoded)
            .with_context(|| format!("Failed to PUT to database for key '{key:?}' in CF '{cf}'"))
    }

    pub fn get<T: DeserializeOwned>(&self, cf: &str, key: &[u8]) -> Result<Option<T>> {
        let handle = self.cf(cf)?;
        match self.db.get_cf(handle, key)? {
            Some(value) => bincode::deserialize(&value)
                .map(Some)
                .map_err(|_| anyhow!("Failed to deserialize value for key '{:?}' in CF '{}'", key, cf)),
            None => Ok(None),
        }
    }

    // ------------------------- UTXO inventory -------------------------
    //
    // utxo       : addr ++ (!value as BE u64) ++ outpoint  ->  value
    // utxo_index : addr ++ outpoint                        ->  value
    //
    // The inverted big-endian value slot makes a forward iterator yield
    // coins in descending value order; the index makes removal by outpoint
    // possible without knowing the value.

    fn utxo_key(addr: &Address, value: u64, outpoint: &Outpoint) -> Vec<u8> {
        let mut key = Vec::with_capacity(UTXO_KEY_LEN);
        key.extend_from_slice(addr);
        key.extend_from_slice(&(!value).to_be_bytes());
        key.extend_from_slice(&outpoint.key_bytes());
        key
    }

    fn index_key(addr: &Address, outpoint: &Outpoint) -> Vec<u8> {
        let mut key = Vec::with_capacity(ADDR_LEN + 36);
        key.extend_from_slice(addr);
        key.extend_from_slice(&outpoint.key_bytes());
        key
    }

    fn decode_utxo_key(key: &[u8]) -> Option<Coin> {
        if key.len() != UTXO_KEY_LEN {
            return None;
        }
        let mut value_be = [0u8; 8];
        value_be.copy_from_slice(&key[ADDR_LEN..ADDR_LEN + 8]);
        let value = !u64::from_be_bytes(value_be);
        let outpoint = Outpoint::from_key_bytes(&key[ADDR_LEN + 8..])?;
        Some(Coin { outpoint, value })
    }

    /// Inserts (or overwrites) one coin. Idempotent: re-inserting the same
    /// outpoint replaces any previous entry, including one with a stale
    /// value.
    pub fn utxo_insert(&self, addr: &Address, coin: &Coin) -> Result<()> {
        let utxo_cf = self.cf(CF_UTXO)?;
        let index_cf = self.cf(CF_UTXO_INDEX)?;
        let index_key = Self::index_key(addr, &coin.outpoint);

        let mut batch = WriteBatch::default();
        if let Some(old) = self.db.get_cf(index_cf, &index_key)? {
            let old_value: u64 = bincode::deserialize(&old)
                .map_err(|_| anyhow!("Corrupt index entry for {}", coin.outpoint))?;
            batch.delete_cf(utxo_cf, Self::utxo_key(addr, old_value, &coin.outpoint));
        }
        let encoded = bincode::serialize(&coin.value)
            .with_context(|| format!("Failed to serialize value for {}", coin.outpoint))?;
        batch.put_cf(utxo_cf, Self::utxo_key(addr, coin.value, &coin.outpoint), &encoded);
        batch.put_cf(index_cf, &index_key, &encoded);
        self.db
            .write(batch)
            .with_context(|| format!("Failed to insert coin {}", coin.outpoint))
    }

    /// Removes one coin. Removing an absent outpoint is a no-op.
    pub fn utxo_remove(&self, addr: &Address, outpoint: &Outpoint) -> Result<()> {
        let utxo_cf = self.cf(CF_UTXO)?;
        let index_cf = self.cf(CF_UTXO_INDEX)?;
        let index_key = Self::index_key(addr, outpoint);

        let Some(old) = self.db.get_cf(index_cf, &index_key)? else {
            return Ok(());
        };
        let value: u64 = bincode::deserialize(&old)
            .map_err(|_| anyhow!("Corrupt index entry for {}", outpoint))?;
        let mut batch = WriteBatch::default();
        batch.delete_cf(utxo_cf, Self::utxo_key(addr, value, outpoint));
        batch.delete_cf(index_cf, &index_key);
        self.db
            .write(batch)
            .with_context(|| format!("Failed to remove coin {}", outpoint))
    }

    /// The owner's `limit` highest-valued coins, descending. Ties between
    /// equal values come back in outpoint order.
    pub fn utxo_top_by_value(&self, addr: &Address, limit: usize) -> Result<Vec<Coin>> {
        let utxo_cf = self.cf(CF_UTXO)?;
        let iter = self.db.iterator_cf(
            utxo_cf,
            rocksdb::IteratorMode::From(addr, rocksdb::Direction::Forward),
        );
        let mut coins = Vec::new();
        for item in iter {
            let (key, _value) = item?;
            if !key.starts_with(addr) || coins.len() >= limit {
                break;
            }
            if let Some(coin) = Self::decode_utxo_key(&key) {
                coins.push(coin);
            }
        }
        Ok(coins)
    }

    /// Drops the owner's entire inventory. Returns how many coins were
    /// removed.
    pub fn utxo_clear(&self, addr: &Address) -> Result<usize> {
        let utxo_cf = self.cf(CF_UTXO)?;
        let index_cf = self.cf(CF_UTXO_INDEX)?;
        let mut batch = WriteBatch::default();
        let mut removed = 0usize;
        for (cf, counted) in [(utxo_cf, true), (index_cf, false)] {
            let iter = self
                .db
                .iterator_cf(cf, rocksdb::IteratorMode::From(addr, rocksdb::Direction::Forward));
            for item in iter {
                let (key, _value) = item?;
                if !key.starts_with(addr) {
                    break;
                }
                batch.delete_cf(cf, &key);
                if counted {
                    removed += 1;
                }
            }
        }
        self.db
            .write(batch)
            .with_context(|| "Failed to clear UTXO inventory")?;
        Ok(removed)
    }

    /// Force flush all memtables to disk.
    pub fn flush(&self) -> Result<()> {
        self.db.flush().with_context(|| "Failed to flush database")
    }
}
