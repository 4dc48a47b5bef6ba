use crate::coin::Outpoint;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Entries above this count trigger a sweep of expired leases.
const PURGE_THRESHOLD: usize = 1024;

/// Time-bounded exclusive claims on outpoints.
///
/// A lease has no release path: the holder may crash or abandon the
/// funding attempt without ever signaling, so exclusivity ends only when
/// the lease duration elapses. Acquisition is first-caller-wins; the
/// mutex makes it linearizable per outpoint.
pub struct LeaseTable {
    inner: Mutex<HashMap<Outpoint, Instant>>,
}

impl LeaseTable {
    pub fn new() -> Self {
        LeaseTable { inner: Mutex::new(HashMap::new()) }
    }

    /// Claims `outpoint` for `lease` starting now. Returns false while an
    /// unexpired claim by any caller (including a previous self) exists.
    pub fn try_acquire(&self, outpoint: Outpoint, lease: Duration) -> bool {
        let now = Instant::now();
        let mut map = self.inner.lock().unwrap();
        if map.len() > PURGE_THRESHOLD {
            map.retain(|_, expiry| *expiry > now);
        }
        match map.entry(outpoint) {
            Entry::Occupied(mut held) => {
                if *held.get() > now {
                    return false;
                }
                held.insert(now + lease);
                true
            }
            Entry::Vacant(slot) => {
                slot.insert(now + lease);
                true
            }
        }
    }
}

impl Default for LeaseTable {
    fn default() -> Self {
        Self::new()
    }
}
