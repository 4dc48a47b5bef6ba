// Funding orchestration tests, run against both a stub builder and the
// default sats-per-kilobyte builder.

use std::sync::Arc;
use tempfile::TempDir;
use paypurse::{
    Coin, IndexerClient, KbFeeBuilder, Outpoint, OwnerKey, Purse, PurseError, Store,
    Transaction, TxBuilder, TxInput,
};

/// Builder with a fixed fee: isolates the orchestration logic from fee
/// arithmetic.
struct StubBuilder {
    fee: u64,
}

impl TxBuilder for StubBuilder {
    fn compute_fee(&self, _tx: &Transaction) -> Result<u64, PurseError> {
        Ok(self.fee)
    }

    fn distribute_change(&self, tx: &mut Transaction) -> Result<(), PurseError> {
        let mut inputs = 0u64;
        for input in &tx.inputs {
            inputs += input
                .source_value
                .ok_or(PurseError::MissingSourceOutput(input.outpoint))?;
        }
        let outputs = tx.output_total();
        let leftover = inputs
            .checked_sub(outputs + self.fee)
            .ok_or(PurseError::InsufficientInputs { inputs, outputs: outputs + self.fee })?;
        if let Some(change) = tx.outputs.iter_mut().find(|o| o.change) {
            change.value = leftover;
        }
        Ok(())
    }

    fn sign(&self, tx: &mut Transaction) -> Result<(), PurseError> {
        for input in &mut tx.inputs {
            input.unlocking_proof = Some([0xAB; 32]);
        }
        Ok(())
    }
}

fn open_purse_with(
    dir: &TempDir,
    name: &str,
    builder: Box<dyn TxBuilder>,
    change_splits: u8,
) -> (Arc<Store>, Purse) {
    let db_path = dir.path().join(name);
    let store = Arc::new(Store::open(db_path.to_str().unwrap()).expect("Failed to open store"));
    let key = OwnerKey::generate();
    let purse = Purse::new(
        store.clone(),
        &key,
        builder,
        IndexerClient::new("http://127.0.0.1:1"),
        change_splits,
    );
    (store, purse)
}

fn seed(store: &Store, purse: &Purse, values: &[u64]) {
    for (i, value) in values.iter().enumerate() {
        let mut txid = [0u8; 32];
        txid[..8].copy_from_slice(&(i as u64 + 1).to_be_bytes());
        store
            .utxo_insert(&purse.address(), &Coin { outpoint: Outpoint::new(txid, 0), value: *value })
            .expect("Failed to seed coin");
    }
}

#[tokio::test]
async fn test_fund_selects_inputs_and_balances_change() {
    let dir = TempDir::new().expect("temp dir");
    let (store, purse) = open_purse_with(&dir, "fund_db", Box::new(StubBuilder { fee: 7 }), 1);
    seed(&store, &purse, &[50_000, 30_000, 20_000]);

    let mut tx = Transaction::new();
    tx.add_output([0xDD; 32], 40_000);
    purse.fund_and_sign(&mut tx, false).expect("funding failed");

    let input_total: u64 = tx.inputs.iter().map(|i| i.source_value.unwrap()).sum();
    assert!(input_total >= 40_000 + 7);
    assert_eq!(tx.output_total() + 7, input_total, "change absorbs the surplus");
    assert_eq!(tx.outputs.iter().filter(|o| o.change).count(), 1);
    assert!(
        tx.inputs.iter().all(|i| i.unlocking_proof.is_some()),
        "every input must be signed"
    );
}

#[tokio::test]
async fn test_fund_appends_all_change_splits() {
    let dir = TempDir::new().expect("temp dir");
    let (store, purse) = open_purse_with(&dir, "splits_db", Box::new(StubBuilder { fee: 1 }), 3);
    seed(&store, &purse, &[10_000]);

    let mut tx = Transaction::new();
    tx.add_output([0xDD; 32], 2_000);
    purse.fund_and_sign(&mut tx, false).expect("funding failed");

    let change: Vec<_> = tx.outputs.iter().filter(|o| o.change).collect();
    assert_eq!(change.len(), 3);
    assert!(change.iter().all(|o| o.lock == purse.address()), "change pays the owner");
}

#[tokio::test]
async fn test_fully_funded_requirement_fails_before_selection() {
    let dir = TempDir::new().expect("temp dir");
    let (store, purse) = open_purse_with(&dir, "fully_db", Box::new(StubBuilder { fee: 1 }), 1);
    seed(&store, &purse, &[5_000]);

    let mut tx = Transaction::new();
    tx.add_input(TxInput::new(Outpoint::new([0x11; 32], 0), Some(100)));
    tx.add_output([0xDD; 32], 200);

    match purse.fund_and_sign(&mut tx, true) {
        Err(PurseError::InsufficientInputs { inputs, outputs }) => {
            assert_eq!((inputs, outputs), (100, 200));
        }
        other => panic!("expected InsufficientInputs, got {other:?}"),
    }

    // No selection was attempted: the seeded coin is still unreserved.
    let coins = purse.lock_coins(5_000).expect("inventory untouched");
    assert_eq!(coins.len(), 1);
}

#[tokio::test]
async fn test_unknown_source_value_is_rejected() {
    let dir = TempDir::new().expect("temp dir");
    let (_store, purse) = open_purse_with(&dir, "missing_db", Box::new(StubBuilder { fee: 1 }), 1);

    let mut tx = Transaction::new();
    tx.add_input(TxInput::new(Outpoint::new([0x22; 32], 4), None));
    tx.add_output([0xDD; 32], 10);

    match purse.fund_and_sign(&mut tx, false) {
        Err(PurseError::MissingSourceOutput(op)) => assert_eq!(op.vout, 4),
        other => panic!("expected MissingSourceOutput, got {other:?}"),
    }
}

#[tokio::test]
async fn test_selector_exhaustion_is_terminal() {
    let dir = TempDir::new().expect("temp dir");
    let (store, purse) = open_purse_with(&dir, "exhaust_db", Box::new(StubBuilder { fee: 5 }), 1);
    seed(&store, &purse, &[100]);

    let mut tx = Transaction::new();
    tx.add_output([0xDD; 32], 1_000);

    // The window cannot cover the target; the selector's failure must
    // surface instead of looping forever.
    match purse.fund_and_sign(&mut tx, false) {
        Err(PurseError::InsufficientFunds { .. }) => {}
        other => panic!("expected InsufficientFunds, got {other:?}"),
    }
}

#[tokio::test]
async fn test_already_funded_draft_adds_no_inputs() {
    let dir = TempDir::new().expect("temp dir");
    let (store, purse) = open_purse_with(&dir, "prefunded_db", Box::new(StubBuilder { fee: 5 }), 1);
    seed(&store, &purse, &[9_999]);

    let mut tx = Transaction::new();
    tx.add_input(TxInput::new(Outpoint::new([0x33; 32], 0), Some(1_000)));
    tx.add_output([0xDD; 32], 100);
    purse.fund_and_sign(&mut tx, true).expect("funding failed");

    assert_eq!(tx.inputs.len(), 1, "inputs already covered outputs + fee");
    // The seeded coin was never reserved.
    assert_eq!(purse.lock_coins(9_999).expect("still selectable").len(), 1);
}

#[tokio::test]
async fn test_fund_with_default_builder_end_to_end() {
    let dir = TempDir::new().expect("temp dir");
    let key = OwnerKey::generate();
    let db_path = dir.path().join("kb_db");
    let store = Arc::new(Store::open(db_path.to_str().unwrap()).expect("Failed to open store"));
    let builder = KbFeeBuilder::new(10, key.clone());
    let purse = Purse::new(
        store.clone(),
        &key,
        Box::new(KbFeeBuilder::new(10, key.clone())),
        IndexerClient::new("http://127.0.0.1:1"),
        2,
    );
    seed(&store, &purse, &[80_000, 60_000]);

    let mut tx = Transaction::new();
    tx.add_output([0xDD; 32], 70_000);
    purse.fund_and_sign(&mut tx, false).expect("funding failed");

    let input_total: u64 = tx.inputs.iter().map(|i| i.source_value.unwrap()).sum();
    let fee = builder.compute_fee(&tx).expect("fee");
    assert_eq!(tx.output_total() + fee, input_total, "value is conserved minus the fee");
    assert!(tx.inputs.iter().all(|i| i.unlocking_proof.is_some()));
    assert_eq!(tx.outputs.iter().filter(|o| o.change).count(), 2);
}
