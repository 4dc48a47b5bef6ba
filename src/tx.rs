use crate::coin::{Outpoint, TxId};
use crate::crypto::{Address, OwnerKey};
use crate::error::PurseError;
use serde::{Serialize, Deserialize};

/// Bytes one unlocking proof adds to a serialized input.
pub const PROOF_LEN: u64 = 32;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxInput {
    pub outpoint: Outpoint,
    /// Value of the referenced source output, when known to the caller.
    /// Inputs added by the purse always carry it.
    pub source_value: Option<u64>,
    #[serde(default)]
    pub unlocking_proof: Option<[u8; 32]>,
}

impl TxInput {
    pub fn new(outpoint: Outpoint, source_value: Option<u64>) -> Self {
        TxInput { outpoint, source_value, unlocking_proof: None }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutput {
    /// Locking condition: pays whoever owns this address.
    pub lock: Address,
    pub value: u64,
    /// Placeholder flagged for the builder to size during change
    /// distribution.
    #[serde(default)]
    pub change: bool,
}

/// A draft transaction under construction. Owned by one funding call at a
/// time; nothing here is shared state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
}

impl Transaction {
    pub fn new() -> Self {
        Transaction::default()
    }

    pub fn add_input(&mut self, input: TxInput) {
        self.inputs.push(input);
    }

    pub fn add_output(&mut self, lock: Address, value: u64) {
        self.outputs.push(TxOutput { lock, value, change: false });
    }

    pub fn add_change_output(&mut self, lock: Address) {
        self.outputs.push(TxOutput { lock, value: 0, change: true });
    }

    /// Transaction id: a blake3 hash over the spend-relevant content.
    /// Proofs are excluded so signing does not move the id.
    pub fn txid(&self) -> TxId {
        let mut hasher = blake3::Hasher::new();
        for input in &self.inputs {
            hasher.update(&input.outpoint.key_bytes());
        }
        for output in &self.outputs {
            hasher.update(&output.lock);
            hasher.update(&output.value.to_le_bytes());
            hasher.update(&[output.change as u8]);
        }
        *hasher.finalize().as_bytes()
    }

    pub fn output_total(&self) -> u64 {
        self.outputs.iter().map(|o| o.value).sum()
    }
}

/// The external transaction-building capability the purse delegates to:
/// fee computation from the draft's shape, sizing of change placeholders,
/// and signing. Injected so the selection core is testable with stubs.
pub trait TxBuilder: Send + Sync {
    fn compute_fee(&self, tx: &Transaction) -> Result<u64, PurseError>;
    fn distribute_change(&self, tx: &mut Transaction) -> Result<(), PurseError>;
    fn sign(&self, tx: &mut Transaction) -> Result<(), PurseError>;
}

/// Default builder: flat units-per-kilobyte fee over the serialized size,
/// equal change distribution, keyed-blake3 unlocking proofs.
pub struct KbFeeBuilder {
    fee_per_kb: u64,
    key: OwnerKey,
}

impl KbFeeBuilder {
    pub fn new(fee_per_kb: u64, key: OwnerKey) -> Self {
        KbFeeBuilder { fee_per_kb, key }
    }

    fn serialized_size(&self, tx: &Transaction) -> Result<u64, PurseError> {
        let base = bincode::serialized_size(tx)
            .map_err(|e| PurseError::Builder(format!("size estimation: {e}")))?;
        let unsigned = tx.inputs.iter().filter(|i| i.unlocking_proof.is_none()).count() as u64;
        Ok(base + unsigned * PROOF_LEN)
    }

    fn known_input_total(tx: &Transaction) -> Result<u64, PurseError> {
        let mut total = 0u64;
        for input in &tx.inputs {
            total += input
                .source_value
                .ok_or(PurseError::MissingSourceOutput(input.outpoint))?;
        }
        Ok(total)
    }
}

impl TxBuilder for KbFeeBuilder {
    fn compute_fee(&self, tx: &Transaction) -> Result<u64, PurseError> {
        let size = self.serialized_size(tx)?;
        Ok((size * self.fee_per_kb).div_ceil(1000).max(1))
    }

    /// Splits `inputs - outputs - fee` equally across the change
    /// placeholders, remainder to the first. With no placeholders the
    /// leftover is surrendered as extra fee.
    fn distribute_change(&self, tx: &mut Transaction) -> Result<(), PurseError> {
        let fee = self.compute_fee(tx)?;
        let inputs = Self::known_input_total(tx)?;
        let outputs = tx.output_total();
        let leftover = inputs
            .checked_sub(outputs + fee)
            .ok_or(PurseError::InsufficientInputs { inputs, outputs: outputs + fee })?;

        let splits: Vec<usize> = tx
            .outputs
            .iter()
            .enumerate()
            .filter(|(_, o)| o.change)
            .map(|(i, _)| i)
            .collect();
        if splits.is_empty() {
            return Ok(());
        }
        let each = leftover / splits.len() as u64;
        let mut remainder = leftover % splits.len() as u64;
        for i in splits {
            tx.outputs[i].value = each + remainder;
            remainder = 0;
        }
        Ok(())
    }

    fn sign(&self, tx: &mut Transaction) -> Result<(), PurseError> {
        let txid = tx.txid();
        for input in &mut tx.inputs {
            input.unlocking_proof = Some(self.key.prove_spend(&txid, &input.outpoint));
        }
        Ok(())
    }
}
