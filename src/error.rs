use crate::coin::Outpoint;

/// Caller-visible failures of purse operations.
///
/// The variants separate "try again later" (`InsufficientFunds`) from
/// inconsistent request state (`InsufficientInputs`, `MissingSourceOutput`)
/// from downstream/environment failures (`Store`, `Indexer`, `Builder`).
#[derive(Debug, thiserror::Error)]
pub enum PurseError {
    /// The selection window was exhausted before the target was reached.
    /// Any coins reserved along the way stay leased until expiry.
    #[error("insufficient funds: needed {needed}, reserved {reserved}")]
    InsufficientFunds { needed: u64, reserved: u64 },

    /// A fully-funded draft was required but existing inputs fall short.
    #[error("insufficient inputs: {inputs} in, {outputs} out")]
    InsufficientInputs { inputs: u64, outputs: u64 },

    /// An existing input references a source output of unknown value.
    #[error("input {0} references an unknown source output")]
    MissingSourceOutput(Outpoint),

    #[error("store: {0}")]
    Store(anyhow::Error),

    #[error("indexer: {0}")]
    Indexer(#[from] IndexerError),

    /// Fee computation, change distribution, or signing failed in the
    /// injected transaction builder.
    #[error("builder: {0}")]
    Builder(String),
}

// anyhow::Error is not std::error::Error, so thiserror's #[from] cannot
// generate this conversion.
impl From<anyhow::Error> for PurseError {
    fn from(e: anyhow::Error) -> Self {
        PurseError::Store(e)
    }
}

/// Failures talking to the remote authoritative unspent-output source.
#[derive(Debug, thiserror::Error)]
pub enum IndexerError {
    #[error("transport: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected status {0}")]
    Status(u16),

    /// The indexer answered 2xx but reported an application-level error.
    #[error("remote error: {0}")]
    Api(String),
}
