use clap::{Parser, Subcommand};
use std::sync::Arc;
use paypurse::{config, metrics, Purse, Store, Transaction};

#[derive(Parser)]
#[command(author, version, about = "paypurse — single-account UTXO funding purse")]
struct Cli {
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Print the owner address (hex) and exit
    Address,
    /// Report balance over the selection window
    Balance,
    /// Rebuild the inventory from the remote indexer
    Resync,
    /// Fund and sign a payment to an address; prints the draft for broadcast
    Send {
        /// Recipient address, 32 bytes hex
        #[arg(long)]
        to: String,
        /// Amount in smallest currency units
        #[arg(long)]
        amount: u64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load(&cli.config)?;

    let db = Arc::new(Store::open(&cfg.storage.path)?);
    println!("🗄️  Database opened at '{}'", db.path());
    metrics::serve(cfg.metrics.clone())?;

    let purse = Purse::open(db, &cfg)?;

    match cli.cmd {
        Cmd::Address => {
            println!("{}", purse.address_hex());
        }
        Cmd::Balance => {
            let (total, count) = purse.balance()?;
            println!("💰 {} units across {} coins (selection-window view)", total, count);
        }
        Cmd::Resync => {
            let (total, count) = purse.resync().await?;
            println!("💰 {} units across {} coins after resync", total, count);
        }
        Cmd::Send { to, amount } => {
            let raw = hex::decode(&to)?;
            let lock: [u8; 32] = raw
                .as_slice()
                .try_into()
                .map_err(|_| anyhow::anyhow!("recipient address must be 32 bytes hex"))?;

            let mut tx = Transaction::new();
            tx.add_output(lock, amount);
            purse.fund_and_sign(&mut tx, false)?;

            let encoded = bincode::serialize(&tx)?;
            println!(
                "✅ Funded tx {} ({} inputs, {} outputs) — ready for broadcast",
                hex::encode(tx.txid()),
                tx.inputs.len(),
                tx.outputs.len()
            );
            println!("{}", hex::encode(encoded));
        }
    }

    Ok(())
}
