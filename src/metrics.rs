use anyhow::Result;
use prometheus::{register_int_counter, Encoder, IntCounter, TextEncoder};
use std::sync::LazyLock;
use std::thread;

// Counters live in the default registry so any module can bump them
// without plumbing a handle through. Prefixed with `paypurse_`.

pub static SELECT_CALLS: LazyLock<IntCounter> = LazyLock::new(|| {
    register_int_counter!("paypurse_select_calls", "Coin selection attempts")
        .expect("register paypurse_select_calls")
});

pub static LEASE_CONTENTION: LazyLock<IntCounter> = LazyLock::new(|| {
    register_int_counter!(
        "paypurse_lease_contention",
        "Selection candidates skipped because another caller held the lease"
    )
    .expect("register paypurse_lease_contention")
});

pub static FUNDED_TXS: LazyLock<IntCounter> = LazyLock::new(|| {
    register_int_counter!("paypurse_funded_txs", "Transactions fully funded and signed")
        .expect("register paypurse_funded_txs")
});

pub static RESYNCS: LazyLock<IntCounter> = LazyLock::new(|| {
    register_int_counter!("paypurse_resyncs", "Completed full inventory resyncs")
        .expect("register paypurse_resyncs")
});

pub fn serve(cfg: crate::config::Metrics) -> Result<()> {
    let bind_addr = cfg.bind.clone();
    thread::spawn(move || {
        let server = match tiny_http::Server::http(&bind_addr) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("🔥 Could not start metrics server on {}: {}", bind_addr, e);
                return;
            }
        };

        for request in server.incoming_requests() {
            let mut buffer = vec![];
            let encoder = TextEncoder::new();
            let metric_families = prometheus::gather();
            if encoder.encode(&metric_families, &mut buffer).is_err() {
                eprintln!("🔥 Could not encode metrics");
                continue;
            }

            let response = match "Content-Type: text/plain; version=0.0.4; charset=utf-8"
                .parse::<tiny_http::Header>()
            {
                Ok(h) => tiny_http::Response::from_data(buffer).with_header(h),
                Err(_) => tiny_http::Response::from_data(Vec::new()),
            };

            let _ = request.respond(response);
        }
    });

    Ok(())
}
