//! End-to-end bid submission against the simulated backend

use std::sync::Arc;
use std::time::Duration;

use outcome::bidflow::{self, Backend, BidError, BidForm, SubmitMode};
use outcome::config::Config;
use tokio::time::Instant;

fn backend(args: &[&str]) -> Arc<Backend> {
    let config = Config::load_from(std::iter::once("bidflow").chain(args.iter().copied()))
        .expect("valid test config");
    Arc::new(Backend::from_config(&config))
}

fn forms(specs: &[&str]) -> Vec<BidForm> {
    specs
        .iter()
        .map(|s| s.parse().expect("valid bid"))
        .collect()
}

#[tokio::test(start_paused = true)]
async fn nothing_happens_until_the_batch_is_awaited() {
    let backend = backend(&["--latency-ms", "100"]);
    let batch = bidflow::submit_all(
        forms(&["alice:lot-1:6000000"]),
        Arc::clone(&backend),
        SubmitMode::Par,
    );

    sleep_ms(500).await;
    assert_eq!(backend.submissions(), 0);

    assert!(batch.await.is_success());
    assert_eq!(backend.submissions(), 1);
}

#[tokio::test(start_paused = true)]
async fn single_bid_waits_for_run_and_resubmits_on_each_run() {
    let backend = backend(&["--latency-ms", "100"]);
    let bid = bidflow::submit_bid(
        "alice:lot-1:6000000".parse().expect("valid bid"),
        Arc::clone(&backend),
    );

    sleep_ms(500).await;
    assert_eq!(backend.submissions(), 0);

    let started = Instant::now();
    assert!(bid.run().await.is_success());
    // quote and submit both happen inside the run
    assert!(started.elapsed() >= Duration::from_millis(200));
    assert!(bid.run().await.is_success());
    assert_eq!(backend.submissions(), 2);
}

#[tokio::test(start_paused = true)]
async fn par_batch_overlaps_backend_latency() {
    let backend = backend(&["--latency-ms", "100"]);
    let specs = ["alice:lot-1:6000000", "bob:lot-2:7000000", "carol:lot-3:8000000"];

    let started = Instant::now();
    let par = bidflow::submit_all(forms(&specs), Arc::clone(&backend), SubmitMode::Par).await;
    let par_elapsed = started.elapsed();

    let started = Instant::now();
    let seq = bidflow::submit_all(forms(&specs), Arc::clone(&backend), SubmitMode::Seq).await;
    let seq_elapsed = started.elapsed();

    assert_eq!(par.value().map(Vec::len), Some(3));
    assert_eq!(seq.value().map(Vec::len), Some(3));
    // quote + submit per bid
    assert!(par_elapsed < Duration::from_millis(300));
    assert!(seq_elapsed >= Duration::from_millis(600));
}

#[tokio::test(start_paused = true)]
async fn par_batch_lists_every_failure() {
    let backend = backend(&[
        "--latency-ms",
        "10",
        "--closed-lots",
        "lot-2",
        "--rejecting-bidders",
        "mallory",
    ]);
    let out = bidflow::submit_all(
        forms(&[
            "alice:lot-1:6000000",
            "bob:lot-2:6000000",
            "mallory:lot-3:6000000",
            "dave:lot-4:",
        ]),
        Arc::clone(&backend),
        SubmitMode::Par,
    )
    .await;

    let errors = out.error().cloned().unwrap_or_default();
    assert_eq!(errors.len(), 3);
    assert!(matches!(errors[0], BidError::LotClosed(_)));
    assert!(matches!(errors[1], BidError::WalletRejected(_)));
    assert!(matches!(errors[2], BidError::MissingAmount { .. }));
    // alice still went through
    assert_eq!(backend.submissions(), 1);
}

#[tokio::test(start_paused = true)]
async fn flaky_network_costs_one_extra_round_trip() {
    let backend = backend(&["--latency-ms", "100", "--flaky-network"]);

    let started = Instant::now();
    let out = bidflow::submit_bid(
        "alice:lot-1:6000000".parse().expect("valid bid"),
        Arc::clone(&backend),
    )
    .await;

    assert_eq!(out.value().map(|r| r.tx_id.as_str()), Some("tx-lot-1-0001"));
    // quote, failed submit, retried submit
    assert!(started.elapsed() >= Duration::from_millis(300));
}

#[tokio::test(start_paused = true)]
async fn best_effort_alert_mentions_only_confirmed_bids() {
    let backend = backend(&["--latency-ms", "10", "--offline-lots", "lot-9"]);
    let out = bidflow::submit_all(
        forms(&["alice:lot-1:6000000", "bob:lot-9:6000000"]),
        backend,
        SubmitMode::BestEffort,
    )
    .await;

    assert_eq!(bidflow::alert(out), "✅ 1 bid(s) confirmed: tx-lot-1-0001");
}

#[tokio::test(start_paused = true)]
async fn batch_outcome_serializes_with_status_tag() {
    let backend = backend(&["--latency-ms", "0"]);
    let out = bidflow::submit_all(forms(&["alice:lot-1:"]), backend, SubmitMode::Seq).await;

    let json = serde_json::to_value(&out).expect("serializable outcome");
    assert_eq!(json["status"], "failure");
    assert_eq!(json["error"][0]["kind"], "missing_amount");
    assert_eq!(json["error"][0]["lot_id"], "lot-1");
}

async fn sleep_ms(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}
