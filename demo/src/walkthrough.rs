//! Scripted end-to-end run against an in-memory ledger.
//!
//! Each step prints the tracker snapshot so the audit log, error slot and
//! record state can be followed as they change.

use std::sync::Arc;
use std::time::Duration;

use filemark_contracts::{SigningCredential, TrackerError, TrackerResult};
use filemark_core::{FileSource, InMemoryFile, Tracker, TrackerOptions};
use filemark_ledger::{InMemoryLedger, DEV_PRIVATE_KEY};

use crate::report::{describe_verification, print_snapshot};

fn file(name: &str, bytes: &[u8]) -> Arc<dyn FileSource> {
    Arc::new(InMemoryFile::new(name, bytes.to_vec()))
}

fn step(title: &str) {
    println!("── {title}");
}

pub async fn run() -> TrackerResult<()> {
    let credential = Arc::new(SigningCredential::from_hex(DEV_PRIVATE_KEY)?);
    let ledger = Arc::new(InMemoryLedger::with_manual_confirmation());
    let tracker = Arc::new(Tracker::new(
        ledger.clone(),
        credential,
        TrackerOptions::with_timeout(Duration::from_secs(5)),
    ));

    let original = b"Quarterly report: revenue 1.2M, costs 0.8M".as_slice();
    let tampered = b"Quarterly report: revenue 1.9M, costs 0.8M".as_slice();

    // 1. Register the original.
    step("1. select, hash and register report.txt");
    tracker.select_file(file("report.txt", original));
    let fingerprint = tracker.upload().await?;
    println!("   computed {fingerprint}");

    let pending = {
        let tracker = tracker.clone();
        tokio::spawn(async move { tracker.register_on_chain().await })
    };
    while ledger.pending_transactions() == 0 {
        tokio::task::yield_now().await;
    }
    println!(
        "   awaiting confirmation (state: {})",
        tracker.snapshot().record.state()
    );
    ledger.release_all();
    let registration = join(pending).await?;
    println!(
        "   confirmed in block {} ({})",
        registration.confirmation.block_number, registration.confirmation.tx
    );
    print_snapshot(&tracker.snapshot());

    // 2. Verify an identical copy.
    step("2. verify an identical copy");
    let verification = tracker.verify(file("report-copy.txt", original)).await?;
    println!("   {}", describe_verification(&verification));
    print_snapshot(&tracker.snapshot());

    // 3. Verify a modified copy.
    step("3. verify a modified copy");
    let verification = tracker.verify(file("report-edited.txt", tampered)).await?;
    println!("   {}", describe_verification(&verification));
    print_snapshot(&tracker.snapshot());

    // 4. Replace the selection while a confirmation is outstanding.
    step("4. select another file while a registration is confirming");
    tracker.select_file(file("draft.txt", b"draft v1"));
    tracker.upload().await?;
    let pending = {
        let tracker = tracker.clone();
        tokio::spawn(async move { tracker.register_on_chain().await })
    };
    while ledger.pending_transactions() == 0 {
        tokio::task::yield_now().await;
    }
    tracker.select_file(file("final.txt", b"final v1"));
    ledger.release_all();
    match join(pending).await {
        Err(TrackerError::Superseded) => println!("   stale registration discarded"),
        other => println!("   unexpected outcome: {other:?}"),
    }
    print_snapshot(&tracker.snapshot());

    // 5. A failed submission followed by a retry.
    step("5. registration fails once, then succeeds on retry");
    tracker.upload().await?;
    ledger.fail_next_submission(TrackerError::Connectivity {
        reason: "connection refused".to_string(),
    });
    if let Err(err) = tracker.register_on_chain().await {
        println!("   first attempt: {err}");
    }
    let retry = {
        let tracker = tracker.clone();
        tokio::spawn(async move { tracker.register_on_chain().await })
    };
    while ledger.pending_transactions() == 0 {
        tokio::task::yield_now().await;
    }
    ledger.release_all();
    let registration = join(retry).await?;
    println!("   retry confirmed in block {}", registration.confirmation.block_number);
    print_snapshot(&tracker.snapshot());

    let trail = tracker.audit_trail();
    println!(
        "audit chain: {} entries, terminal hash {}",
        trail.entries.len(),
        trail.terminal_hash
    );
    Ok(())
}

async fn join<T>(handle: tokio::task::JoinHandle<TrackerResult<T>>) -> TrackerResult<T> {
    handle.await.map_err(|e| TrackerError::Protocol {
        reason: format!("tracker task failed: {e}"),
    })?
}
