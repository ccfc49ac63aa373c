//! Plain-text rendering of tracker snapshots.

use chrono::{DateTime, Utc};

use filemark_core::{TrackerSnapshot, Verification};

/// Render a registration timestamp (seconds since the epoch) as a UTC date.
pub fn format_timestamp(secs: u64) -> String {
    i64::try_from(secs)
        .ok()
        .and_then(|s| DateTime::<Utc>::from_timestamp(s, 0))
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| format!("{secs} (out of range)"))
}

/// Print the record, error slot, history, and audit log.
pub fn print_snapshot(snapshot: &TrackerSnapshot) {
    let record = &snapshot.record;
    let none = || "-".to_string();

    println!("  session      : {}", snapshot.session_id);
    println!("  file         : {} ({} bytes)", record.file_name(), record.file_size());
    println!("  state        : {}", record.state());
    println!(
        "  fingerprint  : {}",
        record.local_fingerprint().map(|f| f.to_hex()).unwrap_or_else(none)
    );
    println!(
        "  file id      : {}",
        record.committed_id().map(|f| f.to_hex()).unwrap_or_else(none)
    );
    if let Some(owner) = record.owner() {
        println!("  owner        : {owner}");
    }
    if let Some(error) = &snapshot.error {
        let label = if error.is_fault() { "error" } else { "notice" };
        println!("  {label:<13}: {error}");
    }

    if !record.history().is_empty() {
        println!("  history:");
        for (i, ts) in record.history().iter().enumerate() {
            println!("    {:>2}. {}", i + 1, format_timestamp(*ts));
        }
    }

    println!("  audit log:");
    for entry in &snapshot.audit {
        println!(
            "    [{:>2}] {} {:<9} {}",
            entry.sequence,
            entry.timestamp.format("%H:%M:%S%.3f"),
            entry.kind.as_str(),
            entry.message
        );
    }
    println!();
}

/// One-line summary of a verification outcome.
pub fn describe_verification(verification: &Verification) -> String {
    match verification {
        Verification::Verified { fingerprint, metadata } => format!(
            "VERIFIED {fingerprint} ({} registration(s), first at {})",
            metadata.history.len(),
            metadata
                .history
                .first()
                .map(|ts| format_timestamp(*ts))
                .unwrap_or_else(|| "unknown".to_string())
        ),
        Verification::Mismatched {
            expected: Some(expected),
            actual,
        } => format!("MISMATCH: computed {actual}, registered {expected}"),
        Verification::Mismatched {
            expected: None,
            actual,
        } => format!("MISMATCH: {actual} has never been registered"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_epoch_seconds_as_utc() {
        assert_eq!(format_timestamp(0), "1970-01-01 00:00:00 UTC");
        assert_eq!(format_timestamp(1_700_000_000), "2023-11-14 22:13:20 UTC");
    }

    #[test]
    fn out_of_range_timestamp_is_reported() {
        assert!(format_timestamp(u64::MAX).contains("out of range"));
    }
}
