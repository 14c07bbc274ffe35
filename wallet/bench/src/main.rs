use std::time::{Duration, Instant};

use alloy_primitives::Address;
use anyhow::{anyhow, Result};
use clap::Parser;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;
use serde::Serialize;
use zdoge_crypto::derive_identity;
use zdoge_wallet::memo::{encrypt_note, try_decrypt_note};
use zdoge_wallet::selection::select;
use zdoge_wallet::Note;

#[derive(Debug, Parser)]
#[command(author, version, about = "Benchmark wallet primitives", long_about = None)]
struct Cli {
    /// Number of identity/note operations to simulate.
    #[arg(long, default_value_t = 64)]
    iterations: usize,
    /// Output JSON metrics instead of a sentence.
    #[arg(long)]
    json: bool,
    /// Run a short smoke test.
    #[arg(long)]
    smoke: bool,
    /// Run the auto-discovery trial-decrypt scan benchmark instead.
    #[arg(long)]
    scan: bool,
    /// Number of memos to scan (for the scan benchmark).
    #[arg(long, default_value_t = 1000)]
    scan_notes: usize,
}

#[derive(Debug, Serialize)]
struct WalletBenchReport {
    iterations: usize,
    identity_derivation_ns: u128,
    commitment_ns: u128,
    memo_encrypt_ns: u128,
    memo_decrypt_ns: u128,
    coin_selection_ns: u128,
    ops_per_second: f64,
}

#[derive(Debug, Serialize)]
struct ScanBenchReport {
    total_memos: usize,
    owned_memos: usize,
    scan_time_ms: u128,
    memos_per_second: f64,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.scan {
        let count = if cli.smoke { cli.scan_notes.min(100) } else { cli.scan_notes };
        let report = run_scan_bench(count)?;
        if cli.json {
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else {
            println!("=== Auto-discovery trial-decrypt scan ===");
            println!("Total memos:     {}", report.total_memos);
            println!("Owned memos:     {}", report.owned_memos);
            println!("Scan time:       {}ms", report.scan_time_ms);
            println!("Memos/second:    {:.0}", report.memos_per_second);
        }
    } else {
        let iterations = if cli.smoke { cli.iterations.min(8) } else { cli.iterations };
        let report = run_wallet_bench(iterations)?;
        if cli.json {
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else {
            println!(
                "wallet-bench: iterations={iterations} identity_ns={} commitment_ns={} \
                 enc_ns={} dec_ns={} selection_ns={} ops/s={:.2}",
                report.identity_derivation_ns,
                report.commitment_ns,
                report.memo_encrypt_ns,
                report.memo_decrypt_ns,
                report.coin_selection_ns,
                report.ops_per_second
            );
        }
    }
    Ok(())
}

fn run_wallet_bench(iterations: usize) -> Result<WalletBenchReport> {
    if iterations == 0 {
        return Err(anyhow!("iterations must be greater than zero"));
    }
    let mut rng = ChaCha20Rng::seed_from_u64(0x57414C4C);
    let mut identity_time = Duration::default();
    let mut commitment_time = Duration::default();
    let mut enc_time = Duration::default();
    let mut dec_time = Duration::default();
    let mut selection_time = Duration::default();

    for idx in 0..iterations {
        let mut signature = vec![0u8; 65];
        rng.fill_bytes(&mut signature);

        let identity_start = Instant::now();
        let (_, identity) = derive_identity(&signature);
        identity_time += identity_start.elapsed();

        let secret = zdoge_crypto::field::random_field_with(&mut rng);
        let blinding = zdoge_crypto::field::random_field_with(&mut rng);
        let amount = 10_000u128 + idx as u128;

        let commitment_start = Instant::now();
        let note = Note::new(amount, identity.shielded_address, secret, blinding, "DOGE".into(), Address::ZERO, 18, idx as i64);
        commitment_time += commitment_start.elapsed();

        let enc_start = Instant::now();
        let memo = encrypt_note(identity.viewing_key, &note)?;
        enc_time += enc_start.elapsed();

        let dec_start = Instant::now();
        let recovered = try_decrypt_note(identity.viewing_key, &memo, identity.shielded_address, note.commitment, idx as u64, idx as i64)
            .ok_or_else(|| anyhow!("memo failed to decrypt its own ciphertext"))?;
        dec_time += dec_start.elapsed();
        if recovered.amount != note.amount {
            return Err(anyhow!("note mismatch after decrypt"));
        }

        let mut confirmed = recovered;
        confirmed.leaf_index = Some(idx as u64);
        let candidates = [confirmed];
        let selection_start = Instant::now();
        let _ = select(&candidates, amount / 2, 1, 0)?;
        selection_time += selection_start.elapsed();
    }

    let total = identity_time + commitment_time + enc_time + dec_time + selection_time;
    let ops_per_second = if total.as_secs_f64() > 0.0 {
        iterations as f64 / total.as_secs_f64()
    } else {
        0.0
    };

    Ok(WalletBenchReport {
        iterations,
        identity_derivation_ns: identity_time.as_nanos(),
        commitment_ns: commitment_time.as_nanos(),
        memo_encrypt_ns: enc_time.as_nanos(),
        memo_decrypt_ns: dec_time.as_nanos(),
        coin_selection_ns: selection_time.as_nanos(),
        ops_per_second,
    })
}

/// Simulates the auto-discovery scan: trial-decrypt every memo against this
/// wallet's viewing key, keeping the ones that are actually ours. Only
/// 1-in-100 memos are encrypted to the wallet under test; the rest model
/// other users' traffic on the same pool.
fn run_scan_bench(num_memos: usize) -> Result<ScanBenchReport> {
    if num_memos == 0 {
        return Err(anyhow!("num_memos must be greater than zero"));
    }
    let mut rng = ChaCha20Rng::seed_from_u64(0x5343414E);

    let (_, our_identity) = derive_identity(b"bench wallet signature");
    let owned_ratio = 100;

    // Each event carries a memo ciphertext and the commitment it claims --
    // exactly what `ingest_events` sees per `Transfer` log.
    let mut events: Vec<(Vec<u8>, zdoge_crypto::Fr)> = Vec::with_capacity(num_memos);
    for i in 0..num_memos {
        let secret = zdoge_crypto::field::random_field_with(&mut rng);
        let blinding = zdoge_crypto::field::random_field_with(&mut rng);
        let amount = 1_000u128 + (i as u128 % 10_000);

        let (owner, viewing_key) = if i % owned_ratio == 0 {
            (our_identity.shielded_address, our_identity.viewing_key)
        } else {
            let mut other_sig = vec![0u8; 65];
            rng.fill_bytes(&mut other_sig);
            let (_, other) = derive_identity(&other_sig);
            (other.shielded_address, other.viewing_key)
        };

        let note = Note::new(amount, owner, secret, blinding, "DOGE".into(), Address::ZERO, 18, 0);
        let memo = encrypt_note(viewing_key, &note)?;
        events.push((memo, note.commitment));
    }

    let scan_start = Instant::now();
    let mut owned_count = 0;
    for (leaf_index, (memo, commitment)) in events.iter().enumerate() {
        if try_decrypt_note(our_identity.viewing_key, memo, our_identity.shielded_address, *commitment, leaf_index as u64, 0).is_some() {
            owned_count += 1;
        }
    }
    let scan_time = scan_start.elapsed();

    let memos_per_second = if scan_time.as_secs_f64() > 0.0 {
        num_memos as f64 / scan_time.as_secs_f64()
    } else {
        f64::INFINITY
    };

    Ok(ScanBenchReport {
        total_memos: num_memos,
        owned_memos: owned_count,
        scan_time_ms: scan_time.as_millis(),
        memos_per_second,
    })
}
