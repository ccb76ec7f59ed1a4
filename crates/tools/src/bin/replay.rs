//! Replays a recorded newline-delimited JSON message stream to stdout,
//! paced by the `Time`/`T` field each line carries, for feeding
//! `glass-server`'s stdin reader against a captured pick sequence
//! (spec.md §8's literal end-to-end scenarios; grounded on
//! `glass-app.cpp`'s file-driven test-harness role, since the original
//! has no dedicated replay binary of its own).

use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::Value;

use glass_proto::InboundMessage;
use tools::common::io::open_reader;

#[derive(Parser, Debug)]
#[command(author, version, about = "Replay a captured pick/correlation stream to stdout", long_about = None)]
struct Args {
    /// Input file of newline-delimited JSON messages ('-' for stdin, '.gz' for gzip).
    input: PathBuf,

    /// Playback speed multiplier; 1.0 reproduces the original inter-message
    /// timing, 0 replays as fast as possible.
    #[arg(long, default_value_t = 1.0)]
    speed: f64,

    /// Skip lines that fail to parse as a known message shape instead of
    /// aborting the run.
    #[arg(long)]
    skip_malformed: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let reader = open_reader(&args.input).with_context(|| format!("opening {}", args.input.display()))?;
    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    let mut prev_time_sec: Option<f64> = None;
    let mut emitted = 0u64;
    let mut skipped = 0u64;

    for line in reader.lines() {
        let line = line.context("reading input line")?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match InboundMessage::parse(line) {
            Ok(_) => {}
            Err(e) => {
                if args.skip_malformed {
                    log::warn!("skipping malformed line: {e}");
                    skipped += 1;
                    continue;
                }
                anyhow::bail!("malformed message: {e}");
            }
        }

        if args.speed > 0.0 {
            if let Some(time_sec) = extract_time_sec(line) {
                if let Some(prev) = prev_time_sec {
                    let gap = (time_sec - prev).max(0.0) / args.speed;
                    if gap > 0.0 {
                        thread::sleep(Duration::from_secs_f64(gap));
                    }
                }
                prev_time_sec = Some(time_sec);
            }
        }

        writeln!(out, "{line}")?;
        out.flush()?;
        emitted += 1;
    }

    log::info!("replay complete: {emitted} messages emitted, {skipped} skipped");
    Ok(())
}

/// Pulls the `Time`/`T` field out of a raw line without fully decoding
/// it, so pacing works even for message shapes `InboundMessage` doesn't
/// carry a timestamp through to its typed form for (e.g. `SiteList`).
fn extract_time_sec(line: &str) -> Option<f64> {
    let value: Value = serde_json::from_str(line).ok()?;
    let raw = value.get("Time").or_else(|| value.get("T"))?.as_str()?;
    glass_proto::time::parse_iso8601(raw).ok()
}
