//! CLI command implementations
//!
//! Every command runs against a connected [`CliSession`](crate::buses::CliSession).
//! Long scans take the shared `running` flag that the Ctrl-C handler clears
//! and show an `indicatif` progress bar.

mod list;
mod probe;
pub mod mailbox;
pub mod memory;
pub mod target;

pub use list::list_buses;
pub use probe::run_probe;

use indicatif::{ProgressBar, ProgressStyle};
use serdb_core::hexdump::{hexdump, PRINT_LIMIT};
use serdb_core::ScanOutcome;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Progress bar for a byte-oriented scan
pub(crate) fn byte_progress(
    total: usize,
    what: &str,
) -> Result<ProgressBar, Box<dyn std::error::Error>> {
    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta}) {msg}")?
            .progress_chars("#>-"),
    );
    pb.set_message(what.to_string());
    Ok(pb)
}

/// Finish the bar and unwrap a scan result, noting a cancellation
pub(crate) fn finish_scan<T>(pb: ProgressBar, outcome: ScanOutcome<T>) -> T {
    if outcome.is_cancelled() {
        pb.abandon_with_message("Interrupted");
        eprintln!("Interrupted, showing partial results");
    } else {
        pb.finish_with_message("Done");
    }
    outcome.into_inner()
}

/// Save `data` to `output` if given, print a hexdump if it is small enough
pub(crate) fn emit_bytes(
    data: &[u8],
    start: u32,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(path) = output {
        let mut file = File::create(path)?;
        file.write_all(data)?;
        println!("Wrote {} bytes to {:?}", data.len(), path);
    }

    if !data.is_empty() && data.len() <= PRINT_LIMIT {
        println!("{}", hexdump(data, start));
    } else if output.is_none() {
        println!(
            "{} bytes read; use -o to save ranges larger than {} bytes",
            data.len(),
            PRINT_LIMIT
        );
    }
    Ok(())
}
