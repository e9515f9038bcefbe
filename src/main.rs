//! serdb - SERDB debug bridge client
//!
//! Talks to the I2C debug port of MStar/SigmaStar display SoCs. Memory is
//! reached through three spaces:
//! - **XDATA** - the 8051's 64 KiB data space
//! - **DRAM** - shared memory seen through a 64 KiB window in XDATA
//! - **RIU** - 16-bit peripheral registers, PM and non-PM
//!
//! On top of XDATA sit the firmware mailbox, AEON coprocessor control and
//! the watchdog. The transport (simulator, Linux i2c-dev or FTDI) is picked
//! with `--bus`.

mod buses;
mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// CLI-level failures that are not bridge errors
#[derive(Debug, Error)]
pub enum CommandError {
    /// `--buffer` named something not in the region table
    #[error("Unknown DRAM buffer '{name}' (known: {known})")]
    UnknownBuffer {
        /// Name given on the command line
        name: String,
        /// Comma-separated known names
        known: String,
    },
    /// `--region` named something not in the XDATA region table
    #[error("Unknown XDATA region '{name}' (known: {known})")]
    UnknownRegion {
        /// Name given on the command line
        name: String,
        /// Comma-separated known names
        known: String,
    },
    /// Neither a named region nor a start/len pair was given
    #[error("Give START LEN or a named region")]
    MissingRange,
    /// Search pattern has no bytes
    #[error("Search pattern is empty")]
    EmptyPattern,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    // Set log level based on verbosity
    match cli.verbose {
        0 => {} // default (info)
        1 => log::set_max_level(log::LevelFilter::Debug),
        _ => log::set_max_level(log::LevelFilter::Trace),
    }

    // Cleared by Ctrl-C; scans and watch stop at the next byte or sample
    let running = Arc::new(AtomicBool::new(true));
    {
        let running = Arc::clone(&running);
        ctrlc::set_handler(move || {
            running.store(false, Ordering::SeqCst);
        })?;
    }

    let Cli {
        bus,
        address,
        delay_us,
        command,
        ..
    } = cli;

    match command {
        Commands::ListBuses => {
            commands::list_buses();
            Ok(())
        }
        Commands::Probe => commands::run_probe(&bus, address, delay_us),
        Commands::Xdata(cmd) => buses::with_session(&bus, address, delay_us, |s| {
            commands::memory::run_xdata(s, cmd, &running)
        }),
        Commands::Dram(cmd) => buses::with_session(&bus, address, delay_us, |s| {
            commands::memory::run_dram(s, cmd, &running)
        }),
        Commands::Riu(cmd) => buses::with_session(&bus, address, delay_us, |s| {
            commands::memory::run_riu(s, cmd)
        }),
        Commands::Mcu(cmd) => buses::with_session(&bus, address, delay_us, |s| {
            commands::target::run_mcu(s, cmd)
        }),
        Commands::Mailbox(cmd) => buses::with_session(&bus, address, delay_us, |s| {
            commands::mailbox::run_mailbox(s, cmd, &running)
        }),
        Commands::Aeon(cmd) => buses::with_session(&bus, address, delay_us, |s| {
            commands::target::run_aeon(s, cmd)
        }),
        Commands::Watchdog(cmd) => buses::with_session(&bus, address, delay_us, |s| {
            commands::target::run_watchdog(s, cmd, &running)
        }),
        Commands::State {
            json,
            watch,
            interval_ms,
        } => buses::with_session(&bus, address, delay_us, |s| {
            if watch {
                commands::target::watch_state(s, interval_ms, &running)
            } else {
                commands::target::run_state(s, json)
            }
        }),
    }
}
