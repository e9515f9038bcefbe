//! MCU, AEON, watchdog and state commands

use super::mailbox::print_snapshot;
use crate::buses::CliSession;
use crate::cli::{AeonCommands, McuCommands, WatchdogCommands};
use serdb_core::target::{
    self, Aeon, AeonCtrl, StateSnapshot, Watchdog, WatchdogStatus, WDT_THRESHOLD,
};
use std::io::Write;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

/// Run an `mcu` subcommand
pub fn run_mcu(session: &mut CliSession, cmd: McuCommands) -> Result<(), Box<dyn std::error::Error>> {
    match cmd {
        McuCommands::Stop => {
            session.stop_mcu()?;
            println!("8051 stopped");
        }
        McuCommands::Resume => {
            session.resume_mcu()?;
            println!("8051 running");
        }
    }
    Ok(())
}

fn print_aeon(ctrl: AeonCtrl) {
    println!("AEON control: 0x{:02X} ({:?})", ctrl.bits(), ctrl);
    println!("  State: {}", ctrl.state());
}

/// Report whether a control write took effect
fn report(action: &str, ok: bool) {
    if ok {
        println!("AEON {}", action);
    } else {
        log::warn!("AEON did not read back as {}", action);
        println!("AEON {} (not confirmed by readback)", action);
    }
}

/// Run an `aeon` subcommand
pub fn run_aeon(session: &mut CliSession, cmd: AeonCommands) -> Result<(), Box<dyn std::error::Error>> {
    let mut aeon = Aeon::new(session);

    match cmd {
        AeonCommands::Status => {}
        AeonCommands::Halt => {
            let ok = aeon.halt()?;
            report("halted", ok);
        }
        AeonCommands::Resume => {
            let ok = aeon.resume()?;
            report("running", ok);
        }
        AeonCommands::Enable => {
            aeon.enable()?;
            println!("AEON enabled, not running");
        }
        AeonCommands::Disable => {
            aeon.disable()?;
            println!("AEON disabled");
        }
        AeonCommands::Reset { delay_ms } => {
            let ok = aeon.reset(Duration::from_millis(delay_ms))?;
            report("reset and running", ok);
        }
    }

    print_aeon(aeon.read_ctrl()?);
    Ok(())
}

fn print_watchdog(status: &WatchdogStatus) {
    println!("Watchdog:");
    println!(
        "  State:   0x{:02X} ({})",
        status.state,
        if status.enabled { "enabled" } else { "disabled" }
    );
    println!("  Counter: 0x{:04X}", status.counter);
    if status.near_reset() {
        println!(
            "  Counter is past 0x{:04X}, a reset is imminent",
            WDT_THRESHOLD
        );
    }
}

/// Run a `watchdog` subcommand
pub fn run_watchdog(
    session: &mut CliSession,
    cmd: WatchdogCommands,
    running: &AtomicBool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut wdt = Watchdog::new(session);

    match cmd {
        WatchdogCommands::Status => {}
        WatchdogCommands::Enable => {
            if !wdt.enable()? {
                log::warn!("Watchdog enable bit did not stick");
            }
        }
        WatchdogCommands::Disable => {
            if !wdt.disable()? {
                log::warn!("Watchdog enable bit did not clear");
            }
        }
        WatchdogCommands::Feed { value } => {
            wdt.feed(value)?;
            println!("Counter set to 0x{:04X}", value);
        }
        WatchdogCommands::Watch { interval_ms } => {
            println!("Watching watchdog counter (Ctrl-C to stop)...");
            wdt.watch(Duration::from_millis(interval_ms), running, |status| {
                print!(
                    "\rEnabled: {:<3}  Counter: 0x{:04X} ({:5})",
                    if status.enabled { "ON" } else { "OFF" },
                    status.counter,
                    status.counter
                );
                let _ = std::io::stdout().flush();
            })?;
            println!();
            println!("Stopped.");
            return Ok(());
        }
    }

    print_watchdog(&wdt.status()?);
    Ok(())
}

/// Run the `state` command
pub fn run_state(session: &mut CliSession, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let snap = StateSnapshot::capture(session)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&snap)?);
        return Ok(());
    }

    print_state(&snap);
    Ok(())
}

fn print_state(snap: &StateSnapshot) {
    print_aeon(AeonCtrl::from_bits_retain(snap.aeon_ctrl));
    print_watchdog(&snap.watchdog);
    print_snapshot(&snap.mailbox);

    let st = &snap.state;
    println!("State variables:");
    println!("  Primary:   0x{:02X}{:02X}", st.primary[0], st.primary[1]);
    println!("  Secondary: 0x{:02X}", st.secondary);
    println!("  Decode:    0x{:02X}", st.decode);
    println!("  Storage:   0x{:02X}", st.storage);

    let gwin = &snap.gwin;
    println!("GWin display:");
    println!("  Primary:   0x{:02X}", gwin.primary);
    println!("  Secondary: 0x{:02X}", gwin.secondary);
    println!("  Enable:    0x{:02X}", gwin.enable);
}

/// Run `state --watch`
pub fn watch_state(
    session: &mut CliSession,
    interval_ms: u64,
    running: &AtomicBool,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("Watching state (Ctrl-C to stop)...");
    target::watch_state(
        session,
        Duration::from_millis(interval_ms),
        running,
        |snap, changes| {
            // Clear the screen and home the cursor
            print!("\x1b[2J\x1b[H");
            print_state(snap);
            if !changes.is_empty() {
                println!("Changes:");
                for c in changes {
                    println!("  {}: 0x{:X} -> 0x{:X}", c.field, c.old, c.new);
                }
            }
        },
    )?;
    println!("Stopped.");
    Ok(())
}
