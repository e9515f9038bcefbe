//! Mailbox commands

use crate::buses::CliSession;
use crate::cli::MailboxCommands;
use serdb_core::mailbox::{command_name, Mailbox, MailboxReply, MailboxSnapshot};
use std::sync::atomic::AtomicBool;
use std::time::Duration;

fn describe_command(cmd: u8) -> String {
    match command_name(cmd) {
        Some(name) => format!("0x{:02X} ({})", cmd, name),
        None => format!("0x{:02X}", cmd),
    }
}

/// Print a mailbox snapshot
pub fn print_snapshot(snap: &MailboxSnapshot) {
    println!("Mailbox:");
    println!(
        "  Status:   0x{:02X} {}",
        snap.status.as_byte(),
        snap.status
    );
    println!("  Command:  {}", describe_command(snap.command));
    println!("  Sync:     0x{:02X}", snap.sync);
    println!("  Params:   {:02X?}", snap.params);
    println!("  Response: {:02X?}", snap.response);
}

/// Run a `mailbox` subcommand
pub fn run_mailbox(
    session: &mut CliSession,
    cmd: MailboxCommands,
    running: &AtomicBool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut mailbox = Mailbox::new(session);

    match cmd {
        MailboxCommands::Status => {
            let snap = mailbox.snapshot()?;
            print_snapshot(&snap);
        }
        MailboxCommands::Send {
            cmd,
            params,
            no_wait,
            timeout_ms,
        } => {
            println!(
                "Sending {} with {} param(s) {:02X?}",
                describe_command(cmd),
                params.len(),
                params
            );
            let reply = mailbox.send_command(
                cmd,
                &params,
                !no_wait,
                Duration::from_millis(timeout_ms),
            )?;
            match reply {
                MailboxReply::Response(resp) => println!("Response: {:02X?}", resp),
                MailboxReply::NoResponse => {
                    println!("No response within {} ms", timeout_ms);
                    let snap = mailbox.snapshot()?;
                    print_snapshot(&snap);
                }
                MailboxReply::Posted => println!("Posted"),
            }
        }
        MailboxCommands::Watch { interval_ms } => {
            println!("Watching mailbox every {} ms, Ctrl-C to stop", interval_ms);
            mailbox.watch(Duration::from_millis(interval_ms), running, |event| {
                println!(
                    "status=0x{:02X} ({}) cmd={}",
                    event.status.as_byte(),
                    event.status,
                    describe_command(event.command)
                );
            })?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_command() {
        assert_eq!(describe_command(0x10), "0x10 (MB_BMP_CMD_DECODE_MEM_OUT)");
        assert_eq!(describe_command(0xEE), "0xEE");
    }
}
