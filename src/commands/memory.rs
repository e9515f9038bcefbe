//! XDATA, DRAM and RIU commands

use super::{byte_progress, emit_bytes, finish_scan};
use crate::buses::CliSession;
use crate::cli::{DramCommands, RiuCommands, XdataCommands};
use crate::CommandError;
use serdb_core::target::{
    dram_region, read_key_variables, xdata_region, DRAM_REGIONS, XDATA_REGIONS,
};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

/// Differences printed before the list is cut short
const DIFF_PRINT_LIMIT: usize = 32;

/// Run an `xdata` subcommand
pub fn run_xdata(
    session: &mut CliSession,
    cmd: XdataCommands,
    running: &AtomicBool,
) -> Result<(), Box<dyn std::error::Error>> {
    match cmd {
        XdataCommands::Read { addr } => {
            let value = session.read_xdata(addr)?;
            println!("XDATA[0x{:04X}] = 0x{:02X}", addr, value);
        }
        XdataCommands::Write { addr, value } => {
            session.write_xdata(addr, value)?;
            println!("XDATA[0x{:04X}] <- 0x{:02X}", addr, value);
        }
        XdataCommands::Dump {
            start,
            len,
            region,
            full,
            output,
        } => {
            let (start, len) = xdata_range(start, len, region.as_deref(), full)?;
            dump_xdata_range(session, start, len, output.output.as_deref(), running)?;
        }
        XdataCommands::Regions { output_dir } => {
            if let Some(dir) = &output_dir {
                std::fs::create_dir_all(dir)?;
            }
            for region in XDATA_REGIONS {
                if !running.load(Ordering::SeqCst) {
                    break;
                }
                println!("{}", "=".repeat(60));
                println!("Region: {} - {}", region.name, region.description);
                println!("{}", "=".repeat(60));
                let path = output_dir
                    .as_ref()
                    .map(|dir| dir.join(format!("xdata_{}_{:04X}.bin", region.name, region.start)));
                dump_xdata_range(
                    session,
                    region.start,
                    region.len as usize,
                    path.as_deref(),
                    running,
                )?;
            }
        }
        XdataCommands::Vars => {
            let vars = read_key_variables(&mut *session)?;
            println!("{:<10} {:<25} {:<10} {:<10}", "Address", "Name", "Value", "Binary");
            println!("{}", "-".repeat(60));
            for (addr, name, value) in vars {
                println!(
                    "0x{:04X}     {:<25} 0x{:02X}       {:08b}",
                    addr, name, value, value
                );
            }
        }
    }
    Ok(())
}

fn dump_xdata_range(
    session: &mut CliSession,
    start: u16,
    len: usize,
    output: Option<&Path>,
    running: &AtomicBool,
) -> Result<(), Box<dyn std::error::Error>> {
    let pb = byte_progress(len, "XDATA")?;
    let outcome = session.dump_xdata(start, len, running, |n| pb.set_position(n as u64))?;
    let data = finish_scan(pb, outcome);
    emit_bytes(&data, start as u32, output)
}

/// Resolve `--region NAME`, `--full` or an explicit start/len pair
fn xdata_range(
    start: Option<u16>,
    len: Option<u32>,
    region: Option<&str>,
    full: bool,
) -> Result<(u16, usize), CommandError> {
    if let Some(name) = region {
        let region = xdata_region(name).ok_or_else(|| CommandError::UnknownRegion {
            name: name.to_string(),
            known: XDATA_REGIONS
                .iter()
                .map(|r| r.name)
                .collect::<Vec<_>>()
                .join(", "),
        })?;
        return Ok((region.start, region.len as usize));
    }
    if full {
        return Ok((0x0000, 0x1_0000));
    }
    match (start, len) {
        (Some(start), Some(len)) => Ok((start, len as usize)),
        _ => Err(CommandError::MissingRange),
    }
}

/// Resolve `--buffer NAME [--limit N]` or an explicit start/len pair
fn dump_range(
    start: Option<u32>,
    len: Option<u32>,
    buffer: Option<&str>,
    limit: Option<u32>,
) -> Result<(u32, u32), CommandError> {
    if let Some(name) = buffer {
        let region = dram_region(name).ok_or_else(|| CommandError::UnknownBuffer {
            name: name.to_string(),
            known: DRAM_REGIONS
                .iter()
                .map(|r| r.name)
                .collect::<Vec<_>>()
                .join(", "),
        })?;
        let len = limit.map_or(region.len, |l| l.min(region.len));
        log::info!(
            "{} ({}): 0x{:06X}, {} bytes",
            region.name,
            region.description,
            region.start,
            len
        );
        return Ok((region.start, len));
    }

    match (start, len) {
        (Some(start), Some(len)) => Ok((start, len)),
        _ => Err(CommandError::MissingRange),
    }
}

/// Run a `dram` subcommand
pub fn run_dram(
    session: &mut CliSession,
    cmd: DramCommands,
    running: &AtomicBool,
) -> Result<(), Box<dyn std::error::Error>> {
    match cmd {
        DramCommands::Read { addr } => {
            let value = session.read_dram(addr)?;
            println!("DRAM[0x{:06X}] = 0x{:02X}", addr, value);
        }
        DramCommands::Write { addr, value } => {
            session.write_dram(addr, value)?;
            println!("DRAM[0x{:06X}] <- 0x{:02X}", addr, value);
        }
        DramCommands::Dump {
            start,
            len,
            buffer,
            limit,
            output,
        } => {
            let (start, len) = dump_range(start, len, buffer.as_deref(), limit)?;
            let len = len as usize;
            let pb = byte_progress(len, "DRAM")?;
            let outcome = session.dump_dram(start, len, running, |n| pb.set_position(n as u64))?;
            let data = finish_scan(pb, outcome);
            emit_bytes(&data, start, output.output.as_deref())?;
        }
        DramCommands::Search {
            pattern,
            start,
            end,
        } => {
            if pattern.is_empty() {
                return Err(CommandError::EmptyPattern.into());
            }
            println!(
                "Searching 0x{:06X}..0x{:06X} for {:02X?}",
                start, end, pattern
            );
            let pb = byte_progress(end.saturating_sub(start) as usize, "Searching")?;
            let outcome = session.search_dram(start, end, &pattern, running, |n| {
                pb.set_position(n as u64)
            })?;
            let matches = finish_scan(pb, outcome);
            if matches.is_empty() {
                println!("Pattern not found");
            } else {
                println!("Found {} match(es):", matches.len());
                for addr in matches {
                    println!("  0x{:06X}", addr);
                }
            }
        }
        DramCommands::Compare { first, second, len } => {
            let pb = byte_progress(len as usize, "Comparing")?;
            let outcome = session.compare_dram(first, second, len as usize, running, |n| {
                pb.set_position(n as u64)
            })?;
            let diffs = finish_scan(pb, outcome);
            if diffs.is_empty() {
                println!("Regions are identical");
            } else {
                println!("{} byte(s) differ:", diffs.len());
                for d in diffs.iter().take(DIFF_PRINT_LIMIT) {
                    println!(
                        "  +0x{:06X}: 0x{:02X} (0x{:06X}) != 0x{:02X} (0x{:06X})",
                        d.offset,
                        d.first,
                        first + d.offset,
                        d.second,
                        second + d.offset
                    );
                }
                if diffs.len() > DIFF_PRINT_LIMIT {
                    println!("  ... and {} more", diffs.len() - DIFF_PRINT_LIMIT);
                }
            }
        }
    }
    Ok(())
}

/// Run a `riu` subcommand
pub fn run_riu(session: &mut CliSession, cmd: RiuCommands) -> Result<(), Box<dyn std::error::Error>> {
    match cmd {
        RiuCommands::Read { bank, offset, pm } => {
            let value = session.read_riu(bank, offset, pm)?;
            println!(
                "{}RIU[0x{:02X}:0x{:02X}] = 0x{:04X}",
                if pm { "PM_" } else { "" },
                bank,
                offset,
                value
            );
        }
        RiuCommands::Write {
            bank,
            offset,
            value,
            pm,
        } => {
            session.write_riu(bank, offset, value, pm)?;
            println!(
                "{}RIU[0x{:02X}:0x{:02X}] <- 0x{:04X}",
                if pm { "PM_" } else { "" },
                bank,
                offset,
                value
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_named_buffer_range() {
        assert_eq!(
            dump_range(None, None, Some("main"), None).unwrap(),
            (0x100000, 0x80000)
        );
        assert_eq!(
            dump_range(None, None, Some("OUTPUT"), Some(0x100)).unwrap(),
            (0x150000, 0x100)
        );
        // A limit past the buffer end is clamped
        assert_eq!(
            dump_range(None, None, Some("secondary"), Some(0x100000)).unwrap(),
            (0x0C0000, 0x40000)
        );
    }

    #[test]
    fn test_xdata_range() {
        assert_eq!(xdata_range(None, None, Some("mailbox"), false).unwrap(), (0x4000, 0x500));
        assert_eq!(xdata_range(None, None, None, true).unwrap(), (0x0000, 0x10000));
        assert_eq!(xdata_range(Some(0x40FB), Some(5), None, false).unwrap(), (0x40FB, 5));
        assert!(matches!(
            xdata_range(None, None, Some("stack"), false),
            Err(CommandError::UnknownRegion { .. })
        ));
        assert!(matches!(
            xdata_range(Some(0x4000), None, None, false),
            Err(CommandError::MissingRange)
        ));
    }

    #[test]
    fn test_explicit_range() {
        assert_eq!(
            dump_range(Some(0x1000), Some(16), None, None).unwrap(),
            (0x1000, 16)
        );
        assert!(matches!(
            dump_range(Some(0x1000), None, None, None),
            Err(CommandError::MissingRange)
        ));
        assert!(matches!(
            dump_range(None, None, Some("scratch"), None),
            Err(CommandError::UnknownBuffer { .. })
        ));
    }
}
