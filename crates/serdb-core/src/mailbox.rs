//! 8051 ↔ AEON mailbox RPC
//!
//! The mailbox is a fixed block of XDATA shared between the 8051 and the
//! AEON coprocessor. A command is posted by writing the command byte and
//! parameters, then ringing the doorbell (0xFF into all four sync bytes).
//! Completion is detected by polling the status register for READY, after
//! which the four response bytes are valid.
//!
//! ```text
//! 0x4401          command
//! 0x4402..0x4417  parameters (21 bytes)
//! 0x4417..0x441B  doorbell / sync
//! 0x40FB          status
//! 0x40FC..0x4100  response
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::error::{Error, Result};
use crate::space::XdataAccess;

/// Command register
pub const ADDR_CMD: u16 = 0x4401;
/// First parameter byte
pub const ADDR_PARAM: u16 = 0x4402;
/// First doorbell (sync) byte
pub const ADDR_SYNC: u16 = 0x4417;
/// Status register
pub const ADDR_STATUS: u16 = 0x40FB;
/// First response byte
pub const ADDR_RESP: u16 = 0x40FC;

/// Size of the parameter block
pub const MAX_PARAMS: usize = 21;
/// Size of the doorbell block
pub const SYNC_LEN: usize = 4;
/// Size of the response block
pub const RESP_LEN: usize = 4;

/// Value written to every doorbell byte
pub const DOORBELL: u8 = 0xFF;

/// Status poll interval while waiting for a reply
pub const POLL_INTERVAL: Duration = Duration::from_millis(10);
/// Default reply timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);

/// Status byte: command in progress
pub const STATUS_PROCESSING: u8 = 0x00;
/// Status byte: reply ready
pub const STATUS_READY: u8 = 0xFE;
/// Status byte: command complete
pub const STATUS_COMPLETE: u8 = 0x01;

/// Known mailbox commands
pub const KNOWN_COMMANDS: &[(u8, &str)] = &[
    (0x01, "MB_JPD_CMD_INIT"),
    (0x02, "MB_JPD_CMD_MJPG_START_DEC"),
    (0x03, "MB_JPD_CMD_ABORT"),
    (0x04, "MB_JPD_CMD_PAUSE"),
    (0x05, "MB_JPD_CMD_RESUME"),
    (0x06, "MB_JPD_CMD_IMAGE_DROP"),
    (0x10, "MB_BMP_CMD_DECODE_MEM_OUT"),
    (0x20, "MB_TIFF_CMD_GET_HEAD_INF"),
    (0x21, "MB_TIFF_CMD_START_DEC"),
    (0x22, "MB_TIFF_CMD_DECODE_MEM_OUT"),
];

/// Name of a known command
pub fn command_name(cmd: u8) -> Option<&'static str> {
    KNOWN_COMMANDS
        .iter()
        .find(|(c, _)| *c == cmd)
        .map(|(_, name)| *name)
}

/// Decoded status register
///
/// Interpretation is advisory. Unknown values are kept, not rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum MailboxStatus {
    /// 0x00
    Processing,
    /// 0xFE
    Ready,
    /// 0x01
    Complete,
    /// Anything else
    Unknown(u8),
}

impl MailboxStatus {
    /// Decode a status byte
    pub fn from_byte(value: u8) -> Self {
        match value {
            STATUS_PROCESSING => MailboxStatus::Processing,
            STATUS_READY => MailboxStatus::Ready,
            STATUS_COMPLETE => MailboxStatus::Complete,
            other => MailboxStatus::Unknown(other),
        }
    }

    /// Raw status byte
    pub fn as_byte(self) -> u8 {
        match self {
            MailboxStatus::Processing => STATUS_PROCESSING,
            MailboxStatus::Ready => STATUS_READY,
            MailboxStatus::Complete => STATUS_COMPLETE,
            MailboxStatus::Unknown(v) => v,
        }
    }
}

impl std::fmt::Display for MailboxStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MailboxStatus::Processing => write!(f, "Processing"),
            MailboxStatus::Ready => write!(f, "Ready"),
            MailboxStatus::Complete => write!(f, "Complete"),
            MailboxStatus::Unknown(v) => write!(f, "Unknown (0x{:02X})", v),
        }
    }
}

/// Outcome of [`Mailbox::send_command`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailboxReply {
    /// Status went READY; the response block
    Response([u8; RESP_LEN]),
    /// No READY within the timeout
    NoResponse,
    /// Posted without waiting
    Posted,
}

impl MailboxReply {
    /// Response bytes, if there are any
    pub fn response(&self) -> Option<[u8; RESP_LEN]> {
        match self {
            MailboxReply::Response(r) => Some(*r),
            _ => None,
        }
    }
}

/// Mailbox registers read in one go
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct MailboxSnapshot {
    /// Status register
    pub status: MailboxStatus,
    /// Command register
    pub command: u8,
    /// First doorbell byte
    pub sync: u8,
    /// First eight parameter bytes
    pub params: [u8; 8],
    /// Response block
    pub response: [u8; RESP_LEN],
}

/// What [`Mailbox::watch`] samples
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MailboxEvent {
    /// Status register
    pub status: MailboxStatus,
    /// Command register
    pub command: u8,
}

/// Mailbox client over any XDATA accessor
pub struct Mailbox<X: XdataAccess> {
    xdata: X,
    poll_interval: Duration,
}

impl<X: XdataAccess> Mailbox<X> {
    /// Create a mailbox client
    pub fn new(xdata: X) -> Self {
        Self {
            xdata,
            poll_interval: POLL_INTERVAL,
        }
    }

    /// Change the status poll interval
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Give back the XDATA accessor
    pub fn into_inner(self) -> X {
        self.xdata
    }

    /// Read the status register
    pub fn read_status(&mut self) -> Result<MailboxStatus> {
        Ok(MailboxStatus::from_byte(self.xdata.read_xdata(ADDR_STATUS)?))
    }

    /// Read the command register
    pub fn read_command(&mut self) -> Result<u8> {
        self.xdata.read_xdata(ADDR_CMD)
    }

    /// Read the first doorbell byte
    pub fn read_sync(&mut self) -> Result<u8> {
        self.xdata.read_xdata(ADDR_SYNC)
    }

    /// Read the first `N` parameter bytes
    pub fn read_params<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut params = [0u8; N];
        for (i, p) in params.iter_mut().take(MAX_PARAMS).enumerate() {
            *p = self.xdata.read_xdata(ADDR_PARAM + i as u16)?;
        }
        Ok(params)
    }

    /// Read the response block
    pub fn read_response(&mut self) -> Result<[u8; RESP_LEN]> {
        let mut resp = [0u8; RESP_LEN];
        for (i, r) in resp.iter_mut().enumerate() {
            *r = self.xdata.read_xdata(ADDR_RESP + i as u16)?;
        }
        Ok(resp)
    }

    /// True if the status register reads READY
    pub fn is_ready(&mut self) -> Result<bool> {
        Ok(self.read_status()? == MailboxStatus::Ready)
    }

    /// Poll until READY or `timeout` passes
    ///
    /// The status is read at least once. The deadline is only checked
    /// between polls; a read in flight is never interrupted.
    pub fn wait_ready(&mut self, timeout: Duration) -> Result<bool> {
        let start = Instant::now();
        loop {
            if self.is_ready()? {
                return Ok(true);
            }
            let elapsed = start.elapsed();
            if elapsed >= timeout {
                return Ok(false);
            }
            std::thread::sleep(self.poll_interval.min(timeout - elapsed));
        }
    }

    /// Post a command and optionally wait for the reply
    pub fn send_command(
        &mut self,
        cmd: u8,
        params: &[u8],
        wait: bool,
        timeout: Duration,
    ) -> Result<MailboxReply> {
        if params.len() > MAX_PARAMS {
            return Err(Error::TooManyParams {
                count: params.len(),
                max: MAX_PARAMS,
            });
        }

        log::debug!(
            "mailbox: command 0x{:02X} ({}) params {:02X?}",
            cmd,
            command_name(cmd).unwrap_or("unknown"),
            params
        );

        self.xdata.write_xdata(ADDR_CMD, cmd)?;
        for (i, &p) in params.iter().enumerate() {
            self.xdata.write_xdata(ADDR_PARAM + i as u16, p)?;
        }
        for i in 0..SYNC_LEN {
            self.xdata.write_xdata(ADDR_SYNC + i as u16, DOORBELL)?;
        }

        if !wait {
            return Ok(MailboxReply::Posted);
        }

        if !self.wait_ready(timeout)? {
            log::warn!(
                "mailbox: no reply to 0x{:02X} within {:?}",
                cmd,
                timeout
            );
            return Ok(MailboxReply::NoResponse);
        }

        let response = self.read_response()?;
        log::debug!("mailbox: response {:02X?}", response);
        Ok(MailboxReply::Response(response))
    }

    /// Read status, command, sync, params and response
    pub fn snapshot(&mut self) -> Result<MailboxSnapshot> {
        Ok(MailboxSnapshot {
            status: self.read_status()?,
            command: self.read_command()?,
            sync: self.read_sync()?,
            params: self.read_params::<8>()?,
            response: self.read_response()?,
        })
    }

    /// Sample status and command every `interval` until `running` clears
    ///
    /// `on_change` is called for the first sample and then only when either
    /// value changes.
    pub fn watch(
        &mut self,
        interval: Duration,
        running: &AtomicBool,
        mut on_change: impl FnMut(&MailboxEvent),
    ) -> Result<()> {
        let mut last: Option<MailboxEvent> = None;
        while running.load(Ordering::SeqCst) {
            let event = MailboxEvent {
                status: self.read_status()?,
                command: self.read_command()?,
            };
            if last != Some(event) {
                on_change(&event);
                last = Some(event);
            }
            std::thread::sleep(interval);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    /// XDATA map whose status register goes READY after `ready_after` reads
    struct ScriptedXdata {
        mem: HashMap<u16, u8>,
        writes: Vec<(u16, u8)>,
        status_reads: usize,
        ready_after: Option<usize>,
    }

    impl ScriptedXdata {
        fn new(ready_after: Option<usize>) -> Self {
            Self {
                mem: HashMap::new(),
                writes: Vec::new(),
                status_reads: 0,
                ready_after,
            }
        }
    }

    impl XdataAccess for ScriptedXdata {
        fn read_xdata(&mut self, addr: u16) -> Result<u8> {
            if addr == ADDR_STATUS {
                self.status_reads += 1;
                return Ok(match self.ready_after {
                    Some(n) if self.status_reads > n => STATUS_READY,
                    _ => STATUS_PROCESSING,
                });
            }
            Ok(self.mem.get(&addr).copied().unwrap_or(0))
        }

        fn write_xdata(&mut self, addr: u16, value: u8) -> Result<()> {
            self.writes.push((addr, value));
            self.mem.insert(addr, value);
            Ok(())
        }
    }

    #[test]
    fn test_status_decoding() {
        assert_eq!(MailboxStatus::from_byte(0x00), MailboxStatus::Processing);
        assert_eq!(MailboxStatus::from_byte(0xFE), MailboxStatus::Ready);
        assert_eq!(MailboxStatus::from_byte(0x01), MailboxStatus::Complete);
        assert_eq!(MailboxStatus::from_byte(0x42), MailboxStatus::Unknown(0x42));
        assert_eq!(MailboxStatus::Unknown(0x42).as_byte(), 0x42);
        assert_eq!(MailboxStatus::Unknown(0x42).to_string(), "Unknown (0x42)");
    }

    #[test]
    fn test_command_names() {
        assert_eq!(command_name(0x10), Some("MB_BMP_CMD_DECODE_MEM_OUT"));
        assert_eq!(command_name(0x99), None);
    }

    #[test]
    fn test_post_layout() {
        let mut mb = Mailbox::new(ScriptedXdata::new(None));
        let reply = mb
            .send_command(0x10, &[0x00, 0x00, 0x10, 0x00], false, DEFAULT_TIMEOUT)
            .unwrap();
        assert_eq!(reply, MailboxReply::Posted);

        let xdata = mb.into_inner();
        assert_eq!(
            xdata.writes,
            vec![
                (0x4401, 0x10),
                (0x4402, 0x00),
                (0x4403, 0x00),
                (0x4404, 0x10),
                (0x4405, 0x00),
                (0x4417, 0xFF),
                (0x4418, 0xFF),
                (0x4419, 0xFF),
                (0x441A, 0xFF),
            ]
        );
        // Fire-and-forget never looks at the status register
        assert_eq!(xdata.status_reads, 0);
    }

    #[test]
    fn test_too_many_params() {
        let mut mb = Mailbox::new(ScriptedXdata::new(None));
        let params = [0u8; MAX_PARAMS + 1];
        assert!(matches!(
            mb.send_command(0x01, &params, false, DEFAULT_TIMEOUT),
            Err(Error::TooManyParams { count: 22, max: 21 })
        ));
        assert!(mb.into_inner().writes.is_empty());
    }

    #[test]
    fn test_reply_after_polls() {
        let mut xdata = ScriptedXdata::new(Some(3));
        xdata.mem.insert(ADDR_RESP, 0xDE);
        xdata.mem.insert(ADDR_RESP + 1, 0xAD);
        xdata.mem.insert(ADDR_RESP + 2, 0xBE);
        xdata.mem.insert(ADDR_RESP + 3, 0xEF);

        let mut mb = Mailbox::new(xdata).with_poll_interval(Duration::from_millis(1));
        let reply = mb
            .send_command(0x01, &[], true, Duration::from_secs(1))
            .unwrap();
        assert_eq!(reply, MailboxReply::Response([0xDE, 0xAD, 0xBE, 0xEF]));
        assert_eq!(mb.into_inner().status_reads, 4);
    }

    #[test]
    fn test_all_zero_response_is_not_timeout() {
        let mut mb = Mailbox::new(ScriptedXdata::new(Some(0)))
            .with_poll_interval(Duration::from_millis(1));
        let reply = mb
            .send_command(0x01, &[], true, Duration::from_millis(50))
            .unwrap();
        assert_eq!(reply, MailboxReply::Response([0, 0, 0, 0]));
        assert_ne!(reply, MailboxReply::NoResponse);
    }

    #[test]
    fn test_timeout() {
        let poll = Duration::from_millis(5);
        let timeout = Duration::from_millis(40);
        let mut mb = Mailbox::new(ScriptedXdata::new(None)).with_poll_interval(poll);

        let start = Instant::now();
        let reply = mb.send_command(0x02, &[1, 2], true, timeout).unwrap();
        let elapsed = start.elapsed();

        assert_eq!(reply, MailboxReply::NoResponse);
        assert!(elapsed >= timeout);
        assert!(elapsed < timeout + poll + Duration::from_millis(50));
    }

    #[test]
    fn test_watch_reports_changes_only() {
        let mut mb = Mailbox::new(ScriptedXdata::new(Some(2)));
        let running = AtomicBool::new(true);
        let mut events = Vec::new();
        mb.watch(Duration::ZERO, &running, |ev| {
            events.push(*ev);
            if ev.status == MailboxStatus::Ready {
                running.store(false, Ordering::SeqCst);
            }
        })
        .unwrap();

        // Two PROCESSING samples collapse into one event
        assert_eq!(
            events,
            vec![
                MailboxEvent {
                    status: MailboxStatus::Processing,
                    command: 0
                },
                MailboxEvent {
                    status: MailboxStatus::Ready,
                    command: 0
                },
            ]
        );
        assert_eq!(mb.into_inner().status_reads, 3);
    }

    #[test]
    fn test_snapshot() {
        let mut xdata = ScriptedXdata::new(Some(0));
        xdata.mem.insert(ADDR_CMD, 0x21);
        xdata.mem.insert(ADDR_SYNC, 0xFF);
        xdata.mem.insert(ADDR_PARAM + 7, 0x77);
        xdata.mem.insert(ADDR_RESP + 3, 0x01);

        let snap = Mailbox::new(xdata).snapshot().unwrap();
        assert_eq!(snap.status, MailboxStatus::Ready);
        assert_eq!(snap.command, 0x21);
        assert_eq!(snap.sync, 0xFF);
        assert_eq!(snap.params[7], 0x77);
        assert_eq!(snap.response, [0, 0, 0, 0x01]);
    }
}
