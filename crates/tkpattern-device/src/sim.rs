//! In-process simulation of a device running the pattern app.
//!
//! [`SimulatedDevice`] mirrors the app's state machine closely enough that
//! every host operation can be exercised without hardware. It can also start
//! in firmware mode and accept an app load, after which it behaves as the
//! pattern app. [`SimLink`] wraps it as a `Read + Write` channel.

use std::collections::VecDeque;
use std::io::{self, ErrorKind, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use bytes::{Buf, BytesMut};
use tkpattern_codec::{decode, PatternStep, PACKED_STEP_SIZE};
use tkpattern_frame::{
    decode_frame, Cmd, CmdLen, Endpoint, Frame, FrameHeader, STATUS_BAD, STATUS_OK,
};
use tkpattern_transport::ReadTimeout;
use tracing::{debug, trace, warn};

use crate::commands::{AppCmd, FwCmd, RSP_UNKNOWN_CMD};
use crate::firmware::{digest, DIGEST_SIZE, MAX_APP_SIZE};
use crate::identity::{NameVersion, APP_NAME0, APP_NAME1, FW_NAME0, FW_NAME1};

/// Steps the app's pattern buffer holds.
pub const PATTERN_CAPACITY: usize = 128;

/// Version the simulated pattern app reports.
pub const APP_VERSION: u32 = 2;

/// Version the simulated firmware reports.
pub const FW_VERSION: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Transfer {
    Idle,
    /// SetPattern in progress; bytes stored so far.
    Upload(usize),
    /// GetPattern in progress; bytes returned so far.
    Download(usize),
}

#[derive(Debug, Default)]
struct Loader {
    size: usize,
    binary: Vec<u8>,
}

/// A simulated device.
#[derive(Debug)]
pub struct SimulatedDevice {
    /// `Some` while waiting in firmware mode.
    loader: Option<Option<Loader>>,
    steps: u8,
    pattern: [u8; PATTERN_CAPACITY * PACKED_STEP_SIZE],
    transfer: Transfer,
    executed: Vec<PatternStep>,
    executions: usize,
    requests: Vec<AppCmd>,
    fail_at: Option<(AppCmd, usize)>,
    inbox: BytesMut,
}

impl Default for SimulatedDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedDevice {
    /// A device already running the pattern app.
    pub fn new() -> Self {
        Self {
            loader: None,
            steps: 0,
            pattern: [0; PATTERN_CAPACITY * PACKED_STEP_SIZE],
            transfer: Transfer::Idle,
            executed: Vec::new(),
            executions: 0,
            requests: Vec::new(),
            fail_at: None,
            inbox: BytesMut::new(),
        }
    }

    /// A freshly plugged-in device waiting in firmware mode for an app.
    pub fn firmware_mode() -> Self {
        Self {
            loader: Some(None),
            ..Self::new()
        }
    }

    pub fn in_firmware_mode(&self) -> bool {
        self.loader.is_some()
    }

    /// Steps played by the most recent Execute.
    pub fn executed(&self) -> &[PatternStep] {
        &self.executed
    }

    pub fn executions(&self) -> usize {
        self.executions
    }

    /// App requests handled so far, in order.
    pub fn requests(&self) -> &[AppCmd] {
        &self.requests
    }

    pub fn request_count(&self, cmd: AppCmd) -> usize {
        self.requests.iter().filter(|&&c| c == cmd).count()
    }

    /// Answer the next `cmd` request with status BAD.
    pub fn fail_next(&mut self, cmd: AppCmd) {
        self.fail_after(cmd, 0);
    }

    /// Let `skip` more `cmd` requests through, then answer the following one
    /// with status BAD. The failed request also ends any transfer in progress.
    pub fn fail_after(&mut self, cmd: AppCmd, skip: usize) {
        self.fail_at = Some((cmd, skip));
    }

    /// Feed raw bytes from the host; returns the wire bytes of any replies.
    ///
    /// Partial frames are kept until the rest arrives. A byte that is not a
    /// valid header is dropped, as the device does.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<u8> {
        self.inbox.extend_from_slice(bytes);
        let mut out = Vec::new();
        loop {
            match decode_frame(&mut self.inbox) {
                Ok(Some(frame)) => {
                    if let Some(reply) = self.handle(&frame) {
                        out.extend_from_slice(&reply.to_bytes());
                    }
                }
                Ok(None) => break,
                Err(err) => {
                    trace!(error = %err, "dropping byte");
                    self.inbox.advance(1);
                }
            }
        }
        out
    }

    /// Process one request frame. `None` means the device stays silent.
    pub fn handle(&mut self, frame: &Frame) -> Option<Frame> {
        if self.loader.is_some() {
            return self.handle_firmware(frame);
        }

        let header = frame.header();
        match header.endpoint {
            Endpoint::Firmware => return not_ok(header),
            Endpoint::App => {}
            other => {
                debug!(endpoint = %other, "ignoring frame not meant for the app");
                return None;
            }
        }

        let Some(cmd) = AppCmd::request_from_code(frame.code()) else {
            return reply(header.tag, &UnknownCmd, &[]);
        };

        match (self.transfer, cmd) {
            (Transfer::Upload(_), AppCmd::SetPattern) | (Transfer::Download(_), AppCmd::GetPattern) => {}
            (Transfer::Idle, _) => {}
            (state, _) => {
                debug!(cmd = cmd.name(), ?state, "request during transfer");
                return not_ok(header);
            }
        }

        self.requests.push(cmd);
        match self.fail_at {
            Some((target, 0)) if target == cmd => {
                self.fail_at = None;
                self.transfer = Transfer::Idle;
                return status_reply(header.tag, cmd, STATUS_BAD);
            }
            Some((target, skip)) if target == cmd => self.fail_at = Some((target, skip - 1)),
            _ => {}
        }

        match cmd {
            AppCmd::GetNameVersion => {
                let mut data = [0u8; NameVersion::PACKED_SIZE];
                if header.cmd_len == CmdLen::Len1 {
                    data = NameVersion::new(APP_NAME0, APP_NAME1, APP_VERSION).pack();
                }
                reply(header.tag, &AppCmd::RspGetNameVersion, &data)
            }
            AppCmd::SetPattern => self.set_pattern(header.tag, frame.payload()),
            AppCmd::Execute => {
                let len = usize::from(self.steps) * PACKED_STEP_SIZE;
                self.executed = decode(&self.pattern[..len]).unwrap_or_default();
                self.executions += 1;
                debug!(steps = self.steps, "executing pattern");
                status_reply(header.tag, cmd, STATUS_OK)
            }
            AppCmd::GetPattern => self.get_pattern(header.tag),
            _ => reply(header.tag, &UnknownCmd, &[]),
        }
    }

    fn set_pattern(&mut self, tag: u8, payload: &[u8]) -> Option<Frame> {
        let (done, data) = match self.transfer {
            Transfer::Upload(done) => (done, payload),
            _ => {
                self.steps = payload.first().copied().unwrap_or_default();
                (0, payload.get(1..).unwrap_or_default())
            }
        };
        if usize::from(self.steps) > PATTERN_CAPACITY {
            warn!(steps = self.steps, "pattern too long");
            self.steps = 0;
            self.transfer = Transfer::Idle;
            return status_reply(tag, AppCmd::SetPattern, STATUS_BAD);
        }

        let total = usize::from(self.steps) * PACKED_STEP_SIZE;
        let n = (total - done).min(data.len());
        self.pattern[done..done + n].copy_from_slice(&data[..n]);
        let done = done + n;
        self.transfer = if done == total {
            debug!(steps = self.steps, "pattern stored");
            Transfer::Idle
        } else {
            Transfer::Upload(done)
        };
        status_reply(tag, AppCmd::SetPattern, STATUS_OK)
    }

    fn get_pattern(&mut self, tag: u8) -> Option<Frame> {
        if self.steps == 0 {
            return status_reply(tag, AppCmd::GetPattern, STATUS_BAD);
        }

        let total = usize::from(self.steps) * PACKED_STEP_SIZE;
        let room = AppCmd::RspGetPattern.cmd_len().bytelen() - 2;
        let mut data = vec![STATUS_OK];
        let done = match self.transfer {
            Transfer::Download(done) => done,
            _ => {
                data.push(self.steps);
                0
            }
        };
        let n = (total - done).min(room + 1 - data.len());
        data.extend_from_slice(&self.pattern[done..done + n]);

        let done = done + n;
        self.transfer = if done == total {
            Transfer::Idle
        } else {
            Transfer::Download(done)
        };
        reply(tag, &AppCmd::RspGetPattern, &data)
    }

    fn handle_firmware(&mut self, frame: &Frame) -> Option<Frame> {
        let header = frame.header();
        if header.endpoint != Endpoint::Firmware {
            trace!(endpoint = %header.endpoint, "firmware ignores frame");
            return None;
        }
        let Some(cmd) = FwCmd::request_from_code(frame.code()) else {
            return not_ok(header);
        };
        let tag = header.tag;
        let payload = frame.payload();

        match cmd {
            FwCmd::GetNameVersion => {
                let nv = NameVersion::new(FW_NAME0, FW_NAME1, FW_VERSION).pack();
                reply(tag, &FwCmd::RspGetNameVersion, &nv)
            }
            FwCmd::LoadApp => {
                let &[a, b, c, d, uss, ..] = payload else {
                    return reply(tag, &FwCmd::RspLoadApp, &[STATUS_BAD]);
                };
                let size = u32::from_le_bytes([a, b, c, d]) as usize;
                if size == 0 || size > MAX_APP_SIZE {
                    return reply(tag, &FwCmd::RspLoadApp, &[STATUS_BAD]);
                }
                debug!(size, uss = uss != 0, "firmware accepting app");
                self.loader = Some(Some(Loader {
                    size,
                    binary: Vec::with_capacity(size),
                }));
                reply(tag, &FwCmd::RspLoadApp, &[STATUS_OK])
            }
            FwCmd::LoadAppData => {
                let Some(Some(loader)) = self.loader.as_mut() else {
                    return reply(tag, &FwCmd::RspLoadAppData, &[STATUS_BAD]);
                };
                let n = (loader.size - loader.binary.len()).min(payload.len());
                loader.binary.extend_from_slice(&payload[..n]);
                if loader.binary.len() < loader.size {
                    return reply(tag, &FwCmd::RspLoadAppData, &[STATUS_OK]);
                }

                let hash = digest(&loader.binary);
                let mut data = Vec::with_capacity(1 + DIGEST_SIZE);
                data.push(STATUS_OK);
                data.extend_from_slice(&hash);
                debug!(size = loader.size, "app loaded, starting it");
                self.loader = None;
                reply(tag, &FwCmd::RspLoadAppDataReady, &data)
            }
            _ => not_ok(header),
        }
    }

    /// Serve one host connection until it closes or `running` is cleared.
    ///
    /// Read timeouts on `stream` are treated as idle ticks so the flag is
    /// checked regularly.
    pub fn serve<T: Read + Write>(&mut self, stream: &mut T, running: &AtomicBool) -> io::Result<()> {
        let mut buf = [0u8; 256];
        while running.load(Ordering::SeqCst) {
            let n = match stream.read(&mut buf) {
                Ok(0) => return Ok(()),
                Ok(n) => n,
                Err(err)
                    if matches!(
                        err.kind(),
                        ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted
                    ) =>
                {
                    continue
                }
                Err(err) => return Err(err),
            };
            let out = self.feed(&buf[..n]);
            if !out.is_empty() {
                stream.write_all(&out)?;
                stream.flush()?;
            }
        }
        Ok(())
    }
}

/// Response code the app uses for requests it does not know.
struct UnknownCmd;

impl Cmd for UnknownCmd {
    fn code(&self) -> u8 {
        RSP_UNKNOWN_CMD
    }
    fn cmd_len(&self) -> CmdLen {
        CmdLen::Len1
    }
    fn endpoint(&self) -> Endpoint {
        Endpoint::App
    }
    fn name(&self) -> &'static str {
        "rspUnknownCmd"
    }
}

/// Reply frame: code, then `data` (status first where the response has one).
fn reply<C: Cmd>(tag: u8, rsp: &C, data: &[u8]) -> Option<Frame> {
    let header = FrameHeader::for_cmd(rsp, tag).ok()?;
    let mut bytes = Vec::with_capacity(1 + data.len());
    bytes.push(rsp.code());
    bytes.extend_from_slice(data);
    Frame::new(header, &bytes).ok()
}

fn status_reply(tag: u8, req: AppCmd, status: u8) -> Option<Frame> {
    let rsp = req.response()?;
    if rsp.cmd_len() == CmdLen::Len1 {
        return reply(tag, &rsp, &[]);
    }
    reply(tag, &rsp, &[status])
}

/// One-byte reply with the not-OK flag set, addressed like the request.
fn not_ok(request: FrameHeader) -> Option<Frame> {
    let header = FrameHeader {
        response_not_ok: true,
        cmd_len: CmdLen::Len1,
        ..request
    };
    Frame::new(header, &[0]).ok()
}

#[derive(Debug)]
struct LinkState {
    device: SimulatedDevice,
    outbox: VecDeque<u8>,
}

/// A simulated device as an in-process `Read + Write` channel.
///
/// Clones share the same device, so one clone can read while another writes.
/// Reads with nothing pending fail with `TimedOut`, like a serial port whose
/// read timeout expired.
#[derive(Debug, Clone)]
pub struct SimLink {
    state: Arc<Mutex<LinkState>>,
}

impl SimLink {
    pub fn new(device: SimulatedDevice) -> Self {
        Self {
            state: Arc::new(Mutex::new(LinkState {
                device,
                outbox: VecDeque::new(),
            })),
        }
    }

    /// Link to a device running the pattern app.
    pub fn app() -> Self {
        Self::new(SimulatedDevice::new())
    }

    /// Link to a device in firmware mode.
    pub fn firmware() -> Self {
        Self::new(SimulatedDevice::firmware_mode())
    }

    /// Inspect or adjust the device.
    pub fn with_device<T>(&self, f: impl FnOnce(&mut SimulatedDevice) -> T) -> T {
        f(&mut self.lock().device)
    }

    fn lock(&self) -> MutexGuard<'_, LinkState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Read for SimLink {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut state = self.lock();
        if state.outbox.is_empty() {
            return Err(io::Error::new(ErrorKind::TimedOut, "no response from device"));
        }
        let n = buf.len().min(state.outbox.len());
        for (dst, src) in buf.iter_mut().zip(state.outbox.drain(..n)) {
            *dst = src;
        }
        Ok(n)
    }
}

impl Write for SimLink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut state = self.lock();
        let out = state.device.feed(buf);
        state.outbox.extend(out);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl ReadTimeout for SimLink {
    fn set_read_timeout(&mut self, _timeout: Option<Duration>) -> tkpattern_transport::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tkpattern_codec::encode;
    use tkpattern_frame::new_frame_buf;

    use super::*;

    fn request(cmd: AppCmd, payload: &[u8]) -> Frame {
        let mut buf = new_frame_buf(&cmd, 2).unwrap();
        buf[2..2 + payload.len()].copy_from_slice(payload);
        decode_frame(&mut buf).unwrap().unwrap()
    }

    #[test]
    fn identity_reply_layout() {
        let mut dev = SimulatedDevice::new();
        let rsp = dev.handle(&request(AppCmd::GetNameVersion, &[])).unwrap();
        assert_eq!(rsp.code(), 0x02);
        assert_eq!(rsp.header().cmd_len, CmdLen::Len32);
        assert_eq!(&rsp.payload()[..8], b"tk1 ptrn");
        assert_eq!(&rsp.payload()[8..12], &2u32.to_le_bytes());
    }

    #[test]
    fn firmware_messages_get_not_ok_in_app_mode() {
        let mut dev = SimulatedDevice::new();
        let buf = new_frame_buf(&FwCmd::GetNameVersion, 2).unwrap();
        let rsp = dev.feed(&buf);
        assert_eq!(rsp.len(), 2);
        let header = FrameHeader::parse(rsp[0]).unwrap();
        assert!(header.response_not_ok);
        assert_eq!(header.endpoint, Endpoint::Firmware);
    }

    #[test]
    fn other_requests_locked_out_during_upload() {
        let mut dev = SimulatedDevice::new();
        // 100 steps: 200 bytes, so the first chunk leaves the upload open.
        let mut first = vec![100u8];
        first.extend_from_slice(&[0xaa; 126]);
        let rsp = dev.handle(&request(AppCmd::SetPattern, &first)).unwrap();
        assert_eq!(rsp.status(), Some(STATUS_OK));

        let rsp = dev.handle(&request(AppCmd::Execute, &[])).unwrap();
        assert!(rsp.header().response_not_ok);
        assert_eq!(dev.executions(), 0);

        let rsp = dev.handle(&request(AppCmd::SetPattern, &[0xbb; 127])).unwrap();
        assert_eq!(rsp.status(), Some(STATUS_OK));
        let rsp = dev.handle(&request(AppCmd::Execute, &[])).unwrap();
        assert!(!rsp.header().response_not_ok);
        assert_eq!(dev.executed().len(), 100);
    }

    #[test]
    fn execute_records_the_steps() {
        let pattern = encode(".-").unwrap();
        let mut payload = vec![pattern.step_count()];
        payload.extend_from_slice(pattern.as_bytes());

        let mut dev = SimulatedDevice::new();
        dev.handle(&request(AppCmd::SetPattern, &payload)).unwrap();
        let rsp = dev.handle(&request(AppCmd::Execute, &[])).unwrap();
        assert_eq!(rsp.code(), 0x08);
        assert_eq!(rsp.header().cmd_len, CmdLen::Len1);
        assert_eq!(dev.executed(), pattern.steps().as_slice());
    }

    #[test]
    fn firmware_mode_ignores_app_frames() {
        let mut dev = SimulatedDevice::firmware_mode();
        assert!(dev.handle(&request(AppCmd::GetNameVersion, &[])).is_none());
        assert!(dev.in_firmware_mode());
    }

    #[test]
    fn feed_drops_garbage_and_waits_for_more() {
        let mut dev = SimulatedDevice::new();
        let wire = new_frame_buf(&AppCmd::GetNameVersion, 2).unwrap();
        assert!(dev.feed(&[0xff]).is_empty());
        assert!(dev.feed(&wire[..1]).is_empty());
        let out = dev.feed(&wire[1..]);
        assert_eq!(out.len(), 33);
    }

    #[test]
    fn link_read_times_out_when_idle() {
        let mut link = SimLink::app();
        let mut buf = [0u8; 4];
        let err = link.read(&mut buf).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TimedOut);
    }
}
