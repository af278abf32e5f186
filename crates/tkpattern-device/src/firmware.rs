//! Firmware side of the device: detecting firmware mode and loading the
//! pattern app before the session can talk to it.

use std::io::{Read, Write};

use blake2::{Blake2s256, Digest};
use bytes::{BufMut, BytesMut};
use serde::Serialize;
use tkpattern_frame::Cmd;
use tkpattern_transport::ReadTimeout;
use tracing::{debug, info, warn};

use crate::commands::FwCmd;
use crate::error::{DeviceError, Result};
use crate::identity::NameVersion;
use crate::session::{check_status, DeviceSession};
use crate::transfer::ChunkSender;

/// Largest app binary the firmware accepts.
pub const MAX_APP_SIZE: usize = 100 * 1024;

/// BLAKE2s-256 digest size.
pub const DIGEST_SIZE: usize = 32;

/// What it took to get the pattern app running.
#[derive(Debug, Clone, Serialize)]
pub struct Bootstrap {
    /// Firmware identity, if the device was in firmware mode.
    pub firmware: Option<NameVersion>,
    /// Hex digest of the app binary, if one was loaded.
    pub loaded_digest: Option<String>,
    /// Identity of the running app.
    pub app: NameVersion,
}

pub(crate) fn digest(data: &[u8]) -> [u8; DIGEST_SIZE] {
    let mut hasher = Blake2s256::new();
    hasher.update(data);
    let mut out = [0u8; DIGEST_SIZE];
    out.copy_from_slice(&hasher.finalize());
    out
}

impl<R: Read + ReadTimeout, W: Write> DeviceSession<R, W> {
    /// Name and version reported by the firmware endpoint, under the probe
    /// timeout.
    pub fn firmware_name_version(&mut self) -> Result<NameVersion> {
        let frame = self.probe(&FwCmd::GetNameVersion, &FwCmd::RspGetNameVersion)?;
        NameVersion::unpack(frame.payload())
    }

    /// Firmware identity if the device is waiting in firmware mode for an app.
    ///
    /// A running app answers firmware requests with the not-OK flag, and a
    /// silent device times out; both mean "not firmware mode". Anything else
    /// is logged and treated the same way.
    pub fn probe_firmware(&mut self) -> Result<Option<NameVersion>> {
        match self.firmware_name_version() {
            Ok(nv) if nv.is_firmware() => Ok(Some(nv)),
            Ok(nv) => {
                debug!(name0 = %nv.name0, name1 = %nv.name1, "firmware endpoint answered with another name");
                Ok(None)
            }
            Err(err) if err.is_timeout() || err.is_not_ok() => Ok(None),
            Err(err @ DeviceError::Transport(_)) => Err(err),
            Err(err) => {
                warn!(error = %err, "firmware probe failed");
                Ok(None)
            }
        }
    }

    /// Load an app binary into a device in firmware mode.
    ///
    /// `uss` is the optional user supplied secret; only its digest is sent.
    /// Returns the BLAKE2s digest the firmware computed, after checking it
    /// against our own.
    pub fn load_app(&mut self, binary: &[u8], uss: Option<&[u8]>) -> Result<[u8; DIGEST_SIZE]> {
        if binary.is_empty() || binary.len() > MAX_APP_SIZE {
            return Err(DeviceError::AppSize {
                size: binary.len(),
                max: MAX_APP_SIZE,
            });
        }

        let mut header = BytesMut::with_capacity(FwCmd::LoadApp.cmd_len().bytelen() - 1);
        header.put_u32_le(binary.len() as u32);
        match uss {
            Some(secret) => {
                header.put_u8(1);
                header.put_slice(&digest(secret));
            }
            None => header.put_u8(0),
        }
        let rsp = self.exchange(&FwCmd::LoadApp, &FwCmd::RspLoadApp, &header)?;
        check_status(&rsp, &FwCmd::RspLoadApp)?;
        info!(size = binary.len(), uss = uss.is_some(), "loading app");

        let capacity = FwCmd::LoadAppData.cmd_len().bytelen() - 1;
        let mut sender = ChunkSender::new(binary.to_vec(), capacity);
        let mut device_digest = None;
        while let Some(chunk) = sender.next_chunk() {
            let sent = chunk.len();
            let last = sender.offset() + sent == sender.len();
            let expected = if last {
                FwCmd::RspLoadAppDataReady
            } else {
                FwCmd::RspLoadAppData
            };

            let rsp = self.exchange(&FwCmd::LoadAppData, &expected, chunk)?;
            check_status(&rsp, &expected)?;
            sender.advance(sent)?;

            if last {
                let payload = rsp.response_payload();
                let mut out = [0u8; DIGEST_SIZE];
                out.copy_from_slice(&payload[..DIGEST_SIZE]);
                device_digest = Some(out);
            }
        }

        let expected = digest(binary);
        let device = device_digest.ok_or(DeviceError::ShortResponse {
            rsp: FwCmd::RspLoadAppDataReady.name(),
            len: 0,
            need: DIGEST_SIZE,
        })?;
        if device != expected {
            return Err(DeviceError::DigestMismatch {
                device: hex::encode(device),
                expected: hex::encode(expected),
            });
        }
        info!(digest = %hex::encode(device), "app loaded");
        Ok(device)
    }
}

/// Make sure the pattern app is running, loading `app` if the device is in
/// firmware mode.
pub fn ensure_app_running<R: Read + ReadTimeout, W: Write>(
    session: &mut DeviceSession<R, W>,
    app: Option<&[u8]>,
    uss: Option<&[u8]>,
) -> Result<Bootstrap> {
    let firmware = session.probe_firmware()?;
    let mut loaded_digest = None;

    if let Some(fw) = &firmware {
        info!(version = fw.version, "device is in firmware mode");
        let binary = app.ok_or(DeviceError::AppRequired)?;
        loaded_digest = Some(hex::encode(session.load_app(binary, uss)?));
    }

    let identity = session.get_identity()?;
    if !identity.is_pattern_app() {
        return Err(DeviceError::UnexpectedApp {
            name0: identity.name0,
            name1: identity.name1,
        });
    }

    Ok(Bootstrap {
        firmware,
        loaded_digest,
        app: identity,
    })
}
