use std::io::{Read, Write};

use bytes::Bytes;
use serde::Serialize;
use tkpattern_codec::{EncodedPattern, PACKED_STEP_SIZE};
use tkpattern_transport::ReadTimeout;
use tracing::info;

use crate::error::{DeviceError, Result};
use crate::session::DeviceSession;

/// Outcome of an upload, execute and read-back cycle.
#[derive(Debug, Clone, Serialize)]
pub struct RoundTrip {
    pub step_count: u8,
    #[serde(serialize_with = "as_hex")]
    pub sent: Bytes,
    #[serde(serialize_with = "as_hex")]
    pub received: Bytes,
}

fn as_hex<S: serde::Serializer>(bytes: &Bytes, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(&hex::encode(bytes))
}

/// Upload `pattern`, play it and read it back.
///
/// Fails with [`DeviceError::Inconsistent`] when the device returns anything
/// other than the bytes sent.
pub fn upload_and_verify<R: Read + ReadTimeout, W: Write>(
    session: &mut DeviceSession<R, W>,
    pattern: &EncodedPattern,
) -> Result<RoundTrip> {
    session.set_pattern(pattern.as_bytes(), pattern.step_count())?;
    session.execute()?;
    let received = session.get_pattern(PACKED_STEP_SIZE)?;

    verify_consistency(pattern.as_bytes(), &received)?;
    info!(steps = pattern.step_count(), "retrieved pattern is consistent");
    Ok(RoundTrip {
        step_count: pattern.step_count(),
        sent: pattern.bytes(),
        received,
    })
}

/// Byte-compare what was sent with what came back.
pub fn verify_consistency(sent: &[u8], received: &[u8]) -> Result<()> {
    if sent == received {
        return Ok(());
    }
    let first_difference = sent
        .iter()
        .zip(received)
        .position(|(a, b)| a != b)
        .or(Some(sent.len().min(received.len())));
    Err(DeviceError::Inconsistent {
        sent: sent.len(),
        received: received.len(),
        first_difference,
    })
}

#[cfg(test)]
mod tests {
    use tkpattern_codec::encode;

    use super::*;
    use crate::session::SessionConfig;
    use crate::sim::SimLink;

    #[test]
    fn consistent_bytes_pass() {
        verify_consistency(&[7, 1, 0, 1], &[7, 1, 0, 1]).unwrap();
    }

    #[test]
    fn first_difference_is_reported() {
        let err = verify_consistency(&[7, 1, 0, 1], &[7, 1, 7, 1]).unwrap_err();
        assert!(matches!(
            err,
            DeviceError::Inconsistent {
                first_difference: Some(2),
                ..
            }
        ));
    }

    #[test]
    fn length_difference_points_past_the_shorter() {
        let err = verify_consistency(&[7, 1, 0, 1], &[7, 1]).unwrap_err();
        assert!(matches!(
            err,
            DeviceError::Inconsistent {
                sent: 4,
                received: 2,
                first_difference: Some(2),
            }
        ));
    }

    #[test]
    fn full_cycle_against_the_simulator() {
        let link = SimLink::app();
        let mut session =
            DeviceSession::from_parts(link.clone(), link.clone(), SessionConfig::default())
                .unwrap();
        let pattern = encode("... --- .../").unwrap();

        let report = upload_and_verify(&mut session, &pattern).unwrap();
        assert_eq!(report.step_count, pattern.step_count());
        assert_eq!(report.sent, report.received);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["sent"], hex::encode(pattern.as_bytes()));
    }
}
