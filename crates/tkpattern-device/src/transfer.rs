//! Chunked transfer state for SetPattern and GetPattern.
//!
//! Both directions move more data than fits in one frame. The state lives in
//! these small structs rather than in loop counters so a partial transfer can
//! be inspected and tested on its own.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{DeviceError, Result};

/// Splits an outgoing buffer into frame-sized chunks.
#[derive(Debug, Clone)]
pub struct ChunkSender {
    data: Bytes,
    offset: usize,
    capacity: usize,
}

impl ChunkSender {
    /// `capacity` is the payload room of one request frame.
    pub fn new(data: impl Into<Bytes>, capacity: usize) -> Self {
        Self {
            data: data.into(),
            offset: 0,
            capacity: capacity.max(1),
        }
    }

    /// Buffer for a SetPattern transfer: one count byte, then the packed steps.
    pub fn with_count(count: u8, body: &[u8], capacity: usize) -> Self {
        let mut data = BytesMut::with_capacity(1 + body.len());
        data.put_u8(count);
        data.put_slice(body);
        Self::new(data.freeze(), capacity)
    }

    /// The next unsent slice, at most `capacity` bytes. `None` once done.
    pub fn next_chunk(&self) -> Option<&[u8]> {
        if self.is_done() {
            return None;
        }
        let end = (self.offset + self.capacity).min(self.data.len());
        Some(&self.data[self.offset..end])
    }

    /// Mark `sent` real bytes as delivered.
    pub fn advance(&mut self, sent: usize) -> Result<()> {
        let next = self.offset + sent;
        if next > self.data.len() {
            return Err(DeviceError::Overrun {
                offset: next,
                len: self.data.len(),
            });
        }
        self.offset = next;
        Ok(())
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn is_done(&self) -> bool {
        self.offset >= self.data.len()
    }

    /// Frames needed for the whole buffer.
    pub fn chunk_count(&self) -> usize {
        self.data.len().div_ceil(self.capacity)
    }
}

/// Reassembles an incoming object stream.
///
/// The first payload announces the object count in its first byte; every
/// byte after that is object data until `count * step_size` bytes arrived.
#[derive(Debug)]
pub struct ChunkReceiver {
    step_size: usize,
    expected: Option<usize>,
    buf: BytesMut,
    frames: usize,
}

impl ChunkReceiver {
    pub fn new(step_size: usize) -> Self {
        Self {
            step_size,
            expected: None,
            buf: BytesMut::new(),
            frames: 0,
        }
    }

    /// Take one response payload (status byte already stripped).
    ///
    /// Bytes beyond the expected total are padding and are dropped.
    pub fn accept(&mut self, payload: &[u8]) -> Result<()> {
        let data = match self.expected {
            Some(_) => payload,
            None => {
                let Some((&count, rest)) = payload.split_first() else {
                    return Err(DeviceError::ShortResponse {
                        rsp: "rspGetPattern",
                        len: 0,
                        need: 1,
                    });
                };
                let total = usize::from(count) * self.step_size;
                self.expected = Some(total);
                self.buf.reserve(total);
                rest
            }
        };
        self.frames += 1;

        let take = self.remaining().min(data.len());
        self.buf.put_slice(&data[..take]);
        Ok(())
    }

    /// Object count announced by the device, once the first frame arrived.
    pub fn object_count(&self) -> Option<usize> {
        self.expected.map(|total| total / self.step_size.max(1))
    }

    pub fn received(&self) -> usize {
        self.buf.len()
    }

    pub fn remaining(&self) -> usize {
        self.expected.map_or(0, |total| total - self.buf.len())
    }

    pub fn frames(&self) -> usize {
        self.frames
    }

    pub fn is_done(&self) -> bool {
        self.expected.is_some() && self.remaining() == 0
    }

    pub fn finish(self) -> Bytes {
        self.buf.freeze()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sender_splits_and_pads_nothing() {
        let body = vec![0xaa; 300];
        let mut sender = ChunkSender::with_count(150, &body, 127);
        assert_eq!(sender.len(), 301);
        assert_eq!(sender.chunk_count(), 3);

        let mut sizes = Vec::new();
        while let Some(chunk) = sender.next_chunk() {
            sizes.push(chunk.len());
            let n = chunk.len();
            sender.advance(n).unwrap();
        }
        assert_eq!(sizes, vec![127, 127, 47]);
        assert_eq!(sender.offset(), 301);
        assert!(sender.next_chunk().is_none());
    }

    #[test]
    fn sender_first_byte_is_the_count() {
        let sender = ChunkSender::with_count(3, &[7, 1, 0, 1, 7, 3], 127);
        assert_eq!(sender.next_chunk().unwrap(), &[3, 7, 1, 0, 1, 7, 3]);
        assert_eq!(sender.chunk_count(), 1);
    }

    #[test]
    fn sender_refuses_overrun() {
        let mut sender = ChunkSender::new(vec![1u8, 2, 3], 127);
        sender.advance(2).unwrap();
        assert!(matches!(
            sender.advance(2),
            Err(DeviceError::Overrun { offset: 4, len: 3 })
        ));
        assert_eq!(sender.offset(), 2);
        assert_eq!(sender.next_chunk().unwrap(), &[3]);
    }

    #[test]
    fn receiver_discards_padding() {
        let mut rx = ChunkReceiver::new(2);
        let mut first = vec![3u8];
        first.extend_from_slice(&[7, 1, 0, 1, 7, 3]);
        first.resize(126, 0);

        rx.accept(&first).unwrap();
        assert!(rx.is_done());
        assert_eq!(rx.object_count(), Some(3));
        assert_eq!(rx.frames(), 1);
        assert_eq!(&rx.finish()[..], &[7, 1, 0, 1, 7, 3]);
    }

    #[test]
    fn receiver_spans_frames() {
        // 128 steps: 256 bytes, 125 in the first frame then 126 and 5.
        let data: Vec<u8> = (0..256u32).map(|i| i as u8).collect();
        let mut rx = ChunkReceiver::new(2);

        let mut first = vec![128u8];
        first.extend_from_slice(&data[..125]);
        rx.accept(&first).unwrap();
        assert!(!rx.is_done());
        assert_eq!(rx.remaining(), 131);

        rx.accept(&data[125..251]).unwrap();
        assert_eq!(rx.remaining(), 5);

        let mut last = data[251..].to_vec();
        last.resize(126, 0xee);
        rx.accept(&last).unwrap();

        assert!(rx.is_done());
        assert_eq!(rx.frames(), 3);
        assert_eq!(&rx.finish()[..], &data[..]);
    }

    #[test]
    fn receiver_zero_objects_is_done_at_once() {
        let mut rx = ChunkReceiver::new(2);
        assert!(!rx.is_done());
        rx.accept(&[0; 126]).unwrap();
        assert!(rx.is_done());
        assert!(rx.finish().is_empty());
    }

    #[test]
    fn receiver_rejects_empty_first_payload() {
        let mut rx = ChunkReceiver::new(2);
        assert!(matches!(
            rx.accept(&[]),
            Err(DeviceError::ShortResponse { .. })
        ));
    }
}
