//! Byte plumbing between the bus ISR side and the control loop.
//!
//! The UART receive path hands individual bytes to a bounded channel; the
//! control loop drains it into the frame decoder between ticks. Overflow
//! drops the byte and logs, which the decoder's resynchronization then
//! absorbs.

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use mmu_protocol::{FeedResult, FrameDecoder};

/// Sender half given to the receive interrupt / reader thread.
#[derive(Debug, Clone)]
pub struct ByteSink {
    tx: Sender<u8>,
}

impl ByteSink {
    /// Push one received byte. Never blocks; a full queue drops the byte.
    pub fn push(&self, byte: u8) {
        match self.tx.try_send(byte) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                tracing::warn!("rx queue full, dropping byte");
            }
            Err(TrySendError::Disconnected(_)) => {}
        }
    }
}

/// Receiver half owned by the control loop.
#[derive(Debug)]
pub struct ByteStage {
    rx: Receiver<u8>,
}

/// Build a connected sink/stage pair with the given queue depth.
pub fn byte_channel(capacity: usize) -> (ByteSink, ByteStage) {
    let (tx, rx) = bounded(capacity);
    (ByteSink { tx }, ByteStage { rx })
}

impl ByteStage {
    /// Drain all queued bytes through the decoder, invoking `on_frame` for
    /// each completed frame. Returns the number of frames delivered.
    pub fn drain_into<F>(&self, decoder: &mut FrameDecoder, mut on_frame: F) -> usize
    where
        F: FnMut(&[u8]),
    {
        let mut frames = 0;
        while let Ok(byte) = self.rx.try_recv() {
            match decoder.feed(byte) {
                FeedResult::PacketReady(len) => {
                    on_frame(&decoder.frame()[..len]);
                    frames += 1;
                }
                FeedResult::Incomplete => {}
                FeedResult::Invalid => {
                    tracing::trace!("decoder rejected byte 0x{byte:02X}");
                }
            }
        }
        frames
    }
}
