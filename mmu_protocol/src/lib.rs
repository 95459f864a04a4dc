#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Wire-level codec for the AMS bus framing format.
//!
//! Two packet variants share a 0x3D start marker: short frames (header bit
//! 0x80 set, length at offset 2, header CRC8 at offset 3) and long frames
//! (length at offset 4, header CRC8 at offset 6, 11-byte sub-header). Every
//! frame ends in a little-endian CRC16 over all preceding bytes.
//!
//! - [`decoder::FrameDecoder`] reassembles frames one byte at a time and
//!   recovers locally from garbage and corrupt headers.
//! - [`packet`] classifies complete frames into [`packet::PacketKind`] and
//!   serializes outbound frames with both checksums.

pub mod crc;
pub mod decoder;
pub mod error;
pub mod packet;

pub use decoder::{FeedResult, FrameDecoder};
pub use error::ProtocolError;
pub use packet::{
    LongPacketHeader, LongPacketView, PacketKind, build_long_packet, build_with_crc, identify,
    parse_long,
};

/// Frame start marker.
pub const START_BYTE: u8 = 0x3D;

/// Header byte of the short-command family.
pub const SHORT_FAMILY_HEADER: u8 = 0xC5;

/// Header byte of the long-command family.
pub const LONG_FAMILY_HEADER: u8 = 0x05;

/// Largest frame the decoder will buffer.
pub const MAX_FRAME_LEN: usize = 1000;
