//! Frame classification and serialization.
//!
//! A complete frame is only trusted once its trailing CRC16 passes; after
//! that the header byte selects the short-command family (discriminated by
//! the byte at offset 4) or the long-command family (discriminated by the
//! `type` field of the 11-byte sub-header).

use num_enum::FromPrimitive;

use crate::crc::{crc8, crc16};
use crate::error::ProtocolError;
use crate::{LONG_FAMILY_HEADER, SHORT_FAMILY_HEADER, START_BYTE};

/// Offset of the short-family command discriminator.
const SHORT_CMD_OFFSET: usize = 4;
/// Long frames: 2-byte preamble + 11-byte sub-header.
const LONG_PAYLOAD_OFFSET: usize = 13;
/// Long frames: sub-header span plus preamble plus trailing CRC16.
const LONG_OVERHEAD: usize = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive)]
#[repr(u8)]
enum ShortCommand {
    MotionShort = 0x03,
    MotionLong = 0x04,
    OnlineDetect = 0x05,
    ReqX6 = 0x06,
    NfcDetect = 0x07,
    SetFilamentInfo = 0x08,
    Heartbeat = 0x20,
    #[num_enum(catch_all)]
    Unknown(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive)]
#[repr(u16)]
enum LongPacketType {
    Version = 0x103,
    ReadFilamentInfo = 0x211,
    SetFilamentInfoV2 = 0x218,
    McOnline = 0x21A,
    SerialNumber = 0x402,
    #[num_enum(catch_all)]
    Unknown(u16),
}

/// Closed set of frame meanings the dispatch layer routes on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketKind {
    /// CRC16 failed or the frame is structurally unusable.
    None,
    MotionShort,
    MotionLong,
    OnlineDetect,
    ReqX6,
    NfcDetect,
    SetFilamentInfo,
    Heartbeat,
    McOnline,
    ReadFilamentInfo,
    SetFilamentInfoV2,
    Version,
    SerialNumber,
    /// Valid frame of a type this device does not handle.
    Other,
}

/// Borrowed view over a long frame's sub-header and payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LongPacketView<'a> {
    pub package_number: u16,
    pub package_length: u16,
    pub crc8: u8,
    pub target_address: u16,
    pub source_address: u16,
    pub packet_type: u16,
    pub payload: &'a [u8],
}

/// Sub-header fields the caller fills in when building a long frame;
/// `package_length` and both checksums are computed during serialization.
#[derive(Debug, Clone, Copy, Default)]
pub struct LongPacketHeader {
    pub package_number: u16,
    pub target_address: u16,
    pub source_address: u16,
    pub packet_type: u16,
}

#[inline]
fn read_u16_le(buf: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([buf[offset], buf[offset + 1]])
}

/// Verify the trailing little-endian CRC16 over everything before it.
pub fn check_crc16(frame: &[u8]) -> bool {
    if frame.len() < 3 {
        return false;
    }
    let body = frame.len() - 2;
    let want = crc16(&frame[..body]);
    frame[body] == (want & 0xFF) as u8 && frame[body + 1] == (want >> 8) as u8
}

/// Classify a length-complete frame. Integrity failures and undersized
/// frames come back as [`PacketKind::None`]; unknown but well-formed
/// commands as [`PacketKind::Other`].
pub fn identify(frame: &[u8]) -> PacketKind {
    if !check_crc16(frame) {
        return PacketKind::None;
    }
    match frame[1] {
        SHORT_FAMILY_HEADER => {
            let Some(&cmd) = frame.get(SHORT_CMD_OFFSET) else {
                return PacketKind::None;
            };
            match ShortCommand::from_primitive(cmd) {
                ShortCommand::MotionShort => PacketKind::MotionShort,
                ShortCommand::MotionLong => PacketKind::MotionLong,
                ShortCommand::OnlineDetect => PacketKind::OnlineDetect,
                ShortCommand::ReqX6 => PacketKind::ReqX6,
                ShortCommand::NfcDetect => PacketKind::NfcDetect,
                ShortCommand::SetFilamentInfo => PacketKind::SetFilamentInfo,
                ShortCommand::Heartbeat => PacketKind::Heartbeat,
                ShortCommand::Unknown(_) => PacketKind::Other,
            }
        }
        LONG_FAMILY_HEADER => match parse_long(frame) {
            Ok(view) => match LongPacketType::from_primitive(view.packet_type) {
                LongPacketType::McOnline => PacketKind::McOnline,
                LongPacketType::ReadFilamentInfo => PacketKind::ReadFilamentInfo,
                LongPacketType::SetFilamentInfoV2 => PacketKind::SetFilamentInfoV2,
                LongPacketType::Version => PacketKind::Version,
                LongPacketType::SerialNumber => PacketKind::SerialNumber,
                LongPacketType::Unknown(_) => PacketKind::Other,
            },
            Err(_) => PacketKind::None,
        },
        _ => PacketKind::None,
    }
}

/// Decode the 11-byte sub-header at offset 2 and borrow the payload.
pub fn parse_long(frame: &[u8]) -> Result<LongPacketView<'_>, ProtocolError> {
    if frame.len() < LONG_OVERHEAD {
        return Err(ProtocolError::FrameTooShort {
            got: frame.len(),
            need: LONG_OVERHEAD,
        });
    }
    Ok(LongPacketView {
        package_number: read_u16_le(frame, 2),
        package_length: read_u16_le(frame, 4),
        crc8: frame[6],
        target_address: read_u16_le(frame, 7),
        source_address: read_u16_le(frame, 9),
        packet_type: read_u16_le(frame, 11),
        payload: &frame[LONG_PAYLOAD_OFFSET..frame.len() - 2],
    })
}

/// Recompute both checksums of a frame whose header fields are already
/// populated. `len` includes the 2 trailing CRC16 bytes, which this call
/// overwrites; the header CRC8 lands at offset 3 (short) or 6 (long).
pub fn build_with_crc(buf: &mut [u8], len: usize) -> Result<(), ProtocolError> {
    if len > buf.len() {
        return Err(ProtocolError::BufferTooSmall {
            got: buf.len(),
            need: len,
        });
    }
    let crc8_offset = if buf.first().copied() != Some(START_BYTE) || len < 2 {
        return Err(ProtocolError::FrameTooShort { got: len, need: 2 });
    } else if buf[1] & 0x80 != 0 {
        3
    } else {
        6
    };
    if len < crc8_offset + 3 {
        return Err(ProtocolError::FrameTooShort {
            got: len,
            need: crc8_offset + 3,
        });
    }
    buf[crc8_offset] = crc8(&buf[..crc8_offset]);
    let body = len - 2;
    let c16 = crc16(&buf[..body]);
    buf[body] = (c16 & 0xFF) as u8;
    buf[body + 1] = (c16 >> 8) as u8;
    Ok(())
}

/// Serialize a long frame: 0x3D 0x05 preamble, sub-header, payload, both
/// checksums. Returns the total frame length.
pub fn build_long_packet(
    header: &LongPacketHeader,
    payload: &[u8],
    out: &mut [u8],
) -> Result<usize, ProtocolError> {
    let total = payload.len() + LONG_OVERHEAD;
    if total > usize::from(u16::MAX) {
        return Err(ProtocolError::PayloadTooLong(payload.len()));
    }
    if out.len() < total {
        return Err(ProtocolError::BufferTooSmall {
            got: out.len(),
            need: total,
        });
    }
    out[0] = START_BYTE;
    out[1] = LONG_FAMILY_HEADER;
    out[2..4].copy_from_slice(&header.package_number.to_le_bytes());
    out[4..6].copy_from_slice(&(total as u16).to_le_bytes());
    out[6] = 0; // crc8 placeholder
    out[7..9].copy_from_slice(&header.target_address.to_le_bytes());
    out[9..11].copy_from_slice(&header.source_address.to_le_bytes());
    out[11..13].copy_from_slice(&header.packet_type.to_le_bytes());
    out[LONG_PAYLOAD_OFFSET..LONG_PAYLOAD_OFFSET + payload.len()].copy_from_slice(payload);
    build_with_crc(out, total)?;
    Ok(total)
}
