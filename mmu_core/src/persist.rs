//! Flash record codec for the persistent engine state.
//!
//! Fixed little-endian layout, 48 bytes per channel plus a 12-byte tail
//! carrying the active channel, device identity, version and magic. A
//! record that fails the magic/version gate is discarded wholesale and the
//! engine falls back to defaults.

use crate::state::{
    CHANNEL_COUNT, DeviceKind, FilamentState, FilamentStatus, MotionRequest,
};

pub const RECORD_MAGIC: u32 = 0x4061_4061;
pub const RECORD_VERSION: u32 = 5;

const CHANNEL_BYTES: usize = 48;
const TAIL_BYTES: usize = 12;
pub const RECORD_LEN: usize = CHANNEL_COUNT * CHANNEL_BYTES + TAIL_BYTES;

/// Everything that survives a power cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct PersistRecord {
    pub filaments: [FilamentState; CHANNEL_COUNT],
    pub active: Option<usize>,
    pub device: DeviceKind,
    pub auto_feed: [bool; CHANNEL_COUNT],
}

impl Default for PersistRecord {
    fn default() -> Self {
        Self {
            filaments: Default::default(),
            active: None,
            device: DeviceKind::Ams,
            auto_feed: [false; CHANNEL_COUNT],
        }
    }
}

impl PersistRecord {
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(RECORD_LEN);
        for f in &self.filaments {
            out.extend_from_slice(&f.id);
            out.extend_from_slice(&f.name);
            out.extend_from_slice(&f.color);
            out.extend_from_slice(&f.temperature_min.to_le_bytes());
            out.extend_from_slice(&f.temperature_max.to_le_bytes());
            out.extend_from_slice(&f.meters.to_le_bytes());
            out.extend_from_slice(&f.meters_virtual_count.to_le_bytes());
            out.push(f.status as u8);
            out.push(f.motion_set as u8);
            out.extend_from_slice(&f.pressure.to_le_bytes());
        }
        out.push(self.active.map_or(-1i8, |c| c as i8) as u8);
        out.push(match self.device {
            DeviceKind::Ams => 0,
            DeviceKind::AmsLite => 1,
        });
        let mut flags = 0u8;
        for (i, &on) in self.auto_feed.iter().enumerate() {
            if on {
                flags |= 1 << i;
            }
        }
        out.push(flags);
        out.push(0); // pad
        out.extend_from_slice(&RECORD_VERSION.to_le_bytes());
        out.extend_from_slice(&RECORD_MAGIC.to_le_bytes());
        debug_assert_eq!(out.len(), RECORD_LEN);
        out
    }

    /// Decode a stored record. Returns `None` on any length, magic or
    /// version mismatch so stale layouts never half-load.
    pub fn decode(raw: &[u8]) -> Option<Self> {
        if raw.len() != RECORD_LEN {
            return None;
        }
        let tail = &raw[CHANNEL_COUNT * CHANNEL_BYTES..];
        let version = u32::from_le_bytes(tail[4..8].try_into().ok()?);
        let magic = u32::from_le_bytes(tail[8..12].try_into().ok()?);
        if magic != RECORD_MAGIC || version != RECORD_VERSION {
            return None;
        }

        let mut rec = Self::default();
        for (ch, f) in rec.filaments.iter_mut().enumerate() {
            let b = &raw[ch * CHANNEL_BYTES..(ch + 1) * CHANNEL_BYTES];
            f.id.copy_from_slice(&b[0..8]);
            f.name.copy_from_slice(&b[8..28]);
            f.color.copy_from_slice(&b[28..32]);
            f.temperature_min = i16::from_le_bytes(b[32..34].try_into().ok()?);
            f.temperature_max = i16::from_le_bytes(b[34..36].try_into().ok()?);
            f.meters =
                FilamentState::clamp_meters(f32::from_le_bytes(b[36..40].try_into().ok()?));
            f.meters_virtual_count = u32::from_le_bytes(b[40..44].try_into().ok()?);
            f.status = FilamentStatus::from_u8(b[44]);
            f.motion_set = MotionRequest::from_u8(b[45]);
            f.pressure = u16::from_le_bytes(b[46..48].try_into().ok()?);
        }
        let active = tail[0] as i8;
        rec.active = usize::try_from(active).ok().filter(|&c| c < CHANNEL_COUNT);
        rec.device = if tail[1] == 1 {
            DeviceKind::AmsLite
        } else {
            DeviceKind::Ams
        };
        for i in 0..CHANNEL_COUNT {
            rec.auto_feed[i] = tail[2] & (1 << i) != 0;
        }
        Some(rec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_roundtrips() {
        let mut rec = PersistRecord::default();
        rec.filaments[2].set_id("GFA00");
        rec.filaments[2].set_name("PETG Basic");
        rec.filaments[2].color = [0x20, 0x40, 0x80, 0xFF];
        rec.filaments[2].meters = 123.5;
        rec.filaments[2].motion_set = MotionRequest::InUse;
        rec.active = Some(2);
        rec.device = DeviceKind::AmsLite;
        rec.auto_feed = [true, false, false, true];

        let bytes = rec.encode();
        assert_eq!(bytes.len(), RECORD_LEN);
        assert_eq!(PersistRecord::decode(&bytes), Some(rec));
    }

    #[test]
    fn bad_magic_is_rejected() {
        let mut bytes = PersistRecord::default().encode();
        let n = bytes.len();
        bytes[n - 1] ^= 0xFF;
        assert_eq!(PersistRecord::decode(&bytes), None);
    }

    #[test]
    fn version_mismatch_is_rejected() {
        let mut bytes = PersistRecord::default().encode();
        let n = bytes.len();
        bytes[n - 8] = RECORD_VERSION as u8 + 1;
        assert_eq!(PersistRecord::decode(&bytes), None);
    }

    #[test]
    fn truncated_record_is_rejected() {
        let bytes = PersistRecord::default().encode();
        assert_eq!(PersistRecord::decode(&bytes[..bytes.len() - 1]), None);
    }

    #[test]
    fn stored_meters_are_sanitized() {
        let mut rec = PersistRecord::default();
        rec.filaments[0].meters = 5.0;
        let mut bytes = rec.encode();
        bytes[36..40].copy_from_slice(&f32::NAN.to_le_bytes());
        let decoded = PersistRecord::decode(&bytes).unwrap();
        assert_eq!(decoded.filaments[0].meters, 0.0);
    }

    #[test]
    fn out_of_range_active_channel_collapses_to_none() {
        let mut bytes = PersistRecord::default().encode();
        bytes[CHANNEL_COUNT * 48] = 7;
        let decoded = PersistRecord::decode(&bytes).unwrap();
        assert_eq!(decoded.active, None);
    }
}
