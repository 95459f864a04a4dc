//! Persistent and per-tick state shared across the engine.

use crate::config::METERS_CAP;

/// Number of physical filament channels.
pub const CHANNEL_COUNT: usize = 4;

/// Filament presence/readiness as reported on the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum FilamentStatus {
    #[default]
    Offline = 0,
    Online = 1,
    NfcWaiting = 2,
}

impl FilamentStatus {
    pub fn from_u8(v: u8) -> Self {
        match v {
            1 => Self::Online,
            2 => Self::NfcWaiting,
            _ => Self::Offline,
        }
    }
}

/// Motion the printer has requested for a channel; persisted so an
/// interrupted swap resumes after a power cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum MotionRequest {
    BeforePullBack = 0,
    NeedPullBack = 1,
    NeedSendOut = 2,
    InUse = 3,
    #[default]
    Idle = 4,
}

impl MotionRequest {
    pub fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::BeforePullBack,
            1 => Self::NeedPullBack,
            2 => Self::NeedSendOut,
            3 => Self::InUse,
            _ => Self::Idle,
        }
    }
}

/// Where a channel currently is in the feed cycle. In-memory only; reset
/// to `Idle` whenever the channel is deselected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MotionPosition {
    #[default]
    Idle,
    SendingOut,
    Using,
    PullingBack,
    Loading,
    Unloading,
}

/// Device personality the engine impersonates. Changes a few motor speed
/// constants and the pull-back entry behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u16)]
pub enum DeviceKind {
    #[default]
    Ams = 0x0700,
    AmsLite = 0x1200,
}

impl DeviceKind {
    /// Map a long-packet target address to a known identity.
    pub fn from_address(addr: u16) -> Option<Self> {
        match addr {
            0x0700 => Some(Self::Ams),
            0x1200 => Some(Self::AmsLite),
            _ => None,
        }
    }
}

/// Tri-state tension classification of the buffer voltage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tension {
    Slack,
    #[default]
    Normal,
    Taut,
}

/// External filament description, applied via `set_filament_info`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilamentInfo {
    pub id: [u8; 8],
    pub name: [u8; 20],
    pub color: [u8; 4],
    pub temperature_min: i16,
    pub temperature_max: i16,
}

/// Per-channel persistent record.
#[derive(Debug, Clone, PartialEq)]
pub struct FilamentState {
    /// 8-byte tag string, NUL-terminated at its last byte.
    pub id: [u8; 8],
    /// 20-byte display string, NUL-terminated at its last byte.
    pub name: [u8; 20],
    /// RGBA.
    pub color: [u8; 4],
    pub temperature_min: i16,
    pub temperature_max: i16,
    /// Lifetime consumption ledger, clamped to `0..=3000` on external writes.
    pub meters: f32,
    /// Bounds virtual-feed extrapolation while the encoder stalls (ms).
    pub meters_virtual_count: u32,
    pub status: FilamentStatus,
    pub motion_set: MotionRequest,
    /// Last reported tension code (voltage x 1000).
    pub pressure: u16,
}

impl Default for FilamentState {
    fn default() -> Self {
        let mut s = Self {
            id: [0; 8],
            name: [0; 20],
            color: [0xFF; 4],
            temperature_min: 200,
            temperature_max: 220,
            meters: 0.0,
            meters_virtual_count: 0,
            status: FilamentStatus::Offline,
            motion_set: MotionRequest::Idle,
            pressure: 0,
        };
        s.set_name("PLA");
        s
    }
}

fn copy_terminated(dst: &mut [u8], src: &[u8]) {
    dst.fill(0);
    let n = src.len().min(dst.len() - 1);
    dst[..n].copy_from_slice(&src[..n]);
}

impl FilamentState {
    pub fn set_id(&mut self, id: &str) {
        copy_terminated(&mut self.id, id.as_bytes());
    }

    pub fn set_name(&mut self, name: &str) {
        copy_terminated(&mut self.name, name.as_bytes());
    }

    pub fn id_str(&self) -> &str {
        str_field(&self.id)
    }

    pub fn name_str(&self) -> &str {
        str_field(&self.name)
    }

    /// Clamp an externally supplied ledger value to sane bounds.
    /// Non-finite inputs collapse to 0.
    pub fn clamp_meters(meters: f32) -> f32 {
        if !meters.is_finite() {
            return 0.0;
        }
        meters.clamp(0.0, METERS_CAP)
    }
}

fn str_field(raw: &[u8]) -> &str {
    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    core::str::from_utf8(&raw[..end]).unwrap_or("")
}
