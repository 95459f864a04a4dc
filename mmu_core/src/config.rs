//! Runtime tuning values and fixed mechanical constants.
//!
//! The tunable part is `mmu_config::Config`, reused directly as the engine's
//! runtime configuration (its defaults are the firmware constants). The
//! values below are not tunable: they are properties of the mechanism or of
//! the control law itself.

pub use mmu_config::{ChannelsCfg, Config, MotionCfg, PersistCfg, PidCfg, TensionCfg};

/// Feed-wheel circumference in millimeters (7.5 mm diameter wheel).
pub const WHEEL_CIRCUMFERENCE_MM: f32 = core::f32::consts::PI * 7.5;

/// Encoder resolution: ticks per full revolution.
pub const ENCODER_TICKS: f32 = 4096.0;

/// PWM deadband: outputs at or below this magnitude are snapped to zero.
pub const PWM_DEADBAND: f32 = 10.0;

/// Absolute PWM limit, matching the PID output clamp.
pub const PWM_LIMIT: f32 = 1000.0;

/// Gentle-feed settle window after the printer reports the filament in use.
pub const SETTLE_MS: u64 = 1500;

/// Fixed nudge applied while assisting a channel that just lost presence.
pub const ASSIST_PWM: f32 = 666.0;

/// Upper bound on the consumption ledger (meters) for any external write.
pub const METERS_CAP: f32 = 3000.0;

/// Virtual-feed extrapolation: assumed feed rate while the encoder stalls
/// during use, and the accumulator bound that stops the extrapolation.
pub const VIRTUAL_FEED_MM_PER_S: f32 = 30.0;
pub const VIRTUAL_FEED_BOUND_MS: u32 = 10_000;

/// Hard floor for the persistence debounce window.
pub const SAVE_DEBOUNCE_FLOOR_MS: u64 = 500;
