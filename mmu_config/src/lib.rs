#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Tuning schema for the filament-feed controller.
//!
//! Deserialized from TOML and validated before being converted into the
//! runtime config structs in `mmu_core::config`. Every field has a default
//! matching the firmware constants, so an empty document is valid.

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("toml parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(&'static str),
}

/// Motor speed targets, compared directly against the measured mm/s
/// encoder speed. The stock values sit far above any physical feed rate,
/// so the speed loop saturates into full-power moves; lower them only for
/// genuinely rate-limited motion.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MotionCfg {
    /// Feed speed toward the toolhead.
    pub send_speed: f32,
    /// Feed speed for the AMS lite identity (gated on tension ceiling).
    pub lite_send_speed: f32,
    /// Gentle feed used during the settle window and near the ceiling.
    pub slow_send_speed: f32,
    /// Retract speed (applied with negative sign).
    pub pull_speed: f32,
    /// Retract distance target for the automatic pull-back ramp (mm).
    pub pull_back_target_mm: f32,
}

impl Default for MotionCfg {
    fn default() -> Self {
        Self {
            send_speed: 1500.0,
            lite_send_speed: 1000.0,
            slow_send_speed: 800.0,
            pull_speed: 2000.0,
            pull_back_target_mm: 200.0,
        }
    }
}

/// Tension (buffer voltage) thresholds, volts on a 0–3.3 V scale.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TensionCfg {
    /// Above this the buffer is taut.
    pub taut_v: f32,
    /// Below this the buffer is slack.
    pub slack_v: f32,
    /// Idle-hold setpoint.
    pub idle_setpoint_v: f32,
    /// In-use band upper edge; also the send-speed ceiling.
    pub ceiling_v: f32,
    /// Hysteresis release level for the in-use latch.
    pub release_v: f32,
}

impl Default for TensionCfg {
    fn default() -> Self {
        Self {
            taut_v: 1.85,
            slack_v: 1.45,
            idle_setpoint_v: 1.65,
            ceiling_v: 1.70,
            release_v: 1.55,
        }
    }
}

/// PID gains for the two per-channel controllers.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PidCfg {
    pub speed_p: f32,
    pub speed_i: f32,
    pub speed_d: f32,
    pub pressure_p: f32,
    pub pressure_i: f32,
    pub pressure_d: f32,
}

impl Default for PidCfg {
    fn default() -> Self {
        Self {
            speed_p: 2.0,
            speed_i: 20.0,
            speed_d: 0.0,
            pressure_p: 1500.0,
            pressure_i: 0.0,
            pressure_d: 0.0,
        }
    }
}

/// Per-channel mechanical wiring.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChannelsCfg {
    /// Direction sign per channel, each entry -1 or 1.
    pub directions: [i8; 4],
    /// Minimum PWM offset below which the driver buzzes instead of turning.
    pub pwm_zero: f32,
}

impl Default for ChannelsCfg {
    fn default() -> Self {
        Self {
            directions: [1, -1, 1, -1],
            pwm_zero: 500.0,
        }
    }
}

/// Persistence behavior.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PersistCfg {
    /// Quiet period after the last dirtying write before a save (ms).
    /// Floor is 500 ms; the default stays well clear of bus traffic.
    pub save_debounce_ms: u64,
}

impl Default for PersistCfg {
    fn default() -> Self {
        Self {
            save_debounce_ms: 5000,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub motion: MotionCfg,
    pub tension: TensionCfg,
    pub pid: PidCfg,
    pub channels: ChannelsCfg,
    pub persist: PersistCfg,
}

impl Config {
    /// Parse and validate a TOML document.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let cfg: Self = toml::from_str(text)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let m = &self.motion;
        for v in [
            m.send_speed,
            m.lite_send_speed,
            m.slow_send_speed,
            m.pull_speed,
        ] {
            if !v.is_finite() || v <= 0.0 {
                return Err(ConfigError::Invalid("motor speeds must be > 0"));
            }
        }
        if !m.pull_back_target_mm.is_finite() || m.pull_back_target_mm <= 0.0 {
            return Err(ConfigError::Invalid("pull_back_target_mm must be > 0"));
        }

        let t = &self.tension;
        for v in [t.taut_v, t.slack_v, t.idle_setpoint_v, t.ceiling_v, t.release_v] {
            if !v.is_finite() || !(0.0..=3.3).contains(&v) {
                return Err(ConfigError::Invalid("tension thresholds must be within 0–3.3 V"));
            }
        }
        if t.slack_v >= t.taut_v {
            return Err(ConfigError::Invalid("slack_v must be below taut_v"));
        }
        if !(t.slack_v..=t.taut_v).contains(&t.idle_setpoint_v) {
            return Err(ConfigError::Invalid(
                "idle_setpoint_v must sit between slack_v and taut_v",
            ));
        }
        if t.ceiling_v <= t.idle_setpoint_v {
            return Err(ConfigError::Invalid("ceiling_v must be above idle_setpoint_v"));
        }
        if t.release_v >= t.idle_setpoint_v {
            return Err(ConfigError::Invalid("release_v must be below idle_setpoint_v"));
        }

        for d in self.channels.directions {
            if d != 1 && d != -1 {
                return Err(ConfigError::Invalid("channel directions must be -1 or 1"));
            }
        }
        if !self.channels.pwm_zero.is_finite()
            || !(0.0..=1000.0).contains(&self.channels.pwm_zero)
        {
            return Err(ConfigError::Invalid("pwm_zero must be within 0..=1000"));
        }

        if self.persist.save_debounce_ms < 500 {
            return Err(ConfigError::Invalid("save_debounce_ms floor is 500 ms"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_is_default_and_valid() {
        let cfg = Config::from_toml("").unwrap();
        assert_eq!(cfg.motion.send_speed, 1500.0);
        assert_eq!(cfg.channels.directions, [1, -1, 1, -1]);
    }
}
