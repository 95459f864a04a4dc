//! Sensor fusion: raw analog/digital/encoder inputs become per-channel
//! semantic signals once per tick.
//!
//! Hardware read failures and non-finite values never propagate: the
//! previous sample is reused and the fault is logged, because a control
//! loop must keep ticking on a noisy rig.

use mmu_traits::Sensors;

use crate::config::{ENCODER_TICKS, TensionCfg, WHEEL_CIRCUMFERENCE_MM};
use crate::state::{CHANNEL_COUNT, FilamentState, FilamentStatus, Tension};

/// Fused view of one channel for the current tick.
#[derive(Debug, Clone, Copy)]
pub struct ChannelSample {
    /// Buffer tension voltage, 0.0–3.3 V.
    pub pressure_v: f32,
    pub tension: Tension,
    pub present: bool,
    /// Signed travel since the previous tick, millimeters.
    pub moved_mm: f32,
    /// Instantaneous speed, mm/s.
    pub speed_mm_s: f32,
}

impl Default for ChannelSample {
    fn default() -> Self {
        Self {
            pressure_v: 0.0,
            tension: Tension::Normal,
            present: false,
            moved_mm: 0.0,
            speed_mm_s: 0.0,
        }
    }
}

#[derive(Debug)]
pub struct SensorFusion {
    tension: TensionCfg,
    samples: [ChannelSample; CHANNEL_COUNT],
    last_ticks: [u16; CHANNEL_COUNT],
    primed: [bool; CHANNEL_COUNT],
}

impl SensorFusion {
    pub fn new(tension: TensionCfg) -> Self {
        Self {
            tension,
            samples: Default::default(),
            last_ticks: [0; CHANNEL_COUNT],
            primed: [false; CHANNEL_COUNT],
        }
    }

    pub fn channel(&self, channel: usize) -> &ChannelSample {
        &self.samples[channel]
    }

    pub fn tension(&self) -> &TensionCfg {
        &self.tension
    }

    /// Sample every channel and fold side effects into the filament
    /// records: presence drives status online/offline, travel feeds the
    /// consumption ledger, and the tension code is mirrored for reporting.
    pub fn update(
        &mut self,
        hw: &mut dyn Sensors,
        filaments: &mut [FilamentState; CHANNEL_COUNT],
        dt_s: f32,
    ) {
        for ch in 0..CHANNEL_COUNT {
            let sample = &mut self.samples[ch];

            match hw.pressure_voltage(ch) {
                Ok(v) if v.is_finite() => sample.pressure_v = v,
                Ok(v) => tracing::warn!(channel = ch, value = v, "non-finite pressure reading"),
                Err(e) => tracing::warn!(channel = ch, error = %e, "pressure read failed"),
            }
            sample.tension = if sample.pressure_v > self.tension.taut_v {
                Tension::Taut
            } else if sample.pressure_v < self.tension.slack_v {
                Tension::Slack
            } else {
                Tension::Normal
            };

            match hw.filament_present(ch) {
                Ok(p) => sample.present = p,
                Err(e) => tracing::warn!(channel = ch, error = %e, "presence read failed"),
            }
            let f = &mut filaments[ch];
            if sample.present {
                if f.status == FilamentStatus::Offline {
                    f.status = FilamentStatus::Online;
                }
            } else {
                f.status = FilamentStatus::Offline;
            }

            match hw.encoder_ticks(ch) {
                Ok(now) => {
                    let now = now & 0x0FFF;
                    if !self.primed[ch] {
                        self.last_ticks[ch] = now;
                        self.primed[ch] = true;
                        sample.moved_mm = 0.0;
                        sample.speed_mm_s = 0.0;
                    } else {
                        let last = self.last_ticks[ch];
                        // circular-wrap correction across the 0/4095 seam
                        let mut delta = i32::from(now) - i32::from(last);
                        if now > 3072 && last <= 1024 {
                            delta -= 4096;
                        } else if now <= 1024 && last > 3072 {
                            delta += 4096;
                        }
                        self.last_ticks[ch] = now;
                        let dist = -(delta as f32) * WHEEL_CIRCUMFERENCE_MM / ENCODER_TICKS;
                        sample.moved_mm = dist;
                        sample.speed_mm_s = dist / dt_s.max(0.001);
                        f.meters += dist / 1000.0;
                    }
                }
                Err(e) => {
                    tracing::warn!(channel = ch, error = %e, "encoder read failed");
                    sample.moved_mm = 0.0;
                    sample.speed_mm_s = 0.0;
                }
            }

            let code = (sample.pressure_v * 1000.0).clamp(0.0, f32::from(u16::MAX));
            f.pressure = code as u16;
        }
    }
}
