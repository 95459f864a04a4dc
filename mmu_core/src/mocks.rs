//! In-memory hardware doubles for tests and host-side simulation.
// Mutex poisoning cannot happen here outside an already-failing test.
#![allow(clippy::unwrap_used)]

use std::sync::{Arc, Mutex};

use mmu_traits::{HwResult, Motors, Sensors, StatusLeds, Storage};

use crate::state::CHANNEL_COUNT;

/// Observable state of the simulated rig. Tests mutate inputs (pressure,
/// presence, encoder) and assert on outputs (PWM, LEDs).
#[derive(Debug)]
pub struct SimState {
    pub pressure_v: [f32; CHANNEL_COUNT],
    pub present: [bool; CHANNEL_COUNT],
    pub ticks: [u16; CHANNEL_COUNT],
    pub pwm: [i16; CHANNEL_COUNT],
    pub leds: [(u8, u8, u8); CHANNEL_COUNT],
    pub led_writes: usize,
    /// When set, every sensor read fails with an I/O error.
    pub fail_sensors: bool,
}

impl Default for SimState {
    fn default() -> Self {
        Self {
            pressure_v: [1.65; CHANNEL_COUNT],
            present: [false; CHANNEL_COUNT],
            ticks: [0; CHANNEL_COUNT],
            pwm: [0; CHANNEL_COUNT],
            leds: [(0, 0, 0); CHANNEL_COUNT],
            led_writes: 0,
            fail_sensors: false,
        }
    }
}

/// Cloneable handle over shared simulated hardware; each clone can be boxed
/// behind a different trait object while tests keep their own handle.
#[derive(Debug, Clone, Default)]
pub struct SimHardware {
    pub state: Arc<Mutex<SimState>>,
}

impl SimHardware {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance a channel's encoder as if the wheel turned, wrapping at 4096.
    pub fn turn_encoder(&self, channel: usize, delta: i32) {
        let mut s = self.state.lock().unwrap();
        let next = (i32::from(s.ticks[channel]) + delta).rem_euclid(4096);
        s.ticks[channel] = next as u16;
    }

    pub fn pwm(&self, channel: usize) -> i16 {
        self.state.lock().unwrap().pwm[channel]
    }

    pub fn led(&self, channel: usize) -> (u8, u8, u8) {
        self.state.lock().unwrap().leds[channel]
    }
}

fn sensor_fault() -> Box<dyn std::error::Error + Send + Sync> {
    "simulated sensor fault".into()
}

impl Motors for SimHardware {
    fn set_power(&mut self, channel: usize, power: i16) -> HwResult<()> {
        self.state.lock().unwrap().pwm[channel] = power;
        Ok(())
    }
}

impl Sensors for SimHardware {
    fn pressure_voltage(&mut self, channel: usize) -> HwResult<f32> {
        let s = self.state.lock().unwrap();
        if s.fail_sensors {
            return Err(sensor_fault());
        }
        Ok(s.pressure_v[channel])
    }

    fn filament_present(&mut self, channel: usize) -> HwResult<bool> {
        let s = self.state.lock().unwrap();
        if s.fail_sensors {
            return Err(sensor_fault());
        }
        Ok(s.present[channel])
    }

    fn encoder_ticks(&mut self, channel: usize) -> HwResult<u16> {
        let s = self.state.lock().unwrap();
        if s.fail_sensors {
            return Err(sensor_fault());
        }
        Ok(s.ticks[channel])
    }
}

impl StatusLeds for SimHardware {
    fn set(&mut self, channel: usize, r: u8, g: u8, b: u8) -> HwResult<()> {
        let mut s = self.state.lock().unwrap();
        s.leds[channel] = (r, g, b);
        s.led_writes += 1;
        Ok(())
    }
}

/// Storage double backed by an in-memory cell; counts saves so tests can
/// assert on debounce behavior.
#[derive(Debug, Clone, Default)]
pub struct MemStorage {
    pub cell: Arc<Mutex<Option<Vec<u8>>>>,
    pub saves: Arc<Mutex<usize>>,
}

impl MemStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_record(record: Vec<u8>) -> Self {
        let s = Self::default();
        *s.cell.lock().unwrap() = Some(record);
        s
    }

    pub fn save_count(&self) -> usize {
        *self.saves.lock().unwrap()
    }
}

impl Storage for MemStorage {
    fn load(&mut self) -> HwResult<Option<Vec<u8>>> {
        Ok(self.cell.lock().unwrap().clone())
    }

    fn save(&mut self, record: &[u8]) -> HwResult<()> {
        *self.cell.lock().unwrap() = Some(record.to_vec());
        *self.saves.lock().unwrap() += 1;
        Ok(())
    }
}

/// Storage that holds nothing and discards writes.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullStorage;

impl Storage for NullStorage {
    fn load(&mut self) -> HwResult<Option<Vec<u8>>> {
        Ok(None)
    }

    fn save(&mut self, _record: &[u8]) -> HwResult<()> {
        Ok(())
    }
}
