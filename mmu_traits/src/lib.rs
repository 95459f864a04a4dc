pub mod clock;

pub use clock::{Clock, MonotonicClock};

use std::error::Error;

/// Boxed error convention shared across the hardware boundary.
pub type HwResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

/// DC motor driver boundary: one signed PWM output per filament channel.
///
/// `power` is in the range -1000..=1000; 0 releases the channel.
pub trait Motors {
    fn set_power(&mut self, channel: usize, power: i16) -> HwResult<()>;
}

/// Per-channel sensor boundary: tension buffer voltage, filament presence
/// microswitch, and the raw 12-bit rotary encoder angle (0..4096).
pub trait Sensors {
    fn pressure_voltage(&mut self, channel: usize) -> HwResult<f32>;
    fn filament_present(&mut self, channel: usize) -> HwResult<bool>;
    fn encoder_ticks(&mut self, channel: usize) -> HwResult<u16>;
}

/// Addressable status LED boundary, one RGB pixel per channel.
pub trait StatusLeds {
    fn set(&mut self, channel: usize, r: u8, g: u8, b: u8) -> HwResult<()>;
}

/// Persistent record storage (flash page in the firmware).
///
/// `load` returns `None` when nothing readable is stored; the caller
/// validates magic/version on whatever comes back.
pub trait Storage {
    fn load(&mut self) -> HwResult<Option<Vec<u8>>>;
    fn save(&mut self, record: &[u8]) -> HwResult<()>;
}
