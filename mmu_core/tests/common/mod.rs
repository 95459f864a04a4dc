//! Shared simulated rig for the engine integration tests.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use mmu_core::mocks::{MemStorage, SimHardware};
use mmu_core::{FilamentEngine, FilamentEngineBuilder};
use mmu_traits::clock::test_clock::TestClock;

pub struct Rig {
    pub engine: FilamentEngine,
    pub hw: SimHardware,
    pub clock: Arc<TestClock>,
    pub storage: MemStorage,
}

pub fn rig() -> Rig {
    rig_with_storage(MemStorage::new())
}

pub fn rig_with_storage(storage: MemStorage) -> Rig {
    let hw = SimHardware::new();
    let clock = Arc::new(TestClock::new());
    let engine = FilamentEngineBuilder::new()
        .motors(hw.clone())
        .sensors(hw.clone())
        .leds(hw.clone())
        .storage(storage.clone())
        .clock(clock.clone())
        .try_build()
        .expect("rig builds");
    Rig {
        engine,
        hw,
        clock,
        storage,
    }
}

impl Rig {
    /// Advance simulated time and run one control step.
    pub fn step(&mut self, ms: u64) {
        self.clock.advance(Duration::from_millis(ms));
        self.engine.tick();
    }

    pub fn set_pressure(&self, channel: usize, volts: f32) {
        self.hw.state.lock().unwrap().pressure_v[channel] = volts;
    }

    pub fn set_present(&self, channel: usize, present: bool) {
        self.hw.state.lock().unwrap().present[channel] = present;
    }
}
