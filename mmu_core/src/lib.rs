#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Control core for a 4-channel multi-material filament feeder.
//!
//! All hardware interactions go through the `mmu_traits` boundary traits, so
//! the engine runs identically against real drivers and the scripted rig in
//! [`mocks`]. The design is single-threaded: everything advances from one
//! periodic [`engine::FilamentEngine::tick`], which re-samples the sensors,
//! advances the per-channel motion state machine, and drives each motor's
//! PID pair. The only concurrency is the transport byte handoff in
//! [`transport`].
//!
//! ## Architecture
//!
//! - **Sensor fusion** (`sensors`): tension voltage, presence, and wrapped
//!   encoder ticks fused into per-channel samples and a consumption ledger.
//! - **Motor control** (`pid`, `motor`): speed and tension PID controllers
//!   behind one motion-mode switch per channel, with deadband/offset PWM
//!   shaping.
//! - **Orchestration** (`engine`): active-channel exclusivity, the
//!   feed/retract/load/unload state machine, and debounced persistence.
//! - **Persistence** (`persist`): fixed-layout record codec guarded by a
//!   magic check value and a version tag.

pub mod config;
pub mod engine;
pub mod error;
pub mod mocks;
pub mod motor;
pub mod persist;
pub mod pid;
pub mod sensors;
pub mod state;
pub mod transport;

pub use engine::{FilamentEngine, FilamentEngineBuilder};
pub use error::BuildError;
pub use motor::FilamentMotion;
pub use state::{
    CHANNEL_COUNT, DeviceKind, FilamentInfo, FilamentState, FilamentStatus, MotionPosition,
    MotionRequest, Tension,
};
