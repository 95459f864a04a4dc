//! Builder failures surface the typed error through the report chain.

use mmu_core::config::Config;
use mmu_core::mocks::{MemStorage, SimHardware};
use mmu_core::{BuildError, FilamentEngineBuilder};

#[test]
fn missing_storage_is_reported_as_such() {
    let hw = SimHardware::new();
    let err = FilamentEngineBuilder::new()
        .motors(hw.clone())
        .sensors(hw.clone())
        .leds(hw)
        .try_build()
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<BuildError>(),
        Some(BuildError::MissingStorage)
    ));
}

#[test]
fn missing_motors_is_reported_first() {
    let err = FilamentEngineBuilder::new().try_build().unwrap_err();
    assert!(matches!(
        err.downcast_ref::<BuildError>(),
        Some(BuildError::MissingMotors)
    ));
}

#[test]
fn invalid_config_is_rejected_before_wiring() {
    let hw = SimHardware::new();
    let mut cfg = Config::default();
    cfg.motion.pull_back_target_mm = 0.0;
    let err = FilamentEngineBuilder::new()
        .motors(hw.clone())
        .sensors(hw.clone())
        .leds(hw)
        .storage(MemStorage::new())
        .config(cfg)
        .try_build()
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<BuildError>(),
        Some(BuildError::InvalidConfig(_))
    ));
}
