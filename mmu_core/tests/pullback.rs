//! Automatic pull-back: retract a fixed distance, complete exactly once,
//! and report progress on the status LED.

mod common;

use common::rig;
use mmu_core::{FilamentMotion, MotionPosition, MotionRequest};

/// Wheel travel for one 1000-tick encoder increment, in millimeters.
const STEP_MM: f32 = 1000.0 * core::f32::consts::PI * 7.5 / 4096.0;

fn start_pull_back(r: &mut common::Rig) {
    r.engine.heartbeat();
    r.set_present(0, true);
    r.engine.process_motion_short(0, 0x09, 0xA5);
    r.step(10);
    r.engine.process_motion_short(0, 0x03, 0x00);
    r.step(10);
    assert_eq!(r.engine.position(0), MotionPosition::PullingBack);
    // the ramp takes the motor over on the following tick
    r.step(10);
    assert_eq!(r.engine.channel_motion(0), FilamentMotion::Pull);
}

#[test]
fn pull_back_completes_after_the_target_distance() {
    let mut r = rig();
    start_pull_back(&mut r);

    // 200 mm at ~5.75 mm per tick: must not finish before 34 increments,
    // must finish within one tick of crossing the target
    let need = (200.0 / STEP_MM).floor() as usize;
    for _ in 0..need {
        assert_eq!(r.engine.position(0), MotionPosition::PullingBack);
        r.engine.heartbeat();
        r.hw.turn_encoder(0, 1000);
        r.step(10);
    }
    // crossed the target on the last increment; the next tick closes out
    r.engine.heartbeat();
    r.hw.turn_encoder(0, 1000);
    r.step(10);
    r.engine.heartbeat();
    r.step(10);

    assert_eq!(r.engine.position(0), MotionPosition::Idle);
    assert_eq!(r.engine.channel_motion(0), FilamentMotion::Stop);
    assert_eq!(r.engine.filament(0).motion_set, MotionRequest::Idle);
}

#[test]
fn pull_back_completion_is_stable() {
    let mut r = rig();
    start_pull_back(&mut r);
    for _ in 0..40 {
        r.engine.heartbeat();
        r.hw.turn_encoder(0, 1000);
        r.step(10);
    }
    for _ in 0..5 {
        r.engine.heartbeat();
        r.step(10);
        assert_eq!(r.engine.position(0), MotionPosition::Idle);
        assert_eq!(
            r.engine.channel_motion(0),
            FilamentMotion::PressureCtrlIdle
        );
    }
}

#[test]
fn pull_back_led_fades_from_red_toward_blue() {
    let mut r = rig();
    start_pull_back(&mut r);

    r.engine.heartbeat();
    r.hw.turn_encoder(0, 1000);
    r.step(10);
    let early = r.hw.led(0);
    assert!(early.0 > 200, "starts near full red, got {early:?}");

    // roughly half way through the retract
    for _ in 0..16 {
        r.engine.heartbeat();
        r.hw.turn_encoder(0, 1000);
        r.step(10);
    }
    let mid = r.hw.led(0);
    assert!(mid.0 < early.0, "red fades with progress");
    assert!(mid.2 > early.2, "blue rises with progress");
}

#[test]
fn deselecting_mid_pull_back_abandons_the_ramp() {
    let mut r = rig();
    start_pull_back(&mut r);
    r.engine.process_motion_short(0xFF, 0x00, 0x00);
    r.step(10);
    assert_eq!(r.engine.active_channel(), None);
    assert_eq!(r.engine.position(0), MotionPosition::Idle);
    assert_eq!(
        r.engine.channel_motion(0),
        FilamentMotion::PressureCtrlIdle
    );
}

#[test]
fn lite_identity_starts_the_retract_in_the_same_tick() {
    let mut r = rig();
    r.engine.set_device_kind(mmu_core::DeviceKind::AmsLite);
    r.engine.heartbeat();
    r.set_present(0, true);
    r.engine.process_motion_short(0, 0x09, 0xA5);
    r.step(10);

    r.engine.process_motion_short(0, 0x03, 0x00);
    r.step(10);
    assert_eq!(r.engine.position(0), MotionPosition::PullingBack);
    assert_eq!(r.engine.channel_motion(0), FilamentMotion::Pull);
}

#[test]
fn retract_starts_even_while_the_buffer_is_taut() {
    let mut r = rig();
    r.engine.heartbeat();
    r.set_present(0, true);
    r.engine.process_motion_short(0, 0x09, 0xA5);
    r.step(10);

    // the extruder has not let go yet; the retract must not wait for it
    r.set_pressure(0, 1.90);
    r.engine.process_motion_short(0, 0x03, 0x00);
    r.step(10);
    assert_eq!(r.engine.position(0), MotionPosition::PullingBack);
    r.step(10);
    assert_eq!(r.engine.channel_motion(0), FilamentMotion::Pull);
}
