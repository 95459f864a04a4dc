//! Engine-level behavior: channel exclusivity, bus motion commands,
//! connectivity, and status LEDs.

mod common;

use common::rig;
use mmu_core::{FilamentMotion, MotionPosition, MotionRequest};
use rstest::rstest;

#[rstest]
#[case(0x09, 0xA5, MotionRequest::NeedSendOut)]
#[case(0x07, 0x00, MotionRequest::InUse)]
#[case(0x03, 0x00, MotionRequest::NeedPullBack)]
#[case(0x00, 0x00, MotionRequest::Idle)]
fn motion_commands_map_to_requests(
    #[case] code: u8,
    #[case] arg: u8,
    #[case] expected: MotionRequest,
) {
    let mut r = rig();
    r.engine.heartbeat();
    r.set_present(0, true);
    // select first so the follow-up commands have an active channel
    r.engine.process_motion_short(0, 0x09, 0xA5);
    r.engine.process_motion_short(0, code, arg);
    assert_eq!(r.engine.filament(0).motion_set, expected);
}

#[test]
fn out_of_range_channels_are_ignored() {
    let mut r = rig();
    r.engine.process_motion_short(9, 0x09, 0xA5);
    assert_eq!(r.engine.active_channel(), None);
    r.engine.set_auto_feed(9, true);
    r.engine.start_load(9, None);
    r.engine.start_unload(9, None);
    r.engine.move_axis(9, 10.0, None);
    r.step(10);
    for ch in 0..4 {
        assert_eq!(r.engine.channel_motion(ch), FilamentMotion::PressureCtrlIdle);
    }
    // accessors fall back instead of panicking on a wild index
    assert_eq!(r.engine.channel_motion(9), FilamentMotion::Stop);
    assert_eq!(r.engine.position(9), MotionPosition::Idle);
    assert_eq!(r.engine.filament(9).id, r.engine.filament(0).id);
}

#[test]
fn selecting_a_new_channel_idles_the_previous_one_within_a_tick() {
    let mut r = rig();
    r.engine.heartbeat();
    r.set_present(0, true);
    r.set_present(1, true);

    r.engine.process_motion_short(0, 0x09, 0xA5);
    r.step(10);
    assert_eq!(r.engine.active_channel(), Some(0));
    assert_eq!(r.engine.position(0), MotionPosition::SendingOut);

    r.engine.process_motion_short(1, 0x09, 0xA5);
    r.step(10);
    assert_eq!(r.engine.active_channel(), Some(1));
    assert_eq!(r.engine.filament(0).motion_set, MotionRequest::Idle);
    assert_eq!(r.engine.position(0), MotionPosition::Idle);
    assert_eq!(r.engine.position(1), MotionPosition::SendingOut);
    // every unselected channel holds its buffer at the idle setpoint
    for ch in [0, 2, 3] {
        assert_eq!(
            r.engine.channel_motion(ch),
            FilamentMotion::PressureCtrlIdle
        );
    }
}

#[test]
fn sending_out_holds_send_until_the_bus_flips_in_use() {
    let mut r = rig();
    r.engine.heartbeat();
    r.set_present(0, true);
    r.engine.process_motion_short(0, 0x09, 0xA5);

    r.step(10);
    assert_eq!(r.engine.channel_motion(0), FilamentMotion::Send);
    assert!(r.hw.pwm(0) > 0, "feed drives forward");

    // the toolhead grabbing the filament is not enough: the printer owns
    // the handoff, so a taut buffer alone keeps the feed running
    r.set_pressure(0, 1.90);
    r.step(10);
    assert_eq!(r.engine.filament(0).motion_set, MotionRequest::NeedSendOut);
    assert_eq!(r.engine.position(0), MotionPosition::SendingOut);
    assert_eq!(r.engine.channel_motion(0), FilamentMotion::Send);

    r.engine.process_motion_short(0, 0x07, 0x00);
    r.step(10);
    assert_eq!(r.engine.position(0), MotionPosition::Using);
    // settle window first, tension tracking after
    assert_eq!(r.engine.channel_motion(0), FilamentMotion::SlowSend);
    r.step(1600);
    assert_eq!(
        r.engine.channel_motion(0),
        FilamentMotion::PressureCtrlInUse
    );
}

#[test]
fn explicit_in_use_command_opens_a_settle_window() {
    let mut r = rig();
    r.engine.heartbeat();
    r.set_present(2, true);
    r.engine.process_motion_short(2, 0x09, 0xA5);
    r.step(10);

    r.engine.process_motion_short(2, 0x07, 0x00);
    r.step(10);
    assert_eq!(r.engine.position(2), MotionPosition::Using);
    assert_eq!(r.engine.channel_motion(2), FilamentMotion::SlowSend);
    r.step(2000);
    assert_eq!(
        r.engine.channel_motion(2),
        FilamentMotion::PressureCtrlInUse
    );
}

#[test]
fn broadcast_idle_deselects_everything() {
    let mut r = rig();
    r.engine.heartbeat();
    r.set_present(0, true);
    r.engine.process_motion_short(0, 0x09, 0xA5);
    r.step(10);
    assert_eq!(r.engine.active_channel(), Some(0));

    r.engine.process_motion_short(0xFF, 0x00, 0x00);
    r.step(10);
    assert_eq!(r.engine.active_channel(), None);
    assert_eq!(
        r.engine.channel_motion(0),
        FilamentMotion::PressureCtrlIdle
    );
}

#[test]
fn heartbeat_loss_forces_all_channels_safe() {
    let mut r = rig();
    r.engine.heartbeat();
    r.set_present(0, true);
    r.engine.process_motion_short(0, 0x09, 0xA5);
    r.step(10);
    assert!(r.engine.is_connected());
    assert!(r.hw.pwm(0) != 0);

    // bus goes silent past the timeout
    r.step(4000);
    assert!(!r.engine.is_connected());
    assert_eq!(r.engine.channel_motion(0), FilamentMotion::Stop);
    assert_eq!(r.hw.pwm(0), 0);
}

#[test]
fn taut_and_slack_buffers_color_the_status_led() {
    let mut r = rig();
    r.engine.heartbeat();
    r.set_present(0, true);
    r.engine.process_motion_short(0, 0x09, 0xA5);

    r.set_pressure(0, 1.90);
    r.step(10);
    assert_eq!(r.hw.led(0), (255, 0, 0));

    r.set_pressure(0, 1.30);
    r.step(10);
    assert_eq!(r.hw.led(0), (0, 0, 255));
}

#[test]
fn auto_feed_runs_a_tension_loop_outside_the_machine() {
    let mut r = rig();
    r.set_present(3, true);
    r.engine.set_auto_feed(3, true);
    r.step(10);
    assert_eq!(
        r.engine.channel_motion(3),
        FilamentMotion::PressureCtrlInUse
    );

    // channel 3 direction is inverted, so relief drives negative
    r.set_pressure(3, 1.90);
    r.step(10);
    assert!(r.hw.pwm(3) < 0, "taut buffer is relieved");
    r.set_pressure(3, 1.50);
    r.step(10);
    assert!(r.hw.pwm(3) > 0, "slack buffer is taken up");

    // the loop survives a printer disconnect untouched
    r.engine.heartbeat();
    r.step(4000);
    assert!(!r.engine.is_connected());
    assert_eq!(
        r.engine.channel_motion(3),
        FilamentMotion::PressureCtrlInUse
    );

    r.engine.set_auto_feed(3, false);
    assert_eq!(r.engine.channel_motion(3), FilamentMotion::Stop);
}

#[test]
fn run_out_assist_keeps_nudging_after_presence_drops() {
    let mut r = rig();
    r.set_present(1, true);
    r.step(10);
    assert_eq!(
        r.engine.channel_motion(1),
        FilamentMotion::PressureCtrlIdle
    );

    // spool runs out mid-hold
    r.set_present(1, false);
    r.step(10);
    // channel 1 direction is inverted, so the nudge saturates negative
    assert_eq!(r.hw.pwm(1), -1000);

    // tail reaches the next presence switch: assist stops
    r.set_present(1, true);
    r.set_pressure(1, 1.65);
    r.step(10);
    assert_eq!(r.hw.pwm(1), 0);
}

#[test]
fn sensor_bitmask_tracks_presence() {
    let mut r = rig();
    r.set_present(0, true);
    r.set_present(2, true);
    r.step(10);
    assert_eq!(r.engine.sensor_bitmask(), 0b0101);
}

#[test]
fn sensor_faults_keep_the_loop_running_on_stale_data() {
    let mut r = rig();
    r.set_present(0, true);
    r.set_pressure(0, 1.90);
    r.step(10);
    assert_eq!(r.engine.sensor_bitmask(), 0b0001);

    r.hw.state.lock().unwrap().fail_sensors = true;
    r.step(10);
    // stale values survive the fault
    assert_eq!(r.engine.sensor_bitmask(), 0b0001);
    assert_eq!(r.engine.filament(0).pressure, 1900);
}
