//! Engine orchestration.
//!
//! One [`FilamentEngine::tick`] call advances everything: sensor fusion,
//! the active-channel exclusivity rule, the per-channel motion state
//! machine, motor drives, status LEDs, and debounced persistence. All
//! hardware goes through boxed `mmu_traits` objects, so the engine runs
//! unchanged against the simulated rig in [`crate::mocks`].

use std::sync::Arc;
use std::time::Instant;

use mmu_traits::{Clock, Motors, MonotonicClock, Sensors, StatusLeds, Storage};

use crate::config::{Config, SETTLE_MS, VIRTUAL_FEED_BOUND_MS, VIRTUAL_FEED_MM_PER_S};
use crate::error::{self, BuildError};
use crate::motor::{Drive, FilamentMotion, MotorChannel, MotorContext};
use crate::persist::PersistRecord;
use crate::sensors::{ChannelSample, SensorFusion};
use crate::state::{
    CHANNEL_COUNT, DeviceKind, FilamentInfo, FilamentState, MotionPosition, MotionRequest,
};

/// Bus silence after which the printer counts as disconnected and all
/// channels are forced safe.
pub const HEARTBEAT_TIMEOUT_MS: u64 = 3000;

/// Builder over the four hardware boundaries plus clock and tuning.
pub struct FilamentEngineBuilder {
    motors: Option<Box<dyn Motors>>,
    sensors: Option<Box<dyn Sensors>>,
    leds: Option<Box<dyn StatusLeds>>,
    storage: Option<Box<dyn Storage>>,
    clock: Arc<dyn Clock>,
    config: Config,
}

impl Default for FilamentEngineBuilder {
    fn default() -> Self {
        Self {
            motors: None,
            sensors: None,
            leds: None,
            storage: None,
            clock: Arc::new(MonotonicClock::new()),
            config: Config::default(),
        }
    }
}

impl FilamentEngineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn motors(mut self, motors: impl Motors + 'static) -> Self {
        self.motors = Some(Box::new(motors));
        self
    }

    pub fn sensors(mut self, sensors: impl Sensors + 'static) -> Self {
        self.sensors = Some(Box::new(sensors));
        self
    }

    pub fn leds(mut self, leds: impl StatusLeds + 'static) -> Self {
        self.leds = Some(Box::new(leds));
        self
    }

    pub fn storage(mut self, storage: impl Storage + 'static) -> Self {
        self.storage = Some(Box::new(storage));
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Validate the configuration, wire up the hardware, and restore the
    /// persisted record (falling back to defaults, which are then written
    /// back so the next boot finds a valid record).
    pub fn try_build(self) -> error::Result<FilamentEngine> {
        if let Err(e) = self.config.validate() {
            let msg = match e {
                mmu_config::ConfigError::Invalid(msg) => msg,
                mmu_config::ConfigError::Parse(_) => "unparsable",
            };
            return Err(eyre::Report::new(BuildError::InvalidConfig(msg)));
        }
        let motors = self
            .motors
            .ok_or_else(|| eyre::Report::new(BuildError::MissingMotors))?;
        let sensors = self
            .sensors
            .ok_or_else(|| eyre::Report::new(BuildError::MissingSensors))?;
        let leds = self
            .leds
            .ok_or_else(|| eyre::Report::new(BuildError::MissingLeds))?;
        let mut storage = self
            .storage
            .ok_or_else(|| eyre::Report::new(BuildError::MissingStorage))?;

        let cfg = self.config;
        let mut channels: [MotorChannel; CHANNEL_COUNT] = core::array::from_fn(|i| {
            MotorChannel::new(
                cfg.channels.directions[i],
                cfg.channels.pwm_zero,
                &cfg.pid,
                cfg.tension.clone(),
                cfg.motion.send_speed,
                cfg.motion.lite_send_speed,
                cfg.motion.slow_send_speed,
                cfg.motion.pull_speed,
            )
        });

        let restored = match storage.load() {
            Ok(Some(raw)) => PersistRecord::decode(&raw),
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(error = %e, "storage load failed, using defaults");
                None
            }
        };
        let record = match restored {
            Some(rec) => rec,
            None => {
                let rec = PersistRecord::default();
                if let Err(e) = storage.save(&rec.encode()) {
                    tracing::warn!(error = %e, "could not write default record");
                }
                rec
            }
        };
        // auto-fed channels resume their tension loop straight from boot
        for (ch, on) in record.auto_feed.iter().enumerate() {
            if *on {
                channels[ch].set_motion(FilamentMotion::PressureCtrlInUse);
            }
        }

        let epoch = self.clock.now();
        let fusion = SensorFusion::new(cfg.tension.clone());
        Ok(FilamentEngine {
            motors,
            sensors,
            leds,
            storage,
            clock: self.clock,
            epoch,
            fusion,
            channels,
            filaments: record.filaments,
            positions: [MotionPosition::Idle; CHANNEL_COUNT],
            samples: [ChannelSample::default(); CHANNEL_COUNT],
            active: record.active,
            device: record.device,
            auto_feed: record.auto_feed,
            assist: [false; CHANNEL_COUNT],
            prev_present: [false; CHANNEL_COUNT],
            move_target_mm: [None; CHANNEL_COUNT],
            is_backing_out: false,
            settle_until_ms: 0,
            pull_back_target_mm: cfg.motion.pull_back_target_mm,
            save_debounce_ms: cfg.persist.save_debounce_ms,
            dirty: false,
            dirty_since_ms: 0,
            connected: false,
            last_heartbeat_ms: 0,
            last_tick_ms: 0,
        })
    }
}

pub struct FilamentEngine {
    motors: Box<dyn Motors>,
    sensors: Box<dyn Sensors>,
    leds: Box<dyn StatusLeds>,
    storage: Box<dyn Storage>,
    clock: Arc<dyn Clock>,
    epoch: Instant,

    fusion: SensorFusion,
    channels: [MotorChannel; CHANNEL_COUNT],
    filaments: [FilamentState; CHANNEL_COUNT],
    positions: [MotionPosition; CHANNEL_COUNT],
    samples: [ChannelSample; CHANNEL_COUNT],

    active: Option<usize>,
    device: DeviceKind,
    auto_feed: [bool; CHANNEL_COUNT],
    assist: [bool; CHANNEL_COUNT],
    prev_present: [bool; CHANNEL_COUNT],
    move_target_mm: [Option<f32>; CHANNEL_COUNT],
    is_backing_out: bool,
    settle_until_ms: u64,
    pull_back_target_mm: f32,

    save_debounce_ms: u64,
    dirty: bool,
    dirty_since_ms: u64,

    connected: bool,
    last_heartbeat_ms: u64,
    last_tick_ms: u64,
}

impl std::fmt::Debug for FilamentEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilamentEngine").finish_non_exhaustive()
    }
}

impl FilamentEngine {
    pub fn builder() -> FilamentEngineBuilder {
        FilamentEngineBuilder::new()
    }

    fn now_ms(&self) -> u64 {
        self.clock.ms_since(self.epoch)
    }

    /// Mark persistent state changed; restarts the save debounce window.
    fn touch(&mut self) {
        self.dirty = true;
        self.dirty_since_ms = self.now_ms();
    }

    /// One control-loop step. Call this periodically (the firmware rate is
    /// on the order of milliseconds; any steady cadence works).
    pub fn tick(&mut self) {
        let now = self.now_ms();
        let dt_ms = now.saturating_sub(self.last_tick_ms);
        let dt_s = dt_ms as f32 / 1000.0;
        self.last_tick_ms = now;

        if self.connected && now.saturating_sub(self.last_heartbeat_ms) > HEARTBEAT_TIMEOUT_MS {
            tracing::warn!("bus heartbeat lost, forcing channels safe");
            self.connected = false;
            self.force_safe();
        }

        self.fusion
            .update(self.sensors.as_mut(), &mut self.filaments, dt_s);
        for ch in 0..CHANNEL_COUNT {
            self.samples[ch] = *self.fusion.channel(ch);
        }

        self.update_assist();
        self.track_virtual_feed(dt_ms, dt_s);
        // a retract ramp owns the whole motor switch until it completes
        if !self.prepare_pull_back() {
            for ch in 0..CHANNEL_COUNT {
                self.decide(ch, now);
            }
        }
        self.drive(dt_s);
        self.maybe_save(now);
    }

    /// Latch the run-out assist: a channel whose filament runs out keeps
    /// nudging the tail forward until presence returns. Commanded retracts
    /// drop presence on purpose and do not latch.
    fn update_assist(&mut self) {
        for ch in 0..CHANNEL_COUNT {
            let present = self.samples[ch].present;
            if present {
                self.assist[ch] = false;
            } else if self.prev_present[ch]
                && !matches!(
                    self.positions[ch],
                    MotionPosition::Unloading | MotionPosition::PullingBack
                )
            {
                self.assist[ch] = true;
            }
            self.prev_present[ch] = present;
        }
    }

    /// While the printer consumes filament the encoder can stall (the
    /// buffer absorbs the motion). Extrapolate the ledger at a nominal
    /// feed rate, bounded so a genuine jam cannot inflate it forever.
    fn track_virtual_feed(&mut self, dt_ms: u64, dt_s: f32) {
        let Some(a) = self.active else { return };
        if self.positions[a] != MotionPosition::Using {
            return;
        }
        let f = &mut self.filaments[a];
        if self.samples[a].moved_mm.abs() < 0.01 {
            f.meters_virtual_count = f.meters_virtual_count.saturating_add(dt_ms as u32);
            if f.meters_virtual_count <= VIRTUAL_FEED_BOUND_MS {
                f.meters += VIRTUAL_FEED_MM_PER_S * dt_s / 1000.0;
            }
        } else {
            f.meters_virtual_count = 0;
        }
    }

    /// Drive a pending retract ramp to completion. While any channel is
    /// pulling back the per-channel decisions are suppressed, so the ramp
    /// cannot be preempted mid-travel.
    fn prepare_pull_back(&mut self) -> bool {
        let mut ramping = false;
        for ch in 0..CHANNEL_COUNT {
            if self.positions[ch] != MotionPosition::PullingBack {
                continue;
            }
            ramping = true;
            if self.channels[ch].accumulated_distance < self.pull_back_target_mm {
                self.channels[ch].set_motion(FilamentMotion::Pull);
            } else {
                self.is_backing_out = false;
                self.channels[ch].set_motion(FilamentMotion::Stop);
                self.positions[ch] = MotionPosition::Idle;
                self.filaments[ch].motion_set = MotionRequest::Idle;
                self.touch();
            }
        }
        ramping
    }

    /// Pick this tick's control law for one channel.
    fn decide(&mut self, ch: usize, now: u64) {
        let sample = self.samples[ch];

        match self.positions[ch] {
            MotionPosition::Loading => {
                if !sample.present {
                    // filament slipped out of the gate: abort the load
                    self.finish_into_idle_hold(ch);
                } else if sample.pressure_v > self.tension_taut() {
                    // toolhead took the filament before the budget ran out
                    self.filaments[ch].motion_set = MotionRequest::InUse;
                    self.positions[ch] = MotionPosition::Using;
                    self.settle_until_ms = now;
                    self.channels[ch].set_motion(FilamentMotion::PressureCtrlInUse);
                    self.channels[ch].hold_until_slack();
                    self.move_target_mm[ch] = None;
                    self.touch();
                } else if self.budget_reached(ch) {
                    self.finish_into_idle_hold(ch);
                } else if sample.pressure_v >= self.tension_ceiling() {
                    self.channels[ch].set_motion(FilamentMotion::SlowSend);
                } else {
                    self.channels[ch].set_motion(FilamentMotion::Send);
                }
            }
            MotionPosition::Unloading => {
                let done = self.move_target_mm[ch].map_or(!sample.present, |t| {
                    self.channels[ch].accumulated_distance >= t
                });
                if done {
                    self.finish_move(ch);
                    self.filaments[ch].motion_set = MotionRequest::Idle;
                    self.touch();
                } else {
                    self.channels[ch].set_motion(FilamentMotion::Pull);
                }
            }
            _ => {
                if self.channels[ch].motion() == FilamentMotion::VelocityControl {
                    if self.budget_reached(ch) {
                        self.finish_move(ch);
                    }
                    return;
                }
                // auto-fed channels run their tension loop outside the
                // motion state machine entirely
                if self.auto_feed[ch] {
                    return;
                }
                // any channel the printer has not selected holds its
                // buffer at the idle setpoint
                if self.active != Some(ch) {
                    if self.filaments[ch].motion_set != MotionRequest::Idle {
                        self.filaments[ch].motion_set = MotionRequest::Idle;
                        self.touch();
                    }
                    self.positions[ch] = MotionPosition::Idle;
                    self.channels[ch].set_motion(FilamentMotion::PressureCtrlIdle);
                    return;
                }
                // bus motion only executes while the printer is alive;
                // the pending request survives for a reconnect
                if self.connected {
                    self.decide_active(ch, now);
                }
            }
        }
    }

    fn decide_active(&mut self, ch: usize, now: u64) {
        match self.filaments[ch].motion_set {
            MotionRequest::NeedSendOut => {
                // keep feeding until the printer itself flips us in-use
                self.positions[ch] = MotionPosition::SendingOut;
                self.channels[ch].set_motion(FilamentMotion::Send);
            }
            MotionRequest::InUse | MotionRequest::BeforePullBack => match self.positions[ch] {
                MotionPosition::SendingOut => {
                    self.is_backing_out = false;
                    self.enter_in_use(ch, now);
                }
                MotionPosition::Using => {
                    if now < self.settle_until_ms {
                        self.channels[ch].set_motion(FilamentMotion::SlowSend);
                    } else {
                        self.channels[ch].set_motion(FilamentMotion::PressureCtrlInUse);
                    }
                }
                _ => {}
            },
            MotionRequest::NeedPullBack => {
                self.is_backing_out = true;
                self.positions[ch] = MotionPosition::PullingBack;
                // the lite identity retracts in place; otherwise the ramp
                // picks the channel up on the next tick
                if self.device == DeviceKind::AmsLite {
                    self.channels[ch].set_motion(FilamentMotion::Pull);
                }
            }
            MotionRequest::Idle => {
                self.positions[ch] = MotionPosition::Idle;
                self.channels[ch].set_motion(FilamentMotion::PressureCtrlIdle);
            }
        }
    }

    /// Hand the filament to the printer: settle window first, tension
    /// tracking after, and no correction until the buffer relaxes once.
    fn enter_in_use(&mut self, ch: usize, now: u64) {
        self.positions[ch] = MotionPosition::Using;
        self.settle_until_ms = now + SETTLE_MS;
        self.channels[ch].set_motion(FilamentMotion::SlowSend);
        self.channels[ch].hold_until_slack();
    }

    fn finish_into_idle_hold(&mut self, ch: usize) {
        self.channels[ch].set_motion(FilamentMotion::PressureCtrlIdle);
        self.positions[ch] = MotionPosition::Idle;
        self.move_target_mm[ch] = None;
    }

    fn budget_reached(&self, ch: usize) -> bool {
        self.move_target_mm[ch]
            .is_some_and(|t| self.channels[ch].accumulated_distance >= t)
    }

    fn finish_move(&mut self, ch: usize) {
        self.channels[ch].set_motion(FilamentMotion::Stop);
        self.positions[ch] = MotionPosition::Idle;
        self.move_target_mm[ch] = None;
    }

    /// Run every motor's control law and mirror the result onto the LEDs.
    fn drive(&mut self, dt_s: f32) {
        let gentle = self.device == DeviceKind::AmsLite;
        for ch in 0..CHANNEL_COUNT {
            let sample = self.samples[ch];
            let ctx = MotorContext {
                sample: &sample,
                dt_s,
                gentle,
                assist: self.assist[ch],
            };
            let drive = self.channels[ch].run(&ctx);
            let pwm = match drive {
                Drive::Pwm(pwm) => pwm,
                Drive::Stopped => 0,
            };
            if let Err(e) = self.motors.set_power(ch, pwm) {
                tracing::warn!(channel = ch, error = %e, "motor write failed");
            }
            // LEDs hold their last value while the channel is released
            if drive == Drive::Stopped {
                continue;
            }
            let (r, g, b) = self.led_color(ch, &sample);
            if let Err(e) = self.leds.set(ch, r, g, b) {
                tracing::warn!(channel = ch, error = %e, "led write failed");
            }
        }
    }

    fn led_color(&self, ch: usize, sample: &ChannelSample) -> (u8, u8, u8) {
        if self.is_backing_out && self.positions[ch] == MotionPosition::PullingBack {
            // red-to-blue gradient tracking retract progress
            let pct = ((self.channels[ch].accumulated_distance / self.pull_back_target_mm)
                * 100.0)
                .clamp(0.0, 100.0) as i32;
            let r = (255 - 2 * pct).max(0) as u8;
            let g = (125 - pct).max(0) as u8;
            let b = (2 * pct).min(255) as u8;
            return (r, g, b);
        }
        if sample.pressure_v > self.tension_taut() {
            return (255, 0, 0);
        }
        if sample.pressure_v < self.tension_slack() {
            return (0, 0, 255);
        }
        if !sample.present {
            return (0, 0, 0);
        }
        let c = &self.filaments[ch].color;
        if c[0] == 0 && c[1] == 0 && c[2] == 0 {
            (255, 255, 255)
        } else {
            (c[0], c[1], c[2])
        }
    }

    fn maybe_save(&mut self, now: u64) {
        if !self.dirty || now.saturating_sub(self.dirty_since_ms) < self.save_debounce_ms {
            return;
        }
        self.flush();
    }

    /// Write the persistent record immediately, clearing the dirty flag.
    pub fn flush(&mut self) {
        let record = PersistRecord {
            filaments: self.filaments.clone(),
            active: self.active,
            device: self.device,
            auto_feed: self.auto_feed,
        };
        match self.storage.save(&record.encode()) {
            Ok(()) => self.dirty = false,
            Err(e) => tracing::warn!(error = %e, "record save failed, will retry"),
        }
    }

    /// Stop everything the motion machine owns. Auto-fed channels keep
    /// their tension loop; they never depended on the printer being alive.
    fn force_safe(&mut self) {
        self.is_backing_out = false;
        for ch in 0..CHANNEL_COUNT {
            if self.auto_feed[ch] {
                continue;
            }
            self.channels[ch].set_motion(FilamentMotion::Stop);
            self.positions[ch] = MotionPosition::Idle;
            self.move_target_mm[ch] = None;
        }
    }

    // Bus-facing actions ---------------------------------------------------

    /// Record printer liveness; the first heartbeat flips the engine online.
    pub fn heartbeat(&mut self) {
        self.update_connectivity(true);
    }

    /// Latch the link state. The dispatch layer calls this with `true` on
    /// any authenticated frame and `false` when it decides the bus is dead.
    pub fn update_connectivity(&mut self, online: bool) {
        if online {
            self.last_heartbeat_ms = self.now_ms();
            if !self.connected {
                tracing::info!("printer online");
                self.connected = true;
            }
        } else if self.connected {
            tracing::warn!("printer offline, forcing channels safe");
            self.connected = false;
            self.force_safe();
        }
    }

    /// Apply a short motion command. `channel` is the addressed channel
    /// (0xFF addresses all), `code`/`arg` are the two command bytes.
    pub fn process_motion_short(&mut self, channel: u8, code: u8, arg: u8) {
        match (code, arg) {
            (0x09, 0xA5) => {
                let ch = usize::from(channel);
                if ch < CHANNEL_COUNT {
                    self.set_active_channel(Some(ch));
                    self.filaments[ch].motion_set = MotionRequest::NeedSendOut;
                    self.touch();
                }
            }
            (0x07, 0x00) => {
                if let Some(a) = self.active {
                    self.filaments[a].motion_set = MotionRequest::InUse;
                    self.touch();
                }
            }
            (0x03, 0x00) => {
                if let Some(a) = self.active {
                    self.filaments[a].motion_set = MotionRequest::NeedPullBack;
                    self.touch();
                }
            }
            (0x00, 0x00) => {
                if channel == 0xFF {
                    self.set_active_channel(None);
                } else if usize::from(channel) < CHANNEL_COUNT {
                    self.filaments[usize::from(channel)].motion_set = MotionRequest::Idle;
                    self.touch();
                }
            }
            _ => {
                tracing::debug!(code, arg, "unhandled motion command");
            }
        }
    }

    /// Select (or deselect) the channel allowed to execute bus motion.
    /// Deselected channels drop any pending request and go idle.
    pub fn set_active_channel(&mut self, active: Option<usize>) {
        if active.is_some_and(|ch| ch >= CHANNEL_COUNT) {
            tracing::warn!(?active, "channel out of range");
            return;
        }
        if self.active == active {
            return;
        }
        if let Some(old) = self.active {
            self.filaments[old].motion_set = MotionRequest::Idle;
            self.positions[old] = MotionPosition::Idle;
            self.channels[old].set_motion(FilamentMotion::Stop);
        }
        self.is_backing_out = false;
        self.active = active;
        self.touch();
    }

    /// Apply an external filament description; `meters` optionally resets
    /// the consumption ledger (clamped to sane bounds).
    pub fn set_filament_info(&mut self, channel: usize, info: &FilamentInfo, meters: Option<f32>) {
        if channel >= CHANNEL_COUNT {
            tracing::warn!(channel, "channel out of range");
            return;
        }
        let f = &mut self.filaments[channel];
        f.id = info.id;
        f.name = info.name;
        f.color = info.color;
        f.temperature_min = info.temperature_min;
        f.temperature_max = info.temperature_max;
        if let Some(m) = meters {
            f.meters = FilamentState::clamp_meters(m);
        }
        self.touch();
    }

    /// Run a channel's tension loop continuously, outside the motion state
    /// machine. Disabling releases the motor and parks the channel idle.
    pub fn set_auto_feed(&mut self, channel: usize, enabled: bool) {
        if channel >= CHANNEL_COUNT {
            tracing::warn!(channel, "channel out of range");
            return;
        }
        if self.auto_feed[channel] != enabled {
            self.auto_feed[channel] = enabled;
            self.touch();
        }
        if enabled {
            self.channels[channel].set_motion(FilamentMotion::PressureCtrlInUse);
        } else {
            self.channels[channel].set_motion(FilamentMotion::Stop);
            self.positions[channel] = MotionPosition::Idle;
        }
    }

    pub fn set_device_kind(&mut self, device: DeviceKind) {
        if self.device != device {
            self.device = device;
            self.touch();
        }
    }

    // Host-facing actions --------------------------------------------------

    /// Feed a channel toward the toolhead until the buffer goes taut or an
    /// optional distance budget is exhausted.
    pub fn start_load(&mut self, channel: usize, distance_mm: Option<f32>) {
        if channel >= CHANNEL_COUNT {
            tracing::warn!(channel, "channel out of range");
            return;
        }
        self.set_active_channel(Some(channel));
        self.positions[channel] = MotionPosition::Loading;
        self.move_target_mm[channel] = distance_mm;
        self.channels[channel].set_motion(FilamentMotion::Send);
        // a re-issued load starts a fresh budget even if the motor was
        // already feeding
        self.channels[channel].accumulated_distance = 0.0;
    }

    /// Retract a channel until presence drops, or for a fixed distance.
    pub fn start_unload(&mut self, channel: usize, distance_mm: Option<f32>) {
        if channel >= CHANNEL_COUNT {
            tracing::warn!(channel, "channel out of range");
            return;
        }
        self.positions[channel] = MotionPosition::Unloading;
        self.move_target_mm[channel] = distance_mm;
        self.channels[channel].set_motion(FilamentMotion::Pull);
        self.channels[channel].accumulated_distance = 0.0;
    }

    /// Velocity-controlled move, stopping after `distance_mm` of travel
    /// when a budget is given.
    pub fn move_axis(&mut self, channel: usize, velocity_mm_s: f32, distance_mm: Option<f32>) {
        if channel >= CHANNEL_COUNT {
            tracing::warn!(channel, "channel out of range");
            return;
        }
        self.move_target_mm[channel] = distance_mm;
        self.channels[channel].set_motion(FilamentMotion::VelocityControl);
        self.channels[channel].target_velocity = velocity_mm_s;
        self.channels[channel].accumulated_distance = 0.0;
    }

    /// Release every channel, auto-fed ones included, and clear transient
    /// motion state.
    pub fn stop_all(&mut self) {
        for ch in 0..CHANNEL_COUNT {
            if self.auto_feed[ch] {
                self.auto_feed[ch] = false;
                self.touch();
            }
        }
        self.force_safe();
    }

    // Accessors ------------------------------------------------------------

    /// Out-of-range channels fall back to channel 0 rather than panicking;
    /// the bus layer forwards unvalidated indices here.
    pub fn filament(&self, channel: usize) -> &FilamentState {
        self.filaments.get(channel).unwrap_or(&self.filaments[0])
    }

    pub fn channel_motion(&self, channel: usize) -> FilamentMotion {
        self.channels
            .get(channel)
            .map_or(FilamentMotion::Stop, MotorChannel::motion)
    }

    pub fn position(&self, channel: usize) -> MotionPosition {
        self.positions
            .get(channel)
            .copied()
            .unwrap_or(MotionPosition::Idle)
    }

    pub fn active_channel(&self) -> Option<usize> {
        self.active
    }

    pub fn device_kind(&self) -> DeviceKind {
        self.device
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Presence microswitches packed into the low four bits.
    pub fn sensor_bitmask(&self) -> u8 {
        let mut mask = 0;
        for ch in 0..CHANNEL_COUNT {
            if self.samples[ch].present {
                mask |= 1 << ch;
            }
        }
        mask
    }

    fn tension_taut(&self) -> f32 {
        self.fusion_tension().taut_v
    }

    fn tension_slack(&self) -> f32 {
        self.fusion_tension().slack_v
    }

    fn tension_ceiling(&self) -> f32 {
        self.fusion_tension().ceiling_v
    }

    fn fusion_tension(&self) -> &crate::config::TensionCfg {
        self.fusion.tension()
    }
}
