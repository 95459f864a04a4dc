//! Per-channel motor control laws.
//!
//! Each channel owns two PID controllers and a motion mode; `run` turns the
//! current sensor sample into one signed PWM command. The nonlinear output
//! shaping (squared error, deadband, static-friction bias) lives here too.

use crate::config::{ASSIST_PWM, PWM_DEADBAND, PWM_LIMIT, PidCfg, TensionCfg};
use crate::pid::Pid;
use crate::sensors::ChannelSample;
use crate::state::Tension;

/// Active control law for one channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilamentMotion {
    /// Release the motor entirely.
    #[default]
    Stop,
    /// Feed toward the toolhead at full speed.
    Send,
    /// Retract at pull speed.
    Pull,
    /// Gentle feed, used during the settle window and near the ceiling.
    SlowSend,
    /// Hold the buffer at the idle setpoint; optionally assist a channel
    /// whose filament just ran out.
    PressureCtrlIdle,
    /// Track the printer's consumption through the tension buffer.
    PressureCtrlInUse,
    /// Track an externally supplied velocity target.
    VelocityControl,
}

/// Outcome of one control step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Drive {
    /// Channel released; no PWM was computed this tick.
    Stopped,
    /// Signed PWM in -1000..=1000 to apply.
    Pwm(i16),
}

/// Inputs `MotorChannel::run` needs beyond its own state.
#[derive(Debug, Clone, Copy)]
pub struct MotorContext<'a> {
    pub sample: &'a ChannelSample,
    pub dt_s: f32,
    /// Gentle-feed speeds while true (settle window or lite identity).
    pub gentle: bool,
    /// Nudge an absent channel forward while in `PressureCtrlIdle`.
    pub assist: bool,
}

#[derive(Debug)]
pub struct MotorChannel {
    motion: FilamentMotion,
    dir: f32,
    pwm_zero: f32,
    pid_speed: Pid,
    pid_pressure: Pid,
    send_speed: f32,
    lite_send_speed: f32,
    slow_send_speed: f32,
    pull_speed: f32,
    tension: TensionCfg,
    /// mm/s target for `VelocityControl`.
    pub target_velocity: f32,
    /// Travel accumulated since the last motion change (mm, magnitude).
    pub accumulated_distance: f32,
    /// In-use entry hold: suppresses the tension correction until the
    /// buffer has relaxed below the release level once.
    holding: bool,
}

impl MotorChannel {
    pub fn new(
        dir: i8,
        pwm_zero: f32,
        pid: &PidCfg,
        tension: TensionCfg,
        send_speed: f32,
        lite_send_speed: f32,
        slow_send_speed: f32,
        pull_speed: f32,
    ) -> Self {
        Self {
            motion: FilamentMotion::Stop,
            dir: f32::from(dir),
            pwm_zero,
            pid_speed: Pid::new(pid.speed_p, pid.speed_i, pid.speed_d),
            pid_pressure: Pid::new(pid.pressure_p, pid.pressure_i, pid.pressure_d),
            send_speed,
            lite_send_speed,
            slow_send_speed,
            pull_speed,
            tension,
            target_velocity: 0.0,
            accumulated_distance: 0.0,
            holding: false,
        }
    }

    pub fn motion(&self) -> FilamentMotion {
        self.motion
    }

    /// Switch control laws. Clears the speed loop and the distance
    /// accumulator so stale state never leaks across modes; leaving
    /// `PressureCtrlInUse` also drops the entry hold.
    pub fn set_motion(&mut self, motion: FilamentMotion) {
        if motion == self.motion {
            return;
        }
        self.motion = motion;
        self.pid_speed.clear();
        self.accumulated_distance = 0.0;
        if motion != FilamentMotion::PressureCtrlInUse {
            self.holding = false;
        }
    }

    /// Arm the in-use entry hold: no correction until the buffer has
    /// relaxed below the release level once. Called when the filament is
    /// handed to the printer, whose grip keeps the buffer taut.
    pub fn hold_until_slack(&mut self) {
        self.holding = true;
    }

    /// One control step for this channel.
    pub fn run(&mut self, ctx: &MotorContext<'_>) -> Drive {
        let s = ctx.sample;
        self.accumulated_distance += s.moved_mm.abs();

        let x: f32;
        if self.motion == FilamentMotion::PressureCtrlIdle {
            if ctx.assist && !s.present {
                // keep pushing the tail of a spent spool toward the gate
                x = self.dir * ASSIST_PWM;
                return Drive::Pwm(self.shape(x));
            }
            if s.present && s.tension != Tension::Normal {
                let err = s.pressure_v - self.tension.idle_setpoint_v;
                x = self.dir * self.pid_pressure.update(err, ctx.dt_s);
            } else {
                self.pid_pressure.clear();
                x = 0.0;
            }
        } else if s.present || self.motion == FilamentMotion::VelocityControl {
            match self.motion {
                FilamentMotion::PressureCtrlInUse => {
                    if self.holding {
                        // entry hold: stay quiet until the buffer relaxes
                        if s.pressure_v < self.tension.release_v {
                            self.holding = false;
                        }
                        x = 0.0;
                    } else if s.pressure_v < self.tension.idle_setpoint_v {
                        let raw = self
                            .pid_pressure
                            .update(s.pressure_v - self.tension.idle_setpoint_v, ctx.dt_s);
                        x = self.dir * Self::soften(raw);
                    } else if s.pressure_v > self.tension.ceiling_v {
                        let raw = self
                            .pid_pressure
                            .update(s.pressure_v - self.tension.ceiling_v, ctx.dt_s);
                        x = self.dir * Self::soften(raw);
                    } else {
                        // inside the band the motor rests
                        x = 0.0;
                    }
                }
                FilamentMotion::Stop => {
                    self.pid_speed.clear();
                    self.pid_pressure.clear();
                    return Drive::Stopped;
                }
                FilamentMotion::Send
                | FilamentMotion::SlowSend
                | FilamentMotion::Pull
                | FilamentMotion::VelocityControl => {
                    // the fixed targets sit far above any physical feed
                    // rate, saturating the loop into full-power moves
                    let target = match self.motion {
                        FilamentMotion::Send => {
                            if ctx.gentle {
                                if s.pressure_v < self.tension.ceiling_v {
                                    self.lite_send_speed
                                } else {
                                    0.0
                                }
                            } else {
                                self.send_speed
                            }
                        }
                        FilamentMotion::SlowSend => self.slow_send_speed,
                        FilamentMotion::Pull => -self.pull_speed,
                        _ => self.target_velocity,
                    };
                    x = self.dir * self.pid_speed.update(target - s.speed_mm_s, ctx.dt_s);
                }
                FilamentMotion::PressureCtrlIdle => unreachable!(),
            }
        } else {
            // no filament and not in a forced-motion mode: rest
            self.pid_speed.clear();
            self.pid_pressure.clear();
            if self.motion == FilamentMotion::Stop {
                return Drive::Stopped;
            }
            x = 0.0;
        }

        Drive::Pwm(self.shape(x))
    }

    /// Sign-preserving square: soft near the setpoint, firm at the edges.
    fn soften(raw: f32) -> f32 {
        raw.signum() * raw * raw / 250.0
    }

    /// Deadband plus static-friction bias, clamped to the PWM range.
    fn shape(&self, x: f32) -> i16 {
        if x.abs() <= PWM_DEADBAND {
            return 0;
        }
        let biased = if x > 0.0 {
            x + self.pwm_zero
        } else {
            x - self.pwm_zero
        };
        biased.clamp(-PWM_LIMIT, PWM_LIMIT) as i16
    }
}
