//! Clamped PID controller used for both speed and tension tracking.

/// Shared clamp for the integral term and the controller output.
pub const PID_LIMIT: f32 = 1000.0;

#[derive(Debug, Clone)]
pub struct Pid {
    p: f32,
    i: f32,
    d: f32,
    integral: f32,
    last_error: f32,
}

impl Pid {
    pub fn new(p: f32, i: f32, d: f32) -> Self {
        Self {
            p,
            i,
            d,
            integral: 0.0,
            last_error: 0.0,
        }
    }

    /// Reset accumulated state. Must be called on every motion-mode change
    /// so a stale integral cannot carry across control laws.
    pub fn clear(&mut self) {
        self.integral = 0.0;
        self.last_error = 0.0;
    }

    /// One controller step. `dt` is elapsed time in seconds; when it is
    /// zero the derivative term is dropped.
    pub fn update(&mut self, error: f32, dt: f32) -> f32 {
        self.integral = (self.integral + self.i * error * dt).clamp(-PID_LIMIT, PID_LIMIT);
        let mut output = self.p * error + self.integral;
        if dt != 0.0 {
            output += self.d * (error - self.last_error) / dt;
        }
        self.last_error = error;
        output.clamp(-PID_LIMIT, PID_LIMIT)
    }
}
