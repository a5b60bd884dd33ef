// PID regulator for the outer (speed / angle) loop

use crate::state::PidGains;

/// Discrete PID regulator with integrator clamp and output limiting
///
/// Gains are read every update, so values written by the command decoder take
/// effect on the next sample. The integrator is the plain error sum, clamped
/// to `±sum_maximum`.
pub struct PidRegulator {
    /// Integral accumulator (error sum)
    integral: f32,
    /// Error of the previous sample
    prev_error: f32,
    /// Output limit (symmetric: ±output_limit)
    output_limit: f32,
    /// Last calculated output
    last_output: f32,
}

impl PidRegulator {
    /// Create a new regulator
    ///
    /// # Arguments
    /// * `output_limit` - Output limit (symmetric: ±output_limit)
    pub const fn new(output_limit: f32) -> Self {
        Self {
            integral: 0.0,
            prev_error: 0.0,
            output_limit,
            last_output: 0.0,
        }
    }

    /// Update the regulator
    ///
    /// # Arguments
    /// * `gains` - Current gains, integrator clamp and setpoint (`expect`)
    /// * `measured` - Actual measured value
    ///
    /// # Returns
    /// Controller output (limited to ±output_limit)
    pub fn update(&mut self, gains: &PidGains, measured: f32) -> f32 {
        let error = gains.expect - measured;

        let sum_maximum = libm::fabsf(gains.sum_maximum);
        self.integral = (self.integral + error).clamp(-sum_maximum, sum_maximum);

        let derivative = error - self.prev_error;
        self.prev_error = error;

        let output = gains.kp * error + gains.ki * self.integral + gains.kd * derivative;
        self.last_output = output.clamp(-self.output_limit, self.output_limit);
        self.last_output
    }

    /// Reset the integral and derivative state
    pub fn reset(&mut self) {
        self.integral = 0.0;
        self.prev_error = 0.0;
        self.last_output = 0.0;
    }

    /// Get the current output
    pub fn output(&self) -> f32 {
        self.last_output
    }
}
