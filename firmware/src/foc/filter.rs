//! 速度推定用ローパスフィルタ

use minifoc::encoder::VelocityFilter;

/// 1次IIR（指数移動平均）
pub struct LowPassFilter {
    /// フィルタ係数（0 < α ≤ 1、大きいほど応答が速い）
    alpha: f32,
    output: f32,
}

impl LowPassFilter {
    pub const fn new(alpha: f32) -> Self {
        Self { alpha, output: 0.0 }
    }
}

impl VelocityFilter for LowPassFilter {
    fn filter(&mut self, raw: f32) -> f32 {
        self.output += self.alpha * (raw - self.output);
        self.output
    }
}
