//! モータードライバー
//!
//! TIM1の相補PWMで3相を駆動し、FOCのduty計算（逆Park + SVPWM）と
//! 相順の補正を `PhaseDriver` として提供します。

use embassy_stm32::{
    peripherals,
    timer::{complementary_pwm::ComplementaryPwm, Channel},
};
use minifoc::{PhaseDriver, PhaseDuty};

use crate::foc::{inverse_park, limit_voltage, space_vector_duty};

/// 正規化電圧ベクトルの上限
const MAX_VOLTAGE: f32 = 1.0;

/// 3相モータードライバー
pub struct MotorDriver {
    pwm: ComplementaryPwm<'static, peripherals::TIM1>,
    max_duty: u16,
    /// 相順（0: U-V-W, 1: U-W-V）
    phase_sequence: u8,
}

impl MotorDriver {
    /// 新しいモータードライバーを作成
    ///
    /// # 引数
    /// * `pwm` - PWMペリフェラル（TIM1）
    pub fn new(pwm: ComplementaryPwm<'static, peripherals::TIM1>) -> Self {
        let max_duty = pwm.get_max_duty();
        Self {
            pwm,
            max_duty,
            phase_sequence: 0,
        }
    }

    pub fn set_phase_sequence(&mut self, phase_sequence: u8) {
        self.phase_sequence = phase_sequence;
    }

    /// 全チャネルを有効化
    pub fn enable_all_channels(&mut self) {
        self.pwm.enable(Channel::Ch1);
        self.pwm.enable(Channel::Ch2);
        self.pwm.enable(Channel::Ch3);
    }

    fn set_duty_uvw(&mut self, duty_u: u16, duty_v: u16, duty_w: u16) {
        self.pwm.set_duty(Channel::Ch1, duty_u);
        self.pwm.set_duty(Channel::Ch2, duty_v);
        self.pwm.set_duty(Channel::Ch3, duty_w);
    }
}

impl PhaseDriver for MotorDriver {
    fn duty_cycle(&self, angle: f32, d: f32, q: f32) -> PhaseDuty {
        let (vd, vq) = limit_voltage(d, q, MAX_VOLTAGE);
        let (v_alpha, v_beta) = inverse_park(vd, vq, angle);
        space_vector_duty(v_alpha, v_beta, self.max_duty)
    }

    fn apply(&mut self, duty: PhaseDuty) {
        // 相順1ではV/Wを入れ替えて回転方向をセンサーに合わせる
        if self.phase_sequence == 1 {
            self.set_duty_uvw(duty.u, duty.w, duty.v);
        } else {
            self.set_duty_uvw(duty.u, duty.v, duty.w);
        }
    }
}
