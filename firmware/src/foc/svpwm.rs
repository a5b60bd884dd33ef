// Space Vector PWM (SVPWM) generation
//
// Min-max zero-sequence injection: equivalent to the sector-based SVPWM with
// centered zero vectors, without the sector lookup.

use minifoc::PhaseDuty;

/// 1 / sqrt(3)
const ONE_DIV_SQRT3: f32 = 0.577_350_26;

/// sqrt(3) / 2
const SQRT3_DIV_2: f32 = 0.866_025_4;

/// Calculate Space Vector PWM duty cycles
///
/// # Arguments
/// * `v_alpha` - Alpha-axis voltage, normalized (|v| ≤ 1 stays linear)
/// * `v_beta` - Beta-axis voltage, normalized
/// * `max_duty` - Compare value of 100% duty
///
/// # Returns
/// Compare values of the three phases. A zero vector gives 50% on every phase.
pub fn space_vector_duty(v_alpha: f32, v_beta: f32, max_duty: u16) -> PhaseDuty {
    // 逆Clarke（|v| = 1 で線形変調範囲の上限）
    let scale = ONE_DIV_SQRT3;
    let v_u = v_alpha * scale;
    let v_v = (-0.5 * v_alpha + SQRT3_DIV_2 * v_beta) * scale;
    let v_w = (-0.5 * v_alpha - SQRT3_DIV_2 * v_beta) * scale;

    // 零相電圧を注入して中心合わせ
    let v_max = v_u.max(v_v).max(v_w);
    let v_min = v_u.min(v_v).min(v_w);
    let offset = 0.5 - (v_max + v_min) / 2.0;

    let full = max_duty as f32;
    let to_duty = |v: f32| ((v + offset) * full).clamp(0.0, full) as u16;

    PhaseDuty {
        u: to_duty(v_u),
        v: to_duty(v_v),
        w: to_duty(v_w),
    }
}
