// Coordinate transformations for FOC (Field Oriented Control)

use core::f32::consts::{PI, TAU};

use libm::sqrtf;

/// Inverse Park transformation (dq → αβ)
///
/// # Arguments
/// * `vd` - d-axis voltage (aligned with rotor flux)
/// * `vq` - q-axis voltage (perpendicular to rotor flux, produces torque)
/// * `theta` - Electrical angle in radians, any range
///
/// # Returns
/// Tuple of (v_alpha, v_beta) in the stationary frame
///
/// # Implementation
/// Uses idsp::cossin() (~40 cycles on Cortex-M) instead of libm::cosf/sinf.
pub fn inverse_park(vd: f32, vq: f32, theta: f32) -> (f32, f32) {
    let (cos_theta, sin_theta) = cossin(theta);

    let v_alpha = vd * cos_theta - vq * sin_theta;
    let v_beta = vd * sin_theta + vq * cos_theta;

    (v_alpha, v_beta)
}

/// (cos, sin) of an angle in radians
#[inline]
fn cossin(theta: f32) -> (f32, f32) {
    // 電気角は極対数倍されて 2π を超えるので [-π, π) に畳み込む
    let wrapped = theta - TAU * libm::floorf((theta + PI) / TAU);

    // idsp phase: i32 full scale = [-π, π)
    const SCALE: f32 = 2147483648.0 / PI; // 2^31 / π
    let phase = (wrapped * SCALE) as i32;

    let (cos_i32, sin_i32) = idsp::cossin(phase);

    const I32_TO_F32: f32 = 1.0 / 2147483648.0; // 1 / 2^31
    (cos_i32 as f32 * I32_TO_F32, sin_i32 as f32 * I32_TO_F32)
}

/// Limit voltage vector to maximum magnitude
///
/// # Arguments
/// * `vd` - d-axis voltage
/// * `vq` - q-axis voltage
/// * `max_voltage` - Maximum allowed voltage magnitude
///
/// # Returns
/// Tuple of (vd_limited, vq_limited)
pub fn limit_voltage(vd: f32, vq: f32, max_voltage: f32) -> (f32, f32) {
    let magnitude = sqrtf(vd * vd + vq * vq);

    if magnitude > max_voltage {
        let scale = max_voltage / magnitude;
        (vd * scale, vq * scale)
    } else {
        (vd, vq)
    }
}
