//! テキストテレメトリ
//!
//! UARTなどのバイトストリームへ1行ずつ書き出します。書式は人が読むためのもので、
//! フィールドの順序と意味だけを保ちます。

use core::fmt::{self, Write};

use crate::state::{MotionSnapshot, ParameterSnapshot, PidGains};

/// Start-up greeting
pub fn write_greeting<W: Write>(out: &mut W) -> fmt::Result {
    out.write_str("hello world!\r\n")
}

/// Periodic angle/velocity line
///
/// `angle:<rotations>, <mechanical angle>, <velocity integer part>.0`
pub fn write_motion<W: Write>(out: &mut W, motion: &MotionSnapshot) -> fmt::Result {
    // 小数部は固定で0
    write!(
        out,
        "angle:{}, {}, {}.{}\r\n",
        motion.rotations, motion.mechanical_angle, motion.velocity as i32, 0
    )
}

/// Start-up line with the calibration state
pub fn write_startup<W: Write>(out: &mut W, phase_sequence: u8, offset: u16) -> fmt::Result {
    write!(out, "phase_sequence:{}\r\n", phase_sequence)?;
    write!(out, "machine_angle_offset:{}\r\n", offset)
}

/// Parameter dump of the Report mode
pub fn write_parameters<W: Write>(out: &mut W, parameters: &ParameterSnapshot) -> fmt::Result {
    write!(out, "user_expect:{}\r\n", parameters.user_expect)?;
    write_gains(out, "speed", &parameters.speed)?;
    write_gains(out, "angle", &parameters.angle)?;
    write!(
        out,
        "active_loop:{}\r\nphase_sequence:{}\r\n",
        parameters.active_loop as u8, parameters.phase_sequence
    )
}

fn write_gains<W: Write>(out: &mut W, name: &str, gains: &PidGains) -> fmt::Result {
    write!(out, "{}_pid.kp:{}\r\n", name, gains.kp)?;
    write!(out, "{}_pid.ki:{}\r\n", name, gains.ki)?;
    write!(out, "{}_pid.kd:{}\r\n", name, gains.kd)?;
    write!(out, "{}_pid.sum_maximum:{}\r\n", name, gains.sum_maximum)?;
    write!(out, "{}_pid.expect:{}\r\n", name, gains.expect)
}
