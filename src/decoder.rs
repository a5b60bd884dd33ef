//! コマンドデコーダ
//!
//! 制御パケットのオペコードをディスパッチテーブルで引き、共有パラメータを
//! 更新するか、制御モードを要求します。

use crate::mode::{ControlMode, ModeBusy, ModeSlot};
use crate::protocol::{decode_f32, opcode, CommandPacket, Payload};
use crate::state::{ControlParameters, LoopSelect, PidField};

/// Result of handling one packet
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Outcome {
    /// The polling loop will run `ControlMode`
    ModeRequested(ControlMode),
    /// Torque/speed/angle target written
    TargetSet(LoopSelect, f32),
    /// Regulator gain or limit written
    GainSet(LoopSelect, PidField, f32),
    /// Enable received before phase calibration data was available
    EnableIgnored,
    /// Unknown opcode, no effect
    Unrecognized(u8),
    /// Packet id other than the control packet, routed elsewhere
    NotControlPacket(u8),
}

type Handler = fn(&CommandDecoder<'_>, &Payload) -> Result<Outcome, ModeBusy>;

/// オペコード → ハンドラ
const DISPATCH: [(u8, Handler); 14] = [
    (opcode::CALIBRATE, calibrate),
    (opcode::ENABLE, enable),
    (opcode::DISABLE, disable),
    (opcode::SET_TARGET, set_target),
    (opcode::SET_SPEED_KP, set_speed_kp),
    (opcode::SET_SPEED_KI, set_speed_ki),
    (opcode::SET_SPEED_KD, set_speed_kd),
    (opcode::SET_SPEED_SUM_MAX, set_speed_sum_max),
    (opcode::SET_ANGLE_KP, set_angle_kp),
    (opcode::SET_ANGLE_KI, set_angle_ki),
    (opcode::SET_ANGLE_KD, set_angle_kd),
    (opcode::SET_ANGLE_SUM_MAX, set_angle_sum_max),
    (opcode::REPORT, report),
    (opcode::PERSIST, persist),
];

/// Sole writer of `ControlParameters` and producer of mode requests.
///
/// Runs in the packet-arrival context. Every write is a single atomic store,
/// so regulators never observe a partially written field.
pub struct CommandDecoder<'a> {
    params: &'a ControlParameters,
    modes: &'a ModeSlot,
}

impl<'a> CommandDecoder<'a> {
    pub fn new(params: &'a ControlParameters, modes: &'a ModeSlot) -> Self {
        Self { params, modes }
    }

    /// Handle one packet
    ///
    /// # Returns
    /// * `Ok(Outcome)` - what the packet did (including no-ops)
    /// * `Err(ModeBusy)` - a mode request was rejected because another mode
    ///   is still being handled; nothing was changed
    pub fn handle(&self, packet: &CommandPacket) -> Result<Outcome, ModeBusy> {
        if !packet.is_control() {
            return Ok(Outcome::NotControlPacket(packet.id));
        }

        let op = packet.opcode();
        match DISPATCH.iter().find(|(code, _)| *code == op) {
            Some((_, handler)) => handler(self, &packet.payload),
            None => {
                debug!("Unrecognized opcode 0x{:02X}", op);
                Ok(Outcome::Unrecognized(op))
            }
        }
    }

    fn request(&self, mode: ControlMode) -> Result<Outcome, ModeBusy> {
        self.modes.request(mode)?;
        Ok(Outcome::ModeRequested(mode))
    }

    fn set_gain(&self, select: LoopSelect, field: PidField, payload: &Payload) -> Outcome {
        let value = decode_f32(payload);
        if let Some(pid) = self.params.pid(select) {
            pid.set(field, value);
        }
        info!("Gain set: loop={}, value={}", select as u8, value);
        Outcome::GainSet(select, field, value)
    }
}

fn calibrate(decoder: &CommandDecoder<'_>, _payload: &Payload) -> Result<Outcome, ModeBusy> {
    info!("Calibrate command received");
    decoder.request(ControlMode::Calibrate)
}

fn enable(decoder: &CommandDecoder<'_>, payload: &Payload) -> Result<Outcome, ModeBusy> {
    if !decoder.params.phase_params_available() {
        warn!("Enable ignored: phase calibration not available");
        return Ok(Outcome::EnableIgnored);
    }

    // モード要求が通った場合のみループを切り替える
    // （デコーダはポーリングループより優先度が高く、間に割り込まれない）
    let outcome = decoder.request(ControlMode::Enable)?;
    let select = if decoder.params.loop_params_available() {
        LoopSelect::from_u8(payload[1])
    } else {
        LoopSelect::Torque
    };
    decoder.params.set_active_loop(select);
    info!("Enable command received: loop={}", select as u8);
    Ok(outcome)
}

fn disable(decoder: &CommandDecoder<'_>, _payload: &Payload) -> Result<Outcome, ModeBusy> {
    info!("Disable command received");
    decoder.request(ControlMode::Disable)
}

fn set_target(decoder: &CommandDecoder<'_>, payload: &Payload) -> Result<Outcome, ModeBusy> {
    let value = decode_f32(payload);
    let select = decoder.params.active_loop();
    match decoder.params.pid(select) {
        Some(pid) => pid.set(PidField::Expect, value),
        None => decoder.params.set_user_expect(value),
    }
    info!("Target set: loop={}, value={}", select as u8, value);
    Ok(Outcome::TargetSet(select, value))
}

fn set_speed_kp(decoder: &CommandDecoder<'_>, payload: &Payload) -> Result<Outcome, ModeBusy> {
    Ok(decoder.set_gain(LoopSelect::Speed, PidField::Kp, payload))
}

fn set_speed_ki(decoder: &CommandDecoder<'_>, payload: &Payload) -> Result<Outcome, ModeBusy> {
    Ok(decoder.set_gain(LoopSelect::Speed, PidField::Ki, payload))
}

fn set_speed_kd(decoder: &CommandDecoder<'_>, payload: &Payload) -> Result<Outcome, ModeBusy> {
    Ok(decoder.set_gain(LoopSelect::Speed, PidField::Kd, payload))
}

fn set_speed_sum_max(
    decoder: &CommandDecoder<'_>,
    payload: &Payload,
) -> Result<Outcome, ModeBusy> {
    Ok(decoder.set_gain(LoopSelect::Speed, PidField::SumMaximum, payload))
}

fn set_angle_kp(decoder: &CommandDecoder<'_>, payload: &Payload) -> Result<Outcome, ModeBusy> {
    Ok(decoder.set_gain(LoopSelect::Angle, PidField::Kp, payload))
}

fn set_angle_ki(decoder: &CommandDecoder<'_>, payload: &Payload) -> Result<Outcome, ModeBusy> {
    Ok(decoder.set_gain(LoopSelect::Angle, PidField::Ki, payload))
}

fn set_angle_kd(decoder: &CommandDecoder<'_>, payload: &Payload) -> Result<Outcome, ModeBusy> {
    Ok(decoder.set_gain(LoopSelect::Angle, PidField::Kd, payload))
}

fn set_angle_sum_max(
    decoder: &CommandDecoder<'_>,
    payload: &Payload,
) -> Result<Outcome, ModeBusy> {
    Ok(decoder.set_gain(LoopSelect::Angle, PidField::SumMaximum, payload))
}

fn report(decoder: &CommandDecoder<'_>, _payload: &Payload) -> Result<Outcome, ModeBusy> {
    decoder.request(ControlMode::Report)
}

fn persist(decoder: &CommandDecoder<'_>, _payload: &Payload) -> Result<Outcome, ModeBusy> {
    info!("Persist command received");
    let outcome = decoder.request(ControlMode::Persist)?;
    decoder.params.set_loop_params_available(true);
    Ok(outcome)
}
