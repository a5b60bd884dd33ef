// Command packet layout for the motor controller
//
// A packet is an identifier byte plus an 8-byte payload. Only packet id 0
// (the control packet) is handled here; payload[0] is the opcode, payload[1]
// the loop selector of the enable opcode and payload[4..8] a big-endian
// IEEE-754 f32 for every parameter opcode.

use crate::state::LoopSelect;

/// Payload length of every command packet
pub const PAYLOAD_LEN: usize = 8;

/// Identifier of the control packet
pub const CONTROL_PACKET_ID: u8 = 0;

pub type Payload = [u8; PAYLOAD_LEN];

/// Control packet opcodes (payload[0])
pub mod opcode {
    /// Calibrate phase sequence and encoder offset
    pub const CALIBRATE: u8 = 0x0F;

    /// Enable the motor (payload[1] = loop selector)
    pub const ENABLE: u8 = 0x1E;

    /// Disable the motor
    pub const DISABLE: u8 = 0x2D;

    /// Set the target of the active loop (f32)
    pub const SET_TARGET: u8 = 0x3C;

    // === Speed loop (0x4B-0x78) ===
    pub const SET_SPEED_KP: u8 = 0x4B;
    pub const SET_SPEED_KI: u8 = 0x5A;
    pub const SET_SPEED_KD: u8 = 0x69;
    pub const SET_SPEED_SUM_MAX: u8 = 0x78;

    // === Angle loop (0x87-0xB4) ===
    pub const SET_ANGLE_KP: u8 = 0x87;
    pub const SET_ANGLE_KI: u8 = 0x96;
    pub const SET_ANGLE_KD: u8 = 0xA5;
    pub const SET_ANGLE_SUM_MAX: u8 = 0xB4;

    /// Report current parameters
    pub const REPORT: u8 = 0xC3;

    /// Write parameters to non-volatile storage
    pub const PERSIST: u8 = 0xD2;
}

/// One command packet as delivered by the transport layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CommandPacket {
    pub id: u8,
    pub payload: Payload,
}

impl CommandPacket {
    pub const fn new(id: u8, payload: Payload) -> Self {
        Self { id, payload }
    }

    /// Parse a packet from transport data
    ///
    /// # Arguments
    /// * `id` - Packet identifier
    /// * `data` - Frame data (should be 8 bytes)
    ///
    /// # Returns
    /// * `Some(CommandPacket)` if parsing successful
    /// * `None` if data length is incorrect
    pub fn from_bytes(id: u8, data: &[u8]) -> Option<Self> {
        let Ok(payload) = Payload::try_from(data) else {
            error!("Command packet: invalid data length {}", data.len());
            return None;
        };
        Some(Self { id, payload })
    }

    /// Control packet without arguments
    pub const fn control(op: u8) -> Self {
        let mut payload = [0u8; PAYLOAD_LEN];
        payload[0] = op;
        Self::new(CONTROL_PACKET_ID, payload)
    }

    /// Enable packet selecting `select` as the active loop
    pub const fn enable(select: LoopSelect) -> Self {
        let mut packet = Self::control(opcode::ENABLE);
        packet.payload[1] = select as u8;
        packet
    }

    /// Parameter packet carrying `value` as a big-endian f32
    pub fn parameter(op: u8, value: f32) -> Self {
        let mut packet = Self::control(op);
        packet.payload[4..8].copy_from_slice(&encode_f32(value));
        packet
    }

    pub fn is_control(&self) -> bool {
        self.id == CONTROL_PACKET_ID
    }

    pub fn opcode(&self) -> u8 {
        self.payload[0]
    }
}

/// Decode the f32 argument from payload[4..8]
///
/// Big-endian bit pattern reinterpretation, not a numeric cast.
pub fn decode_f32(payload: &Payload) -> f32 {
    let bytes = [payload[4], payload[5], payload[6], payload[7]];
    f32::from_be_bytes(bytes)
}

/// Encode an f32 argument as it appears in payload[4..8]
pub fn encode_f32(value: f32) -> [u8; 4] {
    value.to_be_bytes()
}
