//! CANコマンド受信タスク
//!
//! 標準ID `COMMAND_BASE_ID + パケットID` のフレームをコマンドパケットとして
//! デコーダに渡します。

use embassy_stm32::can;
use embedded_can::Id;
use minifoc::{CommandDecoder, CommandPacket, Outcome};

use crate::config::can::{COMMAND_BASE_ID, COMMAND_ID_COUNT};
use crate::state::{MODES, PARAMS};

#[embassy_executor::task]
pub async fn command_task(can: can::Can<'static>) {
    let (_tx, mut rx, _properties) = can.split();
    let decoder = CommandDecoder::new(&PARAMS, &MODES);

    info!("Command task started");

    loop {
        let envelope = match rx.read().await {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!("CAN receive error: {:?}", e);
                continue;
            }
        };

        let frame = envelope.frame;
        let Some(packet_id) = packet_id(frame.header().id()) else {
            continue;
        };
        let Some(packet) = CommandPacket::from_bytes(packet_id, frame.data()) else {
            continue;
        };

        match decoder.handle(&packet) {
            Ok(Outcome::ModeRequested(mode)) => debug!("Mode {} requested", mode as u8),
            Ok(Outcome::TargetSet(select, value)) => {
                info!("Target set: loop={}, value={}", select as u8, value)
            }
            Ok(Outcome::GainSet(select, field, value)) => {
                info!("Gain set: loop={}, field={}, value={}", select as u8, field as u8, value)
            }
            Ok(Outcome::EnableIgnored) => warn!("Enable ignored: phase not calibrated"),
            Ok(Outcome::Unrecognized(op)) => debug!("Unknown opcode 0x{:02X}", op),
            Ok(Outcome::NotControlPacket(id)) => debug!("Packet {} ignored", id),
            Err(busy) => warn!("Command rejected: mode {} pending", busy.pending as u8),
        }
    }
}

/// CAN IDからパケットIDを取り出す（範囲外・拡張IDは `None`）
fn packet_id(id: &Id) -> Option<u8> {
    match id {
        Id::Standard(std_id) => {
            let offset = std_id.as_raw().checked_sub(COMMAND_BASE_ID)?;
            (offset < COMMAND_ID_COUNT).then_some(offset as u8)
        }
        Id::Extended(_) => None,
    }
}
