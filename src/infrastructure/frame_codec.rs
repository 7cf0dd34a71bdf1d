// Monitoring frame codec - fixed little-endian layout, protocol v1
use crate::domain::reading::RawReading;
use bytes::{Buf, BufMut, BytesMut};

pub const FRAME_LEN: usize = 25;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("monitoring frame must be {expected} bytes, got {actual}")]
    Size { expected: usize, actual: usize },
}

/// Decodes one monitoring frame. The length must match exactly; there is no partial decode.
pub fn decode(frame: &[u8]) -> Result<RawReading, DecodeError> {
    if frame.len() != FRAME_LEN {
        return Err(DecodeError::Size {
            expected: FRAME_LEN,
            actual: frame.len(),
        });
    }

    let mut buf = frame;
    Ok(RawReading {
        timestamp: buf.get_u32_le(),
        is_firing: buf.get_u8() != 0,
        is_charging: buf.get_u8() != 0,
        is_celsius: buf.get_u8() != 0,
        battery1: buf.get_u8(),
        battery2: buf.get_u8(),
        battery3: buf.get_u8(),
        power_set: buf.get_u16_le(),
        temperature_set: buf.get_u16_le(),
        temperature: buf.get_u16_le(),
        output_voltage: buf.get_u16_le(),
        output_current: buf.get_u16_le(),
        resistance: buf.get_u16_le(),
        real_resistance: buf.get_u16_le(),
        board_temperature: buf.get_u8(),
    })
}

pub fn encode(reading: &RawReading) -> Vec<u8> {
    let mut buf = BytesMut::with_capacity(FRAME_LEN);
    buf.put_u32_le(reading.timestamp);
    buf.put_u8(reading.is_firing as u8);
    buf.put_u8(reading.is_charging as u8);
    buf.put_u8(reading.is_celsius as u8);
    buf.put_u8(reading.battery1);
    buf.put_u8(reading.battery2);
    buf.put_u8(reading.battery3);
    buf.put_u16_le(reading.power_set);
    buf.put_u16_le(reading.temperature_set);
    buf.put_u16_le(reading.temperature);
    buf.put_u16_le(reading.output_voltage);
    buf.put_u16_le(reading.output_current);
    buf.put_u16_le(reading.resistance);
    buf.put_u16_le(reading.real_resistance);
    buf.put_u8(reading.board_temperature);
    buf.to_vec()
}
