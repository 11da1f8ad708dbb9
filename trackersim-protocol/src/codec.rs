//! GT06 binary frame codec.
//!
//! Frame format:
//! ```text
//! +-------+--------+----------+-----------+--------+--------+-------+
//! | Start | Length | Protocol |  Payload  | Serial |  CRC   |  End  |
//! | 78 78 |   u8   |    u8    | (variable)| u16 BE | u16 BE | 0D 0A |
//! +-------+--------+----------+-----------+--------+--------+-------+
//! ```
//!
//! `Length` counts protocol, payload, serial and CRC. The CRC covers
//! everything between the start marker and the CRC itself.

use bytes::{BufMut, Bytes, BytesMut};
use chrono::{Datelike, NaiveDateTime, Timelike};

use crate::crc::crc16;
use crate::encoding::{encode_coordinate, encode_course_status, pack_bcd};
use crate::error::ProtocolError;
use crate::types::*;

/// Bytes in front of the length-counted region: start marker + length byte.
pub const HEADER_SIZE: usize = 3;

/// Bytes after the length-counted region: end marker.
pub const TRAILER_SIZE: usize = 2;

/// High nibble of the GPS info byte: size of the GPS block that follows.
const GPS_INFO_LENGTH: u8 = 0xC0;

/// Build a complete frame around `payload`.
pub fn build_frame(protocol: u8, payload: &[u8], serial: u16) -> Result<Bytes, ProtocolError> {
    if payload.len() > MAX_PAYLOAD_SIZE {
        return Err(ProtocolError::FrameTooLarge(payload.len(), MAX_PAYLOAD_SIZE));
    }
    let length = (LENGTH_OVERHEAD + payload.len()) as u8;

    let mut frame = BytesMut::with_capacity(HEADER_SIZE + length as usize + TRAILER_SIZE);
    frame.put_slice(&START_MARKER);
    frame.put_u8(length);
    frame.put_u8(protocol);
    frame.put_slice(payload);
    frame.put_u16(serial);

    let crc = crc16(&frame[START_MARKER.len()..]);
    frame.put_u16(crc);
    frame.put_slice(&END_MARKER);

    Ok(frame.freeze())
}

/// Login frame carrying the BCD identity.
pub fn build_login(identity: &DeviceIdentity, serial: u16) -> Result<Bytes, ProtocolError> {
    build_frame(ProtocolNumber::Login.into(), &pack_bcd(identity), serial)
}

/// Location frame for one sample, stamped with `timestamp` (UTC).
pub fn build_location(
    sample: &TrajectorySample,
    options: &LocationOptions,
    timestamp: NaiveDateTime,
    serial: u16,
) -> Result<Bytes, ProtocolError> {
    let payload = location_payload(sample, options, timestamp)?;
    build_frame(ProtocolNumber::Location.into(), &payload, serial)
}

/// GPS + LBS payload of a location frame.
pub fn location_payload(
    sample: &TrajectorySample,
    options: &LocationOptions,
    timestamp: NaiveDateTime,
) -> Result<Bytes, ProtocolError> {
    sample.validate()?;

    let mut payload = BytesMut::with_capacity(23 + options.cell_id_width.bytes());

    // Date and time
    payload.put_u8((timestamp.year().rem_euclid(100)) as u8);
    payload.put_u8(timestamp.month() as u8);
    payload.put_u8(timestamp.day() as u8);
    payload.put_u8(timestamp.hour() as u8);
    payload.put_u8(timestamp.minute() as u8);
    payload.put_u8(timestamp.second() as u8);

    // GPS block
    payload.put_u8(GPS_INFO_LENGTH | options.satellites.min(0x0F));
    payload.put_u32(encode_coordinate(sample.latitude));
    payload.put_u32(encode_coordinate(sample.longitude));
    payload.put_u8(sample.speed_kmh);

    let (is_south, is_west) = match options.hemisphere {
        HemispherePolicy::FromCoordinates => (sample.is_south(), sample.is_west()),
        HemispherePolicy::ForceSouthWest => (true, true),
    };
    payload.put_u16(encode_course_status(
        sample.course_degrees as i32,
        is_south,
        is_west,
        options.has_fix,
    ));

    // LBS block
    let cell = &options.cell;
    payload.put_u16(cell.mcc);
    payload.put_u8(cell.mnc);
    payload.put_u16(cell.lac);
    payload.put_uint(cell.cell_id as u64, options.cell_id_width.bytes());

    Ok(payload.freeze())
}

/// Frame header information.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Value of the length field.
    pub length: u8,
    pub protocol: u8,
}

impl FrameHeader {
    /// Total bytes of the frame on the wire, markers included.
    pub fn frame_len(&self) -> usize {
        HEADER_SIZE + self.length as usize + TRAILER_SIZE
    }
}

/// Try to decode a frame header from the buffer.
/// Returns None if there's not enough data yet.
pub fn decode_frame_header(buf: &[u8]) -> Result<Option<FrameHeader>, ProtocolError> {
    if buf.len() < HEADER_SIZE + 1 {
        return Ok(None);
    }

    let start = [buf[0], buf[1]];
    if start != START_MARKER {
        return Err(ProtocolError::InvalidMarker {
            expected: START_MARKER,
            actual: start,
        });
    }

    let length = buf[2];
    if (length as usize) < LENGTH_OVERHEAD {
        return Err(ProtocolError::InvalidLength(length));
    }

    Ok(Some(FrameHeader {
        length,
        protocol: buf[3],
    }))
}

/// Parse and verify one complete frame.
///
/// Trailing bytes after the end marker are ignored.
pub fn parse_frame(buf: &[u8]) -> Result<Frame, ProtocolError> {
    let header = decode_frame_header(buf)?.ok_or(ProtocolError::IncompleteFrame {
        expected: HEADER_SIZE + 1,
        actual: buf.len(),
    })?;

    let total = header.frame_len();
    if buf.len() < total {
        return Err(ProtocolError::IncompleteFrame {
            expected: total,
            actual: buf.len(),
        });
    }

    let end = [buf[total - 2], buf[total - 1]];
    if end != END_MARKER {
        return Err(ProtocolError::InvalidMarker {
            expected: END_MARKER,
            actual: end,
        });
    }

    // length byte .. serial
    let crc_at = total - TRAILER_SIZE - 2;
    let body = &buf[START_MARKER.len()..crc_at];
    let expected = u16::from_be_bytes([buf[crc_at], buf[crc_at + 1]]);
    let actual = crc16(body);
    if expected != actual {
        return Err(ProtocolError::ChecksumMismatch { expected, actual });
    }

    let payload_start = HEADER_SIZE + 1;
    let serial_at = crc_at - 2;
    Ok(Frame {
        protocol: header.protocol,
        payload: Bytes::copy_from_slice(&buf[payload_start..serial_at]),
        serial: u16::from_be_bytes([buf[serial_at], buf[serial_at + 1]]),
        crc: expected,
    })
}
