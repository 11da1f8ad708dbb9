//! Field encoders for the GT06 payloads: BCD identity, fixed-point
//! coordinates and the packed course/status word.

use crate::error::ProtocolError;
use crate::types::{DeviceIdentity, COORDINATE_SCALE, ZERO_COURSE_SUBSTITUTE};

/// Size of a BCD-encoded identity.
pub const IDENTITY_BCD_LEN: usize = 8;

/// Course/status word: GPS fix is valid.
pub const STATUS_FIX: u16 = 1 << 0;
/// Course/status word: latitude is south.
pub const STATUS_SOUTH: u16 = 1 << 4;
/// Course/status word: longitude is west.
pub const STATUS_WEST: u16 = 1 << 5;

const STATUS_BITS: u32 = 6;

/// Encode a 15 or 16 digit identity string as 8 packed BCD bytes.
pub fn encode_identity_bcd(id: &str) -> Result<[u8; IDENTITY_BCD_LEN], ProtocolError> {
    Ok(pack_bcd(&DeviceIdentity::parse(id)?))
}

/// Encode an already validated identity.
pub fn pack_bcd(identity: &DeviceIdentity) -> [u8; IDENTITY_BCD_LEN] {
    let digits = identity.padded();
    let digits = digits.as_bytes();

    let mut out = [0u8; IDENTITY_BCD_LEN];
    for (byte, pair) in out.iter_mut().zip(digits.chunks_exact(2)) {
        *byte = ((pair[0] - b'0') << 4) | (pair[1] - b'0');
    }
    out
}

/// Decode 8 BCD bytes back to the 16 digit (zero-padded) string.
pub fn decode_identity_bcd(bytes: &[u8; IDENTITY_BCD_LEN]) -> Result<String, ProtocolError> {
    let mut digits = String::with_capacity(IDENTITY_BCD_LEN * 2);
    for &byte in bytes {
        let (high, low) = (byte >> 4, byte & 0x0F);
        if high > 9 || low > 9 {
            return Err(ProtocolError::InvalidBcd(byte));
        }
        digits.push(char::from(b'0' + high));
        digits.push(char::from(b'0' + low));
    }
    Ok(digits)
}

/// Absolute decimal degrees to wire units (degrees x 1,800,000, rounded).
pub fn encode_coordinate(degrees: f64) -> u32 {
    (degrees.abs() * COORDINATE_SCALE).round() as u32
}

/// Pack a course and the hemisphere/fix flags into the 16-bit course/status word.
///
/// The course is normalised into 0..=359, and a course of exactly 0 is sent
/// as [`ZERO_COURSE_SUBSTITUTE`].
pub fn encode_course_status(course_degrees: i32, is_south: bool, is_west: bool, has_fix: bool) -> u16 {
    let mut course = course_degrees.rem_euclid(360) as u16;
    if course == 0 {
        course = ZERO_COURSE_SUBSTITUTE;
    }

    let mut status = 0u16;
    if has_fix {
        status |= STATUS_FIX;
    }
    if is_south {
        status |= STATUS_SOUTH;
    }
    if is_west {
        status |= STATUS_WEST;
    }

    (course << STATUS_BITS) | status
}
