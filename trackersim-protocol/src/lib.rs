//! Wire codecs for simulated GPS trackers.
//!
//! Two message families are supported:
//!
//! - **GT06 binary frames** ([`codec`]): `78 78`-delimited frames with a
//!   one-byte length, protocol number, payload, serial and CRC-16.
//! - **Suntech SA200 text records** ([`text`]): `;`-separated ASCII fields
//!   terminated by `\r`.
//!
//! # Frame Format
//!
//! ```text
//! +-------+--------+----------+-----------+--------+--------+-------+
//! | Start | Length | Protocol |  Payload  | Serial |  CRC   |  End  |
//! | 78 78 |   u8   |    u8    | (variable)| u16 BE | u16 BE | 0D 0A |
//! +-------+--------+----------+-----------+--------+--------+-------+
//! ```
//!
//! # Example
//!
//! ```rust
//! use trackersim_protocol::{build_login, parse_frame, DeviceIdentity, ProtocolNumber};
//!
//! let identity = DeviceIdentity::parse("352812192008961").unwrap();
//! let encoded = build_login(&identity, 1).unwrap();
//! assert_eq!(&encoded[..4], &[0x78, 0x78, 0x0D, 0x01]);
//!
//! let frame = parse_frame(&encoded).unwrap();
//! assert_eq!(frame.protocol_number(), Some(ProtocolNumber::Login));
//! assert_eq!(frame.serial, 1);
//! ```

pub mod codec;
pub mod crc;
pub mod encoding;
pub mod error;
pub mod text;
pub mod types;

pub use codec::{
    build_frame, build_location, build_login, decode_frame_header, location_payload,
    parse_frame, FrameHeader, HEADER_SIZE, TRAILER_SIZE,
};
pub use crc::{crc16, crc16_table, crc16_with_init};
pub use encoding::{
    decode_identity_bcd, encode_coordinate, encode_course_status, encode_identity_bcd,
    IDENTITY_BCD_LEN,
};
pub use error::ProtocolError;
pub use text::{build_alive_record, build_status_record, parse_record, DeviceStatus, RecordHeader};
pub use types::{
    CellIdWidth, CellTower, DeviceIdentity, Frame, HemispherePolicy, LocationOptions,
    ProtocolNumber, RecordKind, SerialCounter, TrajectorySample, COORDINATE_SCALE, END_MARKER,
    MAX_PAYLOAD_SIZE, START_MARKER, ZERO_COURSE_SUBSTITUTE,
};
