//! Message and value types shared by the tracker codecs.

use std::fmt;
use std::str::FromStr;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;

/// GT06 frame start marker.
pub const START_MARKER: [u8; 2] = [0x78, 0x78];

/// GT06 frame end marker (CR LF).
pub const END_MARKER: [u8; 2] = [0x0D, 0x0A];

/// Bytes counted by the length field besides the payload: protocol (1) + serial (2) + crc (2).
pub const LENGTH_OVERHEAD: usize = 1 + 2 + 2;

/// Largest payload whose length still fits the one-byte length field.
pub const MAX_PAYLOAD_SIZE: usize = u8::MAX as usize - LENGTH_OVERHEAD;

/// Degrees to wire units: minutes x 30000.
pub const COORDINATE_SCALE: f64 = 60.0 * 30_000.0;

/// Course reported instead of 0 degrees.
///
/// Some receivers classify a zero course as an invalid fix; real units in the
/// field report 359 instead, and so do we.
pub const ZERO_COURSE_SUBSTITUTE: u16 = 359;

/// Field separator of SA200 text records.
pub const RECORD_DELIMITER: char = ';';

/// Terminator of SA200 text records.
pub const RECORD_TERMINATOR: u8 = b'\r';

/// GT06 protocol numbers this simulator emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ProtocolNumber {
    /// Login / identification message carrying the BCD identity.
    Login = 0x01,
    /// Combined GPS + LBS location report.
    Location = 0x12,
}

impl From<ProtocolNumber> for u8 {
    fn from(value: ProtocolNumber) -> Self {
        value as u8
    }
}

impl TryFrom<u8> for ProtocolNumber {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x01 => Ok(ProtocolNumber::Login),
            0x12 => Ok(ProtocolNumber::Location),
            other => Err(other),
        }
    }
}

/// Validated device identity (IMEI-like decimal serial).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceIdentity(String);

impl DeviceIdentity {
    /// Validate and wrap a 15 or 16 digit identity string.
    ///
    /// No whitespace is accepted; callers reading user input trim first.
    pub fn parse(value: &str) -> Result<Self, ProtocolError> {
        let valid_len = value.len() == 15 || value.len() == 16;
        if !valid_len || !value.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ProtocolError::InvalidIdentity(value.to_string()));
        }
        Ok(Self(value.to_string()))
    }

    /// The identity as given (15 or 16 digits).
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The identity left-padded to 16 digits, as it is BCD-encoded.
    pub fn padded(&self) -> String {
        format!("{:0>16}", self.0)
    }

    /// Identity numerically offset by `delta`, keeping the digit count.
    ///
    /// Used to derive distinct identities for a fleet of simulated units.
    pub fn offset(&self, delta: u64) -> Result<Self, ProtocolError> {
        let width = self.0.len();
        let base: u64 = self
            .0
            .parse()
            .map_err(|_| ProtocolError::InvalidIdentity(self.0.clone()))?;
        let next = base
            .checked_add(delta)
            .ok_or_else(|| ProtocolError::InvalidIdentity(self.0.clone()))?;
        let formatted = format!("{:0width$}", next, width = width);
        if formatted.len() > width {
            return Err(ProtocolError::InvalidIdentity(formatted));
        }
        Self::parse(&formatted)
    }
}

impl FromStr for DeviceIdentity {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One position fix fed to the codecs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrajectorySample {
    /// Signed decimal degrees, south negative.
    pub latitude: f64,
    /// Signed decimal degrees, west negative.
    pub longitude: f64,
    pub speed_kmh: u8,
    pub course_degrees: u16,
}

impl TrajectorySample {
    pub fn new(latitude: f64, longitude: f64, speed_kmh: u8, course_degrees: u16) -> Self {
        Self {
            latitude,
            longitude,
            speed_kmh,
            course_degrees,
        }
    }

    /// Check the sample lies in the encodable range.
    pub fn validate(&self) -> Result<(), ProtocolError> {
        if !self.latitude.is_finite() || !(-90.0..=90.0).contains(&self.latitude) {
            return Err(ProtocolError::InvalidSample(format!(
                "latitude {} out of range",
                self.latitude
            )));
        }
        if !self.longitude.is_finite() || !(-180.0..=180.0).contains(&self.longitude) {
            return Err(ProtocolError::InvalidSample(format!(
                "longitude {} out of range",
                self.longitude
            )));
        }
        if self.course_degrees > 359 {
            return Err(ProtocolError::InvalidSample(format!(
                "course {} out of range",
                self.course_degrees
            )));
        }
        Ok(())
    }

    pub fn is_south(&self) -> bool {
        self.latitude < 0.0
    }

    pub fn is_west(&self) -> bool {
        self.longitude < 0.0
    }
}

/// Per-session frame serial number.
///
/// Starts at 1, advances by one per transmitted frame and wraps 65535 -> 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SerialCounter(u16);

impl SerialCounter {
    /// First serial of a session, used by the login frame.
    pub const INITIAL: u16 = 1;

    pub fn new() -> Self {
        Self(Self::INITIAL)
    }

    pub fn starting_at(value: u16) -> Self {
        Self(value)
    }

    /// Serial to stamp on the next frame.
    pub fn current(&self) -> u16 {
        self.0
    }

    /// Move to the next serial and return it.
    pub fn advance(&mut self) -> u16 {
        self.0 = self.0.wrapping_add(1);
        self.0
    }
}

impl Default for SerialCounter {
    fn default() -> Self {
        Self::new()
    }
}

/// Byte width of the cell id at the end of a location payload.
///
/// Receivers disagree on this and nothing on the wire tells them apart, so it
/// has to match what the target server expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum CellIdWidth {
    #[default]
    Three,
    Four,
}

impl CellIdWidth {
    pub fn bytes(self) -> usize {
        match self {
            CellIdWidth::Three => 3,
            CellIdWidth::Four => 4,
        }
    }
}

impl TryFrom<u8> for CellIdWidth {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            3 => Ok(CellIdWidth::Three),
            4 => Ok(CellIdWidth::Four),
            other => Err(format!("cell id width must be 3 or 4, got {}", other)),
        }
    }
}

impl From<CellIdWidth> for u8 {
    fn from(value: CellIdWidth) -> Self {
        value.bytes() as u8
    }
}

/// How the hemisphere bits of the course/status word are chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HemispherePolicy {
    /// South/west bits follow the sign of the coordinates.
    #[default]
    FromCoordinates,
    /// South and west bits are always set.
    ///
    /// Workaround for a receiver that ignored the coordinate signs; only
    /// correct for routes entirely in the south-west quadrant.
    ForceSouthWest,
}

/// Serving cell reported in the LBS part of a location payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellTower {
    /// Mobile country code.
    pub mcc: u16,
    /// Mobile network code.
    pub mnc: u8,
    /// Location area code.
    pub lac: u16,
    pub cell_id: u32,
}

impl Default for CellTower {
    fn default() -> Self {
        // Claro, northern Minas Gerais.
        Self {
            mcc: 724,
            mnc: 5,
            lac: 40,
            cell_id: 0x1F3B,
        }
    }
}

/// Everything besides the sample that goes into a GT06 location payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocationOptions {
    /// Satellites in use, 0-15.
    pub satellites: u8,
    pub has_fix: bool,
    pub cell: CellTower,
    pub cell_id_width: CellIdWidth,
    pub hemisphere: HemispherePolicy,
}

impl Default for LocationOptions {
    fn default() -> Self {
        Self {
            satellites: 12,
            has_fix: true,
            cell: CellTower::default(),
            cell_id_width: CellIdWidth::default(),
            hemisphere: HemispherePolicy::default(),
        }
    }
}

/// A decoded GT06 frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub protocol: u8,
    pub payload: Bytes,
    pub serial: u16,
    pub crc: u16,
}

impl Frame {
    /// Value of the length field for this frame.
    pub fn length(&self) -> usize {
        LENGTH_OVERHEAD + self.payload.len()
    }

    pub fn protocol_number(&self) -> Option<ProtocolNumber> {
        ProtocolNumber::try_from(self.protocol).ok()
    }
}

/// SA200 record kinds; the tag is the model prefix plus this suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    /// Position/status report.
    Status,
    /// Heartbeat.
    Alive,
}

impl RecordKind {
    pub fn suffix(self) -> &'static str {
        match self {
            RecordKind::Status => "STT",
            RecordKind::Alive => "ALV",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        if tag.ends_with("STT") {
            Some(RecordKind::Status)
        } else if tag.ends_with("ALV") {
            Some(RecordKind::Alive)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_number_roundtrip() {
        for number in [ProtocolNumber::Login, ProtocolNumber::Location] {
            let value: u8 = number.into();
            assert_eq!(ProtocolNumber::try_from(value), Ok(number));
        }
        assert_eq!(ProtocolNumber::try_from(0x13), Err(0x13));
    }

    #[test]
    fn test_identity_validation() {
        assert!(DeviceIdentity::parse("352812192008961").is_ok());
        assert!(DeviceIdentity::parse("0352812192008961").is_ok());
        assert!(DeviceIdentity::parse("35281219200896").is_err());
        assert!(DeviceIdentity::parse("35281219200896123").is_err());
        assert!(DeviceIdentity::parse("35281219200896a").is_err());
        assert!(DeviceIdentity::parse("").is_err());
        assert!(DeviceIdentity::parse(" 352812192008961").is_err());
        assert!(DeviceIdentity::parse("352812192008961\n").is_err());

        let id = DeviceIdentity::parse("352812192008961").unwrap();
        assert_eq!(id.padded(), "0352812192008961");
    }

    #[test]
    fn test_identity_offset_keeps_width() {
        let id = DeviceIdentity::parse("000000000000009").unwrap();
        assert_eq!(id.offset(1).unwrap().as_str(), "000000000000010");

        let max = DeviceIdentity::parse("999999999999999").unwrap();
        assert_eq!(
            max.offset(1),
            Err(ProtocolError::InvalidIdentity("1000000000000000".to_string()))
        );
        assert_eq!(max.offset(0).unwrap().as_str(), "999999999999999");

        let long = DeviceIdentity::parse("9999999999999998").unwrap();
        assert_eq!(long.offset(1).unwrap().as_str(), "9999999999999999");
        assert!(long.offset(2).is_err());
    }

    #[test]
    fn test_serial_counter_wraps() {
        let mut serial = SerialCounter::starting_at(65534);
        assert_eq!(serial.advance(), 65535);
        assert_eq!(serial.advance(), 0);
        assert_eq!(serial.advance(), 1);
        assert_eq!(SerialCounter::new().current(), 1);
    }

    #[test]
    fn test_sample_validation() {
        assert!(TrajectorySample::new(-14.9257, -42.8168, 50, 181).validate().is_ok());
        assert!(TrajectorySample::new(-91.0, 0.0, 0, 0).validate().is_err());
        assert!(TrajectorySample::new(0.0, 180.5, 0, 0).validate().is_err());
        assert!(TrajectorySample::new(0.0, 0.0, 0, 360).validate().is_err());
        assert!(TrajectorySample::new(f64::NAN, 0.0, 0, 0).validate().is_err());
    }

    #[test]
    fn test_record_kind_tags() {
        assert_eq!(RecordKind::from_tag("SA200STT"), Some(RecordKind::Status));
        assert_eq!(RecordKind::from_tag("ST300ALV"), Some(RecordKind::Alive));
        assert_eq!(RecordKind::from_tag("SA200CMD"), None);
    }
}
