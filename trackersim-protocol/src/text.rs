//! Suntech SA200 delimited-text records.
//!
//! ```text
//! SA200STT;dev;fw;YYYYMMDD;HHMMSS;odo;lat;lon;spd;crs;sats;fix;ign;batt;rssi;io;evt\r
//! SA200ALV;dev;fw;YYYYMMDD;HHMMSS;odo;ign;batt;rssi\r
//! ```
//!
//! Field order and widths are what the receiving server parses; there is no
//! checksum and no length prefix.

use bytes::{BufMut, Bytes, BytesMut};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;
use crate::types::{RecordKind, TrajectorySample, RECORD_DELIMITER, RECORD_TERMINATOR};

/// Identification fields that open every record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordHeader {
    /// Model prefix of the tag, e.g. `SA200` or `ST300`.
    pub model: String,
    pub device_id: String,
    pub firmware_version: String,
}

impl Default for RecordHeader {
    fn default() -> Self {
        Self {
            model: "SA200".to_string(),
            device_id: "123456789".to_string(),
            firmware_version: "001".to_string(),
        }
    }
}

impl RecordHeader {
    pub fn tag(&self, kind: RecordKind) -> String {
        format!("{}{}", self.model, kind.suffix())
    }

    fn validate(&self) -> Result<(), ProtocolError> {
        check_field("model", &self.model)?;
        check_field("device_id", &self.device_id)?;
        check_field("firmware_version", &self.firmware_version)
    }
}

/// Unit status reported alongside positions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceStatus {
    pub satellites: u8,
    pub gps_fix: bool,
    pub ignition: bool,
    /// Volts, already formatted (`13.80`).
    pub battery_voltage: String,
    pub signal_strength: String,
    pub io_status: String,
    pub event_code: String,
}

impl Default for DeviceStatus {
    fn default() -> Self {
        Self {
            satellites: 7,
            gps_fix: true,
            ignition: false,
            battery_voltage: "13.80".to_string(),
            signal_strength: "100000".to_string(),
            io_status: "2".to_string(),
            event_code: "0002".to_string(),
        }
    }
}

impl DeviceStatus {
    fn validate(&self) -> Result<(), ProtocolError> {
        check_field("battery_voltage", &self.battery_voltage)?;
        check_field("signal_strength", &self.signal_strength)?;
        check_field("io_status", &self.io_status)?;
        check_field("event_code", &self.event_code)
    }
}

/// Position/status record (`STT`).
pub fn build_status_record(
    header: &RecordHeader,
    status: &DeviceStatus,
    sample: &TrajectorySample,
    odometer_km: u32,
    timestamp: NaiveDateTime,
) -> Result<Bytes, ProtocolError> {
    header.validate()?;
    status.validate()?;
    sample.validate()?;

    let fields = [
        header.tag(RecordKind::Status),
        header.device_id.clone(),
        header.firmware_version.clone(),
        timestamp.format("%Y%m%d").to_string(),
        timestamp.format("%H%M%S").to_string(),
        format!("{:05}", odometer_km),
        format!("{:+.6}", sample.latitude),
        format!("{:+.6}", sample.longitude),
        format!("{:06.3}", sample.speed_kmh as f64),
        format!("{:05.2}", sample.course_degrees as f64),
        status.satellites.to_string(),
        flag(status.gps_fix),
        flag(status.ignition),
        status.battery_voltage.clone(),
        status.signal_strength.clone(),
        status.io_status.clone(),
        status.event_code.clone(),
    ];
    Ok(join_record(&fields))
}

/// Heartbeat record (`ALV`).
pub fn build_alive_record(
    header: &RecordHeader,
    status: &DeviceStatus,
    odometer_km: u32,
    timestamp: NaiveDateTime,
) -> Result<Bytes, ProtocolError> {
    header.validate()?;
    status.validate()?;

    let fields = [
        header.tag(RecordKind::Alive),
        header.device_id.clone(),
        header.firmware_version.clone(),
        timestamp.format("%Y%m%d").to_string(),
        timestamp.format("%H%M%S").to_string(),
        format!("{:05}", odometer_km),
        flag(status.ignition),
        status.battery_voltage.clone(),
        status.signal_strength.clone(),
    ];
    Ok(join_record(&fields))
}

/// Split one terminated record back into its kind and fields (tag included).
pub fn parse_record(buf: &[u8]) -> Result<(RecordKind, Vec<String>), ProtocolError> {
    let body = match buf.split_last() {
        Some((&RECORD_TERMINATOR, body)) => body,
        _ => return Err(ProtocolError::MalformedRecord("missing terminator".to_string())),
    };
    if !body.is_ascii() {
        return Err(ProtocolError::MalformedRecord("non-ASCII content".to_string()));
    }
    let text = std::str::from_utf8(body)
        .map_err(|e| ProtocolError::MalformedRecord(e.to_string()))?;

    let fields: Vec<String> = text.split(RECORD_DELIMITER).map(str::to_string).collect();
    let kind = RecordKind::from_tag(&fields[0])
        .ok_or_else(|| ProtocolError::MalformedRecord(format!("unknown tag {:?}", fields[0])))?;
    Ok((kind, fields))
}

fn join_record(fields: &[String]) -> Bytes {
    let joined = fields.join(&RECORD_DELIMITER.to_string());
    let mut out = BytesMut::with_capacity(joined.len() + 1);
    out.put_slice(joined.as_bytes());
    out.put_u8(RECORD_TERMINATOR);
    out.freeze()
}

fn flag(value: bool) -> String {
    let digit = if value { "1" } else { "0" };
    digit.to_string()
}

fn check_field(name: &'static str, value: &str) -> Result<(), ProtocolError> {
    let bad = value.is_empty()
        || !value.is_ascii()
        || value.contains(RECORD_DELIMITER)
        || value.bytes().any(|b| b.is_ascii_control());
    if bad {
        return Err(ProtocolError::InvalidField {
            name,
            value: value.to_string(),
        });
    }
    Ok(())
}
