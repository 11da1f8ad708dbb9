//! Command line, config file and the resolved settings built from both.
//!
//! Precedence is command line, then `trackersim.toml`, then built-in defaults.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};

use trackersim_protocol::{
    CellIdWidth, CellTower, DeviceIdentity, DeviceStatus, HemispherePolicy, LocationOptions,
    RecordHeader, TrajectorySample,
};

use crate::error::ConfigError;
use crate::session::{Gt06Settings, ProtocolFamily, SessionConfig, SuntechSettings, TransportMode};
use crate::trajectory::{
    CourseStyle, GeoPoint, RecordedTrack, StraightLineRoute, TrajectorySource, DEFAULT_ROUTE_END,
    DEFAULT_ROUTE_START,
};

/// Auto-detected config file name in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "trackersim.toml";

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_GT06_PORT: u16 = 5023;
pub const DEFAULT_SUNTECH_PORT: u16 = 5011;
pub const DEFAULT_IMEI: &str = "352812192008961";
pub const DEFAULT_INTERVAL_SECS: f64 = 2.0;
pub const DEFAULT_ITERATIONS: usize = 120;
pub const DEFAULT_SPEED_KMH: u8 = 50;
pub const DEFAULT_ODOMETER_KM: u32 = 129;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_LOGIN_ACK_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_GT06_ACK_TIMEOUT_MS: u64 = 1_000;
pub const DEFAULT_SUNTECH_ACK_TIMEOUT_MS: u64 = 2_000;
pub const DEFAULT_LOG_DIR: &str = "logs";
pub const DEFAULT_LOG_RETENTION_DAYS: u64 = 7;

/// Message family selected on the command line or in the config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ProtocolKind {
    #[default]
    Gt06,
    Suntech,
}

/// trackersim - GPS tracker simulator for GT06 and Suntech servers
#[derive(Parser, Debug, Default)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Tracking server host
    #[arg(long)]
    pub host: Option<String>,

    /// Tracking server port [default: 5023 for gt06, 5011 for suntech]
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Message family to speak
    #[arg(long, value_enum)]
    pub protocol: Option<ProtocolKind>,

    /// Transport (GT06 supports tcp only)
    #[arg(long, value_enum)]
    pub transport: Option<TransportMode>,

    /// GT06 identity (IMEI, up to 16 digits)
    #[arg(long)]
    pub imei: Option<String>,

    /// Suntech device id
    #[arg(long)]
    pub device_id: Option<String>,

    /// Seconds between samples
    #[arg(short, long)]
    pub interval_secs: Option<f64>,

    /// Route steps; iterations + 1 samples are sent
    #[arg(short = 'n', long)]
    pub iterations: Option<usize>,

    /// Reported speed in km/h
    #[arg(short, long)]
    pub speed: Option<u8>,

    /// Replay samples from a TOML track file instead of the straight route
    #[arg(short, long)]
    pub track: Option<PathBuf>,

    /// Number of simulated units, identities incremented per unit
    #[arg(short, long)]
    pub devices: Option<usize>,

    /// Wait for and log server acknowledgements
    #[arg(long)]
    pub wait_ack: Option<bool>,

    /// Configuration file path
    #[arg(short = 'f', long)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Directory where log files are stored
    #[arg(long)]
    pub log_dir: Option<PathBuf>,

    /// Number of days to keep log files
    #[arg(long)]
    pub log_retention_days: Option<u64>,
}

/// Configuration file format.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFile {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub device: DeviceSection,
    #[serde(default)]
    pub route: RouteSection,
    #[serde(default)]
    pub gt06: Gt06Section,
    #[serde(default)]
    pub suntech: SuntechSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

#[derive(Debug, Deserialize, Default)]
pub struct ServerSection {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub transport: Option<TransportMode>,
    pub connect_timeout_secs: Option<u64>,
    pub login_ack_timeout_ms: Option<u64>,
    pub ack_timeout_ms: Option<u64>,
    pub wait_ack: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
pub struct DeviceSection {
    pub protocol: Option<ProtocolKind>,
    pub imei: Option<String>,
    pub device_id: Option<String>,
    pub count: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
pub struct RouteSection {
    pub start: Option<GeoPoint>,
    pub end: Option<GeoPoint>,
    pub iterations: Option<usize>,
    pub speed_kmh: Option<u8>,
    pub interval_secs: Option<f64>,
    /// Inline recorded track; replaces the straight route.
    pub samples: Option<Vec<TrajectorySample>>,
    /// TOML file holding `[[samples]]`; replaces the straight route.
    pub track_file: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
pub struct Gt06Section {
    pub satellites: Option<u8>,
    pub cell: Option<CellTower>,
    pub cell_id_width: Option<CellIdWidth>,
    pub hemisphere: Option<HemispherePolicy>,
}

#[derive(Debug, Deserialize, Default)]
pub struct SuntechSection {
    pub model: Option<String>,
    pub firmware_version: Option<String>,
    pub odometer_km: Option<u32>,
    pub status: Option<DeviceStatus>,
}

#[derive(Debug, Deserialize, Default)]
pub struct LoggingSection {
    pub log_dir: Option<String>,
    pub retention_days: Option<u64>,
    pub level: Option<String>,
}

/// Read a recorded track: a TOML file with one `[[samples]]` table per fix.
pub fn load_track(path: &Path) -> Result<RecordedTrack, ConfigError> {
    let fail = |reason: String| ConfigError::TrackFile {
        path: path.display().to_string(),
        reason,
    };
    let contents = std::fs::read_to_string(path).map_err(|e| fail(e.to_string()))?;
    toml::from_str(&contents).map_err(|e| fail(e.to_string()))
}

fn checked_track(track: RecordedTrack) -> Result<RecordedTrack, ConfigError> {
    if track.samples.is_empty() {
        return Err(ConfigError::InvalidValue {
            key: "samples",
            reason: "recorded track has no samples".to_string(),
        });
    }
    for sample in &track.samples {
        sample.validate()?;
    }
    Ok(track)
}

pub fn load_config(path: &Path) -> Result<ConfigFile, Box<dyn std::error::Error>> {
    let contents = std::fs::read_to_string(path)?;
    let config: ConfigFile = toml::from_str(&contents)?;
    Ok(config)
}

/// Explicit path, else `trackersim.toml` if present.
pub fn config_path(args: &Args) -> Option<PathBuf> {
    args.config.clone().or_else(|| {
        let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
        if default_path.exists() {
            Some(default_path)
        } else {
            None
        }
    })
}

/// Logging options after merging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    pub log_dir: PathBuf,
    pub retention_days: u64,
    pub verbose: bool,
    pub level: Option<String>,
}

/// Fully resolved run settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub protocol: ProtocolKind,
    pub host: String,
    pub port: u16,
    pub transport: TransportMode,
    pub connect_timeout: Duration,
    pub login_ack_timeout: Duration,
    pub ack_timeout: Duration,
    pub interval: Duration,
    pub wait_for_ack: bool,
    pub devices: usize,
    pub identity: DeviceIdentity,
    pub location: LocationOptions,
    pub suntech_header: RecordHeader,
    pub suntech_status: DeviceStatus,
    pub odometer_km: u32,
    pub route: StraightLineRoute,
    /// Replayed instead of `route` when set.
    pub track: Option<RecordedTrack>,
    pub logging: LogSettings,
}

impl Settings {
    pub fn resolve(args: &Args, file: &ConfigFile) -> Result<Self, ConfigError> {
        let protocol = args.protocol.or(file.device.protocol).unwrap_or_default();

        let default_port = match protocol {
            ProtocolKind::Gt06 => DEFAULT_GT06_PORT,
            ProtocolKind::Suntech => DEFAULT_SUNTECH_PORT,
        };
        let default_ack_ms = match protocol {
            ProtocolKind::Gt06 => DEFAULT_GT06_ACK_TIMEOUT_MS,
            ProtocolKind::Suntech => DEFAULT_SUNTECH_ACK_TIMEOUT_MS,
        };

        let transport = args.transport.or(file.server.transport).unwrap_or_default();
        if protocol == ProtocolKind::Gt06 && transport != TransportMode::Tcp {
            return Err(ConfigError::InvalidValue {
                key: "transport",
                reason: "gt06 supports tcp only".to_string(),
            });
        }

        let interval_secs = args
            .interval_secs
            .or(file.route.interval_secs)
            .unwrap_or(DEFAULT_INTERVAL_SECS);
        let interval = Duration::try_from_secs_f64(interval_secs).map_err(|e| ConfigError::InvalidValue {
            key: "interval_secs",
            reason: e.to_string(),
        })?;

        let devices = args.devices.or(file.device.count).unwrap_or(1);
        if devices == 0 {
            return Err(ConfigError::InvalidValue {
                key: "devices",
                reason: "at least one device is required".to_string(),
            });
        }

        let imei = args
            .imei
            .as_deref()
            .or(file.device.imei.as_deref())
            .unwrap_or(DEFAULT_IMEI);
        let identity = DeviceIdentity::parse(imei.trim())?;

        let defaults = LocationOptions::default();
        let location = LocationOptions {
            satellites: file.gt06.satellites.unwrap_or(defaults.satellites),
            has_fix: defaults.has_fix,
            cell: file.gt06.cell.unwrap_or(defaults.cell),
            cell_id_width: file.gt06.cell_id_width.unwrap_or(defaults.cell_id_width),
            hemisphere: file.gt06.hemisphere.unwrap_or(defaults.hemisphere),
        };

        let mut suntech_header = RecordHeader::default();
        if let Some(device_id) = args.device_id.as_ref().or(file.device.device_id.as_ref()) {
            suntech_header.device_id = device_id.trim().to_string();
        }
        if let Some(model) = &file.suntech.model {
            suntech_header.model = model.clone();
        }
        if let Some(firmware) = &file.suntech.firmware_version {
            suntech_header.firmware_version = firmware.clone();
        }
        let suntech_status = file.suntech.status.clone().unwrap_or_default();

        let course_style = match protocol {
            ProtocolKind::Gt06 => CourseStyle::Drift,
            ProtocolKind::Suntech => CourseStyle::AvoidMultiplesOfFive,
        };
        let route = StraightLineRoute::new(
            file.route.start.unwrap_or(DEFAULT_ROUTE_START),
            file.route.end.unwrap_or(DEFAULT_ROUTE_END),
            args.iterations.or(file.route.iterations).unwrap_or(DEFAULT_ITERATIONS),
            args.speed.or(file.route.speed_kmh).unwrap_or(DEFAULT_SPEED_KMH),
        )
        .with_course_style(course_style);

        let track = match (&args.track, &file.route.track_file, &file.route.samples) {
            (Some(path), _, _) | (None, Some(path), _) => Some(checked_track(load_track(path)?)?),
            (None, None, Some(samples)) => Some(checked_track(RecordedTrack::new(samples.clone()))?),
            (None, None, None) => None,
        };

        let logging = LogSettings {
            log_dir: args
                .log_dir
                .clone()
                .or_else(|| file.logging.log_dir.as_ref().map(PathBuf::from))
                .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_DIR)),
            retention_days: args
                .log_retention_days
                .or(file.logging.retention_days)
                .unwrap_or(DEFAULT_LOG_RETENTION_DAYS),
            verbose: args.verbose,
            level: file.logging.level.clone(),
        };

        Ok(Self {
            protocol,
            host: args
                .host
                .clone()
                .or_else(|| file.server.host.clone())
                .unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: args.port.or(file.server.port).unwrap_or(default_port),
            transport,
            connect_timeout: Duration::from_secs(
                file.server.connect_timeout_secs.unwrap_or(DEFAULT_CONNECT_TIMEOUT_SECS),
            ),
            login_ack_timeout: Duration::from_millis(
                file.server.login_ack_timeout_ms.unwrap_or(DEFAULT_LOGIN_ACK_TIMEOUT_MS),
            ),
            ack_timeout: Duration::from_millis(file.server.ack_timeout_ms.unwrap_or(default_ack_ms)),
            interval,
            wait_for_ack: args.wait_ack.or(file.server.wait_ack).unwrap_or(true),
            devices,
            identity,
            location,
            suntech_header,
            suntech_status,
            odometer_km: file.suntech.odometer_km.unwrap_or(DEFAULT_ODOMETER_KM),
            route,
            track,
            logging,
        })
    }

    /// Samples every session replays.
    pub fn trajectory(&self) -> Arc<dyn TrajectorySource> {
        match &self.track {
            Some(track) => Arc::new(track.clone()),
            None => Arc::new(self.route.clone()),
        }
    }

    pub fn server_addr(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    /// Session configuration for unit `index` (0-based).
    pub fn session_config(&self, index: usize) -> Result<SessionConfig, ConfigError> {
        let family = match self.protocol {
            ProtocolKind::Gt06 => ProtocolFamily::Binary(Gt06Settings {
                identity: self.identity.offset(index as u64)?,
                location: self.location,
            }),
            ProtocolKind::Suntech => {
                let mut header = self.suntech_header.clone();
                header.device_id = offset_device_id(&header.device_id, index as u64)?;
                ProtocolFamily::Text(SuntechSettings {
                    header,
                    status: self.suntech_status.clone(),
                    odometer_km: self.odometer_km,
                })
            }
        };

        Ok(SessionConfig {
            server_addr: self.server_addr(),
            family,
            transport: self.transport,
            connect_timeout: self.connect_timeout,
            login_ack_timeout: self.login_ack_timeout,
            ack_timeout: self.ack_timeout,
            interval: self.interval,
            wait_for_ack: self.wait_for_ack,
        })
    }

    /// One session configuration per simulated unit.
    pub fn session_configs(&self) -> Result<Vec<SessionConfig>, ConfigError> {
        (0..self.devices).map(|i| self.session_config(i)).collect()
    }
}

/// Add `delta` to a numeric device id, keeping its digit width.
///
/// Non-numeric ids are only accepted with `delta == 0`.
pub fn offset_device_id(device_id: &str, delta: u64) -> Result<String, ConfigError> {
    if delta == 0 {
        return Ok(device_id.to_string());
    }
    let invalid = |reason: String| ConfigError::InvalidValue {
        key: "device_id",
        reason,
    };
    if device_id.is_empty() || !device_id.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid(format!("'{}' is not numeric, cannot derive more devices", device_id)));
    }
    let value: u64 = device_id
        .parse()
        .map_err(|e: std::num::ParseIntError| invalid(e.to_string()))?;
    let next = value
        .checked_add(delta)
        .ok_or_else(|| invalid(format!("'{}' + {} overflows", device_id, delta)))?;
    let formatted = format!("{:0width$}", next, width = device_id.len());
    if formatted.len() > device_id.len() {
        return Err(invalid(format!("'{}' + {} exceeds {} digits", device_id, delta, device_id.len())));
    }
    Ok(formatted)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(argv: &[&str]) -> Args {
        let mut full = vec!["trackersim"];
        full.extend_from_slice(argv);
        Args::parse_from(full)
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::resolve(&args(&[]), &ConfigFile::default()).unwrap();

        assert_eq!(settings.protocol, ProtocolKind::Gt06);
        assert_eq!(settings.server_addr(), "127.0.0.1:5023");
        assert_eq!(settings.transport, TransportMode::Tcp);
        assert_eq!(settings.interval, Duration::from_secs(2));
        assert_eq!(settings.ack_timeout, Duration::from_secs(1));
        assert_eq!(settings.login_ack_timeout, Duration::from_secs(5));
        assert_eq!(settings.connect_timeout, Duration::from_secs(10));
        assert_eq!(settings.route.iterations, 120);
        assert_eq!(settings.route.speed_kmh, 50);
        assert_eq!(settings.identity.as_str(), DEFAULT_IMEI);
        assert_eq!(settings.location.satellites, 12);
        assert_eq!(settings.location.cell.mcc, 724);
        assert!(settings.wait_for_ack);
        assert_eq!(settings.devices, 1);
        assert_eq!(settings.logging.log_dir, PathBuf::from("logs"));
        assert_eq!(settings.logging.retention_days, 7);
    }

    #[test]
    fn test_suntech_defaults() {
        let settings = Settings::resolve(&args(&["--protocol", "suntech"]), &ConfigFile::default()).unwrap();

        assert_eq!(settings.port, DEFAULT_SUNTECH_PORT);
        assert_eq!(settings.ack_timeout, Duration::from_secs(2));
        assert_eq!(settings.suntech_header.device_id, "123456789");
        assert_eq!(settings.suntech_status.satellites, 7);
        assert_eq!(settings.odometer_km, 129);
        assert_eq!(settings.route.course_style, CourseStyle::AvoidMultiplesOfFive);
    }

    #[test]
    fn test_file_values_apply() {
        let file: ConfigFile = toml::from_str(
            r#"
            [server]
            host = "tracker.example.net"
            port = 6000
            ack_timeout_ms = 250
            wait_ack = false

            [device]
            protocol = "suntech"
            device_id = "000000042"
            count = 3

            [route]
            start = { latitude = -10.0, longitude = -40.0 }
            iterations = 10
            interval_secs = 0.5

            [suntech]
            model = "ST300"
            odometer_km = 1000

            [suntech.status]
            satellites = 9
            ignition = true

            [logging]
            log_dir = "/var/log/trackersim"
            level = "warn"
            "#,
        )
        .unwrap();

        let settings = Settings::resolve(&args(&[]), &file).unwrap();
        assert_eq!(settings.protocol, ProtocolKind::Suntech);
        assert_eq!(settings.server_addr(), "tracker.example.net:6000");
        assert_eq!(settings.ack_timeout, Duration::from_millis(250));
        assert!(!settings.wait_for_ack);
        assert_eq!(settings.devices, 3);
        assert_eq!(settings.interval, Duration::from_millis(500));
        assert_eq!(settings.route.start, GeoPoint::new(-10.0, -40.0));
        assert_eq!(settings.route.end, DEFAULT_ROUTE_END);
        assert_eq!(settings.route.iterations, 10);
        assert_eq!(settings.suntech_header.model, "ST300");
        assert_eq!(settings.suntech_status.satellites, 9);
        assert!(settings.suntech_status.ignition);
        assert_eq!(settings.suntech_status.battery_voltage, "13.80");
        assert_eq!(settings.odometer_km, 1000);
        assert_eq!(settings.logging.level.as_deref(), Some("warn"));
    }

    #[test]
    fn test_cli_overrides_file() {
        let file: ConfigFile = toml::from_str(
            r#"
            [server]
            port = 6000
            [device]
            imei = "111111111111111"
            [route]
            speed_kmh = 90
            "#,
        )
        .unwrap();

        let settings = Settings::resolve(
            &args(&["--port", "7000", "--imei", "222222222222222", "--speed", "30", "--wait-ack", "false"]),
            &file,
        )
        .unwrap();
        assert_eq!(settings.port, 7000);
        assert_eq!(settings.identity.as_str(), "222222222222222");
        assert_eq!(settings.route.speed_kmh, 30);
        assert!(!settings.wait_for_ack);
    }

    #[test]
    fn test_gt06_section() {
        let file: ConfigFile = toml::from_str(
            r#"
            [gt06]
            satellites = 8
            cell_id_width = 4
            hemisphere = "force_south_west"
            cell = { mcc = 460, mnc = 0, lac = 10, cell_id = 74565 }
            "#,
        )
        .unwrap();

        let settings = Settings::resolve(&args(&[]), &file).unwrap();
        assert_eq!(settings.location.satellites, 8);
        assert_eq!(settings.location.cell_id_width, CellIdWidth::Four);
        assert_eq!(settings.location.hemisphere, HemispherePolicy::ForceSouthWest);
        assert_eq!(settings.location.cell.mcc, 460);
    }

    #[test]
    fn test_gt06_over_udp_rejected() {
        let result = Settings::resolve(&args(&["--transport", "udp"]), &ConfigFile::default());
        assert!(matches!(result, Err(ConfigError::InvalidValue { key: "transport", .. })));

        let ok = Settings::resolve(
            &args(&["--protocol", "suntech", "--transport", "udp"]),
            &ConfigFile::default(),
        );
        assert!(ok.is_ok());
    }

    #[test]
    fn test_invalid_values_rejected() {
        let bad_imei = Settings::resolve(&args(&["--imei", "12AB"]), &ConfigFile::default());
        assert!(matches!(bad_imei, Err(ConfigError::Protocol(_))));

        let no_devices = Settings::resolve(&args(&["--devices", "0"]), &ConfigFile::default());
        assert!(matches!(no_devices, Err(ConfigError::InvalidValue { key: "devices", .. })));

        let negative = Settings::resolve(&args(&["--interval-secs=-1"]), &ConfigFile::default());
        assert!(matches!(negative, Err(ConfigError::InvalidValue { key: "interval_secs", .. })));
    }

    #[test]
    fn test_session_configs_offset_identities() {
        let settings = Settings::resolve(&args(&["--devices", "3"]), &ConfigFile::default()).unwrap();
        let configs = settings.session_configs().unwrap();

        let ids: Vec<&str> = configs.iter().map(|c| c.family.device_id()).collect();
        assert_eq!(ids, vec!["352812192008961", "352812192008962", "352812192008963"]);
        assert!(configs.iter().all(|c| c.server_addr == "127.0.0.1:5023"));
    }

    #[test]
    fn test_suntech_session_configs() {
        let settings = Settings::resolve(
            &args(&["--protocol", "suntech", "--device-id", "000000098", "--devices", "3"]),
            &ConfigFile::default(),
        )
        .unwrap();
        let configs = settings.session_configs().unwrap();

        let ids: Vec<&str> = configs.iter().map(|c| c.family.device_id()).collect();
        assert_eq!(ids, vec!["000000098", "000000099", "000000100"]);
    }

    #[test]
    fn test_identities_are_trimmed() {
        let settings = Settings::resolve(
            &args(&["--imei", " 352812192008961 ", "--device-id", "000000042\n"]),
            &ConfigFile::default(),
        )
        .unwrap();
        assert_eq!(settings.identity.as_str(), "352812192008961");
        assert_eq!(settings.suntech_header.device_id, "000000042");
    }

    #[test]
    fn test_straight_route_is_default_trajectory() {
        let settings = Settings::resolve(&args(&["--iterations", "4"]), &ConfigFile::default()).unwrap();
        assert!(settings.track.is_none());
        assert_eq!(settings.trajectory().samples().len(), 5);
    }

    #[test]
    fn test_inline_samples_replace_route() {
        let file: ConfigFile = toml::from_str(
            r#"
            [route]
            iterations = 50
            samples = [
                { latitude = -14.9, longitude = -42.8, speed_kmh = 40, course_degrees = 181 },
                { latitude = -15.0, longitude = -42.9, speed_kmh = 45, course_degrees = 186 },
            ]
            "#,
        )
        .unwrap();

        let settings = Settings::resolve(&args(&[]), &file).unwrap();
        let samples = settings.trajectory().samples();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[1], TrajectorySample::new(-15.0, -42.9, 45, 186));
    }

    #[test]
    fn test_track_file_from_cli() {
        let path = std::env::temp_dir().join(format!("trackersim-track-{}.toml", std::process::id()));
        std::fs::write(
            &path,
            r#"
            [[samples]]
            latitude = 10.5
            longitude = 20.25
            speed_kmh = 60
            course_degrees = 90

            [[samples]]
            latitude = 10.6
            longitude = 20.25
            speed_kmh = 62
            course_degrees = 1
            "#,
        )
        .unwrap();

        let settings = Settings::resolve(&args(&["--track", path.to_str().unwrap()]), &ConfigFile::default());
        std::fs::remove_file(&path).unwrap();

        let samples = settings.unwrap().trajectory().samples();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].speed_kmh, 60);
        assert_eq!(samples[1].course_degrees, 1);
    }

    #[test]
    fn test_bad_tracks_rejected() {
        let missing = Settings::resolve(
            &args(&["--track", "/nonexistent/trackersim-track.toml"]),
            &ConfigFile::default(),
        );
        assert!(matches!(missing, Err(ConfigError::TrackFile { .. })));

        let empty: ConfigFile = toml::from_str("[route]\nsamples = []\n").unwrap();
        assert!(matches!(
            Settings::resolve(&args(&[]), &empty),
            Err(ConfigError::InvalidValue { key: "samples", .. })
        ));

        let out_of_range: ConfigFile = toml::from_str(
            "[route]\nsamples = [{ latitude = 95.0, longitude = 0.0, speed_kmh = 1, course_degrees = 0 }]\n",
        )
        .unwrap();
        assert!(matches!(
            Settings::resolve(&args(&[]), &out_of_range),
            Err(ConfigError::Protocol(_))
        ));
    }

    #[test]
    fn test_offset_device_id() {
        assert_eq!(offset_device_id("123456789", 0).unwrap(), "123456789");
        assert_eq!(offset_device_id("0099", 1).unwrap(), "0100");
        assert_eq!(offset_device_id("ABC", 0).unwrap(), "ABC");
        assert!(offset_device_id("ABC", 1).is_err());
        assert!(offset_device_id("99", 1).is_err());
    }

    #[test]
    fn test_ipv6_server_addr() {
        let settings = Settings::resolve(&args(&["--host", "::1"]), &ConfigFile::default()).unwrap();
        assert_eq!(settings.server_addr(), "[::1]:5023");
    }
}
