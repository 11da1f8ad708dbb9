//! Session driver: connect, identify, then stream one message per sample.

use std::fmt;
use std::time::Duration;

use bytes::Bytes;
use chrono::{Local, NaiveDateTime, Utc};
use log::{debug, error, info, warn};
use tokio::sync::watch;

use trackersim_protocol::{
    build_alive_record, build_location, build_login, build_status_record, DeviceIdentity,
    DeviceStatus, LocationOptions, RecordHeader, SerialCounter, TrajectorySample,
};

use crate::error::SessionError;
use crate::session::transport::{Ack, Transport, TransportMode};
use crate::trajectory::TrajectorySource;

/// Session lifecycle.
///
/// `Disconnected -> Connected -> Authenticated -> Streaming -> Closed`; any
/// failure goes straight to `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connected,
    Authenticated,
    Streaming,
    Closed,
}

/// GT06 binary family settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Gt06Settings {
    pub identity: DeviceIdentity,
    pub location: LocationOptions,
}

/// Suntech text family settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuntechSettings {
    pub header: RecordHeader,
    pub status: DeviceStatus,
    /// Odometer reported with the first record; grows by one per sample.
    pub odometer_km: u32,
}

/// Message family spoken by a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolFamily {
    Binary(Gt06Settings),
    Text(SuntechSettings),
}

impl ProtocolFamily {
    pub fn name(&self) -> &'static str {
        match self {
            ProtocolFamily::Binary(_) => "GT06",
            ProtocolFamily::Text(_) => "Suntech",
        }
    }

    /// Identifier the server knows the unit by.
    pub fn device_id(&self) -> &str {
        match self {
            ProtocolFamily::Binary(gt06) => gt06.identity.as_str(),
            ProtocolFamily::Text(suntech) => &suntech.header.device_id,
        }
    }

    /// Timestamp for the next message.
    ///
    /// GT06 units report UTC; SA200 units report the wall clock.
    fn timestamp(&self) -> NaiveDateTime {
        match self {
            ProtocolFamily::Binary(_) => Utc::now().naive_utc(),
            ProtocolFamily::Text(_) => Local::now().naive_local(),
        }
    }
}

/// Everything a session needs; fixed for the session's lifetime.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// `host:port`.
    pub server_addr: String,
    pub family: ProtocolFamily,
    pub transport: TransportMode,
    pub connect_timeout: Duration,
    pub login_ack_timeout: Duration,
    pub ack_timeout: Duration,
    /// Pause between consecutive samples.
    pub interval: Duration,
    /// Read (and log) whatever the server sends back after each sample.
    /// The identification message is always followed by an ack read.
    pub wait_for_ack: bool,
}

/// Counters reported when a session ends.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSummary {
    /// Messages written, identification included.
    pub frames_sent: u64,
    pub acks_received: u64,
    pub acks_missed: u64,
    /// Serial number the next frame would have carried.
    pub next_serial: u16,
    /// Stopped early by a cancellation request.
    pub cancelled: bool,
}

impl fmt::Display for SessionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} sent, {} acked, {} unacked{}",
            self.frames_sent,
            self.acks_received,
            self.acks_missed,
            if self.cancelled { " (cancelled)" } else { "" }
        )
    }
}

/// One simulated unit talking to the server.
pub struct Session {
    id: usize,
    config: SessionConfig,
    state: SessionState,
    transport: Option<Transport>,
    serial: SerialCounter,
    cancel: watch::Receiver<bool>,
    summary: SessionSummary,
}

impl Session {
    pub fn new(id: usize, config: SessionConfig, cancel: watch::Receiver<bool>) -> Self {
        Self {
            id,
            config,
            state: SessionState::Disconnected,
            transport: None,
            serial: SerialCounter::new(),
            cancel,
            summary: SessionSummary::default(),
        }
    }

    /// Start numbering frames at `serial` instead of 1.
    #[cfg(test)]
    pub fn with_serial(mut self, serial: SerialCounter) -> Self {
        self.serial = serial;
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Serial number the next frame will carry.
    pub fn serial(&self) -> u16 {
        self.serial.current()
    }

    /// Open the transport.
    pub async fn connect(&mut self) -> Result<(), SessionError> {
        self.expect_state(SessionState::Disconnected)?;

        if matches!(self.config.family, ProtocolFamily::Binary(_))
            && self.config.transport != TransportMode::Tcp
        {
            self.state = SessionState::Closed;
            return Err(SessionError::Unsupported(
                "GT06 sessions require TCP".to_string(),
            ));
        }

        info!(
            "[Device {}] Connecting to {} over {:?} ({} {})",
            self.id,
            self.config.server_addr,
            self.config.transport,
            self.config.family.name(),
            self.config.family.device_id()
        );

        match Transport::connect(
            self.config.transport,
            &self.config.server_addr,
            self.config.connect_timeout,
        )
        .await
        {
            Ok(transport) => {
                if let Some(peer) = transport.peer_addr() {
                    debug!(
                        "[Device {}] Connected to {} over {:?}",
                        self.id,
                        peer,
                        transport.mode()
                    );
                }
                self.transport = Some(transport);
                self.state = SessionState::Connected;
                Ok(())
            }
            Err(e) => {
                self.state = SessionState::Closed;
                Err(e)
            }
        }
    }

    /// Send the identification message and wait for its acknowledgement.
    ///
    /// A missing acknowledgement is logged and tolerated. Returns the bytes
    /// received, if any. Nothing is sent when cancellation is already
    /// requested; the session stays `Connected`.
    pub async fn authenticate(&mut self) -> Result<Option<Bytes>, SessionError> {
        self.expect_state(SessionState::Connected)?;
        if self.is_cancelled() {
            self.summary.cancelled = true;
            info!("[Device {}] Cancelled before identification", self.id);
            return Ok(None);
        }

        let serial = self.serial.current();
        let message = match &self.config.family {
            ProtocolFamily::Binary(gt06) => build_login(&gt06.identity, serial),
            ProtocolFamily::Text(suntech) => build_alive_record(
                &suntech.header,
                &suntech.status,
                suntech.odometer_km,
                self.config.family.timestamp(),
            ),
        };
        let message = self.guard(message.map_err(SessionError::from))?;

        info!(
            "[Device {}] Sending identification ({} bytes, serial {})",
            self.id,
            message.len(),
            serial
        );
        let sent = self.transmit(&message).await;
        self.guard(sent)?;
        self.serial.advance();

        let received = self.await_ack(self.config.login_ack_timeout).await;
        let ack = self.guard(received)?;
        if ack.is_none() {
            warn!("[Device {}] No identification ack, continuing", self.id);
        }

        self.state = SessionState::Authenticated;
        Ok(ack)
    }

    /// Send one message per sample, pausing `interval` between them.
    ///
    /// Returns early, without error, when cancellation is requested.
    pub async fn stream(&mut self, samples: &[TrajectorySample]) -> Result<(), SessionError> {
        self.expect_state(SessionState::Authenticated)?;
        self.state = SessionState::Streaming;

        info!(
            "[Device {}] Streaming {} samples every {:?}",
            self.id,
            samples.len(),
            self.config.interval
        );

        // SA200 units report their first position one interval after the ALV.
        if matches!(self.config.family, ProtocolFamily::Text(_))
            && !samples.is_empty()
            && self.pause(self.config.interval).await
        {
            self.summary.cancelled = true;
        }

        for (index, sample) in samples.iter().enumerate() {
            if self.summary.cancelled || self.is_cancelled() {
                self.summary.cancelled = true;
                break;
            }

            let serial = self.serial.current();
            let built = self.build_sample_message(index, sample, serial);
            let message = self.guard(built)?;
            let sent = self.transmit(&message).await;
            self.guard(sent)?;
            self.serial.advance();

            info!(
                "[Device {}] Sample {}/{} sent: lat={:.6} lon={:.6} speed={} course={} serial={}",
                self.id,
                index + 1,
                samples.len(),
                sample.latitude,
                sample.longitude,
                sample.speed_kmh,
                sample.course_degrees,
                serial
            );

            if self.config.wait_for_ack {
                let received = self.await_ack(self.config.ack_timeout).await;
                self.guard(received)?;
            }

            if index + 1 < samples.len() && self.pause(self.config.interval).await {
                self.summary.cancelled = true;
                break;
            }
        }

        if self.summary.cancelled {
            info!("[Device {}] Cancelled, stopping stream", self.id);
        }
        Ok(())
    }

    /// Connect, identify, stream every sample of `source`, then close.
    pub async fn run(mut self, source: &dyn TrajectorySource) -> Result<SessionSummary, SessionError> {
        let result = self.drive(source).await;
        let reached = self.state();
        self.close().await;

        match result {
            Ok(()) => {
                info!("[Device {}] Session finished: {}", self.id, self.summary);
                Ok(self.summary)
            }
            Err(e) => {
                error!(
                    "[Device {}] Session failed ({:?}): {}",
                    self.id,
                    reached,
                    e
                );
                Err(e)
            }
        }
    }

    async fn drive(&mut self, source: &dyn TrajectorySource) -> Result<(), SessionError> {
        if self.is_cancelled() {
            self.summary.cancelled = true;
            return Ok(());
        }
        self.connect().await?;
        self.authenticate().await?;
        if self.summary.cancelled {
            return Ok(());
        }
        let samples = source.samples();
        self.stream(&samples).await
    }

    /// Release the transport. Safe to call more than once.
    pub async fn close(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            transport.shutdown().await;
            debug!("[Device {}] Transport closed", self.id);
        }
        self.summary.next_serial = self.serial();
        self.state = SessionState::Closed;
    }

    fn build_sample_message(
        &self,
        index: usize,
        sample: &TrajectorySample,
        serial: u16,
    ) -> Result<Bytes, SessionError> {
        let message = match &self.config.family {
            ProtocolFamily::Binary(gt06) => build_location(
                sample,
                &gt06.location,
                self.config.family.timestamp(),
                serial,
            )?,
            ProtocolFamily::Text(suntech) => {
                let odometer = suntech.odometer_km.saturating_add(index as u32);
                build_status_record(
                    &suntech.header,
                    &suntech.status,
                    sample,
                    odometer,
                    self.config.family.timestamp(),
                )?
            }
        };
        Ok(message)
    }

    async fn transmit(&mut self, message: &[u8]) -> Result<(), SessionError> {
        let id = self.id;
        let transport = self.transport.as_mut().ok_or(SessionError::InvalidState {
            expected: SessionState::Connected,
            actual: self.state,
        })?;
        transport.send(message).await?;
        self.summary.frames_sent += 1;
        debug!("[Device {}] >> {}", id, describe(&self.config.family, message));
        Ok(())
    }

    async fn await_ack(&mut self, wait: Duration) -> Result<Option<Bytes>, SessionError> {
        let id = self.id;
        let transport = self.transport.as_mut().ok_or(SessionError::InvalidState {
            expected: SessionState::Connected,
            actual: self.state,
        })?;
        match transport.read_ack(wait).await? {
            Ack::Received(bytes) => {
                self.summary.acks_received += 1;
                info!("[Device {}] << ack {}", id, describe(&self.config.family, &bytes));
                Ok(Some(bytes))
            }
            Ack::TimedOut => {
                self.summary.acks_missed += 1;
                debug!("[Device {}] No ack within {:?}", id, wait);
                Ok(None)
            }
        }
    }

    /// Sleep for `duration`; true if cancelled meanwhile.
    async fn pause(&mut self, duration: Duration) -> bool {
        let sleep = tokio::time::sleep(duration);
        tokio::pin!(sleep);

        loop {
            tokio::select! {
                _ = &mut sleep => return self.is_cancelled(),
                changed = self.cancel.changed() => {
                    if changed.is_err() {
                        // Sender gone; nothing can cancel any more.
                        sleep.as_mut().await;
                        return self.is_cancelled();
                    }
                    if self.is_cancelled() {
                        return true;
                    }
                }
            }
        }
    }

    fn is_cancelled(&self) -> bool {
        *self.cancel.borrow()
    }

    fn expect_state(&self, expected: SessionState) -> Result<(), SessionError> {
        if self.state != expected {
            return Err(SessionError::InvalidState {
                expected,
                actual: self.state,
            });
        }
        Ok(())
    }

    /// Move to `Closed` when `result` is an error.
    fn guard<T>(&mut self, result: Result<T, SessionError>) -> Result<T, SessionError> {
        if result.is_err() {
            self.state = SessionState::Closed;
        }
        result
    }
}

/// Hex for binary frames, escaped text for text records.
fn describe(family: &ProtocolFamily, bytes: &[u8]) -> String {
    match family {
        ProtocolFamily::Binary(_) => to_hex(bytes),
        ProtocolFamily::Text(_) => bytes.escape_ascii().to_string(),
    }
}

/// Space-separated uppercase hex.
pub fn to_hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}
