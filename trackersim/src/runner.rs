//! Runs a fleet of independent sessions against one server.

use std::sync::Arc;

use log::{error, info};
use tokio::sync::watch;

use crate::error::SessionError;
use crate::session::{Session, SessionConfig, SessionSummary};
use crate::trajectory::TrajectorySource;

/// Result of one unit's session.
#[derive(Debug)]
pub struct FleetOutcome {
    pub device_index: usize,
    pub device_id: String,
    pub result: Result<SessionSummary, SessionError>,
}

impl FleetOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Spawn one session per config, all replaying `source`, and wait for all.
///
/// Sessions share nothing but the route and the cancellation signal; one
/// failing does not stop the others.
pub async fn run_fleet(
    configs: Vec<SessionConfig>,
    source: Arc<dyn TrajectorySource>,
    cancel: watch::Receiver<bool>,
) -> Vec<FleetOutcome> {
    info!("Starting {} session(s)", configs.len());

    let mut handles = Vec::with_capacity(configs.len());
    for (index, config) in configs.into_iter().enumerate() {
        let device_id = config.family.device_id().to_string();
        let source = Arc::clone(&source);
        let session = Session::new(index + 1, config, cancel.clone());
        let handle = tokio::spawn(async move { session.run(source.as_ref()).await });
        handles.push((index, device_id, handle));
    }

    let mut outcomes = Vec::with_capacity(handles.len());
    for (index, device_id, handle) in handles {
        let result = match handle.await {
            Ok(result) => result,
            Err(e) => {
                error!("[Device {}] Session task failed: {}", index + 1, e);
                Err(SessionError::Task(e.to_string()))
            }
        };
        outcomes.push(FleetOutcome {
            device_index: index,
            device_id,
            result,
        });
    }
    outcomes
}
