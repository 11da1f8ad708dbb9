//! Simulated unit sessions.

pub mod driver;
pub mod transport;

pub use driver::{
    Gt06Settings, ProtocolFamily, Session, SessionConfig, SessionState, SessionSummary,
    SuntechSettings,
};
pub use transport::TransportMode;
