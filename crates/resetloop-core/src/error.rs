use std::time::Duration;
use thiserror::Error;

use crate::types::Phase;

#[derive(Debug, Error)]
pub enum ResetError {
    #[error("adb not found on PATH: install platform-tools or pass --adb")]
    BridgeNotFound,

    #[error("failed to run adb: {0}")]
    BridgeSpawnFailed(String),

    #[error("no device with serial {0} connected")]
    DeviceNotFound(String),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("failed to gain root: {0}")]
    ElevationFailed(String),

    #[error("device does not allow adb root; cannot proceed with factory reset")]
    ElevationDenied,

    #[error("failed to start factory reset: {0}")]
    ResetTriggerFailed(String),

    #[error("timed out in phase '{phase}' after {}s", .waited.as_secs())]
    WaitTimedOut { phase: Phase, waited: Duration },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

impl ResetError {
    /// True for errors that end the current cycle (and therefore the run)
    /// while leaving already-recorded results valid.
    pub fn is_cycle_failure(&self) -> bool {
        matches!(
            self,
            ResetError::ElevationFailed(_)
                | ResetError::ElevationDenied
                | ResetError::ResetTriggerFailed(_)
                | ResetError::WaitTimedOut { .. }
                | ResetError::BridgeSpawnFailed(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, ResetError>;
