use std::io;
use std::time::Duration;

use thiserror::Error;

/// Rejection codes returned by the motor controller in a `!xx` reply.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum MountError {
    #[error("unknown command")]
    UnknownCommand,
    #[error("command length error")]
    CommandLengthError,
    #[error("motor not stopped")]
    MotorNotStopped,
    #[error("invalid character")]
    InvalidCharacter,
    #[error("not initialized")]
    NotInitialized,
    #[error("driver sleeping")]
    DriverSleeping,
    #[error("PEC training is running")]
    PecTrainingIsRunning,
    #[error("no valid PEC data")]
    NoValidPecData,
    /// Error code outside the documented table.
    #[error("unknown error code {0:#04x}")]
    Unknown(u8),
}

impl MountError {
    pub fn from_code(code: u8) -> Self {
        match code {
            0 => MountError::UnknownCommand,
            1 => MountError::CommandLengthError,
            2 => MountError::MotorNotStopped,
            3 => MountError::InvalidCharacter,
            4 => MountError::NotInitialized,
            5 => MountError::DriverSleeping,
            7 => MountError::PecTrainingIsRunning,
            8 => MountError::NoValidPecData,
            other => MountError::Unknown(other),
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    /// No reply arrived within the per-call deadline. Recoverable; the
    /// caller decides whether to retry.
    #[error("no reply from mount within {0:?}")]
    Timeout(Duration),

    /// The mount answered with a `!xx` rejection.
    #[error("mount rejected command: {0}")]
    Mount(#[from] MountError),

    /// Malformed or oversized reply. Never swallowed silently.
    #[error("malformed reply: {0}")]
    Decode(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Error {
    pub fn decode(msg: impl Into<String>) -> Self {
        Error::Decode(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
