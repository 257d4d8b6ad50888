// Error types for the time subsystem

use shared::clock::UnknownClockId;
use thiserror::Error;

pub const EBUSY: i32 = 16;
pub const ENODEV: i32 = 19;
pub const EINVAL: i32 = 22;

/// Recoverable time subsystem errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TimeError {
    #[error("Invalid clock id: {0}")]
    InvalidClockId(i32),

    #[error("Time management already initialized")]
    AlreadyInitialized,

    #[error("Time management not initialized")]
    NotInitialized,
}

impl TimeError {
    /// Errno value reported to user space
    pub fn errno(&self) -> i32 {
        match self {
            TimeError::InvalidClockId(_) => EINVAL,
            TimeError::AlreadyInitialized => EBUSY,
            TimeError::NotInitialized => ENODEV,
        }
    }
}

impl From<UnknownClockId> for TimeError {
    fn from(id: UnknownClockId) -> Self {
        TimeError::InvalidClockId(id.0)
    }
}
