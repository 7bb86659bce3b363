use rfs_sdr::DeviceError;
use thiserror::Error;

/// Result type for sweep-engine operations.
pub type SweepResult<T> = Result<T, SweepError>;

/// Errors returned by the sweep control API and pipeline.
#[derive(Error, Debug)]
pub enum SweepError {
    /// A frequency bound is outside [0, 7250] MHz or min exceeds max.
    #[error("invalid frequency range")]
    InvalidRange,

    /// The parameter conflicts with the active output mode.
    #[error("parameter incompatible with the active output mode")]
    IncompatibleMode,

    /// More ranges than the engine supports.
    #[error("too many frequency ranges")]
    InvalidRangeCount,

    /// Calls arrived in an order the state machine does not accept.
    #[error("sweep state is not ready for this operation")]
    NotReady,

    /// The derived FFT size falls outside [4, 8180].
    #[error("invalid FFT size")]
    InvalidFftSize,

    /// A parameter was rejected (for example, a second write mutex).
    #[error("invalid parameter")]
    InvalidParam,

    /// The operation is recognized but not implemented.
    #[error("operation not supported")]
    Unsupported,

    /// The peripheral backend failed.
    #[error(transparent)]
    Device(#[from] DeviceError),
}

impl SweepError {
    /// Numeric code in the band reserved alongside the peripheral library's
    /// own codes, for callers that need C-compatible error reporting.
    pub fn code(&self) -> i32 {
        match self {
            SweepError::InvalidRange => -6000,
            SweepError::IncompatibleMode => -6001,
            SweepError::InvalidRangeCount => -6002,
            SweepError::NotReady => -6003,
            SweepError::InvalidFftSize => -6004,
            SweepError::InvalidParam => -2,
            SweepError::Unsupported => -9999,
            SweepError::Device(e) => e.code(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_code_band() {
        let configuration_errors = [
            SweepError::InvalidRange,
            SweepError::IncompatibleMode,
            SweepError::InvalidRangeCount,
            SweepError::NotReady,
            SweepError::InvalidFftSize,
        ];
        for e in &configuration_errors {
            assert!((-6004..=-6000).contains(&e.code()), "{e} -> {}", e.code());
        }
    }
}
