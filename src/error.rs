use thiserror::Error;

pub type Result<T> = std::result::Result<T, AuxError>;

/// Unified error type for AUX-channel operations.
///
/// The retry engines record the *first* error they observe and surface it
/// once the retry budget is exhausted, so the variants are `Copy` and carry
/// no allocations.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum AuxError {
    /// The channel hardware is momentarily occupied. Retried immediately,
    /// without the usual inter-retry delay.
    #[error("aux channel busy")]
    Busy,

    /// The sink did not answer within the hardware timeout. Common while
    /// probing a connector with nothing attached.
    #[error("aux transaction timed out")]
    Timeout,

    /// The sink acknowledged the transaction but moved fewer bytes than
    /// requested.
    #[error("short aux reply: expected {expected} bytes, got {got}")]
    Protocol { expected: usize, got: usize },

    /// The sink nacked the transaction, or the reply was malformed.
    #[error("aux transaction failed")]
    Io,

    /// The remote I2C device behind the sink nacked, or the emulated I2C
    /// transfer ran out of retries.
    #[error("remote i2c device did not respond")]
    RemoteIo,

    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
}
