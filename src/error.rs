//! Crate-wide error type for recoverable conditions.
//!
//! Fatal invariant violations (acknowledging the sentinel, a handler id
//! outside the static table) are not represented here — they are bugs in
//! the scheduler itself, not data an embedder can act on, and are reported
//! via `panic!` at the point of detection.

use std::fmt;

/// Recoverable error conditions surfaced to the embedder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// A byte/word/long access fell outside every registered I/O handler.
    BusError { address: u32 },
    /// A write landed on a register the hardware defines as read-only.
    ReadOnlyRegister { address: u32, value: u8 },
    /// WR9's reset-command bits decoded to a combination the chip treats
    /// as a no-op.
    InvalidSccResetCode { bits: u8 },
    /// Opening a host-serial channel for an SCC or ACIA port failed; the
    /// channel is disabled rather than the whole core aborting.
    SerialPortUnavailable { channel: &'static str },
    /// A snapshot blob's version field didn't match what this build of
    /// the core can restore.
    SnapshotVersionMismatch { expected: u32, found: u32 },
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoreError::BusError { address } => {
                write!(f, "bus error: no device mapped at {address:#08X}")
            }
            CoreError::ReadOnlyRegister { address, value } => {
                write!(
                    f,
                    "write {value:#04X} to read-only register at {address:#08X} ignored"
                )
            }
            CoreError::InvalidSccResetCode { bits } => {
                write!(f, "SCC reset command {bits:#04b} is not a defined code, treated as null")
            }
            CoreError::SerialPortUnavailable { channel } => {
                write!(f, "host serial port for {channel} unavailable, channel disabled")
            }
            CoreError::SnapshotVersionMismatch { expected, found } => {
                write!(
                    f,
                    "snapshot version mismatch: expected {expected}, found {found}"
                )
            }
        }
    }
}

impl std::error::Error for CoreError {}

pub type CoreResult<T> = Result<T, CoreError>;
