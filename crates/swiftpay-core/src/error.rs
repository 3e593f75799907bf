use rust_decimal::Decimal;
use thiserror::Error;

use crate::device::{DeviceError, Permission};

#[derive(Debug, Error)]
pub enum Error {
    #[error("permission denied: {0}")]
    PermissionDenied(Permission),

    #[error("biometric authentication is not supported on this device")]
    CapabilityUnsupported,

    #[error("authentication cancelled by user")]
    UserCancelled,

    #[error("authentication failed")]
    UserFailed,

    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error("invalid QR code: {0}")]
    Decode(#[from] DecodeError),

    #[error("QR export failed: {0}")]
    Io(#[from] ExportError),

    #[error("a device request is already in flight")]
    Busy,

    #[error("invalid transition: {0}")]
    InvalidTransition(&'static str),

    #[error("stale payment attempt {0}")]
    StaleAttempt(u64),

    #[error("device error: {0}")]
    Device(#[from] DeviceError),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Input rejected at a form boundary. The display text is what the screen
/// shows in its notice.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Please enter a valid amount")]
    InvalidAmount,

    #[error("Amount must be greater than zero")]
    NonPositiveAmount,

    #[error("Amount exceeds the maximum of {0}")]
    AmountTooLarge(Decimal),

    #[error("Please fill out all fields.")]
    MissingFields,

    #[error("Passwords do not match")]
    PasswordMismatch,

    #[error("Invalid email address")]
    InvalidEmail,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("payload is not valid JSON: {0}")]
    Malformed(String),

    #[error("payload has no string `contact` field")]
    MissingField,
}

/// Failures of the QR image export path. None of these touch the encoded
/// payload itself.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExportError {
    #[error("media library permission denied")]
    PermissionDenied,

    #[error("QR capture failed: {0}")]
    CaptureFailed(String),

    #[error("writing to the media library failed: {0}")]
    WriteFailed(String),
}
