//! Biometric confirmation gate.
//!
//! Wraps a single yes/no device prompt. Hardware support is probed once per
//! screen mount; unsupported hardware short-circuits every confirmation
//! without showing a prompt. Device faults are folded into
//! [`Confirmation::UserFailed`] and never escape the gate.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use serde::Serialize;

use crate::device::{AuthResult, BiometricDevice, PromptOptions};
use crate::error::{Error, Result};
use crate::notice::{NoticeBoard, NoticeKind, NoticeTimings};

pub const UNSUPPORTED_MESSAGE: &str = "Biometric authentication is not supported on this device.";
pub const PAYMENT_PROMPT: &str = "Authenticate to confirm payment";
pub const VERIFY_PROMPT: &str = "Verify your identity";
pub const FALLBACK_LABEL: &str = "Use passcode";

pub const VERIFY_SUCCESS_MESSAGE: &str = "Biometric authentication successful!";
pub const VERIFY_FAILED_MESSAGE: &str = "Biometric authentication failed. Please try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
#[repr(u8)]
pub enum GateSupport {
    Unchecked = 0,
    Supported = 1,
    Unsupported = 2,
}

impl GateSupport {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => Self::Supported,
            2 => Self::Unsupported,
            _ => Self::Unchecked,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Confirmation {
    Success,
    UserFailed,
    UserCancelled,
    /// No prompt was shown because the hardware is missing.
    Unsupported,
}

impl Confirmation {
    pub fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }

    /// The error a non-successful confirmation stands for.
    pub fn error(self) -> Option<Error> {
        match self {
            Self::Success => None,
            Self::UserFailed => Some(Error::UserFailed),
            Self::UserCancelled => Some(Error::UserCancelled),
            Self::Unsupported => Some(Error::CapabilityUnsupported),
        }
    }
}

pub struct ConfirmationGate<D> {
    device: Arc<D>,
    support: AtomicU8,
    pending: AtomicBool,
}

impl<D: BiometricDevice> ConfirmationGate<D> {
    pub fn new(device: Arc<D>) -> Self {
        Self {
            device,
            support: AtomicU8::new(GateSupport::Unchecked as u8),
            pending: AtomicBool::new(false),
        }
    }

    pub fn support(&self) -> GateSupport {
        GateSupport::from_u8(self.support.load(Ordering::Acquire))
    }

    /// Query the hardware, once. A probe fault counts as unsupported.
    pub async fn ensure_probed(&self) -> GateSupport {
        let current = self.support();
        if current != GateSupport::Unchecked {
            return current;
        }
        let support = match self.device.has_hardware().await {
            Ok(true) => GateSupport::Supported,
            Ok(false) => GateSupport::Unsupported,
            Err(e) => {
                log::warn!("biometric probe failed: {e}");
                GateSupport::Unsupported
            }
        };
        self.support.store(support as u8, Ordering::Release);
        support
    }

    /// Run one prompt. Fails only with [`Error::Busy`] when another prompt
    /// from this gate is still outstanding.
    pub async fn confirm(&self, prompt: &str) -> Result<Confirmation> {
        if self.support() != GateSupport::Supported {
            log::info!("biometric confirm skipped: hardware {:?}", self.support());
            return Ok(Confirmation::Unsupported);
        }
        let _pending = PendingGuard::acquire(&self.pending).ok_or(Error::Busy)?;

        let options = PromptOptions {
            prompt_message: prompt.to_string(),
            fallback_label: FALLBACK_LABEL.to_string(),
        };
        let confirmation = match self.device.authenticate(&options).await {
            Ok(AuthResult::Success) => Confirmation::Success,
            Ok(AuthResult::Failed) => Confirmation::UserFailed,
            Ok(AuthResult::Cancelled) => Confirmation::UserCancelled,
            Err(e) => {
                log::warn!("biometric prompt failed: {e}");
                Confirmation::UserFailed
            }
        };
        log::debug!("biometric confirm: {confirmation:?}");
        Ok(confirmation)
    }

    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }
}

/// Holds the gate's pending flag for the lifetime of one prompt, including
/// when the awaiting future is dropped.
struct PendingGuard<'a>(&'a AtomicBool);

impl<'a> PendingGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// The stand-alone "verify your identity" screen.
pub struct VerifyScreen<D> {
    gate: Arc<ConfirmationGate<D>>,
    notices: NoticeBoard,
}

impl<D: BiometricDevice> VerifyScreen<D> {
    pub fn new(device: Arc<D>, timings: NoticeTimings) -> Self {
        Self {
            gate: Arc::new(ConfirmationGate::new(device)),
            notices: NoticeBoard::new(timings),
        }
    }

    /// Shared handle for awaiting the prompt outside of the screen's owner.
    pub fn gate(&self) -> Arc<ConfirmationGate<D>> {
        Arc::clone(&self.gate)
    }

    pub fn apply(&mut self, result: Result<Confirmation>) {
        match result {
            Ok(Confirmation::Success) => {
                self.notices.show(VERIFY_SUCCESS_MESSAGE, NoticeKind::Success)
            }
            Ok(Confirmation::Unsupported) => {
                self.notices.show(UNSUPPORTED_MESSAGE, NoticeKind::Error)
            }
            Ok(_) => self.notices.show(VERIFY_FAILED_MESSAGE, NoticeKind::Error),
            Err(e) => log::debug!("verify screen: prompt not started: {e}"),
        }
    }

    /// Probe if needed, prompt, and fold the answer into a notice.
    pub async fn verify(&mut self) {
        let gate = self.gate();
        gate.ensure_probed().await;
        let result = gate.confirm(VERIFY_PROMPT).await;
        self.apply(result);
    }

    pub fn notices(&self) -> &NoticeBoard {
        &self.notices
    }
}
