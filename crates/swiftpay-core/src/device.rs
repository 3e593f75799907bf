//! Device capability contracts.
//!
//! Every platform capability the app touches (permissions, biometrics,
//! contacts, speech, QR image export) is a trait here. The app shell binds
//! them to the webview through its device bridge; tests bind them to
//! [`crate::testing::FakeDevice`].

use std::fmt;
use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ── Shared types ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Permission {
    Camera,
    Contacts,
    Microphone,
    MediaWrite,
}

impl Permission {
    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::Camera => "camera",
            Permission::Contacts => "contacts",
            Permission::Microphone => "microphone",
            Permission::MediaWrite => "media-write",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PermissionStatus {
    Granted,
    Denied,
}

/// Raw answer of a biometric prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AuthResult {
    Success,
    Failed,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptOptions {
    pub prompt_message: String,
    pub fallback_label: String,
}

/// A device address-book entry as the contacts provider returns it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawContact {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub phone_numbers: Vec<String>,
}

/// Reference to an image persisted in the media library.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetRef {
    pub id: String,
    pub album: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeviceError {
    #[error("device call timed out")]
    Timeout,

    #[error("device channel closed before a reply arrived")]
    Closed,

    #[error("unexpected device reply: {0}")]
    UnexpectedReply(String),

    #[error("device fault: {0}")]
    Fault(String),
}

pub type DeviceResult<T> = std::result::Result<T, DeviceError>;

/// Bound a device call by `limit`; an elapsed timer becomes
/// [`DeviceError::Timeout`].
pub async fn with_timeout<T, F>(limit: Duration, call: F) -> DeviceResult<T>
where
    F: Future<Output = DeviceResult<T>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(DeviceError::Timeout),
    }
}

// ── Capability traits ───────────────────────────────────────────────

pub trait Permissions: Send + Sync {
    fn request(
        &self,
        permission: Permission,
    ) -> impl Future<Output = DeviceResult<PermissionStatus>> + Send;
}

pub trait BiometricDevice: Send + Sync {
    /// Whether the device has usable biometric hardware.
    fn has_hardware(&self) -> impl Future<Output = DeviceResult<bool>> + Send;

    fn authenticate(
        &self,
        options: &PromptOptions,
    ) -> impl Future<Output = DeviceResult<AuthResult>> + Send;
}

pub trait ContactsProvider: Send + Sync {
    fn query(&self) -> impl Future<Output = DeviceResult<Vec<RawContact>>> + Send;
}

pub trait SpeechRecognizer: Send + Sync {
    fn start(&self, locale: &str) -> impl Future<Output = DeviceResult<()>> + Send;

    fn stop(&self) -> impl Future<Output = DeviceResult<()>> + Send;

    /// Detach every listener and destroy the capture engine.
    ///
    /// Called from `Drop`, so it must not block or fail.
    fn release(&self);
}

pub trait SpeechSynthesizer: Send + Sync {
    fn speak(&self, text: &str) -> impl Future<Output = DeviceResult<()>> + Send;
}

pub trait QrImageExporter: Send + Sync {
    /// Snapshot the rendered QR view as image bytes.
    fn capture(&self) -> impl Future<Output = DeviceResult<Vec<u8>>> + Send;

    fn save(
        &self,
        image: &[u8],
        album: &str,
    ) -> impl Future<Output = DeviceResult<AssetRef>> + Send;
}
