//! Device bridge: capability calls carried to the webview and back.
//!
//! Each call is emitted as a `device_request` event tagged with a fresh id.
//! The webview performs it with the platform plugin and answers through the
//! `resolve_device_request` command, which routes the reply to the waiting
//! call by id.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use swiftpay_core::{
    AssetRef, AuthResult, BiometricDevice, ContactsProvider, DeviceError, DeviceResult,
    Permission, PermissionStatus, Permissions, PromptOptions, QrImageExporter, RawContact,
    SpeechRecognizer, SpeechSynthesizer, with_timeout,
};
use tauri::{AppHandle, Emitter};
use tokio::sync::oneshot;

pub const DEVICE_REQUEST_EVENT: &str = "device_request";
pub const DEVICE_RELEASE_EVENT: &str = "device_release";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum DeviceRequest {
    RequestPermission { permission: Permission },
    HasBiometricHardware,
    Authenticate { options: PromptOptions },
    QueryContacts,
    SpeechStart { locale: String },
    SpeechStop,
    Speak { text: String },
    CaptureQr,
    #[serde(rename_all = "camelCase")]
    SaveImage { image_base64: String, album: String },
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum DeviceReply {
    Permission { status: PermissionStatus },
    Hardware { available: bool },
    Auth { result: AuthResult },
    Contacts { contacts: Vec<RawContact> },
    Done,
    #[serde(rename_all = "camelCase")]
    Image { image_base64: String },
    Saved { asset: AssetRef },
    Error { message: String },
}

#[derive(Clone, Serialize)]
struct RequestEnvelope<'a> {
    id: u64,
    request: &'a DeviceRequest,
}

#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("no pending device request with id {0}")]
    UnknownRequest(u64),
}

/// Where requests go. The app emits them to the webview; tests capture them.
pub trait RequestSink: Send + Sync + 'static {
    fn send(&self, id: u64, request: &DeviceRequest) -> Result<(), String>;

    /// Fire-and-forget engine teardown.
    fn release(&self);
}

impl RequestSink for AppHandle {
    fn send(&self, id: u64, request: &DeviceRequest) -> Result<(), String> {
        self.emit(DEVICE_REQUEST_EVENT, RequestEnvelope { id, request })
            .map_err(|e| e.to_string())
    }

    fn release(&self) {
        if let Err(e) = self.emit(DEVICE_RELEASE_EVENT, ()) {
            log::warn!("device release event failed: {e}");
        }
    }
}

struct Inner<S> {
    sink: S,
    pending: Mutex<HashMap<u64, oneshot::Sender<DeviceReply>>>,
    next_id: AtomicU64,
    timeout: Duration,
}

impl<S> Inner<S> {
    fn pending(&self) -> MutexGuard<'_, HashMap<u64, oneshot::Sender<DeviceReply>>> {
        self.pending.lock().unwrap_or_else(|p| p.into_inner())
    }
}

/// Removes its request from the pending map however the call ends.
struct PendingSlot<'a, S> {
    inner: &'a Inner<S>,
    id: u64,
}

impl<S> Drop for PendingSlot<'_, S> {
    fn drop(&mut self) {
        self.inner.pending().remove(&self.id);
    }
}

pub struct DeviceBridge<S> {
    inner: Arc<Inner<S>>,
}

impl<S> Clone for DeviceBridge<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: RequestSink> DeviceBridge<S> {
    pub fn new(sink: S, timeout: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                sink,
                pending: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(1),
                timeout,
            }),
        }
    }

    async fn call(&self, request: DeviceRequest) -> DeviceResult<DeviceReply> {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.inner.pending().insert(id, tx);
        let _slot = PendingSlot {
            inner: &self.inner,
            id,
        };

        self.inner
            .sink
            .send(id, &request)
            .map_err(DeviceError::Fault)?;
        log::debug!("device request #{id} sent");

        let reply = with_timeout(self.inner.timeout, async {
            rx.await.map_err(|_| DeviceError::Closed)
        })
        .await;
        if let Err(e) = &reply {
            log::warn!("device request #{id} failed: {e}");
        }
        match reply? {
            DeviceReply::Error { message } => Err(DeviceError::Fault(message)),
            reply => Ok(reply),
        }
    }

    /// Hand a webview reply to the call waiting on `id`.
    pub fn resolve(&self, id: u64, reply: DeviceReply) -> Result<(), BridgeError> {
        let tx = self
            .inner
            .pending()
            .remove(&id)
            .ok_or(BridgeError::UnknownRequest(id))?;
        // The caller may have given up between lookup and send.
        if tx.send(reply).is_err() {
            log::debug!("device reply #{id} arrived after its caller left");
        }
        Ok(())
    }

    /// Fail every outstanding call with [`DeviceError::Closed`].
    pub fn cancel_all(&self) {
        let dropped = self.inner.pending().drain().count();
        if dropped > 0 {
            log::info!("cancelled {dropped} pending device requests");
        }
    }

    pub fn pending_count(&self) -> usize {
        self.inner.pending().len()
    }
}

fn unexpected(reply: DeviceReply) -> DeviceError {
    DeviceError::UnexpectedReply(format!("{reply:?}"))
}

impl<S: RequestSink> Permissions for DeviceBridge<S> {
    async fn request(&self, permission: Permission) -> DeviceResult<PermissionStatus> {
        match self
            .call(DeviceRequest::RequestPermission { permission })
            .await?
        {
            DeviceReply::Permission { status } => Ok(status),
            other => Err(unexpected(other)),
        }
    }
}

impl<S: RequestSink> BiometricDevice for DeviceBridge<S> {
    async fn has_hardware(&self) -> DeviceResult<bool> {
        match self.call(DeviceRequest::HasBiometricHardware).await? {
            DeviceReply::Hardware { available } => Ok(available),
            other => Err(unexpected(other)),
        }
    }

    async fn authenticate(&self, options: &PromptOptions) -> DeviceResult<AuthResult> {
        let request = DeviceRequest::Authenticate {
            options: options.clone(),
        };
        match self.call(request).await? {
            DeviceReply::Auth { result } => Ok(result),
            other => Err(unexpected(other)),
        }
    }
}

impl<S: RequestSink> ContactsProvider for DeviceBridge<S> {
    async fn query(&self) -> DeviceResult<Vec<RawContact>> {
        match self.call(DeviceRequest::QueryContacts).await? {
            DeviceReply::Contacts { contacts } => Ok(contacts),
            other => Err(unexpected(other)),
        }
    }
}

impl<S: RequestSink> SpeechRecognizer for DeviceBridge<S> {
    async fn start(&self, locale: &str) -> DeviceResult<()> {
        let request = DeviceRequest::SpeechStart {
            locale: locale.to_string(),
        };
        match self.call(request).await? {
            DeviceReply::Done => Ok(()),
            other => Err(unexpected(other)),
        }
    }

    async fn stop(&self) -> DeviceResult<()> {
        match self.call(DeviceRequest::SpeechStop).await? {
            DeviceReply::Done => Ok(()),
            other => Err(unexpected(other)),
        }
    }

    fn release(&self) {
        self.inner.sink.release();
    }
}

impl<S: RequestSink> SpeechSynthesizer for DeviceBridge<S> {
    async fn speak(&self, text: &str) -> DeviceResult<()> {
        let request = DeviceRequest::Speak {
            text: text.to_string(),
        };
        match self.call(request).await? {
            DeviceReply::Done => Ok(()),
            other => Err(unexpected(other)),
        }
    }
}

impl<S: RequestSink> QrImageExporter for DeviceBridge<S> {
    async fn capture(&self) -> DeviceResult<Vec<u8>> {
        match self.call(DeviceRequest::CaptureQr).await? {
            DeviceReply::Image { image_base64 } => BASE64
                .decode(image_base64)
                .map_err(|e| DeviceError::UnexpectedReply(format!("image is not base64: {e}"))),
            other => Err(unexpected(other)),
        }
    }

    async fn save(&self, image: &[u8], album: &str) -> DeviceResult<AssetRef> {
        let request = DeviceRequest::SaveImage {
            image_base64: BASE64.encode(image),
            album: album.to_string(),
        };
        match self.call(request).await? {
            DeviceReply::Saved { asset } => Ok(asset),
            other => Err(unexpected(other)),
        }
    }
}
