use serde::{Deserialize, Serialize};

use crate::device::{AssetRef, Permission, PermissionStatus, Permissions, QrImageExporter};
use crate::error::{DecodeError, ExportError};
use crate::notice::{NoticeBoard, NoticeKind, NoticeTimings};

/// Media-library album exported QR codes are filed under.
pub const QR_ALBUM: &str = "QR Codes";

pub const EXPORT_SAVED_MESSAGE: &str = "QR code saved to your device in the \"QR Codes\" album.";
pub const EXPORT_PERMISSION_MESSAGE: &str = "Please grant permission to save the QR code.";
pub const EXPORT_FAILED_MESSAGE: &str = "Failed to save QR code. Please try again.";

/// Recipient identity carried by a payment QR code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QrPayload {
    pub contact: String,
}

impl QrPayload {
    pub fn new(contact: impl Into<String>) -> Self {
        Self {
            contact: contact.into(),
        }
    }
}

/// Serialize to the compact JSON text rendered into the QR image.
pub fn encode(payload: &QrPayload) -> String {
    serde_json::json!({ "contact": payload.contact }).to_string()
}

/// Parse scanned QR text. Never panics: anything that is not a JSON object
/// with a string `contact` is a tagged error.
pub fn decode(raw: &str) -> Result<QrPayload, DecodeError> {
    let value: serde_json::Value =
        serde_json::from_str(raw).map_err(|e| DecodeError::Malformed(e.to_string()))?;
    value
        .get("contact")
        .and_then(|c| c.as_str())
        .map(QrPayload::new)
        .ok_or(DecodeError::MissingField)
}

/// Save the rendered QR view to the media library.
pub async fn export_qr<P, X>(permissions: &P, exporter: &X) -> Result<AssetRef, ExportError>
where
    P: Permissions,
    X: QrImageExporter,
{
    match permissions.request(Permission::MediaWrite).await {
        Ok(PermissionStatus::Granted) => {}
        Ok(PermissionStatus::Denied) => return Err(ExportError::PermissionDenied),
        Err(e) => return Err(ExportError::WriteFailed(e.to_string())),
    }
    let image = exporter
        .capture()
        .await
        .map_err(|e| ExportError::CaptureFailed(e.to_string()))?;
    let asset = exporter
        .save(&image, QR_ALBUM)
        .await
        .map_err(|e| ExportError::WriteFailed(e.to_string()))?;
    log::info!("qr export: saved asset {} to {}", asset.id, asset.album);
    Ok(asset)
}

/// State behind the Receive screen.
pub struct ReceiveScreen {
    payload: QrPayload,
    exporting: bool,
    notices: NoticeBoard,
}

impl ReceiveScreen {
    /// A screen entered without a contact encodes the empty string.
    pub fn new(contact: Option<String>, timings: NoticeTimings) -> Self {
        Self {
            payload: QrPayload::new(contact.unwrap_or_default()),
            exporting: false,
            notices: NoticeBoard::new(timings),
        }
    }

    pub fn value(&self) -> String {
        encode(&self.payload)
    }

    pub fn is_exporting(&self) -> bool {
        self.exporting
    }

    /// Claim the export slot. Returns `false` while an export is running.
    pub fn begin_export(&mut self) -> bool {
        if self.exporting {
            return false;
        }
        self.exporting = true;
        true
    }

    pub fn finish_export(&mut self, result: Result<AssetRef, ExportError>) {
        self.exporting = false;
        match result {
            Ok(_) => self.notices.show(EXPORT_SAVED_MESSAGE, NoticeKind::Success),
            Err(ExportError::PermissionDenied) => {
                self.notices.show(EXPORT_PERMISSION_MESSAGE, NoticeKind::Error)
            }
            Err(e) => {
                log::warn!("qr export failed: {e}");
                self.notices.show(EXPORT_FAILED_MESSAGE, NoticeKind::Error);
            }
        }
    }

    pub fn notices(&self) -> &NoticeBoard {
        &self.notices
    }
}
