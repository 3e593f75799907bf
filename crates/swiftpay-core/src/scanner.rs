use serde::Serialize;

use crate::device::{Permission, PermissionStatus, Permissions};
use crate::flow::Payee;
use crate::navigation::Screen;
use crate::notice::{NoticeBoard, NoticeKind, NoticeTimings};
use crate::qr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CameraAccess {
    /// Shown as "Requesting camera permission".
    Requesting,
    Granted,
    /// Shown as "No access to camera".
    Denied,
}

/// Ask for the camera. A device fault is reported as no access.
pub async fn request_camera<P: Permissions>(permissions: &P) -> CameraAccess {
    match permissions.request(Permission::Camera).await {
        Ok(PermissionStatus::Granted) => CameraAccess::Granted,
        Ok(PermissionStatus::Denied) => CameraAccess::Denied,
        Err(e) => {
            log::warn!("scanner: camera permission request failed: {e}");
            CameraAccess::Denied
        }
    }
}

pub struct ScannerScreen {
    access: CameraAccess,
    scanned: bool,
    notices: NoticeBoard,
}

impl ScannerScreen {
    pub fn new(timings: NoticeTimings) -> Self {
        Self {
            access: CameraAccess::Requesting,
            scanned: false,
            notices: NoticeBoard::new(timings),
        }
    }

    pub fn access(&self) -> CameraAccess {
        self.access
    }

    pub fn set_access(&mut self, access: CameraAccess) {
        self.access = access;
    }

    pub fn is_scanning(&self) -> bool {
        self.access == CameraAccess::Granted && !self.scanned
    }

    /// Handle one decoded barcode. Returns the payment screen for a valid
    /// payload; the scanner then stops accepting codes. An invalid payload
    /// raises a notice and scanning resumes. Scans without camera access are
    /// dropped.
    pub fn on_scanned(&mut self, raw: &str) -> Option<Screen> {
        if !self.is_scanning() {
            return None;
        }
        match qr::decode(raw) {
            Ok(payload) => {
                self.scanned = true;
                log::info!("scanner: payee {:?}", payload.contact);
                Some(Screen::PaymentScreen {
                    payee: Payee::from(payload),
                })
            }
            Err(e) => {
                log::warn!("scanner: invalid QR code data: {e}");
                self.notices
                    .show(format!("Invalid QR code: {raw}"), NoticeKind::Error);
                None
            }
        }
    }

    /// The scanner is back on top of the stack; accept codes again.
    pub fn resume(&mut self) {
        if self.scanned {
            log::debug!("scanner: resumed");
        }
        self.scanned = false;
    }

    pub fn notices(&self) -> &NoticeBoard {
        &self.notices
    }
}
