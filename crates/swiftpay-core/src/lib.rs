pub mod amount;
pub mod biometric;
pub mod contacts;
pub mod device;
pub mod error;
pub mod flow;
pub mod home;
pub mod navigation;
pub mod notice;
pub mod qr;
pub mod scanner;
pub mod signup;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod voice;

// Re-export rust_decimal for app-layer use
pub use rust_decimal;

// Core types
pub use amount::{AMOUNT_SCALE, Amount, AmountPolicy, is_valid_amount};
pub use error::{DecodeError, Error, ExportError, Result, ValidationError};
pub use navigation::{EntryId, Navigator, Route, Screen, ScreenEntry, ScreenScope};
pub use notice::{Notice, NoticeBoard, NoticeKind, NoticePhase, NoticeTimings};

// Device capabilities
pub use device::{
    AssetRef, AuthResult, BiometricDevice, ContactsProvider, DeviceError, DeviceResult,
    Permission, PermissionStatus, Permissions, PromptOptions, QrImageExporter, RawContact,
    SpeechRecognizer, SpeechSynthesizer, with_timeout,
};

// Screens and controllers
pub use biometric::{Confirmation, ConfirmationGate, GateSupport, VerifyScreen};
pub use contacts::{Contact, PayScreen, avatar_url, filter, list_contacts};
pub use flow::{
    ConfirmTicket, FlowState, PayStep, Payee, PayeeSource, PaymentFlow, PaymentOutcome,
    PaymentScreen, PendingConfirmation, ResultScreen,
};
pub use home::{HomeAction, RecentTransaction, recent_transactions};
pub use qr::{QrPayload, ReceiveScreen, export_qr};
pub use scanner::{CameraAccess, ScannerScreen, request_camera};
pub use signup::{SignUpForm, SignUpScreen, redirect_after};
pub use voice::{CaptureLease, ListeningState, VoiceConfig, VoiceSession, VoiceView};
