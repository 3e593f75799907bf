//! In-memory device for tests.
//!
//! [`FakeDevice`] implements every capability trait, records each call and
//! answers from canned results configured up front.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::device::{
    AssetRef, AuthResult, BiometricDevice, ContactsProvider, DeviceError, DeviceResult,
    Permission, PermissionStatus, Permissions, PromptOptions, QrImageExporter, RawContact,
    SpeechRecognizer, SpeechSynthesizer,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceCall {
    Permission(Permission),
    HasHardware,
    Authenticate(String),
    QueryContacts,
    SpeechStart(String),
    SpeechStop,
    Speak(String),
    Capture,
    Save(String),
}

pub struct FakeDevice {
    denied: Vec<Permission>,
    hardware: DeviceResult<bool>,
    auth_results: Mutex<VecDeque<DeviceResult<AuthResult>>>,
    auth_delay: Option<Duration>,
    contacts: DeviceResult<Vec<RawContact>>,
    speech_start: DeviceResult<()>,
    capture: DeviceResult<Vec<u8>>,
    save: DeviceResult<()>,
    calls: Mutex<Vec<DeviceCall>>,
    releases: AtomicUsize,
}

impl Default for FakeDevice {
    fn default() -> Self {
        Self {
            denied: Vec::new(),
            hardware: Ok(true),
            auth_results: Mutex::new(VecDeque::new()),
            auth_delay: None,
            contacts: Ok(Vec::new()),
            speech_start: Ok(()),
            capture: Ok(vec![0x89, b'P', b'N', b'G']),
            save: Ok(()),
            calls: Mutex::new(Vec::new()),
            releases: AtomicUsize::new(0),
        }
    }
}

impl FakeDevice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deny(mut self, permission: Permission) -> Self {
        self.denied.push(permission);
        self
    }

    pub fn with_hardware(mut self, present: bool) -> Self {
        self.hardware = Ok(present);
        self
    }

    pub fn with_hardware_fault(mut self) -> Self {
        self.hardware = Err(DeviceError::Fault("probe failed".into()));
        self
    }

    /// Queue a prompt answer. Once the queue is empty prompts succeed.
    pub fn with_auth(self, result: DeviceResult<AuthResult>) -> Self {
        lock(&self.auth_results).push_back(result);
        self
    }

    pub fn with_auth_delay(mut self, delay: Duration) -> Self {
        self.auth_delay = Some(delay);
        self
    }

    pub fn with_contacts(mut self, contacts: Vec<RawContact>) -> Self {
        self.contacts = Ok(contacts);
        self
    }

    pub fn with_contacts_fault(mut self) -> Self {
        self.contacts = Err(DeviceError::Fault("address book unavailable".into()));
        self
    }

    pub fn with_speech_start_fault(mut self) -> Self {
        self.speech_start = Err(DeviceError::Fault("recognizer busy".into()));
        self
    }

    pub fn with_capture_fault(mut self) -> Self {
        self.capture = Err(DeviceError::Fault("view not mounted".into()));
        self
    }

    pub fn with_save_fault(mut self) -> Self {
        self.save = Err(DeviceError::Fault("disk full".into()));
        self
    }

    pub fn calls(&self) -> Vec<DeviceCall> {
        lock(&self.calls).clone()
    }

    pub fn count(&self, pred: impl Fn(&DeviceCall) -> bool) -> usize {
        lock(&self.calls).iter().filter(|c| pred(c)).count()
    }

    pub fn auth_calls(&self) -> usize {
        self.count(|c| matches!(c, DeviceCall::Authenticate(_)))
    }

    pub fn spoken(&self) -> Vec<String> {
        lock(&self.calls)
            .iter()
            .filter_map(|c| match c {
                DeviceCall::Speak(text) => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn release_count(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }

    fn record(&self, call: DeviceCall) {
        lock(&self.calls).push(call);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl Permissions for FakeDevice {
    async fn request(&self, permission: Permission) -> DeviceResult<PermissionStatus> {
        self.record(DeviceCall::Permission(permission));
        if self.denied.contains(&permission) {
            Ok(PermissionStatus::Denied)
        } else {
            Ok(PermissionStatus::Granted)
        }
    }
}

impl BiometricDevice for FakeDevice {
    async fn has_hardware(&self) -> DeviceResult<bool> {
        self.record(DeviceCall::HasHardware);
        self.hardware.clone()
    }

    async fn authenticate(&self, options: &PromptOptions) -> DeviceResult<AuthResult> {
        self.record(DeviceCall::Authenticate(options.prompt_message.clone()));
        let result = lock(&self.auth_results)
            .pop_front()
            .unwrap_or(Ok(AuthResult::Success));
        if let Some(delay) = self.auth_delay {
            tokio::time::sleep(delay).await;
        }
        result
    }
}

impl ContactsProvider for FakeDevice {
    async fn query(&self) -> DeviceResult<Vec<RawContact>> {
        self.record(DeviceCall::QueryContacts);
        self.contacts.clone()
    }
}

impl SpeechRecognizer for FakeDevice {
    async fn start(&self, locale: &str) -> DeviceResult<()> {
        self.record(DeviceCall::SpeechStart(locale.to_string()));
        self.speech_start.clone()
    }

    async fn stop(&self) -> DeviceResult<()> {
        self.record(DeviceCall::SpeechStop);
        Ok(())
    }

    fn release(&self) {
        self.releases.fetch_add(1, Ordering::SeqCst);
    }
}

impl SpeechSynthesizer for FakeDevice {
    async fn speak(&self, text: &str) -> DeviceResult<()> {
        self.record(DeviceCall::Speak(text.to_string()));
        Ok(())
    }
}

impl QrImageExporter for FakeDevice {
    async fn capture(&self) -> DeviceResult<Vec<u8>> {
        self.record(DeviceCall::Capture);
        self.capture.clone()
    }

    async fn save(&self, _image: &[u8], album: &str) -> DeviceResult<AssetRef> {
        self.record(DeviceCall::Save(album.to_string()));
        self.save.clone().map(|()| AssetRef {
            id: format!("asset-{}", self.count(|c| matches!(c, DeviceCall::Save(_)))),
            album: album.to_string(),
        })
    }
}

/// Build a raw address-book entry.
pub fn raw_contact(id: &str, name: Option<&str>, phones: &[&str]) -> RawContact {
    RawContact {
        id: id.to_string(),
        name: name.map(str::to_string),
        phone_numbers: phones.iter().map(|p| p.to_string()).collect(),
    }
}
