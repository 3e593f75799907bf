use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use swiftpay_core::{
    AmountPolicy, BiometricDevice, CameraAccess, ConfirmationGate, Contact, EntryId, FlowState,
    GateSupport, Navigator, Notice, NoticeBoard, NoticeTimings, PayScreen, PaymentScreen,
    ReceiveScreen, RecentTransaction, ResultScreen, ScannerScreen, Screen, ScreenEntry,
    SignUpScreen, VerifyScreen, VoiceView, avatar_url, recent_transactions,
};
use tokio::sync::watch;

use crate::config::AppConfig;

// ============================================================================
// Screen views (sent to frontend)
// ============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactView {
    pub id: String,
    pub name: String,
    pub phone: String,
    pub avatar_url: String,
}

impl From<&Contact> for ContactView {
    fn from(contact: &Contact) -> Self {
        Self {
            id: contact.id.clone(),
            name: contact.name.clone(),
            phone: contact.phone.clone(),
            avatar_url: avatar_url(&contact.name),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ScreenView {
    Landing,
    SignUp,
    Home {
        transactions: Vec<RecentTransaction>,
    },
    Pay {
        loaded: bool,
        query: String,
        contacts: Vec<ContactView>,
    },
    Payment {
        flow: FlowState,
        confirming: bool,
    },
    PayResult {
        success: bool,
        headline: &'static str,
    },
    Receive {
        value: String,
        exporting: bool,
    },
    Scanner {
        access: CameraAccess,
        scanning: bool,
    },
    VoiceAssistant {
        voice: Option<VoiceView>,
    },
    BiometricVerify {
        support: GateSupport,
        pending: bool,
    },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppState {
    pub revision: u64,
    pub updated_at: String,
    pub stack: Vec<ScreenEntry>,
    pub current: ScreenEntry,
    pub view: ScreenView,
}

// ============================================================================
// Per-entry controllers
// ============================================================================

pub enum ScreenController<D> {
    SignUp(SignUpScreen),
    Pay(PayScreen),
    Payment(PaymentScreen<D>),
    Result(ResultScreen),
    Receive(ReceiveScreen),
    Scanner(ScannerScreen),
    Verify(VerifyScreen<D>),
}

impl<D: BiometricDevice> ScreenController<D> {
    fn notices(&self) -> &NoticeBoard {
        match self {
            ScreenController::SignUp(s) => s.notices(),
            ScreenController::Pay(s) => s.notices(),
            ScreenController::Payment(s) => s.notices(),
            ScreenController::Result(s) => s.notices(),
            ScreenController::Receive(s) => s.notices(),
            ScreenController::Scanner(s) => s.notices(),
            ScreenController::Verify(s) => s.notices(),
        }
    }
}

/// A freshly mounted screen's notice stream, for the shell to forward.
pub struct NoticeFeed {
    pub entry: EntryId,
    pub rx: watch::Receiver<Option<Notice>>,
}

/// What a navigation did to the stack.
pub struct Transition {
    pub closed: Vec<EntryId>,
    pub mounted: Option<NoticeFeed>,
}

// ============================================================================
// App state manager
// ============================================================================

pub struct AppStateManager<D> {
    config: AppConfig,
    policy: AmountPolicy,
    timings: NoticeTimings,
    device: Arc<D>,
    navigator: Navigator,
    screens: HashMap<EntryId, ScreenController<D>>,
    voice: Option<(EntryId, VoiceView)>,
    revision: u64,
}

impl<D: BiometricDevice> AppStateManager<D> {
    pub fn new(config: AppConfig, device: Arc<D>) -> Self {
        let policy = config.amount_policy().unwrap_or_else(|e| {
            log::warn!("{e}; falling back to the default amount policy");
            AmountPolicy::default()
        });
        Self {
            config,
            policy,
            timings: NoticeTimings::default(),
            device,
            navigator: Navigator::default(),
            screens: HashMap::new(),
            voice: None,
            revision: 0,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn device(&self) -> Arc<D> {
        Arc::clone(&self.device)
    }

    pub fn current(&self) -> &ScreenEntry {
        self.navigator.current()
    }

    /// Whether `entry` is still on the stack. Async work checks this before
    /// writing its result back.
    pub fn is_live(&self, entry: EntryId) -> bool {
        self.navigator.contains(entry)
    }

    pub fn navigate(&mut self, screen: Screen) -> Transition {
        let closed = self.navigator.navigate(screen);
        self.settle(closed)
    }

    /// Navigate in place of the current screen; Back will skip it.
    pub fn replace(&mut self, screen: Screen) -> Transition {
        let closed = self.navigator.replace(screen);
        self.settle(closed)
    }

    pub fn back(&mut self) -> Transition {
        let closed = self.navigator.back().into_iter().collect();
        self.settle(closed)
    }

    fn settle(&mut self, closed: Vec<EntryId>) -> Transition {
        for id in &closed {
            // Dropping a controller cancels its notice timeline.
            self.screens.remove(id);
            if self.voice.as_ref().is_some_and(|(entry, _)| entry == id) {
                self.voice = None;
            }
        }
        let mounted = self.mount_current();
        let top = self.navigator.current().id;
        if let Some(ScreenController::Scanner(scanner)) = self.screens.get_mut(&top) {
            scanner.resume();
        }
        self.bump_revision();
        Transition { closed, mounted }
    }

    fn mount_current(&mut self) -> Option<NoticeFeed> {
        let entry = self.navigator.current().clone();
        if self.screens.contains_key(&entry.id) {
            return None;
        }
        let route = entry.screen.route();
        let timings = self.timings.clone();
        let controller = match entry.screen {
            Screen::SignUp => {
                ScreenController::SignUp(SignUpScreen::new(self.config.signup_redirect(), timings))
            }
            Screen::Pay => ScreenController::Pay(PayScreen::new(timings)),
            Screen::PaymentScreen { payee } => ScreenController::Payment(PaymentScreen::new(
                payee,
                Arc::clone(&self.device),
                self.policy.clone(),
                timings,
            )),
            Screen::PayResult { outcome } => {
                ScreenController::Result(ResultScreen::new(outcome, timings))
            }
            Screen::Receive { contact } => {
                ScreenController::Receive(ReceiveScreen::new(contact, timings))
            }
            Screen::Scanner => ScreenController::Scanner(ScannerScreen::new(timings)),
            Screen::BiometricVerify => {
                ScreenController::Verify(VerifyScreen::new(Arc::clone(&self.device), timings))
            }
            Screen::Landing | Screen::Home | Screen::VoiceAssistant => {
                return None;
            }
        };
        let rx = controller.notices().subscribe();
        self.screens.insert(entry.id, controller);
        log::debug!("mounted {route:?} as entry {}", entry.id);
        Some(NoticeFeed { entry: entry.id, rx })
    }

    pub fn controller_mut(&mut self, entry: EntryId) -> Option<&mut ScreenController<D>> {
        self.screens.get_mut(&entry)
    }

    /// The biometric gate of `entry`, for screens that confirm with one.
    pub fn gate_of(&self, entry: EntryId) -> Option<Arc<ConfirmationGate<D>>> {
        match self.screens.get(&entry)? {
            ScreenController::Payment(payment) => Some(payment.gate()),
            ScreenController::Verify(verify) => Some(verify.gate()),
            _ => None,
        }
    }

    /// The controller of the screen on top, if it has one.
    pub fn current_controller_mut(&mut self) -> Option<(EntryId, &mut ScreenController<D>)> {
        let id = self.navigator.current().id;
        self.screens.get_mut(&id).map(|c| (id, c))
    }

    pub fn set_voice_view(&mut self, entry: EntryId, view: Option<VoiceView>) {
        match view {
            Some(view) if self.is_live(entry) => self.voice = Some((entry, view)),
            Some(_) => {}
            None => {
                if self.voice.as_ref().is_some_and(|(id, _)| *id == entry) {
                    self.voice = None;
                }
            }
        }
        self.bump_revision();
    }

    pub fn bump_revision(&mut self) {
        self.revision += 1;
    }

    pub fn snapshot(&self) -> AppState {
        let current = self.navigator.current().clone();
        AppState {
            revision: self.revision,
            updated_at: chrono::Utc::now().to_rfc3339(),
            stack: self.navigator.entries().to_vec(),
            view: self.view_of(&current),
            current,
        }
    }

    fn view_of(&self, entry: &ScreenEntry) -> ScreenView {
        let controller = self.screens.get(&entry.id);
        match (&entry.screen, controller) {
            (Screen::Home, _) => ScreenView::Home {
                transactions: recent_transactions(),
            },
            (Screen::Pay, Some(ScreenController::Pay(pay))) => ScreenView::Pay {
                loaded: pay.is_loaded(),
                query: pay.query().to_string(),
                contacts: pay.visible().into_iter().map(ContactView::from).collect(),
            },
            (Screen::PaymentScreen { .. }, Some(ScreenController::Payment(payment))) => {
                let flow = payment.flow().state().clone();
                ScreenView::Payment {
                    confirming: matches!(flow, FlowState::Confirming { .. }),
                    flow,
                }
            }
            (Screen::PayResult { outcome }, _) => ScreenView::PayResult {
                success: outcome.success,
                headline: outcome.headline(),
            },
            (Screen::Receive { .. }, Some(ScreenController::Receive(receive))) => {
                ScreenView::Receive {
                    value: receive.value(),
                    exporting: receive.is_exporting(),
                }
            }
            (Screen::Scanner, Some(ScreenController::Scanner(scanner))) => ScreenView::Scanner {
                access: scanner.access(),
                scanning: scanner.is_scanning(),
            },
            (Screen::VoiceAssistant, _) => ScreenView::VoiceAssistant {
                voice: self
                    .voice
                    .as_ref()
                    .filter(|(id, _)| *id == entry.id)
                    .map(|(_, view)| view.clone()),
            },
            (Screen::BiometricVerify, Some(ScreenController::Verify(verify))) => {
                let gate = verify.gate();
                ScreenView::BiometricVerify {
                    support: gate.support(),
                    pending: gate.is_pending(),
                }
            }
            (Screen::SignUp, _) => ScreenView::SignUp,
            _ => ScreenView::Landing,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use swiftpay_core::biometric::UNSUPPORTED_MESSAGE;
    use swiftpay_core::testing::FakeDevice;
    use swiftpay_core::{Confirmation, PayStep, Payee, PayeeSource, PaymentOutcome};

    fn qr_payee(name: &str) -> Payee {
        Payee {
            name: name.into(),
            phone: None,
            source: PayeeSource::Qr,
        }
    }

    fn manager() -> AppStateManager<FakeDevice> {
        AppStateManager::new(AppConfig::default(), Arc::new(FakeDevice::new()))
    }

    #[tokio::test]
    async fn starts_on_landing() {
        let mgr = manager();
        let state = mgr.snapshot();
        assert_eq!(state.current.screen, Screen::Landing);
        assert!(matches!(state.view, ScreenView::Landing));
        assert_eq!(state.revision, 0);
    }

    #[tokio::test]
    async fn mounting_creates_controller_and_feed() {
        let mut mgr = manager();
        let transition = mgr.navigate(Screen::Pay);
        let feed = transition.mounted.expect("pay screen has notices");
        assert_eq!(feed.entry, mgr.current().id);
        assert!(mgr.controller_mut(feed.entry).is_some());
        assert!(matches!(mgr.snapshot().view, ScreenView::Pay { loaded: false, .. }));
    }

    #[tokio::test]
    async fn leaving_a_screen_drops_its_controller() {
        let mut mgr = manager();
        mgr.navigate(Screen::Home);
        mgr.navigate(Screen::Receive { contact: None });
        let receive = mgr.current().id;

        let transition = mgr.navigate(Screen::Home);
        assert_eq!(transition.closed, vec![receive]);
        assert!(mgr.controller_mut(receive).is_none());
        assert!(!mgr.is_live(receive));
        match mgr.snapshot().view {
            ScreenView::Home { transactions } => assert_eq!(transactions.len(), 5),
            other => panic!("unexpected view {other:?}"),
        }
    }

    #[tokio::test]
    async fn payment_view_reflects_flow() {
        let mut mgr = manager();
        mgr.navigate(Screen::PaymentScreen {
            payee: Payee {
                name: "Alex".into(),
                phone: None,
                source: PayeeSource::Qr,
            },
        });
        let Some((_, ScreenController::Payment(payment))) = mgr.current_controller_mut() else {
            panic!("payment controller missing");
        };
        payment.set_amount("9000").unwrap();
        match mgr.snapshot().view {
            ScreenView::Payment { flow, confirming } => {
                assert!(!confirming);
                assert!(matches!(flow, FlowState::EnteringAmount { .. }));
            }
            other => panic!("unexpected view {other:?}"),
        }
    }

    #[tokio::test]
    async fn result_view_has_headline() {
        let mut mgr = manager();
        mgr.navigate(Screen::PayResult {
            outcome: PaymentOutcome::failed(),
        });
        match mgr.snapshot().view {
            ScreenView::PayResult { success, headline } => {
                assert!(!success);
                assert_eq!(headline, "Payment Failed");
            }
            other => panic!("unexpected view {other:?}"),
        }
    }

    #[tokio::test]
    async fn voice_view_only_for_live_entry() {
        let mut mgr = manager();
        mgr.navigate(Screen::VoiceAssistant);
        let voice = mgr.current().id;
        let view = VoiceView {
            state: swiftpay_core::ListeningState::Idle,
            transcript: "hi".into(),
            closed: false,
        };
        mgr.set_voice_view(voice, Some(view.clone()));
        assert!(matches!(
            mgr.snapshot().view,
            ScreenView::VoiceAssistant { voice: Some(_) }
        ));

        mgr.back();
        mgr.set_voice_view(voice, Some(view));
        mgr.navigate(Screen::VoiceAssistant);
        assert!(matches!(
            mgr.snapshot().view,
            ScreenView::VoiceAssistant { voice: None }
        ));
    }

    #[tokio::test]
    async fn scanner_accepts_codes_after_returning() {
        let mut mgr = manager();
        mgr.navigate(Screen::Home);
        mgr.navigate(Screen::Scanner);
        let scanner = mgr.current().id;
        let Some((_, ScreenController::Scanner(screen))) = mgr.current_controller_mut() else {
            panic!("scanner controller missing");
        };
        screen.set_access(CameraAccess::Granted);
        let next = screen.on_scanned(r#"{"contact":"Alex"}"#).unwrap();

        mgr.navigate(next);
        mgr.back();
        assert_eq!(mgr.current().id, scanner);
        assert!(matches!(
            mgr.snapshot().view,
            ScreenView::Scanner { scanning: true, .. }
        ));
        let Some((_, ScreenController::Scanner(screen))) = mgr.current_controller_mut() else {
            panic!("scanner controller missing");
        };
        assert!(screen.on_scanned(r#"{"contact":"Elly"}"#).is_some());
    }

    #[tokio::test]
    async fn result_replaces_the_payment_screen() {
        let mut mgr = manager();
        mgr.navigate(Screen::Home);
        mgr.navigate(Screen::Pay);
        mgr.navigate(Screen::PaymentScreen {
            payee: qr_payee("Alex"),
        });
        let payment_entry = mgr.current().id;
        let Some((_, ScreenController::Payment(payment))) = mgr.current_controller_mut() else {
            panic!("payment controller missing");
        };
        payment.set_amount("9000").unwrap();
        let PayStep::Confirm(pending) = payment.prepare_pay().unwrap() else {
            panic!("payment blocked");
        };
        let (ticket, result) = pending.run().await;
        let Some(ScreenController::Payment(payment)) = mgr.controller_mut(payment_entry) else {
            panic!("payment controller missing");
        };
        let next = payment.finish(&ticket, result).unwrap();

        let transition = mgr.replace(next);
        assert_eq!(transition.closed, vec![payment_entry]);
        assert!(!mgr.is_live(payment_entry));
        assert!(matches!(
            mgr.snapshot().view,
            ScreenView::PayResult { success: true, .. }
        ));

        mgr.back();
        assert_eq!(mgr.current().screen, Screen::Pay);

        // Picking the payee again starts over.
        mgr.navigate(Screen::PaymentScreen {
            payee: qr_payee("Alex"),
        });
        match mgr.snapshot().view {
            ScreenView::Payment { flow, .. } => {
                assert!(matches!(flow, FlowState::EnteringAmount { .. }))
            }
            other => panic!("unexpected view {other:?}"),
        }
    }

    #[tokio::test]
    async fn unsupported_result_mounts_with_advisory() {
        let mut mgr = manager();
        let transition = mgr.navigate(Screen::PayResult {
            outcome: PaymentOutcome::from(Confirmation::Unsupported),
        });
        let feed = transition.mounted.expect("result screen has notices");
        let notice = feed.rx.borrow().clone().expect("advisory shown on mount");
        assert_eq!(notice.text, UNSUPPORTED_MESSAGE);
    }

    #[tokio::test]
    async fn verify_gate_can_be_probed_on_mount() {
        let mut mgr = AppStateManager::new(
            AppConfig::default(),
            Arc::new(FakeDevice::new().with_hardware(false)),
        );
        mgr.navigate(Screen::BiometricVerify);
        let entry = mgr.current().id;
        let gate = mgr.gate_of(entry).expect("verify screen has a gate");
        assert!(matches!(
            mgr.snapshot().view,
            ScreenView::BiometricVerify {
                support: GateSupport::Unchecked,
                ..
            }
        ));

        gate.ensure_probed().await;
        assert!(matches!(
            mgr.snapshot().view,
            ScreenView::BiometricVerify {
                support: GateSupport::Unsupported,
                ..
            }
        ));
        mgr.navigate(Screen::Home);
        assert!(mgr.gate_of(mgr.current().id).is_none());
    }

    #[tokio::test]
    async fn revision_increases_on_navigation() {
        let mut mgr = manager();
        mgr.navigate(Screen::SignUp);
        mgr.back();
        assert_eq!(mgr.snapshot().revision, 2);
    }
}
