pub mod bridge;
pub mod commands;
pub mod config;
pub mod payment_commands;
pub mod state;

use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use swiftpay_core::{EntryId, HomeAction, Notice, Screen, VoiceSession};
use tauri::{AppHandle, Emitter, Manager, State};

use bridge::DeviceBridge;
use config::AppConfig;
use state::{AppState, AppStateManager, NoticeFeed, Transition};

const APP_STATE_UPDATED_EVENT: &str = "app_state_updated";
const NOTICE_UPDATED_EVENT: &str = "notice_updated";

/// Device capabilities as the app sees them: carried over the webview bridge.
pub type Device = DeviceBridge<AppHandle>;
pub type SharedState = Mutex<AppStateManager<Device>>;

// Voice session (managed alongside AppStateManager; its calls are awaited
// while it is held)
pub struct ActiveVoice {
    pub entry: EntryId,
    pub session: VoiceSession<Device, Device>,
}

#[derive(Default)]
pub struct VoiceSlot(pub tokio::sync::Mutex<Option<ActiveVoice>>);

#[derive(Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct NoticeEvent {
    entry_id: EntryId,
    notice: Option<Notice>,
}

// ============================================================================
// Navigation Commands
// ============================================================================

#[tauri::command]
async fn navigate(screen: Screen, app: AppHandle) -> Result<AppState, String> {
    navigate_to(&app, screen).await
}

#[tauri::command]
async fn go_back(app: AppHandle, state: State<'_, SharedState>) -> Result<AppState, String> {
    let (transition, snapshot) = {
        let mut mgr = lock_state(&state)?;
        let transition = mgr.back();
        (transition, mgr.snapshot())
    };
    Ok(publish(&app, Some(transition), snapshot).await)
}

#[tauri::command]
async fn home_action(action: HomeAction, app: AppHandle) -> Result<AppState, String> {
    navigate_to(&app, action.target()).await
}

// ============================================================================
// App State Commands
// ============================================================================

#[tauri::command]
async fn get_app_state(state: State<'_, SharedState>) -> Result<AppState, String> {
    let mgr = lock_state(&state)?;
    Ok(mgr.snapshot())
}

#[tauri::command]
async fn get_config(state: State<'_, SharedState>) -> Result<AppConfig, String> {
    let mgr = lock_state(&state)?;
    Ok(mgr.config().clone())
}

// ============================================================================
// Helpers
// ============================================================================

pub(crate) fn lock_state(state: &SharedState) -> Result<MutexGuard<'_, AppStateManager<Device>>, String> {
    state.lock().map_err(|_| "state lock failed".to_string())
}

fn emit_state(app: &AppHandle, state: &AppState) {
    let _ = app.emit(APP_STATE_UPDATED_EVENT, state);
}

pub(crate) async fn navigate_to(app: &AppHandle, screen: Screen) -> Result<AppState, String> {
    let (transition, snapshot) = {
        let state = app.state::<SharedState>();
        let mut mgr = lock_state(&state)?;
        let transition = mgr.navigate(screen);
        (transition, mgr.snapshot())
    };
    Ok(publish(app, Some(transition), snapshot).await)
}

/// Finish a state change: wire up the mounted screen, tear down what left
/// the stack, then tell the webview.
pub(crate) async fn publish(
    app: &AppHandle,
    transition: Option<Transition>,
    snapshot: AppState,
) -> AppState {
    if let Some(transition) = transition {
        if let Some(feed) = transition.mounted {
            probe_biometrics(app.clone(), feed.entry);
            forward_notices(app.clone(), feed);
        }
        if !transition.closed.is_empty() {
            close_voice(app, &transition.closed).await;
        }
    }
    emit_state(app, &snapshot);
    snapshot
}

async fn close_voice(app: &AppHandle, closed: &[EntryId]) {
    let slot = app.state::<VoiceSlot>();
    let mut active = slot.0.lock().await;
    if active.as_ref().is_some_and(|v| closed.contains(&v.entry)) {
        if let Some(mut voice) = active.take() {
            voice.session.close();
        }
    }
}

/// Check biometric hardware as soon as a screen with a gate mounts, so its
/// view reports support before the first prompt.
fn probe_biometrics(app: AppHandle, entry: EntryId) {
    let state = app.state::<SharedState>();
    let gate = match lock_state(&state) {
        Ok(mgr) => mgr.gate_of(entry),
        Err(e) => {
            log::warn!("biometric probe for entry {entry} skipped: {e}");
            None
        }
    };
    let Some(gate) = gate else {
        return;
    };
    tauri::async_runtime::spawn(async move {
        let support = gate.ensure_probed().await;
        log::debug!("entry {entry} biometric support: {support:?}");
        let snapshot = {
            let state = app.state::<SharedState>();
            let Ok(mut mgr) = lock_state(&state) else {
                return;
            };
            if !mgr.is_live(entry) {
                return;
            }
            mgr.bump_revision();
            mgr.snapshot()
        };
        emit_state(&app, &snapshot);
    });
}

/// Relay a screen's notice timeline to the webview until the screen is gone.
/// A notice already up at mount goes out first.
fn forward_notices(app: AppHandle, feed: NoticeFeed) {
    let NoticeFeed { entry, mut rx } = feed;
    tauri::async_runtime::spawn(async move {
        let initial = rx.borrow_and_update().clone();
        if initial.is_some() {
            let event = NoticeEvent {
                entry_id: entry,
                notice: initial,
            };
            if let Err(e) = app.emit(NOTICE_UPDATED_EVENT, event) {
                log::warn!("notice forward for entry {entry} failed: {e}");
            }
        }
        while rx.changed().await.is_ok() {
            let notice = rx.borrow_and_update().clone();
            let event = NoticeEvent {
                entry_id: entry,
                notice,
            };
            if let Err(e) = app.emit(NOTICE_UPDATED_EVENT, event) {
                log::warn!("notice forward for entry {entry} failed: {e}");
            }
        }
        log::debug!("notice feed for entry {entry} closed");
    });
}

// ============================================================================
// App Entry Point
// ============================================================================

#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    tauri::Builder::default()
        .plugin(
            tauri_plugin_log::Builder::default()
                .level(log::LevelFilter::Info)
                .level_for("tao", log::LevelFilter::Warn)
                .level_for("wry", log::LevelFilter::Warn)
                .level_for("swiftpay_core", log::LevelFilter::Info)
                .build(),
        )
        .setup(|app| {
            let app_data_dir = app
                .path()
                .app_data_dir()
                .expect("failed to get app data directory");

            let config = AppConfig::load_or_init(&app_data_dir).unwrap_or_else(|e| {
                log::warn!("config load failed ({e}); using defaults");
                AppConfig::default()
            });
            let device = Arc::new(DeviceBridge::new(
                app.handle().clone(),
                config.device_timeout(),
            ));
            let manager = AppStateManager::new(config, Arc::clone(&device));

            app.manage(Mutex::new(manager));
            app.manage(device);
            app.manage(VoiceSlot::default());
            Ok(())
        })
        .on_window_event(|window, event| {
            if let tauri::WindowEvent::Destroyed = event {
                window.state::<Arc<Device>>().cancel_all();
            }
        })
        .invoke_handler(tauri::generate_handler![
            // Navigation
            navigate,
            go_back,
            home_action,
            // App state
            get_app_state,
            get_config,
            // Screens
            commands::submit_signup,
            commands::export_qr_image,
            commands::request_camera_access,
            commands::qr_scanned,
            commands::voice_mount,
            commands::voice_toggle,
            commands::voice_speech_start,
            commands::voice_speech_end,
            commands::voice_speech_results,
            commands::voice_unmount,
            commands::verify_identity,
            // Device bridge
            commands::resolve_device_request,
            // Payments
            payment_commands::load_contacts,
            payment_commands::search_contacts,
            payment_commands::select_contact,
            payment_commands::select_qr_payee,
            payment_commands::set_amount,
            payment_commands::pay,
        ])
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}
