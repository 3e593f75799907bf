use std::sync::Arc;

use swiftpay_core::biometric::VERIFY_PROMPT;
use swiftpay_core::{
    EntryId, Screen, SignUpForm, VoiceSession, VoiceView, export_qr, redirect_after,
    request_camera,
};
use tauri::{AppHandle, State};

use crate::bridge::DeviceReply;
use crate::state::{AppState, ScreenController};
use crate::{ActiveVoice, Device, SharedState, VoiceSlot, lock_state, navigate_to, publish};

const NOT_ON_SCREEN: &str = "command does not apply to the current screen";

// ============================================================================
// Sign-up
// ============================================================================

#[tauri::command]
pub async fn submit_signup(
    form: SignUpForm,
    app: AppHandle,
    state: State<'_, SharedState>,
) -> Result<AppState, String> {
    let (snapshot, redirect) = {
        let mut mgr = lock_state(&state)?;
        let scope = mgr.current().scope.clone();
        let Some((_, ScreenController::SignUp(signup))) = mgr.current_controller_mut() else {
            return Err(NOT_ON_SCREEN.to_string());
        };
        let redirect = match signup.submit(&form) {
            Ok(()) => Some((scope, signup.redirect_delay())),
            Err(e) => {
                log::info!("sign-up rejected: {e}");
                None
            }
        };
        mgr.bump_revision();
        (mgr.snapshot(), redirect)
    };

    if let Some((scope, delay)) = redirect {
        let app = app.clone();
        tauri::async_runtime::spawn(async move {
            if let Some(screen) = redirect_after(scope, delay).await {
                if let Err(e) = navigate_to(&app, screen).await {
                    log::warn!("sign-up redirect failed: {e}");
                }
            }
        });
    }
    Ok(publish(&app, None, snapshot).await)
}

// ============================================================================
// Receive
// ============================================================================

#[tauri::command]
pub async fn export_qr_image(
    app: AppHandle,
    state: State<'_, SharedState>,
) -> Result<AppState, String> {
    let (entry, device, snapshot) = {
        let mut mgr = lock_state(&state)?;
        let Some((entry, ScreenController::Receive(receive))) = mgr.current_controller_mut()
        else {
            return Err(NOT_ON_SCREEN.to_string());
        };
        if !receive.begin_export() {
            return Err("QR export already in progress".to_string());
        }
        mgr.bump_revision();
        (entry, mgr.device(), mgr.snapshot())
    };
    publish(&app, None, snapshot).await;

    let result = export_qr(device.as_ref(), device.as_ref()).await;

    let snapshot = {
        let mut mgr = lock_state(&state)?;
        match mgr.controller_mut(entry) {
            Some(ScreenController::Receive(receive)) => receive.finish_export(result),
            _ => log::debug!("receive screen left during export"),
        }
        mgr.bump_revision();
        mgr.snapshot()
    };
    Ok(publish(&app, None, snapshot).await)
}

// ============================================================================
// Scanner
// ============================================================================

#[tauri::command]
pub async fn request_camera_access(
    app: AppHandle,
    state: State<'_, SharedState>,
) -> Result<AppState, String> {
    let (entry, device) = {
        let mut mgr = lock_state(&state)?;
        let Some((entry, ScreenController::Scanner(_))) = mgr.current_controller_mut() else {
            return Err(NOT_ON_SCREEN.to_string());
        };
        (entry, mgr.device())
    };

    let access = request_camera(device.as_ref()).await;

    let snapshot = {
        let mut mgr = lock_state(&state)?;
        if let Some(ScreenController::Scanner(scanner)) = mgr.controller_mut(entry) {
            scanner.set_access(access);
        }
        mgr.bump_revision();
        mgr.snapshot()
    };
    Ok(publish(&app, None, snapshot).await)
}

#[tauri::command]
pub async fn qr_scanned(
    raw: String,
    app: AppHandle,
    state: State<'_, SharedState>,
) -> Result<AppState, String> {
    let (transition, snapshot) = {
        let mut mgr = lock_state(&state)?;
        let Some((_, ScreenController::Scanner(scanner))) = mgr.current_controller_mut() else {
            return Err(NOT_ON_SCREEN.to_string());
        };
        let next = scanner.on_scanned(&raw);
        let transition = match next {
            Some(screen) => Some(mgr.navigate(screen)),
            None => {
                mgr.bump_revision();
                None
            }
        };
        (transition, mgr.snapshot())
    };
    Ok(publish(&app, transition, snapshot).await)
}

// ============================================================================
// Voice assistant
// ============================================================================

fn sync_voice(
    state: &SharedState,
    entry: EntryId,
    view: Option<VoiceView>,
) -> Result<AppState, String> {
    let mut mgr = lock_state(state)?;
    mgr.set_voice_view(entry, view);
    Ok(mgr.snapshot())
}

#[tauri::command]
pub async fn voice_mount(
    app: AppHandle,
    state: State<'_, SharedState>,
    voice: State<'_, VoiceSlot>,
) -> Result<AppState, String> {
    let (entry, device, config) = {
        let mgr = lock_state(&state)?;
        let current = mgr.current();
        if current.screen != Screen::VoiceAssistant {
            return Err(NOT_ON_SCREEN.to_string());
        }
        (current.id, mgr.device(), mgr.config().voice())
    };

    let mut active = voice.0.lock().await;
    let mounted = active
        .as_ref()
        .filter(|v| v.entry == entry)
        .map(|v| v.session.view());
    if let Some(view) = mounted {
        drop(active);
        let snapshot = sync_voice(&state, entry, Some(view))?;
        return Ok(publish(&app, None, snapshot).await);
    }
    if let Some(mut stale) = active.take() {
        stale.session.close();
    }

    let session = VoiceSession::open(
        device.as_ref(),
        Arc::clone(&device),
        Arc::clone(&device),
        config,
    )
    .await
    .map_err(|e| e.to_string())?;

    let live = lock_state(&state)?.is_live(entry);
    if !live {
        // Left the screen while the permission prompt was up; the session
        // releases on drop.
        log::debug!("voice screen left before mount finished");
        return Err(NOT_ON_SCREEN.to_string());
    }
    let view = session.view();
    *active = Some(ActiveVoice { entry, session });
    drop(active);

    let snapshot = sync_voice(&state, entry, Some(view))?;
    Ok(publish(&app, None, snapshot).await)
}

/// Apply `op` to the mounted session and publish the resulting view.
macro_rules! with_voice {
    ($app:expr, $state:expr, $voice:expr, |$session:ident| $op:expr) => {{
        let mut active = $voice.0.lock().await;
        let Some(ActiveVoice {
            entry,
            session: $session,
        }) = active.as_mut()
        else {
            return Err("voice assistant is not mounted".to_string());
        };
        let entry = *entry;
        $op;
        let view = $session.view();
        drop(active);
        let snapshot = sync_voice(&$state, entry, Some(view))?;
        Ok(publish(&$app, None, snapshot).await)
    }};
}

#[tauri::command]
pub async fn voice_toggle(
    app: AppHandle,
    state: State<'_, SharedState>,
    voice: State<'_, VoiceSlot>,
) -> Result<AppState, String> {
    with_voice!(app, state, voice, |session| {
        session.toggle().await.map_err(|e| e.to_string())?
    })
}

#[tauri::command]
pub async fn voice_speech_start(
    app: AppHandle,
    state: State<'_, SharedState>,
    voice: State<'_, VoiceSlot>,
) -> Result<AppState, String> {
    with_voice!(app, state, voice, |session| session.on_speech_start())
}

#[tauri::command]
pub async fn voice_speech_end(
    app: AppHandle,
    state: State<'_, SharedState>,
    voice: State<'_, VoiceSlot>,
) -> Result<AppState, String> {
    with_voice!(app, state, voice, |session| session.on_speech_end())
}

#[tauri::command]
pub async fn voice_speech_results(
    values: Vec<String>,
    app: AppHandle,
    state: State<'_, SharedState>,
    voice: State<'_, VoiceSlot>,
) -> Result<AppState, String> {
    with_voice!(app, state, voice, |session| session
        .on_speech_results(values)
        .await)
}

#[tauri::command]
pub async fn voice_unmount(
    app: AppHandle,
    state: State<'_, SharedState>,
    voice: State<'_, VoiceSlot>,
) -> Result<AppState, String> {
    let closed = {
        let mut active = voice.0.lock().await;
        active.take().map(|mut v| {
            v.session.close();
            v.entry
        })
    };
    let snapshot = match closed {
        Some(entry) => sync_voice(&state, entry, None)?,
        None => lock_state(&state)?.snapshot(),
    };
    Ok(publish(&app, None, snapshot).await)
}

// ============================================================================
// Biometric verify
// ============================================================================

#[tauri::command]
pub async fn verify_identity(
    app: AppHandle,
    state: State<'_, SharedState>,
) -> Result<AppState, String> {
    let (entry, gate) = {
        let mut mgr = lock_state(&state)?;
        let Some((entry, ScreenController::Verify(verify))) = mgr.current_controller_mut() else {
            return Err(NOT_ON_SCREEN.to_string());
        };
        (entry, verify.gate())
    };

    gate.ensure_probed().await;
    let result = gate.confirm(VERIFY_PROMPT).await;

    let snapshot = {
        let mut mgr = lock_state(&state)?;
        match mgr.controller_mut(entry) {
            Some(ScreenController::Verify(verify)) => verify.apply(result),
            _ => log::debug!("verify screen left during prompt"),
        }
        mgr.bump_revision();
        mgr.snapshot()
    };
    Ok(publish(&app, None, snapshot).await)
}

// ============================================================================
// Device bridge
// ============================================================================

#[tauri::command]
pub async fn resolve_device_request(
    id: u64,
    reply: DeviceReply,
    device: State<'_, Arc<Device>>,
) -> Result<(), String> {
    device.resolve(id, reply).map_err(|e| e.to_string())
}
