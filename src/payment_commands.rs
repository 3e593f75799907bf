use swiftpay_core::{Error, PayStep, Payee, Screen, list_contacts, qr};
use tauri::{AppHandle, State};

use crate::state::{AppState, ScreenController};
use crate::{SharedState, lock_state, navigate_to, publish};

const NOT_ON_PAY: &str = "not on the pay screen";
const NOT_ON_PAYMENT: &str = "not on the payment screen";

// ============================================================================
// Payee selection
// ============================================================================

/// Fetch the address book for the Pay screen. Done once per visit; searching
/// filters the cached list.
#[tauri::command]
pub async fn load_contacts(
    app: AppHandle,
    state: State<'_, SharedState>,
) -> Result<AppState, String> {
    let (entry, device) = {
        let mut mgr = lock_state(&state)?;
        let Some((entry, ScreenController::Pay(pay))) = mgr.current_controller_mut() else {
            return Err(NOT_ON_PAY.to_string());
        };
        if pay.is_loaded() {
            return Ok(mgr.snapshot());
        }
        (entry, mgr.device())
    };

    let result = list_contacts(device.as_ref(), device.as_ref()).await;
    if let Err(e) = &result {
        log::info!("contacts unavailable: {e}");
    }

    let snapshot = {
        let mut mgr = lock_state(&state)?;
        match mgr.controller_mut(entry) {
            Some(ScreenController::Pay(pay)) => pay.apply_load(result),
            _ => log::debug!("pay screen left while loading contacts"),
        }
        mgr.bump_revision();
        mgr.snapshot()
    };
    Ok(publish(&app, None, snapshot).await)
}

#[tauri::command]
pub async fn search_contacts(
    query: String,
    app: AppHandle,
    state: State<'_, SharedState>,
) -> Result<AppState, String> {
    let snapshot = {
        let mut mgr = lock_state(&state)?;
        let Some((_, ScreenController::Pay(pay))) = mgr.current_controller_mut() else {
            return Err(NOT_ON_PAY.to_string());
        };
        pay.set_query(query);
        mgr.bump_revision();
        mgr.snapshot()
    };
    Ok(publish(&app, None, snapshot).await)
}

#[tauri::command]
pub async fn select_contact(
    contact_id: String,
    app: AppHandle,
    state: State<'_, SharedState>,
) -> Result<AppState, String> {
    let payee = {
        let mut mgr = lock_state(&state)?;
        let Some((_, ScreenController::Pay(pay))) = mgr.current_controller_mut() else {
            return Err(NOT_ON_PAY.to_string());
        };
        let contact = pay
            .find(&contact_id)
            .ok_or_else(|| format!("unknown contact {contact_id}"))?;
        Payee::from(contact)
    };
    navigate_to(&app, Screen::PaymentScreen { payee }).await
}

/// Start a payment from raw QR text, e.g. a pasted or gallery-decoded code.
#[tauri::command]
pub async fn select_qr_payee(raw: String, app: AppHandle) -> Result<AppState, String> {
    let payload = qr::decode(&raw).map_err(|e| Error::from(e).to_string())?;
    let payee = Payee::from(payload);
    navigate_to(&app, Screen::PaymentScreen { payee }).await
}

// ============================================================================
// Amount entry & confirmation
// ============================================================================

#[tauri::command]
pub async fn set_amount(
    amount: String,
    app: AppHandle,
    state: State<'_, SharedState>,
) -> Result<AppState, String> {
    let snapshot = {
        let mut mgr = lock_state(&state)?;
        let Some((_, ScreenController::Payment(payment))) = mgr.current_controller_mut() else {
            return Err(NOT_ON_PAYMENT.to_string());
        };
        payment.set_amount(&amount).map_err(|e| e.to_string())?;
        mgr.bump_revision();
        mgr.snapshot()
    };
    Ok(publish(&app, None, snapshot).await)
}

/// Validate, run the biometric prompt outside the state lock, then swap the
/// amount screen for the result screen.
#[tauri::command]
pub async fn pay(app: AppHandle, state: State<'_, SharedState>) -> Result<AppState, String> {
    let (entry, pending, snapshot) = {
        let mut mgr = lock_state(&state)?;
        let Some((entry, ScreenController::Payment(payment))) = mgr.current_controller_mut()
        else {
            return Err(NOT_ON_PAYMENT.to_string());
        };
        let step = payment.prepare_pay().map_err(|e| e.to_string())?;
        mgr.bump_revision();
        let pending = match step {
            PayStep::Blocked(e) => {
                log::info!("payment blocked: {e}");
                None
            }
            PayStep::Confirm(pending) => Some(pending),
        };
        (entry, pending, mgr.snapshot())
    };
    let Some(pending) = pending else {
        return Ok(publish(&app, None, snapshot).await);
    };
    publish(&app, None, snapshot).await;

    let (ticket, result) = pending.run().await;

    let (transition, snapshot) = {
        let mut mgr = lock_state(&state)?;
        if !mgr.is_live(entry) {
            log::info!("payment screen left before attempt {} settled", ticket.attempt);
            return Ok(mgr.snapshot());
        }
        let Some(ScreenController::Payment(payment)) = mgr.controller_mut(entry) else {
            return Err(NOT_ON_PAYMENT.to_string());
        };
        let next = payment.finish(&ticket, result).map_err(|e| e.to_string())?;
        (mgr.replace(next), mgr.snapshot())
    };
    Ok(publish(&app, Some(transition), snapshot).await)
}
