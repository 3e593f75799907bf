//! Payment flow controller.
//!
//! `SelectingPayee → EnteringAmount → Confirming → Outcome`. One instance
//! covers one payment attempt; re-entering the flow means a new instance.
//!
//! Confirmation is split into [`PaymentFlow::begin_confirmation`] and
//! [`PaymentFlow::complete`] so an owner behind a lock can await the
//! biometric prompt without holding it. The ticket returned by the first
//! half is the only thing that can complete the attempt.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::amount::{Amount, AmountPolicy, is_valid_amount};
use crate::biometric::{Confirmation, ConfirmationGate, PAYMENT_PROMPT, UNSUPPORTED_MESSAGE};
use crate::contacts::Contact;
use crate::device::BiometricDevice;
use crate::error::{Error, Result, ValidationError};
use crate::navigation::Screen;
use crate::notice::{NoticeBoard, NoticeKind, NoticeTimings};
use crate::qr::QrPayload;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PayeeSource {
    Contact,
    Qr,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payee {
    pub name: String,
    pub phone: Option<String>,
    pub source: PayeeSource,
}

impl From<&Contact> for Payee {
    fn from(contact: &Contact) -> Self {
        Self {
            name: contact.name.clone(),
            phone: Some(contact.phone.clone()),
            source: PayeeSource::Contact,
        }
    }
}

impl From<QrPayload> for Payee {
    fn from(payload: QrPayload) -> Self {
        Self {
            name: payload.contact,
            phone: None,
            source: PayeeSource::Qr,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentOutcome {
    pub success: bool,
    /// No prompt was shown because the hardware is missing.
    #[serde(default)]
    pub unsupported: bool,
}

impl PaymentOutcome {
    pub fn succeeded() -> Self {
        Self {
            success: true,
            unsupported: false,
        }
    }

    pub fn failed() -> Self {
        Self {
            success: false,
            unsupported: false,
        }
    }

    pub fn headline(&self) -> &'static str {
        if self.success {
            "Payment Successful"
        } else {
            "Payment Failed"
        }
    }
}

impl From<Confirmation> for PaymentOutcome {
    fn from(confirmation: Confirmation) -> Self {
        Self {
            success: confirmation.is_success(),
            unsupported: confirmation == Confirmation::Unsupported,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "step", rename_all = "camelCase")]
pub enum FlowState {
    SelectingPayee,
    #[serde(rename_all = "camelCase")]
    EnteringAmount {
        payee: Payee,
        amount_text: String,
        amount_alert: bool,
    },
    #[serde(rename_all = "camelCase")]
    Confirming {
        payee: Payee,
        amount_text: String,
        amount: Amount,
        attempt: u64,
    },
    #[serde(rename_all = "camelCase")]
    Outcome {
        payee: Payee,
        amount: Option<Amount>,
        outcome: PaymentOutcome,
    },
}

/// Proof of an in-flight confirmation.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfirmTicket {
    pub attempt: u64,
    pub payee: Payee,
    pub amount: Amount,
}

pub struct PaymentFlow {
    state: FlowState,
    policy: AmountPolicy,
    attempts: u64,
}

impl PaymentFlow {
    pub fn new(policy: AmountPolicy) -> Self {
        Self {
            state: FlowState::SelectingPayee,
            policy,
            attempts: 0,
        }
    }

    /// A flow that starts with its payee already chosen, as the amount
    /// screen is entered.
    pub fn for_payee(payee: Payee, policy: AmountPolicy) -> Self {
        let mut flow = Self::new(policy);
        flow.state = FlowState::EnteringAmount {
            payee,
            amount_text: String::new(),
            amount_alert: false,
        };
        flow
    }

    pub fn state(&self) -> &FlowState {
        &self.state
    }

    pub fn payee(&self) -> Option<&Payee> {
        match &self.state {
            FlowState::SelectingPayee => None,
            FlowState::EnteringAmount { payee, .. }
            | FlowState::Confirming { payee, .. }
            | FlowState::Outcome { payee, .. } => Some(payee),
        }
    }

    pub fn outcome(&self) -> Option<PaymentOutcome> {
        match &self.state {
            FlowState::Outcome { outcome, .. } => Some(*outcome),
            _ => None,
        }
    }

    pub fn select_payee(&mut self, payee: Payee) -> Result<()> {
        match self.state {
            FlowState::SelectingPayee => {
                log::debug!("payment flow: payee {:?} selected", payee.name);
                self.state = FlowState::EnteringAmount {
                    payee,
                    amount_text: String::new(),
                    amount_alert: false,
                };
                Ok(())
            }
            _ => Err(Error::InvalidTransition("payee already selected")),
        }
    }

    /// Record an edit of the amount field. Returns the alert flag: set when
    /// the text is non-empty but not a number.
    pub fn set_amount(&mut self, text: &str) -> Result<bool> {
        match &mut self.state {
            FlowState::EnteringAmount {
                amount_text,
                amount_alert,
                ..
            } => {
                *amount_text = text.to_string();
                if !text.trim().is_empty() {
                    *amount_alert = !is_valid_amount(text);
                }
                Ok(*amount_alert)
            }
            FlowState::Confirming { .. } => Err(Error::Busy),
            _ => Err(Error::InvalidTransition("amount can only change while entering it")),
        }
    }

    /// Validate the amount and move to `Confirming`. On a validation error
    /// the flow stays in `EnteringAmount` with its alert raised.
    pub fn begin_confirmation(&mut self) -> Result<ConfirmTicket> {
        let (payee, amount_text, amount) = match &mut self.state {
            FlowState::EnteringAmount {
                payee,
                amount_text,
                amount_alert,
            } => match self.policy.accept(amount_text) {
                Ok(amount) => (payee.clone(), amount_text.clone(), amount),
                Err(e) => {
                    *amount_alert = true;
                    return Err(e.into());
                }
            },
            FlowState::Confirming { .. } => return Err(Error::Busy),
            FlowState::SelectingPayee => {
                return Err(Error::InvalidTransition("no payee selected"));
            }
            FlowState::Outcome { .. } => {
                return Err(Error::InvalidTransition("payment attempt already finished"));
            }
        };

        self.attempts += 1;
        let ticket = ConfirmTicket {
            attempt: self.attempts,
            payee: payee.clone(),
            amount,
        };
        self.state = FlowState::Confirming {
            payee,
            amount_text,
            amount,
            attempt: ticket.attempt,
        };
        log::info!(
            "payment flow: confirming attempt {} ({} to {})",
            ticket.attempt,
            ticket.amount,
            ticket.payee.name
        );
        Ok(ticket)
    }

    /// Settle the attempt named by `ticket` with the gate's answer.
    pub fn complete(
        &mut self,
        ticket: &ConfirmTicket,
        confirmation: Confirmation,
    ) -> Result<PaymentOutcome> {
        self.check_ticket(ticket)?;
        let outcome = PaymentOutcome::from(confirmation);
        self.state = FlowState::Outcome {
            payee: ticket.payee.clone(),
            amount: Some(ticket.amount),
            outcome,
        };
        log::info!(
            "payment flow: attempt {} finished, success={}",
            ticket.attempt,
            outcome.success
        );
        Ok(outcome)
    }

    /// Return to `EnteringAmount` without an outcome, keeping the typed text.
    pub fn abort(&mut self, ticket: &ConfirmTicket) -> Result<()> {
        self.check_ticket(ticket)?;
        if let FlowState::Confirming {
            payee, amount_text, ..
        } = &self.state
        {
            self.state = FlowState::EnteringAmount {
                payee: payee.clone(),
                amount_text: amount_text.clone(),
                amount_alert: false,
            };
        }
        Ok(())
    }

    fn check_ticket(&self, ticket: &ConfirmTicket) -> Result<()> {
        match &self.state {
            FlowState::Confirming { attempt, .. } if *attempt == ticket.attempt => Ok(()),
            _ => Err(Error::StaleAttempt(ticket.attempt)),
        }
    }

    /// Convenience for single-owner callers: validate, prompt once, settle.
    pub async fn submit<D: BiometricDevice>(
        &mut self,
        gate: &ConfirmationGate<D>,
    ) -> Result<PaymentOutcome> {
        let ticket = self.begin_confirmation()?;
        gate.ensure_probed().await;
        match gate.confirm(PAYMENT_PROMPT).await {
            Ok(confirmation) => self.complete(&ticket, confirmation),
            Err(e) => {
                self.abort(&ticket)?;
                Err(e)
            }
        }
    }
}

/// Result of pressing Pay on the amount screen.
pub enum PayStep<D> {
    /// Validation failed; a notice is up and nothing was sent to the device.
    Blocked(ValidationError),
    /// The prompt must run; await it with [`PendingConfirmation::run`].
    Confirm(PendingConfirmation<D>),
}

pub struct PendingConfirmation<D> {
    ticket: ConfirmTicket,
    gate: Arc<ConfirmationGate<D>>,
}

impl<D: BiometricDevice> PendingConfirmation<D> {
    pub fn ticket(&self) -> &ConfirmTicket {
        &self.ticket
    }

    pub async fn run(self) -> (ConfirmTicket, Result<Confirmation>) {
        self.gate.ensure_probed().await;
        let result = self.gate.confirm(PAYMENT_PROMPT).await;
        (self.ticket, result)
    }
}

/// The amount-entry screen: a flow, its gate, and its notices.
pub struct PaymentScreen<D> {
    flow: PaymentFlow,
    gate: Arc<ConfirmationGate<D>>,
    notices: NoticeBoard,
}

impl<D: BiometricDevice> PaymentScreen<D> {
    pub fn new(payee: Payee, device: Arc<D>, policy: AmountPolicy, timings: NoticeTimings) -> Self {
        Self {
            flow: PaymentFlow::for_payee(payee, policy),
            gate: Arc::new(ConfirmationGate::new(device)),
            notices: NoticeBoard::new(timings),
        }
    }

    pub fn flow(&self) -> &PaymentFlow {
        &self.flow
    }

    pub fn gate(&self) -> Arc<ConfirmationGate<D>> {
        Arc::clone(&self.gate)
    }

    pub fn notices(&self) -> &NoticeBoard {
        &self.notices
    }

    pub fn set_amount(&mut self, text: &str) -> Result<bool> {
        self.flow.set_amount(text)
    }

    pub fn prepare_pay(&mut self) -> Result<PayStep<D>> {
        match self.flow.begin_confirmation() {
            Ok(ticket) => Ok(PayStep::Confirm(PendingConfirmation {
                ticket,
                gate: Arc::clone(&self.gate),
            })),
            Err(Error::Validation(e)) => {
                self.notices.show(e.to_string(), NoticeKind::Error);
                Ok(PayStep::Blocked(e))
            }
            Err(e) => Err(e),
        }
    }

    /// Fold the prompt's answer into the flow and name the next screen.
    pub fn finish(
        &mut self,
        ticket: &ConfirmTicket,
        result: Result<Confirmation>,
    ) -> Result<Screen> {
        let confirmation = match result {
            Ok(confirmation) => confirmation,
            Err(e) => {
                self.flow.abort(ticket)?;
                return Err(e);
            }
        };
        if let Some(e) = confirmation.error() {
            log::info!("payment attempt {} declined: {e}", ticket.attempt);
        }
        let outcome = self.flow.complete(ticket, confirmation)?;
        Ok(Screen::PayResult { outcome })
    }

    /// Single-owner variant of [`Self::prepare_pay`] + [`Self::finish`].
    /// Returns `None` when validation blocked the payment.
    pub async fn pay(&mut self) -> Result<Option<Screen>> {
        match self.prepare_pay()? {
            PayStep::Blocked(_) => Ok(None),
            PayStep::Confirm(pending) => {
                let (ticket, result) = pending.run().await;
                self.finish(&ticket, result).map(Some)
            }
        }
    }
}

/// The result screen. Carries the unsupported-hardware advisory, since the
/// amount screen is gone by the time the outcome is known.
pub struct ResultScreen {
    notices: NoticeBoard,
}

impl ResultScreen {
    pub fn new(outcome: PaymentOutcome, timings: NoticeTimings) -> Self {
        let mut notices = NoticeBoard::new(timings);
        if outcome.unsupported {
            notices.show(UNSUPPORTED_MESSAGE, NoticeKind::Error);
        }
        Self { notices }
    }

    pub fn notices(&self) -> &NoticeBoard {
        &self.notices
    }
}
