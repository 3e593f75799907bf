use std::sync::Arc;
use std::time::Duration;

use swiftpay_core::biometric::{PAYMENT_PROMPT, UNSUPPORTED_MESSAGE};
use swiftpay_core::testing::{DeviceCall, FakeDevice};
use swiftpay_core::{
    AmountPolicy, AuthResult, Confirmation, ConfirmationGate, DeviceError, Error, FlowState,
    GateSupport, NoticeTimings, PayStep, Payee, PayeeSource, PaymentFlow, PaymentScreen,
    ResultScreen, Screen,
};

fn alex() -> Payee {
    Payee {
        name: "Alex".into(),
        phone: Some("555-0100".into()),
        source: PayeeSource::Contact,
    }
}

fn screen(device: FakeDevice) -> (Arc<FakeDevice>, PaymentScreen<FakeDevice>) {
    let device = Arc::new(device);
    let screen = PaymentScreen::new(
        alex(),
        Arc::clone(&device),
        AmountPolicy::default(),
        NoticeTimings::default(),
    );
    (device, screen)
}

#[tokio::test]
async fn successful_payment_reaches_success_result() {
    let (device, mut screen) = screen(FakeDevice::new().with_auth(Ok(AuthResult::Success)));
    screen.set_amount("9000").unwrap();

    let next = screen.pay().await.unwrap().expect("payment should not be blocked");
    match next {
        Screen::PayResult { outcome } => {
            assert!(outcome.success);
            assert_eq!(outcome.headline(), "Payment Successful");
        }
        other => panic!("unexpected screen {other:?}"),
    }
    assert_eq!(device.auth_calls(), 1);
    assert!(
        device
            .calls()
            .contains(&DeviceCall::Authenticate(PAYMENT_PROMPT.to_string()))
    );
    match screen.flow().state() {
        FlowState::Outcome { payee, amount, .. } => {
            assert_eq!(payee.name, "Alex");
            assert_eq!(amount.unwrap().to_string(), "9000.00");
        }
        other => panic!("unexpected state {other:?}"),
    }
}

#[tokio::test]
async fn empty_amount_blocks_without_prompt() {
    let (device, mut screen) = screen(FakeDevice::new());

    assert!(screen.pay().await.unwrap().is_none());
    assert!(matches!(
        screen.flow().state(),
        FlowState::EnteringAmount { .. }
    ));
    assert_eq!(
        screen.notices().current().unwrap().text,
        "Please enter a valid amount"
    );
    assert!(device.calls().is_empty());
}

#[tokio::test]
async fn over_limit_amount_is_blocked() {
    let (device, mut screen) = screen(FakeDevice::new());
    screen.set_amount("250000").unwrap();

    assert!(screen.pay().await.unwrap().is_none());
    assert_eq!(
        screen.notices().current().unwrap().text,
        "Amount exceeds the maximum of 100000"
    );
    assert_eq!(device.auth_calls(), 0);
}

#[tokio::test]
async fn unsupported_hardware_fails_without_prompt() {
    let (device, mut screen) = screen(FakeDevice::new().with_hardware(false));
    screen.set_amount("12.50").unwrap();

    let next = screen.pay().await.unwrap().unwrap();
    let Screen::PayResult { outcome } = next else {
        panic!("unexpected screen {next:?}");
    };
    assert!(!outcome.success);
    assert!(outcome.unsupported);
    assert_eq!(device.auth_calls(), 0);

    // The advisory belongs to the result screen the user lands on.
    assert!(screen.notices().current().is_none());
    let result = ResultScreen::new(outcome, NoticeTimings::default());
    assert_eq!(
        result.notices().current().unwrap().text,
        UNSUPPORTED_MESSAGE
    );
}

#[tokio::test]
async fn declined_and_faulted_prompts_fail_payment() {
    for answer in [
        Ok(AuthResult::Failed),
        Ok(AuthResult::Cancelled),
        Err(DeviceError::Timeout),
    ] {
        let (_, mut screen) = screen(FakeDevice::new().with_auth(answer));
        screen.set_amount("10").unwrap();
        let next = screen.pay().await.unwrap().unwrap();
        match next {
            Screen::PayResult { outcome } => {
                assert!(!outcome.success);
                assert_eq!(outcome.headline(), "Payment Failed");
            }
            other => panic!("unexpected screen {other:?}"),
        }
    }
}

#[tokio::test]
async fn probe_runs_once_per_screen() {
    let device = Arc::new(FakeDevice::new());
    let gate = ConfirmationGate::new(Arc::clone(&device));
    assert_eq!(gate.support(), GateSupport::Unchecked);
    assert_eq!(gate.ensure_probed().await, GateSupport::Supported);
    assert_eq!(gate.ensure_probed().await, GateSupport::Supported);
    assert_eq!(device.count(|c| *c == DeviceCall::HasHardware), 1);
}

#[tokio::test]
async fn probe_fault_counts_as_unsupported() {
    let device = Arc::new(FakeDevice::new().with_hardware_fault());
    let gate = ConfirmationGate::new(Arc::clone(&device));
    assert_eq!(gate.ensure_probed().await, GateSupport::Unsupported);
    assert_eq!(
        gate.confirm(PAYMENT_PROMPT).await.unwrap(),
        Confirmation::Unsupported
    );
    assert_eq!(device.auth_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn second_prompt_while_pending_is_busy() {
    let device = Arc::new(FakeDevice::new().with_auth_delay(Duration::from_secs(5)));
    let gate = Arc::new(ConfirmationGate::new(Arc::clone(&device)));
    gate.ensure_probed().await;

    let first = tokio::spawn({
        let gate = Arc::clone(&gate);
        async move { gate.confirm(PAYMENT_PROMPT).await }
    });
    tokio::task::yield_now().await;
    assert!(gate.is_pending());
    assert!(matches!(gate.confirm(PAYMENT_PROMPT).await, Err(Error::Busy)));

    assert_eq!(first.await.unwrap().unwrap(), Confirmation::Success);
    assert!(!gate.is_pending());
    assert_eq!(device.auth_calls(), 1);
}

#[tokio::test]
async fn split_confirmation_rejects_stale_ticket() {
    let (device, mut screen) = screen(FakeDevice::new());
    screen.set_amount("40").unwrap();

    let PayStep::Confirm(pending) = screen.prepare_pay().unwrap() else {
        panic!("payment blocked");
    };
    // A second press while the prompt is up is refused by the flow.
    assert!(matches!(screen.prepare_pay(), Err(Error::Busy)));

    let (ticket, result) = pending.run().await;
    let next = screen.finish(&ticket, result).unwrap();
    assert!(matches!(next, Screen::PayResult { outcome } if outcome.success));
    assert!(matches!(
        screen.finish(&ticket, Ok(Confirmation::Success)),
        Err(Error::StaleAttempt(_))
    ));
    assert_eq!(device.auth_calls(), 1);
}

#[tokio::test]
async fn flow_submit_from_qr_payee() {
    let device = Arc::new(FakeDevice::new());
    let gate = ConfirmationGate::new(Arc::clone(&device));
    let mut flow = PaymentFlow::new(AmountPolicy::default());

    let payload = swiftpay_core::qr::decode(r#"{"contact":"Elly"}"#).unwrap();
    flow.select_payee(Payee::from(payload)).unwrap();
    flow.set_amount("2250").unwrap();

    let outcome = flow.submit(&gate).await.unwrap();
    assert!(outcome.success);
    assert_eq!(flow.payee().unwrap().source, PayeeSource::Qr);
}
