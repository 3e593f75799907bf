use std::time::Duration;

use serde::Deserialize;

use crate::error::ValidationError;
use crate::navigation::{Screen, ScreenScope};
use crate::notice::{NoticeBoard, NoticeKind, NoticeTimings};

pub const SIGNUP_SUCCESS_MESSAGE: &str = "Account created successfully!";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SignUpForm {
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

/// Checks run in order; the first failure wins.
pub fn validate(form: &SignUpForm) -> Result<(), ValidationError> {
    if form.email.is_empty() || form.password.is_empty() || form.confirm_password.is_empty() {
        return Err(ValidationError::MissingFields);
    }
    if form.password != form.confirm_password {
        return Err(ValidationError::PasswordMismatch);
    }
    if !is_valid_email(&form.email) {
        return Err(ValidationError::InvalidEmail);
    }
    Ok(())
}

/// `local@domain.tld`: no whitespace, exactly one `@`, and a `.` in the
/// domain with at least one character on each side.
pub fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    let clean = |s: &str| !s.is_empty() && !s.contains('@') && !s.chars().any(char::is_whitespace);
    if !clean(local) || !clean(domain) {
        return false;
    }
    domain
        .char_indices()
        .any(|(i, c)| c == '.' && i > 0 && i + 1 < domain.len())
}

pub struct SignUpScreen {
    notices: NoticeBoard,
    redirect_delay: Duration,
}

impl SignUpScreen {
    pub fn new(redirect_delay: Duration, timings: NoticeTimings) -> Self {
        Self {
            notices: NoticeBoard::new(timings),
            redirect_delay,
        }
    }

    /// Validate the form and raise the matching notice. On success the
    /// caller schedules [`redirect_after`] with [`Self::redirect_delay`].
    pub fn submit(&mut self, form: &SignUpForm) -> Result<(), ValidationError> {
        match validate(form) {
            Ok(()) => {
                log::info!("sign-up accepted");
                self.notices.show(SIGNUP_SUCCESS_MESSAGE, NoticeKind::Success);
                Ok(())
            }
            Err(e) => {
                self.notices.show(e.to_string(), NoticeKind::Error);
                Err(e)
            }
        }
    }

    pub fn redirect_delay(&self) -> Duration {
        self.redirect_delay
    }

    pub fn notices(&self) -> &NoticeBoard {
        &self.notices
    }
}

/// Wait out the delay, then name Home if the sign-up screen is still showing.
pub async fn redirect_after(scope: ScreenScope, delay: Duration) -> Option<Screen> {
    tokio::time::sleep(delay).await;
    if scope.is_active() {
        Some(Screen::Home)
    } else {
        log::debug!("sign-up redirect dropped: screen left");
        None
    }
}
