use serde::{Deserialize, Serialize};

use crate::navigation::Screen;

const MOCK_DATE: &str = "January 09, 2023 at 03:22 PM";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentTransaction {
    pub name: &'static str,
    pub date: &'static str,
    /// Pre-formatted with thousands separators; rendered after a rupee sign.
    pub amount: &'static str,
}

/// Demo data for the home screen's transaction list.
pub fn recent_transactions() -> Vec<RecentTransaction> {
    [
        ("Kaira", "1,200"),
        ("Elly", "2,250"),
        ("Alex", "9,000"),
        ("Revan", "5,100"),
        ("Scott", "6,000"),
    ]
    .into_iter()
    .map(|(name, amount)| RecentTransaction {
        name,
        date: MOCK_DATE,
        amount,
    })
    .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HomeAction {
    Pay,
    Receive,
    Scanner,
    VoiceAssistant,
}

impl HomeAction {
    pub fn target(self) -> Screen {
        match self {
            HomeAction::Pay => Screen::Pay,
            HomeAction::Receive => Screen::Receive { contact: None },
            HomeAction::Scanner => Screen::Scanner,
            HomeAction::VoiceAssistant => Screen::VoiceAssistant,
        }
    }
}
