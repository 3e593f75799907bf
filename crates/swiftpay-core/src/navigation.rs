//! Typed screen stack.
//!
//! Each entry carries a [`ScreenScope`]. The scope is closed when the entry
//! leaves the stack, and async work started on behalf of a screen checks it
//! before touching that screen's state again.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};

use crate::flow::{Payee, PaymentOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Route {
    Landing,
    SignUp,
    Home,
    Pay,
    PaymentScreen,
    PayResult,
    Receive,
    Scanner,
    VoiceAssistant,
    BiometricVerify,
}

/// A route together with its entry parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "route", content = "params", rename_all = "camelCase")]
pub enum Screen {
    Landing,
    SignUp,
    Home,
    Pay,
    PaymentScreen {
        payee: Payee,
    },
    PayResult {
        outcome: PaymentOutcome,
    },
    Receive {
        #[serde(default)]
        contact: Option<String>,
    },
    Scanner,
    VoiceAssistant,
    BiometricVerify,
}

impl Screen {
    pub fn route(&self) -> Route {
        match self {
            Screen::Landing => Route::Landing,
            Screen::SignUp => Route::SignUp,
            Screen::Home => Route::Home,
            Screen::Pay => Route::Pay,
            Screen::PaymentScreen { .. } => Route::PaymentScreen,
            Screen::PayResult { .. } => Route::PayResult,
            Screen::Receive { .. } => Route::Receive,
            Screen::Scanner => Route::Scanner,
            Screen::VoiceAssistant => Route::VoiceAssistant,
            Screen::BiometricVerify => Route::BiometricVerify,
        }
    }
}

/// Liveness token of one stack entry. Clones share state.
#[derive(Debug, Clone)]
pub struct ScreenScope(Arc<AtomicBool>);

impl ScreenScope {
    fn new() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    pub fn is_active(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub fn close(&self) {
        self.0.store(false, Ordering::Release);
    }
}

pub type EntryId = u64;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenEntry {
    pub id: EntryId,
    pub screen: Screen,
    #[serde(skip)]
    pub scope: ScreenScope,
}

pub struct Navigator {
    stack: Vec<ScreenEntry>,
    next_id: EntryId,
}

impl Navigator {
    pub fn new(root: Screen) -> Self {
        let mut nav = Self {
            stack: Vec::new(),
            next_id: 1,
        };
        let entry = nav.make_entry(root);
        nav.stack.push(entry);
        nav
    }

    fn make_entry(&mut self, screen: Screen) -> ScreenEntry {
        let id = self.next_id;
        self.next_id += 1;
        ScreenEntry {
            id,
            screen,
            scope: ScreenScope::new(),
        }
    }

    pub fn current(&self) -> &ScreenEntry {
        // The root entry is never popped.
        &self.stack[self.stack.len() - 1]
    }

    pub fn entries(&self) -> &[ScreenEntry] {
        &self.stack
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub fn contains(&self, id: EntryId) -> bool {
        self.stack.iter().any(|e| e.id == id)
    }

    pub fn scope(&self, id: EntryId) -> Option<ScreenScope> {
        self.stack.iter().find(|e| e.id == id).map(|e| e.scope.clone())
    }

    /// Go to `screen`. If its route is already on the stack, everything above
    /// it is popped; an entry whose parameters differ is replaced by a fresh
    /// one. Returns the ids of entries that left the stack.
    pub fn navigate(&mut self, screen: Screen) -> Vec<EntryId> {
        let route = screen.route();
        let mut closed = Vec::new();

        let Some(index) = self.stack.iter().position(|e| e.screen.route() == route) else {
            log::debug!("navigate: push {route:?}");
            let entry = self.make_entry(screen);
            self.stack.push(entry);
            return closed;
        };

        for entry in self.stack.drain(index + 1..) {
            entry.scope.close();
            closed.push(entry.id);
        }
        if self.stack[index].screen != screen {
            let entry = self.make_entry(screen);
            let old = std::mem::replace(&mut self.stack[index], entry);
            old.scope.close();
            closed.push(old.id);
        }
        log::debug!("navigate: back to {route:?}, closed {closed:?}");
        closed
    }

    /// Go to `screen` in place of the top entry, so Back skips it. Returns
    /// the ids of entries that left the stack.
    pub fn replace(&mut self, screen: Screen) -> Vec<EntryId> {
        let mut closed: Vec<EntryId> = self.back().into_iter().collect();
        closed.extend(self.navigate(screen));
        closed
    }

    /// Pop the top entry. The root stays.
    pub fn back(&mut self) -> Option<EntryId> {
        if self.stack.len() <= 1 {
            return None;
        }
        let entry = self.stack.pop()?;
        entry.scope.close();
        Some(entry.id)
    }
}

impl Default for Navigator {
    fn default() -> Self {
        Self::new(Screen::Landing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replace_takes_the_top_entry_slot() {
        let mut nav = Navigator::new(Screen::Home);
        nav.navigate(Screen::Scanner);
        let scanner = nav.current().id;
        nav.navigate(Screen::Pay);
        let pay = nav.current().id;
        let scope = nav.current().scope.clone();

        let closed = nav.replace(Screen::VoiceAssistant);
        assert_eq!(closed, vec![pay]);
        assert!(!scope.is_active());
        assert_eq!(nav.depth(), 3);
        let voice = nav.current().id;

        assert_eq!(nav.back(), Some(voice));
        assert_eq!(nav.current().id, scanner);
    }

    #[test]
    fn replace_on_root_pushes() {
        let mut nav = Navigator::default();
        assert!(nav.replace(Screen::SignUp).is_empty());
        assert_eq!(nav.depth(), 2);
        assert_eq!(nav.entries()[0].screen, Screen::Landing);
    }

    #[test]
    fn push_and_back() {
        let mut nav = Navigator::default();
        assert_eq!(nav.current().screen, Screen::Landing);
        assert!(nav.navigate(Screen::SignUp).is_empty());
        assert_eq!(nav.depth(), 2);

        let signup = nav.current().clone();
        assert_eq!(nav.back(), Some(signup.id));
        assert!(!signup.scope.is_active());
        assert_eq!(nav.back(), None);
        assert_eq!(nav.current().screen, Screen::Landing);
    }

    #[test]
    fn navigate_to_existing_route_pops_back() {
        let mut nav = Navigator::new(Screen::Home);
        let home_id = nav.current().id;
        nav.navigate(Screen::Pay);
        let pay = nav.current().clone();
        nav.navigate(Screen::Scanner);
        let scanner = nav.current().clone();

        let closed = nav.navigate(Screen::Home);
        assert_eq!(closed, vec![pay.id, scanner.id]);
        assert_eq!(nav.current().id, home_id);
        assert!(nav.current().scope.is_active());
        assert!(!pay.scope.is_active());
        assert!(!scanner.scope.is_active());
    }

    #[test]
    fn new_params_replace_entry() {
        let mut nav = Navigator::new(Screen::Home);
        nav.navigate(Screen::Receive { contact: None });
        let first = nav.current().clone();

        let closed = nav.navigate(Screen::Receive {
            contact: Some("Alex".into()),
        });
        assert_eq!(closed, vec![first.id]);
        assert!(!first.scope.is_active());
        assert_ne!(nav.current().id, first.id);
        assert_eq!(nav.depth(), 2);
    }

    #[test]
    fn same_params_keep_entry() {
        let mut nav = Navigator::new(Screen::Home);
        nav.navigate(Screen::Pay);
        let pay_id = nav.current().id;
        assert!(nav.navigate(Screen::Pay).is_empty());
        assert_eq!(nav.current().id, pay_id);
    }

    #[test]
    fn screen_wire_format() {
        let json = serde_json::to_value(Screen::Receive {
            contact: Some("Elly".into()),
        })
        .unwrap();
        assert_eq!(json["route"], "receive");
        assert_eq!(json["params"]["contact"], "Elly");

        let screen: Screen = serde_json::from_str(r#"{"route":"home"}"#).unwrap();
        assert_eq!(screen, Screen::Home);
        let screen: Screen =
            serde_json::from_str(r#"{"route":"receive","params":{}}"#).unwrap();
        assert_eq!(screen, Screen::Receive { contact: None });
    }
}
