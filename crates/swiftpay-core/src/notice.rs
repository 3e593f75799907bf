//! Ephemeral notices: appear, hold, disappear, cleared.
//!
//! A [`NoticeBoard`] belongs to exactly one screen. It holds at most one
//! notice; `show` replaces whatever is displayed and restarts the timeline.
//! The timeline is a single tokio task, aborted on replace, on `clear` and
//! when the board is dropped with its screen.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum NoticeKind {
    Success,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum NoticePhase {
    Appearing,
    Holding,
    Disappearing,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notice {
    pub text: String,
    pub kind: NoticeKind,
    pub phase: NoticePhase,
    /// Bumped on every `show`; stale timeline updates are discarded by it.
    pub generation: u64,
    #[serde(skip)]
    pub deadline: Instant,
}

#[derive(Debug, Clone)]
pub struct NoticeTimings {
    pub appear: Duration,
    pub hold: Duration,
    pub fade: Duration,
}

impl Default for NoticeTimings {
    fn default() -> Self {
        Self {
            appear: Duration::from_millis(350),
            hold: Duration::from_millis(3000),
            fade: Duration::from_millis(300),
        }
    }
}

impl NoticeTimings {
    pub fn total(&self) -> Duration {
        self.appear + self.hold + self.fade
    }
}

pub struct NoticeBoard {
    tx: Arc<watch::Sender<Option<Notice>>>,
    timings: NoticeTimings,
    timeline: Option<JoinHandle<()>>,
    generation: u64,
}

impl NoticeBoard {
    pub fn new(timings: NoticeTimings) -> Self {
        let (tx, _rx) = watch::channel(None);
        Self {
            tx: Arc::new(tx),
            timings,
            timeline: None,
            generation: 0,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Notice>> {
        self.tx.subscribe()
    }

    pub fn current(&self) -> Option<Notice> {
        self.tx.borrow().clone()
    }

    /// Display `text`, superseding any notice still on screen.
    ///
    /// Must be called from within a tokio runtime.
    pub fn show(&mut self, text: impl Into<String>, kind: NoticeKind) {
        self.cancel_timeline();
        self.generation += 1;

        let notice = Notice {
            text: text.into(),
            kind,
            phase: NoticePhase::Appearing,
            generation: self.generation,
            deadline: Instant::now() + self.timings.appear,
        };
        log::debug!("notice #{}: {:?} {:?}", notice.generation, notice.kind, notice.text);
        self.tx.send_replace(Some(notice.clone()));

        let tx = Arc::clone(&self.tx);
        let timings = self.timings.clone();
        self.timeline = Some(tokio::spawn(run_timeline(tx, notice, timings)));
    }

    pub fn clear(&mut self) {
        self.cancel_timeline();
        self.tx.send_replace(None);
    }

    fn cancel_timeline(&mut self) {
        if let Some(handle) = self.timeline.take() {
            handle.abort();
        }
    }
}

impl Drop for NoticeBoard {
    fn drop(&mut self) {
        self.cancel_timeline();
    }
}

async fn run_timeline(
    tx: Arc<watch::Sender<Option<Notice>>>,
    mut notice: Notice,
    timings: NoticeTimings,
) {
    let generation = notice.generation;

    tokio::time::sleep_until(notice.deadline).await;
    notice.phase = NoticePhase::Holding;
    notice.deadline += timings.hold;
    publish(&tx, generation, Some(notice.clone()));

    tokio::time::sleep_until(notice.deadline).await;
    notice.phase = NoticePhase::Disappearing;
    notice.deadline += timings.fade;
    publish(&tx, generation, Some(notice.clone()));

    tokio::time::sleep_until(notice.deadline).await;
    publish(&tx, generation, None);
}

/// Apply a timeline step only while `generation` is still the notice on
/// display.
fn publish(tx: &watch::Sender<Option<Notice>>, generation: u64, next: Option<Notice>) {
    tx.send_if_modified(|current| match current {
        Some(shown) if shown.generation == generation => {
            *current = next;
            true
        }
        _ => false,
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    const STEP: Duration = Duration::from_millis(10);

    #[tokio::test(start_paused = true)]
    async fn runs_full_timeline() {
        let timings = NoticeTimings::default();
        let mut board = NoticeBoard::new(timings.clone());

        board.show("saved", NoticeKind::Success);
        assert_eq!(board.current().unwrap().phase, NoticePhase::Appearing);

        tokio::time::sleep(timings.appear + STEP).await;
        assert_eq!(board.current().unwrap().phase, NoticePhase::Holding);

        tokio::time::sleep(timings.hold).await;
        assert_eq!(board.current().unwrap().phase, NoticePhase::Disappearing);

        tokio::time::sleep(timings.fade).await;
        assert!(board.current().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn latest_show_wins() {
        let timings = NoticeTimings::default();
        let mut board = NoticeBoard::new(timings.clone());

        board.show("x", NoticeKind::Success);
        board.show("y", NoticeKind::Error);

        tokio::time::sleep(timings.appear + STEP).await;
        let shown = board.current().unwrap();
        assert_eq!(shown.text, "y");
        assert_eq!(shown.kind, NoticeKind::Error);
        assert_eq!(shown.phase, NoticePhase::Holding);
    }

    #[tokio::test(start_paused = true)]
    async fn replacement_restarts_the_clock() {
        let timings = NoticeTimings::default();
        let mut board = NoticeBoard::new(timings.clone());

        board.show("x", NoticeKind::Success);
        tokio::time::sleep(timings.appear + timings.hold).await;
        board.show("y", NoticeKind::Success);

        // x would have cleared by now; y is still holding.
        tokio::time::sleep(timings.fade + timings.appear + STEP).await;
        let shown = board.current().unwrap();
        assert_eq!(shown.text, "y");
        assert_eq!(shown.phase, NoticePhase::Holding);
    }

    #[tokio::test(start_paused = true)]
    async fn clear_stops_timeline() {
        let timings = NoticeTimings::default();
        let mut board = NoticeBoard::new(timings.clone());
        let rx = board.subscribe();

        board.show("x", NoticeKind::Error);
        board.clear();
        tokio::time::sleep(timings.total() + STEP).await;
        assert!(board.current().is_none());
        assert!(rx.borrow().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn subscribers_see_each_phase() {
        let timings = NoticeTimings::default();
        let mut board = NoticeBoard::new(timings);
        let mut rx = board.subscribe();

        board.show("hello", NoticeKind::Success);
        let mut phases = Vec::new();
        while rx.changed().await.is_ok() {
            match rx.borrow_and_update().as_ref() {
                Some(n) => phases.push(Some(n.phase)),
                None => {
                    phases.push(None);
                    break;
                }
            }
        }
        assert_eq!(
            phases,
            vec![
                Some(NoticePhase::Appearing),
                Some(NoticePhase::Holding),
                Some(NoticePhase::Disappearing),
                None,
            ]
        );
    }
}
