//! Stage controller for the workflow walkthrough.
//!
//! Holds the active stage index over a fixed [`StageDeck`]. Every transition is a
//! total, synchronous function of (current index, operation); the index is clamped
//! to `[0, N-1]` and never wraps. The last stage is not terminal: `prev` stays valid.

use thoughtcomm_types::{StageDeck, StageDescriptor};
use tokio::sync::watch;

#[derive(Debug)]
pub struct StageController {
    deck: StageDeck,
    current: usize,
    tx: watch::Sender<usize>,
}

impl StageController {
    #[must_use]
    pub fn new(deck: StageDeck) -> Self {
        let (tx, _) = watch::channel(0);
        Self {
            deck,
            current: 0,
            tx,
        }
    }

    #[must_use]
    pub fn current(&self) -> usize {
        self.current
    }

    #[must_use]
    pub fn current_descriptor(&self) -> &StageDescriptor {
        self.deck.descriptor(self.current)
    }

    #[must_use]
    pub fn deck(&self) -> &StageDeck {
        &self.deck
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.deck.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.deck.is_empty()
    }

    #[must_use]
    pub fn is_first(&self) -> bool {
        self.current == 0
    }

    #[must_use]
    pub fn is_last(&self) -> bool {
        self.current == self.deck.last_index()
    }

    /// Jump to `index`, clamped to the last stage. Returns the new index.
    pub fn go_to(&mut self, index: usize) -> usize {
        let target = index.min(self.deck.last_index());
        if target != self.current {
            tracing::debug!(from = self.current, to = target, "Stage changed");
            self.current = target;
            self.tx.send_replace(target);
        }
        self.current
    }

    /// Advance one stage; no-op on the last stage.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> usize {
        self.go_to(self.current.saturating_add(1))
    }

    /// Step back one stage; no-op on the first stage.
    pub fn prev(&mut self) -> usize {
        self.go_to(self.current.saturating_sub(1))
    }

    /// Receiver that observes every index change. Unchanged targets do not notify.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<usize> {
        self.tx.subscribe()
    }
}

impl Default for StageController {
    fn default() -> Self {
        Self::new(StageDeck::reference())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use thoughtcomm_types::{Accent, StageDescriptor};

    fn deck_of(n: usize) -> StageDeck {
        let stages = (0..n)
            .map(|i| StageDescriptor::new(format!("stage {i}"), "", Accent::Indigo))
            .collect();
        StageDeck::new(stages).unwrap()
    }

    #[test]
    fn starts_at_first_stage() {
        let controller = StageController::default();
        assert_eq!(controller.current(), 0);
        assert!(controller.is_first());
        assert!(!controller.is_last());
        assert_eq!(controller.len(), 6);
    }

    #[test]
    fn go_to_clamps_into_range() {
        for n in [1, 2, 6, 9] {
            let mut controller = StageController::new(deck_of(n));
            for index in [0, 1, n / 2, n - 1, n, n + 1, 1000, usize::MAX] {
                controller.go_to(index);
                assert_eq!(controller.current(), index.min(n - 1), "n={n} index={index}");
            }
        }
    }

    #[test]
    fn next_saturates_at_last_stage() {
        let mut controller = StageController::default();
        let n = controller.len();
        for _ in 0..n + 5 {
            controller.next();
            assert!(controller.current() <= n - 1);
        }
        assert_eq!(controller.current(), n - 1);
        assert!(controller.is_last());
    }

    #[test]
    fn prev_saturates_at_first_stage() {
        let mut controller = StageController::default();
        let n = controller.len();
        controller.go_to(n - 1);
        for _ in 0..n + 5 {
            controller.prev();
        }
        assert_eq!(controller.current(), 0);
    }

    #[test]
    fn last_stage_is_not_terminal() {
        let mut controller = StageController::default();
        controller.go_to(5);
        assert_eq!(controller.prev(), 4);
        assert_eq!(controller.next(), 5);
    }

    #[test]
    fn single_stage_deck_never_moves() {
        let mut controller = StageController::new(deck_of(1));
        assert!(controller.is_first() && controller.is_last());
        assert_eq!(controller.next(), 0);
        assert_eq!(controller.prev(), 0);
    }

    #[test]
    fn descriptor_follows_index() {
        let mut controller = StageController::default();
        controller.go_to(3);
        assert_eq!(controller.current_descriptor().accent, Accent::Rose);
        assert_eq!(controller.current_descriptor().title, "4. Routing");
    }

    #[test]
    fn subscribers_see_changes_only() {
        let mut controller = StageController::default();
        let mut rx = controller.subscribe();
        assert!(!rx.has_changed().unwrap());

        controller.prev();
        assert!(!rx.has_changed().unwrap());

        controller.go_to(2);
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), 2);

        controller.go_to(2);
        assert!(!rx.has_changed().unwrap());
    }
}
