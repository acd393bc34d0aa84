//! crates/gougestop_core/src/progress.rs
//!
//! The cosmetic step indicator shown while an analysis is in flight. Steps
//! advance on a fixed timer and have no relation to the request's real progress.

use std::time::Duration;

use tokio::{sync::watch, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub const LOADING_STEPS: [&str; 4] = [
    "Reading your document...",
    "Identifying test codes...",
    "Looking up Medicare rates...",
    "Finding nearby lab prices...",
];

pub const DEFAULT_STEP_INTERVAL: Duration = Duration::from_millis(2500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepState {
    Done,
    Active,
    Pending,
}

impl StepState {
    pub fn marker(&self) -> &'static str {
        match self {
            StepState::Done => "\u{2713}",
            StepState::Active => "\u{25CB}",
            StepState::Pending => "\u{00B7}",
        }
    }
}

/// Which step is active. Freezes on the last one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoadingProgress {
    active: usize,
}

impl LoadingProgress {
    pub fn at(step: usize) -> Self {
        Self {
            active: step.min(LOADING_STEPS.len() - 1),
        }
    }

    pub fn active_step(&self) -> usize {
        self.active
    }

    /// Moves to the next step. Returns `false` once the last step is reached.
    pub fn advance(&mut self) -> bool {
        if self.active + 1 < LOADING_STEPS.len() {
            self.active += 1;
            true
        } else {
            false
        }
    }

    pub fn state_of(&self, step: usize) -> StepState {
        if step < self.active {
            StepState::Done
        } else if step == self.active {
            StepState::Active
        } else {
            StepState::Pending
        }
    }

    pub fn steps(&self) -> impl Iterator<Item = (StepState, &'static str)> + '_ {
        LOADING_STEPS
            .iter()
            .enumerate()
            .map(move |(i, label)| (self.state_of(i), *label))
    }
}

/// Background task that advances a `LoadingProgress` on a fixed interval and
/// publishes each change through a watch channel.
pub struct ProgressTicker {
    progress: watch::Receiver<LoadingProgress>,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl ProgressTicker {
    pub fn start(step_interval: Duration) -> Self {
        let (tx, rx) = watch::channel(LoadingProgress::default());
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let handle = tokio::spawn(async move {
            let mut progress = LoadingProgress::default();
            let mut ticks = tokio::time::interval(step_interval);
            // The first tick completes immediately; step 0 is already active.
            ticks.tick().await;
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticks.tick() => {
                        if !progress.advance() {
                            debug!("Loading progress frozen on the last step.");
                            break;
                        }
                        if tx.send(progress).is_err() {
                            break;
                        }
                    }
                }
            }
        });

        Self {
            progress: rx,
            cancel,
            handle,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<LoadingProgress> {
        self.progress.clone()
    }

    pub fn current(&self) -> LoadingProgress {
        *self.progress.borrow()
    }

    /// Stops the ticker and returns the last published progress.
    pub async fn stop(self) -> LoadingProgress {
        self.cancel.cancel();
        let _ = self.handle.await;
        *self.progress.borrow()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_saturates_on_last_step() {
        let mut progress = LoadingProgress::default();
        assert!(progress.advance());
        assert!(progress.advance());
        assert!(progress.advance());
        assert!(!progress.advance());
        assert_eq!(progress.active_step(), LOADING_STEPS.len() - 1);
    }

    #[test]
    fn step_states_split_around_the_active_step() {
        let progress = LoadingProgress::at(1);
        let states: Vec<StepState> = progress.steps().map(|(state, _)| state).collect();
        assert_eq!(
            states,
            vec![StepState::Done, StepState::Active, StepState::Pending, StepState::Pending]
        );
        assert_eq!(LoadingProgress::at(99).active_step(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn ticker_advances_on_interval_and_freezes() {
        let ticker = ProgressTicker::start(Duration::from_millis(100));
        let mut rx = ticker.subscribe();
        assert_eq!(ticker.current().active_step(), 0);

        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().active_step(), 1);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(ticker.stop().await.active_step(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn stopping_early_keeps_the_current_step() {
        let ticker = ProgressTicker::start(Duration::from_secs(60));
        assert_eq!(ticker.stop().await.active_step(), 0);
    }
}
