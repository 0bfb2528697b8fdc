//! Observable deployment state cell.

use svcwarden_core::{DeploymentState, TransitionError};
use tokio::sync::watch;
use tracing::debug;

/// Holds the current [`DeploymentState`] and broadcasts every change.
///
/// All transitions go through [`StateCell::transition`], which checks and
/// applies them atomically so two racing callers can never both leave the
/// same state.
#[derive(Debug)]
pub(crate) struct StateCell {
    tx: watch::Sender<DeploymentState>,
}

impl StateCell {
    pub(crate) fn new() -> Self {
        let (tx, _rx) = watch::channel(DeploymentState::NotStarted);
        Self { tx }
    }

    pub(crate) fn get(&self) -> DeploymentState {
        *self.tx.borrow()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<DeploymentState> {
        self.tx.subscribe()
    }

    /// Move to `to` if the state machine allows it from the current state.
    ///
    /// On success returns the state that was left.
    pub(crate) fn transition(&self, to: DeploymentState) -> Result<DeploymentState, TransitionError> {
        let mut outcome = Err(TransitionError {
            from: DeploymentState::NotStarted,
            to,
        });
        self.tx.send_if_modified(|current| {
            let from = *current;
            match from.transition(to) {
                Ok(next) => {
                    *current = next;
                    outcome = Ok(from);
                    true
                }
                Err(e) => {
                    outcome = Err(e);
                    false
                }
            }
        });
        if let Ok(from) = outcome {
            debug!(%from, %to, "Deployment state changed");
        }
        outcome
    }

    /// Wait until the state satisfies `predicate` and return it.
    pub(crate) async fn wait_for(
        &self,
        mut predicate: impl FnMut(&DeploymentState) -> bool,
    ) -> DeploymentState {
        let mut rx = self.subscribe();
        match rx.wait_for(|state| predicate(state)).await {
            Ok(state) => *state,
            // The sender lives in `self`, so it cannot be gone while borrowed.
            Err(_) => self.get(),
        }
    }
}
