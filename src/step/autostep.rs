//! Auto-stepping controller: slow-motion execution without external input.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;

use super::{StepController, StepError, StepPoint, StepRequest, StepResponse};

/// Never blocks on external input: applies a configurable delay per step and
/// answers `continue`.
///
/// The pause toggle suspends the whole run until [`resume`](Self::resume) is
/// called, which is useful for live demos and observation tooling.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use warpline::step::AutoStepController;
///
/// let controller = AutoStepController::new(Duration::from_millis(50));
/// controller.pause();
/// assert!(controller.is_paused());
/// controller.resume();
/// assert!(!controller.is_paused());
/// ```
pub struct AutoStepController {
    delay: Duration,
    paused_tx: watch::Sender<bool>,
    paused_rx: watch::Receiver<bool>,
}

impl AutoStepController {
    #[must_use]
    pub fn new(delay: Duration) -> Self {
        let (paused_tx, paused_rx) = watch::channel(false);
        Self {
            delay,
            paused_tx,
            paused_rx,
        }
    }

    /// Suspend the run at its next pause point until resumed.
    pub fn pause(&self) {
        let _ = self.paused_tx.send(true);
    }

    /// Resume a paused run.
    pub fn resume(&self) {
        let _ = self.paused_tx.send(false);
    }

    /// Whether the toggle is currently engaged.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        *self.paused_rx.borrow()
    }
}

#[async_trait]
impl StepController for AutoStepController {
    async fn step(&self, request: StepRequest) -> Result<StepResponse, StepError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let mut paused = self.paused_rx.clone();
        paused
            .wait_for(|p| !*p)
            .await
            .map_err(|_| StepError::Disconnected)?;
        Ok(StepResponse::proceed(&request.id))
    }

    fn should_pause(&self, _node_id: &str, _point: StepPoint) -> bool {
        true
    }
}
