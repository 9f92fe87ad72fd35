//! Callback controller: hand every pause to a user closure.

use async_trait::async_trait;

use super::{StepController, StepError, StepPoint, StepRequest, StepResponse};

type CallbackFn = Box<dyn Fn(&StepRequest) -> Result<StepResponse, StepError> + Send + Sync>;
type PausePredicateFn = Box<dyn Fn(&str, StepPoint) -> bool + Send + Sync>;

/// Invokes a user function synchronously at each pause point.
///
/// By default the controller pauses everywhere; an optional predicate
/// narrows which `(node, point)` pairs actually pause.
///
/// # Examples
///
/// ```
/// use warpline::step::{CallbackStepController, StepPoint, StepResponse};
///
/// // Continue everywhere, but only pause before nodes named "review".
/// let controller = CallbackStepController::new(|request| {
///     Ok(StepResponse::proceed(&request.id))
/// })
/// .with_predicate(|node_id, point| node_id == "review" && point == StepPoint::BeforeNode);
/// ```
pub struct CallbackStepController {
    callback: CallbackFn,
    predicate: Option<PausePredicateFn>,
}

impl CallbackStepController {
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(&StepRequest) -> Result<StepResponse, StepError> + Send + Sync + 'static,
    {
        Self {
            callback: Box::new(callback),
            predicate: None,
        }
    }

    /// Narrow which pause points actually pause.
    #[must_use]
    pub fn with_predicate<P>(mut self, predicate: P) -> Self
    where
        P: Fn(&str, StepPoint) -> bool + Send + Sync + 'static,
    {
        self.predicate = Some(Box::new(predicate));
        self
    }
}

#[async_trait]
impl StepController for CallbackStepController {
    async fn step(&self, request: StepRequest) -> Result<StepResponse, StepError> {
        (self.callback)(&request)
    }

    fn should_pause(&self, node_id: &str, point: StepPoint) -> bool {
        match &self.predicate {
            Some(predicate) => predicate(node_id, point),
            None => true,
        }
    }
}
