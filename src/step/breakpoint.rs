//! Breakpoint controller: pause only at an explicit `(node, point)` set.

use async_trait::async_trait;
use rustc_hash::FxHashSet;

use super::{StepController, StepError, StepPoint, StepRequest, StepResponse};

type BreakpointHandler = Box<dyn Fn(&StepRequest) -> Result<StepResponse, StepError> + Send + Sync>;

/// Pauses only at an explicit set of `(node id, point)` pairs; all other
/// nodes execute without interception.
///
/// The handler closure decides what happens at each hit, exactly like the
/// callback controller does.
///
/// # Examples
///
/// ```
/// use warpline::step::{BreakpointStepController, StepPoint, StepResponse};
///
/// let controller = BreakpointStepController::new(
///     [("risky_tool", StepPoint::BeforeNode)],
///     |request| Ok(StepResponse::proceed(&request.id)),
/// );
///
/// assert!(controller.should_pause("risky_tool", StepPoint::BeforeNode));
/// assert!(!controller.should_pause("risky_tool", StepPoint::AfterNode));
/// assert!(!controller.should_pause("other", StepPoint::BeforeNode));
/// # use warpline::step::StepController;
/// ```
pub struct BreakpointStepController {
    points: FxHashSet<(String, StepPoint)>,
    handler: BreakpointHandler,
}

impl BreakpointStepController {
    pub fn new<I, S, F>(points: I, handler: F) -> Self
    where
        I: IntoIterator<Item = (S, StepPoint)>,
        S: Into<String>,
        F: Fn(&StepRequest) -> Result<StepResponse, StepError> + Send + Sync + 'static,
    {
        Self {
            points: points
                .into_iter()
                .map(|(id, point)| (id.into(), point))
                .collect(),
            handler: Box::new(handler),
        }
    }

    /// Add one more breakpoint.
    #[must_use]
    pub fn with_breakpoint(mut self, node_id: impl Into<String>, point: StepPoint) -> Self {
        self.points.insert((node_id.into(), point));
        self
    }
}

#[async_trait]
impl StepController for BreakpointStepController {
    async fn step(&self, request: StepRequest) -> Result<StepResponse, StepError> {
        (self.handler)(&request)
    }

    fn should_pause(&self, node_id: &str, point: StepPoint) -> bool {
        self.points.contains(&(node_id.to_string(), point))
    }
}
