use crate::communicator::Communicator;
use crate::config::BuildConfig;
use crate::error::{BuildError, Result};
use crate::state::BuildState;
use crate::ui::Ui;
use async_trait::async_trait;
use imageforge_cloud::CloudApi;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Outcome of a step's forward phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepAction {
    Continue,
    Halt,
}

/// Services shared by every step of one build
#[derive(Clone)]
pub struct BuildContext {
    pub config: Arc<BuildConfig>,
    pub api: Arc<dyn CloudApi>,
    pub communicator: Arc<dyn Communicator>,
    pub ui: Arc<dyn Ui>,
    pub cancel: CancellationToken,
}

impl BuildContext {
    /// Fail with [`BuildError::Cancelled`] once cancellation was requested
    ///
    /// Steps call this between remote calls so that a cancelled build stops
    /// only after the handle of every created resource has been recorded.
    pub fn check_cancelled(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(BuildError::Cancelled);
        }
        Ok(())
    }
}

/// One unit of the build pipeline
///
/// `run` must record any failure in the state and return
/// [`StepAction::Halt`]. The runner never abandons a running step, so `run`
/// should watch [`BuildContext::cancel`] around long waits. `cleanup` is
/// called for every step of a run,
/// whether or not its `run` executed, and must tolerate being called more
/// than once.
#[async_trait]
pub trait Step: Send {
    fn name(&self) -> &'static str;

    async fn run(&mut self, ctx: &BuildContext, state: &mut BuildState) -> StepAction;

    async fn cleanup(&mut self, ctx: &BuildContext, state: &mut BuildState);
}

/// Record `error`, report it and stop the pipeline
pub fn halt(ctx: &BuildContext, state: &mut BuildState, error: BuildError) -> StepAction {
    ctx.ui.error(&error.to_string());
    state.put_error(error);
    StepAction::Halt
}
