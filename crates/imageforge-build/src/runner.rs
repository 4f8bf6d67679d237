//! Sequential saga runner
//!
//! The forward phase runs steps in order until one halts, an error shows
//! up in the state, or the build is cancelled. The cleanup phase then
//! calls `cleanup` on every step in reverse order.

use crate::error::BuildError;
use crate::state::BuildState;
use crate::step::{BuildContext, Step, StepAction};

/// What happened during one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Steps whose `run` was invoked, in order
    pub executed: Vec<&'static str>,
    /// Step that stopped the forward phase
    pub halted_at: Option<&'static str>,
    pub cancelled: bool,
}

impl RunSummary {
    pub fn completed(&self) -> bool {
        self.halted_at.is_none() && !self.cancelled
    }
}

pub struct Runner<S: Step> {
    steps: Vec<S>,
}

impl<S: Step> Runner<S> {
    pub fn new(steps: Vec<S>) -> Self {
        Self { steps }
    }

    pub fn steps(&self) -> &[S] {
        &self.steps
    }

    /// Run the forward phase, then clean up every step
    ///
    /// Cancellation through `ctx.cancel` is honoured between steps. A step
    /// that is already running is allowed to finish, so that whatever it
    /// created is recorded and removed by its cleanup.
    pub async fn run(&mut self, ctx: &BuildContext, state: &mut BuildState) -> RunSummary {
        let mut summary = RunSummary {
            executed: Vec::new(),
            halted_at: None,
            cancelled: false,
        };

        for step in self.steps.iter_mut() {
            if state.has_error() {
                summary.halted_at = summary.executed.last().copied();
                break;
            }
            if ctx.cancel.is_cancelled() {
                cancel(ctx, state, &mut summary);
                break;
            }

            let name = step.name();
            tracing::debug!("Running step {}", name);
            summary.executed.push(name);

            let action = step.run(ctx, state).await;

            if ctx.cancel.is_cancelled() {
                tracing::warn!("Build cancelled during step {}", name);
                cancel(ctx, state, &mut summary);
                break;
            }
            if action == StepAction::Halt {
                tracing::info!("Step {} halted the build", name);
                summary.halted_at = Some(name);
                break;
            }
        }

        // A step that continued after recording an error still stops the run
        if !summary.cancelled && summary.halted_at.is_none() && state.has_error() {
            summary.halted_at = summary.executed.last().copied();
        }

        self.cleanup(ctx, state).await;
        summary
    }

    /// Call `cleanup` on every step in reverse order
    pub async fn cleanup(&mut self, ctx: &BuildContext, state: &mut BuildState) {
        for step in self.steps.iter_mut().rev() {
            tracing::debug!("Cleaning up step {}", step.name());
            step.cleanup(ctx, state).await;
        }
    }
}

fn cancel(ctx: &BuildContext, state: &mut BuildState, summary: &mut RunSummary) {
    summary.cancelled = true;
    // A step that stopped on the cancellation has already reported it
    if !state.has_error() {
        ctx.ui.error("Build cancelled");
        state.put_error(BuildError::Cancelled);
    }
}
