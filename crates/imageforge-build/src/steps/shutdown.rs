use crate::error::{BuildError, Result};
use crate::state::BuildState;
use crate::step::{BuildContext, Step, StepAction, halt};
use async_trait::async_trait;

/// Gracefully shuts the server down so the disk is consistent
#[derive(Debug, Default)]
pub struct Shutdown;

impl Shutdown {
    async fn shutdown(&self, ctx: &BuildContext, state: &mut BuildState) -> Result<()> {
        let server_id = state.server_id()?;
        ctx.ui.say("Shutting down server...");
        ctx.api
            .shutdown_server(server_id)
            .await
            .map_err(|e| BuildError::cloud("Error shutting down server", e))?;
        ctx.ui.message("Server is off");
        Ok(())
    }
}

#[async_trait]
impl Step for Shutdown {
    fn name(&self) -> &'static str {
        "shutdown"
    }

    async fn run(&mut self, ctx: &BuildContext, state: &mut BuildState) -> StepAction {
        match self.shutdown(ctx, state).await {
            Ok(()) => StepAction::Continue,
            Err(e) => halt(ctx, state, e),
        }
    }

    async fn cleanup(&mut self, _ctx: &BuildContext, _state: &mut BuildState) {}
}
