use crate::error::{BuildError, CommError, Result};
use crate::state::BuildState;
use crate::step::{BuildContext, Step, StepAction, halt};
use async_trait::async_trait;

/// Runs every configured provisioner over the session, in order
#[derive(Debug, Default)]
pub struct Provision;

impl Provision {
    async fn provision(&self, ctx: &BuildContext, state: &mut BuildState) -> Result<()> {
        let session = state.session()?;

        for provisioner in &ctx.config.provisioners {
            ctx.check_cancelled()?;
            let name = provisioner.name();
            ctx.ui.say(&format!("Provisioning with {}", name));

            let script = provisioner.script().await.map_err(|e| BuildError::Provision {
                name: name.clone(),
                source: CommError::Io(e),
            })?;

            let output = session
                .execute(&script)
                .await
                .map_err(|source| BuildError::Provision {
                    name: name.clone(),
                    source,
                })?;

            for line in output.stdout.lines() {
                ctx.ui.message(line);
            }
            for line in output.stderr.lines() {
                tracing::debug!("[{}] {}", name, line);
            }

            output
                .check()
                .map_err(|source| BuildError::Provision { name, source })?;
        }

        Ok(())
    }
}

#[async_trait]
impl Step for Provision {
    fn name(&self) -> &'static str {
        "provision"
    }

    async fn run(&mut self, ctx: &BuildContext, state: &mut BuildState) -> StepAction {
        match self.provision(ctx, state).await {
            Ok(()) => StepAction::Continue,
            Err(e) => halt(ctx, state, e),
        }
    }

    async fn cleanup(&mut self, _ctx: &BuildContext, _state: &mut BuildState) {}
}
