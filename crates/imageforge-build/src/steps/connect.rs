use crate::communicator::SshTarget;
use crate::error::{BuildError, Result};
use crate::state::BuildState;
use crate::step::{BuildContext, Step, StepAction, halt};
use async_trait::async_trait;

/// Waits for SSH on the build server and keeps the session in state
#[derive(Debug, Default)]
pub struct Connect;

impl Connect {
    async fn connect(&self, ctx: &BuildContext, state: &mut BuildState) -> Result<()> {
        let ssh = &ctx.config.ssh;
        let host = match &ssh.host {
            Some(host) => host.clone(),
            None => state.server_ip()?.to_string(),
        };

        let target = SshTarget {
            host: host.clone(),
            port: ssh.port,
            username: ssh.username.clone(),
            private_key: state.ssh_private_key()?.to_string(),
            timeout: ssh.timeout,
        };

        ctx.ui.say(&format!(
            "Waiting for SSH to become available on {}...",
            host
        ));
        // Nothing remote is created while waiting, so the wait can be dropped
        let session = tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => return Err(BuildError::Cancelled),
            result = ctx.communicator.connect(&target) => {
                result.map_err(|source| BuildError::Connect { host, source })?
            }
        };

        ctx.ui.message("Connected to SSH!");
        state.put_session(session);
        Ok(())
    }
}

#[async_trait]
impl Step for Connect {
    fn name(&self) -> &'static str {
        "connect"
    }

    async fn run(&mut self, ctx: &BuildContext, state: &mut BuildState) -> StepAction {
        match self.connect(ctx, state).await {
            Ok(()) => StepAction::Continue,
            Err(e) => halt(ctx, state, e),
        }
    }

    async fn cleanup(&mut self, _ctx: &BuildContext, state: &mut BuildState) {
        if state.take_session().is_some() {
            tracing::debug!("SSH session closed");
        }
    }
}
