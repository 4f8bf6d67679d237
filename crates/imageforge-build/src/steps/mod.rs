//! The build pipeline steps
//!
//! Order: CreateSshKey, CreateServer, Connect, Provision, Shutdown,
//! CreateTemplate. Each step owns the state keys it writes and keeps its
//! own copy of the handles it has to clean up.

mod connect;
mod provision;
mod server;
mod shutdown;
mod ssh_key;
mod template;

pub use connect::Connect;
pub use provision::Provision;
pub use server::CreateServer;
pub use shutdown::Shutdown;
pub use ssh_key::CreateSshKey;
pub use template::CreateTemplate;

use crate::error::{CleanupError, ResourceKind};
use crate::state::BuildState;
use crate::step::{BuildContext, Step, StepAction};
use async_trait::async_trait;

/// Closed set of pipeline steps
#[derive(Debug)]
pub enum BuildStep {
    CreateSshKey(CreateSshKey),
    CreateServer(CreateServer),
    Connect(Connect),
    Provision(Provision),
    Shutdown(Shutdown),
    CreateTemplate(CreateTemplate),
}

impl BuildStep {
    /// Steps of a full build, in execution order
    pub fn pipeline() -> Vec<BuildStep> {
        vec![
            BuildStep::CreateSshKey(CreateSshKey::default()),
            BuildStep::CreateServer(CreateServer::default()),
            BuildStep::Connect(Connect::default()),
            BuildStep::Provision(Provision),
            BuildStep::Shutdown(Shutdown),
            BuildStep::CreateTemplate(CreateTemplate::default()),
        ]
    }
}

#[async_trait]
impl Step for BuildStep {
    fn name(&self) -> &'static str {
        match self {
            BuildStep::CreateSshKey(step) => step.name(),
            BuildStep::CreateServer(step) => step.name(),
            BuildStep::Connect(step) => step.name(),
            BuildStep::Provision(step) => step.name(),
            BuildStep::Shutdown(step) => step.name(),
            BuildStep::CreateTemplate(step) => step.name(),
        }
    }

    async fn run(&mut self, ctx: &BuildContext, state: &mut BuildState) -> StepAction {
        match self {
            BuildStep::CreateSshKey(step) => step.run(ctx, state).await,
            BuildStep::CreateServer(step) => step.run(ctx, state).await,
            BuildStep::Connect(step) => step.run(ctx, state).await,
            BuildStep::Provision(step) => step.run(ctx, state).await,
            BuildStep::Shutdown(step) => step.run(ctx, state).await,
            BuildStep::CreateTemplate(step) => step.run(ctx, state).await,
        }
    }

    async fn cleanup(&mut self, ctx: &BuildContext, state: &mut BuildState) {
        match self {
            BuildStep::CreateSshKey(step) => step.cleanup(ctx, state).await,
            BuildStep::CreateServer(step) => step.cleanup(ctx, state).await,
            BuildStep::Connect(step) => step.cleanup(ctx, state).await,
            BuildStep::Provision(step) => step.cleanup(ctx, state).await,
            BuildStep::Shutdown(step) => step.cleanup(ctx, state).await,
            BuildStep::CreateTemplate(step) => step.cleanup(ctx, state).await,
        }
    }
}

/// Keep the id of an object the provider created even though the call failed
fn adopt<T>(
    result: imageforge_cloud::Result<T>,
    handle: &mut Option<String>,
) -> imageforge_cloud::Result<T> {
    if let Err(e) = &result {
        if let Some(id) = e.object_id() {
            tracing::warn!("Keeping unconfirmed object {} for cleanup", id);
            *handle = Some(id.to_string());
        }
    }
    result
}

/// Report the outcome of one cleanup deletion; failures are collected, never raised
fn report_cleanup(
    ctx: &BuildContext,
    state: &mut BuildState,
    resource: ResourceKind,
    id: String,
    result: imageforge_cloud::Result<()>,
) {
    match result {
        Ok(()) => tracing::debug!("Deleted {} {}", resource, id),
        Err(source) => {
            let err = CleanupError::new(resource, id, source);
            ctx.ui.error(&err.to_string());
            state.record_cleanup_error(err);
        }
    }
}
