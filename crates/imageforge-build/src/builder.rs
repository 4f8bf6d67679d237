use crate::artifact::Artifact;
use crate::communicator::Communicator;
use crate::config::BuildConfig;
use crate::error::{CleanupError, Result};
use crate::runner::Runner;
use crate::state::BuildState;
use crate::step::BuildContext;
use crate::steps::BuildStep;
use crate::ui::Ui;
use imageforge_cloud::CloudApi;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Runs one image build end to end
pub struct Builder {
    ctx: BuildContext,
    cleanup_errors: Vec<CleanupError>,
}

impl Builder {
    pub fn new(
        config: BuildConfig,
        api: Arc<dyn CloudApi>,
        communicator: Arc<dyn Communicator>,
        ui: Arc<dyn Ui>,
    ) -> Self {
        Self {
            ctx: BuildContext {
                config: Arc::new(config),
                api,
                communicator,
                ui,
                cancel: CancellationToken::new(),
            },
            cleanup_errors: Vec::new(),
        }
    }

    pub fn context(&self) -> &BuildContext {
        &self.ctx
    }

    pub fn steps(&self) -> Vec<BuildStep> {
        BuildStep::pipeline()
    }

    /// Run the pipeline and turn its final state into an artifact
    ///
    /// Resources that could not be removed during cleanup are available
    /// from [`Builder::cleanup_errors`] afterwards, whatever the outcome.
    pub async fn run(&mut self, cancel: &CancellationToken) -> Result<Artifact> {
        let mut state = BuildState::new();
        let mut runner = Runner::new(self.steps());
        let ctx = BuildContext {
            cancel: cancel.clone(),
            ..self.ctx.clone()
        };

        tracing::info!(
            "Starting build {} on {}",
            ctx.config.build_name,
            ctx.api.name()
        );
        let summary = runner.run(&ctx, &mut state).await;
        tracing::debug!("Run summary: {:?}", summary);

        self.cleanup_errors = state.take_cleanup_errors();
        if !self.cleanup_errors.is_empty() {
            tracing::warn!(
                "{} resource(s) could not be destroyed",
                self.cleanup_errors.len()
            );
        }

        if let Some(err) = state.take_error() {
            return Err(err);
        }

        Artifact::from_state(&state, Arc::clone(&self.ctx.api))
    }

    pub fn cleanup_errors(&self) -> &[CleanupError] {
        &self.cleanup_errors
    }

    pub fn take_cleanup_errors(&mut self) -> Vec<CleanupError> {
        std::mem::take(&mut self.cleanup_errors)
    }
}
