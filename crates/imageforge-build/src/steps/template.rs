use crate::error::{BuildError, Result};
use crate::state::BuildState;
use crate::step::{BuildContext, Step, StepAction, halt};
use async_trait::async_trait;
use imageforge_cloud::{SnapshotCreateRequest, TemplateCreateRequest};

/// Snapshots the boot storage and turns the snapshot into a template
///
/// Nothing is cleaned up here. The template is the build's deliverable,
/// and the snapshot belongs to the boot storage that `CreateServer`
/// removes. A template that cannot be read back is left in place; its id
/// has been narrated by then.
#[derive(Debug, Default)]
pub struct CreateTemplate;

impl CreateTemplate {
    async fn create(&self, ctx: &BuildContext, state: &mut BuildState) -> Result<()> {
        let storage_id = state.storage_id()?.to_string();
        let name = ctx.config.template_name.clone();

        ctx.ui.say("Creating snapshot...");
        let snapshot = ctx
            .api
            .create_snapshot(&storage_id, &SnapshotCreateRequest { name: name.clone() })
            .await
            .map_err(|e| BuildError::cloud("Error creating snapshot", e))?;
        ctx.ui.message(&format!("Snapshot ID: {}", snapshot.id));

        ctx.ui.say(&format!("Creating template '{}'...", name));
        let template = ctx
            .api
            .create_template(&TemplateCreateRequest {
                name: name.clone(),
                snapshot_id: snapshot.id,
            })
            .await
            .map_err(|e| BuildError::cloud("Error creating template", e))?;
        ctx.ui.message(&format!("Template ID: {}", template.id));

        ctx.ui.say("Reading template...");
        let details = ctx
            .api
            .get_template(&template.id)
            .await
            .map_err(|e| BuildError::cloud("Error reading template", e))?;
        ctx.ui.message(&format!("Template region: {}", details.location_name));

        state.put_snapshot_name(name);
        state.put_snapshot_image_id(template.id);
        state.put_regions(vec![details.location_name]);
        Ok(())
    }
}

#[async_trait]
impl Step for CreateTemplate {
    fn name(&self) -> &'static str {
        "create-template"
    }

    async fn run(&mut self, ctx: &BuildContext, state: &mut BuildState) -> StepAction {
        match self.create(ctx, state).await {
            Ok(()) => StepAction::Continue,
            Err(e) => halt(ctx, state, e),
        }
    }

    async fn cleanup(&mut self, _ctx: &BuildContext, _state: &mut BuildState) {}
}
