use super::{adopt, report_cleanup};
use crate::error::{BuildError, ResourceKind, Result};
use crate::state::BuildState;
use crate::step::{BuildContext, Step, StepAction, halt};
use async_trait::async_trait;
use imageforge_cloud::{
    IpCreateRequest, IpFamily, ServerCreateRequest, StorageCreateRequest, StorageTemplate,
};

/// Creates the build server with its boot storage and public address
///
/// Every handle is recorded the moment the resource exists, so a failure
/// at any point leaves cleanup with exactly what has to go.
#[derive(Debug, Default)]
pub struct CreateServer {
    server_id: Option<String>,
    storage_id: Option<String>,
    secondary_storage_id: Option<String>,
    ip_id: Option<String>,
}

impl CreateServer {
    async fn create(&mut self, ctx: &BuildContext, state: &mut BuildState) -> Result<()> {
        let settings = &ctx.config.server;
        let api = &ctx.api;

        ctx.ui.say("Looking up public network...");
        let network = api
            .public_network()
            .await
            .map_err(|e| BuildError::cloud("Error looking up the public network", e))?;

        ctx.ui.say("Creating server...");
        let server = adopt(
            api.create_server(&ServerCreateRequest {
                name: settings.name.clone(),
                cores: settings.cores,
                memory: settings.memory,
                labels: settings.tags.clone(),
            })
            .await,
            &mut self.server_id,
        )
        .map_err(|e| BuildError::cloud("Error creating server", e))?;
        self.server_id = Some(server.id.clone());
        state.put_server_id(server.id.as_str());
        ctx.ui.message(&format!("Server ID: {}", server.id));
        ctx.check_cancelled()?;

        let ssh_key_id = state.ssh_key_id()?.to_string();
        ctx.ui.say("Creating bootable storage...");
        let storage = adopt(
            api.create_storage(&StorageCreateRequest {
                name: format!("{}-storage", settings.name),
                capacity: settings.storage_capacity,
                template: Some(StorageTemplate {
                    template_uuid: settings.template_uuid.clone(),
                    password: settings.password.clone(),
                    hostname: settings.hostname.clone(),
                    ssh_keys: vec![ssh_key_id],
                }),
                ..Default::default()
            })
            .await,
            &mut self.storage_id,
        )
        .map_err(|e| BuildError::cloud("Error creating storage", e))?;
        self.storage_id = Some(storage.id.clone());
        state.put_storage_id(storage.id.as_str());
        ctx.ui.message(&format!("Storage ID: {}", storage.id));
        ctx.check_cancelled()?;

        ctx.ui.say("Linking storage to server...");
        api.link_storage(&server.id, &storage.id, true)
            .await
            .map_err(|e| BuildError::cloud("Error linking storage to server", e))?;

        if settings.secondary_storage {
            ctx.ui.say("Creating unbootable storage...");
            let secondary = adopt(
                api.create_storage(&StorageCreateRequest {
                    name: format!("{}-secondary-storage", settings.name),
                    capacity: settings.storage_capacity,
                    ..Default::default()
                })
                .await,
                &mut self.secondary_storage_id,
            )
            .map_err(|e| BuildError::cloud("Error creating secondary storage", e))?;
            self.secondary_storage_id = Some(secondary.id.clone());
            state.put_secondary_storage_id(secondary.id.as_str());
            ctx.ui
                .message(&format!("Secondary storage ID: {}", secondary.id));
            ctx.check_cancelled()?;

            ctx.ui.say("Linking unbootable storage to server...");
            api.link_storage(&server.id, &secondary.id, false)
                .await
                .map_err(|e| BuildError::cloud("Error linking secondary storage to server", e))?;
        }

        ctx.ui.say("Creating IP address...");
        let ip = adopt(
            api.create_ip(&IpCreateRequest {
                name: format!("{}-ip", settings.name),
                family: IpFamily::V4,
            })
            .await,
            &mut self.ip_id,
        )
        .map_err(|e| BuildError::cloud("Error creating IP address", e))?;
        self.ip_id = Some(ip.id.clone());
        state.put_ip_id(ip.id.as_str());
        state.put_server_ip(ip.address.as_str());
        ctx.ui.message(&format!("IP address: {}", ip.address));
        ctx.check_cancelled()?;

        ctx.ui.say("Linking IP address to server...");
        api.link_ip(&server.id, &ip.id)
            .await
            .map_err(|e| BuildError::cloud("Error linking IP address to server", e))?;

        ctx.ui.say("Linking server to public network...");
        api.link_network(&server.id, &network.id)
            .await
            .map_err(|e| BuildError::cloud("Error linking server to the public network", e))?;

        if let Some(iso_image_id) = &settings.iso_image_uuid {
            ctx.ui.say("Attaching ISO image...");
            api.attach_iso_image(&server.id, iso_image_id)
                .await
                .map_err(|e| BuildError::cloud("Error attaching ISO image", e))?;
        }
        ctx.check_cancelled()?;

        ctx.ui.say("Starting server...");
        api.start_server(&server.id)
            .await
            .map_err(|e| BuildError::cloud("Error starting server", e))?;
        ctx.ui.message("Server started");

        Ok(())
    }
}

#[async_trait]
impl Step for CreateServer {
    fn name(&self) -> &'static str {
        "create-server"
    }

    async fn run(&mut self, ctx: &BuildContext, state: &mut BuildState) -> StepAction {
        match self.create(ctx, state).await {
            Ok(()) => StepAction::Continue,
            Err(e) => halt(ctx, state, e),
        }
    }

    async fn cleanup(&mut self, ctx: &BuildContext, state: &mut BuildState) {
        if let Some(server_id) = self.server_id.take() {
            ctx.ui.say("Destroying server...");

            // Storage cannot be removed from a running server; failing to stop is not fatal
            if let Err(e) = ctx.api.stop_server(&server_id).await {
                tracing::warn!("Error stopping server {}: {}", server_id, e);
                ctx.ui
                    .message(&format!("Could not stop server {}: {}", server_id, e));
            }

            let result = ctx.api.delete_server(&server_id).await;
            report_cleanup(ctx, state, ResourceKind::Server, server_id, result);
        }

        for storage_id in [self.storage_id.take(), self.secondary_storage_id.take()]
            .into_iter()
            .flatten()
        {
            ctx.ui.say("Destroying storage...");
            let result = ctx.api.delete_storage(&storage_id).await;
            report_cleanup(ctx, state, ResourceKind::Storage, storage_id, result);
        }

        if let Some(ip_id) = self.ip_id.take() {
            ctx.ui.say("Destroying IP address...");
            let result = ctx.api.delete_ip(&ip_id).await;
            report_cleanup(ctx, state, ResourceKind::Ip, ip_id, result);
        }
    }
}
