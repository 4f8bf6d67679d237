//! gridscale implementation of the CloudApi capability set

use crate::client::{GridscaleClient, NetworksResponse, TemplateResponse};
use crate::error::GridscaleError;
use async_trait::async_trait;
use imageforge_cloud::{
    CloudApi, Created, IpAddress, IpCreateRequest, Network, ServerCreateRequest,
    SnapshotCreateRequest, SshKeyCreateRequest, StorageCreateRequest, Template,
    TemplateCreateRequest,
};
use reqwest::Method;
use serde_json::json;

type CloudResult<T> = imageforge_cloud::Result<T>;

fn storage_body(request: &StorageCreateRequest) -> serde_json::Value {
    let mut body = json!({
        "name": request.name,
        "capacity": request.capacity,
        "storage_type": request.storage_type,
    });

    if let Some(ref template) = request.template {
        let mut tpl = json!({
            "template_uuid": template.template_uuid,
            "sshkeys": template.ssh_keys,
        });
        if let Some(ref password) = template.password {
            tpl["password"] = json!(password);
            tpl["password_type"] = json!("plain");
        }
        if let Some(ref hostname) = template.hostname {
            tpl["hostname"] = json!(hostname);
        }
        body["template"] = tpl;
    }

    body
}

#[async_trait]
impl CloudApi for GridscaleClient {
    fn name(&self) -> &str {
        "gridscale"
    }

    async fn public_network(&self) -> CloudResult<Network> {
        let response: NetworksResponse = self.get("/objects/networks").await?;

        let network = response
            .networks
            .into_values()
            .find(|n| n.public_net)
            .ok_or(GridscaleError::PublicNetworkNotFound)?;

        Ok(Network {
            id: network.object_uuid,
            name: network.name,
        })
    }

    async fn create_server(&self, request: &ServerCreateRequest) -> CloudResult<Created> {
        let body = json!({
            "name": request.name,
            "cores": request.cores,
            "memory": request.memory,
            "labels": request.labels,
        });
        let created = self.create("/objects/servers", body).await?;
        Ok(Created::new(created.object_uuid))
    }

    async fn delete_server(&self, server_id: &str) -> CloudResult<()> {
        self.execute(
            Method::DELETE,
            &format!("/objects/servers/{}", server_id),
            None,
        )
        .await?;
        Ok(())
    }

    async fn start_server(&self, server_id: &str) -> CloudResult<()> {
        self.execute(
            Method::PATCH,
            &format!("/objects/servers/{}/power", server_id),
            Some(json!({ "power": true })),
        )
        .await?;
        Ok(())
    }

    async fn stop_server(&self, server_id: &str) -> CloudResult<()> {
        self.execute(
            Method::PATCH,
            &format!("/objects/servers/{}/power", server_id),
            Some(json!({ "power": false })),
        )
        .await?;
        Ok(())
    }

    async fn shutdown_server(&self, server_id: &str) -> CloudResult<()> {
        self.execute(
            Method::PATCH,
            &format!("/objects/servers/{}/shutdown", server_id),
            Some(json!({})),
        )
        .await?;
        Ok(())
    }

    async fn create_storage(&self, request: &StorageCreateRequest) -> CloudResult<Created> {
        let created = self
            .create("/objects/storages", storage_body(request))
            .await?;
        Ok(Created::new(created.object_uuid))
    }

    async fn delete_storage(&self, storage_id: &str) -> CloudResult<()> {
        self.execute(
            Method::DELETE,
            &format!("/objects/storages/{}", storage_id),
            None,
        )
        .await?;
        Ok(())
    }

    async fn link_storage(
        &self,
        server_id: &str,
        storage_id: &str,
        bootdevice: bool,
    ) -> CloudResult<()> {
        self.execute(
            Method::POST,
            &format!("/objects/servers/{}/storages", server_id),
            Some(json!({ "object_uuid": storage_id, "bootdevice": bootdevice })),
        )
        .await?;
        Ok(())
    }

    async fn unlink_storage(&self, server_id: &str, storage_id: &str) -> CloudResult<()> {
        self.execute(
            Method::DELETE,
            &format!("/objects/servers/{}/storages/{}", server_id, storage_id),
            None,
        )
        .await?;
        Ok(())
    }

    async fn create_ip(&self, request: &IpCreateRequest) -> CloudResult<IpAddress> {
        let body = json!({
            "name": request.name,
            "family": request.family.as_number(),
        });
        let created = self.create("/objects/ips", body).await?;
        let address = created.ip.ok_or_else(|| GridscaleError::Incomplete {
            object_uuid: created.object_uuid.clone(),
            source: Box::new(GridscaleError::UnexpectedResponse(
                "IP creation returned no address".to_string(),
            )),
        })?;

        Ok(IpAddress {
            id: created.object_uuid,
            address,
        })
    }

    async fn delete_ip(&self, ip_id: &str) -> CloudResult<()> {
        self.execute(Method::DELETE, &format!("/objects/ips/{}", ip_id), None)
            .await?;
        Ok(())
    }

    async fn link_ip(&self, server_id: &str, ip_id: &str) -> CloudResult<()> {
        self.execute(
            Method::POST,
            &format!("/objects/servers/{}/ips", server_id),
            Some(json!({ "object_uuid": ip_id })),
        )
        .await?;
        Ok(())
    }

    async fn unlink_ip(&self, server_id: &str, ip_id: &str) -> CloudResult<()> {
        self.execute(
            Method::DELETE,
            &format!("/objects/servers/{}/ips/{}", server_id, ip_id),
            None,
        )
        .await?;
        Ok(())
    }

    async fn link_network(&self, server_id: &str, network_id: &str) -> CloudResult<()> {
        self.execute(
            Method::POST,
            &format!("/objects/servers/{}/networks", server_id),
            Some(json!({ "object_uuid": network_id })),
        )
        .await?;
        Ok(())
    }

    async fn unlink_network(&self, server_id: &str, network_id: &str) -> CloudResult<()> {
        self.execute(
            Method::DELETE,
            &format!("/objects/servers/{}/networks/{}", server_id, network_id),
            None,
        )
        .await?;
        Ok(())
    }

    async fn attach_iso_image(&self, server_id: &str, iso_image_id: &str) -> CloudResult<()> {
        self.execute(
            Method::POST,
            &format!("/objects/servers/{}/isoimages", server_id),
            Some(json!({ "object_uuid": iso_image_id })),
        )
        .await?;
        Ok(())
    }

    async fn create_ssh_key(&self, request: &SshKeyCreateRequest) -> CloudResult<Created> {
        let body = json!({
            "name": request.name,
            "sshkey": request.public_key,
        });
        let created = self.create("/objects/sshkeys", body).await?;
        Ok(Created::new(created.object_uuid))
    }

    async fn delete_ssh_key(&self, ssh_key_id: &str) -> CloudResult<()> {
        self.execute(
            Method::DELETE,
            &format!("/objects/sshkeys/{}", ssh_key_id),
            None,
        )
        .await?;
        Ok(())
    }

    async fn create_snapshot(
        &self,
        storage_id: &str,
        request: &SnapshotCreateRequest,
    ) -> CloudResult<Created> {
        let created = self
            .create(
                &format!("/objects/storages/{}/snapshots", storage_id),
                json!({ "name": request.name }),
            )
            .await?;
        Ok(Created::new(created.object_uuid))
    }

    async fn create_template(&self, request: &TemplateCreateRequest) -> CloudResult<Created> {
        let created = self
            .create(
                "/objects/templates",
                json!({ "name": request.name, "snapshot_uuid": request.snapshot_id }),
            )
            .await?;
        Ok(Created::new(created.object_uuid))
    }

    async fn get_template(&self, template_id: &str) -> CloudResult<Template> {
        let response: TemplateResponse = self
            .get(&format!("/objects/templates/{}", template_id))
            .await?;
        let template = response.template;

        Ok(Template {
            id: template.object_uuid,
            name: template.name,
            location_name: template.location_name,
        })
    }

    async fn delete_template(&self, template_id: &str) -> CloudResult<()> {
        self.execute(
            Method::DELETE,
            &format!("/objects/templates/{}", template_id),
            None,
        )
        .await?;
        Ok(())
    }
}
