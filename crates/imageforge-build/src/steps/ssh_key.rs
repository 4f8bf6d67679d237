use super::{adopt, report_cleanup};
use crate::error::{BuildError, ResourceKind, Result};
use crate::keys::generate_key;
use crate::state::BuildState;
use crate::step::{BuildContext, Step, StepAction, halt};
use async_trait::async_trait;
use imageforge_cloud::SshKeyCreateRequest;
use std::path::Path;

/// Generates a temporary key pair and registers its public half
#[derive(Debug, Default)]
pub struct CreateSshKey {
    ssh_key_id: Option<String>,
}

impl CreateSshKey {
    async fn create(&mut self, ctx: &BuildContext, state: &mut BuildState) -> Result<()> {
        ctx.ui.say("Creating temporary SSH key...");

        let key_name = format!("imageforge-{}", uuid::Uuid::new_v4());
        let key = generate_key(&key_name)?;
        let request = SshKeyCreateRequest {
            name: key_name,
            public_key: key.public_openssh,
        };
        let created = adopt(ctx.api.create_ssh_key(&request).await, &mut self.ssh_key_id)
            .map_err(|e| BuildError::cloud("Error creating temporary SSH key", e))?;

        ctx.ui.message(&format!("SSH key ID: {}", created.id));
        self.ssh_key_id = Some(created.id.clone());
        state.put_ssh_key_id(created.id);
        state.put_ssh_private_key(key.private_pem.as_str());

        if ctx.config.debug {
            let path = &ctx.config.debug_key_path;
            ctx.ui
                .message(&format!("Saving key for debug purposes: {}", path.display()));
            write_private_key(path, &key.private_pem).map_err(|source| BuildError::DebugKey {
                path: path.clone(),
                source,
            })?;
        }

        Ok(())
    }
}

#[async_trait]
impl Step for CreateSshKey {
    fn name(&self) -> &'static str {
        "create-ssh-key"
    }

    async fn run(&mut self, ctx: &BuildContext, state: &mut BuildState) -> StepAction {
        match self.create(ctx, state).await {
            Ok(()) => StepAction::Continue,
            Err(e) => halt(ctx, state, e),
        }
    }

    async fn cleanup(&mut self, ctx: &BuildContext, state: &mut BuildState) {
        let Some(id) = self.ssh_key_id.take() else {
            return;
        };
        ctx.ui.say("Deleting temporary SSH key...");
        let result = ctx.api.delete_ssh_key(&id).await;
        report_cleanup(ctx, state, ResourceKind::SshKey, id, result);
    }
}

/// Write the key readable by the owner only
///
/// The key goes into a fresh owner-only file next to `path` which then
/// replaces `path`, so an existing file with looser permissions never
/// holds key material.
fn write_private_key(path: &Path, pem: &str) -> std::io::Result<()> {
    use std::io::Write;

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut file = tempfile::NamedTempFile::new_in(dir)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.as_file()
            .set_permissions(std::fs::Permissions::from_mode(0o600))?;
    }
    file.write_all(pem.as_bytes())?;
    file.persist(path)?;
    Ok(())
}
