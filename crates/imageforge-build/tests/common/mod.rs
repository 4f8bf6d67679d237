use async_trait::async_trait;
use imageforge_build::communicator::CommResult;
use imageforge_build::config::{ApiSettings, Credentials, ServerSettings, SshSettings};
use imageforge_build::{
    BuildConfig, BuildContext, CommError, CommandOutput, Communicator, RecordingUi, RemoteSession,
    SshTarget,
};
use imageforge_cloud::{
    CloudApi, CloudError, Created, IpAddress, IpCreateRequest, Network, Result,
    ServerCreateRequest, SnapshotCreateRequest, SshKeyCreateRequest, StorageCreateRequest,
    Template, TemplateCreateRequest,
};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub const LOCATION: &str = "de/fra";

/// In-memory provider that records every call
///
/// Ids are handed out per kind: `server-1`, `storage-1`, `storage-2`, ...
/// Calls are recorded as `op:arg[:arg]`.
#[derive(Default)]
pub struct MockCloud {
    calls: Mutex<Vec<String>>,
    failures: Mutex<HashSet<String>>,
    unconfirmed: Mutex<HashSet<String>>,
    delays: Mutex<HashMap<String, Duration>>,
    counters: Mutex<HashMap<&'static str, u32>>,
}

#[allow(dead_code)]
impl MockCloud {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make every call to `op` fail with a 500
    pub fn fail_on(&self, op: &str) {
        self.failures.lock().unwrap().insert(op.to_string());
    }

    /// Accept creations through `op` but fail before confirming them,
    /// the way a request that never finishes does
    pub fn unconfirmed_on(&self, op: &str) {
        self.unconfirmed.lock().unwrap().insert(op.to_string());
    }

    /// Make `op` take `delay` after it has reached the provider
    pub fn delay_on(&self, op: &str, delay: Duration) {
        self.delays.lock().unwrap().insert(op.to_string(), delay);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn ops(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .map(|c| c.split(':').next().unwrap_or_default().to_string())
            .collect()
    }

    pub fn count(&self, call: &str) -> usize {
        self.calls().iter().filter(|c| c.as_str() == call).count()
    }

    pub fn called(&self, call: &str) -> bool {
        self.count(call) > 0
    }

    pub fn position(&self, call: &str) -> Option<usize> {
        self.calls().iter().position(|c| c == call)
    }

    fn record(&self, op: &str, args: &[&str]) -> Result<()> {
        let mut call = op.to_string();
        for arg in args {
            call.push(':');
            call.push_str(arg);
        }
        self.calls.lock().unwrap().push(call);

        if self.failures.lock().unwrap().contains(op) {
            return Err(CloudError::api(500, "injected failure"));
        }
        Ok(())
    }

    async fn pause(&self, op: &str) {
        let delay = self.delays.lock().unwrap().get(op).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn confirm(&self, op: &str, id: String) -> Result<String> {
        if self.unconfirmed.lock().unwrap().contains(op) {
            return Err(CloudError::Incomplete {
                object_id: id,
                source: Box::new(CloudError::Timeout(format!("request for {}", op))),
            });
        }
        Ok(id)
    }

    fn next_id(&self, kind: &'static str) -> String {
        let mut counters = self.counters.lock().unwrap();
        let n = counters.entry(kind).or_insert(0);
        *n += 1;
        format!("{}-{}", kind, n)
    }
}

#[async_trait]
impl CloudApi for MockCloud {
    fn name(&self) -> &str {
        "mock"
    }

    async fn public_network(&self) -> Result<Network> {
        self.record("public_network", &[])?;
        Ok(Network {
            id: "network-public".to_string(),
            name: "Public Network".to_string(),
        })
    }

    async fn create_server(&self, request: &ServerCreateRequest) -> Result<Created> {
        self.record("create_server", &[request.name.as_str()])?;
        self.pause("create_server").await;
        let id = self.confirm("create_server", self.next_id("server"))?;
        Ok(Created::new(id))
    }

    async fn delete_server(&self, server_id: &str) -> Result<()> {
        self.record("delete_server", &[server_id])
    }

    async fn start_server(&self, server_id: &str) -> Result<()> {
        self.record("start_server", &[server_id])
    }

    async fn stop_server(&self, server_id: &str) -> Result<()> {
        self.record("stop_server", &[server_id])
    }

    async fn shutdown_server(&self, server_id: &str) -> Result<()> {
        self.record("shutdown_server", &[server_id])
    }

    async fn create_storage(&self, request: &StorageCreateRequest) -> Result<Created> {
        self.record("create_storage", &[request.name.as_str()])?;
        let id = self.confirm("create_storage", self.next_id("storage"))?;
        Ok(Created::new(id))
    }

    async fn delete_storage(&self, storage_id: &str) -> Result<()> {
        self.record("delete_storage", &[storage_id])
    }

    async fn link_storage(
        &self,
        server_id: &str,
        storage_id: &str,
        bootdevice: bool,
    ) -> Result<()> {
        let boot = if bootdevice { "boot" } else { "data" };
        self.record("link_storage", &[server_id, storage_id, boot])
    }

    async fn unlink_storage(&self, server_id: &str, storage_id: &str) -> Result<()> {
        self.record("unlink_storage", &[server_id, storage_id])
    }

    async fn create_ip(&self, request: &IpCreateRequest) -> Result<IpAddress> {
        self.record("create_ip", &[request.name.as_str()])?;
        Ok(IpAddress {
            id: self.confirm("create_ip", self.next_id("ip"))?,
            address: "203.0.113.10".to_string(),
        })
    }

    async fn delete_ip(&self, ip_id: &str) -> Result<()> {
        self.record("delete_ip", &[ip_id])
    }

    async fn link_ip(&self, server_id: &str, ip_id: &str) -> Result<()> {
        self.record("link_ip", &[server_id, ip_id])
    }

    async fn unlink_ip(&self, server_id: &str, ip_id: &str) -> Result<()> {
        self.record("unlink_ip", &[server_id, ip_id])
    }

    async fn link_network(&self, server_id: &str, network_id: &str) -> Result<()> {
        self.record("link_network", &[server_id, network_id])
    }

    async fn unlink_network(&self, server_id: &str, network_id: &str) -> Result<()> {
        self.record("unlink_network", &[server_id, network_id])
    }

    async fn attach_iso_image(&self, server_id: &str, iso_image_id: &str) -> Result<()> {
        self.record("attach_iso_image", &[server_id, iso_image_id])
    }

    async fn create_ssh_key(&self, request: &SshKeyCreateRequest) -> Result<Created> {
        self.record("create_ssh_key", &[])?;
        assert!(request.public_key.starts_with("ssh-ed25519 "));
        let id = self.confirm("create_ssh_key", self.next_id("key"))?;
        Ok(Created::new(id))
    }

    async fn delete_ssh_key(&self, ssh_key_id: &str) -> Result<()> {
        self.record("delete_ssh_key", &[ssh_key_id])
    }

    async fn create_snapshot(
        &self,
        storage_id: &str,
        request: &SnapshotCreateRequest,
    ) -> Result<Created> {
        self.record("create_snapshot", &[storage_id, request.name.as_str()])?;
        Ok(Created::new(self.next_id("snapshot")))
    }

    async fn create_template(&self, request: &TemplateCreateRequest) -> Result<Created> {
        self.record(
            "create_template",
            &[request.name.as_str(), request.snapshot_id.as_str()],
        )?;
        Ok(Created::new(self.next_id("template")))
    }

    async fn get_template(&self, template_id: &str) -> Result<Template> {
        self.record("get_template", &[template_id])?;
        Ok(Template {
            id: template_id.to_string(),
            name: "test-template".to_string(),
            location_name: LOCATION.to_string(),
        })
    }

    async fn delete_template(&self, template_id: &str) -> Result<()> {
        self.record("delete_template", &[template_id])
    }
}

/// Communicator that never touches the network
#[derive(Default)]
pub struct FakeCommunicator {
    pub targets: Mutex<Vec<SshTarget>>,
    pub scripts: Arc<Mutex<Vec<String>>>,
    /// Fail every connection attempt
    pub refuse: bool,
    /// Exit status for scripts containing the given text
    pub exit_codes: Vec<(String, i32)>,
}

#[allow(dead_code)]
impl FakeCommunicator {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn refusing() -> Arc<Self> {
        Arc::new(Self {
            refuse: true,
            ..Default::default()
        })
    }

    pub fn failing_script(marker: &str, code: i32) -> Arc<Self> {
        Arc::new(Self {
            exit_codes: vec![(marker.to_string(), code)],
            ..Default::default()
        })
    }

    pub fn scripts(&self) -> Vec<String> {
        self.scripts.lock().unwrap().clone()
    }

    pub fn targets(&self) -> Vec<SshTarget> {
        self.targets.lock().unwrap().clone()
    }
}

#[async_trait]
impl Communicator for FakeCommunicator {
    async fn connect(&self, target: &SshTarget) -> CommResult<Box<dyn RemoteSession>> {
        self.targets.lock().unwrap().push(target.clone());
        if self.refuse {
            return Err(CommError::Timeout(target.timeout));
        }
        Ok(Box::new(FakeSession {
            scripts: Arc::clone(&self.scripts),
            exit_codes: self.exit_codes.clone(),
        }))
    }
}

struct FakeSession {
    scripts: Arc<Mutex<Vec<String>>>,
    exit_codes: Vec<(String, i32)>,
}

#[async_trait]
impl RemoteSession for FakeSession {
    async fn execute(&self, script: &str) -> CommResult<CommandOutput> {
        self.scripts.lock().unwrap().push(script.to_string());
        let exit_code = self
            .exit_codes
            .iter()
            .find(|(marker, _)| script.contains(marker.as_str()))
            .map(|(_, code)| *code)
            .unwrap_or(0);
        Ok(CommandOutput {
            exit_code: Some(exit_code),
            stdout: format!("ran {}\n", script),
            stderr: String::new(),
        })
    }
}

pub fn test_config() -> BuildConfig {
    BuildConfig {
        build_name: "test".to_string(),
        credentials: Credentials {
            api_key: "user-uuid".to_string(),
            api_token: "secret".to_string(),
            api_url: "http://localhost".to_string(),
        },
        server: ServerSettings {
            name: "builder".to_string(),
            cores: 2,
            memory: 4,
            storage_capacity: 10,
            template_uuid: "tpl-uuid".to_string(),
            hostname: None,
            password: None,
            secondary_storage: false,
            iso_image_uuid: None,
            tags: vec!["imageforge".to_string()],
        },
        template_name: "test-template".to_string(),
        ssh: SshSettings {
            timeout: Duration::from_millis(50),
            ..Default::default()
        },
        provisioners: vec![imageforge_build::Provisioner::Shell(
            "echo provisioning".to_string(),
        )],
        debug: false,
        debug_key_path: PathBuf::from("gs_test.pem"),
        api: ApiSettings::default(),
    }
}

pub struct Harness {
    pub api: Arc<MockCloud>,
    pub communicator: Arc<FakeCommunicator>,
    pub ui: Arc<RecordingUi>,
    pub ctx: BuildContext,
}

#[allow(dead_code)]
impl Harness {
    pub fn new() -> Self {
        Self::with(test_config(), FakeCommunicator::new())
    }

    pub fn with_config(config: BuildConfig) -> Self {
        Self::with(config, FakeCommunicator::new())
    }

    pub fn with(config: BuildConfig, communicator: Arc<FakeCommunicator>) -> Self {
        let api = MockCloud::new();
        let ui = Arc::new(RecordingUi::new());
        let ctx = BuildContext {
            config: Arc::new(config),
            api: api.clone(),
            communicator: communicator.clone(),
            ui: ui.clone(),
            cancel: CancellationToken::new(),
        };
        Self {
            api,
            communicator,
            ui,
            ctx,
        }
    }
}
