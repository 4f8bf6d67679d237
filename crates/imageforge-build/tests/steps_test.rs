mod common;

use common::{FakeCommunicator, Harness, test_config};
use imageforge_build::steps::{CreateServer, CreateSshKey, CreateTemplate};
use imageforge_build::{
    BuildError, BuildState, BuildStep, CommError, ResourceKind, Runner, Step, StepAction, UiLine,
};
use imageforge_cloud::CloudError;
use std::time::Duration;

async fn run_pipeline(harness: &Harness) -> BuildState {
    let mut state = BuildState::new();
    let mut runner = Runner::new(BuildStep::pipeline());
    runner.run(&harness.ctx, &mut state).await;
    state
}

fn says(harness: &Harness) -> Vec<String> {
    harness
        .ui
        .lines()
        .into_iter()
        .filter_map(|line| match line {
            UiLine::Say(text) => Some(text),
            _ => None,
        })
        .collect()
}

/// A successful pipeline fills every output key and tears the server down
#[tokio::test]
async fn test_full_pipeline() {
    let harness = Harness::new();
    let state = run_pipeline(&harness).await;

    assert!(!state.has_error(), "unexpected error: {:?}", state.error());
    assert_eq!(state.snapshot_image_id().unwrap(), "template-1");
    assert_eq!(state.snapshot_name().unwrap(), "test-template");
    assert_eq!(state.regions().unwrap(), [common::LOCATION.to_string()]);

    let api = &harness.api;
    assert_eq!(
        api.ops(),
        vec![
            "create_ssh_key",
            "public_network",
            "create_server",
            "create_storage",
            "link_storage",
            "create_ip",
            "link_ip",
            "link_network",
            "start_server",
            "shutdown_server",
            "create_snapshot",
            "create_template",
            "get_template",
            // cleanup
            "stop_server",
            "delete_server",
            "delete_storage",
            "delete_ip",
            "delete_ssh_key",
        ]
    );
    assert!(api.called("create_snapshot:storage-1:test-template"));
    assert!(api.called("create_template:test-template:snapshot-1"));
    assert!(api.called("link_storage:server-1:storage-1:boot"));
    assert!(api.called("link_network:server-1:network-public"));
    assert!(!api.called("delete_template:template-1"));

    assert_eq!(harness.communicator.scripts(), vec!["echo provisioning"]);
    assert!(state.cleanup_errors().is_empty());
}

/// The server goes before its storage
#[tokio::test]
async fn test_server_deleted_before_storage() {
    let harness = Harness::new();
    run_pipeline(&harness).await;

    let api = &harness.api;
    let server = api.position("delete_server:server-1").unwrap();
    let storage = api.position("delete_storage:storage-1").unwrap();
    assert!(server < storage);
}

/// Failing to create storage halts, deletes the server and nothing else of CreateServer
#[tokio::test]
async fn test_storage_creation_failure() {
    let harness = Harness::new();
    harness.api.fail_on("create_storage");

    let state = run_pipeline(&harness).await;

    match state.error() {
        Some(BuildError::Cloud { context, source }) => {
            assert_eq!(*context, "Error creating storage");
            assert_eq!(source.to_string(), "API error (500): injected failure");
        }
        other => panic!("unexpected error: {:?}", other),
    }

    let api = &harness.api;
    assert_eq!(api.count("delete_server:server-1"), 1);
    assert!(!api.ops().contains(&"delete_storage".to_string()));
    assert!(!api.ops().contains(&"delete_ip".to_string()));
    assert!(!api.ops().contains(&"create_ip".to_string()));
    assert!(api.called("delete_ssh_key:key-1"));
    assert!(harness.communicator.targets().is_empty());

    assert_eq!(
        harness.ui.errors(),
        vec!["Error creating storage: API error (500): injected failure"]
    );
}

/// Cleanup twice deletes each resource once
#[tokio::test]
async fn test_cleanup_is_idempotent() {
    let harness = Harness::new();
    let mut state = BuildState::new();
    let mut key = CreateSshKey::default();
    let mut server = CreateServer::default();

    assert_eq!(key.run(&harness.ctx, &mut state).await, StepAction::Continue);
    assert_eq!(
        server.run(&harness.ctx, &mut state).await,
        StepAction::Continue
    );

    for _ in 0..2 {
        server.cleanup(&harness.ctx, &mut state).await;
        key.cleanup(&harness.ctx, &mut state).await;
    }

    let api = &harness.api;
    assert_eq!(api.count("delete_server:server-1"), 1);
    assert_eq!(api.count("delete_storage:storage-1"), 1);
    assert_eq!(api.count("delete_ip:ip-1"), 1);
    assert_eq!(api.count("delete_ssh_key:key-1"), 1);
}

/// Cleanup of steps that never ran is a no-op
#[tokio::test]
async fn test_cleanup_without_run() {
    let harness = Harness::new();
    let mut state = BuildState::new();

    for mut step in BuildStep::pipeline().into_iter().rev() {
        step.cleanup(&harness.ctx, &mut state).await;
    }

    assert!(harness.api.calls().is_empty());
    assert!(state.cleanup_errors().is_empty());
}

/// Cleanup failures are collected and do not stop later deletions
#[tokio::test]
async fn test_cleanup_errors_are_collected() {
    let harness = Harness::new();
    harness.api.fail_on("delete_server");
    harness.api.fail_on("stop_server");

    let state = run_pipeline(&harness).await;

    assert!(!state.has_error());
    let errors = state.cleanup_errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].resource, ResourceKind::Server);
    assert_eq!(errors[0].id, "server-1");
    assert!(errors[0].to_string().contains("Please destroy it manually"));

    assert!(harness.api.called("delete_storage:storage-1"));
    assert!(harness.api.called("delete_ip:ip-1"));
    assert!(harness.api.called("delete_ssh_key:key-1"));
}

/// Secondary storage and ISO image are wired up and removed
#[tokio::test]
async fn test_secondary_storage_and_iso() {
    let mut config = test_config();
    config.server.secondary_storage = true;
    config.server.iso_image_uuid = Some("iso-uuid".to_string());
    let harness = Harness::with_config(config);

    run_pipeline(&harness).await;

    let api = &harness.api;
    assert!(api.called("link_storage:server-1:storage-2:data"));
    assert!(api.called("attach_iso_image:server-1:iso-uuid"));
    assert!(api.called("delete_storage:storage-1"));
    assert!(api.called("delete_storage:storage-2"));
    assert!(api.called("create_snapshot:storage-1:test-template"));
}

/// The debug key is written owner-only
#[tokio::test]
async fn test_debug_key_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("gs_test.pem");
    let mut config = test_config();
    config.debug = true;
    config.debug_key_path = path.clone();
    let harness = Harness::with_config(config);

    let mut state = BuildState::new();
    let mut step = CreateSshKey::default();
    assert_eq!(step.run(&harness.ctx, &mut state).await, StepAction::Continue);

    let content = std::fs::read_to_string(&path).unwrap();
    assert!(!content.is_empty());
    assert_eq!(content, state.ssh_private_key().unwrap());

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}

/// An unwritable debug key path halts after the key was registered
#[tokio::test]
async fn test_debug_key_write_failure() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config();
    config.debug = true;
    config.debug_key_path = dir.path().join("missing").join("key.pem");
    let harness = Harness::with_config(config);

    let mut state = BuildState::new();
    let mut step = CreateSshKey::default();
    assert_eq!(step.run(&harness.ctx, &mut state).await, StepAction::Halt);
    assert!(matches!(state.error(), Some(BuildError::DebugKey { .. })));

    step.cleanup(&harness.ctx, &mut state).await;
    assert!(harness.api.called("delete_ssh_key:key-1"));
}

/// A failing provisioner halts before shutdown
#[tokio::test]
async fn test_provisioner_failure() {
    let mut config = test_config();
    config.provisioners = vec![
        imageforge_build::Provisioner::Shell("echo first".to_string()),
        imageforge_build::Provisioner::Shell("exit 7".to_string()),
        imageforge_build::Provisioner::Shell("echo never".to_string()),
    ];
    let harness = Harness::with(config, FakeCommunicator::failing_script("exit 7", 7));

    let state = run_pipeline(&harness).await;

    assert!(matches!(
        state.error(),
        Some(BuildError::Provision {
            source: CommError::ExitStatus(7),
            ..
        })
    ));
    assert_eq!(harness.communicator.scripts(), vec!["echo first", "exit 7"]);
    assert!(!harness.api.ops().contains(&"shutdown_server".to_string()));
    assert!(harness.api.called("delete_server:server-1"));
}

/// SSH never coming up halts with a connection error
#[tokio::test]
async fn test_connect_failure() {
    let harness = Harness::with(test_config(), FakeCommunicator::refusing());

    let state = run_pipeline(&harness).await;

    match state.error() {
        Some(BuildError::Connect { host, source }) => {
            assert_eq!(host, "203.0.113.10");
            assert!(matches!(source, CommError::Timeout(_)));
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert!(harness.communicator.scripts().is_empty());
    assert!(harness.api.called("delete_server:server-1"));
}

/// The configured SSH host wins over the assigned address
#[tokio::test]
async fn test_connect_uses_host_override() {
    let mut config = test_config();
    config.ssh.host = Some("bastion.example".to_string());
    config.ssh.username = "ubuntu".to_string();
    let harness = Harness::with_config(config);

    run_pipeline(&harness).await;

    let targets = harness.communicator.targets();
    assert_eq!(targets.len(), 1);
    assert_eq!(targets[0].host, "bastion.example");
    assert_eq!(targets[0].username, "ubuntu");
    assert!(targets[0].private_key.contains("PRIVATE KEY"));
}

/// A template that cannot be read back is left in place and no outputs are written
#[tokio::test]
async fn test_template_read_back_failure() {
    let harness = Harness::new();
    harness.api.fail_on("get_template");

    let state = run_pipeline(&harness).await;

    assert!(matches!(
        state.error(),
        Some(BuildError::Cloud { context: "Error reading template", .. })
    ));
    assert!(!harness.api.ops().contains(&"delete_template".to_string()));
    assert!(
        harness
            .ui
            .lines()
            .contains(&UiLine::Message("Template ID: template-1".to_string()))
    );
    assert!(state.snapshot_name().is_err());
    assert!(state.snapshot_image_id().is_err());
    assert!(state.regions().is_err());
}

/// A failed snapshot leaves no output keys behind
#[tokio::test]
async fn test_snapshot_failure() {
    let harness = Harness::new();
    harness.api.fail_on("create_snapshot");

    let state = run_pipeline(&harness).await;

    assert!(matches!(
        state.error(),
        Some(BuildError::Cloud { context: "Error creating snapshot", .. })
    ));
    assert!(!harness.api.ops().contains(&"create_template".to_string()));
    assert!(state.get_snapshot_name().is_none());
    assert!(harness.api.called("delete_storage:storage-1"));
}

/// CreateTemplate needs the boot storage from CreateServer
#[tokio::test]
async fn test_template_without_storage() {
    let harness = Harness::new();
    let mut state = BuildState::new();
    let mut step = CreateTemplate::default();

    assert_eq!(step.run(&harness.ctx, &mut state).await, StepAction::Halt);
    assert_eq!(
        state.error().map(|e| e.to_string()),
        Some("Build state has no 'storage_id'".to_string())
    );
    assert!(harness.api.calls().is_empty());
}

/// Every remote call of CreateServer is narrated before it is made
#[tokio::test]
async fn test_server_creation_is_narrated() {
    let mut config = test_config();
    config.server.secondary_storage = true;
    config.server.iso_image_uuid = Some("iso-uuid".to_string());
    let harness = Harness::with_config(config);

    run_pipeline(&harness).await;

    let says = says(&harness);
    let start = says
        .iter()
        .position(|s| s == "Looking up public network...")
        .unwrap();
    assert_eq!(
        says[start..start + 11],
        [
            "Looking up public network...",
            "Creating server...",
            "Creating bootable storage...",
            "Linking storage to server...",
            "Creating unbootable storage...",
            "Linking unbootable storage to server...",
            "Creating IP address...",
            "Linking IP address to server...",
            "Linking server to public network...",
            "Attaching ISO image...",
            "Starting server...",
        ]
    );
}

/// Cancelling while the server is being created still deletes the server
#[tokio::test]
async fn test_cancel_during_server_creation() {
    let harness = Harness::new();
    harness
        .api
        .delay_on("create_server", Duration::from_millis(200));

    // Cancel once the create call has reached the provider
    let trigger = harness.ctx.cancel.clone();
    let api = harness.api.clone();
    tokio::spawn(async move {
        while !api.called("create_server:builder") {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        trigger.cancel();
    });

    let mut state = BuildState::new();
    let mut runner = Runner::new(BuildStep::pipeline());
    let summary = runner.run(&harness.ctx, &mut state).await;

    assert!(summary.cancelled);
    assert_eq!(summary.executed, vec!["create-ssh-key", "create-server"]);
    assert!(matches!(state.error(), Some(BuildError::Cancelled)));
    assert_eq!(
        harness.api.calls(),
        vec![
            "create_ssh_key",
            "public_network",
            "create_server:builder",
            "stop_server:server-1",
            "delete_server:server-1",
            "delete_ssh_key:key-1",
        ]
    );
    assert_eq!(harness.ui.errors(), vec!["Build cancelled"]);
}

/// A server accepted by the provider but never confirmed is still deleted
#[tokio::test]
async fn test_unconfirmed_server_is_deleted() {
    let harness = Harness::new();
    harness.api.unconfirmed_on("create_server");

    let state = run_pipeline(&harness).await;

    match state.error() {
        Some(BuildError::Cloud { context, source }) => {
            assert_eq!(*context, "Error creating server");
            assert_eq!(source.object_id(), Some("server-1"));
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(harness.api.count("delete_server:server-1"), 1);
    assert!(!harness.api.ops().contains(&"create_storage".to_string()));
    assert!(harness.api.called("delete_ssh_key:key-1"));
}

/// Unconfirmed SSH keys and IP addresses are removed as well
#[tokio::test]
async fn test_unconfirmed_key_and_ip_are_deleted() {
    let harness = Harness::new();
    harness.api.unconfirmed_on("create_ssh_key");

    let state = run_pipeline(&harness).await;
    assert!(matches!(
        state.error(),
        Some(BuildError::Cloud {
            source: CloudError::Incomplete { .. },
            ..
        })
    ));
    assert_eq!(harness.api.count("delete_ssh_key:key-1"), 1);
    assert!(!harness.api.ops().contains(&"create_server".to_string()));

    let harness = Harness::new();
    harness.api.unconfirmed_on("create_ip");

    run_pipeline(&harness).await;
    assert_eq!(harness.api.count("delete_ip:ip-1"), 1);
    assert!(harness.api.called("delete_server:server-1"));
    assert!(harness.api.called("delete_storage:storage-1"));
}

/// A failure after the IP exists removes server, storage and IP in that order
#[tokio::test]
async fn test_late_server_failure_removes_everything() {
    for op in ["link_ip", "start_server"] {
        let harness = Harness::new();
        harness.api.fail_on(op);

        let state = run_pipeline(&harness).await;

        assert!(state.has_error(), "{op} should halt");
        assert!(harness.communicator.targets().is_empty());

        let api = &harness.api;
        let server = api.position("delete_server:server-1").unwrap();
        let storage = api.position("delete_storage:storage-1").unwrap();
        let ip = api.position("delete_ip:ip-1").unwrap();
        let key = api.position("delete_ssh_key:key-1").unwrap();
        assert!(server < storage, "{op}: server before storage");
        assert!(storage < ip, "{op}: storage before ip");
        assert!(ip < key, "{op}: ip before ssh key");
    }
}

/// A failed shutdown halts before any snapshot is taken
#[tokio::test]
async fn test_shutdown_failure() {
    let harness = Harness::new();
    harness.api.fail_on("shutdown_server");

    let state = run_pipeline(&harness).await;

    match state.error() {
        Some(BuildError::Cloud { context, .. }) => {
            assert_eq!(*context, "Error shutting down server")
        }
        other => panic!("unexpected error: {:?}", other),
    }
    let api = &harness.api;
    assert!(!api.ops().contains(&"create_snapshot".to_string()));
    assert!(!api.ops().contains(&"create_template".to_string()));
    assert!(api.called("delete_server:server-1"));
    assert!(state.get_snapshot_image_id().is_none());
}
