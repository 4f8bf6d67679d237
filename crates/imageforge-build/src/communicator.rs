//! Remote connection layer
//!
//! The pipeline only sees the [`Communicator`] and [`RemoteSession`] traits.
//! [`SshCommunicator`] is the stock implementation and drives the system
//! `ssh` client.

use crate::error::CommError;
use async_trait::async_trait;
use std::io::Write;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tempfile::NamedTempFile;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::{Instant, sleep};

pub type CommResult<T> = std::result::Result<T, CommError>;

/// Where and how to reach the build server
#[derive(Debug, Clone)]
pub struct SshTarget {
    pub host: String,
    pub port: u16,
    pub username: String,
    /// PEM-encoded private key
    pub private_key: String,
    pub timeout: Duration,
}

/// Output of one remote command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// `None` when the command was killed by a signal
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Turn a non-zero exit into an error
    pub fn check(self) -> CommResult<Self> {
        match self.exit_code {
            Some(0) => Ok(self),
            Some(code) => Err(CommError::ExitStatus(code)),
            None => Err(CommError::Terminated),
        }
    }
}

#[async_trait]
pub trait Communicator: Send + Sync {
    /// Wait until a session can be established, bounded by `target.timeout`
    async fn connect(&self, target: &SshTarget) -> CommResult<Box<dyn RemoteSession>>;
}

#[async_trait]
pub trait RemoteSession: Send + Sync {
    /// Run a shell script on the remote host
    async fn execute(&self, script: &str) -> CommResult<CommandOutput>;
}

/// Communicator backed by the `ssh` binary
#[derive(Debug, Clone)]
pub struct SshCommunicator {
    program: String,
    probe_interval: Duration,
}

impl Default for SshCommunicator {
    fn default() -> Self {
        Self {
            program: "ssh".to_string(),
            probe_interval: Duration::from_secs(5),
        }
    }
}

impl SshCommunicator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    pub fn with_probe_interval(mut self, interval: Duration) -> Self {
        self.probe_interval = interval;
        self
    }

    async fn probe(&self, key_path: &Path, target: &SshTarget, connect_timeout: u64) -> bool {
        let status = Command::new(&self.program)
            .args(ssh_args(key_path, target, connect_timeout))
            .arg("true")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .status()
            .await;

        match status {
            Ok(status) => status.success(),
            Err(e) => {
                tracing::debug!("ssh probe failed to start: {}", e);
                false
            }
        }
    }
}

#[async_trait]
impl Communicator for SshCommunicator {
    async fn connect(&self, target: &SshTarget) -> CommResult<Box<dyn RemoteSession>> {
        // NamedTempFile is created owner-only
        let mut key_file = NamedTempFile::new()?;
        key_file.write_all(target.private_key.as_bytes())?;
        key_file.flush()?;

        let deadline = Instant::now() + target.timeout;
        let connect_timeout = target.timeout.as_secs().clamp(1, 30);
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            tracing::debug!(
                "Probing SSH on {}:{} (attempt {})",
                target.host,
                target.port,
                attempt
            );

            if self.probe(key_file.path(), target, connect_timeout).await {
                tracing::info!("SSH is available on {}", target.host);
                return Ok(Box::new(SshSession {
                    program: self.program.clone(),
                    target: target.clone(),
                    connect_timeout,
                    key_file,
                }));
            }

            if Instant::now() + self.probe_interval > deadline {
                return Err(CommError::Timeout(target.timeout));
            }
            sleep(self.probe_interval).await;
        }
    }
}

/// Established connection; the key file lives as long as the session
pub struct SshSession {
    program: String,
    target: SshTarget,
    connect_timeout: u64,
    key_file: NamedTempFile,
}

#[async_trait]
impl RemoteSession for SshSession {
    async fn execute(&self, script: &str) -> CommResult<CommandOutput> {
        let mut child = Command::new(&self.program)
            .args(ssh_args(self.key_file.path(), &self.target, self.connect_timeout))
            .args(["sh", "-s"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let mut stdin = child.stdin.take().ok_or_else(|| {
            CommError::Io(std::io::Error::other("ssh stdin is not available"))
        })?;
        // The remote side may exit before reading the whole script
        match stdin.write_all(script.as_bytes()).await {
            Ok(()) => stdin.shutdown().await.or_else(ignore_broken_pipe)?,
            Err(e) => ignore_broken_pipe(e)?,
        }
        drop(stdin);

        let output = child.wait_with_output().await?;
        Ok(CommandOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

fn ignore_broken_pipe(e: std::io::Error) -> std::io::Result<()> {
    match e.kind() {
        std::io::ErrorKind::BrokenPipe => Ok(()),
        _ => Err(e),
    }
}

fn ssh_args(key_path: &Path, target: &SshTarget, connect_timeout: u64) -> Vec<String> {
    vec![
        "-i".to_string(),
        key_path.display().to_string(),
        "-p".to_string(),
        target.port.to_string(),
        "-o".to_string(),
        "BatchMode=yes".to_string(),
        "-o".to_string(),
        "StrictHostKeyChecking=no".to_string(),
        "-o".to_string(),
        "UserKnownHostsFile=/dev/null".to_string(),
        "-o".to_string(),
        "LogLevel=ERROR".to_string(),
        "-o".to_string(),
        format!("ConnectTimeout={}", connect_timeout),
        format!("{}@{}", target.username, target.host),
    ]
}
