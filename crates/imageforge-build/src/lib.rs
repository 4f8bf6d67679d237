//! imageforge build pipeline
//!
//! Turns a disposable gridscale server into a reusable template. A build
//! is a saga: an ordered list of steps sharing one [`BuildState`]. The
//! first failing step halts the pipeline, after which every step gets a
//! chance to remove what it created, in reverse order.
//!
//! ```text
//! Builder ──▶ Runner ──▶ CreateSshKey ─▶ CreateServer ─▶ Connect
//!                          ─▶ Provision ─▶ Shutdown ─▶ CreateTemplate
//!                                                          │
//!              Artifact ◀── BuildState ◀───────────────────┘
//! ```
//!
//! Cloud access goes through [`imageforge_cloud::CloudApi`], remote
//! execution through [`Communicator`], and progress output through [`Ui`].

pub mod artifact;
pub mod builder;
pub mod communicator;
pub mod config;
pub mod error;
pub mod keys;
pub mod runner;
pub mod state;
pub mod step;
pub mod steps;
pub mod ui;

pub use artifact::{Artifact, BUILDER_ID};
pub use builder::Builder;
pub use communicator::{CommandOutput, Communicator, RemoteSession, SshCommunicator, SshTarget};
pub use config::{BuildConfig, Provisioner, load_config, parse_config};
pub use error::{BuildError, CleanupError, CommError, ConfigError, ResourceKind, Result};
pub use runner::{RunSummary, Runner};
pub use state::{BuildState, StateKey};
pub use step::{BuildContext, Step, StepAction};
pub use steps::BuildStep;
pub use ui::{ConsoleUi, RecordingUi, Ui, UiLine};
