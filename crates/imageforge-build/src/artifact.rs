use crate::error::Result;
use crate::state::BuildState;
use imageforge_cloud::CloudApi;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Identifies artifacts produced by this builder
pub const BUILDER_ID: &str = "imageforge.gridscale";

/// A template produced by a successful build
#[derive(Clone)]
pub struct Artifact {
    template_name: String,
    template_id: String,
    regions: Vec<String>,
    api: Arc<dyn CloudApi>,
}

impl Artifact {
    pub fn new(
        template_name: impl Into<String>,
        template_id: impl Into<String>,
        regions: Vec<String>,
        api: Arc<dyn CloudApi>,
    ) -> Self {
        Self {
            template_name: template_name.into(),
            template_id: template_id.into(),
            regions,
            api,
        }
    }

    /// Assemble the artifact from the outputs of a finished build
    ///
    /// A missing output after a run without errors is reported as
    /// [`BuildError::MissingState`](crate::BuildError::MissingState).
    pub fn from_state(state: &BuildState, api: Arc<dyn CloudApi>) -> Result<Self> {
        let template_id = state.snapshot_image_id()?;
        let template_name = state.snapshot_name()?;
        let regions = state.regions()?.to_vec();

        Ok(Self::new(template_name, template_id, regions, api))
    }

    pub fn builder_id(&self) -> &'static str {
        BUILDER_ID
    }

    /// Templates live in the cloud; there are no local files
    pub fn files(&self) -> Vec<PathBuf> {
        Vec::new()
    }

    /// `<regions joined by ','>:<template id>`
    pub fn id(&self) -> String {
        format!("{}:{}", self.regions.join(","), self.template_id)
    }

    pub fn template_name(&self) -> &str {
        &self.template_name
    }

    pub fn template_id(&self) -> &str {
        &self.template_id
    }

    pub fn regions(&self) -> &[String] {
        &self.regions
    }

    /// Delete the template
    pub async fn destroy(&self) -> imageforge_cloud::Result<()> {
        tracing::info!("Destroying template {}", self.template_id);
        self.api.delete_template(&self.template_id).await
    }
}

impl fmt::Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "A template was created: '{}' (ID: {}) in regions '{}'",
            self.template_name,
            self.template_id,
            self.regions.join(",")
        )
    }
}

impl fmt::Debug for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Artifact")
            .field("template_name", &self.template_name)
            .field("template_id", &self.template_id)
            .field("regions", &self.regions)
            .field("provider", &self.api.name())
            .finish()
    }
}
