pub mod clusters;
pub mod merge;
pub mod profile;
pub mod tracks;

use crate::config::ProbeConfig;
use crate::domain::WorkflowResult;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowArtifact {
    pub path: PathBuf,
}

impl WorkflowArtifact {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WorkflowOutcome {
    pub artifacts: Vec<WorkflowArtifact>,
    /// Human-readable summary lines for the terminal.
    pub summary: Vec<String>,
}

/// A batch job that reads its inputs, runs to completion and writes artifacts.
pub trait Workflow {
    fn name(&self) -> &'static str;

    fn execute(&self, config: &ProbeConfig) -> WorkflowResult<WorkflowOutcome>;
}

#[cfg(test)]
mod tests {
    use super::{Workflow, WorkflowArtifact, WorkflowOutcome};
    use crate::config::ProbeConfig;
    use crate::domain::{ProbeError, ProbeErrorCategory, WorkflowResult};

    struct FailingWorkflow;

    impl Workflow for FailingWorkflow {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn execute(&self, _config: &ProbeConfig) -> WorkflowResult<WorkflowOutcome> {
            Err(ProbeError::internal("INTERNAL.WORKFLOW", "workflow failed"))
        }
    }

    #[test]
    fn workflow_trait_uses_shared_error_types() {
        let error = FailingWorkflow
            .execute(&ProbeConfig::default())
            .expect_err("workflow should fail");
        assert_eq!(error.category(), ProbeErrorCategory::InternalError);
        assert_eq!(error.exit_code(), 5);
        assert_eq!(FailingWorkflow.name(), "failing");
    }

    #[test]
    fn artifacts_keep_their_paths() {
        let artifact = WorkflowArtifact::new("out/combined_data.txt");
        assert_eq!(artifact.path.to_str(), Some("out/combined_data.txt"));
    }
}
