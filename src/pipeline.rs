//! Sequential pipeline: several converters presented as one.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ stage 0 ──▶ tmp/temp_0.ipynb ──▶ stage 1 ──▶ … ──▶ stage n-1 ──▶ output
//! ```
//!
//! Intermediate files live in one scratch directory created per `convert`
//! call and removed when the call returns, on success and on failure alike.
//! Each stage validates its own input, so an incompatible chain fails inside
//! the stage that cannot read its predecessor's output, after the
//! predecessor already ran. Errors pass through untouched.

use crate::converter::{combine, Converter, Stage};
use crate::error::{PymdError, Result};
use crate::progress::ProgressCallback;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use tracing::{debug, info};

/// An ordered, non-empty list of converters run one after the other.
///
/// Built with [`Converter::then`], [`combine`], or [`Pipeline::new`].
#[derive(Clone)]
pub struct Pipeline {
    stages: Vec<Arc<dyn Converter>>,
    progress: Option<ProgressCallback>,
}

impl Pipeline {
    /// Build a pipeline from an explicit stage list.
    ///
    /// # Errors
    /// [`PymdError::InvalidChain`] when `stages` is empty.
    pub fn new(stages: Vec<Arc<dyn Converter>>) -> Result<Self> {
        if stages.is_empty() {
            return Err(PymdError::InvalidChain(
                "a pipeline needs at least one stage".into(),
            ));
        }
        Ok(Self::from_parts(stages, None))
    }

    /// Callers guarantee `stages` is non-empty.
    pub(crate) fn from_parts(
        stages: Vec<Arc<dyn Converter>>,
        progress: Option<ProgressCallback>,
    ) -> Self {
        debug_assert!(!stages.is_empty());
        Self { stages, progress }
    }

    pub(crate) fn into_parts(self) -> (Vec<Arc<dyn Converter>>, Option<ProgressCallback>) {
        (self.stages, self.progress)
    }

    /// Report stage events to `callback`.
    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    pub fn stages(&self) -> &[Arc<dyn Converter>] {
        &self.stages
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Always false; kept for the `len`/`is_empty` pair.
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    fn first(&self) -> &dyn Converter {
        self.stages[0].as_ref()
    }

    fn last(&self) -> &dyn Converter {
        self.stages[self.stages.len() - 1].as_ref()
    }

    /// Scratch path for the output of the non-last stage `index`.
    fn intermediate_path(scratch: &Path, index: usize, stage: &dyn Converter) -> PathBuf {
        scratch.join(format!("temp_{index}{}", stage.output_extension()))
    }

    fn run(&self, input: &Path, output: &Path) -> Result<()> {
        let scratch = TempDir::new()
            .map_err(|e| PymdError::Internal(format!("Failed to create temp dir: {e}")))?;
        debug!("Pipeline scratch dir: {}", scratch.path().display());

        let total = self.stages.len();
        if let Some(ref cb) = self.progress {
            cb.on_pipeline_start(total);
        }

        let mut current: PathBuf = input.to_path_buf();
        for (index, stage) in self.stages.iter().enumerate() {
            let target = if index == total - 1 {
                output.to_path_buf()
            } else {
                Self::intermediate_path(scratch.path(), index, stage.as_ref())
            };

            debug!(
                "Stage {}/{} ({}): {} → {}",
                index + 1,
                total,
                stage.name(),
                current.display(),
                target.display()
            );
            if let Some(ref cb) = self.progress {
                cb.on_stage_start(index, total, stage.name());
            }

            if let Err(e) = stage.convert(&current, &target) {
                if let Some(ref cb) = self.progress {
                    cb.on_stage_error(index, total, stage.name(), &e.to_string());
                }
                return Err(e);
            }

            if let Some(ref cb) = self.progress {
                cb.on_stage_complete(index, total, stage.name());
            }
            current = target;
        }

        if let Some(ref cb) = self.progress {
            cb.on_pipeline_complete(total);
        }
        info!("Pipeline finished: {} stages → {}", total, output.display());
        Ok(())
        // `scratch` dropped here (and on every early return above)
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.stages.iter().map(|s| s.name()).collect();
        f.debug_struct("Pipeline")
            .field("stages", &names)
            .field("progress", &self.progress.as_ref().map(|_| "<dyn PipelineProgressCallback>"))
            .finish()
    }
}

impl Converter for Pipeline {
    fn name(&self) -> &str {
        "pipeline"
    }

    /// Accepted inputs are the first stage's.
    fn input_extensions(&self) -> &[&str] {
        self.first().input_extensions()
    }

    /// Output is the last stage's.
    fn output_extension(&self) -> &str {
        self.last().output_extension()
    }

    fn transform(&self, input: &Path, output: &Path) -> Result<()> {
        self.run(input, output)
    }

    /// Delegates to the first stage.
    fn validate(&self, input: &Path) -> Result<()> {
        self.first().validate(input)
    }

    /// Runs the stages; stage 0 validates `input` itself.
    fn convert(&self, input: &Path, output: &Path) -> Result<()> {
        self.run(input, output)
    }

    fn then(self, next: impl Into<Stage>) -> Pipeline {
        combine(self, next)
    }
}
