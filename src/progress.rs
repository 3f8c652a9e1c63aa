//! Progress-callback trait for per-stage pipeline events.
//!
//! Attach an [`Arc<dyn PipelineProgressCallback>`] with
//! [`crate::pipeline::Pipeline::with_progress`] to be told when each stage of
//! a multi-stage conversion starts and finishes. Stages run one after the
//! other, so events for a single `convert` call arrive strictly in order.
//!
//! # Example
//!
//! ```rust
//! use pymd::{NotebookToMarkdown, PipelineProgressCallback, ScriptToNotebook, Converter};
//! use std::sync::Arc;
//!
//! struct Printer;
//!
//! impl PipelineProgressCallback for Printer {
//!     fn on_stage_complete(&self, index: usize, total: usize, name: &str) {
//!         eprintln!("stage {}/{} done: {}", index + 1, total, name);
//!     }
//! }
//!
//! let pipeline = ScriptToNotebook::new()
//!     .then(NotebookToMarkdown::new())
//!     .with_progress(Arc::new(Printer));
//! assert_eq!(pipeline.len(), 2);
//! ```

use std::sync::Arc;

/// Called by a [`crate::pipeline::Pipeline`] as it runs each stage.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. `index` is 0-based; `total` is the stage count.
pub trait PipelineProgressCallback: Send + Sync {
    /// Called once, after the scratch directory exists and before stage 0.
    fn on_pipeline_start(&self, total_stages: usize) {
        let _ = total_stages;
    }

    /// Called just before a stage's `convert`.
    fn on_stage_start(&self, index: usize, total_stages: usize, name: &str) {
        let _ = (index, total_stages, name);
    }

    /// Called when a stage's `convert` returned `Ok`.
    fn on_stage_complete(&self, index: usize, total_stages: usize, name: &str) {
        let _ = (index, total_stages, name);
    }

    /// Called when a stage failed. The error is still returned to the caller
    /// unchanged; this is a notification only.
    fn on_stage_error(&self, index: usize, total_stages: usize, name: &str, error: &str) {
        let _ = (index, total_stages, name, error);
    }

    /// Called once after the last stage wrote the final output.
    fn on_pipeline_complete(&self, total_stages: usize) {
        let _ = total_stages;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl PipelineProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in a pipeline.
pub type ProgressCallback = Arc<dyn PipelineProgressCallback>;
