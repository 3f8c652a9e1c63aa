//! Configuration types for notebook execution and documentation code blocks.
//!
//! Conversion itself has no knobs: a percent-format script maps to exactly one
//! notebook. The knobs live where an external process is involved:
//!
//! * [`ExecutionConfig`]: how to drive the external notebook-execution engine
//!   (command, kernel, timeouts). Built via [`ExecutionConfigBuilder`].
//! * [`SessionConfig`]: which interpreter backs the per-document code
//!   execution service.
//! * [`DocsConfig`]: whether and which fenced blocks in Markdown are executed.

use crate::error::PymdError;
use serde::{Deserialize, Serialize};

/// Default per-cell timeout handed to the notebook engine, in seconds.
pub const DEFAULT_CELL_TIMEOUT_SECS: u64 = 600;

/// Configuration for executing a notebook with the external engine.
///
/// # Example
/// ```rust
/// use pymd::ExecutionConfig;
///
/// let config = ExecutionConfig::builder()
///     .jupyter_command("/opt/conda/bin/jupyter")
///     .kernel_name("python3")
///     .cell_timeout_secs(120)
///     .build()
///     .unwrap();
/// assert_eq!(config.cell_timeout_secs, 120);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Executable that provides `nbconvert`. Default: `jupyter`.
    pub jupyter_command: String,

    /// Kernel to execute with. If None, the notebook's own kernelspec is used
    /// (and the engine's default when the notebook has none).
    pub kernel_name: Option<String>,

    /// Per-cell timeout passed to the engine. Default: 600.
    pub cell_timeout_secs: u64,

    /// Wall-clock cap on the whole engine process. Default: None (unbounded).
    ///
    /// The per-cell timeout does not cover kernel start-up or a wedged
    /// engine; set this in CI to guarantee the build eventually finishes.
    pub process_timeout_secs: Option<u64>,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            jupyter_command: "jupyter".to_string(),
            kernel_name: None,
            cell_timeout_secs: DEFAULT_CELL_TIMEOUT_SECS,
            process_timeout_secs: None,
        }
    }
}

impl ExecutionConfig {
    /// Create a new builder for `ExecutionConfig`.
    pub fn builder() -> ExecutionConfigBuilder {
        ExecutionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ExecutionConfig`].
#[derive(Debug)]
pub struct ExecutionConfigBuilder {
    config: ExecutionConfig,
}

impl ExecutionConfigBuilder {
    pub fn jupyter_command(mut self, command: impl Into<String>) -> Self {
        self.config.jupyter_command = command.into();
        self
    }

    pub fn kernel_name(mut self, kernel: impl Into<String>) -> Self {
        self.config.kernel_name = Some(kernel.into());
        self
    }

    pub fn cell_timeout_secs(mut self, secs: u64) -> Self {
        self.config.cell_timeout_secs = secs;
        self
    }

    pub fn process_timeout_secs(mut self, secs: u64) -> Self {
        self.config.process_timeout_secs = Some(secs);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExecutionConfig, PymdError> {
        let c = &self.config;
        if c.jupyter_command.trim().is_empty() {
            return Err(PymdError::InvalidConfig(
                "Jupyter command must not be empty".into(),
            ));
        }
        if c.cell_timeout_secs == 0 {
            return Err(PymdError::InvalidConfig(
                "Cell timeout must be ≥ 1 second".into(),
            ));
        }
        if c.process_timeout_secs == Some(0) {
            return Err(PymdError::InvalidConfig(
                "Process timeout must be ≥ 1 second".into(),
            ));
        }
        Ok(self.config)
    }
}

/// Configuration for the per-document code execution service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Python interpreter to spawn, one process per document. Default: `python3`.
    pub python: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            python: "python3".to_string(),
        }
    }
}

/// Configuration for executing fenced code blocks in Markdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocsConfig {
    /// When false, documents pass through untouched. Default: true.
    pub enabled: bool,

    /// Language tag that marks an executable block, written as
    /// `` ```{python} ``. Rendered blocks are tagged `` ```python ``.
    pub language: String,
}

impl Default for DocsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            language: "python".to_string(),
        }
    }
}
