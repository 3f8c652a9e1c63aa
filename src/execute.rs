//! Adapter around the external notebook-execution engine.
//!
//! Executing a notebook means starting a kernel, running every code cell, and
//! writing the outputs back into the document. That is Jupyter's job; this
//! module only drives `jupyter nbconvert --execute` and turns its exit status
//! into a [`PymdError`].
//!
//! The engine gets a per-cell timeout ([`ExecutionConfig::cell_timeout_secs`]).
//! The optional wall-clock cap ([`ExecutionConfig::process_timeout_secs`]) is
//! enforced here, on a current-thread tokio runtime, so a wedged kernel is
//! killed instead of hanging the build.

use crate::config::ExecutionConfig;
use crate::error::{PymdError, Result};
use std::ffi::OsString;
use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Runs notebooks through the external engine.
#[derive(Debug, Clone, Default)]
pub struct NotebookExecutor {
    config: ExecutionConfig,
}

impl NotebookExecutor {
    pub fn new(config: ExecutionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ExecutionConfig {
        &self.config
    }

    /// Arguments passed to the engine command for `path`.
    pub fn command_args(&self, path: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "nbconvert".into(),
            "--to".into(),
            "notebook".into(),
            "--execute".into(),
            "--inplace".into(),
            format!(
                "--ExecutePreprocessor.timeout={}",
                self.config.cell_timeout_secs
            )
            .into(),
        ];
        if let Some(ref kernel) = self.config.kernel_name {
            args.push(format!("--ExecutePreprocessor.kernel_name={kernel}").into());
        }
        args.push(path.as_os_str().to_os_string());
        args
    }

    /// Execute the notebook at `path`, replacing it with the executed version.
    ///
    /// Blocks until the engine exits. Must not be called from inside an async
    /// runtime.
    pub fn execute_in_place(&self, path: &Path) -> Result<()> {
        let start = Instant::now();
        info!("Executing notebook: {}", path.display());

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| PymdError::Internal(format!("Failed to create tokio runtime: {e}")))?;
        runtime.block_on(self.run_engine(path))?;

        info!(
            "Executed {} in {}ms",
            path.display(),
            start.elapsed().as_millis()
        );
        Ok(())
    }

    async fn run_engine(&self, path: &Path) -> Result<()> {
        let command = &self.config.jupyter_command;
        let args = self.command_args(path);
        debug!("Running {} {:?}", command, args);

        let mut cmd = tokio::process::Command::new(command);
        cmd.args(&args).stdin(Stdio::null()).kill_on_drop(true);

        let spawned = cmd.output();
        let output = match self.config.process_timeout_secs {
            Some(secs) => tokio::time::timeout(Duration::from_secs(secs), spawned)
                .await
                .map_err(|_| PymdError::ExecutionTimeout {
                    path: path.to_path_buf(),
                    secs,
                })?,
            None => spawned.await,
        }
        .map_err(|source| PymdError::EngineUnavailable {
            command: command.clone(),
            source,
        })?;

        if !output.status.success() {
            return Err(PymdError::ExecutionFailed {
                path: path.to_path_buf(),
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(())
    }
}
