//! Error type for the pymd library.
//!
//! Every failure is fatal for the call that raised it: there is no partial
//! success to report, so one enum covers the whole crate. Variants are grouped
//! by the concern that raises them:
//!
//! * **Input**: the converter refused the file before any side effect
//!   ([`PymdError::FileNotFound`], [`PymdError::InvalidFormat`]).
//! * **Chain**: a pipeline could not be assembled.
//! * **Transform**: the format-specific step failed (malformed notebook,
//!   external engine failure, output write failure).
//! * **Session**: the code execution service lost its interpreter.
//!
//! Pipelines add no translation: a failure in stage *i* surfaces as exactly
//! the variant that stage would return when called directly.

use std::path::PathBuf;
use thiserror::Error;

/// Convenience alias used across the crate.
pub type Result<T> = std::result::Result<T, PymdError>;

/// All errors returned by the pymd library.
#[derive(Debug, Error)]
pub enum PymdError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input path does not reference an existing regular file.
    #[error("File not found: '{path}'\nCheck the path exists and is a regular file.")]
    FileNotFound { path: PathBuf },

    /// Input path's extension is not one the converter accepts.
    #[error("Invalid file extension: '{path}' (expected one of: {})", .expected.join(", "))]
    InvalidFormat {
        path: PathBuf,
        expected: Vec<String>,
    },

    // ── Chain errors ──────────────────────────────────────────────────────
    /// A pipeline could not be assembled from the given stages.
    #[error("Invalid converter chain: {0}")]
    InvalidChain(String),

    // ── Notebook errors ───────────────────────────────────────────────────
    /// Could not read the input file.
    #[error("Failed to read '{path}': {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Input parsed as JSON but is not a valid nbformat v4 document.
    #[error("Malformed notebook '{path}': {source}")]
    MalformedNotebook {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    // ── Execution errors ──────────────────────────────────────────────────
    /// The notebook-execution engine could not be started.
    #[error("Failed to start notebook engine '{command}': {source}\nIs Jupyter installed? Try: pip install nbconvert ipykernel")]
    EngineUnavailable {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The engine ran but reported a failure (usually a cell raised).
    #[error("Notebook execution failed for '{path}' (exit code {code:?}):\n{stderr}")]
    ExecutionFailed {
        path: PathBuf,
        code: Option<i32>,
        stderr: String,
    },

    /// The engine exceeded the configured wall-clock limit and was killed.
    #[error("Notebook execution timed out after {secs}s for '{path}'\nIncrease --process-timeout.")]
    ExecutionTimeout { path: PathBuf, secs: u64 },

    // ── Session errors ────────────────────────────────────────────────────
    /// The Python interpreter backing a session could not be started.
    #[error("Failed to start interpreter '{command}': {source}")]
    InterpreterUnavailable {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// A running session stopped answering or answered garbage.
    #[error("Execution session for '{document}' failed: {detail}")]
    SessionFailed { document: PathBuf, detail: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_format_lists_expected_extensions() {
        let e = PymdError::InvalidFormat {
            path: PathBuf::from("notes.txt"),
            expected: vec![".py".into(), ".ipy".into()],
        };
        let msg = e.to_string();
        assert!(msg.contains("notes.txt"), "got: {msg}");
        assert!(msg.contains(".py, .ipy"), "got: {msg}");
    }

    #[test]
    fn file_not_found_display() {
        let e = PymdError::FileNotFound {
            path: PathBuf::from("/nope/missing.py"),
        };
        assert!(e.to_string().contains("/nope/missing.py"));
    }

    #[test]
    fn execution_timeout_display() {
        let e = PymdError::ExecutionTimeout {
            path: PathBuf::from("slow.ipynb"),
            secs: 600,
        };
        assert!(e.to_string().contains("600s"));
        assert!(e.to_string().contains("slow.ipynb"));
    }

    #[test]
    fn output_write_failed_keeps_source() {
        use std::error::Error as _;
        let e = PymdError::OutputWriteFailed {
            path: PathBuf::from("out.md"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(e.source().is_some());
        assert!(e.to_string().contains("denied"));
    }
}
