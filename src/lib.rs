//! # pymd
//!
//! Turn percent-format Python scripts into Jupyter notebooks, and notebooks
//! into Markdown, through small converters that chain into pipelines.
//!
//! ## Why this crate?
//!
//! Documentation examples are easiest to maintain as plain `.py` files that
//! editors, linters and `git diff` understand. Readers want notebooks or
//! rendered pages. A percent-format script (`# %%` cell markers) carries
//! enough structure to produce both without hand-editing JSON.
//!
//! ## Pipeline Overview
//!
//! ```text
//! script.py
//!  │
//!  ├─ 1. Validate  existing regular file, accepted extension
//!  ├─ 2. Parse     `# %%` / `# %% [markdown]` markers → cells
//!  ├─ 3. Notebook  nbformat 4 document (optionally executed by Jupyter)
//!  ├─ 4. Render    notebook → Markdown with code and output fences
//!  └─ 5. Output    written atomically; intermediates removed
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pymd::{Converter, NotebookToMarkdown, ScriptToNotebook};
//! use std::path::Path;
//!
//! fn main() -> pymd::Result<()> {
//!     // One converter
//!     ScriptToNotebook::new().convert(Path::new("demo.py"), Path::new("demo.ipynb"))?;
//!
//!     // Two chained: script → notebook → Markdown, intermediate cleaned up
//!     let pipeline = ScriptToNotebook::new().then(NotebookToMarkdown::new());
//!     pipeline.convert(Path::new("demo.py"), Path::new("demo.md"))?;
//!     Ok(())
//! }
//! ```
//!
//! ## Executable documentation
//!
//! [`FencedBlockExecutor`] runs `` ```{python} `` blocks of a Markdown page
//! through [`PythonSessions`], one interpreter per page, and inlines their
//! output.
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pymd` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! pymd = { version = "0.3", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod converter;
pub mod converters;
pub mod docs;
pub mod error;
pub mod execute;
pub mod notebook;
pub mod pipeline;
pub mod progress;
pub mod session;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{DocsConfig, ExecutionConfig, ExecutionConfigBuilder, SessionConfig};
pub use converter::{combine, validate_input, BoundConverter, Converter, Stage};
pub use converters::markdown::render_markdown;
pub use converters::script::parse_script;
pub use converters::{NotebookToMarkdown, ScriptToNotebook};
pub use docs::FencedBlockExecutor;
pub use error::{PymdError, Result};
pub use execute::NotebookExecutor;
pub use notebook::{Cell, CellKind, Notebook};
pub use pipeline::Pipeline;
pub use progress::{NoopProgressCallback, PipelineProgressCallback, ProgressCallback};
pub use session::{ExecutionBackend, PythonSessions};
