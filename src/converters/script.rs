//! Percent-format script → Jupyter notebook.
//!
//! A "percent-format" script is a plain Python file whose cells are delimited
//! by comment lines starting with `# %%`:
//!
//! ```text
//! # %%
//! print("code cell")
//!
//! # %% [markdown]
//! # A markdown cell.
//! ```
//!
//! `# %% [markdown]` opens a markdown cell, any other `# %%` line opens a code
//! cell. Marker lines themselves never end up in a cell.

use crate::config::ExecutionConfig;
use crate::converter::{Converter, Stage};
use crate::error::{PymdError, Result};
use crate::execute::NotebookExecutor;
use crate::notebook::{lines_inclusive, Cell, CellKind, Notebook};
use std::path::Path;
use tracing::{debug, info};

/// Prefix that marks a cell boundary (after trimming the line).
pub const CELL_MARKER: &str = "# %%";
/// Prefix that marks a markdown cell boundary.
pub const MARKDOWN_MARKER: &str = "# %% [markdown]";

/// Converts `.py` / `.ipy` percent-format scripts into `.ipynb` notebooks.
///
/// `convert` never runs code. Call [`ScriptToNotebook::execute`] on the
/// written notebook when outputs are needed.
#[derive(Debug, Clone, Default)]
pub struct ScriptToNotebook {
    executor: NotebookExecutor,
}

impl ScriptToNotebook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `config` for [`ScriptToNotebook::execute`].
    pub fn with_execution(config: ExecutionConfig) -> Self {
        Self {
            executor: NotebookExecutor::new(config),
        }
    }

    /// Run the notebook at `notebook_path` through the execution engine,
    /// storing outputs in place.
    pub fn execute(&self, notebook_path: &Path) -> Result<()> {
        self.executor.execute_in_place(notebook_path)
    }
}

impl Converter for ScriptToNotebook {
    fn name(&self) -> &str {
        "script-to-notebook"
    }

    fn input_extensions(&self) -> &[&str] {
        &[".py", ".ipy"]
    }

    fn output_extension(&self) -> &str {
        ".ipynb"
    }

    fn transform(&self, input: &Path, output: &Path) -> Result<()> {
        info!("Converting script {} → {}", input.display(), output.display());
        let source = std::fs::read_to_string(input).map_err(|source| PymdError::ReadFailed {
            path: input.to_path_buf(),
            source,
        })?;

        let cells = parse_script(&source);
        debug!("Parsed {} cells from {}", cells.len(), input.display());

        Notebook::from_cells(&cells)?.write(output)
    }
}

impl From<ScriptToNotebook> for Stage {
    fn from(converter: ScriptToNotebook) -> Self {
        Stage::single(converter)
    }
}

/// Split a percent-format script into cells.
///
/// Single pass over the lines, keeping line terminators (`\n`, `\r\n` or a
/// bare `\r`). Lines before the
/// first marker are buffered and belong to whatever cell the first marker
/// opens; with no marker at all the whole file is one code cell. Empty spans
/// (adjacent markers, an empty file) produce no cell.
pub fn parse_script(source: &str) -> Vec<Cell> {
    let mut cells = Vec::new();
    let mut buffer = String::new();
    let mut kind = CellKind::Code;
    let mut in_cell = false;

    for line in lines_inclusive(source) {
        let trimmed = line.trim();

        if trimmed.starts_with(CELL_MARKER) {
            if in_cell && !buffer.is_empty() {
                cells.push(Cell {
                    kind,
                    source: std::mem::take(&mut buffer),
                });
            }
            kind = if trimmed.starts_with(MARKDOWN_MARKER) {
                CellKind::Text
            } else {
                CellKind::Code
            };
            in_cell = true;
        } else {
            buffer.push_str(line);
        }
    }

    if !buffer.is_empty() {
        cells.push(Cell {
            kind,
            source: buffer,
        });
    }

    cells
}
