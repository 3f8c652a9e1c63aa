//! Notebook documents.
//!
//! Two layers live here:
//!
//! * [`Cell`] / [`CellKind`]: the format-neutral unit produced by parsing a
//!   percent-format script: a span of source text tagged `code` or `text`.
//! * [`Notebook`]: an on-disk Jupyter document, held as the `nbformat` crate's
//!   v4 model and written in the indented layout Jupyter itself uses.

use crate::error::{PymdError, Result};
use jupyter_protocol::media::MediaType;
use nbformat::v4;
use serde::Serialize;
use serde_json::{json, Value};
use std::path::Path;
use tracing::debug;

/// Major nbformat version written by this crate.
pub const NBFORMAT: u32 = 4;
/// Minor nbformat version written by this crate (cell ids are mandatory).
pub const NBFORMAT_MINOR: u32 = 5;

// ── Format-neutral cells ─────────────────────────────────────────────────

/// Kind of a parsed cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellKind {
    /// Executable code.
    Code,
    /// Prose, rendered as Markdown.
    Text,
}

impl std::fmt::Display for CellKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CellKind::Code => write!(f, "code"),
            CellKind::Text => write!(f, "markdown"),
        }
    }
}

/// A contiguous span of source text with its kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    pub kind: CellKind,
    pub source: String,
}

impl Cell {
    pub fn code(source: impl Into<String>) -> Self {
        Self {
            kind: CellKind::Code,
            source: source.into(),
        }
    }

    pub fn text(source: impl Into<String>) -> Self {
        Self {
            kind: CellKind::Text,
            source: source.into(),
        }
    }

    /// nbformat JSON for this cell. Ids are positional and therefore unique
    /// within one notebook.
    fn to_json(&self, index: usize) -> Value {
        let source: Vec<&str> = lines_inclusive(&self.source).collect();
        match self.kind {
            CellKind::Code => json!({
                "id": format!("cell-{}", index + 1),
                "cell_type": "code",
                "metadata": {},
                "execution_count": null,
                "source": source,
                "outputs": [],
            }),
            CellKind::Text => json!({
                "id": format!("cell-{}", index + 1),
                "cell_type": "markdown",
                "metadata": {},
                "source": source,
            }),
        }
    }
}

/// Split `text` into lines that keep their terminator: `\n`, `\r\n` or a
/// bare `\r`. A final line without terminator is yielded as-is.
pub fn lines_inclusive(text: &str) -> impl Iterator<Item = &str> {
    let mut rest = text;
    std::iter::from_fn(move || {
        if rest.is_empty() {
            return None;
        }
        let end = match rest.find(['\n', '\r']) {
            Some(i) if rest[i..].starts_with("\r\n") => i + 2,
            Some(i) => i + 1,
            None => rest.len(),
        };
        let (line, tail) = rest.split_at(end);
        rest = tail;
        Some(line)
    })
}

// ── nbformat v4 ──────────────────────────────────────────────────────────

/// A Jupyter notebook document.
#[derive(Debug, Clone)]
pub struct Notebook {
    inner: v4::Notebook,
}

impl Notebook {
    /// Build an unexecuted notebook from parsed cells, preserving order.
    pub fn from_cells(cells: &[Cell]) -> Result<Self> {
        let document = json!({
            "nbformat": NBFORMAT,
            "nbformat_minor": NBFORMAT_MINOR,
            "metadata": {},
            "cells": cells.iter().enumerate().map(|(i, c)| c.to_json(i)).collect::<Vec<_>>(),
        });
        let inner = serde_json::from_value(document)
            .map_err(|e| PymdError::Internal(format!("notebook construction failed: {e}")))?;
        Ok(Self { inner })
    }

    pub fn cells(&self) -> &[v4::Cell] {
        &self.inner.cells
    }

    /// The underlying nbformat document.
    pub fn as_nbformat(&self) -> &v4::Notebook {
        &self.inner
    }

    /// Language of the code cells, from `language_info`.
    pub fn language(&self) -> Option<&str> {
        self.inner
            .metadata
            .language_info
            .as_ref()
            .map(|li| li.name.as_str())
    }

    /// Parse a notebook from JSON text. `path` is only used for errors.
    pub fn from_json(content: &str, path: &Path) -> Result<Self> {
        let inner = serde_json::from_str(content).map_err(|source| {
            PymdError::MalformedNotebook {
                path: path.to_path_buf(),
                source,
            }
        })?;
        Ok(Self { inner })
    }

    /// Read and parse a notebook file.
    pub fn read(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| PymdError::ReadFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let notebook = Self::from_json(&content, path)?;
        debug!("Read {} cells from {}", notebook.cells().len(), path.display());
        Ok(notebook)
    }

    /// Serialise to the indented JSON layout Jupyter writes (1-space indent,
    /// trailing newline).
    pub fn to_json(&self) -> Result<String> {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b" ");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        self.inner
            .serialize(&mut ser)
            .map_err(|e| PymdError::Internal(format!("notebook serialisation failed: {e}")))?;
        let mut json = String::from_utf8(buf).map_err(|e| {
            PymdError::Internal(format!("notebook serialisation produced invalid UTF-8: {e}"))
        })?;
        json.push('\n');
        Ok(json)
    }

    /// Serialise and write atomically to `path`.
    pub fn write(&self, path: &Path) -> Result<()> {
        let json = self.to_json()?;
        crate::converter::write_output(path, json.as_bytes())?;
        debug!("Wrote {} cells to {}", self.cells().len(), path.display());
        Ok(())
    }
}

/// Full source text of a notebook cell.
pub fn cell_source(cell: &v4::Cell) -> String {
    match cell {
        v4::Cell::Code { source, .. }
        | v4::Cell::Markdown { source, .. }
        | v4::Cell::Raw { source, .. } => source.join(""),
    }
}

/// nbformat `cell_type` of a notebook cell.
pub fn cell_type(cell: &v4::Cell) -> &'static str {
    match cell {
        v4::Cell::Code { .. } => "code",
        v4::Cell::Markdown { .. } => "markdown",
        v4::Cell::Raw { .. } => "raw",
    }
}

/// Plain-text rendering of a code-cell output, if it has one.
///
/// Errors render as `ename: evalue`; tracebacks are left out because they
/// are full of ANSI colour codes.
pub fn output_text(output: &v4::Output) -> Option<String> {
    match output {
        v4::Output::Stream { text, .. } => Some(text.0.clone()),
        v4::Output::DisplayData(display) => plain_text(&display.data.content),
        v4::Output::ExecuteResult(result) => plain_text(&result.data.content),
        v4::Output::Error(error) => Some(format!("{}: {}", error.ename, error.evalue)),
    }
}

fn plain_text(content: &[MediaType]) -> Option<String> {
    content.iter().find_map(|media| match media {
        MediaType::Plain(text) => Some(text.clone()),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_notebook_serialises() {
        let nb = Notebook::from_cells(&[]).unwrap();
        let json = nb.to_json().unwrap();
        let v: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(v["cells"], json!([]));
        assert_eq!(v["nbformat"], 4);
        assert_eq!(v["nbformat_minor"], 5);
        assert!(v["metadata"].is_object());
    }

    #[test]
    fn code_cell_layout_matches_nbformat() {
        let nb = Notebook::from_cells(&[Cell::code("x = 1\nprint(x)\n")]).unwrap();
        let v: Value = serde_json::from_str(&nb.to_json().unwrap()).unwrap();
        let cell = &v["cells"][0];
        assert_eq!(cell["cell_type"], "code");
        assert_eq!(cell["source"], json!(["x = 1\n", "print(x)\n"]));
        assert_eq!(cell["outputs"], json!([]));
        assert!(cell["execution_count"].is_null());
        assert_eq!(cell["id"], "cell-1");
    }

    #[test]
    fn text_cells_become_markdown() {
        let nb = Notebook::from_cells(&[Cell::text("# Title\n"), Cell::code("1")]).unwrap();
        assert_eq!(cell_type(&nb.cells()[0]), "markdown");
        assert_eq!(cell_source(&nb.cells()[0]), "# Title\n");
        assert_eq!(cell_type(&nb.cells()[1]), "code");
    }

    #[test]
    fn cell_ids_are_unique() {
        let nb =
            Notebook::from_cells(&[Cell::code("a"), Cell::code("b"), Cell::text("c")]).unwrap();
        let v: Value = serde_json::from_str(&nb.to_json().unwrap()).unwrap();
        let ids: std::collections::HashSet<String> = v["cells"]
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c["id"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(ids.len(), 3);
    }

    #[test]
    fn reads_jupyter_written_notebook() {
        let json = r##"{
            "nbformat": 4,
            "nbformat_minor": 5,
            "metadata": {
                "kernelspec": {"name": "python3", "display_name": "Python 3", "language": "python"},
                "language_info": {"name": "python", "version": "3.11.4"},
                "title": "demo"
            },
            "cells": [
                {"id": "a1", "cell_type": "markdown", "metadata": {}, "source": ["# Hello\n", "World"]},
                {"id": "b2", "cell_type": "code", "metadata": {}, "execution_count": 1,
                 "source": ["print('hi')"],
                 "outputs": [
                    {"output_type": "stream", "name": "stdout", "text": ["hi\n"]},
                    {"output_type": "execute_result", "execution_count": 1,
                     "data": {"text/plain": "42"}, "metadata": {}},
                    {"output_type": "error", "ename": "ValueError", "evalue": "bad", "traceback": ["..."]}
                 ]},
                {"id": "c3", "cell_type": "raw", "metadata": {}, "source": ["raw text"]}
            ]
        }"##;
        let nb = Notebook::from_json(json, Path::new("demo.ipynb")).unwrap();
        assert_eq!(nb.language(), Some("python"));
        assert_eq!(nb.as_nbformat().metadata.additional["title"], "demo");
        assert_eq!(nb.cells().len(), 3);
        assert_eq!(cell_source(&nb.cells()[0]), "# Hello\nWorld");
        assert_eq!(cell_type(&nb.cells()[2]), "raw");

        let v4::Cell::Code { outputs, execution_count, .. } = &nb.cells()[1] else {
            panic!("expected code cell");
        };
        assert_eq!(*execution_count, Some(1));
        let texts: Vec<_> = outputs.iter().filter_map(output_text).collect();
        assert_eq!(texts, vec!["hi\n", "42", "ValueError: bad"]);
    }

    #[test]
    fn malformed_json_is_reported_with_path() {
        let err = Notebook::from_json("{not json", Path::new("broken.ipynb")).unwrap_err();
        match err {
            PymdError::MalformedNotebook { path, .. } => assert_eq!(path, Path::new("broken.ipynb")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn written_notebook_reads_back() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nb.ipynb");
        let cells = vec![Cell::code("print(1)\n\n"), Cell::text("# hi\n\n")];
        Notebook::from_cells(&cells).unwrap().write(&path).unwrap();

        let nb = Notebook::read(&path).unwrap();
        assert_eq!(nb.cells().len(), 2);
        assert_eq!(cell_source(&nb.cells()[0]), "print(1)\n\n");
        assert_eq!(cell_source(&nb.cells()[1]), "# hi\n\n");
        assert!(std::fs::read_to_string(&path).unwrap().ends_with("}\n"));
    }

    #[test]
    fn lines_keep_every_terminator_style() {
        let lines: Vec<&str> = lines_inclusive("a\nb\r\nc\rd").collect();
        assert_eq!(lines, vec!["a\n", "b\r\n", "c\r", "d"]);
        assert_eq!(lines_inclusive("").count(), 0);
        assert_eq!(lines_inclusive("\r\r\n").collect::<Vec<_>>(), vec!["\r", "\r\n"]);
    }
}
