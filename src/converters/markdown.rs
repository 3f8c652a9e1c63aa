//! Jupyter notebook → Markdown.
//!
//! Markdown and raw cells are copied verbatim. Code cells become fenced blocks
//! tagged with the notebook language, followed by an untagged fenced block
//! holding their plain-text outputs. Optionally the notebook is executed
//! first, on a scratch copy, so the input file is never modified.

use crate::config::ExecutionConfig;
use crate::converter::{write_output, Converter, Stage};
use crate::error::{PymdError, Result};
use crate::execute::NotebookExecutor;
use crate::notebook::{cell_source, output_text, Notebook};
use nbformat::v4;
use std::path::Path;
use tempfile::TempDir;
use tracing::{debug, info};

/// Fence language used when the notebook does not declare one.
const DEFAULT_LANGUAGE: &str = "python";

/// Converts `.ipynb` notebooks into `.md` documents.
#[derive(Debug, Clone)]
pub struct NotebookToMarkdown {
    execute: bool,
    include_outputs: bool,
    executor: NotebookExecutor,
}

impl Default for NotebookToMarkdown {
    fn default() -> Self {
        Self {
            execute: false,
            include_outputs: true,
            executor: NotebookExecutor::default(),
        }
    }
}

impl NotebookToMarkdown {
    /// Render as-is, without executing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Execute the notebook before rendering, using `config`.
    pub fn executed(config: ExecutionConfig) -> Self {
        Self {
            execute: true,
            executor: NotebookExecutor::new(config),
            ..Self::default()
        }
    }

    /// Whether to execute before rendering.
    pub fn execute(mut self, v: bool) -> Self {
        self.execute = v;
        self
    }

    /// Whether to render cell outputs. Default: true.
    pub fn include_outputs(mut self, v: bool) -> Self {
        self.include_outputs = v;
        self
    }

    /// Execute a scratch copy of `input` and read the result back.
    fn execute_copy(&self, input: &Path) -> Result<Notebook> {
        let scratch = TempDir::new()
            .map_err(|e| PymdError::Internal(format!("Failed to create temp dir: {e}")))?;
        let file_name = input
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "notebook.ipynb".into());
        let copy = scratch.path().join(file_name);

        std::fs::copy(input, &copy).map_err(|source| PymdError::ReadFailed {
            path: input.to_path_buf(),
            source,
        })?;
        self.executor.execute_in_place(&copy)?;
        Notebook::read(&copy)
    }
}

impl Converter for NotebookToMarkdown {
    fn name(&self) -> &str {
        "notebook-to-markdown"
    }

    fn input_extensions(&self) -> &[&str] {
        &[".ipynb"]
    }

    fn output_extension(&self) -> &str {
        ".md"
    }

    fn transform(&self, input: &Path, output: &Path) -> Result<()> {
        info!(
            "Rendering notebook {} → {} (execute: {})",
            input.display(),
            output.display(),
            self.execute
        );

        // Parse the input first so a broken file fails before any kernel
        // is started.
        let mut notebook = Notebook::read(input)?;
        if self.execute {
            notebook = self.execute_copy(input)?;
        }

        let markdown = render_markdown(&notebook, self.include_outputs);
        debug!("Rendered {} bytes of Markdown", markdown.len());
        write_output(output, markdown.as_bytes())
    }
}

impl From<NotebookToMarkdown> for Stage {
    fn from(converter: NotebookToMarkdown) -> Self {
        Stage::single(converter)
    }
}

/// Render a notebook as Markdown.
pub fn render_markdown(notebook: &Notebook, include_outputs: bool) -> String {
    let language = notebook.language().unwrap_or(DEFAULT_LANGUAGE);
    let mut blocks: Vec<String> = Vec::with_capacity(notebook.cells().len() * 2);

    for cell in notebook.cells() {
        match cell {
            v4::Cell::Markdown { .. } | v4::Cell::Raw { .. } => {
                let source = cell_source(cell);
                let text = source.trim_end();
                if !text.is_empty() {
                    blocks.push(text.to_string());
                }
            }
            v4::Cell::Code { outputs, .. } => {
                let source = cell_source(cell);
                let code = source.trim_end_matches(['\n', '\r']);
                if !code.trim().is_empty() {
                    blocks.push(fenced(language, code));
                }
                if include_outputs {
                    if let Some(text) = outputs_text(outputs) {
                        blocks.push(fenced("", &text));
                    }
                }
            }
        }
    }

    clean_markdown(&blocks.join("\n\n"))
}

/// Wrap `content` in a backtick fence longer than any backtick run inside it.
fn fenced(info: &str, content: &str) -> String {
    let longest = content
        .split(|c: char| c != '`')
        .map(str::len)
        .max()
        .unwrap_or(0);
    let fence = "`".repeat(longest.max(2) + 1);
    format!("{fence}{info}\n{content}\n{fence}")
}

/// Plain-text outputs of one code cell, one output per line group.
fn outputs_text(outputs: &[v4::Output]) -> Option<String> {
    let parts: Vec<String> = outputs
        .iter()
        .filter_map(output_text)
        .map(|t| t.trim_end_matches(['\n', '\r']).to_string())
        .filter(|t| !t.is_empty())
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("\n"))
    }
}

// ── Cleanup ──────────────────────────────────────────────────────────────
//
// Only rules that cannot change the meaning of code blocks: notebooks carry
// code verbatim, so whitespace inside fences must survive.

fn clean_markdown(input: &str) -> String {
    let s = normalise_line_endings(input);
    let s = remove_bom(&s);
    ensure_final_newline(&s)
}

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

fn remove_bom(input: &str) -> String {
    input.replace('\u{FEFF}', "")
}

fn ensure_final_newline(input: &str) -> String {
    let trimmed = input.trim_end();
    if trimmed.is_empty() {
        String::from("\n")
    } else {
        format!("{}\n", trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notebook::Cell;
    use tempfile::TempDir;

    const SAMPLE: &str = r##"{
        "nbformat": 4, "nbformat_minor": 5, "metadata": {},
        "cells": [
            {"id": "c1", "cell_type": "code", "metadata": {}, "execution_count": null,
             "source": ["print('Hello from notebook')"], "outputs": []},
            {"id": "c2", "cell_type": "markdown", "metadata": {},
             "source": ["# This is a markdown cell in notebook"]}
        ]
    }"##;

    /// One executed code cell holding `source` and the given output objects.
    fn executed_notebook(source: &str, outputs: &str) -> Notebook {
        let json = format!(
            r#"{{"nbformat": 4, "nbformat_minor": 5, "metadata": {{}},
                "cells": [{{"id": "x1", "cell_type": "code", "metadata": {{}}, "execution_count": 1,
                            "source": {}, "outputs": [{}]}}]}}"#,
            serde_json::json!([source]),
            outputs
        );
        Notebook::from_json(&json, Path::new("executed.ipynb")).unwrap()
    }

    #[test]
    fn renders_code_and_markdown() {
        let nb = Notebook::from_cells(&[Cell::code("x = 1\n\n"), Cell::text("# Title\n\n")]).unwrap();
        assert_eq!(render_markdown(&nb, true), "```python\nx = 1\n```\n\n# Title\n");
    }

    #[test]
    fn renders_outputs_after_code() {
        let nb = executed_notebook(
            "print(5)",
            r#"{"output_type": "stream", "name": "stdout", "text": ["5\n"]}"#,
        );
        assert_eq!(render_markdown(&nb, true), "```python\nprint(5)\n```\n\n```\n5\n```\n");
        assert_eq!(render_markdown(&nb, false), "```python\nprint(5)\n```\n");
    }

    #[test]
    fn error_outputs_render_name_and_value() {
        let nb = executed_notebook(
            "print(undefined)",
            r#"{"output_type": "error", "ename": "NameError",
                "evalue": "name 'undefined' is not defined",
                "traceback": ["\u001b[0;31m..."]}"#,
        );
        let md = render_markdown(&nb, true);
        assert!(md.contains("NameError: name 'undefined' is not defined"));
        assert!(!md.contains('\u{1b}'));
    }

    #[test]
    fn execute_result_renders_plain_text() {
        let nb = executed_notebook(
            "2 + 2",
            r#"{"output_type": "execute_result", "execution_count": 1,
                "data": {"text/plain": "4"}, "metadata": {}}"#,
        );
        assert!(render_markdown(&nb, true).ends_with("```\n4\n```\n"));
    }

    #[test]
    fn backticks_in_code_lengthen_the_fence() {
        let code = "doc = \"\"\"\n```python\nx = 1\n```\n\"\"\"";
        let nb = Notebook::from_cells(&[Cell::code(code)]).unwrap();
        let md = render_markdown(&nb, true);
        assert_eq!(md, format!("````python\n{code}\n````\n"));
    }

    #[test]
    fn backticks_in_output_lengthen_the_fence() {
        let nb = executed_notebook(
            "print(s)",
            r#"{"output_type": "stream", "name": "stdout", "text": ["`````\n"]}"#,
        );
        assert!(render_markdown(&nb, true).ends_with("``````\n`````\n``````\n"));
    }

    #[test]
    fn fence_uses_notebook_language() {
        let json = r#"{"nbformat": 4, "nbformat_minor": 5,
            "metadata": {"language_info": {"name": "julia"}},
            "cells": [{"id": "j1", "cell_type": "code", "metadata": {}, "execution_count": null,
                       "source": ["1 + 1"], "outputs": []}]}"#;
        let nb = Notebook::from_json(json, Path::new("j.ipynb")).unwrap();
        assert!(render_markdown(&nb, true).starts_with("```julia\n"));
    }

    #[test]
    fn empty_notebook_renders_single_newline() {
        assert_eq!(render_markdown(&Notebook::from_cells(&[]).unwrap(), true), "\n");
    }

    #[test]
    fn crlf_is_normalised() {
        let nb = Notebook::from_cells(&[Cell::text("a\r\nb\r\n")]).unwrap();
        assert_eq!(render_markdown(&nb, true), "a\nb\n");
    }

    #[test]
    fn convert_without_execution() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("sample.ipynb");
        std::fs::write(&input, SAMPLE).unwrap();
        let output = dir.path().join("output.md");

        NotebookToMarkdown::new().convert(&input, &output).unwrap();

        let content = std::fs::read_to_string(&output).unwrap();
        assert!(content.contains("# This is a markdown cell in notebook"));
        assert!(content.contains("print('Hello from notebook')"));
    }

    #[test]
    fn txt_input_is_rejected() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("invalid.txt");
        std::fs::write(&input, "Invalid content").unwrap();
        let output = dir.path().join("output.md");

        let err = NotebookToMarkdown::new().convert(&input, &output).unwrap_err();
        assert!(matches!(err, PymdError::InvalidFormat { .. }));
        assert!(!output.exists());
    }

    #[test]
    fn malformed_notebook_is_a_transform_error() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("broken.ipynb");
        std::fs::write(&input, "{\"cells\": 3}").unwrap();
        let output = dir.path().join("broken.md");

        let err = NotebookToMarkdown::new().convert(&input, &output).unwrap_err();
        assert!(matches!(err, PymdError::MalformedNotebook { .. }), "got {err:?}");
        assert!(!output.exists());
    }

    #[test]
    fn execution_failure_leaves_input_untouched() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("sample.ipynb");
        std::fs::write(&input, SAMPLE).unwrap();
        let output = dir.path().join("output.md");

        let config = ExecutionConfig::builder()
            .jupyter_command("pymd-test-no-such-jupyter-binary")
            .build()
            .unwrap();
        let err = NotebookToMarkdown::executed(config)
            .convert(&input, &output)
            .unwrap_err();
        assert!(matches!(err, PymdError::EngineUnavailable { .. }), "got {err:?}");
        assert_eq!(std::fs::read_to_string(&input).unwrap(), SAMPLE);
        assert!(!output.exists());
    }
}
