//! Executable code blocks in Markdown documentation.
//!
//! A block opened with `` ```{python} `` is run through an
//! [`ExecutionBackend`] and rewritten as the code plus its output:
//!
//! ````text
//! ```{python}            ```python
//! print(2 + 3)    ──▶    print(2 + 3)
//! ```                    ```
//!
//!                        ```
//!                        5
//!                        ```
//! ````
//!
//! Blocks run in document order against one per-document session, so later
//! blocks see earlier definitions. Any other fence is left alone.

use crate::config::DocsConfig;
use crate::error::{PymdError, Result};
use crate::session::ExecutionBackend;
use regex::Regex;
use std::path::Path;
use tracing::debug;

/// Rewrites executable fenced blocks using an execution backend.
#[derive(Debug)]
pub struct FencedBlockExecutor<B> {
    backend: B,
    config: DocsConfig,
    pattern: Regex,
}

impl<B: ExecutionBackend> FencedBlockExecutor<B> {
    pub fn new(backend: B, config: DocsConfig) -> Result<Self> {
        if config.language.trim().is_empty() {
            return Err(PymdError::InvalidConfig(
                "Code block language must not be empty".into(),
            ));
        }
        let pattern = block_pattern(&config.language)?;
        Ok(Self {
            backend,
            config,
            pattern,
        })
    }

    pub fn config(&self) -> &DocsConfig {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Execute every executable block of `markdown`, which belongs to
    /// `document`, and return the rewritten text.
    ///
    /// Code errors are rendered into the output block; only backend failures
    /// are returned as errors.
    pub fn process(&mut self, markdown: &str, document: &Path) -> Result<String> {
        if !self.config.enabled {
            return Ok(markdown.to_string());
        }

        let mut rendered = String::with_capacity(markdown.len());
        let mut last = 0;
        let mut blocks = 0;

        for caps in self.pattern.captures_iter(markdown) {
            let (Some(whole), Some(indent), Some(body)) = (caps.get(0), caps.get(1), caps.get(2))
            else {
                continue;
            };
            let indent = indent.as_str();
            let body = body.as_str();

            let output = self.backend.execute(document, &dedent(body))?;

            rendered.push_str(&markdown[last..whole.start()]);
            rendered.push_str(&render_block(&self.config.language, indent, body, &output));
            last = whole.end();
            blocks += 1;
        }
        rendered.push_str(&markdown[last..]);

        debug!("Executed {} blocks in {}", blocks, document.display());
        Ok(rendered)
    }

    /// Release the backend state of `document` once all of its text has been
    /// processed. Call this per page when one executor serves many pages.
    pub fn finish(&mut self, document: &Path) {
        self.backend.finish(document);
    }

    /// [`process`](Self::process) a whole document, then
    /// [`finish`](Self::finish) it, also when processing fails.
    pub fn process_document(&mut self, markdown: &str, document: &Path) -> Result<String> {
        let result = self.process(markdown, document);
        self.finish(document);
        result
    }
}

/// Opening fence `` ```{lang} `` (indent captured), lazy body, then the first
/// closing fence line.
fn block_pattern(language: &str) -> Result<Regex> {
    let source = format!(
        r"(?m)^([ \t]*)```\{{{}\}}[ \t]*\r?\n((?s:.*?))^[ \t]*```[ \t]*\r?$",
        regex::escape(language.trim())
    );
    Regex::new(&source).map_err(|e| PymdError::InvalidConfig(format!("Bad block pattern: {e}")))
}

fn render_block(language: &str, indent: &str, body: &str, output: &str) -> String {
    let mut block = format!("{indent}```{}\n{body}", language.trim());
    if !body.is_empty() && !body.ends_with('\n') {
        block.push('\n');
    }
    block.push_str(indent);
    block.push_str("```\n\n");
    block.push_str(indent);
    block.push_str("```\n");
    let output = output.trim_end_matches(['\n', '\r']);
    if !output.is_empty() {
        for line in output.lines() {
            block.push_str(indent);
            block.push_str(line);
            block.push('\n');
        }
    }
    block.push_str(indent);
    block.push_str("```");
    block
}

/// Remove the whitespace prefix shared by every non-blank line.
fn dedent(text: &str) -> String {
    let prefix = text
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| &l[..l.len() - l.trim_start().len()])
        .reduce(|a, b| common_prefix(a, b))
        .unwrap_or("");

    text.lines()
        .map(|l| {
            if l.trim().is_empty() {
                ""
            } else {
                l.strip_prefix(prefix).unwrap_or(l)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn common_prefix<'a>(a: &'a str, b: &str) -> &'a str {
    let len = a
        .char_indices()
        .zip(b.chars())
        .take_while(|((_, x), y)| x == y)
        .last()
        .map(|((i, c), _)| i + c.len_utf8())
        .unwrap_or(0);
    &a[..len]
}
