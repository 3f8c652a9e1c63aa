//! Concrete converters.
//!
//! ```text
//! .py / .ipy ──[script]──▶ .ipynb ──[markdown]──▶ .md
//! ```
//!
//! 1. [`script`]  : parse a percent-format script into notebook cells
//! 2. [`markdown`]: render a notebook (optionally executed first) as Markdown
//!
//! Chain them with [`crate::Converter::then`] to go straight from script to
//! Markdown.

pub mod markdown;
pub mod script;

pub use markdown::NotebookToMarkdown;
pub use script::ScriptToNotebook;
