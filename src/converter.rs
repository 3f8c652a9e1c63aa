//! The converter contract and the chaining combinator.
//!
//! A [`Converter`] turns one file into another. It declares which input
//! extensions it accepts and which extension it produces, and it refuses bad
//! input ([`validate_input`]) before touching the file system. Converters
//! carry no per-call state, so one instance can serve any number of calls,
//! concurrently included.
//!
//! ## Chaining
//!
//! ```text
//! A.then(B)            → Pipeline [A, B]
//! A.then(B.then(C))    → Pipeline [A, B, C]   (prepend, never nest)
//! A.then(B).then(C)    → Pipeline [A, B, C]   (append, never nest)
//! ```
//!
//! The right-hand side of a chain is a [`Stage`]: a closed sum of "one
//! converter" and "an existing pipeline". [`combine`] flattens both sides, so
//! a pipeline's stage list only ever holds single converters.

use crate::error::{PymdError, Result};
use crate::pipeline::Pipeline;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A unit that transforms one file into another.
///
/// Implementors provide [`name`](Converter::name),
/// [`input_extensions`](Converter::input_extensions),
/// [`output_extension`](Converter::output_extension) and
/// [`transform`](Converter::transform); callers use
/// [`convert`](Converter::convert), which validates first.
pub trait Converter: Send + Sync {
    /// Short name used in logs and progress events.
    fn name(&self) -> &str;

    /// File extensions (with leading `.`) this converter accepts.
    fn input_extensions(&self) -> &[&str];

    /// File extension (with leading `.`) this converter produces.
    fn output_extension(&self) -> &str;

    /// Format-specific transform. Only called on validated input.
    fn transform(&self, input: &Path, output: &Path) -> Result<()>;

    /// Refuse `input` unless it is an existing regular file with an accepted
    /// extension.
    fn validate(&self, input: &Path) -> Result<()> {
        validate_input(input, self.input_extensions())
    }

    /// Validate `input`, then transform it into `output`.
    ///
    /// On a validation error nothing is written.
    fn convert(&self, input: &Path, output: &Path) -> Result<()> {
        self.validate(input)?;
        self.transform(input, output)
    }

    /// Chain `next` after this converter.
    fn then(self, next: impl Into<Stage>) -> Pipeline
    where
        Self: Sized + 'static,
    {
        combine(Stage::single(self), next)
    }

    /// Attach a source file so the converter can be driven with
    /// [`BoundConverter::save`].
    fn bind(self, source: impl Into<PathBuf>) -> BoundConverter<Self>
    where
        Self: Sized,
    {
        BoundConverter {
            converter: self,
            source: source.into(),
        }
    }
}

/// Check that `path` is an existing regular file whose name ends with one of
/// `accepted`.
///
/// Existence is checked first, so a missing file with a wrong extension is
/// reported as [`PymdError::FileNotFound`].
pub fn validate_input(path: &Path, accepted: &[&str]) -> Result<()> {
    if !path.is_file() {
        return Err(PymdError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy())
        .unwrap_or_default();

    if !accepted.iter().any(|ext| file_name.ends_with(ext)) {
        return Err(PymdError::InvalidFormat {
            path: path.to_path_buf(),
            expected: accepted.iter().map(|e| e.to_string()).collect(),
        });
    }

    Ok(())
}

// ── Stage ────────────────────────────────────────────────────────────────

/// One operand of a chain: a single converter or an existing pipeline.
#[derive(Clone)]
pub enum Stage {
    Single(Arc<dyn Converter>),
    Pipeline(Pipeline),
}

impl Stage {
    /// Wrap a concrete converter.
    pub fn single(converter: impl Converter + 'static) -> Self {
        Stage::Single(Arc::new(converter))
    }

    fn as_converter(&self) -> &dyn Converter {
        match self {
            Stage::Single(c) => c.as_ref(),
            Stage::Pipeline(p) => p,
        }
    }
}

impl std::fmt::Debug for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Single(c) => f.debug_tuple("Single").field(&c.name()).finish(),
            Stage::Pipeline(p) => f.debug_tuple("Pipeline").field(p).finish(),
        }
    }
}

impl From<Arc<dyn Converter>> for Stage {
    fn from(converter: Arc<dyn Converter>) -> Self {
        Stage::Single(converter)
    }
}

impl From<Pipeline> for Stage {
    fn from(pipeline: Pipeline) -> Self {
        Stage::Pipeline(pipeline)
    }
}

impl Converter for Stage {
    fn name(&self) -> &str {
        self.as_converter().name()
    }

    fn input_extensions(&self) -> &[&str] {
        self.as_converter().input_extensions()
    }

    fn output_extension(&self) -> &str {
        self.as_converter().output_extension()
    }

    fn transform(&self, input: &Path, output: &Path) -> Result<()> {
        self.as_converter().transform(input, output)
    }

    fn validate(&self, input: &Path) -> Result<()> {
        self.as_converter().validate(input)
    }

    fn convert(&self, input: &Path, output: &Path) -> Result<()> {
        self.as_converter().convert(input, output)
    }

    fn then(self, next: impl Into<Stage>) -> Pipeline {
        combine(self, next)
    }
}

/// Chain two stages into one flat pipeline.
///
/// Pipelines on either side are spliced in, never nested. A progress
/// callback attached to the left pipeline wins over one on the right.
pub fn combine(first: impl Into<Stage>, next: impl Into<Stage>) -> Pipeline {
    let (mut stages, left_progress) = flatten(first.into());
    let (tail, right_progress) = flatten(next.into());
    stages.extend(tail);
    Pipeline::from_parts(stages, left_progress.or(right_progress))
}

fn flatten(
    stage: Stage,
) -> (
    Vec<Arc<dyn Converter>>,
    Option<crate::progress::ProgressCallback>,
) {
    match stage {
        Stage::Single(c) => (vec![c], None),
        Stage::Pipeline(p) => p.into_parts(),
    }
}

// ── Bound converter ──────────────────────────────────────────────────────

/// A converter paired with the file it converts.
///
/// Sugar for workflows that decide the source early and the destination late.
#[derive(Debug, Clone)]
pub struct BoundConverter<C> {
    converter: C,
    source: PathBuf,
}

impl<C: Converter> BoundConverter<C> {
    /// The attached source file.
    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Convert the attached source into `output`.
    pub fn save(&self, output: impl AsRef<Path>) -> Result<()> {
        self.converter.convert(&self.source, output.as_ref())
    }
}

// ── Output helper ────────────────────────────────────────────────────────

/// Write `contents` to `path` atomically (temp file in the same directory,
/// then rename), creating parent directories as needed.
///
/// A failed write never leaves a truncated file at `path`.
pub(crate) fn write_output(path: &Path, contents: &[u8]) -> Result<()> {
    let write_err = |source: std::io::Error| PymdError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent).map_err(write_err)?;

    let mut tmp = tempfile::NamedTempFile::new_in(parent).map_err(write_err)?;
    tmp.write_all(contents).map_err(write_err)?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;
    Ok(())
}
