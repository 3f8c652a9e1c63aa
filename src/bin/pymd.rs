//! CLI binary for pymd.
//!
//! A thin shim over the library crate that maps CLI flags to converters,
//! pipelines and execution configs, and prints results.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use pymd::{
    Converter, DocsConfig, ExecutionConfig, FencedBlockExecutor, NotebookToMarkdown,
    PipelineProgressCallback, PythonSessions, ScriptToNotebook, SessionConfig, Stage,
};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one bar over the pipeline's stages plus a log
/// line per finished stage.
struct CliProgressCallback {
    bar: ProgressBar,
    stage_started: Mutex<Option<Instant>>,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  [{bar:32.green/238}] {pos}/{len} stages  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Converting");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            stage_started: Mutex::new(None),
        })
    }

    fn stage_elapsed(&self) -> String {
        let secs = self
            .stage_started
            .lock()
            .ok()
            .and_then(|mut g| g.take())
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0);
        dim(&format!("{secs:.1}s"))
    }
}

impl PipelineProgressCallback for CliProgressCallback {
    fn on_pipeline_start(&self, total_stages: usize) {
        self.bar.set_length(total_stages as u64);
        self.bar.reset_eta();
    }

    fn on_stage_start(&self, _index: usize, _total: usize, name: &str) {
        if let Ok(mut started) = self.stage_started.lock() {
            *started = Some(Instant::now());
        }
        self.bar.set_message(name.to_string());
    }

    fn on_stage_complete(&self, index: usize, total: usize, name: &str) {
        self.bar.println(format!(
            "  {} Stage {}/{}  {:<22}  {}",
            green("✓"),
            index + 1,
            total,
            name,
            self.stage_elapsed(),
        ));
        self.bar.inc(1);
    }

    fn on_stage_error(&self, index: usize, total: usize, name: &str, error: &str) {
        let first_line = error.lines().next().unwrap_or_default();
        self.bar.println(format!(
            "  {} Stage {}/{}  {:<22}  {}  {}",
            red("✗"),
            index + 1,
            total,
            name,
            red(first_line),
            self.stage_elapsed(),
        ));
        self.bar.finish_and_clear();
    }

    fn on_pipeline_complete(&self, total_stages: usize) {
        self.bar.finish_and_clear();
        eprintln!(
            "{} {} stages completed",
            green("✔"),
            bold(&total_stages.to_string())
        );
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Script → notebook (writes analysis.ipynb)
  pymd convert analysis.py

  # Script → notebook, executed with Jupyter so outputs are stored
  pymd convert analysis.py --execute

  # Script → Markdown in one go (two-stage pipeline)
  pymd convert analysis.py --to md -o docs/analysis.md

  # Notebook → Markdown, executed first, code only
  pymd convert report.ipynb --execute --no-outputs

  # Run ```{python} blocks of a documentation page
  pymd exec-md docs/index.md -o site/index.md

CELL MARKERS:
  # %%              starts a code cell (anything after the marker is ignored)
  # %% [markdown]   starts a markdown cell

ENVIRONMENT VARIABLES:
  PYMD_JUPYTER          Jupyter executable used for --execute (default: jupyter)
  PYMD_KERNEL           Kernel name passed to the engine
  PYMD_PYTHON           Interpreter used by exec-md (default: python3)
  RUST_LOG              Overrides the log filter (e.g. pymd=debug)
"#;

/// Convert percent-format scripts, notebooks and executable Markdown.
#[derive(Parser, Debug)]
#[command(
    name = "pymd",
    version,
    about = "Convert percent-format Python scripts to Jupyter notebooks and Markdown",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "PYMD_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "PYMD_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert a script or notebook.
    Convert(ConvertArgs),

    /// Execute ```{python} blocks in a Markdown file and inline their output.
    ExecMd(ExecMdArgs),
}

#[derive(clap::Args, Debug)]
struct ConvertArgs {
    /// Input file: .py / .ipy script or .ipynb notebook.
    input: PathBuf,

    /// Output file. Default: the input path with the target extension.
    #[arg(short, long, env = "PYMD_OUTPUT")]
    output: Option<PathBuf>,

    /// Target format. Default: ipynb for scripts, md for notebooks.
    #[arg(long, value_enum, env = "PYMD_TO")]
    to: Option<Target>,

    /// Execute the notebook with Jupyter to populate outputs.
    #[arg(long, env = "PYMD_EXECUTE")]
    execute: bool,

    /// Leave cell outputs out of rendered Markdown.
    #[arg(long)]
    no_outputs: bool,

    /// Jupyter executable providing `nbconvert`.
    #[arg(long, env = "PYMD_JUPYTER", default_value = "jupyter")]
    jupyter: String,

    /// Kernel name to execute with. Default: the notebook's own.
    #[arg(long, env = "PYMD_KERNEL")]
    kernel: Option<String>,

    /// Per-cell execution timeout in seconds.
    #[arg(long, env = "PYMD_CELL_TIMEOUT", default_value_t = pymd::config::DEFAULT_CELL_TIMEOUT_SECS)]
    cell_timeout: u64,

    /// Wall-clock cap on the whole Jupyter process, in seconds.
    #[arg(long, env = "PYMD_PROCESS_TIMEOUT")]
    process_timeout: Option<u64>,

    /// Disable progress bar.
    #[arg(long, env = "PYMD_NO_PROGRESS")]
    no_progress: bool,
}

#[derive(clap::Args, Debug)]
struct ExecMdArgs {
    /// Markdown file to process.
    input: PathBuf,

    /// Write the result here instead of stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Python interpreter backing the per-document session.
    #[arg(long, env = "PYMD_PYTHON", default_value = "python3")]
    python: String,

    /// Language tag of executable blocks, as in ```{python}.
    #[arg(long, default_value = "python")]
    language: String,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Target {
    Ipynb,
    Md,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Source {
    Script,
    Notebook,
}

impl Source {
    fn detect(path: &Path) -> Result<Self> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        if name.ends_with(".py") || name.ends_with(".ipy") {
            Ok(Source::Script)
        } else if name.ends_with(".ipynb") {
            Ok(Source::Notebook)
        } else {
            bail!(
                "Unsupported input '{}': expected a .py, .ipy or .ipynb file",
                path.display()
            )
        }
    }

    fn default_target(self) -> Target {
        match self {
            Source::Script => Target::Ipynb,
            Source::Notebook => Target::Md,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Command::Convert(ref args) => run_convert(args, cli.quiet),
        Command::ExecMd(ref args) => run_exec_md(args, cli.quiet),
    }
}

/// Map `convert` args to an `ExecutionConfig`.
fn execution_config(args: &ConvertArgs) -> Result<ExecutionConfig> {
    let mut builder = ExecutionConfig::builder()
        .jupyter_command(args.jupyter.clone())
        .cell_timeout_secs(args.cell_timeout);
    if let Some(ref kernel) = args.kernel {
        builder = builder.kernel_name(kernel.clone());
    }
    if let Some(secs) = args.process_timeout {
        builder = builder.process_timeout_secs(secs);
    }
    builder.build().context("Invalid configuration")
}

fn run_convert(args: &ConvertArgs, quiet: bool) -> Result<()> {
    let start = Instant::now();
    let source = Source::detect(&args.input)?;
    let target = args.to.unwrap_or_else(|| source.default_target());
    let config = execution_config(args)?;

    let markdown = if args.execute {
        NotebookToMarkdown::executed(config.clone())
    } else {
        NotebookToMarkdown::new()
    }
    .include_outputs(!args.no_outputs);

    let stage: Stage = match (source, target) {
        (Source::Script, Target::Ipynb) => ScriptToNotebook::new().into(),
        (Source::Script, Target::Md) => ScriptToNotebook::new().then(markdown).into(),
        (Source::Notebook, Target::Md) => markdown.into(),
        (Source::Notebook, Target::Ipynb) => {
            bail!("'{}' is already a notebook", args.input.display())
        }
    };

    let stage = match stage {
        Stage::Pipeline(p) if !quiet && !args.no_progress => {
            Stage::Pipeline(p.with_progress(CliProgressCallback::new()))
        }
        other => other,
    };

    let output = args.output.clone().unwrap_or_else(|| {
        args.input
            .with_extension(stage.output_extension().trim_start_matches('.'))
    });

    stage
        .convert(&args.input, &output)
        .context("Conversion failed")?;

    // Script → notebook stores outputs by executing the written notebook.
    if args.execute && target == Target::Ipynb {
        ScriptToNotebook::with_execution(config)
            .execute(&output)
            .context("Notebook execution failed")?;
    }

    if !quiet {
        eprintln!(
            "{}  {}  {}ms  →  {}",
            green("✔"),
            cyan(stage.name()),
            start.elapsed().as_millis(),
            bold(&output.display().to_string()),
        );
    }
    Ok(())
}

fn run_exec_md(args: &ExecMdArgs, quiet: bool) -> Result<()> {
    let start = Instant::now();
    let markdown = std::fs::read_to_string(&args.input)
        .with_context(|| format!("Failed to read {:?}", args.input))?;

    let sessions = PythonSessions::new(SessionConfig {
        python: args.python.clone(),
    });
    let docs = DocsConfig {
        enabled: true,
        language: args.language.clone(),
    };
    let mut executor = FencedBlockExecutor::new(sessions, docs).context("Invalid configuration")?;
    let rendered = executor
        .process_document(&markdown, &args.input)
        .context("Executing code blocks failed")?;

    match args.output {
        Some(ref path) => {
            std::fs::write(path, &rendered)
                .with_context(|| format!("Failed to write {:?}", path))?;
            if !quiet {
                eprintln!(
                    "{}  {}ms  →  {}",
                    green("✔"),
                    start.elapsed().as_millis(),
                    bold(&path.display().to_string()),
                );
            }
        }
        None => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            handle
                .write_all(rendered.as_bytes())
                .context("Failed to write to stdout")?;
        }
    }
    Ok(())
}
