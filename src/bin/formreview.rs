//! CLI binary for formreview.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ReviewConfig` and prints the result.

use anyhow::{Context, Result};
use clap::Parser;
use formreview::{
    OcrDevice, ProgressCallback, Requirement, ReviewConfig, ReviewOutput, ReviewOverrides,
    ReviewProgressCallback, ReviewStage, Reviewer, Verdict,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress: a spinner naming the current stage, plus one line per
/// settled check.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        bar.set_style(style);
        bar.set_prefix("Reviewing");
        bar.set_message("Opening PDF…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self { bar })
    }
}

impl ReviewProgressCallback for CliProgressCallback {
    fn on_review_start(&self, input: &str) {
        self.bar.set_prefix(format!("Reviewing {input}"));
    }

    fn on_stage(&self, stage: ReviewStage) {
        self.bar.set_message(format!("{stage}…"));
    }

    fn on_check(&self, requirement: Requirement, satisfied: bool) {
        let mark = if satisfied { green("✓") } else { red("✗") };
        self.bar.println(format!("  {} {}", mark, requirement.label()));
    }

    fn on_review_complete(&self, verdict: Verdict, elapsed_ms: u64) {
        self.bar.finish_and_clear();
        eprintln!(
            "{}",
            dim(&format!(
                "Reviewed → {} in {:.2}s",
                verdict,
                elapsed_ms as f64 / 1000.0
            ))
        );
    }
}

fn verdict_mark(verdict: Verdict) -> String {
    match verdict {
        Verdict::Pass => green("✔"),
        Verdict::NeedsFix => yellow("⚠"),
        Verdict::Reject => red("✘"),
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Review with digital text only (no OCR engine)
  formreview application.pdf

  # Review a scanned form with an OCR server on the GPU
  formreview --ocr-endpoint http://localhost:8868 --ocr-device gpu scan.pdf

  # Ask the judgment service when rules fail
  formreview --arbitration --model gpt-4o-mini application.pdf

  # JSON output for downstream tooling
  formreview --json application.pdf > review.json

ENVIRONMENT VARIABLES:
  FORMREVIEW_OCR_ENDPOINT  Base URL of the OCR engine (POST <url>/ocr)
  OCR_DEVICE               OCR execution device: cpu or gpu
  FORMREVIEW_ARBITRATION   Enable LLM arbitration (true/false)
  OPENAI_API_KEY           OpenAI API key
  ANTHROPIC_API_KEY        Anthropic API key
  EDGEQUAKE_LLM_PROVIDER   Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL          Override model ID
  PDFIUM_LIB_PATH          Directory holding libpdfium
"#;

/// Review scanned application forms for completeness.
#[derive(Parser, Debug)]
#[command(
    name = "formreview",
    version,
    about = "Review scanned application forms for completeness",
    long_about = "Check an application-form PDF for the applicant name, photo, essay length, \
consent and both signatures. Digital text is used when present; OCR and pixel analysis cover \
scanned pages. Optionally consult an LLM judgment service when rules fail.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF file path.
    input: String,

    /// Base URL of the OCR engine.
    #[arg(long, env = "FORMREVIEW_OCR_ENDPOINT")]
    ocr_endpoint: Option<String>,

    /// OCR execution device: cpu or gpu.
    #[arg(long, env = "OCR_DEVICE", value_parser = parse_device)]
    ocr_device: Option<OcrDevice>,

    /// Per-page OCR timeout in seconds.
    #[arg(long, env = "FORMREVIEW_OCR_TIMEOUT", default_value_t = 60)]
    ocr_timeout: u64,

    /// Concurrent OCR page requests.
    #[arg(short, long, env = "FORMREVIEW_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// Consult the judgment service when rules fail.
    #[arg(long, env = "FORMREVIEW_ARBITRATION")]
    arbitration: bool,

    /// LLM model ID for arbitration (default: gpt-4o-mini).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// Arbitration timeout in seconds; expiry falls back to rule findings.
    #[arg(long, env = "FORMREVIEW_ARBITRATION_TIMEOUT", default_value_t = 30)]
    arbitration_timeout: u64,

    /// Path to a text file containing a custom judgment system prompt.
    #[arg(long, env = "FORMREVIEW_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// Rendering DPI (72–400).
    #[arg(long, env = "FORMREVIEW_DPI", default_value_t = 150,
          value_parser = clap::value_parser!(u32).range(72..=400))]
    dpi: u32,

    /// Minimum characters per essay section.
    #[arg(long, env = "FORMREVIEW_MIN_SECTION_CHARS", default_value_t = 300)]
    min_section_chars: usize,

    /// Output structured JSON (ReviewOutput) instead of a summary.
    #[arg(long, env = "FORMREVIEW_JSON")]
    json: bool,

    /// Disable the progress spinner.
    #[arg(long, env = "FORMREVIEW_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "FORMREVIEW_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors and the result.
    #[arg(short, long, env = "FORMREVIEW_QUIET")]
    quiet: bool,
}

fn parse_device(s: &str) -> Result<OcrDevice, String> {
    s.parse::<OcrDevice>().map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the spinner is active.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
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

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn ReviewProgressCallback>)
    } else {
        None
    };

    let config = build_config(&cli, progress_cb).await?;

    // ── Run review ───────────────────────────────────────────────────────
    let output = Reviewer::new(config)
        .review(&cli.input, ReviewOverrides::default())
        .await
        .context("Review failed")?;

    if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
    } else {
        print_human(&output, cli.quiet);
    }

    Ok(())
}

fn print_human(output: &ReviewOutput, quiet: bool) {
    println!("{} {}", verdict_mark(output.verdict), bold(output.verdict.as_str()));
    for f in &output.findings {
        println!("  - {}: {}", bold(&f.label), f.message);
    }
    if let Some(ref reason) = output.reason {
        println!("  reason: {reason}");
    }

    if !quiet {
        println!();
        println!("{}", output.summary);
        eprintln!(
            "{}",
            dim(&format!(
                "{} pages via {}  ·  {} OCR items  ·  {}ms total",
                output.stats.total_pages,
                output.stats.render_backend,
                output.stats.ocr_items,
                output.stats.total_duration_ms
            ))
        );
    }
}

/// Map CLI args to `ReviewConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ReviewConfig> {
    let system_prompt = if let Some(ref path) = cli.system_prompt {
        Some(
            tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read system prompt from {:?}", path))?,
        )
    } else {
        None
    };

    let mut builder = ReviewConfig::builder()
        .dpi(cli.dpi)
        .min_section_chars(cli.min_section_chars)
        .ocr_timeout_secs(cli.ocr_timeout)
        .concurrency(cli.concurrency)
        .arbitration(cli.arbitration)
        .arbitration_timeout_secs(cli.arbitration_timeout);

    if let Some(ref url) = cli.ocr_endpoint {
        builder = builder.ocr_endpoint(url.clone());
    }
    if let Some(device) = cli.ocr_device {
        builder = builder.ocr_device(device);
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider.clone());
    }
    if let Some(prompt) = system_prompt {
        builder = builder.system_prompt(prompt);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
