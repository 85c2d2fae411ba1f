//! CLI binary for edgequake-intake.
//!
//! A thin shim over the library crate that maps CLI flags to `IntakeConfig`,
//! runs extraction (and intent resolution when an instruction is given) and
//! prints the result.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_intake::{
    resolve_input, ArtifactStore, DirectoryStore, ExtractionProgressCallback, Ingested,
    Intake, IntakeConfig, Modality, ProgressCallback,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
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
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: [&str; 11] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress for PDF extraction: a bar over the pages that need OCR
/// plus one log line per OCR'd page. Pages may finish out of order.
struct CliProgressCallback {
    bar: ProgressBar,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    /// Spinner until `on_extraction_start` reports how many pages need OCR.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Reading");
        bar.set_message("Opening document…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            errors: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize, prefix: &str) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix(prefix.to_string());
        self.bar.reset_eta();
    }
}

impl ExtractionProgressCallback for CliProgressCallback {
    fn on_extraction_start(&self, total_pages: usize, ocr_pages: usize) {
        self.activate_bar(ocr_pages, "OCR");
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!(
                "{total_pages} pages, {ocr_pages} without a text layer"
            ))
        ));
    }

    fn on_page_complete(&self, page_num: usize, total: usize, ocr_used: bool, text_len: usize) {
        if !ocr_used {
            return;
        }
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}",
            green("✓"),
            page_num,
            total,
            dim(&format!("{text_len:>5} chars via OCR")),
        ));
        self.bar.inc(1);
    }

    fn on_page_error(&self, page_num: usize, total: usize, error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);
        let msg = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}",
            red("✗"),
            page_num,
            total,
            red(&msg),
        ));
        self.bar.inc(1);
    }

    fn on_whole_document_fallback(&self, reason: &str) {
        self.bar.println(format!(
            "{} Text layer unreadable ({reason}); OCR'ing every page",
            cyan("⚠")
        ));
        self.bar.set_message("OCR'ing whole document…");
    }

    fn on_extraction_complete(&self, total_pages: usize, ocr_pages: usize) {
        self.bar.finish_and_clear();
        let failed = self.errors.load(Ordering::SeqCst);
        if failed == 0 {
            eprintln!(
                "{} {} pages read ({} via OCR)",
                green("✔"),
                bold(&total_pages.to_string()),
                ocr_pages
            );
        } else {
            eprintln!(
                "{} {} pages read  ({} OCR page(s) failed)",
                cyan("⚠"),
                bold(&total_pages.to_string()),
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Extract text from a PDF (native text, OCR for scanned pages)
  intake report.pdf

  # Extract and work out what to do with it
  intake report.pdf --instruction "give me the action items"

  # OCR an image, JSON output with diagnostics
  intake scan.png --json

  # Transcribe audio (needs a speech-to-text key)
  OPENAI_API_KEY=sk-... intake memo.m4a -o memo.txt

  # Fetch a video transcript
  intake https://youtu.be/AbCdEfGhIjK --instruction "summarize"

  # Read an artifact stored by ingestion id
  intake --store ./data/ingests 3f2a9c1e --instruction "sentiment?"

INTENTS:
  summarize, sentiment, code_explain, fetch_yt, action_items,
  conversational_answer, unclear

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          Speech-to-text key (and the openai provider's key)
  EDGEQUAKE_PROVIDER      Inference provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Inference model ID (default gpt-4o-mini)
  PDFIUM_LIB_PATH         Directory containing libpdfium
  RUST_LOG                Log filter, overrides -v / -q

Without a provider, intents are resolved by keyword heuristics.
"#;

/// Turn documents, images, audio, text and video links into text, then work
/// out what you want done with it.
#[derive(Parser, Debug)]
#[command(
    name = "intake",
    version,
    about = "Extract text from PDFs, images, audio, text files and video links, and classify the request",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local file, HTTP/HTTPS URL, video URL/id, or ingestion id with --store.
    input: String,

    /// What to do with the content. Enables intent resolution.
    #[arg(short, long, env = "INTAKE_INSTRUCTION")]
    instruction: Option<String>,

    /// Input modality: pdf, image, audio, text, video. Detected when omitted.
    #[arg(short, long, env = "INTAKE_MODALITY")]
    modality: Option<Modality>,

    /// Treat INPUT as an ingestion id under this storage directory.
    #[arg(long, env = "INTAKE_STORE")]
    store: Option<PathBuf>,

    /// Write the extracted text (or JSON) to this file instead of stdout.
    #[arg(short, long, env = "INTAKE_OUTPUT")]
    output: Option<PathBuf>,

    /// Output structured JSON instead of plain text.
    #[arg(long, env = "INTAKE_JSON")]
    json: bool,

    /// Inference model ID.
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// Inference provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// Confidence below which a clarifying question is returned (0.0–1.0).
    #[arg(long, env = "INTAKE_CLARIFY_THRESHOLD", default_value_t = 0.75)]
    clarify_threshold: f64,

    /// Characters of extracted text sent to the classifier.
    #[arg(long, env = "INTAKE_CONTEXT_CHARS", default_value_t = 8000)]
    context_chars: usize,

    /// Speech-to-text API key.
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    speech_api_key: Option<String>,

    /// Speech-to-text model.
    #[arg(long, env = "INTAKE_SPEECH_MODEL", default_value = "whisper-1")]
    speech_model: String,

    /// Path or name of the tesseract executable.
    #[arg(long, env = "INTAKE_TESSERACT", default_value = "tesseract")]
    tesseract_path: PathBuf,

    /// Tesseract language pack(s), e.g. eng or eng+deu.
    #[arg(long, env = "INTAKE_OCR_LANG", default_value = "eng")]
    ocr_lang: String,

    /// Caption language for video transcripts.
    #[arg(long, env = "INTAKE_TRANSCRIPT_LANG", default_value = "en")]
    transcript_lang: String,

    /// Directory containing the pdfium shared library.
    #[arg(long, env = "PDFIUM_LIB_PATH")]
    pdfium_lib_path: Option<PathBuf>,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "INTAKE_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Number of scanned PDF pages OCR'd concurrently.
    #[arg(short = 'c', long, env = "INTAKE_PAGE_CONCURRENCY", default_value_t = 4)]
    page_concurrency: usize,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "INTAKE_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Disable progress bar.
    #[arg(long, env = "INTAKE_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "INTAKE_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "INTAKE_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs; -v always wins.
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

    // ── Resolve input ────────────────────────────────────────────────────
    // `_resolved` owns any downloaded temp file; keep it alive until exit.
    let (artifact, _resolved) = match cli.store {
        Some(ref root) => {
            let store = DirectoryStore::new(root);
            let artifact = store
                .artifact(&cli.input, cli.modality)
                .with_context(|| format!("Failed to load ingestion '{}'", cli.input))?;
            (artifact, None)
        }
        None => {
            let resolved = resolve_input(&cli.input, cli.modality, cli.download_timeout)
                .await
                .context("Failed to resolve input")?;
            let artifact = resolved
                .to_artifact(cli.modality)
                .context("Failed to determine input modality")?;
            (artifact, Some(resolved))
        }
    };

    // ── Build pipeline ───────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> =
        if show_progress && artifact.modality() == Modality::Pdf {
            Some(CliProgressCallback::new_dynamic() as Arc<dyn ExtractionProgressCallback>)
        } else {
            None
        };

    let config = build_config(&cli, artifact.modality(), progress_cb)?;
    let intake = Intake::new(&config).context("Failed to set up the intake pipeline")?;

    // ── Run ──────────────────────────────────────────────────────────────
    let rendered = match cli.instruction {
        Some(ref instruction) => {
            let output = intake
                .process(&artifact, instruction)
                .await
                .context("Intake failed")?;
            if !cli.quiet && !cli.json {
                print_intent_summary(&output.intent);
            }
            if cli.json {
                serde_json::to_string_pretty(&output).context("Failed to serialise output")?
            } else {
                plain_text(&output.ingested)
            }
        }
        None => {
            let ingested = intake.ingest(&artifact).await.context("Extraction failed")?;
            if cli.json {
                serde_json::to_string_pretty(&ingested).context("Failed to serialise output")?
            } else {
                plain_text(&ingested)
            }
        }
    };

    write_output(&cli, &rendered)?;
    Ok(())
}

/// Map CLI args to `IntakeConfig`, enabling only the input's modality.
fn build_config(cli: &Cli, modality: Modality, progress: Option<ProgressCallback>) -> Result<IntakeConfig> {
    let mut builder = IntakeConfig::builder()
        .modalities([modality])
        .page_concurrency(cli.page_concurrency)
        .tesseract_path(cli.tesseract_path.clone())
        .ocr_language(cli.ocr_lang.clone())
        .speech_model(cli.speech_model.clone())
        .transcript_language(cli.transcript_lang.clone())
        .context_char_limit(cli.context_chars)
        .clarify_threshold(cli.clarify_threshold)
        .download_timeout_secs(cli.download_timeout);

    if let Some(ref key) = cli.speech_api_key {
        builder = builder.speech_api_key(key.clone());
    }
    if let Some(ref path) = cli.pdfium_lib_path {
        builder = builder.pdfium_lib_path(path.clone());
    }
    if let Some(ref password) = cli.password {
        builder = builder.password(password.clone());
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider.clone());
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Text body for non-JSON output; failures are reported on stderr.
fn plain_text(ingested: &Ingested) -> String {
    match ingested {
        Ingested::Extraction(result) => {
            if let Some(ref e) = result.error {
                eprintln!("{} {}", red("✘"), e);
            }
            for page_error in &result.diagnostics.page_errors {
                eprintln!("  {} {}", red("✗"), page_error);
            }
        }
        Ingested::Transcript(transcript) => {
            if let Some(kind) = transcript.error_kind() {
                eprintln!("{} transcript unavailable: {}", red("✘"), kind);
            }
        }
    }
    ingested.text().to_string()
}

fn print_intent_summary(intent: &edgequake_intake::IntentAssignment) {
    eprintln!(
        "{} intent: {}  {}",
        cyan("◆"),
        bold(intent.intent.as_str()),
        dim(&format!("confidence {:.2}", intent.confidence)),
    );
    if let Some(ref question) = intent.clarifying_question {
        eprintln!("  {} {}", cyan("?"), question);
    }
    if let Some(ref constraints) = intent.required_constraints {
        eprintln!(
            "  {}",
            dim(&serde_json::Value::Object(constraints.clone()).to_string())
        );
    }
}

fn write_output(cli: &Cli, rendered: &str) -> Result<()> {
    match cli.output {
        Some(ref path) => {
            std::fs::write(path, rendered)
                .with_context(|| format!("Failed to write output to {}", path.display()))?;
            if !cli.quiet {
                eprintln!(
                    "{}  {} chars  →  {}",
                    green("✔"),
                    rendered.len(),
                    bold(&path.display().to_string())
                );
            }
        }
        None => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            handle
                .write_all(rendered.as_bytes())
                .context("Failed to write to stdout")?;
            if !rendered.ends_with('\n') {
                handle.write_all(b"\n").ok();
            }
        }
    }
    Ok(())
}
