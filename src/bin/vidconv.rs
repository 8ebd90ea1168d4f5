//! CLI binary for vidconv.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ControllerConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use vidconv::{
    convert_file, format_file_size, ControllerConfig, ConversionProgressCallback, FormatCatalog,
    ProgressCallback, Status,
};

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

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

/// Terminal observer: a single percent bar driven by the estimated progress.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(100);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}%  \
             ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        bar.set_style(style);
        bar.set_prefix("Waiting");
        Arc::new(Self { bar })
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_status_change(&self, _from: Status, to: Status) {
        match to {
            Status::Converting => {
                self.bar.set_prefix("Converting");
                self.bar.reset_elapsed();
                self.bar.enable_steady_tick(Duration::from_millis(80));
            }
            Status::Succeeded | Status::Failed => self.bar.disable_steady_tick(),
            _ => {}
        }
    }

    fn on_progress(&self, percent: f64) {
        // Whole percent for display; the estimate itself never reaches 90
        // before the service answers.
        self.bar.set_position(percent.floor() as u64);
        if (90.0..100.0).contains(&percent) {
            self.bar.set_message("saving…");
        }
    }

    fn on_rejected(&self, message: &str) {
        self.bar.println(format!("{} {}", red("✗"), message));
    }

    fn on_delivered(&self, file_name: &str, size_bytes: u64) {
        self.bar.finish_and_clear();
        eprintln!(
            "{} {}  {}",
            green("✔"),
            bold(file_name),
            dim(&format_file_size(size_bytes))
        );
    }

    fn on_failed(&self, detail: &str) {
        self.bar.abandon();
        eprintln!("{} {}", red("✘"), detail);
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Convert to MP4 in the current directory
  vidconv movie.mkv --to mp4

  # Save into another directory, give up after 10 minutes
  vidconv clip.avi --to webm --output-dir converted/ --timeout 600

  # Use a self-hosted conversion service
  vidconv clip.mov --to mkv --service-url http://localhost:8080/convert

  # Machine-readable result
  vidconv movie.mkv --to mp4 --json

  # Show the supported formats
  vidconv --list-formats

ENVIRONMENT VARIABLES:
  VIDCONV_TO            Target format
  VIDCONV_SERVICE_URL   Conversion service endpoint
  VIDCONV_OUTPUT_DIR    Directory the converted file is saved into
  VIDCONV_TIMEOUT       Service call timeout in seconds
  RUST_LOG              Override the log filter (e.g. vidconv=trace)
"#;

/// Convert a video to another container format through a conversion service.
#[derive(Parser, Debug)]
#[command(
    name = "vidconv",
    version,
    about = "Convert a video to another container format through a conversion service",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local video file to convert.
    #[arg(required_unless_present = "list_formats")]
    input: Option<PathBuf>,

    /// Output format (mp4, mkv, mov, avi, webm, flv, wmv, m4v, 3gp, ogv).
    #[arg(short, long, env = "VIDCONV_TO", required_unless_present = "list_formats")]
    to: Option<String>,

    /// Conversion service endpoint.
    #[arg(long, env = "VIDCONV_SERVICE_URL", default_value = vidconv::DEFAULT_SERVICE_URL)]
    service_url: String,

    /// Directory the converted file is saved into.
    #[arg(short, long, env = "VIDCONV_OUTPUT_DIR", default_value = ".")]
    output_dir: PathBuf,

    /// Service call timeout in seconds (no timeout when omitted).
    #[arg(long, env = "VIDCONV_TIMEOUT")]
    timeout: Option<u64>,

    /// Print the supported formats and exit.
    #[arg(long)]
    list_formats: bool,

    /// Output structured JSON instead of a summary line.
    #[arg(long, env = "VIDCONV_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "VIDCONV_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "VIDCONV_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "VIDCONV_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs unless --verbose is given.
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

    // ── List-formats mode ────────────────────────────────────────────────
    if cli.list_formats {
        let catalog = FormatCatalog::default();
        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&catalog.options())
                    .context("Failed to serialise formats")?
            );
        } else {
            for option in catalog.options() {
                println!("{:<6} {}", option.value, dim(&option.label));
            }
        }
        return Ok(());
    }

    let (Some(input), Some(target)) = (cli.input.as_ref(), cli.to.as_deref()) else {
        anyhow::bail!("An input file and --to are required");
    };

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn ConversionProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;

    if !cli.quiet && !cli.json {
        eprintln!(
            "{} {} → {}",
            cyan("◆"),
            bold(&input.display().to_string()),
            bold(&target.to_lowercase())
        );
    }

    // ── Run conversion ───────────────────────────────────────────────────
    let output = convert_file(input, target, &config)
        .await
        .context("Conversion failed")?;

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&output).context("Failed to serialise output")?
        );
    } else if !cli.quiet && !show_progress {
        // The callback already printed the summary when the bar was shown.
        let location = output
            .location
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| output.file_name.clone());
        eprintln!(
            "Saved {} ({})",
            location,
            format_file_size(output.size_bytes)
        );
    }

    Ok(())
}

/// Map CLI args to `ControllerConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ControllerConfig> {
    let mut builder = ControllerConfig::builder()
        .service_url(cli.service_url.clone())
        .output_dir(cli.output_dir.clone());

    if let Some(secs) = cli.timeout {
        builder = builder.request_timeout_secs(secs);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
