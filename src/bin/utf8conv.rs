//! CLI binary for utf8conv.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ConversionConfig`, expands directories, and prints one line per file.

use anyhow::{bail, Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, IsTerminal};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use utf8conv::config::is_supported_extension;
use utf8conv::{
    convert_batch, BatchOutput, ConversionConfig, ConversionProgressCallback, ConversionResult,
    ConvertError, ForcedEncoding, ProgressCallback,
};

// ── ANSI colour helpers ──────────────────────────────────────────────────────

#[derive(Clone, Copy)]
struct Palette {
    enabled: bool,
}

impl Palette {
    fn paint(&self, code: &str, s: &str) -> String {
        if self.enabled {
            format!("\x1b[{code}m{s}\x1b[0m")
        } else {
            s.to_string()
        }
    }
    fn green(&self, s: &str) -> String {
        self.paint("32", s)
    }
    fn red(&self, s: &str) -> String {
        self.paint("31", s)
    }
    fn dim(&self, s: &str) -> String {
        self.paint("2", s)
    }
    fn bold(&self, s: &str) -> String {
        self.paint("1", s)
    }
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress bar for a batch. Files complete out of order, so the
/// bar only counts; the per-file report is printed once the batch is done.
struct CliProgressCallback {
    bar: ProgressBar,
    errors: AtomicUsize,
    palette: Palette,
}

impl CliProgressCallback {
    fn new(palette: Palette) -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>4}/{len} files  \
             ⏱ {elapsed_precise}  {wide_msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Converting");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            errors: AtomicUsize::new(0),
            palette,
        })
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total: usize) {
        self.bar.set_length(total as u64);
        self.bar.reset_eta();
    }

    fn on_file_start(&self, _index: usize, _total: usize, path: &Path) {
        self.bar.set_message(display_name(path));
    }

    fn on_file_complete(&self, _index: usize, _total: usize, _result: &ConversionResult) {
        self.bar.inc(1);
    }

    fn on_file_error(&self, _index: usize, _total: usize, path: &Path, error: &ConvertError) {
        self.errors.fetch_add(1, Ordering::SeqCst);
        self.bar.println(format!(
            "  {} {}  {}",
            self.palette.red("✗"),
            display_name(path),
            self.palette.dim(error.kind()),
        ));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, total: usize, success_count: usize) {
        self.bar.finish_and_clear();
        let failed = self.errors.load(Ordering::SeqCst);
        if failed == 0 {
            eprintln!(
                "{} {} files converted",
                self.palette.green("✔"),
                self.palette.bold(&success_count.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} files converted  ({} failed)",
                self.palette.red("✘"),
                self.palette.bold(&success_count.to_string()),
                total,
                self.palette.red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Convert in place, keeping name.srt.bak copies
  utf8conv movie.srt notes.txt

  # Every supported file in a folder, written elsewhere
  utf8conv subs/ -o converted/

  # Force the source encoding, skip repair
  utf8conv --encoding "Windows-1252" --no-fix legacy.csv

  # Map an extra language code to a custom suffix
  utf8conv --lang-suffix pt=por --lang-suffix it=ita *.srt

  # Machine-readable report
  utf8conv --json subs/ > report.json

ENCODINGS:
  Auto-detect, UTF-8, UTF-16, UTF-16 LE, UTF-16 BE, ISO-8859-1,
  Windows-1252, Shift_JIS, GB18030, or any WHATWG label (e.g. koi8-r).
  Unknown labels decode as UTF-8 and report confidence 0.00.

ENVIRONMENT VARIABLES:
  RUST_LOG                Override the log filter (e.g. utf8conv=debug)
  UTF8CONV_*              Every flag has an env var, see --help
"#;

/// Convert text files of unknown or mixed encodings to UTF-8.
#[derive(Parser, Debug)]
#[command(
    name = "utf8conv",
    version,
    about = "Convert text files of unknown or mixed encodings to UTF-8",
    long_about = "Detect each file's encoding, decode it, repair mojibake, and rewrite it as \
UTF-8. Files are converted in place (with a .bak copy) or into an output folder, and tagged \
with their detected language (notes.txt → notes-fra.txt).",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Files or directories. Directories expand to the supported files
    /// directly inside them.
    #[arg(
        required = true,
        long_help = "Files or directories. Directories expand to the files directly inside \
          them with a supported extension:\n\
          .txt .srt .ass .ssa .sub .vtt .lrc .md .csv .tsv .ini .log .json .xml\n\
          Files named explicitly are converted whatever their extension."
    )]
    inputs: Vec<PathBuf>,

    /// Do not copy originals to <file>.bak before rewriting them.
    #[arg(long, env = "UTF8CONV_NO_BACKUP")]
    no_backup: bool,

    /// Skip mojibake repair.
    #[arg(long, env = "UTF8CONV_NO_FIX")]
    no_fix: bool,

    /// Source encoding, or "Auto-detect".
    #[arg(short, long, env = "UTF8CONV_ENCODING", default_value = "Auto-detect")]
    encoding: String,

    /// Write converted files into this folder instead of in place.
    #[arg(short, long, env = "UTF8CONV_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// Number of files converted at once. Default: number of CPUs.
    #[arg(short, long, env = "UTF8CONV_CONCURRENCY",
          value_parser = clap::value_parser!(u64).range(1..))]
    concurrency: Option<u64>,

    /// Do not detect the language or rename files.
    #[arg(long, env = "UTF8CONV_NO_LANG_TAG")]
    no_lang_tag: bool,

    /// Minimum language probability (0.0–1.0) for a file to be tagged.
    #[arg(long, env = "UTF8CONV_MIN_LANG_CONFIDENCE", default_value_t = 0.60)]
    min_lang_confidence: f64,

    /// Extra language suffix mapping, CODE=SUFFIX (repeatable).
    #[arg(long = "lang-suffix", env = "UTF8CONV_LANG_SUFFIX", value_delimiter = ',')]
    lang_suffixes: Vec<String>,

    /// Give up renaming after this many numbered candidates.
    #[arg(long, env = "UTF8CONV_MAX_RENAME_ATTEMPTS", default_value_t = 10_000)]
    max_rename_attempts: usize,

    /// Output the batch report as JSON.
    #[arg(long, env = "UTF8CONV_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "UTF8CONV_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "UTF8CONV_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "UTF8CONV_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Library INFO logs would tear the progress bar; keep them to errors
    // unless asked for.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && io::stderr().is_terminal();
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

    let palette = Palette {
        enabled: io::stdout().is_terminal(),
    };

    // ── Expand inputs ────────────────────────────────────────────────────
    let files = expand_inputs(&cli.inputs)?;
    if files.is_empty() {
        bail!("No supported files found in the given inputs");
    }

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new(palette);
        Some(cb as Arc<dyn ConversionProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;

    // ── Run conversion ───────────────────────────────────────────────────
    let output = convert_batch(&files, &config).await;

    if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise report")?;
        println!("{json}");
    } else if !cli.quiet {
        print_report(&output, palette);
    } else {
        for (path, err) in output.failures() {
            eprintln!("[ERROR] {}: {}", display_name(path), err);
        }
    }

    if output.stats.failed_files > 0 {
        Ok(ExitCode::FAILURE)
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

/// Map CLI args to `ConversionConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ConversionConfig> {
    let encoding = ForcedEncoding::from(cli.encoding.clone());

    let mut builder = ConversionConfig::builder()
        .make_backup(!cli.no_backup)
        .auto_fix(!cli.no_fix)
        .forced_encoding(encoding)
        .tag_language(!cli.no_lang_tag)
        .min_language_probability(cli.min_lang_confidence)
        .max_rename_attempts(cli.max_rename_attempts);

    if let Some(ref dir) = cli.output_dir {
        builder = builder.output_folder(dir);
    }
    if let Some(n) = cli.concurrency {
        builder = builder.concurrency(n as usize);
    }
    for (code, suffix) in cli
        .lang_suffixes
        .iter()
        .map(|s| parse_lang_suffix(s))
        .collect::<Result<Vec<_>>>()?
    {
        builder = builder.language_suffix(code, suffix);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Parse one `--lang-suffix CODE=SUFFIX` value.
fn parse_lang_suffix(s: &str) -> Result<(String, String)> {
    let Some((code, suffix)) = s.split_once('=') else {
        bail!("Invalid --lang-suffix '{}': expected CODE=SUFFIX", s);
    };
    let (code, suffix) = (code.trim(), suffix.trim());
    if code.is_empty() || suffix.is_empty() {
        bail!("Invalid --lang-suffix '{}': code and suffix must be non-empty", s);
    }
    if suffix.contains(['/', '\\']) {
        bail!("Invalid --lang-suffix '{}': suffix must not contain path separators", s);
    }
    Ok((code.to_string(), suffix.to_string()))
}

/// Files named on the command line, with directories replaced by their
/// supported files (sorted, non-recursive). Explicit files are kept as-is.
fn expand_inputs(inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for input in inputs {
        if !input.is_dir() {
            files.push(input.clone());
            continue;
        }
        let mut found: Vec<PathBuf> = std::fs::read_dir(input)
            .with_context(|| format!("Failed to list directory {:?}", input))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file() && is_supported_extension(p))
            .collect();
        found.sort();
        tracing::debug!("Expanded {:?} to {} files", input, found.len());
        files.extend(found);
    }
    Ok(files)
}

fn print_report(output: &BatchOutput, palette: Palette) {
    for outcome in &output.outcomes {
        let name = display_name(&outcome.source_path);
        match &outcome.result {
            Ok(r) => println!("{} {}", palette.green("[OK]"), describe(&name, r)),
            Err(e) => println!("{} {}: {}", palette.red("[ERROR]"), name, e),
        }
    }
    let s = &output.stats;
    eprintln!(
        "{}",
        palette.dim(&format!(
            "{} converted, {} failed, {} tagged, {} backed up in {}ms",
            s.converted_files, s.failed_files, s.tagged_files, s.backups, s.total_duration_ms
        ))
    );
}

/// `name: enc (conf) → path | lang=x (p)`
fn describe(name: &str, r: &ConversionResult) -> String {
    let lang = match (&r.language_tag, r.language_confidence) {
        (Some(tag), Some(p)) => format!("lang={tag} ({p:.2})"),
        (Some(tag), None) => format!("lang={tag}"),
        (None, Some(p)) => format!("lang=- ({p:.2}, below threshold)"),
        (None, None) => "lang=-".to_string(),
    };
    let mut line = format!(
        "{}: {} ({:.2}) → {} | {}",
        name,
        r.encoding_used,
        r.confidence,
        r.final_path.display(),
        lang
    );
    if r.replacements > 0 {
        line.push_str(&format!(" | {} replaced", r.replacements));
    }
    line
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
