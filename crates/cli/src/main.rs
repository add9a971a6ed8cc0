use anyhow::Context;
use clap::{Parser, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use texbundle_core::{
    format_report, relink_document, BundleConfig, BundleSession, OutputFormat, Reporter,
};

#[derive(Parser)]
#[command(name = "texbundle")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Bundle multi-file LaTeX projects into flat, submission-ready directories")]
#[command(long_about = "Walks the \\input tree of a LaTeX project from its root document, copies \
    every referenced resource (graphics, bibliographies, styles, classes) into one flat \
    directory, and rewrites the references to match. Optional passes strip comments, merge \
    included documents into one file, number figures sequentially, and reduce the \
    supporting-information section to caption listings.")]
pub struct Args {
    /// Root document of the LaTeX project
    pub path: PathBuf,

    /// Destination directory (defaults to submit/ next to the root document)
    #[arg(short = 't', long)]
    pub dest: Option<PathBuf>,

    /// Keep comment lines instead of stripping them
    #[arg(long)]
    pub preserve_comments: bool,

    /// Prefix copied graphics with their figure number
    #[arg(long)]
    pub append_figure_names: bool,

    /// Reduce the supporting-information section to caption listings
    #[arg(long)]
    pub strip_si: bool,

    /// Replace figure bodies with caption-only blocks
    #[arg(long)]
    pub strip_figures: bool,

    /// Drop \captionsetup lines from bundled documents
    #[arg(long)]
    pub exclude_caption_setup: bool,

    /// Splice included documents into their parent instead of writing them separately
    #[arg(long)]
    pub merge: bool,

    /// Copy the document to DEST with its paths relinked, instead of bundling
    #[arg(long = "cp", value_name = "DEST")]
    pub cp: Option<PathBuf>,

    /// Report format (defaults to ansi on a terminal, summary otherwise)
    #[arg(short, long, value_enum)]
    pub format: Option<OutputFormatArg>,

    /// Report file (defaults to stdout)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Show verbose progress
    #[arg(short, long)]
    pub verbose: bool,

    /// Show debug-level log output
    #[arg(short, long)]
    pub debugging: bool,
}

#[derive(ValueEnum, Clone, Debug)]
pub enum OutputFormatArg {
    Json,
    Yaml,
    Summary,
    Ansi,
}

impl From<OutputFormatArg> for OutputFormat {
    fn from(arg: OutputFormatArg) -> Self {
        match arg {
            OutputFormatArg::Json => OutputFormat::Json,
            OutputFormatArg::Yaml => OutputFormat::Yaml,
            OutputFormatArg::Summary => OutputFormat::Summary,
            OutputFormatArg::Ansi => OutputFormat::Ansi,
        }
    }
}

/// Reporter forwarding bundle progress to the tracing subscriber
struct ConsoleReporter;

impl Reporter for ConsoleReporter {
    fn info(&mut self, message: &str) {
        tracing::info!("{}", message);
    }

    fn warn(&mut self, message: &str) {
        tracing::warn!("{}", message);
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let level = if args.debugging {
        tracing::Level::DEBUG
    } else if args.verbose {
        tracing::Level::INFO
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    let root = expand_path(&args.path);
    let root = fs::canonicalize(&root)
        .with_context(|| format!("Root document not found: {}", root.display()))?;

    if let Some(ref cp_dest) = args.cp {
        let dest = expand_path(cp_dest);
        let written = relink_document(&root, &dest, !args.preserve_comments, false)?;
        tracing::info!("Copied {} to {}", root.display(), written.display());
        return Ok(());
    }

    let dest_dir = match args.dest {
        Some(ref dest) => expand_path(dest),
        None => root
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default()
            .join("submit"),
    };
    fs::create_dir_all(&dest_dir)
        .with_context(|| format!("Failed to create destination {}", dest_dir.display()))?;

    tracing::debug!("Bundling {} into {}", root.display(), dest_dir.display());

    let config = BundleConfig::new(root, dest_dir)
        .with_strip_comments(!args.preserve_comments)
        .with_append_figure_names(args.append_figure_names)
        .with_strip_si(args.strip_si)
        .with_strip_figures(args.strip_figures)
        .with_exclude_caption_setup(args.exclude_caption_setup)
        .with_merge(args.merge);

    // Show progress if verbose
    let spinner = if args.verbose {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg}")
                .unwrap(),
        );
        pb.enable_steady_tick(Duration::from_millis(100));
        pb.set_message("Bundling project...");
        Some(pb)
    } else {
        None
    };

    let session = BundleSession::new(config)?.with_reporter(Box::new(ConsoleReporter));
    let report = session.bundle()?;

    if let Some(ref pb) = spinner {
        pb.finish_with_message(format!(
            "Bundled {} documents in {}ms",
            report.documents, report.metadata.duration_ms
        ));
    }

    let format = match args.format {
        Some(format) => format.into(),
        None => {
            if atty::is(atty::Stream::Stdout) {
                OutputFormat::Ansi
            } else {
                OutputFormat::Summary
            }
        }
    };
    let output = format_report(&report, format)?;

    // Write output
    if let Some(path) = args.output {
        fs::write(&path, &output)?;
        if args.verbose {
            eprintln!("Report written to: {}", path.display());
        }
    } else {
        println!("{}", output);
    }

    Ok(())
}

/// Expand a leading `~` and `$VAR`/`${VAR}` references in a path.
/// Unset variables are left as written.
fn expand_path(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();
    let mut expanded = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            expanded.push(c);
            continue;
        }
        let braced = chars.peek() == Some(&'{');
        if braced {
            chars.next();
        }
        let mut name = String::new();
        while let Some(&next) = chars.peek() {
            if next.is_alphanumeric() || next == '_' {
                name.push(next);
                chars.next();
            } else {
                break;
            }
        }
        if braced && chars.peek() == Some(&'}') {
            chars.next();
        }
        match std::env::var(&name) {
            Ok(value) => expanded.push_str(&value),
            Err(_) => {
                if braced {
                    expanded.push_str("${");
                    expanded.push_str(&name);
                    expanded.push('}');
                } else {
                    expanded.push('$');
                    expanded.push_str(&name);
                }
            }
        }
    }

    if let Some(rest) = expanded.strip_prefix('~') {
        if rest.is_empty() || rest.starts_with('/') {
            if let Some(home) = dirs_next::home_dir() {
                return home.join(rest.trim_start_matches('/'));
            }
        }
    }

    PathBuf::from(expanded)
}
