mod json;
mod yaml;

pub use json::to_json;
pub use yaml::to_yaml;

use crate::models::BundleReport;

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Yaml,
    Summary,
    Ansi,
}

/// Format a BundleReport according to the specified format
pub fn format_report(report: &BundleReport, format: OutputFormat) -> Result<String, FormatError> {
    match format {
        OutputFormat::Json => to_json(report),
        OutputFormat::Yaml => to_yaml(report),
        OutputFormat::Summary => Ok(format_summary(report)),
        OutputFormat::Ansi => Ok(format_summary_ansi(report)),
    }
}

/// Generate a human-readable summary
pub fn format_summary(report: &BundleReport) -> String {
    let mut output = String::new();

    output.push_str(&format!(
        "Bundle Summary\n\
         ==============\n\
         Root: {}\n\
         Destination: {}\n\n",
        report.root.display(),
        report.dest_dir.display()
    ));

    output.push_str(&format!(
        "Documents Walked: {}\n\
         Files Bundled: {}\n\
         Copy Failures: {}\n\n",
        report.documents,
        report.copied.len(),
        report.failed.len()
    ));

    if !report.failed.is_empty() {
        output.push_str("Failed:\n");
        for path in &report.failed {
            output.push_str(&format!("  {}\n", path.display()));
        }
        output.push('\n');
    }

    if !report.warnings.is_empty() {
        output.push_str("Warnings:\n");
        for warning in &report.warnings {
            output.push_str(&format!("  {}\n", warning));
        }
        output.push('\n');
    }

    output.push_str(&format!(
        "Bundle Duration: {}ms\n\
         Timestamp: {}\n\
         Tool Version: {}\n",
        report.metadata.duration_ms, report.metadata.timestamp, report.metadata.tool_version
    ));

    output
}

fn format_summary_ansi(report: &BundleReport) -> String {
    let mut output = String::new();

    // ANSI codes
    let bold = "\x1b[1m";
    let reset = "\x1b[0m";
    let cyan = "\x1b[36m";
    let yellow = "\x1b[33m";
    let red = "\x1b[31m";
    let dim = "\x1b[2m";

    output.push_str(&format!(
        "{}{}Bundle Summary{}\n\
         {}=============={}\n\
         {}Root:{} {}\n\
         {}Destination:{} {}\n\n",
        bold,
        cyan,
        reset,
        cyan,
        reset,
        dim,
        reset,
        report.root.display(),
        dim,
        reset,
        report.dest_dir.display()
    ));

    output.push_str(&format!(
        "{}Documents Walked:{} {} | {}Files Bundled:{} {} | {}Copy Failures:{} {}\n\n",
        dim,
        reset,
        report.documents,
        dim,
        reset,
        report.copied.len(),
        dim,
        reset,
        report.failed.len()
    ));

    if !report.failed.is_empty() {
        output.push_str(&format!("{}Failed:{}\n", bold, reset));
        for path in &report.failed {
            output.push_str(&format!("  {}{}{}\n", red, path.display(), reset));
        }
        output.push('\n');
    }

    if !report.warnings.is_empty() {
        output.push_str(&format!("{}Warnings:{}\n", bold, reset));
        for warning in &report.warnings {
            output.push_str(&format!("  {}{}{}\n", yellow, warning, reset));
        }
        output.push('\n');
    }

    output.push_str(&format!(
        "{}Bundle:{} {}ms\n",
        dim, reset, report.metadata.duration_ms
    ));

    output
}

#[derive(Debug, thiserror::Error)]
pub enum FormatError {
    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("YAML serialization error: {0}")]
    YamlError(#[from] serde_yaml::Error),
}
