use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Classification of a recognized resource command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    /// `\input` of another document
    Input,
    /// Bare `\includegraphics`
    Graphic,
    /// One of the project's figure macros (`\siFigure`, `\widthFigure`, ...)
    CustomFigure,
    /// `\bibliography` database
    Bibliography,
    /// `\bibliographystyle` file
    BibliographyStyle,
    /// `\documentclass` file
    DocumentClass,
}

impl ResourceKind {
    /// Graphic kinds participate in figure numbering and stripping
    pub fn is_graphic(&self) -> bool {
        matches!(self, ResourceKind::Graphic | ResourceKind::CustomFigure)
    }
}

/// Which caption-setup defaults a figure macro synthesizes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FigureFamily {
    /// Main-text macros (`\mFigure`, `\widthFigure`)
    Main,
    /// Supporting-information macros (`\siFigure` and friends)
    Supplementary,
}

/// Kind of captioned reference block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefKind {
    Figure,
    Table,
}

impl RefKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefKind::Figure => "figure",
            RefKind::Table => "table",
        }
    }
}

/// A parsed figure or table reference, reduced to its caption
#[derive(Debug, Clone, PartialEq)]
pub struct Reference {
    /// Figure or table
    pub kind: RefKind,
    /// Explicit or synthesized `\captionsetup` contents
    pub caption_setup: Option<String>,
    /// Caption text, empty when the block carried none
    pub caption: String,
    /// Label token, when the block carried one
    pub label: Option<String>,
    /// Omit `\captionsetup` lines when rendering
    pub exclude_caption_setup: bool,
}

impl Reference {
    /// Render the reference as a placement-pinned caption block.
    ///
    /// The second `\captionsetup` keeps regenerated captions out of the
    /// list of figures/tables and left-aligns single-line captions.
    pub fn to_latex(&self) -> String {
        let env = self.kind.as_str();
        let mut block = format!("\\begin{{{}}}[h!]\n", env);

        if !self.exclude_caption_setup {
            if let Some(ref setup) = self.caption_setup {
                if !setup.is_empty() {
                    block.push_str(&format!("    \\captionsetup{{{}}}\n", setup));
                }
            }
            block.push_str("    \\captionsetup{list=no,singlelinecheck=off}\n");
        }

        block.push_str(&format!("    \\caption{{{}}}\n", self.caption));
        if let Some(ref label) = self.label {
            if !label.is_empty() {
                block.push_str(&format!("    \\label{{{}}}\n", label));
            }
        }
        block.push_str(&format!("\\end{{{}}}\n", env));

        block
    }
}

/// One pending resource copy
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CopyTask {
    /// Resolved source path
    pub source: PathBuf,
    /// Flattened destination path inside the bundle directory
    pub dest: PathBuf,
}

/// Result of one bundle session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleReport {
    /// Root document the session started from
    pub root: PathBuf,
    /// Destination directory
    pub dest_dir: PathBuf,
    /// Number of documents walked
    pub documents: usize,
    /// Source paths bundled or copied, in processing order
    pub copied: Vec<PathBuf>,
    /// Source paths whose copy failed
    pub failed: Vec<PathBuf>,
    /// Warnings recorded during the session
    pub warnings: Vec<String>,
    /// Session metadata
    pub metadata: BundleMetadata,
}

/// Bundle session metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleMetadata {
    pub duration_ms: u64,
    pub timestamp: String,
    pub tool_version: String,
}

impl Default for BundleMetadata {
    fn default() -> Self {
        Self {
            duration_ms: 0,
            timestamp: chrono::Utc::now().to_rfc3339(),
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}
