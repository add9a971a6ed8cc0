//! Texbundle Core Library
//!
//! Turns a multi-file LaTeX project into a flat, submission-ready
//! directory. The bundler walks the `\input` tree from a root document,
//! rewrites resource references to their flattened basenames, and copies
//! every referenced file next to the bundled documents.
//!
//! # Features
//!
//! - Recursive `\input` walking with cycle detection, merged or one file
//!   per document
//! - Graphics, bibliography, style and class files collected into a
//!   single directory
//! - Optional sequential figure naming that restarts at the
//!   supporting-information marker
//! - Supporting-information sections reducible to caption-only listings
//! - Comment stripping and `\captionsetup` removal
//! - A copy mode that moves one document and relinks its paths instead
//!   of bundling
//! - Reports in JSON, YAML, or plain/ANSI terminal format
//!
//! # Example
//!
//! ```no_run
//! use texbundle_core::{format_report, BundleConfig, BundleSession, OutputFormat};
//! use std::path::PathBuf;
//!
//! let config = BundleConfig::new(
//!     PathBuf::from("paper/main.tex"),
//!     PathBuf::from("paper/submit"),
//! );
//! let session = BundleSession::new(config).unwrap();
//! let report = session.bundle().unwrap();
//!
//! let output = format_report(&report, OutputFormat::Summary).unwrap();
//! println!("{}", output);
//! ```

pub mod braces;
pub mod bundler;
pub mod config;
pub mod copier;
pub mod models;
pub mod output;
pub mod references;
pub mod reporter;
pub mod rules;

// Re-exports for convenience
pub use bundler::{relink_document, BundleError, BundleSession};
pub use config::BundleConfig;
pub use copier::{CopyError, CopyOutcome, PendingCopies};
pub use models::*;
pub use output::{format_report, format_summary, FormatError, OutputFormat};
pub use references::{DocumentCursor, ParseError, ParseOutcome, ReferenceParser};
pub use reporter::{NullReporter, Reporter};
pub use rules::{HeaderRuleSet, PathRuleSet, RuleError};
