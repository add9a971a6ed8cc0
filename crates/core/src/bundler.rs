//! The bundle session: recursive document walking and rewriting.
//!
//! One session is one run. The walker processes a document line by line,
//! dispatching recognized commands through the path rules: inclusions
//! recurse depth-first, resources are queued for copying under flattened
//! names, and the supporting-information transition switches the session
//! into SI mode. Per-session state (figure counter, SI flag, visited set)
//! lives here so numbering and cycle detection span the whole inclusion
//! tree.

use std::collections::HashSet;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::time::Instant;

use thiserror::Error;

use crate::config::BundleConfig;
use crate::copier::{CopyError, PendingCopies};
use crate::models::{
    BundleMetadata, BundleReport, CopyTask, FigureFamily, RefKind, Reference, ResourceKind,
};
use crate::references::{BlockOpener, DocumentCursor, ParseError, ParseOutcome, ReferenceParser};
use crate::reporter::{NullReporter, Reporter};
use crate::rules::{HeaderTarget, PathMatch, PathRuleSet, RuleError};

/// Directives emitted when the supporting-information section begins.
const SI_RESET_DIRECTIVES: &str =
    "\\clearpage\n\\setcounter{table}{0}\n\\setcounter{figure}{0}\n";

/// Caption blocks per page in stripped supporting-information listings.
const CAPTIONS_PER_PAGE: usize = 18;

#[derive(Error, Debug)]
pub enum BundleError {
    #[error("Failed to read document {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to write document {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Cyclic inclusion of document {}", .path.display())]
    CyclicInclude { path: PathBuf },
    #[error("Copy error: {0}")]
    CopyError(#[from] CopyError),
    #[error("Reference error: {0}")]
    ParseError(#[from] ParseError),
    #[error("Rule error: {0}")]
    RuleError(#[from] RuleError),
}

/// One end-to-end bundle run
pub struct BundleSession {
    config: BundleConfig,
    rules: PathRuleSet,
    parser: ReferenceParser,
    reporter: Box<dyn Reporter>,
    visited: HashSet<PathBuf>,
    figure_index: usize,
    si_started: bool,
    documents: usize,
    copied: Vec<PathBuf>,
    failed: Vec<PathBuf>,
    warnings: Vec<String>,
}

impl BundleSession {
    pub fn new(config: BundleConfig) -> Result<Self, BundleError> {
        Ok(Self {
            config,
            rules: PathRuleSet::compile()?,
            parser: ReferenceParser::new()?,
            reporter: Box::new(NullReporter),
            visited: HashSet::new(),
            figure_index: 0,
            si_started: false,
            documents: 0,
            copied: Vec::new(),
            failed: Vec::new(),
            warnings: Vec::new(),
        })
    }

    pub fn with_reporter(mut self, reporter: Box<dyn Reporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Walk the root document, write its bundled form into the
    /// destination directory, and report what happened.
    pub fn bundle(mut self) -> Result<BundleReport, BundleError> {
        let started = Instant::now();
        let root = fs::canonicalize(&self.config.root)
            .unwrap_or_else(|_| self.config.root.clone());

        let content = self.walk_document(&root)?;
        let out_path = self.config.dest_dir.join(document_file_name(&root));
        self.write_document(&out_path, &content)?;

        self.reporter.info(&format!(
            "Bundled {} documents into {}",
            self.documents,
            self.config.dest_dir.display()
        ));

        let metadata = BundleMetadata {
            duration_ms: started.elapsed().as_millis() as u64,
            ..BundleMetadata::default()
        };

        Ok(BundleReport {
            root,
            dest_dir: self.config.dest_dir.clone(),
            documents: self.documents,
            copied: self.copied,
            failed: self.failed,
            warnings: self.warnings,
            metadata,
        })
    }

    /// Process one document and return its transformed content. Inclusions
    /// recurse from here; the document's queued copies run before it
    /// returns.
    fn walk_document(&mut self, path: &Path) -> Result<String, BundleError> {
        if !self.visited.insert(path.to_path_buf()) {
            return Err(BundleError::CyclicInclude {
                path: path.to_path_buf(),
            });
        }
        let text = fs::read_to_string(path).map_err(|source| BundleError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        self.documents += 1;
        self.copied.push(path.to_path_buf());
        self.reporter.info(&format!("Bundling {}", path.display()));

        let project_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        let trailing_newline = text.ends_with('\n');
        let mut cursor = DocumentCursor::new(path, &text);
        let mut out = String::with_capacity(text.len());
        let mut pending = PendingCopies::new();

        while let Some(line) = cursor.next_line() {
            // The marker is itself a comment line, so it is recognized
            // before comment stripping. The transition fires once per
            // session.
            if !self.si_started && self.rules.is_si_marker(line) {
                self.si_started = true;
                self.figure_index = 0;
                out.push_str(SI_RESET_DIRECTIVES);
                if self.config.strip_si {
                    self.append_caption_listings(&mut cursor, &mut out)?;
                    out.push_str("\\end{document}\n");
                    break;
                }
            }

            if self.config.strip_comments && line.trim_start().starts_with('%') {
                continue;
            }
            if self.config.exclude_caption_setup && self.rules.is_caption_setup_line(line) {
                continue;
            }

            let emitted = match self.rules.match_line(line) {
                Some(found) => {
                    self.apply_rule(found, line, &mut cursor, &project_dir, &mut out, &mut pending)?
                }
                None => Some(line.to_string()),
            };
            // A suppressed line emits nothing, not an empty line.
            if let Some(emitted) = emitted {
                out.push_str(&emitted);
                // Each line carries its own terminator; the last line of a
                // document without a final newline stays unterminated.
                if trailing_newline || !cursor.is_exhausted() {
                    out.push('\n');
                }
            }
        }

        let outcome = pending.execute()?;
        self.copied.extend(outcome.copied);
        for (source, error) in outcome.failures {
            self.warn(format!("Failed to copy {}: {}", source.display(), error));
            self.failed.push(source);
        }

        Ok(out)
    }

    /// Dispatch one matched line. Returns the replacement line, or `None`
    /// when the line is suppressed.
    fn apply_rule(
        &mut self,
        found: PathMatch<'_>,
        line: &str,
        cursor: &mut DocumentCursor<'_>,
        project_dir: &Path,
        out: &mut String,
        pending: &mut PendingCopies,
    ) -> Result<Option<String>, BundleError> {
        // Append the canonical extension when the argument omits it; the
        // rewritten line drops it again since the command supplies it.
        let mut argument = found.raw_path.to_string();
        let mut extension_fixed = false;
        if let Some(extension) = found.required_extension {
            if !has_extension(found.raw_path, extension) {
                argument.push_str(extension);
                extension_fixed = true;
            }
        }
        let source = resolve_path(project_dir, &argument);

        if found.kind == ResourceKind::Input {
            let nested = self.walk_document(&source)?;
            if self.config.merge {
                out.push_str(&nested);
                return Ok(None);
            }
            let file_name = document_file_name(&source);
            let out_path = self.config.dest_dir.join(&file_name);
            self.write_document(&out_path, &nested)?;
            return Ok(Some(line.replace(found.raw_path, &file_name)));
        }

        let mut file_name = document_file_name(&source);
        let mut suppressed = false;

        if found.kind.is_graphic() {
            // The counter ticks for every graphic, stripped or not.
            file_name = format!("{}{}", self.next_figure_prefix(), file_name);
            if self.config.strip_figures {
                if found.kind == ResourceKind::CustomFigure {
                    let family = found.family.unwrap_or(FigureFamily::Main);
                    self.emit_caption_block(found.name, family, line, cursor, out)?;
                }
                suppressed = true;
            }
        }

        if found.kind == ResourceKind::DocumentClass && !source.exists() {
            // Standard classes ship with the publisher; leave the line
            // alone and copy nothing.
            return Ok(Some(line.to_string()));
        }

        if suppressed {
            return Ok(None);
        }

        pending.push(CopyTask {
            source,
            dest: self.config.dest_dir.join(&file_name),
        });

        let rewritten = if extension_fixed {
            strip_extension(&file_name)
        } else {
            file_name
        };
        Ok(Some(line.replace(found.raw_path, &rewritten)))
    }

    /// Parse a figure macro block from the shared cursor and emit its
    /// caption block in place of the figure.
    fn emit_caption_block(
        &mut self,
        name: &str,
        family: FigureFamily,
        line: &str,
        cursor: &mut DocumentCursor<'_>,
        out: &mut String,
    ) -> Result<(), BundleError> {
        let opening_line = cursor.line_number();
        let outcome = self.parser.finish_reference(
            cursor,
            BlockOpener::FigureMacro { family },
            line,
            self.config.exclude_caption_setup,
        )?;

        match outcome {
            ParseOutcome::Parsed(reference) => {
                out.push_str(&reference.to_latex());
                out.push('\n');
            }
            ParseOutcome::Unterminated => {
                let message = format!(
                    "Unterminated {} block at line {} of {}; skipping its caption",
                    name,
                    opening_line,
                    cursor.path().display()
                );
                self.warn(message);
            }
        }
        Ok(())
    }

    /// Collect every table and figure reference from the rest of the
    /// cursor, recursing through `\input`, and append the caption-only
    /// listings.
    fn append_caption_listings(
        &mut self,
        cursor: &mut DocumentCursor<'_>,
        out: &mut String,
    ) -> Result<(), BundleError> {
        let mut tables = Vec::new();
        let mut figures = Vec::new();
        self.collect_references(cursor, &mut tables, &mut figures)?;

        if !tables.is_empty() {
            out.push_str("\\section*{SI Table Captions}\n");
            append_caption_pages(&tables, out);
        }
        if !figures.is_empty() {
            out.push_str("\\section*{SI Figure Captions}\n");
            append_caption_pages(&figures, out);
        }
        Ok(())
    }

    fn collect_references(
        &mut self,
        cursor: &mut DocumentCursor<'_>,
        tables: &mut Vec<Reference>,
        figures: &mut Vec<Reference>,
    ) -> Result<(), BundleError> {
        while let Some(line) = cursor.next_line() {
            let header = match self.parser.match_header(line) {
                Some(header) => header,
                None => continue,
            };

            match header.target {
                HeaderTarget::Input => {
                    let project_dir = cursor
                        .path()
                        .parent()
                        .map(Path::to_path_buf)
                        .unwrap_or_default();
                    let source = resolve_path(&project_dir, header.capture);
                    if !self.visited.insert(source.clone()) {
                        return Err(BundleError::CyclicInclude { path: source });
                    }
                    let text = fs::read_to_string(&source).map_err(|io| BundleError::Read {
                        path: source.clone(),
                        source: io,
                    })?;
                    let mut nested = DocumentCursor::new(&source, &text);
                    self.collect_references(&mut nested, tables, figures)?;
                }
                HeaderTarget::Environment(kind) => {
                    let opener = BlockOpener::Environment {
                        kind,
                        name: header.capture,
                    };
                    self.collect_one(opener, header.name, line, cursor, tables, figures)?;
                }
                HeaderTarget::CustomFigure(family) => {
                    let opener = BlockOpener::FigureMacro { family };
                    self.collect_one(opener, header.name, line, cursor, tables, figures)?;
                }
            }
        }
        Ok(())
    }

    fn collect_one(
        &mut self,
        opener: BlockOpener<'_>,
        name: &str,
        line: &str,
        cursor: &mut DocumentCursor<'_>,
        tables: &mut Vec<Reference>,
        figures: &mut Vec<Reference>,
    ) -> Result<(), BundleError> {
        let opening_line = cursor.line_number();
        let outcome = self.parser.finish_reference(
            cursor,
            opener,
            line,
            self.config.exclude_caption_setup,
        )?;

        match outcome {
            ParseOutcome::Parsed(reference) => match reference.kind {
                RefKind::Table => tables.push(reference),
                RefKind::Figure => figures.push(reference),
            },
            ParseOutcome::Unterminated => {
                let message = format!(
                    "Unterminated {} block at line {} of {}; skipping its caption",
                    name,
                    opening_line,
                    cursor.path().display()
                );
                self.warn(message);
            }
        }
        Ok(())
    }

    /// Figure prefix for the next graphic. The counter always advances;
    /// the prefix is empty unless the session appends figure names.
    fn next_figure_prefix(&mut self) -> String {
        self.figure_index += 1;
        if !self.config.append_figure_names {
            return String::new();
        }
        let marker = if self.si_started { "s" } else { "" };
        format!("figure_{}{}_", marker, self.figure_index)
    }

    /// Bundled document writes obey the same uniqueness invariant as
    /// copies: an existing destination file is fatal.
    fn write_document(&mut self, path: &Path, content: &str) -> Result<(), BundleError> {
        if path.exists() {
            return Err(CopyError::DuplicateDestination {
                dest: path.to_path_buf(),
            }
            .into());
        }
        fs::write(path, content).map_err(|source| BundleError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    fn warn(&mut self, message: String) {
        self.reporter.warn(&message);
        self.warnings.push(message);
    }
}

/// Copy one document to `dest` without bundling it.
///
/// Recognized path arguments are rewritten relative to the destination
/// directory, so the copy keeps compiling from its new location. Nothing
/// moves besides the document itself: inclusions are not followed and no
/// resources are copied. A directory destination keeps the document's
/// own name; an existing destination file is refused unless `overwrite`
/// is set.
pub fn relink_document(
    source: &Path,
    dest: &Path,
    strip_comments: bool,
    overwrite: bool,
) -> Result<PathBuf, BundleError> {
    let source = fs::canonicalize(source).map_err(|io| BundleError::Read {
        path: source.to_path_buf(),
        source: io,
    })?;
    let dest = if dest.is_dir() {
        dest.join(document_file_name(&source))
    } else {
        dest.to_path_buf()
    };
    if dest.exists() && !overwrite {
        return Err(CopyError::DuplicateDestination { dest }.into());
    }

    let text = fs::read_to_string(&source).map_err(|io| BundleError::Read {
        path: source.clone(),
        source: io,
    })?;
    let rules = PathRuleSet::compile()?;
    let project_dir = source.parent().map(Path::to_path_buf).unwrap_or_default();
    let dest_dir = {
        // A bare-filename destination lands in the working directory.
        let parent = match dest.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::canonicalize(parent).unwrap_or_else(|_| parent.to_path_buf())
    };

    let trailing_newline = text.ends_with('\n');
    let mut out = String::with_capacity(text.len());
    let mut lines = text.lines().peekable();
    while let Some(line) = lines.next() {
        if strip_comments && line.trim_start().starts_with('%') {
            continue;
        }
        match rules.match_line(line) {
            Some(found) => {
                let resolved = resolve_path(&project_dir, found.raw_path);
                let relative = relative_from(&resolved, &dest_dir);
                out.push_str(&line.replace(found.raw_path, &relative.to_string_lossy()));
            }
            None => out.push_str(line),
        }
        if trailing_newline || lines.peek().is_some() {
            out.push('\n');
        }
    }

    fs::write(&dest, out).map_err(|io| BundleError::Write {
        path: dest.clone(),
        source: io,
    })?;
    Ok(dest)
}

/// Render references in pages of [`CAPTIONS_PER_PAGE`], a blank line
/// between blocks and a `\clearpage` after each page.
fn append_caption_pages(references: &[Reference], out: &mut String) {
    for page in references.chunks(CAPTIONS_PER_PAGE) {
        let blocks: Vec<String> = page.iter().map(Reference::to_latex).collect();
        out.push_str(&blocks.join("\n"));
        out.push('\n');
        out.push_str("\\clearpage\n");
    }
}

/// Join a captured argument onto the including document's directory and
/// resolve it. Canonicalization needs the file to exist; for paths that
/// may not (a publisher-supplied document class) fall back to lexical
/// normalization.
fn resolve_path(project_dir: &Path, argument: &str) -> PathBuf {
    let joined = project_dir.join(argument);
    fs::canonicalize(&joined).unwrap_or_else(|_| normalize_lexically(&joined))
}

fn normalize_lexically(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                // Only a normal component can be popped; `..` segments
                // above the start of the path accumulate.
                let can_pop = matches!(
                    normalized.components().next_back(),
                    Some(Component::Normal(_))
                );
                if can_pop {
                    normalized.pop();
                } else if !normalized.has_root() {
                    normalized.push("..");
                }
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

/// Express `target` relative to `base`, walking up with `..` segments
/// where the two diverge. Both paths must already be absolute and
/// normalized. Identical paths come back as `.`.
fn relative_from(target: &Path, base: &Path) -> PathBuf {
    let mut target_parts = target.components().peekable();
    let mut base_parts = base.components().peekable();
    while let (Some(t), Some(b)) = (target_parts.peek(), base_parts.peek()) {
        if t != b {
            break;
        }
        target_parts.next();
        base_parts.next();
    }
    let mut relative = PathBuf::new();
    for _ in base_parts {
        relative.push("..");
    }
    for part in target_parts {
        relative.push(part.as_os_str());
    }
    if relative.as_os_str().is_empty() {
        relative.push(".");
    }
    relative
}

fn document_file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn has_extension(argument: &str, required: &str) -> bool {
    let want = required.trim_start_matches('.');
    Path::new(argument)
        .extension()
        .and_then(|ext| ext.to_str())
        == Some(want)
}

fn strip_extension(file_name: &str) -> String {
    Path::new(file_name)
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| file_name.to_string())
}
