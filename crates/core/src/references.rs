//! Parsing of figure and table blocks into [`Reference`] values.
//!
//! A reference block starts on the line that matched a header rule and is
//! accumulated from a shared forward cursor until its terminator: the
//! matching `\end{...}` for environments, or a line carrying a figure
//! label token for the project's figure macros. The consuming-cursor
//! arrangement means lines inside a parsed block are never seen by the
//! caller's own line loop.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::braces::{balanced_group, balanced_groups};
use crate::models::{FigureFamily, RefKind, Reference};
use crate::rules::{HeaderMatch, HeaderRuleSet, RuleError};
use regex::Regex;

/// Caption setup synthesized for supporting-information figure macros
/// that carry no explicit one.
const SUPPLEMENTARY_CAPTION_SETUP: &str = "name=Figure S, labelformat=noSpace, listformat=sFigList";
/// Caption setup synthesized for main-text figure macros.
const MAIN_CAPTION_SETUP: &str = "listformat=figList";

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("Malformed figure macro (expected 3 or 5 arguments, found {found}): {text}")]
    MalformedFigure { found: usize, text: String },
}

/// Line-at-a-time view of one document.
///
/// The bundler and the reference parser share one cursor per document, so
/// consuming a reference block advances the outer scan past it.
#[derive(Debug)]
pub struct DocumentCursor<'t> {
    path: PathBuf,
    lines: Vec<&'t str>,
    pos: usize,
}

impl<'t> DocumentCursor<'t> {
    pub fn new(path: &Path, text: &'t str) -> Self {
        Self {
            path: path.to_path_buf(),
            lines: text.lines().collect(),
            pos: 0,
        }
    }

    pub fn next_line(&mut self) -> Option<&'t str> {
        let line = self.lines.get(self.pos).copied();
        if line.is_some() {
            self.pos += 1;
        }
        line
    }

    /// One-based number of the most recently yielded line
    pub fn line_number(&self) -> usize {
        self.pos
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn is_exhausted(&self) -> bool {
        self.pos >= self.lines.len()
    }

    pub fn seek(&mut self, position: usize) {
        self.pos = position;
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// What opened a reference block
#[derive(Debug, Clone, Copy)]
pub enum BlockOpener<'l> {
    /// `\begin{...}` with the environment name as written
    Environment { kind: RefKind, name: &'l str },
    /// One of the project's figure macros
    FigureMacro { family: FigureFamily },
}

/// Result of finishing one reference block
#[derive(Debug)]
pub enum ParseOutcome {
    Parsed(Reference),
    /// The terminator never appeared; the cursor has been rewound to the
    /// line after the opener so the caller's scan can resume there.
    Unterminated,
}

/// Block parser with its compiled attribute patterns
#[derive(Debug)]
pub struct ReferenceParser {
    headers: HeaderRuleSet,
    caption_setup_attr: Regex,
    caption_attr: Regex,
    label_attr: Regex,
}

impl ReferenceParser {
    pub fn new() -> Result<Self, RuleError> {
        Ok(Self {
            headers: HeaderRuleSet::compile()?,
            caption_setup_attr: Regex::new(r"(?s)\\captionsetup\s*(\{.*)")?,
            caption_attr: Regex::new(r"(?s)\\caption\s*(?:\[[^\]]*\])?\s*(\{.*)")?,
            label_attr: Regex::new(r"(?s)\\caption\s*(?:\[[^\]]*\])?\s*\{.*\\label\s*(\{.*)")?,
        })
    }

    /// First header rule firing on `line`
    pub fn match_header<'l>(&self, line: &'l str) -> Option<HeaderMatch<'l>> {
        self.headers.match_line(line)
    }

    /// Consume the rest of a reference block from `cursor` and build the
    /// reference.
    ///
    /// Comment lines are skipped and never terminate a block. Only a
    /// figure macro with a wrong argument count is an error; a missing
    /// terminator is reported through [`ParseOutcome::Unterminated`].
    pub fn finish_reference(
        &self,
        cursor: &mut DocumentCursor,
        opener: BlockOpener,
        opening_line: &str,
        exclude_caption_setup: bool,
    ) -> Result<ParseOutcome, ParseError> {
        let resume = cursor.position();
        let mut span = String::with_capacity(opening_line.len() + 64);
        span.push_str(opening_line);
        span.push('\n');

        let mut closed = false;
        while let Some(line) = cursor.next_line() {
            if line.trim_start().starts_with('%') {
                continue;
            }
            span.push_str(line);
            span.push('\n');

            let stop = match opener {
                BlockOpener::Environment { name, .. } => {
                    self.headers.closes_environment(line, name)
                }
                BlockOpener::FigureMacro { .. } => self.headers.has_label_token(line),
            };
            if stop {
                closed = true;
                break;
            }
        }

        if !closed {
            cursor.seek(resume);
            return Ok(ParseOutcome::Unterminated);
        }

        match opener {
            BlockOpener::Environment { kind, .. } => Ok(ParseOutcome::Parsed(
                self.environment_reference(kind, &span, exclude_caption_setup),
            )),
            BlockOpener::FigureMacro { family } => self
                .figure_macro_reference(family, &span, exclude_caption_setup)
                .map(ParseOutcome::Parsed),
        }
    }

    /// Attributes of a `\begin{figure}`/`\begin{table}` span. A missing or
    /// unbalanced attribute leaves its default.
    fn environment_reference(
        &self,
        kind: RefKind,
        span: &str,
        exclude_caption_setup: bool,
    ) -> Reference {
        let caption_setup = self
            .caption_setup_attr
            .captures(span)
            .and_then(|caps| caps.get(1))
            .and_then(|tail| balanced_group(tail.as_str(), '{', '}'))
            .map(|s| s.to_string());

        let caption = self
            .caption_attr
            .captures(span)
            .and_then(|caps| caps.get(1))
            .and_then(|tail| balanced_group(tail.as_str(), '{', '}'))
            .unwrap_or("")
            .to_string();

        let label = self
            .label_attr
            .captures(span)
            .and_then(|caps| caps.get(1))
            .and_then(|tail| balanced_group(tail.as_str(), '{', '}'))
            .map(|s| s.to_string());

        Reference {
            kind,
            caption_setup,
            caption,
            label,
            exclude_caption_setup,
        }
    }

    /// Fields of a figure macro span. Three top-level groups are
    /// `(path, caption, label)`; five are
    /// `(size, path, caption_setup, caption, label)`.
    fn figure_macro_reference(
        &self,
        family: FigureFamily,
        span: &str,
        exclude_caption_setup: bool,
    ) -> Result<Reference, ParseError> {
        let fields = balanced_groups(span, '{', '}');

        let (explicit_setup, caption, label) = match fields.as_slice() {
            [_path, caption, label] => (None, *caption, *label),
            [_size, _path, setup, caption, label] => (Some(*setup), *caption, *label),
            _ => {
                return Err(ParseError::MalformedFigure {
                    found: fields.len(),
                    text: span.trim().to_string(),
                })
            }
        };

        // An explicit setup survives even when empty; only absence
        // synthesizes the family default.
        let caption_setup = match explicit_setup {
            Some(setup) => Some(setup.to_string()),
            None => Some(default_caption_setup(family).to_string()),
        };

        Ok(Reference {
            kind: RefKind::Figure,
            caption_setup,
            caption: caption.to_string(),
            label: Some(label.to_string()),
            exclude_caption_setup,
        })
    }
}

fn default_caption_setup(family: FigureFamily) -> &'static str {
    match family {
        FigureFamily::Main => MAIN_CAPTION_SETUP,
        FigureFamily::Supplementary => SUPPLEMENTARY_CAPTION_SETUP,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser() -> ReferenceParser {
        ReferenceParser::new().unwrap()
    }

    fn cursor_over(text: &str) -> DocumentCursor<'_> {
        DocumentCursor::new(Path::new("/paper/main.tex"), text)
    }

    #[test]
    fn test_table_environment_reference() {
        let parser = parser();
        let body = "    \\caption{Rates by group.}\n    \\label{tab:rates}\n\\end{table}\nafter";
        let mut cursor = cursor_over(body);

        let outcome = parser
            .finish_reference(
                &mut cursor,
                BlockOpener::Environment {
                    kind: RefKind::Table,
                    name: "table",
                },
                r"\begin{table}[h]",
                false,
            )
            .unwrap();

        match outcome {
            ParseOutcome::Parsed(reference) => {
                assert_eq!(reference.kind, RefKind::Table);
                assert_eq!(reference.caption, "Rates by group.");
                assert_eq!(reference.label.as_deref(), Some("tab:rates"));
                assert_eq!(reference.caption_setup, None);
            }
            ParseOutcome::Unterminated => panic!("block should close"),
        }

        // The cursor resumes after the consumed block.
        assert_eq!(cursor.next_line(), Some("after"));
    }

    #[test]
    fn test_caption_short_argument_skipped() {
        let parser = parser();
        let body = "\\caption[Short]{The full version.}\n\\end{figure}";
        let mut cursor = cursor_over(body);

        let outcome = parser
            .finish_reference(
                &mut cursor,
                BlockOpener::Environment {
                    kind: RefKind::Figure,
                    name: "figure",
                },
                r"\begin{figure}",
                false,
            )
            .unwrap();

        match outcome {
            ParseOutcome::Parsed(reference) => {
                assert_eq!(reference.caption, "The full version.");
            }
            ParseOutcome::Unterminated => panic!("block should close"),
        }
    }

    #[test]
    fn test_environment_without_caption() {
        let parser = parser();
        let body = "some body\n\\end{table}";
        let mut cursor = cursor_over(body);

        let outcome = parser
            .finish_reference(
                &mut cursor,
                BlockOpener::Environment {
                    kind: RefKind::Table,
                    name: "table",
                },
                r"\begin{table}",
                false,
            )
            .unwrap();

        match outcome {
            ParseOutcome::Parsed(reference) => {
                assert_eq!(reference.caption, "");
                assert_eq!(reference.label, None);
            }
            ParseOutcome::Unterminated => panic!("block should close"),
        }
    }

    #[test]
    fn test_captionsetup_extracted() {
        let parser = parser();
        let body =
            "\\captionsetup{name=Table S}\n\\caption{Supplementary rates.}\n\\end{table}";
        let mut cursor = cursor_over(body);

        let outcome = parser
            .finish_reference(
                &mut cursor,
                BlockOpener::Environment {
                    kind: RefKind::Table,
                    name: "table",
                },
                r"\begin{table}",
                false,
            )
            .unwrap();

        match outcome {
            ParseOutcome::Parsed(reference) => {
                assert_eq!(reference.caption_setup.as_deref(), Some("name=Table S"));
                assert_eq!(reference.caption, "Supplementary rates.");
            }
            ParseOutcome::Unterminated => panic!("block should close"),
        }
    }

    #[test]
    fn test_commented_close_never_terminates() {
        let parser = parser();
        let body = "% \\end{table}\n\\caption{Still open above.}\n\\end{table}";
        let mut cursor = cursor_over(body);

        let outcome = parser
            .finish_reference(
                &mut cursor,
                BlockOpener::Environment {
                    kind: RefKind::Table,
                    name: "table",
                },
                r"\begin{table}",
                false,
            )
            .unwrap();

        match outcome {
            ParseOutcome::Parsed(reference) => {
                assert_eq!(reference.caption, "Still open above.");
            }
            ParseOutcome::Unterminated => panic!("block should close"),
        }
    }

    #[test]
    fn test_unterminated_block_rewinds_cursor() {
        let parser = parser();
        let body = "row one\nrow two";
        let mut cursor = cursor_over(body);

        let outcome = parser
            .finish_reference(
                &mut cursor,
                BlockOpener::Environment {
                    kind: RefKind::Table,
                    name: "table",
                },
                r"\begin{table}",
                false,
            )
            .unwrap();

        assert!(matches!(outcome, ParseOutcome::Unterminated));
        assert_eq!(cursor.next_line(), Some("row one"));
    }

    #[test]
    fn test_si_figure_macro_three_fields() {
        let parser = parser();
        let body = "{Coverage map of the region.}\n{fig:si-map}\nafter";
        let mut cursor = cursor_over(body);

        let outcome = parser
            .finish_reference(
                &mut cursor,
                BlockOpener::FigureMacro {
                    family: FigureFamily::Supplementary,
                },
                r"\siFigure{../img/map.pdf}",
                false,
            )
            .unwrap();

        match outcome {
            ParseOutcome::Parsed(reference) => {
                assert_eq!(reference.kind, RefKind::Figure);
                assert_eq!(reference.caption, "Coverage map of the region.");
                assert_eq!(reference.label.as_deref(), Some("fig:si-map"));
                assert_eq!(
                    reference.caption_setup.as_deref(),
                    Some("name=Figure S, labelformat=noSpace, listformat=sFigList")
                );
            }
            ParseOutcome::Unterminated => panic!("block should close"),
        }

        assert_eq!(cursor.next_line(), Some("after"));
    }

    #[test]
    fn test_width_figure_macro_five_fields() {
        let parser = parser();
        let body = "{width=0.8\\linewidth}\n{A wide figure.}\n{fig:wide}";
        let mut cursor = cursor_over(body);

        let outcome = parser
            .finish_reference(
                &mut cursor,
                BlockOpener::FigureMacro {
                    family: FigureFamily::Main,
                },
                r"\widthFigure{0.8}{img/wide.pdf}",
                false,
            )
            .unwrap();

        match outcome {
            ParseOutcome::Parsed(reference) => {
                assert_eq!(
                    reference.caption_setup.as_deref(),
                    Some("width=0.8\\linewidth")
                );
                assert_eq!(reference.caption, "A wide figure.");
                assert_eq!(reference.label.as_deref(), Some("fig:wide"));
            }
            ParseOutcome::Unterminated => panic!("block should close"),
        }
    }

    #[test]
    fn test_main_macro_synthesizes_default_setup() {
        let parser = parser();
        let body = "{Main figure caption.}\n{fig:main}";
        let mut cursor = cursor_over(body);

        let outcome = parser
            .finish_reference(
                &mut cursor,
                BlockOpener::FigureMacro {
                    family: FigureFamily::Main,
                },
                r"\mFigure{img/main.pdf}",
                false,
            )
            .unwrap();

        match outcome {
            ParseOutcome::Parsed(reference) => {
                assert_eq!(reference.caption_setup.as_deref(), Some("listformat=figList"));
            }
            ParseOutcome::Unterminated => panic!("block should close"),
        }
    }

    #[test]
    fn test_explicit_empty_setup_survives() {
        let parser = parser();
        let body = "{}\n{No setup wanted.}\n{fig:none}";
        let mut cursor = cursor_over(body);

        let outcome = parser
            .finish_reference(
                &mut cursor,
                BlockOpener::FigureMacro {
                    family: FigureFamily::Supplementary,
                },
                r"\siFigure{a.pdf}{img/none.pdf}",
                false,
            )
            .unwrap();

        match outcome {
            ParseOutcome::Parsed(reference) => {
                assert_eq!(reference.caption_setup.as_deref(), Some(""));
            }
            ParseOutcome::Unterminated => panic!("block should close"),
        }
    }

    #[test]
    fn test_malformed_macro_arity_is_fatal() {
        let parser = parser();
        let body = "{a caption}\n{an extra field}\n{fig:bad}";
        let mut cursor = cursor_over(body);

        let err = parser
            .finish_reference(
                &mut cursor,
                BlockOpener::FigureMacro {
                    family: FigureFamily::Supplementary,
                },
                r"\siFigure{img.pdf}",
                false,
            )
            .unwrap_err();

        match err {
            ParseError::MalformedFigure { found, .. } => assert_eq!(found, 4),
        }
    }
}
