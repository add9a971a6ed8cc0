//! Ordered pattern registries for recognized LaTeX commands.
//!
//! Rules are plain data: a compiled pattern, a classification, and a couple
//! of flags. Matching is deterministic: rules are tried in declaration
//! order and the first live capture wins. `regex` has no lookbehind, so
//! commented-out text and macro definitions are rejected by inspecting
//! the text before each candidate match instead.

use crate::models::{FigureFamily, RefKind, ResourceKind};
use regex::Regex;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RuleError {
    #[error("Failed to compile rule pattern: {0}")]
    PatternError(#[from] regex::Error),
}

/// One recognized resource command: pattern plus classification
#[derive(Debug)]
pub struct PathRule {
    /// Command name, for messages
    pub name: &'static str,
    pattern: Regex,
    /// What the captured path refers to
    pub kind: ResourceKind,
    /// Extension appended when the argument lacks it
    pub required_extension: Option<&'static str>,
    /// Reject matches that are part of a macro definition
    define_guard: bool,
    /// Caption-setup family of a custom figure macro
    pub family: Option<FigureFamily>,
}

impl PathRule {
    fn new(name: &'static str, pattern: &str, kind: ResourceKind) -> Result<Self, RuleError> {
        Ok(Self {
            name,
            pattern: Regex::new(pattern)?,
            kind,
            required_extension: None,
            define_guard: false,
            family: None,
        })
    }

    fn with_extension(mut self, extension: &'static str) -> Self {
        self.required_extension = Some(extension);
        self
    }

    fn guarded(mut self) -> Self {
        self.define_guard = true;
        self
    }

    fn with_family(mut self, family: FigureFamily) -> Self {
        self.family = Some(family);
        self
    }
}

/// A path rule firing on one line
#[derive(Debug)]
pub struct PathMatch<'l> {
    pub name: &'static str,
    pub kind: ResourceKind,
    pub required_extension: Option<&'static str>,
    pub family: Option<FigureFamily>,
    /// The captured path argument, as written in the document
    pub raw_path: &'l str,
}

/// The walker's command registry
#[derive(Debug)]
pub struct PathRuleSet {
    rules: Vec<PathRule>,
    si_marker: Regex,
    caption_setup_line: Regex,
}

impl PathRuleSet {
    /// Compile the registry.
    ///
    /// Declaration order is the match priority: the project's figure
    /// macros come before the generic `\includegraphics` rule so a macro
    /// invocation is classified by its macro, and `\input` comes before
    /// the generic rules so inclusion takes precedence on mixed lines.
    pub fn compile() -> Result<Self, RuleError> {
        let rules = vec![
            PathRule::new(
                "widthFigure",
                r"\\widthFigure\{[0-9.]*\}\{([^}#]*)\}",
                ResourceKind::CustomFigure,
            )?
            .guarded()
            .with_family(FigureFamily::Main),
            PathRule::new(
                "siEightFigure",
                r"\\siEightFigure\{([^}#]*)\}",
                ResourceKind::CustomFigure,
            )?
            .guarded()
            .with_family(FigureFamily::Supplementary),
            PathRule::new(
                "siSidewaysFigure",
                r"\\siSidewaysFigure\{([^}#]*)\}",
                ResourceKind::CustomFigure,
            )?
            .guarded()
            .with_family(FigureFamily::Supplementary),
            PathRule::new(
                "siFigure",
                r"\\siFigure\{([^}#]*)\}",
                ResourceKind::CustomFigure,
            )?
            .guarded()
            .with_family(FigureFamily::Supplementary),
            PathRule::new(
                "mFigure",
                r"\\mFigure\{([^}#]*)\}",
                ResourceKind::CustomFigure,
            )?
            .guarded()
            .with_family(FigureFamily::Main),
            PathRule::new("input", r"\\input\{([^}]*)\}", ResourceKind::Input)?,
            PathRule::new(
                "includegraphics",
                r"\\includegraphics.*\{([^}#]*)\}",
                ResourceKind::Graphic,
            )?
            .guarded(),
            PathRule::new(
                "bibliography",
                r"\\bibliography\{([^}]*)\}",
                ResourceKind::Bibliography,
            )?
            .with_extension(".bib"),
            PathRule::new(
                "bibliographystyle",
                r"\\bibliographystyle\{([^}]*)\}",
                ResourceKind::BibliographyStyle,
            )?
            .with_extension(".bst"),
            PathRule::new(
                "documentclass",
                r"\\documentclass\[?.*\]?\{([^}]*)\}",
                ResourceKind::DocumentClass,
            )?
            .with_extension(".cls"),
        ];

        Ok(Self {
            rules,
            si_marker: Regex::new(r"(?i)^\s*%+\s*supporting\s+info")?,
            caption_setup_line: Regex::new(r"\\captionsetup.*\{[^}#]*\}")?,
        })
    }

    /// First rule firing on `line`, with its path capture
    pub fn match_line<'l>(&self, line: &'l str) -> Option<PathMatch<'l>> {
        for rule in &self.rules {
            if let Some(raw_path) = first_live_capture(&rule.pattern, line, rule.define_guard) {
                return Some(PathMatch {
                    name: rule.name,
                    kind: rule.kind,
                    required_extension: rule.required_extension,
                    family: rule.family,
                    raw_path,
                });
            }
        }
        None
    }

    /// The supporting-information marker: a comment line reading
    /// `% Supporting Info...`, any case, any number of percent signs.
    pub fn is_si_marker(&self, line: &str) -> bool {
        self.si_marker.is_match(line)
    }

    /// A `\captionsetup{...}` use (not a definition, not commented out)
    pub fn is_caption_setup_line(&self, line: &str) -> bool {
        for found in self.caption_setup_line.find_iter(line) {
            let prefix = &line[..found.start()];
            if prefix.contains('%') {
                return false;
            }
            if prefix.ends_with("newcommand{") || prefix.ends_with("def") {
                continue;
            }
            return true;
        }
        false
    }
}

/// What a header match means during reference collection
#[derive(Debug, Clone, Copy)]
pub enum HeaderTarget {
    /// `\begin{...table...}` or `\begin{...figure...}`
    Environment(RefKind),
    /// `\input` of another document
    Input,
    /// Custom figure macro
    CustomFigure(FigureFamily),
}

#[derive(Debug)]
struct HeaderRule {
    name: &'static str,
    pattern: Regex,
    target: HeaderTarget,
    define_guard: bool,
}

impl HeaderRule {
    fn new(name: &'static str, pattern: &str, target: HeaderTarget) -> Result<Self, RuleError> {
        Ok(Self {
            name,
            pattern: Regex::new(pattern)?,
            target,
            define_guard: false,
        })
    }

    fn guarded(mut self) -> Self {
        self.define_guard = true;
        self
    }
}

/// A header rule firing on one line
#[derive(Debug)]
pub struct HeaderMatch<'l> {
    pub name: &'static str,
    pub target: HeaderTarget,
    /// Environment name or included path, depending on the target
    pub capture: &'l str,
}

/// The registry for reference scanning: block openers plus the two
/// terminator matchers.
#[derive(Debug)]
pub struct HeaderRuleSet {
    rules: Vec<HeaderRule>,
    end_environment: Regex,
    label_token: Regex,
}

impl HeaderRuleSet {
    /// Compile the registry; declaration order is the match priority,
    /// mirroring the path rules (figure macros first, then environments,
    /// then `\input`).
    pub fn compile() -> Result<Self, RuleError> {
        let rules = vec![
            HeaderRule::new(
                "widthFigure",
                r"\\widthFigure\{[0-9.]*\}\{([^}#]*)\}",
                HeaderTarget::CustomFigure(FigureFamily::Main),
            )?
            .guarded(),
            HeaderRule::new(
                "siEightFigure",
                r"\\siEightFigure\{([^}#]*)\}",
                HeaderTarget::CustomFigure(FigureFamily::Supplementary),
            )?
            .guarded(),
            HeaderRule::new(
                "siSidewaysFigure",
                r"\\siSidewaysFigure\{([^}#]*)\}",
                HeaderTarget::CustomFigure(FigureFamily::Supplementary),
            )?
            .guarded(),
            HeaderRule::new(
                "siFigure",
                r"\\siFigure\{([^}#]*)\}",
                HeaderTarget::CustomFigure(FigureFamily::Supplementary),
            )?
            .guarded(),
            HeaderRule::new(
                "mFigure",
                r"\\mFigure\{([^}#]*)\}",
                HeaderTarget::CustomFigure(FigureFamily::Main),
            )?
            .guarded(),
            HeaderRule::new(
                "table",
                r"(?i)\\begin\s*\{\s*(\w*table\w*)\s*\}",
                HeaderTarget::Environment(RefKind::Table),
            )?,
            HeaderRule::new(
                "figure",
                r"(?i)\\begin\s*\{\s*(\w*figure\w*)\s*\}",
                HeaderTarget::Environment(RefKind::Figure),
            )?,
            HeaderRule::new("input", r"\\input.*\{([^}]*)\}", HeaderTarget::Input)?,
        ];

        Ok(Self {
            rules,
            end_environment: Regex::new(r"\\end\s*\{\s*(\w+)\s*\}")?,
            label_token: Regex::new(r"\{fig[a-zA-Z0-9:_-]+\}")?,
        })
    }

    /// First header firing on `line`
    pub fn match_line<'l>(&self, line: &'l str) -> Option<HeaderMatch<'l>> {
        for rule in &self.rules {
            if let Some(capture) = first_live_capture(&rule.pattern, line, rule.define_guard) {
                return Some(HeaderMatch {
                    name: rule.name,
                    target: rule.target,
                    capture,
                });
            }
        }
        None
    }

    /// Does `line` close the named environment? The close is matched
    /// case-sensitively even though environment opens are not.
    pub fn closes_environment(&self, line: &str, environment: &str) -> bool {
        for caps in self.end_environment.captures_iter(line) {
            let whole = match caps.get(0) {
                Some(m) => m,
                None => continue,
            };
            if line[..whole.start()].contains('%') {
                return false;
            }
            if caps.get(1).map(|m| m.as_str()) == Some(environment) {
                return true;
            }
        }
        false
    }

    /// Does `line` carry a braced figure-label token (`{fig...}`) that is
    /// not the argument of a `\ref`-style command?
    pub fn has_label_token(&self, line: &str) -> bool {
        for found in self.label_token.find_iter(line) {
            if !line[..found.start()].ends_with("ref") {
                return true;
            }
        }
        false
    }
}

/// First capture of `pattern` on `line` that survives the prefix checks:
/// a `%` ahead of a candidate comments out the rest of the line and stops
/// the scan; a guarded candidate sitting right after `newcommand{` or
/// `def` is a definition, not a use; empty captures never match.
fn first_live_capture<'l>(pattern: &Regex, line: &'l str, define_guard: bool) -> Option<&'l str> {
    for caps in pattern.captures_iter(line) {
        let whole = match caps.get(0) {
            Some(m) => m,
            None => continue,
        };
        let prefix = &line[..whole.start()];
        if prefix.contains('%') {
            return None;
        }
        if define_guard && (prefix.ends_with("newcommand{") || prefix.ends_with("def")) {
            continue;
        }
        match caps.get(1) {
            Some(m) if !m.as_str().is_empty() => return Some(m.as_str()),
            _ => continue,
        }
    }
    None
}
