use std::path::PathBuf;

/// Configuration for a bundle session
#[derive(Debug, Clone)]
pub struct BundleConfig {
    /// Root document of the project
    pub root: PathBuf,
    /// Directory receiving bundled documents and copied resources
    pub dest_dir: PathBuf,
    /// Drop lines whose first non-whitespace character is `%`
    pub strip_comments: bool,
    /// Prefix copied graphics with their figure number
    pub append_figure_names: bool,
    /// Reduce the supporting-information section to caption listings
    pub strip_si: bool,
    /// Replace figure bodies with caption-only blocks
    pub strip_figures: bool,
    /// Drop `\captionsetup` lines and omit them from caption blocks
    pub exclude_caption_setup: bool,
    /// Splice included documents into their parent instead of writing them separately
    pub merge: bool,
}

impl Default for BundleConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("main.tex"),
            dest_dir: PathBuf::from("submit"),
            strip_comments: true,
            append_figure_names: false,
            strip_si: false,
            strip_figures: false,
            exclude_caption_setup: false,
            merge: false,
        }
    }
}

impl BundleConfig {
    pub fn new(root: PathBuf, dest_dir: PathBuf) -> Self {
        Self {
            root,
            dest_dir,
            ..Default::default()
        }
    }

    pub fn with_strip_comments(mut self, strip: bool) -> Self {
        self.strip_comments = strip;
        self
    }

    pub fn with_append_figure_names(mut self, append: bool) -> Self {
        self.append_figure_names = append;
        self
    }

    pub fn with_strip_si(mut self, strip: bool) -> Self {
        self.strip_si = strip;
        self
    }

    pub fn with_strip_figures(mut self, strip: bool) -> Self {
        self.strip_figures = strip;
        self
    }

    pub fn with_exclude_caption_setup(mut self, exclude: bool) -> Self {
        self.exclude_caption_setup = exclude;
        self
    }

    pub fn with_merge(mut self, merge: bool) -> Self {
        self.merge = merge;
        self
    }
}
