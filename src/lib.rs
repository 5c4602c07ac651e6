//! # carbonfill
//!
//! Template expansion engine for greenhouse-gas emissions reports.
//!
//! A Word template carries `{{NAME}}` placeholders and repeatable sections
//! delimited by marker paragraphs (`[[START_LOT]]` … `[[END_LOT]]`).
//! Given the organisation's emissions data, carbonfill repeats every
//! section once per lot, activity and emission post, fills in the values,
//! embeds charts, tables and images, and removes whatever the data does
//! not cover.
//!
//! ## Quick Start
//!
//! ```no_run
//! use carbonfill::{render_file, Carbonfill, DocxPackage, ReportContext, ReportData};
//!
//! fn main() -> carbonfill::Result<()> {
//!     // One call
//!     render_file("template.docx", "report.json", "report.docx")?;
//!
//!     // Or with the builder
//!     let ctx = ReportContext::build(ReportData::from_path("report.json")?)?;
//!     let template = DocxPackage::open("template.docx")?;
//!     let output = Carbonfill::new()
//!         .with_assets_dir("./assets")
//!         .render(&template, &ctx)?;
//!     println!("{} section(s) generated", output.stats.instance_count());
//!     output.save("report.docx")?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Nested sections**: lots → activities → ranked and residual posts,
//!   each repeated as many times as the data requires, zero included
//! - **Split-run placeholders**: tokens broken over several runs by Word
//!   are still found
//! - **Media**: pie and bar charts, detail tables and static images
//! - **Clean output**: no marker paragraph and no bare unresolved
//!   placeholder survives expansion
//! - **Parallel batches**: independent reports render on Rayon's pool

pub mod data;
pub mod error;
pub mod model;
pub mod package;
pub mod render;
pub mod template;

// Re-export commonly used types
pub use data::{ReportContext, ReportData};
pub use error::{Error, Result};
pub use model::{
    Alignment, Block, Document, ImageRef, InlineContent, Metadata, Paragraph, ParagraphStyle,
    Resource, Table, TableCell, TableRow, TextRun, TextStyle,
};
pub use package::DocxPackage;
pub use render::{Backends, JsonFormat};
pub use template::{
    expand, BlockKind, CleanupOptions, ExpandOptions, ExpandStats, MediaSizes, TemplateOutline,
};

use rayon::prelude::*;
use std::path::Path;

/// Load and aggregate report data from a JSON file.
///
/// # Example
///
/// ```no_run
/// let ctx = carbonfill::load_context("report.json")?;
/// println!("{} ({})", ctx.org_name(), ctx.year());
/// # Ok::<(), carbonfill::Error>(())
/// ```
pub fn load_context<P: AsRef<Path>>(path: P) -> Result<ReportContext> {
    ReportContext::build(ReportData::from_path(path)?)
}

/// Expand `template` with the data in `data` and write the report to
/// `output`, with default options and no static assets.
pub fn render_file<T, D, O>(template: T, data: D, output: O) -> Result<ExpandStats>
where
    T: AsRef<Path>,
    D: AsRef<Path>,
    O: AsRef<Path>,
{
    let ctx = load_context(data)?;
    let result = Carbonfill::new().render_path(template, &ctx)?;
    result.save(output)?;
    Ok(result.stats)
}

/// Outline of the markers and placeholders of a template file.
pub fn inspect_file<P: AsRef<Path>>(template: P) -> Result<TemplateOutline> {
    let doc = DocxPackage::open(template)?.document()?;
    Ok(TemplateOutline::scan(&doc))
}

/// Builder for report generation.
///
/// # Example
///
/// ```no_run
/// use carbonfill::{Carbonfill, CleanupOptions, DocxPackage};
///
/// let ctx = carbonfill::load_context("report.json")?;
/// let bytes = Carbonfill::new()
///     .without_media()
///     .with_cleanup(CleanupOptions::standard())
///     .render(&DocxPackage::open("template.docx")?, &ctx)?
///     .to_docx_bytes()?;
/// # Ok::<(), carbonfill::Error>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct Carbonfill {
    options: ExpandOptions,
    backends: Backends,
}

impl Carbonfill {
    /// Create a new builder with default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace all expansion options.
    pub fn with_options(mut self, options: ExpandOptions) -> Self {
        self.options = options;
        self
    }

    /// Read static images (logo, catalog images) from `dir`.
    pub fn with_assets_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.backends = Backends {
            charts: self.backends.charts,
            ..Backends::with_assets_dir(dir)
        };
        self
    }

    /// Use custom media backends.
    pub fn with_backends(mut self, backends: Backends) -> Self {
        self.backends = backends;
        self
    }

    /// Leave charts, tables and images out; their anchors are cleaned up.
    pub fn without_media(mut self) -> Self {
        self.options = self.options.with_media(false);
        self
    }

    /// Set the cleanup sub-passes.
    pub fn with_cleanup(mut self, cleanup: CleanupOptions) -> Self {
        self.options = self.options.with_cleanup(cleanup);
        self
    }

    /// Set media display sizes.
    pub fn with_sizes(mut self, sizes: MediaSizes) -> Self {
        self.options = self.options.with_sizes(sizes);
        self
    }

    /// Expansion options in effect.
    pub fn options(&self) -> &ExpandOptions {
        &self.options
    }

    /// Expand a copy of `template` for `ctx`.
    pub fn render(&self, template: &DocxPackage, ctx: &ReportContext) -> Result<ReportOutput> {
        let mut document = template.document()?;
        let stats = expand(&mut document, ctx, &self.backends, &self.options);
        Ok(ReportOutput {
            document,
            stats,
            package: template.clone(),
        })
    }

    /// Open the template at `path` and expand it for `ctx`.
    pub fn render_path<P: AsRef<Path>>(&self, path: P, ctx: &ReportContext) -> Result<ReportOutput> {
        let path = path.as_ref();
        let template = DocxPackage::open(path)?;
        let mut output = self.render(&template, ctx)?;
        output.document.metadata.template = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned());
        Ok(output)
    }

    /// Expand one copy of `template` per context, in parallel.
    ///
    /// Results come back in the order of `contexts`.
    pub fn render_batch(
        &self,
        template: &DocxPackage,
        contexts: &[ReportContext],
    ) -> Vec<Result<ReportOutput>> {
        contexts
            .par_iter()
            .map(|ctx| self.render(template, ctx))
            .collect()
    }
}

/// An expanded report, ready to be written.
#[derive(Debug, Clone)]
pub struct ReportOutput {
    /// The expanded document
    pub document: Document,
    /// What expansion did
    pub stats: ExpandStats,
    /// Package the document is written back into
    package: DocxPackage,
}

impl ReportOutput {
    /// Serialize as a .docx package.
    pub fn to_docx_bytes(&self) -> Result<Vec<u8>> {
        self.package.to_bytes(&self.document)
    }

    /// Write the .docx package to `path`.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.package.save(&self.document, path)
    }

    /// Dump the statistics and the expanded document model as JSON.
    pub fn to_json(&self, format: JsonFormat) -> Result<String> {
        render::report_to_json(&self.document, &self.stats, format)
    }

    /// Get plain text of the expanded document.
    pub fn plain_text(&self) -> String {
        self.document.plain_text()
    }

    /// Get the document.
    pub fn document(&self) -> &Document {
        &self.document
    }
}
