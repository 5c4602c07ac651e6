//! Paragraph and text-level types.

use serde::{Deserialize, Serialize};

/// A paragraph of text content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paragraph {
    /// Runs, breaks and opaque inline elements in document order
    pub content: Vec<InlineContent>,

    /// Paragraph style
    pub style: ParagraphStyle,
}

impl Paragraph {
    /// Create a new empty paragraph.
    pub fn new() -> Self {
        Self {
            content: Vec::new(),
            style: ParagraphStyle::default(),
        }
    }

    /// Create a paragraph with plain text.
    pub fn with_text(text: impl Into<String>) -> Self {
        let mut p = Self::new();
        p.add_text(text);
        p
    }

    /// Create a paragraph from several runs, as an authoring tool would
    /// split a single visible string.
    pub fn with_runs<I, S>(runs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut p = Self::new();
        for text in runs {
            p.add_text(text);
        }
        p
    }

    /// Add plain text to the paragraph.
    pub fn add_text(&mut self, text: impl Into<String>) {
        self.content.push(InlineContent::Text(TextRun::new(text)));
    }

    /// Add a styled text run.
    pub fn add_run(&mut self, run: TextRun) {
        self.content.push(InlineContent::Text(run));
    }

    /// Add a line break.
    pub fn add_line_break(&mut self) {
        self.content.push(InlineContent::LineBreak);
    }

    /// Add an inline image referencing a document resource.
    pub fn add_image(&mut self, image: ImageRef) {
        self.content.push(InlineContent::Image(image));
    }

    /// Get plain text content of the paragraph.
    ///
    /// Opaque inline elements (fields, drawings, bookmarks) contribute no text.
    pub fn plain_text(&self) -> String {
        self.content
            .iter()
            .map(|c| match c {
                InlineContent::Text(run) => run.text.as_str(),
                InlineContent::LineBreak => "\n",
                InlineContent::Image(_) | InlineContent::Raw { .. } => "",
            })
            .collect()
    }

    /// Iterate over the text runs of the paragraph.
    pub fn runs(&self) -> impl Iterator<Item = &TextRun> {
        self.content.iter().filter_map(|c| match c {
            InlineContent::Text(run) => Some(run),
            _ => None,
        })
    }

    /// Replace the visible text of the paragraph.
    ///
    /// The first text run receives the whole string and keeps its style;
    /// every later run is blanked and explicit line breaks are folded into
    /// the text. Opaque inline content stays where it is. A paragraph
    /// without any run gets a fresh unstyled one.
    pub fn set_text(&mut self, text: impl Into<String>) {
        let text = text.into();
        self.content
            .retain(|c| !matches!(c, InlineContent::LineBreak));

        let mut pending = Some(text);
        for item in self.content.iter_mut() {
            if let InlineContent::Text(run) = item {
                run.text = pending.take().unwrap_or_default();
            }
        }

        if let Some(text) = pending {
            self.add_text(text);
        }
    }

    /// Remove every run, break and image while keeping the paragraph
    /// properties, so the paragraph can host injected content.
    pub fn clear(&mut self) {
        self.content.clear();
    }

    /// Check if the paragraph carries inline images.
    pub fn has_images(&self) -> bool {
        self.content
            .iter()
            .any(|c| matches!(c, InlineContent::Image(_)))
    }

    /// Check if the paragraph is empty.
    pub fn is_empty(&self) -> bool {
        self.content.is_empty() || self.plain_text().trim().is_empty()
    }
}

impl Default for Paragraph {
    fn default() -> Self {
        Self::new()
    }
}

/// Inline content within a paragraph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InlineContent {
    /// A text run with styling
    Text(TextRun),

    /// A line break
    LineBreak,

    /// An inline image backed by a document resource
    Image(ImageRef),

    /// An inline element kept verbatim from the source package
    Raw {
        /// Serialized XML of the element
        xml: String,
    },
}

/// Reference from a paragraph to an embedded image resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRef {
    /// Resource ID in [`Document::resources`](super::Document)
    pub resource_id: String,

    /// Display width in EMU
    pub width_emu: u64,

    /// Display height in EMU
    pub height_emu: u64,

    /// Alternative text
    pub alt_text: Option<String>,
}

/// A run of text with consistent styling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextRun {
    /// The text content
    pub text: String,

    /// Text styling
    pub style: TextStyle,
}

impl TextRun {
    /// Create a new text run with default style.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            style: TextStyle::default(),
        }
    }

    /// Create a bold text run.
    pub fn bold(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            style: TextStyle {
                bold: true,
                ..Default::default()
            },
        }
    }

    /// Check if this run is empty.
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Text styling properties.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TextStyle {
    /// Bold text
    pub bold: bool,

    /// Italic text
    pub italic: bool,

    /// Underlined text
    pub underline: bool,

    /// Font size in points
    pub font_size: Option<f32>,

    /// Text color (hex format without '#', e.g., "FF0000")
    pub color: Option<String>,

    /// Run properties (`w:rPr`) as found in the template; written back
    /// verbatim and takes precedence over the fields above
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties_xml: Option<String>,
}

impl TextStyle {
    /// Check if any styling is applied.
    pub fn has_styling(&self) -> bool {
        self.bold
            || self.italic
            || self.underline
            || self.font_size.is_some()
            || self.color.is_some()
            || self.properties_xml.is_some()
    }
}

/// Paragraph styling properties.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParagraphStyle {
    /// Named style (e.g., "Heading1")
    pub style_id: Option<String>,

    /// Text alignment
    pub alignment: Option<Alignment>,

    /// Paragraph properties (`w:pPr`) as found in the template
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties_xml: Option<String>,
}

/// Text alignment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Alignment {
    /// Left alignment (default)
    #[default]
    Left,
    /// Center alignment
    Center,
    /// Right alignment
    Right,
    /// Justified alignment
    Justify,
}

impl Alignment {
    /// Parse a WordprocessingML `w:jc` value.
    pub fn from_jc(value: &str) -> Option<Self> {
        match value {
            "left" | "start" => Some(Alignment::Left),
            "center" => Some(Alignment::Center),
            "right" | "end" => Some(Alignment::Right),
            "both" | "distribute" => Some(Alignment::Justify),
            _ => None,
        }
    }

    /// The WordprocessingML `w:jc` value.
    pub fn as_jc(&self) -> &'static str {
        match self {
            Alignment::Left => "left",
            Alignment::Center => "center",
            Alignment::Right => "right",
            Alignment::Justify => "both",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paragraph_plain_text() {
        let mut p = Paragraph::new();
        p.add_text("Hello ");
        p.add_run(TextRun::bold("world"));
        p.add_text("!");

        assert_eq!(p.plain_text(), "Hello world!");
    }

    #[test]
    fn test_plain_text_skips_raw_content() {
        let mut p = Paragraph::with_text("{{LOT_");
        p.content.push(InlineContent::Raw {
            xml: "<w:proofErr w:type=\"spellStart\"/>".to_string(),
        });
        p.add_text("NAME}}");

        assert_eq!(p.plain_text(), "{{LOT_NAME}}");
    }

    #[test]
    fn test_set_text_keeps_first_run_style() {
        let mut p = Paragraph::new();
        p.add_run(TextRun::bold("{{LOT_"));
        p.add_text("NAME");
        p.add_text("}}");

        p.set_text("Lot Nord");

        let runs: Vec<&TextRun> = p.runs().collect();
        assert_eq!(runs.len(), 3);
        assert_eq!(runs[0].text, "Lot Nord");
        assert!(runs[0].style.bold);
        assert!(runs[1].is_empty());
        assert!(runs[2].is_empty());
        assert_eq!(p.plain_text(), "Lot Nord");
    }

    #[test]
    fn test_set_text_folds_line_breaks() {
        let mut p = Paragraph::with_text("a");
        p.add_line_break();
        p.add_text("b");

        p.set_text("a\nb");
        assert_eq!(p.plain_text(), "a\nb");
        assert!(!p.content.contains(&InlineContent::LineBreak));
    }

    #[test]
    fn test_set_text_on_empty_paragraph() {
        let mut p = Paragraph::new();
        p.set_text("hello");
        assert_eq!(p.plain_text(), "hello");
    }

    #[test]
    fn test_alignment_jc() {
        assert_eq!(Alignment::from_jc("both"), Some(Alignment::Justify));
        assert_eq!(Alignment::from_jc("bogus"), None);
        assert_eq!(Alignment::Center.as_jc(), "center");
    }

    #[test]
    fn test_text_style() {
        let style = TextStyle::default();
        assert!(!style.has_styling());

        let bold_style = TextStyle {
            bold: true,
            ..Default::default()
        };
        assert!(bold_style.has_styling());
    }
}
