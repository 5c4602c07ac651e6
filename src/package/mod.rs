//! Word (.docx) package I/O.
//!
//! A package is kept as the ordered list of its zip parts. Only
//! `word/document.xml` is parsed into the [`Document`] model; writing
//! splices the serialized body back between the original prologue and
//! the closing `</w:body>`, adds the media parts the body references and
//! copies everything else (styles, numbering, headers, footers) unchanged.
//!
//! # Example
//! ```no_run
//! use carbonfill::package::DocxPackage;
//!
//! let package = DocxPackage::open("template.docx")?;
//! let doc = package.document()?;
//! println!("{} body element(s)", doc.len());
//! package.save(&doc, "copy.docx")?;
//! # Ok::<(), carbonfill::Error>(())
//! ```

mod reader;
mod writer;

pub use reader::{body_content_range, parse_core_title, parse_document, W_NS};
pub use writer::{escape_xml, renumber_drawings, stamp_modified};

use crate::error::{Error, Result};
use crate::model::Document;
use std::fs;
use std::io::{Cursor, Read};
use std::path::Path;
use zip::ZipArchive;

/// A package part: zip entry name and raw bytes.
pub type Part = (String, Vec<u8>);

/// Main document part.
pub const DOCUMENT: &str = "word/document.xml";
/// Relationships of the main document part.
pub const DOCUMENT_RELS: &str = "word/_rels/document.xml.rels";
/// Content type declarations.
pub const CONTENT_TYPES: &str = "[Content_Types].xml";
/// Core properties (title, dates).
pub const CORE_PROPERTIES: &str = "docProps/core.xml";

/// Zip local file header signature.
const ZIP_MAGIC: &[u8] = b"PK\x03\x04";

const EMPTY_RELATIONSHIPS: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    "\n",
    r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"></Relationships>"#
);

const BLANK_CONTENT_TYPES: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    "\n",
    r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">"#,
    r#"<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>"#,
    r#"<Default Extension="xml" ContentType="application/xml"/>"#,
    r#"<Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/>"#,
    r#"<Override PartName="/docProps/core.xml" ContentType="application/vnd.openxmlformats-package.core-properties+xml"/>"#,
    r#"</Types>"#
);

const BLANK_PACKAGE_RELS: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    "\n",
    r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    r#"<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/>"#,
    r#"<Relationship Id="rId2" Type="http://schemas.openxmlformats.org/package/2006/relationships/metadata/core-properties" Target="docProps/core.xml"/>"#,
    r#"</Relationships>"#
);

const BLANK_DOCUMENT: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    "\n",
    r#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main" "#,
    r#"xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" "#,
    r#"xmlns:wp="http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing">"#,
    r#"<w:body><w:sectPr><w:pgSz w:w="11906" w:h="16838"/>"#,
    r#"<w:pgMar w:top="1417" w:right="1417" w:bottom="1417" w:left="1417" w:header="708" w:footer="708" w:gutter="0"/>"#,
    r#"</w:sectPr></w:body></w:document>"#
);

const BLANK_CORE: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    "\n",
    r#"<cp:coreProperties xmlns:cp="http://schemas.openxmlformats.org/package/2006/metadata/core-properties" "#,
    r#"xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:dcterms="http://purl.org/dc/terms/" "#,
    r#"xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">"#,
    r#"<dc:title></dc:title>"#,
    r#"<dcterms:modified xsi:type="dcterms:W3CDTF">2000-01-01T00:00:00Z</dcterms:modified>"#,
    r#"</cp:coreProperties>"#
);

/// Check whether `data` starts like a zip archive.
pub fn is_zip(data: &[u8]) -> bool {
    data.starts_with(ZIP_MAGIC)
}

/// An opened Word package.
#[derive(Debug, Clone)]
pub struct DocxPackage {
    parts: Vec<Part>,
}

impl DocxPackage {
    /// Open a package from a file.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        log::debug!("opening template {}", path.display());
        let data = fs::read(path)?;
        Self::from_bytes(&data)
    }

    /// Read a package from memory.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if !is_zip(data) {
            return Err(Error::Package("not a zip archive".to_string()));
        }

        let mut archive = ZipArchive::new(Cursor::new(data))?;
        let mut parts = Vec::with_capacity(archive.len());
        for i in 0..archive.len() {
            let mut file = archive.by_index(i)?;
            if file.is_dir() {
                continue;
            }
            let name = file.name().to_string();
            let mut bytes = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut bytes)?;
            parts.push((name, bytes));
        }

        if !parts.iter().any(|(name, _)| name == DOCUMENT) {
            return Err(Error::Package(format!("missing {}", DOCUMENT)));
        }
        Ok(Self { parts })
    }

    /// Minimal A4 package with an empty body.
    pub fn blank() -> Self {
        let parts = [
            (CONTENT_TYPES, BLANK_CONTENT_TYPES),
            ("_rels/.rels", BLANK_PACKAGE_RELS),
            (DOCUMENT, BLANK_DOCUMENT),
            (DOCUMENT_RELS, EMPTY_RELATIONSHIPS),
            (CORE_PROPERTIES, BLANK_CORE),
        ];
        Self {
            parts: parts
                .iter()
                .map(|(name, xml)| (name.to_string(), xml.as_bytes().to_vec()))
                .collect(),
        }
    }

    /// Raw bytes of a part.
    pub fn part(&self, name: &str) -> Option<&[u8]> {
        self.parts
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, data)| data.as_slice())
    }

    /// Names of all parts, in archive order.
    pub fn part_names(&self) -> impl Iterator<Item = &str> {
        self.parts.iter().map(|(name, _)| name.as_str())
    }

    fn part_str(&self, name: &str) -> Result<&str> {
        let data = self
            .part(name)
            .ok_or_else(|| Error::Package(format!("missing {}", name)))?;
        std::str::from_utf8(data)
            .map_err(|e| Error::Package(format!("{} is not UTF-8: {}", name, e)))
    }

    /// Parse the document body into the model.
    pub fn document(&self) -> Result<Document> {
        let mut doc = parse_document(self.part_str(DOCUMENT)?)?;
        doc.metadata.title = self
            .part_str(CORE_PROPERTIES)
            .ok()
            .and_then(parse_core_title);
        Ok(doc)
    }

    /// Serialize `doc` into a new package built on this one.
    pub fn to_bytes(&self, doc: &Document) -> Result<Vec<u8>> {
        writer::write_package(&self.parts, doc)
    }

    /// Write `doc` to `path` as a package built on this one.
    pub fn save<P: AsRef<Path>>(&self, doc: &Document, path: P) -> Result<()> {
        let bytes = self.to_bytes(doc)?;
        fs::write(path.as_ref(), bytes)?;
        log::info!("wrote {}", path.as_ref().display());
        Ok(())
    }
}

impl Default for DocxPackage {
    fn default() -> Self {
        Self::blank()
    }
}
