//! [`Document`] → package parts.

use super::reader::body_content_range;
use super::{Part, CONTENT_TYPES, CORE_PROPERTIES, DOCUMENT, DOCUMENT_RELS};
use crate::error::{Error, Result};
use crate::model::{Block, Document, ImageRef, InlineContent, Paragraph, Table, TextRun};
use chrono::{DateTime, Utc};
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::io::{Cursor, Write};
use std::sync::OnceLock;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

const IMAGE_REL_TYPE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/image";

/// Usable text width of an A4 page with 2.5 cm margins, in twips.
const TEXT_WIDTH_TWIPS: u32 = 9072;

fn docpr_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"(<wp:docPr\b[^>]*?\bid=")(\d+)(")"#).expect("valid docPr pattern"))
}

fn modified_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(<dcterms:modified\b[^>]*>)[^<]*(</dcterms:modified>)")
            .expect("valid dcterms:modified pattern")
    })
}

/// Escape text for use in XML content and attribute values.
pub fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

/// An image part added to the package.
struct MediaPart {
    rel_id: String,
    path: String,
    mime_type: String,
    data: Vec<u8>,
}

/// Assigns relationship ids and part names to the resources referenced by
/// inline images, once per resource.
struct MediaRegistry<'a> {
    doc: &'a Document,
    taken_ids: String,
    taken_paths: HashSet<String>,
    next: usize,
    by_resource: HashMap<String, usize>,
    parts: Vec<MediaPart>,
}

impl<'a> MediaRegistry<'a> {
    fn new(doc: &'a Document, rels_xml: &str, existing: &[Part]) -> Self {
        Self {
            doc,
            taken_ids: rels_xml.to_string(),
            taken_paths: existing.iter().map(|(name, _)| name.clone()).collect(),
            next: 1,
            by_resource: HashMap::new(),
            parts: Vec::new(),
        }
    }

    /// Relationship id of the image part holding `resource_id`.
    fn rel_id(&mut self, resource_id: &str) -> Option<String> {
        if let Some(&i) = self.by_resource.get(resource_id) {
            return Some(self.parts[i].rel_id.clone());
        }
        let doc = self.doc;
        let resource = doc.get_resource(resource_id)?;

        let (rel_id, path) = loop {
            let n = self.next;
            self.next += 1;
            let rel_id = format!("rIdCf{}", n);
            let path = format!("word/media/carbonfill_image{}.{}", n, resource.extension());
            if !self.taken_ids.contains(&format!("\"{}\"", rel_id)) && !self.taken_paths.contains(&path)
            {
                break (rel_id, path);
            }
        };

        self.by_resource
            .insert(resource_id.to_string(), self.parts.len());
        self.parts.push(MediaPart {
            rel_id: rel_id.clone(),
            path,
            mime_type: resource.mime_type.clone(),
            data: resource.data.clone(),
        });
        Some(rel_id)
    }
}

struct BodyWriter<'r, 'a> {
    out: String,
    media: &'r mut MediaRegistry<'a>,
}

impl BodyWriter<'_, '_> {
    fn blocks(&mut self, blocks: &[Block]) {
        for block in blocks {
            match block {
                Block::Paragraph(p) => self.paragraph(p),
                Block::Table(t) => self.table(t),
                Block::Raw { xml } => self.out.push_str(xml),
            }
        }
    }

    fn paragraph(&mut self, p: &Paragraph) {
        self.out.push_str("<w:p>");
        if let Some(ppr) = &p.style.properties_xml {
            self.out.push_str(ppr);
        } else if p.style.style_id.is_some() || p.style.alignment.is_some() {
            self.out.push_str("<w:pPr>");
            if let Some(id) = &p.style.style_id {
                self.out
                    .push_str(&format!(r#"<w:pStyle w:val="{}"/>"#, escape_xml(id)));
            }
            if let Some(align) = p.style.alignment {
                self.out
                    .push_str(&format!(r#"<w:jc w:val="{}"/>"#, align.as_jc()));
            }
            self.out.push_str("</w:pPr>");
        }

        for item in &p.content {
            match item {
                InlineContent::Text(run) => self.run(run),
                InlineContent::LineBreak => self.out.push_str("<w:r><w:br/></w:r>"),
                InlineContent::Image(image) => self.image(image),
                InlineContent::Raw { xml } => self.out.push_str(xml),
            }
        }
        self.out.push_str("</w:p>");
    }

    fn run_properties(&mut self, run: &TextRun) {
        let style = &run.style;
        if let Some(rpr) = &style.properties_xml {
            self.out.push_str(rpr);
            return;
        }
        if !style.has_styling() {
            return;
        }
        self.out.push_str("<w:rPr>");
        if style.bold {
            self.out.push_str("<w:b/>");
        }
        if style.italic {
            self.out.push_str("<w:i/>");
        }
        if style.underline {
            self.out.push_str(r#"<w:u w:val="single"/>"#);
        }
        if let Some(color) = &style.color {
            self.out
                .push_str(&format!(r#"<w:color w:val="{}"/>"#, escape_xml(color)));
        }
        if let Some(size) = style.font_size {
            self.out
                .push_str(&format!(r#"<w:sz w:val="{}"/>"#, (size * 2.0).round() as u32));
        }
        self.out.push_str("</w:rPr>");
    }

    fn run(&mut self, run: &TextRun) {
        if run.is_empty() {
            return;
        }
        self.out.push_str("<w:r>");
        self.run_properties(run);

        let mut pending = String::new();
        let flush = |out: &mut String, pending: &mut String| {
            if !pending.is_empty() {
                out.push_str(r#"<w:t xml:space="preserve">"#);
                out.push_str(&escape_xml(pending));
                out.push_str("</w:t>");
                pending.clear();
            }
        };
        for c in run.text.chars() {
            match c {
                '\n' => {
                    flush(&mut self.out, &mut pending);
                    self.out.push_str("<w:br/>");
                }
                '\t' => {
                    flush(&mut self.out, &mut pending);
                    self.out.push_str("<w:tab/>");
                }
                '\r' => {}
                _ => pending.push(c),
            }
        }
        flush(&mut self.out, &mut pending);
        self.out.push_str("</w:r>");
    }

    fn image(&mut self, image: &ImageRef) {
        let Some(rel_id) = self.media.rel_id(&image.resource_id) else {
            log::warn!("image resource {} not found, dropped", image.resource_id);
            return;
        };
        let name = escape_xml(image.alt_text.as_deref().unwrap_or("Image"));
        let (cx, cy) = (image.width_emu, image.height_emu);
        self.out.push_str(&format!(
            concat!(
                r#"<w:r><w:drawing><wp:inline distT="0" distB="0" distL="0" distR="0" "#,
                r#"xmlns:wp="http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing">"#,
                r#"<wp:extent cx="{cx}" cy="{cy}"/><wp:docPr id="0" name="{name}"/>"#,
                r#"<wp:cNvGraphicFramePr><a:graphicFrameLocks "#,
                r#"xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" noChangeAspect="1"/>"#,
                r#"</wp:cNvGraphicFramePr>"#,
                r#"<a:graphic xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main">"#,
                r#"<a:graphicData uri="http://schemas.openxmlformats.org/drawingml/2006/picture">"#,
                r#"<pic:pic xmlns:pic="http://schemas.openxmlformats.org/drawingml/2006/picture">"#,
                r#"<pic:nvPicPr><pic:cNvPr id="0" name="{name}"/><pic:cNvPicPr/></pic:nvPicPr>"#,
                r#"<pic:blipFill><a:blip r:embed="{rel}" "#,
                r#"xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"/>"#,
                r#"<a:stretch><a:fillRect/></a:stretch></pic:blipFill>"#,
                r#"<pic:spPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="{cx}" cy="{cy}"/></a:xfrm>"#,
                r#"<a:prstGeom prst="rect"><a:avLst/></a:prstGeom></pic:spPr>"#,
                r#"</pic:pic></a:graphicData></a:graphic></wp:inline></w:drawing></w:r>"#
            ),
            cx = cx,
            cy = cy,
            name = name,
            rel = rel_id
        ));
    }

    fn table(&mut self, table: &Table) {
        self.out.push_str("<w:tbl>");
        match &table.properties_xml {
            Some(tblpr) => self.out.push_str(tblpr),
            None => self.out.push_str(concat!(
                r#"<w:tblPr><w:tblW w:w="5000" w:type="pct"/><w:tblBorders>"#,
                r#"<w:top w:val="single" w:sz="4" w:space="0" w:color="3F9B83"/>"#,
                r#"<w:left w:val="single" w:sz="4" w:space="0" w:color="3F9B83"/>"#,
                r#"<w:bottom w:val="single" w:sz="4" w:space="0" w:color="3F9B83"/>"#,
                r#"<w:right w:val="single" w:sz="4" w:space="0" w:color="3F9B83"/>"#,
                r#"<w:insideH w:val="single" w:sz="4" w:space="0" w:color="3F9B83"/>"#,
                r#"<w:insideV w:val="single" w:sz="4" w:space="0" w:color="3F9B83"/>"#,
                r#"</w:tblBorders></w:tblPr>"#
            )),
        }

        match &table.grid_xml {
            Some(grid) => self.out.push_str(grid),
            None => {
                let columns = table.column_count().max(1);
                let widths = table
                    .column_widths
                    .clone()
                    .filter(|w| w.len() == columns)
                    .unwrap_or_else(|| vec![TEXT_WIDTH_TWIPS / columns as u32; columns]);
                self.out.push_str("<w:tblGrid>");
                for w in widths {
                    self.out.push_str(&format!(r#"<w:gridCol w:w="{}"/>"#, w));
                }
                self.out.push_str("</w:tblGrid>");
            }
        }

        for row in &table.rows {
            self.out.push_str("<w:tr>");
            match &row.properties_xml {
                Some(trpr) => self.out.push_str(trpr),
                None if row.is_header => self.out.push_str("<w:trPr><w:tblHeader/></w:trPr>"),
                None => {}
            }
            for cell in &row.cells {
                self.out.push_str("<w:tc>");
                if let Some(tcpr) = &cell.properties_xml {
                    self.out.push_str(tcpr);
                }
                self.blocks(&cell.content);
                if !matches!(cell.content.last(), Some(Block::Paragraph(_))) {
                    self.out.push_str("<w:p/>");
                }
                self.out.push_str("</w:tc>");
            }
            self.out.push_str("</w:tr>");
        }
        self.out.push_str("</w:tbl>");
    }
}

/// Give every `wp:docPr` a distinct id, in document order, starting after
/// `after`.
pub fn renumber_drawings(xml: &str, after: u32) -> String {
    let mut next = after;
    docpr_regex()
        .replace_all(xml, |caps: &regex::Captures| {
            next += 1;
            format!("{}{}{}", &caps[1], next, &caps[3])
        })
        .into_owned()
}

/// Largest `wp:docPr` id outside the main document (headers, footers,
/// notes), 0 when there is none.
fn max_foreign_drawing_id(parts: &[Part]) -> u32 {
    parts
        .iter()
        .filter(|(name, _)| name.starts_with("word/") && name.ends_with(".xml") && name != DOCUMENT)
        .filter_map(|(_, data)| std::str::from_utf8(data).ok())
        .flat_map(|xml| {
            docpr_regex()
                .captures_iter(xml)
                .filter_map(|caps| caps[2].parse::<u32>().ok())
        })
        .max()
        .unwrap_or(0)
}

/// Stamp `dcterms:modified` with `when`; unchanged when the element is absent.
pub fn stamp_modified(core_xml: &str, when: DateTime<Utc>) -> String {
    let stamp = when.format("%Y-%m-%dT%H:%M:%SZ").to_string();
    modified_regex()
        .replace(core_xml, |caps: &regex::Captures| {
            format!("{}{}{}", &caps[1], stamp, &caps[2])
        })
        .into_owned()
}

fn add_relationships(rels_xml: &str, media: &[MediaPart]) -> Result<String> {
    if media.is_empty() {
        return Ok(rels_xml.to_string());
    }
    let close = rels_xml
        .rfind("</Relationships>")
        .ok_or_else(|| Error::Package("malformed document relationships".to_string()))?;

    let mut out = rels_xml[..close].to_string();
    for part in media {
        let target = part.path.trim_start_matches("word/");
        out.push_str(&format!(
            r#"<Relationship Id="{}" Type="{}" Target="{}"/>"#,
            part.rel_id, IMAGE_REL_TYPE, target
        ));
    }
    out.push_str(&rels_xml[close..]);
    Ok(out)
}

fn add_content_types(types_xml: &str, media: &[MediaPart]) -> Result<String> {
    let mut needed: Vec<(&str, &str)> = Vec::new();
    for part in media {
        let ext = part.path.rsplit('.').next().unwrap_or_default();
        let mime = part.mime_type.as_str();
        let declared = types_xml
            .to_ascii_lowercase()
            .contains(&format!("extension=\"{}\"", ext));
        if !declared && !needed.iter().any(|(e, _)| *e == ext) {
            needed.push((ext, mime));
        }
    }
    if needed.is_empty() {
        return Ok(types_xml.to_string());
    }

    let close = types_xml
        .rfind("</Types>")
        .ok_or_else(|| Error::Package("malformed [Content_Types].xml".to_string()))?;
    let mut out = types_xml[..close].to_string();
    for (ext, mime) in needed {
        out.push_str(&format!(
            r#"<Default Extension="{}" ContentType="{}"/>"#,
            ext, mime
        ));
    }
    out.push_str(&types_xml[close..]);
    Ok(out)
}

fn part_text<'p>(parts: &'p [Part], name: &str) -> Option<Result<&'p str>> {
    parts.iter().find(|(n, _)| n == name).map(|(_, data)| {
        std::str::from_utf8(data)
            .map_err(|e| Error::Package(format!("{} is not UTF-8: {}", name, e)))
    })
}

/// Serialize `doc` into a copy of `parts` and zip the result.
pub fn write_package(parts: &[Part], doc: &Document) -> Result<Vec<u8>> {
    let document_xml = part_text(parts, DOCUMENT)
        .ok_or_else(|| Error::Package(format!("missing {}", DOCUMENT)))??;
    let rels_xml = match part_text(parts, DOCUMENT_RELS) {
        Some(text) => text?.to_string(),
        None => super::EMPTY_RELATIONSHIPS.to_string(),
    };

    let (body_start, body_end) = body_content_range(document_xml)?;
    let mut media = MediaRegistry::new(doc, &rels_xml, parts);
    let mut writer = BodyWriter {
        out: String::with_capacity(document_xml.len()),
        media: &mut media,
    };
    writer.blocks(&doc.body);
    let body = renumber_drawings(&writer.out, max_foreign_drawing_id(parts));

    let new_document = if body_start == body_end {
        // Self-closing body: reopen it around the new content.
        let open = &document_xml[..body_start];
        let open = open.strip_suffix("/>").unwrap_or(open);
        format!("{}>{}</w:body>{}", open, body, &document_xml[body_end..])
    } else {
        format!(
            "{}{}{}",
            &document_xml[..body_start],
            body,
            &document_xml[body_end..]
        )
    };

    let new_rels = add_relationships(&rels_xml, &media.parts)?;
    let new_types = match part_text(parts, CONTENT_TYPES) {
        Some(text) => Some(add_content_types(text?, &media.parts)?),
        None => None,
    };
    let new_core = match (part_text(parts, CORE_PROPERTIES), doc.metadata.generated) {
        (Some(text), Some(when)) => Some(stamp_modified(text?, when)),
        _ => None,
    };

    let deflated = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let mut wrote_rels = false;

    for (name, data) in parts {
        let replacement: Option<&[u8]> = match name.as_str() {
            DOCUMENT => Some(new_document.as_bytes()),
            DOCUMENT_RELS => {
                wrote_rels = true;
                Some(new_rels.as_bytes())
            }
            CONTENT_TYPES => new_types.as_deref().map(str::as_bytes),
            CORE_PROPERTIES => new_core.as_deref().map(str::as_bytes),
            _ => None,
        };
        let options = if name.starts_with("word/media/") {
            stored
        } else {
            deflated
        };
        zip.start_file(name.as_str(), options)?;
        zip.write_all(replacement.unwrap_or(data))?;
    }

    if !wrote_rels && !media.parts.is_empty() {
        zip.start_file(DOCUMENT_RELS, deflated)?;
        zip.write_all(new_rels.as_bytes())?;
    }
    for part in &media.parts {
        zip.start_file(part.path.as_str(), stored)?;
        zip.write_all(&part.data)?;
    }

    let bytes = zip.finish()?.into_inner();
    log::debug!(
        "wrote package: {} part(s), {} new image(s), {} bytes",
        parts.len(),
        media.parts.len(),
        bytes.len()
    );
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Resource, TableRow};
    use chrono::TimeZone;

    fn body_xml(doc: &Document) -> String {
        let mut media = MediaRegistry::new(doc, "", &[]);
        let mut writer = BodyWriter {
            out: String::new(),
            media: &mut media,
        };
        writer.blocks(&doc.body);
        writer.out
    }

    #[test]
    fn test_escape_xml() {
        assert_eq!(escape_xml(r#"a<b & "c""#), "a&lt;b &amp; &quot;c&quot;");
    }

    #[test]
    fn test_run_text_with_breaks() {
        let mut doc = Document::new();
        doc.add_paragraph(Paragraph::with_text("1. A & B\n2. C\tD"));
        assert_eq!(
            body_xml(&doc),
            concat!(
                r#"<w:p><w:r><w:t xml:space="preserve">1. A &amp; B</w:t><w:br/>"#,
                r#"<w:t xml:space="preserve">2. C</w:t><w:tab/>"#,
                r#"<w:t xml:space="preserve">D</w:t></w:r></w:p>"#
            )
        );
    }

    #[test]
    fn test_empty_runs_skipped() {
        let mut p = Paragraph::with_runs(["{{A", "}}"]);
        p.set_text("");
        let mut doc = Document::new();
        doc.add_paragraph(p);
        assert_eq!(body_xml(&doc), "<w:p></w:p>");
    }

    #[test]
    fn test_generated_table() {
        let mut table = Table::with_header(["Poste", "tCO₂e"]);
        table.add_row(TableRow::from_strings(["Fret", "1,00"]));
        let mut doc = Document::new();
        doc.add_table(table);

        let xml = body_xml(&doc);
        assert!(xml.starts_with("<w:tbl><w:tblPr>"));
        assert_eq!(xml.matches("<w:gridCol w:w=\"4536\"/>").count(), 2);
        assert!(xml.contains("<w:trPr><w:tblHeader/></w:trPr>"));
        assert!(xml.contains("<w:rPr><w:b/></w:rPr>"));
        assert_eq!(xml.matches("<w:tc>").count(), 4);

        let mut doc = Document::new();
        doc.add_table(Table::with_header(["Poste", "tCO₂e"]).with_column_widths(vec![6804, 2268]));
        let xml = body_xml(&doc);
        assert!(xml.contains(r#"<w:gridCol w:w="6804"/><w:gridCol w:w="2268"/>"#));
    }

    #[test]
    fn test_image_reuses_relationship() {
        let mut doc = Document::new();
        let id = doc.add_resource(Resource::png(vec![1, 2, 3]));
        for _ in 0..2 {
            let mut p = Paragraph::new();
            p.add_image(ImageRef {
                resource_id: id.clone(),
                width_emu: 100,
                height_emu: 50,
                alt_text: Some("chart".to_string()),
            });
            doc.add_paragraph(p);
        }
        let mut media = MediaRegistry::new(&doc, r#"<Relationship Id="rIdCf1"/>"#, &[]);
        let mut writer = BodyWriter {
            out: String::new(),
            media: &mut media,
        };
        writer.blocks(&doc.body);
        assert_eq!(writer.out.matches(r#"r:embed="rIdCf2""#).count(), 2);
        assert!(writer.out.contains(r#"<wp:extent cx="100" cy="50"/>"#));
        assert_eq!(media.parts.len(), 1);
        assert_eq!(media.parts[0].path, "word/media/carbonfill_image2.png");
    }

    #[test]
    fn test_renumber_drawings() {
        let xml = r#"<wp:docPr id="7" name="a"/><wp:docPr id="7" name="b"/><wp:docPr name="c" id="0"/>"#;
        assert_eq!(
            renumber_drawings(xml, 0),
            r#"<wp:docPr id="1" name="a"/><wp:docPr id="2" name="b"/><wp:docPr name="c" id="3"/>"#
        );
        assert_eq!(
            renumber_drawings(r#"<wp:docPr id="1" name="a"/>"#, 12),
            r#"<wp:docPr id="13" name="a"/>"#
        );
    }

    #[test]
    fn test_drawing_ids_follow_headers() {
        let parts: Vec<Part> = vec![
            (
                DOCUMENT.to_string(),
                br#"<wp:docPr id="99" name="body"/>"#.to_vec(),
            ),
            (
                "word/header1.xml".to_string(),
                br#"<w:hdr><wp:docPr id="4" name="logo"/></w:hdr>"#.to_vec(),
            ),
            (
                "word/footer2.xml".to_string(),
                br#"<w:ftr><wp:docPr name="seal" id="9"/></w:ftr>"#.to_vec(),
            ),
            ("word/media/image1.png".to_string(), b"<wp:docPr id=\"500\"".to_vec()),
        ];
        assert_eq!(max_foreign_drawing_id(&parts), 9);
        assert_eq!(max_foreign_drawing_id(&parts[..1]), 0);
    }

    #[test]
    fn test_stamp_modified() {
        let core = r#"<dcterms:modified xsi:type="dcterms:W3CDTF">2020-01-01T00:00:00Z</dcterms:modified>"#;
        let when = Utc.with_ymd_and_hms(2025, 3, 14, 9, 30, 0).unwrap();
        assert_eq!(
            stamp_modified(core, when),
            r#"<dcterms:modified xsi:type="dcterms:W3CDTF">2025-03-14T09:30:00Z</dcterms:modified>"#
        );
        assert_eq!(stamp_modified("<x/>", when), "<x/>");
    }

    #[test]
    fn test_content_types() {
        let media = vec![MediaPart {
            rel_id: "rIdCf1".to_string(),
            path: "word/media/carbonfill_image1.png".to_string(),
            mime_type: "image/png".to_string(),
            data: Vec::new(),
        }];
        let types = r#"<Types><Default Extension="xml" ContentType="application/xml"/></Types>"#;
        let out = add_content_types(types, &media).unwrap();
        assert!(out.contains(r#"<Default Extension="png" ContentType="image/png"/></Types>"#));
        assert_eq!(add_content_types(&out, &media).unwrap(), out);
    }
}
