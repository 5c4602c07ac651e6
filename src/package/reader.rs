//! `word/document.xml` → [`Document`].

use crate::error::{Error, Result};
use crate::model::{
    Alignment, Block, Document, InlineContent, Paragraph, ParagraphStyle, Table, TableCell,
    TableRow, TextRun, TextStyle,
};
use roxmltree::Node;

/// WordprocessingML main namespace.
pub const W_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";

/// Dublin Core elements namespace, used by `docProps/core.xml`.
const DC_NS: &str = "http://purl.org/dc/elements/1.1/";

fn is_w(node: Node, name: &str) -> bool {
    node.is_element()
        && node.tag_name().name() == name
        && node.tag_name().namespace() == Some(W_NS)
}

fn w_child<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.children().find(|c| is_w(*c, name))
}

fn w_val(node: Node) -> Option<String> {
    node.attribute((W_NS, "val")).map(str::to_string)
}

/// Source text of `node`.
fn raw(xml: &str, node: Node) -> String {
    xml[node.range()].to_string()
}

/// Byte offsets of the body content inside `document.xml`: the end of the
/// `<w:body>` open tag and the start of its close tag. Both are equal for
/// a self-closing body.
pub fn body_content_range(xml: &str) -> Result<(usize, usize)> {
    let tree = roxmltree::Document::parse(xml)?;
    let body = tree
        .descendants()
        .find(|n| is_w(*n, "body"))
        .ok_or_else(|| Error::Package("word/document.xml has no w:body".to_string()))?;

    let range = body.range();
    let open_end = xml[range.start..range.end]
        .find('>')
        .map(|i| range.start + i + 1)
        .ok_or_else(|| Error::Package("malformed w:body tag".to_string()))?;
    if xml[..open_end].ends_with("/>") {
        return Ok((open_end, open_end));
    }
    let close_start = xml[..range.end]
        .rfind("</")
        .filter(|i| *i >= open_end)
        .ok_or_else(|| Error::Package("malformed w:body tag".to_string()))?;
    Ok((open_end, close_start))
}

/// Parse the body of `document.xml` into the document model.
pub fn parse_document(xml: &str) -> Result<Document> {
    let tree = roxmltree::Document::parse(xml)?;
    let body = tree
        .descendants()
        .find(|n| is_w(*n, "body"))
        .ok_or_else(|| Error::Package("word/document.xml has no w:body".to_string()))?;

    let blocks = parse_blocks(xml, body);
    log::debug!("parsed {} body element(s)", blocks.len());
    Ok(Document::from_blocks(blocks))
}

/// Title from `docProps/core.xml`, if set.
pub fn parse_core_title(xml: &str) -> Option<String> {
    let tree = roxmltree::Document::parse(xml).ok()?;
    tree.descendants()
        .find(|n| n.tag_name().name() == "title" && n.tag_name().namespace() == Some(DC_NS))
        .and_then(|n| n.text())
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

fn parse_blocks(xml: &str, parent: Node) -> Vec<Block> {
    parent
        .children()
        .filter(|n| n.is_element())
        .filter(|n| !is_w(*n, "tcPr"))
        .map(|n| {
            if is_w(n, "p") {
                Block::Paragraph(parse_paragraph(xml, n))
            } else if is_w(n, "tbl") {
                Block::Table(parse_table(xml, n))
            } else {
                Block::Raw { xml: raw(xml, n) }
            }
        })
        .collect()
}

fn parse_paragraph(xml: &str, node: Node) -> Paragraph {
    let mut paragraph = Paragraph::new();
    for child in node.children().filter(|n| n.is_element()) {
        if is_w(child, "pPr") {
            paragraph.style = parse_paragraph_style(xml, child);
        } else if is_w(child, "r") {
            paragraph.content.push(parse_run(xml, child));
        } else {
            paragraph.content.push(InlineContent::Raw {
                xml: raw(xml, child),
            });
        }
    }
    paragraph
}

fn parse_paragraph_style(xml: &str, ppr: Node) -> ParagraphStyle {
    ParagraphStyle {
        style_id: w_child(ppr, "pStyle").and_then(w_val),
        alignment: w_child(ppr, "jc")
            .and_then(w_val)
            .and_then(|v| Alignment::from_jc(&v)),
        properties_xml: Some(raw(xml, ppr)),
    }
}

/// Whether a run holds nothing but text the model can represent.
fn is_text_run(run: Node) -> bool {
    run.children().filter(|n| n.is_element()).all(|c| {
        if is_w(c, "br") {
            return c
                .attribute((W_NS, "type"))
                .map_or(true, |t| t == "textWrapping");
        }
        ["rPr", "t", "tab", "cr", "lastRenderedPageBreak"]
            .iter()
            .any(|name| is_w(c, name))
    })
}

fn parse_run(xml: &str, run: Node) -> InlineContent {
    if !is_text_run(run) {
        return InlineContent::Raw { xml: raw(xml, run) };
    }

    let style = w_child(run, "rPr")
        .map(|rpr| parse_run_style(xml, rpr))
        .unwrap_or_default();

    let mut text = String::new();
    for child in run.children().filter(|n| n.is_element()) {
        if is_w(child, "t") {
            text.push_str(child.text().unwrap_or(""));
        } else if is_w(child, "tab") {
            text.push('\t');
        } else if is_w(child, "br") || is_w(child, "cr") {
            text.push('\n');
        }
    }
    InlineContent::Text(TextRun { text, style })
}

/// `w:b`, `w:i`, … are on unless their `w:val` says otherwise.
fn toggle(rpr: Node, name: &str) -> bool {
    w_child(rpr, name).is_some_and(|n| {
        !matches!(
            n.attribute((W_NS, "val")),
            Some("0") | Some("false") | Some("none")
        )
    })
}

fn parse_run_style(xml: &str, rpr: Node) -> TextStyle {
    TextStyle {
        bold: toggle(rpr, "b"),
        italic: toggle(rpr, "i"),
        underline: toggle(rpr, "u"),
        font_size: w_child(rpr, "sz")
            .and_then(w_val)
            .and_then(|v| v.parse::<f32>().ok())
            .map(|half_points| half_points / 2.0),
        color: w_child(rpr, "color")
            .and_then(w_val)
            .filter(|c| c != "auto"),
        properties_xml: Some(raw(xml, rpr)),
    }
}

fn parse_table(xml: &str, node: Node) -> Table {
    let mut table = Table::new();
    table.properties_xml = w_child(node, "tblPr").map(|n| raw(xml, n));
    table.grid_xml = w_child(node, "tblGrid").map(|n| raw(xml, n));

    for tr in node.children().filter(|n| is_w(*n, "tr")) {
        let properties_xml = w_child(tr, "trPr").map(|n| raw(xml, n));
        let is_header = w_child(tr, "trPr")
            .and_then(|p| w_child(p, "tblHeader"))
            .is_some();
        let cells = tr
            .children()
            .filter(|n| is_w(*n, "tc"))
            .map(|tc| TableCell {
                content: parse_blocks(xml, tc),
                properties_xml: w_child(tc, "tcPr").map(|n| raw(xml, n)),
            })
            .collect();
        if is_header && table.header_rows as usize == table.rows.len() {
            table.header_rows = table.header_rows.saturating_add(1);
        }
        table.add_row(TableRow {
            cells,
            is_header,
            properties_xml,
        });
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wrap(body: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:document xmlns:w="{}"><w:body>{}</w:body></w:document>"#,
            W_NS, body
        )
    }

    #[test]
    fn test_split_runs_are_joined() {
        let xml = wrap(
            r#"<w:p><w:pPr><w:pStyle w:val="Titre1"/><w:jc w:val="center"/></w:pPr><w:r><w:rPr><w:b/><w:sz w:val="28"/></w:rPr><w:t>{{LOT_</w:t></w:r><w:proofErr w:type="spellStart"/><w:r><w:t xml:space="preserve">NAME}} &amp; co</w:t></w:r></w:p>"#,
        );
        let doc = parse_document(&xml).unwrap();
        let p = doc.paragraph(0).unwrap();
        assert_eq!(p.plain_text(), "{{LOT_NAME}} & co");
        assert_eq!(p.style.style_id.as_deref(), Some("Titre1"));
        assert_eq!(p.style.alignment, Some(Alignment::Center));

        let first = p.runs().next().unwrap();
        assert!(first.style.bold);
        assert_eq!(first.style.font_size, Some(14.0));
        assert!(matches!(p.content[1], InlineContent::Raw { .. }));
    }

    #[test]
    fn test_tabs_breaks_and_opaque_runs() {
        let xml = wrap(
            r#"<w:p><w:r><w:t>a</w:t><w:tab/><w:t>b</w:t><w:br/><w:t>c</w:t></w:r><w:r><w:br w:type="page"/></w:r><w:r><w:fldChar w:fldCharType="begin"/></w:r></w:p>"#,
        );
        let doc = parse_document(&xml).unwrap();
        let p = doc.paragraph(0).unwrap();
        assert_eq!(p.plain_text(), "a\tb\nc");
        assert_eq!(p.runs().count(), 1);
        assert_eq!(p.content.len(), 3);
    }

    #[test]
    fn test_tables_and_raw_blocks() {
        let xml = wrap(
            r#"<w:tbl><w:tblPr><w:tblStyle w:val="Grille"/></w:tblPr><w:tblGrid><w:gridCol w:w="2000"/></w:tblGrid><w:tr><w:trPr><w:tblHeader/></w:trPr><w:tc><w:tcPr><w:tcW w:w="2000" w:type="dxa"/></w:tcPr><w:p><w:r><w:t>{{ENTITY_TOTAL}}</w:t></w:r></w:p></w:tc></w:tr></w:tbl><w:sectPr><w:pgSz w:w="11906" w:h="16838"/></w:sectPr>"#,
        );
        let doc = parse_document(&xml).unwrap();
        assert_eq!(doc.len(), 2);

        let table = doc.get(0).and_then(Block::as_table).unwrap();
        assert_eq!(table.header_rows, 1);
        assert!(table.properties_xml.as_deref().unwrap().contains("Grille"));
        assert!(table.grid_xml.is_some());
        let cell = &table.rows[0].cells[0];
        assert_eq!(cell.content.len(), 1);
        assert_eq!(cell.plain_text(), "{{ENTITY_TOTAL}}");
        assert!(cell.properties_xml.as_deref().unwrap().starts_with("<w:tcPr>"));

        match doc.get(1).unwrap() {
            Block::Raw { xml } => assert!(xml.starts_with("<w:sectPr>")),
            other => panic!("expected raw block, got {:?}", other),
        }
    }

    #[test]
    fn test_body_content_range() {
        let xml = wrap("<w:p/>");
        let (start, end) = body_content_range(&xml).unwrap();
        assert_eq!(&xml[start..end], "<w:p/>");

        let empty = format!(r#"<w:document xmlns:w="{}"><w:body/></w:document>"#, W_NS);
        let (start, end) = body_content_range(&empty).unwrap();
        assert_eq!(start, end);
    }

    #[test]
    fn test_missing_body() {
        let xml = format!(r#"<w:document xmlns:w="{}"/>"#, W_NS);
        assert!(matches!(parse_document(&xml), Err(Error::Package(_))));
        assert!(matches!(parse_document("<w:document"), Err(Error::Xml(_))));
    }

    #[test]
    fn test_core_title() {
        let core = r#"<cp:coreProperties xmlns:cp="urn:cp" xmlns:dc="http://purl.org/dc/elements/1.1/"><dc:title> Bilan GES </dc:title></cp:coreProperties>"#;
        assert_eq!(parse_core_title(core).as_deref(), Some("Bilan GES"));
        assert_eq!(parse_core_title("<x/>"), None);
    }
}
