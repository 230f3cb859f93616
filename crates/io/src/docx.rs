// Minimal WordprocessingML (.docx) carrier documents
//
// Only what a carrier needs: a body of plain paragraphs on write, and the
// text of paragraphs and table cells on read. No styles, no numbering.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use cellscribe_config::CarrierFidelity;
use quick_xml::events::Event;
use quick_xml::Reader;
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

use crate::error::StoreError;
use crate::ooxml::{escape_text, push_reference, read_zip_entry};

const DOCUMENT_PART: &str = "word/document.xml";

const CONTENT_TYPES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/></Types>"#;

const ROOT_RELS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/></Relationships>"#;

const DOCUMENT_HEAD: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>"#;

const DOCUMENT_TAIL: &str = "</w:body></w:document>";

/// Write `text` as a .docx package at `path`.
///
/// `LineSplit` writes one paragraph per `\n`-separated line (an empty line
/// becomes an empty paragraph). `Basic` writes a single paragraph and keeps
/// line breaks and tabs as run-level breaks.
pub fn write_document(path: &Path, text: &str, fidelity: CarrierFidelity) -> Result<(), StoreError> {
    let file = File::create(path).map_err(|e| StoreError::write(path, e))?;
    let mut zip = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    let document = document_xml(text, fidelity);
    let parts: [(&str, &str); 3] = [
        ("[Content_Types].xml", CONTENT_TYPES_XML),
        ("_rels/.rels", ROOT_RELS_XML),
        (DOCUMENT_PART, document.as_str()),
    ];
    for (name, body) in parts {
        zip.start_file(name, options).map_err(|e| StoreError::write(path, e))?;
        zip.write_all(body.as_bytes()).map_err(|e| StoreError::write(path, e))?;
    }
    zip.finish().map_err(|e| StoreError::write(path, e))?;

    tracing::debug!(path = %path.display(), fidelity = fidelity.as_str(), chars = text.chars().count(), "wrote document");
    Ok(())
}

/// Read the text of a .docx package.
///
/// `LineSplit`: body paragraphs joined with `\n`, followed by the text of
/// every table cell, each prefixed with `\n`. `Basic`: every body paragraph
/// followed by `\n`, then surrounding whitespace trimmed.
pub fn read_document(path: &Path, fidelity: CarrierFidelity) -> Result<String, StoreError> {
    if !path.exists() {
        return Err(StoreError::FileNotFound(path.to_path_buf()));
    }
    let file = File::open(path).map_err(|e| StoreError::read(path, e))?;
    let mut archive = ZipArchive::new(file).map_err(|e| StoreError::read(path, format!("not a docx package: {}", e)))?;
    let xml = read_zip_entry(&mut archive, DOCUMENT_PART)
        .ok_or_else(|| StoreError::read(path, format!("missing {}", DOCUMENT_PART)))?;

    let body = parse_body(xml.as_bytes()).map_err(|e| StoreError::read(path, e))?;

    let text = match fidelity {
        CarrierFidelity::LineSplit => {
            let mut text = body.paragraphs.join("\n");
            for cell in &body.table_cells {
                text.push('\n');
                text.push_str(cell);
            }
            text
        }
        CarrierFidelity::Basic => {
            let mut text = String::new();
            for p in &body.paragraphs {
                text.push_str(p);
                text.push('\n');
            }
            text.trim().to_string()
        }
    };

    tracing::debug!(path = %path.display(), fidelity = fidelity.as_str(), chars = text.chars().count(), "read document");
    Ok(text)
}

fn document_xml(text: &str, fidelity: CarrierFidelity) -> String {
    let mut xml = String::with_capacity(DOCUMENT_HEAD.len() + text.len() * 2 + 64);
    xml.push_str(DOCUMENT_HEAD);

    match fidelity {
        CarrierFidelity::LineSplit => {
            for line in text.split('\n') {
                if line.is_empty() {
                    xml.push_str("<w:p/>");
                } else {
                    xml.push_str("<w:p><w:r><w:t xml:space=\"preserve\">");
                    xml.push_str(&escape_text(line));
                    xml.push_str("</w:t></w:r></w:p>");
                }
            }
        }
        CarrierFidelity::Basic => {
            xml.push_str("<w:p><w:r>");
            let mut run = String::new();
            for ch in text.chars() {
                match ch {
                    '\n' | '\t' => {
                        push_text(&mut xml, &run);
                        run.clear();
                        xml.push_str(if ch == '\n' { "<w:br/>" } else { "<w:tab/>" });
                    }
                    c => run.push(c),
                }
            }
            push_text(&mut xml, &run);
            xml.push_str("</w:r></w:p>");
        }
    }

    xml.push_str(DOCUMENT_TAIL);
    xml
}

fn push_text(xml: &mut String, run: &str) {
    if run.is_empty() {
        return;
    }
    xml.push_str("<w:t xml:space=\"preserve\">");
    xml.push_str(&escape_text(run));
    xml.push_str("</w:t>");
}

/// Text found in a document body.
#[derive(Debug, Default, PartialEq)]
struct Body {
    /// Top-level paragraphs, in order
    paragraphs: Vec<String>,
    /// Cells of top-level tables, row by row; paragraphs within a cell joined with `\n`
    table_cells: Vec<String>,
}

fn parse_body(xml: &[u8]) -> Result<Body, String> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(false);
    let mut buf = Vec::new();

    let mut body = Body::default();
    let mut table_depth = 0usize;
    let mut in_text = false;
    let mut in_run = false;
    let mut paragraph: Option<String> = None;
    let mut cell: Option<Vec<String>> = None;

    loop {
        buf.clear();
        let event = reader.read_event_into(&mut buf).map_err(|e| e.to_string())?;
        // Only paragraphs directly in the body or in a top-level table cell count
        let collecting = table_depth <= 1;

        match event {
            Event::Eof => break,
            Event::Start(ref e) => match e.local_name().as_ref() {
                b"tbl" => table_depth += 1,
                b"tc" if table_depth == 1 => cell = Some(Vec::new()),
                b"p" if collecting => paragraph = Some(String::new()),
                b"r" => in_run = true,
                b"t" => in_text = true,
                _ => {}
            },
            Event::Empty(ref e) => match e.local_name().as_ref() {
                b"p" if collecting => finish_paragraph(String::new(), table_depth, &mut cell, &mut body),
                // <w:tab/> inside <w:tabs> is a tab stop, not text
                b"tab" if collecting && in_run => {
                    if let Some(p) = paragraph.as_mut() {
                        p.push('\t');
                    }
                }
                b"br" | b"cr" if collecting && in_run => {
                    if let Some(p) = paragraph.as_mut() {
                        p.push('\n');
                    }
                }
                b"tc" if table_depth == 1 => body.table_cells.push(String::new()),
                _ => {}
            },
            Event::End(ref e) => match e.local_name().as_ref() {
                b"tbl" => table_depth = table_depth.saturating_sub(1),
                b"tc" if table_depth == 1 => {
                    if let Some(paragraphs) = cell.take() {
                        body.table_cells.push(paragraphs.join("\n"));
                    }
                }
                b"p" if collecting => {
                    if let Some(text) = paragraph.take() {
                        finish_paragraph(text, table_depth, &mut cell, &mut body);
                    }
                }
                b"r" => in_run = false,
                b"t" => in_text = false,
                _ => {}
            },
            Event::Text(ref t) if in_text && collecting => {
                if let Some(p) = paragraph.as_mut() {
                    p.push_str(&String::from_utf8_lossy(t.as_ref()));
                }
            }
            Event::CData(ref t) if in_text && collecting => {
                if let Some(p) = paragraph.as_mut() {
                    p.push_str(&String::from_utf8_lossy(t.as_ref()));
                }
            }
            Event::GeneralRef(ref r) if in_text && collecting => {
                if let Some(p) = paragraph.as_mut() {
                    push_reference(p, r);
                }
            }
            _ => {}
        }
    }

    Ok(body)
}

fn finish_paragraph(text: String, table_depth: usize, cell: &mut Option<Vec<String>>, body: &mut Body) {
    if table_depth == 0 {
        body.paragraphs.push(text);
    } else if let Some(paragraphs) = cell.as_mut() {
        paragraphs.push(text);
    }
}
