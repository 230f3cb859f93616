// Shared helpers for Office Open XML packages (xlsx, docx)

use std::collections::HashMap;
use std::io::{Read, Seek};

use quick_xml::events::{BytesRef, BytesStart, Event};
use quick_xml::Reader;
use zip::ZipArchive;

pub(crate) const WORKBOOK_PART: &str = "xl/workbook.xml";
pub(crate) const WORKBOOK_RELS_PART: &str = "xl/_rels/workbook.xml.rels";
pub(crate) const CALC_CHAIN_PART: &str = "xl/calcChain.xml";
pub(crate) const CONTENT_TYPES_PART: &str = "[Content_Types].xml";

/// Read a file from a ZIP archive, returning None if it is absent or unreadable.
pub(crate) fn read_zip_entry<R: Read + Seek>(archive: &mut ZipArchive<R>, path: &str) -> Option<String> {
    let mut file = archive.by_name(path).ok()?;
    let mut content = String::new();
    file.read_to_string(&mut content).ok()?;
    Some(content)
}

/// Unescaped value of an attribute by exact (qualified) key.
pub(crate) fn attr_value(e: &BytesStart, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == key)
        .map(|a| {
            let raw = String::from_utf8_lossy(&a.value);
            match quick_xml::escape::unescape(&raw) {
                Ok(text) => text.into_owned(),
                Err(_) => raw.into_owned(),
            }
        })
}

/// Append the text an entity or character reference stands for.
pub(crate) fn push_reference(out: &mut String, r: &BytesRef) {
    if let Ok(Some(ch)) = r.resolve_char_ref() {
        out.push(ch);
        return;
    }
    let name = String::from_utf8_lossy(r.as_ref());
    match quick_xml::escape::resolve_predefined_entity(&name) {
        Some(text) => out.push_str(text),
        None => {
            out.push('&');
            out.push_str(&name);
            out.push(';');
        }
    }
}

/// Escape text content for an element body.
///
/// `\r` is written as a character reference so XML end-of-line handling
/// cannot fold it into `\n`. Characters XML 1.0 cannot carry are dropped.
pub(crate) fn escape_text(s: &str) -> String {
    let (out, dropped) = escape_counting(s);
    if dropped > 0 {
        tracing::warn!(dropped, "dropped characters XML cannot store");
    }
    out
}

fn escape_counting(s: &str) -> (String, usize) {
    let mut out = String::with_capacity(s.len());
    let mut dropped = 0;
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\r' => out.push_str("&#13;"),
            '\t' | '\n' => out.push(ch),
            c if (c as u32) < 0x20 => dropped += 1,
            '\u{FFFE}' | '\u{FFFF}' => dropped += 1,
            c => out.push(c),
        }
    }
    (out, dropped)
}

/// Map sheet name → worksheet part path (e.g. "xl/worksheets/sheet1.xml"),
/// in workbook order.
pub(crate) fn resolve_sheet_parts(workbook_xml: &str, rels_xml: &str) -> Vec<(String, String)> {
    // Step 1: sheet name + rId from workbook.xml
    let mut sheets = Vec::new();
    let mut reader = Reader::from_str(workbook_xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e)) if e.local_name().as_ref() == b"sheet" => {
                let name = attr_value(e, b"name");
                let rid = attr_value(e, b"r:id");
                if let (Some(name), Some(rid)) = (name, rid) {
                    sheets.push((name, rid));
                }
            }
            Ok(Event::Eof) => break,
            Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    // Step 2: rId → target from the relationships part
    let mut rid_to_target: HashMap<String, String> = HashMap::new();
    let mut reader = Reader::from_str(rels_xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e))
                if e.local_name().as_ref() == b"Relationship" =>
            {
                if let (Some(id), Some(target)) = (attr_value(e, b"Id"), attr_value(e, b"Target")) {
                    rid_to_target.insert(id, target);
                }
            }
            Ok(Event::Eof) => break,
            Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    // Step 3: resolve each rId to a package path
    sheets
        .into_iter()
        .filter_map(|(name, rid)| {
            let target = rid_to_target.get(&rid)?;
            let path = match target.strip_prefix('/') {
                Some(absolute) => absolute.to_string(),
                None => format!("xl/{}", target),
            };
            Some((name, path))
        })
        .collect()
}
