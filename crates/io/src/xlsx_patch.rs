// In-place edits of worksheet XML
//
// The workbook is never round-tripped through a spreadsheet model: only the
// target <c> element changes, everything else is streamed through as-is.

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use crate::cell_ref::CellRef;
use crate::ooxml::{attr_value, escape_text};

fn xml_err<E: std::fmt::Display>(e: E) -> String {
    e.to_string()
}

/// Set `cell` to an inline string in a worksheet part.
///
/// An existing cell keeps its style index; a missing cell (or row) is
/// inserted in row/column order. The `<dimension>` ref is widened to cover
/// the cell.
pub(crate) fn set_cell_in_sheet_xml(xml: &[u8], cell: CellRef, value: &str) -> Result<Vec<u8>, String> {
    let target_row = cell.row_number();
    let target_col = cell.col_number();

    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(false);
    let mut writer = Writer::new(Vec::with_capacity(xml.len() + value.len() + 64));
    let mut buf = Vec::new();

    let mut in_sheet_data = false;
    let mut in_target_row = false;
    let mut done = false;
    // Depth inside an old <c> being replaced (0 = not skipping)
    let mut skip_depth = 0usize;
    let mut last_row = 0u32;
    let mut last_col = 0u32;

    loop {
        buf.clear();
        let event = reader.read_event_into(&mut buf).map_err(xml_err)?;

        if skip_depth > 0 {
            match event {
                Event::Start(_) => skip_depth += 1,
                Event::End(_) => skip_depth -= 1,
                Event::Eof => return Err("unexpected end of worksheet inside a cell".into()),
                _ => {}
            }
            continue;
        }

        match event {
            Event::Eof => break,

            Event::Start(ref e) if e.local_name().as_ref() == b"sheetData" => {
                in_sheet_data = true;
                writer.write_event(event.borrow()).map_err(xml_err)?;
            }
            Event::Empty(ref e) if e.local_name().as_ref() == b"sheetData" => {
                // <sheetData/>: open it up and add the row
                writer.write_event(Event::Start(e.to_owned())).map_err(xml_err)?;
                write_row(&mut writer, cell, value)?;
                writer
                    .write_event(Event::End(BytesEnd::new(qualified_name(e))))
                    .map_err(xml_err)?;
                done = true;
            }
            Event::End(ref e) if e.local_name().as_ref() == b"sheetData" => {
                if !done {
                    write_row(&mut writer, cell, value)?;
                    done = true;
                }
                in_sheet_data = false;
                writer.write_event(event.borrow()).map_err(xml_err)?;
            }

            Event::Start(ref e) | Event::Empty(ref e)
                if in_sheet_data && !done && e.local_name().as_ref() == b"row" =>
            {
                let is_empty = matches!(event, Event::Empty(_));
                let r = attr_value(e, b"r")
                    .and_then(|v| v.parse::<u32>().ok())
                    .unwrap_or(last_row + 1);
                last_row = r;

                if r > target_row {
                    write_row(&mut writer, cell, value)?;
                    done = true;
                    writer.write_event(event.borrow()).map_err(xml_err)?;
                } else if r == target_row {
                    let row = row_without_spans(e);
                    let end = BytesEnd::new(qualified_name(e));
                    writer.write_event(Event::Start(row)).map_err(xml_err)?;
                    last_col = 0;
                    if is_empty {
                        write_cell(&mut writer, cell, value, None)?;
                        writer.write_event(Event::End(end)).map_err(xml_err)?;
                        done = true;
                    } else {
                        in_target_row = true;
                    }
                } else {
                    writer.write_event(event.borrow()).map_err(xml_err)?;
                }
            }

            Event::Start(ref e) | Event::Empty(ref e)
                if in_target_row && !done && e.local_name().as_ref() == b"c" =>
            {
                let col = attr_value(e, b"r")
                    .and_then(|v| CellRef::parse(&v).ok())
                    .map(|c| c.col_number())
                    .unwrap_or(last_col + 1);
                last_col = col;

                if col == target_col {
                    let style = attr_value(e, b"s");
                    write_cell(&mut writer, cell, value, style.as_deref())?;
                    if matches!(event, Event::Start(_)) {
                        skip_depth = 1;
                    }
                    done = true;
                } else if col > target_col {
                    write_cell(&mut writer, cell, value, None)?;
                    done = true;
                    writer.write_event(event.borrow()).map_err(xml_err)?;
                } else {
                    writer.write_event(event.borrow()).map_err(xml_err)?;
                }
            }

            Event::End(ref e) if in_target_row && e.local_name().as_ref() == b"row" => {
                if !done {
                    write_cell(&mut writer, cell, value, None)?;
                    done = true;
                }
                in_target_row = false;
                writer.write_event(event.borrow()).map_err(xml_err)?;
            }

            Event::Empty(ref e) if e.local_name().as_ref() == b"dimension" => {
                let widened = attr_value(e, b"ref")
                    .map(|r| widen_dimension(&r, cell))
                    .unwrap_or_else(|| cell.to_string());
                let mut dim = BytesStart::new(qualified_name(e));
                for attr in e.attributes().flatten() {
                    if attr.key.as_ref() != b"ref" {
                        dim.push_attribute(attr);
                    }
                }
                dim.push_attribute(("ref", widened.as_str()));
                writer.write_event(Event::Empty(dim)).map_err(xml_err)?;
            }

            other => writer.write_event(other).map_err(xml_err)?,
        }
    }

    if !done {
        return Err("worksheet has no <sheetData> element".into());
    }
    Ok(writer.into_inner())
}

/// Drop every empty element named `local` for which `matches` holds.
/// Used to unhook the calculation chain from content types and relationships.
pub(crate) fn remove_elements(
    xml: &[u8],
    local: &[u8],
    matches: impl Fn(&BytesStart) -> bool,
) -> Result<Vec<u8>, String> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(false);
    let mut writer = Writer::new(Vec::with_capacity(xml.len()));
    let mut buf = Vec::new();

    loop {
        buf.clear();
        let event = reader.read_event_into(&mut buf).map_err(xml_err)?;
        match event {
            Event::Eof => break,
            Event::Empty(ref e) if e.local_name().as_ref() == local && matches(e) => {}
            other => writer.write_event(other).map_err(xml_err)?,
        }
    }

    Ok(writer.into_inner())
}

fn qualified_name(e: &BytesStart) -> String {
    String::from_utf8_lossy(e.name().as_ref()).into_owned()
}

/// Copy a <row> start tag without its `spans` hint, which may no longer hold.
fn row_without_spans(e: &BytesStart) -> BytesStart<'static> {
    let mut row = BytesStart::new(qualified_name(e));
    for attr in e.attributes().flatten() {
        if attr.key.as_ref() != b"spans" {
            row.push_attribute(attr);
        }
    }
    row
}

fn write_row(writer: &mut Writer<Vec<u8>>, cell: CellRef, value: &str) -> Result<(), String> {
    let row_number = cell.row_number().to_string();
    let mut row = BytesStart::new("row");
    row.push_attribute(("r", row_number.as_str()));
    writer.write_event(Event::Start(row)).map_err(xml_err)?;
    write_cell(writer, cell, value, None)?;
    writer.write_event(Event::End(BytesEnd::new("row"))).map_err(xml_err)?;
    Ok(())
}

fn write_cell(writer: &mut Writer<Vec<u8>>, cell: CellRef, value: &str, style: Option<&str>) -> Result<(), String> {
    let reference = cell.to_string();
    let mut c = BytesStart::new("c");
    c.push_attribute(("r", reference.as_str()));
    if let Some(s) = style {
        c.push_attribute(("s", s));
    }
    c.push_attribute(("t", "inlineStr"));

    let mut t = BytesStart::new("t");
    t.push_attribute(("xml:space", "preserve"));

    let escaped = escape_text(value);
    writer.write_event(Event::Start(c)).map_err(xml_err)?;
    writer.write_event(Event::Start(BytesStart::new("is"))).map_err(xml_err)?;
    writer.write_event(Event::Start(t)).map_err(xml_err)?;
    writer
        .write_event(Event::Text(BytesText::from_escaped(escaped.as_str())))
        .map_err(xml_err)?;
    writer.write_event(Event::End(BytesEnd::new("t"))).map_err(xml_err)?;
    writer.write_event(Event::End(BytesEnd::new("is"))).map_err(xml_err)?;
    writer.write_event(Event::End(BytesEnd::new("c"))).map_err(xml_err)?;
    Ok(())
}

/// Union of a `<dimension ref>` ("A1:C12" or "C2") with one cell.
fn widen_dimension(current: &str, cell: CellRef) -> String {
    let mut parts = current.split(':');
    let first = parts.next().and_then(|p| CellRef::parse(p).ok());
    let last = parts.next().and_then(|p| CellRef::parse(p).ok()).or(first);

    match (first, last) {
        (Some(a), Some(b)) => {
            let top_left = CellRef::new(a.row.min(cell.row), a.col.min(cell.col));
            let bottom_right = CellRef::new(b.row.max(cell.row), b.col.max(cell.col));
            if top_left == bottom_right {
                top_left.to_string()
            } else {
                format!("{}:{}", top_left, bottom_right)
            }
        }
        _ => cell.to_string(),
    }
}
