//! Office Open XML documents: docx, xlsx, pptx.
//!
//! Each format is a ZIP of XML parts. Text lives in `w:t` runs (docx),
//! `a:t` runs per slide (pptx), and the shared-strings table referenced by
//! cells (xlsx). Legacy binary formats (doc/xls/ppt) and OpenDocument files
//! are recognized but reported as unsupported.

use std::io::{Cursor, Read};

use async_trait::async_trait;
use notegraph_core::models::{ContentType, ExtractionResult, SourceFile};
use quick_xml::events::Event;
use quick_xml::Reader;

use super::{signature, ExtractError, Extractor};

/// Maximum cells to read per sheet.
const XLSX_MAX_CELLS_PER_SHEET: usize = 100_000;
/// Maximum decompressed bytes to read from a single ZIP entry (zip-bomb protection).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

type Archive<'a> = zip::ZipArchive<Cursor<&'a [u8]>>;

pub struct OfficeExtractor {
    max_sheets: usize,
}

impl OfficeExtractor {
    pub fn new(max_sheets: usize) -> Self {
        Self { max_sheets }
    }

    fn run(&self, bytes: &[u8], file: &SourceFile) -> Result<ExtractionResult, ExtractError> {
        let ext = file.extension().unwrap_or_default();
        signature::check(file.content_type, &ext, bytes)?;
        match (file.content_type, ext.as_str()) {
            (ContentType::OfficeDoc, "docx") => {
                let text = extract_docx(bytes)?;
                Ok(ExtractionResult::from_text(text))
            }
            (ContentType::OfficePresentation, "pptx") => {
                let (text, slides) = extract_pptx(bytes)?;
                Ok(ExtractionResult::from_text(text).with_detail("slide_count", slides))
            }
            (ContentType::OfficeSheet, "xlsx") => {
                let (text, sheets) = extract_xlsx(bytes, self.max_sheets)?;
                Ok(ExtractionResult::from_text(text).with_detail("sheet_count", sheets))
            }
            (_, other) => Err(ExtractError::Unsupported(format!(".{} documents", other))),
        }
    }
}

#[async_trait]
impl Extractor for OfficeExtractor {
    async fn extract(&self, bytes: &[u8], file: &SourceFile) -> ExtractionResult {
        self.run(bytes, file)
            .unwrap_or_else(ExtractError::into_result)
    }
}

fn ooxml_err(e: impl std::fmt::Display) -> ExtractError {
    ExtractError::Ooxml(e.to_string())
}

fn open_archive(bytes: &[u8]) -> Result<Archive<'_>, ExtractError> {
    zip::ZipArchive::new(Cursor::new(bytes)).map_err(ooxml_err)
}

fn read_zip_entry_bounded(archive: &mut Archive<'_>, name: &str) -> Result<Vec<u8>, ExtractError> {
    let entry = archive.by_name(name).map_err(ooxml_err)?;
    let mut out = Vec::new();
    entry
        .take(MAX_XML_ENTRY_BYTES)
        .read_to_end(&mut out)
        .map_err(ooxml_err)?;
    if out.len() as u64 >= MAX_XML_ENTRY_BYTES {
        return Err(ExtractError::Ooxml(format!(
            "ZIP entry {} exceeds size limit ({} bytes)",
            name, MAX_XML_ENTRY_BYTES
        )));
    }
    Ok(out)
}

/// Numbered parts such as `ppt/slides/slide12.xml`, in numeric order.
fn numbered_parts(archive: &Archive<'_>, prefix: &str) -> Vec<String> {
    let mut names: Vec<String> = archive
        .file_names()
        .filter(|n| n.starts_with(prefix) && n.ends_with(".xml"))
        .map(|s| s.to_string())
        .collect();
    names.sort_by_key(|name| {
        name.trim_start_matches(prefix)
            .trim_end_matches(".xml")
            .parse::<u32>()
            .unwrap_or(u32::MAX)
    });
    names
}

fn extract_docx(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive = open_archive(bytes)?;
    let xml = read_zip_entry_bounded(&mut archive, "word/document.xml")?;
    text_runs(&xml, b"t", Some(b"p"))
}

fn extract_pptx(bytes: &[u8]) -> Result<(String, usize), ExtractError> {
    let mut archive = open_archive(bytes)?;
    let slides = numbered_parts(&archive, "ppt/slides/slide");
    let mut out = Vec::new();
    for name in &slides {
        let xml = read_zip_entry_bounded(&mut archive, name)?;
        let text = text_runs(&xml, b"t", Some(b"p"))?;
        if !text.is_empty() {
            out.push(text);
        }
    }
    Ok((out.join("\n\n"), slides.len()))
}

/// Concatenates the text of every `<*:run>` element. When `paragraph` is
/// given, a newline is emitted at the end of each such element.
fn text_runs(xml: &[u8], run: &[u8], paragraph: Option<&[u8]>) -> Result<String, ExtractError> {
    let mut out = String::new();
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut in_run = false;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.local_name().as_ref() == run => in_run = true,
            Ok(Event::Text(te)) if in_run => {
                out.push_str(te.unescape().unwrap_or_default().as_ref());
            }
            Ok(Event::End(e)) => {
                let name = e.local_name();
                if name.as_ref() == run {
                    in_run = false;
                } else if paragraph == Some(name.as_ref()) && !out.is_empty() && !out.ends_with('\n') {
                    out.push('\n');
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(ooxml_err(e)),
            _ => {}
        }
        buf.clear();
    }
    Ok(out.trim().to_string())
}

fn extract_xlsx(bytes: &[u8], max_sheets: usize) -> Result<(String, usize), ExtractError> {
    let mut archive = open_archive(bytes)?;
    let shared_strings = read_shared_strings(&mut archive)?;
    let sheets = numbered_parts(&archive, "xl/worksheets/sheet");
    let mut out = Vec::new();
    for name in sheets.iter().take(max_sheets) {
        let xml = read_zip_entry_bounded(&mut archive, name)?;
        let cells = extract_sheet_cells(&xml, &shared_strings)?;
        if !cells.is_empty() {
            out.push(cells);
        }
    }
    Ok((out.join("\n\n"), sheets.len()))
}

fn read_shared_strings(archive: &mut Archive<'_>) -> Result<Vec<String>, ExtractError> {
    if archive.index_for_name("xl/sharedStrings.xml").is_none() {
        return Ok(Vec::new());
    }
    let xml = read_zip_entry_bounded(archive, "xl/sharedStrings.xml")?;
    let mut strings = Vec::new();
    let mut reader = Reader::from_reader(xml.as_slice());
    let mut buf = Vec::new();
    let mut current: Option<String> = None;
    let mut in_t = false;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"si" => current = Some(String::new()),
                b"t" => in_t = true,
                _ => {}
            },
            Ok(Event::Text(te)) if in_t => {
                if let Some(s) = current.as_mut() {
                    s.push_str(te.unescape().unwrap_or_default().as_ref());
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"si" => strings.extend(current.take()),
                b"t" => in_t = false,
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(ooxml_err(e)),
            _ => {}
        }
        buf.clear();
    }
    Ok(strings)
}

/// Shared-string and inline-string cells, one row per line.
fn extract_sheet_cells(xml: &[u8], shared_strings: &[String]) -> Result<String, ExtractError> {
    let mut rows: Vec<String> = Vec::new();
    let mut row: Vec<String> = Vec::new();
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut in_value = false;
    let mut cell_type: Option<Vec<u8>> = None;
    let mut cell_count = 0usize;
    loop {
        if cell_count >= XLSX_MAX_CELLS_PER_SHEET {
            break;
        }
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"c" => {
                    cell_type = e
                        .attributes()
                        .flatten()
                        .find(|a| a.key.as_ref() == b"t")
                        .map(|a| a.value.into_owned());
                }
                b"v" | b"t" => in_value = true,
                _ => {}
            },
            Ok(Event::Text(te)) if in_value => {
                let v = te.unescape().unwrap_or_default();
                let v = v.trim();
                let text = match cell_type.as_deref() {
                    Some(b"s") => v.parse::<usize>().ok().and_then(|i| shared_strings.get(i)).cloned(),
                    Some(b"inlineStr") | Some(b"str") => Some(v.to_string()),
                    _ => None,
                };
                if let Some(text) = text.filter(|t| !t.is_empty()) {
                    row.push(text);
                    cell_count += 1;
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"v" | b"t" => in_value = false,
                b"c" => cell_type = None,
                b"row" => {
                    if !row.is_empty() {
                        rows.push(std::mem::take(&mut row).join(" "));
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(ooxml_err(e)),
            _ => {}
        }
        buf.clear();
    }
    if !row.is_empty() {
        rows.push(row.join(" "));
    }
    Ok(rows.join("\n"))
}
