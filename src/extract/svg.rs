//! SVG text content: `<title>`, `<desc>`, `<text>`, and `<tspan>`.

use async_trait::async_trait;
use notegraph_core::models::{ExtractionResult, SourceFile};
use quick_xml::events::Event;
use quick_xml::Reader;

use super::{ExtractError, Extractor};

const TEXT_ELEMENTS: &[&[u8]] = &[b"title", b"desc", b"text", b"tspan"];

pub struct SvgExtractor;

#[async_trait]
impl Extractor for SvgExtractor {
    async fn extract(&self, bytes: &[u8], _file: &SourceFile) -> ExtractionResult {
        match extract_svg_text(bytes) {
            Ok((parts, elements)) => {
                ExtractionResult::from_text(parts.join("\n")).with_detail("text_elements", elements)
            }
            Err(e) => e.into_result(),
        }
    }
}

fn extract_svg_text(bytes: &[u8]) -> Result<(Vec<String>, usize), ExtractError> {
    let mut reader = Reader::from_reader(bytes);
    let mut buf = Vec::new();
    let mut depth = 0usize;
    let mut elements = 0usize;
    let mut parts: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut saw_svg = false;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let name = e.local_name();
                if name.as_ref() == b"svg" {
                    saw_svg = true;
                }
                if TEXT_ELEMENTS.contains(&name.as_ref()) {
                    if depth == 0 {
                        elements += 1;
                    }
                    depth += 1;
                }
            }
            Ok(Event::Empty(e)) if e.local_name().as_ref() == b"svg" => saw_svg = true,
            Ok(Event::Text(te)) if depth > 0 => {
                let text = te.unescape().map_err(|e| ExtractError::Svg(e.to_string()))?;
                let text = text.trim();
                if !text.is_empty() {
                    if !current.is_empty() {
                        current.push(' ');
                    }
                    current.push_str(text);
                }
            }
            Ok(Event::End(e)) if depth > 0 && TEXT_ELEMENTS.contains(&e.local_name().as_ref()) => {
                depth -= 1;
                if depth == 0 && !current.is_empty() {
                    parts.push(std::mem::take(&mut current));
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExtractError::Svg(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    if !saw_svg {
        return Err(ExtractError::Svg("no <svg> root element".to_string()));
    }
    Ok((parts, elements))
}
