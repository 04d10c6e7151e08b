//! Markdown structural parsing.
//!
//! [`StructureParser::parse`] turns raw note text into a [`DocumentStructure`]:
//! frontmatter, heading-delimited sections, wikilinks, and tags. Parsing is
//! regex-based and line-oriented. The chunking engine only consumes the
//! resulting structure, so this module can be replaced without touching it.
//!
//! Frontmatter is handed to a [`FrontmatterParser`]. The default,
//! [`SimpleFrontmatter`], understands the subset of YAML that note headers
//! use in practice (scalars, inline and block lists, nested mappings) and
//! rejects anything else with a [`StructureError`].

use std::collections::{BTreeSet, HashMap};
use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Number, Value};

use crate::error::StructureError;

pub type Frontmatter = Map<String, Value>;

fn heading_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(#{1,6})\s+(.+)$").expect("heading regex"))
}

fn wikilink_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[\[([^\]]+)\]\]").expect("wikilink regex"))
}

fn hashtag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // A tag must start a word, so `page#anchor` and `[[Note#Heading]]` are not tags.
    RE.get_or_init(|| Regex::new(r"(?:^|\s)#([A-Za-z0-9_/-]+)").expect("hashtag regex"))
}

/// One heading-delimited region of a note.
#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    /// 1..=6 for headings, 0 for the preamble before the first heading.
    pub level: u8,
    /// Raw heading line, `None` for the preamble.
    pub heading: Option<String>,
    /// Heading text, empty for the preamble.
    pub title: String,
    /// Lines after the heading, joined with `\n`.
    pub body: String,
    /// 1-based line numbers in the original file (frontmatter included).
    pub start_line: usize,
    pub end_line: usize,
    pub wikilinks: Vec<String>,
    pub tags: Vec<String>,
}

impl Section {
    pub fn is_preamble(&self) -> bool {
        self.heading.is_none()
    }

    /// Heading line followed by the body lines.
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.heading
            .as_deref()
            .into_iter()
            .chain(self.body.split('\n'))
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct DocumentStructure {
    pub frontmatter: Frontmatter,
    pub sections: Vec<Section>,
    pub wikilinks: Vec<String>,
    /// Union of frontmatter `tags` and inline hashtags, without `#`.
    pub tags: Vec<String>,
    pub word_count: usize,
    pub char_count: usize,
    pub line_count: usize,
}

impl DocumentStructure {
    /// Frontmatter `title`, else the first level-1 heading, else `fallback`.
    pub fn title(&self, fallback: &str) -> String {
        if let Some(Value::String(t)) = self.frontmatter.get("title") {
            if !t.trim().is_empty() {
                return t.trim().to_string();
            }
        }
        self.sections
            .iter()
            .find(|s| s.level == 1)
            .map(|s| s.title.clone())
            .unwrap_or_else(|| fallback.to_string())
    }

    pub fn has_headings(&self) -> bool {
        self.sections.iter().any(|s| !s.is_preamble())
    }
}

/// Parses the body of a frontmatter block (without the `---` fences).
pub trait FrontmatterParser: Send + Sync {
    fn parse(&self, block: &str) -> Result<Frontmatter, StructureError>;
}

/// Strict parser for the common YAML subset found in note headers.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimpleFrontmatter;

/// A significant (non-blank, non-comment) frontmatter line.
struct FmLine<'a> {
    number: usize,
    indent: usize,
    text: &'a str,
    /// Index into [`FmBlock::raw`].
    raw_index: usize,
}

struct FmBlock<'a> {
    /// Every line of the block, blank and comment lines included.
    raw: Vec<&'a str>,
    lines: Vec<FmLine<'a>>,
}

fn fm_error(line: usize, message: impl Into<String>) -> StructureError {
    StructureError::Frontmatter {
        line,
        message: message.into(),
    }
}

impl FrontmatterParser for SimpleFrontmatter {
    fn parse(&self, block: &str) -> Result<Frontmatter, StructureError> {
        let raw: Vec<&str> = block.lines().collect();
        let mut lines = Vec::new();
        for (i, line) in raw.iter().enumerate() {
            let number = i + 2; // the opening fence is line 1
            let content = line.trim_end();
            let trimmed = content.trim_start();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let prefix = &content[..content.len() - trimmed.len()];
            if prefix.contains('\t') {
                return Err(fm_error(number, "tabs are not allowed in indentation"));
            }
            lines.push(FmLine {
                number,
                indent: prefix.len(),
                text: trimmed,
                raw_index: i,
            });
        }
        let doc = FmBlock { raw, lines };
        let mut pos = 0;
        let map = parse_mapping(&doc, &mut pos, 0)?;
        if let Some(line) = doc.lines.get(pos) {
            return Err(fm_error(line.number, "unexpected indentation"));
        }
        Ok(map)
    }
}

fn is_list_item(text: &str) -> bool {
    text == "-" || text.starts_with("- ")
}

fn parse_mapping(
    doc: &FmBlock<'_>,
    pos: &mut usize,
    indent: usize,
) -> Result<Frontmatter, StructureError> {
    let mut map = Map::new();
    while let Some(line) = doc.lines.get(*pos) {
        if line.indent < indent {
            break;
        }
        if line.indent > indent {
            return Err(fm_error(line.number, "unexpected indentation"));
        }
        if is_list_item(line.text) {
            return Err(fm_error(line.number, "list item without a key"));
        }
        let (key, rest) = split_key(line)?;
        *pos += 1;
        let value = if let Some(style) = BlockStyle::parse(rest) {
            Value::String(parse_block_scalar(doc, pos, line, style))
        } else if rest.is_empty() {
            match doc.lines.get(*pos) {
                Some(next) if next.indent >= indent && is_list_item(next.text) => {
                    let list_indent = next.indent;
                    parse_list(doc, pos, list_indent)?
                }
                Some(next) if next.indent > indent => {
                    let nested_indent = next.indent;
                    Value::Object(parse_mapping(doc, pos, nested_indent)?)
                }
                _ => Value::Null,
            }
        } else {
            parse_scalar(rest, line.number)?
        };
        map.insert(key, value);
    }
    Ok(map)
}

fn parse_list(doc: &FmBlock<'_>, pos: &mut usize, indent: usize) -> Result<Value, StructureError> {
    let mut items = Vec::new();
    while let Some(line) = doc.lines.get(*pos) {
        if line.indent != indent || !is_list_item(line.text) {
            break;
        }
        let item = line.text[1..].trim();
        items.push(if item.is_empty() {
            Value::Null
        } else {
            parse_scalar(item, line.number)?
        });
        *pos += 1;
    }
    Ok(Value::Array(items))
}

/// Header of a `|` (literal) or `>` (folded) block scalar.
#[derive(Debug, Clone, Copy, PartialEq)]
struct BlockStyle {
    folded: bool,
    chomp: Chomp,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Chomp {
    /// Single trailing newline (no indicator).
    Clip,
    /// `-`: no trailing newline.
    Strip,
    /// `+`: all trailing newlines.
    Keep,
}

impl BlockStyle {
    fn parse(header: &str) -> Option<Self> {
        let mut chars = header.chars();
        let folded = match chars.next()? {
            '|' => false,
            '>' => true,
            _ => return None,
        };
        let chomp = match chars.as_str() {
            "" => Chomp::Clip,
            "-" => Chomp::Strip,
            "+" => Chomp::Keep,
            _ => return None,
        };
        Some(Self { folded, chomp })
    }
}

/// Reads the lines indented deeper than `key_line` as block scalar content.
fn parse_block_scalar(
    doc: &FmBlock<'_>,
    pos: &mut usize,
    key_line: &FmLine<'_>,
    style: BlockStyle,
) -> String {
    let first = key_line.raw_index + 1;
    let mut end = first;
    let mut block_indent = None;
    while let Some(raw) = doc.raw.get(end) {
        let trimmed = raw.trim_start();
        if !trimmed.trim_end().is_empty() {
            let indent = raw.len() - trimmed.len();
            if indent <= key_line.indent {
                break;
            }
            block_indent.get_or_insert(indent);
        }
        end += 1;
    }
    while doc.lines.get(*pos).is_some_and(|l| l.raw_index < end) {
        *pos += 1;
    }

    let indent = block_indent.unwrap_or(0);
    let body: Vec<&str> = doc.raw[first..end]
        .iter()
        .map(|l| l.get(indent..).unwrap_or("").trim_end())
        .collect();
    let content_len = body
        .iter()
        .rposition(|l| !l.is_empty())
        .map_or(0, |i| i + 1);
    let trailing_blank = body.len() - content_len;
    let content = &body[..content_len];

    let mut text = if style.folded {
        fold_lines(content)
    } else {
        content.join("\n")
    };
    if content.is_empty() {
        return text;
    }
    match style.chomp {
        Chomp::Strip => {}
        Chomp::Clip => text.push('\n'),
        Chomp::Keep => text.push_str(&"\n".repeat(trailing_blank + 1)),
    }
    text
}

/// Folded style: single line breaks become spaces, each blank line becomes
/// a newline, and more-indented lines keep their breaks.
fn fold_lines(lines: &[&str]) -> String {
    let mut out = String::new();
    // Whether the previous line was text, and if so whether more-indented.
    let mut prev: Option<bool> = None;
    for line in lines {
        if line.is_empty() {
            out.push('\n');
            prev = None;
            continue;
        }
        let literal = line.starts_with(' ');
        match prev {
            Some(prev_literal) if prev_literal || literal => out.push('\n'),
            Some(_) => out.push(' '),
            None => {}
        }
        out.push_str(line);
        prev = Some(literal);
    }
    out
}

fn split_key<'a>(line: &FmLine<'a>) -> Result<(String, &'a str), StructureError> {
    let text = line.text;
    let (key, rest) = if let Some(idx) = text.find(": ") {
        (&text[..idx], text[idx + 2..].trim())
    } else if let Some(key) = text.strip_suffix(':') {
        (key, "")
    } else {
        return Err(fm_error(line.number, "expected `key: value`"));
    };
    let key = unquote(key.trim(), line.number)?;
    if key.is_empty() {
        return Err(fm_error(line.number, "empty key"));
    }
    Ok((key, rest))
}

fn unquote(s: &str, line: usize) -> Result<String, StructureError> {
    for quote in ['"', '\''] {
        if let Some(inner) = s.strip_prefix(quote) {
            return match inner.strip_suffix(quote) {
                Some(inner) if quote == '\'' => Ok(inner.replace("''", "'")),
                Some(inner) => Ok(inner.replace("\\\"", "\"")),
                None => Err(fm_error(line, "unterminated quoted string")),
            };
        }
    }
    Ok(s.to_string())
}

/// Splits the inside of an inline list on commas outside quotes and
/// nested brackets. A trailing comma adds no item.
fn split_inline_list(inner: &str, line: usize) -> Result<Vec<&str>, StructureError> {
    let mut items = Vec::new();
    let mut quote: Option<char> = None;
    let mut depth = 0usize;
    let mut start = 0;
    let mut escaped = false;
    for (i, c) in inner.char_indices() {
        match quote {
            Some('"') if escaped => escaped = false,
            Some('"') if c == '\\' => escaped = true,
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None => match c {
                '"' | '\'' => quote = Some(c),
                '[' | '{' => depth += 1,
                ']' | '}' => depth = depth.saturating_sub(1),
                ',' if depth == 0 => {
                    items.push(&inner[start..i]);
                    start = i + 1;
                }
                _ => {}
            },
        }
    }
    if quote.is_some() {
        return Err(fm_error(line, "unterminated quoted string"));
    }
    let last = &inner[start..];
    if !last.trim().is_empty() || items.is_empty() {
        items.push(last);
    }
    Ok(items)
}

fn parse_scalar(s: &str, line: usize) -> Result<Value, StructureError> {
    let s = s.trim();
    if s.starts_with('"') || s.starts_with('\'') {
        return unquote(s, line).map(Value::String);
    }
    if let Some(inner) = s.strip_prefix('[') {
        let inner = inner
            .strip_suffix(']')
            .ok_or_else(|| fm_error(line, "unterminated inline list"))?;
        if inner.trim().is_empty() {
            return Ok(Value::Array(Vec::new()));
        }
        return split_inline_list(inner, line)?
            .into_iter()
            .map(|item| parse_scalar(item, line))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array);
    }
    if s == "{}" {
        return Ok(Value::Object(Map::new()));
    }
    if s.starts_with('{') || s.starts_with('|') || s.starts_with('>') {
        return Err(fm_error(line, format!("unsupported value syntax: {}", s)));
    }
    Ok(match s {
        "true" | "True" => Value::Bool(true),
        "false" | "False" => Value::Bool(false),
        "null" | "~" | "" => Value::Null,
        _ => {
            if let Ok(n) = s.parse::<i64>() {
                Value::Number(n.into())
            } else if let Some(n) = s.parse::<f64>().ok().and_then(Number::from_f64) {
                Value::Number(n)
            } else {
                Value::String(s.to_string())
            }
        }
    })
}

/// Splits a leading `---` fenced block from the text.
///
/// Returns `(block, body, lines consumed)`. Text without a closed fence has
/// no frontmatter.
pub fn split_frontmatter(raw: &str) -> Option<(&str, &str, usize)> {
    let mut lines = raw.split_inclusive('\n');
    let first = lines.next()?;
    if first.trim_end() != "---" {
        return None;
    }
    let block_start = first.len();
    let mut offset = block_start;
    let mut consumed = 1;
    for line in lines {
        consumed += 1;
        if line.trim_end() == "---" {
            return Some((&raw[block_start..offset], &raw[offset + line.len()..], consumed));
        }
        offset += line.len();
    }
    None
}

fn push_unique(out: &mut Vec<String>, value: String) {
    if !value.is_empty() && !out.contains(&value) {
        out.push(value);
    }
}

/// Wikilink targets in first-seen order, deduplicated.
pub fn extract_wikilinks(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    for cap in wikilink_re().captures_iter(text) {
        push_unique(&mut out, cap[1].trim().to_string());
    }
    out
}

/// Inline hashtags (without `#`) in first-seen order, deduplicated.
pub fn extract_hashtags(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    for line in text.lines() {
        if heading_re().is_match(line) {
            // Only the heading text may carry tags, not its `#` markers.
            let stripped = line.trim_start_matches('#');
            for cap in hashtag_re().captures_iter(stripped) {
                push_unique(&mut out, cap[1].to_string());
            }
            continue;
        }
        for cap in hashtag_re().captures_iter(line) {
            push_unique(&mut out, cap[1].to_string());
        }
    }
    out
}

/// Normalizes the frontmatter `tags` field to a list: a string becomes a
/// single tag, arrays keep their items, a leading `#` is stripped.
pub fn frontmatter_tags(frontmatter: &Frontmatter) -> Vec<String> {
    let clean = |s: &str| s.trim().trim_start_matches('#').trim().to_string();
    let mut out = Vec::new();
    match frontmatter.get("tags") {
        Some(Value::String(s)) => push_unique(&mut out, clean(s)),
        Some(Value::Array(items)) => {
            for item in items {
                let tag = match item {
                    Value::String(s) => clean(s),
                    Value::Null => continue,
                    other => clean(&other.to_string()),
                };
                push_unique(&mut out, tag);
            }
        }
        _ => {}
    }
    out
}

/// Regex-based Markdown parser with a pluggable frontmatter parser.
pub struct StructureParser<P = SimpleFrontmatter> {
    frontmatter: P,
}

impl Default for StructureParser<SimpleFrontmatter> {
    fn default() -> Self {
        Self::new(SimpleFrontmatter)
    }
}

impl<P: FrontmatterParser> StructureParser<P> {
    pub fn new(frontmatter: P) -> Self {
        Self { frontmatter }
    }

    pub fn parse(&self, raw: &str) -> Result<DocumentStructure, StructureError> {
        let raw = raw.strip_prefix('\u{feff}').unwrap_or(raw);
        let (frontmatter, body, offset) = match split_frontmatter(raw) {
            Some((block, body, consumed)) => (self.frontmatter.parse(block)?, body, consumed),
            None => (Map::new(), raw, 0),
        };

        let lines: Vec<&str> = body.lines().collect();
        let mut sections = Vec::new();
        let mut start = 0;
        let mut heading: Option<(u8, &str, &str)> = None;

        for (i, line) in lines.iter().copied().enumerate() {
            if let Some(cap) = heading_re().captures(line) {
                let level = cap.get(1).map_or(1, |m| m.as_str().len()) as u8;
                let title = cap.get(2).map_or("", |m| m.as_str());
                if let Some(section) = build_section(heading, &lines[start..i], start, offset) {
                    sections.push(section);
                }
                heading = Some((level, line, title));
                start = i;
            }
        }
        if let Some(section) = build_section(heading, &lines[start..], start, offset) {
            sections.push(section);
        }

        let mut tags = frontmatter_tags(&frontmatter);
        for tag in extract_hashtags(body) {
            push_unique(&mut tags, tag);
        }

        Ok(DocumentStructure {
            wikilinks: extract_wikilinks(body),
            tags,
            word_count: body.split_whitespace().count(),
            char_count: body.chars().count(),
            line_count: lines.len(),
            frontmatter,
            sections,
        })
    }
}

/// `lines` starts with the heading line when `heading` is set.
fn build_section(
    heading: Option<(u8, &str, &str)>,
    lines: &[&str],
    start: usize,
    offset: usize,
) -> Option<Section> {
    let body_lines = match heading {
        Some(_) => lines.get(1..).unwrap_or(&[]),
        None => lines,
    };
    let body = body_lines.join("\n");
    if heading.is_none() && body.trim().is_empty() {
        return None;
    }
    let (level, heading_line, title) = match heading {
        Some((level, line, title)) => (level, Some(line.to_string()), title.trim().to_string()),
        None => (0, None, String::new()),
    };
    let text = match &heading_line {
        Some(h) => format!("{}\n{}", h, body),
        None => body.clone(),
    };
    Some(Section {
        level,
        heading: heading_line,
        title,
        start_line: offset + start + 1,
        end_line: offset + start + lines.len().max(1),
        wikilinks: extract_wikilinks(&text),
        tags: extract_hashtags(&text),
        body,
    })
}

/// Parse with the default frontmatter parser.
pub fn parse(raw: &str) -> Result<DocumentStructure, StructureError> {
    StructureParser::default().parse(raw)
}

/// Reverse wikilink index used to compute backlinks.
///
/// Targets resolve Obsidian-style: by file stem, case-insensitively,
/// ignoring folders, `#heading`, and `|alias` suffixes.
#[derive(Debug, Clone, Default)]
pub struct LinkIndex {
    incoming: HashMap<String, BTreeSet<String>>,
}

impl LinkIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn normalize_target(target: &str) -> String {
        let target = target.split(['#', '|']).next().unwrap_or(target).trim();
        let name = target.rsplit('/').next().unwrap_or(target);
        let name = name.strip_suffix(".md").unwrap_or(name);
        name.to_lowercase()
    }

    /// Record that `source_id` links to each of `wikilinks`.
    pub fn add_document(&mut self, source_id: &str, wikilinks: &[String]) {
        for target in wikilinks {
            let key = Self::normalize_target(target);
            if key.is_empty() {
                continue;
            }
            self.incoming
                .entry(key)
                .or_default()
                .insert(source_id.to_string());
        }
    }

    /// Sorted ids of notes linking to the note with `stem`, excluding `self_id`.
    pub fn backlinks(&self, stem: &str, self_id: &str) -> Vec<String> {
        self.incoming
            .get(&stem.to_lowercase())
            .map(|sources| {
                sources
                    .iter()
                    .filter(|s| s.as_str() != self_id)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.incoming.len()
    }

    pub fn is_empty(&self) -> bool {
        self.incoming.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sections_split_on_headings() {
        let doc = parse("# A\nfoo\n# B\nbar\n").unwrap();
        assert_eq!(doc.sections.len(), 2);
        assert_eq!(doc.sections[0].title, "A");
        assert_eq!(doc.sections[0].body, "foo");
        assert_eq!(doc.sections[0].start_line, 1);
        assert_eq!(doc.sections[0].end_line, 2);
        assert_eq!(doc.sections[1].title, "B");
        assert_eq!(doc.sections[1].start_line, 3);
        assert_eq!(doc.sections[1].end_line, 4);
    }

    #[test]
    fn test_heading_levels() {
        let doc = parse("## Two\n###### Six\n####### seven\n").unwrap();
        assert_eq!(doc.sections.len(), 2);
        assert_eq!(doc.sections[0].level, 2);
        assert_eq!(doc.sections[1].level, 6);
        assert_eq!(doc.sections[1].body, "####### seven");
    }

    #[test]
    fn test_hashtag_line_is_not_heading() {
        let doc = parse("#project notes\nmore").unwrap();
        assert_eq!(doc.sections.len(), 1);
        assert!(doc.sections[0].is_preamble());
        assert_eq!(doc.tags, vec!["project"]);
    }

    #[test]
    fn test_preamble_becomes_root_section() {
        let doc = parse("intro line\n\n# First\nbody\n").unwrap();
        assert_eq!(doc.sections.len(), 2);
        assert_eq!(doc.sections[0].level, 0);
        assert_eq!(doc.sections[0].start_line, 1);
        assert_eq!(doc.sections[0].end_line, 2);
        assert_eq!(doc.sections[1].start_line, 3);
    }

    #[test]
    fn test_blank_preamble_is_dropped() {
        let doc = parse("\n\n# First\nbody").unwrap();
        assert_eq!(doc.sections.len(), 1);
        assert_eq!(doc.sections[0].title, "First");
    }

    #[test]
    fn test_frontmatter_stripped_and_lines_offset() {
        let raw = "---\ntitle: Plan\ntags: [rust, \"cli\"]\n---\n# Goals\nship it\n";
        let doc = parse(raw).unwrap();
        assert_eq!(doc.frontmatter["title"], json!("Plan"));
        assert_eq!(doc.frontmatter["tags"], json!(["rust", "cli"]));
        assert_eq!(doc.sections.len(), 1);
        assert_eq!(doc.sections[0].start_line, 5);
        assert_eq!(doc.sections[0].end_line, 6);
        assert_eq!(doc.title("plan"), "Plan");
    }

    #[test]
    fn test_unclosed_frontmatter_is_body() {
        let doc = parse("---\ntitle: x\nno close").unwrap();
        assert!(doc.frontmatter.is_empty());
        assert_eq!(doc.sections[0].body, "---\ntitle: x\nno close");
    }

    #[test]
    fn test_tag_union_string_frontmatter() {
        let doc = parse("---\ntags: alpha\n---\nSome text #beta here").unwrap();
        let tags: BTreeSet<_> = doc.tags.iter().cloned().collect();
        assert_eq!(tags, BTreeSet::from(["alpha".to_string(), "beta".to_string()]));
    }

    #[test]
    fn test_tag_union_dedupes_and_strips_hash() {
        let doc = parse("---\ntags:\n  - \"#alpha\"\n  - beta\n---\n#alpha #gamma").unwrap();
        assert_eq!(doc.tags, vec!["alpha", "beta", "gamma"]);
    }

    #[test]
    fn test_wikilinks_dedup_first_seen() {
        let links = extract_wikilinks("see [[B]] and [[A|alias]] then [[B]]");
        assert_eq!(links, vec!["B", "A|alias"]);
    }

    #[test]
    fn test_hashtags_ignore_anchors_and_heading_markers() {
        let tags = extract_hashtags("## Heading #inline\nhttp://x.com/p#frag [[Note#Part]] #a/b-c_1");
        assert_eq!(tags, vec!["inline", "a/b-c_1"]);
    }

    #[test]
    fn test_section_links_and_tags_are_local() {
        let doc = parse("# A\n[[X]] #one\n# B\n[[Y]] #two\n").unwrap();
        assert_eq!(doc.sections[0].wikilinks, vec!["X"]);
        assert_eq!(doc.sections[0].tags, vec!["one"]);
        assert_eq!(doc.sections[1].wikilinks, vec!["Y"]);
        assert_eq!(doc.wikilinks, vec!["X", "Y"]);
        assert_eq!(doc.tags, vec!["one", "two"]);
    }

    #[test]
    fn test_title_fallbacks() {
        assert_eq!(parse("## Sub\n# Main\n").unwrap().title("stem"), "Main");
        assert_eq!(parse("no headings").unwrap().title("stem"), "stem");
    }

    #[test]
    fn test_counts() {
        let doc = parse("# T\none two three\n").unwrap();
        assert_eq!(doc.word_count, 5);
        assert_eq!(doc.line_count, 2);
    }

    #[test]
    fn test_frontmatter_nested_and_scalars() {
        let fm = SimpleFrontmatter
            .parse("# comment\nmeta:\n  rating: 4\n  done: true\n  score: 1.5\naliases: []\nempty:\nurl: https://x.com/a\nname: 'it''s'\n")
            .unwrap();
        assert_eq!(fm["meta"], json!({"rating": 4, "done": true, "score": 1.5}));
        assert_eq!(fm["aliases"], json!([]));
        assert_eq!(fm["empty"], Value::Null);
        assert_eq!(fm["url"], json!("https://x.com/a"));
        assert_eq!(fm["name"], json!("it's"));
    }

    #[test]
    fn test_frontmatter_block_list_same_indent() {
        let fm = SimpleFrontmatter.parse("tags:\n- a\n- b\nnext: 1\n").unwrap();
        assert_eq!(fm["tags"], json!(["a", "b"]));
        assert_eq!(fm["next"], json!(1));
    }

    #[test]
    fn test_frontmatter_inline_list_quoted_commas() {
        let fm = SimpleFrontmatter
            .parse("aliases: [\"Smith, John\", JS]\nmixed: ['a, b', 2, [x, y],]\n")
            .unwrap();
        assert_eq!(fm["aliases"], json!(["Smith, John", "JS"]));
        assert_eq!(fm["mixed"], json!(["a, b", 2, ["x", "y"]]));
        assert!(SimpleFrontmatter.parse("a: [\"open, b]").is_err());
    }

    #[test]
    fn test_frontmatter_block_scalars() {
        let block = "summary: >\n  First line\n  continues here.\n\n  New paragraph.\n\
                     code: |\n  fn main() {\n      run();\n  }\n\
                     stripped: |-\n  no newline\n\
                     next: 1\n";
        let fm = SimpleFrontmatter.parse(block).unwrap();
        assert_eq!(
            fm["summary"],
            json!("First line continues here.\nNew paragraph.\n")
        );
        assert_eq!(fm["code"], json!("fn main() {\n    run();\n}\n"));
        assert_eq!(fm["stripped"], json!("no newline"));
        assert_eq!(fm["next"], json!(1));
    }

    #[test]
    fn test_frontmatter_block_scalar_nested_and_empty() {
        let fm = SimpleFrontmatter
            .parse("meta:\n  note: |\n    # not a comment\n    line two\n  after: x\nempty: >\ntail: 2\n")
            .unwrap();
        assert_eq!(
            fm["meta"],
            json!({"note": "# not a comment\nline two\n", "after": "x"})
        );
        assert_eq!(fm["empty"], json!(""));
        assert_eq!(fm["tail"], json!(2));
    }

    #[test]
    fn test_frontmatter_errors() {
        let err = SimpleFrontmatter.parse("title: ok\njust text\n").unwrap_err();
        assert_eq!(
            err,
            StructureError::Frontmatter {
                line: 3,
                message: "expected `key: value`".to_string()
            }
        );
        assert!(SimpleFrontmatter.parse("a: [1, 2").is_err());
        assert!(SimpleFrontmatter.parse("a: \"open").is_err());
        assert!(SimpleFrontmatter.parse("a: |x\n  text").is_err());
        assert!(parse("---\n: bad\n---\nbody").is_err());
    }

    #[test]
    fn test_custom_frontmatter_parser() {
        struct Opaque;
        impl FrontmatterParser for Opaque {
            fn parse(&self, block: &str) -> Result<Frontmatter, StructureError> {
                let mut m = Map::new();
                m.insert("raw".into(), Value::String(block.to_string()));
                Ok(m)
            }
        }
        let doc = StructureParser::new(Opaque)
            .parse("---\n{weird: yaml}\n---\nbody")
            .unwrap();
        assert_eq!(doc.frontmatter["raw"], json!("{weird: yaml}\n"));
    }

    #[test]
    fn test_link_index_backlinks() {
        let mut index = LinkIndex::new();
        index.add_document("daily/monday", &["Project X#Goals".to_string()]);
        index.add_document("notes/ideas", &["projects/project x|the project".to_string()]);
        index.add_document("projects/Project X", &["Project X".to_string()]);
        assert_eq!(
            index.backlinks("Project X", "projects/Project X"),
            vec!["daily/monday", "notes/ideas"]
        );
        assert!(index.backlinks("missing", "x").is_empty());
    }
}
