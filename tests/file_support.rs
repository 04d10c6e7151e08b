//! Multi-format extraction through the real extractor set.
//!
//! Fixtures are built in memory: OOXML packages with `zip`, a hand-written
//! PDF, and SVG/text files. Files go through the vault walker so content
//! types and paths are exactly what an ingest run sees.

use std::fs;
use std::io::Write;

use notegraph::config::{ExtractorsConfig, VaultConfig};
use notegraph::connector_fs::scan_vault;
use notegraph::extract::{Extractor, ExtractorSet};
use notegraph_core::chunk::{ChunkEngine, ChunkingOptions, DocumentMeta};
use notegraph_core::models::{ChunkDetails, ChunkStrategy, ContentType, SourceFile};
use tempfile::TempDir;

fn zip_package(entries: &[(&str, String)]) -> Vec<u8> {
    let mut buf = Vec::new();
    {
        let mut zip = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
        for (name, body) in entries {
            zip.start_file(*name, zip::write::SimpleFileOptions::default())
                .unwrap();
            zip.write_all(body.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
    }
    buf
}

fn docx(paragraphs: &[&str]) -> Vec<u8> {
    let body: String = paragraphs
        .iter()
        .map(|p| format!("<w:p><w:r><w:t>{}</w:t></w:r></w:p>", p))
        .collect();
    zip_package(&[(
        "word/document.xml",
        format!(
            "<?xml version=\"1.0\"?><w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\"><w:body>{}</w:body></w:document>",
            body
        ),
    )])
}

fn pptx(slides: &[&str]) -> Vec<u8> {
    let entries: Vec<(String, String)> = slides
        .iter()
        .enumerate()
        .map(|(i, text)| {
            (
                format!("ppt/slides/slide{}.xml", i + 1),
                format!(
                    "<p:sld xmlns:p=\"p\" xmlns:a=\"a\"><p:cSld><p:spTree><p:sp><p:txBody><a:p><a:r><a:t>{}</a:t></a:r></a:p></p:txBody></p:sp></p:spTree></p:cSld></p:sld>",
                    text
                ),
            )
        })
        .collect();
    let refs: Vec<(&str, String)> = entries
        .iter()
        .map(|(n, b)| (n.as_str(), b.clone()))
        .collect();
    zip_package(&refs)
}

fn xlsx() -> Vec<u8> {
    zip_package(&[
        (
            "xl/sharedStrings.xml",
            "<sst><si><t>Item</t></si><si><t>Widget</t></si></sst>".to_string(),
        ),
        (
            "xl/worksheets/sheet1.xml",
            "<worksheet><sheetData><row><c t=\"s\"><v>0</v></c></row><row><c t=\"s\"><v>1</v></c><c><v>3</v></c></row></sheetData></worksheet>".to_string(),
        ),
    ])
}

/// Minimal PDF with correct xref offsets.
fn minimal_pdf(phrase: &str) -> Vec<u8> {
    let content = format!("BT /F1 12 Tf 100 700 Td ({}) Tj ET", phrase);
    let mut out = Vec::new();
    out.extend_from_slice(b"%PDF-1.4\n");
    let mut offsets = Vec::new();
    let objects = [
        "1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj\n".to_string(),
        "2 0 obj << /Type /Pages /Kids [3 0 R] /Count 1 >> endobj\n".to_string(),
        "3 0 obj << /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R /Resources << /Font << /F1 5 0 R >> >> >> endobj\n".to_string(),
        format!(
            "4 0 obj << /Length {} >> stream\n{}\nendstream endobj\n",
            content.len(),
            content
        ),
        "5 0 obj << /Type /Font /Subtype /Type1 /BaseFont /Helvetica >> endobj\n".to_string(),
    ];
    for obj in &objects {
        offsets.push(out.len());
        out.extend_from_slice(obj.as_bytes());
    }
    let xref_start = out.len();
    out.extend_from_slice(b"xref\n0 6\n");
    out.extend_from_slice(format!("{:010} 65535 f \n", 0).as_bytes());
    for o in &offsets {
        out.extend_from_slice(format!("{:010} 00000 n \n", o).as_bytes());
    }
    out.extend_from_slice(b"trailer << /Size 6 /Root 1 0 R >>\nstartxref\n");
    out.extend_from_slice(format!("{}\n", xref_start).as_bytes());
    out.extend_from_slice(b"%%EOF\n");
    out
}

fn extractors_config() -> ExtractorsConfig {
    ExtractorsConfig {
        ocr_command: "notegraph-test-missing-ocr".to_string(),
        ..Default::default()
    }
}

fn vault_with(files: &[(&str, Vec<u8>)]) -> (TempDir, Vec<SourceFile>) {
    let tmp = TempDir::new().unwrap();
    for (name, bytes) in files {
        let path = tmp.path().join(name);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, bytes).unwrap();
    }
    let vault = VaultConfig {
        root: tmp.path().to_path_buf(),
        include_globs: vec!["**/*".to_string()],
        exclude_globs: vec![],
        follow_symlinks: false,
    };
    let files = scan_vault(&vault).unwrap();
    (tmp, files)
}

fn find<'a>(files: &'a [SourceFile], rel: &str) -> &'a SourceFile {
    files
        .iter()
        .find(|f| f.relative_path == rel)
        .unwrap_or_else(|| panic!("{} not scanned", rel))
}

#[tokio::test]
async fn office_documents_extract_text() {
    let (_tmp, files) = vault_with(&[
        ("docs/report.docx", docx(&["Quarterly report", "Revenue grew"])),
        ("docs/deck.pptx", pptx(&["Roadmap", "Launch plan"])),
        ("docs/inventory.xlsx", xlsx()),
    ]);
    let set = ExtractorSet::init(&extractors_config()).await.unwrap();

    let report = find(&files, "docs/report.docx");
    assert_eq!(report.content_type, ContentType::OfficeDoc);
    let bytes = fs::read(&report.path).unwrap();
    let r = set.extract(&bytes, report).await;
    assert!(r.has_text, "docx error: {:?}", r.error);
    assert_eq!(r.text, "Quarterly report\nRevenue grew");

    let deck = find(&files, "docs/deck.pptx");
    let r = set.extract(&fs::read(&deck.path).unwrap(), deck).await;
    assert_eq!(r.text, "Roadmap\n\nLaunch plan");
    assert_eq!(r.details["slide_count"], serde_json::json!(2));

    let sheet = find(&files, "docs/inventory.xlsx");
    let r = set.extract(&fs::read(&sheet.path).unwrap(), sheet).await;
    assert_eq!(r.text, "Item\nWidget");
    assert_eq!(r.details["sheet_count"], serde_json::json!(1));

    set.shutdown().await.unwrap();
}

#[tokio::test]
async fn legacy_office_format_is_metadata_only() {
    let ole_header = vec![0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1, 0, 0, 0, 0];
    let (_tmp, files) = vault_with(&[("old/memo.doc", ole_header)]);
    let set = ExtractorSet::init(&extractors_config()).await.unwrap();
    let memo = find(&files, "old/memo.doc");
    let r = set.extract(&fs::read(&memo.path).unwrap(), memo).await;
    assert!(!r.has_text);
    assert!(r.error.is_some());

    let engine = ChunkEngine::new(ChunkingOptions::default()).unwrap();
    let meta = DocumentMeta::new(memo, "en", "private");
    let chunks = engine.chunk_extraction(&r, &meta);
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].metadata.strategy, ChunkStrategy::MetadataOnly);
    assert!(chunks[0].text.contains("memo.doc"));
    assert!(chunks[0].text.contains("Folder: old"));
    set.shutdown().await.unwrap();
}

#[tokio::test]
async fn pdf_never_fails_past_extractor() {
    let mut truncated = minimal_pdf("cut short");
    truncated.truncate(120);
    let (_tmp, files) = vault_with(&[
        ("papers/good.pdf", minimal_pdf("hello from pdf")),
        ("papers/broken.pdf", truncated),
        ("papers/fake.pdf", b"just text".to_vec()),
    ]);
    let set = ExtractorSet::init(&extractors_config()).await.unwrap();
    let engine = ChunkEngine::new(ChunkingOptions::default()).unwrap();

    for rel in ["papers/good.pdf", "papers/broken.pdf", "papers/fake.pdf"] {
        let file = find(&files, rel);
        assert_eq!(file.content_type, ContentType::Pdf);
        let r = set.extract(&fs::read(&file.path).unwrap(), file).await;
        let meta = DocumentMeta::new(file, "en", "private");
        let chunks = engine.chunk_extraction(&r, &meta);
        assert!(!chunks.is_empty(), "{} produced no chunks", rel);
        match &chunks[0].metadata.details {
            ChunkDetails::File(d) => assert_eq!(d.file_name, file.file_name()),
            other => panic!("unexpected details {:?}", other),
        }
    }

    let fake = find(&files, "papers/fake.pdf");
    let r = set.extract(b"just text", fake).await;
    assert_eq!(r.error.as_deref(), Some("content does not look like a PDF"));
    set.shutdown().await.unwrap();
}

#[tokio::test]
async fn svg_and_missing_ocr() {
    let svg = br#"<svg xmlns="http://www.w3.org/2000/svg"><title>Topology</title><text>edge router</text></svg>"#;
    let png = vec![0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a, 0, 0, 0, 0];
    let (_tmp, files) = vault_with(&[("img/net.svg", svg.to_vec()), ("img/scan.png", png)]);
    let set = ExtractorSet::init(&extractors_config()).await.unwrap();

    let net = find(&files, "img/net.svg");
    assert_eq!(net.content_type, ContentType::VectorImage);
    let r = set.extract(&fs::read(&net.path).unwrap(), net).await;
    assert_eq!(r.text, "Topology\nedge router");

    let scan = find(&files, "img/scan.png");
    assert_eq!(scan.content_type, ContentType::RasterImage);
    let r = set.extract(&fs::read(&scan.path).unwrap(), scan).await;
    assert!(!r.has_text);
    assert!(r.error.unwrap().contains("unavailable"));

    set.shutdown().await.unwrap();
}
