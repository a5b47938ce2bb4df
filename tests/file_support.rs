//! Document loading from disk: PDF, CSV and TXT through the session.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

use equity_tool::corpus::CorpusError;
use equity_tool::extract::{extract_text, ExtractionError};
use equity_tool::fetch::FetchOptions;
use equity_tool::llm::ModelFailure;
use equity_tool::models::{ContentSource, DocumentKind};
use equity_tool::qa::QaEngine;
use equity_tool::session::Session;
use equity_tool::traits::LanguageModel;

/// Serializes numbered objects (1-based, object 1 is the catalog) with an
/// xref table carrying correct byte offsets so pdf-extract can parse it.
fn assemble_pdf(objects: &[&[u8]]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(b"%PDF-1.4\n");
    let mut offsets = Vec::new();
    for (i, body) in objects.iter().enumerate() {
        offsets.push(out.len());
        out.extend_from_slice(format!("{} 0 obj ", i + 1).as_bytes());
        out.extend_from_slice(body);
        out.extend_from_slice(b" endobj\n");
    }
    let xref_start = out.len();
    out.extend_from_slice(format!("xref\n0 {}\n", objects.len() + 1).as_bytes());
    out.extend_from_slice(format!("{:010} 65535 f \n", 0).as_bytes());
    for offset in offsets {
        out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    out.extend_from_slice(
        format!("trailer << /Size {} /Root 1 0 R >>\nstartxref\n", objects.len() + 1).as_bytes(),
    );
    out.extend_from_slice(format!("{}\n", xref_start).as_bytes());
    out.extend_from_slice(b"%%EOF\n");
    out
}

/// Minimal valid PDF whose single page shows "quarterly revenue grew".
fn minimal_pdf_with_phrase() -> Vec<u8> {
    assemble_pdf(&[
        b"<< /Type /Catalog /Pages 2 0 R >>",
        b"<< /Type /Pages /Kids [3 0 R] /Count 1 >>",
        b"<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R /Resources << /Font << /F1 5 0 R >> >> >>",
        b"<< /Length 55 >> stream\nBT /F1 12 Tf 100 700 Td (quarterly revenue grew) Tj ET\nendstream",
        b"<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>",
    ])
}

/// Parses cleanly but its page selects `/F1` without declaring any resources.
fn pdf_with_undeclared_font() -> Vec<u8> {
    assemble_pdf(&[
        b"<< /Type /Catalog /Pages 2 0 R >>",
        b"<< /Type /Pages /Kids [3 0 R] /Count 1 >>",
        b"<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R >>",
        b"<< /Length 38 >> stream\nBT /F1 12 Tf 100 700 Td (hello) Tj ET\nendstream",
    ])
}

/// A one-page PDF with an empty content stream.
fn blank_pdf() -> Vec<u8> {
    use lopdf::{dictionary, Document, Object, Stream};

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let content_id = doc.add_object(Stream::new(dictionary! {}, Vec::new()));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
        "Resources" => dictionary! {},
        "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}

struct Unreachable;

#[async_trait::async_trait]
impl LanguageModel for Unreachable {
    fn model_name(&self) -> &str {
        "unreachable"
    }

    async fn generate(&self, _prompt: &str) -> Result<String, ModelFailure> {
        Err(ModelFailure::transport("not used in these tests"))
    }
}

fn new_session() -> Session {
    let engine = QaEngine::new(Arc::new(Unreachable), "EquityTool");
    Session::new("alice", engine, FetchOptions::default()).unwrap()
}

fn write(dir: &Path, name: &str, bytes: &[u8]) -> std::path::PathBuf {
    let path = dir.join(name);
    fs::write(&path, bytes).unwrap();
    path
}

#[test]
fn pdf_text_is_extracted() {
    let text = extract_text(DocumentKind::Pdf, &minimal_pdf_with_phrase()).unwrap();
    assert!(text.contains("quarterly revenue grew"), "got: {:?}", text);
}

#[test]
fn blank_pdf_yields_empty_text() {
    assert_eq!(extract_text(DocumentKind::Pdf, &blank_pdf()).unwrap(), "");
}

#[test]
fn blank_pdf_does_not_replace_the_corpus() {
    let tmp = TempDir::new().unwrap();
    let mut session = new_session();
    session.load_direct_text("keep").unwrap();

    let path = write(tmp.path(), "scan.pdf", &blank_pdf());
    let err = session.load_path(&path).unwrap_err();
    assert!(matches!(err, CorpusError::Empty(name) if name == "scan.pdf"));
    assert_eq!(session.corpus().text(), "keep");
}

#[test]
fn loading_each_format_replaces_the_corpus() {
    let tmp = TempDir::new().unwrap();
    let mut session = new_session();

    let pdf = write(tmp.path(), "report.pdf", &minimal_pdf_with_phrase());
    let source = session.load_path(&pdf).unwrap();
    assert_eq!(
        source,
        ContentSource::Document {
            kind: DocumentKind::Pdf,
            name: "report.pdf".to_string()
        }
    );
    assert!(session.corpus().text().contains("quarterly revenue grew"));

    let csv = write(tmp.path(), "prices.csv", b"ticker,close\nACME,101.5\nGLOBEX,7\n");
    session.load_path(&csv).unwrap();
    assert_eq!(
        session.corpus().text(),
        "ticker  close\n  ACME  101.5\nGLOBEX      7"
    );
    assert_eq!(session.corpus().source().unwrap().to_string(), "CSV: prices.csv");

    let txt = write(tmp.path(), "notes.TXT", "Margins fell to 8%.\n".as_bytes());
    session.load_path(&txt).unwrap();
    assert_eq!(session.corpus().text(), "Margins fell to 8%.\n");
    assert_eq!(session.stats().word_count, 4);

    let notices: Vec<&str> = session
        .messages()
        .iter()
        .filter(|m| m.content.starts_with("Content loaded from:"))
        .map(|m| m.content.as_str())
        .collect();
    assert_eq!(
        notices,
        vec![
            "Content loaded from: PDF: report.pdf. You can now ask questions about it.",
            "Content loaded from: CSV: prices.csv. You can now ask questions about it.",
            "Content loaded from: TXT: notes.TXT. You can now ask questions about it.",
        ]
    );
}

#[test]
fn unsupported_extension_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let mut session = new_session();
    let path = write(tmp.path(), "deck.pptx", b"PK");
    let err = session.load_path(&path).unwrap_err();
    assert!(matches!(
        err,
        CorpusError::Extraction(ExtractionError::Unsupported(_))
    ));
    assert!(!session.corpus().is_loaded());
}

#[test]
fn corrupt_pdf_is_an_extraction_error() {
    let tmp = TempDir::new().unwrap();
    let mut session = new_session();
    let path = write(tmp.path(), "broken.pdf", b"%PDF-1.4\nthis is not really a pdf");
    let err = session.load_path(&path).unwrap_err();
    assert!(matches!(err, CorpusError::Extraction(ExtractionError::Pdf(_))));
}

#[test]
fn pdf_with_undeclared_font_is_an_extraction_error() {
    let err = extract_text(DocumentKind::Pdf, &pdf_with_undeclared_font()).unwrap_err();
    assert!(matches!(err, ExtractionError::Pdf(_)), "got: {:?}", err);

    let tmp = TempDir::new().unwrap();
    let mut session = new_session();
    session.load_direct_text("keep").unwrap();
    let path = write(tmp.path(), "bad.pdf", &pdf_with_undeclared_font());
    let err = session.load_path(&path).unwrap_err();
    assert!(matches!(err, CorpusError::Extraction(ExtractionError::Pdf(_))));
    assert_eq!(session.corpus().text(), "keep");
}
