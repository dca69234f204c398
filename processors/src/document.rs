//! Document pipeline (§4.3): PDF via [`localdoc_pdf`], Office formats
//! via plain zip+XML text pulls, Markdown/plain text via a direct
//! UTF-8 read.

use std::future::Future;
use std::io::Read;
use std::path::Path;
use std::pin::Pin;

use quick_xml::Reader;
use quick_xml::events::Event;
use zip::ZipArchive;

use localdoc_core::VlmModel;
use localdoc_index::chunking::TextSegment;
use localdoc_pdf::{PdfPipeline, PdfPipelineConfig};

use crate::error::{ProcessorError, Result};
use crate::registry::{MediaPipeline, ProcessedMedia};

/// XML parts, in reading order, that carry a document's text for each
/// Office Open XML container format.
fn office_parts(extension: &str) -> Option<&'static [&'static str]> {
    match extension {
        "docx" => Some(&["word/document.xml"]),
        "pptx" => Some(&[]), // resolved dynamically: one part per slide, see below
        "xlsx" => Some(&["xl/sharedStrings.xml"]),
        _ => None,
    }
}

/// Pulls every text run out of one Office Open XML part: any element
/// whose local name is `t` (covers `w:t`, `a:t`, and the bare `<t>`
/// shared-string runs xlsx uses), concatenated with a trailing space.
fn extract_xml_text(xml: &[u8]) -> Result<String> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text = false;
    let mut buf = Vec::new();
    let mut out = String::new();
    let mut in_text_run = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                in_text_run = local_name_is_t(e.name().as_ref());
            }
            Ok(Event::Empty(_)) => {
                in_text_run = false;
            }
            Ok(Event::Text(e)) if in_text_run => {
                let text = e.unescape().map_err(|err| ProcessorError::MalformedOffice(err.to_string()))?;
                out.push_str(&text);
            }
            Ok(Event::End(e)) => {
                if local_name_is_t(e.name().as_ref()) {
                    in_text_run = false;
                    out.push(' ');
                }
            }
            Ok(Event::Eof) => break,
            Err(err) => return Err(ProcessorError::MalformedOffice(err.to_string())),
            _ => {}
        }
        buf.clear();
    }

    Ok(out)
}

fn local_name_is_t(qname: &[u8]) -> bool {
    match qname.iter().rposition(|&b| b == b':') {
        Some(idx) => &qname[idx + 1..] == b"t",
        None => qname == b"t",
    }
}

/// Reads and concatenates text from every zip entry matching `parts`,
/// or (when `parts` is empty, the `pptx` case) from every
/// `ppt/slides/slideN.xml` entry in slide order.
fn extract_office_document(path: &Path, extension: &str) -> Result<String> {
    let file = std::fs::File::open(path)?;
    let mut archive =
        ZipArchive::new(file).map_err(|e| ProcessorError::MalformedOffice(e.to_string()))?;

    let parts = office_parts(extension)
        .ok_or_else(|| ProcessorError::MalformedOffice(format!("unsupported office extension {extension}")))?;

    let mut slide_names: Vec<String> = Vec::new();
    if extension == "pptx" {
        for i in 0..archive.len() {
            let entry = archive.by_index(i).map_err(|e| ProcessorError::MalformedOffice(e.to_string()))?;
            if entry.name().starts_with("ppt/slides/slide") && entry.name().ends_with(".xml") {
                slide_names.push(entry.name().to_string());
            }
        }
        slide_names.sort_by_key(|name| slide_number(name));
    }

    let names: Vec<String> =
        if extension == "pptx" { slide_names } else { parts.iter().map(|p| (*p).to_string()).collect() };

    let mut full_text = String::new();
    for name in names {
        let mut entry = match archive.by_name(&name) {
            Ok(e) => e,
            Err(_) => continue, // part absent is common (e.g. no shared strings)
        };
        let mut xml = Vec::new();
        entry.read_to_end(&mut xml)?;
        full_text.push_str(&extract_xml_text(&xml)?);
        full_text.push('\n');
    }

    Ok(full_text)
}

/// Extracts the numeric suffix of `ppt/slides/slideN.xml` for sort
/// ordering; non-matching names sort last via `u32::MAX`.
fn slide_number(name: &str) -> u32 {
    name.trim_start_matches("ppt/slides/slide")
        .trim_end_matches(".xml")
        .parse()
        .unwrap_or(u32::MAX)
}

/// Document pipeline: dispatches on file extension to the PDF
/// sub-pipeline, an Office zip+XML extractor, or a direct UTF-8 read.
pub struct DocumentPipeline<V> {
    pdf: PdfPipeline,
    vlm: V,
}

impl<V: VlmModel> DocumentPipeline<V> {
    /// Builds a document pipeline with the given PDF sub-pipeline
    /// configuration and VLM client for the PDF fallback path.
    #[must_use]
    pub fn new(pdf_config: PdfPipelineConfig, vlm: V) -> Self {
        Self { pdf: PdfPipeline::new(pdf_config), vlm }
    }
}

impl<V: VlmModel + Send + Sync> MediaPipeline for DocumentPipeline<V> {
    fn can_process(&self, media_type: localdoc_core::MediaType) -> bool {
        media_type == localdoc_core::MediaType::Document
    }

    fn process<'a>(
        &'a self,
        path: &'a Path,
        _document_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<ProcessedMedia>> + Send + 'a>> {
        Box::pin(async move {
            let extension =
                path.extension().map(|e| e.to_string_lossy().to_lowercase()).unwrap_or_default();

            let mut vlm_pages_processed = 0;
            let segments = match extension.as_str() {
                "pdf" => {
                    let outcome = self.pdf.process(path, &self.vlm).await?;
                    if outcome.all_failed {
                        return Err(ProcessorError::Core(localdoc_core::Error::Extraction(format!(
                            "every page of {} failed extraction",
                            path.display()
                        ))));
                    }
                    vlm_pages_processed = outcome.vlm_pages_processed;
                    outcome.segments
                }
                "docx" | "xlsx" | "pptx" => {
                    let owned_path = path.to_path_buf();
                    let ext = extension.clone();
                    let text = tokio::task::spawn_blocking(move || extract_office_document(&owned_path, &ext))
                        .await
                        .expect("office extraction task did not panic")?;
                    vec![TextSegment::plain(text)]
                }
                "md" | "markdown" | "txt" => {
                    let bytes = tokio::fs::read(path).await?;
                    let text = String::from_utf8(bytes)
                        .map_err(|e| ProcessorError::InvalidUtf8(e.utf8_error().to_string()))?;
                    vec![TextSegment::plain(text)]
                }
                other => {
                    return Err(ProcessorError::Core(localdoc_core::Error::Extraction(format!(
                        "unrecognized document extension {other}"
                    ))));
                }
            };

            Ok(ProcessedMedia { segments, vlm_pages_processed, ..Default::default() })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use localdoc_core::Result as CoreResult;
    use std::io::Write;
    use zip::write::{SimpleFileOptions, ZipWriter};

    #[derive(Debug, Default)]
    struct FixedVlm;

    impl VlmModel for FixedVlm {
        async fn describe(&self, _image: &[u8], _prompt: &str) -> CoreResult<String> {
            Ok(String::new())
        }
    }

    #[test]
    fn extracts_text_runs_from_word_namespaced_xml() {
        let xml = br#"<w:document><w:body><w:p><w:r><w:t>Hello world</w:t></w:r></w:p></w:body></w:document>"#;
        let text = extract_xml_text(xml).unwrap();
        assert!(text.contains("Hello world"));
    }

    #[test]
    fn slide_sort_orders_numerically() {
        assert!(slide_number("ppt/slides/slide2.xml") < slide_number("ppt/slides/slide10.xml"));
    }

    #[tokio::test]
    async fn plain_text_file_reads_through_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("note.txt");
        std::fs::write(&path, "some plain text").unwrap();

        let pipeline = DocumentPipeline::new(PdfPipelineConfig::default(), FixedVlm);
        let out = pipeline.process(&path, "d1").await.unwrap();
        assert_eq!(out.segments.len(), 1);
        assert_eq!(out.segments[0].text, "some plain text");
    }

    #[tokio::test]
    async fn docx_zip_extracts_body_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.docx");
        let file = std::fs::File::create(&path).unwrap();
        let mut zip = ZipWriter::new(file);
        zip.start_file("word/document.xml", SimpleFileOptions::default()).unwrap();
        zip.write_all(br#"<w:document><w:body><w:p><w:r><w:t>Quarterly report</w:t></w:r></w:p></w:body></w:document>"#)
            .unwrap();
        zip.finish().unwrap();

        let pipeline = DocumentPipeline::new(PdfPipelineConfig::default(), FixedVlm);
        let out = pipeline.process(&path, "d1").await.unwrap();
        assert!(out.segments[0].text.contains("Quarterly report"));
    }
}
