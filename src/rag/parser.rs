//! Text extraction for the supported upload formats.

use std::io::{Cursor, Read};
use std::path::Path;
use std::sync::OnceLock;

use async_trait::async_trait;
use regex::{Captures, Regex};
use zip::ZipArchive;

use super::legacy_doc;
use crate::core::errors::RagError;

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const OLE_MAGIC: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];
const UTF8_BOM: char = '\u{FEFF}';
const DOCX_TAG_PATTERN: &str = r"<(/?)([A-Za-z][\w:.-]*)?[^>]*?(/?)>";
const XML_ENTITY_PATTERN: &str = r"&(#[xX][0-9A-Fa-f]+|#[0-9]+|lt|gt|quot|apos|amp);";

static DOCX_TAG: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();
static XML_ENTITY: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();

/// Upload formats accepted by ingestion, resolved once from the filename.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Pdf,
    Word,
    PlainText,
}

impl DocumentFormat {
    pub fn from_filename(filename: &str) -> Result<Self, RagError> {
        let extension = Path::new(filename)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        match extension.as_str() {
            "pdf" => Ok(Self::Pdf),
            "doc" | "docx" => Ok(Self::Word),
            "txt" => Ok(Self::PlainText),
            "" => Err(RagError::UnsupportedFileType(filename.to_string())),
            other => Err(RagError::UnsupportedFileType(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Word => "word",
            Self::PlainText => "text",
        }
    }

    pub fn parser(&self) -> &'static dyn DocumentParser {
        match self {
            Self::Pdf => &PdfParser,
            Self::Word => &WordParser,
            Self::PlainText => &PlainTextParser,
        }
    }

    /// Parses `bytes` and normalises line endings.
    pub async fn parse(&self, bytes: &[u8]) -> Result<String, RagError> {
        let raw = self.parser().parse(bytes).await?;
        Ok(normalize_text(&raw))
    }
}

/// Converts raw file bytes into plain text.
#[async_trait]
pub trait DocumentParser: Send + Sync {
    async fn parse(&self, bytes: &[u8]) -> Result<String, RagError>;
}

pub struct PdfParser;

#[async_trait]
impl DocumentParser for PdfParser {
    async fn parse(&self, bytes: &[u8]) -> Result<String, RagError> {
        let pdf_bytes = bytes.to_vec();
        tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&pdf_bytes))
            .await
            .map_err(|e| RagError::ParseFailure(format!("PDF extraction aborted: {}", e)))?
            .map_err(|e| RagError::ParseFailure(format!("PDF extraction error: {}", e)))
    }
}

/// Handles both `.docx` (OOXML) and legacy `.doc` (OLE) files, told apart by
/// their leading bytes rather than the extension.
pub struct WordParser;

#[async_trait]
impl DocumentParser for WordParser {
    async fn parse(&self, bytes: &[u8]) -> Result<String, RagError> {
        if bytes.starts_with(ZIP_MAGIC) {
            let xml = read_docx_body(bytes)?;
            docx_xml_to_text(&xml)
        } else if bytes.starts_with(OLE_MAGIC) {
            legacy_doc::extract_text(bytes)
        } else {
            Err(RagError::ParseFailure(
                "not a Word document (unrecognised file signature)".to_string(),
            ))
        }
    }
}

pub struct PlainTextParser;

#[async_trait]
impl DocumentParser for PlainTextParser {
    async fn parse(&self, bytes: &[u8]) -> Result<String, RagError> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| RagError::ParseFailure(format!("text file is not valid UTF-8: {}", e)))?;
        Ok(text.strip_prefix(UTF8_BOM).unwrap_or(text).to_string())
    }
}

fn read_docx_body(bytes: &[u8]) -> Result<String, RagError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| RagError::ParseFailure(format!("invalid docx archive: {}", e)))?;
    let mut entry = archive
        .by_name("word/document.xml")
        .map_err(|e| RagError::ParseFailure(format!("docx has no document body: {}", e)))?;

    let mut xml = String::new();
    entry
        .read_to_string(&mut xml)
        .map_err(|e| RagError::ParseFailure(format!("failed to read docx body: {}", e)))?;
    Ok(xml)
}

fn cached_regex(
    cell: &'static OnceLock<Result<Regex, regex::Error>>,
    pattern: &str,
) -> Result<&'static Regex, RagError> {
    cell.get_or_init(|| Regex::new(pattern))
        .as_ref()
        .map_err(|e| RagError::ParseFailure(e.to_string()))
}

/// Flattens WordprocessingML into text, one line per paragraph.
fn docx_xml_to_text(xml: &str) -> Result<String, RagError> {
    let tag = cached_regex(&DOCX_TAG, DOCX_TAG_PATTERN)?;

    let flattened = tag.replace_all(xml, |caps: &Captures| {
        let closing = !caps[1].is_empty();
        let self_closing = !caps[3].is_empty();
        match caps.get(2).map(|name| name.as_str()) {
            Some("w:p") if closing || self_closing => "\n",
            Some("w:tab") => "\t",
            Some("w:br") | Some("w:cr") => "\n",
            _ => "",
        }
    });

    decode_xml_entities(flattened.trim_start())
}

/// Single pass, so `&amp;lt;` stays `&lt;`.
fn decode_xml_entities(text: &str) -> Result<String, RagError> {
    let entity = cached_regex(&XML_ENTITY, XML_ENTITY_PATTERN)?;

    let decoded = entity.replace_all(text, |caps: &Captures| {
        let body = &caps[1];
        let resolved = match body {
            "lt" => Some('<'),
            "gt" => Some('>'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            "amp" => Some('&'),
            _ => {
                let code = match body.strip_prefix("#x").or_else(|| body.strip_prefix("#X")) {
                    Some(hex) => u32::from_str_radix(hex, 16).ok(),
                    None => body[1..].parse::<u32>().ok(),
                };
                code.and_then(char::from_u32)
            }
        };
        match resolved {
            Some(c) => c.to_string(),
            None => caps[0].to_string(),
        }
    });
    Ok(decoded.into_owned())
}

fn normalize_text(raw: &str) -> String {
    raw.replace("\r\n", "\n")
        .replace('\r', "\n")
        .trim_end()
        .to_string()
}
