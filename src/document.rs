use crate::error::RagError;
use anyhow::{Context, Result};
use log::{debug, info, warn};
use mime_guess::from_path;
use pdf_extract::extract_text;
use std::fs;
use std::path::Path;

/// Text extracted from an uploaded file
#[derive(Debug, Clone)]
pub struct Document {
    /// Normalized text content
    pub content: String,
    /// File name the text came from, stored as passage metadata
    pub source_name: String,
    /// The document's MIME type
    pub mime_type: String,
}

impl Document {
    /// Load a document from a file path.
    ///
    /// Fails with [`RagError::EmptyDocument`] when no text survives extraction, so
    /// callers never write a partial collection for an unreadable file.
    pub fn from_file<P: AsRef<Path>>(file_path: P) -> Result<Self> {
        let path = file_path.as_ref();
        let source_name = path
            .file_name()
            .context("Invalid file name")?
            .to_str()
            .context("Invalid file name encoding")?
            .to_string();

        let mime = from_path(path).first_or_octet_stream();
        let mime_type = mime.to_string();
        debug!("Detected MIME type: {}", mime_type);

        let content = read_document_content(path, &mime_type)?;
        if content.trim().is_empty() {
            warn!("Extracted content of {} is empty", source_name);
            return Err(RagError::EmptyDocument(source_name).into());
        }

        Ok(Document {
            content,
            source_name,
            mime_type,
        })
    }
}

/// Read content from a document based on its MIME type
pub fn read_document_content<P: AsRef<Path>>(file_path: P, mime_type: &str) -> Result<String> {
    let path = file_path.as_ref();

    match mime_type {
        mime if mime.starts_with("application/pdf") => {
            info!("Extracting text from PDF: {}", path.display());
            let content = extract_text(path)
                .with_context(|| format!("Failed to extract text from PDF: {}", path.display()))?;
            Ok(normalize_whitespace(&content))
        }

        mime if mime.starts_with("text/") => {
            info!("Reading text document: {}", path.display());
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read text file: {}", path.display()))?;
            Ok(normalize_whitespace(&content))
        }

        _ => Err(RagError::UnsupportedDocument(mime_type.to_string()).into()),
    }
}

/// Drop carriage returns, collapse space runs, and cap newline runs at one blank line.
pub fn normalize_whitespace(text: &str) -> String {
    let result = text.replace('\r', "");

    let mut prev_char = ' ';
    let mut newline_count = 0;
    let mut normalized = String::with_capacity(result.len());

    for c in result.chars() {
        if c == '\n' {
            newline_count += 1;
            continue;
        }

        if newline_count > 0 {
            push_newlines(&mut normalized, newline_count);
            newline_count = 0;
            prev_char = '\n';
        }

        if !(c == ' ' && prev_char == ' ') {
            normalized.push(c);
        }
        prev_char = c;
    }

    if newline_count > 0 {
        push_newlines(&mut normalized, newline_count);
    }

    normalized.trim().to_string()
}

fn push_newlines(out: &mut String, count: usize) {
    if count >= 2 {
        out.push_str("\n\n");
    } else {
        out.push('\n');
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_normalize_whitespace() {
        let text = "This  has   multiple    spaces.\n\n\nAnd multiple newlines.\r\nAnd Windows line endings.";
        let expected =
            "This has multiple spaces.\n\nAnd multiple newlines.\nAnd Windows line endings.";
        assert_eq!(normalize_whitespace(text), expected);
    }

    #[test]
    fn test_text_file_loads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        let mut file = fs::File::create(&path).unwrap();
        writeln!(file, "First paragraph.\n\n\n\nSecond   paragraph.").unwrap();

        let document = Document::from_file(&path).unwrap();
        assert_eq!(document.source_name, "notes.txt");
        assert!(document.mime_type.starts_with("text/"));
        assert_eq!(document.content, "First paragraph.\n\nSecond paragraph.");
    }

    #[test]
    fn test_empty_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blank.txt");
        fs::write(&path, "  \n\n \n").unwrap();

        let err = Document::from_file(&path).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RagError>(),
            Some(RagError::EmptyDocument(name)) if name == "blank.txt"
        ));
    }

    #[test]
    fn test_unsupported_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("image.png");
        fs::write(&path, [0u8, 1, 2]).unwrap();

        let err = Document::from_file(&path).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RagError>(),
            Some(RagError::UnsupportedDocument(_))
        ));
    }
}
