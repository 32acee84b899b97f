//! PDF loading: uploaded bytes to tagged per-page text

use std::fmt;
use std::fs;
use std::io::Write;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Component, Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{Error, Result};

/// A file handed to the loader: original name plus raw bytes.
#[derive(Clone, Debug)]
pub struct UploadedFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }
}

/// Text of one PDF page.
#[derive(Clone, Debug, PartialEq)]
pub struct Page {
    pub text: String,
    pub source: String,
    /// 1-based
    pub number: u32,
}

/// The text pages of one upload, kept apart from every other upload.
#[derive(Clone, Debug, PartialEq)]
pub struct LoadedDocument {
    pub name: String,
    pub pages: Vec<Page>,
}

/// Documents extracted from an upload set, plus one warning per skipped file.
#[derive(Debug, Default)]
pub struct LoadReport {
    pub documents: Vec<LoadedDocument>,
    pub warnings: Vec<String>,
}

impl LoadReport {
    pub fn files_loaded(&self) -> usize {
        self.documents.len()
    }

    pub fn page_count(&self) -> usize {
        self.documents.iter().map(|d| d.pages.len()).sum()
    }
}

/// Extracts pages from every file, skipping files that fail.
///
/// Fails with [`Error::NoValidDocuments`] only when no file produced any text.
pub fn load_pdfs(files: &[UploadedFile]) -> Result<LoadReport> {
    let mut report = LoadReport::default();

    for file in files {
        match load_pdf(file) {
            Ok(pages) if pages.is_empty() => {
                let warning = format!("Skipped '{}': no extractable text", file.name);
                tracing::warn!(file = %file.name, "no extractable text");
                report.warnings.push(warning);
            }
            Ok(pages) => {
                tracing::info!(file = %file.name, pages = pages.len(), "loaded PDF");
                report.documents.push(LoadedDocument {
                    name: file.name.clone(),
                    pages,
                });
            }
            Err(err) => {
                tracing::warn!(file = %file.name, error = %err, "skipping unreadable PDF");
                let reason = match err {
                    Error::FileParse { message, .. } => message,
                    other => other.to_string(),
                };
                report
                    .warnings
                    .push(format!("Skipped '{}': {}", file.name, reason));
            }
        }
    }

    if report.documents.is_empty() {
        return Err(Error::NoValidDocuments {
            warnings: report.warnings,
        });
    }
    Ok(report)
}

/// Extracts the non-blank pages of a single upload.
///
/// A page whose text cannot be extracted is skipped; a parser panic is reported
/// as [`Error::FileParse`] for the whole file.
pub fn load_pdf(file: &UploadedFile) -> Result<Vec<Page>> {
    // Removed when `tmp` drops, including on the error paths below.
    let mut tmp = tempfile::Builder::new()
        .prefix("pdfqa-")
        .suffix(".pdf")
        .tempfile()?;
    tmp.write_all(&file.bytes)?;
    tmp.flush()?;

    let path = tmp.path();
    let doc = guard_parser(&file.name, || lopdf::Document::load(path))?
        .map_err(|e| Error::file_parse(&file.name, e.to_string()))?;

    let numbers: Vec<u32> = doc.get_pages().keys().copied().collect();
    collect_pages(&file.name, numbers, |number| {
        guard_parser(&file.name, || doc.extract_text(&[number]))
    })
}

/// Keeps the non-blank pages. A page whose text cannot be extracted is skipped;
/// an outer error aborts the file.
fn collect_pages<E: fmt::Display>(
    filename: &str,
    numbers: impl IntoIterator<Item = u32>,
    mut extract: impl FnMut(u32) -> Result<std::result::Result<String, E>>,
) -> Result<Vec<Page>> {
    let mut pages = Vec::new();
    for number in numbers {
        let text = match extract(number)? {
            Ok(text) => text,
            Err(err) => {
                tracing::warn!(
                    file = filename,
                    page = number,
                    error = %err,
                    "skipping unreadable page"
                );
                continue;
            }
        };
        if text.trim().is_empty() {
            continue;
        }
        pages.push(Page {
            text,
            source: filename.to_string(),
            number,
        });
    }
    Ok(pages)
}

/// Runs a lopdf call, turning a panic inside the parser into a file error.
fn guard_parser<T>(filename: &str, parse: impl FnOnce() -> T) -> Result<T> {
    panic::catch_unwind(AssertUnwindSafe(parse)).map_err(|payload| {
        let detail = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_default();
        tracing::warn!(file = filename, detail = %detail, "PDF parser panicked");
        Error::file_parse(filename, "parser panicked on malformed PDF")
    })
}

/// Reads PDFs from disk. Directories are walked recursively for `.pdf` files.
///
/// Files found under a directory are named by their path relative to it, so
/// `2023/summary.pdf` and `2024/summary.pdf` stay distinct. Returns the uploads
/// found and a warning for each path that could not be read.
pub fn collect_uploads<P: AsRef<Path>>(paths: &[P]) -> (Vec<UploadedFile>, Vec<String>) {
    let mut files = Vec::new();
    let mut warnings = Vec::new();

    for path in paths {
        let path = path.as_ref();
        if path.is_dir() {
            let mut found: Vec<PathBuf> = WalkDir::new(path)
                .into_iter()
                .filter_map(|entry| entry.ok())
                .filter(|entry| entry.file_type().is_file() && is_pdf(entry.path()))
                .map(|entry| entry.into_path())
                .collect();
            found.sort();
            if found.is_empty() {
                warnings.push(format!("No PDF files under '{}'", path.display()));
            }
            for file in found {
                let name = relative_name(path, &file);
                read_upload(&file, name, &mut files, &mut warnings);
            }
        } else {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| path.display().to_string());
            read_upload(path, name, &mut files, &mut warnings);
        }
    }

    (files, warnings)
}

fn relative_name(root: &Path, file: &Path) -> String {
    let rel = file.strip_prefix(root).unwrap_or(file);
    rel.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().to_string()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

fn read_upload(
    path: &Path,
    name: String,
    files: &mut Vec<UploadedFile>,
    warnings: &mut Vec<String>,
) {
    match fs::read(path) {
        Ok(bytes) => files.push(UploadedFile::new(name, bytes)),
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "cannot read upload");
            warnings.push(format!("Cannot read '{}': {}", path.display(), err));
        }
    }
}

fn is_pdf(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parser_panic_becomes_a_file_error() {
        let err = guard_parser("odd.pdf", || -> u32 { panic!("index out of bounds") })
            .unwrap_err();
        assert!(matches!(err, Error::FileParse { ref filename, .. } if filename == "odd.pdf"));

        assert_eq!(guard_parser("ok.pdf", || 7).unwrap(), 7);
    }

    #[test]
    fn unreadable_page_is_skipped_and_the_rest_kept() {
        let pages = collect_pages("mixed.pdf", 1..=3, |number| {
            Ok(match number {
                2 => Err("invalid content stream"),
                3 => Ok("   ".to_string()),
                _ => Ok(format!("text of page {}", number)),
            })
        })
        .unwrap();

        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].number, 1);
        assert_eq!(pages[0].source, "mixed.pdf");
    }

    #[test]
    fn parser_panic_on_a_page_fails_the_file() {
        let result = collect_pages("odd.pdf", 1..=2, |number| {
            guard_parser("odd.pdf", || -> std::result::Result<String, String> {
                if number == 2 {
                    panic!("unexpected object");
                }
                Ok("fine".to_string())
            })
        });

        assert!(matches!(result, Err(Error::FileParse { .. })));
    }

    #[test]
    fn relative_names_use_forward_slashes() {
        let root = Path::new("/data/reports");
        let file = root.join("2023").join("summary.pdf");
        assert_eq!(relative_name(root, &file), "2023/summary.pdf");
    }
}
