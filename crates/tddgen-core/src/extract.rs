//! Field extraction from paged source documents
//!
//! Incoming documents carry one field per page. The adapter only needs to
//! know how many pages a document has and the text of a given page, so PDFs
//! and in-memory page lists go through the same code.

use crate::error::ExtractError;
use crate::values::FieldValues;
use lopdf::Encoding;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use std::path::Path;

/// Documents with fewer pages than this are rejected.
pub const MIN_PAGES: usize = 6;

/// Minimal capability needed from a source document.
pub trait PagedDocument {
    fn page_count(&self) -> usize;

    /// Text of the zero-based page `index`.
    fn page_text(&self, index: usize) -> Result<String, ExtractError>;
}

/// How a page's text becomes a field value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageRule {
    /// Whole page, trimmed
    Trimmed,
    /// Non-blank lines trimmed and joined with single spaces
    JoinedLines,
    /// Trimmed, with a trailing alias annotation removed
    AliasStripped,
}

/// Which page feeds which field.
#[derive(Debug, Clone, Copy)]
pub struct PageField {
    pub field: &'static str,
    pub page: usize,
    pub rule: PageRule,
    /// Optional fields default to an empty string when the page is absent.
    pub required: bool,
}

const fn page(field: &'static str, page: usize, rule: PageRule, required: bool) -> PageField {
    PageField {
        field,
        page,
        rule,
        required,
    }
}

/// Page layout of the intake documents.
pub const TDD_PAGE_MAP: [PageField; 8] = [
    page("facility", 0, PageRule::Trimmed, true),
    page("case", 1, PageRule::JoinedLines, true),
    page("wo", 2, PageRule::Trimmed, true),
    page("file", 3, PageRule::Trimmed, true),
    page("claim", 4, PageRule::Trimmed, true),
    page("attn", 5, PageRule::Trimmed, true),
    page("re", 6, PageRule::AliasStripped, false),
    page("dob", 7, PageRule::Trimmed, false),
];

static ALIAS_MARKER: Lazy<Regex> = Lazy::new(|| {
    // "AKA" as a whole word after whitespace
    Regex::new(r"(?i)\s+aka\b").expect("alias marker regex is valid")
});

/// Extract all fields using [`TDD_PAGE_MAP`].
pub fn extract_fields<D: PagedDocument + ?Sized>(doc: &D) -> Result<FieldValues, ExtractError> {
    extract_with_map(doc, &TDD_PAGE_MAP)
}

/// Either every field is produced or an error is returned; partial value
/// sets never leave this function.
fn extract_with_map<D: PagedDocument + ?Sized>(
    doc: &D,
    map: &[PageField],
) -> Result<FieldValues, ExtractError> {
    let pages = doc.page_count();
    if pages < MIN_PAGES {
        return Err(ExtractError::TooShort {
            pages,
            required: MIN_PAGES,
        });
    }

    let mut values = FieldValues::new();
    for entry in map {
        let value = if entry.page < pages {
            apply_rule(entry.rule, &doc.page_text(entry.page)?)
        } else if entry.required {
            return Err(ExtractError::MissingPage(entry.page));
        } else {
            String::new()
        };
        values.insert(entry.field, value);
    }

    log_parsed(&values);
    Ok(values)
}

fn apply_rule(rule: PageRule, text: &str) -> String {
    match rule {
        PageRule::Trimmed => text.trim().to_string(),
        PageRule::JoinedLines => collapse_lines(text),
        PageRule::AliasStripped => strip_alias(text),
    }
}

/// Join the non-blank lines of `text`, each trimmed, with single spaces.
pub fn collapse_lines(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Drop an alias annotation: `"John Smith AKA Jon Smyth"` becomes `"John Smith"`.
pub fn strip_alias(text: &str) -> String {
    let text = text.trim();
    match ALIAS_MARKER.find(text) {
        Some(marker) => text[..marker.start()].trim().to_string(),
        None => text.to_string(),
    }
}

fn log_parsed(values: &FieldValues) {
    tracing::info!("Parsed data:");
    for (name, value) in values.iter().filter(|(_, v)| !v.is_empty()) {
        tracing::info!("  {}: {}", name, value);
    }
}

impl<S: AsRef<str>> PagedDocument for [S] {
    fn page_count(&self) -> usize {
        self.len()
    }

    fn page_text(&self, index: usize) -> Result<String, ExtractError> {
        self.get(index)
            .map(|page| page.as_ref().to_string())
            .ok_or(ExtractError::MissingPage(index))
    }
}

impl<S: AsRef<str>> PagedDocument for Vec<S> {
    fn page_count(&self) -> usize {
        self.as_slice().page_count()
    }

    fn page_text(&self, index: usize) -> Result<String, ExtractError> {
        self.as_slice().page_text(index)
    }
}

/// A PDF opened with lopdf.
///
/// The file is read fully on open; dropping the value releases it.
pub struct PdfDocument {
    doc: lopdf::Document,
    /// page objects in page order
    pages: Vec<lopdf::ObjectId>,
}

impl PdfDocument {
    pub fn open(path: &Path) -> Result<Self, ExtractError> {
        let doc = lopdf::Document::load(path).map_err(|source| ExtractError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let pages: BTreeMap<u32, lopdf::ObjectId> = doc.get_pages();
        let pages = pages.into_values().collect();
        Ok(Self { doc, pages })
    }
}

impl PagedDocument for PdfDocument {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Text shown on the page, one output line per text line.
    ///
    /// A new line starts at the end of a text object and whenever the
    /// text position moves vertically (`Td`/`TD` with a non-zero y, `T*`,
    /// `'`, `"`, or a `Tm` to another baseline). Horizontal moves stay on
    /// the same line.
    fn page_text(&self, index: usize) -> Result<String, ExtractError> {
        let page_id = *self
            .pages
            .get(index)
            .ok_or(ExtractError::MissingPage(index))?;
        let page_err = |source: lopdf::Error| ExtractError::PageText {
            page: index,
            source,
        };

        let encodings: BTreeMap<Vec<u8>, Encoding> = self
            .doc
            .get_page_fonts(page_id)
            .map_err(page_err)?
            .into_iter()
            .filter_map(|(name, font)| match font.get_font_encoding(&self.doc) {
                Ok(encoding) => Some((name, encoding)),
                Err(e) => {
                    tracing::debug!("Page {}: skipping font without encoding: {}", index, e);
                    None
                }
            })
            .collect();
        let content = self
            .doc
            .get_and_decode_page_content(page_id)
            .map_err(page_err)?;

        let mut lines = PageLines::default();
        let mut encoding = None;
        let mut baseline: Option<f32> = None;
        for op in &content.operations {
            match op.operator.as_str() {
                "Tf" => {
                    encoding = op
                        .operands
                        .first()
                        .and_then(|name| name.as_name().ok())
                        .and_then(|name| encodings.get(name));
                }
                "Td" | "TD" => {
                    let dy = op.operands.get(1).and_then(|y| y.as_float().ok());
                    if dy.is_some_and(|dy| dy != 0.0) {
                        lines.break_line();
                    }
                }
                "Tm" => {
                    let y = op.operands.get(5).and_then(|y| y.as_float().ok());
                    if baseline.is_some() && y != baseline {
                        lines.break_line();
                    }
                    baseline = y;
                }
                "T*" | "ET" => lines.break_line(),
                "'" | "\"" => {
                    lines.break_line();
                    if let (Some(encoding), Some(shown)) = (encoding, op.operands.last()) {
                        lines.show(encoding, shown).map_err(page_err)?;
                    }
                }
                "Tj" | "TJ" => match encoding {
                    Some(encoding) => {
                        for shown in &op.operands {
                            lines.show(encoding, shown).map_err(page_err)?;
                        }
                    }
                    None => tracing::debug!("Page {}: text shown without a font", index),
                },
                _ => {}
            }
        }
        Ok(lines.text)
    }
}

/// Accumulates decoded page text, collapsing repeated line breaks.
#[derive(Default)]
struct PageLines {
    text: String,
}

impl PageLines {
    fn break_line(&mut self) {
        if !self.text.is_empty() && !self.text.ends_with('\n') {
            self.text.push('\n');
        }
    }

    fn show(&mut self, encoding: &Encoding, operand: &lopdf::Object) -> lopdf::Result<()> {
        match operand {
            lopdf::Object::String(bytes, _) => {
                self.text
                    .push_str(&lopdf::Document::decode_text(encoding, bytes)?);
            }
            lopdf::Object::Array(items) => {
                for item in items {
                    self.show(encoding, item)?;
                }
            }
            // TJ adjustment in thousandths of an em; a wide gap is a word break
            lopdf::Object::Integer(_) | lopdf::Object::Real(_) => {
                if operand.as_float().is_ok_and(|gap| gap < -200.0) && !self.text.ends_with(' ') {
                    self.text.push(' ');
                }
            }
            _ => {}
        }
        Ok(())
    }
}
