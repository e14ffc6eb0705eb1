//! Field schema for the blank `.tdd` template
//!
//! A `.tdd` file is XML with a PNG thumbnail in front and a base64 JPEG logo
//! at the end. Only the insertion points below matter here; every other byte
//! is copied through untouched.
//!
//! Offsets were measured on the shipped `blank.tdd` and are only valid for
//! that exact file. Any edit to the template means re-measuring all of them.

use crate::error::InjectError;
use std::collections::HashSet;

/// File extension of the container format.
pub const TDD_EXTENSION: &str = "tdd";

/// Field whose value names the output file.
pub const IDENTIFYING_FIELD: &str = "re";

/// One insertion point in the blank template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    /// Argument and mapping key (`--facility`, `values["facility"]`)
    pub name: &'static str,
    /// Human label used in prompts and reports
    pub label: &'static str,
    /// Byte offset in the blank template
    pub original_offset: usize,
    /// Bytes appended after the value
    pub suffix: &'static [u8],
}

impl FieldSpec {
    pub const fn new(name: &'static str, label: &'static str, original_offset: usize) -> Self {
        Self {
            name,
            label,
            original_offset,
            suffix: b"",
        }
    }

    pub const fn with_suffix(mut self, suffix: &'static [u8]) -> Self {
        self.suffix = suffix;
        self
    }
}

/// Insertion points of `blank.tdd`, in file order.
///
/// The facility line needs a trailing CRLF for the viewer to break the
/// heading; no other field carries a suffix.
pub const TDD_SCHEMA: [FieldSpec; 8] = [
    FieldSpec::new("facility", "Facility", 0x3405).with_suffix(b"\r\n"),
    FieldSpec::new("case", "Case", 0x369A),
    FieldSpec::new("wo", "WO#", 0x36A0),
    FieldSpec::new("file", "File#", 0x36A9),
    FieldSpec::new("claim", "Claim", 0x36B3),
    FieldSpec::new("attn", "Attn", 0x36BB),
    FieldSpec::new("re", "Re:", 0x9493),
    FieldSpec::new("dob", "DOB:", 0x949A),
];

/// Look up a field by name.
pub fn field<'a>(schema: &'a [FieldSpec], name: &str) -> Option<&'a FieldSpec> {
    schema.iter().find(|spec| spec.name == name)
}

/// Check that a schema can be applied to a template of `template_len` bytes.
///
/// Offsets must be strictly ascending (equal offsets would make the cascade
/// order ambiguous) and may point at most one past the last byte.
pub fn validate_schema(schema: &[FieldSpec], template_len: usize) -> Result<(), InjectError> {
    let mut seen = HashSet::new();
    let mut previous: Option<usize> = None;

    for spec in schema {
        if !seen.insert(spec.name) {
            return Err(InjectError::DuplicateField(spec.name.to_string()));
        }
        if let Some(previous) = previous {
            if spec.original_offset <= previous {
                return Err(InjectError::UnorderedSchema {
                    field: spec.name.to_string(),
                    offset: spec.original_offset,
                    previous,
                });
            }
        }
        if spec.original_offset > template_len {
            return Err(InjectError::OffsetOutOfBounds {
                field: spec.name.to_string(),
                offset: spec.original_offset,
                len: template_len,
            });
        }
        previous = Some(spec.original_offset);
    }

    Ok(())
}
