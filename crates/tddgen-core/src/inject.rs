//! Offset-cascading injector
//!
//! Each inserted value pushes every later byte of the template forward, so the
//! real insertion point of field `i` is its original offset plus everything
//! inserted before it:
//!
//! ```text
//! offset[i] = original_offset[i] + sum(len(value[j]) + len(suffix[j]) for j < i)
//! ```
//!
//! This only holds because all original offsets come from the same blank
//! template and fields are applied in ascending offset order.

use crate::error::InjectError;
use crate::schema::{validate_schema, FieldSpec};
use crate::values::FieldValues;
use std::fmt::Write as _;

/// Where one field ended up in the output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    pub name: &'static str,
    pub label: &'static str,
    pub original_offset: usize,
    /// Offset in the output buffer
    pub offset: usize,
    /// Inserted bytes, suffix included
    pub len: usize,
}

/// Result of a successful injection.
#[derive(Debug, Clone)]
pub struct Injection {
    pub bytes: Vec<u8>,
    pub placements: Vec<Placement>,
}

impl Injection {
    /// Total number of bytes added to the template.
    pub fn inserted_len(&self) -> usize {
        self.placements.iter().map(|p| p.len).sum()
    }

    /// One-line report of every insertion point, e.g.
    /// `Facility inserted at 0x3405, Case inserted at 0x36a9, ...`
    pub fn summary(&self) -> String {
        let mut out = String::new();
        for (i, placement) in self.placements.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            let _ = write!(out, "{} inserted at {:#x}", placement.label, placement.offset);
        }
        out
    }
}

/// Splice every field value into `template` and return the new buffer.
///
/// `values` must hold one string per schema field; extra entries are ignored.
/// Values must be ASCII, since the container text region cannot represent
/// anything else. Nothing is overwritten: the output is always
/// `template.len() + inserted_len()` bytes long.
pub fn inject(
    template: &[u8],
    schema: &[FieldSpec],
    values: &FieldValues,
) -> Result<Injection, InjectError> {
    validate_schema(schema, template.len())?;
    let ordered = values.ordered(schema)?;

    for (name, _) in values.iter() {
        if crate::schema::field(schema, name).is_none() {
            tracing::debug!("Ignoring value for unknown field '{}'", name);
        }
    }

    let payloads = ordered
        .into_iter()
        .map(|(spec, value)| encode(spec, value).map(|payload| (spec, payload)))
        .collect::<Result<Vec<_>, _>>()?;

    let inserted: usize = payloads.iter().map(|(_, payload)| payload.len()).sum();
    let mut bytes = Vec::with_capacity(template.len() + inserted);
    let mut placements = Vec::with_capacity(payloads.len());
    let mut cursor = 0;
    let mut shift = 0;

    for (spec, payload) in payloads {
        // Copying up to the original offset and appending the payload is the
        // same as splicing at original_offset + shift in the growing buffer.
        bytes.extend_from_slice(&template[cursor..spec.original_offset]);
        cursor = spec.original_offset;

        let offset = spec.original_offset + shift;
        debug_assert_eq!(offset, bytes.len());
        bytes.extend_from_slice(&payload);

        placements.push(Placement {
            name: spec.name,
            label: spec.label,
            original_offset: spec.original_offset,
            offset,
            len: payload.len(),
        });
        shift += payload.len();
    }
    bytes.extend_from_slice(&template[cursor..]);

    Ok(Injection { bytes, placements })
}

/// ASCII bytes of `value` followed by the field suffix.
fn encode(spec: &FieldSpec, value: &str) -> Result<Vec<u8>, InjectError> {
    if let Some(position) = value.chars().position(|c| !c.is_ascii()) {
        return Err(InjectError::NonAscii {
            field: spec.name.to_string(),
            position,
        });
    }
    let mut payload = Vec::with_capacity(value.len() + spec.suffix.len());
    payload.extend_from_slice(value.as_bytes());
    payload.extend_from_slice(spec.suffix);
    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCHEMA: [FieldSpec; 3] = [
        FieldSpec::new("first", "First", 2).with_suffix(b"\r\n"),
        FieldSpec::new("second", "Second", 5),
        FieldSpec::new("third", "Third", 9),
    ];

    fn template() -> Vec<u8> {
        b"0123456789ABCDEF".to_vec()
    }

    fn values(first: &str, second: &str, third: &str) -> FieldValues {
        [("first", first), ("second", second), ("third", third)]
            .into_iter()
            .collect()
    }

    /// Remove every inserted range, leaving what came from the template.
    fn strip(injection: &Injection) -> Vec<u8> {
        let mut out = Vec::new();
        let mut cursor = 0;
        for p in &injection.placements {
            out.extend_from_slice(&injection.bytes[cursor..p.offset]);
            cursor = p.offset + p.len;
        }
        out.extend_from_slice(&injection.bytes[cursor..]);
        out
    }

    #[test]
    fn test_splices_without_overwriting() {
        let result = inject(&template(), &SCHEMA, &values("ab", "c", "def")).unwrap();
        assert_eq!(result.bytes, b"01ab\r\n234c5678def9ABCDEF".to_vec());
    }

    #[test]
    fn test_offsets_cascade() {
        let result = inject(&template(), &SCHEMA, &values("ab", "c", "def")).unwrap();
        let offsets: Vec<usize> = result.placements.iter().map(|p| p.offset).collect();
        // first: 2; second: 5 + (2 + 2); third: 9 + 4 + 1
        assert_eq!(offsets, vec![2, 9, 14]);
    }

    #[test]
    fn test_cascade_formula_holds_for_varied_lengths() {
        let cases = [
            ("", "", ""),
            ("x", "", "yy"),
            ("a long facility name", "1", ""),
            ("", "case with spaces", "z"),
        ];
        for (a, b, c) in cases {
            let result = inject(&template(), &SCHEMA, &values(a, b, c)).unwrap();
            let mut shift = 0;
            for (spec, placement) in SCHEMA.iter().zip(&result.placements) {
                assert_eq!(placement.offset, spec.original_offset + shift);
                shift += placement.len;
            }
        }
    }

    #[test]
    fn test_length_invariant() {
        let result = inject(&template(), &SCHEMA, &values("abc", "de", "f")).unwrap();
        assert_eq!(result.inserted_len(), 3 + 2 + 2 + 1);
        assert_eq!(result.bytes.len(), template().len() + result.inserted_len());
    }

    #[test]
    fn test_template_bytes_survive_in_order() {
        for (a, b, c) in [("ab", "c", "def"), ("", "", ""), ("9", "99", "999")] {
            let result = inject(&template(), &SCHEMA, &values(a, b, c)).unwrap();
            assert_eq!(strip(&result), template());
        }
    }

    #[test]
    fn test_deterministic() {
        let v = values("same", "input", "twice");
        let a = inject(&template(), &SCHEMA, &v).unwrap();
        let b = inject(&template(), &SCHEMA, &v).unwrap();
        assert_eq!(a.bytes, b.bytes);
        assert_eq!(a.placements, b.placements);
    }

    #[test]
    fn test_empty_values_insert_only_suffix() {
        let result = inject(&template(), &SCHEMA, &values("", "", "")).unwrap();
        assert_eq!(result.bytes, b"01\r\n23456789ABCDEF".to_vec());
    }

    #[test]
    fn test_non_ascii_fails_whole_injection() {
        let err = inject(&template(), &SCHEMA, &values("ok", "Zoë", "ok")).unwrap_err();
        match err {
            InjectError::NonAscii { field, position } => {
                assert_eq!(field, "second");
                assert_eq!(position, 2);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_missing_value_fails() {
        let partial: FieldValues = [("first", "a"), ("second", "b")].into_iter().collect();
        assert!(matches!(
            inject(&template(), &SCHEMA, &partial),
            Err(InjectError::MissingValue(ref f)) if f == "third"
        ));
    }

    #[test]
    fn test_template_too_short_fails() {
        assert!(matches!(
            inject(b"0123", &SCHEMA, &values("a", "b", "c")),
            Err(InjectError::OffsetOutOfBounds { .. })
        ));
    }

    #[test]
    fn test_insert_at_template_end() {
        let schema = [FieldSpec::new("tail", "Tail", 4)];
        let v: FieldValues = [("tail", "!")].into_iter().collect();
        let result = inject(b"abcd", &schema, &v).unwrap();
        assert_eq!(result.bytes, b"abcd!".to_vec());
    }

    #[test]
    fn test_summary_lists_actual_offsets() {
        let result = inject(&template(), &SCHEMA, &values("ab", "c", "def")).unwrap();
        assert_eq!(
            result.summary(),
            "First inserted at 0x2, Second inserted at 0x9, Third inserted at 0xe"
        );
    }
}
