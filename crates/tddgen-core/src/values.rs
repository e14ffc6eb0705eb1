//! Field value sets

use crate::error::InjectError;
use crate::schema::FieldSpec;
use std::collections::BTreeMap;

/// Mapping from field name to its text value.
///
/// Built once per run, either from arguments, prompts or extraction, and
/// consumed by a single injection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldValues {
    values: BTreeMap<String, String>,
}

impl FieldValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Values in schema order, failing on the first field without a value.
    pub fn ordered<'a>(
        &'a self,
        schema: &'a [FieldSpec],
    ) -> Result<Vec<(&'a FieldSpec, &'a str)>, InjectError> {
        schema
            .iter()
            .map(|spec| {
                self.get(spec.name)
                    .map(|value| (spec, value))
                    .ok_or_else(|| InjectError::MissingValue(spec.name.to_string()))
            })
            .collect()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for FieldValues {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut values = Self::new();
        for (name, value) in iter {
            values.insert(name, value);
        }
        values
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCHEMA: [FieldSpec; 2] = [FieldSpec::new("a", "A", 1), FieldSpec::new("b", "B", 2)];

    #[test]
    fn test_ordered_follows_schema() {
        let values: FieldValues = [("b", "2"), ("a", "1")].into_iter().collect();
        let ordered = values.ordered(&SCHEMA).unwrap();
        assert_eq!(ordered[0].0.name, "a");
        assert_eq!(ordered[0].1, "1");
        assert_eq!(ordered[1].1, "2");
    }

    #[test]
    fn test_ordered_reports_missing_field() {
        let values: FieldValues = [("a", "1")].into_iter().collect();
        let err = values.ordered(&SCHEMA).unwrap_err();
        assert!(matches!(err, InjectError::MissingValue(ref name) if name == "b"));
    }

    #[test]
    fn test_empty_string_is_a_value() {
        let values: FieldValues = [("a", ""), ("b", "")].into_iter().collect();
        assert!(values.ordered(&SCHEMA).is_ok());
    }
}
