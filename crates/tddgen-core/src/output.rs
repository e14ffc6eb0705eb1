//! Persisting injected documents

use crate::error::InjectError;
use crate::inject::{inject, Injection};
use crate::schema::{FieldSpec, IDENTIFYING_FIELD, TDD_EXTENSION};
use crate::values::FieldValues;
use std::path::{Path, PathBuf};

/// Characters that cannot appear in an output file name on any platform we
/// write to (the output folder is usually a Windows share).
const RESERVED: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// `<dir>/<identifier>.tdd`
///
/// The identifier is used as given; callers trim their input.
pub fn output_path(dir: &Path, identifier: &str) -> Result<PathBuf, InjectError> {
    if identifier.trim().is_empty()
        || identifier == "."
        || identifier == ".."
        || identifier
            .chars()
            .any(|c| c.is_control() || RESERVED.contains(&c))
    {
        return Err(InjectError::InvalidIdentifier(identifier.to_string()));
    }
    Ok(dir.join(format!("{identifier}.{TDD_EXTENSION}")))
}

/// Name for the output document: the identifying field, or `fallback` when
/// that field is blank (short intake documents carry no identifier).
pub fn output_name<'a>(
    values: &'a FieldValues,
    fallback: Option<&'a str>,
) -> Result<&'a str, InjectError> {
    let identifier = values
        .get(IDENTIFYING_FIELD)
        .ok_or_else(|| InjectError::MissingValue(IDENTIFYING_FIELD.to_string()))?;
    match fallback {
        Some(name) if identifier.trim().is_empty() => {
            tracing::info!("No {} value, naming output after {}", IDENTIFYING_FIELD, name);
            Ok(name)
        }
        _ => Ok(identifier),
    }
}

/// Write `bytes` to `path`, replacing any existing file.
///
/// Data goes to a hidden `.part` sibling first and is renamed into place, so
/// readers never see a half-written document and no part file is left behind.
pub fn write_output(path: &Path, bytes: &[u8]) -> Result<(), InjectError> {
    let part = part_path(path);
    let result = std::fs::write(&part, bytes).and_then(|()| std::fs::rename(&part, path));
    if let Err(source) = result {
        std::fs::remove_file(&part).ok();
        return Err(InjectError::Write {
            path: path.to_path_buf(),
            source,
        });
    }
    tracing::debug!("Wrote {} bytes to {}", bytes.len(), path.display());
    Ok(())
}

/// Read the template, inject `values` and write `<output_dir>/<name>.tdd`.
///
/// The name comes from [`output_name`]. The template is read fresh on every
/// call. Returns the written path and the placements used.
pub fn fill_template(
    template_path: &Path,
    schema: &[FieldSpec],
    values: &FieldValues,
    output_dir: &Path,
    fallback_name: Option<&str>,
) -> Result<(PathBuf, Injection), InjectError> {
    let path = output_path(output_dir, output_name(values, fallback_name)?)?;

    let template = std::fs::read(template_path).map_err(|source| InjectError::Template {
        path: template_path.to_path_buf(),
        source,
    })?;
    let injection = inject(&template, schema, values)?;
    write_output(&path, &injection.bytes)?;
    Ok((path, injection))
}

fn part_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.part"))
}
