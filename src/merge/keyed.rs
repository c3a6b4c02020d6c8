//! Re-keying of sequences into mappings
//!
//! Sequences merge atomically, so an inherited list cannot have a single
//! entry overridden or removed. Fields that hold lists of named items (for
//! example firewall rules) are converted into a mapping keyed by the item's
//! name before inheritance, after which each entry merges on its own and can
//! be dropped with a deletion sentinel.

use serde_yaml::{Mapping, Value as YamlValue};

use super::PathSegment;
use crate::error::{Error, Result};

/// Convert a sequence of mappings into a mapping keyed by `key_field`.
///
/// Each item keeps all of its fields, including `key_field`. Items that are
/// not mappings, lack a string `key_field`, or repeat a key are rejected.
pub fn index_by(class: &str, field: &str, items: &[YamlValue], key_field: &str) -> Result<Mapping> {
    let mut indexed = Mapping::new();
    for (position, item) in items.iter().enumerate() {
        let name = item
            .as_mapping()
            .and_then(|map| map.get(key_field))
            .and_then(YamlValue::as_str)
            .ok_or_else(|| Error::InvalidField {
                class: class.to_string(),
                field: format!("{}[{}]", field, position),
                message: format!("list entries must be mappings with a string '{}'", key_field),
            })?;
        if indexed
            .insert(YamlValue::from(name), item.clone())
            .is_some()
        {
            return Err(Error::InvalidField {
                class: class.to_string(),
                field: field.to_string(),
                message: format!("duplicate entry '{}'", name),
            });
        }
    }
    Ok(indexed)
}

/// Replace the sequence found at `path` inside `payload` with its keyed form.
///
/// Missing paths and values that are already mappings are left alone.
pub fn rekey_in_place(
    class: &str,
    payload: &mut Mapping,
    path: &[PathSegment],
    key_field: &str,
) -> Result<()> {
    let field = path
        .iter()
        .map(|segment| match segment {
            PathSegment::Key(key) => key.clone(),
            PathSegment::Index(idx) => format!("[{}]", idx),
        })
        .collect::<Vec<_>>()
        .join(".");

    let Some((last, parents)) = path.split_last() else {
        return Ok(());
    };

    let mut current = payload;
    for segment in parents {
        let PathSegment::Key(key) = segment else {
            return Ok(());
        };
        match current.get_mut(key.as_str()).and_then(YamlValue::as_mapping_mut) {
            Some(next) => current = next,
            None => return Ok(()),
        }
    }

    let PathSegment::Key(last) = last else {
        return Ok(());
    };
    let indexed = match current.get(last.as_str()) {
        Some(YamlValue::Sequence(items)) => index_by(class, &field, items, key_field)?,
        _ => return Ok(()),
    };
    current.insert(YamlValue::from(last.as_str()), YamlValue::Mapping(indexed));
    Ok(())
}
