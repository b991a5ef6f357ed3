//! Field masks and the generic mask/diff utilities built on the
//! reflection contract.

use crate::errors::SchemaError;

use super::{ConfigMessage, FieldPath};

/// A set of canonical dotted field paths selecting part of a document.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FieldMask {
    pub paths: Vec<String>,
}

impl FieldMask {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_paths<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut mask = Self::new();
        for path in paths {
            mask.append(path);
        }
        mask
    }

    /// Adds a path unless it is already present.
    pub fn append(&mut self, path: impl Into<String>) {
        let path = path.into();
        if !self.paths.contains(&path) {
            self.paths.push(path);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.paths.iter().any(|p| p == path)
    }

    /// True when the mask selects `path`: some mask entry is an ancestor of
    /// the path, or the path is an ancestor of a mask entry.
    pub fn covers(&self, path: &FieldPath) -> bool {
        self.paths.iter().any(|entry| {
            let entry = match FieldPath::parse(entry) {
                Ok(p) => p,
                Err(_) => return false,
            };
            path.starts_with(&entry) || entry.starts_with(path)
        })
    }

    /// Checks every mask entry against the schema of `T`.
    pub fn validate<T: ConfigMessage>(&self) -> Result<(), SchemaError> {
        let known = T::all_paths();
        for entry in &self.paths {
            let path = FieldPath::parse(entry)
                .map_err(|_| SchemaError::InvalidMask(entry.clone()))?;
            if !known.contains(&path) {
                return Err(SchemaError::InvalidMask(entry.clone()));
            }
        }
        Ok(())
    }
}

/// Builds a mask from every set field of `msg`: the leaf-most present paths.
pub fn mask_by_presence<T: ConfigMessage>(msg: &T) -> FieldMask {
    let all = T::all_paths();
    let mut mask = FieldMask::new();
    for path in &all {
        if !msg.has_field(path) {
            continue;
        }
        let has_set_child = all
            .iter()
            .any(|other| other != path && other.starts_with(path) && msg.has_field(other));
        if !has_set_child {
            mask.append(path.dotted());
        }
    }
    mask
}

/// Clears every set field of `msg` that the mask does not cover, then drops
/// sub-messages the clearing left empty.
pub fn exclusive_keep<T: ConfigMessage>(msg: &mut T, mask: &FieldMask) {
    for path in mask_by_presence(msg).paths {
        let path = match FieldPath::parse(&path) {
            Ok(p) => p,
            Err(_) => continue,
        };
        if !mask.covers(&path) {
            let _ = msg.clear_field(&path);
        }
    }
    // Deepest-first so an emptied child empties its parent in turn.
    let mut message_paths: Vec<FieldPath> = T::all_paths();
    message_paths.sort_by_key(|p| std::cmp::Reverse(p.len()));
    for path in message_paths {
        if mask.covers(&path) || !msg.has_field(&path) {
            continue;
        }
        if let Ok(Some(value)) = msg.field_value(&path) {
            if value.is_empty_message() {
                let _ = msg.clear_field(&path);
            }
        }
    }
}

/// The paths whose values differ between two documents, including every
/// ancestor of a changed leaf. Either side may be absent.
pub fn diff_paths<T: ConfigMessage>(previous: Option<&T>, current: Option<&T>) -> Vec<FieldPath> {
    let mut changed = Vec::new();
    for path in T::all_paths() {
        let before = previous.and_then(|m| m.field_value(&path).ok().flatten());
        let after = current.and_then(|m| m.field_value(&path).ok().flatten());
        if before != after {
            changed.push(path);
        }
    }
    changed
}
