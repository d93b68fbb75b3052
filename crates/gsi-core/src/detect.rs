//! Change detection from the `previously` companion.
//!
//! The game client does the diffing itself: alongside the current values
//! it sends a `previously` object holding the old value of every field
//! that changed since the last snapshot. Detection therefore never
//! compares trees. It only reads which keys the companion lists.
//!
//! The companion is shallow. For a section `hero` with companion
//! `{"level": 6, "xp": 100}` two changes are reported, `hero:level` and
//! `hero:xp`, whatever the shape of the values underneath. Nested data is
//! one changed unit at the first level below the section.
//!
//! Finer paths come from configuring a deeper section. With the section
//! `abilities:ability0`, both body and companion are walked down to
//! `abilities.ability0` first and the same one-level rule applies there,
//! producing names like `abilities:ability0:can_cast`.

use std::fmt;

use serde::Serialize;
use serde_json::{Map, Value};

/// Separator between the segments of section paths and event names.
pub const PATH_DELIMITER: char = ':';

/// A section to inspect, as a path of object keys from the snapshot root.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SectionPath {
    segments: Vec<String>,
    name: String,
}

impl SectionPath {
    /// Parse a colon-delimited section path.
    ///
    /// Returns `None` for an empty path or one with empty segments such as
    /// `hero::level`.
    pub fn parse(raw: &str) -> Option<Self> {
        let segments: Vec<String> = raw
            .trim()
            .split(PATH_DELIMITER)
            .map(str::to_owned)
            .collect();
        if segments.iter().any(String::is_empty) {
            return None;
        }
        Some(Self {
            name: segments.join(":"),
            segments,
        })
    }

    /// The individual keys of this path.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// The path as written, e.g. `abilities:ability0`.
    pub fn as_str(&self) -> &str {
        &self.name
    }

    /// Walk `root` along this path, returning the object found there.
    fn resolve<'a>(&self, root: &'a Map<String, Value>) -> Option<&'a Map<String, Value>> {
        let mut current = root;
        for segment in &self.segments {
            current = current.get(segment)?.as_object()?;
        }
        Some(current)
    }
}

impl fmt::Display for SectionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// One detected change: the event name and the field's new value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangeEvent {
    /// Colon-delimited event name, e.g. `hero:level`.
    pub path: String,
    /// New value from the current snapshot. `None` when the companion
    /// lists a field the current snapshot does not carry.
    pub value: Option<Value>,
}

/// Compute the changes the companion reports for `section`.
///
/// `body` is the raw incoming snapshot and `previously` its companion
/// object. Values are read from `body`, never from merged session state.
/// Changes come back in the companion's key order.
///
/// A missing or non-object companion for the section yields no changes;
/// so does a missing `previously` altogether.
pub fn detect_changes(
    section: &SectionPath,
    body: &Map<String, Value>,
    previously: Option<&Map<String, Value>>,
) -> Vec<ChangeEvent> {
    let Some(companion) = previously.and_then(|p| section.resolve(p)) else {
        return Vec::new();
    };
    let current = section.resolve(body);

    companion
        .keys()
        .map(|key| ChangeEvent {
            path: format!("{section}{PATH_DELIMITER}{key}"),
            value: current.and_then(|fields| fields.get(key)).cloned(),
        })
        .collect()
}
