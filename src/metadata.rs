//! Metadata
//!
//! Attribute amendments applied to output cubes.
use crate::cube::Cube;
use chrono::Utc;
use std::collections::BTreeMap;

/// Add, update or remove attributes. The value `"remove"` deletes the attribute.
pub fn amend_attributes(cube: &mut Cube, attributes: &BTreeMap<String, String>) {
    for (name, value) in attributes {
        if value == "remove" {
            cube.attributes.remove(name);
        } else {
            cube.attributes.insert(name.clone(), value.clone());
        }
    }
}

/// Set the history attribute to `"<timestamp>: <value>"`, replacing any
/// existing history unless `append` is set.
pub fn set_history_attribute(cube: &mut Cube, value: &str, append: bool) {
    let timestamp = Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
    let new_history = format!("{}: {}", timestamp, value);
    if append {
        if let Some(history) = cube.attributes.get_mut("history") {
            history.push_str("; ");
            history.push_str(&new_history);
            return;
        }
    }
    cube.attributes.insert("history".to_string(), new_history);
}
