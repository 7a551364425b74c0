//! Deterministic JSON files: keys sorted, fixed indentation, so that output
//! diffs cleanly between runs.

use std::path::Path;

use serde::Serialize;
use serde_json::ser::PrettyFormatter;

use crate::error::Error;

/// Serialize with sorted keys and `indent` spaces.
pub fn to_sorted_string<T: Serialize>(value: &T, indent: usize) -> Result<String, Error> {
    // `Value` objects are BTreeMaps, so going through it sorts every level.
    let value = serde_json::to_value(value)?;
    let indent = " ".repeat(indent);
    let mut out = Vec::new();
    let mut ser =
        serde_json::Serializer::with_formatter(&mut out, PrettyFormatter::with_indent(indent.as_bytes()));
    value.serialize(&mut ser)?;
    String::from_utf8(out).map_err(|e| Error::Config(format!("non UTF-8 JSON output: {e}")))
}

/// Write `value` to `path`, optionally followed by a newline.
pub fn write_sorted<T: Serialize>(
    path: &Path,
    value: &T,
    indent: usize,
    trailing_newline: bool,
) -> Result<(), Error> {
    let mut content = to_sorted_string(value, indent)?;
    if trailing_newline {
        content.push('\n');
    }
    std::fs::write(path, content)?;
    Ok(())
}
