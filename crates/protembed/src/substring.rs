use std::collections::HashMap;
use std::ops::Range;
use std::path::Path;

use itertools::Itertools;
use serde::Deserialize;

use crate::error::ExtractError;

/// Residue ranges per sequence id, 0-indexed and end-exclusive.
pub type SubstringMap = HashMap<String, Vec<Range<usize>>>;

#[derive(Debug, Deserialize)]
struct SubstringRow {
    sequence_id: String,
    start: usize,
    end: usize,
}

/// Load the substring table from a CSV with `sequence_id,start,end` columns.
///
/// A sequence id may appear on several rows; its ranges keep the file
/// order. Ranges that would be empty (`start >= end`) are rejected here,
/// ranges that overrun a particular sequence are only caught against that
/// sequence during extraction.
pub fn load_ranges(path: &Path) -> Result<SubstringMap, ExtractError> {
    let mut reader = csv::Reader::from_path(path)
        .map_err(|e| ExtractError::Substring(format!("{}: {}", path.display(), e)))?;
    let mut rows = Vec::new();
    for (idx, row) in reader.deserialize().enumerate() {
        let line = idx + 2; // line 1 is the header
        let row: SubstringRow =
            row.map_err(|e| ExtractError::Substring(format!("line {}: {}", line, e)))?;
        if row.start >= row.end {
            return Err(ExtractError::Substring(format!(
                "line {}: empty range {}..{} for '{}'",
                line, row.start, row.end, row.sequence_id
            )));
        }
        rows.push((row.sequence_id, row.start..row.end));
    }
    if rows.is_empty() {
        return Err(ExtractError::Substring(format!(
            "{}: no ranges found",
            path.display()
        )));
    }
    Ok(rows.into_iter().into_group_map())
}
