use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

/// Compares two texts line by line.
///
/// Trailing whitespace of every line is ignored, as are blank lines at the
/// start and the end. Whitespace inside a line is significant.
pub fn compare(produced: &str, expected: &str) -> bool {
    normalize(produced) == normalize(expected)
}

/// Compares a produced output file against the expected output file.
pub fn compare_files(produced: &Path, expected: &Path) -> Result<bool> {
    let produced_bytes = fs::read(produced)
        .with_context(|| format!("failed to read output: {}", produced.display()))?;
    let expected_bytes = fs::read(expected)
        .with_context(|| format!("failed to read expected output: {}", expected.display()))?;

    Ok(compare(
        &String::from_utf8_lossy(&produced_bytes),
        &String::from_utf8_lossy(&expected_bytes),
    ))
}

fn normalize(text: &str) -> Vec<&str> {
    let lines: Vec<&str> = text.lines().map(str::trim_end).collect();
    let first = lines.iter().position(|line| !line.is_empty());
    let last = lines.iter().rposition(|line| !line.is_empty());
    match (first, last) {
        (Some(first), Some(last)) => lines[first..=last].to_vec(),
        _ => Vec::new(),
    }
}
