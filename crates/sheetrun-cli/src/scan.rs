//! Scan command: report the cell references in a code file.

use std::path::Path;

use anyhow::Context;

/// Parse an anchor given as `x,y`.
pub fn parse_anchor(value: &str) -> Result<(i64, i64), String> {
    let (x, y) = value
        .split_once(',')
        .ok_or_else(|| format!("expected x,y but got '{}'", value))?;
    let x = x.trim().parse().map_err(|e| format!("bad x '{}': {}", x, e))?;
    let y = y.trim().parse().map_err(|e| format!("bad y '{}': {}", y, e))?;
    Ok((x, y))
}

/// Scan `path` and print the result as JSON.
pub fn execute(path: &Path, anchor: Option<(i64, i64)>) -> anyhow::Result<()> {
    let code = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;

    let mut parsed = sheetrun_core::scan(&code);
    tracing::debug!("Found {} references in {}", parsed.references.len(), path.display());

    if let Some(anchor) = anchor {
        parsed = sheetrun_core::resolve(&parsed, anchor)?;
    }

    println!("{}", serde_json::to_string_pretty(&parsed)?);
    Ok(())
}
