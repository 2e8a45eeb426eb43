use anyhow::{Context, Result};

/// Render texts as one JSON array of strings.
///
/// Backslash, double quote, newline, carriage return and tab are escaped,
/// as are the remaining control characters (tesseract ends every page with
/// a form feed). Everything else passes through untouched.
pub fn serialize<S: AsRef<str>>(texts: &[S]) -> Result<String> {
    let items: Vec<&str> = texts.iter().map(AsRef::as_ref).collect();
    serde_json::to_string(&items).context("serializing results")
}
