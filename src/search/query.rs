//! Full-text match expression construction

/// Build an FTS5 match expression that matches any of `terms`.
///
/// Each term is quoted as a phrase so that punctuation in import paths
/// (`github.com/foo`) and FTS5 operators in user input are taken literally.
/// Returns `None` when no term has content.
pub fn match_expression(terms: &[String]) -> Option<String> {
    let phrases: Vec<String> = terms
        .iter()
        .map(|term| term.trim())
        .filter(|term| !term.is_empty())
        .map(|term| format!("\"{}\"", term.replace('"', "\"\"")))
        .collect();

    if phrases.is_empty() {
        None
    } else {
        Some(phrases.join(" OR "))
    }
}
