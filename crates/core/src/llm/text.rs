/// Strips a surrounding Markdown fence (```text ... ```) and outer whitespace.
pub fn clean_report_text(text: &str) -> String {
    let trimmed = text.trim();
    if !trimmed.starts_with("```") {
        return trimmed.to_string();
    }

    let mut inner = trimmed;
    if let Some(after_first) = inner.split_once('\n').map(|(_, rest)| rest) {
        inner = after_first;
    }
    if let Some(end) = inner.rfind("```") {
        inner = &inner[..end];
    }
    inner.trim().to_string()
}
