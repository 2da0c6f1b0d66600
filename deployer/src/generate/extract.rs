//! Post-processing of generated text

const FENCE: &str = "```";

/// Extract the body of the first fenced code block in `raw`.
///
/// A language tag directly after the opening fence (`html`, `js`, ...)
/// is dropped. Text without a fence is returned trimmed.
pub fn extract_code(raw: &str) -> String {
    let Some(start) = raw.find(FENCE) else {
        return raw.trim().to_string();
    };

    let after_open = &raw[start + FENCE.len()..];
    let body = match after_open.find(FENCE) {
        Some(end) => &after_open[..end],
        None => after_open,
    };

    strip_language_tag(body).trim().to_string()
}

fn strip_language_tag(body: &str) -> &str {
    let tag_len = body
        .find(|c: char| !is_tag_char(c))
        .unwrap_or(body.len());
    if tag_len == 0 {
        return body;
    }

    // Only a token that ends the fence line counts as a tag.
    let rest = &body[tag_len..];
    if rest.is_empty() || rest.starts_with('\n') || rest.starts_with("\r\n") {
        rest
    } else {
        body
    }
}

fn is_tag_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '+' | '#' | '.')
}
